// ============================================================
// Head Store
// ============================================================
// Saves and restores prediction heads as a pair of files per
// head index, so several heads can share one directory:
//
//   {dir}/
//     prediction_head_0.mpk.gz        ← weights (burn record)
//     prediction_head_0_config.json   ← HeadConfig, tagged by "name"
//     prediction_head_1.mpk.gz
//     prediction_head_1_config.json
//
// The config is what lets a loader rebuild the right variant
// with the right layer sizes before pouring the weights in.
//
// Weights go through burn's NamedMpkGzFileRecorder at full
// precision, so a reloaded head reproduces the saved head's
// outputs exactly. The recorder picks the file extension
// itself; paths handed to it carry no suffix.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};

use crate::error::{HeadError, Result};
use crate::ml::registry::HeadConfig;

/// Suffix the weight recorder writes.
pub const WEIGHTS_SUFFIX: &str = ".mpk.gz";

type WeightsRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Directory holding saved heads, addressed by head index.
#[derive(Debug, Clone)]
pub struct HeadStore {
    dir: PathBuf,
}

impl HeadStore {
    /// Open `dir`, creating it (and its parents) if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn weights_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("prediction_head_{index}{WEIGHTS_SUFFIX}"))
    }

    pub fn config_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("prediction_head_{index}_config.json"))
    }

    /// Record `module`'s parameters as `prediction_head_{index}.mpk.gz`.
    pub fn save_weights<B: Backend, M: Module<B>>(&self, module: M, index: usize) -> Result<PathBuf> {
        let path = self.weights_path(index);
        Recorder::<B>::record(&WeightsRecorder::new(), module.into_record(), weights_stem(&path))
            .map_err(|e| HeadError::Record(format!("cannot save '{}': {e:?}", path.display())))?;

        tracing::debug!("Saved head weights to '{}'", path.display());
        Ok(path)
    }

    pub fn save_config(&self, config: &HeadConfig, index: usize) -> Result<PathBuf> {
        let path = self.config_path(index);
        fs::write(&path, config.to_json()?)?;

        tracing::debug!("Saved {} config to '{}'", config.kind(), path.display());
        Ok(path)
    }
}

/// Restore saved parameters into `module`, which must have the
/// architecture they were saved from.
pub fn load_weights<B: Backend, M: Module<B>>(
    module: M,
    path:   impl AsRef<Path>,
    device: &B::Device,
) -> Result<M> {
    let path = path.as_ref();
    let record = Recorder::<B>::load(&WeightsRecorder::new(), weights_stem(path), device)
        .map_err(|e| HeadError::Record(format!("cannot load '{}': {e:?}", path.display())))?;
    Ok(module.load_record(record))
}

pub fn load_config(path: impl AsRef<Path>) -> Result<HeadConfig> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)?;
    HeadConfig::from_json(&json)
}

/// `path` with a trailing `.mpk.gz` removed, as the recorder expects.
fn weights_stem(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_suffix(WEIGHTS_SUFFIX) {
        Some(stem) => PathBuf::from(stem),
        None => path.to_path_buf(),
    }
}

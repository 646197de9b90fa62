// ============================================================
// CLI Commands and Arguments
// ============================================================
// Two subcommands:
//   create  - build a head by registered name and save it
//   inspect - load a saved head and describe it

use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a fresh head and save its weights and config
    Create(CreateArgs),

    /// Load a saved head and print its variant and dimensions
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Registered head name, e.g. TextClassificationHead
    #[arg(long)]
    pub name: String,

    /// Feed-forward layer sizes, input first, e.g. 768,2
    #[arg(long, value_delimiter = ',', required = true)]
    pub layer_dims: Vec<usize>,

    /// One loss weight per class (text classification only)
    #[arg(long, value_delimiter = ',')]
    pub class_weights: Option<Vec<f32>>,

    /// Directory to write the head files into
    #[arg(long, default_value = "heads")]
    pub out: String,

    /// Head index, used in the file names
    #[arg(long, default_value_t = 0)]
    pub index: usize,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Weights file, with or without the .mpk.gz suffix
    #[arg(long)]
    pub weights: String,

    /// Matching prediction_head_{n}_config.json
    #[arg(long)]
    pub config: String,
}

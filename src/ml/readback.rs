// ============================================================
// Tensor Readback
// ============================================================
// Alignment and formatting work on host vectors, not tensors.
// These helpers pull tensor data off the device in a fixed
// element type regardless of the backend's native one
// (Wgpu uses i32 ints, NdArray uses i64).

use burn::prelude::*;

use crate::error::{HeadError, Result};

pub(crate) fn floats<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| HeadError::Tensor(format!("{e:?}")))
}

pub(crate) fn ints<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Result<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| HeadError::Tensor(format!("{e:?}")))
}

/// Row-major [rows, width] data as one Vec per row.
pub(crate) fn rows<T: Clone>(flat: &[T], width: usize) -> Vec<Vec<T>> {
    if width == 0 {
        return Vec::new();
    }
    flat.chunks(width).map(<[T]>::to_vec).collect()
}

/// Int rows of a [batch, seq_len] mask turned into flags.
pub(crate) fn mask_rows<B: Backend>(mask: Tensor<B, 2, Int>) -> Result<Vec<Vec<bool>>> {
    let [_, seq_len] = mask.dims();
    let flags: Vec<bool> = ints(mask)?.into_iter().map(|m| m != 0).collect();
    Ok(rows(&flags, seq_len))
}

/// Ids read back from a tensor as indices. Negative ids clamp to 0;
/// argmax outputs are never negative, ground-truth positions can be.
pub(crate) fn indices(ids: Vec<i64>) -> Vec<usize> {
    ids.into_iter().map(|i| usize::try_from(i).unwrap_or(0)).collect()
}

// ============================================================
// Feed Forward Block
// ============================================================
// A cascade of linear projections for a dimension list:
//
//   [768, 2]        -> Linear(768, 2)
//   [768, 256, 3]   -> Linear(768, 256) -> Linear(256, 3)
//
// No activation between layers. Works on any tensor rank since
// burn's Linear only acts on the last dimension, so the same
// block serves pooled [batch, hidden] and per-token
// [batch, seq_len, hidden] embeddings.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::error::HeadError;

#[derive(Config, Debug)]
pub struct FeedForwardBlockConfig {
    /// Input width followed by the output width of every layer.
    pub layer_dims: Vec<usize>,
}

impl FeedForwardBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::Result<FeedForwardBlock<B>> {
        if self.layer_dims.len() < 2 {
            return Err(HeadError::InvalidConfig(format!(
                "layer_dims needs at least an input and an output width, got {:?}",
                self.layer_dims
            )));
        }
        if self.layer_dims.contains(&0) {
            return Err(HeadError::InvalidConfig(format!(
                "layer_dims must be positive, got {:?}",
                self.layer_dims
            )));
        }

        let layers = self
            .layer_dims
            .windows(2)
            .map(|pair| LinearConfig::new(pair[0], pair[1]).init(device))
            .collect();

        Ok(FeedForwardBlock { layers })
    }
}

#[derive(Module, Debug)]
pub struct FeedForwardBlock<B: Backend> {
    pub layers: Vec<Linear<B>>,
}

impl<B: Backend> FeedForwardBlock<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.layers.iter().fold(x, |x, layer| layer.forward(x))
    }

    /// The dimension list this block was built from, read back from
    /// the layer weights ([d_input, d_output] each).
    pub fn layer_dims(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(self.layers.len() + 1);
        for (i, layer) in self.layers.iter().enumerate() {
            let [d_in, d_out] = layer.weight.val().dims();
            if i == 0 {
                dims.push(d_in);
            }
            dims.push(d_out);
        }
        dims
    }

    pub fn output_size(&self) -> usize {
        self.layer_dims().last().copied().unwrap_or(0)
    }
}

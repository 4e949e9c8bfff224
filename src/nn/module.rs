//! The `Module` trait shared by every graph layer.

use crate::tensor::Tensor;

/// A layer that appends its computation to the graph of its input.
///
/// Modules hold symbolic handles only; parameter values are supplied when the
/// graph is run.
pub trait Module {
    /// Builds the layer's output from `inputs`.
    fn forward(&self, inputs: &Tensor) -> Tensor;

    /// The layer's `Parameter` nodes, in a stable order.
    fn parameters(&self) -> Vec<Tensor>;
}

use ndarray::{Array2, ArrayView2};

use crate::{arch::loss::LossFn, error::Result, tensor::Tensor};

/// The model collaborator of the optimizers.
///
/// A model doesn't own its parameters, it is handed the ordered list of parameter tensors on
/// every pass. The order given by `shapes` is stable across calls and is the identity the
/// optimizers use to keep per-layer state.
pub trait Model {
    /// Returns the shape of every parameter tensor, in order.
    fn shapes(&self) -> Vec<Vec<usize>>;

    /// Returns the amount of scalar parameters in the model.
    fn size(&self) -> usize {
        self.shapes().iter().map(|s| s.iter().product::<usize>()).sum()
    }

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch, one row per example.
    ///
    /// # Returns
    /// The raw outputs for every row, or an error if the parameters don't fit the model.
    fn forward(&mut self, params: &[Tensor], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the loss over a batch and its gradient with respect to every parameter
    /// tensor. The parameters are left untouched.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grads` - A buffer per parameter tensor where the gradient is written.
    /// * `loss_fn` - The loss function.
    /// * `x` - The input batch.
    /// * `y` - The expected outputs.
    ///
    /// # Returns
    /// The mean loss over the batch.
    fn backprop<L: LossFn>(
        &mut self,
        params: &[Tensor],
        grads: &mut [Tensor],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32>;
}

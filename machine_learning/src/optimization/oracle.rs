use ndarray::ArrayView2;

use crate::{
    Result,
    arch::{Model, loss::LossFn},
    tensor::Tensor,
};

/// Something that can evaluate the gradient of the objective at arbitrary parameters.
pub trait GradientOracle {
    /// Writes the gradient at `params` into `grads`.
    ///
    /// # Returns
    /// The loss at `params`.
    fn gradient(&mut self, params: &[Tensor], grads: &mut [Tensor]) -> Result<f32>;
}

/// A `GradientOracle` bound to a model, a loss function and the current batch.
pub struct BatchOracle<'a, M, L> {
    model: &'a mut M,
    loss_fn: &'a L,
    x: ArrayView2<'a, f32>,
    y: ArrayView2<'a, f32>,
}

impl<'a, M: Model, L: LossFn> BatchOracle<'a, M, L> {
    pub fn new(
        model: &'a mut M,
        loss_fn: &'a L,
        x: ArrayView2<'a, f32>,
        y: ArrayView2<'a, f32>,
    ) -> Self {
        Self {
            model,
            loss_fn,
            x,
            y,
        }
    }
}

impl<M: Model, L: LossFn> GradientOracle for BatchOracle<'_, M, L> {
    fn gradient(&mut self, params: &[Tensor], grads: &mut [Tensor]) -> Result<f32> {
        self.model
            .backprop(params, grads, self.loss_fn, self.x, self.y)
    }
}

/// Any closure with the right signature is an oracle, handy for analytic objectives.
impl<F> GradientOracle for F
where
    F: FnMut(&[Tensor], &mut [Tensor]) -> Result<f32>,
{
    fn gradient(&mut self, params: &[Tensor], grads: &mut [Tensor]) -> Result<f32> {
        self(params, grads)
    }
}

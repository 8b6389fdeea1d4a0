use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, layers::Layer, loss::LossFn};
use crate::{MlErr, Result, tensor::Tensor};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Samples a fresh set of parameters for this model.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Tensor>> {
        let mut params = Vec::new();

        for layer in &self.layers {
            params.extend(layer.init_params(rng)?);
        }

        Ok(params)
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.layers.iter().map(Layer::tensors).sum();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn shapes(&self) -> Vec<Vec<usize>> {
        self.layers.iter().flat_map(Layer::shapes).collect()
    }

    fn forward(&mut self, params: &[Tensor], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("parameter list", params.len())?;

        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let n = layer.tensors();
            a = layer.forward(offset, &params[offset..offset + n], a.view())?;
            offset += n;
        }

        Ok(a)
    }

    fn backprop<L: LossFn>(
        &mut self,
        params: &[Tensor],
        grads: &mut [Tensor],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32> {
        self.check_len("gradient list", grads.len())?;

        let y_pred = self.forward(params, x)?;
        if y_pred.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "targets",
                got: y.ncols(),
                expected: y_pred.ncols(),
            });
        }

        let loss = loss_fn.loss(y_pred.view(), y);
        let mut d = loss_fn.loss_prime(y_pred.view(), y);
        let mut offset = params.len();

        for layer in self.layers.iter_mut().rev() {
            let n = layer.tensors();
            offset -= n;

            let range = offset..offset + n;
            d = layer.backward(offset, &params[range.clone()], &mut grads[range], d)?;
        }

        Ok(loss)
    }
}

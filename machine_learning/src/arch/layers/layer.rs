use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::Dense;
use crate::{MlErr, Result, arch::activations::ActFn, tensor::Tensor};

#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
}
use Layer::*;

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    /// Returns the shapes of the parameter tensors this layer owns, in order.
    pub fn shapes(&self) -> Vec<Vec<usize>> {
        match self {
            Dense(l) => l.shapes().into(),
        }
    }

    /// Returns how many parameter tensors this layer owns.
    pub fn tensors(&self) -> usize {
        match self {
            Dense(_) => 2,
        }
    }

    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Tensor>> {
        match self {
            Dense(l) => Ok(l.init_params(rng)?.into()),
        }
    }

    /// # Arguments
    /// * `offset` - The position of this layer's first tensor in the parameter list.
    /// * `params` - This layer's parameter tensors.
    /// * `x` - The input batch.
    pub fn forward(
        &mut self,
        offset: usize,
        params: &[Tensor],
        x: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.forward(offset, &params[0], &params[1], x),
        }
    }

    /// # Arguments
    /// * `offset` - The position of this layer's first tensor in the parameter list.
    /// * `params` - This layer's parameter tensors.
    /// * `grads` - This layer's gradient tensors.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    pub fn backward(
        &mut self,
        offset: usize,
        params: &[Tensor],
        grads: &mut [Tensor],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => {
                let [dw, db] = grads else {
                    return Err(MlErr::SizeMismatch {
                        what: "dense gradients",
                        got: grads.len(),
                        expected: 2,
                    });
                };

                l.backward(offset, &params[0], dw, db, d)
            }
        }
    }
}

use serde::{Deserialize, Serialize};

use super::{previous, scale_of};
use crate::{
    Result,
    optimization::{History, StepContext, proximal::soft_threshold_mut},
    tensor::Tensor,
};

/// Hyperparameters of `PStorm`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PStormConfig {
    /// An estimate of the Lipschitz constant of the gradient.
    pub lipschitz: f32,
    /// The initial step size, `(4/3) / 8L` when unset.
    pub eta0: Option<f32>,
}

impl Default for PStormConfig {
    fn default() -> Self {
        Self {
            lipschitz: 2.,
            eta0: None,
        }
    }
}

impl PStormConfig {
    pub fn eta0(&self) -> f32 {
        self.eta0
            .unwrap_or_else(|| (4. / 3.) / (8. * self.lipschitz))
    }

    /// The step size at iteration `iter`, `η₀ / (iter + 4)^⅓`.
    pub fn eta(&self, iter: usize) -> f32 {
        self.eta0() / (iter as f32 + 4.).cbrt()
    }

    /// The momentum weight at iteration `iter`.
    pub fn beta(&self, iter: usize) -> f32 {
        let eta = self.eta(iter);
        let eta1 = self.eta(iter + 1);
        let l = self.lipschitz;
        let t = iter as f32;

        (1. + 20. * (eta * l).powi(2) - eta1 / eta) / (1. + 4. * (eta * t).powi(2))
    }
}

/// Proximal PStorm: a STORM style momentum estimator with a decaying step size.
///
/// ```text
/// d₁ = g₁ / S
/// dₜ = gₜ / S + (1 - βₜ)·(dₜ₋₁ - gₜ₋₁ / S)
/// xₜ₊₁ = prox(xₜ - ηₜ·dₜ, lr·ηₜ)
/// ```
#[derive(Debug, Clone)]
pub struct PStorm {
    config: PStormConfig,
    scale: f32,
    grads: History,
    directions: History,
}

impl PStorm {
    pub fn new(config: PStormConfig, batch_size: usize) -> Self {
        Self {
            config,
            scale: scale_of(batch_size),
            grads: History::new("gradient"),
            directions: History::new("direction"),
        }
    }

    /// The latest direction taken for `layer`, if any.
    pub fn direction(&self, layer: usize) -> Option<&Tensor> {
        self.directions.last(layer, 0).ok()
    }

    /// Performs one step over every tensor.
    ///
    /// # Arguments
    /// * `ctx` - The step context.
    /// * `params` - The parameters, updated in place.
    /// * `grads` - The gradient at `params`, one tensor per parameter.
    pub fn step(&mut self, ctx: StepContext, params: &mut [Tensor], grads: &[Tensor]) -> Result<()> {
        let eta = self.config.eta(ctx.iter());
        let beta = self.config.beta(ctx.iter());

        let directions = grads
            .iter()
            .enumerate()
            .map(|(layer, g)| {
                let mut d = g / self.scale;
                if ctx.is_first_step() {
                    return Ok(d);
                }

                let g_prev = previous(&self.grads, ctx, layer, g)?;
                let d_prev = previous(&self.directions, ctx, layer, g)?;

                let momentum = d_prev - &(g_prev / self.scale);
                d.scaled_add(1. - beta, &momentum);
                Ok(d)
            })
            .collect::<Result<Vec<_>>>()?;

        for (layer, (x, d)) in params.iter_mut().zip(directions).enumerate() {
            x.scaled_add(-eta, &d);
            soft_threshold_mut(x, ctx.lr * eta);

            self.grads.record(layer, grads[layer].clone());
            self.directions.record(layer, d);
        }

        Ok(())
    }
}

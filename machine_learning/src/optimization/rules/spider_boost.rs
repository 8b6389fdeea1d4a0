use serde::{Deserialize, Serialize};

use super::{previous, scale_of};
use crate::{
    Result,
    optimization::{History, StepContext, proximal::soft_threshold_mut},
    tensor::Tensor,
};

/// Hyperparameters of `SpiderBoost`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiderBoostConfig {
    /// An estimate of the Lipschitz constant of the gradient.
    pub lipschitz: f32,
}

impl Default for SpiderBoostConfig {
    fn default() -> Self {
        Self { lipschitz: 2. }
    }
}

impl SpiderBoostConfig {
    /// The step size, `1 / 2L`.
    pub fn eta(&self) -> f32 {
        1. / (2. * self.lipschitz)
    }
}

/// Proximal SpiderBoost.
///
/// Keeps a recursive estimate of the gradient, correcting the previous direction with the change
/// in the gradient between consecutive iterates:
///
/// ```text
/// v₁ = g₁ / S
/// vₜ = (gₜ - gₜ₋₁ + vₜ₋₁) / S
/// xₜ₊₁ = prox(xₜ - η·vₜ, lr·η)
/// ```
///
/// where `S` is the square root of the batch size.
#[derive(Debug, Clone)]
pub struct SpiderBoost {
    eta: f32,
    scale: f32,
    grads: History,
    directions: History,
}

impl SpiderBoost {
    /// Creates a new `SpiderBoost`.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters.
    /// * `batch_size` - The amount of examples per gradient.
    pub fn new(config: SpiderBoostConfig, batch_size: usize) -> Self {
        Self {
            eta: config.eta(),
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
        let directions = grads
            .iter()
            .enumerate()
            .map(|(layer, g)| self.direction_for(ctx, layer, g))
            .collect::<Result<Vec<_>>>()?;

        let radius = ctx.lr * self.eta;

        for (layer, (x, v)) in params.iter_mut().zip(directions).enumerate() {
            x.scaled_add(-self.eta, &v);
            soft_threshold_mut(x, radius);

            self.grads.record(layer, grads[layer].clone());
            self.directions.record(layer, v);
        }

        Ok(())
    }

    fn direction_for(&self, ctx: StepContext, layer: usize, g: &Tensor) -> Result<Tensor> {
        if ctx.is_first_step() {
            return Ok(g / self.scale);
        }

        let g_prev = previous(&self.grads, ctx, layer, g)?;
        let v_prev = previous(&self.directions, ctx, layer, g)?;

        Ok((g - g_prev + v_prev) / self.scale)
    }
}

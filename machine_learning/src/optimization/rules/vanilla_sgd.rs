use serde::{Deserialize, Serialize};

use crate::{
    Result,
    optimization::{StepContext, proximal::soft_threshold_mut},
    tensor::Tensor,
};

/// Which tensors `VanillaSgd` projects after stepping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximalScope {
    /// Only the last tensor of the parameter list, as the published experiments do.
    #[default]
    LastTensor,
    EveryTensor,
}

/// Hyperparameters of `VanillaSgd`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VanillaSgdConfig {
    /// Scales the projection radius, `lr·alpha0`.
    pub alpha0: f32,
    pub projection: ProximalScope,
}

impl Default for VanillaSgdConfig {
    fn default() -> Self {
        Self {
            alpha0: 1.,
            projection: ProximalScope::LastTensor,
        }
    }
}

/// Proximal SGD with a `1/√t` decaying step size:
///
/// ```text
/// xₜ₊₁ = prox(xₜ - (lr/√t)·gₜ, lr·alpha0)
/// ```
///
/// It keeps no history.
#[derive(Debug, Clone)]
pub struct VanillaSgd {
    config: VanillaSgdConfig,
}

impl VanillaSgd {
    pub fn new(config: VanillaSgdConfig) -> Self {
        Self { config }
    }

    /// Performs one step over every tensor.
    ///
    /// # Arguments
    /// * `ctx` - The step context.
    /// * `params` - The parameters, updated in place.
    /// * `grads` - The gradient at `params`, one tensor per parameter.
    pub fn step(&mut self, ctx: StepContext, params: &mut [Tensor], grads: &[Tensor]) -> Result<()> {
        let step = ctx.lr / (ctx.iter() as f32).sqrt();
        let radius = ctx.lr * self.config.alpha0;

        for (x, g) in params.iter_mut().zip(grads) {
            x.scaled_add(-step, g);
        }

        match self.config.projection {
            ProximalScope::LastTensor => {
                if let Some(x) = params.last_mut() {
                    soft_threshold_mut(x, radius);
                }
            }
            ProximalScope::EveryTensor => {
                params.iter_mut().for_each(|x| soft_threshold_mut(x, radius));
            }
        }

        Ok(())
    }
}

use log::debug;
use serde::{Deserialize, Serialize};

use super::{previous, scale_of};
use crate::{
    Result,
    optimization::{GradientOracle, History, StepContext, proximal::soft_threshold_mut},
    tensor::{Tensor, check_pairs, zeros_like},
};

/// Hyperparameters of `HybridSgd`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSgdConfig {
    /// The step size.
    pub eta: f32,
    /// The weight of the new iterate against the previous one.
    pub gamma: f32,
}

impl Default for HybridSgdConfig {
    fn default() -> Self {
        Self {
            eta: 0.25,
            gamma: 0.95,
        }
    }
}

/// Proximal Hybrid-SGD: mixes a SARAH style recursive estimator with a fresh stochastic gradient
/// and averages the projected iterate with the previous one.
///
/// ```text
/// v₁ = g₁ / S
/// vₜ = β·(gₜ - gₜ₋₁ + vₜ₋₁) + (1 - β)·ĝₜ,   β = 1 - 1/√(S·(t + 1))
/// xₜ₊₁ = γ·prox(xₜ - η·vₜ, lr·η) + (1 - γ)·xₜ
/// ```
///
/// `ĝₜ` is a second gradient evaluation requested from the oracle at `xₜ`.
#[derive(Debug, Clone)]
pub struct HybridSgd {
    config: HybridSgdConfig,
    scale: f32,
    grads: History,
    directions: History,
    iterates: History,
    other: Vec<Tensor>,
}

impl HybridSgd {
    pub fn new(config: HybridSgdConfig, batch_size: usize) -> Self {
        Self {
            config,
            scale: scale_of(batch_size),
            grads: History::new("gradient"),
            directions: History::new("direction"),
            iterates: History::new("iterate"),
            other: Vec::new(),
        }
    }

    /// The weight of the recursive estimator at iteration `iter`.
    pub fn beta(&self, iter: usize) -> f32 {
        1. - 1. / (self.scale * (iter as f32 + 1.)).sqrt()
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
    /// * `oracle` - Evaluates the extra gradient, only called past the first step.
    pub fn step(
        &mut self,
        ctx: StepContext,
        params: &mut [Tensor],
        grads: &[Tensor],
        oracle: &mut dyn GradientOracle,
    ) -> Result<()> {
        let HybridSgdConfig { eta, gamma } = self.config;

        let directions = if ctx.is_first_step() {
            grads.iter().map(|g| g / self.scale).collect()
        } else {
            self.steady_directions(ctx, params, grads, oracle)?
        };

        for (layer, (x, v)) in params.iter_mut().zip(directions).enumerate() {
            let x_prev = match ctx.is_first_step() {
                true => x.clone(),
                false => previous(&self.iterates, ctx, layer, x)?.clone(),
            };

            x.scaled_add(-eta, &v);
            soft_threshold_mut(x, ctx.lr * eta);
            *x *= gamma;
            x.scaled_add(1. - gamma, &x_prev);

            self.grads.record(layer, grads[layer].clone());
            self.directions.record(layer, v);
            self.iterates.record(layer, x.clone());
        }

        Ok(())
    }

    fn steady_directions(
        &mut self,
        ctx: StepContext,
        params: &[Tensor],
        grads: &[Tensor],
        oracle: &mut dyn GradientOracle,
    ) -> Result<Vec<Tensor>> {
        // the iterates must be there before anything is evaluated
        for (layer, x) in params.iter().enumerate() {
            previous(&self.iterates, ctx, layer, x)?;
        }

        if self.other.len() != grads.len() {
            self.other = zeros_like(grads);
        }

        let loss = oracle.gradient(params, &mut self.other)?;
        check_pairs(params, &self.other)?;
        debug!(iter = ctx.iter(), loss = loss; "extra gradient evaluated");

        let beta = self.beta(ctx.iter());

        grads
            .iter()
            .zip(&self.other)
            .enumerate()
            .map(|(layer, (g, other))| {
                let g_prev = previous(&self.grads, ctx, layer, g)?;
                let v_prev = previous(&self.directions, ctx, layer, g)?;

                let mut v = (g - g_prev + v_prev) * beta;
                v.scaled_add(1. - beta, other);
                Ok(v)
            })
            .collect()
    }
}

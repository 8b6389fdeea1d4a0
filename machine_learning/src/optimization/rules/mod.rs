mod hybrid_sgd;
mod pstorm;
mod spider_boost;
mod vanilla_sgd;

use std::{fmt, num::NonZeroUsize, str::FromStr};

use serde::{Deserialize, Serialize};

pub use hybrid_sgd::{HybridSgd, HybridSgdConfig};
pub use pstorm::{PStorm, PStormConfig};
pub use spider_boost::{SpiderBoost, SpiderBoostConfig};
pub use vanilla_sgd::{ProximalScope, VanillaSgd, VanillaSgdConfig};

use super::{GradientOracle, History, StepContext};
use crate::{
    Result,
    tensor::{Tensor, check_pairs, check_shape},
};

/// The proximal update rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "Vanilla-SGD", alias = "vsgd")]
    VanillaSgd,
    #[serde(rename = "SpiderBoost", alias = "sb")]
    SpiderBoost,
    #[serde(rename = "PStorm", alias = "ps")]
    PStorm,
    #[serde(rename = "Hybrid-SGD", alias = "hsgd")]
    HybridSgd,
}

impl Algorithm {
    /// Every algorithm, in the order the experiments run them.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::SpiderBoost,
        Algorithm::PStorm,
        Algorithm::HybridSgd,
        Algorithm::VanillaSgd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::VanillaSgd => "Vanilla-SGD",
            Self::SpiderBoost => "SpiderBoost",
            Self::PStorm => "PStorm",
            Self::HybridSgd => "Hybrid-SGD",
        }
    }

    /// The short tag used in report columns and file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::VanillaSgd => "vsgd",
            Self::SpiderBoost => "sb",
            Self::PStorm => "ps",
            Self::HybridSgd => "hsgd",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s) || a.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown algorithm {s:?}"))
    }
}

/// The hyperparameters of every update rule, only the chosen algorithm's are used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateRuleConfig {
    pub vanilla_sgd: VanillaSgdConfig,
    pub spider_boost: SpiderBoostConfig,
    pub pstorm: PStormConfig,
    pub hybrid_sgd: HybridSgdConfig,
}

/// A proximal optimizer: the chosen algorithm together with its state.
#[derive(Debug, Clone)]
pub enum ProxOptimizer {
    VanillaSgd(VanillaSgd),
    SpiderBoost(SpiderBoost),
    PStorm(PStorm),
    HybridSgd(HybridSgd),
}

impl ProxOptimizer {
    /// Creates a new `ProxOptimizer` with empty history.
    ///
    /// # Arguments
    /// * `algorithm` - The update rule.
    /// * `config` - The hyperparameters.
    /// * `batch_size` - The amount of examples behind every gradient.
    pub fn new(algorithm: Algorithm, config: &UpdateRuleConfig, batch_size: NonZeroUsize) -> Self {
        let batch_size = batch_size.get();

        match algorithm {
            Algorithm::VanillaSgd => Self::VanillaSgd(VanillaSgd::new(config.vanilla_sgd)),
            Algorithm::SpiderBoost => {
                Self::SpiderBoost(SpiderBoost::new(config.spider_boost, batch_size))
            }
            Algorithm::PStorm => Self::PStorm(PStorm::new(config.pstorm, batch_size)),
            Algorithm::HybridSgd => Self::HybridSgd(HybridSgd::new(config.hybrid_sgd, batch_size)),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::VanillaSgd(_) => Algorithm::VanillaSgd,
            Self::SpiderBoost(_) => Algorithm::SpiderBoost,
            Self::PStorm(_) => Algorithm::PStorm,
            Self::HybridSgd(_) => Algorithm::HybridSgd,
        }
    }

    /// Updates the parameters in place and records the step in the history.
    ///
    /// # Arguments
    /// * `ctx` - The step context.
    /// * `params` - The parameters.
    /// * `grads` - The gradient at `params` over the current batch.
    /// * `oracle` - Evaluates extra gradients over the current batch, if the algorithm needs them.
    ///
    /// # Returns
    /// A `ShapeMismatch` if `grads` doesn't match `params` or the history, or a `MissingHistory`
    /// if a step past the first finds no history. The parameters are left untouched on error.
    pub fn step(
        &mut self,
        ctx: StepContext,
        params: &mut [Tensor],
        grads: &[Tensor],
        oracle: &mut dyn GradientOracle,
    ) -> Result<()> {
        check_pairs(params, grads)?;

        match self {
            Self::VanillaSgd(rule) => rule.step(ctx, params, grads),
            Self::SpiderBoost(rule) => rule.step(ctx, params, grads),
            Self::PStorm(rule) => rule.step(ctx, params, grads),
            Self::HybridSgd(rule) => rule.step(ctx, params, grads, oracle),
        }
    }
}

/// `S`, the square root of the batch size.
fn scale_of(batch_size: usize) -> f32 {
    (batch_size as f32).sqrt()
}

/// Reads the latest recorded value for `layer`, checking it matches `like`.
fn previous<'h>(
    history: &'h History,
    ctx: StepContext,
    layer: usize,
    like: &Tensor,
) -> Result<&'h Tensor> {
    let prev = history.last(layer, ctx.iter())?;
    check_shape("history", layer, prev, like.shape())?;
    Ok(prev)
}

mod compensation;
mod context;
mod history;
mod oracle;
pub mod proximal;
mod quantization;
mod rules;
mod violation;

pub use compensation::{ErrorFeedback, compensate_and_quantize};
pub use context::StepContext;
pub use history::History;
pub use oracle::{BatchOracle, GradientOracle};
pub use quantization::{MAX_BITS, Quantizer};
pub use rules::{
    Algorithm, HybridSgd, HybridSgdConfig, PStorm, PStormConfig, ProxOptimizer, ProximalScope,
    SpiderBoost, SpiderBoostConfig, UpdateRuleConfig, VanillaSgd, VanillaSgdConfig,
};
pub use violation::stationarity_violation;

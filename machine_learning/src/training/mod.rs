mod config;
mod evaluate;
mod prox_trainer;
mod report;

pub use config::TrainerConfig;
pub use evaluate::{Evaluation, evaluate};
pub use prox_trainer::{ProxTrainer, StepOutcome};
pub use report::{EpochReport, RunReport, lr_label};

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Settings of a `ProxTrainer` run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// The amount of passes over the training set.
    pub epochs: usize,
    pub batch_size: NonZeroUsize,
    pub test_batch_size: NonZeroUsize,
    /// Log the training progress every this many steps.
    pub log_interval: NonZeroUsize,
    /// The learning rate, also the radius of the L1 feasible region.
    pub lr: f32,
    /// Stop each epoch early after this many steps.
    pub max_steps_per_epoch: Option<usize>,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        const BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(64).unwrap();
        const TEST_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(1000).unwrap();
        const LOG_INTERVAL: NonZeroUsize = NonZeroUsize::new(200).unwrap();

        Self {
            epochs: 76,
            batch_size: BATCH_SIZE,
            test_batch_size: TEST_BATCH_SIZE,
            log_interval: LOG_INTERVAL,
            lr: 1e-4,
            max_steps_per_epoch: None,
            seed: 20200930,
        }
    }
}

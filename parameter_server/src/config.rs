use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Settings of a simulated distributed quantized SGD run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizedSgdConfig {
    /// The amount of workers, each holding the classes `c` with `c % workers == id`.
    pub workers: usize,
    /// The amount of examples each worker draws per step.
    pub batch_size: NonZeroUsize,
    /// The bit width of every gradient sent, in both directions.
    pub bits: u32,
    pub lr: f32,
    /// Scales the decaying step size `alpha0·lr/√iter`.
    pub alpha0: f32,
    pub epochs: usize,
    /// Steps per epoch, `train_len / (workers·batch_size)` when unset.
    pub steps_per_epoch: Option<usize>,
    /// Drop every residual when an epoch starts, so its first round sends uncompensated values.
    pub reset_residuals_each_epoch: bool,
    pub test_batch_size: NonZeroUsize,
    pub log_interval: NonZeroUsize,
    pub seed: u64,
}

impl Default for QuantizedSgdConfig {
    fn default() -> Self {
        const BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(10).unwrap();
        const TEST_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(1000).unwrap();
        const LOG_INTERVAL: NonZeroUsize = NonZeroUsize::new(10).unwrap();

        Self {
            workers: 10,
            batch_size: BATCH_SIZE,
            bits: 4,
            lr: 1e-2,
            alpha0: 1.,
            epochs: 10,
            steps_per_epoch: None,
            reset_residuals_each_epoch: true,
            test_batch_size: TEST_BATCH_SIZE,
            log_interval: LOG_INTERVAL,
            seed: 20200930,
        }
    }
}

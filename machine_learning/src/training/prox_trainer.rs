use log::{debug, info, warn};
use ndarray::ArrayView2;
use rand::Rng;

use super::{EpochReport, RunReport, TrainerConfig, evaluate};
use crate::{
    Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::{
        Algorithm, BatchOracle, ProxOptimizer, StepContext, UpdateRuleConfig,
        stationarity_violation,
    },
    tensor::{Tensor, zeros_like},
};

/// What came out of a single training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub iter: usize,
    /// The mean loss over the batch, before the update.
    pub loss: f32,
    /// The stationarity violation after the update.
    pub violation: f32,
}

/// Trains a single model with a proximal optimizer, evaluating it after every epoch.
pub struct ProxTrainer<M, L, R>
where
    M: Model,
    L: LossFn,
    R: Rng,
{
    model: M,
    loss_fn: L,
    optimizer: ProxOptimizer,
    config: TrainerConfig,
    ctx: StepContext,
    grads: Vec<Tensor>,
    rng: R,
}

impl<M, L, R> ProxTrainer<M, L, R>
where
    M: Model,
    L: LossFn,
    R: Rng,
{
    /// Creates a new `ProxTrainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `loss_fn` - The loss function.
    /// * `algorithm` - The update rule.
    /// * `rules` - The hyperparameters of the update rules.
    /// * `config` - The run settings.
    /// * `rng` - A random number generator, used for shuffling.
    pub fn new(
        model: M,
        loss_fn: L,
        algorithm: Algorithm,
        rules: &UpdateRuleConfig,
        config: TrainerConfig,
        rng: R,
    ) -> Self {
        Self {
            optimizer: ProxOptimizer::new(algorithm, rules, config.batch_size),
            ctx: StepContext::first(config.lr),
            grads: Vec::new(),
            model,
            loss_fn,
            config,
            rng,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.optimizer.algorithm()
    }

    /// The context the next step will run with.
    pub fn context(&self) -> StepContext {
        self.ctx
    }

    /// Performs a single step over a batch: computes the gradient, updates the parameters and
    /// measures the violation at the new parameters.
    ///
    /// # Returns
    /// The step's outcome, or the error that aborted it wrapped with the iteration and algorithm.
    pub fn step(
        &mut self,
        params: &mut [Tensor],
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<StepOutcome> {
        let ctx = self.ctx;
        let algorithm = self.optimizer.algorithm().name();

        let outcome = self
            .try_step(ctx, params, x, y)
            .map_err(|e| e.at_step(ctx.iter(), algorithm))?;

        debug!(iter = outcome.iter, loss = outcome.loss, violation = outcome.violation; "step");
        self.ctx = ctx.next();
        Ok(outcome)
    }

    fn try_step(
        &mut self,
        ctx: StepContext,
        params: &mut [Tensor],
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<StepOutcome> {
        if self.grads.len() != params.len() {
            self.grads = zeros_like(params);
        }

        let loss = self
            .model
            .backprop(params, &mut self.grads, &self.loss_fn, x, y)?;

        let mut oracle = BatchOracle::new(&mut self.model, &self.loss_fn, x, y);
        self.optimizer
            .step(ctx, params, &self.grads, &mut oracle)?;

        let violation = stationarity_violation(ctx.lr, params, &self.grads)?;

        Ok(StepOutcome {
            iter: ctx.iter(),
            loss,
            violation,
        })
    }

    /// Runs one pass over a shuffled training set.
    ///
    /// # Arguments
    /// * `epoch` - The epoch number, for logging.
    /// * `params` - The parameters, updated in place.
    /// * `train` - The training set.
    ///
    /// # Returns
    /// The violation of the last step, if any step ran.
    pub fn train_epoch(
        &mut self,
        epoch: usize,
        params: &mut [Tensor],
        train: &mut Dataset,
    ) -> Result<Option<f32>> {
        train.shuffle(&mut self.rng);

        let batch_size = self.config.batch_size;
        let steps = train.len().div_ceil(batch_size.get());
        let limit = self.config.max_steps_per_epoch.unwrap_or(usize::MAX);
        let mut violation = None;

        for (i, (x, y)) in train.batches(batch_size).enumerate().take(limit) {
            let outcome = self.step(params, x, y)?;
            violation = Some(outcome.violation);

            if i % self.config.log_interval.get() == 0 {
                info!(
                    "train epoch {epoch}: violation={:.6} [{}/{} ({:.0}%)] loss={:.6}",
                    outcome.violation,
                    i * batch_size.get(),
                    train.len(),
                    100. * i as f32 / steps as f32,
                    outcome.loss
                );
            }
        }

        Ok(violation)
    }

    /// Trains for the configured amount of epochs, evaluating on `test` after each one.
    ///
    /// # Arguments
    /// * `params` - The initial parameters, trained in place.
    /// * `train` - The training set.
    /// * `test` - The test set.
    pub fn run(
        &mut self,
        params: &mut [Tensor],
        train: &mut Dataset,
        test: &Dataset,
    ) -> Result<RunReport> {
        let algorithm = self.optimizer.algorithm();
        let mut report = RunReport::new(self.config.lr, algorithm.name(), algorithm.tag());

        info!(
            "training with {algorithm}: lr={} epochs={} batch_size={}",
            self.config.lr, self.config.epochs, self.config.batch_size
        );

        for epoch in 0..self.config.epochs {
            let violation = self.train_epoch(epoch, params, train)?;
            if violation.is_none() {
                warn!("epoch {epoch} ran no steps");
            }

            let evaluation = evaluate(
                &mut self.model,
                params,
                &self.loss_fn,
                test,
                self.config.test_batch_size,
            )?;

            info!(
                "test set: epoch={epoch} average loss={:.4} accuracy={:.0}%",
                evaluation.loss, evaluation.accuracy
            );

            report.push(EpochReport {
                epoch,
                test_loss: evaluation.loss,
                accuracy: evaluation.accuracy,
                violation,
            });
        }

        Ok(report)
    }
}

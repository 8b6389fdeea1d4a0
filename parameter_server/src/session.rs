use std::num::NonZeroUsize;

use log::{debug, info, warn};
use machine_learning::{
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::{Quantizer, StepContext},
    tensor::Tensor,
    training::{EpochReport, RunReport, evaluate},
};
use rand::Rng;

use crate::{CentralServer, QuantizedSgdConfig, Result, ServerErr, Worker};

/// A simulated distributed run of error compensated, quantized SGD.
///
/// Every step each worker, in order, sends its quantized gradient to the central server, which
/// then updates the global parameters. Everything runs in the calling thread.
pub struct QuantizedSgd<M, L, R>
where
    M: Model,
    L: LossFn,
    R: Rng,
{
    model: M,
    loss_fn: L,
    workers: Vec<Worker>,
    server: CentralServer,
    quantizer: Quantizer,
    config: QuantizedSgdConfig,
    ctx: StepContext,
    rng: R,
}

impl<M, L, R> QuantizedSgd<M, L, R>
where
    M: Model,
    L: LossFn,
    R: Rng,
{
    /// Creates a new `QuantizedSgd`, splitting the training set among the workers by class.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `loss_fn` - The loss function.
    /// * `params` - The global parameters, used to size every buffer.
    /// * `train` - The training set.
    /// * `config` - The run settings.
    /// * `rng` - A random number generator.
    pub fn new(
        model: M,
        loss_fn: L,
        params: &[Tensor],
        train: &Dataset,
        config: QuantizedSgdConfig,
        rng: R,
    ) -> Result<Self> {
        let workers = NonZeroUsize::new(config.workers).ok_or(ServerErr::NoWorkers)?;
        let shards = train.shard_by_class(workers)?;
        Self::from_shards(model, loss_fn, params, shards, config, rng)
    }

    /// Creates a new `QuantizedSgd` with one worker per given shard. The shard count overrides
    /// `config.workers`.
    pub fn from_shards(
        model: M,
        loss_fn: L,
        params: &[Tensor],
        shards: Vec<Dataset>,
        mut config: QuantizedSgdConfig,
        rng: R,
    ) -> Result<Self> {
        let workers = NonZeroUsize::new(shards.len()).ok_or(ServerErr::NoWorkers)?;
        config.workers = workers.get();

        let batch_size = config.batch_size.get();
        let workers_list = shards
            .into_iter()
            .enumerate()
            .map(|(id, shard)| Worker::new(id, shard, params, batch_size))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            quantizer: Quantizer::new(config.bits)?,
            server: CentralServer::new(workers, params),
            ctx: StepContext::first(config.lr),
            workers: workers_list,
            model,
            loss_fn,
            config,
            rng,
        })
    }

    /// The context the next step will run with.
    pub fn context(&self) -> StepContext {
        self.ctx
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn server(&self) -> &CentralServer {
        &self.server
    }

    /// The configured amount of steps per epoch, or one pass over the training set worth of
    /// batches when unset.
    pub fn steps_per_epoch(&self) -> usize {
        self.config.steps_per_epoch.unwrap_or_else(|| {
            let total: usize = self.workers.iter().map(Worker::shard_len).sum();
            total / (self.workers.len() * self.config.batch_size.get())
        })
    }

    /// Drops the residuals of every worker and of the server.
    pub fn reset_residuals(&mut self) {
        self.workers.iter_mut().for_each(Worker::reset_residuals);
        self.server.reset_residuals();
    }

    /// Runs one global step: a full round of worker gradients followed by the server update.
    ///
    /// # Returns
    /// The mean loss of the workers' batches.
    pub fn step(&mut self, params: &mut [Tensor]) -> Result<f32> {
        let ctx = self.ctx;
        let iter = ctx.iter();
        let batch_size = self.config.batch_size.get();
        let mut total_loss = 0.;

        for worker in self.workers.iter_mut() {
            let id = worker.id();
            let (grads, loss) = worker
                .compute(
                    &mut self.model,
                    &self.loss_fn,
                    params,
                    batch_size,
                    &self.quantizer,
                    &mut self.rng,
                )
                .map_err(|source| ServerErr::Round {
                    iter,
                    worker: id,
                    source,
                })?;

            self.server.receive(&grads)?;
            total_loss += loss;
        }

        self.server
            .apply(ctx, self.config.alpha0, params, &self.quantizer, &mut self.rng)
            .map_err(|e| match e {
                ServerErr::Ml(e) => ServerErr::Ml(e.at_step(iter, "Quantized-SGD")),
                e => e,
            })?;

        let loss = total_loss / self.workers.len() as f32;
        debug!(iter = iter, loss = loss; "global step");

        self.ctx = ctx.next();
        Ok(loss)
    }

    /// Prepares the session for a new epoch, dropping every residual when configured to, so the
    /// epoch's first round goes out uncompensated.
    pub fn start_epoch(&mut self, epoch: usize) {
        if self.config.reset_residuals_each_epoch {
            debug!(epoch = epoch; "residuals reset");
            self.reset_residuals();
        }
    }

    /// Runs the steps of one epoch.
    ///
    /// # Arguments
    /// * `epoch` - The epoch number, for logging.
    /// * `params` - The global parameters, updated in place.
    pub fn train_epoch(&mut self, epoch: usize, params: &mut [Tensor]) -> Result<()> {
        self.start_epoch(epoch);

        let steps = self.steps_per_epoch();
        let per_step = self.workers.len() * self.config.batch_size.get();
        let total = steps * per_step;

        if steps == 0 {
            warn!("epoch {epoch} has no steps, the shards are smaller than a round of batches");
        }

        for k in 0..steps {
            let loss = self.step(params)?;

            if k % self.config.log_interval.get() == 0 {
                info!(
                    "train epoch {epoch}: [{}/{total} ({:.0}%)] loss={loss:.6}",
                    k * per_step,
                    100. * k as f32 / steps as f32
                );
            }
        }

        Ok(())
    }

    /// Trains for the configured amount of epochs, evaluating on `test` after each one.
    ///
    /// # Arguments
    /// * `params` - The initial global parameters, trained in place.
    /// * `test` - The test set.
    pub fn run(&mut self, params: &mut [Tensor], test: &Dataset) -> Result<RunReport> {
        let bits = self.quantizer.bits();
        let mut report = RunReport::new(
            self.config.lr,
            format!("{bits}-bit EC-SGD"),
            format!("q{bits}"),
        );

        info!(
            "training with {} workers: bits={bits} lr={} epochs={}",
            self.workers.len(),
            self.config.lr,
            self.config.epochs
        );

        for epoch in 0..self.config.epochs {
            self.train_epoch(epoch, params)?;

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
                violation: None,
            });
        }

        Ok(report)
    }
}

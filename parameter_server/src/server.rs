use std::num::NonZeroUsize;

use machine_learning::{
    optimization::{ErrorFeedback, Quantizer, StepContext},
    tensor::{Tensor, check_pairs, zeros_like},
};
use rand::Rng;

use crate::{Result, ServerErr};

/// The central server: accumulates the workers' quantized gradients and applies their average,
/// quantized once more with its own residuals, to the global parameters.
#[derive(Debug, Clone)]
pub struct CentralServer {
    workers: NonZeroUsize,
    accumulators: Vec<Tensor>,
    reports: usize,
    feedback: ErrorFeedback,
}

impl CentralServer {
    /// Creates a new `CentralServer`.
    ///
    /// # Arguments
    /// * `workers` - The amount of gradients expected per round.
    /// * `params` - The global parameters, used to size the accumulators.
    pub fn new(workers: NonZeroUsize, params: &[Tensor]) -> Self {
        Self {
            workers,
            accumulators: zeros_like(params),
            reports: 0,
            feedback: ErrorFeedback::new(params.len()),
        }
    }

    /// The amount of gradients received this round.
    pub fn reports(&self) -> usize {
        self.reports
    }

    pub fn residual(&self, layer: usize) -> Option<&Tensor> {
        self.feedback.residual(layer)
    }

    /// Drops every stored residual.
    pub fn reset_residuals(&mut self) {
        self.feedback.clear();
    }

    /// Adds a worker's gradient to the round.
    pub fn receive(&mut self, grads: &[Tensor]) -> Result<()> {
        check_pairs(&self.accumulators, grads)?;

        for (acc, g) in self.accumulators.iter_mut().zip(grads) {
            *acc += g;
        }

        self.reports += 1;
        Ok(())
    }

    /// Closes the round: averages the accumulated gradients, compresses the average with error
    /// compensation and steps the parameters by `alpha0·lr/√iter` along it. No projection is
    /// applied.
    ///
    /// # Arguments
    /// * `ctx` - The step context.
    /// * `alpha0` - The step size scale.
    /// * `params` - The global parameters.
    /// * `quantizer` - The quantizer for the broadcast gradient.
    /// * `rng` - The source of randomness for the rounding.
    ///
    /// # Returns
    /// An `IncompleteRound` error if not every worker reported.
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        ctx: StepContext,
        alpha0: f32,
        params: &mut [Tensor],
        quantizer: &Quantizer,
        rng: &mut R,
    ) -> Result<()> {
        let expected = self.workers.get();
        if self.reports != expected {
            return Err(ServerErr::IncompleteRound {
                got: self.reports,
                expected,
            });
        }

        check_pairs(params, &self.accumulators)?;
        let step = alpha0 * ctx.lr / (ctx.iter() as f32).sqrt();

        let quantized = self
            .accumulators
            .iter()
            .enumerate()
            .map(|(layer, acc)| {
                let mean = acc / expected as f32;
                self.feedback.compensate(layer, &mean, quantizer, rng)
            })
            .collect::<machine_learning::Result<Vec<_>>>()?;

        for ((x, acc), q) in params.iter_mut().zip(&mut self.accumulators).zip(quantized) {
            x.scaled_add(-step, &q);
            acc.fill(0.);
        }

        self.reports = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn single(v: &[f32]) -> Vec<Tensor> {
        vec![arr1(v).into_dyn()]
    }

    #[test]
    fn applies_the_average() {
        let mut rng = StdRng::seed_from_u64(0);
        let quantizer = Quantizer::new(1).unwrap();
        let mut params = single(&[1.0, 1.0]);
        let mut server = CentralServer::new(NonZeroUsize::new(2).unwrap(), &params);

        server.receive(&single(&[1.0, 3.0])).unwrap();
        server.receive(&single(&[3.0, 1.0])).unwrap();

        // the average is constant, nothing to quantize
        let ctx = StepContext::new(NonZeroUsize::new(4).unwrap(), 0.5);
        server.apply(ctx, 1.0, &mut params, &quantizer, &mut rng).unwrap();

        assert_eq!(params[0], arr1(&[0.5, 0.5]).into_dyn());
        assert_eq!(server.reports(), 0);
    }

    #[test]
    fn accumulators_start_over_every_round() {
        let mut rng = StdRng::seed_from_u64(0);
        let quantizer = Quantizer::new(4).unwrap();
        let mut params = single(&[0.0, 0.0]);
        let mut server = CentralServer::new(NonZeroUsize::MIN, &params);
        let ctx = StepContext::first(1.0);

        server.receive(&single(&[2.0, 2.0])).unwrap();
        server.apply(ctx, 1.0, &mut params, &quantizer, &mut rng).unwrap();
        server.receive(&single(&[2.0, 2.0])).unwrap();
        server.apply(ctx, 1.0, &mut params, &quantizer, &mut rng).unwrap();

        assert_eq!(params[0], arr1(&[-4.0, -4.0]).into_dyn());
    }

    #[test]
    fn failed_rounds_leave_everything_in_place() {
        let mut rng = StdRng::seed_from_u64(0);
        let quantizer = Quantizer::new(4).unwrap();
        let mut params = single(&[1.0, 1.0]);
        let mut server = CentralServer::new(NonZeroUsize::MIN, &params);
        let ctx = StepContext::first(1.0);

        server.receive(&single(&[2.0, 2.0])).unwrap();

        let mut wrong = single(&[1.0]);
        assert!(server.apply(ctx, 1.0, &mut wrong, &quantizer, &mut rng).is_err());
        assert_eq!(wrong, single(&[1.0]));
        assert_eq!(server.reports(), 1);
        assert!(server.residual(0).is_none());

        // the same round still goes through once the parameters fit
        server.apply(ctx, 1.0, &mut params, &quantizer, &mut rng).unwrap();
        assert_eq!(params[0], arr1(&[-1.0, -1.0]).into_dyn());
        assert!(server.residual(0).is_some());
    }

    #[test]
    fn rounds_need_every_worker() {
        let mut rng = StdRng::seed_from_u64(0);
        let quantizer = Quantizer::new(4).unwrap();
        let mut params = single(&[0.0]);
        let mut server = CentralServer::new(NonZeroUsize::new(3).unwrap(), &params);

        server.receive(&single(&[1.0])).unwrap();
        let result = server.apply(StepContext::first(0.1), 1.0, &mut params, &quantizer, &mut rng);

        assert!(matches!(
            result,
            Err(ServerErr::IncompleteRound {
                got: 1,
                expected: 3
            })
        ));
        assert!(server.receive(&single(&[1.0, 2.0])).is_err());
    }
}

use machine_learning::{
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::{ErrorFeedback, Quantizer},
    tensor::{Tensor, zeros_like},
};
use rand::Rng;

use crate::{Result, ServerErr};

/// A simulated worker: owns a shard of the training set and the residuals of what it sent.
#[derive(Debug, Clone)]
pub struct Worker {
    id: usize,
    shard: Dataset,
    feedback: ErrorFeedback,
    grads: Vec<Tensor>,
}

impl Worker {
    /// Creates a new `Worker`.
    ///
    /// # Arguments
    /// * `id` - The worker's position in the round.
    /// * `shard` - The examples this worker trains on.
    /// * `params` - The model's parameters, used to size the gradient buffers.
    /// * `batch_size` - The amount of examples drawn per step.
    ///
    /// # Returns
    /// A `ShardTooSmall` error if the shard can't fit a single batch.
    pub fn new(id: usize, shard: Dataset, params: &[Tensor], batch_size: usize) -> Result<Self> {
        if shard.len() < batch_size {
            return Err(ServerErr::ShardTooSmall {
                worker: id,
                len: shard.len(),
                batch_size,
            });
        }

        Ok(Self {
            id,
            shard,
            feedback: ErrorFeedback::new(params.len()),
            grads: zeros_like(params),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shard_len(&self) -> usize {
        self.shard.len()
    }

    /// What the last message for `layer` left out, if anything was sent since the last reset.
    pub fn residual(&self, layer: usize) -> Option<&Tensor> {
        self.feedback.residual(layer)
    }

    /// Drops every stored residual.
    pub fn reset_residuals(&mut self) {
        self.feedback.clear();
    }

    /// Computes the gradient over a random contiguous batch of the shard and compresses every
    /// tensor of it with error compensation.
    ///
    /// # Arguments
    /// * `model` - The model.
    /// * `loss_fn` - The loss function.
    /// * `params` - The current global parameters.
    /// * `batch_size` - The amount of examples to draw.
    /// * `quantizer` - The quantizer for the outgoing gradients.
    /// * `rng` - The source of randomness for both sampling and rounding.
    ///
    /// # Returns
    /// The quantized gradient, one tensor per parameter, and the batch loss.
    pub fn compute<M, L, R>(
        &mut self,
        model: &mut M,
        loss_fn: &L,
        params: &[Tensor],
        batch_size: usize,
        quantizer: &Quantizer,
        rng: &mut R,
    ) -> machine_learning::Result<(Vec<Tensor>, f32)>
    where
        M: Model,
        L: LossFn,
        R: Rng + ?Sized,
    {
        let (x, y) = self.shard.sample_batch(batch_size, rng)?;
        let loss = model.backprop(params, &mut self.grads, loss_fn, x, y)?;

        let quantized = self
            .grads
            .iter()
            .enumerate()
            .map(|(layer, g)| self.feedback.compensate(layer, g, quantizer, rng))
            .collect::<machine_learning::Result<Vec<_>>>()?;

        Ok((quantized, loss))
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::{Sequential, layers::Layer, loss::Mse};
    use ndarray::{arr1, arr2};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn shard(rows: usize) -> Dataset {
        let x = ndarray::Array2::from_shape_fn((rows, 1), |(i, _)| i as f32);
        let y = x.mapv(|v| 2. * v + 1.);
        Dataset::new(x, y).unwrap()
    }

    fn params() -> Vec<Tensor> {
        vec![arr2(&[[0.0]]).into_dyn(), arr1(&[0.0]).into_dyn()]
    }

    #[test]
    fn small_shards_are_rejected() {
        let result = Worker::new(3, shard(4), &params(), 5);
        assert!(matches!(
            result,
            Err(ServerErr::ShardTooSmall {
                worker: 3,
                len: 4,
                batch_size: 5
            })
        ));
    }

    #[test]
    fn sends_one_quantized_tensor_per_parameter() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut model = Sequential::new([Layer::dense((1, 1), None)]);
        let mut worker = Worker::new(0, shard(4), &params(), 4).unwrap();
        let quantizer = Quantizer::new(8).unwrap();

        let (grads, loss) = worker
            .compute(&mut model, &Mse::new(), &params(), 4, &quantizer, &mut rng)
            .unwrap();

        // predictions are all zero against targets 1, 3, 5, 7
        assert_eq!(loss, 21.0);
        assert_eq!(grads.len(), 2);
        assert_eq!(grads[0].shape(), &[1, 1]);

        // single valued tensors have no range to quantize over
        assert_eq!(grads[0], arr2(&[[-17.0]]).into_dyn());
        assert_eq!(grads[1], arr1(&[-8.0]).into_dyn());
    }
}

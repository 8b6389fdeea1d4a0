use rand::Rng;

use super::Quantizer;
use crate::{
    MlErr, Result,
    tensor::{Tensor, check_shape},
};

/// Quantizes `raw` after adding the residual left over by the previous quantization, if any.
///
/// # Arguments
/// * `raw` - The values to send.
/// * `residual` - The error carried from the previous call.
/// * `quantizer` - The quantizer to use.
/// * `rng` - The source of randomness for the rounding.
///
/// # Returns
/// The quantized values and the new residual, `(raw + residual) - q`.
pub fn compensate_and_quantize<R: Rng + ?Sized>(
    raw: &Tensor,
    residual: Option<&Tensor>,
    quantizer: &Quantizer,
    rng: &mut R,
) -> (Tensor, Tensor) {
    let target = match residual {
        Some(residual) => raw + residual,
        None => raw.clone(),
    };

    let q = quantizer.quantize(&target, rng);
    let residual = target - &q;
    (q, residual)
}

/// Per tensor error feedback state. Every slot holds the quantization residual of the latest
/// message sent for that tensor, empty until the first one.
#[derive(Debug, Clone, Default)]
pub struct ErrorFeedback {
    residuals: Vec<Option<Tensor>>,
}

impl ErrorFeedback {
    /// Creates a new `ErrorFeedback` with `tensors` empty slots.
    pub fn new(tensors: usize) -> Self {
        Self {
            residuals: vec![None; tensors],
        }
    }

    /// Empties every slot, the next message is quantized without compensation.
    pub fn clear(&mut self) {
        self.residuals.iter_mut().for_each(|r| *r = None);
    }

    pub fn residual(&self, layer: usize) -> Option<&Tensor> {
        self.residuals.get(layer).and_then(Option::as_ref)
    }

    /// Compensates and quantizes the tensor at position `layer`, storing its new residual.
    ///
    /// # Returns
    /// The quantized tensor, or a `ShapeMismatch` if it doesn't match the stored residual.
    pub fn compensate<R: Rng + ?Sized>(
        &mut self,
        layer: usize,
        raw: &Tensor,
        quantizer: &Quantizer,
        rng: &mut R,
    ) -> Result<Tensor> {
        let len = self.residuals.len();
        let slot = self.residuals.get_mut(layer).ok_or(MlErr::SizeMismatch {
            what: "error feedback slots",
            got: layer + 1,
            expected: len,
        })?;

        if let Some(residual) = slot.as_ref() {
            check_shape("residual", layer, raw, residual.shape())?;
        }

        let (q, residual) = compensate_and_quantize(raw, slot.as_ref(), quantizer, rng);
        *slot = Some(residual);
        Ok(q)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::tensor::norm;

    #[test]
    fn residual_is_what_quantization_dropped() {
        let mut rng = StdRng::seed_from_u64(9);
        let quantizer = Quantizer::new(2).unwrap();
        let raw = arr1(&[0.1, 0.4, 0.9, -0.8]).into_dyn();
        let previous = arr1(&[0.05, -0.05, 0.0, 0.1]).into_dyn();

        let (q, residual) = compensate_and_quantize(&raw, Some(&previous), &quantizer, &mut rng);
        let target = &raw + &previous;

        for ((q, r), t) in q.iter().zip(&residual).zip(&target) {
            assert!((q + r - t).abs() < 1e-6);
        }
    }

    #[test]
    fn feedback_does_not_drift() {
        let mut rng = StdRng::seed_from_u64(17);
        let quantizer = Quantizer::new(2).unwrap();
        let mut feedback = ErrorFeedback::new(1);

        let mut raw_sum = Tensor::zeros(vec![6]);
        let mut sent_sum = Tensor::zeros(vec![6]);

        for step in 0..100 {
            let raw = Tensor::from_shape_fn(vec![6], |i| {
                ((step * 7 + i[0] * 3) % 11) as f32 / 10. - 0.4
            });
            let q = feedback.compensate(0, &raw, &quantizer, &mut rng).unwrap();

            raw_sum += &raw;
            sent_sum += &q;
        }

        // the gap between what was sent and what should've been sent is the last residual
        let residual = feedback.residual(0).unwrap();
        let gap = &raw_sum - &sent_sum;
        assert!(norm(&(&gap - residual)) < 1e-3);
        assert!(residual.iter().all(|r| r.abs() < 1.5));
    }

    #[test]
    fn clear_drops_every_residual() {
        let mut rng = StdRng::seed_from_u64(2);
        let quantizer = Quantizer::new(1).unwrap();
        let mut feedback = ErrorFeedback::new(2);

        let raw = arr1(&[0.2, 0.6, 1.0]).into_dyn();
        feedback.compensate(1, &raw, &quantizer, &mut rng).unwrap();
        assert!(feedback.residual(0).is_none());
        assert!(feedback.residual(1).is_some());

        feedback.clear();
        assert!(feedback.residual(1).is_none());
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let quantizer = Quantizer::new(4).unwrap();
        let mut feedback = ErrorFeedback::new(1);

        feedback
            .compensate(0, &arr1(&[1.0, 2.0]).into_dyn(), &quantizer, &mut rng)
            .unwrap();

        let result = feedback.compensate(0, &arr1(&[1.0]).into_dyn(), &quantizer, &mut rng);
        assert!(matches!(result, Err(MlErr::ShapeMismatch { layer: 0, .. })));
        assert!(feedback.compensate(3, &arr1(&[1.0]).into_dyn(), &quantizer, &mut rng).is_err());
    }
}

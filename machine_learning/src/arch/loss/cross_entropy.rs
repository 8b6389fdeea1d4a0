use ndarray::{Array2, ArrayView1, ArrayView2, Axis, Zip};

use super::LossFn;

/// Negative log likelihood over a log-softmax of the raw outputs.
///
/// The targets are expected to be one-hot encoded (or any probability distribution per row).
#[derive(Default, Clone, Copy, Debug)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

fn log_sum_exp(row: ArrayView1<f32>) -> f32 {
    let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    max + row.mapv(|v| (v - max).exp()).sum().ln()
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.nrows();
        if n == 0 {
            return 0.0;
        }

        let total: f32 = y_pred
            .outer_iter()
            .zip(y.outer_iter())
            .map(|(z, t)| {
                let lse = log_sum_exp(z);
                -Zip::from(&z).and(&t).fold(0.0, |acc, &z, &t| acc + t * (z - lse))
            })
            .sum();

        total / n as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.nrows().max(1) as f32;
        let mut d = y_pred.to_owned();

        for (mut row, t) in d.axis_iter_mut(Axis(0)).zip(y.outer_iter()) {
            let lse = log_sum_exp(row.view());
            Zip::from(&mut row)
                .and(&t)
                .for_each(|z, &t| *z = ((*z - lse).exp() - t) / n);
        }

        d
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;

    #[test]
    fn uniform_logits_cost_log_of_classes() {
        let y_pred = arr2(&[[0.0, 0.0, 0.0, 0.0]]);
        let y = arr2(&[[0.0, 1.0, 0.0, 0.0]]);

        let loss = CrossEntropy.loss(y_pred.view(), y.view());
        assert!((loss - 4f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn gradient_is_softmax_minus_target() {
        let y_pred = arr2(&[[1.0, 2.0], [0.5, 0.5]]);
        let y = arr2(&[[0.0, 1.0], [1.0, 0.0]]);

        let d = CrossEntropy.loss_prime(y_pred.view(), y.view());

        let p = 1.0 / (1.0 + 1f32.exp());
        assert!((d[[0, 0]] - p / 2.0).abs() < 1e-6);
        assert!((d[[0, 1]] - (1.0 - p - 1.0) / 2.0).abs() < 1e-6);
        assert!((d[[1, 0]] - (0.5 - 1.0) / 2.0).abs() < 1e-6);
        assert!((d.sum()).abs() < 1e-6);
    }

    #[test]
    fn large_logits_do_not_overflow() {
        let y_pred = arr2(&[[1000.0, 0.0]]);
        let y = arr2(&[[1.0, 0.0]]);

        let loss = CrossEntropy.loss(y_pred.view(), y.view());
        assert!(loss.is_finite());
        assert!(loss < 1e-6);
    }
}

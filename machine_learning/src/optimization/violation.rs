use super::proximal::shrink;
use crate::{
    Result,
    tensor::{Tensor, check_pairs, norm},
};

/// Measures how far the parameters are from a stationary point of the L1 constrained problem,
/// summed over every tensor.
///
/// For each tensor this is `‖prox(x - g, lr) - x‖`, the length of a proximal gradient step, or
/// `‖g‖` when `lr` is zero and there's no constraint left.
///
/// # Arguments
/// * `lr` - The learning rate, also the L1 radius.
/// * `params` - The current parameters.
/// * `grads` - The gradient at (or close to) `params`.
pub fn stationarity_violation(lr: f32, params: &[Tensor], grads: &[Tensor]) -> Result<f32> {
    check_pairs(params, grads)?;

    let violation = params
        .iter()
        .zip(grads)
        .map(|(x, g)| {
            if lr == 0. {
                return norm(g);
            }

            x.iter()
                .zip(g)
                .map(|(&x, &g)| {
                    let d = shrink(x - g, lr) - x;
                    d * d
                })
                .sum::<f32>()
                .sqrt()
        })
        .sum();

    Ok(violation)
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn zero_rate_is_the_gradient_norm() {
        let params = vec![arr1(&[1.0, 1.0]).into_dyn(), arr1(&[7.0]).into_dyn()];
        let grads = vec![arr1(&[3.0, 4.0]).into_dyn(), arr1(&[-2.0]).into_dyn()];

        assert_eq!(stationarity_violation(0.0, &params, &grads).unwrap(), 7.0);
    }

    #[test]
    fn stationary_points_have_no_violation() {
        // zero parameters with a gradient inside the radius can't move
        let params = vec![arr1(&[0.0, 0.0]).into_dyn()];
        let grads = vec![arr1(&[0.05, -0.08]).into_dyn()];

        assert_eq!(stationarity_violation(0.1, &params, &grads).unwrap(), 0.0);
    }

    #[test]
    fn measures_the_proximal_step() {
        let params = vec![arr1(&[1.0]).into_dyn()];
        let grads = vec![arr1(&[0.5]).into_dyn()];

        // prox(0.5, 0.1) - 1 = -0.6
        let violation = stationarity_violation(0.1, &params, &grads).unwrap();
        assert!((violation - 0.6).abs() < 1e-6);
    }

    #[test]
    fn mismatched_gradients_are_rejected() {
        let params = vec![arr1(&[1.0]).into_dyn()];
        assert!(stationarity_violation(0.1, &params, &[]).is_err());
    }
}

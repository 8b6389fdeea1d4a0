use ndarray::ArrayD;

use crate::{MlErr, Result};

/// A parameter or gradient tensor. Its identity is its position in the model's parameter list.
pub type Tensor = ArrayD<f32>;

/// Creates a zeroed tensor for each of the given ones, keeping their shapes.
pub fn zeros_like(tensors: &[Tensor]) -> Vec<Tensor> {
    tensors.iter().map(|t| Tensor::zeros(t.raw_dim())).collect()
}

/// The euclidean (Frobenius) norm of a tensor.
pub fn norm(t: &Tensor) -> f32 {
    t.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// The euclidean norm of a list of tensors seen as a single flat vector.
pub fn global_norm(tensors: &[Tensor]) -> f32 {
    tensors
        .iter()
        .flat_map(|t| t.iter())
        .map(|v| v * v)
        .sum::<f32>()
        .sqrt()
}

/// Checks that `got` has the exact same shape as `expected`.
///
/// # Arguments
/// * `what` - What `got` is, used for the error message.
/// * `layer` - The position of the tensor in the parameter list.
/// * `got` - The tensor being checked.
/// * `expected` - The shape it should have.
pub fn check_shape(what: &'static str, layer: usize, got: &Tensor, expected: &[usize]) -> Result<()> {
    if got.shape() != expected {
        return Err(MlErr::ShapeMismatch {
            what,
            layer,
            got: got.shape().to_vec(),
            expected: expected.to_vec(),
        });
    }

    Ok(())
}

/// Checks that a list of gradients matches a list of parameters, tensor by tensor.
///
/// # Returns
/// A `SizeMismatch` if the lists have different lengths or a `ShapeMismatch` naming the first
/// layer whose shapes differ.
pub fn check_pairs(params: &[Tensor], grads: &[Tensor]) -> Result<()> {
    if params.len() != grads.len() {
        return Err(MlErr::SizeMismatch {
            what: "gradient list",
            got: grads.len(),
            expected: params.len(),
        });
    }

    for (layer, (p, g)) in params.iter().zip(grads).enumerate() {
        check_shape("gradient", layer, g, p.shape())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;

    #[test]
    fn norms() {
        let a = arr1(&[3.0, 4.0]).into_dyn();
        let b = arr2(&[[12.0]]).into_dyn();

        assert_eq!(norm(&a), 5.0);
        assert_eq!(global_norm(&[a, b]), 13.0);
    }

    #[test]
    fn mismatched_pairs_are_rejected() {
        let params = vec![arr1(&[1.0, 2.0]).into_dyn(), arr1(&[1.0]).into_dyn()];
        let grads = vec![arr1(&[1.0, 2.0]).into_dyn(), arr1(&[1.0, 2.0]).into_dyn()];

        match check_pairs(&params, &grads) {
            Err(MlErr::ShapeMismatch { layer, .. }) => assert_eq!(layer, 1),
            other => panic!("expected a shape mismatch, got {other:?}"),
        }

        assert!(check_pairs(&params, &grads[..1]).is_err());
        assert!(check_pairs(&params, &zeros_like(&params)).is_ok());
    }
}

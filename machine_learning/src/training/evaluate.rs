use std::num::NonZeroUsize;

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::{Dataset, argmax},
    tensor::Tensor,
};

/// How a model does on a held out dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// The loss averaged over every example.
    pub loss: f32,
    /// The percentage of examples whose largest output matches their class.
    pub accuracy: f32,
}

/// Evaluates a model over a whole dataset.
///
/// # Arguments
/// * `model` - The model.
/// * `params` - The model's parameters.
/// * `loss_fn` - The loss function.
/// * `dataset` - The examples to evaluate on.
/// * `batch_size` - How many examples go through the model at once.
pub fn evaluate<M: Model, L: LossFn>(
    model: &mut M,
    params: &[Tensor],
    loss_fn: &L,
    dataset: &Dataset,
    batch_size: NonZeroUsize,
) -> Result<Evaluation> {
    if dataset.is_empty() {
        return Err(MlErr::EmptyDataset);
    }

    let mut total_loss = 0.;
    let mut correct = 0;

    for (x, y) in dataset.batches(batch_size) {
        let y_pred = model.forward(params, x)?;
        total_loss += loss_fn.loss(y_pred.view(), y) * x.nrows() as f32;

        correct += y_pred
            .outer_iter()
            .zip(y.outer_iter())
            .filter(|(p, t)| argmax(p.iter().copied()) == argmax(t.iter().copied()))
            .count();
    }

    let n = dataset.len() as f32;
    Ok(Evaluation {
        loss: total_loss / n,
        accuracy: 100. * correct as f32 / n,
    })
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;
    use crate::arch::{Sequential, layers::Layer, loss::Mse};

    #[test]
    fn counts_matching_classes() {
        // identity model: the prediction is the input itself
        let mut model = Sequential::new([Layer::dense((2, 2), None)]);
        let params = vec![
            arr2(&[[1.0, 0.0], [0.0, 1.0]]).into_dyn(),
            arr1(&[0.0, 0.0]).into_dyn(),
        ];

        let x = arr2(&[[0.9, 0.1], [0.2, 0.8], [0.7, 0.3]]);
        let dataset = Dataset::from_labels(x, &[0, 1, 1], 2).unwrap();
        let batch = NonZeroUsize::new(2).unwrap();

        let evaluation = evaluate(&mut model, &params, &Mse::new(), &dataset, batch).unwrap();
        assert!((evaluation.accuracy - 200. / 3.).abs() < 1e-4);

        // squared errors per row: 0.02, 0.08, 0.98, each averaged over two outputs
        assert!((evaluation.loss - 1.08 / 6.).abs() < 1e-5);
    }

    #[test]
    fn empty_datasets_are_rejected() {
        let mut model = Sequential::new([Layer::dense((1, 1), None)]);
        let params = vec![arr2(&[[1.0]]).into_dyn(), arr1(&[0.0]).into_dyn()];
        let dataset = Dataset::from_labels(ndarray::Array2::zeros((0, 1)), &[], 1).unwrap();

        let result = evaluate(&mut model, &params, &Mse::new(), &dataset, NonZeroUsize::MIN);
        assert!(matches!(result, Err(MlErr::EmptyDataset)));
    }
}

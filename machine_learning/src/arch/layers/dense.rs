use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, Ix1, Ix2};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::{
    Result,
    arch::activations::ActFn,
    tensor::{Tensor, check_shape},
};

/// A fully connected layer computing `act(x · w + b)`.
///
/// Its parameters are two tensors: the weights, shaped `[in, out]`, and the biases, shaped
/// `[out]`.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output sizes.
    /// * `act_fn` - An optional activation applied to the output.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            act_fn,
            x: zeros.clone(),
            z: zeros,
        }
    }

    /// Returns the input and output sizes of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Returns the shapes of the weights and the biases.
    pub fn shapes(&self) -> [Vec<usize>; 2] {
        let (i, o) = self.dim;
        [vec![i, o], vec![o]]
    }

    /// Samples the initial weights and biases from `U(-1/√in, 1/√in)`.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<[Tensor; 2]> {
        let (i, o) = self.dim;
        let bound = 1. / (i.max(1) as f32).sqrt();

        let dist = Uniform::new_inclusive(-bound, bound)?;

        let w = Tensor::random_using(vec![i, o], &dist, rng);
        let b = Tensor::random_using(vec![o], &dist, rng);
        Ok([w, b])
    }

    /// Computes the output of this layer for a batch of rows.
    ///
    /// # Arguments
    /// * `layer` - The position of this layer's weights in the parameter list.
    /// * `w` - The weights.
    /// * `b` - The biases.
    /// * `x` - The input batch.
    pub fn forward(
        &mut self,
        layer: usize,
        w: &Tensor,
        b: &Tensor,
        x: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        let (w, b) = self.view_params(layer, w, b)?;

        let mut z = x.dot(&w);
        z += &b;

        self.x = x.to_owned();

        let Some(ref act_fn) = self.act_fn else {
            self.z = z.clone();
            return Ok(z);
        };

        let a = z.mapv(|z| act_fn.f(z));
        self.z = z;
        Ok(a)
    }

    /// Backpropagates the delta of this layer's output, writing the gradients of its weights
    /// and biases.
    ///
    /// # Arguments
    /// * `layer` - The position of this layer's weights in the parameter list.
    /// * `w` - The weights used on the last forward pass.
    /// * `dw` - The buffer for the weights' gradient.
    /// * `db` - The buffer for the biases' gradient.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        layer: usize,
        w: &Tensor,
        dw: &mut Tensor,
        db: &mut Tensor,
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(layer, dw, db)?;
        dw.assign(&self.x.t().dot(&d));
        db.assign(&d.sum_axis(Axis(0)));

        let w = w.view().into_dimensionality::<Ix2>()?;
        Ok(d.dot(&w.t()))
    }

    /// Gives a view of the gradient tensors as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        layer: usize,
        dw: &'a mut Tensor,
        db: &'a mut Tensor,
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let [w_shape, b_shape] = self.shapes();
        check_shape("weights gradient", layer, dw, &w_shape)?;
        check_shape("biases gradient", layer + 1, db, &b_shape)?;

        let dw = dw.view_mut().into_dimensionality::<Ix2>()?;
        let db = db.view_mut().into_dimensionality::<Ix1>()?;
        Ok((dw, db))
    }

    /// Gives a view of the parameter tensors as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        layer: usize,
        w: &'a Tensor,
        b: &'a Tensor,
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        let [w_shape, b_shape] = self.shapes();
        check_shape("weights", layer, w, &w_shape)?;
        check_shape("biases", layer + 1, b, &b_shape)?;

        let w = w.view().into_dimensionality::<Ix2>()?;
        let b = b.view().into_dimensionality::<Ix1>()?;
        Ok((w, b))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::MlErr;

    #[test]
    fn forward_without_activation_is_affine() {
        let mut dense = Dense::new((2, 1), None);
        let w = arr2(&[[2.0], [3.0]]).into_dyn();
        let b = arr1(&[1.0]).into_dyn();
        let x = arr2(&[[1.0, 1.0], [0.0, 2.0]]);

        let y = dense.forward(0, &w, &b, x.view()).unwrap();
        assert_eq!(y, arr2(&[[6.0], [7.0]]));
    }

    #[test]
    fn backward_writes_both_gradients() {
        let mut dense = Dense::new((2, 1), None);
        let w = arr2(&[[2.0], [3.0]]).into_dyn();
        let b = arr1(&[1.0]).into_dyn();
        let x = arr2(&[[1.0, 1.0], [0.0, 2.0]]);
        dense.forward(0, &w, &b, x.view()).unwrap();

        let mut dw = Tensor::zeros(vec![2, 1]);
        let mut db = Tensor::zeros(vec![1]);
        let d = arr2(&[[1.0], [1.0]]);
        let dx = dense.backward(0, &w, &mut dw, &mut db, d).unwrap();

        assert_eq!(dw, arr2(&[[1.0], [3.0]]).into_dyn());
        assert_eq!(db, arr1(&[2.0]).into_dyn());
        assert_eq!(dx, arr2(&[[2.0, 3.0], [2.0, 3.0]]));
    }

    #[test]
    fn transposed_weights_are_rejected() {
        let mut dense = Dense::new((2, 3), None);
        let w = Tensor::zeros(vec![3, 2]);
        let b = Tensor::zeros(vec![3]);
        let x = Array2::zeros((1, 2));

        match dense.forward(4, &w, &b, x.view()) {
            Err(MlErr::ShapeMismatch { layer, .. }) => assert_eq!(layer, 4),
            other => panic!("expected a shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn init_respects_fan_in_bound() {
        let dense = Dense::new((16, 4), Some(ActFn::relu()));
        let mut rng = StdRng::seed_from_u64(7);
        let [w, b] = dense.init_params(&mut rng).unwrap();

        assert_eq!(w.shape(), [16, 4]);
        assert_eq!(b.shape(), [4]);
        assert!(w.iter().chain(b.iter()).all(|v| v.abs() <= 0.25));
    }
}

use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis, concatenate, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory dataset: one row of features and one row of (one-hot) targets per example.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The features, one row per example.
    /// * `y` - The targets, one row per example.
    ///
    /// # Returns
    /// A `SizeMismatch` if `x` and `y` don't have the same amount of rows.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset targets",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y })
    }

    /// Creates a new `Dataset` from a flat buffer where each row holds `x_size` features followed
    /// by `y_size` targets.
    ///
    /// # Arguments
    /// * `data` - The raw rows.
    /// * `x_size` - The amount of features per row.
    /// * `y_size` - The amount of targets per row.
    pub fn from_rows(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row = x_size + y_size;
        if row == 0 || data.len() % row != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: data.len(),
                expected: row,
            });
        }

        let full = Array2::from_shape_vec((data.len() / row, row), data)?;
        let (x, y) = full.view().split_at(Axis(1), x_size);
        Self::new(x.to_owned(), y.to_owned())
    }

    /// Creates a new `Dataset` one-hot encoding the given class labels.
    ///
    /// # Arguments
    /// * `x` - The features, one row per example.
    /// * `labels` - The class of every example.
    /// * `classes` - The total amount of classes.
    pub fn from_labels(x: Array2<f32>, labels: &[u8], classes: usize) -> Result<Self> {
        let mut y = Array2::zeros((labels.len(), classes));

        for (i, &label) in labels.iter().enumerate() {
            let label = label as usize;
            if label >= classes {
                return Err(MlErr::SizeMismatch {
                    what: "class label",
                    got: label,
                    expected: classes,
                });
            }

            y[[i, label]] = 1.;
        }

        Self::new(x, y)
    }

    /// Returns the amount of examples.
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the amount of features per example.
    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    /// Returns the amount of targets per example, the amount of classes for one-hot targets.
    pub fn y_size(&self) -> usize {
        self.y.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// Returns the class of a row, the position of its largest target.
    pub fn class_of(&self, row: usize) -> usize {
        argmax(self.y.row(row).iter().copied())
    }

    /// Shuffles the examples in place.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.x = self.x.select(Axis(0), &order);
        self.y = self.y.select(Axis(0), &order);
    }

    /// Iterates the dataset in consecutive batches, the last one may be shorter.
    ///
    /// # Arguments
    /// * `batch_size` - The amount of rows per batch.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let size = batch_size.get();

        self.x
            .axis_chunks_iter(Axis(0), size)
            .zip(self.y.axis_chunks_iter(Axis(0), size))
    }

    /// Takes `size` consecutive rows starting at `start`.
    ///
    /// # Returns
    /// A `BatchOutOfRange` if the rows don't fit in the dataset.
    pub fn slice(
        &self,
        start: usize,
        size: usize,
    ) -> Result<(ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let len = self.len();
        if start.checked_add(size).is_none_or(|end| end > len) {
            return Err(MlErr::BatchOutOfRange { start, size, len });
        }

        let x = self.x.slice(s![start..start + size, ..]);
        let y = self.y.slice(s![start..start + size, ..]);
        Ok((x, y))
    }

    /// Draws a batch of `size` consecutive rows from a random offset in `[0, len - size]`.
    ///
    /// # Arguments
    /// * `size` - The amount of rows.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// A `BatchOutOfRange` if the dataset has less than `size` rows.
    pub fn sample_batch<R: Rng + ?Sized>(
        &self,
        size: usize,
        rng: &mut R,
    ) -> Result<(ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let len = self.len();
        if size > len {
            return Err(MlErr::BatchOutOfRange { start: 0, size, len });
        }

        let start = rng.random_range(0..=len - size);
        self.slice(start, size)
    }

    /// Splits the dataset into `parts` disjoint shards by class: shard `i` holds every example
    /// whose class `c` satisfies `c % parts == i`, in their original order.
    ///
    /// With as many parts as classes every shard holds exactly one class.
    pub fn shard_by_class(&self, parts: NonZeroUsize) -> Result<Vec<Dataset>> {
        let parts = parts.get();
        let mut rows = vec![Vec::new(); parts];

        for row in 0..self.len() {
            rows[self.class_of(row) % parts].push(row);
        }

        rows.into_iter()
            .map(|rows| Self::new(self.x.select(Axis(0), &rows), self.y.select(Axis(0), &rows)))
            .collect()
    }

    /// Appends the examples of another dataset.
    pub fn concat(&self, other: &Dataset) -> Result<Dataset> {
        let x = concatenate(Axis(0), &[self.x.view(), other.x.view()])?;
        let y = concatenate(Axis(0), &[self.y.view(), other.y.view()])?;
        Self::new(x, y)
    }
}

/// The position of the largest value, the first one on ties.
pub(crate) fn argmax<I: IntoIterator<Item = f32>>(values: I) -> usize {
    values
        .into_iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

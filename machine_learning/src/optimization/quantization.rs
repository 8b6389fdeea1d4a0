use rand::Rng;

use crate::{MlErr, Result, tensor::Tensor};

/// The largest supported bit width, past it `f32` can't tell neighbouring levels apart.
pub const MAX_BITS: u32 = 24;

/// Stochastic `b`-bit quantizer.
///
/// Every call maps the input onto `2^b` evenly spaced levels spanning `[min(x), max(x)]`, rounding
/// each value up to the next level with probability equal to its relative distance from the level
/// below, so the output is unbiased in expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    bits: u32,
}

impl Quantizer {
    /// Creates a new `Quantizer`.
    ///
    /// # Arguments
    /// * `bits` - The amount of bits per value, between 1 and `MAX_BITS`.
    pub fn new(bits: u32) -> Result<Self> {
        if !(1..=MAX_BITS).contains(&bits) {
            return Err(MlErr::InvalidBits { bits });
        }

        Ok(Self { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The amount of levels in the grid.
    pub fn levels(&self) -> usize {
        1 << self.bits
    }

    /// Builds the grid for the range `[min, max]`, with `min` and `max` as its exact end points.
    pub fn grid(&self, min: f32, max: f32) -> Vec<f32> {
        let last = self.levels() - 1;
        let step = (max as f64 - min as f64) / last as f64;

        let mut grid: Vec<f32> = (0..=last)
            .map(|i| (min as f64 + i as f64 * step) as f32)
            .collect();
        grid[last] = max;
        grid
    }

    /// Quantizes a tensor.
    ///
    /// Values are left untouched when the tensor is constant (there's no range to span). Rounding
    /// only happens below the second to last level: values in the top bucket `[grid[len-2], max]`
    /// are kept as is, so a 1-bit quantizer never changes anything.
    ///
    /// # Arguments
    /// * `x` - The values to quantize.
    /// * `rng` - The source of randomness for the rounding.
    pub fn quantize<R: Rng + ?Sized>(&self, x: &Tensor, rng: &mut R) -> Tensor {
        let (min, max) = x
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        // also catches empty tensors and non finite ranges
        if !(min < max) || !(max - min).is_finite() {
            return x.clone();
        }

        let grid = self.grid(min, max);
        x.mapv(|v| round(&grid, v, rng))
    }
}

fn round<R: Rng + ?Sized>(grid: &[f32], v: f32, rng: &mut R) -> f32 {
    let idx = grid.partition_point(|&g| g <= v);
    if idx == 0 || idx >= grid.len() - 1 {
        return v;
    }

    let (lo, hi) = (grid[idx - 1], grid[idx]);
    let prob = (v - lo) / (hi - lo);

    if rng.random::<f32>() < prob { hi } else { lo }
}

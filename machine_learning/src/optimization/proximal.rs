use crate::tensor::Tensor;

/// The proximal map of `r·‖x‖₁` for a single value: shrinks `v` towards zero by `r`, zeroing it
/// when `|v| <= r`.
#[inline]
pub fn shrink(v: f32, r: f32) -> f32 {
    if v > r {
        v - r
    } else if v < -r {
        v + r
    } else {
        0.
    }
}

/// Applies the soft threshold `sign(x)·max(|x| - r, 0)` elementwise, returning a new tensor.
///
/// # Arguments
/// * `x` - The values to project.
/// * `r` - The radius, expected to be non negative.
pub fn soft_threshold(x: &Tensor, r: f32) -> Tensor {
    x.mapv(|v| shrink(v, r))
}

/// Applies the soft threshold in place.
pub fn soft_threshold_mut(x: &mut Tensor, r: f32) {
    x.mapv_inplace(|v| shrink(v, r));
}

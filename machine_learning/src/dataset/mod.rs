mod dataset;
pub mod idx;

pub(crate) use dataset::argmax;
pub use dataset::Dataset;

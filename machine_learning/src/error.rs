use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;
use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        what: &'static str,
        layer: usize,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    MissingHistory {
        what: &'static str,
        layer: usize,
        iter: usize,
    },
    InvalidBits {
        bits: u32,
    },
    BatchOutOfRange {
        start: usize,
        size: usize,
        len: usize,
    },
    EmptyDataset,
    InvalidIdx {
        what: &'static str,
        detail: String,
    },
    Shape(ShapeError),
    Distribution(String),
    Io(io::Error),
    Step {
        iter: usize,
        algorithm: &'static str,
        source: Box<MlErr>,
    },
}

impl MlErr {
    /// Wraps this error with the step it happened on.
    ///
    /// # Arguments
    /// * `iter` - The global iteration counter at the time of the failure.
    /// * `algorithm` - The name of the algorithm that was running.
    pub fn at_step(self, iter: usize, algorithm: &'static str) -> Self {
        Self::Step {
            iter,
            algorithm,
            source: Box::new(self),
        }
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::ShapeMismatch {
                what,
                layer,
                got,
                expected,
            } => write!(
                f,
                "There's a shape mismatch in the {what} of layer {layer}, got {got:?} and expected {expected:?}"
            ),
            MlErr::MissingHistory { what, layer, iter } => write!(
                f,
                "No previous {what} was recorded for layer {layer} before iteration {iter}"
            ),
            MlErr::InvalidBits { bits } => {
                write!(f, "Cannot quantize with {bits} bits, expected 1 to 24")
            }
            MlErr::BatchOutOfRange { start, size, len } => write!(
                f,
                "A batch of {size} rows starting at {start} doesn't fit in {len} rows"
            ),
            MlErr::EmptyDataset => f.write_str("The dataset has no rows"),
            MlErr::InvalidIdx { what, detail } => write!(f, "Invalid IDX {what}: {detail}"),
            MlErr::Shape(e) => write!(f, "shape error: {e}"),
            MlErr::Distribution(e) => write!(f, "invalid distribution: {e}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
            MlErr::Step {
                iter,
                algorithm,
                source,
            } => write!(f, "{algorithm} failed at iteration {iter}: {source}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Io(e) => Some(e),
            MlErr::Step { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::Distribution(value.to_string())
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

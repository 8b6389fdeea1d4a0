use std::{error::Error, fmt};

use machine_learning::MlErr;

/// The parameter server module's result type.
pub type Result<T> = std::result::Result<T, ServerErr>;

/// Failures of a simulated distributed run.
#[derive(Debug)]
pub enum ServerErr {
    Ml(MlErr),
    NoWorkers,
    ShardTooSmall {
        worker: usize,
        len: usize,
        batch_size: usize,
    },
    IncompleteRound {
        got: usize,
        expected: usize,
    },
    Round {
        iter: usize,
        worker: usize,
        source: MlErr,
    },
}

impl fmt::Display for ServerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErr::Ml(e) => write!(f, "{e}"),
            ServerErr::NoWorkers => f.write_str("at least one worker is needed"),
            ServerErr::ShardTooSmall {
                worker,
                len,
                batch_size,
            } => write!(
                f,
                "worker {worker} holds {len} examples, can't draw batches of {batch_size}"
            ),
            ServerErr::IncompleteRound { got, expected } => write!(
                f,
                "round applied with {got} of {expected} worker gradients"
            ),
            ServerErr::Round {
                iter,
                worker,
                source,
            } => write!(f, "worker {worker} failed at iteration {iter}: {source}"),
        }
    }
}

impl Error for ServerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerErr::Ml(e) => Some(e),
            ServerErr::Round { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<MlErr> for ServerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// Opaque error raised by a caller-supplied collaborator.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// The crate's result type.
pub type Result<T> = std::result::Result<T, PbtErr>;

/// All errors that can occur while building or running a population.
#[derive(Debug)]
pub enum PbtErr {
    /// A required top-level configuration entry is absent.
    MissingKey(&'static str),
    /// A hyperparameter has no randomization scale.
    MissingScale { param: String },
    /// A randomization scale is not a finite, positive number.
    InvalidScale { param: String, scale: f64 },
    /// A trainable adapter requires a hyperparameter that is absent.
    MissingHyperparameter(String),
    /// Invalid configuration, caught before running.
    InvalidConfig(String),
    /// Ranking requested before any generation completed.
    NoGenerations,
    /// The trainable factory failed for a population member.
    Factory { worker_id: usize, source: BoxError },
    /// The train capability failed.
    Training {
        worker_id: usize,
        generation: usize,
        source: BoxError,
    },
    /// The evaluate capability failed.
    Evaluation {
        worker_id: usize,
        generation: usize,
        source: BoxError,
    },
    /// A trainable rejected a state snapshot.
    State { worker_id: usize, source: BoxError },
    /// A trainable rejected a new set of hyperparameters.
    Hyperparameters { worker_id: usize, source: BoxError },
    /// The training backend failed.
    Model(MlErr),
    Json(serde_json::Error),
    Io(io::Error),
}

impl fmt::Display for PbtErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey(key) => write!(f, "invalid config: missing required key '{key}'"),
            Self::MissingScale { param } => write!(
                f,
                "invalid config: no randomization scale for hyperparameter '{param}'"
            ),
            Self::InvalidScale { param, scale } => write!(
                f,
                "invalid config: randomization scale for '{param}' must be finite and positive, got {scale}"
            ),
            Self::MissingHyperparameter(param) => {
                write!(f, "invalid config: missing hyperparameter '{param}'")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::NoGenerations => write!(f, "no generation has been run yet"),
            Self::Factory { worker_id, source } => {
                write!(f, "worker {worker_id}: failed to build trainable: {source}")
            }
            Self::Training {
                worker_id,
                generation,
                source,
            } => write!(
                f,
                "worker {worker_id}: training failed at generation {generation}: {source}"
            ),
            Self::Evaluation {
                worker_id,
                generation,
                source,
            } => write!(
                f,
                "worker {worker_id}: evaluation failed at generation {generation}: {source}"
            ),
            Self::State { worker_id, source } => {
                write!(f, "worker {worker_id}: failed to restore state: {source}")
            }
            Self::Hyperparameters { worker_id, source } => write!(
                f,
                "worker {worker_id}: failed to set hyperparameters: {source}"
            ),
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for PbtErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Factory { source, .. }
            | Self::Training { source, .. }
            | Self::Evaluation { source, .. }
            | Self::State { source, .. }
            | Self::Hyperparameters { source, .. } => Some(source.as_ref()),
            Self::Model(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PbtErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MlErr> for PbtErr {
    fn from(value: MlErr) -> Self {
        Self::Model(value)
    }
}

impl From<io::Error> for PbtErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

use crate::context::ContextId;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt, time::Duration};
use thiserror::Error;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    BuildContext,
    Encrypt,
    Compute,
    Decrypt,
    Verify,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BuildContext => "build-context",
            Stage::Encrypt => "encrypt",
            Stage::Compute => "compute",
            Stage::Decrypt => "decrypt",
            Stage::Verify => "verify",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("vector of {requested} values exceeds the {max_slots} available slots")]
    CapacityExceeded { requested: usize, max_slots: usize },

    #[error("ciphertext belongs to context {actual}, expected context {expected}")]
    ContextMismatch {
        expected: ContextId,
        actual: ContextId,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("scheme backend failed: {source}")]
    Backend {
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    #[error("time budget of {budget:?} exhausted after {elapsed:?}, before the {next} stage")]
    DeadlineExceeded {
        budget: Duration,
        elapsed: Duration,
        next: Stage,
    },
}

impl BenchError {
    pub fn backend<E: Error + Send + Sync + 'static>(err: E) -> Self {
        BenchError::Backend {
            source: Box::new(err),
        }
    }
}

pub type BenchResult<T> = Result<T, BenchError>;

/// A failed benchmark run: the stage that failed and why.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: BenchError,
}

impl StageError {
    pub fn new(stage: Stage, source: BenchError) -> Self {
        Self { stage, source }
    }
}

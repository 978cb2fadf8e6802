//! Element-wise homomorphic add, subtract and multiply over handles.

use crate::{
    backend::SchemeBackend,
    codec::{CipherHandle, ensure_same_context},
    context::SchemeContext,
    errors::{BenchError, BenchResult},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Add,
    Subtract,
    Multiply,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Add,
        OperationKind::Subtract,
        OperationKind::Multiply,
    ];

    /// Plaintext counterpart of the homomorphic operation.
    pub fn apply_plain(self, a: f64, b: f64) -> f64 {
        match self {
            OperationKind::Add => a + b,
            OperationKind::Subtract => a - b,
            OperationKind::Multiply => a * b,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Add => "addition",
            OperationKind::Subtract => "subtraction",
            OperationKind::Multiply => "multiplication",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct OperationResult<C> {
    pub kind: OperationKind,
    pub handle: CipherHandle<C>,
}

/// Runs `kind` on two handles of `context`.
///
/// Both operands must belong to `context`. The result has the longer of the
/// two lengths; inputs are left untouched.
pub fn apply<B: SchemeBackend>(
    context: &SchemeContext<B>,
    kind: OperationKind,
    lhs: &CipherHandle<B::Ciphertext>,
    rhs: &CipherHandle<B::Ciphertext>,
) -> BenchResult<OperationResult<B::Ciphertext>> {
    ensure_same_context(context, lhs)?;
    ensure_same_context(context, rhs)?;

    let backend = context.backend();
    let (a, b) = (lhs.ciphertext(), rhs.ciphertext());
    let ciphertext = match kind {
        OperationKind::Add => backend.add(a, b),
        OperationKind::Subtract => backend.subtract(a, b),
        OperationKind::Multiply => backend.multiply(a, b),
    }
    .map_err(BenchError::backend)?;

    let level = backend.level(&ciphertext);
    debug!(%kind, level, "homomorphic operation done");
    let handle = CipherHandle::new(context.id(), lhs.len().max(rhs.len()), level, ciphertext);
    Ok(OperationResult { kind, handle })
}

pub fn add<B: SchemeBackend>(
    context: &SchemeContext<B>,
    lhs: &CipherHandle<B::Ciphertext>,
    rhs: &CipherHandle<B::Ciphertext>,
) -> BenchResult<CipherHandle<B::Ciphertext>> {
    apply(context, OperationKind::Add, lhs, rhs).map(|r| r.handle)
}

pub fn subtract<B: SchemeBackend>(
    context: &SchemeContext<B>,
    lhs: &CipherHandle<B::Ciphertext>,
    rhs: &CipherHandle<B::Ciphertext>,
) -> BenchResult<CipherHandle<B::Ciphertext>> {
    apply(context, OperationKind::Subtract, lhs, rhs).map(|r| r.handle)
}

/// Consumes one level: the backend relinearizes and rescales.
pub fn multiply<B: SchemeBackend>(
    context: &SchemeContext<B>,
    lhs: &CipherHandle<B::Ciphertext>,
    rhs: &CipherHandle<B::Ciphertext>,
) -> BenchResult<CipherHandle<B::Ciphertext>> {
    apply(context, OperationKind::Multiply, lhs, rhs).map(|r| r.handle)
}

//! Plaintext vectors to ciphertext handles and back.

use crate::{
    backend::SchemeBackend,
    context::{ContextId, SchemeContext},
    errors::{BenchError, BenchResult},
};
use tracing::trace;

/// Opaque ciphertext tagged with the context that produced it.
///
/// Handles are never mutated in place; every operation returns a new one.
#[derive(Debug, Clone)]
pub struct CipherHandle<C> {
    context_id: ContextId,
    len: usize,
    level: usize,
    ciphertext: C,
}

impl<C> CipherHandle<C> {
    pub(crate) fn new(context_id: ContextId, len: usize, level: usize, ciphertext: C) -> Self {
        Self {
            context_id,
            len,
            level,
            ciphertext,
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Logical vector length; decryption returns exactly this many values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backend modulus level at the time the handle was produced.
    pub fn level(&self) -> usize {
        self.level
    }

    pub(crate) fn ciphertext(&self) -> &C {
        &self.ciphertext
    }
}

/// Rejects empty payloads and payloads wider than `max_slots`.
pub fn check_capacity(len: usize, max_slots: usize) -> BenchResult<()> {
    if len == 0 {
        return Err(BenchError::InvalidInput(
            "cannot encrypt an empty vector".into(),
        ));
    }
    if len > max_slots {
        return Err(BenchError::CapacityExceeded {
            requested: len,
            max_slots,
        });
    }
    Ok(())
}

/// Rejects NaN and infinite plaintext values.
pub fn check_finite(values: &[f64]) -> BenchResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(BenchError::InvalidInput(format!(
            "non-finite value {} at index {index}",
            values[index]
        ))),
        None => Ok(()),
    }
}

/// Fails with [`BenchError::ContextMismatch`] unless `handle` came from `context`.
pub fn ensure_same_context<B: SchemeBackend>(
    context: &SchemeContext<B>,
    handle: &CipherHandle<B::Ciphertext>,
) -> BenchResult<()> {
    if handle.context_id() != context.id() {
        return Err(BenchError::ContextMismatch {
            expected: context.id(),
            actual: handle.context_id(),
        });
    }
    Ok(())
}

/// Encrypts `values`. Size and finiteness checks run before the backend is
/// touched.
pub fn encrypt<B: SchemeBackend>(
    context: &mut SchemeContext<B>,
    values: &[f64],
) -> BenchResult<CipherHandle<B::Ciphertext>> {
    check_capacity(values.len(), context.max_slots())?;
    check_finite(values)?;
    let id = context.id();
    let backend = context.backend_mut();
    let ciphertext = backend.encrypt(values).map_err(BenchError::backend)?;
    let level = backend.level(&ciphertext);
    trace!(len = values.len(), level, "encrypted vector");
    Ok(CipherHandle::new(id, values.len(), level, ciphertext))
}

/// Decrypts exactly `handle.len()` values.
pub fn decrypt<B: SchemeBackend>(
    context: &SchemeContext<B>,
    handle: &CipherHandle<B::Ciphertext>,
) -> BenchResult<Vec<f64>> {
    ensure_same_context(context, handle)?;
    let values = context
        .backend()
        .decrypt(handle.ciphertext(), handle.len())
        .map_err(BenchError::backend)?;
    if values.len() != handle.len() {
        return Err(BenchError::backend(std::io::Error::other(format!(
            "backend decrypted {} values for a handle of length {}",
            values.len(),
            handle.len()
        ))));
    }
    Ok(values)
}

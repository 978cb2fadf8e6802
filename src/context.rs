use crate::{
    backend::SchemeBackend,
    config::ContextConfig,
    errors::{BenchError, BenchResult},
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{debug, instrument};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`SchemeContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheme parameters plus the backend holding the key material.
///
/// Built once per run and never rebuilt per operation. Every ciphertext
/// handle records the id of the context that produced it.
pub struct SchemeContext<B: SchemeBackend> {
    id: ContextId,
    config: ContextConfig,
    backend: B,
}

impl<B: SchemeBackend> SchemeContext<B> {
    /// Validates `config` and builds the backend, generating all keys.
    ///
    /// Any backend rejection is reported as [`BenchError::Configuration`]
    /// carrying the backend's message.
    #[instrument(skip_all, fields(degree = config.ring_degree))]
    pub fn build(config: &ContextConfig) -> BenchResult<Self> {
        config.validate()?;
        let backend = B::build(config).map_err(|err| BenchError::Configuration(err.to_string()))?;
        let id = ContextId::next();
        debug!(%id, max_slots = config.max_slots(), "scheme context ready");
        Ok(Self {
            id,
            config: config.clone(),
            backend,
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Number of values one ciphertext can hold, `ring_degree / 2`.
    pub fn max_slots(&self) -> usize {
        self.config.max_slots()
    }

    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: SchemeBackend> fmt::Debug for SchemeContext<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeContext")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

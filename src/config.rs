//! Scheme parameters supplied once per benchmark run.

use crate::errors::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};

/// Smallest ring degree the benchmark accepts.
pub const MIN_RING_DEGREE: usize = 16;
/// Largest ring degree the benchmark accepts.
pub const MAX_RING_DEGREE: usize = 32768;

/// Which lattice-security bound the backend enforces on the modulus chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// Total modulus bits must stay within the HE-standard 128-bit table.
    #[default]
    Tc128,
    /// No bound. Only meant for toy parameters in tests.
    None,
}

/// Parameters of one scheme context.
///
/// `modulus_chain_bits` lists prime widths: every entry except the last is a
/// data prime consumed by rescaling, the last is the special key-switching
/// prime. The multiplicative depth is `modulus_chain_bits.len() - 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub ring_degree: usize,
    pub modulus_chain_bits: Vec<u32>,
    pub global_scale: f64,
    pub security_level: SecurityLevel,
    /// Generate rotation keys at construction time.
    pub galois_keys: bool,
    /// Seeds key generation and encryption randomness. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl ContextConfig {
    /// Config with `security_level = Tc128`, `galois_keys = true` and
    /// `seed = None`.
    pub fn new(ring_degree: usize, modulus_chain_bits: Vec<u32>, global_scale: f64) -> Self {
        Self {
            ring_degree,
            modulus_chain_bits,
            global_scale,
            security_level: SecurityLevel::Tc128,
            galois_keys: true,
            seed: None,
        }
    }

    pub fn builder() -> ContextConfigBuilder {
        ContextConfigBuilder::new()
    }

    /// Number of independent slots, `ring_degree / 2`.
    pub fn max_slots(&self) -> usize {
        self.ring_degree / 2
    }

    pub fn multiplicative_depth(&self) -> usize {
        self.modulus_chain_bits.len().saturating_sub(2)
    }

    /// Shape checks that need no backend: ring degree, chain presence and
    /// scale range.
    pub fn validate(&self) -> BenchResult<()> {
        let degree = self.ring_degree;
        if !degree.is_power_of_two() || !(MIN_RING_DEGREE..=MAX_RING_DEGREE).contains(&degree) {
            return Err(BenchError::Configuration(format!(
                "ring degree {degree} must be a power of two in \
                 {MIN_RING_DEGREE}..={MAX_RING_DEGREE}"
            )));
        }
        if self.modulus_chain_bits.is_empty() {
            return Err(BenchError::Configuration(
                "modulus chain must not be empty".into(),
            ));
        }
        if !(self.global_scale.is_finite() && self.global_scale > 1.0) {
            return Err(BenchError::Configuration(format!(
                "global scale must be finite and greater than 1, got {}",
                self.global_scale
            )));
        }
        Ok(())
    }
}

/// Builder for [`ContextConfig`]. Ring degree, modulus chain and scale are
/// required; the rest fall back to the [`ContextConfig::new`] values.
#[derive(Debug, Clone, Default)]
pub struct ContextConfigBuilder {
    ring_degree: Option<usize>,
    modulus_chain_bits: Option<Vec<u32>>,
    global_scale: Option<f64>,
    security_level: Option<SecurityLevel>,
    galois_keys: Option<bool>,
    seed: Option<u64>,
}

impl ContextConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ring_degree(mut self, degree: usize) -> Self {
        self.ring_degree = Some(degree);
        self
    }

    pub fn modulus_chain_bits(mut self, bits: impl Into<Vec<u32>>) -> Self {
        self.modulus_chain_bits = Some(bits.into());
        self
    }

    pub fn global_scale(mut self, scale: f64) -> Self {
        self.global_scale = Some(scale);
        self
    }

    /// Sets the scale to `2^bits`.
    pub fn scale_bits(self, bits: u32) -> Self {
        self.global_scale(2f64.powi(bits as i32))
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = Some(level);
        self
    }

    pub fn galois_keys(mut self, enabled: bool) -> Self {
        self.galois_keys = Some(enabled);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> BenchResult<ContextConfig> {
        let missing = |field: &str| BenchError::Configuration(format!("{field} is required"));
        let mut config = ContextConfig::new(
            self.ring_degree.ok_or_else(|| missing("ring_degree"))?,
            self.modulus_chain_bits
                .ok_or_else(|| missing("modulus_chain_bits"))?,
            self.global_scale.ok_or_else(|| missing("global_scale"))?,
        );
        if let Some(level) = self.security_level {
            config.security_level = level;
        }
        if let Some(enabled) = self.galois_keys {
            config.galois_keys = enabled;
        }
        config.seed = self.seed;
        Ok(config)
    }
}

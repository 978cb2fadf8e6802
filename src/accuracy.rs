//! Plaintext ground truth, error statistics and the pass/fail policy.

use crate::{
    errors::{BenchError, BenchResult},
    operations::OperationKind,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Multiplication MSE gate applied by [`AccuracyPolicy::default`].
pub const DEFAULT_MULTIPLY_THRESHOLD: f64 = 1e-5;

/// Per-operation MSE thresholds. `None` means the operation is measured but
/// not gated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyPolicy {
    pub add: Option<f64>,
    pub subtract: Option<f64>,
    pub multiply: Option<f64>,
}

impl Default for AccuracyPolicy {
    /// Gates multiplication at [`DEFAULT_MULTIPLY_THRESHOLD`] only.
    fn default() -> Self {
        Self {
            add: None,
            subtract: None,
            multiply: Some(DEFAULT_MULTIPLY_THRESHOLD),
        }
    }
}

impl AccuracyPolicy {
    /// Measures every operation without gating any of them.
    pub fn ungated() -> Self {
        Self {
            add: None,
            subtract: None,
            multiply: None,
        }
    }

    pub fn with_threshold(mut self, kind: OperationKind, threshold: Option<f64>) -> Self {
        match kind {
            OperationKind::Add => self.add = threshold,
            OperationKind::Subtract => self.subtract = threshold,
            OperationKind::Multiply => self.multiply = threshold,
        }
        self
    }

    pub fn threshold(&self, kind: OperationKind) -> Option<f64> {
        match kind {
            OperationKind::Add => self.add,
            OperationKind::Subtract => self.subtract,
            OperationKind::Multiply => self.multiply,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub kind: OperationKind,
    pub mean_squared_error: f64,
    pub max_abs_error: f64,
    pub threshold: Option<f64>,
    pub passed: bool,
}

/// Compares decrypted results against plaintext arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccuracyEvaluator {
    policy: AccuracyPolicy,
}

impl AccuracyEvaluator {
    pub fn new(policy: AccuracyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AccuracyPolicy {
        &self.policy
    }

    /// Scores `decrypted` against `kind` applied to `plain_a` and `plain_b`.
    ///
    /// A record passes when its MSE is finite and, if the operation is gated,
    /// strictly below the threshold.
    pub fn evaluate(
        &self,
        plain_a: &[f64],
        plain_b: &[f64],
        decrypted: &[f64],
        kind: OperationKind,
    ) -> BenchResult<AccuracyRecord> {
        if plain_a.len() != plain_b.len() {
            return Err(BenchError::InvalidInput(format!(
                "operand lengths differ: {} and {}",
                plain_a.len(),
                plain_b.len()
            )));
        }
        let expected: Vec<f64> = plain_a
            .iter()
            .zip(plain_b)
            .map(|(&a, &b)| kind.apply_plain(a, b))
            .collect();
        let mse = mean_squared_error(decrypted, &expected)?;

        let mut max_abs: f64 = 0.0;
        for (d, e) in decrypted.iter().zip(&expected) {
            let err = d - e;
            // f64::max would drop a NaN
            max_abs = if err.is_nan() || max_abs.is_nan() {
                f64::NAN
            } else {
                max_abs.max(err.abs())
            };
        }

        let threshold = self.policy.threshold(kind);
        let passed = mse.is_finite() && threshold.is_none_or(|limit| mse < limit);
        if !passed {
            warn!(%kind, mse, ?threshold, "accuracy gate failed");
        }

        Ok(AccuracyRecord {
            kind,
            mean_squared_error: mse,
            max_abs_error: max_abs,
            threshold,
            passed,
        })
    }
}

/// Mean of squared differences between `actual` and `expected`.
///
/// Fails with [`BenchError::InvalidInput`] on empty or unequal-length input.
pub fn mean_squared_error(actual: &[f64], expected: &[f64]) -> BenchResult<f64> {
    if actual.is_empty() {
        return Err(BenchError::InvalidInput(
            "cannot score an empty vector".into(),
        ));
    }
    if actual.len() != expected.len() {
        return Err(BenchError::InvalidInput(format!(
            "length mismatch: decrypted {}, expected {}",
            actual.len(),
            expected.len()
        )));
    }
    let sum_sq: f64 = actual
        .iter()
        .zip(expected)
        .map(|(a, e)| (a - e).powi(2))
        .sum();
    Ok(sum_sq / actual.len() as f64)
}

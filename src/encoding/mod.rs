//! Canonical-embedding slot encoder.
//!
//! A message polynomial `m(X)` in `R[X]/(X^N + 1)` with real coefficients is
//! identified with its evaluations at the primitive `2N`-th roots of unity.
//! Slot `j` holds `m(zeta^{5^j})` with `zeta = e^{i*pi/N}`; the evaluation at
//! `zeta^{-5^j}` is its complex conjugate, so `N/2` slots are independent.
//!
//! Writing `m(zeta^{2t+1}) = sum_n (m_n * zeta^n) * omega^{t*n}` with
//! `omega = zeta^2` turns evaluation at all odd powers into one length-`N`
//! DFT of the twisted coefficients, which `rustfft` computes.

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::{f64::consts::PI, fmt, sync::Arc};
use thiserror::Error;
use tracing::{instrument, trace};

pub type EncodingResult<T> = Result<T, EncodingError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Ring degree {degree} not supported")]
    InvalidRingDegree { degree: usize },

    #[error("Input too long: got {got}, max {max}")]
    InputTooLong { got: usize, max: usize },

    #[error("Coefficient {value} out of range")]
    CoefficientOutOfRange { value: f64 },
}

// Keeps encoded coefficients clear of i64 overflow after rounding.
const MAX_COEFFICIENT: f64 = (1u64 << 62) as f64;

/// Encodes real vectors into integer polynomial coefficients and back.
#[derive(Clone)]
pub struct SlotEncoder {
    degree: usize,
    /// `t_j` with `2 t_j + 1 = 5^j mod 2N`.
    slot_positions: Vec<usize>,
    /// `t'_j` with `2 t'_j + 1 = -5^j mod 2N`.
    conjugate_positions: Vec<usize>,
    /// `zeta^n` for `n < N`.
    twist: Vec<Complex64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for SlotEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotEncoder")
            .field("degree", &self.degree)
            .field("max_slots", &self.max_slots())
            .finish()
    }
}

impl SlotEncoder {
    pub fn new(degree: usize) -> EncodingResult<Self> {
        if degree < 4 || !degree.is_power_of_two() {
            return Err(EncodingError::InvalidRingDegree { degree });
        }
        let order = 2 * degree;
        let slots = degree / 2;

        let mut slot_positions = Vec::with_capacity(slots);
        let mut conjugate_positions = Vec::with_capacity(slots);
        let mut g = 1usize;
        for _ in 0..slots {
            slot_positions.push((g - 1) / 2);
            conjugate_positions.push((order - g - 1) / 2);
            g = g * 5 % order;
        }

        let twist = (0..degree)
            .map(|n| Complex64::from_polar(1.0, PI * n as f64 / degree as f64))
            .collect();

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(degree);
        let inverse = planner.plan_fft_inverse(degree);

        Ok(Self {
            degree,
            slot_positions,
            conjugate_positions,
            twist,
            forward,
            inverse,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Maximum number of values that can be encoded
    pub fn max_slots(&self) -> usize {
        self.degree / 2
    }

    /// Places `values` into the first slots (zero-padding the rest), scales
    /// by `scale` and rounds to integer coefficients.
    #[instrument(level = "trace", skip(self, values), fields(slots = values.len(), degree = self.degree))]
    pub fn encode(&self, values: &[f64], scale: f64) -> EncodingResult<Vec<i64>> {
        let max = self.max_slots();
        if values.len() > max {
            return Err(EncodingError::InputTooLong {
                got: values.len(),
                max,
            });
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(EncodingError::InvalidInput {
                message: format!("scale must be finite and positive, got {scale}"),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(EncodingError::InvalidInput {
                message: format!("non-finite slot value {bad}"),
            });
        }

        let mut spectrum = vec![Complex64::new(0.0, 0.0); self.degree];
        for (j, &v) in values.iter().enumerate() {
            let z = Complex64::new(v * scale, 0.0);
            spectrum[self.slot_positions[j]] = z;
            spectrum[self.conjugate_positions[j]] = z.conj();
        }

        // rustfft's inverse is unnormalized, so the inverse DFT is the forward
        // transform divided by N.
        self.forward.process(&mut spectrum);
        let norm = (self.degree as f64).recip();

        spectrum
            .iter()
            .zip(&self.twist)
            .map(|(y, zeta_n)| {
                let value = (*y * zeta_n.conj()).re * norm;
                if value.abs() >= MAX_COEFFICIENT {
                    return Err(EncodingError::CoefficientOutOfRange { value });
                }
                Ok(value.round() as i64)
            })
            .collect()
    }

    /// Evaluates the coefficients at the slot roots and returns the real
    /// parts of the first `len` slots divided by `scale`.
    #[instrument(level = "trace", skip(self, coeffs), fields(degree = self.degree))]
    pub fn decode(&self, coeffs: &[i64], scale: f64, len: usize) -> EncodingResult<Vec<f64>> {
        if coeffs.len() != self.degree {
            return Err(EncodingError::InvalidInput {
                message: format!(
                    "expected {} coefficients, got {}",
                    self.degree,
                    coeffs.len()
                ),
            });
        }
        let max = self.max_slots();
        if len > max {
            return Err(EncodingError::InputTooLong { got: len, max });
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(EncodingError::InvalidInput {
                message: format!("scale must be finite and positive, got {scale}"),
            });
        }

        let mut evals: Vec<Complex64> = coeffs
            .iter()
            .zip(&self.twist)
            .map(|(&c, zeta_n)| *zeta_n * c as f64)
            .collect();
        self.inverse.process(&mut evals);
        trace!(slots = len, "evaluated message at slot roots");

        Ok(self.slot_positions[..len]
            .iter()
            .map(|&t| evals[t].re / scale)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn negacyclic_product(a: &[i64], b: &[i64]) -> Vec<i64> {
        let n = a.len();
        let mut out = vec![0i64; n];
        for i in 0..n {
            for j in 0..n {
                let prod = a[i] * b[j];
                if i + j < n {
                    out[i + j] += prod;
                } else {
                    out[i + j - n] -= prod;
                }
            }
        }
        out
    }

    #[test]
    fn rejects_bad_degree() {
        assert!(matches!(
            SlotEncoder::new(12),
            Err(EncodingError::InvalidRingDegree { degree: 12 })
        ));
        assert!(SlotEncoder::new(2).is_err());
    }

    #[test]
    fn roundtrip_recovers_values() {
        let encoder = SlotEncoder::new(64).unwrap();
        let scale = 2f64.powi(30);
        let input = [1.234_567_89, -2.345_678_91, 3.456_789_12, 0.0, 0.5];
        let coeffs = encoder.encode(&input, scale).unwrap();
        let decoded = encoder.decode(&coeffs, scale, input.len()).unwrap();
        for (d, x) in decoded.iter().zip(&input) {
            assert_abs_diff_eq!(d, x, epsilon = 1e-6);
        }
    }

    #[test]
    fn full_slot_roundtrip() {
        let encoder = SlotEncoder::new(32).unwrap();
        let scale = 2f64.powi(25);
        let input: Vec<f64> = (0..16).map(|i| (i as f64 * 0.37).sin()).collect();
        let coeffs = encoder.encode(&input, scale).unwrap();
        let decoded = encoder.decode(&coeffs, scale, 16).unwrap();
        for (d, x) in decoded.iter().zip(&input) {
            assert_abs_diff_eq!(d, x, epsilon = 1e-5);
        }
    }

    #[test]
    fn ring_product_is_slotwise_product() {
        let encoder = SlotEncoder::new(16).unwrap();
        let scale = 2f64.powi(20);
        let a = [0.5, -1.25, 2.0, 0.75];
        let b = [3.0, 0.5, -0.25, 1.5];
        let pa = encoder.encode(&a, scale).unwrap();
        let pb = encoder.encode(&b, scale).unwrap();
        let product = negacyclic_product(&pa, &pb);
        let decoded = encoder.decode(&product, scale * scale, 4).unwrap();
        for ((d, x), y) in decoded.iter().zip(&a).zip(&b) {
            assert_abs_diff_eq!(*d, x * y, epsilon = 1e-4);
        }
    }

    #[test]
    fn rejects_oversized_or_non_finite_input() {
        let encoder = SlotEncoder::new(8).unwrap();
        assert!(matches!(
            encoder.encode(&[0.0; 5], 1024.0),
            Err(EncodingError::InputTooLong { got: 5, max: 4 })
        ));
        assert!(matches!(
            encoder.encode(&[f64::NAN], 1024.0),
            Err(EncodingError::InvalidInput { .. })
        ));
        assert!(matches!(
            encoder.encode(&[1e30], 2f64.powi(40)),
            Err(EncodingError::CoefficientOutOfRange { .. })
        ));
        assert!(encoder.decode(&[0; 4], 1024.0, 1).is_err());
    }

    #[test]
    fn empty_input_encodes_to_zero() {
        let encoder = SlotEncoder::new(8).unwrap();
        let coeffs = encoder.encode(&[], 1024.0).unwrap();
        assert!(coeffs.iter().all(|&c| c == 0));
        assert!(encoder.decode(&coeffs, 1024.0, 0).unwrap().is_empty());
    }
}

//! Coefficient samplers used by key generation and encryption.

use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Normal, NormalError};

/// Samples `degree` coefficients uniformly from `[0, modulus)`.
///
/// # Panics
///
/// Panics if `modulus == 0`.
pub fn uniform_coefficients<R: Rng + ?Sized>(
    degree: usize,
    modulus: u64,
    rng: &mut R,
) -> Vec<u64> {
    assert!(modulus > 0, "uniform_coefficients: modulus must be positive");
    (0..degree).map(|_| rng.random_range(0..modulus)).collect()
}

/// Samples `degree` signed integers from a rounded `N(0, std_dev^2)`.
///
/// `std_dev` must be finite and strictly positive.
pub fn gaussian_coefficients<R: Rng + ?Sized>(
    degree: usize,
    std_dev: f64,
    rng: &mut R,
) -> Result<Vec<i64>, NormalError> {
    // Normal::new accepts negative deviations
    if !(std_dev.is_finite() && std_dev > 0.0) {
        return Err(NormalError::BadVariance);
    }
    let normal = Normal::new(0.0, std_dev)?;
    Ok((0..degree)
        .map(|_| normal.sample(rng).round() as i64)
        .collect())
}

/// Samples a ternary vector with exactly `hamming_weight` entries in
/// `{-1, 1}` and the rest zero.
///
/// # Panics
///
/// Panics if `hamming_weight > degree`.
pub fn ternary_coefficients<R: Rng + ?Sized>(
    degree: usize,
    hamming_weight: usize,
    rng: &mut R,
) -> Vec<i64> {
    assert!(
        hamming_weight <= degree,
        "ternary_coefficients: hamming_weight must be <= degree"
    );
    let mut out = vec![0i64; degree];
    let mut indices: Vec<usize> = (0..degree).collect();
    indices.shuffle(rng);
    for &idx in indices.iter().take(hamming_weight) {
        out[idx] = if rng.random_bool(0.5) { 1 } else { -1 };
    }
    out
}

/// Samples `len` values uniformly from `[0, 1)`, the range of normalised
/// pixel intensities the benchmark feeds the scheme by default.
pub fn random_unit_vector<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<f64> {
    (0..len).map(|_| rng.random::<f64>()).collect()
}

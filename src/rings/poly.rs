use super::{
    basis::{NttTable, RnsBasis},
    errors::{RnsError, RnsResult},
};
use crate::math::{
    add_mod, center, gaussian_coefficients, mod_inverse, mul_mod, reduce_signed, sub_mod,
    ternary_coefficients, uniform_coefficients,
};
use rand::Rng;
use std::{
    ops::{AddAssign, MulAssign, Neg, SubAssign},
    sync::Arc,
};

/// A polynomial in `Z_{q_0} x ... x Z_{q_{L-1}}[X] / (X^N + 1)`.
///
/// Stores one coefficient vector per RNS channel. The `in_ntt_domain` flag
/// tracks whether the vectors hold coefficient-domain or NTT-domain values.
///
/// # Invariants
/// - `channels.len() == basis.channel_count()`
/// - `channels[i].len() == basis.degree()`
/// - Every `channels[i][j] < basis.moduli()[i]`
#[derive(Clone, Debug)]
pub struct RnsPoly {
    channels: Vec<Vec<u64>>,
    basis: Arc<RnsBasis>,
    in_ntt_domain: bool,
}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl RnsPoly {
    /// Creates the zero polynomial in coefficient domain.
    pub fn zero(basis: Arc<RnsBasis>) -> Self {
        let channels = vec![vec![0u64; basis.degree()]; basis.channel_count()];
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Creates a polynomial from signed integer coefficients, reduced into
    /// `[0, q_i)` per channel.
    pub fn from_coeffs(coeffs: &[i64], basis: Arc<RnsBasis>) -> RnsResult<Self> {
        let degree = basis.degree();
        if coeffs.len() != degree {
            return Err(RnsError::DegreeMismatch {
                expected: degree,
                actual: coeffs.len(),
            });
        }
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| coeffs.iter().map(|&c| reduce_signed(c, q)).collect())
            .collect();
        Ok(Self::new_unchecked(channels, basis, false))
    }

    /// Creates a polynomial from pre-built channel vectors.
    ///
    /// Returns an error if the shape doesn't match the basis, or if any
    /// coefficient is not reduced.
    pub fn from_channels(
        channels: Vec<Vec<u64>>,
        basis: Arc<RnsBasis>,
        in_ntt_domain: bool,
    ) -> RnsResult<Self> {
        let expected = basis.channel_count();
        let actual = channels.len();
        if actual != expected {
            return Err(RnsError::ChannelCountMismatch { expected, actual });
        }
        for (ch, channel) in channels.iter().enumerate() {
            if channel.len() != basis.degree() {
                return Err(RnsError::DegreeMismatch {
                    expected: basis.degree(),
                    actual: channel.len(),
                });
            }
            let q = basis.moduli()[ch];
            if let Some(&c) = channel.iter().find(|&&c| c >= q) {
                return Err(RnsError::NonReducedCoefficient {
                    coefficient: c,
                    modulus: q,
                });
            }
        }
        Ok(Self::new_unchecked(channels, basis, in_ntt_domain))
    }

    // Skips the O(N·L) reducedness check. Callers build reduced channels.
    fn new_unchecked(channels: Vec<Vec<u64>>, basis: Arc<RnsBasis>, in_ntt_domain: bool) -> Self {
        Self {
            channels,
            basis,
            in_ntt_domain,
        }
    }

    /// Samples with coefficients uniform in `[0, q_i)` per channel.
    pub fn sample_uniform<R: Rng + ?Sized>(basis: Arc<RnsBasis>, rng: &mut R) -> Self {
        let degree = basis.degree();
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| uniform_coefficients(degree, q, rng))
            .collect();
        Self::new_unchecked(channels, basis, false)
    }

    /// Samples noise from a rounded `N(0, std_dev^2)`, shared across channels.
    pub fn sample_gaussian<R: Rng + ?Sized>(
        std_dev: f64,
        basis: Arc<RnsBasis>,
        rng: &mut R,
    ) -> RnsResult<Self> {
        let noise = gaussian_coefficients(basis.degree(), std_dev, rng)
            .map_err(|_| RnsError::InvalidStdDev(std_dev))?;
        Self::from_coeffs(&noise, basis)
    }

    /// Samples a ternary polynomial with exactly `hamming_weight` non-zero
    /// coefficients.
    pub fn sample_ternary<R: Rng + ?Sized>(
        hamming_weight: usize,
        basis: Arc<RnsBasis>,
        rng: &mut R,
    ) -> RnsResult<Self> {
        let degree = basis.degree();
        if hamming_weight > degree {
            return Err(RnsError::DegreeMismatch {
                expected: degree,
                actual: hamming_weight,
            });
        }
        let ternary = ternary_coefficients(degree, hamming_weight, rng);
        Self::from_coeffs(&ternary, basis)
    }
}

// ─── Accessors & domain conversion ───────────────────────────────────────────

impl RnsPoly {
    pub fn channels(&self) -> &[Vec<u64>] {
        &self.channels
    }

    pub fn basis(&self) -> &Arc<RnsBasis> {
        &self.basis
    }

    pub fn degree(&self) -> usize {
        self.basis.degree()
    }

    pub fn is_ntt_domain(&self) -> bool {
        self.in_ntt_domain
    }

    /// Converts to NTT domain in-place (no-op if already there).
    pub fn to_ntt_domain(&mut self) {
        if self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            forward_ntt(channel, self.basis.ntt_table(ch));
        }
        self.in_ntt_domain = true;
    }

    /// Converts to coefficient domain in-place (no-op if already there).
    pub fn to_coeff_domain(&mut self) {
        if !self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            inverse_ntt(channel, self.basis.ntt_table(ch));
        }
        self.in_ntt_domain = false;
    }

    fn coeff_domain_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.to_coeff_domain();
        copy
    }

    /// Centered coefficients of one channel, in `(-q_i/2, q_i/2]`.
    pub fn centered_channel(&self, channel: usize) -> Vec<i64> {
        let q = self.basis.moduli()[channel];
        let to_centered =
            |values: &[u64]| -> Vec<i64> { values.iter().map(|&c| center(c, q)).collect() };
        if self.in_ntt_domain {
            to_centered(&self.coeff_domain_copy().channels[channel])
        } else {
            to_centered(&self.channels[channel])
        }
    }

    /// Keeps the channels whose moduli appear in `target`, in `target`'s
    /// order. Works in both domains.
    pub fn restrict(&self, target: &Arc<RnsBasis>) -> RnsResult<Self> {
        if target.degree() != self.degree() {
            return Err(RnsError::IncompatibleBasis);
        }
        let channels = target
            .moduli()
            .iter()
            .map(|m| {
                self.basis
                    .moduli()
                    .iter()
                    .position(|q| q == m)
                    .map(|ch| self.channels[ch].clone())
                    .ok_or(RnsError::IncompatibleBasis)
            })
            .collect::<RnsResult<Vec<_>>>()?;
        Ok(Self::new_unchecked(
            channels,
            Arc::clone(target),
            self.in_ntt_domain,
        ))
    }

    /// Reinterprets channel `channel` (values in `[0, q_channel)`) as plain
    /// integers and reduces them into every modulus of `target`.
    ///
    /// The result is in coefficient domain.
    pub fn lift_channel(&self, channel: usize, target: &Arc<RnsBasis>) -> RnsResult<Self> {
        if self.in_ntt_domain {
            return self.coeff_domain_copy().lift_channel(channel, target);
        }
        if target.degree() != self.degree() || channel >= self.channels.len() {
            return Err(RnsError::IncompatibleBasis);
        }
        let source = &self.channels[channel];
        let channels = target
            .moduli()
            .iter()
            .map(|&m| source.iter().map(|&c| c % m).collect())
            .collect();
        Ok(Self::new_unchecked(channels, Arc::clone(target), false))
    }

    /// Divides every coefficient by the last modulus `q_last` and rounds to
    /// the nearest integer, dropping that channel.
    ///
    /// `target` must be this basis minus its last modulus. The result is in
    /// the same domain as `self`.
    pub fn divide_round_by_last(&self, target: &Arc<RnsBasis>) -> RnsResult<Self> {
        let count = self.basis.channel_count();
        if count < 2 {
            return Err(RnsError::InvalidModDrop {
                drop_count: 1,
                channel_count: count,
            });
        }
        if target.moduli() != &self.basis.moduli()[..count - 1] {
            return Err(RnsError::IncompatibleBasis);
        }

        let source = self.coeff_domain_copy();
        let last = count - 1;
        let q_last = self.basis.moduli()[last];
        let remainders: Vec<i64> = source.channels[last]
            .iter()
            .map(|&c| center(c, q_last))
            .collect();

        let channels = target
            .moduli()
            .iter()
            .enumerate()
            .map(|(ch, &m)| {
                let inv = mod_inverse(q_last % m, m).ok_or(RnsError::IncompatibleBasis)?;
                Ok(source.channels[ch]
                    .iter()
                    .zip(&remainders)
                    .map(|(&c, &r)| mul_mod(sub_mod(c, reduce_signed(r, m), m), inv, m))
                    .collect())
            })
            .collect::<RnsResult<Vec<Vec<u64>>>>()?;

        let mut out = Self::new_unchecked(channels, Arc::clone(target), false);
        if self.in_ntt_domain {
            out.to_ntt_domain();
        }
        Ok(out)
    }

    /// Applies the ring automorphism `X -> X^galois_element`.
    ///
    /// Coefficient `n` moves to index `n * g mod 2N`, picking up a sign flip
    /// when that index lands in `[N, 2N)`. The result is in the same domain
    /// as `self`.
    pub fn automorphism(&self, galois_element: usize) -> RnsResult<Self> {
        let degree = self.degree();
        let order = 2 * degree;
        if galois_element % 2 == 0 {
            return Err(RnsError::InvalidGaloisElement {
                element: galois_element,
                order,
            });
        }
        let g = galois_element % order;
        let source = self.coeff_domain_copy();

        let channels = source
            .channels
            .iter()
            .zip(self.basis.moduli())
            .map(|(channel, &q)| {
                let mut out = vec![0u64; degree];
                for (n, &c) in channel.iter().enumerate() {
                    let k = n * g % order;
                    if k < degree {
                        out[k] = c;
                    } else {
                        out[k - degree] = if c == 0 { 0 } else { q - c };
                    }
                }
                out
            })
            .collect();

        let mut out = Self::new_unchecked(channels, Arc::clone(&self.basis), false);
        if self.in_ntt_domain {
            out.to_ntt_domain();
        }
        Ok(out)
    }

    /// Multiplies channel `i` by `scalars[i]`, which must already be reduced
    /// modulo `q_i`. Works in both domains.
    pub fn mul_channel_scalars(&mut self, scalars: &[u64]) {
        assert_eq!(
            scalars.len(),
            self.channels.len(),
            "mul_channel_scalars: one scalar per channel"
        );
        for ((channel, &s), &q) in self
            .channels
            .iter_mut()
            .zip(scalars)
            .zip(self.basis.moduli())
        {
            for c in channel.iter_mut() {
                *c = mul_mod(*c, s, q);
            }
        }
    }
}

// ─── Arithmetic ───────────────────────────────────────────────────────────────

impl AddAssign<&RnsPoly> for RnsPoly {
    /// Coefficient-wise addition modulo each `q_i`.
    ///
    /// Works in both domains.
    ///
    /// # Panics
    ///
    /// Panics if the operands differ in basis or domain.
    fn add_assign(&mut self, rhs: &RnsPoly) {
        assert_eq!(self.basis.moduli(), rhs.basis.moduli(), "add_assign: basis mismatch");
        assert_eq!(
            self.in_ntt_domain, rhs.in_ntt_domain,
            "add_assign: domain mismatch"
        );
        for ((channel, other), &q) in self
            .channels
            .iter_mut()
            .zip(&rhs.channels)
            .zip(self.basis.moduli())
        {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a = add_mod(*a, b, q);
            }
        }
    }
}

impl SubAssign<&RnsPoly> for RnsPoly {
    fn sub_assign(&mut self, rhs: &RnsPoly) {
        assert_eq!(self.basis.moduli(), rhs.basis.moduli(), "sub_assign: basis mismatch");
        assert_eq!(
            self.in_ntt_domain, rhs.in_ntt_domain,
            "sub_assign: domain mismatch"
        );
        for ((channel, other), &q) in self
            .channels
            .iter_mut()
            .zip(&rhs.channels)
            .zip(self.basis.moduli())
        {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a = sub_mod(*a, b, q);
            }
        }
    }
}

impl MulAssign<&RnsPoly> for RnsPoly {
    /// Negacyclic product as a pointwise product of NTT evaluations.
    ///
    /// # Panics
    ///
    /// Panics unless both operands are in NTT domain over the same basis.
    fn mul_assign(&mut self, rhs: &RnsPoly) {
        assert!(
            self.in_ntt_domain && rhs.in_ntt_domain,
            "mul_assign: requires NTT domain; call to_ntt_domain first"
        );
        assert_eq!(self.basis.moduli(), rhs.basis.moduli(), "mul_assign: basis mismatch");
        for ((channel, other), &q) in self
            .channels
            .iter_mut()
            .zip(&rhs.channels)
            .zip(self.basis.moduli())
        {
            for (a, &b) in channel.iter_mut().zip(other) {
                *a = mul_mod(*a, b, q);
            }
        }
    }
}

impl Neg for RnsPoly {
    type Output = Self;

    /// Coefficient-wise negation modulo each `q_i`. Works in both domains.
    fn neg(mut self) -> Self {
        for (channel, &q) in self.channels.iter_mut().zip(self.basis.moduli()) {
            for c in channel.iter_mut() {
                if *c != 0 {
                    *c = q - *c;
                }
            }
        }
        self
    }
}

// ─── NTT kernels (private) ────────────────────────────────────────────────────

fn forward_ntt(coeffs: &mut [u64], table: &NttTable) {
    let q = table.modulus;
    for (c, &psi) in coeffs.iter_mut().zip(&table.psi_pows) {
        *c = mul_mod(*c, psi, q);
    }
    bit_reverse_permute(coeffs);
    cooley_tukey_ntt(coeffs, &table.omega_pows, q);
}

fn inverse_ntt(evals: &mut [u64], table: &NttTable) {
    let q = table.modulus;
    bit_reverse_permute(evals);
    cooley_tukey_ntt(evals, &table.omega_inv_pows, q);
    for (v, &psi_inv) in evals.iter_mut().zip(&table.psi_inv_pows) {
        *v = mul_mod(mul_mod(*v, table.n_inv, q), psi_inv, q);
    }
}

// `roots[k] = omega^k` for `k < N/2`.
fn cooley_tukey_ntt(values: &mut [u64], roots: &[u64], modulus: u64) {
    let degree = values.len();
    let mut len = 2;
    while len <= degree {
        let half = len / 2;
        let step = degree / len;
        for start in (0..degree).step_by(len) {
            for offset in 0..half {
                let left = start + offset;
                let right = left + half;
                let twiddle = roots[offset * step];
                let t = mul_mod(values[right], twiddle, modulus);
                let u = values[left];
                values[left] = add_mod(u, t, modulus);
                values[right] = sub_mod(u, t, modulus);
            }
        }
        len *= 2;
    }
}

fn bit_reverse_permute(values: &mut [u64]) {
    let bits = values.len().trailing_zeros();
    if bits == 0 {
        return;
    }
    for i in 0..values.len() {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if i < j {
            values.swap(i, j);
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

//! NTT-friendly prime search for the modulus chain.
//!
//! Primality is decided with Miller-Rabin over a fixed witness set that is
//! deterministic for every `u64`. Chain primes are searched downward from
//! `2^bits` over candidates `p = 1 (mod 2N)`, which guarantees that `Z_p`
//! holds the primitive `2N`-th root of unity the negacyclic NTT needs.

use super::modular::{mod_pow, mul_mod};
use crate::rings::{RnsError, RnsResult};
use std::collections::HashMap;

// Deterministic for all n < 3.3 * 10^24, which covers u64.
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Widest prime a chain entry may request. Keeps `a + b` of two residues
/// inside a `u64`.
pub const MAX_PRIME_BITS: u32 = 60;

/// Narrowest prime a chain entry may request.
pub const MIN_PRIME_BITS: u32 = 10;

/// Returns `(odd_part, power_of_two)` such that `n = odd_part * 2^power_of_two`.
fn decompose(n: u64) -> (u64, u32) {
    debug_assert!(n > 0);
    let r = n.trailing_zeros();
    (n >> r, r)
}

/// Returns `true` if `n` is prime.
pub fn is_prime(n: u64) -> bool {
    match n {
        0 | 1 => return false,
        2 | 3 => return true,
        _ if n & 1 == 0 => return false,
        _ => {}
    }

    let (d, r) = decompose(n - 1);
    'bases: for &a in MILLER_RABIN_BASES.iter() {
        if a >= n {
            continue;
        }
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

/// Returns `true` when `p` is prime and `p = 1 (mod 2n)`.
#[inline]
pub fn is_ntt_friendly_prime(p: u64, n: u64) -> bool {
    match n.checked_mul(2) {
        Some(order) if order > 0 => is_prime(p) && p % order == 1,
        _ => false,
    }
}

/// Returns the largest `x <= value` such that `x % modulus == 1`, if any.
fn snap_down_to_congruence(value: u64, modulus: u64) -> Option<u64> {
    debug_assert!(modulus > 1);
    let remainder = value % modulus;
    let delta = (remainder + modulus - 1) % modulus;
    value.checked_sub(delta)
}

/// Returns the largest NTT-friendly prime `p < bound` for ring degree `n`.
pub fn get_first_prime_down(bound: u64, n: u64) -> Option<u64> {
    if bound <= 2 || n == 0 {
        return None;
    }
    let step = n.checked_mul(2)?;
    let mut candidate = snap_down_to_congruence(bound - 1, step)?;

    loop {
        if candidate <= 2 {
            return None;
        }
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(step)?;
    }
}

/// Picks one distinct NTT-friendly prime per entry of `bit_sizes`.
///
/// Entries sharing a bit size receive successively smaller primes, so the
/// chain `[60, 40, 40, 60]` yields two different 60-bit and two different
/// 40-bit primes. Every returned prime has exactly the requested width.
pub fn chain_primes(bit_sizes: &[u32], degree: usize) -> RnsResult<Vec<u64>> {
    if bit_sizes.is_empty() {
        return Err(RnsError::EmptyBasis);
    }

    let mut next_bound: HashMap<u32, u64> = HashMap::new();
    let mut primes = Vec::with_capacity(bit_sizes.len());

    for &bits in bit_sizes {
        if !(MIN_PRIME_BITS..=MAX_PRIME_BITS).contains(&bits) {
            return Err(RnsError::UnsupportedPrimeBits {
                bits,
                min: MIN_PRIME_BITS,
                max: MAX_PRIME_BITS,
            });
        }
        let lower = 1u64 << (bits - 1);
        let bound = next_bound.get(&bits).copied().unwrap_or(1u64 << bits);
        let prime = get_first_prime_down(bound, degree as u64)
            .filter(|&p| p >= lower)
            .ok_or(RnsError::PrimeGenerationFailed { bits, degree })?;
        next_bound.insert(bits, prime);
        primes.push(prime);
    }

    Ok(primes)
}

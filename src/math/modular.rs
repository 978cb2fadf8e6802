//! Word-sized modular arithmetic shared by the prime search, NTT tables and
//! RNS polynomial kernels.
//!
//! All moduli used by the crate are below `2^61`, so sums of two reduced
//! residues never overflow a `u64` and products are taken through `u128`.

/// `(a + b) mod q` for reduced `a, b < q`.
#[inline]
pub fn add_mod(a: u64, b: u64, q: u64) -> u64 {
    let s = a + b;
    if s >= q { s - q } else { s }
}

/// `(a - b) mod q` for reduced `a, b < q`.
#[inline]
pub fn sub_mod(a: u64, b: u64, q: u64) -> u64 {
    if a >= b { a - b } else { a + q - b }
}

/// `(a * b) mod q` through a `u128` intermediate.
#[inline]
pub fn mul_mod(a: u64, b: u64, q: u64) -> u64 {
    debug_assert!(q > 0, "mul_mod: modulus must be positive");
    ((a as u128 * b as u128) % q as u128) as u64
}

/// `base^exponent mod modulus` via binary exponentiation.
pub fn mod_pow(mut base: u64, mut exponent: u64, modulus: u64) -> u64 {
    assert!(modulus > 0, "mod_pow: modulus must be positive");
    if modulus == 1 {
        return 0;
    }
    let mut acc = 1u64;
    base %= modulus;
    while exponent > 0 {
        if exponent & 1 == 1 {
            acc = mul_mod(acc, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exponent >>= 1;
    }
    acc
}

/// Inverse of `value` modulo `modulus`, or `None` when they are not coprime.
pub fn mod_inverse(value: u64, modulus: u64) -> Option<u64> {
    fn extended_gcd(a: i128, b: i128) -> (i128, i128, i128) {
        if a == 0 {
            (b, 0, 1)
        } else {
            let (gcd, x1, y1) = extended_gcd(b % a, a);
            (gcd, y1 - (b / a) * x1, x1)
        }
    }

    let m = modulus as i128;
    let (gcd, x, _) = extended_gcd((value % modulus) as i128, m);
    if gcd != 1 {
        return None;
    }
    Some(x.rem_euclid(m) as u64)
}

/// Reduces a signed value into `[0, q)`.
#[inline]
pub fn reduce_signed(value: i64, q: u64) -> u64 {
    (value as i128).rem_euclid(q as i128) as u64
}

/// Maps a residue in `[0, q)` to its centered representative in `(-q/2, q/2]`.
#[inline]
pub fn center(residue: u64, q: u64) -> i64 {
    if residue > q / 2 {
        (residue as i128 - q as i128) as i64
    } else {
        residue as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_wrap_at_modulus() {
        assert_eq!(add_mod(16, 2, 17), 1);
        assert_eq!(add_mod(3, 4, 17), 7);
        assert_eq!(sub_mod(2, 5, 17), 14);
        assert_eq!(sub_mod(5, 2, 17), 3);
    }

    #[test]
    fn mul_mod_matches_widened_reference() {
        let a = (1u64 << 60) - 93;
        let b = (1u64 << 59) + 12_345;
        let q = 1_152_921_504_606_584_833u64;
        let expected = ((a as u128 * b as u128) % q as u128) as u64;
        assert_eq!(mul_mod(a % q, b % q, q), expected);
    }

    #[test]
    fn mod_pow_handles_edge_cases() {
        assert_eq!(mod_pow(2, 0, 17), 1);
        assert_eq!(mod_pow(5, 0, 1), 0);
        assert_eq!(mod_pow(0, 5, 17), 0);
        assert_eq!(mod_pow(3, 16, 17), 1);
    }

    #[test]
    fn mod_inverse_roundtrips() {
        let q = 97;
        for value in 1..q {
            let inv = mod_inverse(value, q).unwrap();
            assert_eq!(mul_mod(value, inv, q), 1);
        }
        assert_eq!(mod_inverse(6, 9), None);
    }

    #[test]
    fn center_maps_upper_half_to_negative() {
        assert_eq!(center(5, 97), 5);
        assert_eq!(center(96, 97), -1);
        assert_eq!(center(48, 97), 48);
        assert_eq!(center(49, 97), -48);
        assert_eq!(reduce_signed(-1, 97), 96);
    }
}

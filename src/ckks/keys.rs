//! Key material for the CKKS backend.
//!
//! Key switching uses one special prime `P`. For a target polynomial `t`
//! the key holds one pair per data prime `q_j`:
//!
//! `b_j = -a_j * s + e_j + P * g_j * t` over `q_0 .. q_{L-1}, P`
//!
//! where `g_j = 1 (mod q_j)` and `0` modulo every other prime. Applying it to
//! `d` multiplies the residues `[d]_{q_j}` into the key, sums, and divides
//! the result by `P`.

use super::{errors::CkksResult, params::CkksParams};
use crate::{
    math::mod_pow,
    rings::{RnsBasis, RnsPoly, RnsResult},
};
use rand::Rng;
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

/// Ternary secret `s`, stored in NTT form over every prime including `P`.
#[derive(Debug, Clone)]
pub struct SecretKey {
    pub poly: RnsPoly,
}

impl SecretKey {
    pub fn generate<R: Rng + ?Sized>(
        hamming_weight: usize,
        full_basis: &Arc<RnsBasis>,
        rng: &mut R,
    ) -> RnsResult<Self> {
        let mut poly = RnsPoly::sample_ternary(hamming_weight, Arc::clone(full_basis), rng)?;
        poly.to_ntt_domain();
        Ok(Self { poly })
    }

    /// The secret restricted to `basis`, in NTT form.
    pub fn restricted(&self, basis: &Arc<RnsBasis>) -> RnsResult<RnsPoly> {
        self.poly.restrict(basis)
    }
}

/// `(b, a)` with `b = -a * s + e` over the data primes, NTT form.
#[derive(Debug, Clone)]
pub struct PublicKey {
    pub b: RnsPoly,
    pub a: RnsPoly,
}

impl PublicKey {
    pub fn generate<R: Rng + ?Sized>(
        secret_key: &SecretKey,
        data_basis: &Arc<RnsBasis>,
        error_std: f64,
        rng: &mut R,
    ) -> RnsResult<Self> {
        let s = secret_key.restricted(data_basis)?;
        let mut a = RnsPoly::sample_uniform(Arc::clone(data_basis), rng);
        a.to_ntt_domain();
        let mut e = RnsPoly::sample_gaussian(error_std, Arc::clone(data_basis), rng)?;
        e.to_ntt_domain();

        let mut a_s = a.clone();
        a_s *= &s;
        let mut b = -a_s;
        b += &e;
        Ok(Self { b, a })
    }
}

/// Special-prime key-switching key from `t` to `s`.
#[derive(Debug, Clone)]
pub struct KeySwitchKey {
    /// `(b_j, a_j)` per data prime, NTT form over the full basis.
    parts: Vec<(RnsPoly, RnsPoly)>,
}

impl KeySwitchKey {
    /// `target` must be in NTT form over the full basis (data primes then `P`).
    pub fn generate<R: Rng + ?Sized>(
        secret_key: &SecretKey,
        target: &RnsPoly,
        error_std: f64,
        rng: &mut R,
    ) -> RnsResult<Self> {
        let basis = Arc::clone(secret_key.poly.basis());
        let moduli = basis.moduli();
        let special = moduli[moduli.len() - 1];
        let data_count = moduli.len() - 1;

        let mut parts = Vec::with_capacity(data_count);
        for j in 0..data_count {
            let mut a = RnsPoly::sample_uniform(Arc::clone(&basis), rng);
            a.to_ntt_domain();
            let mut e = RnsPoly::sample_gaussian(error_std, Arc::clone(&basis), rng)?;
            e.to_ntt_domain();

            // P * g_j reduced per channel: P mod q_j on channel j, zero elsewhere.
            let gadget: Vec<u64> = moduli
                .iter()
                .enumerate()
                .map(|(i, &q)| if i == j { special % q } else { 0 })
                .collect();
            let mut lifted_target = target.clone();
            lifted_target.mul_channel_scalars(&gadget);

            let mut a_s = a.clone();
            a_s *= &secret_key.poly;
            let mut b = -a_s;
            b += &e;
            b += &lifted_target;
            parts.push((b, a));
        }
        Ok(Self { parts })
    }

    /// Switches `d` (over `q_0 .. q_{l-1}`) to a pair `(k0, k1)` over the same
    /// primes with `k0 + k1 * s ~ d * t`.
    ///
    /// `extended` is `q_0 .. q_{l-1}, P` and `data` is `q_0 .. q_{l-1}`. Both
    /// outputs are in NTT form.
    pub fn apply(
        &self,
        d: &RnsPoly,
        extended: &Arc<RnsBasis>,
        data: &Arc<RnsBasis>,
    ) -> RnsResult<(RnsPoly, RnsPoly)> {
        let level = data.channel_count();
        let mut acc0 = RnsPoly::zero(Arc::clone(extended));
        let mut acc1 = RnsPoly::zero(Arc::clone(extended));
        acc0.to_ntt_domain();
        acc1.to_ntt_domain();

        let mut coeff_d = d.clone();
        coeff_d.to_coeff_domain();

        for (j, (b, a)) in self.parts.iter().take(level).enumerate() {
            let mut digit = coeff_d.lift_channel(j, extended)?;
            digit.to_ntt_domain();

            let mut term0 = b.restrict(extended)?;
            term0 *= &digit;
            acc0 += &term0;

            let mut term1 = a.restrict(extended)?;
            term1 *= &digit;
            acc1 += &term1;
        }

        Ok((
            acc0.divide_round_by_last(data)?,
            acc1.divide_round_by_last(data)?,
        ))
    }
}

/// `5^step mod 2N`: the automorphism that rotates slots left by `step`.
pub fn rotation_galois_element(step: usize, degree: usize) -> usize {
    let order = (2 * degree) as u64;
    mod_pow(5, step as u64, order) as usize
}

/// Rotation keys for every power-of-two step below `N/2`.
#[derive(Debug, Clone, Default)]
pub struct GaloisKeys {
    keys: BTreeMap<usize, (usize, KeySwitchKey)>,
}

impl GaloisKeys {
    pub fn generate<R: Rng + ?Sized>(
        secret_key: &SecretKey,
        degree: usize,
        error_std: f64,
        rng: &mut R,
    ) -> RnsResult<Self> {
        let slots = degree / 2;
        let mut keys = BTreeMap::new();
        let mut step = 1;
        while step < slots {
            let element = rotation_galois_element(step, degree);
            let rotated_secret = secret_key.poly.automorphism(element)?;
            let key = KeySwitchKey::generate(secret_key, &rotated_secret, error_std, rng)?;
            keys.insert(step, (element, key));
            step *= 2;
        }
        debug!(count = keys.len(), "generated rotation keys");
        Ok(Self { keys })
    }

    /// Galois element and key for a power-of-two `step`.
    pub fn get(&self, step: usize) -> Option<(usize, &KeySwitchKey)> {
        self.keys.get(&step).map(|(element, key)| (*element, key))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.keys().copied()
    }
}

/// Everything key generation produces for one context.
#[derive(Debug, Clone)]
pub struct KeySet {
    pub secret: SecretKey,
    pub public: PublicKey,
    pub relinearization: KeySwitchKey,
    pub galois: GaloisKeys,
}

impl KeySet {
    pub fn generate<R: Rng + ?Sized>(
        params: &CkksParams,
        full_basis: &Arc<RnsBasis>,
        data_basis: &Arc<RnsBasis>,
        rng: &mut R,
    ) -> CkksResult<Self> {
        let secret = SecretKey::generate(params.hamming_weight, full_basis, rng)?;
        let public = PublicKey::generate(&secret, data_basis, params.error_std_dev, rng)?;

        let mut s_squared = secret.poly.clone();
        s_squared *= &secret.poly;
        let relinearization =
            KeySwitchKey::generate(&secret, &s_squared, params.error_std_dev, rng)?;
        debug!("generated relinearization key");

        let galois = if params.galois_keys {
            GaloisKeys::generate(&secret, params.degree, params.error_std_dev, rng)?
        } else {
            GaloisKeys::default()
        };

        Ok(Self {
            secret,
            public,
            relinearization,
            galois,
        })
    }
}

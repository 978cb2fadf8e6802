use super::{
    ciphertext::Ciphertext,
    errors::{CkksError, CkksResult},
    keys::KeySet,
    params::CkksParams,
};
use crate::{
    backend::SchemeBackend,
    config::ContextConfig,
    encoding::{EncodingError, SlotEncoder},
    rings::{RnsBasis, RnsPoly},
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use tracing::{debug, info, instrument};

// Relative scale difference above which two ciphertexts cannot be added.
const SCALE_TOLERANCE: f64 = 1e-6;

/// RNS-CKKS over `Z_Q[X]/(X^N + 1)` with a special-prime key switch.
pub struct CkksBackend {
    params: CkksParams,
    encoder: SlotEncoder,
    /// `data_bases[l - 1]` holds `q_0 .. q_{l-1}`.
    data_bases: Vec<Arc<RnsBasis>>,
    /// `extended_bases[l - 1]` holds `q_0 .. q_{l-1}, P`.
    extended_bases: Vec<Arc<RnsBasis>>,
    keys: KeySet,
    rng: ChaCha20Rng,
}

impl std::fmt::Debug for CkksBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CkksBackend")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl CkksBackend {
    #[instrument(skip_all, fields(degree = config.ring_degree, chain = ?config.modulus_chain_bits))]
    pub fn new(config: &ContextConfig) -> CkksResult<Self> {
        let params = CkksParams::from_config(config)?;
        let encoder = SlotEncoder::new(params.degree)?;

        let mut moduli = params.data_moduli.clone();
        moduli.push(params.special_modulus);
        let full = RnsBasis::new(params.degree, moduli)?;
        let top = params.top_level();

        let mut data_bases = Vec::with_capacity(top);
        let mut extended_bases = Vec::with_capacity(top);
        for level in 1..=top {
            let mut channels: Vec<usize> = (0..level).collect();
            data_bases.push(Arc::new(full.select(&channels)?));
            channels.push(top);
            extended_bases.push(Arc::new(full.select(&channels)?));
        }
        let full = Arc::new(full);

        let mut rng = match params.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_os_rng(),
        };
        let keys = KeySet::generate(&params, &full, &data_bases[top - 1], &mut rng)?;

        info!(
            degree = params.degree,
            levels = top,
            log_q = full.log_modulus(),
            rotation_keys = !keys.galois.is_empty(),
            "built CKKS context"
        );

        Ok(Self {
            params,
            encoder,
            data_bases,
            extended_bases,
            keys,
            rng,
        })
    }

    pub fn params(&self) -> &CkksParams {
        &self.params
    }

    pub fn max_slots(&self) -> usize {
        self.params.max_slots()
    }

    pub fn level(&self, ciphertext: &Ciphertext) -> usize {
        ciphertext.level()
    }

    fn data_basis(&self, level: usize) -> &Arc<RnsBasis> {
        &self.data_bases[level - 1]
    }

    fn extended_basis(&self, level: usize) -> &Arc<RnsBasis> {
        &self.extended_bases[level - 1]
    }

    /// Encodes `values` at the configured scale and encrypts under the
    /// public key at the top level.
    #[instrument(skip_all, fields(slots = values.len()))]
    pub fn encrypt(&mut self, values: &[f64]) -> CkksResult<Ciphertext> {
        let scale = self.params.scale;
        let coeffs = self.encoder.encode(values, scale)?;

        let q0 = self.params.data_moduli[0];
        if let Some(&c) = coeffs.iter().find(|c| c.unsigned_abs() >= q0 / 2) {
            return Err(EncodingError::CoefficientOutOfRange { value: c as f64 }.into());
        }

        let basis = Arc::clone(self.data_basis(self.params.top_level()));
        let mut m = RnsPoly::from_coeffs(&coeffs, Arc::clone(&basis))?;
        m.to_ntt_domain();

        let std_dev = self.params.error_std_dev;
        let mut u =
            RnsPoly::sample_ternary(self.params.hamming_weight, Arc::clone(&basis), &mut self.rng)?;
        u.to_ntt_domain();
        let mut e0 = RnsPoly::sample_gaussian(std_dev, Arc::clone(&basis), &mut self.rng)?;
        e0.to_ntt_domain();
        let mut e1 = RnsPoly::sample_gaussian(std_dev, basis, &mut self.rng)?;
        e1.to_ntt_domain();

        // c0 = b * u + e0 + m
        let mut c0 = self.keys.public.b.clone();
        c0 *= &u;
        c0 += &e0;
        c0 += &m;

        // c1 = a * u + e1
        let mut c1 = self.keys.public.a.clone();
        c1 *= &u;
        c1 += &e1;

        Ok(Ciphertext { c0, c1, scale })
    }

    /// Computes `c0 + c1 * s` and decodes the first `len` slots from the
    /// centered residues modulo `q_0`.
    pub fn decrypt(&self, ciphertext: &Ciphertext, len: usize) -> CkksResult<Vec<f64>> {
        let basis = self.data_basis(ciphertext.level());
        let s = self.keys.secret.restricted(basis)?;

        let mut m = ciphertext.c1.clone();
        m *= &s;
        m += &ciphertext.c0;

        let coeffs = m.centered_channel(0);
        Ok(self.encoder.decode(&coeffs, ciphertext.scale, len)?)
    }

    fn at_level(&self, ciphertext: &Ciphertext, level: usize) -> CkksResult<Ciphertext> {
        if ciphertext.level() == level {
            return Ok(ciphertext.clone());
        }
        let basis = self.data_basis(level);
        Ok(Ciphertext {
            c0: ciphertext.c0.restrict(basis)?,
            c1: ciphertext.c1.restrict(basis)?,
            scale: ciphertext.scale,
        })
    }

    fn aligned(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> CkksResult<(Ciphertext, Ciphertext)> {
        let level = lhs.level().min(rhs.level());
        if lhs.level() != rhs.level() {
            debug!(lhs = lhs.level(), rhs = rhs.level(), level, "aligning levels");
        }
        Ok((self.at_level(lhs, level)?, self.at_level(rhs, level)?))
    }

    fn check_scales(lhs: &Ciphertext, rhs: &Ciphertext) -> CkksResult<()> {
        let larger = lhs.scale.max(rhs.scale);
        if (lhs.scale - rhs.scale).abs() > SCALE_TOLERANCE * larger {
            return Err(CkksError::ScaleMismatch {
                expected: lhs.scale,
                actual: rhs.scale,
            });
        }
        Ok(())
    }

    pub fn add(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> CkksResult<Ciphertext> {
        Self::check_scales(lhs, rhs)?;
        let (mut out, rhs) = self.aligned(lhs, rhs)?;
        out.c0 += &rhs.c0;
        out.c1 += &rhs.c1;
        Ok(out)
    }

    pub fn sub(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> CkksResult<Ciphertext> {
        Self::check_scales(lhs, rhs)?;
        let (mut out, rhs) = self.aligned(lhs, rhs)?;
        out.c0 -= &rhs.c0;
        out.c1 -= &rhs.c1;
        Ok(out)
    }

    /// Tensor product, relinearization with `s^2`, then rescale by the last
    /// data prime.
    #[instrument(skip_all, fields(level = lhs.level().min(rhs.level())))]
    pub fn mul(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> CkksResult<Ciphertext> {
        let (lhs, rhs) = self.aligned(lhs, rhs)?;
        let level = lhs.level();
        if level < 2 {
            return Err(CkksError::DepthExhausted { level });
        }

        // (a0 + a1 s)(b0 + b1 s) = d0 + d1 s + d2 s^2
        let mut d0 = lhs.c0.clone();
        d0 *= &rhs.c0;
        let mut d1 = lhs.c0.clone();
        d1 *= &rhs.c1;
        let mut cross = lhs.c1.clone();
        cross *= &rhs.c0;
        d1 += &cross;
        let mut d2 = lhs.c1;
        d2 *= &rhs.c1;

        let (k0, k1) = self.keys.relinearization.apply(
            &d2,
            self.extended_basis(level),
            self.data_basis(level),
        )?;
        d0 += &k0;
        d1 += &k1;

        let q_last = self.params.data_moduli[level - 1];
        let target = self.data_basis(level - 1);
        Ok(Ciphertext {
            c0: d0.divide_round_by_last(target)?,
            c1: d1.divide_round_by_last(target)?,
            scale: lhs.scale * rhs.scale / q_last as f64,
        })
    }

    /// Rotates slots left by `steps` (modulo `N/2`), composing the
    /// power-of-two rotation keys.
    pub fn rotate(&self, ciphertext: &Ciphertext, steps: usize) -> CkksResult<Ciphertext> {
        let steps = steps % self.max_slots();
        let level = ciphertext.level();
        let mut out = ciphertext.clone();

        let mut remaining = steps;
        while remaining != 0 {
            let step = 1 << remaining.trailing_zeros();
            remaining &= remaining - 1;

            let (element, key) = self
                .keys
                .galois
                .get(step)
                .ok_or(CkksError::MissingRotationKey { step })?;
            let c0 = out.c0.automorphism(element)?;
            let c1 = out.c1.automorphism(element)?;
            let (k0, k1) = key.apply(&c1, self.extended_basis(level), self.data_basis(level))?;

            out.c0 = c0;
            out.c0 += &k0;
            out.c1 = k1;
        }
        Ok(out)
    }
}

impl SchemeBackend for CkksBackend {
    type Ciphertext = Ciphertext;
    type Error = CkksError;

    fn build(config: &ContextConfig) -> CkksResult<Self> {
        Self::new(config)
    }

    fn max_slots(&self) -> usize {
        CkksBackend::max_slots(self)
    }

    fn encrypt(&mut self, values: &[f64]) -> CkksResult<Ciphertext> {
        CkksBackend::encrypt(self, values)
    }

    fn decrypt(&self, ciphertext: &Ciphertext, len: usize) -> CkksResult<Vec<f64>> {
        CkksBackend::decrypt(self, ciphertext, len)
    }

    fn add(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> CkksResult<Ciphertext> {
        CkksBackend::add(self, lhs, rhs)
    }

    fn subtract(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> CkksResult<Ciphertext> {
        self.sub(lhs, rhs)
    }

    fn multiply(&self, lhs: &Ciphertext, rhs: &Ciphertext) -> CkksResult<Ciphertext> {
        self.mul(lhs, rhs)
    }

    fn level(&self, ciphertext: &Ciphertext) -> usize {
        ciphertext.level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityLevel;
    use approx::assert_abs_diff_eq;

    fn toy_config(galois_keys: bool) -> ContextConfig {
        ContextConfig::builder()
            .ring_degree(256)
            .modulus_chain_bits([50, 30, 30, 50])
            .scale_bits(30)
            .security_level(SecurityLevel::None)
            .galois_keys(galois_keys)
            .seed(11)
            .build()
            .unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-4);
        }
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut backend = CkksBackend::new(&toy_config(false)).unwrap();
        let values = [0.25, -0.5, 0.75, 0.125, 0.9];
        let ct = backend.encrypt(&values).unwrap();
        assert_eq!(ct.level(), 3);
        assert_close(&backend.decrypt(&ct, values.len()).unwrap(), &values);
    }

    #[test]
    fn add_and_sub_keep_level() {
        let mut backend = CkksBackend::new(&toy_config(false)).unwrap();
        let a = [0.1, 0.2, 0.3, 0.4];
        let b = [0.5, 0.25, 0.125, 0.0];
        let ca = backend.encrypt(&a).unwrap();
        let cb = backend.encrypt(&b).unwrap();

        let sum = backend.add(&ca, &cb).unwrap();
        let diff = backend.sub(&ca, &cb).unwrap();
        assert_eq!(sum.level(), 3);
        assert_eq!(diff.level(), 3);

        let expected_sum: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        let expected_diff: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
        assert_close(&backend.decrypt(&sum, 4).unwrap(), &expected_sum);
        assert_close(&backend.decrypt(&diff, 4).unwrap(), &expected_diff);
    }

    #[test]
    fn multiply_consumes_one_level() {
        let mut backend = CkksBackend::new(&toy_config(false)).unwrap();
        let a = [0.5, 0.9, 0.3, 0.7];
        let b = [0.2, 0.4, 0.8, 0.6];
        let ca = backend.encrypt(&a).unwrap();
        let cb = backend.encrypt(&b).unwrap();

        let product = backend.mul(&ca, &cb).unwrap();
        assert_eq!(product.level(), 2);
        let expected: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x * y).collect();
        assert_close(&backend.decrypt(&product, 4).unwrap(), &expected);

        // second multiplication aligns the fresh operand down to level 2
        let cubed = backend.mul(&product, &ca).unwrap();
        assert_eq!(cubed.level(), 1);
        let expected: Vec<f64> = expected.iter().zip(&a).map(|(x, y)| x * y).collect();
        assert_close(&backend.decrypt(&cubed, 4).unwrap(), &expected);

        assert_eq!(
            backend.mul(&cubed, &cubed).unwrap_err(),
            CkksError::DepthExhausted { level: 1 }
        );
    }

    #[test]
    fn mismatched_scales_are_rejected() {
        let mut backend = CkksBackend::new(&toy_config(false)).unwrap();
        let ca = backend.encrypt(&[1.0]).unwrap();
        let mut cb = backend.encrypt(&[1.0]).unwrap();
        cb.scale *= 2.0;
        assert!(matches!(
            backend.add(&ca, &cb),
            Err(CkksError::ScaleMismatch { .. })
        ));
        assert!(matches!(
            backend.sub(&ca, &cb),
            Err(CkksError::ScaleMismatch { .. })
        ));
    }

    #[test]
    fn rotation_composes_power_of_two_keys() {
        let mut backend = CkksBackend::new(&toy_config(true)).unwrap();
        let slots = backend.max_slots();
        let values: Vec<f64> = (0..slots).map(|i| i as f64 / slots as f64).collect();
        let ct = backend.encrypt(&values).unwrap();

        let rotated = backend.rotate(&ct, 3).unwrap();
        let expected: Vec<f64> = (0..slots).map(|i| values[(i + 3) % slots]).collect();
        assert_close(&backend.decrypt(&rotated, slots).unwrap(), &expected);

        let identity = backend.rotate(&ct, slots).unwrap();
        assert_close(&backend.decrypt(&identity, slots).unwrap(), &values);
    }

    #[test]
    fn rotation_without_galois_keys_fails() {
        let mut backend = CkksBackend::new(&toy_config(false)).unwrap();
        let ct = backend.encrypt(&[1.0, 2.0]).unwrap();
        assert_eq!(
            backend.rotate(&ct, 1).unwrap_err(),
            CkksError::MissingRotationKey { step: 1 }
        );
    }

    #[test]
    fn oversized_input_is_rejected() {
        let mut backend = CkksBackend::new(&toy_config(false)).unwrap();
        let values = vec![0.5; backend.max_slots() + 1];
        assert!(matches!(
            backend.encrypt(&values),
            Err(CkksError::EncodingError {
                source: EncodingError::InputTooLong { got: 129, max: 128 }
            })
        ));
    }

    #[test]
    fn seeded_contexts_are_reproducible() {
        let mut first = CkksBackend::new(&toy_config(false)).unwrap();
        let mut second = CkksBackend::new(&toy_config(false)).unwrap();
        let a = first.encrypt(&[0.3, 0.6]).unwrap();
        let b = second.encrypt(&[0.3, 0.6]).unwrap();
        assert_eq!(a.c0.channels(), b.c0.channels());
        assert_eq!(a.c1.channels(), b.c1.channels());
    }
}

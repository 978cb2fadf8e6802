use super::errors::{RnsError, RnsResult};
use crate::math::{is_ntt_friendly_prime, mod_inverse, mod_pow, mul_mod};
use std::sync::Arc;

/// Precomputed tables for the negacyclic NTT modulo one prime.
///
/// The transform twists by powers of `psi` (a primitive `2N`-th root of
/// unity) and then runs a cyclic NTT with `omega = psi^2`, so pointwise
/// products in the NTT domain are products in `Z_q[X]/(X^N + 1)`.
#[derive(Debug)]
pub struct NttTable {
    pub modulus: u64,
    pub degree: usize,
    pub psi_pows: Vec<u64>,
    pub psi_inv_pows: Vec<u64>,
    pub omega_pows: Vec<u64>,
    pub omega_inv_pows: Vec<u64>,
    pub n_inv: u64,
}

impl NttTable {
    pub fn new(modulus: u64, degree: usize) -> RnsResult<Self> {
        if degree < 2 || !degree.is_power_of_two() {
            return Err(RnsError::InvalidDegree { degree });
        }
        if !is_ntt_friendly_prime(modulus, degree as u64) {
            return Err(RnsError::NonNttFriendlyModulus { modulus, degree });
        }

        let psi = find_primitive_root(modulus, 2 * degree);
        let psi_inv = mod_inverse(psi, modulus)
            .ok_or(RnsError::NonNttFriendlyModulus { modulus, degree })?;
        let omega = mul_mod(psi, psi, modulus);
        let omega_inv = mul_mod(psi_inv, psi_inv, modulus);

        let n_inv = mod_inverse(degree as u64, modulus)
            .ok_or(RnsError::NonNttFriendlyModulus { modulus, degree })?;

        Ok(Self {
            modulus,
            degree,
            psi_pows: powers(psi, degree, modulus),
            psi_inv_pows: powers(psi_inv, degree, modulus),
            omega_pows: powers(omega, degree / 2, modulus),
            omega_inv_pows: powers(omega_inv, degree / 2, modulus),
            n_inv,
        })
    }
}

fn powers(base: u64, count: usize, modulus: u64) -> Vec<u64> {
    let mut out = Vec::with_capacity(count);
    let mut acc = 1u64;
    for _ in 0..count {
        out.push(acc);
        acc = mul_mod(acc, base, modulus);
    }
    out
}

/// Finds a primitive `order`-th root of unity in `Z_modulus` for a
/// power-of-two `order` dividing `modulus - 1`.
fn find_primitive_root(modulus: u64, order: usize) -> u64 {
    let exponent = (modulus - 1) / order as u64;
    let half = (order / 2) as u64;
    (2..modulus)
        .map(|candidate| mod_pow(candidate, exponent, modulus))
        .find(|&root| mod_pow(root, half, modulus) != 1)
        .unwrap_or(1)
}

/// RNS basis: NTT-friendly prime moduli sharing one ring degree.
///
/// Invariant: `moduli.len() == ntt_tables.len()` and
/// `ntt_tables[i].modulus == moduli[i]` for all `i`.
#[derive(Debug, Clone)]
pub struct RnsBasis {
    degree: usize,
    moduli: Vec<u64>,
    ntt_tables: Vec<Arc<NttTable>>,
}

impl RnsBasis {
    pub fn new(degree: usize, moduli: Vec<u64>) -> RnsResult<Self> {
        if moduli.is_empty() {
            return Err(RnsError::EmptyBasis);
        }
        for (i, &m) in moduli.iter().enumerate() {
            if moduli[..i].contains(&m) {
                return Err(RnsError::DuplicateModulus { modulus: m });
            }
        }
        let ntt_tables = moduli
            .iter()
            .map(|&m| NttTable::new(m, degree).map(Arc::new))
            .collect::<RnsResult<Vec<_>>>()?;
        Ok(Self {
            degree,
            moduli,
            ntt_tables,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    pub fn ntt_table(&self, channel: usize) -> &NttTable {
        &self.ntt_tables[channel]
    }

    pub fn channel_count(&self) -> usize {
        self.moduli.len()
    }

    /// Builds the basis made of the channels at `indices`, in that order.
    /// NTT tables are shared with `self`.
    pub fn select(&self, indices: &[usize]) -> RnsResult<Self> {
        if indices.is_empty() {
            return Err(RnsError::EmptyBasis);
        }
        let mut moduli = Vec::with_capacity(indices.len());
        let mut ntt_tables = Vec::with_capacity(indices.len());
        for &i in indices {
            let table = self.ntt_tables.get(i).ok_or(RnsError::IncompatibleBasis)?;
            moduli.push(self.moduli[i]);
            ntt_tables.push(Arc::clone(table));
        }
        Ok(Self {
            degree: self.degree,
            moduli,
            ntt_tables,
        })
    }

    /// Returns a new basis with the last `drop_count` channels removed.
    pub fn drop_last(&self, drop_count: usize) -> RnsResult<Self> {
        let channel_count = self.channel_count();
        if drop_count >= channel_count {
            return Err(RnsError::InvalidModDrop {
                drop_count,
                channel_count,
            });
        }
        let keep: Vec<usize> = (0..channel_count - drop_count).collect();
        self.select(&keep)
    }

    /// Total modulus width, `sum(log2 q_i)`.
    pub fn log_modulus(&self) -> f64 {
        self.moduli.iter().map(|&m| (m as f64).log2()).sum()
    }
}

use super::errors::{CkksError, CkksResult};
use crate::{
    config::{ContextConfig, SecurityLevel},
    math::chain_primes,
};

/// Standard deviation of the discrete Gaussian error.
pub const ERROR_STD_DEV: f64 = 3.2;

/// Maximum total modulus bits for 128-bit classical security with a ternary
/// secret, per the homomorphic encryption standard.
const TC128_MAX_MODULUS_BITS: [(usize, u32); 6] = [
    (1024, 27),
    (2048, 54),
    (4096, 109),
    (8192, 218),
    (16384, 438),
    (32768, 881),
];

pub fn max_modulus_bits(degree: usize) -> Option<u32> {
    TC128_MAX_MODULUS_BITS
        .iter()
        .find(|(n, _)| *n == degree)
        .map(|&(_, bits)| bits)
}

/// Validated CKKS parameters with concrete primes.
#[derive(Debug, Clone)]
pub struct CkksParams {
    pub degree: usize,
    /// `q_0 .. q_{L-1}`, consumed from the back by rescaling.
    pub data_moduli: Vec<u64>,
    /// Special prime `P` used only inside key switching.
    pub special_modulus: u64,
    pub scale: f64,
    pub hamming_weight: usize,
    pub error_std_dev: f64,
    pub galois_keys: bool,
    pub seed: Option<u64>,
}

impl CkksParams {
    pub fn from_config(config: &ContextConfig) -> CkksResult<Self> {
        let degree = config.ring_degree;
        let bits = &config.modulus_chain_bits;

        if !degree.is_power_of_two() || degree < 4 {
            return Err(CkksError::InvalidParameter {
                message: format!("ring degree {degree} must be a power of two"),
            });
        }
        if bits.len() < 3 {
            return Err(CkksError::InsufficientDepth {
                chain_len: bits.len(),
            });
        }
        if config.security_level == SecurityLevel::Tc128 {
            check_security(degree, bits)?;
        }
        check_scale_feasibility(bits, config.global_scale)?;

        let mut primes = chain_primes(bits, degree)?;
        let special_modulus = primes.pop().ok_or(CkksError::InsufficientDepth {
            chain_len: 0,
        })?;

        Ok(Self {
            degree,
            data_moduli: primes,
            special_modulus,
            scale: config.global_scale,
            hamming_weight: degree / 2,
            error_std_dev: ERROR_STD_DEV,
            galois_keys: config.galois_keys,
            seed: config.seed,
        })
    }

    /// Level of a fresh ciphertext: the number of data primes.
    pub fn top_level(&self) -> usize {
        self.data_moduli.len()
    }

    pub fn max_slots(&self) -> usize {
        self.degree / 2
    }
}

fn check_security(degree: usize, bits: &[u32]) -> CkksResult<()> {
    let max_bits = max_modulus_bits(degree).ok_or(CkksError::UnsupportedSecureDegree { degree })?;
    let total_bits: u32 = bits.iter().sum();
    if total_bits > max_bits {
        return Err(CkksError::SecurityBoundExceeded {
            total_bits,
            max_bits,
            degree,
        });
    }
    Ok(())
}

/// Simulates the scale through every multiply-and-rescale the chain allows.
///
/// Before each multiplication at level `l` the squared scale must fit the
/// remaining modulus `q_0 * ... * q_{l-1}`, and after rescaling by `q_{l-1}`
/// a unit-magnitude message must still fit `q_0 / 2`. Chains shorter than
/// three primes have no depth and are rejected outright.
pub fn check_scale_feasibility(bits: &[u32], scale: f64) -> CkksResult<()> {
    if bits.len() < 3 {
        return Err(CkksError::InsufficientDepth {
            chain_len: bits.len(),
        });
    }
    let scale_bits = scale.log2();
    let data_bits = &bits[..bits.len() - 1];
    let q0_bits = f64::from(data_bits[0]);

    let infeasible = |message: String| CkksError::ScaleInfeasible {
        scale_bits,
        message,
    };

    if scale_bits + 1.0 >= q0_bits {
        return Err(infeasible(format!(
            "first prime has {q0_bits} bits, too narrow to decode"
        )));
    }

    let mut current = scale_bits;
    for level in (2..=data_bits.len()).rev() {
        let remaining: f64 = data_bits[..level].iter().map(|&b| f64::from(b)).sum();
        if 2.0 * current + 1.0 >= remaining {
            return Err(infeasible(format!(
                "squared scale ({:.1} bits) overflows the {remaining} bits left at level {level}",
                2.0 * current
            )));
        }
        current = 2.0 * current - f64::from(data_bits[level - 1]);
        if current + 1.0 >= q0_bits {
            return Err(infeasible(format!(
                "rescaled scale ({current:.1} bits) at level {} exceeds the first prime",
                level - 1
            )));
        }
        if current <= 0.0 {
            return Err(infeasible(format!(
                "rescaling at level {level} leaves no precision"
            )));
        }
    }
    Ok(())
}

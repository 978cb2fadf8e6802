use crate::{encoding::EncodingError, rings::RnsError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CkksError {
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error(
        "modulus chain of {chain_len} primes leaves no multiplicative depth \
         (need at least one data prime to rescale into plus the special prime)"
    )]
    InsufficientDepth { chain_len: usize },

    #[error(
        "total modulus of {total_bits} bits exceeds the 128-bit security bound of \
         {max_bits} bits for ring degree {degree}"
    )]
    SecurityBoundExceeded {
        total_bits: u32,
        max_bits: u32,
        degree: usize,
    },

    #[error("no 128-bit secure modulus is tabulated for ring degree {degree}")]
    UnsupportedSecureDegree { degree: usize },

    #[error("scale of {scale_bits:.1} bits does not fit the modulus chain: {message}")]
    ScaleInfeasible { scale_bits: f64, message: String },

    #[error("Encoding failed: {source}")]
    EncodingError {
        #[from]
        source: EncodingError,
    },

    #[error("Ring arithmetic failed: {source}")]
    RingError {
        #[from]
        source: RnsError,
    },

    #[error("Scale mismatch: expected {expected:.2}, got {actual:.2}")]
    ScaleMismatch { expected: f64, actual: f64 },

    #[error("multiplicative depth exhausted: ciphertext is at level {level}")]
    DepthExhausted { level: usize },

    #[error("no rotation key for step {step}; galois keys were not generated")]
    MissingRotationKey { step: usize },
}

pub type CkksResult<T> = Result<T, CkksError>;

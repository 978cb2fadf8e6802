use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RnsError {
    #[error("ring degree must be a power of two of at least 2, got {degree}")]
    InvalidDegree { degree: usize },
    #[error("RNS basis must contain at least one modulus")]
    EmptyBasis,
    #[error("modulus {modulus} is not NTT-friendly for degree {degree}")]
    NonNttFriendlyModulus { modulus: u64, degree: usize },
    #[error("modulus {modulus} appears more than once in the basis")]
    DuplicateModulus { modulus: u64 },
    #[error("prime width {bits} is outside the supported range {min}..={max}")]
    UnsupportedPrimeBits { bits: u32, min: u32, max: u32 },
    #[error("no {bits}-bit NTT-friendly prime left for ring degree {degree}")]
    PrimeGenerationFailed { bits: u32, degree: usize },
    #[error("invalid mod-drop count {drop_count} for {channel_count} channels")]
    InvalidModDrop {
        drop_count: usize,
        channel_count: usize,
    },
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },
    #[error("coefficient count mismatch: expected {expected}, got {actual}")]
    DegreeMismatch { expected: usize, actual: usize },
    #[error("coefficient {coefficient} is not reduced modulo {modulus}")]
    NonReducedCoefficient { coefficient: u64, modulus: u64 },
    #[error("target basis is not a sub-basis of the polynomial's basis")]
    IncompatibleBasis,
    #[error("galois element {element} is not odd modulo {order}")]
    InvalidGaloisElement { element: usize, order: usize },
    #[error("gaussian standard deviation must be finite and positive, got {0}")]
    InvalidStdDev(f64),
}

pub type RnsResult<T> = Result<T, RnsError>;

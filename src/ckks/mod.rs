//! RNS-CKKS backend: approximate arithmetic on encrypted real vectors.

pub mod ciphertext;
pub mod engine;
pub mod errors;
pub mod keys;
pub mod params;

pub use ciphertext::Ciphertext;
pub use engine::CkksBackend;
pub use errors::{CkksError, CkksResult};
pub use keys::{GaloisKeys, KeySet, KeySwitchKey, PublicKey, SecretKey, rotation_galois_element};
pub use params::{CkksParams, ERROR_STD_DEV, check_scale_feasibility, max_modulus_bits};

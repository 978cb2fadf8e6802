//! Residue-number-system polynomial arithmetic over `Z_Q[X]/(X^N + 1)`.
//!
//! The modulus `Q = q_0 * ... * q_{L-1}` is held as one word-sized prime per
//! channel, and multiplication goes through a negacyclic NTT per channel.

pub mod basis;
pub mod errors;
pub mod poly;

pub use basis::{NttTable, RnsBasis};
pub use errors::{RnsError, RnsResult};
pub use poly::RnsPoly;

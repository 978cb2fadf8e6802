use crate::rings::RnsPoly;

/// Degree-1 CKKS ciphertext `(c0, c1)` with `c0 + c1 * s ~ m`.
///
/// Both components are in NTT form over the data primes `q_0 .. q_{l-1}`
/// of the current level `l`. `scale` is the exact factor the message was
/// multiplied by, tracked through every rescale.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    pub c0: RnsPoly,
    pub c1: RnsPoly,
    pub scale: f64,
}

impl Ciphertext {
    /// Number of data primes still available.
    pub fn level(&self) -> usize {
        self.c0.basis().channel_count()
    }
}

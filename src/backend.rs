use crate::config::ContextConfig;
use std::fmt;

/// The homomorphic scheme the benchmark drives.
///
/// The benchmark never looks inside key material or ciphertexts; it only
/// routes them through these calls. A backend instance owns its keys and its
/// encryption randomness. Instances are used from one thread at a time:
/// the benchmark never shares one across threads, even for read-only calls.
pub trait SchemeBackend: Sized {
    type Ciphertext: Clone + fmt::Debug;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Builds the context and generates every key up front.
    fn build(config: &ContextConfig) -> Result<Self, Self::Error>;

    fn max_slots(&self) -> usize;

    fn encrypt(&mut self, values: &[f64]) -> Result<Self::Ciphertext, Self::Error>;

    /// Decrypts and decodes the first `len` slots.
    fn decrypt(&self, ciphertext: &Self::Ciphertext, len: usize) -> Result<Vec<f64>, Self::Error>;

    fn add(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, Self::Error>;

    fn subtract(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, Self::Error>;

    /// Multiplies, relinearizes and rescales, consuming one level.
    fn multiply(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, Self::Error>;

    /// Remaining modulus level, for reporting.
    fn level(&self, ciphertext: &Self::Ciphertext) -> usize;
}

/// Plaintext stand-in used by unit tests to count backend calls.
#[cfg(test)]
pub(crate) mod mock {
    use super::SchemeBackend;
    use crate::config::ContextConfig;
    use std::cell::Cell;

    #[derive(Debug, thiserror::Error)]
    #[error("mock backend rejected: {0}")]
    pub struct MockError(pub String);

    #[derive(Debug, Clone)]
    pub struct MockCiphertext {
        values: Vec<f64>,
        level: usize,
    }

    #[derive(Debug)]
    pub struct MockBackend {
        max_slots: usize,
        top_level: usize,
        pub calls: Cell<usize>,
    }

    impl MockBackend {
        fn combine(
            &self,
            lhs: &MockCiphertext,
            rhs: &MockCiphertext,
            op: impl Fn(f64, f64) -> f64,
        ) -> MockCiphertext {
            self.calls.set(self.calls.get() + 1);
            let len = lhs.values.len().max(rhs.values.len());
            let at = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0);
            MockCiphertext {
                values: (0..len)
                    .map(|i| op(at(&lhs.values, i), at(&rhs.values, i)))
                    .collect(),
                level: lhs.level.min(rhs.level),
            }
        }
    }

    impl SchemeBackend for MockBackend {
        type Ciphertext = MockCiphertext;
        type Error = MockError;

        fn build(config: &ContextConfig) -> Result<Self, MockError> {
            if config.multiplicative_depth() == 0 {
                return Err(MockError("no multiplicative depth".into()));
            }
            Ok(Self {
                max_slots: config.max_slots(),
                top_level: config.modulus_chain_bits.len() - 1,
                calls: Cell::new(0),
            })
        }

        fn max_slots(&self) -> usize {
            self.max_slots
        }

        fn encrypt(&mut self, values: &[f64]) -> Result<MockCiphertext, MockError> {
            self.calls.set(self.calls.get() + 1);
            Ok(MockCiphertext {
                values: values.to_vec(),
                level: self.top_level,
            })
        }

        fn decrypt(&self, ct: &MockCiphertext, len: usize) -> Result<Vec<f64>, MockError> {
            self.calls.set(self.calls.get() + 1);
            let mut out = ct.values.clone();
            out.resize(len, 0.0);
            Ok(out)
        }

        fn add(&self, lhs: &MockCiphertext, rhs: &MockCiphertext) -> Result<MockCiphertext, MockError> {
            Ok(self.combine(lhs, rhs, |a, b| a + b))
        }

        fn subtract(
            &self,
            lhs: &MockCiphertext,
            rhs: &MockCiphertext,
        ) -> Result<MockCiphertext, MockError> {
            Ok(self.combine(lhs, rhs, |a, b| a - b))
        }

        fn multiply(
            &self,
            lhs: &MockCiphertext,
            rhs: &MockCiphertext,
        ) -> Result<MockCiphertext, MockError> {
            if lhs.level.min(rhs.level) < 2 {
                return Err(MockError("depth exhausted".into()));
            }
            let mut out = self.combine(lhs, rhs, |a, b| a * b);
            out.level -= 1;
            Ok(out)
        }

        fn level(&self, ct: &MockCiphertext) -> usize {
            ct.level
        }
    }
}

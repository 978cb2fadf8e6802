pub mod accuracy;
pub mod backend;
pub mod benchmark;
pub mod ckks;
pub mod codec;
pub mod config;
pub mod context;
pub mod encoding;
pub mod errors;
pub mod math;
pub mod operations;
pub mod rings;

pub use accuracy::{AccuracyEvaluator, AccuracyPolicy, AccuracyRecord, DEFAULT_MULTIPLY_THRESHOLD};
pub use backend::SchemeBackend;
pub use benchmark::{Benchmark, BenchmarkBuilder, BenchmarkJob, BenchmarkReport, PipelineState};
pub use ckks::{CkksBackend, CkksError};
pub use codec::CipherHandle;
pub use config::{ContextConfig, ContextConfigBuilder, SecurityLevel};
pub use context::{ContextId, SchemeContext};
pub use errors::{BenchError, BenchResult, Stage, StageError};
pub use operations::OperationKind;

/// Payload length of one flattened 28x28 image.
pub const DEFAULT_VECTOR_SIZE: usize = 784;

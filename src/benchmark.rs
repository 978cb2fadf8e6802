//! Benchmark orchestration: build, encrypt, compute, decrypt, verify, report.
//!
//! A run walks a strictly linear sequence of states and times every
//! transition on its own. The first failure aborts the run and is returned as
//! a [`StageError`]; no partial report is ever produced.

use crate::{
    accuracy::{AccuracyEvaluator, AccuracyPolicy, AccuracyRecord},
    backend::SchemeBackend,
    codec,
    config::ContextConfig,
    context::SchemeContext,
    errors::{BenchError, BenchResult, Stage, StageError},
    math::random_unit_vector,
    operations::{self, OperationKind},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::{
    marker::PhantomData,
    time::{Duration, Instant},
};
use tracing::{Dispatch, debug, info, info_span};

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Uninitialized,
    ContextBuilt,
    Encrypted,
    Computed,
    Decrypted,
    Verified,
    Reported,
}

impl PipelineState {
    /// The stage that leaves this state, if any.
    pub fn next_stage(self) -> Option<Stage> {
        match self {
            PipelineState::Uninitialized => Some(Stage::BuildContext),
            PipelineState::ContextBuilt => Some(Stage::Encrypt),
            PipelineState::Encrypted => Some(Stage::Compute),
            PipelineState::Computed => Some(Stage::Decrypt),
            PipelineState::Decrypted => Some(Stage::Verify),
            PipelineState::Verified => Some(Stage::Report),
            PipelineState::Reported => None,
        }
    }

    /// State reached once `stage` succeeds.
    pub fn after(stage: Stage) -> Self {
        match stage {
            Stage::BuildContext => PipelineState::ContextBuilt,
            Stage::Encrypt => PipelineState::Encrypted,
            Stage::Compute => PipelineState::Computed,
            Stage::Decrypt => PipelineState::Decrypted,
            Stage::Verify => PipelineState::Verified,
            Stage::Report => PipelineState::Reported,
        }
    }
}

/// Outcome of one successful run. Timings are wall-clock seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub vector_size: usize,
    pub max_slots: usize,
    pub context_build_seconds: f64,
    pub encrypt_seconds: f64,
    pub compute_seconds: f64,
    pub decrypt_seconds: f64,
    pub verify_seconds: f64,
    pub records: Vec<AccuracyRecord>,
}

impl BenchmarkReport {
    /// True iff every accuracy record passed.
    pub fn passed(&self) -> bool {
        self.records.iter().all(|r| r.passed)
    }

    pub fn record(&self, kind: OperationKind) -> Option<&AccuracyRecord> {
        self.records.iter().find(|r| r.kind == kind)
    }
}

/// One independent run for [`Benchmark::run_parallel`].
#[derive(Debug, Clone)]
pub struct BenchmarkJob {
    pub config: ContextConfig,
    pub vector_size: usize,
    /// Seeds the generator that draws the two input vectors.
    pub seed: u64,
}

// Tracks state and time budget for one run.
struct Pipeline {
    state: PipelineState,
    started: Instant,
    budget: Option<Duration>,
}

impl Pipeline {
    fn new(budget: Option<Duration>) -> Self {
        Self {
            state: PipelineState::Uninitialized,
            started: Instant::now(),
            budget,
        }
    }

    /// Runs `stage`, timing only `work`. The time budget is checked before
    /// every stage except the first.
    fn advance<T>(
        &mut self,
        stage: Stage,
        work: impl FnOnce() -> BenchResult<T>,
    ) -> Result<(T, f64), StageError> {
        debug_assert_eq!(self.state.next_stage(), Some(stage), "stages out of order");

        if let Some(budget) = self.budget.filter(|_| self.state != PipelineState::Uninitialized) {
            let elapsed = self.started.elapsed();
            if elapsed >= budget {
                return Err(StageError::new(
                    stage,
                    BenchError::DeadlineExceeded {
                        budget,
                        elapsed,
                        next: stage,
                    },
                ));
            }
        }

        let timer = Instant::now();
        let value = work().map_err(|source| StageError::new(stage, source))?;
        let seconds = timer.elapsed().as_secs_f64();

        self.state = PipelineState::after(stage);
        debug!(%stage, seconds, "stage complete");
        Ok((value, seconds))
    }
}

/// Drives the pipeline against a [`SchemeBackend`].
pub struct Benchmark<B> {
    policy: AccuracyPolicy,
    operations: Vec<OperationKind>,
    max_duration: Option<Duration>,
    dispatch: Option<Dispatch>,
    _backend: PhantomData<fn() -> B>,
}

impl<B> std::fmt::Debug for Benchmark<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Benchmark")
            .field("policy", &self.policy)
            .field("operations", &self.operations)
            .field("max_duration", &self.max_duration)
            .finish_non_exhaustive()
    }
}

impl<B: SchemeBackend> Default for Benchmark<B> {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<B: SchemeBackend> Benchmark<B> {
    pub fn builder() -> BenchmarkBuilder<B> {
        BenchmarkBuilder::new()
    }

    pub fn policy(&self) -> &AccuracyPolicy {
        &self.policy
    }

    /// Draws two `[0, 1)` vectors of `vector_size` from `rng` and runs them.
    pub fn run<R: Rng + ?Sized>(
        &self,
        config: &ContextConfig,
        vector_size: usize,
        rng: &mut R,
    ) -> Result<BenchmarkReport, StageError> {
        codec::check_capacity(vector_size, config.max_slots())
            .map_err(|source| StageError::new(Stage::Encrypt, source))?;
        let a = random_unit_vector(vector_size, rng);
        let b = random_unit_vector(vector_size, rng);
        self.run_with_vectors(config, &a, &b)
    }

    /// Runs the pipeline on caller-supplied operands.
    pub fn run_with_vectors(
        &self,
        config: &ContextConfig,
        a: &[f64],
        b: &[f64],
    ) -> Result<BenchmarkReport, StageError> {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || self.execute(config, a, b)),
            None => self.execute(config, a, b),
        }
    }

    /// Runs every job on its own scoped thread with its own context.
    /// Results come back in job order.
    pub fn run_parallel(&self, jobs: &[BenchmarkJob]) -> Vec<Result<BenchmarkReport, StageError>> {
        let dispatch = self
            .dispatch
            .clone()
            .unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone));

        std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .iter()
                .map(|job| {
                    let dispatch = &dispatch;
                    scope.spawn(move || {
                        tracing::dispatcher::with_default(dispatch, || {
                            let mut rng = ChaCha20Rng::seed_from_u64(job.seed);
                            self.run(&job.config, job.vector_size, &mut rng)
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
    }

    fn execute(
        &self,
        config: &ContextConfig,
        a: &[f64],
        b: &[f64],
    ) -> Result<BenchmarkReport, StageError> {
        let span = info_span!("benchmark", degree = config.ring_degree, vector_size = a.len());
        let _enter = span.enter();

        // Payload checks cost nothing and precede any key generation.
        let check_payload = || -> BenchResult<()> {
            if a.len() != b.len() {
                return Err(BenchError::InvalidInput(format!(
                    "operand lengths differ: {} and {}",
                    a.len(),
                    b.len()
                )));
            }
            codec::check_capacity(a.len(), config.max_slots())?;
            codec::check_finite(a)?;
            codec::check_finite(b)
        };
        check_payload().map_err(|source| StageError::new(Stage::Encrypt, source))?;

        let mut pipeline = Pipeline::new(self.max_duration);

        let (mut context, context_build_seconds) =
            pipeline.advance(Stage::BuildContext, || SchemeContext::<B>::build(config))?;
        info!(seconds = context_build_seconds, max_slots = context.max_slots(), "context built");

        let ((enc_a, enc_b), encrypt_seconds) = pipeline.advance(Stage::Encrypt, || {
            let enc_a = codec::encrypt(&mut context, a)?;
            let enc_b = codec::encrypt(&mut context, b)?;
            Ok((enc_a, enc_b))
        })?;
        info!(seconds = encrypt_seconds, level = enc_a.level(), "vectors encrypted");

        let (results, compute_seconds) = pipeline.advance(Stage::Compute, || {
            self.operations
                .iter()
                .map(|&kind| operations::apply(&context, kind, &enc_a, &enc_b))
                .collect::<BenchResult<Vec<_>>>()
        })?;
        info!(seconds = compute_seconds, operations = results.len(), "homomorphic operations done");

        let (decrypted, decrypt_seconds) = pipeline.advance(Stage::Decrypt, || {
            results
                .iter()
                .map(|result| -> BenchResult<_> {
                    Ok((result.kind, codec::decrypt(&context, &result.handle)?))
                })
                .collect::<BenchResult<Vec<_>>>()
        })?;
        info!(seconds = decrypt_seconds, "results decrypted");

        let evaluator = AccuracyEvaluator::new(self.policy);
        let (records, verify_seconds) = pipeline.advance(Stage::Verify, || {
            decrypted
                .iter()
                .map(|(kind, values)| evaluator.evaluate(a, b, values, *kind))
                .collect::<BenchResult<Vec<_>>>()
        })?;

        let (report, _) = pipeline.advance(Stage::Report, || {
            Ok(BenchmarkReport {
                vector_size: a.len(),
                max_slots: context.max_slots(),
                context_build_seconds,
                encrypt_seconds,
                compute_seconds,
                decrypt_seconds,
                verify_seconds,
                records,
            })
        })?;
        info!(passed = report.passed(), "benchmark complete");
        Ok(report)
    }
}

/// Builder for [`Benchmark`] in the style of the engine builders: every
/// setting is optional and falls back to a documented default.
pub struct BenchmarkBuilder<B> {
    policy: Option<AccuracyPolicy>,
    operations: Option<Vec<OperationKind>>,
    max_duration: Option<Duration>,
    dispatch: Option<Dispatch>,
    _backend: PhantomData<fn() -> B>,
}

impl<B: SchemeBackend> Default for BenchmarkBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SchemeBackend> BenchmarkBuilder<B> {
    pub fn new() -> Self {
        Self {
            policy: None,
            operations: None,
            max_duration: None,
            dispatch: None,
            _backend: PhantomData,
        }
    }

    /// Defaults to [`AccuracyPolicy::default`] (multiplication gated only).
    pub fn policy(mut self, policy: AccuracyPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Operations to run, in order. Defaults to add, subtract, multiply.
    pub fn operations(mut self, operations: impl Into<Vec<OperationKind>>) -> Self {
        self.operations = Some(operations.into());
        self
    }

    /// Time budget checked between stages. Unbounded by default.
    pub fn max_duration(mut self, budget: Duration) -> Self {
        self.max_duration = Some(budget);
        self
    }

    /// Logging sink for runs. Defaults to the caller's current subscriber.
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn build(self) -> Benchmark<B> {
        Benchmark {
            policy: self.policy.unwrap_or_default(),
            operations: self
                .operations
                .unwrap_or_else(|| OperationKind::ALL.to_vec()),
            max_duration: self.max_duration,
            dispatch: self.dispatch,
            _backend: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    fn config() -> ContextConfig {
        ContextConfig::new(8192, vec![60, 40, 40, 60], 2f64.powi(40))
    }

    #[test]
    fn state_sequence_is_linear() {
        let mut state = PipelineState::Uninitialized;
        let mut visited = vec![state];
        while let Some(stage) = state.next_stage() {
            state = PipelineState::after(stage);
            visited.push(state);
        }
        assert_eq!(
            visited,
            vec![
                PipelineState::Uninitialized,
                PipelineState::ContextBuilt,
                PipelineState::Encrypted,
                PipelineState::Computed,
                PipelineState::Decrypted,
                PipelineState::Verified,
                PipelineState::Reported,
            ]
        );
    }

    #[test]
    fn exact_backend_passes_every_gate() {
        let bench = Benchmark::<MockBackend>::default();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let report = bench.run(&config(), 784, &mut rng).unwrap();
        assert_eq!(report.vector_size, 784);
        assert_eq!(report.max_slots, 4096);
        assert_eq!(report.records.len(), 3);
        assert!(report.passed());
        let mul = report.record(OperationKind::Multiply).unwrap();
        assert_eq!(mul.threshold, Some(1e-5));
        assert_eq!(report.record(OperationKind::Add).unwrap().threshold, None);
    }

    #[test]
    fn oversized_payload_fails_before_context() {
        let bench = Benchmark::<MockBackend>::default();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let err = bench.run(&config(), 8193, &mut rng).unwrap_err();
        assert_eq!(err.stage, Stage::Encrypt);
        assert!(matches!(
            err.source,
            BenchError::CapacityExceeded {
                requested: 8193,
                max_slots: 4096
            }
        ));
    }

    #[test]
    fn payload_errors_are_attributed_to_encrypt() {
        let bench = Benchmark::<MockBackend>::default();
        let err = bench.run_with_vectors(&config(), &[], &[]).unwrap_err();
        assert_eq!(err.stage, Stage::Encrypt);
        assert!(matches!(err.source, BenchError::InvalidInput(_)));

        let err = bench
            .run_with_vectors(&config(), &[1.0, 2.0], &[1.0])
            .unwrap_err();
        assert_eq!(err.stage, Stage::Encrypt);
        assert!(matches!(err.source, BenchError::InvalidInput(_)));
    }

    #[test]
    fn non_finite_operands_fail_before_any_backend_work() {
        // the mock encrypts NaN happily, so an error here never came from it
        let bench = Benchmark::<MockBackend>::default();
        for (a, b) in [
            ([f64::NAN, 0.5], [0.5, 0.5]),
            ([0.5, 0.5], [0.5, f64::INFINITY]),
        ] {
            let err = bench.run_with_vectors(&config(), &a, &b).unwrap_err();
            assert_eq!(err.stage, Stage::Encrypt);
            assert!(matches!(err.source, BenchError::InvalidInput(_)));
        }
    }

    #[test]
    fn configuration_errors_fail_the_build_stage() {
        let bench = Benchmark::<MockBackend>::default();
        let mut config = config();
        config.modulus_chain_bits = vec![60, 60];
        let err = bench.run_with_vectors(&config, &[0.5], &[0.5]).unwrap_err();
        assert_eq!(err.stage, Stage::BuildContext);
        assert!(matches!(err.source, BenchError::Configuration(_)));
    }

    #[test]
    fn only_selected_operations_are_scored() {
        let bench = Benchmark::<MockBackend>::builder()
            .operations([OperationKind::Subtract])
            .build();
        let report = bench
            .run_with_vectors(&config(), &[0.5, 0.75], &[0.25, 0.25])
            .unwrap();
        assert_eq!(report.records.len(), 1);
        assert!(report.record(OperationKind::Multiply).is_none());
        assert_eq!(report.record(OperationKind::Subtract).unwrap().mean_squared_error, 0.0);
    }

    #[test]
    fn deadline_is_checked_between_stages() {
        let bench = Benchmark::<MockBackend>::builder()
            .max_duration(Duration::ZERO)
            .build();
        let err = bench
            .run_with_vectors(&config(), &[0.5], &[0.5])
            .unwrap_err();
        assert_eq!(err.stage, Stage::Encrypt);
        assert!(matches!(
            err.source,
            BenchError::DeadlineExceeded {
                next: Stage::Encrypt,
                ..
            }
        ));
    }

    #[test]
    fn thresholds_are_configurable() {
        let policy = AccuracyPolicy::default().with_threshold(OperationKind::Add, Some(1e-9));
        let bench = Benchmark::<MockBackend>::builder().policy(policy).build();
        let report = bench
            .run_with_vectors(&config(), &[0.5, 0.25], &[0.125, 1.0])
            .unwrap();
        assert_eq!(
            report.record(OperationKind::Add).unwrap().threshold,
            Some(1e-9)
        );
        assert!(report.passed());
    }

    #[test]
    fn parallel_jobs_keep_order_and_isolation() {
        let bench = Benchmark::<MockBackend>::default();
        let jobs = vec![
            BenchmarkJob {
                config: config(),
                vector_size: 16,
                seed: 1,
            },
            BenchmarkJob {
                config: config(),
                vector_size: 9000,
                seed: 2,
            },
            BenchmarkJob {
                config: config(),
                vector_size: 784,
                seed: 3,
            },
        ];
        let results = bench.run_parallel(&jobs);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().vector_size, 16);
        assert_eq!(results[1].as_ref().unwrap_err().stage, Stage::Encrypt);
        assert_eq!(results[2].as_ref().unwrap().vector_size, 784);
    }
}

use ckks_noise_bench::{
    AccuracyPolicy, BenchError, Benchmark, BenchmarkJob, CkksBackend, ContextConfig,
    OperationKind, SchemeContext, SecurityLevel, Stage, codec, operations,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::time::Duration;

fn default_config() -> ContextConfig {
    ContextConfig::builder()
        .ring_degree(8192)
        .modulus_chain_bits([60, 40, 40, 60])
        .scale_bits(40)
        .galois_keys(false)
        .seed(42)
        .build()
        .unwrap()
}

fn toy_config(bits: &[u32]) -> ContextConfig {
    ContextConfig::builder()
        .ring_degree(1024)
        .modulus_chain_bits(bits.to_vec())
        .scale_bits(30)
        .security_level(SecurityLevel::None)
        .galois_keys(false)
        .seed(7)
        .build()
        .unwrap()
}

fn toy_context(bits: &[u32]) -> SchemeContext<CkksBackend> {
    SchemeContext::build(&toy_config(bits)).unwrap()
}

#[test]
fn default_parameters_pass_on_an_image_sized_payload() {
    let bench = Benchmark::<CkksBackend>::default();
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let report = bench.run(&default_config(), 784, &mut rng).unwrap();

    assert_eq!(report.vector_size, 784);
    assert_eq!(report.max_slots, 4096);
    assert_eq!(report.records.len(), 3);
    assert!(report.passed(), "report failed: {report:?}");

    let mul = report.record(OperationKind::Multiply).unwrap();
    assert!(mul.mean_squared_error < 1e-5);
    for kind in [OperationKind::Add, OperationKind::Subtract] {
        let record = report.record(kind).unwrap();
        assert!(record.mean_squared_error < 1e-9, "{kind}: {record:?}");
        assert!(record.passed);
    }
    assert!(report.context_build_seconds >= 0.0);
}

#[test]
fn oversized_payload_fails_at_encrypt_without_timing() {
    let bench = Benchmark::<CkksBackend>::default();
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let err = bench.run(&default_config(), 8193, &mut rng).unwrap_err();
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
fn chain_without_depth_fails_at_context_build() {
    let mut config = default_config();
    config.modulus_chain_bits = vec![60, 60];
    let bench = Benchmark::<CkksBackend>::default();
    let err = bench
        .run_with_vectors(&config, &[0.5, 0.5], &[0.25, 0.25])
        .unwrap_err();
    assert_eq!(err.stage, Stage::BuildContext);
    assert!(matches!(err.source, BenchError::Configuration(_)));
}

#[test]
fn insecure_chain_is_rejected_under_default_security() {
    let mut config = default_config();
    config.modulus_chain_bits = vec![60, 60, 60, 60];
    let err = SchemeContext::<CkksBackend>::build(&config).unwrap_err();
    assert!(matches!(err, BenchError::Configuration(_)));
}

#[test]
fn roundtrip_through_handles() {
    let mut ctx = toy_context(&[50, 30, 30, 50]);
    let values = [0.0, 0.125, 0.5, 0.999, 0.3];
    let handle = codec::encrypt(&mut ctx, &values).unwrap();
    assert_eq!(handle.len(), values.len());
    assert_eq!(handle.level(), 3);

    let decrypted = codec::decrypt(&ctx, &handle).unwrap();
    assert_eq!(decrypted.len(), values.len());
    for (d, v) in decrypted.iter().zip(&values) {
        assert!((d - v).abs() < 1e-4, "{d} vs {v}");
    }
}

#[test]
fn zero_length_input_is_invalid() {
    let mut ctx = toy_context(&[50, 30, 30, 50]);
    assert!(matches!(
        codec::encrypt(&mut ctx, &[]),
        Err(BenchError::InvalidInput(_))
    ));

    let bench = Benchmark::<CkksBackend>::default();
    let err = bench
        .run_with_vectors(&toy_config(&[50, 30, 30, 50]), &[], &[])
        .unwrap_err();
    assert_eq!(err.stage, Stage::Encrypt);
    assert!(matches!(err.source, BenchError::InvalidInput(_)));
}

#[test]
fn non_finite_operands_are_invalid_input() {
    let bench = Benchmark::<CkksBackend>::default();
    let err = bench
        .run_with_vectors(
            &toy_config(&[50, 30, 30, 50]),
            &[f64::NAN, 0.5],
            &[0.5, 0.5],
        )
        .unwrap_err();
    assert_eq!(err.stage, Stage::Encrypt);
    assert!(matches!(err.source, BenchError::InvalidInput(_)));

    let mut ctx = toy_context(&[50, 30, 30, 50]);
    assert!(matches!(
        codec::encrypt(&mut ctx, &[0.25, f64::NEG_INFINITY]),
        Err(BenchError::InvalidInput(_))
    ));
}

#[test]
fn handles_do_not_cross_contexts() {
    let mut first = toy_context(&[50, 30, 30, 50]);
    let mut second = toy_context(&[50, 30, 30, 50]);
    let a = codec::encrypt(&mut first, &[0.5]).unwrap();
    let b = codec::encrypt(&mut second, &[0.5]).unwrap();

    assert!(matches!(
        operations::add(&first, &a, &b),
        Err(BenchError::ContextMismatch { .. })
    ));
    assert!(matches!(
        codec::decrypt(&second, &a),
        Err(BenchError::ContextMismatch { .. })
    ));
}

#[test]
fn multiplication_consumes_levels_until_exhausted() {
    let mut ctx = toy_context(&[50, 30, 50]);
    let a = codec::encrypt(&mut ctx, &[0.5, 0.25]).unwrap();
    let b = codec::encrypt(&mut ctx, &[0.5, 0.5]).unwrap();
    assert_eq!(a.level(), 2);

    let sum = operations::add(&ctx, &a, &b).unwrap();
    assert_eq!(sum.level(), 2);

    let product = operations::multiply(&ctx, &a, &b).unwrap();
    assert_eq!(product.level(), 1);
    let decrypted = codec::decrypt(&ctx, &product).unwrap();
    assert!((decrypted[0] - 0.25).abs() < 1e-3);
    assert!((decrypted[1] - 0.125).abs() < 1e-3);

    assert!(matches!(
        operations::multiply(&ctx, &product, &product),
        Err(BenchError::Backend { .. })
    ));
}

#[test]
fn add_and_subtract_are_far_more_accurate_than_the_gate() {
    let bench = Benchmark::<CkksBackend>::builder()
        .policy(AccuracyPolicy::ungated())
        .build();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let report = bench
        .run(&toy_config(&[50, 30, 30, 50]), 512, &mut rng)
        .unwrap();
    for record in &report.records {
        assert!(record.threshold.is_none());
        assert!(record.mean_squared_error < 1e-7, "{record:?}");
    }
}

#[test]
fn exhausted_time_budget_stops_before_encrypting() {
    let bench = Benchmark::<CkksBackend>::builder()
        .max_duration(Duration::ZERO)
        .build();
    let err = bench
        .run_with_vectors(&toy_config(&[50, 30, 30, 50]), &[0.5], &[0.5])
        .unwrap_err();
    assert_eq!(err.stage, Stage::Encrypt);
    assert!(matches!(err.source, BenchError::DeadlineExceeded { .. }));
}

#[test]
fn seeded_runs_are_reproducible() {
    let bench = Benchmark::<CkksBackend>::default();
    let config = toy_config(&[50, 30, 30, 50]);
    let first = bench
        .run(&config, 64, &mut ChaCha20Rng::seed_from_u64(9))
        .unwrap();
    let second = bench
        .run(&config, 64, &mut ChaCha20Rng::seed_from_u64(9))
        .unwrap();
    assert_eq!(first.records, second.records);
}

#[test]
fn parallel_jobs_each_build_their_own_context() {
    let bench = Benchmark::<CkksBackend>::default();
    let jobs: Vec<BenchmarkJob> = [16, 600, 300]
        .into_iter()
        .zip(1u64..)
        .map(|(vector_size, seed)| BenchmarkJob {
            config: toy_config(&[50, 30, 30, 50]),
            vector_size,
            seed,
        })
        .collect();

    let results = bench.run_parallel(&jobs);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().vector_size, 16);
    let err = results[1].as_ref().unwrap_err();
    assert_eq!(err.stage, Stage::Encrypt);
    assert!(matches!(err.source, BenchError::CapacityExceeded { .. }));
    assert!(results[2].as_ref().unwrap().passed());
}

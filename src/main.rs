#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use ckks_noise_bench::{
    AccuracyPolicy, Benchmark, BenchmarkJob, BenchmarkReport, CkksBackend, ContextConfig,
    DEFAULT_MULTIPLY_THRESHOLD, DEFAULT_VECTOR_SIZE, OperationKind, SecurityLevel,
};
use clap::Parser;
use serde::Serialize;
use std::{error::Error, path::PathBuf, process::ExitCode, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "CKKS encrypted arithmetic accuracy benchmark", long_about = None)]
struct Args {
    /// Polynomial ring degree N (power of two)
    #[arg(long, default_value_t = 8192)]
    ring_degree: usize,
    /// Bit sizes of the modulus chain, special prime last
    #[arg(long, value_delimiter = ',', default_value = "60,40,40,60")]
    modulus_bits: Vec<u32>,
    /// Encoding scale as a power of two
    #[arg(long, default_value_t = 40)]
    scale_bits: u32,
    /// Payload length; repeat for several independent runs
    #[arg(long, value_delimiter = ',', default_values_t = [DEFAULT_VECTOR_SIZE])]
    vector_size: Vec<usize>,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Abort a run once this many seconds have passed between stages
    #[arg(long)]
    max_duration_secs: Option<f64>,
    /// Write one CSV row per operation and run
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Skip the 128-bit security bound on the modulus chain
    #[arg(long)]
    insecure: bool,
    #[arg(long)]
    no_galois_keys: bool,
    #[arg(long)]
    add_threshold: Option<f64>,
    #[arg(long)]
    sub_threshold: Option<f64>,
    #[arg(long, default_value_t = DEFAULT_MULTIPLY_THRESHOLD)]
    mul_threshold: f64,
}

#[derive(Debug, Serialize)]
struct CsvRow {
    vector_size: usize,
    operation: OperationKind,
    mean_squared_error: f64,
    max_abs_error: f64,
    threshold: Option<f64>,
    passed: bool,
    context_build_seconds: f64,
    encrypt_seconds: f64,
    compute_seconds: f64,
    decrypt_seconds: f64,
    verify_seconds: f64,
}

fn csv_rows(report: &BenchmarkReport) -> impl Iterator<Item = CsvRow> + '_ {
    report.records.iter().map(|record| CsvRow {
        vector_size: report.vector_size,
        operation: record.kind,
        mean_squared_error: record.mean_squared_error,
        max_abs_error: record.max_abs_error,
        threshold: record.threshold,
        passed: record.passed,
        context_build_seconds: report.context_build_seconds,
        encrypt_seconds: report.encrypt_seconds,
        compute_seconds: report.compute_seconds,
        decrypt_seconds: report.decrypt_seconds,
        verify_seconds: report.verify_seconds,
    })
}

fn log_report(report: &BenchmarkReport) {
    info!(
        vector_size = report.vector_size,
        max_slots = report.max_slots,
        "context build {:.3}s, encrypt {:.3}s, compute {:.3}s, decrypt {:.3}s, verify {:.3}s",
        report.context_build_seconds,
        report.encrypt_seconds,
        report.compute_seconds,
        report.decrypt_seconds,
        report.verify_seconds
    );
    for record in &report.records {
        let status = if record.passed { "PASSED" } else { "WARNING" };
        match record.threshold {
            Some(limit) => info!(
                "{} MSE: {:.3e} (max error {:.3e}, threshold {:.0e}) {status}",
                record.kind, record.mean_squared_error, record.max_abs_error, limit
            ),
            None => info!(
                "{} MSE: {:.3e} (max error {:.3e}) {status}",
                record.kind, record.mean_squared_error, record.max_abs_error
            ),
        }
    }
}

fn run(args: Args) -> Result<bool, Box<dyn Error>> {
    let security = if args.insecure {
        SecurityLevel::None
    } else {
        SecurityLevel::Tc128
    };
    let config = ContextConfig::builder()
        .ring_degree(args.ring_degree)
        .modulus_chain_bits(args.modulus_bits)
        .scale_bits(args.scale_bits)
        .security_level(security)
        .galois_keys(!args.no_galois_keys)
        .seed(args.seed)
        .build()?;

    let policy = AccuracyPolicy::ungated()
        .with_threshold(OperationKind::Add, args.add_threshold)
        .with_threshold(OperationKind::Subtract, args.sub_threshold)
        .with_threshold(OperationKind::Multiply, Some(args.mul_threshold));

    let mut builder = Benchmark::<CkksBackend>::builder().policy(policy);
    if let Some(secs) = args.max_duration_secs {
        builder = builder.max_duration(Duration::try_from_secs_f64(secs)?);
    }
    let bench = builder.build();

    let jobs: Vec<BenchmarkJob> = args
        .vector_size
        .iter()
        .zip(0u64..)
        .map(|(&vector_size, i)| BenchmarkJob {
            config: config.clone(),
            vector_size,
            seed: args.seed.wrapping_add(i),
        })
        .collect();
    info!(
        degree = config.ring_degree,
        chain = ?config.modulus_chain_bits,
        jobs = jobs.len(),
        "starting benchmark"
    );

    let mut writer = args.csv.as_ref().map(csv::Writer::from_path).transpose()?;
    let mut all_passed = true;
    for (job, result) in jobs.iter().zip(bench.run_parallel(&jobs)) {
        match result {
            Ok(report) => {
                log_report(&report);
                if !report.passed() {
                    warn!(vector_size = job.vector_size, "accuracy gate failed");
                    all_passed = false;
                }
                if let Some(writer) = writer.as_mut() {
                    for row in csv_rows(&report) {
                        writer.serialize(row)?;
                    }
                }
            }
            Err(err) => {
                error!(vector_size = job.vector_size, stage = %err.stage, "{err}");
                all_passed = false;
            }
        }
    }
    if let Some(mut writer) = writer {
        writer.flush()?;
    }
    Ok(all_passed)
}

fn main() -> ExitCode {
    #[cfg(feature = "dhat-heap")]
    let _dhat = dhat::Profiler::new_heap();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

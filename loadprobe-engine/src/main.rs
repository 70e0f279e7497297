use anyhow::Context;
use clap::Parser;
use loadprobe_client::StaticAuthResolver;
use loadprobe_common::{PerformanceResult, TestConfig};
use loadprobe_engine::LoadTest;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loadprobe", about = "Run a load test described by a JSON config file")]
struct Args {
    /// Path to the JSON test configuration
    #[arg(long)]
    config: PathBuf,

    /// Write the full JSON result to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Bearer token registered under the config's authProfile
    #[arg(long, env = "LOADPROBE_BEARER_TOKEN")]
    bearer_token: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e:#}");
        process::exit(3);
    });

    let mut resolver = StaticAuthResolver::new();
    if let (Some(profile), Some(token)) = (&config.auth_profile, &args.bearer_token) {
        resolver = resolver.with_bearer(profile.clone(), token);
    }

    // Ctrl-C stops workers at their next iteration; the partial run is still reported.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let result = LoadTest::new(config)
        .with_auth_resolver(Arc::new(resolver))
        .with_cancellation(cancel)
        .run()
        .await;

    if let Some(path) = &args.output {
        if let Err(e) = write_result(path, &result) {
            eprintln!("Failed to write result: {e:#}");
            process::exit(3);
        }
    }

    print_report(&result);

    let exit_code = if !result.errors.is_empty() {
        2
    } else if !result.success {
        1
    } else {
        0
    };
    process::exit(exit_code);
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("global tracing subscriber already set");
    }
}

fn load_config(args: &Args) -> anyhow::Result<TestConfig> {
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", args.config.display()))
}

fn write_result(path: &PathBuf, result: &PerformanceResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn print_report(result: &PerformanceResult) {
    if !result.errors.is_empty() {
        println!("Load test rejected");
        for error in &result.errors {
            println!("  - {error}");
        }
        return;
    }

    let summary = &result.summary;
    let rt = &result.metrics.response_time;

    println!("Load Test Results ({})", result.test_id);
    println!("=================================================");
    println!("Duration:              {:.1} s", summary.duration_seconds);
    println!("Virtual users:         {}", summary.concurrency);
    println!();
    println!("Requests:              {}", format_thousands(summary.total_requests));
    println!("Failed:                {}", format_thousands(summary.failed_requests));
    println!("Error rate:            {:.3}%", summary.error_rate);
    println!("Throughput:            {:.1} rps", summary.requests_per_second);
    if summary.iterations > 0 {
        println!("Scenario iterations:   {}", summary.iterations);
    }
    println!();
    println!("Avg latency:           {:.1} ms", rt.avg);
    println!("P50 latency:           {:.1} ms", rt.median);
    println!("P95 latency:           {:.1} ms", rt.p95);
    println!("P99 latency:           {:.1} ms", rt.p99);
    println!("Max latency:           {:.1} ms", rt.max);

    if !result.threshold_results.is_empty() {
        println!();
        for threshold in &result.threshold_results {
            let mark = if threshold.passed { "✓" } else { "✗" };
            println!("{mark} {}", threshold.description);
        }
    }
    if !result.validation_failures.is_empty() {
        println!();
        println!("Validation failures:   {}", result.validation_failures.len());
    }

    println!();
    println!("Result: {}", if result.success { "PASS" } else { "FAIL" });
}

fn format_thousands(n: u64) -> String {
    if n >= 1_000_000 {
        format!("~{}M", n / 1_000_000)
    } else if n >= 1_000 {
        format!("~{}K", n / 1_000)
    } else {
        n.to_string()
    }
}

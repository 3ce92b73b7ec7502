use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flow_verification::config::Config;
use flow_verification::services::{TraceVerification, VerificationContext, VerificationService};

#[derive(Parser)]
#[command(name = "verify-traces")]
#[command(about = "Verify model predictions against flow survey observations", long_about = None)]
struct Cli {
    /// Interchange file exported from the modelling package
    file: PathBuf,

    /// Predicted profile to verify when the file carries several (0-based)
    #[arg(long, env = "PREDICTED_PROFILE_INDEX")]
    profile: Option<usize>,

    /// Score depth with the critical-location tolerance
    #[arg(long)]
    critical: bool,

    /// Score depth with the surcharged envelope
    #[arg(long)]
    surcharged: bool,

    /// Score depth only; flow is left unscored
    #[arg(long)]
    depth_only: bool,

    /// Smoothing window as a fraction of the series length (0 disables)
    #[arg(long, env = "VERIFY_SMOOTHING_FRACTION")]
    smoothing: Option<f64>,

    /// Keep only this many of the most prominent peaks per series
    #[arg(long, env = "PEAK_MAX_COUNT")]
    max_peaks: Option<usize>,

    /// Number of traces verified in parallel
    #[arg(long, env = "VERIFY_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
struct Report {
    file: String,
    predicted_profiles: Vec<String>,
    verifications: Vec<TraceVerification>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,flow_verification=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(profile) = cli.profile {
        config.profile_index = profile;
    }
    if let Some(smoothing) = cli.smoothing {
        config.smoothing_fraction = smoothing.clamp(0.0, 1.0);
    }
    if let Some(max_peaks) = cli.max_peaks {
        config.peak_max_count = Some(max_peaks);
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency.max(1);
    }
    info!("Starting verification with config: {:?}", config);

    if cli.critical && cli.surcharged {
        warn!("Both --critical and --surcharged given; critical tolerances apply");
    }

    let context = VerificationContext {
        is_critical: cli.critical,
        is_surcharged: cli.surcharged,
        is_depth_only: cli.depth_only,
        smoothing_fraction: config.smoothing_fraction,
    };

    let bytes = tokio::fs::read(&cli.file).await?;
    info!("Read {} bytes from {}", bytes.len(), cli.file.display());

    let service = Arc::new(VerificationService::from_config(&config));

    let parse_start = Instant::now();
    let parse_service = Arc::clone(&service);
    let parsed = tokio::task::spawn_blocking(move || parse_service.parse_file(&bytes)).await?;
    info!(
        "Parsed {} traces in {:?}",
        parsed.monitors.len(),
        parse_start.elapsed()
    );

    for e in &parsed.errors {
        error!("{}", e);
    }

    let verify_start = Instant::now();
    let results: Vec<_> = stream::iter(parsed.monitors)
        .map(|trace| {
            let service = Arc::clone(&service);
            let context = context.clone();
            tokio::task::spawn_blocking(move || service.verify_trace(&trace, &context))
        })
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let mut verifications = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(verification) => verifications.push(verification),
            Err(e) => error!("Verification task failed: {}", e),
        }
    }
    verifications.sort_by_key(|v| v.page_index);

    for v in &verifications {
        info!(
            "Page {}: {} -> {}: {}",
            v.page_index, v.obs_location_name, v.pred_location_name, v.outcome.overall_status
        );
    }
    info!(
        "Verified {} traces in {:?}",
        verifications.len(),
        verify_start.elapsed()
    );

    let report = Report {
        file: cli.file.display().to_string(),
        predicted_profiles: parsed.predicted_profiles,
        verifications,
        errors: parsed.errors,
        warnings: parsed.warnings,
    };

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(())
}

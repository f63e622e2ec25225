use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidconv_core::{
    load_config_or_default, metrics, spawn_conversion, validate_config, Config,
    ConversionRequest, FfmpegConverter, OutputFormat,
};

/// Environment variable naming the config file when `--config` is absent.
const CONFIG_ENV: &str = "VIDCONV_CONFIG";

/// Convert a video file with ffmpeg, showing live progress.
#[derive(Debug, Parser)]
#[command(name = "vidconv", version)]
struct Args {
    /// Video file to convert
    input: PathBuf,

    /// Output container: mp4, avi, mkv or webm
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// CRF quality, 0-51 (lower is better)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics when done
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Args::parse()).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    match &config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No config file given, using defaults and environment"),
    }
    let config = load_config_or_default(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let request = resolve_request(&args, &config)?;

    let converter = Arc::new(
        FfmpegConverter::new(config.converter.clone()).context("Failed to set up ffmpeg")?,
    );

    info!(
        "Converting {:?} to {} (quality {})",
        request.input_path(),
        request.format(),
        request.quality()
    );

    let mut handle = spawn_conversion(converter, request, config.converter.progress_buffer);

    // Ctrl+C cancels the conversion; the child process is killed.
    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling conversion");
            cancel.cancel();
        }
    });

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        )
        .context("Invalid progress bar template")?
        .progress_chars("#>-"),
    );
    pb.set_message("Starting...");

    while let Some(update) = handle.next_update().await {
        pb.set_position(percent(update.progress));
        pb.set_message(update.to_string());
    }

    let result = handle.wait().await;
    match &result {
        Ok(_) => pb.finish_with_message("Done"),
        Err(e) => pb.abandon_with_message(format!("Error: {}", e)),
    }

    if args.metrics {
        print!("{}", metrics::encode_metrics());
    }

    let output = result.context("Conversion failed")?;
    println!("{}", output.display());
    Ok(())
}

/// Builds the request from arguments, falling back to configured defaults.
fn resolve_request(args: &Args, config: &Config) -> Result<ConversionRequest> {
    let format = args.format.unwrap_or(config.defaults.format);
    let quality = args.quality.unwrap_or(config.defaults.quality);
    ConversionRequest::new(&args.input, format, quality).context("Invalid conversion request")
}

/// Bar position for a progress value, capped at 100.
fn percent(progress: f64) -> u64 {
    (progress * 100.0).clamp(0.0, 100.0) as u64
}

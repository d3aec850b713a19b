#![forbid(unsafe_code)]

//! `linecast`: run a process and broadcast its output lines.
//!
//! Loads the TOML configuration, opens every configured destination,
//! launches the process, and relays its stdout and stderr into all of them
//! until the process exits or a shutdown signal arrives.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use linecast::config::GlobalConfig;
use linecast::sink::LineSink;
use linecast::supervisor::{self, ExitReport};
use linecast::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "linecast", about = "Broadcast a process's output lines", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the working directory of the launched process.
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Command to run instead of the configured one.
    #[arg(last = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("linecast: {err}");
        return ExitCode::FAILURE;
    }
    info!("linecast bootstrap");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(report) => exit_code_for(&report),
        Err(err) => {
            error!(%err, "linecast failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<ExitReport> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.override_command(&args.command);

    if let Some(dir) = args.workdir {
        let canonical = dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("invalid workdir override: {err}")))?;
        config.process.working_dir = Some(canonical);
    }
    info!(program = config.process.program.as_str(), "configuration loaded");

    // ── Open destinations ───────────────────────────────
    let sink: Arc<dyn LineSink> = Arc::new(config.build_sinks()?);

    // ── Supervise until exit or shutdown signal ─────────
    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    let signal_handle = tokio::spawn(async move {
        supervisor::shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    let report = supervisor::supervise(&config.launch_config(), sink, ct).await;
    signal_handle.abort();

    let report = report?;
    if let Some(err) = &report.close_error {
        error!(%err, "some destinations failed to close");
    }
    info!(reason = report.reason.as_str(), "linecast shut down");
    Ok(report)
}

fn exit_code_for(report: &ExitReport) -> ExitCode {
    match report.exit_code.and_then(|code| u8::try_from(code).ok()) {
        Some(code) => ExitCode::from(code),
        None => ExitCode::FAILURE,
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    // Logs go to stderr so a `stdout` sink carries only relayed lines.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}

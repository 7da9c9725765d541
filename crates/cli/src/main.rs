//! buildhook CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load `buildhook.toml` (or `--config`) and
//!    validate it.
//! 2. **Wire observability**: install a `tracing-subscriber` fmt layer and,
//!    when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry OTLP layer.
//! 3. **Construct infrastructure**: build the job registry, pick the executor
//!    adapter, and inject both into the [`dispatch::EventRouter`].
//! 4. **Select intake mode**:
//!    - `dispatch`: route exactly one envelope from a file or stdin.
//!    - `serve`: stream newline-delimited envelopes from stdin, one task per event.
//!    - `jobs`: list the configured jobs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use listener::JsonLinesEventSource;
use tracing::error;

mod commands;
mod config;
mod telemetry;

use telemetry::LogFormat;

#[derive(Parser)]
#[command(name = "buildhook")]
#[command(author, version, about = "Turns source-control events into container build jobs", long_about = None)]
struct Cli {
    /// Configuration file. Defaults to ./buildhook.toml when present.
    #[arg(long, global = true, env = "BUILDHOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a single event envelope.
    Dispatch {
        /// Envelope file, or `-` for stdin.
        #[arg(long, default_value = "-")]
        event: String,

        /// Print job descriptions instead of executing them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Route newline-delimited envelopes from stdin until end of input.
    Serve {
        /// Print job descriptions instead of executing them.
        #[arg(long)]
        dry_run: bool,
    },
    /// List the configured jobs.
    Jobs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = match telemetry::init(cli.log_format) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("buildhook: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "buildhook failed");
    }
    telemetry.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Dispatch { event, dry_run } => {
            let executor = commands::build_executor(&config, dry_run)?;
            let router = commands::build_router(&config.dispatch, executor)?;
            commands::dispatch_one(&router, &event).await?;
        }
        Commands::Serve { dry_run } => {
            let executor = commands::build_executor(&config, dry_run)?;
            let router = commands::build_router(&config.dispatch, executor)?;
            commands::serve(router, JsonLinesEventSource::stdin()).await?;
        }
        Commands::Jobs => {
            commands::list_jobs(&config.dispatch, &mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}

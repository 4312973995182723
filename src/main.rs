//! Labflow CLI: batch pipeline for validated, partitioned lab-result records.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

use labflow::error::AddressParseSnafu;
use labflow::{
    init_tracing, metrics, run_polling_loop, shutdown_signal, Config, Containers,
    IngestProcessor, PipelineError, PollingProcessor,
};

#[derive(Parser)]
#[command(name = "labflow", about = "Lab-result batch pipeline", version)]
struct CliArgs {
    /// Path to the YAML config file
    #[arg(short, long, env = "LABFLOW_CONFIG", default_value = "labflow.yaml")]
    config: PathBuf,

    /// Drain the landing zone once and exit instead of polling
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending deletion requests and exit
    Deletions,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Pipeline failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<(), PipelineError> {
    let config = Config::from_file(&args.config).await?;

    if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr)?;
        info!(%addr, "Metrics server started");
    }

    let containers = Containers::from_config(&config).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let mut processor = IngestProcessor::new(&containers, shutdown.clone());

    if let Some(Command::Deletions) = args.command {
        info!("Running standalone deletion pass");
        processor.run_deletion_pass().await?;
        return Ok(());
    }

    if args.once {
        info!("Draining landing zone once");
        if let Some(files) = processor.prepare().await? {
            processor.process(files).await?;
        }
        return Ok(());
    }

    info!(
        poll_interval_secs = config.poll_interval_secs,
        "Starting labflow pipeline"
    );
    run_polling_loop(
        &mut processor,
        Duration::from_secs(config.poll_interval_secs),
        shutdown,
        "labflow",
    )
    .await
}

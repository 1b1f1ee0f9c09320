mod cli;
mod ui;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use batchsync::config::{FileConfig, SyncConfig};
use batchsync::{BatchClient, BatchService, JobSpec, SyncError, Synchronizer, TerminationSummary};
use cli::Cli;

fn init_tracing(verbose: bool) {
    let default = if verbose { "batchsync=debug" } else { "batchsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let started = Instant::now();
    let result = run(cli).await;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(true) => {
            info!("Time taken to execute is {elapsed:.3} seconds");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            warn!("Some jobs failed, took {elapsed:.3} seconds");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every submitted job succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let file = FileConfig::load(cli.conf.as_deref())?;
    let config = SyncConfig::resolve(file, cli.overrides(), std::env::var("AWS_REGION").ok())?;

    let client = match &config.endpoint {
        Some(endpoint) => BatchClient::with_base_url(endpoint.clone()),
        None => BatchClient::new(&config.region),
    }
    .context("failed to build batch client")?;
    info!(endpoint = client.base_url(), "connecting to batch service");

    let sync = Synchronizer::new(client);
    let resources = sync.initialize(config).await?;
    ui::print_resources(resources);
    sync.monitor()?;

    // Load every file up front so a bad file aborts before anything is submitted.
    let mut specs = Vec::new();
    for path in &cli.job_specs {
        specs.extend(JobSpec::load(path)?);
    }
    for spec in specs {
        let job = sync.submit(spec).await?;
        if let Some(reason) = &job.failure_reason {
            warn!(name = %job.name, %reason, "job was not submitted");
        }
    }
    sync.signal_drain();

    let progress = ui::RunProgress::start();
    let mut interrupts = forward_interrupts();
    let outcome = wait_for_jobs(&sync, &mut interrupts, |summary| progress.update(summary)).await;
    progress.finish(&sync.jobs());

    match outcome {
        Ok(summary) => Ok(summary.all_succeeded()),
        Err(SyncError::ShutDown) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Forwards every Ctrl-C to a channel for as long as the receiver lives.
fn forward_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Waits for every job to finish, reporting progress once a second.
///
/// The first interrupt shuts the monitor down and keeps waiting for it to
/// stop. A second one gives up right away.
async fn wait_for_jobs<S: BatchService + 'static>(
    sync: &Synchronizer<S>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
    mut on_tick: impl FnMut(&TerminationSummary),
) -> Result<TerminationSummary, SyncError> {
    let wait = sync.await_termination();
    tokio::pin!(wait);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut interrupted = false;

    loop {
        tokio::select! {
            outcome = &mut wait => return outcome,
            _ = ticker.tick() => on_tick(&sync.summary()),
            Some(()) = interrupts.recv() => {
                if interrupted {
                    warn!("interrupted again, exiting without waiting for the monitor");
                    return Err(SyncError::ShutDown);
                }
                warn!("interrupted, stopping the status monitor");
                interrupted = true;
                sync.shutdown();
            }
        }
    }
}

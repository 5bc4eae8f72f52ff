//! build-relay - Distributed Compilation Dispatcher
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use build_relay::config::{CliArgs, Command, DispatchConfig, PlanConfig, WorkerSource};
use build_relay::discovery::ConsulDiscovery;
use build_relay::dispatch::{DispatchEngine, DispatchStats, WorkerPool};
use build_relay::error::RelayError;
use build_relay::progress::{print_header, print_summary, ProgressReporter};
use build_relay::task::{CompdbExtractor, TaskResolver};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    match args.command {
        Command::Dispatch(dispatch_args) => {
            let config = DispatchConfig::from_args(dispatch_args).context("Invalid configuration")?;
            run_dispatch(config)
        }
        Command::Plan(plan_args) => {
            let config = PlanConfig::from_args(plan_args).context("Invalid configuration")?;
            run_plan(config)
        }
    }
}

/// Print resolved units as JSON
fn run_plan(config: PlanConfig) -> Result<()> {
    let json = match config {
        PlanConfig::Descriptor {
            workspace,
            compile_file,
        } => {
            let units = TaskResolver::new(&workspace)
                .resolve(&compile_file)
                .context("Failed to resolve build units")?;
            serde_json::to_string_pretty(&units)?
        }
        PlanConfig::Compdb(file) => {
            let units = CompdbExtractor::new(file)
                .load()
                .context("Failed to load compilation database")?;
            serde_json::to_string_pretty(&units)?
        }
    };

    println!("{}", json);
    Ok(())
}

fn run_dispatch(config: DispatchConfig) -> Result<()> {
    let units = TaskResolver::new(&config.workspace)
        .resolve(&config.compile_file)
        .context("Failed to resolve build units")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(async {
        let addresses = match &config.worker_source {
            WorkerSource::Static(addresses) => addresses.clone(),
            WorkerSource::Discovery(ip) => {
                let discovery = ConsulDiscovery::for_agent(*ip, config.disk_policy, config.worker_port)?;
                discovery.lookup().await.context("Worker discovery failed")?
            }
        };

        let pool = WorkerPool::connect(&addresses, config.pool)
            .await
            .context("Failed to connect to workers")?;

        if config.show_progress {
            print_header(
                &config.workspace.display().to_string(),
                &config.compile_file,
                pool.size(),
                pool.failures().len(),
            );
        }

        let stats = dispatch(&config, &units, &pool).await?;

        if config.show_progress {
            print_summary(&stats, &config.workspace.display().to_string());
        } else {
            info!(
                units = stats.units,
                targets = stats.targets_received,
                "Dispatch finished"
            );
        }

        Ok::<(), anyhow::Error>(())
    })
}

/// Run the engine until it finishes or Ctrl-C arrives
async fn dispatch(
    config: &DispatchConfig,
    units: &[build_relay::BuildUnit],
    pool: &WorkerPool,
) -> Result<DispatchStats> {
    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Dispatching build units...");
    }

    let engine = DispatchEngine::new(&config.workspace);
    let run = engine.dispatch_with_progress(units, pool, config.deadline, |update| {
        if let Some(ref p) = progress {
            p.update(update);
        }
    });

    let result: Result<DispatchStats> = tokio::select! {
        result = run => result.context("Dispatch failed"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for interrupt signal")?;
            eprintln!("\nInterrupt received, shutting down...");
            Err(RelayError::Interrupted.into())
        }
    };

    if let Some(ref p) = progress {
        match &result {
            Ok(_) => p.finish("Dispatch completed"),
            Err(_) => p.finish_and_clear(),
        }
    }

    result
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("build_relay=debug,warn")
    } else {
        EnvFilter::new("build_relay=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

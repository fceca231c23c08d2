use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use mr_pipeline::artifact::combine_artifacts;
use mr_pipeline::{
    CliArgs, JobConfig, MapReduce, ParallelMapReduce, RunReport, SequentialMapReduce, WordCount,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    setup_logging(args.verbose);

    match run(args).await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            let failed: Vec<String> = report.failed_workers().map(|w| w.to_string()).collect();
            error!(count = failed.len(), workers = ?failed, "run finished with failed workers");
            eprintln!("Error: {} worker(s) failed: {}", failed.len(), failed.join(", "));
            ExitCode::from(1)
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: CliArgs) -> Result<RunReport> {
    let config = JobConfig::from_args(&args).context("Invalid configuration")?;
    let app = Arc::new(WordCount {});

    let report = if args.sequential {
        SequentialMapReduce::new(config, app)
            .run()
            .await
            .context("Sequential run failed")?
    } else {
        ParallelMapReduce::new(config, app)
            .run()
            .await
            .context("Failed to start workers")?
    };

    info!(
        files = report.files_dispatched,
        skipped = report.files_skipped,
        lost = report.files_lost,
        pairs = report.pairs_shuffled,
        dropped = report.pairs_dropped,
        "summary"
    );

    // a failed reduce worker may have left no artifact behind
    if let Some(dest) = args.combine.as_ref().filter(|_| report.is_success()) {
        combine_artifacts(&report.artifacts, dest)
            .with_context(|| format!("Failed to combine output into {}", dest.display()))?;
    }

    Ok(report)
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mr_pipeline=debug,warn")
    } else {
        EnvFilter::new("mr_pipeline=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

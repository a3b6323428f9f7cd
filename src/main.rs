use clap::Parser;
use shardfix::error::BatchError;
use shardfix::logging::init_tracing;
use shardfix::{CliArgs, ProgressTracker, run_batch};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(&args.log_level);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = %config.version,
        dataset = %config.dataset,
        granularity = ?config.granularity,
        parse_mode = ?config.pipeline.parse_mode,
        "shardfix starting"
    );

    let progress = ProgressTracker::new();
    match run_batch(&config, &progress) {
        Ok(report) => {
            info!(
                admitted = report.admitted,
                peak_concurrency = report.peak_concurrency,
                "batch finished"
            );
            println!("{}", progress.summary());
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(batch) = e.downcast_ref::<BatchError>() {
                for failure in &batch.failures {
                    error!(unit = %failure.label, "{:#}", failure.error);
                }
            }
            error!("{e:#}");
            eprintln!("{}", progress.summary());
            ExitCode::FAILURE
        }
    }
}

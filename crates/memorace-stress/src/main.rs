use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use humantime::parse_duration;
use memorace::config::Config;

mod logging;
mod stresstest;
mod workloads;

use stresstest::perform_stresstest;
use workloads::WorkloadsConfig;

/// Compares calling slow computations directly against calling them through a memoizer.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the workload definition file.
    #[arg(long, short, value_name = "FILE")]
    workloads: PathBuf,

    /// Duration of each stresstest run.
    #[arg(long, short, value_parser = parse_duration)]
    duration: Duration,

    /// Enable tracing, writing JSON logs into the void.
    #[arg(long)]
    tracing: bool,

    /// Enable metrics, sending them to a local UDP sink.
    #[arg(long)]
    metrics: bool,
}

fn main() {
    if let Err(error) = execute() {
        memorace::logging::ensure_log_error(&error);
        std::process::exit(1);
    }
}

fn execute() -> Result<()> {
    let cli = Cli::parse();

    // parse configs
    let workloads_file =
        std::fs::File::open(cli.workloads).context("failed to open workloads file")?;
    let workloads: WorkloadsConfig =
        serde_yaml::from_reader(workloads_file).context("failed to parse workloads YAML")?;

    let config = Config::get(cli.config.as_deref())?;

    let logging_config = logging::Config {
        tracing: cli.tracing,
        metrics: cli.metrics,
    };
    // SAFETY: No other threads exist yet, the runtime is only started below.
    let logging_guard = unsafe { logging::init(logging_config, &config)? };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(async move {
        if let Some(udp_sink) = logging_guard.udp_sink {
            tokio::spawn(udp_sink);
        }
        perform_stresstest(config.memoizer, workloads, cli.duration).await
    })
}

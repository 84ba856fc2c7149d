// src/main.rs
// gruenerator-worker - inspect configuration and exercise the batch core

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gruenerator_worker::{
    BatchError, BatchItem, BatchOptions, BatchOutput, BatchProcessor, BatchSettings, CONFIG,
    DispatchMode,
};
use rand::Rng;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "gruenerator-worker")]
#[command(about = "Batch execution core for Grünerator AI workers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective worker configuration (default)
    Config,

    /// Run a synthetic workload through the batch processor
    Simulate {
        /// Number of input items
        #[arg(short, long, default_value = "50")]
        items: usize,

        /// Probability that a single batch attempt fails (0.0 - 1.0)
        #[arg(long, default_value = "0.2", value_parser = parse_probability)]
        fail_rate: f64,

        /// Upper bound of the simulated per-batch latency
        #[arg(long, default_value = "200")]
        max_latency_ms: u64,

        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override the configured concurrency limit
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Start the next batch as soon as a slot frees instead of waiting for the wave
        #[arg(long)]
        pool: bool,
    },
}

fn parse_probability(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{}", e))?;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("{} is not a probability between 0.0 and 1.0", raw));
    }
    Ok(value)
}

fn log_level() -> Level {
    if CONFIG.is_debug() {
        return Level::DEBUG;
    }
    match CONFIG.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

async fn run_simulation(
    items: usize,
    fail_rate: f64,
    max_latency_ms: u64,
    options: BatchOptions,
) -> Result<()> {
    let processor = BatchProcessor::new(BatchSettings::from_config(&CONFIG))?;
    let inputs: Vec<usize> = (0..items).collect();

    info!(items, fail_rate, max_latency_ms, "Starting simulation");

    let results = processor
        .process_batches(
            &inputs,
            |batch: Vec<usize>, batch_index: usize| {
                let (latency, fails) = {
                    let mut rng = rand::rng();
                    (rng.random_range(0..=max_latency_ms), rng.random_bool(fail_rate))
                };
                async move {
                    tokio::time::sleep(Duration::from_millis(latency)).await;
                    if fails {
                        return Err(BatchError::Processor(format!(
                            "simulated failure in batch {}",
                            batch_index
                        )));
                    }
                    Ok(BatchOutput::Many(batch.into_iter().map(|n| n * 2).collect::<Vec<_>>()))
                }
            },
            &options,
        )
        .await?;

    let failed = results.iter().filter(|r| !r.is_ok()).count();
    let summary = serde_json::json!({
        "results": results.len(),
        "succeeded": results.len() - failed,
        "failed": failed,
        "failed_batches": results
            .iter()
            .filter_map(BatchItem::as_failed)
            .map(|f| f.batch_index)
            .collect::<std::collections::BTreeSet<_>>(),
        "stats": processor.stats(),
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        None | Some(Commands::Config) => {
            println!("{}", CONFIG.summary());
        }
        Some(Commands::Simulate {
            items,
            fail_rate,
            max_latency_ms,
            batch_size,
            max_concurrent,
            pool,
        }) => {
            let mut options = BatchOptions::new();
            options.batch_size = batch_size;
            options.max_concurrent = max_concurrent;
            if pool {
                options = options.dispatch(DispatchMode::Pool);
            }
            run_simulation(items, fail_rate, max_latency_ms, options).await?;
        }
    }

    Ok(())
}

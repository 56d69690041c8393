use anyhow::{Context, Result};
use clap::Parser;
use debounce_pipeline::{run_source, LogConfig, PipelineBuilder, PipelineConfig};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter integers from stdin and print them in batches once input goes quiet
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ring buffer capacity
    #[arg(long)]
    capacity: Option<usize>,

    /// Quiet period before the buffer is flushed, in milliseconds
    #[arg(long)]
    idle_ms: Option<u64>,

    /// Also flush as soon as the buffer is full
    #[arg(long)]
    flush_when_full: bool,

    /// Log filter directive, e.g. "debug"
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.log)?;

    info!(
        "Starting debounce-pipeline v{} (capacity {}, idle {}ms)",
        debounce_pipeline::VERSION,
        config.buffer.capacity,
        config.buffer.idle_interval_ms
    );

    let mut running = PipelineBuilder::from_config(&config).build()?.start()?;
    let input = running
        .input()
        .context("pipeline input closed before start")?;
    running.close_input();

    println!("Type integers, one per line. Enter 'exit' to quit.");
    let source = thread::Builder::new()
        .name("source".into())
        .spawn(move || {
            let stdin = io::stdin();
            run_source(stdin.lock(), &input, |_| {
                println!("Please enter a positive or negative integer");
            })
        })?;

    // Runs until the source stops and the buffer stage has unwound.
    for value in running.output().iter() {
        println!("received: {value}");
    }

    let summary = source
        .join()
        .map_err(|_| anyhow::anyhow!("source thread panicked"))??;
    if summary.exited {
        println!("Done!");
    }

    info!("{}", running.metrics_summary());
    running.shutdown()?;
    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(args.config.as_deref())?;

    if let Some(capacity) = args.capacity {
        config.buffer.capacity = capacity;
    }
    if let Some(idle_ms) = args.idle_ms {
        config.buffer.idle_interval_ms = idle_ms;
    }
    if args.flush_when_full {
        config.buffer.flush_when_full = true;
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(log: &LogConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    match &log.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
    Ok(())
}

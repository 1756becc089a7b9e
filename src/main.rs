use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_relay::adapter::algotest::AlgotestAdapter;
use signal_relay::adapter::tradetron::TradetronAdapter;
use signal_relay::adapter::{Adapter, BaseAdapter};
use signal_relay::cache::Cache;
use signal_relay::config::Config;
use signal_relay::dispatcher::Dispatcher;
use signal_relay::error::PipelineError;
use signal_relay::logsink::LogSink;
use signal_relay::{queue, tailer};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start tailing, parsing, and dispatching; run until Ctrl-C.
    Run {
        #[arg(long, default_value = "config.json")]
        config: PathBuf,
    },
    /// Load and validate config + cache without starting the pipeline.
    ValidateConfig {
        #[arg(long, default_value = "config.json")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    match args.command {
        Command::Run { config } => run(config).await?,
        Command::ValidateConfig { config } => {
            init_console_logging();
            validate_config(config)?;
        }
    }
    Ok(())
}

fn init_console_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();
}

/// Builds the stdout + daily-rotating-file subscriber once `config.logging`
/// is known. Returns the appender guard; drop it only at process exit or
/// buffered lines are lost.
fn init_file_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(&config.monitor.log_path, "signal-relay.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_ansi(false).with_writer(non_blocking))
        .init();

    guard
}

fn validate_config(path: PathBuf) -> Result<()> {
    let config = Config::load(&path).context("loading config")?;
    Cache::load(&config.cache_path)?;
    tracing::info!(
        watch_root = %config.watch_root.display(),
        adapters = config.adapters.len(),
        "config and cache validated successfully"
    );
    Ok(())
}

async fn run(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path).context("loading config")?;
    let _log_guard = if config.logging.daily_rotation {
        Some(init_file_logging(&config))
    } else {
        init_console_logging();
        None
    };
    let cache = Arc::new(Cache::load(&config.cache_path)?);
    let sink = Arc::new(LogSink::new(&config.monitor.log_path));

    let mut adapters: Vec<Arc<dyn Adapter>> = Vec::new();
    for (name, adapter_config) in &config.adapters {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(adapter_config.timeout_seconds))
            .build()
            .with_context(|| format!("building HTTP client for adapter {name}"))?;
        let rate_limiter = Arc::new(adapter_config.build_rate_limiter(name)?);

        let adapter: Arc<dyn Adapter> = match name.as_str() {
            "tradetron" => {
                let base_url = adapter_config
                    .base_url
                    .clone()
                    .ok_or_else(|| PipelineError::AdapterMissingBaseUrl(name.clone()))?;
                let mapper = TradetronAdapter::new(base_url, adapter_config.counter_size);
                if adapter_config.grouping_enabled {
                    BaseAdapter::new_grouping(
                        name.clone(),
                        mapper,
                        client,
                        cache.clone(),
                        sink.clone(),
                        rate_limiter,
                        config.system.retry_attempts,
                        adapter_config.group_limit,
                        Duration::from_secs(config.system.retry_delay_seconds),
                        adapter_config.active,
                    )
                } else {
                    BaseAdapter::new(
                        name.clone(),
                        mapper,
                        client,
                        cache.clone(),
                        sink.clone(),
                        rate_limiter,
                        config.system.retry_attempts,
                        adapter_config.order_delay(),
                        adapter_config.active,
                    )
                }
            }
            "algotest" => BaseAdapter::new(
                name.clone(),
                AlgotestAdapter::new(),
                client,
                cache.clone(),
                sink.clone(),
                rate_limiter,
                config.system.retry_attempts,
                adapter_config.order_delay(),
                adapter_config.active,
            ),
            other => {
                tracing::warn!(adapter = other, "unknown adapter name in config, skipping");
                continue;
            }
        };
        adapters.push(adapter);
    }

    let (_tailer, raw_lines) = tailer::Tailer::spawn(&config.watch_root, &config.monitor.target_filename)?;
    let (producer, consumer) = queue::bounded(config.system.queue_size);

    tokio::spawn(tailer::run_consumer(
        raw_lines,
        cache.clone(),
        config.monitor.hours.clone(),
        config.monitor.parse_limits(),
        producer,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = Dispatcher::new(adapters, config.system.processing_timeout());
    let dispatcher_handle = tokio::spawn(async move { dispatcher.run(consumer, shutdown_rx).await });

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    dispatcher_handle.await.context("waiting for dispatcher to drain")?;

    Ok(())
}

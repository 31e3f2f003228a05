use clap::{Args, Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use view_counter::errors::ViewCounterError;
use view_counter::signature::SignatureVerifier;

mod config;

use config::{Config, ConfigError, LoggingConfig, MetricsConfig};

#[derive(Parser)]
#[command(version, about = "Storefront view counter proxy")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the view counter proxy
    ViewCounter(RunArgs),
    /// Print the signature header value for a request body
    Sign(SignArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config_file: PathBuf,
}

#[derive(Args)]
struct SignArgs {
    #[arg(long, env = view_counter::config::ENV_SHARED_SECRET, hide_env_values = true)]
    secret: String,
    /// File holding the exact request body
    body_file: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not install logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
    #[error(transparent)]
    ViewCounter(#[from] ViewCounterError),
}

fn main() -> Result<(), CliError> {
    // A missing .env file is fine, the environment may already be populated
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Sign(args) => {
            let body = std::fs::read(&args.body_file)?;
            println!("{}", SignatureVerifier::new(args.secret).sign(&body));
            Ok(())
        }
        CliCommand::ViewCounter(args) => {
            let mut config = Config::from_file(&args.config_file)?;
            config.view_counter.apply_env(|key| std::env::var(key).ok());

            let _sentry = init_logging(config.common.logging.as_ref())?;
            if let Some(metrics_config) = &config.common.metrics {
                init_metrics(metrics_config)?;
            }

            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(view_counter::run(config.view_counter))?;
            Ok(())
        }
    }
}

/// Installs the fmt subscriber, plus the Sentry layer when a DSN is configured.
///
/// The returned guard flushes pending Sentry events on drop.
fn init_logging(
    config: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let guard = config
        .and_then(|c| c.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .try_init()?;

    Ok(guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some("viewproxy"))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(view_counter::metrics_defs::ALL_METRICS);
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Sending metrics to statsd"
    );
    Ok(())
}

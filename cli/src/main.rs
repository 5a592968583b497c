//! `mapharvest` - run map listing extraction from the command line.

mod sink;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mapharvest_browser::{ChromeLauncher, SelectorExtractor};
use mapharvest_core::{AppConfig, BusinessRecord, Query, QueryInput};
use mapharvest_enrich::EmailEnricher;
use mapharvest_proxy::{load_from_path, ProxyRotator};
use mapharvest_scanner::{HarvestRunner, RecordSink, RetryOrchestrator};
use sink::JsonLinesSink;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "mapharvest", version)]
#[command(about = "Extract business listings from map search results")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "MAPHARVEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every query in a JSON file and write the deduplicated records
    Run {
        /// JSON array of {keyword, location, direct_url}
        #[arg(long)]
        queries: PathBuf,
        /// Credential file, overriding the configured one
        #[arg(long)]
        proxies: Option<PathBuf>,
        /// Also append each record to this JSON-lines file as it is extracted
        #[arg(long)]
        stream: Option<PathBuf>,
        /// Where the final record array is written
        #[arg(long)]
        output: PathBuf,
    },
    /// Load the credential file and list the pool
    CheckProxies {
        #[arg(long)]
        proxies: Option<PathBuf>,
    },
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,mapharvest=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?
            .with_env_overrides(),
        None => AppConfig::load_with_env().context("loading config")?,
    };

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_queries(path: &Path) -> Result<Vec<Query>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let inputs: Vec<QueryInput> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing query list {}", path.display()))?;

    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| Query::try_from(input).with_context(|| format!("query #{}", i + 1)))
        .collect()
}

async fn run(
    config: AppConfig,
    queries: &Path,
    stream: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let queries = read_queries(queries)?;
    let credentials = load_from_path(&config.proxy.credentials_file)?;
    info!(
        queries = queries.len(),
        credentials = credentials.len(),
        "starting mapharvest v{}",
        env!("CARGO_PKG_VERSION")
    );

    let orchestrator = RetryOrchestrator::new(
        &config,
        ProxyRotator::new(credentials, config.proxy.rotation_threshold),
        Box::new(ChromeLauncher::new(config.browser.clone())),
        Box::new(SelectorExtractor::default()),
    );
    let enricher = if config.email.enabled {
        Some(EmailEnricher::new(config.email.clone()).context("building HTTP client")?)
    } else {
        None
    };
    let mut runner = HarvestRunner::new(orchestrator, enricher, &config);

    let sink: Box<dyn RecordSink> = match stream {
        Some(path) => Box::new(JsonLinesSink::create(path)?),
        None => Box::new(|_: &BusinessRecord| {}),
    };

    let stop = CancellationToken::new();
    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current query");
            interrupt.cancel();
        }
    });

    let report = runner.run(queries, sink.as_ref(), &stop).await;

    let file =
        File::create(output).with_context(|| format!("creating {}", output.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report.records)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(path = %output.display(), records = report.records.len(), "records written");

    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}

fn check_proxies(config: &AppConfig) -> Result<()> {
    let credentials = load_from_path(&config.proxy.credentials_file)?;
    println!(
        "{} credential(s) in {}",
        credentials.len(),
        config.proxy.credentials_file.display()
    );
    for credential in &credentials {
        println!("  {credential}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            queries,
            proxies,
            stream,
            output,
        } => {
            if let Some(path) = proxies {
                config.proxy.credentials_file = path;
            }
            run(config, &queries, stream.as_deref(), &output).await
        }
        Commands::CheckProxies { proxies } => {
            if let Some(path) = proxies {
                config.proxy.credentials_file = path;
            }
            check_proxies(&config)
        }
    }
}

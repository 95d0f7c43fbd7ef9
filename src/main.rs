//! w3c-tail - Follow W3C extended log files and emit structured records.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use w3c_tail::config::{ConfigError, ConfigLoader, TailConfig};
use w3c_tail::position::{PositionError, PositionStore};
use w3c_tail::watcher::{StdoutSink, TailService, WatcherError};

#[derive(Parser)]
#[command(
    name = "w3c-tail",
    about = "Follow W3C extended log files and print records as JSON lines",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to load instead of searching the default locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated glob patterns of log files to follow.
    #[arg(short, long)]
    path: Option<String>,

    /// Tag attached to every record.
    #[arg(short, long)]
    tag: Option<String>,

    /// File used to persist read positions across restarts.
    #[arg(long)]
    pos_file: Option<PathBuf>,

    /// Merge mapped fields into the top level of each record.
    #[arg(long)]
    expand_fields: bool,

    /// Maximum lines read from one file per cycle.
    #[arg(long)]
    read_line_limit: Option<usize>,
}

impl Cli {
    fn apply(self, mut config: TailConfig) -> TailConfig {
        if let Some(path) = self.path {
            config.path = path;
        }
        if let Some(tag) = self.tag {
            config.tag = tag;
        }
        if let Some(pos_file) = self.pos_file {
            config.pos_file = Some(pos_file);
        }
        if self.expand_fields {
            config.expand_fields = true;
        }
        if let Some(limit) = self.read_line_limit {
            config.read_line_limit = limit;
        }
        config
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error(transparent)]
    Watcher(#[from] WatcherError),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), RunError> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let config = cli.apply(loader.load()?);

    let store = match &config.pos_file {
        Some(path) => PositionStore::open(path)?,
        None => PositionStore::in_memory(),
    };

    tracing::info!(
        path = %config.path,
        tag = %config.tag,
        pos_file = ?config.pos_file,
        "Starting w3c-tail"
    );

    let service = TailService::new(
        config.service_options(),
        Arc::new(store),
        Arc::new(StdoutSink),
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            shutdown.cancel();
        });
    }

    service.run(shutdown).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "w3c-tail failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

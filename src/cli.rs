use crate::bridge;
use crate::config::{BridgeConfig, Overrides};
use crate::embed::{self, EmbedderHandle};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "EMBED_BRIDGE_LOG";

/// Reads JSON arrays of text from stdin, one per line, and writes one JSON
/// array of embedding vectors per line to stdout.
#[derive(Debug, Parser)]
#[command(name = "embed-bridge", version, about)]
pub struct Cli {
    /// Embedding model to load [default: all-MiniLM-L6-v2]
    pub model_name: Option<String>,

    /// TOML config file (defaults to the per-user config if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Internal batch size for each model call
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Truncate inputs to this many tokens
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Where downloaded model files are cached
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar on stderr while downloading the model
    #[arg(long)]
    pub show_download_progress: bool,

    /// Log filter used when EMBED_BRIDGE_LOG is unset (e.g. "info")
    #[arg(long, default_value = "off")]
    pub log_level: String,

    /// Print supported model names and exit
    #[arg(long)]
    pub list_models: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            model_name: self.model_name.clone(),
            batch_size: self.batch_size,
            max_length: self.max_length,
            cache_dir: self.cache_dir.clone(),
            show_download_progress: self.show_download_progress,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if cli.list_models {
        return list_models();
    }

    let config = BridgeConfig::resolve(cli.config.as_deref(), cli.overrides())?;
    info!(?config, "configuration resolved");

    let mut embedder = EmbedderHandle::load(&config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = BufWriter::new(stdout.lock());
    let mut err = stderr.lock();
    bridge::run(&mut embedder, stdin.lock(), &mut out, &mut err)?;
    Ok(())
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn list_models() -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for model in embed::supported_models() {
        writeln!(out, "{}\t{}\t{}", model.code, model.dims, model.description)
            .context("failed to write model list")?;
    }
    out.flush().context("failed to write model list")?;
    Ok(())
}

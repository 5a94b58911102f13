//! Command line host that rewrites a single HTML document through a JSON file store.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use cdn_rewrite::{CdnRewriter, HttpHeadProber, JsonFileStore, RewriteConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Rewrite relative asset URLs in an HTML document to CDN URLs the CDN actually serves.
#[derive(Debug, Parser)]
#[command(name = "cdn-rewrite", version, about)]
struct Args {
  /// HTML document to rewrite; reads stdin when omitted.
  input: Option<PathBuf>,

  /// Write the rewritten document here instead of stdout.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// JSON configuration file; `cdn_rewrite.config.json` in the working directory otherwise.
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// CDN base URL, overriding the configuration.
  #[arg(long)]
  cdn_url: Option<String>,

  /// Replacement map lifetime in seconds, overriding the configuration.
  #[arg(long)]
  ttl: Option<u64>,

  /// File persisting confirmed replacements between runs.
  #[arg(long, default_value = ".cdn-rewrite-cache.json")]
  cache: PathBuf,

  /// Log every cache hit and probe.
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let args = Args::parse();
  init_tracing(args.verbose);

  let config = resolve_config(&args)?;

  let html = read_input(&args)?;
  let prober = HttpHeadProber::from_config(&config);
  let rewriter = CdnRewriter::new(&config, prober);
  let mut store = JsonFileStore::new(&args.cache);
  let rewritten = rewriter.rewrite_with_store(&html, &mut store);

  write_output(&args, &rewritten)
}

fn init_tracing(verbose: bool) {
  let default_level = if verbose { "debug" } else { "warn" };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

/// Load the configuration and apply command line overrides on top of it.
fn resolve_config(args: &Args) -> Result<RewriteConfig> {
  let mut config = load_config(args)?;
  if let Some(cdn_url) = &args.cdn_url {
    config.cdn_service_url = cdn_url.clone();
  }
  if let Some(ttl) = args.ttl {
    config.replacement_map_expiry_secs = ttl;
  }
  Ok(config)
}

fn load_config(args: &Args) -> Result<RewriteConfig> {
  match &args.config {
    Some(path) => {
      let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))
    }
    None => {
      let cwd = std::env::current_dir().context("failed to resolve working directory")?;
      Ok(RewriteConfig::discover(&cwd))
    }
  }
}

fn read_input(args: &Args) -> Result<String> {
  match &args.input {
    Some(path) => {
      fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }
    None => {
      let mut html = String::new();
      io::stdin()
        .read_to_string(&mut html)
        .context("failed to read document from stdin")?;
      Ok(html)
    }
  }
}

fn write_output(args: &Args, rewritten: &str) -> Result<()> {
  match &args.output {
    Some(path) => {
      fs::write(path, rewritten).with_context(|| format!("failed to write {}", path.display()))
    }
    None => {
      let mut stdout = io::stdout().lock();
      stdout
        .write_all(rewritten.as_bytes())
        .context("failed to write document to stdout")?;
      stdout.flush().context("failed to flush stdout")
    }
  }
}

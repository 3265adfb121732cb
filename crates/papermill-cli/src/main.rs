//! Command line interface for mirroring a paper catalog with the `papermill` library.
//!
//! The binary supports two operations:
//! - Crawling the catalog, downloading every paper and writing the index
//! - Summarizing an existing index together with what is on disk
//!
//! # Usage
//!
//! ```bash
//! # Mirror the default catalog into ./papers and ./papers_metadata.json
//! papermill crawl
//!
//! # Use a configuration file, four parallel leaf tasks and a custom target directory
//! papermill crawl --config papermill.toml --jobs 4 --base-dir /srv/papers
//!
//! # Summarize the index and the downloaded files
//! papermill stats
//! ```
//!
//! Progress is printed to standard output. Logging goes to standard error and is controlled
//! by the `-v` flag or `RUST_LOG`; `--log-dir` additionally writes a daily log file.
//! Pressing Ctrl-C stops the crawl between levels, keeping every branch written so far.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use clap::{builder::ArgAction, Args, Parser, Subcommand};
use console::style;
use papermill::{prelude::*, store::MetadataStore, Config, CrawlEvent, DownloadStatus, Traverser};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod commands;
pub mod error;

use crate::{commands::*, error::*};

/// Prefix for information messages
static INFO_PREFIX: &str = "ℹ ";
/// Prefix for success messages
static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for warning messages
static WARNING_PREFIX: &str = "⚠️ ";
/// Prefix for error messages
static ERROR_PREFIX: &str = "✗ ";
/// Continuation line for tree structure
static CONTINUE_PREFIX: &str = "│  ";
/// Branch character for tree structure
static TREE_BRANCH: &str = "├ ";
/// Leaf character for tree structure (end of branch)
static TREE_LEAF: &str = "└ ";

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Mirror a branch/semester/subject catalog of exam papers")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Also write logs to a daily rotated file in this directory.
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,
}

/// Configures the logging system based on the verbosity level
///
/// # Arguments
///
/// * `verbosity` - Number of times the verbose flag was used
/// * `log_dir` - Optional directory for a daily rolling log file
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
///
/// The returned guard flushes the log file when dropped and must be kept alive.
fn setup_logging(verbosity: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  let console_layer = fmt::layer()
    .with_writer(std::io::stderr)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true);

  let (file_layer, guard) = match log_dir {
    Some(dir) => {
      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "papermill.log"));
      let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
      (Some(layer), Some(guard))
    },
    None => (None, None),
  };

  tracing_subscriber::registry().with(filter).with(console_layer).with(file_layer).init();
  guard
}

/// Entry point for the papermill CLI application
///
/// Parses the command line, sets up logging, and runs the requested command.
///
/// # Errors
///
/// Returns a [`CliError`], and therefore exits with status 1, when:
/// - The configuration cannot be loaded or is invalid
/// - The root listing page cannot be reached at all
/// - The index or the base directory cannot be read
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let _guard = setup_logging(cli.verbose, cli.log_dir.as_deref());

  match cli.command {
    Commands::Crawl(args) => crawl(args).await,
    Commands::Stats(args) => stats(args).await,
  }
}

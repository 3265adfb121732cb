use super::*;

pub mod crawl;
pub mod stats;

pub use crawl::crawl;
pub use stats::stats;

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Crawl the catalog, download every paper and write the index
  Crawl(CrawlArgs),

  /// Summarize an existing index and the files in the base directory
  Stats(StatsArgs),
}

/// Options shared by every command that needs a [`Config`].
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigArgs {
  /// Configuration file (TOML). Defaults to the user configuration file if it exists.
  #[arg(long, short)]
  config: Option<PathBuf>,

  /// Directory papers are stored in
  #[arg(long)]
  base_dir: Option<PathBuf>,

  /// Location of the JSON index
  #[arg(long)]
  metadata: Option<PathBuf>,
}

impl ConfigArgs {
  /// Loads the configuration and applies the overrides given on the command line.
  fn load(&self) -> Result<Config> {
    let mut config = Config::load(self.config.as_deref())?;
    if let Some(base_dir) = &self.base_dir {
      config = config.with_base_dir(base_dir);
    }
    if let Some(metadata) = &self.metadata {
      config = config.with_metadata_path(metadata);
    }
    Ok(config)
  }
}

/// Options of [`Commands::Crawl`].
#[derive(Args, Clone, Debug)]
pub struct CrawlArgs {
  /// Configuration sources and overrides
  #[command(flatten)]
  config: ConfigArgs,

  /// Root listing page of the catalog; must end with '/'
  #[arg(long)]
  base_url: Option<String>,

  /// Sibling semesters, subjects or downloads worked on at once
  #[arg(long, short)]
  jobs: Option<usize>,

  /// Minimum spacing between two requests, in milliseconds
  #[arg(long)]
  delay_ms: Option<u64>,

  /// Attempts per request before giving up
  #[arg(long)]
  retries: Option<u32>,
}

/// Options of [`Commands::Stats`].
#[derive(Args, Clone, Debug)]
pub struct StatsArgs {
  /// Configuration sources and overrides
  #[command(flatten)]
  config: ConfigArgs,

  /// Print the totals as JSON instead of a tree
  #[arg(long)]
  json: bool,
}

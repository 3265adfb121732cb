//! Crawl configuration.
//!
//! Every field has a default, so an empty TOML file is a valid configuration and
//! `Config::default()` crawls the public catalog into `./papers`.
//!
//! # Examples
//!
//! ```
//! use papermill::Config;
//!
//! let config = Config::from_toml_str(
//!   r#"
//!     base_dir = "mirror"
//!     concurrency = 2
//!
//!     [retry]
//!     max_attempts = 5
//!   "#,
//! )
//! .unwrap();
//! assert_eq!(config.retry.max_attempts, 5);
//! assert_eq!(config.request_delay_ms, 500);
//! ```

use super::*;

/// Root listing of the catalog.
pub const DEFAULT_BASE_URL: &str = "https://gturanker.com/papers/BE/";

/// Identification header sent with every request.
pub const DEFAULT_USER_AGENT: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Settings for a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Root listing page; branch, semester and subject segments nest below its path.
  pub base_url:            String,
  /// Path fragment identifying the download endpoint.
  pub download_path:       String,
  /// Query parameter carrying the paper identifier on download links.
  pub paper_param:         String,
  /// Directory papers are mirrored into.
  pub base_dir:            PathBuf,
  /// Location of the JSON catalog index.
  pub metadata_path:       PathBuf,
  /// Value of the `User-Agent` header.
  pub user_agent:          String,
  /// Retry policy applied to listings and downloads alike.
  pub retry:               RetryPolicy,
  /// Timeout for a single listing request.
  pub page_timeout_ms:     u64,
  /// Timeout for a single download request.
  pub download_timeout_ms: u64,
  /// Minimum spacing between the start of two requests.
  pub request_delay_ms:    u64,
  /// Maximum number of requests in flight at once.
  pub max_in_flight:       usize,
  /// Maximum number of sibling semesters, subjects or papers worked on at once.
  pub concurrency:         usize,
  /// Downloads smaller than this many bytes are rejected; zero disables the check.
  pub min_pdf_bytes:       usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      base_url:            DEFAULT_BASE_URL.to_string(),
      download_path:       "/download/".to_string(),
      paper_param:         "paper".to_string(),
      base_dir:            PathBuf::from("papers"),
      metadata_path:       PathBuf::from("papers_metadata.json"),
      user_agent:          DEFAULT_USER_AGENT.to_string(),
      retry:               RetryPolicy::default(),
      page_timeout_ms:     30_000,
      download_timeout_ms: 60_000,
      request_delay_ms:    500,
      max_in_flight:       1,
      concurrency:         4,
      min_pdf_bytes:       0,
    }
  }
}

impl Config {
  /// Default location of the user configuration file.
  ///
  /// - On Unix: `~/.config/papermill/config.toml`
  /// - On macOS: `~/Library/Application Support/papermill/config.toml`
  /// - On Windows: `%APPDATA%\papermill\config.toml`
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("papermill").join("config.toml"))
  }

  /// Parses and validates a configuration from TOML.
  pub fn from_toml_str(toml_str: &str) -> Result<Self> {
    let config: Config = toml::from_str(toml_str)?;
    config.validate()?;
    Ok(config)
  }

  /// Reads and validates a configuration file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  /// Loads `path` if given, else the default user configuration if it exists, else defaults.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    if let Some(path) = path {
      debug!("Loading configuration from {}", path.display());
      return Self::from_file(path);
    }
    match Self::default_path() {
      Some(path) if path.is_file() => {
        debug!("Loading configuration from {}", path.display());
        Self::from_file(path)
      },
      _ => Ok(Self::default()),
    }
  }

  /// Checks the values a crawl cannot work without.
  pub fn validate(&self) -> Result<()> {
    if !self.base_url.ends_with('/') {
      return Err(MirrorError::Config(format!("base_url must end with '/': {}", self.base_url)));
    }
    Url::parse(&self.base_url)?;
    if self.retry.max_attempts == 0 {
      return Err(MirrorError::Config("retry.max_attempts must be at least 1".into()));
    }
    if self.max_in_flight == 0 {
      return Err(MirrorError::Config("max_in_flight must be at least 1".into()));
    }
    if self.concurrency == 0 {
      return Err(MirrorError::Config("concurrency must be at least 1".into()));
    }
    if self.paper_param.is_empty() || self.download_path.is_empty() {
      return Err(MirrorError::Config("download_path and paper_param must not be empty".into()));
    }
    Ok(())
  }

  /// Sets the root listing page.
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  /// Sets the directory papers are mirrored into.
  pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
    self.base_dir = base_dir.as_ref().to_path_buf();
    self
  }

  /// Sets the location of the catalog index.
  pub fn with_metadata_path(mut self, metadata_path: impl AsRef<Path>) -> Self {
    self.metadata_path = metadata_path.as_ref().to_path_buf();
    self
  }

  /// Sets the fan-out for sibling work.
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency;
    self
  }

  /// Sets the spacing between requests.
  pub fn with_request_delay(mut self, delay: Duration) -> Self {
    self.request_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    self
  }

  /// Sets the retry policy.
  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub(crate) fn page_timeout(&self) -> Duration { Duration::from_millis(self.page_timeout_ms) }

  pub(crate) fn download_timeout(&self) -> Duration {
    Duration::from_millis(self.download_timeout_ms)
  }

  pub(crate) fn request_delay(&self) -> Duration { Duration::from_millis(self.request_delay_ms) }
}

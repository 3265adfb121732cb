//! Error types for the papermill library.
//!
//! Every failure the crawler can run into maps onto one [`MirrorError`] variant:
//! - transport problems (timeouts, resets, TLS) and non-2xx statuses, which are retried
//! - a fetch that exhausted its retries, which prunes the subtree it belonged to
//! - filesystem and serialization problems while saving papers or the index
//! - the unrecoverable case of never reaching the root listing page
//!
//! Links that do not match a classification rule are not errors at all; they are skipped.
//!
//! # Examples
//!
//! ```
//! use papermill::error::MirrorError;
//!
//! let err = MirrorError::Status { url: "https://example.com/".into(), status: 503 };
//! assert!(err.is_transient());
//! assert!(!MirrorError::Cancelled.is_transient());
//! ```

use thiserror::Error;

/// Error type alias used for the [`papermill`](crate) crate.
pub type Result<T> = core::result::Result<T, MirrorError>;

/// Errors that can occur while crawling and mirroring the catalog.
#[derive(Error, Debug)]
pub enum MirrorError {
  /// A network request failed before a response arrived.
  ///
  /// This covers request timeouts, connection resets, DNS failures and TLS errors.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A request did not complete within its timeout.
  #[error("request to {url} timed out")]
  Timeout {
    /// The requested URL.
    url: String,
  },

  /// The server answered with a status outside of the 2xx range.
  #[error("{url} answered with HTTP status {status}")]
  Status {
    /// The requested URL.
    url:    String,
    /// The numeric status code.
    status: u16,
  },

  /// A downloaded body was smaller than the configured minimum, which usually means an error
  /// page was served in place of the document.
  #[error("{url} returned {len} bytes, expected at least {min}")]
  TooSmall {
    /// The requested URL.
    url: String,
    /// Number of bytes received.
    len: usize,
    /// Configured minimum.
    min: usize,
  },

  /// A fetch failed on every attempt allowed by the retry policy.
  #[error("giving up on {url} after {attempts} attempt(s): {cause}")]
  Fetch {
    /// The URL that could not be fetched.
    url:      String,
    /// How many attempts were made.
    attempts: u32,
    /// The failure of the last attempt.
    #[source]
    cause:    Box<MirrorError>,
  },

  /// The root listing page never succeeded, so no branch can be discovered.
  #[error("unable to reach the catalog root {url}: {cause}")]
  Startup {
    /// The root listing URL.
    url:   String,
    /// Why the root listing could not be fetched.
    #[source]
    cause: Box<MirrorError>,
  },

  /// A file system operation failed.
  ///
  /// This occurs when creating directories, writing a paper or writing the index.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// The catalog index could not be (de)serialized.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A URL could not be parsed.
  #[error(transparent)]
  Url(#[from] url::ParseError),

  /// A configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// A configuration value is invalid.
  #[error("{0}")]
  Config(String),

  /// The crawl was cancelled before the current branch finished.
  #[error("crawl cancelled")]
  Cancelled,
}

impl MirrorError {
  /// Whether retrying the same request could plausibly succeed.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      Self::Network(_) | Self::Timeout { .. } | Self::Status { .. } | Self::TooSmall { .. }
    )
  }
}

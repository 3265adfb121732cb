//! Errors surfaced by the command line front end.

use thiserror::Error;

use super::*;

/// Result alias for CLI operations.
pub type Result<T> = core::result::Result<T, CliError>;

/// Everything a command can fail with.
#[derive(Error, Debug)]
pub enum CliError {
  /// Library failure: configuration, unreachable catalog, unreadable index.
  #[error(transparent)]
  Mirror(#[from] MirrorError),

  /// Filesystem failure outside the library.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// Invalid glob pattern built from the base directory.
  #[error(transparent)]
  Pattern(#[from] glob::PatternError),

  /// A path could not be read while walking the base directory.
  #[error(transparent)]
  Glob(#[from] glob::GlobError),

  /// Failure to render JSON output.
  #[error(transparent)]
  Json(#[from] serde_json::Error),
}

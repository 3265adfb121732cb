//! Saving papers exactly once.
//!
//! [`Downloader::save`] never touches the network for a paper whose file is already present,
//! so a rerun only fetches what is missing. New files are written next to their target under a
//! `.part` name and renamed into place once complete, which means a file at the target path is
//! always a complete download.

use std::io::Write;

use super::*;

/// Result of [`Downloader::save`].
#[derive(Debug)]
pub enum DownloadOutcome {
  /// The file already existed; nothing was fetched.
  Skipped,
  /// The file was fetched and written.
  Saved {
    /// Size of the written file.
    bytes: usize,
  },
  /// Fetching or writing failed; no file was left at the target path.
  Failed(MirrorError),
}

impl DownloadOutcome {
  /// Whether the file is present at the target path after the call.
  pub fn is_present(&self) -> bool { !matches!(self, DownloadOutcome::Failed(_)) }
}

/// Fetches papers into a base directory.
#[derive(Clone)]
pub struct Downloader {
  /// Shared, rate limited fetcher.
  fetcher:  PageFetcher,
  /// Directory relative paths are resolved against.
  base_dir: PathBuf,
}

impl Downloader {
  /// Creates a downloader writing below `base_dir`.
  pub fn new(fetcher: PageFetcher, base_dir: impl AsRef<Path>) -> Self {
    Self { fetcher, base_dir: base_dir.as_ref().to_path_buf() }
  }

  /// Saves `source_url` to `local_path` (relative to the base directory) unless it exists.
  pub async fn save(&self, source_url: &str, local_path: &str) -> DownloadOutcome {
    let target = self.base_dir.join(local_path);
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
      debug!("Already exists: {}", target.display());
      return DownloadOutcome::Skipped;
    }

    match self.fetch_and_write(source_url, &target).await {
      Ok(bytes) => {
        debug!("Downloaded {bytes} bytes to {}", target.display());
        DownloadOutcome::Saved { bytes }
      },
      Err(e) => {
        warn!("Failed to download {source_url}: {e}");
        DownloadOutcome::Failed(e)
      },
    }
  }

  /// Fetches the document and writes it atomically to `target`.
  async fn fetch_and_write(&self, source_url: &str, target: &Path) -> Result<usize> {
    let url = Url::parse(source_url)?;
    let body = self.fetcher.fetch_document(&url).await?;
    let bytes = body.len();
    write_atomically(target, body).await?;
    Ok(bytes)
  }
}

/// Sibling `.part` file of a download in progress, removed on drop unless it was renamed.
struct PartialFile {
  /// Location of the `.part` file.
  path:    PathBuf,
  /// Set once the file has been renamed onto its target.
  renamed: bool,
}

impl PartialFile {
  /// The `.part` sibling of `target`.
  fn for_target(target: &Path) -> Self {
    let mut path = target.as_os_str().to_owned();
    path.push(".part");
    Self { path: PathBuf::from(path), renamed: false }
  }
}

impl Drop for PartialFile {
  fn drop(&mut self) {
    if !self.renamed {
      let _ = std::fs::remove_file(&self.path);
    }
  }
}

/// Writes `bytes` to a sibling `.part` file and renames it onto `target`.
///
/// The write runs as one blocking job that outlives a dropped caller, so it always ends with
/// either the complete file or no file at all.
async fn write_atomically(target: &Path, bytes: Vec<u8>) -> Result<()> {
  let target = target.to_path_buf();
  tokio::task::spawn_blocking(move || write_file(&target, &bytes))
    .await
    .map_err(std::io::Error::other)??;
  Ok(())
}

/// Blocking body of [`write_atomically`].
fn write_file(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
  if let Some(parent) = target.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let mut partial = PartialFile::for_target(target);

  let mut file = std::fs::File::create(&partial.path)?;
  file.write_all(bytes)?;
  file.sync_all()?;
  drop(file);
  std::fs::rename(&partial.path, target)?;
  partial.renamed = true;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const URL: &str = "https://example.com/download/?paper=7";
  const LOCAL: &str = "CE/3/MA301/Winter_2025.pdf";

  fn downloader(transport: Arc<MemoryTransport>, base_dir: &Path) -> Downloader {
    let fetcher = PageFetcher::new(
      transport,
      Arc::new(RateLimiter::new(1, Duration::ZERO)),
      RetryPolicy::new(2).with_backoff(Backoff::Fixed { delay_ms: 1 }),
    );
    Downloader::new(fetcher, base_dir)
  }

  #[tokio::test]
  async fn test_save_then_skip() {
    let dir = tempdir().unwrap();
    let transport =
      Arc::new(MemoryTransport::new().with_reply(URL, Reply::Body(b"%PDF-1.7 body".to_vec())));
    let downloader = downloader(transport.clone(), dir.path());

    let first = downloader.save(URL, LOCAL).await;
    assert!(matches!(first, DownloadOutcome::Saved { bytes: 13 }));
    assert_eq!(std::fs::read(dir.path().join(LOCAL)).unwrap(), b"%PDF-1.7 body");
    assert!(!dir.path().join("CE/3/MA301/Winter_2025.pdf.part").exists());

    let second = downloader.save(URL, LOCAL).await;
    assert!(matches!(second, DownloadOutcome::Skipped));
    assert_eq!(transport.request_count(URL), 1);
  }

  #[tokio::test]
  async fn test_existing_file_needs_no_network() {
    let dir = tempdir().unwrap();
    let target = dir.path().join(LOCAL);
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, b"already here").unwrap();
    let transport = Arc::new(MemoryTransport::new());

    let outcome = downloader(transport.clone(), dir.path()).save(URL, LOCAL).await;
    assert!(matches!(outcome, DownloadOutcome::Skipped));
    assert!(outcome.is_present());
    assert!(transport.requests().is_empty());
  }

  #[traced_test]
  #[tokio::test]
  async fn test_failed_fetch_leaves_no_file() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(MemoryTransport::new().with_reply(URL, Reply::Timeout));

    let outcome = downloader(transport.clone(), dir.path()).save(URL, LOCAL).await;
    assert!(matches!(outcome, DownloadOutcome::Failed(MirrorError::Fetch { attempts: 2, .. })));
    assert!(!outcome.is_present());
    assert!(!dir.path().join(LOCAL).exists());
    assert_eq!(transport.request_count(URL), 2);
    assert!(logs_contain("Failed to download"));
  }

  #[tokio::test]
  async fn test_unwritable_target_fails() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("CE");
    std::fs::write(&blocker, b"a file where a directory should be").unwrap();
    let transport = Arc::new(MemoryTransport::new().with_reply(URL, Reply::html("%PDF")));

    let outcome = downloader(transport, dir.path()).save(URL, LOCAL).await;
    assert!(matches!(outcome, DownloadOutcome::Failed(MirrorError::Path(_))));
  }

  #[test]
  fn test_partial_file_removed_unless_renamed() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("Winter_2025.pdf");

    let partial = PartialFile::for_target(&target);
    assert_eq!(partial.path, dir.path().join("Winter_2025.pdf.part"));
    std::fs::write(&partial.path, b"half a pdf").unwrap();
    drop(partial);
    assert!(!dir.path().join("Winter_2025.pdf.part").exists());

    let mut partial = PartialFile::for_target(&target);
    std::fs::write(&partial.path, b"whole pdf").unwrap();
    std::fs::rename(&partial.path, &target).unwrap();
    partial.renamed = true;
    drop(partial);
    assert_eq!(std::fs::read(&target).unwrap(), b"whole pdf");
  }

  #[tokio::test]
  async fn test_abandoned_write_still_completes() {
    let dir = tempdir().unwrap();
    let target = dir.path().join(LOCAL);

    // Dropped after its first poll.
    let write = write_atomically(&target, vec![b'%'; 1 << 20]);
    let _ = tokio::time::timeout(Duration::ZERO, write).await;

    for _ in 0..200 {
      if target.exists() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(std::fs::metadata(&target).unwrap().len(), 1 << 20);
    assert!(!dir.path().join("CE/3/MA301/Winter_2025.pdf.part").exists());
  }

  #[tokio::test]
  async fn test_invalid_source_url_fails_without_request() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let outcome = downloader(transport.clone(), dir.path()).save("not a url", LOCAL).await;
    assert!(matches!(outcome, DownloadOutcome::Failed(MirrorError::Url(_))));
    assert!(transport.requests().is_empty());
  }
}

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::*;

/// Fires a cancellation token as soon as a given URL is requested.
struct CancelOn {
  inner: MemoryTransport,
  url:   String,
  token: CancellationToken,
}

#[async_trait]
impl Transport for CancelOn {
  async fn get(&self, url: &Url, timeout: Duration) -> papermill::error::Result<Vec<u8>> {
    if url.as_str() == self.url {
      self.token.cancel();
    }
    self.inner.get(url, timeout).await
  }
}

#[tokio::test]
async fn test_cancelled_crawl_keeps_last_checkpoint() -> TestResult<()> {
  let dir = tempdir()?;
  let config = test_config(dir.path());
  let token = CancellationToken::new();
  let transport = CancelOn {
    inner: create_test_site(),
    url:   format!("{BASE}IT/"),
    token: token.clone(),
  };

  let traverser =
    Traverser::with_transport(&config, Arc::new(transport))?.with_cancellation(token);
  let report = traverser.run().await?;

  assert!(report.cancelled);
  assert_eq!(report.branches, 1);
  let catalog = load_index(&config).await?;
  assert_eq!(catalog.branches.len(), 1);
  assert_eq!(catalog.branches[0].code, "CE");
  assert!(!config.base_dir.join("IT").exists());
  Ok(())
}

/// Holds downloads open for a while and cancels once a slow listing has been waited on.
struct CancelDuringDownloads {
  inner:    MemoryTransport,
  listing:  String,
  token:    CancellationToken,
  download: Duration,
}

#[async_trait]
impl Transport for CancelDuringDownloads {
  async fn get(&self, url: &Url, timeout: Duration) -> papermill::error::Result<Vec<u8>> {
    if url.as_str() == self.listing {
      tokio::time::sleep(Duration::from_millis(50)).await;
      self.token.cancel();
    }
    let reply = self.inner.get(url, timeout).await;
    if url.path().starts_with("/download/") {
      tokio::time::sleep(self.download).await;
    }
    reply
  }
}

/// Files below `dir` whose name ends with `suffix`.
fn files_ending_with(dir: &Path, suffix: &str) -> std::io::Result<Vec<std::path::PathBuf>> {
  let mut found = Vec::new();
  if !dir.is_dir() {
    return Ok(found);
  }
  for entry in std::fs::read_dir(dir)? {
    let path = entry?.path();
    if path.is_dir() {
      found.extend(files_ending_with(&path, suffix)?);
    } else if path.to_string_lossy().ends_with(suffix) {
      found.push(path);
    }
  }
  Ok(found)
}

#[tokio::test]
async fn test_cancel_lets_started_downloads_finish() -> TestResult<()> {
  let dir = tempdir()?;
  let mut config = test_config(dir.path()).with_concurrency(8);
  config.max_in_flight = 8;
  let token = CancellationToken::new();
  let transport = Arc::new(CancelDuringDownloads {
    inner:    create_test_site(),
    listing:  format!("{BASE}CE/4/CE402/"),
    token:    token.clone(),
    download: Duration::from_millis(200),
  });

  let traverser =
    Traverser::with_transport(&config, transport.clone())?.with_cancellation(token);
  let report = traverser.run().await?;

  assert!(report.cancelled);
  assert_eq!(report.branches, 0);
  let started: Vec<_> = transport
    .inner
    .requests()
    .into_iter()
    .filter(|url| url.contains("/download/"))
    .collect();
  assert_eq!(started.len(), 6);
  assert!(!started.iter().any(|url| url.contains("CE402")));
  assert_eq!(report.saved, 6);
  assert_eq!(files_ending_with(&config.base_dir, ".pdf")?.len(), 6);
  assert!(files_ending_with(&config.base_dir, ".part")?.is_empty());
  Ok(())
}

#[tokio::test]
async fn test_rerun_downloads_nothing_new() -> TestResult<()> {
  let dir = tempdir()?;
  let config = test_config(dir.path());
  let transport = Arc::new(create_test_site());
  let traverser = Traverser::with_transport(&config, transport.clone())?;

  traverser.run().await?;
  let first_index = std::fs::read_to_string(&config.metadata_path)?;
  let downloads =
    |requests: Vec<String>| requests.iter().filter(|url| url.contains("/download/")).count();
  assert_eq!(downloads(transport.requests()), 12);

  let report = traverser.run().await?;

  assert_eq!((report.saved, report.skipped), (0, 12));
  assert_eq!(downloads(transport.requests()), 12);
  assert_eq!(std::fs::read_to_string(&config.metadata_path)?, first_index);
  Ok(())
}

#[tokio::test]
async fn test_rerun_after_failure_fills_gaps() -> TestResult<()> {
  let dir = tempdir()?;
  let config = test_config(dir.path());
  let flaky = "https://cdn.papers.test/download/?paper=IT302-s24";
  let transport = Arc::new(create_test_site().with_replies(flaky, vec![
    Reply::Status(502),
    Reply::Status(502),
    Reply::Body(b"%PDF IT302 summer".to_vec()),
  ]));
  let traverser = Traverser::with_transport(&config, transport.clone())?;

  let first = traverser.run().await?;
  assert_eq!((first.papers, first.failed), (11, 1));
  let before = load_index(&config).await?;
  let it302 = &before.branch("IT").ok_or("IT missing")?.semesters[0].subjects[1];
  assert_eq!(it302.papers.len(), 1);

  let second = traverser.run().await?;
  assert_eq!((second.papers, second.saved, second.skipped), (12, 1, 11));
  assert!(config.base_dir.join("IT/3/IT302/Summer_2024.pdf").is_file());
  Ok(())
}

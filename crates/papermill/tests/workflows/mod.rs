use super::*;

mod crawl;
mod resume;

#[test]
fn test_config_file() -> TestResult<()> {
  let config = Config::from_file("tests/.config/papermill.toml")?;

  assert_eq!(config.base_url, BASE);
  assert_eq!(config.base_dir, Path::new("mirror"));
  assert_eq!(config.metadata_path, Path::new("mirror/index.json"));
  assert_eq!(config.request_delay_ms, 250);
  assert_eq!(config.concurrency, 2);
  assert_eq!(config.min_pdf_bytes, 1024);
  assert_eq!(config.retry.max_attempts, 5);
  assert_eq!(config.retry.backoff, Backoff::Exponential { initial_ms: 500, max_ms: 8000 });

  // Untouched fields keep their defaults
  assert_eq!(config.paper_param, "paper");
  assert_eq!(config.download_path, "/download/");
  assert_eq!(config.page_timeout_ms, 30_000);
  assert_eq!(config.max_in_flight, 1);
  Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
  for toml in [
    "concurrency = 0",
    "max_in_flight = 0",
    "base_url = \"https://papers.test/papers/BE\"",
    "[retry]\nmax_attempts = 0",
  ] {
    let result = Config::from_toml_str(toml);
    assert!(matches!(result, Err(MirrorError::Config(_))), "{toml} was accepted");
  }
}

#[test]
fn test_traverser_validates_config() {
  let config = Config::default().with_concurrency(0);
  let result = Traverser::with_transport(&config, Arc::new(MemoryTransport::new()));
  assert!(matches!(result, Err(MirrorError::Config(_))));
}

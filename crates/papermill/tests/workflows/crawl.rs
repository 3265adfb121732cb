use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use url::Url;

use super::*;

/// Tracks how many requests are in flight at once, holding each one for a few milliseconds.
#[derive(Default)]
struct InFlight {
  inner:   MemoryTransport,
  current: AtomicUsize,
  peak:    AtomicUsize,
}

#[async_trait]
impl Transport for InFlight {
  async fn get(&self, url: &Url, timeout: Duration) -> papermill::error::Result<Vec<u8>> {
    let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(5)).await;
    let reply = self.inner.get(url, timeout).await;
    self.current.fetch_sub(1, Ordering::SeqCst);
    reply
  }
}

#[traced_test]
#[tokio::test]
async fn test_crawl_mirrors_whole_site() -> TestResult<()> {
  let dir = tempdir()?;
  let config = test_config(dir.path());
  let transport = Arc::new(create_test_site());

  let report = Traverser::with_transport(&config, transport.clone())?.run().await?;

  assert_eq!(report.branches, 2);
  assert_eq!(report.semesters, 3);
  assert_eq!(report.subjects, 6);
  assert_eq!(report.papers, 12);
  assert_eq!(report.saved, 12);
  assert_eq!((report.skipped, report.failed, report.pages_failed), (0, 0, 0));

  let catalog = load_index(&config).await?;
  let branches: Vec<_> =
    catalog.branches.iter().map(|branch| (branch.code.as_str(), branch.name.as_str())).collect();
  assert_eq!(branches, [("CE", "Civil Engineering"), ("IT", "Information Technology")]);

  let it = catalog.branch("IT").ok_or("IT missing")?;
  assert_eq!(it.semesters.iter().map(|semester| semester.number).collect::<Vec<_>>(), [3]);
  assert_eq!(it.semesters[0].subjects[1].name, "Subject IT302");

  let paths: Vec<_> = catalog.papers().map(|(.., paper)| paper.local_path.as_str()).collect();
  assert_eq!(&paths[..4], [
    "CE/3/CE301/Winter_2024.pdf",
    "CE/3/CE301/Summer_2024.pdf",
    "CE/3/CE302/Winter_2024.pdf",
    "CE/3/CE302/Summer_2024.pdf",
  ]);
  assert_eq!(paths.last(), Some(&"IT/3/IT302/Summer_2024.pdf"));

  for (.., paper) in catalog.papers() {
    assert!(paper.downloaded);
    assert!(config.base_dir.join(&paper.local_path).is_file(), "{} missing", paper.local_path);
  }
  assert_eq!(
    std::fs::read(config.base_dir.join("CE/4/CE402/Summer_2024.pdf"))?,
    b"%PDF CE402 summer"
  );
  assert!(logs_contain("Found 2 branches"));
  Ok(())
}

#[tokio::test]
async fn test_concurrency_keeps_sequential_order() -> TestResult<()> {
  let sequential_dir = tempdir()?;
  let sequential = test_config(sequential_dir.path()).with_concurrency(1);
  Traverser::with_transport(&sequential, Arc::new(create_test_site()))?.run().await?;

  let parallel_dir = tempdir()?;
  let parallel = test_config(parallel_dir.path()).with_concurrency(8);
  Traverser::with_transport(&parallel, Arc::new(create_test_site()))?.run().await?;

  assert_eq!(
    std::fs::read_to_string(&sequential.metadata_path)?,
    std::fs::read_to_string(&parallel.metadata_path)?
  );
  Ok(())
}

#[tokio::test]
async fn test_error_pages_below_minimum_size_are_dropped() -> TestResult<()> {
  let dir = tempdir()?;
  let mut config = test_config(dir.path());
  config.min_pdf_bytes = 10;
  let broken = "https://cdn.papers.test/download/?paper=CE301-w24";
  let transport = Arc::new(create_test_site().with_reply(broken, Reply::html("<html>")));

  let report = Traverser::with_transport(&config, transport.clone())?.run().await?;

  assert_eq!(report.failed, 1);
  assert_eq!(report.papers, 11);
  assert_eq!(transport.request_count(broken), 2);
  assert!(!config.base_dir.join("CE/3/CE301/Winter_2024.pdf").exists());

  let catalog = load_index(&config).await?;
  let ce301 = &catalog.branch("CE").ok_or("CE missing")?.semesters[0].subjects[0];
  assert_eq!(ce301.papers.len(), 1);
  assert_eq!(ce301.papers[0].year_label, "Summer 2024");
  Ok(())
}

#[tokio::test]
async fn test_unreachable_subject_prunes_only_that_subject() -> TestResult<()> {
  let dir = tempdir()?;
  let config = test_config(dir.path());
  let transport =
    Arc::new(create_test_site().with_reply(&format!("{BASE}CE/4/CE401/"), Reply::Status(503)));

  let report = Traverser::with_transport(&config, transport)?.run().await?;

  assert_eq!(report.pages_failed, 1);
  assert_eq!(report.subjects, 5);
  let catalog = load_index(&config).await?;
  let codes: Vec<_> = catalog.papers().map(|(_, _, subject, _)| subject.code.as_str()).collect();
  assert!(!codes.contains(&"CE401"));
  assert!(codes.contains(&"CE402"));
  Ok(())
}

#[tokio::test]
async fn test_max_in_flight_bounds_listings_and_downloads() -> TestResult<()> {
  for max_in_flight in [1, 3] {
    let dir = tempdir()?;
    let mut config = test_config(dir.path()).with_concurrency(8);
    config.max_in_flight = max_in_flight;
    let transport = Arc::new(InFlight { inner: create_test_site(), ..Default::default() });

    let report = Traverser::with_transport(&config, transport.clone())?.run().await?;

    assert_eq!(report.papers, 12);
    assert_eq!(transport.peak.load(Ordering::SeqCst), max_in_flight);
    assert_eq!(transport.current.load(Ordering::SeqCst), 0);
  }
  Ok(())
}

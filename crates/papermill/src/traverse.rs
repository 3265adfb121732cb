//! The catalog crawl.
//!
//! [`Traverser::run`] walks the catalog top-down and depth-first: branches in discovery order,
//! semesters ascending, subjects and papers in discovery order. Within one branch, sibling
//! semesters, subjects and paper downloads are worked on concurrently (up to
//! `Config::concurrency`), but results are always collected in listing order, so the index
//! comes out identical to a sequential crawl. Requests are paced by the one rate limiter the
//! fetcher and the downloader share.
//!
//! Failure handling follows a single rule: a listing page that cannot be fetched counts as
//! "no children", and a node without children is dropped. Papers whose download fails are
//! dropped too, so every paper in the index is present on disk. Only the root listing is
//! required; without it [`MirrorError::Startup`] is returned.
//!
//! Branches are finished one at a time. The run loop alone owns the [`Catalog`]: it appends a
//! branch once its whole subtree is resolved and then checkpoints the full catalog to the
//! [`MetadataStore`]. Cancellation is observed between levels and before each download; a
//! cancelled branch is never appended, so the last checkpoint stays valid. Sibling streams are
//! always drained, so downloads that already started still finish.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::{
  classify::{BranchLink, Level, LinkClassifier, PaperLink, SubjectLink},
  download::{DownloadOutcome, Downloader},
  store::MetadataStore,
};

/// Progress notifications emitted while crawling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
  /// The root listing was classified.
  BranchesFound {
    /// Number of branches found.
    count: usize,
  },
  /// Work on a branch started.
  BranchStarted {
    /// 1-based position in discovery order.
    position: usize,
    /// Number of branches found.
    total:    usize,
    /// Branch code.
    code:     String,
    /// Branch name.
    name:     String,
  },
  /// A branch listing was classified.
  SemestersFound {
    /// Branch code.
    branch: String,
    /// Number of semesters found.
    count:  usize,
  },
  /// A semester listing was classified.
  SubjectsFound {
    /// Branch code.
    branch:   String,
    /// Semester number.
    semester: u8,
    /// Number of subjects found.
    count:    usize,
  },
  /// A subject listing was classified.
  PapersFound {
    /// Subject code.
    subject: String,
    /// Subject name.
    name:    String,
    /// Number of papers found.
    count:   usize,
  },
  /// A paper was handled by the downloader.
  Download {
    /// Path relative to the base directory.
    local_path: String,
    /// What happened.
    status:     DownloadStatus,
  },
  /// A branch finished; `kept` is false when it was pruned for lack of papers.
  BranchFinished {
    /// Branch code.
    code: String,
    /// Whether the branch made it into the catalog.
    kept: bool,
  },
}

/// Summary of a [`DownloadOutcome`] suitable for progress output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
  /// The file already existed.
  Skipped,
  /// The file was downloaded.
  Saved,
  /// The download failed for the given reason.
  Failed(String),
}

/// Counts describing a finished (or cancelled) crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
  /// Branches in the catalog.
  pub branches:            usize,
  /// Semesters in the catalog.
  pub semesters:           usize,
  /// Subjects in the catalog.
  pub subjects:            usize,
  /// Papers in the catalog.
  pub papers:              usize,
  /// Papers downloaded during this run.
  pub saved:               usize,
  /// Papers already present before this run.
  pub skipped:             usize,
  /// Papers whose download failed and which were left out.
  pub failed:              usize,
  /// Listing pages that could not be fetched.
  pub pages_failed:        usize,
  /// Checkpoints that could not be written.
  pub checkpoint_failures: usize,
  /// Whether the crawl stopped early because it was cancelled.
  pub cancelled:           bool,
}

/// Drives the crawl.
pub struct Traverser {
  /// Listing fetches; shares its rate limiter with `downloader`.
  fetcher:     PageFetcher,
  /// Turns listing pages into links.
  extractor:   Arc<dyn LinkExtractor>,
  /// Turns links into records.
  classifier:  LinkClassifier,
  /// Saves papers.
  downloader:  Downloader,
  /// Persists checkpoints.
  store:       MetadataStore,
  /// Maximum concurrently worked siblings.
  concurrency: usize,
  /// Stops the crawl between levels.
  cancel:      CancellationToken,
  /// Optional progress listener.
  events:      Option<UnboundedSender<CrawlEvent>>,
}

impl Traverser {
  /// Creates a traverser that talks HTTP with the configured identification header.
  pub fn from_config(config: Config) -> Result<Self> {
    let transport = HttpTransport::new(&config.user_agent)?;
    Self::with_transport(&config, Arc::new(transport))
  }

  /// Creates a traverser over an arbitrary [`Transport`].
  pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
    config.validate()?;
    let fetcher = PageFetcher::from_config(config, transport);
    Ok(Self {
      downloader:  Downloader::new(fetcher.clone(), &config.base_dir),
      fetcher,
      extractor:   Arc::new(HtmlLinkExtractor::new()),
      classifier:  LinkClassifier::from_config(config)?,
      store:       MetadataStore::new(&config.metadata_path),
      concurrency: config.concurrency,
      cancel:      CancellationToken::new(),
      events:      None,
    })
  }

  /// Replaces the HTML link extractor.
  pub fn with_extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
    self.extractor = extractor;
    self
  }

  /// Uses `token` to stop the crawl.
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancel = token;
    self
  }

  /// Sends progress events to `events`.
  pub fn with_events(mut self, events: UnboundedSender<CrawlEvent>) -> Self {
    self.events = Some(events);
    self
  }

  /// Token that cancels this traverser's crawl.
  pub fn cancellation_token(&self) -> CancellationToken { self.cancel.clone() }

  /// Store the catalog is checkpointed to.
  pub fn store(&self) -> &MetadataStore { &self.store }

  /// Crawls the whole catalog, downloading papers and checkpointing after every branch.
  ///
  /// # Errors
  ///
  /// Returns [`MirrorError::Startup`] if the root listing cannot be fetched. Every other
  /// failure only shrinks the catalog and is reflected in the returned [`CrawlReport`].
  pub async fn run(&self) -> Result<CrawlReport> {
    let crawl = Crawl { traverser: self, counters: Counters::default() };
    let mut catalog = Catalog::new();
    let mut cancelled = false;

    let root = self.classifier.base().clone();
    info!("Fetching branches from {root}");
    let body = self
      .fetcher
      .fetch_page(&root)
      .await
      .map_err(|cause| MirrorError::Startup { url: root.to_string(), cause: Box::new(cause) })?;
    let branches = self.classifier.branches(&self.extractor.extract(&root, &body));
    info!("Found {} branches", branches.len());
    crawl.emit(CrawlEvent::BranchesFound { count: branches.len() });

    let total = branches.len();
    for (index, branch) in branches.into_iter().enumerate() {
      if self.cancel.is_cancelled() {
        cancelled = true;
        break;
      }
      crawl.emit(CrawlEvent::BranchStarted {
        position: index + 1,
        total,
        code: branch.code.clone(),
        name: branch.name.clone(),
      });

      let code = branch.code.clone();
      match crawl.branch(branch).await {
        Ok(Some(resolved)) => {
          catalog.branches.push(resolved);
          crawl.emit(CrawlEvent::BranchFinished { code, kept: true });
        },
        Ok(None) => {
          info!("Branch {code} has no papers, leaving it out");
          crawl.emit(CrawlEvent::BranchFinished { code, kept: false });
        },
        Err(MirrorError::Cancelled) => {
          info!("Crawl cancelled while working on branch {code}");
          cancelled = true;
          break;
        },
        Err(e) => {
          error!("Branch {code} failed: {e}");
          crawl.emit(CrawlEvent::BranchFinished { code, kept: false });
        },
      }

      crawl.checkpoint(&catalog).await;
    }

    if total == 0 {
      crawl.checkpoint(&catalog).await;
    }

    let totals = catalog.totals();
    Ok(CrawlReport {
      branches: totals.branches,
      semesters: totals.semesters,
      subjects: totals.subjects,
      papers: totals.papers,
      saved: crawl.counters.saved.load(Ordering::Relaxed),
      skipped: crawl.counters.skipped.load(Ordering::Relaxed),
      failed: crawl.counters.failed.load(Ordering::Relaxed),
      pages_failed: crawl.counters.pages_failed.load(Ordering::Relaxed),
      checkpoint_failures: crawl.counters.checkpoint_failures.load(Ordering::Relaxed),
      cancelled,
    })
  }
}

/// Counters updated by concurrently resolved subtrees.
#[derive(Debug, Default)]
struct Counters {
  /// Papers downloaded.
  saved:               AtomicUsize,
  /// Papers already present.
  skipped:             AtomicUsize,
  /// Papers that failed.
  failed:              AtomicUsize,
  /// Listing pages that failed.
  pages_failed:        AtomicUsize,
  /// Checkpoints that failed.
  checkpoint_failures: AtomicUsize,
}

/// State of a single [`Traverser::run`].
struct Crawl<'a> {
  /// Configuration and collaborators.
  traverser: &'a Traverser,
  /// Per-run statistics.
  counters:  Counters,
}

impl Crawl<'_> {
  /// Forwards `event` to the listener, if any.
  fn emit(&self, event: CrawlEvent) {
    if let Some(events) = &self.traverser.events {
      let _ = events.send(event);
    }
  }

  /// Fails with [`MirrorError::Cancelled`] once the token fired.
  fn ensure_running(&self) -> Result<()> {
    if self.traverser.cancel.is_cancelled() {
      Err(MirrorError::Cancelled)
    } else {
      Ok(())
    }
  }

  /// Rewrites the index with `catalog`; failures are logged and counted.
  async fn checkpoint(&self, catalog: &Catalog) {
    if let Err(e) = self.traverser.store.persist(catalog).await {
      error!("Failed to save metadata to {}: {e}", self.traverser.store.path().display());
      self.counters.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
    }
  }

  /// Fetches the listing page of `level`; `None` if it could not be fetched.
  async fn listing(&self, level: Level<'_>) -> Result<Option<Vec<Link>>> {
    self.ensure_running()?;
    let traverser = self.traverser;
    let url = match traverser.classifier.listing_url(&level) {
      Ok(url) => url,
      Err(e) => {
        warn!("Cannot build listing URL for {level:?}: {e}");
        self.counters.pages_failed.fetch_add(1, Ordering::Relaxed);
        return Ok(None);
      },
    };

    let fetched = tokio::select! {
      biased;
      _ = traverser.cancel.cancelled() => return Err(MirrorError::Cancelled),
      fetched = traverser.fetcher.fetch_page(&url) => fetched,
    };
    match fetched {
      Ok(body) => Ok(Some(traverser.extractor.extract(&url, &body))),
      Err(e) => {
        warn!("Skipping listing {url}: {e}");
        self.counters.pages_failed.fetch_add(1, Ordering::Relaxed);
        Ok(None)
      },
    }
  }

  /// Resolves a branch; `None` if it ends up without papers.
  async fn branch(&self, branch: BranchLink) -> Result<Option<Branch>> {
    let Some(links) = self.listing(Level::Semester { branch: &branch.code }).await? else {
      return Ok(None);
    };
    let numbers = self.traverser.classifier.semesters(&links, &branch.code);
    debug!("Branch {} has semesters {numbers:?}", branch.code);
    self.emit(CrawlEvent::SemestersFound { branch: branch.code.clone(), count: numbers.len() });

    let semesters = stream::iter(numbers)
      .map(|number| self.semester(&branch.code, number))
      .buffered(self.traverser.concurrency)
      .collect()
      .await;
    let semesters = resolved(semesters)?;

    if semesters.is_empty() {
      return Ok(None);
    }
    Ok(Some(Branch { code: branch.code, name: branch.name, semesters }))
  }

  /// Resolves one semester of `branch`.
  async fn semester(&self, branch: &str, number: u8) -> Result<Option<Semester>> {
    let Some(links) = self.listing(Level::Subject { branch, semester: number }).await? else {
      return Ok(None);
    };
    let found = self.traverser.classifier.subjects(&links, branch, number);
    self.emit(CrawlEvent::SubjectsFound {
      branch:   branch.to_string(),
      semester: number,
      count:    found.len(),
    });

    let subjects = stream::iter(found)
      .map(|subject| self.subject(branch, number, subject))
      .buffered(self.traverser.concurrency)
      .collect()
      .await;
    let subjects = resolved(subjects)?;

    if subjects.is_empty() {
      return Ok(None);
    }
    Ok(Some(Semester { number, subjects }))
  }

  /// Resolves a subject and downloads its papers.
  async fn subject(
    &self,
    branch: &str,
    semester: u8,
    subject: SubjectLink,
  ) -> Result<Option<Subject>> {
    let level = Level::Paper { branch, semester, subject: &subject.code };
    let Some(links) = self.listing(level).await? else {
      return Ok(None);
    };
    let found = self.traverser.classifier.papers(&links);
    self.emit(CrawlEvent::PapersFound {
      subject: subject.code.clone(),
      name:    subject.name.clone(),
      count:   found.len(),
    });

    let papers = stream::iter(found)
      .map(|paper| self.paper(branch, semester, &subject.code, paper))
      .buffered(self.traverser.concurrency)
      .collect()
      .await;
    let papers = resolved(papers)?;

    if papers.is_empty() {
      return Ok(None);
    }
    Ok(Some(Subject { code: subject.code, name: subject.name, papers }))
  }

  /// Downloads one paper; failed papers are left out of the catalog.
  ///
  /// A download is only started while the crawl is running; once started it runs to completion.
  async fn paper(
    &self,
    branch: &str,
    semester: u8,
    subject: &str,
    paper: PaperLink,
  ) -> Result<Option<Paper>> {
    self.ensure_running()?;
    let local_path = compute_local_path(branch, semester, subject, &paper.year_label);
    let outcome = self.traverser.downloader.save(&paper.source_url, &local_path).await;
    let status = match &outcome {
      DownloadOutcome::Skipped => {
        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        DownloadStatus::Skipped
      },
      DownloadOutcome::Saved { .. } => {
        self.counters.saved.fetch_add(1, Ordering::Relaxed);
        DownloadStatus::Saved
      },
      DownloadOutcome::Failed(e) => {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        DownloadStatus::Failed(e.to_string())
      },
    };
    self.emit(CrawlEvent::Download { local_path: local_path.clone(), status });

    Ok(outcome.is_present().then(|| Paper {
      year_label: paper.year_label,
      source_url: paper.source_url,
      local_path,
      downloaded: true,
    }))
  }
}

/// Keeps the children that resolved to something, failing if any sibling was cancelled.
///
/// Takes the fully drained results, so no sibling is dropped halfway.
fn resolved<T>(children: Vec<Result<Option<T>>>) -> Result<Vec<T>> {
  children.into_iter().filter_map(Result::transpose).collect()
}

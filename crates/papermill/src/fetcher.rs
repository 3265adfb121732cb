//! Fetching pages and documents.
//!
//! The network sits behind the [`Transport`] trait, which performs exactly one GET. The
//! [`PageFetcher`] layers the shared [`RateLimiter`] and the [`RetryPolicy`] on top of it, so a
//! call either returns the body or a [`MirrorError::Fetch`] naming the URL and the last cause.
//!
//! Two transports ship with the crate:
//! - [`HttpTransport`], backed by `reqwest`
//! - [`MemoryTransport`], which replays scripted replies, for tests and offline runs
//!
//! # Examples
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//!
//! use papermill::{
//!   fetcher::{MemoryTransport, PageFetcher, Reply},
//!   rate_limit::RateLimiter,
//!   retry::RetryPolicy,
//! };
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = MemoryTransport::new().with_reply("https://example.com/", Reply::html("<a/>"));
//! let fetcher = PageFetcher::new(
//!   Arc::new(transport),
//!   Arc::new(RateLimiter::new(1, Duration::ZERO)),
//!   RetryPolicy::new(3),
//! );
//! let page = fetcher.fetch_page(&Url::parse("https://example.com/")?).await?;
//! assert_eq!(page, "<a/>");
//! # Ok(())
//! # }
//! ```

use std::{
  collections::{HashMap, VecDeque},
  sync::Mutex,
};

use super::*;

/// A single HTTP GET.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Fetches `url`, failing on transport errors, timeouts and non-2xx statuses.
  async fn get(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>>;
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  /// Client carrying the identification header.
  client: reqwest::Client,
}

impl HttpTransport {
  /// Builds a client that sends `user_agent` with every request.
  pub fn new(user_agent: &str) -> Result<Self> {
    let client = reqwest::Client::builder().user_agent(user_agent).build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>> {
    let to_error = |e: reqwest::Error| {
      if e.is_timeout() {
        MirrorError::Timeout { url: url.to_string() }
      } else {
        MirrorError::Network(e)
      }
    };

    let response = self.client.get(url.clone()).timeout(timeout).send().await.map_err(to_error)?;
    let status = response.status();
    if !status.is_success() {
      trace!("{url} response: {response:?}");
      return Err(MirrorError::Status { url: url.to_string(), status: status.as_u16() });
    }
    let bytes = response.bytes().await.map_err(to_error)?;
    Ok(bytes.to_vec())
  }
}

/// A scripted answer of the [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
  /// A successful response with this body.
  Body(Vec<u8>),
  /// A response with this non-2xx status.
  Status(u16),
  /// No response before the timeout.
  Timeout,
}

impl Reply {
  /// A successful response carrying `html`.
  pub fn html(html: &str) -> Self { Reply::Body(html.as_bytes().to_vec()) }
}

/// [`Transport`] answering from a script instead of the network.
///
/// Each URL owns a queue of replies; the last reply of a queue repeats forever. Unknown URLs
/// answer 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct MemoryTransport {
  /// Pending replies per URL.
  replies:  Mutex<HashMap<String, VecDeque<Reply>>>,
  /// URLs requested so far, in order.
  requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
  /// Creates a transport that knows no URLs.
  pub fn new() -> Self { Self::default() }

  /// Answers `url` with `reply` every time.
  pub fn with_reply(self, url: &str, reply: Reply) -> Self { self.with_replies(url, vec![reply]) }

  /// Answers `url` with `replies` in order, repeating the last one.
  pub fn with_replies(self, url: &str, replies: Vec<Reply>) -> Self {
    lock(&self.replies).insert(url.to_string(), replies.into());
    self
  }

  /// All requested URLs, in request order.
  pub fn requests(&self) -> Vec<String> { lock(&self.requests).clone() }

  /// How many times `url` was requested.
  pub fn request_count(&self, url: &str) -> usize {
    lock(&self.requests).iter().filter(|requested| requested.as_str() == url).count()
  }
}

#[async_trait]
impl Transport for MemoryTransport {
  async fn get(&self, url: &Url, _timeout: Duration) -> Result<Vec<u8>> {
    let key = url.to_string();
    lock(&self.requests).push(key.clone());

    let reply = {
      let mut replies = lock(&self.replies);
      match replies.get_mut(&key) {
        Some(queue) if queue.len() > 1 => queue.pop_front(),
        Some(queue) => queue.front().cloned(),
        None => None,
      }
    };

    match reply {
      Some(Reply::Body(body)) => Ok(body),
      Some(Reply::Status(status)) => Err(MirrorError::Status { url: key, status }),
      Some(Reply::Timeout) => Err(MirrorError::Timeout { url: key }),
      None => Err(MirrorError::Status { url: key, status: 404 }),
    }
  }
}

/// Locks a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Rate limited, retrying fetches shared by the traverser and the downloader.
#[derive(Clone)]
pub struct PageFetcher {
  /// Performs single requests.
  transport:        Arc<dyn Transport>,
  /// Shared pacing for every request.
  limiter:          Arc<RateLimiter>,
  /// Attempt budget and backoff.
  retry:            RetryPolicy,
  /// Timeout for listing pages.
  page_timeout:     Duration,
  /// Timeout for documents.
  download_timeout: Duration,
  /// Smallest acceptable document body.
  min_document:     usize,
}

impl PageFetcher {
  /// Creates a fetcher with the default 30s/60s timeouts and no minimum document size.
  pub fn new(
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
  ) -> Self {
    Self {
      transport,
      limiter,
      retry,
      page_timeout: Duration::from_secs(30),
      download_timeout: Duration::from_secs(60),
      min_document: 0,
    }
  }

  /// Creates the fetcher described by `config` over `transport`.
  pub fn from_config(config: &crate::Config, transport: Arc<dyn Transport>) -> Self {
    Self {
      transport,
      limiter: Arc::new(RateLimiter::from_config(config)),
      retry: config.retry,
      page_timeout: config.page_timeout(),
      download_timeout: config.download_timeout(),
      min_document: config.min_pdf_bytes,
    }
  }

  /// Fetches a listing page as text.
  pub async fn fetch_page(&self, url: &Url) -> Result<String> {
    let body = self.fetch(url, self.page_timeout, 0).await?;
    Ok(String::from_utf8_lossy(&body).into_owned())
  }

  /// Fetches a document, rejecting bodies below the configured minimum size.
  pub async fn fetch_document(&self, url: &Url) -> Result<Vec<u8>> {
    self.fetch(url, self.download_timeout, self.min_document).await
  }

  /// One rate limited attempt per retry, each bounded by `timeout`.
  async fn fetch(&self, url: &Url, timeout: Duration, min_len: usize) -> Result<Vec<u8>> {
    let url_str = url.as_str();
    self
      .retry
      .run(url_str, |attempt| async move {
        let _guard = self.limiter.acquire().await?;
        debug!(url = url_str, attempt, "GET");
        let body = self.transport.get(url, timeout).await?;
        if body.len() < min_len {
          return Err(MirrorError::TooSmall {
            url: url_str.to_string(),
            len: body.len(),
            min: min_len,
          });
        }
        Ok(body)
      })
      .await
  }
}

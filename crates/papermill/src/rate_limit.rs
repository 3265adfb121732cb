//! Global request pacing.
//!
//! One [`RateLimiter`] is shared by every listing fetch and every download of a crawl. It caps
//! the number of requests in flight and enforces a minimum spacing between request starts, so
//! the throughput ceiling towards the host holds no matter how many tasks run in parallel.

use tokio::{
  sync::{Mutex, OwnedSemaphorePermit, Semaphore},
  time::Instant,
};

use super::*;

/// Caps concurrent requests and spaces their starts.
#[derive(Debug)]
pub struct RateLimiter {
  /// Permits for requests in flight.
  semaphore:  Arc<Semaphore>,
  /// Minimum time between two request starts.
  min_delay:  Duration,
  /// When the previous request was let through, if any.
  last_start: Mutex<Option<Instant>>,
}

/// Held for the duration of one request; dropping it frees the slot.
#[derive(Debug)]
pub struct RateLimitGuard {
  /// Released on drop.
  _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
  /// Creates a limiter allowing `max_in_flight` concurrent requests spaced by `min_delay`.
  pub fn new(max_in_flight: usize, min_delay: Duration) -> Self {
    Self {
      semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
      min_delay,
      last_start: Mutex::new(None),
    }
  }

  /// Creates the limiter described by a [`Config`](crate::Config).
  pub fn from_config(config: &crate::Config) -> Self {
    Self::new(config.max_in_flight, config.request_delay())
  }

  /// Waits until a request may start.
  pub async fn acquire(&self) -> Result<RateLimitGuard> {
    let permit = self
      .semaphore
      .clone()
      .acquire_owned()
      .await
      .map_err(|_| MirrorError::Config("rate limiter closed".into()))?;

    let mut last_start = self.last_start.lock().await;
    if let Some(previous) = *last_start {
      let elapsed = previous.elapsed();
      if elapsed < self.min_delay {
        tokio::time::sleep(self.min_delay - elapsed).await;
      }
    }
    *last_start = Some(Instant::now());

    Ok(RateLimitGuard { _permit: permit })
  }
}

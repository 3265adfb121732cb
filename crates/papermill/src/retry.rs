//! Bounded retry policy shared by every request.
//!
//! A [`RetryPolicy`] owns the attempt budget and the wait between attempts, so call sites only
//! describe a single attempt and hand it to [`RetryPolicy::run`].
//!
//! ```toml
//! [retry]
//! max_attempts = 3
//! backoff = { type = "fixed", delay_ms = 2000 }
//! ```

use std::future::Future;

use super::*;

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
  /// Wait the same amount after every failure.
  Fixed {
    /// Delay in milliseconds.
    delay_ms: u64,
  },
  /// Double the wait after every failure, capped at `max_ms`.
  Exponential {
    /// Delay after the first failure, in milliseconds.
    initial_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    max_ms:     u64,
  },
}

impl Backoff {
  /// Delay to apply after the given failed attempt (1-based).
  pub fn delay(&self, failed_attempt: u32) -> Duration {
    match *self {
      Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
      Backoff::Exponential { initial_ms, max_ms } => {
        let shift = failed_attempt.saturating_sub(1).min(32);
        let ms = initial_ms.saturating_mul(1u64 << shift).min(max_ms);
        Duration::from_millis(ms)
      },
    }
  }
}

impl Default for Backoff {
  fn default() -> Self { Backoff::Fixed { delay_ms: 2000 } }
}

/// Maximum attempts plus the backoff between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total number of attempts, including the first one.
  pub max_attempts: u32,
  /// Wait between attempts.
  pub backoff:      Backoff,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { max_attempts: 3, backoff: Backoff::default() } }
}

impl RetryPolicy {
  /// Creates a policy with `max_attempts` and the default fixed backoff.
  pub fn new(max_attempts: u32) -> Self { Self { max_attempts, ..Self::default() } }

  /// Replaces the backoff.
  pub fn with_backoff(mut self, backoff: Backoff) -> Self {
    self.backoff = backoff;
    self
  }

  /// Runs `attempt` until it succeeds, fails with a non-transient error, or the attempt budget
  /// is spent.
  ///
  /// The closure receives the 1-based attempt number. A final failure is wrapped into
  /// [`MirrorError::Fetch`] carrying `url` and the last cause.
  pub async fn run<T, F, Fut>(&self, url: &str, mut attempt: F) -> Result<T>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>, {
    let max_attempts = self.max_attempts.max(1);
    let mut current = 1;
    loop {
      match attempt(current).await {
        Ok(value) => return Ok(value),
        Err(cause) => {
          warn!(%url, attempt = current, max_attempts, "request failed: {cause}");
          if current >= max_attempts || !cause.is_transient() {
            return Err(MirrorError::Fetch {
              url:      url.to_string(),
              attempts: current,
              cause:    Box::new(cause),
            });
          }
          tokio::time::sleep(self.backoff.delay(current)).await;
          current += 1;
        },
      }
    }
  }
}

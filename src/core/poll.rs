//! Retry policy for the blocking wait loops
//!
//! Human review and manual testing have unpredictable duration, so the
//! default policy polls forever at a fixed interval. Tests inject a bounded
//! policy instead of monkeying with time.

use std::thread;
use std::time::Duration;

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::ui::progress;

/// Default interval between polls of external state
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Interval plus an optional attempt ceiling
#[derive(Debug, Clone)]
pub struct PollPolicy {
  pub interval: Duration,
  pub max_attempts: Option<u32>,
}

impl PollPolicy {
  /// Unbounded policy at the given interval
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      max_attempts: None,
    }
  }

  /// Policy that gives up after `max_attempts` unsuccessful polls
  pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
    Self {
      interval,
      max_attempts: Some(max_attempts),
    }
  }

  /// Bounded policy with no sleep, for tests
  pub fn immediate(max_attempts: u32) -> Self {
    Self::bounded(Duration::ZERO, max_attempts)
  }

  /// Poll `probe` until it yields a value.
  ///
  /// A probe error is fatal and returned immediately; `Ok(None)` means
  /// "not yet" and schedules another poll after the interval.
  pub fn wait_until<T, F>(&self, what: &str, mut probe: F) -> ReleaseResult<T>
  where
    F: FnMut() -> ReleaseResult<Option<T>>,
  {
    let mut attempts = 0u32;
    loop {
      if let Some(value) = probe()? {
        return Ok(value);
      }
      attempts += 1;
      if let Some(max) = self.max_attempts
        && attempts >= max
      {
        return Err(ReleaseError::message(format!(
          "Gave up waiting for {} after {} attempts",
          what, attempts
        )));
      }
      progress::tick();
      thread::sleep(self.interval);
    }
  }

  /// Re-attempt a fallible call until it succeeds.
  ///
  /// Every error counts as "not yet"; with the default unbounded policy this
  /// never gives up. A bounded policy returns the last error instead.
  pub fn retry_until<T, F>(&self, _what: &str, mut attempt: F) -> ReleaseResult<T>
  where
    F: FnMut() -> ReleaseResult<T>,
  {
    let mut attempts = 0u32;
    loop {
      match attempt() {
        Ok(value) => return Ok(value),
        Err(err) => {
          attempts += 1;
          if let Some(max) = self.max_attempts
            && attempts >= max
          {
            return Err(err);
          }
          progress::tick();
          thread::sleep(self.interval);
        }
      }
    }
  }
}

impl Default for PollPolicy {
  fn default() -> Self {
    Self::new(DEFAULT_INTERVAL)
  }
}

use std::fmt::Display;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Call `op` with the 1-based attempt number until it succeeds or the
    /// attempts run out, sleeping `delay` in between. Returns the last error.
    pub fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", what, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!("{} failed after {} attempts: {}", what, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    debug!("{} attempt {}/{} failed: {}", what, attempt, self.max_attempts, e);
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

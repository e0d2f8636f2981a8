//! Cooperative rest points for long-running mesh computations.
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Checks a cancellation token and yields the thread once per wall-clock slice.
///
/// Long loops call [`RestPoint::check`] between units of work. The call fails with
/// [`Error::Cancelled`] as soon as the token is cancelled.
pub struct RestPoint<'a> {
    token: &'a CancellationToken,
    interval: Duration,
    slice_start: Instant,
    rests: usize,
}

impl<'a> RestPoint<'a> {
    pub fn new(token: &'a CancellationToken, interval: Duration) -> Self {
        Self {
            token,
            interval,
            slice_start: Instant::now(),
            rests: 0,
        }
    }

    /// Fail if cancelled; yield to the scheduler when the current slice is used up.
    #[inline]
    pub fn check(&mut self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.slice_start.elapsed() >= self.interval {
            std::thread::yield_now();
            self.rests += 1;
            self.slice_start = Instant::now();
            if self.token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }

    /// Number of slices that ended in a yield so far.
    pub fn rests(&self) -> usize {
        self.rests
    }
}

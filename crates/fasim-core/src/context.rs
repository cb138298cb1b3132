//! Per-request cancellation and deadline.
//!
//! Repositories poll [`RequestContext::check`] before opening a transaction
//! and between the statements of a multi-statement write. A failed check
//! aborts the operation; dropping the open transaction rolls it back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{RepoError, Result};

/// Cancellation signal and optional deadline for one repository call.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    /// A context that never expires and is only cancelled through a handle.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    /// Build from an optional millisecond timeout, as read from config or flags.
    #[must_use]
    pub fn from_timeout_ms(timeout_ms: Option<u64>) -> Self {
        timeout_ms.map_or_else(Self::background, |ms| {
            Self::with_timeout(Duration::from_millis(ms))
        })
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A handle that can cancel this context from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail fast when the request was cancelled or its deadline passed.
    ///
    /// Cancellation wins over an expired deadline.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Cancelled`] or [`RepoError::DeadlineExceeded`].
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RepoError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(RepoError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Cancels the [`RequestContext`] it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

// crates/shardline-core/src/core/context.rs
// ============================================================================
// Module: Shardline Call Context
// Description: Cancellation and deadline carried by every map operation.
// Purpose: Let callers bound how long a backend statement may block.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`CallContext`] is created by the caller and passed by reference into
//! every store operation. Backends check it before acquiring a connection and
//! again before executing, and cap driver wait time at the remaining
//! deadline. A context never retries or extends anything on its own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use crate::interfaces::MapStoreError;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Shared cancellation flag; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Creates a handle in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every operation holding this handle.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ============================================================================
// SECTION: Call Context
// ============================================================================

/// Per-call cancellation and deadline.
///
/// # Invariants
/// - A cancelled handle stays cancelled.
/// - `deadline`, when set, is absolute and never extended.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Optional absolute deadline.
    deadline: Option<Instant>,
    /// Cancellation flag shared with the caller.
    cancel: CancelHandle,
}

impl CallContext {
    /// Returns a context with no deadline that is never cancelled by itself.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancel: CancelHandle::new(),
        }
    }

    /// Returns a copy of this context bound to an absolute deadline.
    ///
    /// The earlier of the existing and the new deadline wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |current| current.min(deadline)));
        self
    }

    /// Returns a copy of this context observing `cancel`.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the cancellation handle for this context.
    #[must_use]
    pub const fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    /// Returns the absolute deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline (`None` when unbounded).
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails when the context was cancelled or its deadline passed.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError::Cancelled`] or [`MapStoreError::DeadlineExceeded`].
    pub fn check(&self) -> Result<(), MapStoreError> {
        if self.cancel.is_cancelled() {
            return Err(MapStoreError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(MapStoreError::DeadlineExceeded);
        }
        Ok(())
    }
}

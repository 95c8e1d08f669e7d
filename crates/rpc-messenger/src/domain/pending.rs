//! Pending call table - bridges published requests to their replies.
//!
//! Maps correlation IDs to callers waiting for a response on the channel's
//! response subscription.
//!
//! Flow:
//! 1. `query` generates a CorrelationId
//! 2. `query` calls `register()` to get a oneshot receiver
//! 3. `query` publishes the request
//! 4. The response pump decodes an envelope and calls `complete()`
//! 5. `query` awaits the receiver, or calls `abandon()` on timeout/cancel
//!
//! Whoever removes the entry owns the resolution, so a call is resolved
//! exactly once even when a reply and a timeout race.

use crate::domain::correlation::CorrelationId;
use crate::domain::envelope::ResponseEnvelope;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;

/// A call waiting for its response.
struct PendingCall {
    /// Channel to deliver the response
    sender: oneshot::Sender<ResponseEnvelope>,
    /// When the call was registered
    created_at: Instant,
}

/// Why a call left the table without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abandon {
    /// Deadline elapsed
    Timeout,
    /// Caller canceled
    Canceled,
    /// Caller went away (future dropped or publish failed)
    Dropped,
}

/// Statistics for the pending call table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total calls registered
    pub total_registered: AtomicU64,
    /// Total calls completed by a response
    pub total_completed: AtomicU64,
    /// Total calls that timed out
    pub total_timeouts: AtomicU64,
    /// Total calls canceled or dropped
    pub total_cancelled: AtomicU64,
    /// Responses that matched no pending call
    pub total_unmatched: AtomicU64,
}

/// Pending call table of one message channel.
pub struct PendingCallTable {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: Arc<PendingStats>,
}

impl PendingCallTable {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a call and get a receiver for its response.
    pub fn register(&self, correlation_id: CorrelationId) -> oneshot::Receiver<ResponseEnvelope> {
        let (tx, rx) = oneshot::channel();

        let call = PendingCall {
            sender: tx,
            created_at: Instant::now(),
        };

        debug!(correlation_id = %correlation_id, "Registered pending call");
        self.pending.insert(correlation_id, call);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        rx
    }

    /// Resolve the call a response belongs to.
    ///
    /// Returns true if a waiting call received the response, false if no call
    /// matched (unknown, already timed out, or already resolved).
    pub fn complete(&self, response: ResponseEnvelope) -> bool {
        let Some((correlation_id, call)) = self.pending.remove(&response.reply_to) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %response.reply_to,
                "Response for unknown or expired correlation ID"
            );
            return false;
        };

        let response_time = call.created_at.elapsed();
        if call.sender.send(response).is_err() {
            // Receiver was dropped without going through abandon()
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %correlation_id, "Pending call receiver dropped");
            return false;
        }

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %correlation_id,
            response_time_ms = response_time.as_millis(),
            "Completed pending call"
        );
        true
    }

    /// Remove a call that will not be answered.
    ///
    /// Returns false if the entry is already gone, meaning a response claimed
    /// it first and is being delivered to the receiver.
    pub fn abandon(&self, correlation_id: &CorrelationId, reason: Abandon) -> bool {
        if self.pending.remove(correlation_id).is_none() {
            return false;
        }

        let counter = match reason {
            Abandon::Timeout => &self.stats.total_timeouts,
            Abandon::Canceled | Abandon::Dropped => &self.stats.total_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(correlation_id = %correlation_id, reason = ?reason, "Abandoned pending call");
        true
    }

    /// Drop every waiting call. Their receivers close, so callers see the
    /// response subscription as gone. Returns how many calls were dropped.
    pub fn close_all(&self) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        let closed = ids
            .iter()
            .filter(|id| self.pending.remove(*id).is_some())
            .count();

        self.stats
            .total_cancelled
            .fetch_add(closed as u64, Ordering::Relaxed);
        if closed > 0 {
            debug!(closed, "Closed pending calls");
        }
        closed
    }

    /// Get number of currently pending calls
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl Default for PendingCallTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Abandons its call when dropped, so a call leaves the table on every exit
/// path of `query` (including the caller dropping the future). A no-op once
/// the call was resolved.
pub(crate) struct PendingGuard {
    table: Arc<PendingCallTable>,
    correlation_id: CorrelationId,
}

impl PendingGuard {
    pub(crate) fn new(table: Arc<PendingCallTable>, correlation_id: CorrelationId) -> Self {
        Self {
            table,
            correlation_id,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.abandon(&self.correlation_id, Abandon::Dropped);
    }
}

//! Counters for monitoring purchase activity.
//!
//! # Example
//!
//! ```rust
//! use purchasekit_manager::metrics::ManagerMetrics;
//!
//! let metrics = ManagerMetrics::new();
//! metrics.record_purchase_attempt();
//! metrics.record_finalized();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.purchases_attempted, 1);
//! assert_eq!(snapshot.transactions_finalized, 1);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::PurchaseOutcome;

/// Collected metrics for one purchase manager.
///
/// Thread-safe via atomic operations.
#[derive(Debug)]
pub struct ManagerMetrics {
    // Purchase flow
    purchases_attempted: AtomicU64,
    purchases_succeeded: AtomicU64,
    purchases_failed: AtomicU64,
    purchases_cancelled: AtomicU64,
    purchases_pending: AtomicU64,

    // Finalization
    transactions_finalized: AtomicU64,
    finalize_failures: AtomicU64,
    duplicate_finalizes_suppressed: AtomicU64,

    // Verification and reconciliation
    unverified_transactions: AtomicU64,
    listener_events: AtomicU64,
    restores: AtomicU64,

    start_time: Instant,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub purchases_attempted: u64,
    pub purchases_succeeded: u64,
    pub purchases_failed: u64,
    pub purchases_cancelled: u64,
    pub purchases_pending: u64,
    pub transactions_finalized: u64,
    pub finalize_failures: u64,
    pub duplicate_finalizes_suppressed: u64,
    pub unverified_transactions: u64,
    pub listener_events: u64,
    pub restores: u64,
    pub uptime_secs: u64,
}

impl Default for ManagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerMetrics {
    pub fn new() -> Self {
        Self {
            purchases_attempted: AtomicU64::new(0),
            purchases_succeeded: AtomicU64::new(0),
            purchases_failed: AtomicU64::new(0),
            purchases_cancelled: AtomicU64::new(0),
            purchases_pending: AtomicU64::new(0),
            transactions_finalized: AtomicU64::new(0),
            finalize_failures: AtomicU64::new(0),
            duplicate_finalizes_suppressed: AtomicU64::new(0),
            unverified_transactions: AtomicU64::new(0),
            listener_events: AtomicU64::new(0),
            restores: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_purchase_attempt(&self) {
        self.purchases_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a purchase by how it ended.
    pub fn record_outcome(&self, outcome: &PurchaseOutcome) {
        let counter = match outcome {
            PurchaseOutcome::Success(_) => &self.purchases_succeeded,
            PurchaseOutcome::Failure(_) => &self.purchases_failed,
            PurchaseOutcome::UserCancelled => &self.purchases_cancelled,
            PurchaseOutcome::Pending => &self.purchases_pending,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalized(&self) {
        self.transactions_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalize_failure(&self) {
        self.finalize_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_finalize(&self) {
        self.duplicate_finalizes_suppressed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unverified(&self) {
        self.unverified_transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listener_event(&self) {
        self.listener_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restore(&self) {
        self.restores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            purchases_attempted: self.purchases_attempted.load(Ordering::Relaxed),
            purchases_succeeded: self.purchases_succeeded.load(Ordering::Relaxed),
            purchases_failed: self.purchases_failed.load(Ordering::Relaxed),
            purchases_cancelled: self.purchases_cancelled.load(Ordering::Relaxed),
            purchases_pending: self.purchases_pending.load(Ordering::Relaxed),
            transactions_finalized: self.transactions_finalized.load(Ordering::Relaxed),
            finalize_failures: self.finalize_failures.load(Ordering::Relaxed),
            duplicate_finalizes_suppressed: self
                .duplicate_finalizes_suppressed
                .load(Ordering::Relaxed),
            unverified_transactions: self.unverified_transactions.load(Ordering::Relaxed),
            listener_events: self.listener_events.load(Ordering::Relaxed),
            restores: self.restores.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use purchasekit_lib::{PurchaseKitError, Transaction};

    #[test]
    fn test_outcomes_are_counted_separately() {
        let metrics = ManagerMetrics::new();
        metrics.record_outcome(&PurchaseOutcome::Success(Transaction::new("1", "pro_plan")));
        metrics.record_outcome(&PurchaseOutcome::UserCancelled);
        metrics.record_outcome(&PurchaseOutcome::Pending);
        metrics.record_outcome(&PurchaseOutcome::Failure(PurchaseKitError::UnknownResult(
            "?".into(),
        )));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.purchases_succeeded, 1);
        assert_eq!(snapshot.purchases_cancelled, 1);
        assert_eq!(snapshot.purchases_pending, 1);
        assert_eq!(snapshot.purchases_failed, 1);
        assert_eq!(snapshot.purchases_attempted, 0);
    }
}

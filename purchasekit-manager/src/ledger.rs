//! Finalized-transaction tracking.
//!
//! A direct purchase and the update listener can both see the same
//! transaction. The ledger records ids as they are finalized so the second
//! path skips its finalize call.
//!
//! Memory is bounded: once `capacity` ids are tracked the oldest is evicted.
//! Transactions old enough to be evicted are no longer redelivered by the
//! storefront in practice.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use purchasekit_lib::TransactionId;

/// Bounded set of finalized transaction ids.
pub struct FinalizedLedger {
    inner: Mutex<LedgerInner>,
    capacity: usize,
}

struct LedgerInner {
    ids: HashSet<TransactionId>,
    order: VecDeque<TransactionId>,
}

impl FinalizedLedger {
    /// Create a ledger remembering at most `capacity` ids (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                ids: HashSet::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Mark an id as finalized if it is not already.
    ///
    /// Returns `true` if the id was fresh and the caller should finalize,
    /// `false` if another path already claimed it.
    pub fn check_and_mark(&self, id: &TransactionId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.ids.contains(id) {
            return false;
        }
        if inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.ids.remove(&oldest);
            }
        }
        inner.ids.insert(id.clone());
        inner.order.push_back(id.clone());
        true
    }

    /// Claim an id for an in-flight finalize.
    ///
    /// Returns `None` if another path already holds or finalized it. The claim
    /// is released when dropped unless [`LedgerClaim::commit`] was called, so a
    /// finalize that fails or is cancelled mid-call leaves the id retryable.
    pub fn claim(&self, id: &TransactionId) -> Option<LedgerClaim<'_>> {
        self.check_and_mark(id).then(|| LedgerClaim {
            ledger: self,
            id: id.clone(),
            committed: false,
        })
    }

    /// Release an id whose finalize failed so a redelivery can retry it.
    pub fn forget(&self, id: &TransactionId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.ids.remove(id) {
            inner.order.retain(|tracked| tracked != id);
        }
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.ids.contains(id)
    }

    /// Number of tracked ids (for monitoring/debugging).
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An id held in the ledger while its finalize call is outstanding.
#[must_use = "dropping a claim releases the id"]
pub struct LedgerClaim<'a> {
    ledger: &'a FinalizedLedger,
    id: TransactionId,
    committed: bool,
}

impl LedgerClaim<'_> {
    /// Keep the id recorded as finalized.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for LedgerClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.ledger.forget(&self.id);
        }
    }
}

//! Assertion helpers for finalize bookkeeping.

use super::MockStore;
use crate::TransactionId;

/// Non-panicking checks over a [`MockStore`]'s finalize log.
pub struct FinalizeAssertion;

impl FinalizeAssertion {
    /// True when the transaction was finalized exactly once.
    pub fn finalized_once(store: &MockStore, id: &TransactionId) -> bool {
        store.finalize_count(id) == 1
    }

    /// True when no transaction id was finalized twice.
    pub fn no_duplicates(store: &MockStore) -> bool {
        let finalized = store.finalized();
        let mut seen = std::collections::HashSet::new();
        finalized.iter().all(|tx| seen.insert(tx.id.clone()))
    }
}

/// Assert that a transaction was finalized exactly once.
///
/// # Panics
/// Panics if it was finalized zero or several times.
pub fn assert_finalized_once(store: &MockStore, id: &TransactionId) {
    let count = store.finalize_count(id);
    assert_eq!(
        count, 1,
        "transaction {} should be finalized exactly once, was finalized {} times",
        id, count
    );
}

/// Assert that a transaction was never finalized.
///
/// # Panics
/// Panics if finalize was called for it.
pub fn assert_never_finalized(store: &MockStore, id: &TransactionId) {
    let count = store.finalize_count(id);
    assert_eq!(
        count, 0,
        "transaction {} should never be finalized, was finalized {} times",
        id, count
    );
}

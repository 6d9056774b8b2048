//! Test utilities for PurchaseKit.
//!
//! This module provides testing infrastructure including:
//! - A scriptable in-memory store provider that records finalize calls
//! - Fixtures for a small sample catalog and common transactions
//! - Assertion helpers for finalize bookkeeping
//!
//! ## Usage
//!
//! ```rust,ignore
//! use purchasekit_lib::test_utils::{MockStore, TestFixtures};
//!
//! let store = MockStore::with_catalog(TestFixtures::catalog());
//! store.script_purchase(PurchaseResult::UserCancelled);
//! ```

mod assertions;
mod fixtures;
mod mock_store;

pub use assertions::{assert_finalized_once, assert_never_finalized, FinalizeAssertion};
pub use fixtures::{
    active_subscription, expired_subscription, lifetime_purchase, unverified, verified,
    TestFixtures,
};
pub use mock_store::MockStore;

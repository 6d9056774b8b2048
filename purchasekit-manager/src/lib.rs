//! PurchaseKit manager.
//!
//! The stateful half of PurchaseKit. A [`PurchaseManager`] drives purchases
//! through an injected [`StoreProvider`](purchasekit_lib::StoreProvider),
//! finalizes verified transactions, restores entitlements, resolves
//! subscription status and runs a background listener on the provider's
//! live update feed. Every result is also reported to registered
//! [`PurchaseObserver`]s on the manager's [`Dispatcher`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use purchasekit_lib::test_utils::{MockStore, TestFixtures};
//! use purchasekit_manager::{PurchaseManager, PurchaseOutcome};
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MockStore::with_catalog(TestFixtures::catalog()));
//! let manager = PurchaseManager::new(store.clone()).unwrap();
//!
//! let outcome = manager.purchase(&TestFixtures::pro_plan()).await;
//! assert!(outcome.is_success());
//! assert_eq!(store.finalized().len(), 1);
//! # });
//! ```

pub mod dispatch;
pub mod ledger;
mod listener;
mod manager;
pub mod metrics;
pub mod observer;
mod outcome;
mod reconcile;

pub use dispatch::{DispatchQueue, Dispatcher};
pub use manager::{PurchaseManager, PurchaseManagerBuilder};
pub use metrics::{ManagerMetrics, MetricsSnapshot};
pub use observer::{Notification, ObserverRegistry, ObserverToken, PurchaseObserver};
pub use outcome::PurchaseOutcome;

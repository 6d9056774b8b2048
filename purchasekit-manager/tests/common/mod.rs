//! Common test utilities for purchasekit-manager integration tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use purchasekit_lib::test_utils::{MockStore, TestFixtures};
use purchasekit_lib::{
    EntitlementStatus, ManagerConfig, ProductId, PurchaseKitError, PurchaseKitErrorCode,
    Transaction, TransactionId,
};
use purchasekit_manager::{PurchaseManager, PurchaseObserver};

/// One observed callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Complete(TransactionId),
    Failed(PurchaseKitErrorCode),
    Cancelled,
    Pending,
    Restored(Vec<TransactionId>),
    Status(ProductId, &'static str),
}

/// Observer that records every callback in order.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(*e)).count()
    }

    pub fn completes(&self) -> usize {
        self.count(|e| matches!(e, Event::Complete(_)))
    }

    pub fn failures(&self) -> usize {
        self.count(|e| matches!(e, Event::Failed(_)))
    }

    pub fn restores(&self) -> usize {
        self.count(|e| matches!(e, Event::Restored(_)))
    }

    pub fn statuses(&self) -> usize {
        self.count(|e| matches!(e, Event::Status(..)))
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl PurchaseObserver for Recorder {
    fn on_purchase_complete(&self, transaction: &Transaction) {
        self.push(Event::Complete(transaction.id.clone()));
    }

    fn on_purchase_failed(&self, error: &PurchaseKitError) {
        self.push(Event::Failed(error.code()));
    }

    fn on_purchase_cancelled(&self) {
        self.push(Event::Cancelled);
    }

    fn on_purchase_pending(&self) {
        self.push(Event::Pending);
    }

    fn on_restored(&self, transactions: &[Transaction]) {
        self.push(Event::Restored(
            transactions.iter().map(|tx| tx.id.clone()).collect(),
        ));
    }

    fn on_status_updated(&self, status: &EntitlementStatus, product_id: &ProductId) {
        self.push(Event::Status(product_id.clone(), status.label()));
    }
}

/// A catalog-backed store, a manager without a listener, and a registered recorder.
#[allow(dead_code)]
pub fn setup() -> (Arc<MockStore>, PurchaseManager, Arc<Recorder>) {
    setup_with(ManagerConfig::default().with_start_listener(false))
}

#[allow(dead_code)]
pub fn setup_with(config: ManagerConfig) -> (Arc<MockStore>, PurchaseManager, Arc<Recorder>) {
    let store = Arc::new(MockStore::with_catalog(TestFixtures::catalog()));
    let manager = PurchaseManager::builder(store.clone())
        .config(config)
        .build()
        .unwrap();
    let recorder = Arc::new(Recorder::default());
    manager.register_observer(&recorder);
    (store, manager, recorder)
}

/// Poll `condition` until it holds or a second passes.
#[allow(dead_code)]
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

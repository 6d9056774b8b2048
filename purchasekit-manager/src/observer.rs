//! Observer registration and notification fan-out.
//!
//! Observers are held as `Weak` handles keyed by an [`ObserverToken`], so the
//! manager is never the reason an observer stays alive. Dropping the last
//! `Arc` to an observer unregisters it implicitly.
//!
//! # Thread Safety
//!
//! The registry uses an `RwLock` that is released before any observer runs.
//! A panicking observer is logged and skipped; the remaining observers still
//! receive the notification.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use purchasekit_lib::{EntitlementStatus, ProductId, PurchaseKitError, Transaction};

/// Callbacks for purchase lifecycle events. Every method defaults to a no-op.
pub trait PurchaseObserver: Send + Sync {
    fn on_purchase_complete(&self, _transaction: &Transaction) {}

    fn on_purchase_failed(&self, _error: &PurchaseKitError) {}

    fn on_purchase_cancelled(&self) {}

    fn on_purchase_pending(&self) {}

    /// Fires once per restore, only when something was restored.
    fn on_restored(&self, _transactions: &[Transaction]) {}

    fn on_status_updated(&self, _status: &EntitlementStatus, _product_id: &ProductId) {}
}

/// Handle returned by registration, used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

/// An event delivered to observers.
#[derive(Clone, Debug)]
pub enum Notification {
    PurchaseComplete(Transaction),
    PurchaseFailed(PurchaseKitError),
    PurchaseCancelled,
    PurchasePending,
    Restored(Vec<Transaction>),
    StatusUpdated {
        status: EntitlementStatus,
        product_id: ProductId,
    },
}

impl Notification {
    /// Invoke the matching callback on one observer.
    pub fn deliver(&self, observer: &dyn PurchaseObserver) {
        match self {
            Self::PurchaseComplete(tx) => observer.on_purchase_complete(tx),
            Self::PurchaseFailed(err) => observer.on_purchase_failed(err),
            Self::PurchaseCancelled => observer.on_purchase_cancelled(),
            Self::PurchasePending => observer.on_purchase_pending(),
            Self::Restored(transactions) => observer.on_restored(transactions),
            Self::StatusUpdated { status, product_id } => {
                observer.on_status_updated(status, product_id)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PurchaseComplete(_) => "purchase_complete",
            Self::PurchaseFailed(_) => "purchase_failed",
            Self::PurchaseCancelled => "purchase_cancelled",
            Self::PurchasePending => "purchase_pending",
            Self::Restored(_) => "restored",
            Self::StatusUpdated { .. } => "status_updated",
        }
    }
}

/// Ordered registry of non-owning observer handles.
pub struct ObserverRegistry {
    observers: RwLock<Vec<(ObserverToken, Weak<dyn PurchaseObserver>)>>,
    next_token: AtomicU64,
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register an observer without taking ownership of it.
    pub fn register<O: PurchaseObserver + 'static>(&self, observer: &Arc<O>) -> ObserverToken {
        let weak = Arc::downgrade(observer);
        let weak: Weak<dyn PurchaseObserver> = weak;
        self.insert(weak)
    }

    /// Register an observer that is already type-erased.
    pub fn register_dyn(&self, observer: &Arc<dyn PurchaseObserver>) -> ObserverToken {
        self.insert(Arc::downgrade(observer))
    }

    fn insert(&self, weak: Weak<dyn PurchaseObserver>) -> ObserverToken {
        let token = ObserverToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.push((token, weak));
        token
    }

    /// Remove an observer. Returns false if the token was unknown.
    pub fn unregister(&self, token: ObserverToken) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let before = observers.len();
        observers.retain(|(t, _)| *t != token);
        observers.len() != before
    }

    /// Number of observers that are still alive.
    pub fn len(&self) -> usize {
        let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
        observers.iter().filter(|(_, w)| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a notification to every live observer in registration order.
    pub fn notify(&self, notification: &Notification) {
        for observer in self.live_observers() {
            let delivered = catch_unwind(AssertUnwindSafe(|| notification.deliver(observer.as_ref())));
            if delivered.is_err() {
                tracing::warn!(
                    kind = notification.kind(),
                    "observer panicked while handling notification"
                );
            }
        }
    }

    /// Snapshot live observers and prune dropped ones.
    fn live_observers(&self) -> Vec<Arc<dyn PurchaseObserver>> {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let mut live = Vec::with_capacity(observers.len());
        observers.retain(|(_, weak)| match weak.upgrade() {
            Some(observer) => {
                live.push(observer);
                true
            }
            None => false,
        });
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<&'static str>>,
    }

    impl PurchaseObserver for Recorder {
        fn on_purchase_cancelled(&self) {
            self.events.lock().unwrap().push("cancelled");
        }

        fn on_purchase_pending(&self) {
            self.events.lock().unwrap().push("pending");
        }
    }

    struct Panicker;

    impl PurchaseObserver for Panicker {
        fn on_purchase_cancelled(&self) {
            panic!("observer bug");
        }
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = ObserverRegistry::new();
        let recorder = Arc::new(Recorder::default());

        let token = registry.register(&recorder);
        assert_eq!(registry.len(), 1);

        registry.notify(&Notification::PurchasePending);
        assert_eq!(*recorder.events.lock().unwrap(), vec!["pending"]);

        assert!(registry.unregister(token));
        assert!(!registry.unregister(token));
        registry.notify(&Notification::PurchasePending);
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_registry_does_not_keep_observers_alive() {
        let registry = ObserverRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register(&recorder);
        assert_eq!(Arc::strong_count(&recorder), 1);

        drop(recorder);
        assert!(registry.is_empty());
        // Delivery to a dropped observer is a no-op.
        registry.notify(&Notification::PurchaseCancelled);
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let registry = ObserverRegistry::new();
        let panicker = Arc::new(Panicker);
        let recorder = Arc::new(Recorder::default());
        registry.register(&panicker);
        registry.register(&recorder);

        registry.notify(&Notification::PurchaseCancelled);
        assert_eq!(*recorder.events.lock().unwrap(), vec!["cancelled"]);
    }

    #[test]
    fn test_default_callbacks_are_noops() {
        struct Silent;
        impl PurchaseObserver for Silent {}

        let registry = ObserverRegistry::new();
        let silent = Arc::new(Silent);
        registry.register(&silent);
        registry.notify(&Notification::Restored(vec![Transaction::new("1", "pro_plan")]));
        registry.notify(&Notification::StatusUpdated {
            status: EntitlementStatus::NotPurchased,
            product_id: ProductId::new("pro_plan"),
        });
    }
}

//! Shared core of the manager and its update listener.
//!
//! The [`Reconciler`] owns everything both paths touch: the provider, the
//! observer registry, the dispatcher, the finalized ledger and the metrics.
//! The listener task holds an `Arc` to it, never to the manager, so dropping
//! the manager is enough to tear the listener down.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use purchasekit_lib::{
    classify, FinalizePolicy, ManagerConfig, PurchaseKitError, Result, StoreProvider, Transaction,
    VerificationEnvelope,
};

use crate::dispatch::Dispatcher;
use crate::ledger::FinalizedLedger;
use crate::metrics::ManagerMetrics;
use crate::observer::{Notification, ObserverRegistry};

/// What happened to a finalize request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FinalizeDisposition {
    /// The provider acknowledged the transaction.
    Finalized,
    /// Another path already finalized it; the provider was not called.
    AlreadyFinalized,
}

pub(crate) struct Reconciler {
    provider: Arc<dyn StoreProvider>,
    observers: Arc<ObserverRegistry>,
    dispatcher: Dispatcher,
    ledger: Option<FinalizedLedger>,
    metrics: ManagerMetrics,
    timeout: Option<Duration>,
}

impl Reconciler {
    pub(crate) fn new(
        provider: Arc<dyn StoreProvider>,
        dispatcher: Dispatcher,
        config: &ManagerConfig,
    ) -> Self {
        let ledger = match config.finalize_policy {
            FinalizePolicy::OncePerTransaction => {
                Some(FinalizedLedger::new(config.finalized_capacity))
            }
            FinalizePolicy::Always => None,
        };
        Self {
            provider,
            observers: Arc::new(ObserverRegistry::new()),
            dispatcher,
            ledger,
            metrics: ManagerMetrics::new(),
            timeout: config.request_timeout(),
        }
    }

    pub(crate) fn provider(&self) -> &dyn StoreProvider {
        self.provider.as_ref()
    }

    pub(crate) fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub(crate) fn metrics(&self) -> &ManagerMetrics {
        &self.metrics
    }

    /// Await a provider call, bounded by the configured request timeout.
    pub(crate) async fn call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let Some(limit) = self.timeout else {
            return call.await;
        };
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "provider call timed out");
                Err(PurchaseKitError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        }
    }

    /// Finalize a verified transaction, at most once per id under the
    /// default policy.
    ///
    /// The id is claimed before the provider call and only committed once the
    /// provider acknowledges it. A failed call, or a caller that drops this
    /// future mid-call, releases the id so a later redelivery can retry it.
    pub(crate) async fn finalize(&self, transaction: &Transaction) -> Result<FinalizeDisposition> {
        let claim = match &self.ledger {
            Some(ledger) => match ledger.claim(&transaction.id) {
                Some(claim) => Some(claim),
                None => {
                    self.metrics.record_duplicate_finalize();
                    tracing::debug!(transaction_id = %transaction.id, "already finalized, skipping");
                    return Ok(FinalizeDisposition::AlreadyFinalized);
                }
            },
            None => None,
        };

        match self
            .call("finalize", self.provider.finalize(transaction))
            .await
        {
            Ok(()) => {
                if let Some(claim) = claim {
                    claim.commit();
                }
                self.metrics.record_finalized();
                tracing::debug!(transaction_id = %transaction.id, "transaction finalized");
                Ok(FinalizeDisposition::Finalized)
            }
            Err(err) => {
                drop(claim);
                self.metrics.record_finalize_failure();
                tracing::warn!(transaction_id = %transaction.id, error = %err, "finalize failed");
                Err(match err {
                    err @ PurchaseKitError::Finalization { .. } => err,
                    other => PurchaseKitError::finalization(transaction.id.clone(), other),
                })
            }
        }
    }

    /// Deliver a notification on the configured dispatcher.
    pub(crate) fn notify(&self, notification: Notification) {
        let observers = Arc::clone(&self.observers);
        self.dispatcher
            .dispatch(Box::new(move || observers.notify(&notification)));
    }

    /// Like [`notify`](Self::notify), but dropped if `stopped` is set by the
    /// time the notification would be delivered.
    pub(crate) fn notify_unless_stopped(&self, notification: Notification, stopped: &Arc<AtomicBool>) {
        if stopped.load(Ordering::SeqCst) {
            return;
        }
        let observers = Arc::clone(&self.observers);
        let stopped = Arc::clone(stopped);
        self.dispatcher.dispatch(Box::new(move || {
            if !stopped.load(Ordering::SeqCst) {
                observers.notify(&notification);
            }
        }));
    }

    /// Process one event from the live update feed.
    ///
    /// A verified transaction is finalized and reported complete. A delivery
    /// of a transaction some other path already finalized is not reported
    /// again. Nothing here returns an error to the listener loop.
    pub(crate) async fn handle_update(&self, envelope: VerificationEnvelope, stopped: &Arc<AtomicBool>) {
        self.metrics.record_listener_event();
        let transaction = match classify(envelope) {
            Ok(transaction) => transaction,
            Err(err) => {
                self.metrics.record_unverified();
                tracing::warn!(
                    transaction_id = %err.transaction.id,
                    failure = %err.failure,
                    "unverified transaction update"
                );
                self.notify_unless_stopped(Notification::PurchaseFailed(err.into()), stopped);
                return;
            }
        };

        match self.finalize(&transaction).await {
            Ok(FinalizeDisposition::AlreadyFinalized) => return,
            Ok(FinalizeDisposition::Finalized) => {}
            Err(err) => self.notify_unless_stopped(Notification::PurchaseFailed(err), stopped),
        }
        tracing::info!(
            transaction_id = %transaction.id,
            product_id = %transaction.product_id,
            "transaction update processed"
        );
        self.notify_unless_stopped(Notification::PurchaseComplete(transaction), stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use purchasekit_lib::test_utils::{unverified, verified, MockStore};
    use std::sync::Mutex;

    use crate::observer::PurchaseObserver;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl PurchaseObserver for Log {
        fn on_purchase_complete(&self, transaction: &Transaction) {
            self.0.lock().unwrap().push(format!("complete:{}", transaction.id));
        }

        fn on_purchase_failed(&self, error: &PurchaseKitError) {
            self.0.lock().unwrap().push(format!("failed:{:?}", error.code()));
        }
    }

    fn reconciler(store: &Arc<MockStore>, config: ManagerConfig) -> Reconciler {
        Reconciler::new(store.clone(), Dispatcher::Inline, &config)
    }

    #[tokio::test]
    async fn test_finalize_once_per_transaction() {
        let store = Arc::new(MockStore::new());
        let core = reconciler(&store, ManagerConfig::default());
        let tx = Transaction::new("1", "pro_plan");

        assert_eq!(core.finalize(&tx).await.unwrap(), FinalizeDisposition::Finalized);
        assert_eq!(core.finalize(&tx).await.unwrap(), FinalizeDisposition::AlreadyFinalized);
        assert_eq!(store.finalize_count(&tx.id), 1);
        assert_eq!(core.metrics().snapshot().duplicate_finalizes_suppressed, 1);
    }

    #[tokio::test]
    async fn test_always_policy_passes_through() {
        let store = Arc::new(MockStore::new());
        let core = reconciler(
            &store,
            ManagerConfig::default().with_finalize_policy(FinalizePolicy::Always),
        );
        let tx = Transaction::new("1", "pro_plan");

        core.finalize(&tx).await.unwrap();
        core.finalize(&tx).await.unwrap();
        assert_eq!(store.finalize_count(&tx.id), 2);
    }

    #[tokio::test]
    async fn test_failed_finalize_can_be_retried() {
        let store = Arc::new(MockStore::new());
        let core = reconciler(&store, ManagerConfig::default());
        let tx = Transaction::new("1", "pro_plan");

        store.fail_finalize("store offline");
        let err = core.finalize(&tx).await.unwrap_err();
        assert!(matches!(err, PurchaseKitError::Finalization { .. }));
        assert_eq!(core.metrics().snapshot().finalize_failures, 1);

        // The id was released, so the next attempt reaches the provider again.
        assert!(core.finalize(&tx).await.is_err());
        assert_eq!(store.finalize_count(&tx.id), 2);
    }

    #[tokio::test]
    async fn test_cancelled_finalize_releases_claim() {
        let store = Arc::new(MockStore::new());
        let core = reconciler(&store, ManagerConfig::default());
        let tx = Transaction::new("1", "pro_plan");

        store.stall_next_finalize();
        let stalled = tokio::time::timeout(Duration::from_millis(20), core.finalize(&tx)).await;
        assert!(stalled.is_err());
        assert_eq!(store.acknowledged_count(&tx.id), 0);

        assert_eq!(core.finalize(&tx).await.unwrap(), FinalizeDisposition::Finalized);
        assert_eq!(store.acknowledged_count(&tx.id), 1);
        assert_eq!(core.metrics().snapshot().duplicate_finalizes_suppressed, 0);
    }

    #[tokio::test]
    async fn test_handle_update_reports_each_envelope() {
        let store = Arc::new(MockStore::new());
        let core = reconciler(&store, ManagerConfig::default());
        let log = Arc::new(Log::default());
        core.observers().register(&log);
        let running = Arc::new(AtomicBool::new(false));

        let bad = unverified(Transaction::new("bad", "pro_plan"));
        store.set_entitlements(vec![bad.clone()]);

        core.handle_update(verified(Transaction::new("1", "pro_plan")), &running).await;
        core.handle_update(bad, &running).await;
        core.handle_update(verified(Transaction::new("1", "pro_plan")), &running).await;

        assert_eq!(
            *log.0.lock().unwrap(),
            vec!["complete:1".to_string(), "failed:Verification".to_string()]
        );
        assert_eq!(core.metrics().snapshot().listener_events, 3);
    }

    #[tokio::test]
    async fn test_stopped_flag_drops_notifications() {
        let store = Arc::new(MockStore::new());
        let core = reconciler(&store, ManagerConfig::default());
        let log = Arc::new(Log::default());
        core.observers().register(&log);

        let stopped = Arc::new(AtomicBool::new(true));
        core.handle_update(verified(Transaction::new("1", "pro_plan")), &stopped).await;
        assert!(log.0.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out() {
        let store = Arc::new(MockStore::new());
        let core = reconciler(&store, ManagerConfig::default().with_request_timeout(1));

        let err = core
            .call("purchase", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PurchaseKitError::Timeout {
                operation: "purchase".into(),
                timeout_ms: 1000
            }
        );
    }
}

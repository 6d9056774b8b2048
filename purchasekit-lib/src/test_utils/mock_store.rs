//! In-memory store provider for tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    Product, ProductId, ProductKind, PurchaseKitError, PurchaseOptions, PurchaseResult, Result,
    StoreProvider, Transaction, TransactionId, UpdateStream, VerificationEnvelope,
};

/// A scriptable storefront.
///
/// Purchases return scripted results in order, falling back to a freshly
/// minted verified transaction once the script is empty. Every transaction
/// handed out inside an unverified envelope is remembered, and finalizing
/// one of those panics.
pub struct MockStore {
    catalog: RwLock<Vec<Product>>,
    purchase_script: Mutex<VecDeque<Result<PurchaseResult>>>,
    purchase_delay: RwLock<Option<Duration>>,
    products_error: RwLock<Option<String>>,
    entitlements: RwLock<Vec<VerificationEnvelope>>,
    entitlements_error: RwLock<Option<String>>,
    live_updates_error: RwLock<Option<String>>,
    finalize_error: RwLock<Option<String>>,
    finalized: Mutex<Vec<Transaction>>,
    acknowledged: Mutex<Vec<TransactionId>>,
    stalled_finalizes: AtomicUsize,
    untrusted: Mutex<HashSet<TransactionId>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<VerificationEnvelope>>>,
    purchase_calls: AtomicUsize,
    live_update_calls: AtomicUsize,
    next_id: AtomicU64,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Vec::new()),
            purchase_script: Mutex::new(VecDeque::new()),
            purchase_delay: RwLock::new(None),
            products_error: RwLock::new(None),
            entitlements: RwLock::new(Vec::new()),
            entitlements_error: RwLock::new(None),
            live_updates_error: RwLock::new(None),
            finalize_error: RwLock::new(None),
            finalized: Mutex::new(Vec::new()),
            acknowledged: Mutex::new(Vec::new()),
            stalled_finalizes: AtomicUsize::new(0),
            untrusted: Mutex::new(HashSet::new()),
            subscribers: Mutex::new(Vec::new()),
            purchase_calls: AtomicUsize::new(0),
            live_update_calls: AtomicUsize::new(0),
            next_id: AtomicU64::new(1000),
        }
    }

    /// Create a store serving the given catalog.
    pub fn with_catalog(products: Vec<Product>) -> Self {
        let store = Self::new();
        *store.catalog.write().unwrap() = products;
        store
    }

    /// Queue a result for an upcoming purchase call.
    pub fn script_purchase(&self, result: PurchaseResult) {
        if let PurchaseResult::Success {
            envelope: envelope @ VerificationEnvelope::Unverified { .. },
        } = &result
        {
            self.mark_untrusted(envelope);
        }
        self.purchase_script.lock().unwrap().push_back(Ok(result));
    }

    /// Make the next purchase call fail outright.
    pub fn script_purchase_error(&self, reason: &str) {
        self.purchase_script
            .lock()
            .unwrap()
            .push_back(Err(PurchaseKitError::provider("purchase", reason)));
    }

    /// Delay every purchase call, for timeout tests.
    pub fn set_purchase_delay(&self, delay: Duration) {
        *self.purchase_delay.write().unwrap() = Some(delay);
    }

    /// Replace the current entitlements enumeration.
    pub fn set_entitlements(&self, envelopes: Vec<VerificationEnvelope>) {
        for envelope in &envelopes {
            self.mark_untrusted(envelope);
        }
        *self.entitlements.write().unwrap() = envelopes;
    }

    /// Make catalog queries fail.
    pub fn fail_products(&self, reason: &str) {
        *self.products_error.write().unwrap() = Some(reason.to_string());
    }

    /// Make entitlement enumeration fail.
    pub fn fail_entitlements(&self, reason: &str) {
        *self.entitlements_error.write().unwrap() = Some(reason.to_string());
    }

    /// Make opening the live update feed fail.
    pub fn fail_live_updates(&self, reason: &str) {
        *self.live_updates_error.write().unwrap() = Some(reason.to_string());
    }

    /// Make finalize fail.
    pub fn fail_finalize(&self, reason: &str) {
        *self.finalize_error.write().unwrap() = Some(reason.to_string());
    }

    /// Make the next finalize call hang until its caller gives up on it.
    pub fn stall_next_finalize(&self) {
        self.stalled_finalizes.fetch_add(1, Ordering::SeqCst);
    }

    /// Deliver an event to every open live update feed.
    ///
    /// Returns how many feeds received it.
    pub fn push_update(&self, envelope: VerificationEnvelope) -> usize {
        self.mark_untrusted(&envelope);
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(envelope.clone()).is_ok());
        subscribers.len()
    }

    /// Close every open live update feed.
    pub fn close_updates(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    /// Number of feeds that are still being read.
    pub fn open_subscriptions(&self) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// Transactions passed to `finalize`, in call order.
    pub fn finalized(&self) -> Vec<Transaction> {
        self.finalized.lock().unwrap().clone()
    }

    /// How often `finalize` was called for the given id.
    pub fn finalize_count(&self, id: &TransactionId) -> usize {
        self.finalized
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| &tx.id == id)
            .count()
    }

    /// How often the store acknowledged a finalize for the given id.
    pub fn acknowledged_count(&self, id: &TransactionId) -> usize {
        self.acknowledged
            .lock()
            .unwrap()
            .iter()
            .filter(|acked| *acked == id)
            .count()
    }

    pub fn purchase_calls(&self) -> usize {
        self.purchase_calls.load(Ordering::SeqCst)
    }

    pub fn live_update_calls(&self) -> usize {
        self.live_update_calls.load(Ordering::SeqCst)
    }

    fn mark_untrusted(&self, envelope: &VerificationEnvelope) {
        if let VerificationEnvelope::Unverified { transaction, .. } = envelope {
            self.untrusted
                .lock()
                .unwrap()
                .insert(transaction.id.clone());
        }
    }

    fn mint_transaction(&self, product: &Product, options: &PurchaseOptions) -> Transaction {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut tx = Transaction::new(format!("mock-{}", id), product.id.clone())
            .with_kind(product.kind)
            .with_quantity(options.quantity);
        if let Some(token) = options.app_account_token {
            tx = tx.with_app_account_token(token);
        }
        if product.kind == ProductKind::AutoRenewable {
            tx = tx.with_expiration(Utc::now() + chrono::Duration::days(30));
        }
        tx
    }
}

#[async_trait]
impl StoreProvider for MockStore {
    async fn query_products(&self, ids: &HashSet<ProductId>) -> Result<Vec<Product>> {
        if let Some(reason) = self.products_error.read().unwrap().as_ref() {
            return Err(PurchaseKitError::provider("query_products", reason));
        }
        let catalog = self.catalog.read().unwrap();
        Ok(catalog
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn purchase(
        &self,
        product: &Product,
        options: &PurchaseOptions,
    ) -> Result<PurchaseResult> {
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.purchase_delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.purchase_script.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(PurchaseResult::verified(
                self.mint_transaction(product, options),
            )),
        }
    }

    async fn current_entitlements(&self) -> Result<Vec<VerificationEnvelope>> {
        if let Some(reason) = self.entitlements_error.read().unwrap().as_ref() {
            return Err(PurchaseKitError::provider("current_entitlements", reason));
        }
        Ok(self.entitlements.read().unwrap().clone())
    }

    async fn live_updates(&self) -> Result<UpdateStream> {
        self.live_update_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.live_updates_error.read().unwrap().as_ref() {
            return Err(PurchaseKitError::provider("live_updates", reason));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn finalize(&self, transaction: &Transaction) -> Result<()> {
        assert!(
            !self.untrusted.lock().unwrap().contains(&transaction.id),
            "finalize called on unverified transaction {}",
            transaction.id
        );
        self.finalized.lock().unwrap().push(transaction.clone());
        let error = self.finalize_error.read().unwrap().clone();
        if let Some(reason) = error {
            return Err(PurchaseKitError::finalization(
                transaction.id.clone(),
                reason,
            ));
        }
        let stall = self
            .stalled_finalizes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stall {
            std::future::pending::<()>().await;
        }
        self.acknowledged.lock().unwrap().push(transaction.id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{unverified, verified, TestFixtures};
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_unscripted_purchase_mints_verified_transaction() {
        let store = MockStore::with_catalog(TestFixtures::catalog());
        let product = TestFixtures::pro_plan();

        let result = store
            .purchase(&product, &PurchaseOptions::default())
            .await
            .unwrap();
        match result {
            PurchaseResult::Success {
                envelope: VerificationEnvelope::Verified(tx),
            } => {
                assert_eq!(tx.product_id, product.id);
                assert!(tx.expires_at.is_some());
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(store.purchase_calls(), 1);
    }

    #[tokio::test]
    async fn test_query_filters_catalog() {
        let store = MockStore::with_catalog(TestFixtures::catalog());
        let ids: HashSet<ProductId> = [ProductId::new("pro_plan"), ProductId::new("missing")]
            .into_iter()
            .collect();
        let products = store.query_products(&ids).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id.as_str(), "pro_plan");
    }

    #[tokio::test]
    async fn test_live_updates_fan_out() {
        let store = MockStore::new();
        let mut feed = store.live_updates().await.unwrap();

        let delivered = store.push_update(verified(Transaction::new("1", "pro_plan")));
        assert_eq!(delivered, 1);
        assert!(feed.next().await.unwrap().is_verified());

        drop(feed);
        assert_eq!(store.open_subscriptions(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "finalize called on unverified transaction")]
    async fn test_finalize_of_untrusted_panics() {
        let store = MockStore::new();
        let tx = Transaction::new("bad", "pro_plan");
        store.set_entitlements(vec![unverified(tx.clone())]);
        let _ = store.finalize(&tx).await;
    }
}

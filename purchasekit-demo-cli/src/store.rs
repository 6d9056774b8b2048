//! File-backed simulated storefront.
//!
//! Everything the storefront would normally own lives in a single JSON file
//! under the demo's storage directory: the catalog, every transaction handed
//! out, and the queue of updates waiting for a listener. Each CLI invocation
//! loads the file, applies one change and writes it back.
//!
//! # Security Warning
//!
//! This is a simulation for exercising purchase flows from a terminal:
//! - Nothing is signed; "unverified" is just a flag on the record
//! - No atomicity guarantees across processes
//!
//! # Examples
//!
//! ```ignore
//! let store = SimulatedStore::new("./demo-data");
//! store.seed_catalog(SimulatedStore::demo_catalog())?;
//! store.set_next_outcome(SimulatedOutcome::Pending);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use purchasekit_lib::{
    IntroductoryOffer, OfferPaymentMode, Product, ProductId, ProductKind, PurchaseKitError,
    PurchaseOptions, PurchaseResult, Result, StoreProvider, SubscriptionPeriod, Transaction,
    TransactionId, UpdateStream, VerificationEnvelope, VerificationFailure,
};

const STATE_FILE: &str = "store.json";

/// How the simulated storefront answers the next purchase request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SimulatedOutcome {
    /// Payment succeeds with a verified transaction.
    #[default]
    Verified,
    /// Payment succeeds but the transaction fails verification.
    Unverified,
    /// Awaiting approval; the approved transaction is queued for `listen`.
    Pending,
    /// The customer dismisses the purchase sheet.
    Cancelled,
    /// The storefront answers with a result the core does not know.
    Unknown,
}

/// A transaction as the simulated storefront remembers it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub transaction: Transaction,
    pub verified: bool,
    #[serde(default)]
    pub finalized: bool,
}

impl StoredTransaction {
    fn envelope(&self) -> VerificationEnvelope {
        if self.verified {
            VerificationEnvelope::Verified(self.transaction.clone())
        } else {
            VerificationEnvelope::unverified(
                self.transaction.clone(),
                VerificationFailure::InvalidSignature,
            )
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    catalog: Vec<Product>,
    #[serde(default)]
    transactions: Vec<StoredTransaction>,
    #[serde(default)]
    pending_updates: VecDeque<VerificationEnvelope>,
    #[serde(default = "first_transaction_id")]
    next_id: u64,
}

fn first_transaction_id() -> u64 {
    2_000_000_000
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            catalog: Vec::new(),
            transactions: Vec::new(),
            pending_updates: VecDeque::new(),
            next_id: first_transaction_id(),
        }
    }
}

impl StoreState {
    fn mint(&mut self, product: &Product, options: &PurchaseOptions) -> Result<Transaction> {
        let expires_at = product
            .subscription
            .as_ref()
            .map(|subscription| expiry_after(Utc::now(), &subscription.period))
            .transpose()?;
        let id = self.next_id;
        self.next_id += 1;
        let mut tx = Transaction::new(id.to_string(), product.id.clone())
            .with_kind(product.kind)
            .with_quantity(options.quantity);
        if let Some(token) = options.app_account_token {
            tx = tx.with_app_account_token(token);
        }
        if let Some(expires_at) = expires_at {
            tx = tx.with_expiration(expires_at);
        }
        Ok(tx)
    }
}

/// End of one subscription period starting at `start`.
///
/// Periods come from a hand-editable state file, so out-of-range values are
/// an error rather than an overflow.
fn expiry_after(start: DateTime<Utc>, period: &SubscriptionPeriod) -> Result<DateTime<Utc>> {
    use purchasekit_lib::PeriodUnit;
    let value = i64::from(period.value);
    let length = match period.unit {
        PeriodUnit::Day => chrono::Duration::try_days(value),
        PeriodUnit::Week => chrono::Duration::try_weeks(value),
        PeriodUnit::Month => value.checked_mul(30).and_then(chrono::Duration::try_days),
        PeriodUnit::Year => value.checked_mul(365).and_then(chrono::Duration::try_days),
    };
    length
        .and_then(|length| start.checked_add_signed(length))
        .ok_or_else(|| {
            PurchaseKitError::provider(
                "subscription_period",
                format!("{} {:?} period is out of range", period.value, period.unit),
            )
        })
}

/// Simulated storefront backed by `store.json`.
pub struct SimulatedStore {
    storage_dir: PathBuf,
    next_outcome: Mutex<SimulatedOutcome>,
    poll_interval: Duration,
    io: Arc<Mutex<()>>,
}

impl SimulatedStore {
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            next_outcome: Mutex::new(SimulatedOutcome::default()),
            poll_interval: Duration::from_millis(250),
            io: Arc::new(Mutex::new(())),
        }
    }

    /// How often the live update feed checks the state file.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state_path(&self) -> PathBuf {
        self.storage_dir.join(STATE_FILE)
    }

    pub fn is_initialized(&self) -> bool {
        self.state_path().exists()
    }

    /// The catalog `init` seeds: a monthly subscription with a free trial, a
    /// lifetime unlock and a consumable.
    pub fn demo_catalog() -> Vec<Product> {
        vec![
            Product::new(
                "pro_plan",
                "Pro Plan",
                "$4.99",
                Decimal::new(499, 2),
                ProductKind::AutoRenewable,
            )
            .with_description("All pro features, billed monthly")
            .with_subscription("pro", SubscriptionPeriod::months(1))
            .with_introductory_offer(IntroductoryOffer {
                payment_mode: OfferPaymentMode::FreeTrial,
                period: SubscriptionPeriod::days(7),
                period_count: 1,
                display_price: "Free".into(),
            }),
            Product::new(
                "lifetime",
                "Lifetime Unlock",
                "$29.99",
                Decimal::new(2999, 2),
                ProductKind::NonConsumable,
            )
            .with_description("Every feature, forever"),
            Product::new(
                "coins_100",
                "100 Coins",
                "$0.99",
                Decimal::new(99, 2),
                ProductKind::Consumable,
            )
            .with_description("A pouch of in-app currency"),
        ]
    }

    /// Replace the catalog, keeping existing transactions.
    pub fn seed_catalog(&self, catalog: Vec<Product>) -> Result<()> {
        self.update("seed_catalog", |state| {
            state.catalog = catalog;
            Ok(())
        })
    }

    /// Script the answer to the next purchase request.
    pub fn set_next_outcome(&self, outcome: SimulatedOutcome) {
        *self.next_outcome.lock().unwrap_or_else(|e| e.into_inner()) = outcome;
    }

    pub fn transactions(&self) -> Result<Vec<StoredTransaction>> {
        Ok(self.load("transactions")?.transactions)
    }

    pub fn pending_updates(&self) -> Result<usize> {
        Ok(self.load("pending_updates")?.pending_updates.len())
    }

    /// Queue a renewal of the customer's latest subscription transaction for
    /// `product_id`. Returns the new transaction.
    pub fn renew(&self, product_id: &ProductId, verified: bool) -> Result<Transaction> {
        self.update("renew", |state| {
            let product = state
                .catalog
                .iter()
                .find(|p| &p.id == product_id)
                .cloned()
                .ok_or_else(|| PurchaseKitError::ProductNotFound(product_id.clone()))?;
            let Some(subscription) = &product.subscription else {
                return Err(PurchaseKitError::provider(
                    "renew",
                    format!("{} is not a subscription", product_id),
                ));
            };
            let previous = latest_for(&state.transactions, product_id)
                .map(|stored| stored.transaction.clone())
                .ok_or_else(|| {
                    PurchaseKitError::provider("renew", format!("no purchase of {} to renew", product_id))
                })?;

            let starts = previous
                .expires_at
                .filter(|expiry| *expiry > Utc::now())
                .unwrap_or_else(Utc::now);
            let expires_at = expiry_after(starts, &subscription.period)?;
            let id = state.next_id;
            state.next_id += 1;
            let renewal = Transaction::new(id.to_string(), product_id.clone())
                .with_kind(product.kind)
                .with_original_id(previous.original_id.clone())
                .with_purchase_date(starts)
                .with_expiration(expires_at);

            let stored = StoredTransaction {
                transaction: renewal.clone(),
                verified,
                finalized: false,
            };
            state.pending_updates.push_back(stored.envelope());
            state.transactions.push(stored);
            Ok(renewal)
        })
    }

    /// Revoke a transaction (a refund, say) and queue the update.
    pub fn revoke(&self, transaction_id: &TransactionId) -> Result<Transaction> {
        self.update("revoke", |state| {
            let stored = state
                .transactions
                .iter_mut()
                .find(|stored| &stored.transaction.id == transaction_id)
                .ok_or_else(|| {
                    PurchaseKitError::provider("revoke", format!("unknown transaction {}", transaction_id))
                })?;
            stored.transaction.revoked_at = Some(Utc::now());
            let revoked = stored.transaction.clone();
            let envelope = stored.envelope();
            state.pending_updates.push_back(envelope);
            Ok(revoked)
        })
    }

    /// Remove and return every queued update.
    fn take_pending(&self) -> Result<Vec<VerificationEnvelope>> {
        self.update("live_updates", |state| {
            Ok(state.pending_updates.drain(..).collect())
        })
    }

    fn load(&self, operation: &str) -> Result<StoreState> {
        let _guard = self.io.lock().unwrap_or_else(|e| e.into_inner());
        self.read_state(operation)
    }

    fn update<T>(&self, operation: &str, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let _guard = self.io.lock().unwrap_or_else(|e| e.into_inner());
        let mut state = self.read_state(operation)?;
        let value = f(&mut state)?;
        self.write_state(operation, &state)?;
        Ok(value)
    }

    fn read_state(&self, operation: &str) -> Result<StoreState> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(StoreState::default());
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| PurchaseKitError::provider(operation, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_state(&self, operation: &str, state: &StoreState) -> Result<()> {
        std::fs::create_dir_all(&self.storage_dir)
            .map_err(|e| PurchaseKitError::provider(operation, e))?;
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(self.state_path(), json).map_err(|e| PurchaseKitError::provider(operation, e))
    }
}

/// Latest transaction for a product by purchase date.
fn latest_for<'a>(transactions: &'a [StoredTransaction], product_id: &ProductId) -> Option<&'a StoredTransaction> {
    transactions
        .iter()
        .filter(|stored| &stored.transaction.product_id == product_id)
        .max_by_key(|stored| stored.transaction.purchased_at)
}

#[async_trait]
impl StoreProvider for SimulatedStore {
    async fn query_products(&self, ids: &HashSet<ProductId>) -> Result<Vec<Product>> {
        let state = self.load("query_products")?;
        Ok(state
            .catalog
            .into_iter()
            .filter(|product| ids.contains(&product.id))
            .collect())
    }

    async fn purchase(&self, product: &Product, options: &PurchaseOptions) -> Result<PurchaseResult> {
        let outcome = std::mem::take(&mut *self.next_outcome.lock().unwrap_or_else(|e| e.into_inner()));
        tracing::debug!(product_id = %product.id, ?outcome, "simulated purchase");

        match outcome {
            SimulatedOutcome::Cancelled => Ok(PurchaseResult::UserCancelled),
            SimulatedOutcome::Unknown => Ok(PurchaseResult::Unrecognized {
                description: "simulated storefront result".into(),
            }),
            SimulatedOutcome::Pending => {
                self.update("purchase", |state| {
                    let tx = state.mint(product, options)?;
                    let stored = StoredTransaction {
                        transaction: tx,
                        verified: true,
                        finalized: false,
                    };
                    state.pending_updates.push_back(stored.envelope());
                    state.transactions.push(stored);
                    Ok(())
                })?;
                Ok(PurchaseResult::Pending)
            }
            SimulatedOutcome::Verified | SimulatedOutcome::Unverified => {
                let verified = outcome == SimulatedOutcome::Verified;
                let envelope = self.update("purchase", |state| {
                    let stored = StoredTransaction {
                        transaction: state.mint(product, options)?,
                        verified,
                        finalized: false,
                    };
                    let envelope = stored.envelope();
                    state.transactions.push(stored);
                    Ok(envelope)
                })?;
                Ok(PurchaseResult::Success { envelope })
            }
        }
    }

    /// The latest non-consumable transaction per product, revoked ones included
    /// so that `status` can show them.
    async fn current_entitlements(&self) -> Result<Vec<VerificationEnvelope>> {
        let state = self.load("current_entitlements")?;
        let mut latest: HashMap<&ProductId, &StoredTransaction> = HashMap::new();
        for stored in &state.transactions {
            if stored.transaction.product_kind == ProductKind::Consumable {
                continue;
            }
            let entry = latest.entry(&stored.transaction.product_id).or_insert(stored);
            if stored.transaction.purchased_at > entry.transaction.purchased_at {
                *entry = stored;
            }
        }
        let mut envelopes: Vec<_> = latest.into_values().map(StoredTransaction::envelope).collect();
        envelopes.sort_by(|a, b| a.unsafe_payload().product_id.cmp(&b.unsafe_payload().product_id));
        Ok(envelopes)
    }

    /// Polls the state file and forwards queued updates until the receiver
    /// is dropped.
    async fn live_updates(&self) -> Result<UpdateStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = SimulatedStore {
            storage_dir: self.storage_dir.clone(),
            next_outcome: Mutex::new(SimulatedOutcome::default()),
            poll_interval: self.poll_interval,
            io: Arc::clone(&self.io),
        };
        let interval = self.poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }
                let updates = match poller.take_pending() {
                    Ok(updates) => updates,
                    Err(err) => {
                        tracing::warn!(error = %err, "could not read pending updates");
                        continue;
                    }
                };
                for update in updates {
                    if tx.send(update).is_err() {
                        return;
                    }
                }
            }
        });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn finalize(&self, transaction: &Transaction) -> Result<()> {
        self.update("finalize", |state| {
            let stored = state
                .transactions
                .iter_mut()
                .find(|stored| stored.transaction.id == transaction.id)
                .ok_or_else(|| PurchaseKitError::finalization(transaction.id.clone(), "unknown transaction"))?;
            stored.finalized = true;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn seeded() -> (tempfile::TempDir, SimulatedStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SimulatedStore::new(dir.path()).with_poll_interval(Duration::from_millis(10));
        store.seed_catalog(SimulatedStore::demo_catalog()).unwrap();
        (dir, store)
    }

    fn product(store: &SimulatedStore, id: &str) -> Product {
        store
            .load("test")
            .unwrap()
            .catalog
            .into_iter()
            .find(|p| p.id.as_str() == id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_verified_purchase_is_recorded_and_finalized() {
        let (_dir, store) = seeded();
        let pro = product(&store, "pro_plan");

        let result = store.purchase(&pro, &PurchaseOptions::default()).await.unwrap();
        let PurchaseResult::Success { envelope: VerificationEnvelope::Verified(tx) } = result else {
            panic!("expected a verified success, got {:?}", result);
        };
        assert!(tx.expires_at.is_some());

        store.finalize(&tx).await.unwrap();
        let stored = store.transactions().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].finalized);
    }

    #[tokio::test]
    async fn test_scripted_outcome_applies_once() {
        let (_dir, store) = seeded();
        let lifetime = product(&store, "lifetime");

        store.set_next_outcome(SimulatedOutcome::Cancelled);
        let first = store.purchase(&lifetime, &PurchaseOptions::default()).await.unwrap();
        assert_eq!(first, PurchaseResult::UserCancelled);

        let second = store.purchase(&lifetime, &PurchaseOptions::default()).await.unwrap();
        assert!(matches!(second, PurchaseResult::Success { .. }));
    }

    #[tokio::test]
    async fn test_pending_purchase_is_queued() {
        let (_dir, store) = seeded();
        store.set_next_outcome(SimulatedOutcome::Pending);

        let result = store
            .purchase(&product(&store, "lifetime"), &PurchaseOptions::default())
            .await
            .unwrap();
        assert_eq!(result, PurchaseResult::Pending);
        assert_eq!(store.pending_updates().unwrap(), 1);

        let mut updates = store.live_updates().await.unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(2), updates.next())
            .await
            .unwrap()
            .unwrap();
        assert!(delivered.is_verified());
        assert_eq!(store.pending_updates().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entitlements_keep_latest_and_skip_consumables() {
        let (_dir, store) = seeded();
        let options = PurchaseOptions::default();
        store.purchase(&product(&store, "pro_plan"), &options).await.unwrap();
        store.purchase(&product(&store, "coins_100"), &options).await.unwrap();
        let renewal = store.renew(&ProductId::new("pro_plan"), true).unwrap();

        let entitlements = store.current_entitlements().await.unwrap();
        assert_eq!(entitlements.len(), 1);
        assert_eq!(entitlements[0].unsafe_payload().id, renewal.id);
        assert_ne!(renewal.original_id, renewal.id);
    }

    #[tokio::test]
    async fn test_renew_requires_subscription() {
        let (_dir, store) = seeded();
        assert!(store.renew(&ProductId::new("lifetime"), true).is_err());
        assert!(store.renew(&ProductId::new("pro_plan"), true).is_err());
    }

    #[tokio::test]
    async fn test_revoke_marks_transaction() {
        let (_dir, store) = seeded();
        let result = store
            .purchase(&product(&store, "lifetime"), &PurchaseOptions::default())
            .await
            .unwrap();
        let PurchaseResult::Success { envelope } = result else {
            panic!("expected success");
        };

        let revoked = store.revoke(&envelope.unsafe_payload().id).unwrap();
        assert!(revoked.is_revoked());
        assert_eq!(store.pending_updates().unwrap(), 1);
    }

    #[test]
    fn test_expiry_after_rejects_out_of_range_period() {
        let start = Utc::now();
        let month = expiry_after(start, &SubscriptionPeriod::months(1)).unwrap();
        assert_eq!(month - start, chrono::Duration::days(30));

        let err = expiry_after(start, &SubscriptionPeriod::years(u32::MAX)).unwrap_err();
        assert_eq!(err.code(), purchasekit_lib::PurchaseKitErrorCode::Provider);
    }

    #[tokio::test]
    async fn test_purchase_with_oversized_period_fails_cleanly() {
        let (_dir, store) = seeded();
        let mut pro = product(&store, "pro_plan");
        if let Some(subscription) = pro.subscription.as_mut() {
            subscription.period = SubscriptionPeriod::years(u32::MAX);
        }

        assert!(store.purchase(&pro, &PurchaseOptions::default()).await.is_err());
        assert!(store.transactions().unwrap().is_empty());
    }

    #[test]
    fn test_missing_state_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SimulatedStore::new(dir.path().join("absent"));
        assert!(!store.is_initialized());
        assert!(store.transactions().unwrap().is_empty());
    }
}

//! The purchase manager: purchase flow, restore, status and product queries.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;

use purchasekit_lib::{
    classify, resolve, EntitlementStatus, ManagerConfig, Product, ProductId, PurchaseKitError,
    PurchaseOptions, PurchaseResult, Result, StoreProvider, Transaction, VerificationEnvelope,
};

use crate::dispatch::Dispatcher;
use crate::listener::UpdateListener;
use crate::metrics::MetricsSnapshot;
use crate::observer::{Notification, ObserverToken, PurchaseObserver};
use crate::outcome::PurchaseOutcome;
use crate::reconcile::Reconciler;

/// Orchestrates purchases against an injected [`StoreProvider`].
///
/// There is no global instance: construct one per provider and share it
/// with `Arc` where several components need it. Dropping the manager stops
/// its update listener.
///
/// # Example
///
/// ```ignore
/// let manager = PurchaseManager::builder(Arc::new(store))
///     .config(ManagerConfig::default().with_request_timeout(30))
///     .build()?;
///
/// let observer = Arc::new(MyObserver::default());
/// manager.register_observer(&observer);
///
/// let product = manager.product(&ProductId::new("pro_plan")).await?;
/// match manager.purchase(&product).await {
///     PurchaseOutcome::Success(tx) => unlock(&tx.product_id),
///     PurchaseOutcome::Pending => show_pending(),
///     PurchaseOutcome::UserCancelled => {}
///     PurchaseOutcome::Failure(err) => show_error(&err),
/// }
/// ```
pub struct PurchaseManager {
    core: Arc<Reconciler>,
    listener: UpdateListener,
    runtime: Option<Handle>,
    config: ManagerConfig,
}

/// Builder for [`PurchaseManager`].
pub struct PurchaseManagerBuilder {
    provider: Arc<dyn StoreProvider>,
    config: ManagerConfig,
    dispatcher: Dispatcher,
    runtime: Option<Handle>,
}

impl PurchaseManagerBuilder {
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Context observer callbacks run on. Defaults to [`Dispatcher::Inline`].
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Runtime the update listener is spawned on. Defaults to the runtime
    /// that is current when the listener starts.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validate the configuration and create the manager, starting the
    /// listener if configured to.
    ///
    /// Fails with `ListenerUnavailable` when the listener should start but no
    /// runtime is available.
    pub fn build(self) -> Result<PurchaseManager> {
        self.config.validate()?;
        let manager = PurchaseManager {
            core: Arc::new(Reconciler::new(self.provider, self.dispatcher, &self.config)),
            listener: UpdateListener::new(),
            runtime: self.runtime,
            config: self.config,
        };
        if manager.config.start_listener {
            manager.start_listening()?;
        }
        Ok(manager)
    }
}

impl PurchaseManager {
    pub fn builder(provider: Arc<dyn StoreProvider>) -> PurchaseManagerBuilder {
        PurchaseManagerBuilder {
            provider,
            config: ManagerConfig::default(),
            dispatcher: Dispatcher::default(),
            runtime: None,
        }
    }

    /// Create a manager with the default configuration.
    pub fn new(provider: Arc<dyn StoreProvider>) -> Result<Self> {
        Self::builder(provider).build()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics().snapshot()
    }

    // ---- Observers ----

    /// Register an observer. The manager holds it weakly.
    pub fn register_observer<O: PurchaseObserver + 'static>(&self, observer: &Arc<O>) -> ObserverToken {
        self.core.observers().register(observer)
    }

    pub fn unregister_observer(&self, token: ObserverToken) -> bool {
        self.core.observers().unregister(token)
    }

    pub fn observer_count(&self) -> usize {
        self.core.observers().len()
    }

    // ---- Listener ----

    /// Start the update listener. Returns `Ok(false)` if it was already running.
    pub fn start_listening(&self) -> Result<bool> {
        self.listener.start(&self.core, self.runtime.as_ref())
    }

    /// Stop the update listener. Returns false if it was not running.
    pub fn stop_listening(&self) -> bool {
        self.listener.stop()
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_listening()
    }

    // ---- Products ----

    /// Fetch catalog entries. Ids the store does not know are absent from
    /// the result. A provider failure is also reported to observers.
    #[tracing::instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let products = self
            .query_products(ids)
            .await
            .map_err(|err| self.report_provider_error(err))?;
        tracing::debug!(found = products.len(), "catalog query complete");
        Ok(products)
    }

    /// Fetch a single catalog entry.
    pub async fn product(&self, id: &ProductId) -> Result<Product> {
        match self.find_product(id).await {
            Err(err @ PurchaseKitError::ProductNotFound(_)) => Err(err),
            other => other.map_err(|err| self.report_provider_error(err)),
        }
    }

    async fn query_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: HashSet<ProductId> = ids.iter().cloned().collect();
        self.core
            .call("query_products", self.core.provider().query_products(&ids))
            .await
    }

    async fn find_product(&self, id: &ProductId) -> Result<Product> {
        self.query_products(std::slice::from_ref(id))
            .await?
            .into_iter()
            .find(|product| &product.id == id)
            .ok_or_else(|| PurchaseKitError::ProductNotFound(id.clone()))
    }

    // ---- Purchases ----

    /// Purchase a product with default options.
    pub async fn purchase(&self, product: &Product) -> PurchaseOutcome {
        self.purchase_with(product, &PurchaseOptions::default())
            .await
    }

    /// Purchase a product.
    ///
    /// Makes a single attempt. Exactly one of complete, failed, cancelled or
    /// pending is notified, matching the returned outcome. A verified
    /// transaction is finalized before `Success` is returned; if finalizing
    /// fails, observers also receive the finalization error but the outcome
    /// stays `Success`.
    #[tracing::instrument(skip(self, product, options), fields(product_id = %product.id))]
    pub async fn purchase_with(&self, product: &Product, options: &PurchaseOptions) -> PurchaseOutcome {
        self.core.metrics().record_purchase_attempt();
        tracing::debug!(quantity = options.quantity, "submitting purchase");

        let outcome = match self
            .core
            .call("purchase", self.core.provider().purchase(product, options))
            .await
        {
            Ok(result) => self.settle(result).await,
            Err(err) => {
                tracing::warn!(error = %err, "purchase request failed");
                PurchaseOutcome::Failure(err)
            }
        };

        self.core.metrics().record_outcome(&outcome);
        self.core.notify(outcome.notification());
        outcome
    }

    /// Look a product up by id, then purchase it.
    pub async fn purchase_product(&self, id: &ProductId) -> PurchaseOutcome {
        match self.find_product(id).await {
            Ok(product) => self.purchase(&product).await,
            Err(err) => {
                tracing::warn!(product_id = %id, error = %err, "cannot purchase");
                self.core.metrics().record_purchase_attempt();
                let outcome = PurchaseOutcome::Failure(err);
                self.core.metrics().record_outcome(&outcome);
                self.core.notify(outcome.notification());
                outcome
            }
        }
    }

    async fn settle(&self, result: PurchaseResult) -> PurchaseOutcome {
        match result {
            PurchaseResult::Success { envelope } => match classify(envelope) {
                Ok(transaction) => {
                    if let Err(err) = self.core.finalize(&transaction).await {
                        self.core.notify(Notification::PurchaseFailed(err));
                    }
                    tracing::info!(transaction_id = %transaction.id, "purchase complete");
                    PurchaseOutcome::Success(transaction)
                }
                Err(err) => {
                    self.core.metrics().record_unverified();
                    tracing::warn!(
                        transaction_id = %err.transaction.id,
                        failure = %err.failure,
                        "purchase returned an unverified transaction"
                    );
                    PurchaseOutcome::Failure(err.into())
                }
            },
            PurchaseResult::Pending => {
                tracing::debug!("purchase pending approval");
                PurchaseOutcome::Pending
            }
            PurchaseResult::UserCancelled => {
                tracing::debug!("purchase cancelled by user");
                PurchaseOutcome::UserCancelled
            }
            PurchaseResult::Unrecognized { description } => {
                tracing::warn!(%description, "unrecognized purchase result");
                PurchaseOutcome::Failure(PurchaseKitError::UnknownResult(description))
            }
        }
    }

    // ---- Restore ----

    /// Collect the customer's verified entitlements.
    ///
    /// Each unverified entry is notified as a failure and left out. A single
    /// restored notification follows if anything was collected. Nothing is
    /// finalized.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> Result<Vec<Transaction>> {
        let envelopes = self.entitlements().await?;
        let mut restored = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            match classify(envelope) {
                Ok(transaction) => restored.push(transaction),
                Err(err) => self.report_unverified(err.into()),
            }
        }

        self.core.metrics().record_restore();
        tracing::info!(restored = restored.len(), "restore complete");
        if !restored.is_empty() {
            self.core.notify(Notification::Restored(restored.clone()));
        }
        Ok(restored)
    }

    // ---- Status ----

    /// Current entitlement status of a product.
    pub async fn status(&self, product_id: &ProductId) -> Result<EntitlementStatus> {
        self.status_at(product_id, Utc::now()).await
    }

    /// Entitlement status of a product evaluated at `now`.
    ///
    /// Re-enumerates entitlements on every call. The first verified
    /// transaction for the product decides; unverified entries seen before
    /// it are notified as failures. Exactly one status notification fires.
    #[tracing::instrument(skip(self, now), fields(product_id = %product_id))]
    pub async fn status_at(&self, product_id: &ProductId, now: DateTime<Utc>) -> Result<EntitlementStatus> {
        let envelopes = self.entitlements().await?;
        let mut status = EntitlementStatus::NotPurchased;
        for envelope in envelopes {
            match classify(envelope) {
                Ok(transaction) if &transaction.product_id == product_id => {
                    status = resolve(transaction, now);
                    break;
                }
                Ok(_) => {}
                Err(err) => self.report_unverified(err.into()),
            }
        }

        tracing::debug!(status = status.label(), "status resolved");
        self.core.notify(Notification::StatusUpdated {
            status: status.clone(),
            product_id: product_id.clone(),
        });
        Ok(status)
    }

    /// Resolve several products from one enumeration, notifying once per id.
    ///
    /// Every unverified entry is notified as a failure once.
    #[tracing::instrument(skip(self, product_ids), fields(requested = product_ids.len()))]
    pub async fn statuses(&self, product_ids: &[ProductId]) -> Result<Vec<(ProductId, EntitlementStatus)>> {
        let now = Utc::now();
        let mut verified = Vec::new();
        for envelope in self.entitlements().await? {
            match classify(envelope) {
                Ok(transaction) => verified.push(transaction),
                Err(err) => self.report_unverified(err.into()),
            }
        }

        let mut resolved = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            let status = verified
                .iter()
                .find(|tx| &tx.product_id == product_id)
                .map(|tx| resolve(tx.clone(), now))
                .unwrap_or(EntitlementStatus::NotPurchased);
            self.core.notify(Notification::StatusUpdated {
                status: status.clone(),
                product_id: product_id.clone(),
            });
            resolved.push((product_id.clone(), status));
        }
        Ok(resolved)
    }

    /// Whether the product is currently purchased and neither expired nor revoked.
    pub async fn is_entitled(&self, product_id: &ProductId) -> Result<bool> {
        Ok(self.status(product_id).await?.is_active())
    }

    async fn entitlements(&self) -> Result<Vec<VerificationEnvelope>> {
        self.core
            .call(
                "current_entitlements",
                self.core.provider().current_entitlements(),
            )
            .await
            .map_err(|err| self.report_provider_error(err))
    }

    /// Hand a failed provider call to observers before returning it.
    fn report_provider_error(&self, err: PurchaseKitError) -> PurchaseKitError {
        tracing::warn!(error = %err, "provider call failed");
        self.core.notify(Notification::PurchaseFailed(err.clone()));
        err
    }

    fn report_unverified(&self, err: PurchaseKitError) {
        self.core.metrics().record_unverified();
        tracing::warn!(error = %err, "skipping unverified entitlement");
        self.core.notify(Notification::PurchaseFailed(err));
    }
}

impl std::fmt::Debug for PurchaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchaseManager")
            .field("config", &self.config)
            .field("listening", &self.is_listening())
            .field("observers", &self.observer_count())
            .finish()
    }
}

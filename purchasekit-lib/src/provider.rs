//! Storefront seam.
//!
//! [`StoreProvider`] is everything the manager needs from a storefront:
//! catalog queries, purchases, entitlement enumeration, the live update feed
//! and finalization. Implementations wrap a platform store or, in tests, the
//! in-memory `MockStore`.

use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;
use uuid::Uuid;

use crate::{Product, ProductId, Result, Transaction, VerificationEnvelope};

/// Unbounded stream of entitlement-affecting events from the storefront.
pub type UpdateStream = Pin<Box<dyn Stream<Item = VerificationEnvelope> + Send + 'static>>;

/// What the storefront reported for a purchase request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PurchaseResult {
    /// Payment went through; the envelope says whether the transaction verified.
    Success { envelope: VerificationEnvelope },
    /// Awaiting approval (e.g., parental consent, deferred payment).
    Pending,
    /// The customer dismissed the purchase sheet.
    UserCancelled,
    /// A result variant this version of the core does not know about.
    Unrecognized { description: String },
}

impl PurchaseResult {
    pub fn verified(transaction: Transaction) -> Self {
        Self::Success {
            envelope: VerificationEnvelope::Verified(transaction),
        }
    }
}

/// Options forwarded to the storefront with a purchase request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOptions {
    /// Number of units for consumables.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Opaque token linking the purchase to an app-side account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_account_token: Option<Uuid>,
}

fn default_quantity() -> u32 {
    1
}

impl Default for PurchaseOptions {
    fn default() -> Self {
        Self {
            quantity: default_quantity(),
            app_account_token: None,
        }
    }
}

impl PurchaseOptions {
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_app_account_token(mut self, token: Uuid) -> Self {
        self.app_account_token = Some(token);
        self
    }
}

/// Storefront access consumed by the purchase manager.
///
/// Implemented by bindings to a platform storefront SDK, and by
/// `test_utils::MockStore` for tests. Signature and receipt
/// validation happen behind this trait; the core only sees envelopes.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Fetches catalog metadata for the given ids. Unknown ids are omitted.
    async fn query_products(&self, ids: &HashSet<ProductId>) -> Result<Vec<Product>>;

    /// Submits a purchase request and waits for the storefront's answer.
    async fn purchase(&self, product: &Product, options: &PurchaseOptions)
        -> Result<PurchaseResult>;

    /// Enumerates the customer's current entitlements.
    ///
    /// The enumeration is finite. Revoked transactions are normally excluded.
    async fn current_entitlements(&self) -> Result<Vec<VerificationEnvelope>>;

    /// Opens the live update feed. The returned stream does not end on its own.
    async fn live_updates(&self) -> Result<UpdateStream>;

    /// Marks a transaction as processed so it is not redelivered.
    async fn finalize(&self, transaction: &Transaction) -> Result<()>;
}

//! Storefront transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::ProductKind;
use crate::{ProductId, TransactionId};

/// A storefront transaction.
///
/// Owned by the provider; the core only holds transient copies while
/// classifying and finalizing it. A verified transaction must be finalized
/// once or the provider redelivers it on a later listen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// First transaction in a renewal chain; equal to `id` for one-off purchases.
    pub original_id: TransactionId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_kind: ProductKind,
    pub purchased_at: DateTime<Utc>,
    /// Present for subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Present only when the storefront refunded or revoked the purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Token the app attached to the purchase, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_account_token: Option<Uuid>,
}

fn default_quantity() -> u32 {
    1
}

impl Transaction {
    /// Create a non-consumable transaction purchased now.
    pub fn new(id: impl Into<TransactionId>, product_id: impl Into<ProductId>) -> Self {
        let id = id.into();
        Self {
            original_id: id.clone(),
            id,
            product_id: product_id.into(),
            product_kind: ProductKind::NonConsumable,
            purchased_at: Utc::now(),
            expires_at: None,
            revoked_at: None,
            quantity: default_quantity(),
            app_account_token: None,
        }
    }

    pub fn with_kind(mut self, kind: ProductKind) -> Self {
        self.product_kind = kind;
        self
    }

    pub fn with_original_id(mut self, original_id: impl Into<TransactionId>) -> Self {
        self.original_id = original_id.into();
        self
    }

    pub fn with_purchase_date(mut self, purchased_at: DateTime<Utc>) -> Self {
        self.purchased_at = purchased_at;
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_revocation(mut self, revoked_at: DateTime<Utc>) -> Self {
        self.revoked_at = Some(revoked_at);
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_app_account_token(mut self, token: Uuid) -> Self {
        self.app_account_token = Some(token);
        self
    }

    /// True when the transaction carries an expiration strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < now)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// True for a renewal rather than the first purchase in a chain.
    pub fn is_renewal(&self) -> bool {
        self.id != self.original_id
    }
}

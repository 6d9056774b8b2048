//! PurchaseKit library.
//!
//! This crate holds the storefront-agnostic half of in-app purchasing: the
//! data model, the [`StoreProvider`] seam that a storefront SDK binding
//! implements, the verification classifier and the pure entitlement status
//! resolver. It keeps no state of its own; the stateful orchestration lives in
//! `purchasekit-manager`.
//!
//! # Features
//!
//! - **Provider abstraction**: product queries, purchases, entitlement
//!   enumeration, live updates and finalization behind one async trait
//! - **Verification classification**: verified vs unverified envelopes, with
//!   the untrusted transaction kept for reporting
//! - **Status resolution**: purchased / expired / revoked from a transaction
//!   and a point in time
//!
//! # Example
//!
//! ```
//! use purchasekit_lib::{classify, ProductId, Transaction, VerificationEnvelope};
//!
//! let tx = Transaction::new("1000", ProductId::new("pro_plan"));
//! let verified = classify(VerificationEnvelope::Verified(tx)).unwrap();
//! assert_eq!(verified.product_id.as_str(), "pro_plan");
//! ```

pub mod config;
pub mod errors;
pub mod prelude;
pub mod product;
pub mod provider;
pub mod status;
pub mod transaction;
pub mod verification;

/// Test utilities for purchase-flow testing.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{FinalizePolicy, ManagerConfig};
pub use errors::{PurchaseKitError, PurchaseKitErrorCode};
pub use product::{
    IntroductoryOffer, OfferPaymentMode, PeriodUnit, Product, ProductKind, SubscriptionInfo,
    SubscriptionPeriod,
};
pub use provider::{PurchaseOptions, PurchaseResult, StoreProvider, UpdateStream};
pub use status::{resolve, EntitlementStatus};
pub use transaction::Transaction;
pub use verification::{classify, VerificationEnvelope, VerificationError, VerificationFailure};

/// Common result alias for PurchaseKit operations.
pub type Result<T> = std::result::Result<T, PurchaseKitError>;

/// Identifier of a purchasable product, unique within a catalog query.
///
/// # Example
///
/// ```
/// use purchasekit_lib::ProductId;
///
/// let id: ProductId = "pro_plan".into();
/// assert_eq!(id.as_str(), "pro_plan");
/// assert_eq!(id, ProductId::new("pro_plan"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    /// Create a new ProductId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier the storefront assigns to a single transaction.
///
/// # Example
///
/// ```
/// use purchasekit_lib::TransactionId;
///
/// let id = TransactionId::new("2000000123");
/// assert_eq!(id.to_string(), "2000000123");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Create a new TransactionId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the transaction ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TransactionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

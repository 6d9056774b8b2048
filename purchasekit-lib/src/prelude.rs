//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use purchasekit_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - Identifiers: `ProductId`, `TransactionId`
//! - Model: `Product`, `ProductKind`, `Transaction`, `EntitlementStatus`
//! - Verification: `VerificationEnvelope`, `classify`
//! - Provider seam: `StoreProvider`, `PurchaseResult`, `PurchaseOptions`
//! - Errors and config

pub use crate::{ProductId, TransactionId};

pub use crate::product::{Product, ProductKind, SubscriptionPeriod};
pub use crate::status::{resolve, EntitlementStatus};
pub use crate::transaction::Transaction;

pub use crate::verification::{
    classify, VerificationEnvelope, VerificationError, VerificationFailure,
};

pub use crate::provider::{PurchaseOptions, PurchaseResult, StoreProvider, UpdateStream};

pub use crate::config::{FinalizePolicy, ManagerConfig};
pub use crate::errors::{PurchaseKitError, PurchaseKitErrorCode};
pub use crate::Result;

//! Entitlement status for a single product.
//!
//! Status is never cached: it is recomputed from the provider's current
//! entitlements and the wall clock on every query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Transaction;

/// Current standing of one product for the customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "transaction", rename_all = "snake_case")]
pub enum EntitlementStatus {
    /// No verified entitlement for the product.
    NotPurchased,
    /// Active entitlement.
    Purchased(Transaction),
    /// The latest entitlement expired before the query time.
    Expired(Transaction),
    /// The storefront revoked the entitlement.
    Revoked(Transaction),
}

impl EntitlementStatus {
    /// True only for an active entitlement.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Purchased(_))
    }

    /// The deciding transaction, if any.
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            Self::NotPurchased => None,
            Self::Purchased(tx) | Self::Expired(tx) | Self::Revoked(tx) => Some(tx),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotPurchased => "not_purchased",
            Self::Purchased(_) => "purchased",
            Self::Expired(_) => "expired",
            Self::Revoked(_) => "revoked",
        }
    }
}

/// Resolve the status a verified transaction confers at `now`.
///
/// A revocation timestamp wins over expiry. An expiration strictly before
/// `now` is expired; one at or after `now`, or none at all, is purchased.
pub fn resolve(transaction: Transaction, now: DateTime<Utc>) -> EntitlementStatus {
    if transaction.is_revoked() {
        EntitlementStatus::Revoked(transaction)
    } else if transaction.is_expired_at(now) {
        EntitlementStatus::Expired(transaction)
    } else {
        EntitlementStatus::Purchased(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn test_expired_one_second_ago() {
        let now = Utc::now();
        let tx = Transaction::new("1", "pro_plan").with_expiration(now - Duration::seconds(1));
        assert_eq!(resolve(tx.clone(), now), EntitlementStatus::Expired(tx));
    }

    #[test]
    fn test_purchased_with_future_or_no_expiration() {
        let now = Utc::now();
        let future = Transaction::new("1", "pro_plan").with_expiration(now + Duration::hours(1));
        assert!(resolve(future, now).is_active());

        let lifetime = Transaction::new("2", "lifetime");
        assert!(resolve(lifetime, now).is_active());
    }

    #[test]
    fn test_revocation_wins_over_expiry() {
        let now = Utc::now();
        let tx = Transaction::new("1", "pro_plan")
            .with_expiration(now + Duration::hours(1))
            .with_revocation(now - Duration::minutes(5));
        let status = resolve(tx, now);
        assert_eq!(status.label(), "revoked");
        assert!(!status.is_active());
        assert!(status.transaction().is_some());
    }

    proptest! {
        #[test]
        fn prop_status_follows_expiration_offset(offset_secs in -86_400i64..86_400) {
            let now = Utc::now();
            let tx = Transaction::new("1", "pro_plan")
                .with_expiration(now + Duration::seconds(offset_secs));
            let status = resolve(tx, now);
            if offset_secs < 0 {
                prop_assert_eq!(status.label(), "expired");
            } else {
                prop_assert_eq!(status.label(), "purchased");
            }
        }
    }
}

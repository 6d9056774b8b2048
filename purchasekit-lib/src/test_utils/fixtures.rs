//! Test fixtures and data generators.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::{
    IntroductoryOffer, OfferPaymentMode, Product, ProductKind, SubscriptionPeriod, Transaction,
    VerificationEnvelope, VerificationFailure,
};

/// Sample catalog used across tests.
pub struct TestFixtures;

impl TestFixtures {
    /// Product ids in the sample catalog.
    pub const PRODUCT_IDS: &'static [&'static str] = &["pro_plan", "lifetime", "coins_100"];

    /// Monthly auto-renewable subscription with a one-week free trial.
    pub fn pro_plan() -> Product {
        Product::new(
            "pro_plan",
            "Pro Plan",
            "$4.99",
            Decimal::new(499, 2),
            ProductKind::AutoRenewable,
        )
        .with_description("All features, billed monthly")
        .with_subscription("pro", SubscriptionPeriod::months(1))
        .with_introductory_offer(IntroductoryOffer {
            payment_mode: OfferPaymentMode::FreeTrial,
            period: SubscriptionPeriod::days(7),
            period_count: 1,
            display_price: "Free".to_string(),
        })
    }

    /// One-time unlock.
    pub fn lifetime() -> Product {
        Product::new(
            "lifetime",
            "Lifetime Unlock",
            "$29.99",
            Decimal::new(2999, 2),
            ProductKind::NonConsumable,
        )
    }

    /// Consumable currency pack.
    pub fn coins() -> Product {
        Product::new(
            "coins_100",
            "100 Coins",
            "$0.99",
            Decimal::new(99, 2),
            ProductKind::Consumable,
        )
    }

    /// The full sample catalog.
    pub fn catalog() -> Vec<Product> {
        vec![Self::pro_plan(), Self::lifetime(), Self::coins()]
    }
}

/// Wrap a transaction as verified.
pub fn verified(transaction: Transaction) -> VerificationEnvelope {
    VerificationEnvelope::Verified(transaction)
}

/// Wrap a transaction as unverified with an invalid signature.
pub fn unverified(transaction: Transaction) -> VerificationEnvelope {
    VerificationEnvelope::unverified(transaction, VerificationFailure::InvalidSignature)
}

/// A pro_plan subscription that is active for another hour.
pub fn active_subscription(id: &str) -> Transaction {
    Transaction::new(id, "pro_plan")
        .with_kind(ProductKind::AutoRenewable)
        .with_purchase_date(Utc::now() - Duration::days(29))
        .with_expiration(Utc::now() + Duration::hours(1))
}

/// A pro_plan subscription that lapsed a second ago.
pub fn expired_subscription(id: &str) -> Transaction {
    Transaction::new(id, "pro_plan")
        .with_kind(ProductKind::AutoRenewable)
        .with_purchase_date(Utc::now() - Duration::days(31))
        .with_expiration(Utc::now() - Duration::seconds(1))
}

/// A lifetime unlock with no expiration.
pub fn lifetime_purchase(id: &str) -> Transaction {
    Transaction::new(id, "lifetime").with_kind(ProductKind::NonConsumable)
}

//! Product catalog types.
//!
//! Products are supplied wholesale by the store provider for each catalog
//! query. They are immutable and never persisted by the core.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// What kind of purchase a product represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Used up once purchased and can be bought again.
    Consumable,
    /// Bought once, owned forever.
    #[default]
    NonConsumable,
    /// Subscription the storefront renews automatically.
    AutoRenewable,
    /// Subscription with a fixed duration that does not renew.
    NonRenewing,
}

impl ProductKind {
    /// Returns true for either subscription kind.
    pub fn is_subscription(&self) -> bool {
        matches!(self, Self::AutoRenewable | Self::NonRenewing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumable => "consumable",
            Self::NonConsumable => "non_consumable",
            Self::AutoRenewable => "auto_renewable",
            Self::NonRenewing => "non_renewing",
        }
    }
}

/// Unit of a subscription or offer period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

/// A span of time such as "1 month" or "7 days".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionPeriod {
    pub unit: PeriodUnit,
    pub value: u32,
}

impl SubscriptionPeriod {
    pub fn new(unit: PeriodUnit, value: u32) -> Self {
        Self { unit, value }
    }

    pub fn days(value: u32) -> Self {
        Self::new(PeriodUnit::Day, value)
    }

    pub fn months(value: u32) -> Self {
        Self::new(PeriodUnit::Month, value)
    }

    pub fn years(value: u32) -> Self {
        Self::new(PeriodUnit::Year, value)
    }
}

impl std::fmt::Display for SubscriptionPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match self.unit {
            PeriodUnit::Day => "day",
            PeriodUnit::Week => "week",
            PeriodUnit::Month => "month",
            PeriodUnit::Year => "year",
        };
        if self.value == 1 {
            write!(f, "1 {}", unit)
        } else {
            write!(f, "{} {}s", self.value, unit)
        }
    }
}

/// How the customer pays during an introductory offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferPaymentMode {
    /// Nothing is charged for the offer period.
    FreeTrial,
    /// A discounted price is charged every period.
    PayAsYouGo,
    /// A discounted price is charged once for the whole offer.
    PayUpFront,
}

/// Introductory offer attached to a subscription product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroductoryOffer {
    pub payment_mode: OfferPaymentMode,
    /// Length of one offer period.
    pub period: SubscriptionPeriod,
    /// Number of periods the offer lasts.
    #[serde(default = "default_period_count")]
    pub period_count: u32,
    /// Localized price string for the offer (e.g., "Free", "$0.99").
    pub display_price: String,
}

fn default_period_count() -> u32 {
    1
}

/// Subscription metadata for subscription products.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Storefront subscription group the product belongs to.
    pub group_id: String,
    /// Renewal period.
    pub period: SubscriptionPeriod,
}

/// A purchasable product as returned by the store provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Localized price string (e.g., "$4.99").
    pub display_price: String,
    pub price: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: String,
    pub kind: ProductKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introductory_offer: Option<IntroductoryOffer>,
}

impl Product {
    /// Create a product with an empty description and no subscription data.
    pub fn new(
        id: impl Into<ProductId>,
        display_name: impl Into<String>,
        display_price: impl Into<String>,
        price: Decimal,
        kind: ProductKind,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: String::new(),
            display_price: display_price.into(),
            price,
            currency_code: "USD".to_string(),
            kind,
            subscription: None,
            introductory_offer: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_currency(mut self, currency_code: impl Into<String>) -> Self {
        self.currency_code = currency_code.into();
        self
    }

    pub fn with_subscription(mut self, group_id: impl Into<String>, period: SubscriptionPeriod) -> Self {
        self.subscription = Some(SubscriptionInfo {
            group_id: group_id.into(),
            period,
        });
        self
    }

    pub fn with_introductory_offer(mut self, offer: IntroductoryOffer) -> Self {
        self.introductory_offer = Some(offer);
        self
    }

    pub fn is_subscription(&self) -> bool {
        self.kind.is_subscription()
    }

    pub fn has_introductory_offer(&self) -> bool {
        self.introductory_offer.is_some()
    }
}

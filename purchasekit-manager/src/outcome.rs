use purchasekit_lib::{PurchaseKitError, Transaction};

use crate::observer::Notification;

/// Result of a single purchase attempt.
///
/// Returned to the caller and mirrored by exactly one observer notification.
#[derive(Clone, Debug)]
pub enum PurchaseOutcome {
    /// Verified and finalized (finalization is best effort).
    Success(Transaction),
    /// The customer dismissed the purchase.
    UserCancelled,
    /// Awaiting approval; the update listener will see the transaction later.
    Pending,
    /// The purchase failed or could not be trusted.
    Failure(PurchaseKitError),
}

impl PurchaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            Self::Success(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PurchaseKitError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::UserCancelled => "user_cancelled",
            Self::Pending => "pending",
            Self::Failure(_) => "failure",
        }
    }

    /// The observer notification matching this outcome.
    pub(crate) fn notification(&self) -> Notification {
        match self {
            Self::Success(tx) => Notification::PurchaseComplete(tx.clone()),
            Self::UserCancelled => Notification::PurchaseCancelled,
            Self::Pending => Notification::PurchasePending,
            Self::Failure(err) => Notification::PurchaseFailed(err.clone()),
        }
    }
}

//! Error types for PurchaseKit operations.
//!
//! Every failure the purchase layer can surface is a [`PurchaseKitError`].
//! Errors are converted into outcome values or observer notifications at the
//! component that produced them; only provider call failures propagate to
//! callers as `Err`.

use std::fmt;

use crate::verification::VerificationError;
use crate::{ProductId, TransactionId};

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PurchaseKitErrorCode {
    /// Store provider call failed
    Provider = 2000,
    /// Store provider call timed out
    Timeout = 2001,
    /// Transaction failed verification
    Verification = 3000,
    /// Provider returned a result variant this version does not know
    UnknownResult = 4000,
    /// Product is not in the store catalog
    ProductNotFound = 4001,
    /// Acknowledging a verified transaction failed
    Finalization = 5000,
    /// Invalid configuration
    InvalidConfig = 6000,
    /// Listener could not be started
    ListenerUnavailable = 7000,
    /// Serialization error
    Serialization = 8000,
}

/// Comprehensive error type for PurchaseKit operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseKitError {
    /// Network or store-level failure from a provider call.
    Provider {
        /// Provider operation that failed (e.g., "purchase")
        operation: String,
        /// Underlying error message
        reason: String,
    },

    /// A provider call exceeded the configured request timeout.
    Timeout {
        /// Provider operation that timed out
        operation: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Envelope was tagged unverified.
    Verification(VerificationError),

    /// Provider returned a purchase result the core does not recognize.
    UnknownResult(String),

    /// Failed to acknowledge an already-verified transaction.
    Finalization {
        /// Transaction that could not be finalized
        transaction_id: TransactionId,
        /// Failure reason
        reason: String,
    },

    /// Product was not returned by the catalog query.
    ProductNotFound(ProductId),

    /// Configuration rejected by validation.
    InvalidConfig(String),

    /// No runtime is available to run the update listener on.
    ListenerUnavailable(String),

    /// Serialization/deserialization error.
    Serialization(String),
}

impl PurchaseKitError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> PurchaseKitErrorCode {
        match self {
            Self::Provider { .. } => PurchaseKitErrorCode::Provider,
            Self::Timeout { .. } => PurchaseKitErrorCode::Timeout,
            Self::Verification(_) => PurchaseKitErrorCode::Verification,
            Self::UnknownResult(_) => PurchaseKitErrorCode::UnknownResult,
            Self::Finalization { .. } => PurchaseKitErrorCode::Finalization,
            Self::ProductNotFound(_) => PurchaseKitErrorCode::ProductNotFound,
            Self::InvalidConfig(_) => PurchaseKitErrorCode::InvalidConfig,
            Self::ListenerUnavailable(_) => PurchaseKitErrorCode::ListenerUnavailable,
            Self::Serialization(_) => PurchaseKitErrorCode::Serialization,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if the failed operation may succeed when attempted again.
    ///
    /// Verification failures are never retryable: the envelope is immutable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::Timeout { .. } | Self::Finalization { .. }
        )
    }

    /// Create a provider error for the named operation.
    pub fn provider(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Provider {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a finalization error for a transaction.
    pub fn finalization(transaction_id: TransactionId, reason: impl fmt::Display) -> Self {
        Self::Finalization {
            transaction_id,
            reason: reason.to_string(),
        }
    }

    /// The verification error, if this is one.
    pub fn as_verification(&self) -> Option<&VerificationError> {
        match self {
            Self::Verification(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for PurchaseKitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider { operation, reason } => {
                write!(f, "store provider {} failed: {}", operation, reason)
            }
            Self::Timeout {
                operation,
                timeout_ms,
            } => {
                write!(f, "{} timed out after {}ms", operation, timeout_ms)
            }
            Self::Verification(err) => write!(f, "{}", err),
            Self::UnknownResult(description) => {
                write!(f, "unknown purchase result: {}", description)
            }
            Self::Finalization {
                transaction_id,
                reason,
            } => {
                write!(
                    f,
                    "failed to finalize transaction {}: {}",
                    transaction_id, reason
                )
            }
            Self::ProductNotFound(id) => write!(f, "product not found: {}", id),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::ListenerUnavailable(msg) => write!(f, "update listener unavailable: {}", msg),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for PurchaseKitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Verification(err) => Some(err),
            _ => None,
        }
    }
}

impl From<VerificationError> for PurchaseKitError {
    fn from(err: VerificationError) -> Self {
        Self::Verification(err)
    }
}

impl From<serde_json::Error> for PurchaseKitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

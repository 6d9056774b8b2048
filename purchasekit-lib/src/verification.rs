//! Verification envelopes and the classifier.
//!
//! The store provider wraps every transaction it hands out in a
//! [`VerificationEnvelope`] stating whether its signature checked out. The
//! core never builds envelopes for real traffic and never verifies anything
//! itself; [`classify`] only dispatches on the tag.

use serde::{Deserialize, Serialize};

use crate::Transaction;

/// Why the provider could not verify a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum VerificationFailure {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid certificate chain")]
    InvalidCertificateChain,
    #[error("invalid encoding")]
    InvalidEncoding,
    #[error("signing certificate revoked")]
    RevokedCertificate,
    #[error("{0}")]
    Other(String),
}

/// Provider-issued wrapper around a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verification", rename_all = "snake_case")]
pub enum VerificationEnvelope {
    /// The transaction's authenticity was confirmed.
    Verified(Transaction),
    /// Verification failed; the transaction must not be trusted.
    Unverified {
        transaction: Transaction,
        failure: VerificationFailure,
    },
}

impl VerificationEnvelope {
    /// Wrap an unverified transaction.
    pub fn unverified(transaction: Transaction, failure: VerificationFailure) -> Self {
        Self::Unverified {
            transaction,
            failure,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    /// The enclosed transaction regardless of verification.
    ///
    /// Only for logging and reporting; never finalize or grant access based
    /// on this.
    pub fn unsafe_payload(&self) -> &Transaction {
        match self {
            Self::Verified(transaction) => transaction,
            Self::Unverified { transaction, .. } => transaction,
        }
    }
}

/// An envelope tagged unverified, with the offending transaction.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("transaction {} for {} failed verification: {failure}", .transaction.id, .transaction.product_id)]
pub struct VerificationError {
    /// The untrusted transaction, kept for reporting only.
    pub transaction: Transaction,
    #[source]
    pub failure: VerificationFailure,
}

/// Classify an envelope into a trusted transaction or a verification error.
pub fn classify(envelope: VerificationEnvelope) -> Result<Transaction, VerificationError> {
    match envelope {
        VerificationEnvelope::Verified(transaction) => Ok(transaction),
        VerificationEnvelope::Unverified {
            transaction,
            failure,
        } => {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                transaction_id = %transaction.id,
                product_id = %transaction.product_id,
                %failure,
                "envelope classified as unverified"
            );
            Err(VerificationError {
                transaction,
                failure,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_verified() {
        let tx = Transaction::new("1", "pro_plan");
        let envelope = VerificationEnvelope::Verified(tx.clone());
        assert!(envelope.is_verified());
        assert_eq!(classify(envelope).unwrap(), tx);
    }

    #[test]
    fn test_classify_unverified_keeps_transaction() {
        let tx = Transaction::new("2", "pro_plan");
        let envelope =
            VerificationEnvelope::unverified(tx.clone(), VerificationFailure::InvalidSignature);
        assert_eq!(envelope.unsafe_payload(), &tx);

        let err = classify(envelope).unwrap_err();
        assert_eq!(err.transaction, tx);
        assert_eq!(err.failure, VerificationFailure::InvalidSignature);
        assert!(err.to_string().contains("failed verification: invalid signature"));
    }

    #[test]
    fn test_envelope_json_tagging() {
        let envelope = VerificationEnvelope::unverified(
            Transaction::new("3", "coins"),
            VerificationFailure::Other("clock skew".into()),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["verification"], "unverified");
        assert_eq!(json["failure"]["reason"], "other");

        let back: VerificationEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }
}

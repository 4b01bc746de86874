//! Caller-facing ledger errors.

use thiserror::Error;

use passbook_core::{AccountId, DomainError, Money};

use crate::event_store::EventStoreError;

/// Failure of a ledger operation.
///
/// `InvalidAmount`, `InsufficientFunds`, `AccountNotFound`, `AccountExists` and
/// `Validation` are recoverable caller errors and never leave a partial write.
/// `Internal` covers storage failures; it is logged when constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("an account already exists for holder '{0}'")]
    AccountExists(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Build an `Internal` error and report it for operator attention.
    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(error = %msg, "ledger internal error");
        Self::Internal(msg)
    }

    /// Map a domain rejection for `account_id` onto the caller-facing taxonomy.
    pub fn from_domain(err: DomainError, account_id: AccountId) -> Self {
        match err {
            DomainError::InvalidAmount(msg) => Self::InvalidAmount(msg),
            DomainError::InsufficientFunds {
                requested,
                available,
            } => Self::InsufficientFunds {
                requested,
                available,
            },
            DomainError::NotFound => Self::AccountNotFound(account_id),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::Conflict(msg) | DomainError::InvariantViolation(msg) => {
                Self::internal(format!("account {account_id}: {msg}"))
            }
        }
    }

    /// Whether the caller can fix the request and resubmit.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

impl From<EventStoreError> for LedgerError {
    fn from(value: EventStoreError) -> Self {
        Self::internal(format!("event store: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_caller_taxonomy() {
        let id = AccountId::new();
        assert_eq!(
            LedgerError::from_domain(DomainError::NotFound, id),
            LedgerError::AccountNotFound(id)
        );
        assert!(matches!(
            LedgerError::from_domain(DomainError::invalid_amount("zero"), id),
            LedgerError::InvalidAmount(_)
        ));
        assert!(matches!(
            LedgerError::from_domain(DomainError::conflict("stale"), id),
            LedgerError::Internal(_)
        ));
    }

    #[test]
    fn store_failures_are_internal_and_not_recoverable() {
        let err: LedgerError = EventStoreError::Unavailable("disk full".to_string()).into();
        assert!(matches!(err, LedgerError::Internal(ref m) if m.contains("disk full")));
        assert!(!err.is_recoverable());
    }
}

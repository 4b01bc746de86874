use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use passbook_core::{AccountId, ExpectedVersion};
use std::sync::Arc;

/// An event ready to be appended to an account stream (not yet assigned a
/// sequence number).
///
/// Build one with [`UncommittedEvent::from_typed`], which serializes the domain
/// event and captures the metadata needed to decode it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub account_id: AccountId,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only account stream.
///
/// Sequence numbers start at 1, are assigned by the store during append, and
/// never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub account_id: AccountId,

    /// Monotonically increasing position in the account stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }
}

/// Event store operation error.
///
/// These are storage failures, as opposed to domain errors (validation,
/// insufficient funds).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only event store, one stream per account.
///
/// Implementations must:
/// - reject batches that mix accounts
/// - enforce optimistic concurrency against the current stream version
/// - assign sequence numbers `current_version + 1, +2, ...` with no gaps
/// - persist a batch atomically (all events or none)
/// - serve `load_stream` from a consistent snapshot of one stream without
///   blocking appends to other streams
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for an account, ascending by sequence number.
    /// Unknown accounts yield an empty stream.
    fn load_stream(&self, account_id: AccountId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Ids of every non-empty stream.
    fn stream_ids(&self) -> Result<Vec<AccountId>, EventStoreError>;

    /// The first event of an account stream, if any.
    fn first_event(&self, account_id: AccountId) -> Result<Option<StoredEvent>, EventStoreError> {
        Ok(self.load_stream(account_id)?.into_iter().next())
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, account_id: AccountId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(account_id)
    }

    fn stream_ids(&self) -> Result<Vec<AccountId>, EventStoreError> {
        (**self).stream_ids()
    }

    fn first_event(&self, account_id: AccountId) -> Result<Option<StoredEvent>, EventStoreError> {
        (**self).first_event(account_id)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    pub fn from_typed<E>(
        account_id: AccountId,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: passbook_core::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            account_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

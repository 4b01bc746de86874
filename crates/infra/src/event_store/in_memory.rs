use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use passbook_core::{AccountId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

type Stream = Arc<RwLock<Vec<StoredEvent>>>;

/// In-memory append-only event store.
///
/// The stream index is only locked long enough to find or create a stream; each
/// stream then has its own lock, so readers and writers of different accounts
/// never wait on each other.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AccountId, Stream>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    fn existing_stream(&self, account_id: AccountId) -> Result<Option<Stream>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(streams.get(&account_id).cloned())
    }

    fn stream_for_append(&self, account_id: AccountId) -> Result<Stream, EventStoreError> {
        if let Some(stream) = self.existing_stream(account_id)? {
            return Ok(stream);
        }
        let mut streams = self.streams.write().map_err(|_| EventStoreError::Poisoned)?;
        Ok(streams.entry(account_id).or_default().clone())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let account_id = first.account_id;

        for (idx, e) in events.iter().enumerate() {
            if e.account_id != account_id {
                return Err(EventStoreError::StreamMismatch(format!(
                    "batch contains multiple account_ids (index {idx})"
                )));
            }
        }

        let handle = self.stream_for_append(account_id)?;
        let mut stream = handle.write().map_err(|_| EventStoreError::Poisoned)?;
        let current = Self::current_version(&stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Nothing below can fail, so the batch lands whole or not at all.
        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(e, sequence_number)| StoredEvent {
                event_id: e.event_id,
                account_id: e.account_id,
                sequence_number,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            })
            .collect();
        stream.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(&self, account_id: AccountId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(handle) = self.existing_stream(account_id)? else {
            return Ok(vec![]);
        };
        let stream = handle.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(stream.clone())
    }

    fn first_event(&self, account_id: AccountId) -> Result<Option<StoredEvent>, EventStoreError> {
        let Some(handle) = self.existing_stream(account_id)? else {
            return Ok(None);
        };
        let stream = handle.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(stream.first().cloned())
    }

    fn stream_ids(&self) -> Result<Vec<AccountId>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| EventStoreError::Poisoned)?;
        let mut ids = Vec::with_capacity(streams.len());
        for (id, handle) in streams.iter() {
            let stream = handle.read().map_err(|_| EventStoreError::Poisoned)?;
            if !stream.is_empty() {
                ids.push(*id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

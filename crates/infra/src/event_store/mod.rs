//! Append-only event store boundary.
//!
//! Each account is one stream. The store knows nothing about ledger semantics;
//! it only guarantees ordered, atomic, append-only persistence.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

//! Infrastructure layer: event store, per-account locking, and the ledger
//! service that ties them to the domain aggregate.

pub mod error;
pub mod event_store;
pub mod ledger;
pub mod locks;


pub use error::LedgerError;
pub use ledger::{AccountSummary, Ledger, TransactionHistory};

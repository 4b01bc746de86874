//! Ledger module (single-holder accounts, event-sourced).
//!
//! Pure domain logic only: no IO, no persistence concerns.

pub mod account;
pub mod transaction;

pub use account::{
    Account, AccountCommand, AccountEvent, AccountOpened, Deposit, Deposited, OpenAccount,
    Withdraw, Withdrawn,
};
pub use transaction::{Transaction, TransactionKind, sort_most_recent_first};

//! Ledger service: command execution and read access for accounts.
//!
//! Every mutation runs the same pipeline while holding the account's lock:
//!
//! ```text
//! 1. Load the account stream
//! 2. Rehydrate the `Account` aggregate
//! 3. Handle the command (pure decision, may reject)
//! 4. Append the decided events (one atomic append, optimistic version check)
//! ```
//!
//! Balance and history are both derived from the same stream, so step 4 is the
//! only write and it either lands whole or not at all.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use passbook_core::{
    AccountId, Aggregate, AggregateRoot, Clock, ExpectedVersion, Money, SystemClock,
    TransactionId,
};
use passbook_ledger::{
    Account, AccountCommand, AccountEvent, Deposit, OpenAccount, Transaction, TransactionKind,
    Withdraw, sort_most_recent_first,
};

use crate::error::LedgerError;
use crate::event_store::{EventStore, StoredEvent, UncommittedEvent};
use crate::locks::AccountLocks;

/// Read model: one account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub holder_name: String,
    pub balance: Money,
    pub transaction_count: usize,
}

/// Read side of the ledger that statement rendering depends on.
pub trait TransactionHistory {
    /// Transactions of one account, most recent first.
    fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>, LedgerError>;
}

impl<T> TransactionHistory for &T
where
    T: TransactionHistory + ?Sized,
{
    fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        (**self).history(account_id)
    }
}

impl<T> TransactionHistory for Arc<T>
where
    T: TransactionHistory + ?Sized,
{
    fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        (**self).history(account_id)
    }
}

/// A rehydrated account plus the events it was built from.
struct LoadedAccount {
    account: Account,
    events: Vec<(AccountEvent, u64)>,
}

impl LoadedAccount {
    fn transactions(&self) -> Vec<Transaction> {
        self.events
            .iter()
            .filter_map(|(event, seq)| Transaction::from_event(event, *seq))
            .collect()
    }

    fn summary(&self) -> AccountSummary {
        AccountSummary {
            account_id: self.account.id_typed(),
            holder_name: self.account.holder_name().to_string(),
            balance: self.account.balance(),
            transaction_count: self.transactions().len(),
        }
    }
}

/// Holder names of every opened account, kept under the registration lock.
///
/// Filled incrementally from the first event of each stream not yet seen, so
/// opening an account never replays histories.
#[derive(Debug, Default)]
struct HolderIndex {
    by_name: HashMap<String, AccountId>,
    seen: HashSet<AccountId>,
}

/// The ledger: sole writer of account balances and transaction history.
///
/// Callers pass an already-resolved `AccountId`; the ledger holds no session state.
#[derive(Debug)]
pub struct Ledger<S, C = SystemClock> {
    store: S,
    clock: C,
    locks: AccountLocks,
    // Serializes account opening so the holder-name uniqueness check and the
    // first append happen together. Deposits and withdrawals never take it.
    registration: Mutex<HolderIndex>,
}

impl<S> Ledger<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S, C> Ledger<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            locks: AccountLocks::new(),
            registration: Mutex::new(HolderIndex::default()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S, C> Ledger<S, C>
where
    S: EventStore,
    C: Clock,
{
    /// Open a new zero-balance account for `holder_name`.
    ///
    /// Holder names are unique across the ledger (after trimming).
    #[instrument(skip(self))]
    pub fn open_account(&self, holder_name: &str) -> Result<AccountId, LedgerError> {
        let holder_name = holder_name.trim();
        if holder_name.is_empty() {
            return Err(LedgerError::Validation("holder name cannot be empty".to_string()));
        }

        let mut holders = self
            .registration
            .lock()
            .map_err(|_| LedgerError::internal("account registration lock poisoned"))?;
        self.refresh_holders(&mut holders)?;

        if holders.by_name.contains_key(holder_name) {
            tracing::warn!(holder_name, "account already exists");
            return Err(LedgerError::AccountExists(holder_name.to_string()));
        }

        let account_id = AccountId::new();
        let command = AccountCommand::OpenAccount(OpenAccount {
            account_id,
            holder_name: holder_name.to_string(),
            occurred_at: self.clock.now(),
        });
        self.locks
            .with_lock(account_id, || self.dispatch(account_id, &command))?;
        holders.seen.insert(account_id);
        holders.by_name.insert(holder_name.to_string(), account_id);

        tracing::info!(%account_id, holder_name, "account opened");
        Ok(account_id)
    }

    /// Credit `amount` to the account and record a `Deposit` transaction.
    pub fn deposit(&self, account_id: AccountId, amount: Money) -> Result<Transaction, LedgerError> {
        self.transact(account_id, amount, TransactionKind::Deposit)
    }

    /// Debit `amount` from the account and record a `Withdraw` transaction.
    ///
    /// Fails with `InsufficientFunds` (and changes nothing) when `amount` exceeds
    /// the current balance.
    pub fn withdraw(&self, account_id: AccountId, amount: Money) -> Result<Transaction, LedgerError> {
        self.transact(account_id, amount, TransactionKind::Withdraw)
    }

    /// Transactions of one account, most recent first.
    #[instrument(skip_all, fields(account_id = %account_id))]
    pub fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        let loaded = self.load_open(account_id)?;
        let mut transactions = loaded.transactions();
        sort_most_recent_first(&mut transactions);
        Ok(transactions)
    }

    pub fn balance(&self, account_id: AccountId) -> Result<Money, LedgerError> {
        Ok(self.load_open(account_id)?.account.balance())
    }

    pub fn account(&self, account_id: AccountId) -> Result<AccountSummary, LedgerError> {
        Ok(self.load_open(account_id)?.summary())
    }

    /// Every account, ordered by holder name.
    ///
    /// Streams that cannot be decoded are logged and left out.
    pub fn list_accounts(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        let mut summaries = Vec::new();
        for account_id in self.store.stream_ids()? {
            let Some(loaded) = self.load_readable(account_id)? else {
                continue;
            };
            if loaded.account.is_open() {
                summaries.push(loaded.summary());
            }
        }
        summaries.sort_by(|a, b| a.holder_name.cmp(&b.holder_name));
        Ok(summaries)
    }

    /// Transactions of every account, most recent first.
    ///
    /// Streams that cannot be decoded are logged and left out.
    pub fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        let mut transactions = Vec::new();
        for account_id in self.store.stream_ids()? {
            if let Some(loaded) = self.load_readable(account_id)? {
                transactions.extend(loaded.transactions());
            }
        }
        sort_most_recent_first(&mut transactions);
        Ok(transactions)
    }

    #[instrument(skip_all, fields(account_id = %account_id, amount = %amount, kind = %kind))]
    fn transact(
        &self,
        account_id: AccountId,
        amount: Money,
        kind: TransactionKind,
    ) -> Result<Transaction, LedgerError> {
        let result = self.locks.with_lock(account_id, || {
            let transaction_id = TransactionId::new();
            let occurred_at = self.clock.now();
            let command = match kind {
                TransactionKind::Deposit => AccountCommand::Deposit(Deposit {
                    account_id,
                    transaction_id,
                    amount,
                    occurred_at,
                }),
                TransactionKind::Withdraw => AccountCommand::Withdraw(Withdraw {
                    account_id,
                    transaction_id,
                    amount,
                    occurred_at,
                }),
            };

            self.dispatch(account_id, &command)?
                .iter()
                .find_map(|(event, seq)| Transaction::from_event(event, *seq))
                .ok_or_else(|| LedgerError::internal("accepted command recorded no transaction"))
        });

        match &result {
            Ok(txn) => tracing::info!(
                transaction_id = %txn.id,
                kind = %txn.kind,
                "transaction committed"
            ),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(error = %err, %kind, "ledger command rejected")
            }
            Err(_) => {}
        }
        result
    }

    /// Load, decide and append. Must be called with the account lock held.
    fn dispatch(
        &self,
        account_id: AccountId,
        command: &AccountCommand,
    ) -> Result<Vec<(AccountEvent, u64)>, LedgerError> {
        let loaded = self.load(account_id)?;
        let expected = match loaded.account.version() {
            0 => ExpectedVersion::NoStream,
            v => ExpectedVersion::Exact(v),
        };

        let decided = loaded
            .account
            .handle(command)
            .map_err(|e| LedgerError::from_domain(e, account_id))?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(account_id, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        if committed.len() != decided.len() {
            return Err(LedgerError::internal(format!(
                "store committed {} of {} events",
                committed.len(),
                decided.len()
            )));
        }

        Ok(decided
            .into_iter()
            .zip(committed.iter().map(StoredEvent::stream_version))
            .collect())
    }

    fn load(&self, account_id: AccountId) -> Result<LoadedAccount, LedgerError> {
        let stream = self.store.load_stream(account_id)?;
        rehydrate(account_id, stream)
    }

    /// Like `load`, but a stream that fails to decode yields `None` instead of an
    /// error. Store failures still propagate.
    fn load_readable(&self, account_id: AccountId) -> Result<Option<LoadedAccount>, LedgerError> {
        let stream = self.store.load_stream(account_id)?;
        // `rehydrate` failures are already logged as internal errors.
        Ok(rehydrate(account_id, stream).ok())
    }

    fn load_open(&self, account_id: AccountId) -> Result<LoadedAccount, LedgerError> {
        let loaded = self.load(account_id)?;
        if !loaded.account.is_open() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        Ok(loaded)
    }

    /// Index the holder of every stream not seen yet, from its first event.
    fn refresh_holders(&self, holders: &mut HolderIndex) -> Result<(), LedgerError> {
        for account_id in self.store.stream_ids()? {
            if holders.seen.contains(&account_id) {
                continue;
            }
            let Some(first) = self.store.first_event(account_id)? else {
                continue;
            };
            holders.seen.insert(account_id);

            match decode::<AccountEvent>(&first) {
                Ok(AccountEvent::AccountOpened(opened)) if opened.account_id == account_id => {
                    holders.by_name.insert(opened.holder_name, account_id);
                }
                Ok(_) => {
                    tracing::warn!(%account_id, "stream does not start with an account opening");
                }
                // Logged by `decode`.
                Err(_) => {}
            }
        }
        Ok(())
    }
}

impl<S, C> TransactionHistory for Ledger<S, C>
where
    S: EventStore,
    C: Clock,
{
    fn history(&self, account_id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        Ledger::history(self, account_id)
    }
}

fn rehydrate(account_id: AccountId, stream: Vec<StoredEvent>) -> Result<LoadedAccount, LedgerError> {
    validate_loaded_stream(account_id, &stream)?;

    let mut account = Account::empty(account_id);
    let mut events = Vec::with_capacity(stream.len());
    for stored in stream {
        let event: AccountEvent = decode(&stored)?;
        account.apply(&event);
        events.push((event, stored.sequence_number));
    }
    Ok(LoadedAccount { account, events })
}

fn decode<E: DeserializeOwned>(stored: &StoredEvent) -> Result<E, LedgerError> {
    serde_json::from_value(stored.payload.clone()).map_err(|e| {
        LedgerError::internal(format!(
            "failed to decode {} at sequence {}: {e}",
            stored.event_type, stored.sequence_number
        ))
    })
}

fn validate_loaded_stream(account_id: AccountId, stream: &[StoredEvent]) -> Result<(), LedgerError> {
    // A corrupted read must never be folded into a balance.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.account_id != account_id {
            return Err(LedgerError::internal(format!(
                "loaded stream for {account_id} contains foreign event at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(LedgerError::internal(format!(
                "non-monotonic sequence_number in stream {account_id} (last={last}, found={})",
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

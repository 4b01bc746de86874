//! Per-account mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use passbook_core::AccountId;

use crate::error::LedgerError;

/// Registry of one mutex per account.
///
/// Mutations of the same account are serialized; different accounts never share
/// a lock. The registry map itself is only held while looking up a handle.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, account_id: AccountId) -> Result<Arc<Mutex<()>>, LedgerError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LedgerError::internal("account lock registry poisoned"))?;
        Ok(locks.entry(account_id).or_default().clone())
    }

    /// Run `f` while holding the account's lock.
    ///
    /// When `f` reports `AccountNotFound` the account's entry is dropped again
    /// (unless another caller holds it), so calls on unknown ids leave no trace.
    pub fn with_lock<T>(
        &self,
        account_id: AccountId,
        f: impl FnOnce() -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let lock = self.handle(account_id)?;
        let result = {
            // The mutex guards no data; account state lives in the store, whose
            // appends are atomic, so a poisoned lock is still safe to reuse.
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        if matches!(result, Err(LedgerError::AccountNotFound(_))) {
            self.release(account_id, lock)?;
        }
        result
    }

    fn release(&self, account_id: AccountId, lock: Arc<Mutex<()>>) -> Result<(), LedgerError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LedgerError::internal("account lock registry poisoned"))?;
        // Handles are only cloned under the registry lock: the map's copy plus
        // ours means no one else is waiting on this account.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&account_id);
        }
        Ok(())
    }

    /// Number of accounts with a registered lock.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_account_is_serialized() {
        let locks = Arc::new(AccountLocks::new());
        let id = AccountId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    locks
                        .with_lock(id, || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(2));
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn not_found_releases_the_entry() {
        let locks = AccountLocks::new();
        for _ in 0..100 {
            let id = AccountId::new();
            let result: Result<(), _> =
                locks.with_lock(id, || Err(LedgerError::AccountNotFound(id)));
            assert_eq!(result.unwrap_err(), LedgerError::AccountNotFound(id));
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn other_failures_keep_the_entry() {
        let locks = AccountLocks::new();
        let id = AccountId::new();
        let result: Result<(), _> =
            locks.with_lock(id, || Err(LedgerError::Validation("nope".to_string())));
        assert!(result.is_err());
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn different_accounts_do_not_block_each_other() {
        let locks = AccountLocks::new();
        let a = AccountId::new();
        let b = AccountId::new();
        let nested = locks.with_lock(a, || locks.with_lock(b, || Ok(42)));
        assert_eq!(nested.unwrap(), 42);
    }
}

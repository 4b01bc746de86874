use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use passbook_core::{AccountId, Money, TransactionId};

use crate::account::AccountEvent;

/// Kind of balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl TransactionKind {
    pub fn label(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdraw => "Withdraw",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable record of a committed deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    /// Always strictly positive.
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
    /// Position in the account's stream; breaks timestamp ties by insertion order.
    pub sequence: u64,
}

impl Transaction {
    /// Derive the transaction record carried by a stored account event.
    ///
    /// Returns `None` for events that do not move money (e.g. `AccountOpened`).
    pub fn from_event(event: &AccountEvent, sequence: u64) -> Option<Self> {
        let (id, account_id, kind, amount, timestamp) = match event {
            AccountEvent::AccountOpened(_) => return None,
            AccountEvent::Deposited(e) => (
                e.transaction_id,
                e.account_id,
                TransactionKind::Deposit,
                e.amount,
                e.occurred_at,
            ),
            AccountEvent::Withdrawn(e) => (
                e.transaction_id,
                e.account_id,
                TransactionKind::Withdraw,
                e.amount,
                e.occurred_at,
            ),
        };
        Some(Self {
            id,
            account_id,
            kind,
            amount,
            timestamp,
            sequence,
        })
    }

    /// Signed effect on the balance.
    pub fn signed_minor_units(&self) -> i128 {
        let amount = self.amount.minor_units() as i128;
        match self.kind {
            TransactionKind::Deposit => amount,
            TransactionKind::Withdraw => -amount,
        }
    }
}

/// Order transactions most recent first.
///
/// Equal timestamps fall back to reverse insertion order, then to the id so the
/// result is total even across accounts.
pub fn sort_most_recent_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.sequence.cmp(&a.sequence))
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountOpened, Deposited, Withdrawn};
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn record(kind: TransactionKind, minute: i64, sequence: u64) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            account_id: AccountId::new(),
            kind,
            amount: Money::from_minor(100),
            timestamp: at(minute),
            sequence,
        }
    }

    #[test]
    fn opened_event_carries_no_transaction() {
        let event = AccountEvent::AccountOpened(AccountOpened {
            account_id: AccountId::new(),
            holder_name: "A".to_string(),
            occurred_at: at(0),
        });
        assert!(Transaction::from_event(&event, 1).is_none());
    }

    #[test]
    fn money_events_map_to_records() {
        let account_id = AccountId::new();
        let deposit = AccountEvent::Deposited(Deposited {
            account_id,
            transaction_id: TransactionId::new(),
            amount: Money::from_minor(700),
            occurred_at: at(1),
        });
        let withdraw = AccountEvent::Withdrawn(Withdrawn {
            account_id,
            transaction_id: TransactionId::new(),
            amount: Money::from_minor(200),
            occurred_at: at(2),
        });

        let d = Transaction::from_event(&deposit, 2).unwrap();
        let w = Transaction::from_event(&withdraw, 3).unwrap();
        assert_eq!(d.kind, TransactionKind::Deposit);
        assert_eq!(w.kind, TransactionKind::Withdraw);
        assert_eq!(d.signed_minor_units() + w.signed_minor_units(), 500);
        assert_eq!(w.sequence, 3);
    }

    #[test]
    fn sorting_is_descending_with_insertion_tiebreak() {
        let mut txns = vec![
            record(TransactionKind::Deposit, 0, 2),
            record(TransactionKind::Withdraw, 5, 3),
            record(TransactionKind::Deposit, 5, 4),
        ];
        sort_most_recent_first(&mut txns);
        let seqs: Vec<u64> = txns.iter().map(|t| t.sequence).collect();
        assert_eq!(seqs, vec![4, 3, 2]);
    }

    #[test]
    fn kind_labels() {
        assert_eq!(TransactionKind::Deposit.to_string(), "Deposit");
        assert_eq!(TransactionKind::Withdraw.to_string(), "Withdraw");
    }
}

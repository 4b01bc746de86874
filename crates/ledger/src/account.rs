use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use passbook_core::{
    AccountId, Aggregate, AggregateRoot, DomainError, Event, Money, TransactionId,
};

/// Aggregate root: Account.
///
/// The balance is never stored independently of history: it is the fold of the
/// account's `Deposited`/`Withdrawn` events, so the two can only change together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    holder_name: String,
    balance: Money,
    version: u64,
    created: bool,
}

impl Account {
    /// Empty, not-yet-opened aggregate for rehydration.
    pub fn empty(id: AccountId) -> Self {
        Self {
            id,
            holder_name: String::new(),
            balance: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn is_open(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenAccount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub account_id: AccountId,
    pub holder_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Withdraw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdraw {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCommand {
    OpenAccount(OpenAccount),
    Deposit(Deposit),
    Withdraw(Withdraw),
}

impl AccountCommand {
    pub fn account_id(&self) -> AccountId {
        match self {
            AccountCommand::OpenAccount(c) => c.account_id,
            AccountCommand::Deposit(c) => c.account_id,
            AccountCommand::Withdraw(c) => c.account_id,
        }
    }
}

/// Event: AccountOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    pub account_id: AccountId,
    pub holder_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Deposited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    AccountOpened(AccountOpened),
    Deposited(Deposited),
    Withdrawn(Withdrawn),
}

impl AccountEvent {
    pub fn account_id(&self) -> AccountId {
        match self {
            AccountEvent::AccountOpened(e) => e.account_id,
            AccountEvent::Deposited(e) => e.account_id,
            AccountEvent::Withdrawn(e) => e.account_id,
        }
    }
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountOpened(_) => "ledger.account.opened",
            AccountEvent::Deposited(_) => "ledger.account.deposited",
            AccountEvent::Withdrawn(_) => "ledger.account.withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::AccountOpened(e) => e.occurred_at,
            AccountEvent::Deposited(e) => e.occurred_at,
            AccountEvent::Withdrawn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::AccountOpened(e) => {
                self.id = e.account_id;
                self.holder_name = e.holder_name.clone();
                self.balance = Money::ZERO;
                self.created = true;
            }
            AccountEvent::Deposited(e) => {
                self.balance = self.balance.saturating_add(e.amount);
            }
            AccountEvent::Withdrawn(e) => {
                self.balance = self.balance.saturating_sub(e.amount);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_account_id(command.account_id())?;
        match command {
            AccountCommand::OpenAccount(cmd) => self.handle_open(cmd),
            AccountCommand::Deposit(cmd) => self.handle_deposit(cmd),
            AccountCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
        }
    }
}

impl Account {
    fn ensure_account_id(&self, account_id: AccountId) -> Result<(), DomainError> {
        if self.id != account_id {
            return Err(DomainError::invariant("account_id mismatch"));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenAccount) -> Result<Vec<AccountEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("account already opened"));
        }
        let holder_name = cmd.holder_name.trim();
        if holder_name.is_empty() {
            return Err(DomainError::validation("holder name cannot be empty"));
        }
        Ok(vec![AccountEvent::AccountOpened(AccountOpened {
            account_id: cmd.account_id,
            holder_name: holder_name.to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deposit(&self, cmd: &Deposit) -> Result<Vec<AccountEvent>, DomainError> {
        self.ensure_open()?;
        let amount = cmd.amount.ensure_positive()?;
        if self.balance.checked_add(amount).is_none() {
            return Err(DomainError::invalid_amount(format!(
                "deposit of {amount} would overflow the balance"
            )));
        }
        Ok(vec![AccountEvent::Deposited(Deposited {
            account_id: cmd.account_id,
            transaction_id: cmd.transaction_id,
            amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &Withdraw) -> Result<Vec<AccountEvent>, DomainError> {
        self.ensure_open()?;
        let amount = cmd.amount.ensure_positive()?;
        if amount > self.balance {
            return Err(DomainError::insufficient_funds(amount, self.balance));
        }
        Ok(vec![AccountEvent::Withdrawn(Withdrawn {
            account_id: cmd.account_id,
            transaction_id: cmd.transaction_id,
            amount,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn opened(id: AccountId) -> Account {
        let mut account = Account::empty(id);
        let events = account
            .handle(&AccountCommand::OpenAccount(OpenAccount {
                account_id: id,
                holder_name: "Charan".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            account.apply(e);
        }
        account
    }

    fn deposit(id: AccountId, minor: i64) -> AccountCommand {
        AccountCommand::Deposit(Deposit {
            account_id: id,
            transaction_id: TransactionId::new(),
            amount: Money::from_minor(minor),
            occurred_at: test_time(),
        })
    }

    fn withdraw(id: AccountId, minor: i64) -> AccountCommand {
        AccountCommand::Withdraw(Withdraw {
            account_id: id,
            transaction_id: TransactionId::new(),
            amount: Money::from_minor(minor),
            occurred_at: test_time(),
        })
    }

    fn execute(account: &mut Account, cmd: &AccountCommand) -> Result<(), DomainError> {
        let events = account.handle(cmd)?;
        for e in &events {
            account.apply(e);
        }
        Ok(())
    }

    #[test]
    fn open_account_emits_event_and_trims_name() {
        let id = AccountId::new();
        let account = Account::empty(id);
        let events = account
            .handle(&AccountCommand::OpenAccount(OpenAccount {
                account_id: id,
                holder_name: "  Charan968 ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[..] {
            [AccountEvent::AccountOpened(e)] => assert_eq!(e.holder_name, "Charan968"),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn blank_holder_name_is_rejected() {
        let id = AccountId::new();
        let err = Account::empty(id)
            .handle(&AccountCommand::OpenAccount(OpenAccount {
                account_id: id,
                holder_name: "   ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn opening_twice_conflicts() {
        let id = AccountId::new();
        let account = opened(id);
        let err = account
            .handle(&AccountCommand::OpenAccount(OpenAccount {
                account_id: id,
                holder_name: "Again".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn commands_on_unopened_account_are_not_found() {
        let id = AccountId::new();
        let err = Account::empty(id).handle(&deposit(id, 100)).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn deposit_then_withdraw_updates_balance() {
        let id = AccountId::new();
        let mut account = opened(id);
        execute(&mut account, &deposit(id, 10_000)).unwrap();
        execute(&mut account, &withdraw(id, 4_000)).unwrap();
        assert_eq!(account.balance(), Money::from_minor(6_000));
        assert_eq!(account.version(), 3);
    }

    #[test]
    fn overdraft_is_rejected_without_events() {
        let id = AccountId::new();
        let mut account = opened(id);
        execute(&mut account, &deposit(id, 10_000)).unwrap();
        let before = account.clone();

        let err = account.handle(&withdraw(id, 15_000)).unwrap_err();
        assert_eq!(
            err,
            DomainError::insufficient_funds(Money::from_minor(15_000), Money::from_minor(10_000))
        );
        assert_eq!(account, before);
    }

    #[test]
    fn withdrawing_exact_balance_is_allowed() {
        let id = AccountId::new();
        let mut account = opened(id);
        execute(&mut account, &deposit(id, 500)).unwrap();
        execute(&mut account, &withdraw(id, 500)).unwrap();
        assert_eq!(account.balance(), Money::ZERO);
    }

    #[test]
    fn non_positive_amounts_are_invalid() {
        let id = AccountId::new();
        let account = opened(id);
        for minor in [0, -1, i64::MIN] {
            assert!(matches!(
                account.handle(&deposit(id, minor)),
                Err(DomainError::InvalidAmount(_))
            ));
            assert!(matches!(
                account.handle(&withdraw(id, minor)),
                Err(DomainError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn deposit_overflow_is_invalid_amount() {
        let id = AccountId::new();
        let mut account = opened(id);
        execute(&mut account, &deposit(id, i64::MAX)).unwrap();
        assert!(matches!(
            account.handle(&deposit(id, 1)),
            Err(DomainError::InvalidAmount(_))
        ));
    }

    #[test]
    fn command_for_another_account_is_rejected() {
        let account = opened(AccountId::new());
        let err = account.handle(&deposit(AccountId::new(), 100)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn events_serialize_with_stable_shape() {
        let id = AccountId::new();
        let event = AccountEvent::Deposited(Deposited {
            account_id: id,
            transaction_id: TransactionId::new(),
            amount: Money::from_minor(2_500),
            occurred_at: test_time(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["Deposited"]["amount"], 2_500);
        let back: AccountEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(event.event_type(), "ledger.account.deposited");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(i64),
        Withdraw(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..1_000_000i64).prop_map(Op::Deposit),
            (1i64..1_500_000i64).prop_map(Op::Withdraw),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after every accepted command the balance equals the sum of
        /// deposit events minus the sum of withdrawal events, and never goes negative.
        #[test]
        fn balance_equals_event_sum(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let id = AccountId::new();
            let mut account = opened(id);
            let mut net: i128 = 0;

            for op in ops {
                let cmd = match op {
                    Op::Deposit(m) => deposit(id, m),
                    Op::Withdraw(m) => withdraw(id, m),
                };
                let before = account.clone();
                match account.handle(&cmd) {
                    Ok(events) => {
                        for e in &events {
                            match e {
                                AccountEvent::Deposited(d) => net += d.amount.minor_units() as i128,
                                AccountEvent::Withdrawn(w) => net -= w.amount.minor_units() as i128,
                                AccountEvent::AccountOpened(_) => {}
                            }
                            account.apply(e);
                        }
                    }
                    Err(DomainError::InsufficientFunds { .. }) => {
                        prop_assert_eq!(&account, &before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
                prop_assert_eq!(account.balance().minor_units() as i128, net);
                prop_assert!(account.balance() >= Money::ZERO);
            }
        }
    }
}

//! Transaction ledger
//!
//! The single write path for expense and income entries. User edits, the
//! recurring scheduler and the loan ledger all go through here, so every
//! mutation is validated the same way and announced to the [`Notifier`].

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::db::{categories, transactions, Database};
use crate::error::{Error, Result};
use crate::models::{system, Direction, NewTransaction, Origin, Transaction, TransactionUpdate};
use crate::notify::{Notifier, TransactionChange};

#[derive(Clone)]
pub struct Ledger {
    db: Database,
    notifier: Arc<Notifier>,
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// The category must be the owner's, active, and (for user entries) match the direction
fn check_category(
    conn: &Connection,
    owner_id: i64,
    category_id: i64,
    direction: Direction,
    origin: Origin,
) -> Result<()> {
    let category = categories::require_category(conn, owner_id, category_id)?;
    if !category.active {
        return Err(Error::validation(format!(
            "category '{}' is inactive",
            category.name
        )));
    }
    if origin == Origin::Manual && category.kind != direction {
        return Err(Error::validation(format!(
            "category '{}' is for {} entries, not {}",
            category.name, category.kind, direction
        )));
    }
    Ok(())
}

impl Ledger {
    pub fn new(db: Database, notifier: Arc<Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Record a new entry in its own unit of work
    pub fn create(&self, tx: NewTransaction) -> Result<Transaction> {
        self.db.with_transaction(|conn| self.create_in(conn, tx))
    }

    /// Record a new entry inside the caller's transaction
    pub fn create_in(&self, conn: &Connection, mut tx: NewTransaction) -> Result<Transaction> {
        ensure_positive(tx.amount)?;
        check_category(conn, tx.owner_id, tx.category_id, tx.direction, tx.origin)?;

        match tx.payment_channel_id {
            Some(channel_id) => {
                categories::require_payment_channel(conn, tx.owner_id, channel_id)?;
            }
            None if tx.direction == Direction::Expense => {
                let cash =
                    categories::lookup_system_payment_channel(conn, tx.owner_id, system::CASH_CHANNEL)?;
                tx.payment_channel_id = Some(cash.id);
            }
            None => {}
        }

        let id = transactions::insert_transaction(conn, &tx)?;
        let created = self.load(conn, tx.owner_id, id)?;

        self.notifier
            .publish(conn, &TransactionChange::created(created.clone()))?;

        debug!(
            transaction_id = id,
            owner_id = created.owner_id,
            category_id = created.category_id,
            amount = %created.amount,
            date = %created.date,
            origin = created.origin.as_str(),
            "Created transaction"
        );
        Ok(created)
    }

    /// Edit amount, category, date or description in its own unit of work
    pub fn update(&self, owner_id: i64, id: i64, update: TransactionUpdate) -> Result<Transaction> {
        self.db
            .with_transaction(|conn| self.update_in(conn, owner_id, id, update))
    }

    pub fn update_in(
        &self,
        conn: &Connection,
        owner_id: i64,
        id: i64,
        update: TransactionUpdate,
    ) -> Result<Transaction> {
        let previous = self.load(conn, owner_id, id)?;
        let mut current = previous.clone();

        if let Some(amount) = update.amount {
            ensure_positive(amount)?;
            current.amount = amount;
        }
        if let Some(category_id) = update.category_id {
            if category_id != previous.category_id {
                check_category(conn, owner_id, category_id, current.direction, current.origin)?;
            }
            current.category_id = category_id;
        }
        if let Some(date) = update.date {
            current.date = date;
        }
        if let Some(description) = update.description {
            current.description = Some(description);
        }

        transactions::update_transaction(conn, &current)?;
        self.notifier
            .publish(conn, &TransactionChange::updated(previous, current.clone()))?;

        info!(transaction_id = id, owner_id, "Updated transaction");
        Ok(current)
    }

    /// Hard-delete an entry in its own unit of work
    pub fn delete(&self, owner_id: i64, id: i64) -> Result<()> {
        self.db
            .with_transaction(|conn| self.delete_in(conn, owner_id, id))
    }

    pub fn delete_in(&self, conn: &Connection, owner_id: i64, id: i64) -> Result<()> {
        let existing = self.load(conn, owner_id, id)?;
        transactions::delete_transaction(conn, owner_id, id)?;
        self.notifier
            .publish(conn, &TransactionChange::deleted(existing))?;

        info!(transaction_id = id, owner_id, "Deleted transaction");
        Ok(())
    }

    pub fn get(&self, owner_id: i64, id: i64) -> Result<Transaction> {
        let conn = self.db.conn()?;
        self.load(&conn, owner_id, id)
    }

    pub fn list(
        &self,
        owner_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        self.db.list_transactions(owner_id, from, to)
    }

    fn load(&self, conn: &Connection, owner_id: i64, id: i64) -> Result<Transaction> {
        transactions::get_transaction(conn, owner_id, id)?
            .ok_or_else(|| Error::not_found(format!("transaction {} for owner {}", id, owner_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::ChangeKind;
    use crate::notify::ChangeHandler;
    use crate::test_utils::{date, money};
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<(ChangeKind, i64)>>,
    }

    impl ChangeHandler for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn on_transaction_changed(&self, _conn: &Connection, change: &TransactionChange) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((change.kind, change.transaction.id));
            Ok(())
        }
    }

    struct Veto;

    impl ChangeHandler for Veto {
        fn name(&self) -> &'static str {
            "veto"
        }

        fn on_transaction_changed(&self, _conn: &Connection, _change: &TransactionChange) -> Result<()> {
            Err(Error::Configuration("nope".into()))
        }
    }

    struct Setup {
        db: Database,
        owner: i64,
        food: i64,
        salary: i64,
    }

    fn setup() -> Setup {
        let db = Database::in_memory().unwrap();
        let owner = db.create_user("ada@example.com", None).unwrap().id;
        let food = db
            .create_category(owner, "Food", Direction::Expense, true)
            .unwrap()
            .id;
        let salary = db
            .create_category(owner, "Salary", Direction::Income, false)
            .unwrap()
            .id;
        Setup {
            db,
            owner,
            food,
            salary,
        }
    }

    fn expense(owner_id: i64, category_id: i64, amount: &str, day: &str) -> NewTransaction {
        NewTransaction {
            owner_id,
            category_id,
            payment_channel_id: None,
            amount: money(amount),
            description: Some("lunch".into()),
            date: date(day),
            direction: Direction::Expense,
            origin: Origin::Manual,
        }
    }

    fn recording_ledger(db: &Database) -> (Ledger, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(vec![]),
        });
        let mut notifier = Notifier::new();
        notifier.subscribe(recorder.clone());
        (Ledger::new(db.clone(), Arc::new(notifier)), recorder)
    }

    #[test]
    fn test_every_mutation_is_published() {
        let s = setup();
        let (ledger, recorder) = recording_ledger(&s.db);

        let tx = ledger
            .create(expense(s.owner, s.food, "12.50", "2024-01-10"))
            .unwrap();
        ledger
            .update(
                s.owner,
                tx.id,
                TransactionUpdate {
                    amount: Some(money("15")),
                    ..Default::default()
                },
            )
            .unwrap();
        ledger.delete(s.owner, tx.id).unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                (ChangeKind::Created, tx.id),
                (ChangeKind::Updated, tx.id),
                (ChangeKind::Deleted, tx.id),
            ]
        );
    }

    #[test]
    fn test_expense_defaults_to_cash_channel() {
        let s = setup();
        let (ledger, _) = recording_ledger(&s.db);
        let cash = s
            .db
            .lookup_system_payment_channel(s.owner, system::CASH_CHANNEL)
            .unwrap();

        let tx = ledger
            .create(expense(s.owner, s.food, "3", "2024-01-10"))
            .unwrap();
        assert_eq!(tx.payment_channel_id, Some(cash.id));

        let mut income = expense(s.owner, s.salary, "1000", "2024-01-31");
        income.direction = Direction::Income;
        let income = ledger.create(income).unwrap();
        assert_eq!(income.payment_channel_id, None);
    }

    #[test]
    fn test_validation_rules() {
        let s = setup();
        let (ledger, recorder) = recording_ledger(&s.db);

        let err = ledger
            .create(expense(s.owner, s.food, "0", "2024-01-10"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Expense filed under an income category
        let err = ledger
            .create(expense(s.owner, s.salary, "5", "2024-01-10"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Another owner's category
        let other = s.db.create_user("bob@example.com", None).unwrap();
        let err = ledger
            .create(expense(other.id, s.food, "5", "2024-01-10"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Inactive category
        s.db.set_category_active(s.owner, s.food, false).unwrap();
        let err = ledger
            .create(expense(s.owner, s.food, "5", "2024-01-10"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_foreign_channel_rejected() {
        let s = setup();
        let (ledger, _) = recording_ledger(&s.db);
        let other = s.db.create_user("bob@example.com", None).unwrap();
        let bobs_card = s.db.create_payment_channel(other.id, "Visa").unwrap();

        let mut tx = expense(s.owner, s.food, "5", "2024-01-10");
        tx.payment_channel_id = Some(bobs_card.id);
        assert_eq!(ledger.create(tx).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_handler_failure_rolls_back_write() {
        let s = setup();
        let mut notifier = Notifier::new();
        notifier.subscribe(Arc::new(Veto));
        let ledger = Ledger::new(s.db.clone(), Arc::new(notifier));

        let err = ledger
            .create(expense(s.owner, s.food, "5", "2024-01-10"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(ledger.list(s.owner, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_update_and_delete_are_owner_scoped() {
        let s = setup();
        let (ledger, _) = recording_ledger(&s.db);
        let other = s.db.create_user("bob@example.com", None).unwrap();
        let tx = ledger
            .create(expense(s.owner, s.food, "5", "2024-01-10"))
            .unwrap();

        let err = ledger
            .update(other.id, tx.id, TransactionUpdate::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            ledger.delete(other.id, tx.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(ledger.get(s.owner, tx.id).is_ok());
    }

    #[test]
    fn test_list_bounds() {
        let s = setup();
        let (ledger, _) = recording_ledger(&s.db);
        for day in ["2024-01-01", "2024-01-15", "2024-02-01"] {
            ledger.create(expense(s.owner, s.food, "1", day)).unwrap();
        }

        let january = ledger
            .list(s.owner, Some(date("2024-01-01")), Some(date("2024-01-31")))
            .unwrap();
        assert_eq!(january.len(), 2);
        assert_eq!(january[0].date, date("2024-01-15"));
    }
}

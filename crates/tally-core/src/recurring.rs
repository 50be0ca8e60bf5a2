//! Recurring transaction scheduler
//!
//! A definition's only scheduling state is `next_run_date`; it is due when
//! that date is on or before today. Each daily tick fires every due auto-pay
//! definition once and advances it by one period. A definition that missed
//! several periods is caught up one occurrence per tick.
//!
//! Every firing is its own unit of work: the ledger write, the schedule
//! advance and the audit row commit together, and a failure only rolls back
//! that one definition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::db::{audit, categories, recurring, users, Database};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::models::{
    system, NewRecurringDefinition, NewTransaction, Origin, RecurringDefinition, RecurringUpdate,
    Transaction,
};

/// Outcome counts of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Due definitions looked at
    pub processed: usize,
    pub fired: usize,
    pub failed: usize,
    /// Due at selection time but already handled, paused or deleted by the time we got to it
    pub skipped: usize,
}

/// Why a definition fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Tick,
    RunNow,
    Resume,
}

impl Trigger {
    fn action(&self) -> &'static str {
        match self {
            Self::Tick => "recurring.fire",
            Self::RunNow => "recurring.run_now",
            Self::Resume => "recurring.resume",
        }
    }
}

/// Clears the in-process tick flag when a tick finishes (or unwinds)
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct Scheduler {
    db: Database,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
    ticking: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(db: Database, ledger: Ledger, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            ledger,
            clock,
            ticking: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a definition filed under the owner's "Recurring Payments" category.
    ///
    /// A first run date in the past is moved to tomorrow.
    pub fn create_definition(
        &self,
        owner_id: i64,
        new: NewRecurringDefinition,
    ) -> Result<RecurringDefinition> {
        let title = validate_title(&new.title)?;
        validate_amount(new.amount)?;

        let today = self.clock.today();
        let next_run_date = if new.next_run_date < today {
            let tomorrow = today.succ_opt().ok_or_else(|| {
                Error::InvalidData(format!("no calendar day after {}", today))
            })?;
            debug!(requested = %new.next_run_date, clamped = %tomorrow, "Clamped first run date");
            tomorrow
        } else {
            new.next_run_date
        };

        let def = self.db.with_transaction(|conn| {
            users::require_user(conn, owner_id)?;
            let category =
                categories::lookup_system_category(conn, owner_id, system::RECURRING_CATEGORY)?;
            let mut def = RecurringDefinition {
                id: 0,
                owner_id,
                category_id: category.id,
                title,
                amount: new.amount,
                direction: new.direction,
                frequency: new.frequency,
                next_run_date,
                auto_pay: new.auto_pay,
            };
            def.id = recurring::insert_definition(conn, &def)?;
            Ok(def)
        })?;

        info!(
            definition_id = def.id,
            owner_id,
            frequency = def.frequency.as_str(),
            next_run_date = %def.next_run_date,
            auto_pay = def.auto_pay,
            "Created recurring definition"
        );
        Ok(def)
    }

    /// Edit a definition. A next run date in the past is moved to today.
    pub fn update_definition(
        &self,
        owner_id: i64,
        id: i64,
        update: RecurringUpdate,
    ) -> Result<RecurringDefinition> {
        let today = self.clock.today();

        self.db.with_transaction(|conn| {
            let mut def = load(conn, owner_id, id)?;
            if let Some(title) = update.title {
                def.title = validate_title(&title)?;
            }
            if let Some(amount) = update.amount {
                validate_amount(amount)?;
                def.amount = amount;
            }
            if let Some(direction) = update.direction {
                def.direction = direction;
            }
            if let Some(frequency) = update.frequency {
                def.frequency = frequency;
            }
            if let Some(next_run_date) = update.next_run_date {
                def.next_run_date = next_run_date.max(today);
            }
            if let Some(auto_pay) = update.auto_pay {
                def.auto_pay = auto_pay;
            }

            recurring::update_definition(conn, &def)?;
            info!(definition_id = id, owner_id, next_run_date = %def.next_run_date, "Updated recurring definition");
            Ok(def)
        })
    }

    pub fn delete_definition(&self, owner_id: i64, id: i64) -> Result<()> {
        self.db.with_transaction(|conn| {
            load(conn, owner_id, id)?;
            recurring::delete_definition(conn, owner_id, id)
        })?;
        info!(definition_id = id, owner_id, "Deleted recurring definition");
        Ok(())
    }

    pub fn get_definition(&self, owner_id: i64, id: i64) -> Result<RecurringDefinition> {
        let conn = self.db.conn()?;
        load(&conn, owner_id, id)
    }

    pub fn list_definitions(&self, owner_id: i64) -> Result<Vec<RecurringDefinition>> {
        self.db.list_definitions(owner_id)
    }

    /// Stop automatic firing. The schedule itself is left untouched.
    pub fn pause(&self, owner_id: i64, id: i64) -> Result<RecurringDefinition> {
        let def = self.db.with_transaction(|conn| {
            let mut def = load(conn, owner_id, id)?;
            recurring::set_auto_pay(conn, id, false)?;
            def.auto_pay = false;
            Ok(def)
        })?;
        info!(definition_id = id, owner_id, "Paused recurring definition");
        Ok(def)
    }

    /// Fire once now, turn auto-pay back on and advance the schedule
    pub fn resume(&self, owner_id: i64, id: i64) -> Result<(RecurringDefinition, Transaction)> {
        self.fire_manually(owner_id, id, Trigger::Resume)
    }

    /// Fire once now regardless of auto-pay, then enable auto-pay and advance the schedule
    pub fn run_now(&self, owner_id: i64, id: i64) -> Result<(RecurringDefinition, Transaction)> {
        self.fire_manually(owner_id, id, Trigger::RunNow)
    }

    fn fire_manually(
        &self,
        owner_id: i64,
        id: i64,
        trigger: Trigger,
    ) -> Result<(RecurringDefinition, Transaction)> {
        let today = self.clock.today();

        let (def, tx) = self.db.with_transaction(|conn| {
            let def = load(conn, owner_id, id)?;
            let owner = users::require_user(conn, owner_id)?;
            let (mut def, tx) = self
                .fire(conn, def, today, &owner.email, trigger)?
                .ok_or_else(|| {
                    Error::validation(format!("recurring definition {} changed while firing", id))
                })?;
            if !def.auto_pay {
                recurring::set_auto_pay(conn, id, true)?;
                def.auto_pay = true;
            }
            Ok((def, tx))
        })?;

        info!(
            definition_id = id,
            owner_id,
            transaction_id = tx.id,
            next_run_date = %def.next_run_date,
            "Recurring definition fired ({})",
            trigger.action()
        );
        Ok((def, tx))
    }

    /// The daily tick: fire every auto-pay definition due on or before `today`.
    ///
    /// Failures are isolated per definition and only counted. A tick that
    /// starts while another is still running returns an empty report.
    pub fn process_due_definitions(&self, today: NaiveDate) -> Result<TickReport> {
        if self
            .ticking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(%today, "Tick already in progress, skipping");
            return Ok(TickReport::default());
        }
        let _guard = TickGuard(&self.ticking);

        let due = {
            let conn = self.db.conn()?;
            recurring::due_definition_ids(&conn, today)?
        };
        info!(%today, due = due.len(), "Processing due recurring definitions");

        let mut report = TickReport::default();
        for id in due {
            report.processed += 1;
            match self.fire_due(id, today) {
                Ok(Some(tx)) => {
                    report.fired += 1;
                    debug!(definition_id = id, transaction_id = tx.id, "Fired recurring definition");
                }
                Ok(None) => {
                    report.skipped += 1;
                    debug!(definition_id = id, "Recurring definition no longer due");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(definition_id = id, kind = ?e.kind(), "Recurring definition failed: {}", e);
                }
            }
        }

        info!(
            %today,
            processed = report.processed,
            fired = report.fired,
            failed = report.failed,
            skipped = report.skipped,
            "Tick complete"
        );
        Ok(report)
    }

    /// Fire one due definition in its own unit of work.
    ///
    /// Returns `None` when the definition stopped being due since selection.
    fn fire_due(&self, id: i64, today: NaiveDate) -> Result<Option<Transaction>> {
        self.db.with_transaction(|conn| {
            let def = match recurring::get_definition_any_owner(conn, id)? {
                Some(def) if def.auto_pay && def.next_run_date <= today => def,
                _ => return Ok(None),
            };
            // The entry is dated at the occurrence it covers
            let occurrence = def.next_run_date;
            let fired = self.fire(conn, def, occurrence, audit::SCHEDULER_ACTOR, Trigger::Tick)?;
            Ok(fired.map(|(_, tx)| tx))
        })
    }

    /// Claim the current occurrence, write the ledger entry and audit it.
    ///
    /// Returns `None` if another writer already claimed this occurrence.
    fn fire(
        &self,
        conn: &Connection,
        mut def: RecurringDefinition,
        entry_date: NaiveDate,
        actor: &str,
        trigger: Trigger,
    ) -> Result<Option<(RecurringDefinition, Transaction)>> {
        let prior = def.next_run_date;
        let next = def.frequency.advance(prior)?;
        if !recurring::claim_occurrence(conn, def.id, prior, next)? {
            return Ok(None);
        }
        def.next_run_date = next;

        let category =
            categories::lookup_system_category(conn, def.owner_id, system::RECURRING_CATEGORY)?;
        let channel =
            categories::lookup_system_payment_channel(conn, def.owner_id, system::AUTO_PAY_CHANNEL)?;

        let tx = self.ledger.create_in(
            conn,
            NewTransaction {
                owner_id: def.owner_id,
                category_id: category.id,
                payment_channel_id: Some(channel.id),
                amount: def.amount,
                description: Some(def.title.clone()),
                date: entry_date,
                direction: def.direction,
                origin: Origin::Recurring,
            },
        )?;

        let details = serde_json::json!({
            "transaction_id": tx.id,
            "occurrence": prior,
            "next_run_date": next,
            "amount": def.amount.to_string(),
            "direction": def.direction.as_str(),
        })
        .to_string();
        audit::log_audit(
            conn,
            actor,
            trigger.action(),
            Some("recurring_definition"),
            Some(def.id),
            Some(&details),
        )?;

        Ok(Some((def, tx)))
    }
}

fn load(conn: &Connection, owner_id: i64, id: i64) -> Result<RecurringDefinition> {
    recurring::get_definition(conn, owner_id, id)?.ok_or_else(|| {
        Error::not_found(format!("recurring definition {} for owner {}", id, owner_id))
    })
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::validation("recurring definition title cannot be empty"));
    }
    Ok(title.to_string())
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "recurring amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

//! Loan installment ledger
//!
//! Payments move a loan's remaining balance and open/closed state:
//! - record: `remaining -= amount`, clamped at zero, closing the loan when it hits zero
//! - reverse: `remaining += amount` (capped at the original amount), reopening a closed loan
//! - re-terms: keeps what was already paid and recomputes what is left
//!
//! Recording a payment also writes one ledger entry through [`Ledger`], so
//! "Loan Payments" budgets stay in step.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::info;

use crate::db::{audit, categories, loans, users, Database};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::models::{
    add_money, system, Direction, Installment, Loan, LoanStatus, LoanSummary, LoanType, LoanUpdate,
    NewLoan, NewPayment, NewTransaction, Origin,
};

#[derive(Clone)]
pub struct LoanLedger {
    db: Database,
    ledger: Ledger,
}

impl LoanLedger {
    pub fn new(db: Database, ledger: Ledger) -> Self {
        Self { db, ledger }
    }

    pub fn create_loan(&self, owner_id: i64, new: NewLoan) -> Result<Loan> {
        let counterparty = new.counterparty.trim();
        if counterparty.is_empty() {
            return Err(Error::validation("counterparty cannot be empty"));
        }
        ensure_positive("loan amount", new.original_amount)?;
        validate_terms(new.start_date, new.due_date, new.interest_rate)?;

        let new = NewLoan {
            counterparty: counterparty.to_string(),
            ..new
        };
        let loan = self.db.with_transaction(|conn| {
            users::require_user(conn, owner_id)?;
            let id = loans::insert_loan(conn, owner_id, &new)?;
            load(conn, owner_id, id)
        })?;

        info!(
            loan_id = loan.id,
            owner_id,
            loan_type = loan.loan_type.as_str(),
            amount = %loan.original_amount,
            "Created loan"
        );
        Ok(loan)
    }

    /// Edit a loan's terms.
    ///
    /// A new original amount keeps the amount already paid and recomputes the
    /// remaining balance from it, closing the loan if nothing is left.
    pub fn update_loan(&self, owner_id: i64, id: i64, update: LoanUpdate) -> Result<Loan> {
        self.db.with_transaction(|conn| {
            let mut loan = load(conn, owner_id, id)?;

            if let Some(counterparty) = update.counterparty {
                let counterparty = counterparty.trim();
                if counterparty.is_empty() {
                    return Err(Error::validation("counterparty cannot be empty"));
                }
                loan.counterparty = counterparty.to_string();
            }
            if let Some(due_date) = update.due_date {
                loan.due_date = Some(due_date);
            }
            if let Some(rate) = update.interest_rate {
                loan.interest_rate = Some(rate);
            }
            if let Some(notes) = update.notes {
                loan.notes = Some(notes);
            }
            validate_terms(loan.start_date, loan.due_date, loan.interest_rate)?;

            if let Some(new_amount) = update.original_amount {
                ensure_positive("loan amount", new_amount)?;
                let paid_so_far = loan.paid_so_far();
                loan.original_amount = new_amount;
                loan.remaining_amount = (new_amount - paid_so_far).max(Decimal::ZERO);
                loan.status = status_for(loan.remaining_amount);
                info!(
                    loan_id = id,
                    paid_so_far = %paid_so_far,
                    remaining = %loan.remaining_amount,
                    "Loan re-termed"
                );
            }

            loans::save_loan(conn, &loan)?;
            Ok(loan)
        })
    }

    /// Apply a payment against an active loan and record its ledger entry
    pub fn record_payment(
        &self,
        owner_id: i64,
        loan_id: i64,
        payment: NewPayment,
    ) -> Result<(Loan, Installment)> {
        ensure_positive("payment amount", payment.amount)?;

        let (loan, installment) = self.db.with_transaction(|conn| {
            let mut loan = load(conn, owner_id, loan_id)?;
            if loan.status == LoanStatus::Closed {
                return Err(Error::validation(format!(
                    "loan {} is closed and cannot take payments",
                    loan_id
                )));
            }
            let owner = users::require_user(conn, owner_id)?;

            let channel_id = match payment.payment_channel_id {
                Some(id) => categories::require_payment_channel(conn, owner_id, id)?.id,
                None => {
                    categories::lookup_system_payment_channel(conn, owner_id, system::CASH_CHANNEL)?
                        .id
                }
            };

            let entry = self.ledger.create_in(conn, ledger_entry(conn, &loan, &payment, channel_id)?)?;
            let installment_id =
                loans::insert_installment(conn, loan.id, &payment, Some(channel_id), Some(entry.id))?;

            if payment.amount >= loan.remaining_amount {
                loan.remaining_amount = Decimal::ZERO;
                loan.status = LoanStatus::Closed;
            } else {
                loan.remaining_amount -= payment.amount;
            }
            loans::save_loan(conn, &loan)?;

            let details = serde_json::json!({
                "installment_id": installment_id,
                "transaction_id": entry.id,
                "amount": payment.amount.to_string(),
                "remaining": loan.remaining_amount.to_string(),
            })
            .to_string();
            audit::log_audit(
                conn,
                &owner.email,
                "loan.payment",
                Some("loan"),
                Some(loan.id),
                Some(&details),
            )?;

            let installment = loans::get_installment(conn, loan.id, installment_id)?
                .ok_or_else(|| Error::not_found(format!("installment {}", installment_id)))?;
            Ok((loan, installment))
        })?;

        info!(
            loan_id,
            owner_id,
            installment_id = installment.id,
            amount = %installment.amount_paid,
            remaining = %loan.remaining_amount,
            status = loan.status.as_str(),
            "Recorded loan payment"
        );
        Ok((loan, installment))
    }

    /// Undo a payment, reopening the loan if it had been closed.
    ///
    /// The ledger entry written for the payment is left in place.
    pub fn reverse_payment(&self, owner_id: i64, loan_id: i64, installment_id: i64) -> Result<Loan> {
        let loan = self.db.with_transaction(|conn| {
            let mut loan = load(conn, owner_id, loan_id)?;
            let installment = loans::get_installment(conn, loan_id, installment_id)?.ok_or_else(
                || Error::not_found(format!("installment {} of loan {}", installment_id, loan_id)),
            )?;
            let owner = users::require_user(conn, owner_id)?;

            loans::delete_installment(conn, installment.id)?;
            // Compare against what was paid so the sum never exceeds the original amount
            loan.remaining_amount = if installment.amount_paid >= loan.paid_so_far() {
                loan.original_amount
            } else {
                loan.remaining_amount + installment.amount_paid
            };
            if loan.status == LoanStatus::Closed && loan.remaining_amount > Decimal::ZERO {
                loan.status = LoanStatus::Active;
            }
            loans::save_loan(conn, &loan)?;

            let details = serde_json::json!({
                "installment_id": installment.id,
                "transaction_id": installment.ledger_transaction_id,
                "amount": installment.amount_paid.to_string(),
                "remaining": loan.remaining_amount.to_string(),
            })
            .to_string();
            audit::log_audit(
                conn,
                &owner.email,
                "loan.reverse_payment",
                Some("loan"),
                Some(loan.id),
                Some(&details),
            )?;
            Ok(loan)
        })?;

        info!(
            loan_id,
            owner_id,
            installment_id,
            remaining = %loan.remaining_amount,
            status = loan.status.as_str(),
            "Reversed loan payment"
        );
        Ok(loan)
    }

    /// Close a fully paid loan
    pub fn close_loan(&self, owner_id: i64, id: i64) -> Result<Loan> {
        self.db.with_transaction(|conn| {
            let mut loan = load(conn, owner_id, id)?;
            if loan.remaining_amount != Decimal::ZERO {
                return Err(Error::validation(format!(
                    "loan {} still has {} outstanding",
                    id, loan.remaining_amount
                )));
            }
            loan.status = LoanStatus::Closed;
            loans::save_loan(conn, &loan)?;
            info!(loan_id = id, owner_id, "Closed loan");
            Ok(loan)
        })
    }

    /// Delete a loan that has no payment history
    pub fn delete_loan(&self, owner_id: i64, id: i64) -> Result<()> {
        self.db.with_transaction(|conn| {
            load(conn, owner_id, id)?;
            let installments = loans::count_installments(conn, id)?;
            if installments > 0 {
                return Err(Error::validation(format!(
                    "loan {} has {} recorded payment(s) and cannot be deleted",
                    id, installments
                )));
            }
            loans::delete_loan(conn, owner_id, id)
        })?;
        info!(loan_id = id, owner_id, "Deleted loan");
        Ok(())
    }

    pub fn get_loan(&self, owner_id: i64, id: i64) -> Result<Loan> {
        let conn = self.db.conn()?;
        load(&conn, owner_id, id)
    }

    pub fn list_loans(&self, owner_id: i64, include_closed: bool) -> Result<Vec<Loan>> {
        self.db.list_loans(owner_id, include_closed)
    }

    pub fn list_installments(&self, owner_id: i64, loan_id: i64) -> Result<Vec<Installment>> {
        let conn = self.db.conn()?;
        load(&conn, owner_id, loan_id)?;
        loans::list_installments(&conn, loan_id)
    }

    /// Totals across every loan of the owner, open or closed
    pub fn loan_summary(&self, owner_id: i64) -> Result<LoanSummary> {
        let mut summary = LoanSummary::default();
        for loan in self.db.list_loans(owner_id, true)? {
            match loan.loan_type {
                LoanType::Taken => {
                    summary.total_taken = add_money(summary.total_taken, loan.original_amount)?;
                    summary.total_paid_on_taken =
                        add_money(summary.total_paid_on_taken, loan.paid_so_far())?;
                }
                LoanType::Given => {
                    summary.total_given = add_money(summary.total_given, loan.original_amount)?;
                    summary.total_received_on_given =
                        add_money(summary.total_received_on_given, loan.paid_so_far())?;
                }
            }
            summary.total_outstanding = add_money(summary.total_outstanding, loan.remaining_amount)?;
        }
        Ok(summary)
    }
}

/// The expense (borrowed) or income (lent) entry that mirrors a payment
fn ledger_entry(
    conn: &Connection,
    loan: &Loan,
    payment: &NewPayment,
    channel_id: i64,
) -> Result<NewTransaction> {
    let (category_name, direction, description) = match loan.loan_type {
        LoanType::Taken => (
            system::LOAN_PAYMENTS_CATEGORY,
            Direction::Expense,
            format!("Installment for loan with {}", loan.counterparty),
        ),
        LoanType::Given => (
            system::LOAN_REPAYMENTS_CATEGORY,
            Direction::Income,
            format!("Repayment from {}", loan.counterparty),
        ),
    };
    let category = categories::lookup_system_category(conn, loan.owner_id, category_name)?;

    Ok(NewTransaction {
        owner_id: loan.owner_id,
        category_id: category.id,
        payment_channel_id: Some(channel_id),
        amount: payment.amount,
        description: Some(description),
        date: payment.date,
        direction,
        origin: Origin::LoanInstallment,
    })
}

fn status_for(remaining: Decimal) -> LoanStatus {
    if remaining == Decimal::ZERO {
        LoanStatus::Closed
    } else {
        LoanStatus::Active
    }
}

fn load(conn: &Connection, owner_id: i64, id: i64) -> Result<Loan> {
    loans::get_loan(conn, owner_id, id)?
        .ok_or_else(|| Error::not_found(format!("loan {} for owner {}", id, owner_id)))
}

fn ensure_positive(what: &str, amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "{} must be positive, got {}",
            what, amount
        )));
    }
    Ok(())
}

fn validate_terms(
    start: Option<NaiveDate>,
    due: Option<NaiveDate>,
    interest_rate: Option<Decimal>,
) -> Result<()> {
    if let (Some(start), Some(due)) = (start, due) {
        if due < start {
            return Err(Error::validation(format!(
                "due date {} is before start date {}",
                due, start
            )));
        }
    }
    if let Some(rate) = interest_rate {
        if rate < Decimal::ZERO {
            return Err(Error::validation(format!(
                "interest rate cannot be negative, got {}",
                rate
            )));
        }
    }
    Ok(())
}

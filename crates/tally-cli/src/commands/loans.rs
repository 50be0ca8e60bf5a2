//! Loan command implementations

use anyhow::Result;
use tally_core::models::{LoanStatus, LoanType, LoanUpdate, NewLoan, NewPayment, User};
use tally_core::Tally;

use super::{print_json, truncate};

pub fn cmd_loans_list(tally: &Tally, owner: &User, include_closed: bool, json: bool) -> Result<()> {
    let loans = tally.loans().list_loans(owner.id, include_closed)?;
    if json {
        return print_json(&loans);
    }

    if loans.is_empty() {
        println!("No loans. Record one with:");
        println!("  tally loans add \"Alex\" 1000 --type taken");
        return Ok(());
    }

    println!();
    println!("🤝 Loans");
    println!("   ─────────────────────────────────────────────────────────────");
    for loan in loans {
        let direction = match loan.loan_type {
            LoanType::Taken => "from",
            LoanType::Given => "to",
        };
        let status = match loan.status {
            LoanStatus::Active => "\x1b[33mACTIVE\x1b[0m",
            LoanStatus::Closed => "\x1b[90mCLOSED\x1b[0m",
        };
        println!(
            "   [{:>3}] {} {:<4} {:<20} │ ${:>9.2} of ${:>9.2} left │ {}{}",
            loan.id,
            loan.loan_type,
            direction,
            truncate(&loan.counterparty, 20),
            loan.remaining_amount,
            loan.original_amount,
            status,
            loan.due_date
                .map(|d| format!(" │ due {}", d))
                .unwrap_or_default()
        );
    }

    Ok(())
}

pub fn cmd_loans_add(tally: &Tally, owner: &User, new: NewLoan) -> Result<()> {
    let loan = tally.loans().create_loan(owner.id, new)?;
    println!(
        "✅ Recorded {} loan with {} for ${:.2} (id: {})",
        loan.loan_type, loan.counterparty, loan.original_amount, loan.id
    );
    Ok(())
}

pub fn cmd_loans_edit(tally: &Tally, owner: &User, id: i64, update: LoanUpdate) -> Result<()> {
    let loan = tally.loans().update_loan(owner.id, id, update)?;
    println!(
        "✅ Updated loan {}: ${:.2} of ${:.2} left ({})",
        loan.id, loan.remaining_amount, loan.original_amount, loan.status
    );
    Ok(())
}

pub fn cmd_loans_pay(tally: &Tally, owner: &User, id: i64, payment: NewPayment) -> Result<()> {
    let (loan, installment) = tally.loans().record_payment(owner.id, id, payment)?;
    println!(
        "✅ Recorded payment {} of ${:.2} on {}",
        installment.id, installment.amount_paid, installment.payment_date
    );
    println!("   Remaining: ${:.2}", loan.remaining_amount);
    if loan.status == LoanStatus::Closed {
        println!("   🎉 Loan with {} is fully paid and closed", loan.counterparty);
    }
    Ok(())
}

pub fn cmd_loans_installments(tally: &Tally, owner: &User, id: i64, json: bool) -> Result<()> {
    let installments = tally.loans().list_installments(owner.id, id)?;
    if json {
        return print_json(&installments);
    }

    if installments.is_empty() {
        println!("No payments recorded for loan {}.", id);
        return Ok(());
    }

    println!();
    println!("📒 Installments for loan {}", id);
    println!("   ─────────────────────────────────────────────────────────────");
    for i in installments {
        println!(
            "   [{:>3}] {} │ ${:>9.2} │ {}",
            i.id,
            i.payment_date,
            i.amount_paid,
            truncate(i.notes.as_deref().unwrap_or(""), 30)
        );
    }

    Ok(())
}

pub fn cmd_loans_reverse(tally: &Tally, owner: &User, loan_id: i64, installment_id: i64) -> Result<()> {
    let loan = tally
        .loans()
        .reverse_payment(owner.id, loan_id, installment_id)?;
    println!(
        "✅ Reversed installment {}: ${:.2} of ${:.2} left ({})",
        installment_id, loan.remaining_amount, loan.original_amount, loan.status
    );
    println!("   The matching ledger transaction was kept; delete it separately if needed.");
    Ok(())
}

pub fn cmd_loans_close(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    let loan = tally.loans().close_loan(owner.id, id)?;
    println!("✅ Closed loan with {}", loan.counterparty);
    Ok(())
}

pub fn cmd_loans_delete(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    tally.loans().delete_loan(owner.id, id)?;
    println!("✅ Deleted loan {}", id);
    Ok(())
}

pub fn cmd_loans_summary(tally: &Tally, owner: &User, json: bool) -> Result<()> {
    let summary = tally.loans().loan_summary(owner.id)?;
    if json {
        return print_json(&summary);
    }

    println!();
    println!("🤝 Loan Summary");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Borrowed:           ${:>10.2}", summary.total_taken);
    println!("   Repaid so far:      ${:>10.2}", summary.total_paid_on_taken);
    println!("   Lent:               ${:>10.2}", summary.total_given);
    println!("   Received so far:    ${:>10.2}", summary.total_received_on_given);
    println!("   Outstanding:        ${:>10.2}", summary.total_outstanding);

    Ok(())
}

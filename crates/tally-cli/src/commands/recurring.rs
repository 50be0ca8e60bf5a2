//! Recurring payment command implementations

use anyhow::Result;
use chrono::NaiveDate;
use tally_core::models::{NewRecurringDefinition, RecurringUpdate, Transaction, User};
use tally_core::{Tally, TickReport};

use super::{format_amount, print_json, truncate};
use crate::scheduler::refresh_derived;

pub fn cmd_recurring_list(tally: &Tally, owner: &User, json: bool) -> Result<()> {
    let defs = tally.scheduler().list_definitions(owner.id)?;
    if json {
        return print_json(&defs);
    }

    if defs.is_empty() {
        println!("No recurring payments. Create one with:");
        println!("  tally recurring add Rent 1200 --frequency monthly --next 2024-04-01");
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Payments");
    println!("   ─────────────────────────────────────────────────────────────");
    for d in defs {
        println!(
            "   [{:>3}] {:<24} │ {:>20} │ {:<8} │ next {} │ {}",
            d.id,
            truncate(&d.title, 24),
            format_amount(d.amount, d.direction),
            d.frequency,
            d.next_run_date,
            if d.auto_pay { "auto-pay" } else { "paused" }
        );
    }

    Ok(())
}

pub fn cmd_recurring_add(tally: &Tally, owner: &User, new: NewRecurringDefinition) -> Result<()> {
    let requested = new.next_run_date;
    let def = tally.scheduler().create_definition(owner.id, new)?;

    println!("✅ Created recurring payment '{}' (id: {})", def.title, def.id);
    if def.next_run_date != requested {
        println!(
            "   ⚠️  {} is in the past; first run moved to {}",
            requested, def.next_run_date
        );
    } else {
        println!("   First run: {}", def.next_run_date);
    }
    Ok(())
}

pub fn cmd_recurring_edit(
    tally: &Tally,
    owner: &User,
    id: i64,
    update: RecurringUpdate,
) -> Result<()> {
    let def = tally.scheduler().update_definition(owner.id, id, update)?;
    println!(
        "✅ Updated recurring payment {}: next run {}",
        def.id, def.next_run_date
    );
    Ok(())
}

pub fn cmd_recurring_pause(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    let def = tally.scheduler().pause(owner.id, id)?;
    println!("⏸️  Paused recurring payment '{}'", def.title);
    Ok(())
}

fn print_fired(title: &str, tx: &Transaction, next: NaiveDate) {
    println!(
        "✅ '{}' fired: transaction {} for {} on {}",
        title,
        tx.id,
        format_amount(tx.amount, tx.direction),
        tx.date
    );
    println!("   Next run: {}", next);
}

pub fn cmd_recurring_resume(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    let (def, tx) = tally.scheduler().resume(owner.id, id)?;
    print_fired(&def.title, &tx, def.next_run_date);
    Ok(())
}

pub fn cmd_recurring_run_now(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    let (def, tx) = tally.scheduler().run_now(owner.id, id)?;
    print_fired(&def.title, &tx, def.next_run_date);
    Ok(())
}

pub fn cmd_recurring_delete(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    tally.scheduler().delete_definition(owner.id, id)?;
    println!("✅ Deleted recurring payment {}", id);
    Ok(())
}

/// Run a single tick across all users.
///
/// With an explicit `today` the whole tick runs as of that day, so budget and
/// goal statuses touched by it are judged against `today` too.
pub fn cmd_tick(tally: &Tally, today: Option<NaiveDate>, json: bool) -> Result<TickReport> {
    let tally = match today {
        Some(day) => tally.as_of(day),
        None => tally.clone(),
    };
    let today = tally.clock().today();
    let report = tally.scheduler().process_due_definitions(today)?;
    refresh_derived(&tally);

    if json {
        print_json(&report)?;
    } else {
        println!("⏱️  Tick for {}", today);
        println!(
            "   {} due, {} fired, {} failed, {} skipped",
            report.processed, report.fired, report.failed, report.skipped
        );
    }

    Ok(report)
}

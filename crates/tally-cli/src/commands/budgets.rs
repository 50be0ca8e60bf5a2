//! Budget command implementations

use anyhow::Result;
use tally_core::models::{Budget, BudgetStatus, BudgetUpdate, NewBudget, User};
use tally_core::Tally;

use super::transactions::category_names;
use super::{print_json, truncate};

fn status_badge(status: BudgetStatus) -> &'static str {
    match status {
        BudgetStatus::Active => "\x1b[32mACTIVE\x1b[0m",
        BudgetStatus::OverBudget => "\x1b[31mOVER\x1b[0m",
        BudgetStatus::Completed => "\x1b[90mDONE\x1b[0m",
    }
}

fn print_budgets(tally: &Tally, owner: &User, budgets: &[Budget]) -> Result<()> {
    let names = category_names(tally, owner)?;

    println!();
    println!("💰 Budgets");
    println!("   ─────────────────────────────────────────────────────────────");
    for b in budgets {
        let category = names.get(&b.category_id).map(String::as_str).unwrap_or("?");
        println!(
            "   [{:>3}] {:<20} {} → {} │ ${:>9.2} of ${:>9.2} │ ${:>9.2} left │ {}",
            b.id,
            truncate(category, 20),
            b.start_date,
            b.end_date,
            b.spent_amount,
            b.amount,
            b.remaining_amount,
            status_badge(b.status)
        );
    }
    Ok(())
}

pub fn cmd_budgets_list(tally: &Tally, owner: &User, json: bool) -> Result<()> {
    let budgets = tally.budgets().list_budgets(owner.id)?;
    if json {
        return print_json(&budgets);
    }

    if budgets.is_empty() {
        println!("No budgets yet. Create one with:");
        println!("  tally budgets add 400 --category <id> --start 2024-03-01 --end 2024-03-31");
        return Ok(());
    }

    print_budgets(tally, owner, &budgets)
}

pub fn cmd_budgets_add(tally: &Tally, owner: &User, new: NewBudget) -> Result<()> {
    let budget = tally.budgets().create_budget(owner.id, new)?;
    println!(
        "✅ Created budget {}: ${:.2} spent of ${:.2} ({})",
        budget.id, budget.spent_amount, budget.amount, budget.status
    );
    Ok(())
}

pub fn cmd_budgets_edit(tally: &Tally, owner: &User, id: i64, update: BudgetUpdate) -> Result<()> {
    let budget = tally.budgets().update_budget(owner.id, id, update)?;
    println!(
        "✅ Updated budget {}: ${:.2} spent of ${:.2} ({})",
        budget.id, budget.spent_amount, budget.amount, budget.status
    );
    Ok(())
}

pub fn cmd_budgets_delete(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    tally.budgets().delete_budget(owner.id, id)?;
    println!("✅ Deleted budget {}", id);
    Ok(())
}

pub fn cmd_budgets_refresh(tally: &Tally, owner: &User, json: bool) -> Result<()> {
    let budgets = tally.budgets().recalculate_all(owner.id)?;
    if json {
        return print_json(&budgets);
    }

    println!("🔄 Recalculated {} budget(s)", budgets.len());
    if !budgets.is_empty() {
        print_budgets(tally, owner, &budgets)?;
    }
    Ok(())
}

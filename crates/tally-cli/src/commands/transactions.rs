//! Transaction command implementations

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::models::{Direction, NewTransaction, Origin, TransactionUpdate, User};
use tally_core::Tally;

use super::{format_amount, print_json, truncate};

/// Category names by id, for display
pub(crate) fn category_names(tally: &Tally, owner: &User) -> Result<HashMap<i64, String>> {
    Ok(tally
        .db()
        .list_categories(owner.id)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect())
}

pub fn cmd_transactions_list(
    tally: &Tally,
    owner: &User,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let transactions = tally.ledger().list(owner.id, from, to)?;
    if json {
        return print_json(&transactions);
    }

    if transactions.is_empty() {
        println!("No transactions found. Record one with:");
        println!("  tally transactions add 12.50 --category <id>");
        return Ok(());
    }

    let names = category_names(tally, owner)?;

    println!();
    println!("📝 Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let category = names.get(&tx.category_id).map(String::as_str).unwrap_or("?");
        println!(
            "   [{:>4}] {} │ {:>20} │ {:<20} │ {}",
            tx.id,
            tx.date,
            format_amount(tx.amount, tx.direction),
            truncate(category, 20),
            truncate(tx.description.as_deref().unwrap_or(""), 30)
        );
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_transactions_add(
    tally: &Tally,
    owner: &User,
    amount: Decimal,
    category_id: i64,
    date: Option<NaiveDate>,
    direction: Direction,
    channel_id: Option<i64>,
    description: Option<String>,
) -> Result<()> {
    let tx = tally.ledger().create(NewTransaction {
        owner_id: owner.id,
        category_id,
        payment_channel_id: channel_id,
        amount,
        description,
        date: date.unwrap_or_else(|| tally.clock().today()),
        direction,
        origin: Origin::Manual,
    })?;

    println!(
        "✅ Recorded transaction {}: {} on {}",
        tx.id,
        format_amount(tx.amount, tx.direction),
        tx.date
    );
    Ok(())
}

pub fn cmd_transactions_edit(
    tally: &Tally,
    owner: &User,
    id: i64,
    update: TransactionUpdate,
) -> Result<()> {
    let tx = tally.ledger().update(owner.id, id, update)?;
    println!(
        "✅ Updated transaction {}: {} on {}",
        tx.id,
        format_amount(tx.amount, tx.direction),
        tx.date
    );
    Ok(())
}

pub fn cmd_transactions_delete(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    tally.ledger().delete(owner.id, id)?;
    println!("✅ Deleted transaction {}", id);
    Ok(())
}

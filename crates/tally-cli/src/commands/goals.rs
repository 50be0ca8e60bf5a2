//! Savings goal command implementations

use anyhow::Result;
use tally_core::models::{Goal, GoalStatus, GoalUpdate, NewGoal, User};
use tally_core::Tally;

use super::{print_json, truncate};

fn status_badge(status: GoalStatus) -> &'static str {
    match status {
        GoalStatus::Active => "\x1b[32mACTIVE\x1b[0m",
        GoalStatus::Completed => "\x1b[36mREACHED\x1b[0m",
        GoalStatus::Failed => "\x1b[31mMISSED\x1b[0m",
    }
}

fn print_goals(goals: &[Goal]) {
    println!();
    println!("🎯 Goals");
    println!("   ─────────────────────────────────────────────────────────────");
    for g in goals {
        println!(
            "   [{:>3}] {:<20} by {} │ ${:>9.2} of ${:>9.2} │ {:>6.2}% │ {}",
            g.id,
            truncate(&g.name, 20),
            g.deadline,
            g.saved_amount,
            g.target_amount,
            g.progress_percent,
            status_badge(g.status)
        );
    }
}

pub fn cmd_goals_list(tally: &Tally, owner: &User, json: bool) -> Result<()> {
    let goals = tally.goals().list_goals(owner.id)?;
    if json {
        return print_json(&goals);
    }

    if goals.is_empty() {
        println!("No goals yet. Create one with:");
        println!("  tally goals add \"New bike\" 400 --deadline 2024-06-30");
        return Ok(());
    }

    print_goals(&goals);
    Ok(())
}

pub fn cmd_goals_add(tally: &Tally, owner: &User, new: NewGoal) -> Result<()> {
    let goal = tally.goals().create_goal(owner.id, new)?;
    println!(
        "✅ Created goal {}: ${:.2} saved of ${:.2} ({})",
        goal.id, goal.saved_amount, goal.target_amount, goal.status
    );
    Ok(())
}

pub fn cmd_goals_edit(tally: &Tally, owner: &User, id: i64, update: GoalUpdate) -> Result<()> {
    let goal = tally.goals().update_goal(owner.id, id, update)?;
    println!(
        "✅ Updated goal {}: ${:.2} saved of ${:.2} ({})",
        goal.id, goal.saved_amount, goal.target_amount, goal.status
    );
    Ok(())
}

pub fn cmd_goals_delete(tally: &Tally, owner: &User, id: i64) -> Result<()> {
    tally.goals().delete_goal(owner.id, id)?;
    println!("✅ Deleted goal {}", id);
    Ok(())
}

pub fn cmd_goals_refresh(tally: &Tally, owner: &User, json: bool) -> Result<()> {
    let goals = tally.goals().recalculate_all(owner.id)?;
    if json {
        return print_json(&goals);
    }

    println!("🔄 Recalculated {} goal(s)", goals.len());
    if !goals.is_empty() {
        print_goals(&goals);
    }
    Ok(())
}

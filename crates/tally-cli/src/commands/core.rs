//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_tally` - Shared utility to open the engine from config
//! - `resolve_owner` - Pick the user a command acts for
//! - `cmd_init` - Initialize the database
//! - user, category, channel and audit commands

use anyhow::{bail, Context, Result};
use tally_core::config::Config;
use tally_core::models::{Direction, User};
use tally_core::Tally;

use super::{print_json, truncate};

/// Open the engine over the configured database
pub fn open_tally(config: &Config) -> Result<Tally> {
    Tally::open(config).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.database_path.display()
        )
    })
}

/// Resolve `--user`, falling back to the only user when there is exactly one
pub fn resolve_owner(tally: &Tally, email: Option<&str>) -> Result<User> {
    if let Some(email) = email {
        return tally
            .db()
            .get_user_by_email(email)?
            .ok_or_else(|| anyhow::anyhow!("No user with email '{}'", email));
    }

    let mut users = tally.db().list_users()?;
    match users.len() {
        0 => bail!("No users yet. Create one with: tally users add you@example.com"),
        1 => Ok(users.remove(0)),
        n => bail!("{} users exist; pick one with --user <email>", n),
    }
}

pub fn cmd_init(config: &Config) -> Result<()> {
    println!(
        "🔧 Initializing database at {}...",
        config.database_path.display()
    );

    let tally = open_tally(config)?;
    let users = tally.db().list_users()?;
    println!("   {} user(s)", users.len());

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create a user: tally users add you@example.com");
    println!("  2. Add a category: tally categories add Groceries");
    println!("  3. Start the scheduler: tally run");

    Ok(())
}

pub fn cmd_users_list(tally: &Tally, json: bool) -> Result<()> {
    let users = tally.db().list_users()?;
    if json {
        return print_json(&users);
    }

    if users.is_empty() {
        println!("No users yet. Create one with:");
        println!("  tally users add you@example.com");
        return Ok(());
    }

    println!();
    println!("👤 Users");
    println!("   ─────────────────────────────────────────────────────────────");
    for user in users {
        println!(
            "   [{}] {} {}",
            user.id,
            user.email,
            user.display_name
                .map(|n| format!("({})", n))
                .unwrap_or_default()
        );
    }

    Ok(())
}

pub fn cmd_users_add(tally: &Tally, email: &str, name: Option<&str>) -> Result<()> {
    let user = tally.db().create_user(email, name)?;
    println!("✅ Created user {} (id: {})", user.email, user.id);
    println!("   System categories and payment channels provisioned");
    Ok(())
}

pub fn cmd_users_repair(tally: &Tally, owner: &User) -> Result<()> {
    tally.db().provision_system_records(owner.id)?;
    println!("✅ System records checked for {}", owner.email);
    Ok(())
}

pub fn cmd_categories_list(tally: &Tally, owner: &User, json: bool) -> Result<()> {
    let categories = tally.db().list_categories(owner.id)?;
    if json {
        return print_json(&categories);
    }

    println!();
    println!("🏷️  Categories");
    println!("   ─────────────────────────────────────────────────────────────");
    for c in categories {
        let mut flags = Vec::new();
        if c.system_generated {
            flags.push("system");
        }
        if !c.budgetable {
            flags.push("not budgetable");
        }
        if !c.active {
            flags.push("inactive");
        }
        println!(
            "   [{:>3}] {:<28} {:<8} {}",
            c.id,
            truncate(&c.name, 28),
            c.kind,
            flags.join(", ")
        );
    }

    Ok(())
}

pub fn cmd_categories_add(
    tally: &Tally,
    owner: &User,
    name: &str,
    kind: Direction,
    budgetable: bool,
) -> Result<()> {
    let category = tally
        .db()
        .create_category(owner.id, name, kind, budgetable)?;
    println!(
        "✅ Created {} category '{}' (id: {})",
        category.kind, category.name, category.id
    );
    Ok(())
}

pub fn cmd_categories_set_active(tally: &Tally, owner: &User, id: i64, active: bool) -> Result<()> {
    tally.db().set_category_active(owner.id, id, active)?;
    if active {
        println!("✅ Enabled category {}", id);
    } else {
        println!("✅ Disabled category {}", id);
    }
    Ok(())
}

pub fn cmd_channels_list(tally: &Tally, owner: &User, json: bool) -> Result<()> {
    let channels = tally.db().list_payment_channels(owner.id)?;
    if json {
        return print_json(&channels);
    }

    println!();
    println!("💳 Payment Channels");
    println!("   ─────────────────────────────────────────────────────────────");
    for ch in channels {
        println!(
            "   [{:>3}] {}{}",
            ch.id,
            ch.name,
            if ch.system_generated { "  (system)" } else { "" }
        );
    }

    Ok(())
}

pub fn cmd_channels_add(tally: &Tally, owner: &User, name: &str) -> Result<()> {
    let channel = tally.db().create_payment_channel(owner.id, name)?;
    println!("✅ Created payment channel '{}' (id: {})", channel.name, channel.id);
    Ok(())
}

pub fn cmd_audit(tally: &Tally, limit: i64, json: bool) -> Result<()> {
    let entries = tally.db().list_audit(limit)?;
    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No audit entries.");
        return Ok(());
    }

    println!();
    println!("📜 Audit Log");
    println!("   ─────────────────────────────────────────────────────────────");
    for e in entries {
        let entity = match (&e.entity_type, e.entity_id) {
            (Some(t), Some(id)) => format!("{} {}", t, id),
            (Some(t), None) => t.clone(),
            _ => String::new(),
        };
        println!(
            "   {} │ {:<22} │ {:<20} │ {}",
            e.timestamp,
            truncate(&e.actor, 22),
            e.action,
            entity
        );
    }

    Ok(())
}

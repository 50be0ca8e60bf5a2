//! Tally CLI - Budgets, recurring payments and loans
//!
//! Usage:
//!   tally init                          Initialize database
//!   tally users add you@example.com     Create a user
//!   tally transactions add 12.50 -c 4   Record an expense
//!   tally goals add Bike 400 --deadline 2024-06-30
//!   tally tick                          Fire due recurring payments now
//!   tally run                           Run the daily scheduler

mod cli;
mod commands;
mod scheduler;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tally_core::config::Config;
use tally_core::models::{
    BudgetUpdate, GoalUpdate, LoanUpdate, NewBudget, NewGoal, NewLoan, NewPayment,
    NewRecurringDefinition, RecurringUpdate, TransactionUpdate,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    // Config file < environment < --db
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    if let Commands::Init = cli.command {
        return commands::cmd_init(&config);
    }

    let tally = commands::open_tally(&config)?;
    let user = cli.user.as_deref();
    let json = cli.json;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Users { action } => match action {
            None | Some(UsersAction::List) => commands::cmd_users_list(&tally, json),
            Some(UsersAction::Add { email, name }) => {
                commands::cmd_users_add(&tally, &email, name.as_deref())
            }
            Some(UsersAction::Repair) => {
                let owner = commands::resolve_owner(&tally, user)?;
                commands::cmd_users_repair(&tally, &owner)
            }
        },
        Commands::Categories { action } => {
            let owner = commands::resolve_owner(&tally, user)?;
            match action {
                None | Some(CategoriesAction::List) => {
                    commands::cmd_categories_list(&tally, &owner, json)
                }
                Some(CategoriesAction::Add {
                    name,
                    kind,
                    not_budgetable,
                }) => commands::cmd_categories_add(&tally, &owner, &name, kind, !not_budgetable),
                Some(CategoriesAction::Disable { id }) => {
                    commands::cmd_categories_set_active(&tally, &owner, id, false)
                }
                Some(CategoriesAction::Enable { id }) => {
                    commands::cmd_categories_set_active(&tally, &owner, id, true)
                }
            }
        }
        Commands::Channels { action } => {
            let owner = commands::resolve_owner(&tally, user)?;
            match action {
                None | Some(ChannelsAction::List) => {
                    commands::cmd_channels_list(&tally, &owner, json)
                }
                Some(ChannelsAction::Add { name }) => {
                    commands::cmd_channels_add(&tally, &owner, &name)
                }
            }
        }
        Commands::Transactions { action } => {
            let owner = commands::resolve_owner(&tally, user)?;
            match action {
                None => commands::cmd_transactions_list(&tally, &owner, None, None, json),
                Some(TransactionsAction::List { from, to }) => {
                    commands::cmd_transactions_list(&tally, &owner, from, to, json)
                }
                Some(TransactionsAction::Add {
                    amount,
                    category,
                    date,
                    direction,
                    channel,
                    description,
                }) => commands::cmd_transactions_add(
                    &tally,
                    &owner,
                    amount,
                    category,
                    date,
                    direction,
                    channel,
                    description,
                ),
                Some(TransactionsAction::Edit {
                    id,
                    amount,
                    category,
                    date,
                    description,
                }) => commands::cmd_transactions_edit(
                    &tally,
                    &owner,
                    id,
                    TransactionUpdate {
                        category_id: category,
                        amount,
                        date,
                        description,
                    },
                ),
                Some(TransactionsAction::Delete { id }) => {
                    commands::cmd_transactions_delete(&tally, &owner, id)
                }
            }
        }
        Commands::Budgets { action } => {
            let owner = commands::resolve_owner(&tally, user)?;
            match action {
                None | Some(BudgetsAction::List) => {
                    commands::cmd_budgets_list(&tally, &owner, json)
                }
                Some(BudgetsAction::Add {
                    category,
                    amount,
                    start,
                    end,
                }) => commands::cmd_budgets_add(
                    &tally,
                    &owner,
                    NewBudget {
                        category_id: category,
                        amount,
                        start_date: start,
                        end_date: end,
                    },
                ),
                Some(BudgetsAction::Edit {
                    id,
                    category,
                    amount,
                    start,
                    end,
                }) => commands::cmd_budgets_edit(
                    &tally,
                    &owner,
                    id,
                    BudgetUpdate {
                        category_id: category,
                        amount,
                        start_date: start,
                        end_date: end,
                    },
                ),
                Some(BudgetsAction::Delete { id }) => {
                    commands::cmd_budgets_delete(&tally, &owner, id)
                }
                Some(BudgetsAction::Refresh) => commands::cmd_budgets_refresh(&tally, &owner, json),
            }
        }
        Commands::Goals { action } => {
            let owner = commands::resolve_owner(&tally, user)?;
            match action {
                None | Some(GoalsAction::List) => commands::cmd_goals_list(&tally, &owner, json),
                Some(GoalsAction::Add {
                    name,
                    amount,
                    deadline,
                }) => commands::cmd_goals_add(
                    &tally,
                    &owner,
                    NewGoal {
                        name,
                        target_amount: amount,
                        deadline,
                    },
                ),
                Some(GoalsAction::Edit {
                    id,
                    name,
                    amount,
                    deadline,
                }) => commands::cmd_goals_edit(
                    &tally,
                    &owner,
                    id,
                    GoalUpdate {
                        name,
                        target_amount: amount,
                        deadline,
                    },
                ),
                Some(GoalsAction::Delete { id }) => commands::cmd_goals_delete(&tally, &owner, id),
                Some(GoalsAction::Refresh) => commands::cmd_goals_refresh(&tally, &owner, json),
            }
        }
        Commands::Recurring { action } => {
            let owner = commands::resolve_owner(&tally, user)?;
            match action {
                None | Some(RecurringAction::List) => {
                    commands::cmd_recurring_list(&tally, &owner, json)
                }
                Some(RecurringAction::Add {
                    title,
                    amount,
                    frequency,
                    next,
                    direction,
                    paused,
                }) => commands::cmd_recurring_add(
                    &tally,
                    &owner,
                    NewRecurringDefinition {
                        title,
                        amount,
                        direction,
                        frequency,
                        next_run_date: next,
                        auto_pay: !paused,
                    },
                ),
                Some(RecurringAction::Edit {
                    id,
                    title,
                    amount,
                    frequency,
                    next,
                    direction,
                }) => commands::cmd_recurring_edit(
                    &tally,
                    &owner,
                    id,
                    RecurringUpdate {
                        title,
                        amount,
                        direction,
                        frequency,
                        next_run_date: next,
                        auto_pay: None,
                    },
                ),
                Some(RecurringAction::Pause { id }) => {
                    commands::cmd_recurring_pause(&tally, &owner, id)
                }
                Some(RecurringAction::Resume { id }) => {
                    commands::cmd_recurring_resume(&tally, &owner, id)
                }
                Some(RecurringAction::RunNow { id }) => {
                    commands::cmd_recurring_run_now(&tally, &owner, id)
                }
                Some(RecurringAction::Delete { id }) => {
                    commands::cmd_recurring_delete(&tally, &owner, id)
                }
            }
        }
        Commands::Loans { action } => {
            let owner = commands::resolve_owner(&tally, user)?;
            match action {
                None => commands::cmd_loans_list(&tally, &owner, false, json),
                Some(LoansAction::List { all }) => {
                    commands::cmd_loans_list(&tally, &owner, all, json)
                }
                Some(LoansAction::Add {
                    counterparty,
                    amount,
                    loan_type,
                    start,
                    due,
                    rate,
                    notes,
                }) => commands::cmd_loans_add(
                    &tally,
                    &owner,
                    NewLoan {
                        counterparty,
                        loan_type,
                        original_amount: amount,
                        start_date: start,
                        due_date: due,
                        interest_rate: rate,
                        notes,
                    },
                ),
                Some(LoansAction::Edit {
                    id,
                    counterparty,
                    amount,
                    due,
                    rate,
                    notes,
                }) => commands::cmd_loans_edit(
                    &tally,
                    &owner,
                    id,
                    LoanUpdate {
                        counterparty,
                        original_amount: amount,
                        due_date: due,
                        interest_rate: rate,
                        notes,
                    },
                ),
                Some(LoansAction::Pay {
                    id,
                    amount,
                    date,
                    channel,
                    notes,
                }) => commands::cmd_loans_pay(
                    &tally,
                    &owner,
                    id,
                    NewPayment {
                        amount,
                        date: date.unwrap_or_else(|| tally.clock().today()),
                        payment_channel_id: channel,
                        notes,
                    },
                ),
                Some(LoansAction::Installments { id }) => {
                    commands::cmd_loans_installments(&tally, &owner, id, json)
                }
                Some(LoansAction::Reverse { loan, installment }) => {
                    commands::cmd_loans_reverse(&tally, &owner, loan, installment)
                }
                Some(LoansAction::Close { id }) => commands::cmd_loans_close(&tally, &owner, id),
                Some(LoansAction::Delete { id }) => commands::cmd_loans_delete(&tally, &owner, id),
                Some(LoansAction::Summary) => commands::cmd_loans_summary(&tally, &owner, json),
            }
        }
        Commands::Tick { today } => commands::cmd_tick(&tally, today, json).map(|_| ()),
        Commands::Run => commands::cmd_run(tally, &config).await,
        Commands::Audit { limit } => commands::cmd_audit(&tally, limit, json),
    }
}

//! CLI command tests
//!
//! These exercise the command functions directly against a fixture engine.

use super::*;
use tally_core::models::{
    BudgetStatus, Direction, Frequency, GoalStatus, LoanStatus, LoanType, Origin,
};
use tally_core::test_utils::{date, money, Fixture};

#[test]
fn test_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        database_path: dir.path().join("tally.db"),
        ..Config::default()
    };

    assert!(commands::cmd_init(&config).is_ok());
    assert!(config.database_path.exists());
}

#[test]
fn test_resolve_owner() {
    let fx = Fixture::new("2024-03-10");

    let owner = commands::resolve_owner(&fx.tally, None).unwrap();
    assert_eq!(owner.id, fx.owner.id);

    let by_email = commands::resolve_owner(&fx.tally, Some("OWNER@example.com")).unwrap();
    assert_eq!(by_email.id, fx.owner.id);

    assert!(commands::resolve_owner(&fx.tally, Some("nobody@example.com")).is_err());

    fx.tally
        .db()
        .create_user("second@example.com", None)
        .unwrap();
    assert!(commands::resolve_owner(&fx.tally, None).is_err());
}

#[test]
fn test_users_and_categories_commands() {
    let fx = Fixture::new("2024-03-10");

    assert!(commands::cmd_users_add(&fx.tally, "new@example.com", Some("New")).is_ok());
    assert!(commands::cmd_users_add(&fx.tally, "new@example.com", None).is_err());
    assert!(commands::cmd_users_list(&fx.tally, false).is_ok());
    assert!(commands::cmd_users_list(&fx.tally, true).is_ok());
    assert!(commands::cmd_users_repair(&fx.tally, &fx.owner).is_ok());

    assert!(
        commands::cmd_categories_add(&fx.tally, &fx.owner, "Salary", Direction::Income, false)
            .is_ok()
    );
    assert!(commands::cmd_categories_list(&fx.tally, &fx.owner, false).is_ok());
    assert!(commands::cmd_categories_set_active(&fx.tally, &fx.owner, fx.food.id, false).is_ok());

    let recurring = fx
        .tally
        .db()
        .lookup_system_category(fx.owner.id, "Recurring Payments")
        .unwrap();
    assert!(
        commands::cmd_categories_set_active(&fx.tally, &fx.owner, recurring.id, false).is_err()
    );

    assert!(commands::cmd_channels_add(&fx.tally, &fx.owner, "Visa").is_ok());
    assert!(commands::cmd_channels_list(&fx.tally, &fx.owner, false).is_ok());
}

#[test]
fn test_transaction_and_budget_commands() {
    let fx = Fixture::new("2024-03-10");

    assert!(commands::cmd_budgets_add(
        &fx.tally,
        &fx.owner,
        NewBudget {
            category_id: fx.food.id,
            amount: money("100"),
            start_date: date("2024-03-01"),
            end_date: date("2024-03-31"),
        },
    )
    .is_ok());

    assert!(commands::cmd_transactions_add(
        &fx.tally,
        &fx.owner,
        money("30"),
        fx.food.id,
        None,
        Direction::Expense,
        None,
        Some("Groceries".to_string()),
    )
    .is_ok());

    let txs = fx.tally.ledger().list(fx.owner.id, None, None).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].date, date("2024-03-10"));
    assert_eq!(txs[0].origin, Origin::Manual);

    let budget = &fx.tally.budgets().list_budgets(fx.owner.id).unwrap()[0];
    assert_eq!(budget.spent_amount, money("30"));

    assert!(commands::cmd_transactions_edit(
        &fx.tally,
        &fx.owner,
        txs[0].id,
        TransactionUpdate {
            amount: Some(money("45")),
            ..Default::default()
        },
    )
    .is_ok());
    let budget = &fx.tally.budgets().list_budgets(fx.owner.id).unwrap()[0];
    assert_eq!(budget.spent_amount, money("45"));

    assert!(commands::cmd_transactions_list(&fx.tally, &fx.owner, None, None, false).is_ok());
    assert!(commands::cmd_budgets_list(&fx.tally, &fx.owner, true).is_ok());

    assert!(commands::cmd_transactions_delete(&fx.tally, &fx.owner, txs[0].id).is_ok());
    let budget = &fx.tally.budgets().list_budgets(fx.owner.id).unwrap()[0];
    assert_eq!(budget.spent_amount, money("0"));

    assert!(commands::cmd_budgets_refresh(&fx.tally, &fx.owner, false).is_ok());
    assert!(commands::cmd_budgets_delete(&fx.tally, &fx.owner, budget.id).is_ok());
    assert!(fx.tally.budgets().list_budgets(fx.owner.id).unwrap().is_empty());
}

#[test]
fn test_invalid_transaction_amount_is_rejected() {
    let fx = Fixture::new("2024-03-10");

    let result = commands::cmd_transactions_add(
        &fx.tally,
        &fx.owner,
        money("0"),
        fx.food.id,
        None,
        Direction::Expense,
        None,
        None,
    );
    assert!(result.is_err());
}

#[test]
fn test_recurring_commands_and_tick() {
    let fx = Fixture::new("2024-03-10");

    assert!(commands::cmd_recurring_add(
        &fx.tally,
        &fx.owner,
        NewRecurringDefinition {
            title: "Gym".to_string(),
            amount: money("40"),
            direction: Direction::Expense,
            frequency: Frequency::Monthly,
            next_run_date: date("2024-03-15"),
            auto_pay: true,
        },
    )
    .is_ok());
    let def = fx.tally.scheduler().list_definitions(fx.owner.id).unwrap()[0].clone();

    // Not due yet
    let report = commands::cmd_tick(&fx.tally, None, false).unwrap();
    assert_eq!(report.fired, 0);

    let report = commands::cmd_tick(&fx.tally, Some(date("2024-03-15")), true).unwrap();
    assert_eq!(report.fired, 1);
    let def = fx
        .tally
        .scheduler()
        .get_definition(fx.owner.id, def.id)
        .unwrap();
    assert_eq!(def.next_run_date, date("2024-04-15"));

    assert!(commands::cmd_recurring_pause(&fx.tally, &fx.owner, def.id).is_ok());
    assert!(commands::cmd_recurring_run_now(&fx.tally, &fx.owner, def.id).is_ok());
    let def = fx
        .tally
        .scheduler()
        .get_definition(fx.owner.id, def.id)
        .unwrap();
    assert!(def.auto_pay);
    assert_eq!(def.next_run_date, date("2024-05-15"));

    assert!(commands::cmd_recurring_edit(
        &fx.tally,
        &fx.owner,
        def.id,
        RecurringUpdate {
            amount: Some(money("45")),
            ..Default::default()
        },
    )
    .is_ok());
    assert!(commands::cmd_recurring_list(&fx.tally, &fx.owner, false).is_ok());
    assert!(commands::cmd_recurring_delete(&fx.tally, &fx.owner, def.id).is_ok());
    assert!(commands::cmd_recurring_resume(&fx.tally, &fx.owner, def.id).is_err());

    assert_eq!(
        fx.tally.ledger().list(fx.owner.id, None, None).unwrap().len(),
        2
    );
    assert!(commands::cmd_audit(&fx.tally, 10, false).is_ok());
}

#[test]
fn test_tick_with_explicit_day_judges_status_on_that_day() {
    let fx = Fixture::new("2024-03-10");
    let recurring = fx
        .tally
        .db()
        .lookup_system_category(fx.owner.id, "Recurring Payments")
        .unwrap();
    let budget = fx
        .tally
        .budgets()
        .create_budget(
            fx.owner.id,
            NewBudget {
                category_id: recurring.id,
                amount: money("100"),
                start_date: date("2024-03-01"),
                end_date: date("2024-03-31"),
            },
        )
        .unwrap();
    let goal = fx
        .tally
        .goals()
        .create_goal(
            fx.owner.id,
            NewGoal {
                name: "Emergency fund".to_string(),
                target_amount: money("500"),
                deadline: date("2024-03-31"),
            },
        )
        .unwrap();
    fx.tally
        .scheduler()
        .create_definition(
            fx.owner.id,
            NewRecurringDefinition {
                title: "Gym".to_string(),
                amount: money("40"),
                direction: Direction::Expense,
                frequency: Frequency::Monthly,
                next_run_date: date("2024-03-15"),
                auto_pay: true,
            },
        )
        .unwrap();

    // The wall clock of the engine still reads 2024-03-10
    let report = commands::cmd_tick(&fx.tally, Some(date("2024-04-02")), false).unwrap();
    assert_eq!(report.fired, 1);

    let txs = fx.tally.ledger().list(fx.owner.id, None, None).unwrap();
    assert_eq!(txs[0].date, date("2024-03-15"));

    let budget = fx.tally.budgets().get_budget(fx.owner.id, budget.id).unwrap();
    assert_eq!(budget.spent_amount, money("40"));
    assert_eq!(budget.status, BudgetStatus::Completed);

    let stored = &fx.tally.goals().list_goals(fx.owner.id).unwrap()[0];
    assert_eq!(stored.id, goal.id);
    assert_eq!(stored.status, GoalStatus::Failed);
    assert_eq!(fx.tally.clock().today(), date("2024-03-10"));
}

#[test]
fn test_goal_commands() {
    let fx = Fixture::new("2024-03-10");

    assert!(commands::cmd_goals_add(
        &fx.tally,
        &fx.owner,
        NewGoal {
            name: "Bike".to_string(),
            target_amount: money("400"),
            deadline: date("2024-03-31"),
        },
    )
    .is_ok());
    assert!(commands::cmd_goals_add(
        &fx.tally,
        &fx.owner,
        NewGoal {
            name: "Bike".to_string(),
            target_amount: money("-1"),
            deadline: date("2024-03-31"),
        },
    )
    .is_err());
    let goal = fx.tally.goals().list_goals(fx.owner.id).unwrap()[0].clone();

    let salary = fx
        .tally
        .db()
        .create_category(fx.owner.id, "Salary", Direction::Income, false)
        .unwrap();
    assert!(commands::cmd_transactions_add(
        &fx.tally,
        &fx.owner,
        money("300"),
        salary.id,
        Some(date("2024-03-01")),
        Direction::Income,
        None,
        None,
    )
    .is_ok());
    let goal = fx.tally.goals().get_goal(fx.owner.id, goal.id).unwrap();
    assert_eq!(goal.saved_amount, money("300"));
    assert_eq!(goal.progress_percent, money("75.00"));

    assert!(commands::cmd_goals_edit(
        &fx.tally,
        &fx.owner,
        goal.id,
        GoalUpdate {
            target_amount: Some(money("300")),
            ..Default::default()
        },
    )
    .is_ok());
    let goal = fx.tally.goals().get_goal(fx.owner.id, goal.id).unwrap();
    assert_eq!(goal.status, GoalStatus::Completed);

    assert!(commands::cmd_goals_list(&fx.tally, &fx.owner, false).is_ok());
    assert!(commands::cmd_goals_refresh(&fx.tally, &fx.owner, true).is_ok());
    assert!(commands::cmd_goals_delete(&fx.tally, &fx.owner, goal.id).is_ok());
    assert!(commands::cmd_goals_delete(&fx.tally, &fx.owner, goal.id).is_err());
}

#[test]
fn test_loan_commands() {
    let fx = Fixture::new("2024-03-10");

    assert!(commands::cmd_loans_add(
        &fx.tally,
        &fx.owner,
        NewLoan {
            counterparty: "Alex".to_string(),
            loan_type: LoanType::Taken,
            original_amount: money("300"),
            start_date: None,
            due_date: None,
            interest_rate: None,
            notes: None,
        },
    )
    .is_ok());
    let loan = fx.tally.loans().list_loans(fx.owner.id, false).unwrap()[0].clone();

    for _ in 0..3 {
        assert!(commands::cmd_loans_pay(
            &fx.tally,
            &fx.owner,
            loan.id,
            NewPayment {
                amount: money("100"),
                date: date("2024-03-10"),
                payment_channel_id: None,
                notes: None,
            },
        )
        .is_ok());
    }

    let closed = fx.tally.loans().get_loan(fx.owner.id, loan.id).unwrap();
    assert_eq!(closed.status, LoanStatus::Closed);

    // Closed loans accept no further payments
    assert!(commands::cmd_loans_pay(
        &fx.tally,
        &fx.owner,
        loan.id,
        NewPayment {
            amount: money("1"),
            date: date("2024-03-10"),
            payment_channel_id: None,
            notes: None,
        },
    )
    .is_err());

    let installments = fx
        .tally
        .loans()
        .list_installments(fx.owner.id, loan.id)
        .unwrap();
    assert!(commands::cmd_loans_reverse(&fx.tally, &fx.owner, loan.id, installments[0].id).is_ok());
    let reopened = fx.tally.loans().get_loan(fx.owner.id, loan.id).unwrap();
    assert_eq!(reopened.status, LoanStatus::Active);
    assert_eq!(reopened.remaining_amount, money("100"));

    assert!(commands::cmd_loans_edit(
        &fx.tally,
        &fx.owner,
        loan.id,
        LoanUpdate {
            notes: Some("family".to_string()),
            ..Default::default()
        },
    )
    .is_ok());
    assert!(commands::cmd_loans_close(&fx.tally, &fx.owner, loan.id).is_err());
    assert!(commands::cmd_loans_delete(&fx.tally, &fx.owner, loan.id).is_err());
    assert!(commands::cmd_loans_installments(&fx.tally, &fx.owner, loan.id, false).is_ok());
    assert!(commands::cmd_loans_list(&fx.tally, &fx.owner, true, false).is_ok());
    assert!(commands::cmd_loans_summary(&fx.tally, &fx.owner, true).is_ok());
}

#[test]
fn test_truncate() {
    assert_eq!(commands::truncate("short", 10), "short");
    assert_eq!(commands::truncate("a much longer description", 10), "a much ...");
}

#[tokio::test]
async fn test_scheduled_tick_fires_due_payments() {
    let fx = Fixture::new("2024-03-10");
    fx.tally
        .scheduler()
        .create_definition(
            fx.owner.id,
            NewRecurringDefinition {
                title: "Rent".to_string(),
                amount: money("900"),
                direction: Direction::Expense,
                frequency: Frequency::Monthly,
                next_run_date: date("2024-03-10"),
                auto_pay: true,
            },
        )
        .unwrap();

    let report = scheduler::run_scheduled_tick(&fx.tally).await.unwrap();
    assert_eq!(report.fired, 1);

    let again = scheduler::run_scheduled_tick(&fx.tally).await.unwrap();
    assert_eq!(again.processed, 0);
}

//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use rusqlite::params;
    use crate::test_utils::{date, money};

    fn new_tx(owner_id: i64, category_id: i64, amount: Decimal, day: &str) -> NewTransaction {
        NewTransaction {
            owner_id,
            category_id,
            payment_channel_id: None,
            amount,
            description: None,
            date: date(day),
            direction: Direction::Expense,
            origin: Origin::Manual,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        for table in [
            "users",
            "categories",
            "payment_channels",
            "transactions",
            "budgets",
            "goals",
            "recurring_definitions",
            "loans",
            "loan_installments",
            "audit_log",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {} should exist", table);
        }
    }

    #[test]
    fn test_create_user_provisions_system_records() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", Some("Ada")).unwrap();

        let recurring = db
            .lookup_system_category(user.id, system::RECURRING_CATEGORY)
            .unwrap();
        assert_eq!(recurring.kind, Direction::Expense);
        assert!(recurring.system_generated);

        let repayments = db
            .lookup_system_category(user.id, system::LOAN_REPAYMENTS_CATEGORY)
            .unwrap();
        assert_eq!(repayments.kind, Direction::Income);
        assert!(!repayments.budgetable);

        let auto_pay = db
            .lookup_system_payment_channel(user.id, system::AUTO_PAY_CHANNEL)
            .unwrap();
        assert!(auto_pay.system_generated);
        assert_eq!(db.list_payment_channels(user.id).unwrap().len(), 2);
    }

    #[test]
    fn test_provisioning_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();

        db.provision_system_records(user.id).unwrap();
        db.provision_system_records(user.id).unwrap();

        assert_eq!(db.list_categories(user.id).unwrap().len(), 3);
        assert_eq!(db.list_payment_channels(user.id).unwrap().len(), 2);
    }

    #[test]
    fn test_provisioning_repairs_missing_records() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();
        db.conn()
            .unwrap()
            .execute(
                "DELETE FROM payment_channels WHERE name = ?",
                params![system::CASH_CHANNEL],
            )
            .unwrap();

        let err = db
            .lookup_system_payment_channel(user.id, system::CASH_CHANNEL)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        db.provision_system_records(user.id).unwrap();
        assert!(db
            .lookup_system_payment_channel(user.id, system::CASH_CHANNEL)
            .is_ok());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = Database::in_memory().unwrap();
        db.create_user("ada@example.com", None).unwrap();

        let err = db.create_user("ADA@example.com", None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(matches!(
            db.create_user("not-an-email", None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_categories_are_owner_scoped() {
        let db = Database::in_memory().unwrap();
        let ada = db.create_user("ada@example.com", None).unwrap();
        let bob = db.create_user("bob@example.com", None).unwrap();

        let food = db
            .create_category(ada.id, "Food", Direction::Expense, true)
            .unwrap();
        assert!(db.get_category(ada.id, food.id).unwrap().is_some());
        assert!(db.get_category(bob.id, food.id).unwrap().is_none());

        // Same name is fine for a different owner, not for the same one
        db.create_category(bob.id, "Food", Direction::Expense, true)
            .unwrap();
        assert!(matches!(
            db.create_category(ada.id, "food", Direction::Expense, true),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_system_category_cannot_be_deactivated() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();
        let recurring = db
            .lookup_system_category(user.id, system::RECURRING_CATEGORY)
            .unwrap();

        assert!(matches!(
            db.set_category_active(user.id, recurring.id, false),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_sum_expenses_window_and_direction() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();
        let food = db
            .create_category(user.id, "Food", Direction::Expense, true)
            .unwrap();
        let conn = db.conn().unwrap();

        transactions::insert_transaction(&conn, &new_tx(user.id, food.id, money("10.25"), "2024-01-01"))
            .unwrap();
        transactions::insert_transaction(&conn, &new_tx(user.id, food.id, money("4.75"), "2024-01-31"))
            .unwrap();
        // Outside the window
        transactions::insert_transaction(&conn, &new_tx(user.id, food.id, money("100"), "2024-02-01"))
            .unwrap();
        // Income never counts
        let mut income = new_tx(user.id, food.id, money("50"), "2024-01-15");
        income.direction = Direction::Income;
        transactions::insert_transaction(&conn, &income).unwrap();

        let total = transactions::sum_expenses(
            &conn,
            user.id,
            food.id,
            date("2024-01-01"),
            date("2024-01-31"),
        )
        .unwrap();
        assert_eq!(total, money("15.00"));
    }

    #[test]
    fn test_malformed_created_at_is_a_conversion_error() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();
        let food = db
            .create_category(user.id, "Food", Direction::Expense, true)
            .unwrap();
        let conn = db.conn().unwrap();
        let tx_id =
            transactions::insert_transaction(&conn, &new_tx(user.id, food.id, money("5"), "2024-01-02"))
                .unwrap();

        conn.execute(
            "UPDATE users SET created_at = 'last tuesday' WHERE id = ?",
            params![user.id],
        )
        .unwrap();
        conn.execute(
            "UPDATE transactions SET created_at = '2024-13-45 99:00:00' WHERE id = ?",
            params![tx_id],
        )
        .unwrap();

        assert!(matches!(
            db.get_user(user.id),
            Err(Error::Database(rusqlite::Error::FromSqlConversionFailure(3, _, _)))
        ));
        assert!(matches!(
            db.get_transaction(user.id, tx_id),
            Err(Error::Database(rusqlite::Error::FromSqlConversionFailure(9, _, _)))
        ));
        assert_eq!(db.list_users().unwrap_err().kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_sum_by_direction_spans_categories() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();
        let food = db
            .create_category(user.id, "Food", Direction::Expense, true)
            .unwrap();
        let rent = db
            .create_category(user.id, "Rent", Direction::Expense, true)
            .unwrap();
        let conn = db.conn().unwrap();

        transactions::insert_transaction(&conn, &new_tx(user.id, food.id, money("20"), "2024-01-03"))
            .unwrap();
        transactions::insert_transaction(&conn, &new_tx(user.id, rent.id, money("700"), "2024-01-04"))
            .unwrap();
        let mut income = new_tx(user.id, food.id, money("1000"), "2024-01-05");
        income.direction = Direction::Income;
        transactions::insert_transaction(&conn, &income).unwrap();

        let (start, end) = (date("2024-01-01"), date("2024-01-31"));
        assert_eq!(
            transactions::sum_by_direction(&conn, user.id, Direction::Expense, start, end).unwrap(),
            money("720")
        );
        assert_eq!(
            transactions::sum_by_direction(&conn, user.id, Direction::Income, start, end).unwrap(),
            money("1000")
        );
    }

    #[test]
    fn test_claim_occurrence_compare_and_set() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();
        let category = db
            .lookup_system_category(user.id, system::RECURRING_CATEGORY)
            .unwrap();
        let conn = db.conn().unwrap();

        let def = RecurringDefinition {
            id: 0,
            owner_id: user.id,
            category_id: category.id,
            title: "Rent".into(),
            amount: money("900"),
            direction: Direction::Expense,
            frequency: Frequency::Monthly,
            next_run_date: date("2024-01-01"),
            auto_pay: true,
        };
        let id = recurring::insert_definition(&conn, &def).unwrap();

        assert!(
            recurring::claim_occurrence(&conn, id, date("2024-01-01"), date("2024-02-01")).unwrap()
        );
        // A second claim on the same occurrence loses
        assert!(
            !recurring::claim_occurrence(&conn, id, date("2024-01-01"), date("2024-02-01")).unwrap()
        );

        let stored = recurring::get_definition(&conn, user.id, id).unwrap().unwrap();
        assert_eq!(stored.next_run_date, date("2024-02-01"));
    }

    #[test]
    fn test_due_definition_ids_respects_auto_pay() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();
        let category = db
            .lookup_system_category(user.id, system::RECURRING_CATEGORY)
            .unwrap();
        let conn = db.conn().unwrap();

        let mut def = RecurringDefinition {
            id: 0,
            owner_id: user.id,
            category_id: category.id,
            title: "Gym".into(),
            amount: money("30"),
            direction: Direction::Expense,
            frequency: Frequency::Monthly,
            next_run_date: date("2024-01-05"),
            auto_pay: true,
        };
        let due = recurring::insert_definition(&conn, &def).unwrap();
        def.auto_pay = false;
        recurring::insert_definition(&conn, &def).unwrap();
        def.auto_pay = true;
        def.next_run_date = date("2024-01-06");
        recurring::insert_definition(&conn, &def).unwrap();

        let ids = recurring::due_definition_ids(&conn, date("2024-01-05")).unwrap();
        assert_eq!(ids, vec![due]);
    }

    #[test]
    fn test_with_transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();

        let result: Result<()> = db.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO payment_channels (owner_id, name) VALUES (?, 'Visa')",
                params![user.id],
            )?;
            Err(Error::validation("abort"))
        });
        assert!(result.is_err());
        assert_eq!(db.list_payment_channels(user.id).unwrap().len(), 2);
    }

    #[test]
    fn test_loan_round_trip_keeps_optional_fields() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("ada@example.com", None).unwrap();
        let conn = db.conn().unwrap();

        let id = loans::insert_loan(
            &conn,
            user.id,
            &NewLoan {
                counterparty: "Bank".into(),
                loan_type: LoanType::Taken,
                original_amount: money("1200.50"),
                start_date: Some(date("2024-01-01")),
                due_date: None,
                interest_rate: Some(money("4.5")),
                notes: None,
            },
        )
        .unwrap();

        let loan = db.get_loan(user.id, id).unwrap().unwrap();
        assert_eq!(loan.remaining_amount, money("1200.50"));
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.start_date, Some(date("2024-01-01")));
        assert_eq!(loan.due_date, None);
        assert_eq!(loan.interest_rate, Some(money("4.5")));
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        audit::log_audit(&conn, "scheduler", "recurring.fire", Some("recurring_definition"), Some(7), None)
            .unwrap();
        audit::log_audit(&conn, "ada@example.com", "loan.payment", Some("loan"), Some(1), Some("{}"))
            .unwrap();

        let entries = db.list_audit(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "loan.payment");
        assert_eq!(entries[1].entity_id, Some(7));
    }
}

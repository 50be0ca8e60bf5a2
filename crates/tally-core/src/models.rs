//! Domain models for Tally

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Names of the per-owner records that automated subsystems rely on
pub mod system {
    pub const RECURRING_CATEGORY: &str = "Recurring Payments";
    pub const LOAN_PAYMENTS_CATEGORY: &str = "Loan Payments";
    pub const LOAN_REPAYMENTS_CATEGORY: &str = "Loan Repayments";
    pub const CASH_CHANNEL: &str = "Cash";
    pub const AUTO_PAY_CHANNEL: &str = "RECURRING_AUTO_PAY";
}

/// `a + b`, or a validation error when the total no longer fits a `Decimal`
pub fn add_money(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| Error::validation(format!("total of {} and {} is out of range", a, b)))
}

/// Sum of `amounts`, failing instead of overflowing
pub fn sum_money<I: IntoIterator<Item = Decimal>>(amounts: I) -> Result<Decimal> {
    amounts.into_iter().try_fold(Decimal::ZERO, add_money)
}

/// An account holder. Every other record belongs to exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether money leaves (expense) or enters (income) the owner's pocket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Expense,
    Income,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending or income category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    /// Which kind of transaction may be filed under this category
    pub kind: Direction,
    pub active: bool,
    /// Budgets may only target budgetable categories
    pub budgetable: bool,
    /// Provisioned for automated subsystems; never created by the user
    pub system_generated: bool,
}

/// A way of paying (cash, a card, the auto-pay channel, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub active: bool,
    pub system_generated: bool,
}

/// Which subsystem created a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Entered by the user
    #[default]
    Manual,
    /// Materialized by the recurring scheduler
    Recurring,
    /// Side effect of recording a loan payment
    LoanInstallment,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Recurring => "recurring",
            Self::LoanInstallment => "loan_installment",
        }
    }

    pub fn is_system_generated(&self) -> bool {
        !matches!(self, Self::Manual)
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "recurring" => Ok(Self::Recurring),
            "loan_installment" => Ok(Self::LoanInstallment),
            _ => Err(format!("Unknown transaction origin: {}", s)),
        }
    }
}

/// A ledger transaction (expense or income)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub owner_id: i64,
    pub category_id: i64,
    pub payment_channel_id: Option<i64>,
    /// Always positive; `direction` carries the sign
    pub amount: Decimal,
    pub description: Option<String>,
    /// When the money moved
    pub date: NaiveDate,
    pub direction: Direction,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
}

/// A transaction to be written to the ledger
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub owner_id: i64,
    pub category_id: i64,
    /// Expenses without a channel are paid in cash
    pub payment_channel_id: Option<i64>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub direction: Direction,
    pub origin: Origin,
}

/// Editable fields of a ledger transaction. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub category_id: Option<i64>,
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Kind of ledger mutation carried by a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// Budget lifecycle state, derived on every recalculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    Active,
    OverBudget,
    Completed,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OverBudget => "over_budget",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for BudgetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "over_budget" => Ok(Self::OverBudget),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown budget status: {}", s)),
        }
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending cap for one category over a date window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub owner_id: i64,
    pub category_id: i64,
    /// Target
    pub amount: Decimal,
    pub spent_amount: Decimal,
    /// Always `amount - spent_amount` after a recalculation; negative when over budget
    pub remaining_amount: Decimal,
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: NaiveDate,
    pub status: BudgetStatus,
}

impl Budget {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone)]
pub struct NewBudget {
    pub category_id: i64,
    pub amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Editable bounds of a budget. Any change forces a recalculation.
#[derive(Debug, Clone, Default)]
pub struct BudgetUpdate {
    pub category_id: Option<i64>,
    pub amount: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BudgetUpdate {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.amount.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

/// Savings goal state, derived on every recalculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    Active,
    Completed,
    Failed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown goal status: {}", s)),
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A savings target measured against the net income of its deadline month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub target_amount: Decimal,
    /// Income minus expenses in the deadline month, never below zero
    pub saved_amount: Decimal,
    /// `saved / target` as a percentage in 0..=100, two decimal places
    pub progress_percent: Decimal,
    pub deadline: NaiveDate,
    pub status: GoalStatus,
}

impl Goal {
    /// First and last day of the deadline's calendar month
    pub fn window(&self) -> Result<(NaiveDate, NaiveDate)> {
        month_bounds(self.deadline)
    }
}

/// First and last day of the calendar month containing `date`
pub fn month_bounds(date: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let out_of_range = || Error::InvalidData(format!("no calendar month around {}", date));
    let first = date.with_day(1).ok_or_else(out_of_range)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(out_of_range)?;
    Ok((first, last))
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub name: String,
    pub target_amount: Decimal,
    pub deadline: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    pub name: Option<String>,
    pub target_amount: Option<Decimal>,
    pub deadline: Option<NaiveDate>,
}

/// How often a recurring definition fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Move `date` forward by exactly one period.
    ///
    /// Calendar months and years clamp to the last day of the target month,
    /// so Jan 31 + 1 month is Feb 28 (or 29) and Feb 29 + 1 year is Feb 28.
    pub fn advance(&self, date: NaiveDate) -> Result<NaiveDate> {
        let next = match self {
            Self::Daily => date.checked_add_days(Days::new(1)),
            Self::Weekly => date.checked_add_days(Days::new(7)),
            Self::Monthly => date.checked_add_months(Months::new(1)),
            Self::Yearly => date.checked_add_months(Months::new(12)),
        };
        next.ok_or_else(|| {
            Error::InvalidData(format!("cannot advance {} by one {} period", date, self))
        })
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" | "annual" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A template that periodically materializes a ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringDefinition {
    pub id: i64,
    pub owner_id: i64,
    /// Always the owner's "Recurring Payments" system category
    pub category_id: i64,
    pub title: String,
    pub amount: Decimal,
    pub direction: Direction,
    pub frequency: Frequency,
    /// The only scheduling state: due when `next_run_date <= today`
    pub next_run_date: NaiveDate,
    /// Gate for the daily tick; manual triggers ignore it
    pub auto_pay: bool,
}

#[derive(Debug, Clone)]
pub struct NewRecurringDefinition {
    pub title: String,
    pub amount: Decimal,
    pub direction: Direction,
    pub frequency: Frequency,
    pub next_run_date: NaiveDate,
    pub auto_pay: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecurringUpdate {
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub direction: Option<Direction>,
    pub frequency: Option<Frequency>,
    pub next_run_date: Option<NaiveDate>,
    pub auto_pay: Option<bool>,
}

/// Direction of a loan from the owner's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanType {
    /// The owner borrowed; payments are expenses
    Taken,
    /// The owner lent; repayments are income
    Given,
}

impl LoanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Taken => "taken",
            Self::Given => "given",
        }
    }
}

impl std::str::FromStr for LoanType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "taken" | "borrowed" => Ok(Self::Taken),
            "given" | "lent" => Ok(Self::Given),
            _ => Err(format!("Unknown loan type: {}", s)),
        }
    }
}

impl std::fmt::Display for LoanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Active,
    Closed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Unknown loan status: {}", s)),
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Money borrowed from or lent to a counterparty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub owner_id: i64,
    pub counterparty: String,
    pub loan_type: LoanType,
    pub original_amount: Decimal,
    /// `0 <= remaining_amount <= original_amount`
    pub remaining_amount: Decimal,
    pub status: LoanStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Informational only; no interest is accrued
    pub interest_rate: Option<Decimal>,
    pub notes: Option<String>,
}

impl Loan {
    /// Amount already paid under the current terms
    pub fn paid_so_far(&self) -> Decimal {
        self.original_amount - self.remaining_amount
    }
}

#[derive(Debug, Clone)]
pub struct NewLoan {
    pub counterparty: String,
    pub loan_type: LoanType,
    pub original_amount: Decimal,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub interest_rate: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoanUpdate {
    pub counterparty: Option<String>,
    pub original_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub interest_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// A single payment applied against a loan's outstanding balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub id: i64,
    pub loan_id: i64,
    pub amount_paid: Decimal,
    pub payment_date: NaiveDate,
    pub payment_channel_id: Option<i64>,
    pub auto_generated: bool,
    pub notes: Option<String>,
    /// The expense/income entry written when this payment was recorded.
    /// Reversing the installment leaves that entry in place.
    pub ledger_transaction_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub date: NaiveDate,
    /// Defaults to the owner's "Cash" channel
    pub payment_channel_id: Option<i64>,
    pub notes: Option<String>,
}

/// Totals across all of an owner's loans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub total_taken: Decimal,
    pub total_given: Decimal,
    pub total_outstanding: Decimal,
    pub total_paid_on_taken: Decimal,
    pub total_received_on_given: Decimal,
}

use chrono::NaiveDate;
use estate_core::db::open_db_in_memory;
use estate_core::model::budget::Budget;
use estate_core::model::ledger::{
    Account, AccountId, AccountType, FinancialPeriod, JournalEntry, JournalLine,
};
use estate_core::repo::budget_repo::SqliteBudgetRepository;
use estate_core::repo::ledger_repo::SqliteLedgerRepository;
use estate_core::repo::RepoError;
use estate_core::service::budget_service::{BudgetService, BudgetServiceError};
use estate_core::service::ledger_service::LedgerService;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rusqlite::Connection;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Books {
    cash: AccountId,
    rent: AccountId,
    repairs: AccountId,
    period: FinancialPeriod,
}

fn books(conn: &Connection) -> Books {
    let ledger = LedgerService::new(SqliteLedgerRepository::try_new(conn).unwrap());
    let cash = Account::new("1000", "Cash", AccountType::Asset);
    let rent = Account::new("4000", "Rental Revenue", AccountType::Revenue);
    let repairs = Account::new("5000", "Maintenance Expense", AccountType::Expense);
    for account in [&cash, &rent, &repairs] {
        ledger.create_account(account).unwrap();
    }
    let period = FinancialPeriod::new("Q2 2024", date(2024, 4, 1), date(2024, 6, 30));
    ledger.create_period(&period).unwrap();
    Books {
        cash: cash.uuid,
        rent: rent.uuid,
        repairs: repairs.uuid,
        period,
    }
}

fn post(
    conn: &Connection,
    number: &str,
    on: NaiveDate,
    debit: AccountId,
    credit: AccountId,
    amount: Decimal,
    posted: bool,
) {
    let ledger = LedgerService::new(SqliteLedgerRepository::try_new(conn).unwrap());
    let entry = JournalEntry::new(number, on, "activity");
    ledger
        .create_entry(
            &entry,
            &[
                JournalLine::debit(entry.uuid, debit, amount),
                JournalLine::credit(entry.uuid, credit, amount),
            ],
        )
        .unwrap();
    if posted {
        ledger.post_entry(entry.uuid, None).unwrap();
    }
}

#[test]
fn expense_actual_counts_posted_debits_inside_period() {
    let conn = open_db_in_memory().unwrap();
    let books = books(&conn);
    let budgets = BudgetService::new(SqliteBudgetRepository::try_new(&conn).unwrap());

    let budget = Budget::new("Repairs", books.period.uuid, books.repairs, dec!(1000));
    budgets.create_budget(&budget).unwrap();

    post(&conn, "JE-1", date(2024, 4, 5), books.repairs, books.cash, dec!(800), true);
    post(&conn, "JE-2", date(2024, 5, 5), books.repairs, books.cash, dec!(450), true);
    // Outside the period and unposted activity are ignored.
    post(&conn, "JE-3", date(2024, 7, 1), books.repairs, books.cash, dec!(999), true);
    post(&conn, "JE-4", date(2024, 5, 6), books.repairs, books.cash, dec!(999), false);

    assert_eq!(budgets.actual_amount(budget.uuid).unwrap(), dec!(1250));
    let variance = budgets.variance(budget.uuid).unwrap();
    assert_eq!(variance.variance, dec!(-250));
    assert_eq!(variance.variance_percentage, dec!(-25));
    assert!(variance.is_overrun());
}

#[test]
fn revenue_actual_counts_credits_and_report_totals() {
    let conn = open_db_in_memory().unwrap();
    let books = books(&conn);
    let budgets = BudgetService::new(SqliteBudgetRepository::try_new(&conn).unwrap());

    let rent_budget = Budget::new("Rent", books.period.uuid, books.rent, dec!(3000));
    let repair_budget = Budget::new("Repairs", books.period.uuid, books.repairs, dec!(500));
    budgets.create_budget(&rent_budget).unwrap();
    budgets.create_budget(&repair_budget).unwrap();

    post(&conn, "JE-1", date(2024, 4, 1), books.cash, books.rent, dec!(1500), true);
    post(&conn, "JE-2", date(2024, 5, 1), books.cash, books.rent, dec!(1500), true);
    post(&conn, "JE-3", date(2024, 5, 9), books.repairs, books.cash, dec!(200), true);

    let report = budgets.period_report(books.period.uuid).unwrap();
    assert_eq!(report.lines.len(), 2);
    // Ordered by account code.
    assert_eq!(report.lines[0].name, "Rent");
    assert_eq!(report.lines[0].actual_amount, dec!(3000));
    assert_eq!(report.lines[0].variance, dec!(0));
    assert_eq!(report.lines[1].actual_amount, dec!(200));
    assert_eq!(report.total_budgeted, dec!(3500));
    assert_eq!(report.total_actual, dec!(3200));
    assert_eq!(report.total_variance, dec!(300));
    assert_eq!(report.overruns().count(), 0);
}

#[test]
fn duplicate_scope_is_rejected_even_without_property() {
    let conn = open_db_in_memory().unwrap();
    let books = books(&conn);
    let budgets = BudgetService::new(SqliteBudgetRepository::try_new(&conn).unwrap());

    budgets
        .create_budget(&Budget::new("Repairs", books.period.uuid, books.repairs, dec!(10)))
        .unwrap();
    assert!(matches!(
        budgets.create_budget(&Budget::new(
            "Repairs again",
            books.period.uuid,
            books.repairs,
            dec!(20)
        )),
        Err(BudgetServiceError::Duplicate)
    ));
}

#[test]
fn unknown_account_or_period_is_not_reported_as_duplicate() {
    let conn = open_db_in_memory().unwrap();
    let books = books(&conn);
    let budgets = BudgetService::new(SqliteBudgetRepository::try_new(&conn).unwrap());

    let orphan_account = Budget::new("Ghost", books.period.uuid, Uuid::new_v4(), dec!(10));
    assert!(matches!(
        budgets.create_budget(&orphan_account),
        Err(BudgetServiceError::Repo(RepoError::ConstraintViolation(_)))
    ));
    let orphan_period = Budget::new("Ghost", Uuid::new_v4(), books.repairs, dec!(10));
    assert!(matches!(
        budgets.create_budget(&orphan_period),
        Err(BudgetServiceError::Repo(RepoError::ConstraintViolation(_)))
    ));

    // The failed inserts left the scope free.
    budgets
        .create_budget(&Budget::new("Repairs", books.period.uuid, books.repairs, dec!(10)))
        .unwrap();
}

#[test]
fn zero_budget_reports_zero_percentage_and_delete_works() {
    let conn = open_db_in_memory().unwrap();
    let books = books(&conn);
    let budgets = BudgetService::new(SqliteBudgetRepository::try_new(&conn).unwrap());

    let mut budget = Budget::new("Rent", books.period.uuid, books.rent, Decimal::ZERO);
    budgets.create_budget(&budget).unwrap();
    post(&conn, "JE-1", date(2024, 6, 1), books.cash, books.rent, dec!(100), true);

    let variance = budgets.variance(budget.uuid).unwrap();
    assert_eq!(variance.variance, dec!(-100));
    assert_eq!(variance.variance_percentage, Decimal::ZERO);

    budget.budgeted_amount = dec!(200);
    budgets.update_budget(&budget).unwrap();
    assert_eq!(budgets.variance(budget.uuid).unwrap().variance_percentage, dec!(50));

    budgets.delete_budget(budget.uuid).unwrap();
    assert!(matches!(
        budgets.variance(budget.uuid),
        Err(BudgetServiceError::BudgetNotFound(_))
    ));
}

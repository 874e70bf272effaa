//! Budget persistence and posted activity inside budget periods.

use super::{
    ensure_schema_ready, get_code, get_money, get_opt_uuid, get_uuid, minor, uuid_text, RepoError,
    RepoResult,
};
use crate::model::budget::{actual_side_is_debit, Budget, BudgetId};
use crate::model::ledger::{AccountType, EntryTotals, PeriodId};
use rust_decimal::Decimal;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Posted lines of the budget's account dated inside the budget's period.
const BUDGET_ACTIVITY_SQL: &str = "SELECT
    b.uuid AS uuid,
    b.name AS name,
    b.period_uuid AS period_uuid,
    b.account_uuid AS account_uuid,
    b.budgeted_amount AS budgeted_amount,
    b.property_uuid AS property_uuid,
    b.notes AS notes,
    a.account_type AS account_type,
    (
        SELECT COALESCE(SUM(l.debit_amount), 0)
        FROM journal_entry_lines l
        INNER JOIN journal_entries e ON e.uuid = l.entry_uuid
        WHERE l.account_uuid = b.account_uuid
          AND e.is_posted = 1
          AND e.entry_date >= p.start_date
          AND e.entry_date <= p.end_date
    ) AS debit_total,
    (
        SELECT COALESCE(SUM(l.credit_amount), 0)
        FROM journal_entry_lines l
        INNER JOIN journal_entries e ON e.uuid = l.entry_uuid
        WHERE l.account_uuid = b.account_uuid
          AND e.is_posted = 1
          AND e.entry_date >= p.start_date
          AND e.entry_date <= p.end_date
    ) AS credit_total
FROM budgets b
INNER JOIN financial_periods p ON p.uuid = b.period_uuid
INNER JOIN accounts a ON a.uuid = b.account_uuid";

/// Budget with the posted totals of its account inside its period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetActivity {
    pub budget: Budget,
    pub account_type: AccountType,
    pub totals: EntryTotals,
}

impl BudgetActivity {
    /// Debits for expense accounts, credits for everything else.
    pub fn actual_amount(&self) -> Decimal {
        if actual_side_is_debit(self.account_type) {
            self.totals.debit
        } else {
            self.totals.credit
        }
    }
}

pub trait BudgetRepository {
    fn create_budget(&self, budget: &Budget) -> RepoResult<BudgetId>;
    fn update_budget(&self, budget: &Budget) -> RepoResult<()>;
    fn delete_budget(&self, id: BudgetId) -> RepoResult<()>;
    fn budget_activity(&self, id: BudgetId) -> RepoResult<Option<BudgetActivity>>;
    /// Every budget of the period, ordered by account code.
    fn period_activity(&self, period: PeriodId) -> RepoResult<Vec<BudgetActivity>>;
}

/// SQLite-backed budget repository.
pub struct SqliteBudgetRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBudgetRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            &["budgets", "financial_periods", "accounts", "journal_entry_lines"],
        )?;
        Ok(Self { conn })
    }
}

impl BudgetRepository for SqliteBudgetRepository<'_> {
    fn create_budget(&self, budget: &Budget) -> RepoResult<BudgetId> {
        budget.validate()?;
        self.conn.execute(
            "INSERT INTO budgets (
                uuid, name, period_uuid, account_uuid, budgeted_amount, property_uuid, notes
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                budget.uuid.to_string(),
                budget.name.trim(),
                budget.period_uuid.to_string(),
                budget.account_uuid.to_string(),
                minor("budgeted_amount", budget.budgeted_amount)?,
                uuid_text(budget.property_uuid),
                budget.notes.as_str(),
            ],
        )?;
        Ok(budget.uuid)
    }

    fn update_budget(&self, budget: &Budget) -> RepoResult<()> {
        budget.validate()?;
        let changed = self.conn.execute(
            "UPDATE budgets
             SET name = ?2, budgeted_amount = ?3, notes = ?4
             WHERE uuid = ?1;",
            params![
                budget.uuid.to_string(),
                budget.name.trim(),
                minor("budgeted_amount", budget.budgeted_amount)?,
                budget.notes.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("budget", budget.uuid));
        }
        Ok(())
    }

    fn delete_budget(&self, id: BudgetId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM budgets WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("budget", id));
        }
        Ok(())
    }

    fn budget_activity(&self, id: BudgetId) -> RepoResult<Option<BudgetActivity>> {
        let sql = format!("{BUDGET_ACTIVITY_SQL} WHERE b.uuid = ?1;");
        self.conn
            .query_row(&sql, [id.to_string()], |row| Ok(parse_activity_row(row)))
            .optional()?
            .transpose()
    }

    fn period_activity(&self, period: PeriodId) -> RepoResult<Vec<BudgetActivity>> {
        let sql = format!(
            "{BUDGET_ACTIVITY_SQL}
             WHERE b.period_uuid = ?1
             ORDER BY a.code ASC, b.rowid ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([period.to_string()])?;
        let mut activity = Vec::new();
        while let Some(row) = rows.next()? {
            activity.push(parse_activity_row(row)?);
        }
        Ok(activity)
    }
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<BudgetActivity> {
    Ok(BudgetActivity {
        budget: Budget {
            uuid: get_uuid(row, "uuid")?,
            name: row.get("name")?,
            period_uuid: get_uuid(row, "period_uuid")?,
            account_uuid: get_uuid(row, "account_uuid")?,
            budgeted_amount: get_money(row, "budgeted_amount")?,
            property_uuid: get_opt_uuid(row, "property_uuid")?,
            notes: row.get("notes")?,
        },
        account_type: get_code(row, "account_type", AccountType::parse)?,
        totals: EntryTotals::from_minor_units(row.get("debit_total")?, row.get("credit_total")?),
    })
}

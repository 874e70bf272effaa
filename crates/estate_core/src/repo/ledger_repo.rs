//! Chart of accounts, financial periods and journal persistence.
//!
//! # Responsibility
//! - Store accounts, periods, journal entries and their lines.
//! - Run the posting state machine inside one `IMMEDIATE` transaction.
//! - Aggregate posted lines into account balances and the trial balance.
//!
//! # Invariants
//! - Only lines of posted entries contribute to balances.
//! - Posting checks (non-empty, balanced, open period) and the state flip
//!   happen in the same transaction as the audit record.
//! - Lines of a posted entry are never inserted, updated or deleted.

use super::access_repo::insert_audit;
use super::{
    bool_to_int, ensure_schema_ready, get_bool, get_code, get_money, get_opt_uuid, get_uuid,
    minor, parse_uuid, uuid_text, RepoError, RepoResult,
};
use crate::db::now_epoch_ms;
use crate::model::access::{AuditAction, AuditRecord, UserId};
use crate::model::ledger::{
    Account, AccountId, AccountType, BalanceSide, EntryTotals, FinancialPeriod, JournalEntry,
    JournalEntryId, JournalEntryType, JournalLine, JournalLineId, PeriodId,
};
use crate::model::money::from_minor_units;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const ACCOUNT_SELECT_SQL: &str = "SELECT
    uuid,
    code,
    name,
    name_ar,
    account_type,
    parent_uuid,
    description,
    is_active,
    is_system,
    opening_balance,
    opening_balance_type
FROM accounts";

const ENTRY_SELECT_SQL: &str = "SELECT
    uuid,
    entry_number,
    entry_date,
    entry_type,
    period_uuid,
    reference,
    description,
    property_uuid,
    contract_uuid,
    created_by,
    is_posted,
    posted_at
FROM journal_entries";

/// Guards `account_full_path` against parent cycles.
const ACCOUNT_PATH_MAX_DEPTH: i64 = 32;

/// Result of a posting attempt. Anything but `Posted` leaves the entry as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Posted,
    AlreadyPosted,
    NoLines,
    Unbalanced(EntryTotals),
    PeriodClosed(PeriodId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub is_posted: Option<bool>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

/// Posted activity of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialBalanceRow {
    pub account: Account,
    pub debit_total: Decimal,
    pub credit_total: Decimal,
    /// Signed by account type.
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

pub trait LedgerRepository {
    fn create_account(&self, account: &Account) -> RepoResult<AccountId>;
    fn update_account(&self, account: &Account) -> RepoResult<()>;
    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>>;
    fn get_account_by_code(&self, code: &str) -> RepoResult<Option<Account>>;
    /// Ordered by code.
    fn list_accounts(&self, active_only: bool) -> RepoResult<Vec<Account>>;
    /// `Root > ... > Account` names.
    fn account_full_path(&self, id: AccountId) -> RepoResult<String>;
    /// Posted debit/credit totals, optionally up to and including `as_of`.
    fn account_totals(&self, id: AccountId, as_of: Option<NaiveDate>) -> RepoResult<EntryTotals>;
    /// Fails with `Conflict` for system accounts and accounts that have lines.
    fn delete_account(&self, id: AccountId) -> RepoResult<()>;

    fn create_period(&self, period: &FinancialPeriod) -> RepoResult<PeriodId>;
    fn get_period(&self, id: PeriodId) -> RepoResult<Option<FinancialPeriod>>;
    /// Newest start date first.
    fn list_periods(&self) -> RepoResult<Vec<FinancialPeriod>>;
    fn close_period(&self, id: PeriodId) -> RepoResult<()>;

    /// Inserts an unposted entry with its lines.
    fn create_entry(&self, entry: &JournalEntry, lines: &[JournalLine]) -> RepoResult<JournalEntryId>;
    fn get_entry(&self, id: JournalEntryId) -> RepoResult<Option<JournalEntry>>;
    /// Newest date first, then entry number descending.
    fn list_entries(&self, filter: &EntryFilter) -> RepoResult<Vec<JournalEntry>>;
    fn entry_lines(&self, id: JournalEntryId) -> RepoResult<Vec<JournalLine>>;
    fn entry_totals(&self, id: JournalEntryId) -> RepoResult<EntryTotals>;
    /// Appends a line to an unposted entry.
    fn add_line(&self, line: &JournalLine) -> RepoResult<JournalLineId>;
    /// Removes a line from an unposted entry.
    fn remove_line(&self, line: JournalLineId) -> RepoResult<()>;
    /// Deletes an unposted entry with its lines.
    fn delete_entry(&self, id: JournalEntryId) -> RepoResult<()>;
    fn post_entry(&self, id: JournalEntryId, actor: Option<UserId>) -> RepoResult<PostOutcome>;
    /// Inserts and posts in one transaction; nothing is stored unless posted.
    fn create_posted_entry(
        &self,
        entry: &JournalEntry,
        lines: &[JournalLine],
        actor: Option<UserId>,
    ) -> RepoResult<PostOutcome>;

    fn trial_balance(&self, as_of: Option<NaiveDate>) -> RepoResult<TrialBalance>;
}

/// SQLite-backed ledger repository.
pub struct SqliteLedgerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLedgerRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            &[
                "accounts",
                "financial_periods",
                "journal_entries",
                "journal_entry_lines",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl LedgerRepository for SqliteLedgerRepository<'_> {
    fn create_account(&self, account: &Account) -> RepoResult<AccountId> {
        account.validate()?;
        self.conn.execute(
            "INSERT INTO accounts (
                uuid, code, name, name_ar, account_type, parent_uuid, description, is_active,
                is_system, opening_balance, opening_balance_type
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                account.uuid.to_string(),
                account.code.as_str(),
                account.name.trim(),
                account.name_ar.as_str(),
                account.account_type.as_str(),
                uuid_text(account.parent_uuid),
                account.description.as_str(),
                bool_to_int(account.is_active),
                bool_to_int(account.is_system),
                minor("opening_balance", account.opening_balance)?,
                account.opening_balance_type.as_str(),
            ],
        )?;
        Ok(account.uuid)
    }

    fn update_account(&self, account: &Account) -> RepoResult<()> {
        account.validate()?;
        let changed = self.conn.execute(
            "UPDATE accounts
             SET
                code = ?2,
                name = ?3,
                name_ar = ?4,
                account_type = ?5,
                parent_uuid = ?6,
                description = ?7,
                is_active = ?8,
                opening_balance = ?9,
                opening_balance_type = ?10,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                account.uuid.to_string(),
                account.code.as_str(),
                account.name.trim(),
                account.name_ar.as_str(),
                account.account_type.as_str(),
                uuid_text(account.parent_uuid),
                account.description.as_str(),
                bool_to_int(account.is_active),
                minor("opening_balance", account.opening_balance)?,
                account.opening_balance_type.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("account", account.uuid));
        }
        Ok(())
    }

    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>> {
        let sql = format!("{ACCOUNT_SELECT_SQL} WHERE uuid = ?1;");
        self.conn
            .query_row(&sql, [id.to_string()], |row| Ok(parse_account_row(row)))
            .optional()?
            .transpose()
    }

    fn get_account_by_code(&self, code: &str) -> RepoResult<Option<Account>> {
        let sql = format!("{ACCOUNT_SELECT_SQL} WHERE code = ?1;");
        self.conn
            .query_row(&sql, [code.trim()], |row| Ok(parse_account_row(row)))
            .optional()?
            .transpose()
    }

    fn list_accounts(&self, active_only: bool) -> RepoResult<Vec<Account>> {
        let sql = format!("{ACCOUNT_SELECT_SQL} WHERE (?1 = 0 OR is_active = 1) ORDER BY code ASC;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(parse_account_row(row)?);
        }
        Ok(accounts)
    }

    fn account_full_path(&self, id: AccountId) -> RepoResult<String> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE chain(uuid, name, parent_uuid, depth) AS (
                SELECT uuid, name, parent_uuid, 0 FROM accounts WHERE uuid = ?1
                UNION ALL
                SELECT a.uuid, a.name, a.parent_uuid, chain.depth + 1
                FROM accounts a
                INNER JOIN chain ON a.uuid = chain.parent_uuid
                WHERE chain.depth < ?2
             )
             SELECT name FROM chain ORDER BY depth DESC;",
        )?;
        let names = stmt
            .query_map(params![id.to_string(), ACCOUNT_PATH_MAX_DEPTH], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if names.is_empty() {
            return Err(RepoError::not_found("account", id));
        }
        Ok(names.join(" > "))
    }

    fn account_totals(&self, id: AccountId, as_of: Option<NaiveDate>) -> RepoResult<EntryTotals> {
        let (debit, credit): (i64, i64) = self.conn.query_row(
            "SELECT
                COALESCE(SUM(l.debit_amount), 0),
                COALESCE(SUM(l.credit_amount), 0)
             FROM journal_entry_lines l
             INNER JOIN journal_entries e ON e.uuid = l.entry_uuid
             WHERE l.account_uuid = ?1
               AND e.is_posted = 1
               AND (?2 IS NULL OR e.entry_date <= ?2);",
            params![id.to_string(), as_of],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(EntryTotals::from_minor_units(debit, credit))
    }

    fn delete_account(&self, id: AccountId) -> RepoResult<()> {
        let account = self
            .get_account(id)?
            .ok_or_else(|| RepoError::not_found("account", id))?;
        if account.is_system {
            return Err(RepoError::Conflict(format!(
                "system account {} cannot be deleted",
                account.code
            )));
        }
        let id_text = id.to_string();
        let lines: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM journal_entry_lines WHERE account_uuid = ?1;",
            [id_text.as_str()],
            |row| row.get(0),
        )?;
        if lines > 0 {
            return Err(RepoError::Conflict(format!(
                "account {} has {lines} journal lines",
                account.code
            )));
        }
        self.conn
            .execute("DELETE FROM accounts WHERE uuid = ?1;", [id_text])?;
        Ok(())
    }

    fn create_period(&self, period: &FinancialPeriod) -> RepoResult<PeriodId> {
        period.validate()?;
        self.conn.execute(
            "INSERT INTO financial_periods (uuid, name, start_date, end_date, is_closed, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                period.uuid.to_string(),
                period.name.trim(),
                period.start_date,
                period.end_date,
                bool_to_int(period.is_closed),
                period.notes.as_str(),
            ],
        )?;
        Ok(period.uuid)
    }

    fn get_period(&self, id: PeriodId) -> RepoResult<Option<FinancialPeriod>> {
        self.conn
            .query_row(
                "SELECT uuid, name, start_date, end_date, is_closed, notes
                 FROM financial_periods
                 WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok(parse_period_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_periods(&self) -> RepoResult<Vec<FinancialPeriod>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name, start_date, end_date, is_closed, notes
             FROM financial_periods
             ORDER BY start_date DESC, rowid DESC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut periods = Vec::new();
        while let Some(row) = rows.next()? {
            periods.push(parse_period_row(row)?);
        }
        Ok(periods)
    }

    fn close_period(&self, id: PeriodId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE financial_periods SET is_closed = 1 WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("financial period", id));
        }
        Ok(())
    }

    fn create_entry(&self, entry: &JournalEntry, lines: &[JournalLine]) -> RepoResult<JournalEntryId> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_entry(&tx, entry, lines)?;
        tx.commit()?;
        Ok(entry.uuid)
    }

    fn get_entry(&self, id: JournalEntryId) -> RepoResult<Option<JournalEntry>> {
        load_entry(self.conn, id)
    }

    fn list_entries(&self, filter: &EntryFilter) -> RepoResult<Vec<JournalEntry>> {
        let sql = format!(
            "{ENTRY_SELECT_SQL}
             WHERE (?1 IS NULL OR is_posted = ?1)
               AND (?2 IS NULL OR entry_date >= ?2)
               AND (?3 IS NULL OR entry_date <= ?3)
             ORDER BY entry_date DESC, entry_number DESC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            filter.is_posted.map(bool_to_int),
            filter.from,
            filter.until,
        ])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn entry_lines(&self, id: JournalEntryId) -> RepoResult<Vec<JournalLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, entry_uuid, account_uuid, debit_amount, credit_amount, description
             FROM journal_entry_lines
             WHERE entry_uuid = ?1
             ORDER BY line_order ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            lines.push(JournalLine {
                uuid: get_uuid(row, "uuid")?,
                entry_uuid: get_uuid(row, "entry_uuid")?,
                account_uuid: get_uuid(row, "account_uuid")?,
                debit_amount: get_money(row, "debit_amount")?,
                credit_amount: get_money(row, "credit_amount")?,
                description: row.get("description")?,
            });
        }
        Ok(lines)
    }

    fn entry_totals(&self, id: JournalEntryId) -> RepoResult<EntryTotals> {
        entry_totals(self.conn, id)
    }

    fn add_line(&self, line: &JournalLine) -> RepoResult<JournalLineId> {
        line.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        require_draft(&tx, line.entry_uuid)?;
        let next_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(line_order), -1) + 1
             FROM journal_entry_lines
             WHERE entry_uuid = ?1;",
            [line.entry_uuid.to_string()],
            |row| row.get(0),
        )?;
        insert_line(&tx, line, next_order)?;
        touch_entry(&tx, line.entry_uuid)?;
        tx.commit()?;
        Ok(line.uuid)
    }

    fn remove_line(&self, line: JournalLineId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let entry: Option<String> = tx
            .query_row(
                "SELECT entry_uuid FROM journal_entry_lines WHERE uuid = ?1;",
                [line.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let entry = entry.ok_or_else(|| RepoError::not_found("journal line", line))?;
        let entry = parse_uuid(&entry, "journal_entry_lines.entry_uuid")?;
        require_draft(&tx, entry)?;
        tx.execute(
            "DELETE FROM journal_entry_lines WHERE uuid = ?1;",
            [line.to_string()],
        )?;
        touch_entry(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_entry(&self, id: JournalEntryId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        require_draft(&tx, id)?;
        tx.execute(
            "DELETE FROM journal_entries WHERE uuid = ?1 AND is_posted = 0;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn post_entry(&self, id: JournalEntryId, actor: Option<UserId>) -> RepoResult<PostOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let outcome = post_in_tx(&tx, id, actor)?;
        if outcome == PostOutcome::Posted {
            tx.commit()?;
        }
        Ok(outcome)
    }

    fn create_posted_entry(
        &self,
        entry: &JournalEntry,
        lines: &[JournalLine],
        actor: Option<UserId>,
    ) -> RepoResult<PostOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_entry(&tx, entry, lines)?;
        let outcome = post_in_tx(&tx, entry.uuid, actor)?;
        if outcome == PostOutcome::Posted {
            tx.commit()?;
        }
        Ok(outcome)
    }

    fn trial_balance(&self, as_of: Option<NaiveDate>) -> RepoResult<TrialBalance> {
        let mut stmt = self.conn.prepare(
            "SELECT
                a.uuid AS uuid,
                a.code AS code,
                a.name AS name,
                a.name_ar AS name_ar,
                a.account_type AS account_type,
                a.parent_uuid AS parent_uuid,
                a.description AS description,
                a.is_active AS is_active,
                a.is_system AS is_system,
                a.opening_balance AS opening_balance,
                a.opening_balance_type AS opening_balance_type,
                COALESCE(SUM(t.debit_amount), 0) AS debit_total,
                COALESCE(SUM(t.credit_amount), 0) AS credit_total
             FROM accounts a
             INNER JOIN (
                SELECT l.account_uuid, l.debit_amount, l.credit_amount
                FROM journal_entry_lines l
                INNER JOIN journal_entries e ON e.uuid = l.entry_uuid
                WHERE e.is_posted = 1
                  AND (?1 IS NULL OR e.entry_date <= ?1)
             ) t ON t.account_uuid = a.uuid
             GROUP BY a.uuid
             ORDER BY a.code ASC;",
        )?;
        let mut rows = stmt.query([as_of])?;
        let mut trial = TrialBalance {
            rows: Vec::new(),
            total_debit: Decimal::ZERO,
            total_credit: Decimal::ZERO,
        };
        while let Some(row) = rows.next()? {
            let account = parse_account_row(row)?;
            let debit_total = from_minor_units(row.get("debit_total")?);
            let credit_total = from_minor_units(row.get("credit_total")?);
            trial.total_debit += debit_total;
            trial.total_credit += credit_total;
            trial.rows.push(TrialBalanceRow {
                balance: account.account_type.balance_from_totals(debit_total, credit_total),
                account,
                debit_total,
                credit_total,
            });
        }
        Ok(trial)
    }
}

/// Inserts an entry header (always unposted) and its lines in order.
pub(crate) fn insert_entry(
    conn: &Connection,
    entry: &JournalEntry,
    lines: &[JournalLine],
) -> RepoResult<()> {
    entry.validate()?;
    for line in lines {
        line.validate()?;
        if line.entry_uuid != entry.uuid {
            return Err(RepoError::InvalidData(format!(
                "journal line {} belongs to entry {}, not {}",
                line.uuid, line.entry_uuid, entry.uuid
            )));
        }
    }

    conn.execute(
        "INSERT INTO journal_entries (
            uuid, entry_number, entry_date, entry_type, period_uuid, reference, description,
            property_uuid, contract_uuid, created_by, is_posted, posted_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, NULL);",
        params![
            entry.uuid.to_string(),
            entry.entry_number.trim(),
            entry.entry_date,
            entry.entry_type.as_str(),
            uuid_text(entry.period_uuid),
            entry.reference.as_str(),
            entry.description.as_str(),
            uuid_text(entry.property_uuid),
            uuid_text(entry.contract_uuid),
            uuid_text(entry.created_by),
        ],
    )?;
    for (order, line) in lines.iter().enumerate() {
        insert_line(conn, line, order as i64)?;
    }
    Ok(())
}

/// Posting state machine; the caller owns the transaction.
pub(crate) fn post_in_tx(
    conn: &Connection,
    id: JournalEntryId,
    actor: Option<UserId>,
) -> RepoResult<PostOutcome> {
    let entry = load_entry(conn, id)?.ok_or_else(|| RepoError::not_found("journal entry", id))?;
    if entry.is_posted {
        return Ok(PostOutcome::AlreadyPosted);
    }

    let line_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM journal_entry_lines WHERE entry_uuid = ?1;",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if line_count == 0 {
        return Ok(PostOutcome::NoLines);
    }

    let totals = entry_totals(conn, id)?;
    if !totals.is_balanced() {
        return Ok(PostOutcome::Unbalanced(totals));
    }

    if let Some(period) = closed_period_for(conn, &entry)? {
        return Ok(PostOutcome::PeriodClosed(period));
    }

    conn.execute(
        "UPDATE journal_entries
         SET is_posted = 1,
             posted_at = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?1 AND is_posted = 0;",
        params![id.to_string(), now_epoch_ms()],
    )?;
    insert_audit(
        conn,
        &AuditRecord {
            id: 0,
            user_uuid: actor,
            action: AuditAction::Update,
            object_type: Some("journal_entry".to_string()),
            object_uuid: Some(id),
            description: format!("posted journal entry {}", entry.entry_number),
            changes: Some(serde_json::json!({
                "is_posted": true,
                "total_debit": totals.debit.to_string(),
                "total_credit": totals.credit.to_string(),
            })),
            timestamp: 0,
        },
    )?;
    Ok(PostOutcome::Posted)
}

fn closed_period_for(conn: &Connection, entry: &JournalEntry) -> RepoResult<Option<PeriodId>> {
    let closed: Option<String> = conn
        .query_row(
            "SELECT uuid
             FROM financial_periods
             WHERE is_closed = 1
               AND (uuid = ?1 OR (start_date <= ?2 AND end_date >= ?2))
             ORDER BY start_date ASC
             LIMIT 1;",
            params![uuid_text(entry.period_uuid), entry.entry_date],
            |row| row.get(0),
        )
        .optional()?;
    closed
        .map(|uuid| parse_uuid(&uuid, "financial_periods.uuid"))
        .transpose()
}

fn insert_line(conn: &Connection, line: &JournalLine, line_order: i64) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO journal_entry_lines (
            uuid, entry_uuid, account_uuid, debit_amount, credit_amount, description, line_order
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            line.uuid.to_string(),
            line.entry_uuid.to_string(),
            line.account_uuid.to_string(),
            minor("debit_amount", line.debit_amount)?,
            minor("credit_amount", line.credit_amount)?,
            line.description.as_str(),
            line_order,
        ],
    )?;
    Ok(())
}

fn require_draft(conn: &Connection, id: JournalEntryId) -> RepoResult<()> {
    let posted: Option<i64> = conn
        .query_row(
            "SELECT is_posted FROM journal_entries WHERE uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match posted {
        None => Err(RepoError::not_found("journal entry", id)),
        Some(0) => Ok(()),
        Some(_) => Err(RepoError::Conflict(format!(
            "journal entry {id} is posted and cannot change"
        ))),
    }
}

fn touch_entry(conn: &Connection, id: JournalEntryId) -> RepoResult<()> {
    conn.execute(
        "UPDATE journal_entries SET updated_at = (strftime('%s', 'now') * 1000) WHERE uuid = ?1;",
        [id.to_string()],
    )?;
    Ok(())
}

fn entry_totals(conn: &Connection, id: JournalEntryId) -> RepoResult<EntryTotals> {
    let (debit, credit): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(debit_amount), 0), COALESCE(SUM(credit_amount), 0)
         FROM journal_entry_lines
         WHERE entry_uuid = ?1;",
        [id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(EntryTotals::from_minor_units(debit, credit))
}

fn load_entry(conn: &Connection, id: JournalEntryId) -> RepoResult<Option<JournalEntry>> {
    let sql = format!("{ENTRY_SELECT_SQL} WHERE uuid = ?1;");
    conn.query_row(&sql, [id.to_string()], |row| Ok(parse_entry_row(row)))
        .optional()?
        .transpose()
}

pub(crate) fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    Ok(Account {
        uuid: get_uuid(row, "uuid")?,
        code: row.get("code")?,
        name: row.get("name")?,
        name_ar: row.get("name_ar")?,
        account_type: get_code(row, "account_type", AccountType::parse)?,
        parent_uuid: get_opt_uuid(row, "parent_uuid")?,
        description: row.get("description")?,
        is_active: get_bool(row, "is_active")?,
        is_system: get_bool(row, "is_system")?,
        opening_balance: get_money(row, "opening_balance")?,
        opening_balance_type: get_code(row, "opening_balance_type", BalanceSide::parse)?,
    })
}

pub(crate) fn parse_period_row(row: &Row<'_>) -> RepoResult<FinancialPeriod> {
    Ok(FinancialPeriod {
        uuid: get_uuid(row, "uuid")?,
        name: row.get("name")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        is_closed: get_bool(row, "is_closed")?,
        notes: row.get("notes")?,
    })
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<JournalEntry> {
    Ok(JournalEntry {
        uuid: get_uuid(row, "uuid")?,
        entry_number: row.get("entry_number")?,
        entry_date: row.get("entry_date")?,
        entry_type: get_code(row, "entry_type", JournalEntryType::parse)?,
        period_uuid: get_opt_uuid(row, "period_uuid")?,
        reference: row.get("reference")?,
        description: row.get("description")?,
        property_uuid: get_opt_uuid(row, "property_uuid")?,
        contract_uuid: get_opt_uuid(row, "contract_uuid")?,
        created_by: get_opt_uuid(row, "created_by")?,
        is_posted: get_bool(row, "is_posted")?,
        posted_at: row.get("posted_at")?,
    })
}

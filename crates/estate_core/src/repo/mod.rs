//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//! - Own the column codecs shared by every table (UUID text, minor units,
//!   enum codes, 0/1 flags).
//!
//! # Invariants
//! - Repository writes call the record's `validate()` before persistence.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Multi-table writes run inside one `IMMEDIATE` transaction.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::money::{self, from_minor_units};
use crate::model::ValidationError;
use rusqlite::{ffi, Connection, ErrorCode, Row};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

pub mod access_repo;
pub mod budget_repo;
pub mod contract_repo;
pub mod invoice_repo;
pub mod ledger_repo;
pub mod maintenance_repo;
pub mod notification_repo;
pub mod property_record_repo;
pub mod property_repo;
pub mod report_repo;
pub mod sales_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error shared by every SQLite repository.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    /// Unique key collision or a write refused because of existing state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Foreign-key, check or not-null constraint rejected the write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("required table missing: {0}")]
    MissingRequiredTable(&'static str),
    #[error("connection schema version {actual} is older than required {expected}")]
    UninitializedConnection { expected: u32, actual: u32 },
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                let message = message
                    .clone()
                    .unwrap_or_else(|| "constraint failed".to_string());
                match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Self::Conflict(message)
                    }
                    _ => Self::ConstraintViolation(message),
                }
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Pulls an out-of-range page back to the last page.
    pub fn clamp_to(self, total: u64) -> Self {
        let last = last_page(total, self.per_page);
        Self {
            page: self.page.clamp(1, last),
            per_page: self.per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn num_pages(&self) -> u32 {
        last_page(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.num_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

fn last_page(total: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    let pages = total.div_ceil(per_page).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Rejects connections that have not been migrated to the current schema.
pub(crate) fn ensure_schema_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let actual = schema_version(conn)?;
    let expected = latest_version();
    if actual < expected {
        return Err(RepoError::UninitializedConnection { expected, actual });
    }
    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn minor(field: &'static str, amount: Decimal) -> RepoResult<i64> {
    money::to_minor_units(amount)
        .map_err(|source| RepoError::Validation(ValidationError::Money { field, source }))
}

pub(crate) fn opt_minor(field: &'static str, amount: Option<Decimal>) -> RepoResult<Option<i64>> {
    amount.map(|value| minor(field, value)).transpose()
}

pub(crate) fn get_money(row: &Row<'_>, column: &str) -> RepoResult<Decimal> {
    Ok(from_minor_units(row.get::<_, i64>(column)?))
}

pub(crate) fn get_opt_money(row: &Row<'_>, column: &str) -> RepoResult<Option<Decimal>> {
    Ok(row.get::<_, Option<i64>>(column)?.map(from_minor_units))
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn get_uuid(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

pub(crate) fn get_opt_uuid(row: &Row<'_>, column: &str) -> RepoResult<Option<Uuid>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => parse_uuid(&text, column).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn get_code<T>(
    row: &Row<'_>,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> RepoResult<T> {
    let text: String = row.get(column)?;
    parse(&text).ok_or_else(|| RepoError::InvalidData(format!("invalid code `{text}` in {column}")))
}

pub(crate) fn get_bool(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn uuid_text(value: Option<Uuid>) -> Option<String> {
    value.map(|uuid| uuid.to_string())
}

//! Rental contract persistence.
//!
//! # Responsibility
//! - Store contracts and move them through their lifecycle together with the
//!   leased property's status.
//!
//! # Invariants
//! - Contract status and property status change in the same transaction.
//! - A property is released back to `available` only when it has no other
//!   active contract.

use super::property_repo::{property_status, update_property_status};
use super::{ensure_schema_ready, get_code, get_money, get_uuid, minor, RepoError, RepoResult};
use crate::model::contract::{Contract, ContractId, ContractStatus};
use crate::model::property::{PropertyId, PropertyStatus};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const CONTRACT_SELECT_SQL: &str = "SELECT
    c.uuid AS uuid,
    c.contract_number AS contract_number,
    c.property_uuid AS property_uuid,
    c.client_uuid AS client_uuid,
    c.start_date AS start_date,
    c.end_date AS end_date,
    c.monthly_rent AS monthly_rent,
    c.deposit AS deposit,
    c.status AS status
FROM contracts c";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractFilter {
    pub property: Option<PropertyId>,
    pub status: Option<ContractStatus>,
}

/// Contract with the display fields used by notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractNotice {
    pub contract: Contract,
    pub property_code: String,
    pub client_name: String,
}

pub trait ContractRepository {
    fn create_contract(&self, contract: &Contract) -> RepoResult<ContractId>;
    fn get_contract(&self, id: ContractId) -> RepoResult<Option<Contract>>;
    /// Newest start date first.
    fn list_contracts(&self, filter: &ContractFilter) -> RepoResult<Vec<Contract>>;
    /// Sets the contract status and, when given, the property status atomically.
    fn set_status(
        &self,
        id: ContractId,
        status: ContractStatus,
        property_status: Option<PropertyStatus>,
    ) -> RepoResult<()>;
    /// Ends a contract and releases its property when nothing else is active.
    fn close_contract(&self, id: ContractId, status: ContractStatus) -> RepoResult<()>;
    /// Marks active contracts whose end date is before `today` as expired.
    fn expire_ended(&self, today: NaiveDate) -> RepoResult<Vec<ContractId>>;
    /// Active contracts ending within `[from, until]`, soonest first.
    fn expiring_between(&self, from: NaiveDate, until: NaiveDate)
        -> RepoResult<Vec<ContractNotice>>;
}

/// SQLite-backed contract repository.
pub struct SqliteContractRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContractRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["contracts", "properties", "clients"])?;
        Ok(Self { conn })
    }
}

impl ContractRepository for SqliteContractRepository<'_> {
    fn create_contract(&self, contract: &Contract) -> RepoResult<ContractId> {
        contract.validate()?;
        self.conn.execute(
            "INSERT INTO contracts (
                uuid, contract_number, property_uuid, client_uuid, start_date, end_date,
                monthly_rent, deposit, status
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                contract.uuid.to_string(),
                contract.contract_number.trim(),
                contract.property_uuid.to_string(),
                contract.client_uuid.to_string(),
                contract.start_date,
                contract.end_date,
                minor("monthly_rent", contract.monthly_rent)?,
                minor("deposit", contract.deposit)?,
                contract.status.as_str(),
            ],
        )?;
        Ok(contract.uuid)
    }

    fn get_contract(&self, id: ContractId) -> RepoResult<Option<Contract>> {
        let sql = format!("{CONTRACT_SELECT_SQL} WHERE c.uuid = ?1;");
        self.conn
            .query_row(&sql, [id.to_string()], |row| Ok(parse_contract_row(row)))
            .optional()?
            .transpose()
    }

    fn list_contracts(&self, filter: &ContractFilter) -> RepoResult<Vec<Contract>> {
        let sql = format!(
            "{CONTRACT_SELECT_SQL}
             WHERE (?1 IS NULL OR c.property_uuid = ?1)
               AND (?2 IS NULL OR c.status = ?2)
             ORDER BY c.start_date DESC, c.rowid DESC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            filter.property.map(|id| id.to_string()),
            filter.status.map(ContractStatus::as_str),
        ])?;
        let mut contracts = Vec::new();
        while let Some(row) = rows.next()? {
            contracts.push(parse_contract_row(row)?);
        }
        Ok(contracts)
    }

    fn set_status(
        &self,
        id: ContractId,
        status: ContractStatus,
        property_status: Option<PropertyStatus>,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let property = update_contract_status(&tx, id, status)?;
        if let Some(property_status) = property_status {
            update_property_status(&tx, property, property_status)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn close_contract(&self, id: ContractId, status: ContractStatus) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let property = update_contract_status(&tx, id, status)?;
        release_property_if_idle(&tx, property)?;
        tx.commit()?;
        Ok(())
    }

    fn expire_ended(&self, today: NaiveDate) -> RepoResult<Vec<ContractId>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let ended = {
            let mut stmt = tx.prepare(
                "SELECT uuid, property_uuid
                 FROM contracts
                 WHERE status = 'active'
                   AND end_date IS NOT NULL
                   AND end_date < ?1
                 ORDER BY end_date ASC, rowid ASC;",
            )?;
            let mut rows = stmt.query([today])?;
            let mut ended = Vec::new();
            while let Some(row) = rows.next()? {
                ended.push((get_uuid(row, "uuid")?, get_uuid(row, "property_uuid")?));
            }
            ended
        };

        for (contract, property) in &ended {
            update_contract_status(&tx, *contract, ContractStatus::Expired)?;
            release_property_if_idle(&tx, *property)?;
        }
        tx.commit()?;
        Ok(ended.into_iter().map(|(contract, _)| contract).collect())
    }

    fn expiring_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> RepoResult<Vec<ContractNotice>> {
        let sql = format!(
            "SELECT
                c.uuid AS uuid,
                c.contract_number AS contract_number,
                c.property_uuid AS property_uuid,
                c.client_uuid AS client_uuid,
                c.start_date AS start_date,
                c.end_date AS end_date,
                c.monthly_rent AS monthly_rent,
                c.deposit AS deposit,
                c.status AS status,
                p.code AS property_code,
                cl.name AS client_name
             FROM contracts c
             INNER JOIN properties p ON p.uuid = c.property_uuid
             INNER JOIN clients cl ON cl.uuid = c.client_uuid
             WHERE c.status = '{}'
               AND c.end_date IS NOT NULL
               AND c.end_date >= ?1
               AND c.end_date <= ?2
             ORDER BY c.end_date ASC, c.rowid ASC;",
            ContractStatus::Active.as_str()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![from, until])?;
        let mut notices = Vec::new();
        while let Some(row) = rows.next()? {
            notices.push(ContractNotice {
                contract: parse_contract_row(row)?,
                property_code: row.get("property_code")?,
                client_name: row.get("client_name")?,
            });
        }
        Ok(notices)
    }
}

/// Updates one contract's status and returns its property.
fn update_contract_status(
    conn: &Connection,
    id: ContractId,
    status: ContractStatus,
) -> RepoResult<PropertyId> {
    let property: Option<String> = conn
        .query_row(
            "UPDATE contracts
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
             RETURNING property_uuid;",
            params![id.to_string(), status.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    let property = property.ok_or_else(|| RepoError::not_found("contract", id))?;
    super::parse_uuid(&property, "contracts.property_uuid")
}

fn release_property_if_idle(conn: &Connection, property: PropertyId) -> RepoResult<()> {
    let active: i64 = conn.query_row(
        "SELECT COUNT(*) FROM contracts WHERE property_uuid = ?1 AND status = 'active';",
        [property.to_string()],
        |row| row.get(0),
    )?;
    if active == 0 && property_status(conn, property)? == PropertyStatus::Rented {
        update_property_status(conn, property, PropertyStatus::Available)?;
    }
    Ok(())
}

fn parse_contract_row(row: &Row<'_>) -> RepoResult<Contract> {
    Ok(Contract {
        uuid: get_uuid(row, "uuid")?,
        contract_number: row.get("contract_number")?,
        property_uuid: get_uuid(row, "property_uuid")?,
        client_uuid: get_uuid(row, "client_uuid")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        monthly_rent: get_money(row, "monthly_rent")?,
        deposit: get_money(row, "deposit")?,
        status: get_code(row, "status", ContractStatus::parse)?,
    })
}

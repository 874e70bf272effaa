//! Reservation and sales contract persistence.
//!
//! # Invariants
//! - Status changes that affect the property update both rows in one
//!   transaction.
//! - Converting a reservation inserts the sales contract and marks the
//!   reservation `converted` atomically.
//! - A property holds at most one confirmed reservation. Confirming checks the
//!   property inside the same transaction that marks it reserved.

use super::property_repo::{property_status, update_property_status};
use super::{
    ensure_schema_ready, get_code, get_money, get_opt_uuid, get_uuid, minor, uuid_text, RepoError,
    RepoResult,
};
use crate::model::property::{PropertyId, PropertyStatus};
use crate::model::sales::{
    Reservation, ReservationId, ReservationStatus, SalesContract, SalesContractId,
    SalesContractStatus,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

/// Result of trying to confirm a pending reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationClaim {
    Confirmed,
    NotPending(ReservationStatus),
    PropertyUnavailable { code: String, status: PropertyStatus },
}

pub trait SalesRepository {
    fn create_reservation(&self, reservation: &Reservation) -> RepoResult<ReservationId>;
    fn get_reservation(&self, id: ReservationId) -> RepoResult<Option<Reservation>>;
    fn list_reservations(&self, status: Option<ReservationStatus>) -> RepoResult<Vec<Reservation>>;
    /// Confirms a pending reservation and marks an available property reserved.
    /// Nothing is written unless the outcome is `Confirmed`.
    fn confirm_reservation(&self, id: ReservationId) -> RepoResult<ReservationClaim>;
    /// Moves an open reservation to `status`. A reserved property is released
    /// when the closed reservation was its confirmed claim and no other
    /// confirmed reservation remains.
    fn close_reservation(&self, id: ReservationId, status: ReservationStatus) -> RepoResult<()>;
    /// Inserts `contract` and marks its reservation converted.
    fn convert_reservation(&self, contract: &SalesContract) -> RepoResult<SalesContractId>;

    fn create_sales_contract(&self, contract: &SalesContract) -> RepoResult<SalesContractId>;
    fn get_sales_contract(&self, id: SalesContractId) -> RepoResult<Option<SalesContract>>;
    fn list_sales_contracts(
        &self,
        status: Option<SalesContractStatus>,
    ) -> RepoResult<Vec<SalesContract>>;
    fn set_sales_contract_status(
        &self,
        id: SalesContractId,
        status: SalesContractStatus,
        property_status: Option<PropertyStatus>,
    ) -> RepoResult<()>;
}

/// SQLite-backed sales repository.
pub struct SqliteSalesRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSalesRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["reservations", "sales_contracts", "properties"])?;
        Ok(Self { conn })
    }
}

impl SalesRepository for SqliteSalesRepository<'_> {
    fn create_reservation(&self, reservation: &Reservation) -> RepoResult<ReservationId> {
        reservation.validate()?;
        self.conn.execute(
            "INSERT INTO reservations (
                uuid, property_uuid, client_uuid, reservation_date, expiry_date,
                deposit_amount, status
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                reservation.uuid.to_string(),
                reservation.property_uuid.to_string(),
                reservation.client_uuid.to_string(),
                reservation.reservation_date,
                reservation.expiry_date,
                minor("deposit_amount", reservation.deposit_amount)?,
                reservation.status.as_str(),
            ],
        )?;
        Ok(reservation.uuid)
    }

    fn get_reservation(&self, id: ReservationId) -> RepoResult<Option<Reservation>> {
        self.conn
            .query_row(
                "SELECT uuid, property_uuid, client_uuid, reservation_date, expiry_date,
                        deposit_amount, status
                 FROM reservations
                 WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok(parse_reservation_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_reservations(&self, status: Option<ReservationStatus>) -> RepoResult<Vec<Reservation>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, property_uuid, client_uuid, reservation_date, expiry_date,
                    deposit_amount, status
             FROM reservations
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY reservation_date DESC, rowid DESC;",
        )?;
        let mut rows = stmt.query([status.map(ReservationStatus::as_str)])?;
        let mut reservations = Vec::new();
        while let Some(row) = rows.next()? {
            reservations.push(parse_reservation_row(row)?);
        }
        Ok(reservations)
    }

    fn confirm_reservation(&self, id: ReservationId) -> RepoResult<ReservationClaim> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current: Option<(String, String, String)> = tx
            .query_row(
                "SELECT r.status, p.code, p.status
                 FROM reservations r
                 INNER JOIN properties p ON p.uuid = r.property_uuid
                 WHERE r.uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (reservation_status, code, status) =
            current.ok_or_else(|| RepoError::not_found("reservation", id))?;
        let reservation_status = parse_code(
            &reservation_status,
            "reservations.status",
            ReservationStatus::parse,
        )?;
        if reservation_status != ReservationStatus::Pending {
            return Ok(ReservationClaim::NotPending(reservation_status));
        }
        let status = parse_code(&status, "properties.status", PropertyStatus::parse)?;
        if status != PropertyStatus::Available {
            return Ok(ReservationClaim::PropertyUnavailable { code, status });
        }
        let property = update_reservation_status(&tx, id, ReservationStatus::Confirmed)?;
        update_property_status(&tx, property, PropertyStatus::Reserved)?;
        tx.commit()?;
        Ok(ReservationClaim::Confirmed)
    }

    fn close_reservation(&self, id: ReservationId, status: ReservationStatus) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT status FROM reservations WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let previous = previous.ok_or_else(|| RepoError::not_found("reservation", id))?;
        let previous = parse_code(&previous, "reservations.status", ReservationStatus::parse)?;
        let property = update_reservation_status(&tx, id, status)?;
        if previous == ReservationStatus::Confirmed {
            release_property_if_unclaimed(&tx, property)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn convert_reservation(&self, contract: &SalesContract) -> RepoResult<SalesContractId> {
        let reservation = contract.reservation_uuid.ok_or_else(|| {
            RepoError::InvalidData("sales contract has no reservation to convert".to_string())
        })?;
        contract.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_sales_contract(&tx, contract)?;
        update_reservation_status(&tx, reservation, ReservationStatus::Converted)?;
        tx.commit()?;
        Ok(contract.uuid)
    }

    fn create_sales_contract(&self, contract: &SalesContract) -> RepoResult<SalesContractId> {
        contract.validate()?;
        insert_sales_contract(self.conn, contract)?;
        Ok(contract.uuid)
    }

    fn get_sales_contract(&self, id: SalesContractId) -> RepoResult<Option<SalesContract>> {
        self.conn
            .query_row(
                "SELECT uuid, contract_number, property_uuid, client_uuid, reservation_uuid,
                        sale_price, down_payment, contract_date, status
                 FROM sales_contracts
                 WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok(parse_sales_contract_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_sales_contracts(
        &self,
        status: Option<SalesContractStatus>,
    ) -> RepoResult<Vec<SalesContract>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, contract_number, property_uuid, client_uuid, reservation_uuid,
                    sale_price, down_payment, contract_date, status
             FROM sales_contracts
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY contract_date DESC, rowid DESC;",
        )?;
        let mut rows = stmt.query([status.map(SalesContractStatus::as_str)])?;
        let mut contracts = Vec::new();
        while let Some(row) = rows.next()? {
            contracts.push(parse_sales_contract_row(row)?);
        }
        Ok(contracts)
    }

    fn set_sales_contract_status(
        &self,
        id: SalesContractId,
        status: SalesContractStatus,
        property_status: Option<PropertyStatus>,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let property: Option<String> = tx
            .query_row(
                "UPDATE sales_contracts
                 SET status = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                 RETURNING property_uuid;",
                params![id.to_string(), status.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let property = property.ok_or_else(|| RepoError::not_found("sales contract", id))?;
        if let Some(property_status) = property_status {
            let property = super::parse_uuid(&property, "sales_contracts.property_uuid")?;
            update_property_status(&tx, property, property_status)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn insert_sales_contract(conn: &Connection, contract: &SalesContract) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO sales_contracts (
            uuid, contract_number, property_uuid, client_uuid, reservation_uuid, sale_price,
            down_payment, contract_date, status
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            contract.uuid.to_string(),
            contract.contract_number.trim(),
            contract.property_uuid.to_string(),
            contract.client_uuid.to_string(),
            uuid_text(contract.reservation_uuid),
            minor("sale_price", contract.sale_price)?,
            minor("down_payment", contract.down_payment)?,
            contract.contract_date,
            contract.status.as_str(),
        ],
    )?;
    Ok(())
}

fn update_reservation_status(
    conn: &Connection,
    id: ReservationId,
    status: ReservationStatus,
) -> RepoResult<PropertyId> {
    let property: Option<String> = conn
        .query_row(
            "UPDATE reservations
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
             RETURNING property_uuid;",
            params![id.to_string(), status.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    let property = property.ok_or_else(|| RepoError::not_found("reservation", id))?;
    super::parse_uuid(&property, "reservations.property_uuid")
}

fn release_property_if_unclaimed(conn: &Connection, property: PropertyId) -> RepoResult<()> {
    let confirmed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reservations WHERE property_uuid = ?1 AND status = 'confirmed';",
        [property.to_string()],
        |row| row.get(0),
    )?;
    if confirmed == 0 && property_status(conn, property)? == PropertyStatus::Reserved {
        update_property_status(conn, property, PropertyStatus::Available)?;
    }
    Ok(())
}

fn parse_code<T>(raw: &str, column: &str, parse: fn(&str) -> Option<T>) -> RepoResult<T> {
    parse(raw).ok_or_else(|| RepoError::InvalidData(format!("invalid code `{raw}` in {column}")))
}

fn parse_reservation_row(row: &Row<'_>) -> RepoResult<Reservation> {
    Ok(Reservation {
        uuid: get_uuid(row, "uuid")?,
        property_uuid: get_uuid(row, "property_uuid")?,
        client_uuid: get_uuid(row, "client_uuid")?,
        reservation_date: row.get("reservation_date")?,
        expiry_date: row.get("expiry_date")?,
        deposit_amount: get_money(row, "deposit_amount")?,
        status: get_code(row, "status", ReservationStatus::parse)?,
    })
}

fn parse_sales_contract_row(row: &Row<'_>) -> RepoResult<SalesContract> {
    Ok(SalesContract {
        uuid: get_uuid(row, "uuid")?,
        contract_number: row.get("contract_number")?,
        property_uuid: get_uuid(row, "property_uuid")?,
        client_uuid: get_uuid(row, "client_uuid")?,
        reservation_uuid: get_opt_uuid(row, "reservation_uuid")?,
        sale_price: get_money(row, "sale_price")?,
        down_payment: get_money(row, "down_payment")?,
        contract_date: row.get("contract_date")?,
        status: get_code(row, "status", SalesContractStatus::parse)?,
    })
}

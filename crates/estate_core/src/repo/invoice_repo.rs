//! Invoice and payment persistence.
//!
//! # Invariants
//! - Invoice header and items are written in one transaction.
//! - Recording a payment updates the invoice, inserts the payment and posts
//!   its journal entry atomically; any rejection leaves nothing behind.
//! - Quantities and rates are stored in hundredths like money.

use super::ledger_repo::{insert_entry, post_in_tx, PostOutcome};
use super::{
    ensure_schema_ready, get_code, get_money, get_opt_uuid, get_uuid, minor, uuid_text, RepoError,
    RepoResult,
};
use crate::model::access::UserId;
use crate::model::contract::ContractId;
use crate::model::invoice::{
    Invoice, InvoiceId, InvoiceItem, InvoiceStatus, InvoiceType, Payment, PaymentId,
    PaymentMethod, PaymentType,
};
use crate::model::ledger::{JournalEntry, JournalLine};
use crate::model::money::from_minor_units;
use crate::model::property::PropertyId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const INVOICE_SELECT_SQL: &str = "SELECT
    uuid,
    invoice_number,
    invoice_type,
    invoice_date,
    due_date,
    property_uuid,
    contract_uuid,
    subtotal,
    tax_amount,
    discount_amount,
    total_amount,
    paid_amount,
    status,
    notes,
    terms_and_conditions,
    journal_entry_uuid,
    created_by
FROM invoices";

const PAYMENT_SELECT_SQL: &str = "SELECT
    uuid,
    payment_number,
    payment_type,
    payment_date,
    payment_method,
    amount,
    invoice_uuid,
    reference_number,
    notes,
    journal_entry_uuid,
    created_by
FROM payments";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub invoice_type: Option<InvoiceType>,
    pub property: Option<PropertyId>,
    pub contract: Option<ContractId>,
}

/// Journal entry created together with a payment.
#[derive(Debug, Clone, Copy)]
pub struct PaymentPosting<'a> {
    pub entry: &'a JournalEntry,
    pub lines: &'a [JournalLine],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Stored; carries the invoice's new status when one was linked.
    Recorded(Option<InvoiceStatus>),
    InvoiceNotCollectible(InvoiceStatus),
    Overpayment { balance: Decimal },
    PostingRejected(PostOutcome),
}

pub trait InvoiceRepository {
    /// Stores header and items as given; totals are the caller's job.
    fn create_invoice(&self, invoice: &Invoice) -> RepoResult<InvoiceId>;
    /// Replaces header and items of a draft invoice.
    fn update_draft(&self, invoice: &Invoice) -> RepoResult<()>;
    fn get_invoice(&self, id: InvoiceId) -> RepoResult<Option<Invoice>>;
    /// Newest invoice date first; items are not loaded.
    fn list_invoices(&self, filter: &InvoiceFilter) -> RepoResult<Vec<Invoice>>;
    fn set_status(&self, id: InvoiceId, status: InvoiceStatus) -> RepoResult<()>;
    /// Moves issued/partial invoices due before `today` to overdue.
    fn mark_overdue(&self, today: NaiveDate) -> RepoResult<Vec<InvoiceId>>;
    /// Collectible invoices due on or before `until`, soonest first.
    fn collectible_due_by(&self, until: NaiveDate) -> RepoResult<Vec<Invoice>>;

    fn record_payment(
        &self,
        payment: &Payment,
        posting: Option<PaymentPosting<'_>>,
        actor: Option<UserId>,
    ) -> RepoResult<PaymentOutcome>;
    fn get_payment(&self, id: PaymentId) -> RepoResult<Option<Payment>>;
    /// Newest payment date first.
    fn list_payments(&self, invoice: Option<InvoiceId>) -> RepoResult<Vec<Payment>>;
}

/// SQLite-backed invoicing repository.
pub struct SqliteInvoiceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInvoiceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            &[
                "invoices",
                "invoice_items",
                "payments",
                "journal_entries",
                "journal_entry_lines",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl InvoiceRepository for SqliteInvoiceRepository<'_> {
    fn create_invoice(&self, invoice: &Invoice) -> RepoResult<InvoiceId> {
        invoice.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO invoices (
                uuid, invoice_number, invoice_type, invoice_date, due_date, property_uuid,
                contract_uuid, subtotal, tax_amount, discount_amount, total_amount, paid_amount,
                status, notes, terms_and_conditions, journal_entry_uuid, created_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
            params![
                invoice.uuid.to_string(),
                invoice.invoice_number.trim(),
                invoice.invoice_type.as_str(),
                invoice.invoice_date,
                invoice.due_date,
                uuid_text(invoice.property_uuid),
                uuid_text(invoice.contract_uuid),
                minor("subtotal", invoice.subtotal)?,
                minor("tax_amount", invoice.tax_amount)?,
                minor("discount_amount", invoice.discount_amount)?,
                minor("total_amount", invoice.total_amount)?,
                minor("paid_amount", invoice.paid_amount)?,
                invoice.status.as_str(),
                invoice.notes.as_str(),
                invoice.terms_and_conditions.as_str(),
                uuid_text(invoice.journal_entry_uuid),
                uuid_text(invoice.created_by),
            ],
        )?;
        insert_items(&tx, invoice.uuid, &invoice.items)?;
        tx.commit()?;
        Ok(invoice.uuid)
    }

    fn update_draft(&self, invoice: &Invoice) -> RepoResult<()> {
        invoice.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE invoices
             SET
                invoice_number = ?2,
                invoice_type = ?3,
                invoice_date = ?4,
                due_date = ?5,
                property_uuid = ?6,
                contract_uuid = ?7,
                subtotal = ?8,
                tax_amount = ?9,
                discount_amount = ?10,
                total_amount = ?11,
                notes = ?12,
                terms_and_conditions = ?13,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1 AND status = 'draft';",
            params![
                invoice.uuid.to_string(),
                invoice.invoice_number.trim(),
                invoice.invoice_type.as_str(),
                invoice.invoice_date,
                invoice.due_date,
                uuid_text(invoice.property_uuid),
                uuid_text(invoice.contract_uuid),
                minor("subtotal", invoice.subtotal)?,
                minor("tax_amount", invoice.tax_amount)?,
                minor("discount_amount", invoice.discount_amount)?,
                minor("total_amount", invoice.total_amount)?,
                invoice.notes.as_str(),
                invoice.terms_and_conditions.as_str(),
            ],
        )?;
        if changed == 0 {
            return match load_status(&tx, invoice.uuid)? {
                None => Err(RepoError::not_found("invoice", invoice.uuid)),
                Some(status) => Err(RepoError::Conflict(format!(
                    "invoice {} is {status} and cannot be edited",
                    invoice.invoice_number
                ))),
            };
        }
        tx.execute(
            "DELETE FROM invoice_items WHERE invoice_uuid = ?1;",
            [invoice.uuid.to_string()],
        )?;
        insert_items(&tx, invoice.uuid, &invoice.items)?;
        tx.commit()?;
        Ok(())
    }

    fn get_invoice(&self, id: InvoiceId) -> RepoResult<Option<Invoice>> {
        let sql = format!("{INVOICE_SELECT_SQL} WHERE uuid = ?1;");
        let invoice = self
            .conn
            .query_row(&sql, [id.to_string()], |row| Ok(parse_invoice_row(row)))
            .optional()?
            .transpose()?;
        let Some(mut invoice) = invoice else {
            return Ok(None);
        };
        invoice.items = load_items(self.conn, id)?;
        Ok(Some(invoice))
    }

    fn list_invoices(&self, filter: &InvoiceFilter) -> RepoResult<Vec<Invoice>> {
        let sql = format!(
            "{INVOICE_SELECT_SQL}
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR invoice_type = ?2)
               AND (?3 IS NULL OR property_uuid = ?3)
               AND (?4 IS NULL OR contract_uuid = ?4)
             ORDER BY invoice_date DESC, invoice_number DESC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            filter.status.map(InvoiceStatus::as_str),
            filter.invoice_type.map(InvoiceType::as_str),
            filter.property.map(|id| id.to_string()),
            filter.contract.map(|id| id.to_string()),
        ])?;
        let mut invoices = Vec::new();
        while let Some(row) = rows.next()? {
            invoices.push(parse_invoice_row(row)?);
        }
        Ok(invoices)
    }

    fn set_status(&self, id: InvoiceId, status: InvoiceStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invoices
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), status.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("invoice", id));
        }
        Ok(())
    }

    fn mark_overdue(&self, today: NaiveDate) -> RepoResult<Vec<InvoiceId>> {
        let mut stmt = self.conn.prepare(
            "UPDATE invoices
             SET status = 'overdue',
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE status IN ('issued', 'partial')
               AND due_date < ?1
             RETURNING uuid;",
        )?;
        let mut rows = stmt.query([today])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(get_uuid(row, "uuid")?);
        }
        Ok(ids)
    }

    fn collectible_due_by(&self, until: NaiveDate) -> RepoResult<Vec<Invoice>> {
        let sql = format!(
            "{INVOICE_SELECT_SQL}
             WHERE status IN ('issued', 'partial', 'overdue')
               AND due_date <= ?1
             ORDER BY due_date ASC, invoice_number ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([until])?;
        let mut invoices = Vec::new();
        while let Some(row) = rows.next()? {
            invoices.push(parse_invoice_row(row)?);
        }
        Ok(invoices)
    }

    fn record_payment(
        &self,
        payment: &Payment,
        posting: Option<PaymentPosting<'_>>,
        actor: Option<UserId>,
    ) -> RepoResult<PaymentOutcome> {
        payment.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let mut new_status = None;
        if let Some(invoice) = payment.invoice_uuid {
            let (status, total, paid) = load_balance(&tx, invoice)?
                .ok_or_else(|| RepoError::not_found("invoice", invoice))?;
            if !status.is_collectible() {
                return Ok(PaymentOutcome::InvoiceNotCollectible(status));
            }
            let balance = total - paid;
            if payment.amount > balance {
                return Ok(PaymentOutcome::Overpayment { balance });
            }
            let paid = paid + payment.amount;
            let status = if paid == total {
                InvoiceStatus::Paid
            } else {
                InvoiceStatus::Partial
            };
            tx.execute(
                "UPDATE invoices
                 SET paid_amount = ?2,
                     status = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![
                    invoice.to_string(),
                    minor("paid_amount", paid)?,
                    status.as_str()
                ],
            )?;
            new_status = Some(status);
        }

        let mut journal_entry = payment.journal_entry_uuid;
        if let Some(posting) = posting {
            insert_entry(&tx, posting.entry, posting.lines)?;
            let outcome = post_in_tx(&tx, posting.entry.uuid, actor)?;
            if outcome != PostOutcome::Posted {
                return Ok(PaymentOutcome::PostingRejected(outcome));
            }
            journal_entry = Some(posting.entry.uuid);
        }

        tx.execute(
            "INSERT INTO payments (
                uuid, payment_number, payment_type, payment_date, payment_method, amount,
                invoice_uuid, reference_number, notes, journal_entry_uuid, created_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                payment.uuid.to_string(),
                payment.payment_number.trim(),
                payment.payment_type.as_str(),
                payment.payment_date,
                payment.payment_method.as_str(),
                minor("amount", payment.amount)?,
                uuid_text(payment.invoice_uuid),
                payment.reference_number.as_str(),
                payment.notes.as_str(),
                uuid_text(journal_entry),
                uuid_text(payment.created_by),
            ],
        )?;
        tx.commit()?;
        Ok(PaymentOutcome::Recorded(new_status))
    }

    fn get_payment(&self, id: PaymentId) -> RepoResult<Option<Payment>> {
        let sql = format!("{PAYMENT_SELECT_SQL} WHERE uuid = ?1;");
        self.conn
            .query_row(&sql, [id.to_string()], |row| Ok(parse_payment_row(row)))
            .optional()?
            .transpose()
    }

    fn list_payments(&self, invoice: Option<InvoiceId>) -> RepoResult<Vec<Payment>> {
        let sql = format!(
            "{PAYMENT_SELECT_SQL}
             WHERE (?1 IS NULL OR invoice_uuid = ?1)
             ORDER BY payment_date DESC, rowid DESC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([invoice.map(|id| id.to_string())])?;
        let mut payments = Vec::new();
        while let Some(row) = rows.next()? {
            payments.push(parse_payment_row(row)?);
        }
        Ok(payments)
    }
}

fn insert_items(conn: &Connection, invoice: InvoiceId, items: &[InvoiceItem]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO invoice_items (
            uuid, invoice_uuid, description, quantity, unit_price, tax_rate, discount_rate,
            total, account_uuid, line_order
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
    )?;
    for (order, item) in items.iter().enumerate() {
        stmt.execute(params![
            item.uuid.to_string(),
            invoice.to_string(),
            item.description.trim(),
            minor("quantity", item.quantity)?,
            minor("unit_price", item.unit_price)?,
            minor("tax_rate", item.tax_rate)?,
            minor("discount_rate", item.discount_rate)?,
            minor("total", item.total)?,
            uuid_text(item.account_uuid),
            order as i64,
        ])?;
    }
    Ok(())
}

fn load_items(conn: &Connection, invoice: InvoiceId) -> RepoResult<Vec<InvoiceItem>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, description, quantity, unit_price, tax_rate, discount_rate, total,
                account_uuid
         FROM invoice_items
         WHERE invoice_uuid = ?1
         ORDER BY line_order ASC, rowid ASC;",
    )?;
    let mut rows = stmt.query([invoice.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(InvoiceItem {
            uuid: get_uuid(row, "uuid")?,
            description: row.get("description")?,
            quantity: get_money(row, "quantity")?,
            unit_price: get_money(row, "unit_price")?,
            tax_rate: get_money(row, "tax_rate")?,
            discount_rate: get_money(row, "discount_rate")?,
            total: get_money(row, "total")?,
            account_uuid: get_opt_uuid(row, "account_uuid")?,
        });
    }
    Ok(items)
}

fn load_status(conn: &Connection, id: InvoiceId) -> RepoResult<Option<InvoiceStatus>> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM invoices WHERE uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    status
        .map(|value| {
            InvoiceStatus::parse(&value)
                .ok_or_else(|| RepoError::InvalidData(format!("invalid invoice status `{value}`")))
        })
        .transpose()
}

fn load_balance(
    conn: &Connection,
    id: InvoiceId,
) -> RepoResult<Option<(InvoiceStatus, Decimal, Decimal)>> {
    let row: Option<(String, i64, i64)> = conn
        .query_row(
            "SELECT status, total_amount, paid_amount FROM invoices WHERE uuid = ?1;",
            [id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    row.map(|(status, total, paid)| {
        let status = InvoiceStatus::parse(&status)
            .ok_or_else(|| RepoError::InvalidData(format!("invalid invoice status `{status}`")))?;
        Ok((status, from_minor_units(total), from_minor_units(paid)))
    })
    .transpose()
}

fn parse_invoice_row(row: &Row<'_>) -> RepoResult<Invoice> {
    Ok(Invoice {
        uuid: get_uuid(row, "uuid")?,
        invoice_number: row.get("invoice_number")?,
        invoice_type: get_code(row, "invoice_type", InvoiceType::parse)?,
        invoice_date: row.get("invoice_date")?,
        due_date: row.get("due_date")?,
        property_uuid: get_opt_uuid(row, "property_uuid")?,
        contract_uuid: get_opt_uuid(row, "contract_uuid")?,
        subtotal: get_money(row, "subtotal")?,
        tax_amount: get_money(row, "tax_amount")?,
        discount_amount: get_money(row, "discount_amount")?,
        total_amount: get_money(row, "total_amount")?,
        paid_amount: get_money(row, "paid_amount")?,
        status: get_code(row, "status", InvoiceStatus::parse)?,
        notes: row.get("notes")?,
        terms_and_conditions: row.get("terms_and_conditions")?,
        journal_entry_uuid: get_opt_uuid(row, "journal_entry_uuid")?,
        created_by: get_opt_uuid(row, "created_by")?,
        items: Vec::new(),
    })
}

fn parse_payment_row(row: &Row<'_>) -> RepoResult<Payment> {
    Ok(Payment {
        uuid: get_uuid(row, "uuid")?,
        payment_number: row.get("payment_number")?,
        payment_type: get_code(row, "payment_type", PaymentType::parse)?,
        payment_date: row.get("payment_date")?,
        payment_method: get_code(row, "payment_method", PaymentMethod::parse)?,
        amount: get_money(row, "amount")?,
        invoice_uuid: get_opt_uuid(row, "invoice_uuid")?,
        reference_number: row.get("reference_number")?,
        notes: row.get("notes")?,
        journal_entry_uuid: get_opt_uuid(row, "journal_entry_uuid")?,
        created_by: get_opt_uuid(row, "created_by")?,
    })
}

//! Per-property attached records: images, documents, valuations, amenities,
//! inspections, expenses and revenues.
//!
//! # Invariants
//! - Every record belongs to exactly one property and is removed with it.
//! - At most one image per property carries `is_primary`.

use super::{
    bool_to_int, ensure_schema_ready, get_bool, get_code, get_money, get_opt_uuid, get_uuid,
    minor, uuid_text, RepoError, RepoResult,
};
use crate::model::property::{
    ExpenseType, InspectionCondition, PropertyAmenity, PropertyDocument, PropertyExpense,
    PropertyId, PropertyImage, PropertyInspection, PropertyRevenue, PropertyValuation,
    RevenueType,
};
use crate::model::{require_non_negative, require_text};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

/// Attached record families, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRecordKind {
    Image,
    Document,
    Valuation,
    Amenity,
    Inspection,
    Expense,
    Revenue,
}

impl PropertyRecordKind {
    fn table(self) -> &'static str {
        match self {
            Self::Image => "property_images",
            Self::Document => "property_documents",
            Self::Valuation => "property_valuations",
            Self::Amenity => "property_amenities",
            Self::Inspection => "property_inspections",
            Self::Expense => "property_expenses",
            Self::Revenue => "property_revenues",
        }
    }

    fn entity(self) -> &'static str {
        match self {
            Self::Image => "property image",
            Self::Document => "property document",
            Self::Valuation => "property valuation",
            Self::Amenity => "property amenity",
            Self::Inspection => "property inspection",
            Self::Expense => "property expense",
            Self::Revenue => "property revenue",
        }
    }
}

/// Inspection row joined with the owning property's code for dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingInspection {
    pub inspection: PropertyInspection,
    pub property_code: String,
}

pub trait PropertyRecordRepository {
    /// Adding a primary image demotes the previous primary one.
    fn add_image(&self, image: &PropertyImage) -> RepoResult<Uuid>;
    /// Ordered by `sort_order`, newest upload first within one order value.
    fn list_images(&self, property: PropertyId) -> RepoResult<Vec<PropertyImage>>;

    fn add_document(&self, document: &PropertyDocument) -> RepoResult<Uuid>;
    fn list_documents(&self, property: PropertyId) -> RepoResult<Vec<PropertyDocument>>;
    /// Documents whose expiry date falls in `[from, until]`, soonest first.
    fn documents_expiring(&self, from: NaiveDate, until: NaiveDate)
        -> RepoResult<Vec<PropertyDocument>>;

    fn add_valuation(&self, valuation: &PropertyValuation) -> RepoResult<Uuid>;
    fn list_valuations(&self, property: PropertyId) -> RepoResult<Vec<PropertyValuation>>;

    fn add_amenity(&self, amenity: &PropertyAmenity) -> RepoResult<Uuid>;
    fn list_amenities(&self, property: PropertyId) -> RepoResult<Vec<PropertyAmenity>>;

    fn add_inspection(&self, inspection: &PropertyInspection) -> RepoResult<Uuid>;
    fn list_inspections(&self, property: PropertyId) -> RepoResult<Vec<PropertyInspection>>;
    /// Inspections with a scheduled follow-up, soonest first.
    fn upcoming_inspections(&self, limit: u32) -> RepoResult<Vec<UpcomingInspection>>;

    fn add_expense(&self, expense: &PropertyExpense) -> RepoResult<Uuid>;
    fn list_expenses(&self, property: PropertyId) -> RepoResult<Vec<PropertyExpense>>;

    fn add_revenue(&self, revenue: &PropertyRevenue) -> RepoResult<Uuid>;
    fn list_revenues(&self, property: PropertyId) -> RepoResult<Vec<PropertyRevenue>>;

    /// Deletes one record and returns the property it belonged to.
    fn delete_record(&self, kind: PropertyRecordKind, id: Uuid) -> RepoResult<PropertyId>;
}

/// SQLite-backed attached-record repository.
pub struct SqlitePropertyRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePropertyRecordRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            &[
                "property_images",
                "property_documents",
                "property_valuations",
                "property_amenities",
                "property_inspections",
                "property_expenses",
                "property_revenues",
            ],
        )?;
        Ok(Self { conn })
    }

    fn collect<T>(
        &self,
        sql: &str,
        property: PropertyId,
        parse: fn(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([property.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse(row)?);
        }
        Ok(records)
    }
}

impl PropertyRecordRepository for SqlitePropertyRecordRepository<'_> {
    fn add_image(&self, image: &PropertyImage) -> RepoResult<Uuid> {
        require_text("file_path", &image.file_path)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if image.is_primary {
            tx.execute(
                "UPDATE property_images SET is_primary = 0 WHERE property_uuid = ?1;",
                [image.property_uuid.to_string()],
            )?;
        }
        tx.execute(
            "INSERT INTO property_images (
                uuid, property_uuid, file_path, caption, is_primary, sort_order
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                image.uuid.to_string(),
                image.property_uuid.to_string(),
                image.file_path.as_str(),
                image.caption.as_str(),
                bool_to_int(image.is_primary),
                image.sort_order,
            ],
        )?;
        tx.commit()?;
        Ok(image.uuid)
    }

    fn list_images(&self, property: PropertyId) -> RepoResult<Vec<PropertyImage>> {
        self.collect(
            "SELECT uuid, property_uuid, file_path, caption, is_primary, sort_order, uploaded_at
             FROM property_images
             WHERE property_uuid = ?1
             ORDER BY sort_order ASC, uploaded_at DESC, rowid DESC;",
            property,
            parse_image_row,
        )
    }

    fn add_document(&self, document: &PropertyDocument) -> RepoResult<Uuid> {
        require_text("title", &document.title)?;
        require_text("file_path", &document.file_path)?;
        self.conn.execute(
            "INSERT INTO property_documents (
                uuid, property_uuid, title, document_type, file_path, expiry_date, uploaded_by
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                document.uuid.to_string(),
                document.property_uuid.to_string(),
                document.title.trim(),
                document.document_type.as_str(),
                document.file_path.as_str(),
                document.expiry_date,
                uuid_text(document.uploaded_by),
            ],
        )?;
        Ok(document.uuid)
    }

    fn list_documents(&self, property: PropertyId) -> RepoResult<Vec<PropertyDocument>> {
        self.collect(
            "SELECT uuid, property_uuid, title, document_type, file_path, expiry_date,
                    uploaded_by, uploaded_at
             FROM property_documents
             WHERE property_uuid = ?1
             ORDER BY uploaded_at DESC, rowid DESC;",
            property,
            parse_document_row,
        )
    }

    fn documents_expiring(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> RepoResult<Vec<PropertyDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, property_uuid, title, document_type, file_path, expiry_date,
                    uploaded_by, uploaded_at
             FROM property_documents
             WHERE expiry_date IS NOT NULL
               AND expiry_date >= ?1
               AND expiry_date <= ?2
             ORDER BY expiry_date ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query(params![from, until])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }
        Ok(documents)
    }

    fn add_valuation(&self, valuation: &PropertyValuation) -> RepoResult<Uuid> {
        require_non_negative("value", valuation.value)?;
        self.conn.execute(
            "INSERT INTO property_valuations (
                uuid, property_uuid, valuation_date, value, valuer, notes
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                valuation.uuid.to_string(),
                valuation.property_uuid.to_string(),
                valuation.valuation_date,
                minor("value", valuation.value)?,
                valuation.valuer.as_str(),
                valuation.notes.as_str(),
            ],
        )?;
        Ok(valuation.uuid)
    }

    fn list_valuations(&self, property: PropertyId) -> RepoResult<Vec<PropertyValuation>> {
        self.collect(
            "SELECT uuid, property_uuid, valuation_date, value, valuer, notes
             FROM property_valuations
             WHERE property_uuid = ?1
             ORDER BY valuation_date DESC, rowid DESC;",
            property,
            |row| {
                Ok(PropertyValuation {
                    uuid: get_uuid(row, "uuid")?,
                    property_uuid: get_uuid(row, "property_uuid")?,
                    valuation_date: row.get("valuation_date")?,
                    value: get_money(row, "value")?,
                    valuer: row.get("valuer")?,
                    notes: row.get("notes")?,
                })
            },
        )
    }

    fn add_amenity(&self, amenity: &PropertyAmenity) -> RepoResult<Uuid> {
        require_text("name", &amenity.name)?;
        self.conn.execute(
            "INSERT INTO property_amenities (uuid, property_uuid, name, description)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                amenity.uuid.to_string(),
                amenity.property_uuid.to_string(),
                amenity.name.trim(),
                amenity.description.as_str(),
            ],
        )?;
        Ok(amenity.uuid)
    }

    fn list_amenities(&self, property: PropertyId) -> RepoResult<Vec<PropertyAmenity>> {
        self.collect(
            "SELECT uuid, property_uuid, name, description
             FROM property_amenities
             WHERE property_uuid = ?1
             ORDER BY name ASC;",
            property,
            |row| {
                Ok(PropertyAmenity {
                    uuid: get_uuid(row, "uuid")?,
                    property_uuid: get_uuid(row, "property_uuid")?,
                    name: row.get("name")?,
                    description: row.get("description")?,
                })
            },
        )
    }

    fn add_inspection(&self, inspection: &PropertyInspection) -> RepoResult<Uuid> {
        if let Some(next) = inspection.next_inspection_date {
            if next < inspection.inspection_date {
                return Err(RepoError::Validation(
                    crate::model::ValidationError::DateOrder {
                        earlier: "inspection_date",
                        later: "next_inspection_date",
                    },
                ));
            }
        }
        self.conn.execute(
            "INSERT INTO property_inspections (
                uuid, property_uuid, inspection_date, inspector, condition, notes,
                next_inspection_date
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                inspection.uuid.to_string(),
                inspection.property_uuid.to_string(),
                inspection.inspection_date,
                inspection.inspector.as_str(),
                inspection.condition.as_str(),
                inspection.notes.as_str(),
                inspection.next_inspection_date,
            ],
        )?;
        Ok(inspection.uuid)
    }

    fn list_inspections(&self, property: PropertyId) -> RepoResult<Vec<PropertyInspection>> {
        self.collect(
            "SELECT uuid, property_uuid, inspection_date, inspector, condition, notes,
                    next_inspection_date
             FROM property_inspections
             WHERE property_uuid = ?1
             ORDER BY inspection_date DESC, rowid DESC;",
            property,
            parse_inspection_row,
        )
    }

    fn upcoming_inspections(&self, limit: u32) -> RepoResult<Vec<UpcomingInspection>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.uuid AS uuid,
                    i.property_uuid AS property_uuid,
                    i.inspection_date AS inspection_date,
                    i.inspector AS inspector,
                    i.condition AS condition,
                    i.notes AS notes,
                    i.next_inspection_date AS next_inspection_date,
                    p.code AS property_code
             FROM property_inspections i
             INNER JOIN properties p ON p.uuid = i.property_uuid
             WHERE i.next_inspection_date IS NOT NULL
             ORDER BY i.next_inspection_date ASC, i.rowid ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut inspections = Vec::new();
        while let Some(row) = rows.next()? {
            inspections.push(UpcomingInspection {
                inspection: parse_inspection_row(row)?,
                property_code: row.get("property_code")?,
            });
        }
        Ok(inspections)
    }

    fn add_expense(&self, expense: &PropertyExpense) -> RepoResult<Uuid> {
        require_non_negative("amount", expense.amount)?;
        self.conn.execute(
            "INSERT INTO property_expenses (
                uuid, property_uuid, expense_type, amount, expense_date, description
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                expense.uuid.to_string(),
                expense.property_uuid.to_string(),
                expense.expense_type.as_str(),
                minor("amount", expense.amount)?,
                expense.expense_date,
                expense.description.as_str(),
            ],
        )?;
        Ok(expense.uuid)
    }

    fn list_expenses(&self, property: PropertyId) -> RepoResult<Vec<PropertyExpense>> {
        self.collect(
            "SELECT uuid, property_uuid, expense_type, amount, expense_date, description
             FROM property_expenses
             WHERE property_uuid = ?1
             ORDER BY expense_date DESC, rowid DESC;",
            property,
            |row| {
                Ok(PropertyExpense {
                    uuid: get_uuid(row, "uuid")?,
                    property_uuid: get_uuid(row, "property_uuid")?,
                    expense_type: get_code(row, "expense_type", ExpenseType::parse)?,
                    amount: get_money(row, "amount")?,
                    expense_date: row.get("expense_date")?,
                    description: row.get("description")?,
                })
            },
        )
    }

    fn add_revenue(&self, revenue: &PropertyRevenue) -> RepoResult<Uuid> {
        require_non_negative("amount", revenue.amount)?;
        self.conn.execute(
            "INSERT INTO property_revenues (
                uuid, property_uuid, revenue_type, amount, revenue_date, contract_uuid,
                description
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                revenue.uuid.to_string(),
                revenue.property_uuid.to_string(),
                revenue.revenue_type.as_str(),
                minor("amount", revenue.amount)?,
                revenue.revenue_date,
                uuid_text(revenue.contract_uuid),
                revenue.description.as_str(),
            ],
        )?;
        Ok(revenue.uuid)
    }

    fn list_revenues(&self, property: PropertyId) -> RepoResult<Vec<PropertyRevenue>> {
        self.collect(
            "SELECT uuid, property_uuid, revenue_type, amount, revenue_date, contract_uuid,
                    description
             FROM property_revenues
             WHERE property_uuid = ?1
             ORDER BY revenue_date DESC, rowid DESC;",
            property,
            |row| {
                Ok(PropertyRevenue {
                    uuid: get_uuid(row, "uuid")?,
                    property_uuid: get_uuid(row, "property_uuid")?,
                    revenue_type: get_code(row, "revenue_type", RevenueType::parse)?,
                    amount: get_money(row, "amount")?,
                    revenue_date: row.get("revenue_date")?,
                    contract_uuid: get_opt_uuid(row, "contract_uuid")?,
                    description: row.get("description")?,
                })
            },
        )
    }

    fn delete_record(&self, kind: PropertyRecordKind, id: Uuid) -> RepoResult<PropertyId> {
        let table = kind.table();
        let id_text = id.to_string();
        let owner: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT property_uuid FROM {table} WHERE uuid = ?1;"),
                [id_text.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let owner = owner.ok_or_else(|| RepoError::not_found(kind.entity(), id))?;
        self.conn
            .execute(&format!("DELETE FROM {table} WHERE uuid = ?1;"), [id_text])?;
        super::parse_uuid(&owner, "property_uuid")
    }
}

fn parse_image_row(row: &Row<'_>) -> RepoResult<PropertyImage> {
    Ok(PropertyImage {
        uuid: get_uuid(row, "uuid")?,
        property_uuid: get_uuid(row, "property_uuid")?,
        file_path: row.get("file_path")?,
        caption: row.get("caption")?,
        is_primary: get_bool(row, "is_primary")?,
        sort_order: row.get("sort_order")?,
        uploaded_at: row.get("uploaded_at")?,
    })
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<PropertyDocument> {
    Ok(PropertyDocument {
        uuid: get_uuid(row, "uuid")?,
        property_uuid: get_uuid(row, "property_uuid")?,
        title: row.get("title")?,
        document_type: row.get("document_type")?,
        file_path: row.get("file_path")?,
        expiry_date: row.get("expiry_date")?,
        uploaded_by: get_opt_uuid(row, "uploaded_by")?,
        uploaded_at: row.get("uploaded_at")?,
    })
}

fn parse_inspection_row(row: &Row<'_>) -> RepoResult<PropertyInspection> {
    Ok(PropertyInspection {
        uuid: get_uuid(row, "uuid")?,
        property_uuid: get_uuid(row, "property_uuid")?,
        inspection_date: row.get("inspection_date")?,
        inspector: row.get("inspector")?,
        condition: get_code(row, "condition", InspectionCondition::parse)?,
        notes: row.get("notes")?,
        next_inspection_date: row.get("next_inspection_date")?,
    })
}

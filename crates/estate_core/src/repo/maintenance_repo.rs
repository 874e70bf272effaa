//! Maintenance categories and request persistence.

use super::{
    ensure_schema_ready, get_code, get_opt_money, get_opt_uuid, get_uuid, opt_minor, uuid_text,
    RepoError, RepoResult,
};
use crate::model::maintenance::{
    MaintenanceCategory, MaintenanceCategoryId, MaintenanceRequest, MaintenanceRequestId,
    MaintenanceStatus, Priority,
};
use crate::model::property::PropertyId;
use crate::model::require_text;
use rusqlite::{params, Connection, OptionalExtension, Row};

const REQUEST_SELECT_SQL: &str = "SELECT
    uuid,
    request_number,
    property_uuid,
    category_uuid,
    title,
    description,
    priority,
    status,
    request_date,
    estimated_cost,
    actual_cost,
    reported_by,
    assigned_to,
    completed_date
FROM maintenance_requests";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceFilter {
    pub property: Option<PropertyId>,
    pub status: Option<MaintenanceStatus>,
}

pub trait MaintenanceRepository {
    fn create_category(&self, category: &MaintenanceCategory) -> RepoResult<MaintenanceCategoryId>;
    fn list_categories(&self) -> RepoResult<Vec<MaintenanceCategory>>;

    fn create_request(&self, request: &MaintenanceRequest) -> RepoResult<MaintenanceRequestId>;
    /// Persists every mutable field of an existing request.
    fn update_request(&self, request: &MaintenanceRequest) -> RepoResult<()>;
    fn get_request(&self, id: MaintenanceRequestId) -> RepoResult<Option<MaintenanceRequest>>;
    /// Newest request date first.
    fn list_requests(&self, filter: &MaintenanceFilter) -> RepoResult<Vec<MaintenanceRequest>>;
}

/// SQLite-backed maintenance repository.
pub struct SqliteMaintenanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMaintenanceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["maintenance_categories", "maintenance_requests"])?;
        Ok(Self { conn })
    }
}

impl MaintenanceRepository for SqliteMaintenanceRepository<'_> {
    fn create_category(&self, category: &MaintenanceCategory) -> RepoResult<MaintenanceCategoryId> {
        require_text("name", &category.name)?;
        self.conn.execute(
            "INSERT INTO maintenance_categories (uuid, name) VALUES (?1, ?2);",
            params![category.uuid.to_string(), category.name.trim()],
        )?;
        Ok(category.uuid)
    }

    fn list_categories(&self) -> RepoResult<Vec<MaintenanceCategory>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uuid, name FROM maintenance_categories ORDER BY name ASC;")?;
        let mut rows = stmt.query([])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(MaintenanceCategory {
                uuid: get_uuid(row, "uuid")?,
                name: row.get("name")?,
            });
        }
        Ok(categories)
    }

    fn create_request(&self, request: &MaintenanceRequest) -> RepoResult<MaintenanceRequestId> {
        request.validate()?;
        self.conn.execute(
            "INSERT INTO maintenance_requests (
                uuid, request_number, property_uuid, category_uuid, title, description,
                priority, status, request_date, estimated_cost, actual_cost, reported_by,
                assigned_to, completed_date
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                request.uuid.to_string(),
                request.request_number.trim(),
                request.property_uuid.to_string(),
                uuid_text(request.category_uuid),
                request.title.trim(),
                request.description.as_str(),
                request.priority.as_str(),
                request.status.as_str(),
                request.request_date,
                opt_minor("estimated_cost", request.estimated_cost)?,
                opt_minor("actual_cost", request.actual_cost)?,
                uuid_text(request.reported_by),
                uuid_text(request.assigned_to),
                request.completed_date,
            ],
        )?;
        Ok(request.uuid)
    }

    fn update_request(&self, request: &MaintenanceRequest) -> RepoResult<()> {
        request.validate()?;
        let changed = self.conn.execute(
            "UPDATE maintenance_requests
             SET
                category_uuid = ?2,
                title = ?3,
                description = ?4,
                priority = ?5,
                status = ?6,
                estimated_cost = ?7,
                actual_cost = ?8,
                assigned_to = ?9,
                completed_date = ?10,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                request.uuid.to_string(),
                uuid_text(request.category_uuid),
                request.title.trim(),
                request.description.as_str(),
                request.priority.as_str(),
                request.status.as_str(),
                opt_minor("estimated_cost", request.estimated_cost)?,
                opt_minor("actual_cost", request.actual_cost)?,
                uuid_text(request.assigned_to),
                request.completed_date,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("maintenance request", request.uuid));
        }
        Ok(())
    }

    fn get_request(&self, id: MaintenanceRequestId) -> RepoResult<Option<MaintenanceRequest>> {
        let sql = format!("{REQUEST_SELECT_SQL} WHERE uuid = ?1;");
        self.conn
            .query_row(&sql, [id.to_string()], |row| Ok(parse_request_row(row)))
            .optional()?
            .transpose()
    }

    fn list_requests(&self, filter: &MaintenanceFilter) -> RepoResult<Vec<MaintenanceRequest>> {
        let sql = format!(
            "{REQUEST_SELECT_SQL}
             WHERE (?1 IS NULL OR property_uuid = ?1)
               AND (?2 IS NULL OR status = ?2)
             ORDER BY request_date DESC, rowid DESC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            filter.property.map(|id| id.to_string()),
            filter.status.map(MaintenanceStatus::as_str),
        ])?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next()? {
            requests.push(parse_request_row(row)?);
        }
        Ok(requests)
    }
}

pub(crate) fn parse_request_row(row: &Row<'_>) -> RepoResult<MaintenanceRequest> {
    Ok(MaintenanceRequest {
        uuid: get_uuid(row, "uuid")?,
        request_number: row.get("request_number")?,
        property_uuid: get_uuid(row, "property_uuid")?,
        category_uuid: get_opt_uuid(row, "category_uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: get_code(row, "priority", Priority::parse)?,
        status: get_code(row, "status", MaintenanceStatus::parse)?,
        request_date: row.get("request_date")?,
        estimated_cost: get_opt_money(row, "estimated_cost")?,
        actual_cost: get_opt_money(row, "actual_cost")?,
        reported_by: get_opt_uuid(row, "reported_by")?,
        assigned_to: get_opt_uuid(row, "assigned_to")?,
        completed_date: row.get("completed_date")?,
    })
}

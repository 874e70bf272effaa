//! Property inventory persistence: types, owners, clients and properties.
//!
//! # Responsibility
//! - CRUD for the property aggregate root and its lookup tables.
//! - Filtered/sorted/paged listing and the summary counters shown with it.
//! - Status transitions used by leasing and sales flows.
//!
//! # Invariants
//! - Writes call `Property::validate()` first.
//! - Listing order is total: every sort falls back to insertion order.
//! - A property type referenced by a property cannot be deleted.

use super::{
    bool_to_int, ensure_schema_ready, get_bool, get_code, get_opt_money, get_uuid, minor,
    opt_minor, Page, PageRequest, RepoError, RepoResult,
};
use crate::model::property::{
    Client, ClientId, Owner, OwnerId, Property, PropertyId, PropertyStatus, PropertyType,
    PropertyTypeId,
};
use crate::model::{money, require_text};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

/// Table mode page size.
pub const TABLE_PAGE_SIZE: u32 = 20;
/// Grid mode page size.
pub const GRID_PAGE_SIZE: u32 = 12;
/// Maximum properties compared side by side.
pub const COMPARISON_LIMIT: usize = 4;

const PROPERTY_SELECT_SQL: &str = "SELECT
    p.uuid AS uuid,
    p.code AS code,
    p.title AS title,
    p.property_type_uuid AS property_type_uuid,
    p.owner_uuid AS owner_uuid,
    p.status AS status,
    p.address AS address,
    p.city AS city,
    p.latitude AS latitude,
    p.longitude AS longitude,
    p.rental_price_monthly AS rental_price_monthly,
    p.market_value AS market_value,
    p.purchase_price AS purchase_price,
    p.area_sqm AS area_sqm,
    p.bedrooms AS bedrooms,
    p.bathrooms AS bathrooms,
    p.is_furnished AS is_furnished,
    p.is_active AS is_active,
    p.occupancy_rate AS occupancy_rate,
    p.average_roi AS average_roi,
    p.created_at AS created_at,
    p.updated_at AS updated_at,
    t.name AS type_name,
    o.name AS owner_name
FROM properties p
INNER JOIN property_types t ON t.uuid = p.property_type_uuid
INNER JOIN owners o ON o.uuid = p.owner_uuid";

/// Listing order; unknown option strings fall back to `Newest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertySort {
    #[default]
    Newest,
    Oldest,
    Code,
    Title,
    RentHigh,
    RentLow,
    AreaHigh,
    AreaLow,
}

impl PropertySort {
    pub fn parse(value: &str) -> Self {
        match value {
            "oldest" => Self::Oldest,
            "code" => Self::Code,
            "title" => Self::Title,
            "rent_high" => Self::RentHigh,
            "rent_low" => Self::RentLow,
            "area_high" => Self::AreaHigh,
            "area_low" => Self::AreaLow,
            _ => Self::Newest,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.rowid DESC",
            Self::Oldest => "p.created_at ASC, p.rowid ASC",
            Self::Code => "p.code ASC, p.rowid ASC",
            Self::Title => "p.title ASC, p.rowid ASC",
            Self::RentHigh => "p.rental_price_monthly DESC, p.rowid ASC",
            Self::RentLow => "p.rental_price_monthly ASC, p.rowid ASC",
            Self::AreaHigh => "p.area_sqm DESC, p.rowid ASC",
            Self::AreaLow => "p.area_sqm ASC, p.rowid ASC",
        }
    }
}

/// Table or grid listing, which only changes the page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Table,
    Grid,
}

impl DisplayMode {
    pub fn parse(value: &str) -> Self {
        if value == "grid" {
            Self::Grid
        } else {
            Self::Table
        }
    }

    pub fn page_size(self) -> u32 {
        match self {
            Self::Table => TABLE_PAGE_SIZE,
            Self::Grid => GRID_PAGE_SIZE,
        }
    }
}

/// Filters for the property listing. `None` means "do not filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    /// Case-insensitive substring over code, title, address and city.
    pub search: Option<String>,
    pub property_type: Option<PropertyTypeId>,
    pub status: Option<PropertyStatus>,
    /// Case-insensitive substring.
    pub city: Option<String>,
    pub min_rent: Option<Decimal>,
    pub max_rent: Option<Decimal>,
    pub min_bedrooms: Option<u32>,
    pub is_furnished: Option<bool>,
}

/// Listing row with the joined lookup names.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyListItem {
    pub property: Property,
    pub type_name: String,
    pub owner_name: String,
}

/// Summary cards shown above the listing; computed over all properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySummary {
    pub total: u64,
    pub active: u64,
    pub available: u64,
    pub rented: u64,
    pub maintenance: u64,
    pub total_market_value: Decimal,
}

pub trait PropertyRepository {
    fn create_type(&self, property_type: &PropertyType) -> RepoResult<PropertyTypeId>;
    fn update_type(&self, property_type: &PropertyType) -> RepoResult<()>;
    fn list_types(&self, active_only: bool) -> RepoResult<Vec<PropertyType>>;
    /// Fails with `Conflict` while any property still uses the type.
    fn delete_type(&self, id: PropertyTypeId) -> RepoResult<()>;

    fn create_owner(&self, owner: &Owner) -> RepoResult<OwnerId>;
    fn get_owner(&self, id: OwnerId) -> RepoResult<Option<Owner>>;
    fn create_client(&self, client: &Client) -> RepoResult<ClientId>;
    fn get_client(&self, id: ClientId) -> RepoResult<Option<Client>>;
    fn list_clients(&self) -> RepoResult<Vec<Client>>;

    fn create_property(&self, property: &Property) -> RepoResult<PropertyId>;
    fn update_property(&self, property: &Property) -> RepoResult<()>;
    fn get_property(&self, id: PropertyId) -> RepoResult<Option<PropertyListItem>>;
    fn get_property_by_code(&self, code: &str) -> RepoResult<Option<PropertyListItem>>;
    fn delete_property(&self, id: PropertyId) -> RepoResult<()>;
    /// Flips `is_active` and returns the new value.
    fn toggle_active(&self, id: PropertyId) -> RepoResult<bool>;
    fn set_status(&self, id: PropertyId, status: PropertyStatus) -> RepoResult<()>;
    fn set_metrics(
        &self,
        id: PropertyId,
        occupancy_rate: Option<Decimal>,
        average_roi: Option<Decimal>,
    ) -> RepoResult<()>;

    fn list_properties(
        &self,
        filter: &PropertyFilter,
        sort: PropertySort,
        page: PageRequest,
    ) -> RepoResult<Page<PropertyListItem>>;
    fn summary(&self) -> RepoResult<PropertySummary>;
    /// Properties that carry both coordinates, ordered by code.
    fn list_with_coordinates(&self) -> RepoResult<Vec<PropertyListItem>>;
    /// Loads the given properties in code order, keeping at most four.
    fn get_for_comparison(&self, ids: &[PropertyId]) -> RepoResult<Vec<PropertyListItem>>;
    fn list_active_by_code(&self) -> RepoResult<Vec<PropertyListItem>>;
}

/// SQLite-backed property repository.
pub struct SqlitePropertyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePropertyRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["property_types", "owners", "clients", "properties"])?;
        Ok(Self { conn })
    }

    fn query_items(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<PropertyListItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_property_item_row(row)?);
        }
        Ok(items)
    }
}

impl PropertyRepository for SqlitePropertyRepository<'_> {
    fn create_type(&self, property_type: &PropertyType) -> RepoResult<PropertyTypeId> {
        require_text("name", &property_type.name)?;
        self.conn.execute(
            "INSERT INTO property_types (uuid, name, description, is_active)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                property_type.uuid.to_string(),
                property_type.name.trim(),
                property_type.description.as_str(),
                bool_to_int(property_type.is_active),
            ],
        )?;
        Ok(property_type.uuid)
    }

    fn update_type(&self, property_type: &PropertyType) -> RepoResult<()> {
        require_text("name", &property_type.name)?;
        let changed = self.conn.execute(
            "UPDATE property_types
             SET name = ?2, description = ?3, is_active = ?4
             WHERE uuid = ?1;",
            params![
                property_type.uuid.to_string(),
                property_type.name.trim(),
                property_type.description.as_str(),
                bool_to_int(property_type.is_active),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("property type", property_type.uuid));
        }
        Ok(())
    }

    fn list_types(&self, active_only: bool) -> RepoResult<Vec<PropertyType>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name, description, is_active
             FROM property_types
             WHERE (?1 = 0 OR is_active = 1)
             ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut types = Vec::new();
        while let Some(row) = rows.next()? {
            types.push(PropertyType {
                uuid: get_uuid(row, "uuid")?,
                name: row.get("name")?,
                description: row.get("description")?,
                is_active: get_bool(row, "is_active")?,
            });
        }
        Ok(types)
    }

    fn delete_type(&self, id: PropertyTypeId) -> RepoResult<()> {
        let id_text = id.to_string();
        let in_use: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM properties WHERE property_type_uuid = ?1;",
            [id_text.as_str()],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(RepoError::Conflict(format!(
                "property type {id} is used by {in_use} properties"
            )));
        }
        let changed = self
            .conn
            .execute("DELETE FROM property_types WHERE uuid = ?1;", [id_text])?;
        if changed == 0 {
            return Err(RepoError::not_found("property type", id));
        }
        Ok(())
    }

    fn create_owner(&self, owner: &Owner) -> RepoResult<OwnerId> {
        require_text("name", &owner.name)?;
        self.conn.execute(
            "INSERT INTO owners (uuid, name, phone, email) VALUES (?1, ?2, ?3, ?4);",
            params![
                owner.uuid.to_string(),
                owner.name.trim(),
                owner.phone.as_str(),
                owner.email.as_str(),
            ],
        )?;
        Ok(owner.uuid)
    }

    fn get_owner(&self, id: OwnerId) -> RepoResult<Option<Owner>> {
        self.conn
            .query_row(
                "SELECT uuid, name, phone, email FROM owners WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok(parse_owner_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn create_client(&self, client: &Client) -> RepoResult<ClientId> {
        require_text("name", &client.name)?;
        self.conn.execute(
            "INSERT INTO clients (uuid, name, phone, email, national_id)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                client.uuid.to_string(),
                client.name.trim(),
                client.phone.as_str(),
                client.email.as_str(),
                client.national_id.as_str(),
            ],
        )?;
        Ok(client.uuid)
    }

    fn get_client(&self, id: ClientId) -> RepoResult<Option<Client>> {
        self.conn
            .query_row(
                "SELECT uuid, name, phone, email, national_id FROM clients WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok(parse_client_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_clients(&self) -> RepoResult<Vec<Client>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name, phone, email, national_id FROM clients ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut clients = Vec::new();
        while let Some(row) = rows.next()? {
            clients.push(parse_client_row(row)?);
        }
        Ok(clients)
    }

    fn create_property(&self, property: &Property) -> RepoResult<PropertyId> {
        property.validate()?;
        self.conn.execute(
            "INSERT INTO properties (
                uuid, code, title, property_type_uuid, owner_uuid, status, address, city,
                latitude, longitude, rental_price_monthly, market_value, purchase_price,
                area_sqm, bedrooms, bathrooms, is_furnished, is_active, occupancy_rate,
                average_roi
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
            );",
            params![
                property.uuid.to_string(),
                property.code.trim(),
                property.title.trim(),
                property.property_type_uuid.to_string(),
                property.owner_uuid.to_string(),
                property.status.as_str(),
                property.address.as_str(),
                property.city.as_str(),
                property.latitude,
                property.longitude,
                opt_minor("rental_price_monthly", property.rental_price_monthly)?,
                opt_minor("market_value", property.market_value)?,
                opt_minor("purchase_price", property.purchase_price)?,
                opt_minor("area_sqm", property.area_sqm)?,
                property.bedrooms,
                property.bathrooms,
                bool_to_int(property.is_furnished),
                bool_to_int(property.is_active),
                opt_minor("occupancy_rate", property.occupancy_rate)?,
                opt_minor("average_roi", property.average_roi)?,
            ],
        )?;
        Ok(property.uuid)
    }

    fn update_property(&self, property: &Property) -> RepoResult<()> {
        property.validate()?;
        let changed = self.conn.execute(
            "UPDATE properties
             SET
                code = ?2,
                title = ?3,
                property_type_uuid = ?4,
                owner_uuid = ?5,
                status = ?6,
                address = ?7,
                city = ?8,
                latitude = ?9,
                longitude = ?10,
                rental_price_monthly = ?11,
                market_value = ?12,
                purchase_price = ?13,
                area_sqm = ?14,
                bedrooms = ?15,
                bathrooms = ?16,
                is_furnished = ?17,
                is_active = ?18,
                occupancy_rate = ?19,
                average_roi = ?20,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                property.uuid.to_string(),
                property.code.trim(),
                property.title.trim(),
                property.property_type_uuid.to_string(),
                property.owner_uuid.to_string(),
                property.status.as_str(),
                property.address.as_str(),
                property.city.as_str(),
                property.latitude,
                property.longitude,
                opt_minor("rental_price_monthly", property.rental_price_monthly)?,
                opt_minor("market_value", property.market_value)?,
                opt_minor("purchase_price", property.purchase_price)?,
                opt_minor("area_sqm", property.area_sqm)?,
                property.bedrooms,
                property.bathrooms,
                bool_to_int(property.is_furnished),
                bool_to_int(property.is_active),
                opt_minor("occupancy_rate", property.occupancy_rate)?,
                opt_minor("average_roi", property.average_roi)?,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("property", property.uuid));
        }
        Ok(())
    }

    fn get_property(&self, id: PropertyId) -> RepoResult<Option<PropertyListItem>> {
        let sql = format!("{PROPERTY_SELECT_SQL} WHERE p.uuid = ?1;");
        self.conn
            .query_row(&sql, [id.to_string()], |row| Ok(parse_property_item_row(row)))
            .optional()?
            .transpose()
    }

    fn get_property_by_code(&self, code: &str) -> RepoResult<Option<PropertyListItem>> {
        let sql = format!("{PROPERTY_SELECT_SQL} WHERE p.code = ?1;");
        self.conn
            .query_row(&sql, [code.trim()], |row| Ok(parse_property_item_row(row)))
            .optional()?
            .transpose()
    }

    fn delete_property(&self, id: PropertyId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM properties WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("property", id));
        }
        Ok(())
    }

    fn toggle_active(&self, id: PropertyId) -> RepoResult<bool> {
        let id_text = id.to_string();
        let changed = self.conn.execute(
            "UPDATE properties
             SET is_active = 1 - is_active,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id_text.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("property", id));
        }
        let is_active: i64 = self.conn.query_row(
            "SELECT is_active FROM properties WHERE uuid = ?1;",
            [id_text.as_str()],
            |row| row.get(0),
        )?;
        Ok(is_active == 1)
    }

    fn set_status(&self, id: PropertyId, status: PropertyStatus) -> RepoResult<()> {
        update_property_status(self.conn, id, status)
    }

    fn set_metrics(
        &self,
        id: PropertyId,
        occupancy_rate: Option<Decimal>,
        average_roi: Option<Decimal>,
    ) -> RepoResult<()> {
        let occupancy = occupancy_rate.map(money::round_money);
        let roi = average_roi.map(money::round_money);
        let changed = self.conn.execute(
            "UPDATE properties
             SET occupancy_rate = ?2,
                 average_roi = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                opt_minor("occupancy_rate", occupancy)?,
                opt_minor("average_roi", roi)?,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("property", id));
        }
        Ok(())
    }

    fn list_properties(
        &self,
        filter: &PropertyFilter,
        sort: PropertySort,
        page: PageRequest,
    ) -> RepoResult<Page<PropertyListItem>> {
        let (where_sql, bind_values) = filter_clause(filter)?;

        let count_sql = format!(
            "SELECT COUNT(*)
             FROM properties p
             INNER JOIN property_types t ON t.uuid = p.property_type_uuid
             INNER JOIN owners o ON o.uuid = p.owner_uuid
             {where_sql};"
        );
        let total: i64 = self.conn.query_row(
            &count_sql,
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;
        let total = u64::try_from(total).unwrap_or(0);
        let page = page.clamp_to(total);

        let mut list_values = bind_values;
        list_values.push(Value::Integer(page.limit()));
        list_values.push(Value::Integer(page.offset()));
        let sql = format!(
            "{PROPERTY_SELECT_SQL} {where_sql} ORDER BY {} LIMIT ? OFFSET ?;",
            sort.order_by()
        );
        let items = self.query_items(&sql, list_values)?;

        Ok(Page {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    fn summary(&self) -> RepoResult<PropertySummary> {
        let summary = self.conn.query_row(
            "SELECT
                COUNT(*) AS total,
                COALESCE(SUM(is_active = 1), 0) AS active,
                COALESCE(SUM(status = 'available'), 0) AS available,
                COALESCE(SUM(status = 'rented'), 0) AS rented,
                COALESCE(SUM(status = 'maintenance'), 0) AS maintenance,
                COALESCE(SUM(market_value), 0) AS total_market_value
             FROM properties;",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>("total")?,
                    row.get::<_, i64>("active")?,
                    row.get::<_, i64>("available")?,
                    row.get::<_, i64>("rented")?,
                    row.get::<_, i64>("maintenance")?,
                    row.get::<_, i64>("total_market_value")?,
                ))
            },
        )?;
        let count = |value: i64| u64::try_from(value).unwrap_or(0);
        Ok(PropertySummary {
            total: count(summary.0),
            active: count(summary.1),
            available: count(summary.2),
            rented: count(summary.3),
            maintenance: count(summary.4),
            total_market_value: money::from_minor_units(summary.5),
        })
    }

    fn list_with_coordinates(&self) -> RepoResult<Vec<PropertyListItem>> {
        let sql = format!(
            "{PROPERTY_SELECT_SQL}
             WHERE p.latitude IS NOT NULL AND p.longitude IS NOT NULL
             ORDER BY p.code ASC;"
        );
        self.query_items(&sql, Vec::new())
    }

    fn get_for_comparison(&self, ids: &[PropertyId]) -> RepoResult<Vec<PropertyListItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "{PROPERTY_SELECT_SQL}
             WHERE p.uuid IN ({placeholders})
             ORDER BY p.code ASC
             LIMIT {COMPARISON_LIMIT};"
        );
        let bind_values = ids.iter().map(|id| Value::Text(id.to_string())).collect();
        self.query_items(&sql, bind_values)
    }

    fn list_active_by_code(&self) -> RepoResult<Vec<PropertyListItem>> {
        let sql = format!("{PROPERTY_SELECT_SQL} WHERE p.is_active = 1 ORDER BY p.code ASC;");
        self.query_items(&sql, Vec::new())
    }
}

/// Status update usable inside other repositories' transactions.
pub(crate) fn update_property_status(
    conn: &Connection,
    id: PropertyId,
    status: PropertyStatus,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE properties
         SET status = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?1;",
        params![id.to_string(), status.as_str()],
    )?;
    if changed == 0 {
        return Err(RepoError::not_found("property", id));
    }
    Ok(())
}

pub(crate) fn property_status(conn: &Connection, id: PropertyId) -> RepoResult<PropertyStatus> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM properties WHERE uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let status = status.ok_or_else(|| RepoError::not_found("property", id))?;
    PropertyStatus::parse(&status).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid code `{status}` in properties.status"))
    })
}

fn filter_clause(filter: &PropertyFilter) -> RepoResult<(String, Vec<Value>)> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut bind_values = Vec::new();

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        clauses.push(
            "(p.code LIKE '%' || ? || '%'
              OR p.title LIKE '%' || ? || '%'
              OR p.address LIKE '%' || ? || '%'
              OR p.city LIKE '%' || ? || '%')",
        );
        for _ in 0..4 {
            bind_values.push(Value::Text(search.to_string()));
        }
    }
    if let Some(property_type) = filter.property_type {
        clauses.push("p.property_type_uuid = ?");
        bind_values.push(Value::Text(property_type.to_string()));
    }
    if let Some(status) = filter.status {
        clauses.push("p.status = ?");
        bind_values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(city) = filter.city.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        clauses.push("p.city LIKE '%' || ? || '%'");
        bind_values.push(Value::Text(city.to_string()));
    }
    if let Some(min_rent) = filter.min_rent {
        clauses.push("p.rental_price_monthly >= ?");
        bind_values.push(Value::Integer(minor("min_rent", min_rent)?));
    }
    if let Some(max_rent) = filter.max_rent {
        clauses.push("p.rental_price_monthly <= ?");
        bind_values.push(Value::Integer(minor("max_rent", max_rent)?));
    }
    if let Some(bedrooms) = filter.min_bedrooms {
        clauses.push("p.bedrooms >= ?");
        bind_values.push(Value::Integer(i64::from(bedrooms)));
    }
    if let Some(furnished) = filter.is_furnished {
        clauses.push("p.is_furnished = ?");
        bind_values.push(Value::Integer(bool_to_int(furnished)));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    Ok((where_sql, bind_values))
}

fn parse_owner_row(row: &Row<'_>) -> RepoResult<Owner> {
    Ok(Owner {
        uuid: get_uuid(row, "uuid")?,
        name: row.get("name")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
    })
}

fn parse_client_row(row: &Row<'_>) -> RepoResult<Client> {
    Ok(Client {
        uuid: get_uuid(row, "uuid")?,
        name: row.get("name")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        national_id: row.get("national_id")?,
    })
}

fn parse_property_item_row(row: &Row<'_>) -> RepoResult<PropertyListItem> {
    let property = Property {
        uuid: get_uuid(row, "uuid")?,
        code: row.get("code")?,
        title: row.get("title")?,
        property_type_uuid: get_uuid(row, "property_type_uuid")?,
        owner_uuid: get_uuid(row, "owner_uuid")?,
        status: get_code(row, "status", PropertyStatus::parse)?,
        address: row.get("address")?,
        city: row.get("city")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        rental_price_monthly: get_opt_money(row, "rental_price_monthly")?,
        market_value: get_opt_money(row, "market_value")?,
        purchase_price: get_opt_money(row, "purchase_price")?,
        area_sqm: get_opt_money(row, "area_sqm")?,
        bedrooms: row.get("bedrooms")?,
        bathrooms: row.get("bathrooms")?,
        is_furnished: get_bool(row, "is_furnished")?,
        is_active: get_bool(row, "is_active")?,
        occupancy_rate: get_opt_money(row, "occupancy_rate")?,
        average_roi: get_opt_money(row, "average_roi")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    Ok(PropertyListItem {
        property,
        type_name: row.get("type_name")?,
        owner_name: row.get("owner_name")?,
    })
}

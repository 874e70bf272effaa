//! Read-only aggregation queries behind the dashboards and property reports.
//!
//! Every query here is a plain `SUM`/`COUNT` over the operational tables;
//! derived ratios are left to the report service.

use super::maintenance_repo::parse_request_row;
use super::{ensure_schema_ready, get_code, get_opt_money, RepoResult};
use crate::model::access::UserId;
use crate::model::maintenance::{MaintenanceRequest, MaintenanceStatus};
use crate::model::money::from_minor_units;
use crate::model::property::{PropertyId, PropertyStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

/// Revenue or expense records attached to properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashFlowKind {
    Revenue,
    Expense,
}

impl CashFlowKind {
    fn table(self) -> &'static str {
        match self {
            Self::Revenue => "property_revenues",
            Self::Expense => "property_expenses",
        }
    }

    fn date_column(self) -> &'static str {
        match self {
            Self::Revenue => "revenue_date",
            Self::Expense => "expense_date",
        }
    }

    fn type_column(self) -> &'static str {
        match self {
            Self::Revenue => "revenue_type",
            Self::Expense => "expense_type",
        }
    }
}

/// Optional property and inclusive date bounds for cash-flow queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CashFlowScope {
    pub property: Option<PropertyId>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl CashFlowScope {
    fn where_clause(&self, kind: CashFlowKind) -> (String, Vec<Value>) {
        let date = kind.date_column();
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(property) = self.property {
            clauses.push("property_uuid = ?".to_string());
            values.push(Value::Text(property.to_string()));
        }
        if let Some(from) = self.from {
            clauses.push(format!("{date} >= ?"));
            values.push(Value::Text(from.to_string()));
        }
        if let Some(until) = self.until {
            clauses.push(format!("{date} <= ?"));
            values.push(Value::Text(until.to_string()));
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledTotal {
    pub label: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiRanking {
    pub property: PropertyId,
    pub code: String,
    pub title: String,
    pub average_roi: Decimal,
    pub rental_price_monthly: Option<Decimal>,
}

/// Mean occupancy rate and ROI over properties carrying a value; `None` when none do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricAverages {
    pub occupancy: Option<Decimal>,
    pub roi: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceTotals {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub estimated_cost: Decimal,
    pub actual_cost: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DashboardCounts {
    pub total_properties: u64,
    pub active_contracts: u64,
    pub pending_maintenance: u64,
    pub unread_notifications: u64,
    pub active_sales: u64,
    pub pending_reservations: u64,
}

pub trait ReportRepository {
    /// Property count per status, largest first.
    fn status_breakdown(&self) -> RepoResult<Vec<(PropertyStatus, u64)>>;
    /// Property count per type name, largest first.
    fn type_distribution(&self, limit: u32) -> RepoResult<Vec<LabeledCount>>;
    fn metric_averages(&self) -> RepoResult<MetricAverages>;
    fn top_roi(&self, limit: u32) -> RepoResult<Vec<RoiRanking>>;
    fn active_property_count(&self) -> RepoResult<u64>;

    fn cash_flow_total(&self, kind: CashFlowKind, scope: &CashFlowScope) -> RepoResult<Decimal>;
    /// Totals grouped by calendar month, oldest first.
    fn cash_flow_by_month(&self, kind: CashFlowKind, scope: &CashFlowScope)
        -> RepoResult<Vec<MonthlyTotal>>;
    /// Totals grouped by revenue/expense type, largest first.
    fn cash_flow_by_type(&self, kind: CashFlowKind, scope: &CashFlowScope)
        -> RepoResult<Vec<LabeledTotal>>;

    fn maintenance_totals(&self, property: PropertyId) -> RepoResult<MaintenanceTotals>;
    /// Actual cost per category name, largest first; uncategorised rows are labelled empty.
    fn maintenance_cost_by_category(&self, property: PropertyId) -> RepoResult<Vec<LabeledTotal>>;
    fn latest_maintenance(&self, property: PropertyId, limit: u32)
        -> RepoResult<Vec<MaintenanceRequest>>;

    fn dashboard_counts(&self, user: UserId) -> RepoResult<DashboardCounts>;
}

/// SQLite-backed report queries.
pub struct SqliteReportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReportRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            &[
                "properties",
                "property_types",
                "property_revenues",
                "property_expenses",
                "contracts",
                "maintenance_requests",
                "reservations",
                "sales_contracts",
                "notifications",
            ],
        )?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl ReportRepository for SqliteReportRepository<'_> {
    fn status_breakdown(&self) -> RepoResult<Vec<(PropertyStatus, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) AS total
             FROM properties
             GROUP BY status
             ORDER BY total DESC, status ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut breakdown = Vec::new();
        while let Some(row) = rows.next()? {
            let total: i64 = row.get("total")?;
            breakdown.push((
                get_code(row, "status", PropertyStatus::parse)?,
                total.max(0) as u64,
            ));
        }
        Ok(breakdown)
    }

    fn type_distribution(&self, limit: u32) -> RepoResult<Vec<LabeledCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name AS name, COUNT(*) AS total
             FROM properties p
             INNER JOIN property_types t ON t.uuid = p.property_type_uuid
             GROUP BY t.uuid
             ORDER BY total DESC, t.name ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut distribution = Vec::new();
        while let Some(row) = rows.next()? {
            let total: i64 = row.get("total")?;
            distribution.push(LabeledCount {
                label: row.get("name")?,
                count: total.max(0) as u64,
            });
        }
        Ok(distribution)
    }

    fn metric_averages(&self) -> RepoResult<MetricAverages> {
        let (occupancy_sum, occupancy_count, roi_sum, roi_count): (i64, i64, i64, i64) =
            self.conn.query_row(
                "SELECT
                    COALESCE(SUM(occupancy_rate), 0),
                    COUNT(occupancy_rate),
                    COALESCE(SUM(average_roi), 0),
                    COUNT(average_roi)
                 FROM properties;",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        let average = |sum: i64, count: i64| {
            (count > 0).then(|| from_minor_units(sum) / Decimal::from(count))
        };
        Ok(MetricAverages {
            occupancy: average(occupancy_sum, occupancy_count),
            roi: average(roi_sum, roi_count),
        })
    }

    fn top_roi(&self, limit: u32) -> RepoResult<Vec<RoiRanking>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, code, title, average_roi, rental_price_monthly
             FROM properties
             WHERE average_roi IS NOT NULL
             ORDER BY average_roi DESC, code ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut ranking = Vec::new();
        while let Some(row) = rows.next()? {
            ranking.push(RoiRanking {
                property: super::get_uuid(row, "uuid")?,
                code: row.get("code")?,
                title: row.get("title")?,
                average_roi: super::get_money(row, "average_roi")?,
                rental_price_monthly: get_opt_money(row, "rental_price_monthly")?,
            });
        }
        Ok(ranking)
    }

    fn active_property_count(&self) -> RepoResult<u64> {
        self.count("SELECT COUNT(*) FROM properties WHERE is_active = 1;", [])
    }

    fn cash_flow_total(&self, kind: CashFlowKind, scope: &CashFlowScope) -> RepoResult<Decimal> {
        let (where_sql, values) = scope.where_clause(kind);
        let sql = format!(
            "SELECT COALESCE(SUM(amount), 0) FROM {} {where_sql};",
            kind.table()
        );
        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(from_minor_units(total))
    }

    fn cash_flow_by_month(
        &self,
        kind: CashFlowKind,
        scope: &CashFlowScope,
    ) -> RepoResult<Vec<MonthlyTotal>> {
        let (where_sql, values) = scope.where_clause(kind);
        let date = kind.date_column();
        let sql = format!(
            "SELECT
                CAST(strftime('%Y', {date}) AS INTEGER) AS year,
                CAST(strftime('%m', {date}) AS INTEGER) AS month,
                COALESCE(SUM(amount), 0) AS total
             FROM {}
             {where_sql}
             GROUP BY year, month
             ORDER BY year ASC, month ASC;",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut months = Vec::new();
        while let Some(row) = rows.next()? {
            let month: i64 = row.get("month")?;
            months.push(MonthlyTotal {
                year: row.get("year")?,
                month: month.clamp(1, 12) as u32,
                total: from_minor_units(row.get("total")?),
            });
        }
        Ok(months)
    }

    fn cash_flow_by_type(
        &self,
        kind: CashFlowKind,
        scope: &CashFlowScope,
    ) -> RepoResult<Vec<LabeledTotal>> {
        let (where_sql, values) = scope.where_clause(kind);
        let type_column = kind.type_column();
        let sql = format!(
            "SELECT {type_column} AS label, COALESCE(SUM(amount), 0) AS total
             FROM {}
             {where_sql}
             GROUP BY {type_column}
             ORDER BY total DESC, label ASC;",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut totals = Vec::new();
        while let Some(row) = rows.next()? {
            totals.push(LabeledTotal {
                label: row.get("label")?,
                total: from_minor_units(row.get("total")?),
            });
        }
        Ok(totals)
    }

    fn maintenance_totals(&self, property: PropertyId) -> RepoResult<MaintenanceTotals> {
        let totals = self.conn.query_row(
            "SELECT
                COUNT(*) AS total,
                COALESCE(SUM(status = ?2), 0) AS pending,
                COALESCE(SUM(status = ?3), 0) AS in_progress,
                COALESCE(SUM(status = ?4), 0) AS completed,
                COALESCE(SUM(estimated_cost), 0) AS estimated_cost,
                COALESCE(SUM(actual_cost), 0) AS actual_cost
             FROM maintenance_requests
             WHERE property_uuid = ?1;",
            params![
                property.to_string(),
                MaintenanceStatus::Pending.as_str(),
                MaintenanceStatus::InProgress.as_str(),
                MaintenanceStatus::Completed.as_str(),
            ],
            |row| {
                let count = |name: &str| row.get::<_, i64>(name).map(|v| v.max(0) as u64);
                Ok(MaintenanceTotals {
                    total: count("total")?,
                    pending: count("pending")?,
                    in_progress: count("in_progress")?,
                    completed: count("completed")?,
                    estimated_cost: from_minor_units(row.get("estimated_cost")?),
                    actual_cost: from_minor_units(row.get("actual_cost")?),
                })
            },
        )?;
        Ok(totals)
    }

    fn maintenance_cost_by_category(&self, property: PropertyId) -> RepoResult<Vec<LabeledTotal>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(c.name, '') AS label, COALESCE(SUM(r.actual_cost), 0) AS total
             FROM maintenance_requests r
             LEFT JOIN maintenance_categories c ON c.uuid = r.category_uuid
             WHERE r.property_uuid = ?1
             GROUP BY c.uuid
             ORDER BY total DESC, label ASC;",
        )?;
        let mut rows = stmt.query([property.to_string()])?;
        let mut totals = Vec::new();
        while let Some(row) = rows.next()? {
            totals.push(LabeledTotal {
                label: row.get("label")?,
                total: from_minor_units(row.get("total")?),
            });
        }
        Ok(totals)
    }

    fn latest_maintenance(
        &self,
        property: PropertyId,
        limit: u32,
    ) -> RepoResult<Vec<MaintenanceRequest>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                uuid, request_number, property_uuid, category_uuid, title, description,
                priority, status, request_date, estimated_cost, actual_cost, reported_by,
                assigned_to, completed_date
             FROM maintenance_requests
             WHERE property_uuid = ?1
             ORDER BY request_date DESC, rowid DESC
             LIMIT ?2;",
        )?;
        let mut rows = stmt.query(params![property.to_string(), i64::from(limit)])?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next()? {
            requests.push(parse_request_row(row)?);
        }
        Ok(requests)
    }

    fn dashboard_counts(&self, user: UserId) -> RepoResult<DashboardCounts> {
        Ok(DashboardCounts {
            total_properties: self.count("SELECT COUNT(*) FROM properties;", [])?,
            active_contracts: self
                .count("SELECT COUNT(*) FROM contracts WHERE status = 'active';", [])?,
            pending_maintenance: self.count(
                "SELECT COUNT(*) FROM maintenance_requests WHERE status = 'pending';",
                [],
            )?,
            unread_notifications: self.count(
                "SELECT COUNT(*) FROM notifications WHERE user_uuid = ?1 AND is_read = 0;",
                [user.to_string()],
            )?,
            active_sales: self
                .count("SELECT COUNT(*) FROM sales_contracts WHERE status = 'active';", [])?,
            pending_reservations: self
                .count("SELECT COUNT(*) FROM reservations WHERE status = 'pending';", [])?,
        })
    }
}

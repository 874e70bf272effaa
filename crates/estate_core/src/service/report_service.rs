//! Property analytics: dashboard, financial report, occupancy and maintenance history.
//!
//! Aggregates come from [`ReportRepository`]; ratios, rounding and the
//! occupancy timeline are computed here.

use crate::model::access::UserId;
use crate::model::contract::{Contract, ContractStatus};
use crate::model::maintenance::MaintenanceRequest;
use crate::model::money::{count_percentage, percentage, round_money};
use crate::model::property::{PropertyId, PropertyStatus};
use crate::model::ValidationError;
use crate::repo::contract_repo::{ContractFilter, ContractRepository};
use crate::repo::property_record_repo::{PropertyRecordRepository, UpcomingInspection};
use crate::repo::property_repo::PropertyRepository;
use crate::repo::report_repo::{
    CashFlowKind, CashFlowScope, DashboardCounts, LabeledCount, LabeledTotal, MonthlyTotal,
    ReportRepository, RoiRanking,
};
use crate::repo::RepoError;
use chrono::{Datelike, Duration, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use thiserror::Error;

const TYPE_DISTRIBUTION_LIMIT: u32 = 6;
const TOP_ROI_LIMIT: u32 = 5;
const UPCOMING_INSPECTION_LIMIT: u32 = 5;
const REVENUE_TREND_DAYS: i64 = 180;
const LATEST_MAINTENANCE_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum ReportServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for ReportServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type ReportResult<T> = Result<T, ReportServiceError>;

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDashboard {
    pub total_properties: u64,
    pub active_properties: u64,
    pub available_properties: u64,
    pub status_breakdown: Vec<(PropertyStatus, u64)>,
    pub type_distribution: Vec<LabeledCount>,
    pub average_occupancy: Decimal,
    pub average_roi: Decimal,
    pub monthly_revenue: Vec<MonthlyTotal>,
    pub top_roi: Vec<RoiRanking>,
    pub upcoming_inspections: Vec<UpcomingInspection>,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub active_percentage: Decimal,
    pub available_percentage: Decimal,
}

/// Revenue, expense and their difference over one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfitSummary {
    pub revenue: Decimal,
    pub expense: Decimal,
    pub profit: Decimal,
}

impl ProfitSummary {
    fn new(revenue: Decimal, expense: Decimal) -> Self {
        Self {
            revenue,
            expense,
            profit: revenue - expense,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyProfit {
    pub month: u32,
    pub summary: ProfitSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinancialReport {
    pub property: PropertyId,
    pub all_time: ProfitSummary,
    pub current_year: ProfitSummary,
    pub last_year: ProfitSummary,
    pub investment: Decimal,
    pub current_roi: Decimal,
    pub lifetime_roi: Decimal,
    /// Months 1 through 12 of the current year.
    pub monthly: Vec<MonthlyProfit>,
    pub expense_by_type: Vec<LabeledTotal>,
    pub revenue_by_type: Vec<LabeledTotal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacancyPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyHistory {
    pub property: PropertyId,
    /// Newest start date first.
    pub contracts: Vec<Contract>,
    pub total_days: i64,
    pub occupied_days: i64,
    pub occupancy_rate: Decimal,
    pub total_contracts: u64,
    pub active_contracts: u64,
    pub vacancy_periods: Vec<VacancyPeriod>,
    pub total_vacancy_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceHistory {
    pub property: PropertyId,
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub completion_rate: Decimal,
    pub estimated_cost: Decimal,
    pub actual_cost: Decimal,
    pub cost_by_category: Vec<LabeledTotal>,
    pub latest: Vec<MaintenanceRequest>,
}

pub struct ReportService<R, P, C, X>
where
    R: ReportRepository,
    P: PropertyRepository,
    C: ContractRepository,
    X: PropertyRecordRepository,
{
    reports: R,
    properties: P,
    contracts: C,
    records: X,
}

impl<R, P, C, X> ReportService<R, P, C, X>
where
    R: ReportRepository,
    P: PropertyRepository,
    C: ContractRepository,
    X: PropertyRecordRepository,
{
    pub fn new(reports: R, properties: P, contracts: C, records: X) -> Self {
        Self {
            reports,
            properties,
            contracts,
            records,
        }
    }

    pub fn property_dashboard(&self, today: NaiveDate) -> ReportResult<PropertyDashboard> {
        let summary = self.properties.summary()?;
        let averages = self.reports.metric_averages()?;
        let trend_scope = CashFlowScope {
            from: Some(first_of_month(today) - Duration::days(REVENUE_TREND_DAYS)),
            ..CashFlowScope::default()
        };
        let everything = CashFlowScope::default();

        let dashboard = PropertyDashboard {
            total_properties: summary.total,
            active_properties: summary.active,
            available_properties: summary.available,
            status_breakdown: self.reports.status_breakdown()?,
            type_distribution: self.reports.type_distribution(TYPE_DISTRIBUTION_LIMIT)?,
            average_occupancy: round_money(averages.occupancy.unwrap_or_default()),
            average_roi: round_money(averages.roi.unwrap_or_default()),
            monthly_revenue: self
                .reports
                .cash_flow_by_month(CashFlowKind::Revenue, &trend_scope)?,
            top_roi: self.reports.top_roi(TOP_ROI_LIMIT)?,
            upcoming_inspections: self.records.upcoming_inspections(UPCOMING_INSPECTION_LIMIT)?,
            total_revenue: self
                .reports
                .cash_flow_total(CashFlowKind::Revenue, &everything)?,
            total_expenses: self
                .reports
                .cash_flow_total(CashFlowKind::Expense, &everything)?,
            active_percentage: count_percentage(summary.active, summary.total, 1),
            available_percentage: count_percentage(summary.available, summary.total, 1),
        };
        info!(
            "event=report_dashboard module=reports status=ok total_properties={}",
            dashboard.total_properties
        );
        Ok(dashboard)
    }

    pub fn financial_report(
        &self,
        property: PropertyId,
        today: NaiveDate,
    ) -> ReportResult<FinancialReport> {
        let item = self
            .properties
            .get_property(property)?
            .ok_or_else(|| ReportServiceError::NotFound {
                entity: "property",
                key: property.to_string(),
            })?;
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        let last_year_start = NaiveDate::from_ymd_opt(today.year() - 1, 1, 1).unwrap_or(year_start);
        let last_year_end = year_start - Duration::days(1);

        let all_time = CashFlowScope {
            property: Some(property),
            ..CashFlowScope::default()
        };
        let current_year = CashFlowScope {
            from: Some(year_start),
            ..all_time
        };
        let last_year = CashFlowScope {
            from: Some(last_year_start),
            until: Some(last_year_end),
            ..all_time
        };

        let all_time = self.profit(&all_time)?;
        let last_year_summary = self.profit(&last_year)?;
        let current_year_summary = self.profit(&current_year)?;

        let investment = item.property.investment_base();
        let roi = |profit: Decimal| {
            if investment > Decimal::ZERO {
                percentage(profit, investment, 2)
            } else {
                Decimal::ZERO
            }
        };

        let monthly_revenue = self
            .reports
            .cash_flow_by_month(CashFlowKind::Revenue, &current_year)?;
        let monthly_expense = self
            .reports
            .cash_flow_by_month(CashFlowKind::Expense, &current_year)?;
        let monthly = (1..=12)
            .map(|month| MonthlyProfit {
                month,
                summary: ProfitSummary::new(
                    month_total(&monthly_revenue, month),
                    month_total(&monthly_expense, month),
                ),
            })
            .collect();

        Ok(FinancialReport {
            property,
            current_roi: roi(current_year_summary.profit),
            lifetime_roi: roi(all_time.profit),
            all_time,
            current_year: current_year_summary,
            last_year: last_year_summary,
            investment,
            monthly,
            expense_by_type: self
                .reports
                .cash_flow_by_type(CashFlowKind::Expense, &current_year)?,
            revenue_by_type: self
                .reports
                .cash_flow_by_type(CashFlowKind::Revenue, &current_year)?,
        })
    }

    pub fn occupancy_history(
        &self,
        property: PropertyId,
        today: NaiveDate,
    ) -> ReportResult<OccupancyHistory> {
        let mut contracts = self.contracts.list_contracts(&ContractFilter {
            property: Some(property),
            status: None,
        })?;
        contracts.sort_by_key(|contract| contract.start_date);

        let mut total_days = 0;
        let mut occupied_days = 0;
        for contract in &contracts {
            let duration = contract.duration_days(today);
            total_days += duration;
            if contract.status.counts_as_occupied() {
                occupied_days += duration;
            }
        }

        let vacancy_periods: Vec<VacancyPeriod> = contracts
            .windows(2)
            .filter_map(|pair| {
                let end = pair[0].end_date.unwrap_or(today);
                let next_start = pair[1].start_date;
                (end < next_start).then(|| VacancyPeriod {
                    start: end,
                    end: next_start,
                    days: (next_start - end).num_days(),
                })
            })
            .collect();
        let total_vacancy_days = vacancy_periods.iter().map(|period| period.days).sum();
        let active_contracts = contracts
            .iter()
            .filter(|contract| contract.status == ContractStatus::Active)
            .count() as u64;

        contracts.reverse();
        Ok(OccupancyHistory {
            property,
            total_contracts: contracts.len() as u64,
            active_contracts,
            occupancy_rate: percentage(
                Decimal::from(occupied_days),
                Decimal::from(total_days),
                2,
            ),
            contracts,
            total_days,
            occupied_days,
            vacancy_periods,
            total_vacancy_days,
        })
    }

    pub fn maintenance_history(&self, property: PropertyId) -> ReportResult<MaintenanceHistory> {
        let totals = self.reports.maintenance_totals(property)?;
        Ok(MaintenanceHistory {
            property,
            total: totals.total,
            pending: totals.pending,
            in_progress: totals.in_progress,
            completed: totals.completed,
            completion_rate: count_percentage(totals.completed, totals.total, 2),
            estimated_cost: totals.estimated_cost,
            actual_cost: totals.actual_cost,
            cost_by_category: self.reports.maintenance_cost_by_category(property)?,
            latest: self
                .reports
                .latest_maintenance(property, LATEST_MAINTENANCE_LIMIT)?,
        })
    }

    /// Headline counters of the main dashboard for one signed-in user.
    pub fn dashboard_counts(&self, user: UserId) -> ReportResult<DashboardCounts> {
        Ok(self.reports.dashboard_counts(user)?)
    }

    fn profit(&self, scope: &CashFlowScope) -> ReportResult<ProfitSummary> {
        Ok(ProfitSummary::new(
            self.reports.cash_flow_total(CashFlowKind::Revenue, scope)?,
            self.reports.cash_flow_total(CashFlowKind::Expense, scope)?,
        ))
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Sums one calendar month across years.
fn month_total(months: &[MonthlyTotal], month: u32) -> Decimal {
    months
        .iter()
        .filter(|entry| entry.month == month)
        .map(|entry| entry.total)
        .sum()
}

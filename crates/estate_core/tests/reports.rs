use chrono::NaiveDate;
use estate_core::db::open_db_in_memory;
use estate_core::model::contract::{Contract, ContractStatus};
use estate_core::model::maintenance::MaintenanceRequest;
use estate_core::model::property::{
    Client, ExpenseType, InspectionCondition, Owner, Property, PropertyExpense,
    PropertyInspection, PropertyRevenue, PropertyStatus, PropertyType, RevenueType,
};
use estate_core::repo::contract_repo::SqliteContractRepository;
use estate_core::repo::maintenance_repo::SqliteMaintenanceRepository;
use estate_core::repo::property_record_repo::SqlitePropertyRecordRepository;
use estate_core::repo::property_repo::SqlitePropertyRepository;
use estate_core::repo::report_repo::SqliteReportRepository;
use estate_core::service::leasing_service::LeasingService;
use estate_core::service::maintenance_service::MaintenanceService;
use estate_core::service::property_service::PropertyService;
use estate_core::service::report_service::{ReportService, ReportServiceError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rusqlite::Connection;
use uuid::Uuid;

type Reports<'conn> = ReportService<
    SqliteReportRepository<'conn>,
    SqlitePropertyRepository<'conn>,
    SqliteContractRepository<'conn>,
    SqlitePropertyRecordRepository<'conn>,
>;

fn reports(conn: &Connection) -> Reports<'_> {
    ReportService::new(
        SqliteReportRepository::try_new(conn).unwrap(),
        SqlitePropertyRepository::try_new(conn).unwrap(),
        SqliteContractRepository::try_new(conn).unwrap(),
        SqlitePropertyRecordRepository::try_new(conn).unwrap(),
    )
}

fn properties(
    conn: &Connection,
) -> PropertyService<SqlitePropertyRepository<'_>, SqlitePropertyRecordRepository<'_>> {
    PropertyService::new(
        SqlitePropertyRepository::try_new(conn).unwrap(),
        SqlitePropertyRecordRepository::try_new(conn).unwrap(),
    )
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Portfolio {
    villa: Uuid,
    tower: Uuid,
    client: Uuid,
}

fn portfolio(conn: &Connection) -> Portfolio {
    let service = properties(conn);
    let kind = PropertyType::new("Villa");
    let owner = Owner::new("Owner");
    let client = Client::new("Tenant");
    service.create_type(&kind).unwrap();
    service.create_owner(&owner).unwrap();
    service.create_client(&client).unwrap();

    let mut villa = Property::new("VIL-001", "Villa", kind.uuid, owner.uuid);
    villa.purchase_price = Some(dec!(100000));
    villa.occupancy_rate = Some(dec!(80));
    villa.average_roi = Some(dec!(6.5));
    service.create_property(&villa).unwrap();

    let mut tower = Property::new("VIL-002", "Second villa", kind.uuid, owner.uuid);
    tower.status = PropertyStatus::Rented;
    tower.occupancy_rate = Some(dec!(60));
    tower.average_roi = Some(dec!(8));
    service.create_property(&tower).unwrap();

    Portfolio {
        villa: villa.uuid,
        tower: tower.uuid,
        client: client.uuid,
    }
}

fn revenue(property: Uuid, kind: RevenueType, amount: Decimal, on: NaiveDate) -> PropertyRevenue {
    PropertyRevenue {
        uuid: Uuid::new_v4(),
        property_uuid: property,
        revenue_type: kind,
        amount,
        revenue_date: on,
        contract_uuid: None,
        description: String::new(),
    }
}

fn expense(property: Uuid, kind: ExpenseType, amount: Decimal, on: NaiveDate) -> PropertyExpense {
    PropertyExpense {
        uuid: Uuid::new_v4(),
        property_uuid: property,
        expense_type: kind,
        amount,
        expense_date: on,
        description: String::new(),
    }
}

#[test]
fn financial_report_splits_years_and_computes_roi() {
    let conn = open_db_in_memory().unwrap();
    let portfolio = portfolio(&conn);
    let service = properties(&conn);

    let villa = portfolio.villa;
    service.add_revenue(&revenue(villa, RevenueType::Rent, dec!(5000), date(2023, 11, 10))).unwrap();
    service.add_revenue(&revenue(villa, RevenueType::Rent, dec!(5000), date(2024, 2, 1))).unwrap();
    service.add_revenue(&revenue(villa, RevenueType::Service, dec!(500), date(2024, 2, 20))).unwrap();
    service.add_revenue(&revenue(villa, RevenueType::Rent, dec!(5000), date(2024, 3, 1))).unwrap();
    service.add_expense(&expense(villa, ExpenseType::Maintenance, dec!(1500), date(2024, 2, 10))).unwrap();
    service.add_expense(&expense(villa, ExpenseType::Tax, dec!(2000), date(2023, 5, 1))).unwrap();
    service
        .add_revenue(&revenue(portfolio.tower, RevenueType::Rent, dec!(999), date(2024, 2, 1)))
        .unwrap();

    let report = reports(&conn).financial_report(villa, date(2024, 6, 15)).unwrap();
    assert_eq!(report.investment, dec!(100000));
    assert_eq!(report.current_year.revenue, dec!(10500));
    assert_eq!(report.current_year.expense, dec!(1500));
    assert_eq!(report.current_year.profit, dec!(9000));
    assert_eq!(report.last_year.profit, dec!(3000));
    assert_eq!(report.all_time.profit, dec!(12000));
    assert_eq!(report.current_roi, dec!(9));
    assert_eq!(report.lifetime_roi, dec!(12));

    assert_eq!(report.monthly.len(), 12);
    let february = report.monthly[1];
    assert_eq!(february.month, 2);
    assert_eq!(february.summary.revenue, dec!(5500));
    assert_eq!(february.summary.expense, dec!(1500));
    assert_eq!(report.monthly[0].summary.profit, Decimal::ZERO);

    let by_type: Vec<(&str, Decimal)> = report
        .revenue_by_type
        .iter()
        .map(|row| (row.label.as_str(), row.total))
        .collect();
    assert_eq!(by_type, vec![("rent", dec!(10000)), ("service", dec!(500))]);
}

#[test]
fn financial_report_without_investment_reports_zero_roi() {
    let conn = open_db_in_memory().unwrap();
    let portfolio = portfolio(&conn);
    properties(&conn)
        .add_revenue(&revenue(portfolio.tower, RevenueType::Rent, dec!(100), date(2024, 1, 5)))
        .unwrap();

    let report = reports(&conn)
        .financial_report(portfolio.tower, date(2024, 6, 15))
        .unwrap();
    assert_eq!(report.current_year.profit, dec!(100));
    assert_eq!(report.current_roi, Decimal::ZERO);

    assert!(matches!(
        reports(&conn).financial_report(Uuid::new_v4(), date(2024, 6, 15)),
        Err(ReportServiceError::NotFound { entity: "property", .. })
    ));
}

#[test]
fn occupancy_history_counts_occupied_days_and_gaps() {
    let conn = open_db_in_memory().unwrap();
    let portfolio = portfolio(&conn);
    let leasing = LeasingService::new(
        SqliteContractRepository::try_new(&conn).unwrap(),
        SqlitePropertyRepository::try_new(&conn).unwrap(),
    );

    let contract = |number: &str, start: NaiveDate, end: Option<NaiveDate>, status| {
        let mut contract = Contract::new(number, portfolio.villa, portfolio.client, start, dec!(4000));
        contract.end_date = end;
        contract.status = status;
        contract
    };
    for item in [
        contract("RC-1", date(2023, 1, 1), Some(date(2023, 6, 30)), ContractStatus::Expired),
        contract("RC-3", date(2024, 3, 1), None, ContractStatus::Active),
        contract("RC-2", date(2023, 8, 1), Some(date(2024, 1, 31)), ContractStatus::Terminated),
    ] {
        leasing.create_contract(&item).unwrap();
    }

    let history = reports(&conn)
        .occupancy_history(portfolio.villa, date(2024, 6, 1))
        .unwrap();
    let numbers: Vec<&str> = history
        .contracts
        .iter()
        .map(|contract| contract.contract_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["RC-3", "RC-2", "RC-1"]);
    assert_eq!(history.total_contracts, 3);
    assert_eq!(history.active_contracts, 1);
    assert_eq!(history.total_days, 180 + 183 + 92);
    assert_eq!(history.occupied_days, 180 + 92);
    assert_eq!(history.occupancy_rate, dec!(59.78));

    let gaps: Vec<i64> = history.vacancy_periods.iter().map(|gap| gap.days).collect();
    assert_eq!(gaps, vec![32, 30]);
    assert_eq!(history.vacancy_periods[0].start, date(2023, 6, 30));
    assert_eq!(history.total_vacancy_days, 62);

    let empty = reports(&conn)
        .occupancy_history(portfolio.tower, date(2024, 6, 1))
        .unwrap();
    assert_eq!(empty.total_days, 0);
    assert_eq!(empty.occupancy_rate, Decimal::ZERO);
}

#[test]
fn maintenance_history_totals_costs_per_category() {
    let conn = open_db_in_memory().unwrap();
    let portfolio = portfolio(&conn);
    let maintenance = MaintenanceService::new(SqliteMaintenanceRepository::try_new(&conn).unwrap());

    let plumbing = maintenance.create_category("Plumbing").unwrap();
    let mut leak = MaintenanceRequest::new("MR-1", portfolio.villa, "Leak", date(2024, 1, 5));
    leak.category_uuid = Some(plumbing);
    leak.estimated_cost = Some(dec!(250));
    maintenance.open(&leak).unwrap();
    maintenance.start(leak.uuid).unwrap();
    maintenance.complete(leak.uuid, dec!(300), date(2024, 1, 9)).unwrap();

    let mut paint = MaintenanceRequest::new("MR-2", portfolio.villa, "Paint", date(2024, 2, 1));
    paint.estimated_cost = Some(dec!(100));
    maintenance.open(&paint).unwrap();

    let wiring = MaintenanceRequest::new("MR-3", portfolio.villa, "Wiring", date(2024, 3, 1));
    maintenance.open(&wiring).unwrap();
    maintenance.start(wiring.uuid).unwrap();

    let history = reports(&conn).maintenance_history(portfolio.villa).unwrap();
    assert_eq!(history.total, 3);
    assert_eq!(history.pending, 1);
    assert_eq!(history.in_progress, 1);
    assert_eq!(history.completed, 1);
    assert_eq!(history.completion_rate, dec!(33.33));
    assert_eq!(history.estimated_cost, dec!(350));
    assert_eq!(history.actual_cost, dec!(300));
    assert_eq!(history.cost_by_category[0].label, "Plumbing");
    assert_eq!(history.cost_by_category[0].total, dec!(300));
    let latest: Vec<&str> = history
        .latest
        .iter()
        .map(|request| request.request_number.as_str())
        .collect();
    assert_eq!(latest, vec!["MR-3", "MR-2", "MR-1"]);

    let counts = reports(&conn).dashboard_counts(Uuid::new_v4()).unwrap();
    assert_eq!(counts.total_properties, 2);
    assert_eq!(counts.pending_maintenance, 1);
    assert_eq!(counts.unread_notifications, 0);
}

#[test]
fn property_dashboard_aggregates_portfolio() {
    let conn = open_db_in_memory().unwrap();
    let portfolio = portfolio(&conn);
    let service = properties(&conn);

    service
        .add_revenue(&revenue(portfolio.villa, RevenueType::Rent, dec!(700), date(2024, 5, 3)))
        .unwrap();
    service
        .add_revenue(&revenue(portfolio.tower, RevenueType::Rent, dec!(300), date(2020, 1, 1)))
        .unwrap();
    service
        .add_expense(&expense(portfolio.tower, ExpenseType::Utilities, dec!(40), date(2024, 5, 4)))
        .unwrap();
    service
        .add_inspection(&PropertyInspection {
            uuid: Uuid::new_v4(),
            property_uuid: portfolio.tower,
            inspection_date: date(2024, 4, 1),
            inspector: "Inspector".to_string(),
            condition: InspectionCondition::Good,
            notes: String::new(),
            next_inspection_date: Some(date(2024, 10, 1)),
        })
        .unwrap();

    let dashboard = reports(&conn).property_dashboard(date(2024, 6, 15)).unwrap();
    assert_eq!(dashboard.total_properties, 2);
    assert_eq!(dashboard.active_properties, 2);
    assert_eq!(dashboard.available_properties, 1);
    assert_eq!(dashboard.available_percentage, dec!(50));
    assert_eq!(dashboard.active_percentage, dec!(100));
    assert_eq!(dashboard.type_distribution[0].label, "Villa");
    assert_eq!(dashboard.type_distribution[0].count, 2);
    assert_eq!(dashboard.average_occupancy, dec!(70));
    assert_eq!(dashboard.average_roi, dec!(7.25));
    assert_eq!(dashboard.top_roi[0].code, "VIL-002");
    assert_eq!(dashboard.total_revenue, dec!(1000));
    assert_eq!(dashboard.total_expenses, dec!(40));
    // Only the recent revenue falls inside the trend window.
    assert_eq!(dashboard.monthly_revenue.len(), 1);
    assert_eq!(dashboard.monthly_revenue[0].total, dec!(700));
    assert_eq!(dashboard.upcoming_inspections.len(), 1);
    assert_eq!(dashboard.upcoming_inspections[0].property_code, "VIL-002");
}

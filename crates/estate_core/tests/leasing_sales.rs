use chrono::NaiveDate;
use estate_core::db::open_db_in_memory;
use estate_core::model::contract::{Contract, ContractStatus};
use estate_core::model::property::{Client, Owner, Property, PropertyStatus, PropertyType};
use estate_core::model::sales::{Reservation, ReservationStatus, SalesContractStatus};
use estate_core::repo::contract_repo::{ContractFilter, SqliteContractRepository};
use estate_core::repo::property_repo::{PropertyRepository, SqlitePropertyRepository};
use estate_core::repo::sales_repo::SqliteSalesRepository;
use estate_core::service::leasing_service::{LeasingService, LeasingServiceError};
use estate_core::service::sales_service::{SaleTerms, SalesService, SalesServiceError};
use rust_decimal_macros::dec;
use rusqlite::Connection;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Fixture {
    property: Uuid,
    client: Uuid,
}

fn fixture(conn: &Connection, code: &str) -> Fixture {
    let repo = SqlitePropertyRepository::try_new(conn).unwrap();
    let kind = PropertyType::new(format!("Villa {code}"));
    let owner = Owner::new("Owner");
    let client = Client::new("Omar Saleh");
    repo.create_type(&kind).unwrap();
    repo.create_owner(&owner).unwrap();
    repo.create_client(&client).unwrap();
    let property = Property::new(code, "Villa", kind.uuid, owner.uuid);
    repo.create_property(&property).unwrap();
    Fixture {
        property: property.uuid,
        client: client.uuid,
    }
}

fn property_status(conn: &Connection, id: Uuid) -> PropertyStatus {
    SqlitePropertyRepository::try_new(conn)
        .unwrap()
        .get_property(id)
        .unwrap()
        .unwrap()
        .property
        .status
}

fn leasing(
    conn: &Connection,
) -> LeasingService<SqliteContractRepository<'_>, SqlitePropertyRepository<'_>> {
    LeasingService::new(
        SqliteContractRepository::try_new(conn).unwrap(),
        SqlitePropertyRepository::try_new(conn).unwrap(),
    )
}

fn sales(conn: &Connection) -> SalesService<SqliteSalesRepository<'_>, SqlitePropertyRepository<'_>> {
    SalesService::new(
        SqliteSalesRepository::try_new(conn).unwrap(),
        SqlitePropertyRepository::try_new(conn).unwrap(),
    )
}

fn lease(fixture: &Fixture, number: &str, end: Option<NaiveDate>) -> Contract {
    let mut contract = Contract::new(number, fixture.property, fixture.client, date(2024, 1, 1), dec!(5000));
    contract.end_date = end;
    contract
}

#[test]
fn activation_rents_property_and_termination_releases_it() {
    let conn = open_db_in_memory().unwrap();
    let fixture = fixture(&conn, "VIL-001");
    let leasing = leasing(&conn);

    let contract = lease(&fixture, "RC-001", Some(date(2024, 12, 31)));
    leasing.create_contract(&contract).unwrap();
    assert_eq!(leasing.get_contract(contract.uuid).unwrap().status, ContractStatus::Draft);

    leasing.activate(contract.uuid).unwrap();
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Rented);

    // A rented property cannot take a second lease.
    let second = lease(&fixture, "RC-002", None);
    leasing.create_contract(&second).unwrap();
    assert!(matches!(
        leasing.activate(second.uuid),
        Err(LeasingServiceError::PropertyUnavailable {
            status: PropertyStatus::Rented,
            ..
        })
    ));
    leasing.cancel(second.uuid).unwrap();

    assert!(matches!(
        leasing.cancel(contract.uuid),
        Err(LeasingServiceError::InvalidStatus { .. })
    ));
    leasing.terminate(contract.uuid).unwrap();
    assert_eq!(
        leasing.get_contract(contract.uuid).unwrap().status,
        ContractStatus::Terminated
    );
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Available);

    let cancelled = leasing
        .list_contracts(&ContractFilter {
            status: Some(ContractStatus::Cancelled),
            ..ContractFilter::default()
        })
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].contract_number, "RC-002");
}

#[test]
fn contract_for_missing_property_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let fixture = fixture(&conn, "VIL-001");
    let leasing = leasing(&conn);

    let mut contract = lease(&fixture, "RC-001", None);
    contract.property_uuid = Uuid::new_v4();
    assert!(matches!(
        leasing.create_contract(&contract),
        Err(LeasingServiceError::NotFound { entity: "property", .. })
    ));
}

#[test]
fn expiry_sweep_and_expiring_window() {
    let conn = open_db_in_memory().unwrap();
    let first = fixture(&conn, "VIL-001");
    let second = fixture(&conn, "VIL-002");
    let leasing = leasing(&conn);

    let ended = lease(&first, "RC-001", Some(date(2024, 5, 31)));
    let ending = lease(&second, "RC-002", Some(date(2024, 6, 20)));
    for contract in [&ended, &ending] {
        leasing.create_contract(contract).unwrap();
        leasing.activate(contract.uuid).unwrap();
    }

    let today = date(2024, 6, 1);
    let notices = leasing.expiring_within(today, 30).unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].contract.contract_number, "RC-002");
    assert_eq!(notices[0].property_code, "VIL-002");
    assert_eq!(notices[0].client_name, "Omar Saleh");

    assert_eq!(leasing.expire_ended(today).unwrap(), vec![ended.uuid]);
    assert_eq!(leasing.get_contract(ended.uuid).unwrap().status, ContractStatus::Expired);
    assert_eq!(property_status(&conn, first.property), PropertyStatus::Available);
    assert_eq!(property_status(&conn, second.property), PropertyStatus::Rented);
    assert!(leasing.expire_ended(today).unwrap().is_empty());
}

fn reservation(fixture: &Fixture) -> Reservation {
    Reservation {
        uuid: Uuid::new_v4(),
        property_uuid: fixture.property,
        client_uuid: fixture.client,
        reservation_date: date(2024, 2, 1),
        expiry_date: date(2024, 3, 1),
        deposit_amount: dec!(10000),
        status: ReservationStatus::Confirmed,
    }
}

#[test]
fn reservation_to_completed_sale() {
    let conn = open_db_in_memory().unwrap();
    let fixture = fixture(&conn, "VIL-001");
    let sales = sales(&conn);

    let booking = reservation(&fixture);
    sales.reserve(&booking).unwrap();
    assert_eq!(
        sales.get_reservation(booking.uuid).unwrap().status,
        ReservationStatus::Pending
    );

    sales.confirm_reservation(booking.uuid).unwrap();
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Reserved);

    // Reserved properties cannot be booked again.
    assert!(matches!(
        sales.reserve(&reservation(&fixture)),
        Err(SalesServiceError::PropertyUnavailable { .. })
    ));

    let terms = SaleTerms {
        contract_number: "SC-001".to_string(),
        sale_price: dec!(1200000),
        down_payment: dec!(200000),
        contract_date: date(2024, 2, 15),
    };
    let contract_id = sales.convert_reservation(booking.uuid, &terms).unwrap();
    assert_eq!(
        sales.get_reservation(booking.uuid).unwrap().status,
        ReservationStatus::Converted
    );
    let contract = sales.get_sales_contract(contract_id).unwrap();
    assert_eq!(contract.status, SalesContractStatus::Draft);
    assert_eq!(contract.reservation_uuid, Some(booking.uuid));
    assert_eq!(contract.remaining_balance(), dec!(1000000));

    assert!(matches!(
        sales.complete_sale(contract_id),
        Err(SalesServiceError::ContractState { .. })
    ));
    sales.activate_sales_contract(contract_id).unwrap();
    sales.complete_sale(contract_id).unwrap();
    assert_eq!(
        sales.get_sales_contract(contract_id).unwrap().status,
        SalesContractStatus::Completed
    );
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Sold);
    assert!(matches!(
        sales.cancel_sales_contract(contract_id),
        Err(SalesServiceError::ContractState { .. })
    ));
}

#[test]
fn cancelling_confirmed_reservation_releases_property() {
    let conn = open_db_in_memory().unwrap();
    let fixture = fixture(&conn, "VIL-001");
    let sales = sales(&conn);

    let pending = reservation(&fixture);
    sales.reserve(&pending).unwrap();
    sales.cancel_reservation(pending.uuid).unwrap();
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Available);
    assert!(matches!(
        sales.confirm_reservation(pending.uuid),
        Err(SalesServiceError::ReservationState {
            status: ReservationStatus::Cancelled,
            ..
        })
    ));

    let confirmed = reservation(&fixture);
    sales.reserve(&confirmed).unwrap();
    sales.confirm_reservation(confirmed.uuid).unwrap();
    sales.cancel_reservation(confirmed.uuid).unwrap();
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Available);
    assert_eq!(
        sales
            .list_reservations(Some(ReservationStatus::Cancelled))
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn second_confirmation_on_same_property_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let fixture = fixture(&conn, "VIL-001");
    let sales = sales(&conn);

    let first = reservation(&fixture);
    let second = reservation(&fixture);
    sales.reserve(&first).unwrap();
    sales.reserve(&second).unwrap();

    sales.confirm_reservation(first.uuid).unwrap();
    assert!(matches!(
        sales.confirm_reservation(second.uuid),
        Err(SalesServiceError::PropertyUnavailable {
            status: PropertyStatus::Reserved,
            ..
        })
    ));
    assert_eq!(
        sales.get_reservation(second.uuid).unwrap().status,
        ReservationStatus::Pending
    );

    // Dropping the pending claim keeps the confirmed one in force.
    sales.cancel_reservation(second.uuid).unwrap();
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Reserved);

    sales.cancel_reservation(first.uuid).unwrap();
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Available);
}

#[test]
fn cancelling_pending_claim_keeps_converted_sale_reserved() {
    let conn = open_db_in_memory().unwrap();
    let fixture = fixture(&conn, "VIL-001");
    let sales = sales(&conn);

    let winner = reservation(&fixture);
    let loser = reservation(&fixture);
    sales.reserve(&winner).unwrap();
    sales.reserve(&loser).unwrap();
    sales.confirm_reservation(winner.uuid).unwrap();
    let terms = SaleTerms {
        contract_number: "SC-010".to_string(),
        sale_price: dec!(900000),
        down_payment: dec!(100000),
        contract_date: date(2024, 2, 10),
    };
    sales.convert_reservation(winner.uuid, &terms).unwrap();

    sales.cancel_reservation(loser.uuid).unwrap();
    assert_eq!(property_status(&conn, fixture.property), PropertyStatus::Reserved);
}

#[test]
fn confirmation_is_rejected_once_property_is_rented_or_sold() {
    let conn = open_db_in_memory().unwrap();
    let rented = fixture(&conn, "VIL-001");
    let sold = fixture(&conn, "VIL-002");
    let sales = sales(&conn);
    let leasing = leasing(&conn);

    let late = reservation(&rented);
    sales.reserve(&late).unwrap();
    let contract = lease(&rented, "RC-001", None);
    leasing.create_contract(&contract).unwrap();
    leasing.activate(contract.uuid).unwrap();
    assert!(matches!(
        sales.confirm_reservation(late.uuid),
        Err(SalesServiceError::PropertyUnavailable {
            status: PropertyStatus::Rented,
            ..
        })
    ));
    assert_eq!(property_status(&conn, rented.property), PropertyStatus::Rented);

    let buyer = reservation(&sold);
    let latecomer = reservation(&sold);
    sales.reserve(&buyer).unwrap();
    sales.reserve(&latecomer).unwrap();
    sales.confirm_reservation(buyer.uuid).unwrap();
    let terms = SaleTerms {
        contract_number: "SC-020".to_string(),
        sale_price: dec!(500000),
        down_payment: dec!(50000),
        contract_date: date(2024, 2, 20),
    };
    let contract_id = sales.convert_reservation(buyer.uuid, &terms).unwrap();
    sales.activate_sales_contract(contract_id).unwrap();
    sales.complete_sale(contract_id).unwrap();
    assert!(matches!(
        sales.confirm_reservation(latecomer.uuid),
        Err(SalesServiceError::PropertyUnavailable {
            status: PropertyStatus::Sold,
            ..
        })
    ));
    assert_eq!(property_status(&conn, sold.property), PropertyStatus::Sold);
}

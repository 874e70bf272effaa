use chrono::NaiveDate;
use estate_core::db::open_db_in_memory;
use estate_core::model::access::User;
use estate_core::model::maintenance::{MaintenanceRequest, MaintenanceStatus, Priority};
use estate_core::model::property::{Owner, Property, PropertyType};
use estate_core::repo::access_repo::{AccessRepository, SqliteAccessRepository};
use estate_core::repo::maintenance_repo::{MaintenanceFilter, SqliteMaintenanceRepository};
use estate_core::repo::property_repo::{PropertyRepository, SqlitePropertyRepository};
use estate_core::service::maintenance_service::{MaintenanceService, MaintenanceServiceError};
use rust_decimal_macros::dec;
use rusqlite::Connection;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seed_property(conn: &Connection) -> Uuid {
    let repo = SqlitePropertyRepository::try_new(conn).unwrap();
    let kind = PropertyType::new("Tower");
    let owner = Owner::new("Owner");
    repo.create_type(&kind).unwrap();
    repo.create_owner(&owner).unwrap();
    let property = Property::new("TWR-001", "Tower", kind.uuid, owner.uuid);
    repo.create_property(&property).unwrap();
    property.uuid
}

fn seed_user(conn: &Connection, username: &str) -> Uuid {
    let user = User::new(username);
    SqliteAccessRepository::try_new(conn)
        .unwrap()
        .create_user(&user)
        .unwrap();
    user.uuid
}

fn service(conn: &Connection) -> MaintenanceService<SqliteMaintenanceRepository<'_>> {
    MaintenanceService::new(SqliteMaintenanceRepository::try_new(conn).unwrap())
}

#[test]
fn request_moves_from_pending_to_completed() {
    let conn = open_db_in_memory().unwrap();
    let property = seed_property(&conn);
    let technician = seed_user(&conn, "tech");
    let service = service(&conn);

    let plumbing = service.create_category("Plumbing").unwrap();
    let mut request = MaintenanceRequest::new("MR-001", property, "Leaking pipe", date(2024, 3, 1));
    request.category_uuid = Some(plumbing);
    request.priority = Priority::Urgent;
    request.status = MaintenanceStatus::Completed;
    request.estimated_cost = Some(dec!(300));
    service.open(&request).unwrap();

    let opened = service.get_request(request.uuid).unwrap();
    assert_eq!(opened.status, MaintenanceStatus::Pending);
    assert_eq!(opened.priority, Priority::Urgent);

    service.assign(request.uuid, technician).unwrap();
    let assigned = service.get_request(request.uuid).unwrap();
    assert_eq!(assigned.status, MaintenanceStatus::InProgress);
    assert_eq!(assigned.assigned_to, Some(technician));

    service
        .complete(request.uuid, dec!(275.50), date(2024, 3, 4))
        .unwrap();
    let done = service.get_request(request.uuid).unwrap();
    assert_eq!(done.status, MaintenanceStatus::Completed);
    assert_eq!(done.actual_cost, Some(dec!(275.50)));
    assert_eq!(done.completed_date, Some(date(2024, 3, 4)));

    assert!(matches!(
        service.cancel(request.uuid),
        Err(MaintenanceServiceError::InvalidTransition {
            status: MaintenanceStatus::Completed,
            target: MaintenanceStatus::Cancelled,
            ..
        })
    ));
}

#[test]
fn unassigned_in_progress_request_cannot_restart() {
    let conn = open_db_in_memory().unwrap();
    let property = seed_property(&conn);
    let service = service(&conn);

    let request = MaintenanceRequest::new("MR-002", property, "Broken AC", date(2024, 7, 1));
    service.open(&request).unwrap();
    service.start(request.uuid).unwrap();
    assert!(matches!(
        service.start(request.uuid),
        Err(MaintenanceServiceError::InvalidTransition { .. })
    ));

    service.cancel(request.uuid).unwrap();
    assert_eq!(
        service.get_request(request.uuid).unwrap().status,
        MaintenanceStatus::Cancelled
    );
}

#[test]
fn started_request_rejects_restart_but_allows_reassignment() {
    let conn = open_db_in_memory().unwrap();
    let property = seed_property(&conn);
    let first = seed_user(&conn, "first");
    let second = seed_user(&conn, "second");
    let service = service(&conn);

    let request = MaintenanceRequest::new("MR-004", property, "Door lock", date(2024, 8, 1));
    service.open(&request).unwrap();
    service.assign(request.uuid, first).unwrap();
    assert!(matches!(
        service.start(request.uuid),
        Err(MaintenanceServiceError::InvalidTransition {
            status: MaintenanceStatus::InProgress,
            target: MaintenanceStatus::InProgress,
            ..
        })
    ));

    service.assign(request.uuid, second).unwrap();
    let reassigned = service.get_request(request.uuid).unwrap();
    assert_eq!(reassigned.status, MaintenanceStatus::InProgress);
    assert_eq!(reassigned.assigned_to, Some(second));
}

#[test]
fn completion_before_request_date_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let property = seed_property(&conn);
    let service = service(&conn);

    let request = MaintenanceRequest::new("MR-003", property, "Paint", date(2024, 5, 10));
    service.open(&request).unwrap();
    assert!(matches!(
        service.complete(request.uuid, dec!(100), date(2024, 5, 1)),
        Err(MaintenanceServiceError::Validation(_))
    ));
    assert_eq!(
        service.get_request(request.uuid).unwrap().status,
        MaintenanceStatus::Pending
    );
}

#[test]
fn listing_filters_by_status_and_categories_are_unique() {
    let conn = open_db_in_memory().unwrap();
    let property = seed_property(&conn);
    let service = service(&conn);

    service.create_category("Electrical").unwrap();
    assert!(matches!(
        service.create_category("electrical"),
        Err(MaintenanceServiceError::Conflict(_))
    ));
    assert_eq!(service.list_categories().unwrap().len(), 1);

    for (index, number) in ["MR-010", "MR-011", "MR-012"].into_iter().enumerate() {
        let request = MaintenanceRequest::new(number, property, "Fix", date(2024, 1, 1 + index as u32));
        service.open(&request).unwrap();
        if index == 0 {
            service.cancel(request.uuid).unwrap();
        }
    }

    let pending = service
        .list_requests(&MaintenanceFilter {
            property: Some(property),
            status: Some(MaintenanceStatus::Pending),
        })
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(
        service
            .list_requests(&MaintenanceFilter::default())
            .unwrap()
            .len(),
        3
    );
    assert!(matches!(
        service.get_request(Uuid::new_v4()),
        Err(MaintenanceServiceError::RequestNotFound(_))
    ));
}

use chrono::NaiveDate;
use estate_core::db::open_db_in_memory;
use estate_core::model::property::{
    Owner, Property, PropertyDocument, PropertyImage, PropertyStatus, PropertyType,
};
use estate_core::repo::property_record_repo::{PropertyRecordKind, SqlitePropertyRecordRepository};
use estate_core::repo::property_repo::{
    DisplayMode, PropertyFilter, PropertySort, SqlitePropertyRepository,
};
use estate_core::service::property_service::{PropertyService, PropertyServiceError};
use rust_decimal_macros::dec;
use rusqlite::Connection;
use uuid::Uuid;

type Service<'conn> =
    PropertyService<SqlitePropertyRepository<'conn>, SqlitePropertyRecordRepository<'conn>>;

fn service(conn: &Connection) -> Service<'_> {
    PropertyService::new(
        SqlitePropertyRepository::try_new(conn).unwrap(),
        SqlitePropertyRecordRepository::try_new(conn).unwrap(),
    )
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seed(service: &Service<'_>) -> (Uuid, Uuid) {
    let apartment = PropertyType::new("Apartment");
    let owner = Owner::new("Nadia Haddad");
    service.create_type(&apartment).unwrap();
    service.create_owner(&owner).unwrap();
    (apartment.uuid, owner.uuid)
}

fn property(code: &str, title: &str, kind: Uuid, owner: Uuid) -> Property {
    let mut property = Property::new(code, title, kind, owner);
    property.city = "Riyadh".to_string();
    property
}

#[test]
fn create_get_update_delete_property() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let (kind, owner) = seed(&service);

    let mut flat = property("APT-001", "Garden flat", kind, owner);
    flat.rental_price_monthly = Some(dec!(4500));
    flat.market_value = Some(dec!(900000));
    service.create_property(&flat).unwrap();

    let loaded = service.get_property(flat.uuid).unwrap();
    assert_eq!(loaded.property.code, "APT-001");
    assert_eq!(loaded.type_name, "Apartment");
    assert_eq!(loaded.owner_name, "Nadia Haddad");
    assert_eq!(loaded.property.rental_price_monthly, Some(dec!(4500)));
    assert_eq!(service.get_property_by_code("APT-001").unwrap().property.uuid, flat.uuid);

    flat.title = "Garden flat, renovated".to_string();
    service.update_property(&flat).unwrap();
    assert_eq!(
        service.get_property(flat.uuid).unwrap().property.title,
        "Garden flat, renovated"
    );

    assert!(!service.toggle_active(flat.uuid).unwrap());
    assert!(service.toggle_active(flat.uuid).unwrap());

    service.delete_property(flat.uuid).unwrap();
    assert!(matches!(
        service.get_property(flat.uuid),
        Err(PropertyServiceError::NotFound { .. })
    ));
}

#[test]
fn invalid_code_and_duplicate_code_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let (kind, owner) = seed(&service);

    assert!(matches!(
        service.create_property(&property("bad code!", "Nope", kind, owner)),
        Err(PropertyServiceError::Validation(_))
    ));

    service.create_property(&property("APT-001", "First", kind, owner)).unwrap();
    assert!(matches!(
        service.create_property(&property("APT-001", "Second", kind, owner)),
        Err(PropertyServiceError::Conflict(_))
    ));
}

#[test]
fn property_type_in_use_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let (kind, owner) = seed(&service);
    service.create_property(&property("APT-001", "Flat", kind, owner)).unwrap();

    assert!(matches!(
        service.delete_type(kind),
        Err(PropertyServiceError::Conflict(_))
    ));
}

#[test]
fn listing_filters_sorts_and_clamps_pages() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let (kind, owner) = seed(&service);

    for index in 0..25 {
        let mut item = property(&format!("APT-{index:03}"), "Flat", kind, owner);
        item.rental_price_monthly = Some(dec!(1000) + rust_decimal::Decimal::from(index));
        item.bedrooms = if index % 2 == 0 { 3 } else { 1 };
        if index == 7 {
            item.status = PropertyStatus::Rented;
            item.city = "Jeddah".to_string();
        }
        service.create_property(&item).unwrap();
    }

    let first = service
        .list_properties(&PropertyFilter::default(), PropertySort::Code, DisplayMode::Table, 1)
        .unwrap();
    assert_eq!(first.page.total, 25);
    assert_eq!(first.page.items.len(), 20);
    assert_eq!(first.page.num_pages(), 2);
    assert_eq!(first.page.items[0].property.code, "APT-000");
    assert_eq!(first.summary.total, 25);
    assert_eq!(first.summary.rented, 1);

    let clamped = service
        .list_properties(&PropertyFilter::default(), PropertySort::Code, DisplayMode::Table, 99)
        .unwrap();
    assert_eq!(clamped.page.page, 2);
    assert_eq!(clamped.page.items.len(), 5);

    let grid = service
        .list_properties(&PropertyFilter::default(), PropertySort::RentHigh, DisplayMode::Grid, 1)
        .unwrap();
    assert_eq!(grid.page.items.len(), 12);
    assert_eq!(grid.page.items[0].property.code, "APT-024");

    let filter = PropertyFilter {
        search: Some("jeddah".to_string()),
        ..PropertyFilter::default()
    };
    let found = service
        .list_properties(&filter, PropertySort::Code, DisplayMode::Table, 1)
        .unwrap();
    assert_eq!(found.page.total, 1);
    assert_eq!(found.page.items[0].property.code, "APT-007");
    // Summary ignores the filter.
    assert_eq!(found.summary.total, 25);

    let filter = PropertyFilter {
        min_bedrooms: Some(2),
        max_rent: Some(dec!(1010)),
        ..PropertyFilter::default()
    };
    let found = service
        .list_properties(&filter, PropertySort::Code, DisplayMode::Table, 1)
        .unwrap();
    let codes: Vec<&str> = found
        .page
        .items
        .iter()
        .map(|item| item.property.code.as_str())
        .collect();
    assert_eq!(codes, vec!["APT-000", "APT-002", "APT-004", "APT-006", "APT-008", "APT-010"]);
}

#[test]
fn map_markers_and_comparison_limit() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let (kind, owner) = seed(&service);

    let mut pinned = property("APT-001", "Pinned", kind, owner);
    pinned.latitude = Some(24.71);
    pinned.longitude = Some(46.67);
    service.create_property(&pinned).unwrap();
    let unpinned = property("APT-002", "Unpinned", kind, owner);
    service.create_property(&unpinned).unwrap();

    let markers = service.map_markers().unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].code, "APT-001");
    assert_eq!(markers[0].type_name, "Apartment");

    let compared = service.compare(&[unpinned.uuid, pinned.uuid]).unwrap();
    assert_eq!(compared.len(), 2);
    assert_eq!(compared[0].property.code, "APT-001");

    let too_many: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    assert!(matches!(
        service.compare(&too_many),
        Err(PropertyServiceError::TooManyToCompare(5))
    ));
}

#[test]
fn gallery_puts_primary_first_and_records_can_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let (kind, owner) = seed(&service);
    let flat = property("APT-001", "Flat", kind, owner);
    service.create_property(&flat).unwrap();

    let image = |path: &str, primary: bool, order: i64| PropertyImage {
        uuid: Uuid::new_v4(),
        property_uuid: flat.uuid,
        file_path: path.to_string(),
        caption: String::new(),
        is_primary: primary,
        sort_order: order,
        uploaded_at: 0,
    };
    service.add_image(&image("a.jpg", false, 0)).unwrap();
    let front = image("front.jpg", true, 5);
    service.add_image(&front).unwrap();
    service.add_image(&image("b.jpg", false, 1)).unwrap();

    let gallery = service.gallery(flat.uuid).unwrap();
    let paths: Vec<&str> = gallery.iter().map(|image| image.file_path.as_str()).collect();
    assert_eq!(paths, vec!["front.jpg", "a.jpg", "b.jpg"]);

    assert_eq!(
        service.delete_record(PropertyRecordKind::Image, front.uuid).unwrap(),
        flat.uuid
    );
    assert_eq!(service.gallery(flat.uuid).unwrap().len(), 2);

    let orphan = image("x.jpg", false, 0);
    let orphan = PropertyImage {
        property_uuid: Uuid::new_v4(),
        ..orphan
    };
    assert!(matches!(
        service.add_image(&orphan),
        Err(PropertyServiceError::NotFound { .. })
    ));
}

#[test]
fn documents_expiring_inside_window() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let (kind, owner) = seed(&service);
    let flat = property("APT-001", "Flat", kind, owner);
    service.create_property(&flat).unwrap();

    let document = |title: &str, expiry: Option<NaiveDate>| PropertyDocument {
        uuid: Uuid::new_v4(),
        property_uuid: flat.uuid,
        title: title.to_string(),
        document_type: "permit".to_string(),
        file_path: format!("{title}.pdf"),
        expiry_date: expiry,
        uploaded_by: None,
        uploaded_at: 0,
    };
    service.add_document(&document("soon", Some(date(2024, 6, 10)))).unwrap();
    service.add_document(&document("later", Some(date(2024, 9, 1)))).unwrap();
    service.add_document(&document("past", Some(date(2024, 5, 1)))).unwrap();
    service.add_document(&document("forever", None)).unwrap();

    let expiring = service.documents_expiring(date(2024, 6, 1), 30).unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].title, "soon");
    assert_eq!(service.list_documents(flat.uuid).unwrap().len(), 4);
}

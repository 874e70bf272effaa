use chrono::NaiveDate;
use estate_core::db::open_db_in_memory;
use estate_core::model::access::{
    AuditAction, Language, Permission, PermissionAction, PermissionModule, Role, RoleType,
    SettingType, SettingValue, User,
};
use estate_core::model::ledger::{Account, AccountType, JournalEntry, JournalLine};
use estate_core::repo::access_repo::{AuditQuery, SqliteAccessRepository};
use estate_core::repo::ledger_repo::SqliteLedgerRepository;
use estate_core::service::access_service::{AccessService, AccessServiceError};
use estate_core::service::ledger_service::LedgerService;
use rust_decimal_macros::dec;
use rusqlite::Connection;
use serde_json::json;

fn service(conn: &Connection) -> AccessService<SqliteAccessRepository<'_>> {
    AccessService::new(SqliteAccessRepository::try_new(conn).unwrap())
}

#[test]
fn permissions_flow_through_assigned_role_only() {
    let conn = open_db_in_memory().unwrap();
    let access = service(&conn);

    let user = User::new("layla");
    access.create_user(&user).unwrap();
    let view = Permission::new("View properties", PermissionModule::Properties, PermissionAction::View);
    let change = Permission::new(
        "Change properties",
        PermissionModule::Properties,
        PermissionAction::Change,
    );
    access.create_permission(&view).unwrap();
    access.create_permission(&change).unwrap();
    assert_eq!(access.list_permissions().unwrap().len(), 2);

    let clerk = Role::new("Clerk", RoleType::User);
    access.create_role(&clerk, &[view.uuid]).unwrap();
    assert!(access.role_has_permission(clerk.uuid, "properties.view").unwrap());
    assert!(!access.role_has_permission(clerk.uuid, "properties.change").unwrap());

    assert!(!access.user_has_permission(user.uuid, "properties.view").unwrap());
    access.assign_role(user.uuid, Some(clerk.uuid)).unwrap();
    access.require_permission(user.uuid, "properties.view").unwrap();
    match access.require_permission(user.uuid, "properties.change") {
        Err(AccessServiceError::PermissionDenied { codename, .. }) => {
            assert_eq!(codename, "properties.change");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    access
        .set_role_permissions(clerk.uuid, &[view.uuid, change.uuid])
        .unwrap();
    assert!(access.user_has_permission(user.uuid, "properties.change").unwrap());

    access.assign_role(user.uuid, None).unwrap();
    assert!(!access.user_has_permission(user.uuid, "properties.view").unwrap());
}

#[test]
fn users_are_unique_and_profiles_default() {
    let conn = open_db_in_memory().unwrap();
    let access = service(&conn);

    let user = User::new("layla");
    access.create_user(&user).unwrap();
    assert!(matches!(
        access.create_user(&User::new("LAYLA")),
        Err(AccessServiceError::Conflict(_))
    ));
    assert_eq!(access.get_user_by_username("layla").unwrap().uuid, user.uuid);

    let mut profile = access.get_profile(user.uuid).unwrap();
    assert_eq!(profile.role_uuid, None);
    profile.language = Language::Arabic;
    profile.department = "Leasing".to_string();
    access.save_profile(&profile).unwrap();
    assert_eq!(access.get_profile(user.uuid).unwrap(), profile);

    let mut inactive = User::new("former");
    inactive.is_active = false;
    access.create_user(&inactive).unwrap();
    let active: Vec<String> = access
        .list_active_users()
        .unwrap()
        .into_iter()
        .map(|user| user.username)
        .collect();
    assert_eq!(active, vec!["layla".to_string()]);

    assert!(matches!(
        access.assign_role(user.uuid, Some(uuid::Uuid::new_v4())),
        Err(AccessServiceError::NotFound { entity: "role", .. })
    ));
}

#[test]
fn audit_trail_records_manual_entries_and_postings() {
    let conn = open_db_in_memory().unwrap();
    let access = service(&conn);
    let actor = User::new("auditor");
    access.create_user(&actor).unwrap();

    let property = uuid::Uuid::new_v4();
    access
        .record_audit(
            Some(actor.uuid),
            AuditAction::Update,
            Some(("property", property)),
            "changed rent",
            Some(json!({ "rent": ["4000", "4500"] })),
        )
        .unwrap();

    let ledger = LedgerService::new(SqliteLedgerRepository::try_new(&conn).unwrap());
    let cash = Account::new("1000", "Cash", AccountType::Asset);
    let rent = Account::new("4000", "Rent", AccountType::Revenue);
    ledger.create_account(&cash).unwrap();
    ledger.create_account(&rent).unwrap();
    let entry = JournalEntry::new("JE-1", NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), "Rent");
    ledger
        .create_entry(
            &entry,
            &[
                JournalLine::debit(entry.uuid, cash.uuid, dec!(10)),
                JournalLine::credit(entry.uuid, rent.uuid, dec!(10)),
            ],
        )
        .unwrap();
    ledger.post_entry(entry.uuid, Some(actor.uuid)).unwrap();

    let by_actor = access
        .list_audit(&AuditQuery {
            user_uuid: Some(actor.uuid),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(by_actor.len(), 2);

    let postings = access
        .list_audit(&AuditQuery {
            object_type: Some("journal_entry".to_string()),
            object_uuid: Some(entry.uuid),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(postings.len(), 1);
    assert_eq!(postings[0].action, AuditAction::Update);
    assert_eq!(postings[0].changes.as_ref().unwrap()["is_posted"], json!(true));

    let manual = access
        .list_audit(&AuditQuery {
            object_uuid: Some(property),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(manual[0].description, "changed rent");
}

#[test]
fn typed_settings_round_trip_and_reject_wrong_type() {
    let conn = open_db_in_memory().unwrap();
    let access = service(&conn);

    access
        .put_setting("company_name", SettingValue::String("Dar Estates".into()), "", true, None)
        .unwrap();
    access
        .put_setting("grid_page_size", SettingValue::Integer(12), "", false, None)
        .unwrap();
    access
        .put_setting("email_enabled", SettingValue::Boolean(true), "", false, None)
        .unwrap();
    access
        .put_setting("map_center", SettingValue::Json(json!({ "lat": 24.7, "lng": 46.6 })), "", true, None)
        .unwrap();

    assert_eq!(
        access.setting_string("company_name").unwrap().as_deref(),
        Some("Dar Estates")
    );
    assert_eq!(access.setting_integer("grid_page_size").unwrap(), Some(12));
    assert_eq!(access.setting_bool("email_enabled").unwrap(), Some(true));
    assert_eq!(
        access.setting_json("map_center").unwrap().unwrap()["lat"],
        json!(24.7)
    );
    assert_eq!(access.setting_integer("missing").unwrap(), None);

    match access.setting_integer("company_name") {
        Err(AccessServiceError::SettingType {
            expected, actual, ..
        }) => {
            assert_eq!(expected, SettingType::Integer);
            assert_eq!(actual, SettingType::String);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    access
        .put_setting("grid_page_size", SettingValue::Integer(24), "", false, None)
        .unwrap();
    assert_eq!(access.setting_integer("grid_page_size").unwrap(), Some(24));
    assert_eq!(access.list_settings(true).unwrap().len(), 2);
    assert_eq!(access.list_settings(false).unwrap().len(), 4);
}

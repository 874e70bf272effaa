use chrono::{NaiveDate, NaiveTime};
use estate_core::db::open_db_in_memory;
use estate_core::model::access::User;
use estate_core::model::budget::{Budget, BudgetVariance};
use estate_core::model::contract::Contract;
use estate_core::model::invoice::{Invoice, InvoiceStatus, InvoiceType};
use estate_core::model::ledger::AccountType;
use estate_core::model::maintenance::Priority;
use estate_core::model::notification::{Notification, NotificationPreference, NotificationType};
use estate_core::repo::access_repo::{AccessRepository, SqliteAccessRepository};
use estate_core::repo::contract_repo::ContractNotice;
use estate_core::repo::notification_repo::{NotificationFilter, SqliteNotificationRepository};
use estate_core::service::notification_service::{
    EmailOutcome, MailError, Mailer, NotificationService, NotificationServiceError,
};
use rust_decimal_macros::dec;
use rusqlite::Connection;
use std::cell::RefCell;
use uuid::Uuid;

type Service<'conn> =
    NotificationService<SqliteNotificationRepository<'conn>, SqliteAccessRepository<'conn>>;

fn service(conn: &Connection) -> Service<'_> {
    NotificationService::new(
        SqliteNotificationRepository::try_new(conn).unwrap(),
        SqliteAccessRepository::try_new(conn).unwrap(),
    )
}

fn user(conn: &Connection, username: &str, email: Option<&str>) -> Uuid {
    let mut user = User::new(username);
    user.email = email.map(str::to_string);
    SqliteAccessRepository::try_new(conn)
        .unwrap()
        .create_user(&user)
        .unwrap();
    user.uuid
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap()
}

#[derive(Default)]
struct RecordingMailer {
    sent: RefCell<Vec<(String, String)>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
        self.sent
            .borrow_mut()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
        Err(MailError("smtp unavailable".to_string()))
    }
}

#[test]
fn read_state_counts_and_recent_feed() {
    let conn = open_db_in_memory().unwrap();
    let amal = user(&conn, "amal", None);
    let other = user(&conn, "other", None);
    let service = service(&conn);

    let mut ids = Vec::new();
    for index in 0..3 {
        let notification = Notification::new(
            amal,
            NotificationType::Info,
            format!("Notice {index}"),
            "x".repeat(250),
        );
        ids.push(service.notify(&notification).unwrap().unwrap());
    }
    service
        .notify(&Notification::new(other, NotificationType::Info, "Other", "Body"))
        .unwrap();

    assert_eq!(service.unread_count(amal).unwrap(), 3);
    let recent = service.recent(amal).unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent.iter().all(|item| item.message.chars().count() == 100));

    service.mark_read(amal, ids[0]).unwrap();
    service.mark_read(amal, ids[0]).unwrap();
    let read = service.get_notification(ids[0]).unwrap();
    assert!(read.is_read);
    assert!(read.read_at.is_some());
    assert_eq!(service.unread_count(amal).unwrap(), 2);

    let listing = service
        .list(
            amal,
            &NotificationFilter {
                is_read: Some(false),
                ..NotificationFilter::default()
            },
            1,
        )
        .unwrap();
    assert_eq!(listing.page.total, 2);
    assert_eq!(listing.total_count, 3);
    assert_eq!(listing.unread_count, 2);
    assert_eq!(listing.read_count, 1);

    assert_eq!(service.mark_all_read(amal).unwrap(), 2);
    assert_eq!(service.unread_count(amal).unwrap(), 0);
    assert_eq!(service.unread_count(other).unwrap(), 1);

    service.delete(amal, ids[1]).unwrap();
    assert!(matches!(
        service.get_notification(ids[1]),
        Err(NotificationServiceError::NotFound { .. })
    ));
}

#[test]
fn inapp_preference_suppresses_creation() {
    let conn = open_db_in_memory().unwrap();
    let amal = user(&conn, "amal", None);
    let service = service(&conn);

    let mut preferences = NotificationPreference::defaults_for(amal);
    preferences.inapp.budget_alert = false;
    service.save_preferences(&preferences).unwrap();
    assert_eq!(service.preferences(amal).unwrap(), preferences);

    let skipped = service
        .notify(&Notification::new(amal, NotificationType::BudgetAlert, "Budget", "Over"))
        .unwrap();
    assert!(skipped.is_none());
    let kept = service
        .notify(&Notification::new(amal, NotificationType::Info, "Info", "Hello"))
        .unwrap();
    assert!(kept.is_some());
}

#[test]
fn email_is_sent_once_and_honours_policy() {
    let conn = open_db_in_memory().unwrap();
    let amal = user(&conn, "amal", Some("amal@example.com"));
    let silent = user(&conn, "silent", None);
    let service = service(&conn);
    let mailer = RecordingMailer::default();

    let id = service
        .notify(&Notification::new(amal, NotificationType::PaymentDue, "Invoice due", "Pay"))
        .unwrap()
        .unwrap();

    let mut preferences = NotificationPreference::defaults_for(amal);
    preferences.quiet_hours_start = NaiveTime::from_hms_opt(22, 0, 0);
    preferences.quiet_hours_end = NaiveTime::from_hms_opt(7, 0, 0);
    service.save_preferences(&preferences).unwrap();
    let late = NaiveTime::from_hms_opt(23, 15, 0).unwrap();
    assert_eq!(service.send_email(id, &mailer, late).unwrap(), EmailOutcome::QuietHours);

    assert!(matches!(
        service.send_email(id, &FailingMailer, noon()),
        Err(NotificationServiceError::Mail(_))
    ));
    assert!(!service.get_notification(id).unwrap().is_sent_email);

    assert_eq!(service.send_email(id, &mailer, noon()).unwrap(), EmailOutcome::Sent);
    assert_eq!(service.send_email(id, &mailer, noon()).unwrap(), EmailOutcome::AlreadySent);
    assert_eq!(
        mailer.sent.borrow().as_slice(),
        &[("amal@example.com".to_string(), "Invoice due".to_string())]
    );
    let sent = service.get_notification(id).unwrap();
    assert!(sent.is_sent_email);
    assert!(sent.email_sent_at.is_some());

    let no_address = service
        .notify(&Notification::new(silent, NotificationType::Info, "Hi", "Body"))
        .unwrap()
        .unwrap();
    assert_eq!(
        service.send_email(no_address, &mailer, noon()).unwrap(),
        EmailOutcome::NoAddress
    );

    preferences.email.payment_due = false;
    service.save_preferences(&preferences).unwrap();
    let muted = service
        .notify(&Notification::new(amal, NotificationType::PaymentDue, "Again", "Pay"))
        .unwrap()
        .unwrap();
    assert_eq!(
        service.send_email(muted, &mailer, noon()).unwrap(),
        EmailOutcome::DisabledByPreference
    );
}

#[test]
fn scheduled_notifications_become_due() {
    let conn = open_db_in_memory().unwrap();
    let amal = user(&conn, "amal", Some("amal@example.com"));
    let service = service(&conn);

    let mut early = Notification::new(amal, NotificationType::System, "Early", "Body");
    early.scheduled_for = Some(1_000);
    let mut later = Notification::new(amal, NotificationType::System, "Later", "Body");
    later.scheduled_for = Some(5_000);
    service.notify(&early).unwrap();
    service.notify(&later).unwrap();

    let due = service.due_scheduled(2_000).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].uuid, early.uuid);
}

#[test]
fn generators_deduplicate_per_object_and_set_priority() {
    let conn = open_db_in_memory().unwrap();
    let amal = user(&conn, "amal", None);
    let basil = user(&conn, "basil", None);
    let recipients = [amal, basil];
    let service = service(&conn);
    let today = date(2024, 6, 1);

    let mut contract = Contract::new("RC-9", Uuid::new_v4(), Uuid::new_v4(), date(2023, 6, 1), dec!(4000));
    contract.end_date = Some(date(2024, 6, 5));
    let notices = [ContractNotice {
        contract,
        property_code: "VIL-9".to_string(),
        client_name: "Client".to_string(),
    }];
    let created = service.contract_expiry_alerts(&notices, &recipients, today).unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(service.get_notification(created[0]).unwrap().priority, Priority::High);
    assert!(service
        .contract_expiry_alerts(&notices, &recipients, today)
        .unwrap()
        .is_empty());

    let mut overdue = Invoice::new("INV-9", InvoiceType::Rent, date(2024, 5, 1), date(2024, 5, 15));
    overdue.status = InvoiceStatus::Overdue;
    overdue.total_amount = dec!(100);
    let mut upcoming = Invoice::new("INV-10", InvoiceType::Rent, date(2024, 6, 1), date(2024, 6, 20));
    upcoming.status = InvoiceStatus::Issued;
    upcoming.total_amount = dec!(100);
    let mut paid = upcoming.clone();
    paid.uuid = Uuid::new_v4();
    paid.status = InvoiceStatus::Paid;
    let created = service
        .payment_due_alerts(&[overdue, upcoming, paid], &[amal], today)
        .unwrap();
    assert_eq!(created.len(), 2);
    let priorities: Vec<Priority> = created
        .iter()
        .map(|id| service.get_notification(*id).unwrap().priority)
        .collect();
    assert_eq!(priorities, vec![Priority::Urgent, Priority::High]);

    let budget = Budget::new("Repairs", Uuid::new_v4(), Uuid::new_v4(), dec!(1000));
    let over = BudgetVariance::compute(&budget, AccountType::Expense, dec!(1200));
    let under = BudgetVariance::compute(
        &Budget::new("Utilities", Uuid::new_v4(), Uuid::new_v4(), dec!(1000)),
        AccountType::Expense,
        dec!(800),
    );
    let created = service.budget_overrun_alerts([&over, &under], &[amal]).unwrap();
    assert_eq!(created.len(), 1);
    let alert = service.get_notification(created[0]).unwrap();
    assert_eq!(alert.notification_type, NotificationType::BudgetAlert);
    assert_eq!(alert.object.unwrap().object_uuid, budget.uuid);
}

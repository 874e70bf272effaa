//! Notification and notification preference persistence.
//!
//! # Invariants
//! - `read_at` is written together with `is_read = 1` and never cleared.
//! - `email_sent_at` is written once; later sends are no-ops.
//! - Missing preference rows read back as the defaults.

use super::{
    bool_to_int, ensure_schema_ready, get_bool, get_code, get_uuid, Page, PageRequest, RepoError,
    RepoResult,
};
use crate::db::now_epoch_ms;
use crate::model::access::UserId;
use crate::model::maintenance::Priority;
use crate::model::notification::{
    ChannelSwitches, Notification, NotificationId, NotificationPreference, NotificationType,
    ObjectRef,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub const NOTIFICATION_PAGE_SIZE: u32 = 20;
pub const RECENT_NOTIFICATION_LIMIT: u32 = 10;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    uuid,
    user_uuid,
    title,
    message,
    notification_type,
    priority,
    object_type,
    object_uuid,
    link,
    action_label,
    action_url,
    is_read,
    read_at,
    is_sent_email,
    email_sent_at,
    scheduled_for,
    metadata,
    created_at
FROM notifications";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub notification_type: Option<NotificationType>,
    pub is_read: Option<bool>,
}

/// One page of a user's notifications with unfiltered counters.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationListing {
    pub page: Page<Notification>,
    pub total_count: u64,
    pub unread_count: u64,
    pub read_count: u64,
}

pub trait NotificationRepository {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId>;
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    /// Newest first; an out-of-range page falls back to the last one.
    fn list_for_user(
        &self,
        user: UserId,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> RepoResult<NotificationListing>;
    fn unread_count(&self, user: UserId) -> RepoResult<u64>;
    /// Latest unread notifications, newest first.
    fn recent_unread(&self, user: UserId, limit: u32) -> RepoResult<Vec<Notification>>;
    /// Returns `false` when the notification was already read.
    fn mark_read(&self, user: UserId, id: NotificationId) -> RepoResult<bool>;
    fn mark_all_read(&self, user: UserId) -> RepoResult<u64>;
    fn delete_notification(&self, user: UserId, id: NotificationId) -> RepoResult<()>;
    /// Returns `false` when an e-mail had already been recorded.
    fn mark_emailed(&self, id: NotificationId) -> RepoResult<bool>;
    /// Unsent notifications whose schedule time has passed, oldest first.
    fn due_scheduled(&self, now_ms: i64) -> RepoResult<Vec<Notification>>;
    /// Whether `user` already has a notification of this type for the object.
    fn exists_for_object(
        &self,
        user: UserId,
        notification_type: NotificationType,
        object: &ObjectRef,
    ) -> RepoResult<bool>;

    fn get_preferences(&self, user: UserId) -> RepoResult<NotificationPreference>;
    fn save_preferences(&self, preferences: &NotificationPreference) -> RepoResult<()>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["notifications", "notification_preferences"])?;
        Ok(Self { conn })
    }

    fn count(&self, user: UserId, is_read: Option<bool>) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notifications
             WHERE user_uuid = ?1
               AND (?2 IS NULL OR is_read = ?2);",
            params![user.to_string(), is_read.map(bool_to_int)],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId> {
        notification.validate()?;
        let metadata = notification.metadata.as_ref().map(|value| value.to_string());
        self.conn.execute(
            "INSERT INTO notifications (
                uuid, user_uuid, title, message, notification_type, priority, object_type,
                object_uuid, link, action_label, action_url, scheduled_for, metadata
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                notification.uuid.to_string(),
                notification.user_uuid.to_string(),
                notification.title.trim(),
                notification.message.as_str(),
                notification.notification_type.as_str(),
                notification.priority.as_str(),
                notification.object.as_ref().map(|object| object.object_type.as_str()),
                notification
                    .object
                    .as_ref()
                    .map(|object| object.object_uuid.to_string()),
                notification.link.as_str(),
                notification.action_label.as_str(),
                notification.action_url.as_str(),
                notification.scheduled_for,
                metadata,
            ],
        )?;
        Ok(notification.uuid)
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        let sql = format!("{NOTIFICATION_SELECT_SQL} WHERE uuid = ?1;");
        self.conn
            .query_row(&sql, [id.to_string()], |row| Ok(parse_notification_row(row)))
            .optional()?
            .transpose()
    }

    fn list_for_user(
        &self,
        user: UserId,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> RepoResult<NotificationListing> {
        let user_text = user.to_string();
        let type_code = filter.notification_type.map(NotificationType::as_str);
        let is_read = filter.is_read.map(bool_to_int);

        let matching: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notifications
             WHERE user_uuid = ?1
               AND (?2 IS NULL OR notification_type = ?2)
               AND (?3 IS NULL OR is_read = ?3);",
            params![user_text.as_str(), type_code, is_read],
            |row| row.get(0),
        )?;
        let matching = matching.max(0) as u64;
        let page = page.clamp_to(matching);

        let sql = format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE user_uuid = ?1
               AND (?2 IS NULL OR notification_type = ?2)
               AND (?3 IS NULL OR is_read = ?3)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?4 OFFSET ?5;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            user_text.as_str(),
            type_code,
            is_read,
            page.limit(),
            page.offset(),
        ])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }

        let total_count = self.count(user, None)?;
        let unread_count = self.count(user, Some(false))?;
        Ok(NotificationListing {
            page: Page {
                items,
                total: matching,
                page: page.page,
                per_page: page.per_page,
            },
            total_count,
            unread_count,
            read_count: total_count - unread_count,
        })
    }

    fn unread_count(&self, user: UserId) -> RepoResult<u64> {
        self.count(user, Some(false))
    }

    fn recent_unread(&self, user: UserId, limit: u32) -> RepoResult<Vec<Notification>> {
        let sql = format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE user_uuid = ?1 AND is_read = 0
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![user.to_string(), i64::from(limit)])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn mark_read(&self, user: UserId, id: NotificationId) -> RepoResult<bool> {
        let is_read: Option<i64> = self
            .conn
            .query_row(
                "SELECT is_read FROM notifications WHERE uuid = ?1 AND user_uuid = ?2;",
                params![id.to_string(), user.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match is_read {
            None => Err(RepoError::not_found("notification", id)),
            Some(1) => Ok(false),
            Some(_) => {
                self.conn.execute(
                    "UPDATE notifications
                     SET is_read = 1, read_at = ?2
                     WHERE uuid = ?1 AND is_read = 0;",
                    params![id.to_string(), now_epoch_ms()],
                )?;
                Ok(true)
            }
        }
    }

    fn mark_all_read(&self, user: UserId) -> RepoResult<u64> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1, read_at = ?2
             WHERE user_uuid = ?1 AND is_read = 0;",
            params![user.to_string(), now_epoch_ms()],
        )?;
        Ok(changed as u64)
    }

    fn delete_notification(&self, user: UserId, id: NotificationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM notifications WHERE uuid = ?1 AND user_uuid = ?2;",
            params![id.to_string(), user.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", id));
        }
        Ok(())
    }

    fn mark_emailed(&self, id: NotificationId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_sent_email = 1, email_sent_at = ?2
             WHERE uuid = ?1 AND is_sent_email = 0;",
            params![id.to_string(), now_epoch_ms()],
        )?;
        if changed == 0 && self.get_notification(id)?.is_none() {
            return Err(RepoError::not_found("notification", id));
        }
        Ok(changed == 1)
    }

    fn due_scheduled(&self, now_ms: i64) -> RepoResult<Vec<Notification>> {
        let sql = format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE scheduled_for IS NOT NULL
               AND scheduled_for <= ?1
               AND is_sent_email = 0
             ORDER BY scheduled_for ASC, rowid ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([now_ms])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn exists_for_object(
        &self,
        user: UserId,
        notification_type: NotificationType,
        object: &ObjectRef,
    ) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM notifications
                WHERE user_uuid = ?1
                  AND notification_type = ?2
                  AND object_type = ?3
                  AND object_uuid = ?4
            );",
            params![
                user.to_string(),
                notification_type.as_str(),
                object.object_type.as_str(),
                object.object_uuid.to_string(),
            ],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_preferences(&self, user: UserId) -> RepoResult<NotificationPreference> {
        let stored = self
            .conn
            .query_row(
                "SELECT
                    user_uuid,
                    email_enabled, email_contract_expiry, email_payment_due, email_maintenance,
                    email_document_expiry, email_budget_alert,
                    inapp_enabled, inapp_contract_expiry, inapp_payment_due, inapp_maintenance,
                    inapp_document_expiry, inapp_budget_alert,
                    daily_digest, weekly_digest, quiet_hours_start, quiet_hours_end
                 FROM notification_preferences
                 WHERE user_uuid = ?1;",
                [user.to_string()],
                |row| Ok(parse_preference_row(row)),
            )
            .optional()?
            .transpose()?;
        Ok(stored.unwrap_or_else(|| NotificationPreference::defaults_for(user)))
    }

    fn save_preferences(&self, preferences: &NotificationPreference) -> RepoResult<()> {
        let email = &preferences.email;
        let inapp = &preferences.inapp;
        self.conn.execute(
            "INSERT INTO notification_preferences (
                user_uuid,
                email_enabled, email_contract_expiry, email_payment_due, email_maintenance,
                email_document_expiry, email_budget_alert,
                inapp_enabled, inapp_contract_expiry, inapp_payment_due, inapp_maintenance,
                inapp_document_expiry, inapp_budget_alert,
                daily_digest, weekly_digest, quiet_hours_start, quiet_hours_end
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(user_uuid) DO UPDATE SET
                email_enabled = excluded.email_enabled,
                email_contract_expiry = excluded.email_contract_expiry,
                email_payment_due = excluded.email_payment_due,
                email_maintenance = excluded.email_maintenance,
                email_document_expiry = excluded.email_document_expiry,
                email_budget_alert = excluded.email_budget_alert,
                inapp_enabled = excluded.inapp_enabled,
                inapp_contract_expiry = excluded.inapp_contract_expiry,
                inapp_payment_due = excluded.inapp_payment_due,
                inapp_maintenance = excluded.inapp_maintenance,
                inapp_document_expiry = excluded.inapp_document_expiry,
                inapp_budget_alert = excluded.inapp_budget_alert,
                daily_digest = excluded.daily_digest,
                weekly_digest = excluded.weekly_digest,
                quiet_hours_start = excluded.quiet_hours_start,
                quiet_hours_end = excluded.quiet_hours_end,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                preferences.user_uuid.to_string(),
                bool_to_int(email.enabled),
                bool_to_int(email.contract_expiry),
                bool_to_int(email.payment_due),
                bool_to_int(email.maintenance),
                bool_to_int(email.document_expiry),
                bool_to_int(email.budget_alert),
                bool_to_int(inapp.enabled),
                bool_to_int(inapp.contract_expiry),
                bool_to_int(inapp.payment_due),
                bool_to_int(inapp.maintenance),
                bool_to_int(inapp.document_expiry),
                bool_to_int(inapp.budget_alert),
                bool_to_int(preferences.daily_digest),
                bool_to_int(preferences.weekly_digest),
                preferences.quiet_hours_start,
                preferences.quiet_hours_end,
            ],
        )?;
        Ok(())
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let object_type: Option<String> = row.get("object_type")?;
    let object_uuid: Option<String> = row.get("object_uuid")?;
    let object = match (object_type, object_uuid) {
        (Some(object_type), Some(object_uuid)) => Some(ObjectRef {
            object_type,
            object_uuid: super::parse_uuid(&object_uuid, "notifications.object_uuid")?,
        }),
        _ => None,
    };
    let metadata: Option<String> = row.get("metadata")?;
    let metadata = metadata
        .map(|text| {
            serde_json::from_str(&text).map_err(|err| {
                RepoError::InvalidData(format!("invalid notification metadata json: {err}"))
            })
        })
        .transpose()?;

    Ok(Notification {
        uuid: get_uuid(row, "uuid")?,
        user_uuid: get_uuid(row, "user_uuid")?,
        title: row.get("title")?,
        message: row.get("message")?,
        notification_type: get_code(row, "notification_type", NotificationType::parse)?,
        priority: get_code(row, "priority", Priority::parse)?,
        object,
        link: row.get("link")?,
        action_label: row.get("action_label")?,
        action_url: row.get("action_url")?,
        is_read: get_bool(row, "is_read")?,
        read_at: row.get("read_at")?,
        is_sent_email: get_bool(row, "is_sent_email")?,
        email_sent_at: row.get("email_sent_at")?,
        scheduled_for: row.get("scheduled_for")?,
        metadata,
        created_at: row.get("created_at")?,
    })
}

fn parse_switches(row: &Row<'_>, prefix: &str) -> RepoResult<ChannelSwitches> {
    let flag = |name: &str| get_bool(row, &format!("{prefix}_{name}"));
    Ok(ChannelSwitches {
        enabled: flag("enabled")?,
        contract_expiry: flag("contract_expiry")?,
        payment_due: flag("payment_due")?,
        maintenance: flag("maintenance")?,
        document_expiry: flag("document_expiry")?,
        budget_alert: flag("budget_alert")?,
    })
}

fn parse_preference_row(row: &Row<'_>) -> RepoResult<NotificationPreference> {
    let user_uuid: Uuid = get_uuid(row, "user_uuid")?;
    Ok(NotificationPreference {
        user_uuid,
        email: parse_switches(row, "email")?,
        inapp: parse_switches(row, "inapp")?,
        daily_digest: get_bool(row, "daily_digest")?,
        weekly_digest: get_bool(row, "weekly_digest")?,
        quiet_hours_start: row.get("quiet_hours_start")?,
        quiet_hours_end: row.get("quiet_hours_end")?,
    })
}

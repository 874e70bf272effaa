//! In-app / e-mail notification model and per-user delivery preferences.
//!
//! # Invariants
//! - `read_at` is set exactly when `is_read` becomes true.
//! - A notification is e-mailed at most once (`is_sent_email`).
//! - Types without a dedicated preference switch follow the master switch.

use super::access::UserId;
use super::maintenance::Priority;
use super::{require_text, ValidationError};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

/// Maximum message length exposed by the "recent" dropdown feed.
pub const RECENT_MESSAGE_CHARS: usize = 100;

string_enum! {
    pub enum NotificationType {
        Info => "info",
        Success => "success",
        Warning => "warning",
        Error => "error",
        ContractExpiry => "contract_expiry",
        PaymentDue => "payment_due",
        MaintenanceRequest => "maintenance_request",
        DocumentExpiry => "document_expiry",
        BudgetAlert => "budget_alert",
        System => "system",
    }
}

/// Typed link from a notification to the record it talks about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_uuid: Uuid,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, object_uuid: Uuid) -> Self {
        Self {
            object_type: object_type.into(),
            object_uuid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub uuid: NotificationId,
    pub user_uuid: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub object: Option<ObjectRef>,
    pub link: String,
    pub action_label: String,
    pub action_url: String,
    pub is_read: bool,
    pub read_at: Option<i64>,
    pub is_sent_email: bool,
    pub email_sent_at: Option<i64>,
    /// Epoch ms; `None` means deliver immediately.
    pub scheduled_for: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: i64,
}

impl Notification {
    pub fn new(
        user_uuid: UserId,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            user_uuid,
            title: title.into(),
            message: message.into(),
            notification_type,
            priority: Priority::Medium,
            object: None,
            link: String::new(),
            action_label: String::new(),
            action_url: String::new(),
            is_read: false,
            read_at: None,
            is_sent_email: false,
            email_sent_at: None,
            scheduled_for: None,
            metadata: None,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_text("message", &self.message)
    }

    /// First 100 characters of the message, char-boundary safe.
    pub fn message_preview(&self) -> String {
        self.message.chars().take(RECENT_MESSAGE_CHARS).collect()
    }
}

/// Per-type delivery switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSwitches {
    pub enabled: bool,
    pub contract_expiry: bool,
    pub payment_due: bool,
    pub maintenance: bool,
    pub document_expiry: bool,
    pub budget_alert: bool,
}

impl Default for ChannelSwitches {
    fn default() -> Self {
        Self {
            enabled: true,
            contract_expiry: true,
            payment_due: true,
            maintenance: true,
            document_expiry: true,
            budget_alert: true,
        }
    }
}

impl ChannelSwitches {
    /// Master switch first, then the per-type flag; other types pass.
    pub fn allows(&self, notification_type: NotificationType) -> bool {
        if !self.enabled {
            return false;
        }
        match notification_type {
            NotificationType::ContractExpiry => self.contract_expiry,
            NotificationType::PaymentDue => self.payment_due,
            NotificationType::MaintenanceRequest => self.maintenance,
            NotificationType::DocumentExpiry => self.document_expiry,
            NotificationType::BudgetAlert => self.budget_alert,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub user_uuid: UserId,
    pub email: ChannelSwitches,
    pub inapp: ChannelSwitches,
    pub daily_digest: bool,
    pub weekly_digest: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
}

impl NotificationPreference {
    /// Defaults for a user who never saved preferences.
    pub fn defaults_for(user_uuid: UserId) -> Self {
        Self {
            user_uuid,
            email: ChannelSwitches::default(),
            inapp: ChannelSwitches::default(),
            daily_digest: false,
            weekly_digest: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
        }
    }

    pub fn should_send_email(&self, notification_type: NotificationType) -> bool {
        self.email.allows(notification_type)
    }

    pub fn should_show_inapp(&self, notification_type: NotificationType) -> bool {
        self.inapp.allows(notification_type)
    }

    /// Whether `time` falls in the quiet window. Windows may wrap midnight
    /// (`22:00`-`07:00`); the start is inclusive and the end exclusive.
    pub fn in_quiet_hours(&self, time: NaiveTime) -> bool {
        match (self.quiet_hours_start, self.quiet_hours_end) {
            (Some(start), Some(end)) if start < end => start <= time && time < end,
            (Some(start), Some(end)) if start > end => time >= start || time < end,
            _ => false,
        }
    }
}

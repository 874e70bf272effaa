//! Notification delivery and alert generation.
//!
//! # Responsibility
//! - Create in-app notifications honouring user preferences.
//! - Serve the notification centre: listing, counts, recent feed, read state.
//! - Deliver e-mail through a [`Mailer`] at most once per notification.
//! - Generate contract, payment, document and budget alerts without duplicates.

use crate::model::access::UserId;
use crate::model::budget::BudgetVariance;
use crate::model::invoice::{Invoice, InvoiceStatus};
use crate::model::maintenance::Priority;
use crate::model::notification::{
    Notification, NotificationId, NotificationPreference, NotificationType, ObjectRef,
};
use crate::model::property::PropertyDocument;
use crate::model::ValidationError;
use crate::repo::access_repo::AccessRepository;
use crate::repo::contract_repo::ContractNotice;
use crate::repo::notification_repo::{
    NotificationFilter, NotificationListing, NotificationRepository, NOTIFICATION_PAGE_SIZE,
    RECENT_NOTIFICATION_LIMIT,
};
use crate::repo::{PageRequest, RepoError};
use chrono::{NaiveDate, NaiveTime};
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

/// Outbound e-mail transport.
pub trait Mailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Mailer that only records a delivery event in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, _to: &str, _subject: &str, body: &str) -> Result<(), MailError> {
        info!(
            "event=mail_send module=notifications status=ok transport=log body_chars={}",
            body.chars().count()
        );
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum NotificationServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for NotificationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type NotificationResult<T> = Result<T, NotificationServiceError>;

/// Why an e-mail was or was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailOutcome {
    Sent,
    AlreadySent,
    DisabledByPreference,
    NoAddress,
    QuietHours,
}

/// Dropdown feed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentNotification {
    pub uuid: NotificationId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub link: String,
    pub created_at: i64,
}

pub struct NotificationService<N: NotificationRepository, A: AccessRepository> {
    repo: N,
    access: A,
}

impl<N: NotificationRepository, A: AccessRepository> NotificationService<N, A> {
    pub fn new(repo: N, access: A) -> Self {
        Self { repo, access }
    }

    /// Stores `notification` unless the recipient disabled in-app delivery for its type.
    pub fn notify(&self, notification: &Notification) -> NotificationResult<Option<NotificationId>> {
        let preferences = self.repo.get_preferences(notification.user_uuid)?;
        if !preferences.should_show_inapp(notification.notification_type) {
            info!(
                "event=notification_create module=notifications status=ok skipped=inapp_disabled notification_type={}",
                notification.notification_type
            );
            return Ok(None);
        }
        let id = self.repo.create_notification(notification)?;
        info!(
            "event=notification_create module=notifications status=ok notification_id={id} notification_type={}",
            notification.notification_type
        );
        Ok(Some(id))
    }

    pub fn get_notification(&self, id: NotificationId) -> NotificationResult<Notification> {
        self.repo
            .get_notification(id)?
            .ok_or_else(|| NotificationServiceError::NotFound {
                entity: "notification",
                key: id.to_string(),
            })
    }

    pub fn list(
        &self,
        user: UserId,
        filter: &NotificationFilter,
        page: u32,
    ) -> NotificationResult<NotificationListing> {
        Ok(self.repo.list_for_user(
            user,
            filter,
            PageRequest::new(page, NOTIFICATION_PAGE_SIZE),
        )?)
    }

    pub fn unread_count(&self, user: UserId) -> NotificationResult<u64> {
        Ok(self.repo.unread_count(user)?)
    }

    /// Latest unread notifications with messages cut to preview length.
    pub fn recent(&self, user: UserId) -> NotificationResult<Vec<RecentNotification>> {
        let recent = self
            .repo
            .recent_unread(user, RECENT_NOTIFICATION_LIMIT)?
            .into_iter()
            .map(|notification| RecentNotification {
                message: notification.message_preview(),
                uuid: notification.uuid,
                title: notification.title,
                notification_type: notification.notification_type,
                priority: notification.priority,
                link: notification.link,
                created_at: notification.created_at,
            })
            .collect();
        Ok(recent)
    }

    /// Marks one notification read; repeated calls are no-ops.
    pub fn mark_read(&self, user: UserId, id: NotificationId) -> NotificationResult<()> {
        if self.repo.mark_read(user, id)? {
            info!("event=notification_read module=notifications status=ok notification_id={id}");
        }
        Ok(())
    }

    pub fn mark_all_read(&self, user: UserId) -> NotificationResult<u64> {
        let count = self.repo.mark_all_read(user)?;
        info!("event=notification_read_all module=notifications status=ok count={count}");
        Ok(count)
    }

    pub fn delete(&self, user: UserId, id: NotificationId) -> NotificationResult<()> {
        Ok(self.repo.delete_notification(user, id)?)
    }

    pub fn preferences(&self, user: UserId) -> NotificationResult<NotificationPreference> {
        Ok(self.repo.get_preferences(user)?)
    }

    pub fn save_preferences(&self, preferences: &NotificationPreference) -> NotificationResult<()> {
        Ok(self.repo.save_preferences(preferences)?)
    }

    /// Sends the notification by e-mail once, honouring preferences and quiet hours.
    pub fn send_email(
        &self,
        id: NotificationId,
        mailer: &dyn Mailer,
        now: NaiveTime,
    ) -> NotificationResult<EmailOutcome> {
        let notification = self.get_notification(id)?;
        if notification.is_sent_email {
            return Ok(EmailOutcome::AlreadySent);
        }
        let preferences = self.repo.get_preferences(notification.user_uuid)?;
        if !preferences.should_send_email(notification.notification_type) {
            return Ok(EmailOutcome::DisabledByPreference);
        }
        if preferences.in_quiet_hours(now) {
            return Ok(EmailOutcome::QuietHours);
        }
        let address = self
            .access
            .get_user(notification.user_uuid)?
            .and_then(|user| user.email)
            .filter(|email| !email.trim().is_empty());
        let Some(address) = address else {
            return Ok(EmailOutcome::NoAddress);
        };

        if let Err(err) = mailer.send(&address, &notification.title, &notification.message) {
            warn!(
                "event=notification_email module=notifications status=error notification_id={id} error={err}"
            );
            return Err(err.into());
        }
        if !self.repo.mark_emailed(id)? {
            return Ok(EmailOutcome::AlreadySent);
        }
        info!("event=notification_email module=notifications status=ok notification_id={id}");
        Ok(EmailOutcome::Sent)
    }

    /// Scheduled notifications whose time has come and that were not e-mailed yet.
    pub fn due_scheduled(&self, now_ms: i64) -> NotificationResult<Vec<Notification>> {
        Ok(self.repo.due_scheduled(now_ms)?)
    }

    pub fn contract_expiry_alerts(
        &self,
        notices: &[ContractNotice],
        recipients: &[UserId],
        today: NaiveDate,
    ) -> NotificationResult<Vec<NotificationId>> {
        let mut created = Vec::new();
        for notice in notices {
            let Some(end_date) = notice.contract.end_date else {
                continue;
            };
            let days_left = (end_date - today).num_days();
            let object = ObjectRef::new("contract", notice.contract.uuid);
            let priority = if days_left <= 7 {
                Priority::High
            } else {
                Priority::Medium
            };
            for &user in recipients {
                let mut notification = Notification::new(
                    user,
                    NotificationType::ContractExpiry,
                    format!("Contract {} expiring", notice.contract.contract_number),
                    format!(
                        "Contract {} for property {} with {} ends on {end_date} ({days_left} days left).",
                        notice.contract.contract_number, notice.property_code, notice.client_name
                    ),
                );
                notification.priority = priority;
                notification.metadata = Some(serde_json::json!({ "days_left": days_left }));
                created.extend(self.notify_once(notification, object.clone())?);
            }
        }
        log_generated("contract_expiry", created.len());
        Ok(created)
    }

    /// Payment-due alerts for collectible invoices; overdue ones are flagged urgent.
    pub fn payment_due_alerts(
        &self,
        invoices: &[Invoice],
        recipients: &[UserId],
        today: NaiveDate,
    ) -> NotificationResult<Vec<NotificationId>> {
        let mut created = Vec::new();
        for invoice in invoices.iter().filter(|invoice| invoice.status.is_collectible()) {
            let overdue = invoice.status == InvoiceStatus::Overdue || invoice.due_date < today;
            let object = ObjectRef::new("invoice", invoice.uuid);
            for &user in recipients {
                let (title, priority) = if overdue {
                    (format!("Invoice {} overdue", invoice.invoice_number), Priority::Urgent)
                } else {
                    (format!("Invoice {} due", invoice.invoice_number), Priority::High)
                };
                let mut notification = Notification::new(
                    user,
                    NotificationType::PaymentDue,
                    title,
                    format!(
                        "Invoice {} has an outstanding balance of {} due on {}.",
                        invoice.invoice_number,
                        invoice.balance(),
                        invoice.due_date
                    ),
                );
                notification.priority = priority;
                created.extend(self.notify_once(notification, object.clone())?);
            }
        }
        log_generated("payment_due", created.len());
        Ok(created)
    }

    pub fn document_expiry_alerts(
        &self,
        documents: &[PropertyDocument],
        recipients: &[UserId],
    ) -> NotificationResult<Vec<NotificationId>> {
        let mut created = Vec::new();
        for document in documents {
            let Some(expiry_date) = document.expiry_date else {
                continue;
            };
            let object = ObjectRef::new("property_document", document.uuid);
            for &user in recipients {
                let notification = Notification::new(
                    user,
                    NotificationType::DocumentExpiry,
                    format!("Document {} expiring", document.title),
                    format!("Document {} expires on {expiry_date}.", document.title),
                );
                created.extend(self.notify_once(notification, object.clone())?);
            }
        }
        log_generated("document_expiry", created.len());
        Ok(created)
    }

    /// Alerts for budgets whose spending exceeds the budgeted amount.
    pub fn budget_overrun_alerts<'a>(
        &self,
        variances: impl IntoIterator<Item = &'a BudgetVariance>,
        recipients: &[UserId],
    ) -> NotificationResult<Vec<NotificationId>> {
        let mut created = Vec::new();
        for variance in variances.into_iter().filter(|variance| variance.is_overrun()) {
            let object = ObjectRef::new("budget", variance.budget_uuid);
            for &user in recipients {
                let mut notification = Notification::new(
                    user,
                    NotificationType::BudgetAlert,
                    format!("Budget {} exceeded", variance.name),
                    format!(
                        "Actual {} exceeds budgeted {} by {}%.",
                        variance.actual_amount,
                        variance.budgeted_amount,
                        variance.variance_percentage.abs()
                    ),
                );
                notification.priority = Priority::High;
                created.extend(self.notify_once(notification, object.clone())?);
            }
        }
        log_generated("budget_alert", created.len());
        Ok(created)
    }

    fn notify_once(
        &self,
        mut notification: Notification,
        object: ObjectRef,
    ) -> NotificationResult<Option<NotificationId>> {
        if self.repo.exists_for_object(
            notification.user_uuid,
            notification.notification_type,
            &object,
        )? {
            return Ok(None);
        }
        notification.object = Some(object);
        self.notify(&notification)
    }
}

fn log_generated(kind: &str, count: usize) {
    info!("event=notification_generate module=notifications status=ok kind={kind} count={count}");
}

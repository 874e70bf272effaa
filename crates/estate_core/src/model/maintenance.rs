//! Maintenance ticket model.
//!
//! # Invariants
//! - `completed` and `cancelled` are terminal states.
//! - `completed_date`, when set, is not earlier than `request_date`.

use super::access::UserId;
use super::property::PropertyId;
use super::{require_non_negative, require_text, ValidationError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MaintenanceRequestId = Uuid;
pub type MaintenanceCategoryId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceCategory {
    pub uuid: MaintenanceCategoryId,
    pub name: String,
}

string_enum! {
    pub enum Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

string_enum! {
    pub enum MaintenanceStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl MaintenanceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub uuid: MaintenanceRequestId,
    pub request_number: String,
    pub property_uuid: PropertyId,
    pub category_uuid: Option<MaintenanceCategoryId>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: MaintenanceStatus,
    pub request_date: NaiveDate,
    pub estimated_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
    pub reported_by: Option<UserId>,
    pub assigned_to: Option<UserId>,
    pub completed_date: Option<NaiveDate>,
}

impl MaintenanceRequest {
    pub fn new(
        request_number: impl Into<String>,
        property_uuid: PropertyId,
        title: impl Into<String>,
        request_date: NaiveDate,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            request_number: request_number.into(),
            property_uuid,
            category_uuid: None,
            title: title.into(),
            description: String::new(),
            priority: Priority::Medium,
            status: MaintenanceStatus::Pending,
            request_date,
            estimated_cost: None,
            actual_cost: None,
            reported_by: None,
            assigned_to: None,
            completed_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("request_number", &self.request_number)?;
        require_text("title", &self.title)?;
        if let Some(cost) = self.estimated_cost {
            require_non_negative("estimated_cost", cost)?;
        }
        if let Some(cost) = self.actual_cost {
            require_non_negative("actual_cost", cost)?;
        }
        if let Some(completed) = self.completed_date {
            if completed < self.request_date {
                return Err(ValidationError::DateOrder {
                    earlier: "request_date",
                    later: "completed_date",
                });
            }
        }
        Ok(())
    }
}

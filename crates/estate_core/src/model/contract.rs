//! Rental contract model.
//!
//! # Invariants
//! - `end_date`, when set, is not earlier than `start_date`.
//! - Only `active` and `expired` contracts count as occupied time.

use super::property::{ClientId, PropertyId};
use super::{require_non_negative, require_text, ValidationError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ContractId = Uuid;

string_enum! {
    pub enum ContractStatus {
        Draft => "draft",
        Active => "active",
        Expired => "expired",
        Terminated => "terminated",
        Cancelled => "cancelled",
    }
}

impl ContractStatus {
    /// Whether contract days are counted as occupied.
    pub fn counts_as_occupied(self) -> bool {
        matches!(self, Self::Active | Self::Expired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub uuid: ContractId,
    pub contract_number: String,
    pub property_uuid: PropertyId,
    pub client_uuid: ClientId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent: Decimal,
    pub deposit: Decimal,
    pub status: ContractStatus,
}

impl Contract {
    pub fn new(
        contract_number: impl Into<String>,
        property_uuid: PropertyId,
        client_uuid: ClientId,
        start_date: NaiveDate,
        monthly_rent: Decimal,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            contract_number: contract_number.into(),
            property_uuid,
            client_uuid,
            start_date,
            end_date: None,
            monthly_rent,
            deposit: Decimal::ZERO,
            status: ContractStatus::Draft,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("contract_number", &self.contract_number)?;
        require_non_negative("monthly_rent", self.monthly_rent)?;
        require_non_negative("deposit", self.deposit)?;
        if let Some(end_date) = self.end_date {
            if end_date < self.start_date {
                return Err(ValidationError::DateOrder {
                    earlier: "start_date",
                    later: "end_date",
                });
            }
        }
        Ok(())
    }

    /// Contract length in days, open-ended contracts run until `today`.
    pub fn duration_days(&self, today: NaiveDate) -> i64 {
        let end = self.end_date.unwrap_or(today);
        (end - self.start_date).num_days()
    }
}

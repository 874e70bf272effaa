//! Reservation and sales contract model.

use super::property::{ClientId, PropertyId};
use super::{require_non_negative, require_text, ValidationError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ReservationId = Uuid;
pub type SalesContractId = Uuid;

string_enum! {
    pub enum ReservationStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Cancelled => "cancelled",
        Expired => "expired",
        Converted => "converted",
    }
}

impl ReservationStatus {
    /// Open reservations still hold the property.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub uuid: ReservationId,
    pub property_uuid: PropertyId,
    pub client_uuid: ClientId,
    pub reservation_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub deposit_amount: Decimal,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_negative("deposit_amount", self.deposit_amount)?;
        if self.expiry_date < self.reservation_date {
            return Err(ValidationError::DateOrder {
                earlier: "reservation_date",
                later: "expiry_date",
            });
        }
        Ok(())
    }
}

string_enum! {
    pub enum SalesContractStatus {
        Draft => "draft",
        Active => "active",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesContract {
    pub uuid: SalesContractId,
    pub contract_number: String,
    pub property_uuid: PropertyId,
    pub client_uuid: ClientId,
    pub reservation_uuid: Option<ReservationId>,
    pub sale_price: Decimal,
    pub down_payment: Decimal,
    pub contract_date: NaiveDate,
    pub status: SalesContractStatus,
}

impl SalesContract {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("contract_number", &self.contract_number)?;
        require_non_negative("sale_price", self.sale_price)?;
        require_non_negative("down_payment", self.down_payment)?;
        if self.down_payment > self.sale_price {
            return Err(ValidationError::InvalidFormat {
                field: "down_payment",
                value: format!("{} exceeds sale price {}", self.down_payment, self.sale_price),
            });
        }
        Ok(())
    }

    /// Amount still owed after the down payment.
    pub fn remaining_balance(&self) -> Decimal {
        self.sale_price - self.down_payment
    }
}

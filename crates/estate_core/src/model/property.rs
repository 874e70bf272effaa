//! Property inventory model.
//!
//! # Responsibility
//! - Define properties, their lookup records (types, owners, clients) and the
//!   per-property records shown on the detail page.
//!
//! # Invariants
//! - `code` is unique and non-blank.
//! - Coordinates are either both present or both absent, and within range.
//! - Money fields are non-negative with two decimal places.

use super::{require_non_negative, require_text, ValidationError};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PropertyId = Uuid;
pub type PropertyTypeId = Uuid;
pub type OwnerId = Uuid;
pub type ClientId = Uuid;

static PROPERTY_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-/]{0,49}$").expect("valid property code regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub uuid: PropertyTypeId,
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

impl PropertyType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub uuid: OwnerId,
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl Owner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            phone: String::new(),
            email: String::new(),
        }
    }
}

/// Tenant or buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub uuid: ClientId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub national_id: String,
}

impl Client {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            phone: String::new(),
            email: String::new(),
            national_id: String::new(),
        }
    }
}

string_enum! {
    pub enum PropertyStatus {
        Available => "available",
        Rented => "rented",
        Reserved => "reserved",
        Sold => "sold",
        Maintenance => "maintenance",
    }
}

impl PropertyStatus {
    /// Human label used by dashboards.
    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Rented => "Rented",
            Self::Reserved => "Reserved",
            Self::Sold => "Sold",
            Self::Maintenance => "Under Maintenance",
        }
    }
}

/// Canonical property record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub uuid: PropertyId,
    pub code: String,
    pub title: String,
    pub property_type_uuid: PropertyTypeId,
    pub owner_uuid: OwnerId,
    pub status: PropertyStatus,
    pub address: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rental_price_monthly: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
    pub area_sqm: Option<Decimal>,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub is_furnished: bool,
    pub is_active: bool,
    /// Percentage, two places.
    pub occupancy_rate: Option<Decimal>,
    /// Percentage, two places.
    pub average_roi: Option<Decimal>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Property {
    pub fn new(
        code: impl Into<String>,
        title: impl Into<String>,
        property_type_uuid: PropertyTypeId,
        owner_uuid: OwnerId,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            code: code.into(),
            title: title.into(),
            property_type_uuid,
            owner_uuid,
            status: PropertyStatus::Available,
            address: String::new(),
            city: String::new(),
            latitude: None,
            longitude: None,
            rental_price_monthly: None,
            market_value: None,
            purchase_price: None,
            area_sqm: None,
            bedrooms: 0,
            bathrooms: 0,
            is_furnished: false,
            is_active: true,
            occupancy_rate: None,
            average_roi: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if !PROPERTY_CODE_RE.is_match(&self.code) {
            return Err(ValidationError::InvalidFormat {
                field: "code",
                value: self.code.clone(),
            });
        }

        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(ValidationError::InvalidFormat {
                        field: "latitude",
                        value: lat.to_string(),
                    });
                }
                if !(-180.0..=180.0).contains(&lng) {
                    return Err(ValidationError::InvalidFormat {
                        field: "longitude",
                        value: lng.to_string(),
                    });
                }
            }
            (None, None) => {}
            _ => {
                return Err(ValidationError::InvalidFormat {
                    field: "coordinates",
                    value: "latitude and longitude must be set together".to_string(),
                })
            }
        }

        for (field, value) in [
            ("rental_price_monthly", self.rental_price_monthly),
            ("market_value", self.market_value),
            ("purchase_price", self.purchase_price),
            ("area_sqm", self.area_sqm),
        ] {
            if let Some(value) = value {
                require_non_negative(field, value)?;
            }
        }
        for (field, value) in [
            ("occupancy_rate", self.occupancy_rate),
            ("average_roi", self.average_roi),
        ] {
            if let Some(value) = value {
                super::money::to_minor_units(value)
                    .map_err(|source| ValidationError::Money { field, source })?;
            }
        }
        Ok(())
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Capital base for ROI: purchase price, falling back to market value.
    pub fn investment_base(&self) -> Decimal {
        self.purchase_price
            .filter(|value| !value.is_zero())
            .or(self.market_value)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyImage {
    pub uuid: Uuid,
    pub property_uuid: PropertyId,
    pub file_path: String,
    pub caption: String,
    pub is_primary: bool,
    pub sort_order: i64,
    pub uploaded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDocument {
    pub uuid: Uuid,
    pub property_uuid: PropertyId,
    pub title: String,
    pub document_type: String,
    pub file_path: String,
    pub expiry_date: Option<NaiveDate>,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValuation {
    pub uuid: Uuid,
    pub property_uuid: PropertyId,
    pub valuation_date: NaiveDate,
    pub value: Decimal,
    pub valuer: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAmenity {
    pub uuid: Uuid,
    pub property_uuid: PropertyId,
    pub name: String,
    pub description: String,
}

string_enum! {
    pub enum InspectionCondition {
        Excellent => "excellent",
        Good => "good",
        Fair => "fair",
        Poor => "poor",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInspection {
    pub uuid: Uuid,
    pub property_uuid: PropertyId,
    pub inspection_date: NaiveDate,
    pub inspector: String,
    pub condition: InspectionCondition,
    pub notes: String,
    pub next_inspection_date: Option<NaiveDate>,
}

string_enum! {
    pub enum ExpenseType {
        Maintenance => "maintenance",
        Utilities => "utilities",
        Tax => "tax",
        Insurance => "insurance",
        Management => "management",
        Other => "other",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyExpense {
    pub uuid: Uuid,
    pub property_uuid: PropertyId,
    pub expense_type: ExpenseType,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub description: String,
}

string_enum! {
    pub enum RevenueType {
        Rent => "rent",
        Sale => "sale",
        Deposit => "deposit",
        Service => "service",
        Other => "other",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRevenue {
    pub uuid: Uuid,
    pub property_uuid: PropertyId,
    pub revenue_type: RevenueType,
    pub amount: Decimal,
    pub revenue_date: NaiveDate,
    pub contract_uuid: Option<Uuid>,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Property {
        Property::new("VIL-001", "Sea view villa", Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn validate_rejects_half_set_coordinates() {
        let mut property = sample();
        property.latitude = Some(24.7);
        assert!(matches!(
            property.validate(),
            Err(ValidationError::InvalidFormat {
                field: "coordinates",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_bad_code_and_negative_rent() {
        let mut property = sample();
        property.code = " bad code".to_string();
        assert!(property.validate().is_err());

        let mut property = sample();
        property.rental_price_monthly = Some(dec!(-1));
        assert_eq!(
            property.validate(),
            Err(ValidationError::Negative("rental_price_monthly"))
        );
    }

    #[test]
    fn investment_base_prefers_purchase_price() {
        let mut property = sample();
        property.market_value = Some(dec!(900));
        assert_eq!(property.investment_base(), dec!(900));
        property.purchase_price = Some(dec!(750));
        assert_eq!(property.investment_base(), dec!(750));
    }
}

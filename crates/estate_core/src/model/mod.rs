//! Domain model for the estate back office.
//!
//! # Responsibility
//! - Define canonical records for inventory, operations, ledger and notifications.
//! - Validate record-level invariants before anything reaches storage.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Money values carry at most two decimal places (see [`money`]).

use thiserror::Error;

/// Declares a closed string-backed enum with stable storage codes.
///
/// Generated enums serialize as their storage code and expose
/// `as_str`/`parse` for SQL bind and row decode paths.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant, )+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Storage code for this variant.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $code, )+
                }
            }

            /// Parses a storage code; unknown codes yield `None`.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod access;
pub mod budget;
pub mod contract;
pub mod invoice;
pub mod ledger;
pub mod maintenance;
pub mod money;
pub mod notification;
pub mod property;
pub mod sales;

/// Record-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`{0}` must not be blank")]
    Blank(&'static str),
    #[error("`{0}` must not be negative")]
    Negative(&'static str),
    #[error("`{0}` must be greater than zero")]
    NotPositive(&'static str),
    #[error("`{field}` has invalid value `{value}`")]
    InvalidFormat { field: &'static str, value: String },
    #[error("`{later}` must not be earlier than `{earlier}`")]
    DateOrder {
        earlier: &'static str,
        later: &'static str,
    },
    #[error("`{field}`: {source}")]
    Money {
        field: &'static str,
        source: money::MoneyError,
    },
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(())
}

pub(crate) fn require_non_negative(
    field: &'static str,
    value: rust_decimal::Decimal,
) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::Negative(field));
    }
    money::to_minor_units(value).map_err(|source| ValidationError::Money { field, source })?;
    Ok(())
}

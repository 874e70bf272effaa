//! Reservations and sales contracts.
//!
//! # Invariants
//! - Only available properties can be reserved.
//! - Confirming a reservation marks an available property reserved; a property
//!   holds at most one confirmed reservation.
//! - Cancelling a confirmed reservation releases the property unless another
//!   confirmed reservation still holds it.
//! - Completing a sale marks the property sold.

use crate::model::property::PropertyStatus;
use crate::model::sales::{
    Reservation, ReservationId, ReservationStatus, SalesContract, SalesContractId,
    SalesContractStatus,
};
use crate::model::ValidationError;
use crate::repo::property_repo::PropertyRepository;
use crate::repo::sales_repo::{ReservationClaim, SalesRepository};
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::{info, warn};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SalesServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("property {code} is {status}; only available properties can be reserved")]
    PropertyUnavailable { code: String, status: PropertyStatus },
    #[error("reservation {id} is {status}")]
    ReservationState {
        id: ReservationId,
        status: ReservationStatus,
    },
    #[error("sales contract {id} is {status}")]
    ContractState {
        id: SalesContractId,
        status: SalesContractStatus,
    },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for SalesServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

pub type SalesResult<T> = Result<T, SalesServiceError>;

/// Terms of a sales contract created from a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleTerms {
    pub contract_number: String,
    pub sale_price: Decimal,
    pub down_payment: Decimal,
    pub contract_date: NaiveDate,
}

pub struct SalesService<S: SalesRepository, P: PropertyRepository> {
    sales: S,
    properties: P,
}

impl<S: SalesRepository, P: PropertyRepository> SalesService<S, P> {
    pub fn new(sales: S, properties: P) -> Self {
        Self { sales, properties }
    }

    pub fn reserve(&self, reservation: &Reservation) -> SalesResult<ReservationId> {
        let item = self
            .properties
            .get_property(reservation.property_uuid)?
            .ok_or_else(|| SalesServiceError::NotFound {
                entity: "property",
                key: reservation.property_uuid.to_string(),
            })?;
        if item.property.status != PropertyStatus::Available {
            warn!(
                "event=reservation_create module=sales status=error property_id={} error_code=unavailable",
                item.property.uuid
            );
            return Err(SalesServiceError::PropertyUnavailable {
                code: item.property.code,
                status: item.property.status,
            });
        }
        let mut reservation = reservation.clone();
        reservation.status = ReservationStatus::Pending;
        let id = self.sales.create_reservation(&reservation)?;
        info!("event=reservation_create module=sales status=ok reservation_id={id}");
        Ok(id)
    }

    pub fn get_reservation(&self, id: ReservationId) -> SalesResult<Reservation> {
        self.sales
            .get_reservation(id)?
            .ok_or_else(|| SalesServiceError::NotFound {
                entity: "reservation",
                key: id.to_string(),
            })
    }

    pub fn list_reservations(
        &self,
        status: Option<ReservationStatus>,
    ) -> SalesResult<Vec<Reservation>> {
        Ok(self.sales.list_reservations(status)?)
    }

    /// Confirms a pending reservation; the property must still be available.
    pub fn confirm_reservation(&self, id: ReservationId) -> SalesResult<()> {
        match self.sales.confirm_reservation(id)? {
            ReservationClaim::Confirmed => {
                info!("event=reservation_confirm module=sales status=ok reservation_id={id}");
                Ok(())
            }
            ReservationClaim::NotPending(status) => {
                Err(SalesServiceError::ReservationState { id, status })
            }
            ReservationClaim::PropertyUnavailable { code, status } => {
                warn!(
                    "event=reservation_confirm module=sales status=error reservation_id={id} error_code=unavailable"
                );
                Err(SalesServiceError::PropertyUnavailable { code, status })
            }
        }
    }

    /// Cancels an open reservation. The property is released only when no
    /// confirmed reservation still holds it.
    pub fn cancel_reservation(&self, id: ReservationId) -> SalesResult<()> {
        let reservation = self.get_reservation(id)?;
        if !reservation.status.is_open() {
            return Err(SalesServiceError::ReservationState {
                id,
                status: reservation.status,
            });
        }
        self.sales
            .close_reservation(id, ReservationStatus::Cancelled)?;
        info!("event=reservation_cancel module=sales status=ok reservation_id={id}");
        Ok(())
    }

    /// Creates a draft sales contract from an open reservation.
    pub fn convert_reservation(
        &self,
        id: ReservationId,
        terms: &SaleTerms,
    ) -> SalesResult<SalesContractId> {
        let reservation = self.get_reservation(id)?;
        if !reservation.status.is_open() {
            return Err(SalesServiceError::ReservationState {
                id,
                status: reservation.status,
            });
        }
        let contract = SalesContract {
            uuid: Uuid::new_v4(),
            contract_number: terms.contract_number.clone(),
            property_uuid: reservation.property_uuid,
            client_uuid: reservation.client_uuid,
            reservation_uuid: Some(id),
            sale_price: terms.sale_price,
            down_payment: terms.down_payment,
            contract_date: terms.contract_date,
            status: SalesContractStatus::Draft,
        };
        let contract_id = self.sales.convert_reservation(&contract)?;
        info!(
            "event=reservation_convert module=sales status=ok reservation_id={id} sales_contract_id={contract_id}"
        );
        Ok(contract_id)
    }

    pub fn create_sales_contract(&self, contract: &SalesContract) -> SalesResult<SalesContractId> {
        let mut contract = contract.clone();
        contract.status = SalesContractStatus::Draft;
        let id = self.sales.create_sales_contract(&contract)?;
        info!("event=sales_contract_create module=sales status=ok sales_contract_id={id}");
        Ok(id)
    }

    pub fn get_sales_contract(&self, id: SalesContractId) -> SalesResult<SalesContract> {
        self.sales
            .get_sales_contract(id)?
            .ok_or_else(|| SalesServiceError::NotFound {
                entity: "sales contract",
                key: id.to_string(),
            })
    }

    pub fn list_sales_contracts(
        &self,
        status: Option<SalesContractStatus>,
    ) -> SalesResult<Vec<SalesContract>> {
        Ok(self.sales.list_sales_contracts(status)?)
    }

    pub fn activate_sales_contract(&self, id: SalesContractId) -> SalesResult<()> {
        self.move_contract(id, &[SalesContractStatus::Draft], SalesContractStatus::Active, None)
    }

    pub fn complete_sale(&self, id: SalesContractId) -> SalesResult<()> {
        self.move_contract(
            id,
            &[SalesContractStatus::Active],
            SalesContractStatus::Completed,
            Some(PropertyStatus::Sold),
        )
    }

    pub fn cancel_sales_contract(&self, id: SalesContractId) -> SalesResult<()> {
        self.move_contract(
            id,
            &[SalesContractStatus::Draft, SalesContractStatus::Active],
            SalesContractStatus::Cancelled,
            None,
        )
    }

    fn move_contract(
        &self,
        id: SalesContractId,
        from: &[SalesContractStatus],
        to: SalesContractStatus,
        property_status: Option<PropertyStatus>,
    ) -> SalesResult<()> {
        let contract = self.get_sales_contract(id)?;
        if !from.contains(&contract.status) {
            return Err(SalesServiceError::ContractState {
                id,
                status: contract.status,
            });
        }
        self.sales
            .set_sales_contract_status(id, to, property_status)?;
        info!("event=sales_contract_status module=sales status=ok sales_contract_id={id} target={to}");
        Ok(())
    }
}

//! Rental contract lifecycle.
//!
//! # Invariants
//! - Only draft contracts can be activated or cancelled.
//! - Activating a contract marks its property rented; ending the last active
//!   contract releases the property.

use crate::model::contract::{Contract, ContractId, ContractStatus};
use crate::model::property::PropertyStatus;
use crate::model::ValidationError;
use crate::repo::contract_repo::{ContractFilter, ContractNotice, ContractRepository};
use crate::repo::property_repo::PropertyRepository;
use crate::repo::RepoError;
use chrono::{Duration, NaiveDate};
use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeasingServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("contract {id} is {status}; expected {expected}")]
    InvalidStatus {
        id: ContractId,
        status: ContractStatus,
        expected: ContractStatus,
    },
    #[error("property {code} is {status} and cannot be leased")]
    PropertyUnavailable { code: String, status: PropertyStatus },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for LeasingServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

pub type LeasingResult<T> = Result<T, LeasingServiceError>;

pub struct LeasingService<C: ContractRepository, P: PropertyRepository> {
    contracts: C,
    properties: P,
}

impl<C: ContractRepository, P: PropertyRepository> LeasingService<C, P> {
    pub fn new(contracts: C, properties: P) -> Self {
        Self {
            contracts,
            properties,
        }
    }

    pub fn create_contract(&self, contract: &Contract) -> LeasingResult<ContractId> {
        if self.properties.get_property(contract.property_uuid)?.is_none() {
            return Err(LeasingServiceError::NotFound {
                entity: "property",
                key: contract.property_uuid.to_string(),
            });
        }
        let id = self.contracts.create_contract(contract)?;
        info!("event=contract_create module=leasing status=ok contract_id={id}");
        Ok(id)
    }

    pub fn get_contract(&self, id: ContractId) -> LeasingResult<Contract> {
        self.contracts
            .get_contract(id)?
            .ok_or_else(|| LeasingServiceError::NotFound {
                entity: "contract",
                key: id.to_string(),
            })
    }

    pub fn list_contracts(&self, filter: &ContractFilter) -> LeasingResult<Vec<Contract>> {
        Ok(self.contracts.list_contracts(filter)?)
    }

    pub fn activate(&self, id: ContractId) -> LeasingResult<()> {
        let contract = self.require_status(id, ContractStatus::Draft)?;
        let property = self
            .properties
            .get_property(contract.property_uuid)?
            .ok_or_else(|| LeasingServiceError::NotFound {
                entity: "property",
                key: contract.property_uuid.to_string(),
            })?
            .property;
        if matches!(property.status, PropertyStatus::Sold | PropertyStatus::Rented) {
            return Err(LeasingServiceError::PropertyUnavailable {
                code: property.code,
                status: property.status,
            });
        }
        self.contracts
            .set_status(id, ContractStatus::Active, Some(PropertyStatus::Rented))?;
        info!("event=contract_activate module=leasing status=ok contract_id={id}");
        Ok(())
    }

    pub fn terminate(&self, id: ContractId) -> LeasingResult<()> {
        self.require_status(id, ContractStatus::Active)?;
        self.contracts.close_contract(id, ContractStatus::Terminated)?;
        info!("event=contract_terminate module=leasing status=ok contract_id={id}");
        Ok(())
    }

    pub fn cancel(&self, id: ContractId) -> LeasingResult<()> {
        self.require_status(id, ContractStatus::Draft)?;
        self.contracts.set_status(id, ContractStatus::Cancelled, None)?;
        Ok(())
    }

    /// Expires active contracts whose end date is before `today`.
    pub fn expire_ended(&self, today: NaiveDate) -> LeasingResult<Vec<ContractId>> {
        let expired = self.contracts.expire_ended(today)?;
        info!(
            "event=contract_expire module=leasing status=ok count={}",
            expired.len()
        );
        Ok(expired)
    }

    /// Active contracts ending between `today` and `today + days`.
    pub fn expiring_within(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> LeasingResult<Vec<ContractNotice>> {
        let until = today + Duration::days(i64::from(days));
        Ok(self.contracts.expiring_between(today, until)?)
    }

    fn require_status(&self, id: ContractId, expected: ContractStatus) -> LeasingResult<Contract> {
        let contract = self.get_contract(id)?;
        if contract.status != expected {
            return Err(LeasingServiceError::InvalidStatus {
                id,
                status: contract.status,
                expected,
            });
        }
        Ok(contract)
    }
}

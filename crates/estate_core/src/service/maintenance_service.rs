//! Maintenance request workflow: pending → in_progress → completed, or cancelled.

use crate::model::access::UserId;
use crate::model::maintenance::{
    MaintenanceCategory, MaintenanceCategoryId, MaintenanceRequest, MaintenanceRequestId,
    MaintenanceStatus,
};
use crate::model::ValidationError;
use crate::repo::maintenance_repo::{MaintenanceFilter, MaintenanceRepository};
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::info;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaintenanceServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("maintenance request not found: {0}")]
    RequestNotFound(String),
    #[error("maintenance request {id} is {status} and cannot move to {target}")]
    InvalidTransition {
        id: MaintenanceRequestId,
        status: MaintenanceStatus,
        target: MaintenanceStatus,
    },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for MaintenanceServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { key, .. } => Self::RequestNotFound(key),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

pub type MaintenanceResult<T> = Result<T, MaintenanceServiceError>;

pub struct MaintenanceService<M: MaintenanceRepository> {
    repo: M,
}

impl<M: MaintenanceRepository> MaintenanceService<M> {
    pub fn new(repo: M) -> Self {
        Self { repo }
    }

    pub fn create_category(&self, name: &str) -> MaintenanceResult<MaintenanceCategoryId> {
        let category = MaintenanceCategory {
            uuid: uuid::Uuid::new_v4(),
            name: name.to_string(),
        };
        Ok(self.repo.create_category(&category)?)
    }

    pub fn list_categories(&self) -> MaintenanceResult<Vec<MaintenanceCategory>> {
        Ok(self.repo.list_categories()?)
    }

    /// Files a new request; it always starts pending.
    pub fn open(&self, request: &MaintenanceRequest) -> MaintenanceResult<MaintenanceRequestId> {
        let mut request = request.clone();
        request.status = MaintenanceStatus::Pending;
        request.actual_cost = None;
        request.completed_date = None;
        let id = self.repo.create_request(&request)?;
        info!(
            "event=maintenance_open module=maintenance status=ok request_id={id} priority={}",
            request.priority
        );
        Ok(id)
    }

    pub fn get_request(&self, id: MaintenanceRequestId) -> MaintenanceResult<MaintenanceRequest> {
        self.repo
            .get_request(id)?
            .ok_or_else(|| MaintenanceServiceError::RequestNotFound(id.to_string()))
    }

    pub fn list_requests(
        &self,
        filter: &MaintenanceFilter,
    ) -> MaintenanceResult<Vec<MaintenanceRequest>> {
        Ok(self.repo.list_requests(filter)?)
    }

    /// Assigns the request and starts work on it. An in-progress request may be
    /// reassigned.
    pub fn assign(&self, id: MaintenanceRequestId, assignee: UserId) -> MaintenanceResult<()> {
        self.transition(id, MaintenanceStatus::InProgress, true, |request| {
            request.assigned_to = Some(assignee);
        })
    }

    pub fn start(&self, id: MaintenanceRequestId) -> MaintenanceResult<()> {
        self.transition(id, MaintenanceStatus::InProgress, false, |_| {})
    }

    pub fn complete(
        &self,
        id: MaintenanceRequestId,
        actual_cost: Decimal,
        completed_date: NaiveDate,
    ) -> MaintenanceResult<()> {
        self.transition(id, MaintenanceStatus::Completed, false, |request| {
            request.actual_cost = Some(actual_cost);
            request.completed_date = Some(completed_date);
        })
    }

    pub fn cancel(&self, id: MaintenanceRequestId) -> MaintenanceResult<()> {
        self.transition(id, MaintenanceStatus::Cancelled, false, |_| {})
    }

    fn transition(
        &self,
        id: MaintenanceRequestId,
        target: MaintenanceStatus,
        allow_same: bool,
        apply: impl FnOnce(&mut MaintenanceRequest),
    ) -> MaintenanceResult<()> {
        let mut request = self.get_request(id)?;
        let allowed =
            !request.status.is_terminal() && (allow_same || request.status != target);
        if !allowed {
            return Err(MaintenanceServiceError::InvalidTransition {
                id,
                status: request.status,
                target,
            });
        }
        apply(&mut request);
        request.status = target;
        self.repo.update_request(&request)?;
        info!(
            "event=maintenance_transition module=maintenance status=ok request_id={id} target={target}"
        );
        Ok(())
    }
}

//! Budget use-case service: actual amounts, variances and period reports.

use crate::model::budget::{Budget, BudgetId, BudgetVariance};
use crate::model::ledger::PeriodId;
use crate::model::ValidationError;
use crate::repo::budget_repo::BudgetRepository;
use crate::repo::RepoError;
use log::info;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BudgetServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("budget not found: {0}")]
    BudgetNotFound(String),
    #[error("a budget already exists for this period, account and property")]
    Duplicate,
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for BudgetServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { key, .. } => Self::BudgetNotFound(key),
            RepoError::Validation(err) => Self::Validation(err),
            // Only the scope index raises `Conflict` on insert.
            RepoError::Conflict(_) => Self::Duplicate,
            other => Self::Repo(other),
        }
    }
}

pub type BudgetResult<T> = Result<T, BudgetServiceError>;

/// All budget variances of one period.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BudgetReport {
    pub period_uuid: PeriodId,
    pub lines: Vec<BudgetVariance>,
    pub total_budgeted: Decimal,
    pub total_actual: Decimal,
    pub total_variance: Decimal,
}

impl BudgetReport {
    /// Expense budgets whose actual spending exceeds the budget.
    pub fn overruns(&self) -> impl Iterator<Item = &BudgetVariance> {
        self.lines.iter().filter(|line| line.is_overrun())
    }
}

pub struct BudgetService<B: BudgetRepository> {
    repo: B,
}

impl<B: BudgetRepository> BudgetService<B> {
    pub fn new(repo: B) -> Self {
        Self { repo }
    }

    pub fn create_budget(&self, budget: &Budget) -> BudgetResult<BudgetId> {
        let id = self.repo.create_budget(budget)?;
        info!("event=budget_create module=budgeting status=ok budget_id={id}");
        Ok(id)
    }

    pub fn update_budget(&self, budget: &Budget) -> BudgetResult<()> {
        Ok(self.repo.update_budget(budget)?)
    }

    pub fn delete_budget(&self, id: BudgetId) -> BudgetResult<()> {
        Ok(self.repo.delete_budget(id)?)
    }

    pub fn actual_amount(&self, id: BudgetId) -> BudgetResult<Decimal> {
        let activity = self
            .repo
            .budget_activity(id)?
            .ok_or_else(|| BudgetServiceError::BudgetNotFound(id.to_string()))?;
        Ok(activity.actual_amount())
    }

    pub fn variance(&self, id: BudgetId) -> BudgetResult<BudgetVariance> {
        let activity = self
            .repo
            .budget_activity(id)?
            .ok_or_else(|| BudgetServiceError::BudgetNotFound(id.to_string()))?;
        Ok(BudgetVariance::compute(
            &activity.budget,
            activity.account_type,
            activity.actual_amount(),
        ))
    }

    pub fn period_report(&self, period: PeriodId) -> BudgetResult<BudgetReport> {
        let lines: Vec<BudgetVariance> = self
            .repo
            .period_activity(period)?
            .iter()
            .map(|activity| {
                BudgetVariance::compute(
                    &activity.budget,
                    activity.account_type,
                    activity.actual_amount(),
                )
            })
            .collect();
        let total_budgeted = lines.iter().map(|line| line.budgeted_amount).sum();
        let total_actual = lines.iter().map(|line| line.actual_amount).sum();
        let total_variance = lines.iter().map(|line| line.variance).sum();
        info!(
            "event=budget_report module=budgeting status=ok period_id={period} line_count={}",
            lines.len()
        );
        Ok(BudgetReport {
            period_uuid: period,
            lines,
            total_budgeted,
            total_actual,
            total_variance,
        })
    }
}

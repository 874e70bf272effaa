//! Budget model and variance arithmetic.
//!
//! # Invariants
//! - `(period, account, property)` identifies at most one budget.
//! - Variance is `budgeted - actual`; the percentage is zero for a zero budget.

use super::ledger::{AccountId, AccountType, PeriodId};
use super::money::percentage;
use super::property::PropertyId;
use super::{require_text, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BudgetId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub uuid: BudgetId,
    pub name: String,
    pub period_uuid: PeriodId,
    pub account_uuid: AccountId,
    pub budgeted_amount: Decimal,
    pub property_uuid: Option<PropertyId>,
    pub notes: String,
}

impl Budget {
    pub fn new(
        name: impl Into<String>,
        period_uuid: PeriodId,
        account_uuid: AccountId,
        budgeted_amount: Decimal,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            period_uuid,
            account_uuid,
            budgeted_amount,
            property_uuid: None,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        super::require_non_negative("budgeted_amount", self.budgeted_amount)
    }
}

/// Which side of posted lines counts as "actual" for a budgeted account.
///
/// Expense budgets track debits (spend); every other account type tracks
/// credits (earnings).
pub fn actual_side_is_debit(account_type: AccountType) -> bool {
    account_type == AccountType::Expense
}

/// Budget versus actual figures for one budget line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetVariance {
    pub budget_uuid: BudgetId,
    pub name: String,
    pub account_uuid: AccountId,
    pub account_type: AccountType,
    pub budgeted_amount: Decimal,
    pub actual_amount: Decimal,
    pub variance: Decimal,
    /// Two places; zero when nothing was budgeted.
    pub variance_percentage: Decimal,
}

impl BudgetVariance {
    pub fn compute(budget: &Budget, account_type: AccountType, actual_amount: Decimal) -> Self {
        let variance = budget.budgeted_amount - actual_amount;
        Self {
            budget_uuid: budget.uuid,
            name: budget.name.clone(),
            account_uuid: budget.account_uuid,
            account_type,
            budgeted_amount: budget.budgeted_amount,
            actual_amount,
            variance,
            variance_percentage: percentage(variance, budget.budgeted_amount, 2),
        }
    }

    /// Expense spend above the budgeted amount.
    pub fn is_overrun(&self) -> bool {
        self.account_type == AccountType::Expense && self.variance < Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn variance_and_percentage() {
        let budget = Budget::new("Repairs", Uuid::new_v4(), Uuid::new_v4(), dec!(1000));
        let variance = BudgetVariance::compute(&budget, AccountType::Expense, dec!(1250));
        assert_eq!(variance.variance, dec!(-250));
        assert_eq!(variance.variance_percentage, dec!(-25));
        assert!(variance.is_overrun());
    }

    #[test]
    fn zero_budget_has_zero_percentage() {
        let budget = Budget::new("Nothing", Uuid::new_v4(), Uuid::new_v4(), Decimal::ZERO);
        let variance = BudgetVariance::compute(&budget, AccountType::Revenue, dec!(40));
        assert_eq!(variance.variance, dec!(-40));
        assert_eq!(variance.variance_percentage, Decimal::ZERO);
        assert!(!variance.is_overrun());
    }
}

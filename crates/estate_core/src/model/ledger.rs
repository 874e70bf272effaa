//! Double-entry ledger model.
//!
//! # Responsibility
//! - Define the chart of accounts, financial periods and journal entries.
//! - Own the pure balance rules shared by repository queries and reports.
//!
//! # Invariants
//! - Line amounts are non-negative and exactly one side of a line is non-zero.
//! - A posted entry has equal debit and credit totals and never changes again.
//! - Asset/expense balances are `debit - credit`; liability/equity/revenue
//!   balances are `credit - debit`. Only posted lines contribute.

use super::access::UserId;
use super::contract::ContractId;
use super::money;
use super::property::PropertyId;
use super::{require_text, ValidationError};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = Uuid;
pub type PeriodId = Uuid;
pub type JournalEntryId = Uuid;
pub type JournalLineId = Uuid;

static ACCOUNT_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,20}$").expect("valid account code regex"));

string_enum! {
    /// Top-level classification in the chart of accounts.
    pub enum AccountType {
        Asset => "asset",
        Liability => "liability",
        Equity => "equity",
        Revenue => "revenue",
        Expense => "expense",
    }
}

string_enum! {
    pub enum BalanceSide {
        Debit => "debit",
        Credit => "credit",
    }
}

impl AccountType {
    /// Side on which the account's balance grows.
    pub fn normal_side(self) -> BalanceSide {
        match self {
            Self::Asset | Self::Expense => BalanceSide::Debit,
            Self::Liability | Self::Equity | Self::Revenue => BalanceSide::Credit,
        }
    }

    /// Signed balance from debit/credit totals for this account type.
    pub fn balance_from_totals(self, debits: Decimal, credits: Decimal) -> Decimal {
        match self.normal_side() {
            BalanceSide::Debit => debits - credits,
            BalanceSide::Credit => credits - debits,
        }
    }
}

/// Chart of accounts node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uuid: AccountId,
    pub code: String,
    pub name: String,
    pub name_ar: String,
    pub account_type: AccountType,
    pub parent_uuid: Option<AccountId>,
    pub description: String,
    pub is_active: bool,
    /// System accounts cannot be deleted.
    pub is_system: bool,
    pub opening_balance: Decimal,
    pub opening_balance_type: BalanceSide,
}

impl Account {
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            name_ar: String::new(),
            account_type,
            parent_uuid: None,
            description: String::new(),
            is_active: true,
            is_system: false,
            opening_balance: Decimal::ZERO,
            opening_balance_type: BalanceSide::Debit,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if !ACCOUNT_CODE_RE.is_match(&self.code) {
            return Err(ValidationError::InvalidFormat {
                field: "code",
                value: self.code.clone(),
            });
        }
        if self.parent_uuid == Some(self.uuid) {
            return Err(ValidationError::InvalidFormat {
                field: "parent_uuid",
                value: "account cannot be its own parent".to_string(),
            });
        }
        super::require_non_negative("opening_balance", self.opening_balance)
    }

    /// `code - name` label used in listings.
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }
}

/// Reporting period; entries dated inside it roll up into its budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub uuid: PeriodId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_closed: bool,
    pub notes: String,
}

impl FinancialPeriod {
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            start_date,
            end_date,
            is_closed: false,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.end_date < self.start_date {
            return Err(ValidationError::DateOrder {
                earlier: "start_date",
                later: "end_date",
            });
        }
        Ok(())
    }

    /// Inclusive on both ends.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

string_enum! {
    pub enum JournalEntryType {
        Manual => "manual",
        Automated => "automated",
        Adjustment => "adjustment",
        Opening => "opening",
        Closing => "closing",
    }
}

/// Journal entry header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub uuid: JournalEntryId,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub entry_type: JournalEntryType,
    pub period_uuid: Option<PeriodId>,
    pub reference: String,
    pub description: String,
    pub property_uuid: Option<PropertyId>,
    pub contract_uuid: Option<ContractId>,
    pub created_by: Option<UserId>,
    pub is_posted: bool,
    pub posted_at: Option<i64>,
}

impl JournalEntry {
    pub fn new(
        entry_number: impl Into<String>,
        entry_date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            entry_number: entry_number.into(),
            entry_date,
            entry_type: JournalEntryType::Manual,
            period_uuid: None,
            reference: String::new(),
            description: description.into(),
            property_uuid: None,
            contract_uuid: None,
            created_by: None,
            is_posted: false,
            posted_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("entry_number", &self.entry_number)?;
        require_text("description", &self.description)
    }
}

/// One debit or credit posting inside an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub uuid: JournalLineId,
    pub entry_uuid: JournalEntryId,
    pub account_uuid: AccountId,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    pub description: String,
}

impl JournalLine {
    pub fn debit(entry_uuid: JournalEntryId, account_uuid: AccountId, amount: Decimal) -> Self {
        Self::with_amounts(entry_uuid, account_uuid, amount, Decimal::ZERO)
    }

    pub fn credit(entry_uuid: JournalEntryId, account_uuid: AccountId, amount: Decimal) -> Self {
        Self::with_amounts(entry_uuid, account_uuid, Decimal::ZERO, amount)
    }

    fn with_amounts(
        entry_uuid: JournalEntryId,
        account_uuid: AccountId,
        debit_amount: Decimal,
        credit_amount: Decimal,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            entry_uuid,
            account_uuid,
            debit_amount,
            credit_amount,
            description: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        super::require_non_negative("debit_amount", self.debit_amount)?;
        super::require_non_negative("credit_amount", self.credit_amount)?;
        match (self.debit_amount.is_zero(), self.credit_amount.is_zero()) {
            (false, true) | (true, false) => Ok(()),
            (true, true) => Err(ValidationError::NotPositive("debit_amount|credit_amount")),
            (false, false) => Err(ValidationError::InvalidFormat {
                field: "journal_line",
                value: "line cannot carry both debit and credit".to_string(),
            }),
        }
    }

    /// Same amounts on the opposite sides, used for reversals.
    pub fn mirrored(&self, entry_uuid: JournalEntryId) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            entry_uuid,
            account_uuid: self.account_uuid,
            debit_amount: self.credit_amount,
            credit_amount: self.debit_amount,
            description: self.description.clone(),
        }
    }
}

/// Debit/credit totals across a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryTotals {
    pub debit: Decimal,
    pub credit: Decimal,
}

impl EntryTotals {
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a JournalLine>) -> Self {
        lines.into_iter().fold(Self::default(), |acc, line| Self {
            debit: acc.debit + line.debit_amount,
            credit: acc.credit + line.credit_amount,
        })
    }

    pub fn from_minor_units(debit: i64, credit: i64) -> Self {
        Self {
            debit: money::from_minor_units(debit),
            credit: money::from_minor_units(credit),
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }

    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn balance_sign_follows_account_type() {
        let debits = dec!(150);
        let credits = dec!(40);
        assert_eq!(AccountType::Asset.balance_from_totals(debits, credits), dec!(110));
        assert_eq!(AccountType::Expense.balance_from_totals(debits, credits), dec!(110));
        assert_eq!(AccountType::Liability.balance_from_totals(debits, credits), dec!(-110));
        assert_eq!(AccountType::Equity.balance_from_totals(debits, credits), dec!(-110));
        assert_eq!(AccountType::Revenue.balance_from_totals(debits, credits), dec!(-110));
    }

    #[test]
    fn line_requires_exactly_one_side() {
        let entry = Uuid::new_v4();
        let account = Uuid::new_v4();
        assert!(JournalLine::debit(entry, account, dec!(10)).validate().is_ok());

        let mut both = JournalLine::debit(entry, account, dec!(10));
        both.credit_amount = dec!(1);
        assert!(both.validate().is_err());

        let zero = JournalLine::debit(entry, account, Decimal::ZERO);
        assert!(zero.validate().is_err());

        let negative = JournalLine::credit(entry, account, dec!(-3));
        assert_eq!(negative.validate(), Err(ValidationError::Negative("credit_amount")));
    }

    #[test]
    fn account_code_must_be_digits() {
        let account = Account::new("11A0", "Cash", AccountType::Asset);
        assert!(account.validate().is_err());
        let account = Account::new("1100", "Cash", AccountType::Asset);
        assert!(account.validate().is_ok());
    }

    #[test]
    fn totals_detect_imbalance() {
        let entry = Uuid::new_v4();
        let lines = vec![
            JournalLine::debit(entry, Uuid::new_v4(), dec!(100)),
            JournalLine::credit(entry, Uuid::new_v4(), dec!(60)),
        ];
        let totals = EntryTotals::from_lines(&lines);
        assert!(!totals.is_balanced());
        assert_eq!(totals.difference(), dec!(40));
    }
}

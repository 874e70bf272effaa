//! Ledger use-case service.
//!
//! # Responsibility
//! - Maintain the chart of accounts and financial periods.
//! - Drive journal entries from draft to posted, and correct them by reversal.
//! - Expose signed account balances and the trial balance.
//!
//! # Invariants
//! - Posting is one-way; posted entries change only through a reversing entry.
//! - Balances and the trial balance read posted lines only.

use crate::model::access::UserId;
use crate::model::ledger::{
    Account, AccountId, EntryTotals, FinancialPeriod, JournalEntry, JournalEntryId,
    JournalEntryType, JournalLine, JournalLineId, PeriodId,
};
use crate::model::ValidationError;
use crate::repo::ledger_repo::{EntryFilter, LedgerRepository, PostOutcome, TrialBalance};
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::{info, warn};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("journal entry {0} has no lines")]
    EmptyEntry(JournalEntryId),
    #[error("journal entry {entry} is unbalanced: debit {debit} != credit {credit}")]
    Unbalanced {
        entry: JournalEntryId,
        debit: Decimal,
        credit: Decimal,
    },
    #[error("journal entry {0} is already posted")]
    AlreadyPosted(JournalEntryId),
    #[error("journal entry {0} is posted and cannot change")]
    EntryPosted(JournalEntryId),
    #[error("journal entry {0} is not posted")]
    NotPosted(JournalEntryId),
    #[error("financial period {0} is closed")]
    PeriodClosed(PeriodId),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for LedgerServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerServiceError>;

/// Signed balance of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub account: Account,
    pub full_path: String,
    pub totals: EntryTotals,
    pub balance: Decimal,
}

/// Entry header with its lines and totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDetail {
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
    pub totals: EntryTotals,
}

impl EntryDetail {
    pub fn is_balanced(&self) -> bool {
        self.totals.is_balanced()
    }
}

pub struct LedgerService<L: LedgerRepository> {
    repo: L,
}

impl<L: LedgerRepository> LedgerService<L> {
    pub fn new(repo: L) -> Self {
        Self { repo }
    }

    pub fn create_account(&self, account: &Account) -> LedgerResult<AccountId> {
        if let Some(parent) = account.parent_uuid {
            self.require_account(parent)?;
        }
        let id = self.repo.create_account(account)?;
        info!(
            "event=account_create module=ledger status=ok account_id={id} account_type={}",
            account.account_type
        );
        Ok(id)
    }

    pub fn update_account(&self, account: &Account) -> LedgerResult<()> {
        Ok(self.repo.update_account(account)?)
    }

    pub fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.require_account(id)
    }

    pub fn get_account_by_code(&self, code: &str) -> LedgerResult<Account> {
        self.repo
            .get_account_by_code(code)?
            .ok_or_else(|| LedgerServiceError::NotFound {
                entity: "account",
                key: code.to_string(),
            })
    }

    pub fn list_accounts(&self, active_only: bool) -> LedgerResult<Vec<Account>> {
        Ok(self.repo.list_accounts(active_only)?)
    }

    pub fn account_full_path(&self, id: AccountId) -> LedgerResult<String> {
        Ok(self.repo.account_full_path(id)?)
    }

    /// Balance over posted lines, signed by the account type.
    pub fn account_balance(
        &self,
        id: AccountId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<AccountBalance> {
        let account = self.require_account(id)?;
        let totals = self.repo.account_totals(id, as_of)?;
        Ok(AccountBalance {
            full_path: self.repo.account_full_path(id)?,
            balance: account
                .account_type
                .balance_from_totals(totals.debit, totals.credit),
            account,
            totals,
        })
    }

    pub fn delete_account(&self, id: AccountId) -> LedgerResult<()> {
        self.repo.delete_account(id).map_err(|err| {
            warn!("event=account_delete module=ledger status=error account_id={id} error={err}");
            LedgerServiceError::from(err)
        })?;
        info!("event=account_delete module=ledger status=ok account_id={id}");
        Ok(())
    }

    pub fn create_period(&self, period: &FinancialPeriod) -> LedgerResult<PeriodId> {
        Ok(self.repo.create_period(period)?)
    }

    pub fn list_periods(&self) -> LedgerResult<Vec<FinancialPeriod>> {
        Ok(self.repo.list_periods()?)
    }

    pub fn get_period(&self, id: PeriodId) -> LedgerResult<FinancialPeriod> {
        self.repo
            .get_period(id)?
            .ok_or_else(|| LedgerServiceError::NotFound {
                entity: "financial period",
                key: id.to_string(),
            })
    }

    pub fn close_period(&self, id: PeriodId) -> LedgerResult<()> {
        self.repo.close_period(id)?;
        info!("event=period_close module=ledger status=ok period_id={id}");
        Ok(())
    }

    /// Stores a draft entry; the header's posted flag is ignored.
    pub fn create_entry(
        &self,
        entry: &JournalEntry,
        lines: &[JournalLine],
    ) -> LedgerResult<JournalEntryId> {
        let id = self.repo.create_entry(entry, lines)?;
        info!(
            "event=journal_create module=ledger status=ok entry_id={id} line_count={}",
            lines.len()
        );
        Ok(id)
    }

    pub fn entry_detail(&self, id: JournalEntryId) -> LedgerResult<EntryDetail> {
        let entry = self.require_entry(id)?;
        Ok(EntryDetail {
            lines: self.repo.entry_lines(id)?,
            totals: self.repo.entry_totals(id)?,
            entry,
        })
    }

    pub fn list_entries(&self, filter: &EntryFilter) -> LedgerResult<Vec<JournalEntry>> {
        Ok(self.repo.list_entries(filter)?)
    }

    pub fn add_line(&self, line: &JournalLine) -> LedgerResult<JournalLineId> {
        self.require_draft(line.entry_uuid)?;
        Ok(self.repo.add_line(line)?)
    }

    pub fn remove_line(&self, entry: JournalEntryId, line: JournalLineId) -> LedgerResult<()> {
        self.require_draft(entry)?;
        Ok(self.repo.remove_line(line)?)
    }

    pub fn delete_entry(&self, id: JournalEntryId) -> LedgerResult<()> {
        self.require_draft(id)?;
        self.repo.delete_entry(id)?;
        info!("event=journal_delete module=ledger status=ok entry_id={id}");
        Ok(())
    }

    pub fn post_entry(&self, id: JournalEntryId, actor: Option<UserId>) -> LedgerResult<()> {
        let outcome = self.repo.post_entry(id, actor)?;
        outcome_to_result(id, outcome)
    }

    /// Creates and posts an entry mirroring every line of a posted entry.
    pub fn reverse_entry(
        &self,
        id: JournalEntryId,
        entry_number: &str,
        entry_date: NaiveDate,
        actor: Option<UserId>,
    ) -> LedgerResult<JournalEntryId> {
        let original = self.require_entry(id)?;
        if !original.is_posted {
            return Err(LedgerServiceError::NotPosted(id));
        }
        let mut reversal = JournalEntry::new(
            entry_number,
            entry_date,
            format!("Reversal of {}", original.entry_number),
        );
        reversal.entry_type = JournalEntryType::Adjustment;
        reversal.reference = original.entry_number.clone();
        reversal.property_uuid = original.property_uuid;
        reversal.contract_uuid = original.contract_uuid;
        reversal.created_by = actor;

        let lines: Vec<JournalLine> = self
            .repo
            .entry_lines(id)?
            .iter()
            .map(|line| line.mirrored(reversal.uuid))
            .collect();
        let outcome = self.repo.create_posted_entry(&reversal, &lines, actor)?;
        outcome_to_result(reversal.uuid, outcome)?;
        info!(
            "event=journal_reverse module=ledger status=ok entry_id={id} reversal_id={}",
            reversal.uuid
        );
        Ok(reversal.uuid)
    }

    pub fn trial_balance(&self, as_of: Option<NaiveDate>) -> LedgerResult<TrialBalance> {
        Ok(self.repo.trial_balance(as_of)?)
    }

    fn require_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.repo
            .get_account(id)?
            .ok_or_else(|| LedgerServiceError::NotFound {
                entity: "account",
                key: id.to_string(),
            })
    }

    fn require_entry(&self, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        self.repo
            .get_entry(id)?
            .ok_or_else(|| LedgerServiceError::NotFound {
                entity: "journal entry",
                key: id.to_string(),
            })
    }

    fn require_draft(&self, id: JournalEntryId) -> LedgerResult<JournalEntry> {
        let entry = self.require_entry(id)?;
        if entry.is_posted {
            return Err(LedgerServiceError::EntryPosted(id));
        }
        Ok(entry)
    }
}

/// Maps a posting outcome to the service result and logs it.
pub(crate) fn outcome_to_result(id: JournalEntryId, outcome: PostOutcome) -> LedgerResult<()> {
    let err = match outcome {
        PostOutcome::Posted => {
            info!("event=journal_post module=ledger status=ok entry_id={id}");
            return Ok(());
        }
        PostOutcome::AlreadyPosted => LedgerServiceError::AlreadyPosted(id),
        PostOutcome::NoLines => LedgerServiceError::EmptyEntry(id),
        PostOutcome::Unbalanced(totals) => LedgerServiceError::Unbalanced {
            entry: id,
            debit: totals.debit,
            credit: totals.credit,
        },
        PostOutcome::PeriodClosed(period) => LedgerServiceError::PeriodClosed(period),
    };
    warn!("event=journal_post module=ledger status=error entry_id={id} error={err}");
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ledger::EntryTotals;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn unbalanced_outcome_carries_totals() {
        let id = Uuid::new_v4();
        let outcome = PostOutcome::Unbalanced(EntryTotals {
            debit: dec!(100),
            credit: dec!(90),
        });
        match outcome_to_result(id, outcome) {
            Err(LedgerServiceError::Unbalanced { debit, credit, .. }) => {
                assert_eq!(debit, dec!(100));
                assert_eq!(credit, dec!(90));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn posted_outcome_is_ok() {
        assert!(outcome_to_result(Uuid::new_v4(), PostOutcome::Posted).is_ok());
    }
}

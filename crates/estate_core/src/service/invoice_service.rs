//! Invoicing use-case service.
//!
//! # Responsibility
//! - Keep invoice totals derived from their items.
//! - Move invoices through draft → issued → partial/paid, overdue and cancelled.
//! - Record payments, optionally posting a balanced automated journal entry.

use super::ledger_service::LedgerServiceError;
use crate::model::access::UserId;
use crate::model::invoice::{Invoice, InvoiceId, InvoiceStatus, Payment, PaymentId};
use crate::model::ledger::{AccountId, JournalEntry, JournalEntryType, JournalLine};
use crate::model::ValidationError;
use crate::repo::invoice_repo::{
    InvoiceFilter, InvoiceRepository, PaymentOutcome, PaymentPosting,
};
use crate::repo::ledger_repo::PostOutcome;
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::{info, warn};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvoiceServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("invoice {id} is {status}; expected {expected}")]
    InvalidStatus {
        id: InvoiceId,
        status: InvoiceStatus,
        expected: &'static str,
    },
    #[error("invoice {0} has no items")]
    NoItems(InvoiceId),
    #[error("payment of {amount} exceeds invoice balance {balance}")]
    Overpayment { amount: Decimal, balance: Decimal },
    #[error("payment posting rejected: {0}")]
    Posting(LedgerServiceError),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for InvoiceServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

pub type InvoiceResult<T> = Result<T, InvoiceServiceError>;

/// Journal posting to create alongside a payment: debit one account, credit another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingInstruction {
    pub entry_number: String,
    pub debit_account: AccountId,
    pub credit_account: AccountId,
    pub description: Option<String>,
}

pub struct InvoiceService<I: InvoiceRepository> {
    repo: I,
}

impl<I: InvoiceRepository> InvoiceService<I> {
    pub fn new(repo: I) -> Self {
        Self { repo }
    }

    /// Stores a draft invoice with totals recomputed from its items.
    pub fn create_invoice(&self, mut invoice: Invoice) -> InvoiceResult<Invoice> {
        invoice.recalculate();
        invoice.status = InvoiceStatus::Draft;
        invoice.paid_amount = Decimal::ZERO;
        let id = self.repo.create_invoice(&invoice)?;
        info!(
            "event=invoice_create module=invoicing status=ok invoice_id={id} item_count={}",
            invoice.items.len()
        );
        self.get_invoice(id)
    }

    pub fn update_draft(&self, mut invoice: Invoice) -> InvoiceResult<Invoice> {
        invoice.recalculate();
        self.repo.update_draft(&invoice)?;
        self.get_invoice(invoice.uuid)
    }

    pub fn get_invoice(&self, id: InvoiceId) -> InvoiceResult<Invoice> {
        self.repo
            .get_invoice(id)?
            .ok_or_else(|| InvoiceServiceError::NotFound {
                entity: "invoice",
                key: id.to_string(),
            })
    }

    pub fn list_invoices(&self, filter: &InvoiceFilter) -> InvoiceResult<Vec<Invoice>> {
        Ok(self.repo.list_invoices(filter)?)
    }

    pub fn issue(&self, id: InvoiceId) -> InvoiceResult<()> {
        let invoice = self.get_invoice(id)?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(InvoiceServiceError::InvalidStatus {
                id,
                status: invoice.status,
                expected: "draft",
            });
        }
        if invoice.items.is_empty() {
            return Err(InvoiceServiceError::NoItems(id));
        }
        self.repo.set_status(id, InvoiceStatus::Issued)?;
        info!("event=invoice_issue module=invoicing status=ok invoice_id={id}");
        Ok(())
    }

    pub fn cancel(&self, id: InvoiceId) -> InvoiceResult<()> {
        let invoice = self.get_invoice(id)?;
        if matches!(invoice.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            return Err(InvoiceServiceError::InvalidStatus {
                id,
                status: invoice.status,
                expected: "not paid or cancelled",
            });
        }
        self.repo.set_status(id, InvoiceStatus::Cancelled)?;
        info!("event=invoice_cancel module=invoicing status=ok invoice_id={id}");
        Ok(())
    }

    pub fn mark_overdue(&self, today: NaiveDate) -> InvoiceResult<Vec<InvoiceId>> {
        let ids = self.repo.mark_overdue(today)?;
        info!(
            "event=invoice_mark_overdue module=invoicing status=ok count={}",
            ids.len()
        );
        Ok(ids)
    }

    /// Collectible invoices due within `days` of `today`, including overdue ones.
    pub fn collectible_due_within(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> InvoiceResult<Vec<Invoice>> {
        let until = today + chrono::Duration::days(i64::from(days));
        Ok(self.repo.collectible_due_by(until)?)
    }

    /// Records a payment; with an instruction, posts a two-line automated entry for its amount.
    pub fn record_payment(
        &self,
        payment: &Payment,
        instruction: Option<&PostingInstruction>,
        actor: Option<UserId>,
    ) -> InvoiceResult<PaymentId> {
        let entry_and_lines = instruction.map(|instruction| {
            let description = instruction
                .description
                .clone()
                .unwrap_or_else(|| format!("Payment {}", payment.payment_number));
            let mut entry =
                JournalEntry::new(&instruction.entry_number, payment.payment_date, description);
            entry.entry_type = JournalEntryType::Automated;
            entry.reference = payment.payment_number.clone();
            entry.created_by = actor;
            let lines = vec![
                JournalLine::debit(entry.uuid, instruction.debit_account, payment.amount),
                JournalLine::credit(entry.uuid, instruction.credit_account, payment.amount),
            ];
            (entry, lines)
        });
        let posting = entry_and_lines.as_ref().map(|(entry, lines)| PaymentPosting {
            entry,
            lines: lines.as_slice(),
        });

        match self.repo.record_payment(payment, posting, actor)? {
            PaymentOutcome::Recorded(status) => {
                info!(
                    "event=payment_record module=invoicing status=ok payment_id={} invoice_status={}",
                    payment.uuid,
                    status.map_or("none", InvoiceStatus::as_str)
                );
                Ok(payment.uuid)
            }
            PaymentOutcome::InvoiceNotCollectible(status) => {
                let id = payment.invoice_uuid.unwrap_or_default();
                warn!(
                    "event=payment_record module=invoicing status=error invoice_id={id} error_code=not_collectible"
                );
                Err(InvoiceServiceError::InvalidStatus {
                    id,
                    status,
                    expected: "issued, partial or overdue",
                })
            }
            PaymentOutcome::Overpayment { balance } => {
                warn!(
                    "event=payment_record module=invoicing status=error payment_id={} error_code=overpayment",
                    payment.uuid
                );
                Err(InvoiceServiceError::Overpayment {
                    amount: payment.amount,
                    balance,
                })
            }
            PaymentOutcome::PostingRejected(outcome) => {
                let entry = entry_and_lines
                    .as_ref()
                    .map(|(entry, _)| entry.uuid)
                    .unwrap_or_default();
                Err(InvoiceServiceError::Posting(posting_error(entry, outcome)))
            }
        }
    }

    pub fn list_payments(&self, invoice: Option<InvoiceId>) -> InvoiceResult<Vec<Payment>> {
        Ok(self.repo.list_payments(invoice)?)
    }

    pub fn get_payment(&self, id: PaymentId) -> InvoiceResult<Payment> {
        self.repo
            .get_payment(id)?
            .ok_or_else(|| InvoiceServiceError::NotFound {
                entity: "payment",
                key: id.to_string(),
            })
    }
}

fn posting_error(entry: uuid::Uuid, outcome: PostOutcome) -> LedgerServiceError {
    match super::ledger_service::outcome_to_result(entry, outcome) {
        Err(err) => err,
        Ok(()) => LedgerServiceError::Conflict("posting reported success".to_string()),
    }
}

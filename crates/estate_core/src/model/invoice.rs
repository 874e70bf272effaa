//! Invoice, invoice item and payment model.
//!
//! # Invariants
//! - Invoice totals are derived from items: `total = subtotal - discount + tax`.
//! - `paid_amount` never exceeds `total_amount`.
//! - Payment amounts are strictly positive.

use super::access::UserId;
use super::contract::ContractId;
use super::ledger::{AccountId, JournalEntryId};
use super::money::round_money;
use super::property::PropertyId;
use super::{require_non_negative, require_text, ValidationError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type InvoiceId = Uuid;
pub type PaymentId = Uuid;

string_enum! {
    pub enum InvoiceType {
        Sales => "sales",
        Purchase => "purchase",
        Rent => "rent",
        Service => "service",
    }
}

string_enum! {
    pub enum InvoiceStatus {
        Draft => "draft",
        Issued => "issued",
        Paid => "paid",
        Partial => "partial",
        Overdue => "overdue",
        Cancelled => "cancelled",
    }
}

impl InvoiceStatus {
    /// Statuses that still expect money.
    pub fn is_collectible(self) -> bool {
        matches!(self, Self::Issued | Self::Partial | Self::Overdue)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub uuid: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Percent, e.g. `15` for 15%.
    pub tax_rate: Decimal,
    /// Percent, e.g. `10` for 10%.
    pub discount_rate: Decimal,
    pub total: Decimal,
    pub account_uuid: Option<AccountId>,
}

/// Monetary breakdown of one item or of a whole invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmountBreakdown {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl InvoiceItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        let mut item = Self {
            uuid: Uuid::new_v4(),
            description: description.into(),
            quantity,
            unit_price,
            tax_rate: Decimal::ZERO,
            discount_rate: Decimal::ZERO,
            total: Decimal::ZERO,
            account_uuid: None,
        };
        item.total = item.calculate_total();
        item
    }

    /// Discount applies first, tax is charged on the discounted amount.
    pub fn breakdown(&self) -> AmountBreakdown {
        let subtotal = round_money(self.quantity * self.unit_price);
        let discount = round_money(subtotal * self.discount_rate / Decimal::ONE_HUNDRED);
        let tax = round_money((subtotal - discount) * self.tax_rate / Decimal::ONE_HUNDRED);
        AmountBreakdown {
            subtotal,
            discount,
            tax,
            total: subtotal - discount + tax,
        }
    }

    pub fn calculate_total(&self) -> Decimal {
        self.breakdown().total
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("description", &self.description)?;
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::NotPositive("quantity"));
        }
        require_non_negative("quantity", self.quantity)?;
        require_non_negative("unit_price", self.unit_price)?;
        for (field, rate) in [("tax_rate", self.tax_rate), ("discount_rate", self.discount_rate)] {
            require_non_negative(field, rate)?;
            if rate > Decimal::ONE_HUNDRED {
                return Err(ValidationError::InvalidFormat {
                    field,
                    value: rate.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl AmountBreakdown {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a InvoiceItem>) -> Self {
        items.into_iter().fold(Self::default(), |acc, item| {
            let line = item.breakdown();
            Self {
                subtotal: acc.subtotal + line.subtotal,
                discount: acc.discount + line.discount,
                tax: acc.tax + line.tax,
                total: acc.total + line.total,
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub uuid: InvoiceId,
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub property_uuid: Option<PropertyId>,
    pub contract_uuid: Option<ContractId>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: InvoiceStatus,
    pub notes: String,
    pub terms_and_conditions: String,
    pub journal_entry_uuid: Option<JournalEntryId>,
    pub created_by: Option<UserId>,
    pub items: Vec<InvoiceItem>,
}

impl Invoice {
    pub fn new(
        invoice_number: impl Into<String>,
        invoice_type: InvoiceType,
        invoice_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            invoice_number: invoice_number.into(),
            invoice_type,
            invoice_date,
            due_date,
            property_uuid: None,
            contract_uuid: None,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            status: InvoiceStatus::Draft,
            notes: String::new(),
            terms_and_conditions: String::new(),
            journal_entry_uuid: None,
            created_by: None,
            items: Vec::new(),
        }
    }

    /// Recomputes item totals and header amounts from the item list.
    pub fn recalculate(&mut self) {
        for item in &mut self.items {
            item.total = item.calculate_total();
        }
        let totals = AmountBreakdown::from_items(&self.items);
        self.subtotal = totals.subtotal;
        self.discount_amount = totals.discount;
        self.tax_amount = totals.tax;
        self.total_amount = totals.total;
    }

    /// Outstanding amount.
    pub fn balance(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }

    /// Due date has passed and the invoice is neither paid nor cancelled.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today
            && !matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("invoice_number", &self.invoice_number)?;
        if self.due_date < self.invoice_date {
            return Err(ValidationError::DateOrder {
                earlier: "invoice_date",
                later: "due_date",
            });
        }
        for item in &self.items {
            item.validate()?;
        }
        require_non_negative("total_amount", self.total_amount)?;
        require_non_negative("paid_amount", self.paid_amount)?;
        if self.paid_amount > self.total_amount {
            return Err(ValidationError::InvalidFormat {
                field: "paid_amount",
                value: format!("{} exceeds total {}", self.paid_amount, self.total_amount),
            });
        }
        Ok(())
    }
}

string_enum! {
    pub enum PaymentType {
        /// Money received from a client.
        Receipt => "receipt",
        /// Money paid out to a supplier.
        Payment => "payment",
    }
}

string_enum! {
    pub enum PaymentMethod {
        Cash => "cash",
        Check => "check",
        BankTransfer => "bank_transfer",
        CreditCard => "credit_card",
        Online => "online",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub uuid: PaymentId,
    pub payment_number: String,
    pub payment_type: PaymentType,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub invoice_uuid: Option<InvoiceId>,
    pub reference_number: String,
    pub notes: String,
    pub journal_entry_uuid: Option<JournalEntryId>,
    pub created_by: Option<UserId>,
}

impl Payment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("payment_number", &self.payment_number)?;
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NotPositive("amount"));
        }
        require_non_negative("amount", self.amount)
    }
}

//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce workflow rules (status transitions, posting, delivery policy).
//! - Keep the CLI decoupled from storage details.

pub mod access_service;
pub mod budget_service;
pub mod invoice_service;
pub mod leasing_service;
pub mod ledger_service;
pub mod maintenance_service;
pub mod notification_service;
pub mod property_service;
pub mod report_service;
pub mod sales_service;

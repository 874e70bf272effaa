//! Core domain logic for the estate back office.
//!
//! Property inventory, leasing, sales, maintenance, a double-entry ledger with
//! invoicing and budgets, notifications and analytics, all persisted in SQLite.
//! This crate is the single source of truth for business invariants.

#[macro_use]
pub mod model;

pub mod config;
pub mod db;
pub mod logging;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EstateConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use repo::{Page, PageRequest, RepoError, RepoResult};
pub use service::ledger_service::{LedgerService, LedgerServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

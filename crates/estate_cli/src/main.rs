//! `estate` maintenance CLI.
//!
//! Commands: init, dashboard, accounts, trial-balance, budget-report, notify-scan

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use estate_core::db::now_epoch_ms;
use estate_core::model::ledger::{Account, AccountType};
use estate_core::repo::access_repo::{AccessRepository, SqliteAccessRepository};
use estate_core::repo::budget_repo::SqliteBudgetRepository;
use estate_core::repo::contract_repo::SqliteContractRepository;
use estate_core::repo::invoice_repo::SqliteInvoiceRepository;
use estate_core::repo::ledger_repo::SqliteLedgerRepository;
use estate_core::repo::notification_repo::SqliteNotificationRepository;
use estate_core::repo::property_record_repo::SqlitePropertyRecordRepository;
use estate_core::repo::property_repo::SqlitePropertyRepository;
use estate_core::repo::report_repo::SqliteReportRepository;
use estate_core::service::budget_service::BudgetService;
use estate_core::service::invoice_service::InvoiceService;
use estate_core::service::leasing_service::LeasingService;
use estate_core::service::ledger_service::{LedgerService, LedgerServiceError};
use estate_core::service::notification_service::{EmailOutcome, LogMailer, NotificationService};
use estate_core::service::property_service::PropertyService;
use estate_core::service::report_service::ReportService;
use estate_core::{init_logging, open_db, EstateConfig};
use log::info;
use rusqlite::Connection;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "estate")]
#[command(version)]
#[command(about = "Real-estate back office maintenance tool")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "ESTATE_CONFIG", default_value = "estate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database
    Init {
        /// Also create a starter chart of accounts
        #[arg(long)]
        seed_accounts: bool,
    },
    /// Headline counters and property analytics
    Dashboard {
        /// Username whose unread notifications are counted
        #[arg(long)]
        user: Option<String>,
    },
    /// Chart of accounts with balances
    Accounts {
        #[arg(long)]
        active_only: bool,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Debit/credit totals per account over posted entries
    TrialBalance {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Budget versus actual for one financial period (latest by default)
    BudgetReport {
        #[arg(long)]
        period: Option<Uuid>,
    },
    /// Expire contracts, flag overdue invoices and raise alerts
    NotifyScan {
        /// Reference date; defaults to the local date
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EstateConfig::load(Some(cli.config.as_path())).context("loading configuration")?;
    init_logging(&config.log_level, &config.log_dir).context("starting logging")?;
    let conn = open_db(&config.db_path)
        .with_context(|| format!("opening database `{}`", config.db_path.display()))?;

    match cli.command {
        Commands::Init { seed_accounts } => init(&conn, seed_accounts),
        Commands::Dashboard { user } => dashboard(&conn, user.as_deref()),
        Commands::Accounts { active_only, as_of } => accounts(&conn, active_only, as_of),
        Commands::TrialBalance { as_of } => trial_balance(&conn, as_of),
        Commands::BudgetReport { period } => budget_report(&conn, period),
        Commands::NotifyScan { today } => notify_scan(&conn, &config, today),
    }
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

const STARTER_ACCOUNTS: &[(&str, &str, AccountType)] = &[
    ("1000", "Cash", AccountType::Asset),
    ("1100", "Accounts Receivable", AccountType::Asset),
    ("2000", "Accounts Payable", AccountType::Liability),
    ("2100", "Tenant Deposits", AccountType::Liability),
    ("3000", "Owner Equity", AccountType::Equity),
    ("4000", "Rental Revenue", AccountType::Revenue),
    ("4100", "Sales Revenue", AccountType::Revenue),
    ("5000", "Maintenance Expense", AccountType::Expense),
    ("5100", "Utilities Expense", AccountType::Expense),
];

fn init(conn: &Connection, seed_accounts: bool) -> anyhow::Result<()> {
    if seed_accounts {
        let ledger = LedgerService::new(SqliteLedgerRepository::try_new(conn)?);
        let mut created = 0;
        for (code, name, account_type) in STARTER_ACCOUNTS {
            let mut account = Account::new(*code, *name, *account_type);
            account.is_system = true;
            match ledger.create_account(&account) {
                Ok(_) => created += 1,
                Err(LedgerServiceError::Conflict(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        println!("seeded {created} accounts");
    }
    info!("event=cli_init module=cli status=ok seed_accounts={seed_accounts}");
    println!("database ready");
    Ok(())
}

fn dashboard(conn: &Connection, username: Option<&str>) -> anyhow::Result<()> {
    let reports = ReportService::new(
        SqliteReportRepository::try_new(conn)?,
        SqlitePropertyRepository::try_new(conn)?,
        SqliteContractRepository::try_new(conn)?,
        SqlitePropertyRecordRepository::try_new(conn)?,
    );
    if let Some(username) = username {
        let access = SqliteAccessRepository::try_new(conn)?;
        let Some(user) = access.get_user_by_username(username)? else {
            bail!("unknown user `{username}`");
        };
        let counts = reports.dashboard_counts(user.uuid)?;
        println!("{}", serde_json::to_string_pretty(&counts)?);
    }

    let dashboard = reports.property_dashboard(today_or(None))?;
    println!(
        "properties: {} total, {} active ({}%), {} available ({}%)",
        dashboard.total_properties,
        dashboard.active_properties,
        dashboard.active_percentage,
        dashboard.available_properties,
        dashboard.available_percentage
    );
    println!(
        "average occupancy {}%, average ROI {}%",
        dashboard.average_occupancy, dashboard.average_roi
    );
    println!(
        "revenue {} / expenses {}",
        dashboard.total_revenue, dashboard.total_expenses
    );
    for (status, count) in &dashboard.status_breakdown {
        println!("  {:<12} {count}", status.as_str());
    }
    for ranking in &dashboard.top_roi {
        println!("  top ROI {} {} {}%", ranking.code, ranking.title, ranking.average_roi);
    }
    Ok(())
}

fn accounts(conn: &Connection, active_only: bool, as_of: Option<NaiveDate>) -> anyhow::Result<()> {
    let ledger = LedgerService::new(SqliteLedgerRepository::try_new(conn)?);
    for account in ledger.list_accounts(active_only)? {
        let balance = ledger.account_balance(account.uuid, as_of)?;
        println!(
            "{:<8} {:<10} {:>14}  {}",
            account.code,
            account.account_type.as_str(),
            balance.balance,
            account.name
        );
    }
    Ok(())
}

fn trial_balance(conn: &Connection, as_of: Option<NaiveDate>) -> anyhow::Result<()> {
    let ledger = LedgerService::new(SqliteLedgerRepository::try_new(conn)?);
    let trial = ledger.trial_balance(as_of)?;
    for row in &trial.rows {
        println!(
            "{:<8} {:<32} {:>14} {:>14}",
            row.account.code, row.account.name, row.debit_total, row.credit_total
        );
    }
    println!(
        "{:<41} {:>14} {:>14}",
        "TOTAL", trial.total_debit, trial.total_credit
    );
    if !trial.is_balanced() {
        bail!(
            "trial balance is out of balance: debit {} != credit {}",
            trial.total_debit,
            trial.total_credit
        );
    }
    Ok(())
}

fn budget_report(conn: &Connection, period: Option<Uuid>) -> anyhow::Result<()> {
    let ledger = LedgerService::new(SqliteLedgerRepository::try_new(conn)?);
    let period = match period {
        Some(id) => ledger.get_period(id)?,
        None => match ledger.list_periods()?.into_iter().next() {
            Some(period) => period,
            None => bail!("no financial periods defined"),
        },
    };
    let budgets = BudgetService::new(SqliteBudgetRepository::try_new(conn)?);
    let report = budgets.period_report(period.uuid)?;
    println!("{} ({} .. {})", period.name, period.start_date, period.end_date);
    for line in &report.lines {
        println!(
            "{:<32} {:>14} {:>14} {:>14} {:>8}%",
            line.name,
            line.budgeted_amount,
            line.actual_amount,
            line.variance,
            line.variance_percentage
        );
    }
    println!(
        "{:<32} {:>14} {:>14} {:>14}",
        "TOTAL", report.total_budgeted, report.total_actual, report.total_variance
    );
    for overrun in report.overruns() {
        println!("overrun: {}", overrun.name);
    }
    Ok(())
}

fn notify_scan(
    conn: &Connection,
    config: &EstateConfig,
    today: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let today = today_or(today);
    let lookahead = config.notification_lookahead_days;

    let leasing = LeasingService::new(
        SqliteContractRepository::try_new(conn)?,
        SqlitePropertyRepository::try_new(conn)?,
    );
    let invoices = InvoiceService::new(SqliteInvoiceRepository::try_new(conn)?);
    let properties = PropertyService::new(
        SqlitePropertyRepository::try_new(conn)?,
        SqlitePropertyRecordRepository::try_new(conn)?,
    );
    let ledger = LedgerService::new(SqliteLedgerRepository::try_new(conn)?);
    let budgets = BudgetService::new(SqliteBudgetRepository::try_new(conn)?);
    let notifications = NotificationService::new(
        SqliteNotificationRepository::try_new(conn)?,
        SqliteAccessRepository::try_new(conn)?,
    );

    let expired = leasing.expire_ended(today)?;
    let overdue = invoices.mark_overdue(today)?;

    let recipients: Vec<Uuid> = SqliteAccessRepository::try_new(conn)?
        .list_active_users()?
        .into_iter()
        .map(|user| user.uuid)
        .collect();

    let mut created = 0;
    created += notifications
        .contract_expiry_alerts(&leasing.expiring_within(today, lookahead)?, &recipients, today)?
        .len();
    created += notifications
        .payment_due_alerts(
            &invoices.collectible_due_within(today, lookahead)?,
            &recipients,
            today,
        )?
        .len();
    created += notifications
        .document_expiry_alerts(&properties.documents_expiring(today, lookahead)?, &recipients)?
        .len();
    for period in ledger
        .list_periods()?
        .into_iter()
        .filter(|period| !period.is_closed && period.contains(today))
    {
        let report = budgets.period_report(period.uuid)?;
        created += notifications
            .budget_overrun_alerts(report.overruns(), &recipients)?
            .len();
    }

    let mut emailed = 0;
    let now = Local::now().time();
    for notification in notifications.due_scheduled(now_epoch_ms())? {
        if notifications.send_email(notification.uuid, &LogMailer, now)? == EmailOutcome::Sent {
            emailed += 1;
        }
    }

    info!(
        "event=cli_notify_scan module=cli status=ok expired={} overdue={} created={created} emailed={emailed}",
        expired.len(),
        overdue.len()
    );
    println!(
        "expired contracts: {}, overdue invoices: {}, notifications: {created}, emails: {emailed}",
        expired.len(),
        overdue.len()
    );
    Ok(())
}

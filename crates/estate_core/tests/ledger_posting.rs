use chrono::NaiveDate;
use estate_core::db::open_db_in_memory;
use estate_core::model::ledger::{
    Account, AccountType, FinancialPeriod, JournalEntry, JournalEntryType, JournalLine,
};
use estate_core::repo::ledger_repo::{EntryFilter, SqliteLedgerRepository};
use estate_core::service::ledger_service::{LedgerService, LedgerServiceError};
use rust_decimal_macros::dec;
use rusqlite::Connection;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn service(conn: &Connection) -> LedgerService<SqliteLedgerRepository<'_>> {
    LedgerService::new(SqliteLedgerRepository::try_new(conn).unwrap())
}

fn account(
    ledger: &LedgerService<SqliteLedgerRepository<'_>>,
    code: &str,
    name: &str,
    account_type: AccountType,
) -> Account {
    let account = Account::new(code, name, account_type);
    ledger.create_account(&account).unwrap();
    account
}

#[test]
fn balanced_entry_posts_and_moves_balances() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
    let rent = account(&ledger, "4000", "Rental Revenue", AccountType::Revenue);

    let entry = JournalEntry::new("JE-0001", date(2024, 3, 1), "March rent");
    let lines = [
        JournalLine::debit(entry.uuid, cash.uuid, dec!(1500.00)),
        JournalLine::credit(entry.uuid, rent.uuid, dec!(1500.00)),
    ];
    ledger.create_entry(&entry, &lines).unwrap();

    // Draft lines do not count.
    assert_eq!(ledger.account_balance(cash.uuid, None).unwrap().balance, dec!(0));

    ledger.post_entry(entry.uuid, None).unwrap();

    let detail = ledger.entry_detail(entry.uuid).unwrap();
    assert!(detail.entry.is_posted);
    assert!(detail.entry.posted_at.is_some());
    assert!(detail.is_balanced());
    assert_eq!(detail.lines.len(), 2);

    assert_eq!(ledger.account_balance(cash.uuid, None).unwrap().balance, dec!(1500.00));
    assert_eq!(ledger.account_balance(rent.uuid, None).unwrap().balance, dec!(1500.00));
    assert_eq!(
        ledger
            .account_balance(cash.uuid, Some(date(2024, 2, 28)))
            .unwrap()
            .balance,
        dec!(0)
    );
}

#[test]
fn unbalanced_entry_is_rejected_and_stays_draft() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
    let rent = account(&ledger, "4000", "Rental Revenue", AccountType::Revenue);

    let entry = JournalEntry::new("JE-0002", date(2024, 3, 2), "Typo");
    let lines = [
        JournalLine::debit(entry.uuid, cash.uuid, dec!(100)),
        JournalLine::credit(entry.uuid, rent.uuid, dec!(90)),
    ];
    ledger.create_entry(&entry, &lines).unwrap();

    match ledger.post_entry(entry.uuid, None) {
        Err(LedgerServiceError::Unbalanced { debit, credit, .. }) => {
            assert_eq!(debit, dec!(100));
            assert_eq!(credit, dec!(90));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!ledger.entry_detail(entry.uuid).unwrap().entry.is_posted);

    // Fixing the draft makes it postable.
    let fix = JournalLine::credit(entry.uuid, rent.uuid, dec!(10));
    ledger.add_line(&fix).unwrap();
    ledger.post_entry(entry.uuid, None).unwrap();
}

#[test]
fn empty_entry_cannot_be_posted() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let entry = JournalEntry::new("JE-0003", date(2024, 3, 3), "Nothing");
    ledger.create_entry(&entry, &[]).unwrap();

    assert!(matches!(
        ledger.post_entry(entry.uuid, None),
        Err(LedgerServiceError::EmptyEntry(_))
    ));
}

#[test]
fn line_with_both_sides_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
    let entry = JournalEntry::new("JE-0004", date(2024, 3, 4), "Broken");
    ledger.create_entry(&entry, &[]).unwrap();

    let mut line = JournalLine::debit(entry.uuid, cash.uuid, dec!(5));
    line.credit_amount = dec!(5);
    assert!(matches!(
        ledger.add_line(&line),
        Err(LedgerServiceError::Validation(_))
    ));
}

#[test]
fn posted_entry_is_immutable_and_posting_twice_fails() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
    let equity = account(&ledger, "3000", "Owner Equity", AccountType::Equity);

    let entry = JournalEntry::new("JE-0005", date(2024, 1, 1), "Capital");
    let lines = [
        JournalLine::debit(entry.uuid, cash.uuid, dec!(10000)),
        JournalLine::credit(entry.uuid, equity.uuid, dec!(10000)),
    ];
    ledger.create_entry(&entry, &lines).unwrap();
    ledger.post_entry(entry.uuid, None).unwrap();

    assert!(matches!(
        ledger.post_entry(entry.uuid, None),
        Err(LedgerServiceError::AlreadyPosted(_))
    ));
    assert!(matches!(
        ledger.add_line(&JournalLine::debit(entry.uuid, cash.uuid, dec!(1))),
        Err(LedgerServiceError::EntryPosted(_))
    ));
    assert!(matches!(
        ledger.remove_line(entry.uuid, lines[0].uuid),
        Err(LedgerServiceError::EntryPosted(_))
    ));
    assert!(matches!(
        ledger.delete_entry(entry.uuid),
        Err(LedgerServiceError::EntryPosted(_))
    ));
}

#[test]
fn closed_period_blocks_posting() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
    let rent = account(&ledger, "4000", "Rental Revenue", AccountType::Revenue);

    let period = FinancialPeriod::new("Q1 2024", date(2024, 1, 1), date(2024, 3, 31));
    ledger.create_period(&period).unwrap();
    ledger.close_period(period.uuid).unwrap();
    assert!(ledger.get_period(period.uuid).unwrap().is_closed);

    // No explicit period, but the date falls inside a closed one.
    let entry = JournalEntry::new("JE-0006", date(2024, 2, 15), "Late rent");
    let lines = [
        JournalLine::debit(entry.uuid, cash.uuid, dec!(700)),
        JournalLine::credit(entry.uuid, rent.uuid, dec!(700)),
    ];
    ledger.create_entry(&entry, &lines).unwrap();

    match ledger.post_entry(entry.uuid, None) {
        Err(LedgerServiceError::PeriodClosed(id)) => assert_eq!(id, period.uuid),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn reversal_mirrors_lines_and_zeroes_balances() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
    let repairs = account(&ledger, "5000", "Maintenance Expense", AccountType::Expense);

    let entry = JournalEntry::new("JE-0007", date(2024, 4, 10), "Plumber");
    let lines = [
        JournalLine::debit(entry.uuid, repairs.uuid, dec!(250)),
        JournalLine::credit(entry.uuid, cash.uuid, dec!(250)),
    ];
    ledger.create_entry(&entry, &lines).unwrap();

    assert!(matches!(
        ledger.reverse_entry(entry.uuid, "JE-0008", date(2024, 4, 11), None),
        Err(LedgerServiceError::NotPosted(_))
    ));

    ledger.post_entry(entry.uuid, None).unwrap();
    assert_eq!(ledger.account_balance(repairs.uuid, None).unwrap().balance, dec!(250));

    let reversal_id = ledger
        .reverse_entry(entry.uuid, "JE-0008", date(2024, 4, 11), None)
        .unwrap();
    let reversal = ledger.entry_detail(reversal_id).unwrap();
    assert!(reversal.entry.is_posted);
    assert_eq!(reversal.entry.entry_type, JournalEntryType::Adjustment);
    assert_eq!(reversal.entry.reference, "JE-0007");
    assert_eq!(reversal.entry.description, "Reversal of JE-0007");
    assert_eq!(reversal.totals.debit, dec!(250));

    assert_eq!(ledger.account_balance(repairs.uuid, None).unwrap().balance, dec!(0));
    assert_eq!(ledger.account_balance(cash.uuid, None).unwrap().balance, dec!(0));

    let posted = ledger
        .list_entries(&EntryFilter {
            is_posted: Some(true),
            ..EntryFilter::default()
        })
        .unwrap();
    assert_eq!(posted.len(), 2);
}

#[test]
fn trial_balance_totals_match_over_posted_entries() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let cash = account(&ledger, "1000", "Cash", AccountType::Asset);
    let rent = account(&ledger, "4000", "Rental Revenue", AccountType::Revenue);
    let repairs = account(&ledger, "5000", "Maintenance Expense", AccountType::Expense);

    let first = JournalEntry::new("JE-0010", date(2024, 5, 1), "Rent");
    ledger
        .create_entry(
            &first,
            &[
                JournalLine::debit(first.uuid, cash.uuid, dec!(1200)),
                JournalLine::credit(first.uuid, rent.uuid, dec!(1200)),
            ],
        )
        .unwrap();
    ledger.post_entry(first.uuid, None).unwrap();

    let second = JournalEntry::new("JE-0011", date(2024, 5, 20), "Repairs");
    ledger
        .create_entry(
            &second,
            &[
                JournalLine::debit(second.uuid, repairs.uuid, dec!(300)),
                JournalLine::credit(second.uuid, cash.uuid, dec!(300)),
            ],
        )
        .unwrap();
    ledger.post_entry(second.uuid, None).unwrap();

    let draft = JournalEntry::new("JE-0012", date(2024, 5, 21), "Draft");
    ledger
        .create_entry(&draft, &[JournalLine::debit(draft.uuid, cash.uuid, dec!(999))])
        .unwrap();

    let trial = ledger.trial_balance(None).unwrap();
    assert!(trial.is_balanced());
    assert_eq!(trial.total_debit, dec!(1500));
    assert_eq!(trial.total_credit, dec!(1500));
    let cash_row = trial
        .rows
        .iter()
        .find(|row| row.account.uuid == cash.uuid)
        .unwrap();
    assert_eq!(cash_row.balance, dec!(900));

    let early = ledger.trial_balance(Some(date(2024, 5, 10))).unwrap();
    assert_eq!(early.total_debit, dec!(1200));
}

#[test]
fn account_tree_paths_and_delete_guards() {
    let conn = open_db_in_memory().unwrap();
    let ledger = service(&conn);
    let assets = account(&ledger, "1", "Assets", AccountType::Asset);
    let mut bank = Account::new("1010", "Bank", AccountType::Asset);
    bank.parent_uuid = Some(assets.uuid);
    ledger.create_account(&bank).unwrap();

    assert_eq!(ledger.account_full_path(bank.uuid).unwrap(), "Assets > Bank");
    assert!(matches!(
        ledger.create_account(&Account::new("1010", "Duplicate", AccountType::Asset)),
        Err(LedgerServiceError::Conflict(_))
    ));

    let mut system = Account::new("9000", "Suspense", AccountType::Liability);
    system.is_system = true;
    ledger.create_account(&system).unwrap();
    assert!(matches!(
        ledger.delete_account(system.uuid),
        Err(LedgerServiceError::Conflict(_))
    ));

    let rent = account(&ledger, "4000", "Rent", AccountType::Revenue);
    let entry = JournalEntry::new("JE-0020", date(2024, 6, 1), "Rent");
    ledger
        .create_entry(
            &entry,
            &[
                JournalLine::debit(entry.uuid, bank.uuid, dec!(10)),
                JournalLine::credit(entry.uuid, rent.uuid, dec!(10)),
            ],
        )
        .unwrap();
    assert!(matches!(
        ledger.delete_account(rent.uuid),
        Err(LedgerServiceError::Conflict(_))
    ));
    ledger.delete_entry(entry.uuid).unwrap();
    ledger.delete_account(rent.uuid).unwrap();
}

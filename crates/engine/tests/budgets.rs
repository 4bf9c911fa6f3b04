use chrono::{NaiveDate, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{
    CreateBankCmd, Engine, EngineError, NewTransactionCmd, PeriodType, TransactionKind,
    UpdateBankCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec!["alice".into(), "password".into()],
    ))
    .await
    .unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// 2026-06-21 is a Sunday: 10 days and 3 Monday-started weeks left in June.
fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 21, 12, 0, 0).unwrap()
}

async fn default_bank(engine: &Engine, balance_minor: i64) -> Uuid {
    engine
        .new_bank(
            CreateBankCmd::new("alice", "Main")
                .initial_balance_minor(balance_minor)
                .is_default(true),
        )
        .await
        .unwrap()
}

async fn budget_record_count(db: &DatabaseConnection) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT COUNT(*) AS n FROM budgets".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

#[tokio::test]
async fn budgets_prorate_the_default_bank_balance() {
    let (engine, _db) = engine_with_db().await;
    default_bank(&engine, 3_000).await;

    let report = engine.calculate_budgets("alice", fixed_now()).await.unwrap();

    assert_eq!(report.daily.period_type, PeriodType::Day);
    assert_eq!(
        report.daily.period_start,
        NaiveDate::from_ymd_opt(2026, 6, 21).unwrap()
    );
    assert_eq!(report.daily.available_minor, 300);
    assert_eq!(report.daily.initial_budget_minor, 300);
    assert_eq!(report.daily.spent_minor, 0);

    assert_eq!(
        report.weekly.period_start,
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    );
    assert_eq!(report.weekly.available_minor, 1_000);
    assert_eq!(report.weekly.initial_budget_minor, 1_000);

    assert_eq!(
        report.monthly.period_start,
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    );
    assert_eq!(report.monthly.available_minor, 3_000);
    assert_eq!(report.monthly.initial_budget_minor, 3_000);
}

#[tokio::test]
async fn first_expense_freezes_pre_expense_snapshots() {
    let (engine, db) = engine_with_db().await;
    let bank_id = default_bank(&engine, 3_000).await;
    assert_eq!(budget_record_count(&db).await, 0);

    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 50, fixed_now())
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();
    assert_eq!(budget_record_count(&db).await, 3);

    let report = engine.calculate_budgets("alice", fixed_now()).await.unwrap();

    // Snapshots hold the pre-expense budget; availability tracks the new balance.
    assert_eq!(report.daily.initial_budget_minor, 300);
    assert_eq!(report.daily.spent_minor, 50);
    assert_eq!(report.daily.available_minor, 295);

    assert_eq!(report.weekly.initial_budget_minor, 1_000);
    assert_eq!(report.weekly.available_minor, 983);

    assert_eq!(report.monthly.initial_budget_minor, 3_000);
    assert_eq!(report.monthly.spent_minor, 50);
    assert_eq!(report.monthly.available_minor, 2_950);
}

#[tokio::test]
async fn later_expenses_do_not_refreeze_snapshots() {
    let (engine, db) = engine_with_db().await;
    let bank_id = default_bank(&engine, 3_000).await;

    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 50, fixed_now())
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();
    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 100, fixed_now())
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();
    assert_eq!(budget_record_count(&db).await, 3);

    let report = engine.calculate_budgets("alice", fixed_now()).await.unwrap();
    assert_eq!(report.daily.initial_budget_minor, 300);
    assert_eq!(report.daily.spent_minor, 150);
    assert_eq!(report.daily.available_minor, 285);
    assert_eq!(report.monthly.available_minor, 2_850);
}

#[tokio::test]
async fn snapshots_survive_balance_adjustments() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = default_bank(&engine, 3_000).await;

    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 50, fixed_now())
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();

    engine
        .update_bank(UpdateBankCmd::new("alice", bank_id).current_balance_minor(10_000))
        .await
        .unwrap();

    let report = engine.calculate_budgets("alice", fixed_now()).await.unwrap();
    // Frozen budgets stay put while the allowance follows the new balance.
    assert_eq!(report.daily.initial_budget_minor, 300);
    assert_eq!(report.daily.available_minor, 1_000);
    assert_eq!(report.monthly.initial_budget_minor, 3_000);
    assert_eq!(report.monthly.available_minor, 2_950);
}

#[tokio::test]
async fn excluded_expenses_freeze_nothing_and_spend_nothing() {
    let (engine, db) = engine_with_db().await;
    let bank_id = default_bank(&engine, 3_000).await;

    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 80, fixed_now())
                .piggy_bank_id(bank_id)
                .exclude_from_daily_spent(true),
        )
        .await
        .unwrap();
    assert_eq!(budget_record_count(&db).await, 0);

    let report = engine.calculate_budgets("alice", fixed_now()).await.unwrap();
    assert_eq!(report.daily.spent_minor, 0);
    assert_eq!(report.monthly.spent_minor, 0);
    // Reconstruction backs the expense out of the current balance.
    assert_eq!(report.daily.initial_budget_minor, 300);
    assert_eq!(report.daily.available_minor, 292);
}

#[tokio::test]
async fn expenses_on_other_banks_freeze_nothing() {
    let (engine, db) = engine_with_db().await;
    default_bank(&engine, 3_000).await;
    let side = engine
        .new_bank(CreateBankCmd::new("alice", "Side").initial_balance_minor(1_000))
        .await
        .unwrap();

    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 200, fixed_now())
                .piggy_bank_id(side),
        )
        .await
        .unwrap();
    assert_eq!(budget_record_count(&db).await, 0);

    let report = engine.calculate_budgets("alice", fixed_now()).await.unwrap();
    assert_eq!(report.daily.spent_minor, 0);
    assert_eq!(report.daily.available_minor, 300);
}

#[tokio::test]
async fn budgets_require_a_default_bank() {
    let (engine, _db) = engine_with_db().await;
    engine
        .new_bank(CreateBankCmd::new("alice", "Plain").initial_balance_minor(3_000))
        .await
        .unwrap();

    let err = engine
        .calculate_budgets("alice", fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
}

#[tokio::test]
async fn budget_records_are_immutable_once_written() {
    let (engine, _db) = engine_with_db().await;
    default_bank(&engine, 3_000).await;

    let start = NaiveDate::from_ymd_opt(2026, 6, 21).unwrap();
    let first = engine
        .create_budget_record("alice", PeriodType::Day, start, 500)
        .await
        .unwrap();
    assert_eq!(first.initial_budget_minor, 500);

    let second = engine
        .create_budget_record("alice", PeriodType::Day, start, 999)
        .await
        .unwrap();
    assert_eq!(second.initial_budget_minor, 500);
    assert_eq!(second.id, first.id);

    // The frozen record drives the daily report.
    let report = engine.calculate_budgets("alice", fixed_now()).await.unwrap();
    assert_eq!(report.daily.initial_budget_minor, 500);
}

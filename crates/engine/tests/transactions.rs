use chrono::{Duration, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{
    CreateBankCmd, Engine, EngineError, NewTransactionCmd, TransactionKind, TransactionListFilter,
    UpdateTransactionCmd,
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

async fn funded_bank(engine: &Engine) -> Uuid {
    engine
        .new_bank(CreateBankCmd::new("alice", "Cash").initial_balance_minor(10_000))
        .await
        .unwrap()
}

#[tokio::test]
async fn expense_and_income_move_the_stored_balance() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;

    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 3_000, Utc::now())
                .piggy_bank_id(bank_id)
                .category("groceries"),
        )
        .await
        .unwrap();
    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Income, 500, Utc::now())
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();

    let view = engine.bank(bank_id, "alice").await.unwrap();
    assert_eq!(view.effective_minor, 7_500);
    assert_eq!(view.calculated_minor, 7_500);
}

#[tokio::test]
async fn transaction_without_bank_touches_no_balance() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;

    let tx_id = engine
        .new_transaction(NewTransactionCmd::new(
            "alice",
            TransactionKind::Expense,
            1_000,
            Utc::now(),
        ))
        .await
        .unwrap();

    let tx = engine.transaction(tx_id, "alice").await.unwrap();
    assert_eq!(tx.piggy_bank_id, None);

    let view = engine.bank(bank_id, "alice").await.unwrap();
    assert_eq!(view.effective_minor, 10_000);
}

#[tokio::test]
async fn update_transaction_rebalances_the_bank() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;

    let tx_id = engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 100, Utc::now())
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();
    assert_eq!(
        engine.bank(bank_id, "alice").await.unwrap().effective_minor,
        9_900
    );

    engine
        .update_transaction(UpdateTransactionCmd::new("alice", tx_id).amount_minor(60))
        .await
        .unwrap();
    assert_eq!(
        engine.bank(bank_id, "alice").await.unwrap().effective_minor,
        9_940
    );

    // Flipping the kind swings the delta both ways.
    engine
        .update_transaction(UpdateTransactionCmd::new("alice", tx_id).kind(TransactionKind::Income))
        .await
        .unwrap();
    assert_eq!(
        engine.bank(bank_id, "alice").await.unwrap().effective_minor,
        10_060
    );
}

#[tokio::test]
async fn retargeting_a_transaction_moves_the_delta() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;
    let other = engine
        .new_bank(CreateBankCmd::new("alice", "Other").initial_balance_minor(5_000))
        .await
        .unwrap();

    let tx_id = engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 1_000, Utc::now())
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();

    engine
        .update_transaction(UpdateTransactionCmd::new("alice", tx_id).piggy_bank_id(other))
        .await
        .unwrap();

    assert_eq!(
        engine.bank(bank_id, "alice").await.unwrap().effective_minor,
        10_000
    );
    assert_eq!(
        engine.bank(other, "alice").await.unwrap().effective_minor,
        4_000
    );

    // Detaching reverses the delta on the previous bank.
    engine
        .update_transaction(UpdateTransactionCmd::new("alice", tx_id).detach_piggy_bank())
        .await
        .unwrap();
    assert_eq!(
        engine.bank(other, "alice").await.unwrap().effective_minor,
        5_000
    );
}

#[tokio::test]
async fn delete_transaction_reverses_its_effect() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;

    let tx_id = engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 2_000, Utc::now())
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();

    engine.delete_transaction(tx_id, "alice").await.unwrap();

    let view = engine.bank(bank_id, "alice").await.unwrap();
    assert_eq!(view.effective_minor, 10_000);

    let err = engine.transaction(tx_id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn system_transactions_are_immutable() {
    let (engine, _db) = engine_with_db().await;
    funded_bank(&engine).await;

    let filter = TransactionListFilter {
        include_system: true,
        ..Default::default()
    };
    let (txs, _) = engine
        .list_transactions_page("alice", 10, None, &filter)
        .await
        .unwrap();
    let opening = txs[0].id;

    let err = engine
        .update_transaction(UpdateTransactionCmd::new("alice", opening).amount_minor(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));

    let err = engine.delete_transaction(opening, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
}

#[tokio::test]
async fn stored_balance_wins_on_divergence() {
    let (engine, db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;

    // Simulate drift between the ledger and the denormalized column.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE piggy_banks SET current_balance_minor = ? WHERE id = ?",
        vec![12_345i64.into(), bank_id.to_string().into()],
    ))
    .await
    .unwrap();

    let view = engine.bank(bank_id, "alice").await.unwrap();
    assert_eq!(view.calculated_minor, 10_000);
    assert_eq!(view.effective_minor, 12_345);
}

#[tokio::test]
async fn pagination_walks_newest_to_oldest() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;

    let base = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
    for hour in 0..5 {
        engine
            .new_transaction(
                NewTransactionCmd::new(
                    "alice",
                    TransactionKind::Expense,
                    100 + hour,
                    base + Duration::hours(hour),
                )
                .piggy_bank_id(bank_id),
            )
            .await
            .unwrap();
    }

    let filter = TransactionListFilter::default();
    let (page1, cursor) = engine
        .list_transactions_page("alice", 2, None, &filter)
        .await
        .unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page1[0].amount_minor, 104);
    assert_eq!(page1[1].amount_minor, 103);
    let cursor = cursor.expect("more pages");

    let (page2, cursor) = engine
        .list_transactions_page("alice", 2, Some(&cursor), &filter)
        .await
        .unwrap();
    assert_eq!(page2.len(), 2);
    assert_eq!(page2[0].amount_minor, 102);
    assert_eq!(page2[1].amount_minor, 101);
    let cursor = cursor.expect("one more page");

    let (page3, cursor) = engine
        .list_transactions_page("alice", 2, Some(&cursor), &filter)
        .await
        .unwrap();
    assert_eq!(page3.len(), 1);
    assert_eq!(page3[0].amount_minor, 100);
    assert!(cursor.is_none());
}

#[tokio::test]
async fn garbage_cursor_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    funded_bank(&engine).await;

    let err = engine
        .list_transactions_page(
            "alice",
            10,
            Some("not-a-cursor"),
            &TransactionListFilter::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));
}

#[tokio::test]
async fn list_filters_by_kind_bank_and_range() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;
    let other = engine
        .new_bank(CreateBankCmd::new("alice", "Other"))
        .await
        .unwrap();

    let base = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
    engine
        .new_transaction(
            NewTransactionCmd::new("alice", TransactionKind::Expense, 100, base)
                .piggy_bank_id(bank_id),
        )
        .await
        .unwrap();
    engine
        .new_transaction(
            NewTransactionCmd::new(
                "alice",
                TransactionKind::Income,
                200,
                base + Duration::days(1),
            )
            .piggy_bank_id(other),
        )
        .await
        .unwrap();

    let filter = TransactionListFilter {
        kinds: Some(vec![TransactionKind::Income]),
        ..Default::default()
    };
    let (txs, _) = engine
        .list_transactions_page("alice", 10, None, &filter)
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount_minor, 200);

    let filter = TransactionListFilter {
        piggy_bank_id: Some(bank_id),
        ..Default::default()
    };
    let (txs, _) = engine
        .list_transactions_page("alice", 10, None, &filter)
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount_minor, 100);

    let filter = TransactionListFilter {
        from: Some(base + Duration::hours(1)),
        to: Some(base + Duration::days(2)),
        ..Default::default()
    };
    let (txs, _) = engine
        .list_transactions_page("alice", 10, None, &filter)
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount_minor, 200);

    // Inverted range is a validation error.
    let filter = TransactionListFilter {
        from: Some(base + Duration::days(2)),
        to: Some(base),
        ..Default::default()
    };
    let err = engine
        .list_transactions_page("alice", 10, None, &filter)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn zero_or_negative_amounts_rejected() {
    let (engine, _db) = engine_with_db().await;
    let bank_id = funded_bank(&engine).await;

    for amount in [0, -100] {
        let err = engine
            .new_transaction(
                NewTransactionCmd::new("alice", TransactionKind::Expense, amount, Utc::now())
                    .piggy_bank_id(bank_id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}

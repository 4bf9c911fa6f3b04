use std::collections::HashMap;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};

use crate::{
    EngineError, NewTransactionCmd, ResultEngine, SourceKind, Transaction, TransactionKind,
    UpdateTransactionCmd, balance, piggy_banks, transactions,
};

use super::{Engine, normalize_optional_text, transfers::set_stored_balance, with_tx};

/// Filters for listing transactions.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<TransactionKind>>,
    /// If present, only transactions on this piggy bank.
    pub piggy_bank_id: Option<Uuid>,
    /// If true, includes engine-written audit transactions (default: false).
    pub include_system: bool,
}

fn validate_list_filter(filter: &TransactionListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::Validation(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
        return Err(EngineError::Validation(
            "kinds must not be empty".to_string(),
        ));
    }
    Ok(())
}

trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, filter: &TransactionListFilter) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(mut self, filter: &TransactionListFilter) -> Self {
        if let Some(from) = filter.from {
            self = self.filter(transactions::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(transactions::Column::OccurredAt.lt(to));
        }
        if let Some(bank_id) = filter.piggy_bank_id {
            self = self.filter(transactions::Column::PiggyBankId.eq(bank_id.to_string()));
        }
        if let Some(kinds) = &filter.kinds {
            let kinds: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
            self = self.filter(transactions::Column::Kind.is_in(kinds));
        }
        if !filter.include_system {
            self = self.filter(transactions::Column::Source.eq(SourceKind::User.as_str()));
        }

        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    occurred_at: DateTime<Utc>,
    transaction_id: String,
}

impl TransactionsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))
    }
}

impl Engine {
    /// Record a user-entered transaction.
    ///
    /// The signed amount is applied to the bank's stored balance in the same
    /// DB transaction. The first qualifying expense on the default bank also
    /// freezes the day/week/month budget snapshots, computed from the
    /// pre-expense balance.
    pub async fn new_transaction(&self, cmd: NewTransactionCmd) -> ResultEngine<Uuid> {
        if cmd.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        let category = normalize_optional_text(cmd.category.as_deref());
        let note = normalize_optional_text(cmd.note.as_deref());

        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, &cmd.user_id).await?;
            let bank = match cmd.piggy_bank_id {
                Some(bank_id) => Some(
                    self.require_bank_owned(&db_tx, bank_id, &cmd.user_id)
                        .await?,
                ),
                None => None,
            };

            // Snapshots must see the balance as it was before this expense.
            if cmd.kind == TransactionKind::Expense
                && !cmd.exclude_from_daily_spent
                && let Some(bank) = &bank
                && bank.is_default
            {
                self.ensure_budget_snapshots(&db_tx, &cmd.user_id, bank, cmd.occurred_at)
                    .await?;
            }

            let mut tx = Transaction::new(
                cmd.user_id.clone(),
                cmd.piggy_bank_id,
                cmd.kind,
                cmd.amount_minor,
                cmd.occurred_at,
                SourceKind::User,
            )?
            .exclude_from_daily_spent(cmd.exclude_from_daily_spent);
            tx.category = category;
            tx.note = note;
            let tx_id = tx.id;
            transactions::ActiveModel::from(&tx).insert(&db_tx).await?;

            if let Some(bank) = &bank {
                let delta = balance::signed_amount(cmd.kind, cmd.amount_minor);
                set_stored_balance(&db_tx, &bank.id, bank.current_balance_minor + delta).await?;
            }

            tracing::debug!(
                user_id = %cmd.user_id,
                transaction_id = %tx_id,
                kind = cmd.kind.as_str(),
                amount_minor = cmd.amount_minor,
                "recorded transaction"
            );
            Ok(tx_id)
        })
    }

    /// Return a single transaction owned by `user_id`.
    pub async fn transaction(
        &self,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_transaction_owned(&db_tx, transaction_id, user_id)
                .await?;
            Transaction::try_from(model)
        })
    }

    /// Update a user transaction.
    ///
    /// The old signed delta is reversed and the new one applied on the
    /// affected bank(s) atomically. System transactions are immutable.
    pub async fn update_transaction(&self, cmd: UpdateTransactionCmd) -> ResultEngine<()> {
        if let Some(amount_minor) = cmd.amount_minor
            && amount_minor <= 0
        {
            return Err(EngineError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        let category = normalize_optional_text(cmd.category.as_deref());
        let note = normalize_optional_text(cmd.note.as_deref());

        with_tx!(self, |db_tx| {
            let model = self
                .require_transaction_owned(&db_tx, cmd.transaction_id, &cmd.user_id)
                .await?;
            if model.source == SourceKind::System.as_str() {
                return Err(EngineError::Precondition(
                    "system transactions cannot be modified".to_string(),
                ));
            }

            let old_kind = TransactionKind::try_from(model.kind.as_str())?;
            let new_kind = cmd.kind.unwrap_or(old_kind);
            let new_amount = cmd.amount_minor.unwrap_or(model.amount_minor);
            let new_bank_id: Option<String> = match cmd.piggy_bank_id {
                Some(Some(bank_id)) => {
                    self.require_bank_owned(&db_tx, bank_id, &cmd.user_id)
                        .await?;
                    Some(bank_id.to_string())
                }
                Some(None) => None,
                None => model.piggy_bank_id.clone(),
            };

            // Reverse the old delta, apply the new one.
            let mut deltas: HashMap<String, i64> = HashMap::new();
            if let Some(bank_id) = &model.piggy_bank_id {
                *deltas.entry(bank_id.clone()).or_insert(0) -=
                    balance::signed_amount(old_kind, model.amount_minor);
            }
            if let Some(bank_id) = &new_bank_id {
                *deltas.entry(bank_id.clone()).or_insert(0) +=
                    balance::signed_amount(new_kind, new_amount);
            }
            self.apply_bank_deltas(&db_tx, deltas).await?;

            let active = transactions::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                kind: ActiveValue::Set(new_kind.as_str().to_string()),
                amount_minor: ActiveValue::Set(new_amount),
                piggy_bank_id: ActiveValue::Set(new_bank_id),
                occurred_at: ActiveValue::Set(cmd.occurred_at.unwrap_or(model.occurred_at)),
                category: ActiveValue::Set(category.or(model.category)),
                note: ActiveValue::Set(note.or(model.note)),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            tracing::debug!(
                user_id = %cmd.user_id,
                transaction_id = %cmd.transaction_id,
                "updated transaction"
            );
            Ok(())
        })
    }

    /// Delete a user transaction, reversing its effect on the bank balance.
    pub async fn delete_transaction(
        &self,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_transaction_owned(&db_tx, transaction_id, user_id)
                .await?;
            if model.source == SourceKind::System.as_str() {
                return Err(EngineError::Precondition(
                    "system transactions cannot be deleted".to_string(),
                ));
            }

            if let Some(bank_id) = &model.piggy_bank_id {
                let kind = TransactionKind::try_from(model.kind.as_str())?;
                let mut deltas = HashMap::new();
                deltas.insert(
                    bank_id.clone(),
                    -balance::signed_amount(kind, model.amount_minor),
                );
                self.apply_bank_deltas(&db_tx, deltas).await?;
            }

            transactions::Entity::delete_by_id(model.id)
                .exec(&db_tx)
                .await?;

            tracing::debug!(
                user_id = %user_id,
                transaction_id = %transaction_id,
                "deleted transaction"
            );
            Ok(())
        })
    }

    /// Lists a user's transactions with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, transaction_id
    /// DESC)`.
    pub async fn list_transactions_page(
        &self,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
        filter: &TransactionListFilter,
    ) -> ResultEngine<(Vec<Transaction>, Option<String>)> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            validate_list_filter(filter)?;
            if let Some(bank_id) = filter.piggy_bank_id {
                self.require_bank_owned(&db_tx, bank_id, user_id).await?;
            }

            let limit_plus_one = limit.saturating_add(1);
            let mut query = transactions::Entity::find()
                .filter(transactions::Column::UserId.eq(user_id.to_string()))
                .order_by_desc(transactions::Column::OccurredAt)
                .order_by_desc(transactions::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = TransactionsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(transactions::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(transactions::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(transactions::Column::Id.lt(cursor.transaction_id)),
                        ),
                );
            }
            query = query.apply_tx_filters(filter);

            let rows: Vec<transactions::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Transaction> = Vec::with_capacity(rows.len().min(limit as usize));
            for tx_model in rows.into_iter().take(limit as usize) {
                out.push(Transaction::try_from(tx_model)?);
            }

            let next_cursor = out.last().map(|tx| TransactionsCursor {
                occurred_at: tx.occurred_at,
                transaction_id: tx.id.to_string(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    async fn require_transaction_owned(
        &self,
        db: &sea_orm::DatabaseTransaction,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<transactions::Model> {
        transactions::Entity::find_by_id(transaction_id.to_string())
            .filter(transactions::Column::UserId.eq(user_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("transaction not exists".to_string()))
    }

    async fn apply_bank_deltas(
        &self,
        db: &sea_orm::DatabaseTransaction,
        deltas: HashMap<String, i64>,
    ) -> ResultEngine<()> {
        for (bank_id, delta) in deltas {
            if delta == 0 {
                continue;
            }
            let bank_model = piggy_banks::Entity::find_by_id(bank_id.clone())
                .one(db)
                .await?
                .ok_or_else(|| EngineError::NotFound("piggy bank not exists".to_string()))?;
            set_stored_balance(db, &bank_id, bank_model.current_balance_minor + delta).await?;
        }
        Ok(())
    }
}

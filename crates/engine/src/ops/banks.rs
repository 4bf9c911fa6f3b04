use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*, sea_query::Expr,
};

use crate::{
    CreateBankCmd, EngineError, MoneyCents, PiggyBank, ResultEngine, SourceKind, Transaction,
    TransactionKind, UpdateBankCmd, balance, piggy_banks, transactions,
};

use super::{Engine, normalize_required_name, with_tx};

/// A child bank with its reconciled balances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildBalance {
    pub bank: PiggyBank,
    pub calculated_minor: i64,
    pub effective_minor: i64,
}

/// A piggy bank with reconciled balances and, for parents, child aggregates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankBalanceView {
    pub bank: PiggyBank,
    /// Sum of signed transaction amounts.
    pub calculated_minor: i64,
    /// Balance a read should report (stored wins on divergence).
    pub effective_minor: i64,
    pub children: Vec<ChildBalance>,
    /// Sum of the children's effective balances.
    pub children_total_minor: i64,
    /// Effective balance plus the children's total.
    pub total_minor: i64,
}

impl Engine {
    /// Create a new piggy bank.
    ///
    /// A positive opening balance is persisted as a system income transaction
    /// ("Initial balance deposit"), so the transaction log accounts for it.
    /// The opening transaction uses `Utc::now()` as `occurred_at`.
    pub async fn new_bank(&self, cmd: CreateBankCmd) -> ResultEngine<Uuid> {
        let occurred_at = Utc::now();
        let name = normalize_required_name(&cmd.name, "piggy bank")?;
        if cmd.initial_balance_minor < 0 {
            return Err(EngineError::Validation(
                "initial balance must not be negative".to_string(),
            ));
        }
        if let Some(goal) = cmd.goal_minor
            && goal <= 0
        {
            return Err(EngineError::Validation("goal must be > 0".to_string()));
        }

        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, &cmd.user_id).await?;
            self.require_bank_name_free(&db_tx, &cmd.user_id, &name, None)
                .await?;

            if let Some(parent_id) = cmd.parent_id {
                let parent = self
                    .require_bank_owned(&db_tx, parent_id, &cmd.user_id)
                    .await?;
                if parent.parent_id.is_some() {
                    return Err(EngineError::Precondition(
                        "piggy bank hierarchy is limited to one level".to_string(),
                    ));
                }
            }

            if cmd.is_default {
                self.clear_default_banks(&db_tx, &cmd.user_id, None).await?;
            }

            let mut bank = PiggyBank::new(
                cmd.user_id.clone(),
                name.clone(),
                cmd.initial_balance_minor,
            );
            bank.goal_minor = cmd.goal_minor;
            bank.goal_due_date = cmd.goal_due_date;
            bank.is_default = cmd.is_default;
            bank.parent_id = cmd.parent_id;
            let bank_id = bank.id;

            piggy_banks::ActiveModel::from(&bank).insert(&db_tx).await?;

            if cmd.initial_balance_minor > 0 {
                self.insert_system_transaction(
                    &db_tx,
                    &cmd.user_id,
                    bank_id,
                    TransactionKind::Income,
                    cmd.initial_balance_minor,
                    "Initial balance deposit",
                    occurred_at,
                )
                .await?;
            }

            tracing::debug!(user_id = %cmd.user_id, bank_id = %bank_id, "created piggy bank");
            Ok(bank_id)
        })
    }

    /// Return a bank snapshot with reconciled balances and child aggregates.
    pub async fn bank(&self, bank_id: Uuid, user_id: &str) -> ResultEngine<BankBalanceView> {
        with_tx!(self, |db_tx| {
            let model = self.require_bank_owned(&db_tx, bank_id, user_id).await?;

            let calculated = self.calculated_balance_of(&db_tx, &model.id).await?;
            let effective = balance::effective_balance(model.current_balance_minor, calculated);

            let child_models = piggy_banks::Entity::find()
                .filter(piggy_banks::Column::ParentId.eq(model.id.clone()))
                .order_by_asc(piggy_banks::Column::Name)
                .all(&db_tx)
                .await?;

            let mut children = Vec::with_capacity(child_models.len());
            for child_model in child_models {
                let child_calculated = self.calculated_balance_of(&db_tx, &child_model.id).await?;
                let child_effective = balance::effective_balance(
                    child_model.current_balance_minor,
                    child_calculated,
                );
                children.push(ChildBalance {
                    bank: PiggyBank::try_from(child_model)?,
                    calculated_minor: child_calculated,
                    effective_minor: child_effective,
                });
            }

            Ok(build_view(
                PiggyBank::try_from(model)?,
                calculated,
                effective,
                children,
            ))
        })
    }

    /// List all of a user's banks with reconciled balances, default bank
    /// first, then by name. Parents carry their children's aggregates; the
    /// children also appear as entries of their own.
    pub async fn list_banks(&self, user_id: &str) -> ResultEngine<Vec<BankBalanceView>> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;

            let bank_models = piggy_banks::Entity::find()
                .filter(piggy_banks::Column::UserId.eq(user_id.to_string()))
                .order_by_desc(piggy_banks::Column::IsDefault)
                .order_by_asc(piggy_banks::Column::Name)
                .all(&db_tx)
                .await?;

            // One transactions fetch for the whole list, folded per bank.
            let tx_models = transactions::Entity::find()
                .filter(transactions::Column::UserId.eq(user_id.to_string()))
                .filter(transactions::Column::PiggyBankId.is_not_null())
                .all(&db_tx)
                .await?;

            let mut calculated_by_bank: HashMap<String, i64> = HashMap::new();
            for tx_model in tx_models {
                let Some(bank_id) = tx_model.piggy_bank_id else {
                    continue;
                };
                let kind = TransactionKind::try_from(tx_model.kind.as_str())?;
                *calculated_by_bank.entry(bank_id).or_insert(0) +=
                    balance::signed_amount(kind, tx_model.amount_minor);
            }

            let mut effective_by_bank: HashMap<String, i64> = HashMap::new();
            let mut children_by_parent: HashMap<String, Vec<ChildBalance>> = HashMap::new();
            for model in &bank_models {
                let calculated = calculated_by_bank.get(&model.id).copied().unwrap_or(0);
                let effective =
                    balance::effective_balance(model.current_balance_minor, calculated);
                effective_by_bank.insert(model.id.clone(), effective);
                if let Some(parent_id) = &model.parent_id {
                    children_by_parent
                        .entry(parent_id.clone())
                        .or_default()
                        .push(ChildBalance {
                            bank: PiggyBank::try_from(model.clone())?,
                            calculated_minor: calculated,
                            effective_minor: effective,
                        });
                }
            }

            let mut out = Vec::with_capacity(bank_models.len());
            for model in bank_models {
                let calculated = calculated_by_bank.get(&model.id).copied().unwrap_or(0);
                let effective = effective_by_bank.get(&model.id).copied().unwrap_or(0);
                let children = children_by_parent.remove(&model.id).unwrap_or_default();
                out.push(build_view(
                    PiggyBank::try_from(model)?,
                    calculated,
                    effective,
                    children,
                ));
            }

            Ok(out)
        })
    }

    /// Update a piggy bank with patch semantics.
    ///
    /// Changing the stored balance writes a system adjustment transaction so
    /// the audit trail explains the jump.
    pub async fn update_bank(&self, cmd: UpdateBankCmd) -> ResultEngine<()> {
        let occurred_at = Utc::now();
        let name = cmd
            .name
            .as_deref()
            .map(|n| normalize_required_name(n, "piggy bank"))
            .transpose()?;
        if let Some(Some(goal)) = cmd.goal_minor
            && goal <= 0
        {
            return Err(EngineError::Validation("goal must be > 0".to_string()));
        }
        if let Some(balance_minor) = cmd.current_balance_minor
            && balance_minor < 0
        {
            return Err(EngineError::Validation(
                "balance must not be negative".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let model = self
                .require_bank_owned(&db_tx, cmd.bank_id, &cmd.user_id)
                .await?;

            if let Some(name) = &name {
                self.require_bank_name_free(&db_tx, &cmd.user_id, name, Some(&model.id))
                    .await?;
            }

            if let Some(new_parent) = cmd.parent_id {
                self.check_parent_change(&db_tx, &model, new_parent, &cmd.user_id)
                    .await?;
            }

            if cmd.is_default == Some(true) {
                self.clear_default_banks(&db_tx, &cmd.user_id, Some(&model.id))
                    .await?;
            }

            if let Some(new_balance) = cmd.current_balance_minor
                && new_balance != model.current_balance_minor
            {
                let delta = new_balance - model.current_balance_minor;
                let kind = if delta > 0 {
                    TransactionKind::Income
                } else {
                    TransactionKind::Expense
                };
                let note = format!(
                    "Balance adjustment: {} -> {}",
                    MoneyCents::new(model.current_balance_minor),
                    MoneyCents::new(new_balance)
                );
                self.insert_system_transaction(
                    &db_tx,
                    &cmd.user_id,
                    cmd.bank_id,
                    kind,
                    delta.abs(),
                    &note,
                    occurred_at,
                )
                .await?;
            }

            let mut active = piggy_banks::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                ..Default::default()
            };
            let mut changed = false;
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
                changed = true;
            }
            if let Some(new_balance) = cmd.current_balance_minor {
                active.current_balance_minor = ActiveValue::Set(new_balance);
                changed = true;
            }
            if let Some(goal) = cmd.goal_minor {
                active.goal_minor = ActiveValue::Set(goal);
                changed = true;
            }
            if let Some(due_date) = cmd.goal_due_date {
                active.goal_due_date = ActiveValue::Set(due_date);
                changed = true;
            }
            if let Some(is_default) = cmd.is_default {
                active.is_default = ActiveValue::Set(is_default);
                changed = true;
            }
            if let Some(parent) = cmd.parent_id {
                active.parent_id = ActiveValue::Set(parent.map(|id| id.to_string()));
                changed = true;
            }
            if changed {
                active.update(&db_tx).await?;
            }

            tracing::debug!(user_id = %cmd.user_id, bank_id = %cmd.bank_id, "updated piggy bank");
            Ok(())
        })
    }

    /// Delete a piggy bank.
    ///
    /// Refused while the bank still has children or transactions; there is no
    /// cascading delete of financial history.
    pub async fn delete_bank(&self, bank_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_bank_owned(&db_tx, bank_id, user_id).await?;

            let child_count = piggy_banks::Entity::find()
                .filter(piggy_banks::Column::ParentId.eq(model.id.clone()))
                .count(&db_tx)
                .await?;
            if child_count > 0 {
                return Err(EngineError::Precondition(
                    "piggy bank has children".to_string(),
                ));
            }

            let tx_count = transactions::Entity::find()
                .filter(transactions::Column::PiggyBankId.eq(model.id.clone()))
                .count(&db_tx)
                .await?;
            if tx_count > 0 {
                return Err(EngineError::Precondition(
                    "piggy bank has transactions".to_string(),
                ));
            }

            piggy_banks::Entity::delete_by_id(model.id)
                .exec(&db_tx)
                .await?;

            tracing::debug!(user_id = %user_id, bank_id = %bank_id, "deleted piggy bank");
            Ok(())
        })
    }

    async fn require_bank_name_free(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        name: &str,
        exclude_bank_id: Option<&str>,
    ) -> ResultEngine<()> {
        let mut query = piggy_banks::Entity::find()
            .filter(piggy_banks::Column::UserId.eq(user_id.to_string()))
            .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()));
        if let Some(id) = exclude_bank_id {
            query = query.filter(piggy_banks::Column::Id.ne(id.to_string()));
        }
        if query.one(db).await?.is_some() {
            return Err(EngineError::Validation(format!(
                "piggy bank name already in use: {name}"
            )));
        }
        Ok(())
    }

    /// At most one default bank per user: unset every other default flag.
    async fn clear_default_banks(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        exclude_bank_id: Option<&str>,
    ) -> ResultEngine<()> {
        let mut query = piggy_banks::Entity::update_many()
            .col_expr(piggy_banks::Column::IsDefault, Expr::value(false))
            .filter(piggy_banks::Column::UserId.eq(user_id.to_string()))
            .filter(piggy_banks::Column::IsDefault.eq(true));
        if let Some(id) = exclude_bank_id {
            query = query.filter(piggy_banks::Column::Id.ne(id.to_string()));
        }
        query.exec(db).await?;
        Ok(())
    }

    async fn check_parent_change(
        &self,
        db: &DatabaseTransaction,
        model: &piggy_banks::Model,
        new_parent: Option<Uuid>,
        user_id: &str,
    ) -> ResultEngine<()> {
        let Some(parent_id) = new_parent else {
            return Ok(());
        };
        if parent_id.to_string() == model.id {
            return Err(EngineError::Precondition(
                "piggy bank cannot be its own parent".to_string(),
            ));
        }
        let child_count = piggy_banks::Entity::find()
            .filter(piggy_banks::Column::ParentId.eq(model.id.clone()))
            .count(db)
            .await?;
        if child_count > 0 {
            return Err(EngineError::Precondition(
                "piggy bank with children cannot have a parent".to_string(),
            ));
        }
        let parent = self.require_bank_owned(db, parent_id, user_id).await?;
        if parent.parent_id.is_some() {
            return Err(EngineError::Precondition(
                "piggy bank hierarchy is limited to one level".to_string(),
            ));
        }
        Ok(())
    }

    /// Insert an engine-written audit transaction.
    ///
    /// System rows always carry `exclude_from_daily_spent = true`.
    pub(super) async fn insert_system_transaction(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        bank_id: Uuid,
        kind: TransactionKind,
        amount_minor: i64,
        note: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        let tx = Transaction::new(
            user_id.to_string(),
            Some(bank_id),
            kind,
            amount_minor,
            occurred_at,
            SourceKind::System,
        )?
        .note(note);
        let tx_id = tx.id;
        transactions::ActiveModel::from(&tx).insert(db).await?;
        Ok(tx_id)
    }
}

fn build_view(
    bank: PiggyBank,
    calculated_minor: i64,
    effective_minor: i64,
    children: Vec<ChildBalance>,
) -> BankBalanceView {
    let balances = balance::BankBalances {
        own_minor: effective_minor,
        children_total_minor: children.iter().map(|c| c.effective_minor).sum(),
    };
    BankBalanceView {
        bank,
        calculated_minor,
        effective_minor,
        children,
        children_total_minor: balances.children_total_minor,
        total_minor: balances.total_minor(),
    }
}

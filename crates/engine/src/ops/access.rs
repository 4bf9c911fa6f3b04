use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, TransactionKind, balance, piggy_banks, transactions, users,
};

use super::Engine;

impl Engine {
    async fn find_bank_by_id(
        &self,
        db: &DatabaseTransaction,
        bank_id: Uuid,
    ) -> ResultEngine<Option<piggy_banks::Model>> {
        piggy_banks::Entity::find_by_id(bank_id.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Loads a bank owned by `user_id`.
    ///
    /// A bank belonging to another user yields the same `NotFound` as a
    /// missing one, so ownership is never leaked.
    pub(super) async fn require_bank_owned(
        &self,
        db: &DatabaseTransaction,
        bank_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<piggy_banks::Model> {
        let model = self
            .find_bank_by_id(db, bank_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("piggy bank not exists".to_string()))?;
        if model.user_id != user_id {
            return Err(EngineError::NotFound("piggy bank not exists".to_string()));
        }
        Ok(model)
    }

    pub(super) async fn require_default_bank(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<piggy_banks::Model> {
        piggy_banks::Entity::find()
            .filter(piggy_banks::Column::UserId.eq(user_id.to_string()))
            .filter(piggy_banks::Column::IsDefault.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::Precondition("no default piggy bank".to_string()))
    }

    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<()> {
        let exists = users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::NotFound("user not exists".to_string()));
        }
        Ok(())
    }

    /// Transaction-derived balance of a bank (sum of signed amounts).
    pub(super) async fn calculated_balance_of(
        &self,
        db: &DatabaseTransaction,
        bank_id: &str,
    ) -> ResultEngine<i64> {
        let rows = transactions::Entity::find()
            .filter(transactions::Column::PiggyBankId.eq(bank_id.to_string()))
            .all(db)
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push((TransactionKind::try_from(row.kind.as_str())?, row.amount_minor));
        }
        Ok(balance::calculated_balance(entries))
    }

    /// Effective balance of a bank model (stored wins on divergence).
    pub(super) async fn effective_balance_of(
        &self,
        db: &DatabaseTransaction,
        bank: &piggy_banks::Model,
    ) -> ResultEngine<i64> {
        let calculated = self.calculated_balance_of(db, &bank.id).await?;
        Ok(balance::effective_balance(
            bank.current_balance_minor,
            calculated,
        ))
    }
}

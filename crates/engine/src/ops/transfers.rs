use chrono::Utc;

use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};

use crate::{
    EngineError, MoneyCents, ResultEngine, TransactionKind, TransferCmd, WithdrawCmd, piggy_banks,
};

use super::{Engine, with_tx};

impl Engine {
    /// Move money between two piggy banks of the same user.
    ///
    /// Atomic: both balance updates and both audit transactions commit
    /// together or not at all, so the sum of balances is conserved. Every
    /// validation runs before the first mutation.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<()> {
        if cmd.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if cmd.from_bank_id == cmd.to_bank_id {
            return Err(EngineError::Validation(
                "cannot transfer to the same piggy bank".to_string(),
            ));
        }
        let occurred_at = Utc::now();

        with_tx!(self, |db_tx| {
            let source = self
                .require_bank_owned(&db_tx, cmd.from_bank_id, &cmd.user_id)
                .await?;
            let source_balance = self.effective_balance_of(&db_tx, &source).await?;
            if source_balance < cmd.amount_minor {
                return Err(EngineError::Precondition(
                    "insufficient balance in source piggy bank".to_string(),
                ));
            }
            let dest = self
                .require_bank_owned(&db_tx, cmd.to_bank_id, &cmd.user_id)
                .await?;

            set_stored_balance(
                &db_tx,
                &source.id,
                source.current_balance_minor - cmd.amount_minor,
            )
            .await?;
            set_stored_balance(
                &db_tx,
                &dest.id,
                dest.current_balance_minor + cmd.amount_minor,
            )
            .await?;

            let amount = MoneyCents::new(cmd.amount_minor);
            self.insert_system_transaction(
                &db_tx,
                &cmd.user_id,
                cmd.from_bank_id,
                TransactionKind::Expense,
                cmd.amount_minor,
                &format!("Transfer: {amount} to {}", dest.name),
                occurred_at,
            )
            .await?;
            self.insert_system_transaction(
                &db_tx,
                &cmd.user_id,
                cmd.to_bank_id,
                TransactionKind::Income,
                cmd.amount_minor,
                &format!("Transfer: {amount} from {}", source.name),
                occurred_at,
            )
            .await?;

            tracing::debug!(
                user_id = %cmd.user_id,
                from = %cmd.from_bank_id,
                to = %cmd.to_bank_id,
                amount_minor = cmd.amount_minor,
                "transfer completed"
            );
            Ok(())
        })
    }

    /// Take money out of a piggy bank.
    ///
    /// Audited as a single system expense transaction noted "Withdrawal".
    pub async fn withdraw(&self, cmd: WithdrawCmd) -> ResultEngine<()> {
        if cmd.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        let occurred_at = Utc::now();

        with_tx!(self, |db_tx| {
            let bank = self
                .require_bank_owned(&db_tx, cmd.bank_id, &cmd.user_id)
                .await?;
            let bank_balance = self.effective_balance_of(&db_tx, &bank).await?;
            if bank_balance < cmd.amount_minor {
                return Err(EngineError::Precondition(
                    "insufficient balance in source piggy bank".to_string(),
                ));
            }

            set_stored_balance(
                &db_tx,
                &bank.id,
                bank.current_balance_minor - cmd.amount_minor,
            )
            .await?;

            self.insert_system_transaction(
                &db_tx,
                &cmd.user_id,
                cmd.bank_id,
                TransactionKind::Expense,
                cmd.amount_minor,
                "Withdrawal",
                occurred_at,
            )
            .await?;

            tracing::debug!(
                user_id = %cmd.user_id,
                bank_id = %cmd.bank_id,
                amount_minor = cmd.amount_minor,
                "withdrawal completed"
            );
            Ok(())
        })
    }
}

pub(super) async fn set_stored_balance(
    db: &DatabaseTransaction,
    bank_id: &str,
    new_balance_minor: i64,
) -> ResultEngine<()> {
    let active = piggy_banks::ActiveModel {
        id: ActiveValue::Set(bank_id.to_string()),
        current_balance_minor: ActiveValue::Set(new_balance_minor),
        ..Default::default()
    };
    active.update(db).await?;
    Ok(())
}

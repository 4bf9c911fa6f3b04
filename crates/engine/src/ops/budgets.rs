use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use sea_orm::{DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    BudgetRecord, BudgetsReport, PeriodBudget, PeriodType, ResultEngine, SourceKind,
    TransactionKind, balance, budgets, period, piggy_banks, transactions,
};

use super::{Engine, with_tx};

/// User activity on the default bank within one period window.
struct PeriodActivity {
    /// Non-excluded expenses (magnitudes).
    spent_minor: i64,
    /// Net signed movement of all user transactions.
    net_minor: i64,
}

impl Engine {
    /// Compute the budget report for a user's default piggy bank.
    ///
    /// All three periods are derived from `now` (UTC calendar dates):
    /// - daily/weekly allowances prorate the current effective balance over
    ///   the days/weeks left in the month,
    /// - the monthly budget is the period's initial budget minus what was
    ///   spent.
    ///
    /// `initial_budget` prefers a frozen snapshot for the period key; without
    /// one it reconstructs the period-start balance by subtracting the
    /// period's net user activity from the current balance.
    pub async fn calculate_budgets(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<BudgetsReport> {
        with_tx!(self, |db_tx| {
            let bank = self.require_default_bank(&db_tx, user_id).await?;
            let balance_minor = self.effective_balance_of(&db_tx, &bank).await?;
            let today = now.date_naive();

            let daily = self
                .period_budget(&db_tx, user_id, &bank.id, balance_minor, PeriodType::Day, today)
                .await?;
            let weekly = self
                .period_budget(
                    &db_tx,
                    user_id,
                    &bank.id,
                    balance_minor,
                    PeriodType::Week,
                    today,
                )
                .await?;
            let monthly = self
                .period_budget(
                    &db_tx,
                    user_id,
                    &bank.id,
                    balance_minor,
                    PeriodType::Month,
                    today,
                )
                .await?;

            Ok(BudgetsReport {
                monthly,
                weekly,
                daily,
            })
        })
    }

    /// Persist a budget snapshot for a period, or return the existing one.
    ///
    /// Records are immutable: a second call for the same `(user, period_type,
    /// period_start)` leaves the stored value untouched.
    pub async fn create_budget_record(
        &self,
        user_id: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
        initial_budget_minor: i64,
    ) -> ResultEngine<BudgetRecord> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            let existing = self
                .find_budget_record(&db_tx, user_id, period_type, period_start)
                .await?;
            let record = match existing {
                Some(model) => BudgetRecord::try_from(model)?,
                None => {
                    let record = BudgetRecord::new(
                        user_id.to_string(),
                        period_type,
                        period_start,
                        initial_budget_minor,
                    );
                    budgets::ActiveModel::from(&record).insert(&db_tx).await?;
                    record
                }
            };
            Ok(record)
        })
    }

    /// Freeze day/week/month snapshots that are still missing for the
    /// periods containing `at`.
    ///
    /// Called before an expense lands on the default bank, so the snapshots
    /// capture the pre-expense balance.
    pub(super) async fn ensure_budget_snapshots(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        bank: &piggy_banks::Model,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let balance_minor = self.effective_balance_of(db, bank).await?;
        let today = at.date_naive();

        for period_type in [PeriodType::Day, PeriodType::Week, PeriodType::Month] {
            let start = period::period_start(period_type, today);
            if self
                .find_budget_record(db, user_id, period_type, start)
                .await?
                .is_some()
            {
                continue;
            }
            let end = period::next_period_start(period_type, start);
            let activity = self.period_activity(db, &bank.id, start, end).await?;
            let initial =
                period_initial_budget(period_type, balance_minor, activity.net_minor, today);
            let record = BudgetRecord::new(user_id.to_string(), period_type, start, initial);
            budgets::ActiveModel::from(&record).insert(db).await?;
            tracing::debug!(
                user_id = %user_id,
                period = period_type.as_str(),
                period_start = %start,
                initial_budget_minor = initial,
                "froze budget snapshot"
            );
        }
        Ok(())
    }

    async fn period_budget(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        bank_id: &str,
        balance_minor: i64,
        period_type: PeriodType,
        today: NaiveDate,
    ) -> ResultEngine<PeriodBudget> {
        let start = period::period_start(period_type, today);
        let end = period::next_period_start(period_type, start);
        let activity = self.period_activity(db, bank_id, start, end).await?;

        let initial_budget_minor = match self
            .find_budget_record(db, user_id, period_type, start)
            .await?
        {
            Some(record) => record.initial_budget_minor,
            None => period_initial_budget(period_type, balance_minor, activity.net_minor, today),
        };

        let available_minor = match period_type {
            PeriodType::Day => balance_minor / period::days_remaining_in_month(today),
            PeriodType::Week => balance_minor / period::weeks_remaining_in_month(today),
            PeriodType::Month => initial_budget_minor - activity.spent_minor,
        };

        Ok(PeriodBudget {
            period_type,
            period_start: start,
            available_minor,
            spent_minor: activity.spent_minor,
            initial_budget_minor,
        })
    }

    async fn find_budget_record(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> ResultEngine<Option<budgets::Model>> {
        budgets::Entity::find()
            .filter(budgets::Column::UserId.eq(user_id.to_string()))
            .filter(budgets::Column::PeriodType.eq(period_type.as_str()))
            .filter(budgets::Column::PeriodStart.eq(period_start))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// User transactions on the bank in `[start, end)`, summed two ways.
    ///
    /// System transactions never count: transfers and adjustments are
    /// bookkeeping, not spending.
    async fn period_activity(
        &self,
        db: &DatabaseTransaction,
        bank_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEngine<PeriodActivity> {
        let (from, to) = window_utc(start, end);
        let rows = transactions::Entity::find()
            .filter(transactions::Column::PiggyBankId.eq(bank_id.to_string()))
            .filter(transactions::Column::Source.eq(SourceKind::User.as_str()))
            .filter(transactions::Column::OccurredAt.gte(from))
            .filter(transactions::Column::OccurredAt.lt(to))
            .all(db)
            .await?;

        let mut spent_minor = 0i64;
        let mut net_minor = 0i64;
        for row in rows {
            let kind = TransactionKind::try_from(row.kind.as_str())?;
            net_minor += balance::signed_amount(kind, row.amount_minor);
            if kind == TransactionKind::Expense && !row.exclude_from_daily_spent {
                spent_minor += row.amount_minor;
            }
        }
        Ok(PeriodActivity {
            spent_minor,
            net_minor,
        })
    }
}

/// Budget a period started with, reconstructed from the current balance.
///
/// `start_balance = balance - net` undoes the period's own user activity;
/// daily/weekly budgets prorate it, the monthly budget is the balance itself.
/// Integer division truncates toward zero.
fn period_initial_budget(
    period_type: PeriodType,
    balance_minor: i64,
    net_minor: i64,
    today: NaiveDate,
) -> i64 {
    let start_balance = balance_minor - net_minor;
    match period_type {
        PeriodType::Day => start_balance / period::days_remaining_in_month(today),
        PeriodType::Week => start_balance / period::weeks_remaining_in_month(today),
        PeriodType::Month => start_balance,
    }
}

fn window_utc(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        start.and_time(NaiveTime::MIN).and_utc(),
        end.and_time(NaiveTime::MIN).and_utc(),
    )
}

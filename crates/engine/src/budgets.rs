//! Budget snapshots and report types.
//!
//! A `BudgetRecord` freezes the budget a period started with. Records are
//! written lazily (on the first qualifying expense of a period) and never
//! revised afterwards, so mid-period balance changes cannot rewrite history.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Day,
    Week,
    Month,
}

impl PeriodType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl TryFrom<&str> for PeriodType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(EngineError::Validation(format!(
                "invalid period type: {other}"
            ))),
        }
    }
}

/// A persisted budget snapshot, unique per `(user, period_type, period_start)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub id: Uuid,
    pub user_id: String,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub initial_budget_minor: i64,
}

impl BudgetRecord {
    pub fn new(
        user_id: String,
        period_type: PeriodType,
        period_start: NaiveDate,
        initial_budget_minor: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            period_type,
            period_start,
            initial_budget_minor,
        }
    }
}

/// Budget figures for one period, all in minor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBudget {
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    /// What can still be spent in this period.
    pub available_minor: i64,
    /// Non-excluded user expenses in the period so far.
    pub spent_minor: i64,
    /// The budget the period started with (snapshot or reconstruction).
    pub initial_budget_minor: i64,
}

/// The full budget report for a user's default piggy bank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetsReport {
    pub monthly: PeriodBudget,
    pub weekly: PeriodBudget,
    pub daily: PeriodBudget,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub period_type: String,
    pub period_start: Date,
    pub initial_budget_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BudgetRecord> for ActiveModel {
    fn from(record: &BudgetRecord) -> Self {
        Self {
            id: ActiveValue::Set(record.id.to_string()),
            user_id: ActiveValue::Set(record.user_id.clone()),
            period_type: ActiveValue::Set(record.period_type.as_str().to_string()),
            period_start: ActiveValue::Set(record.period_start),
            initial_budget_minor: ActiveValue::Set(record.initial_budget_minor),
        }
    }
}

impl TryFrom<Model> for BudgetRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "budget")?,
            user_id: model.user_id,
            period_type: PeriodType::try_from(model.period_type.as_str())?,
            period_start: model.period_start,
            initial_budget_minor: model.initial_budget_minor,
        })
    }
}

//! The module contains the `PiggyBank` struct and its entity mapping.

use chrono::NaiveDate;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

/// A piggy bank.
///
/// A piggy bank is a named pot of money owned by one user. Banks form an
/// optional one-level hierarchy: a parent may have children, but a child may
/// not have children of its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiggyBank {
    /// Stable identifier, generated once and persisted so the bank can be
    /// renamed without breaking references.
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    /// Denormalized balance cache in minor units. The transaction log is the
    /// ground truth; see [`crate::effective_balance`].
    pub current_balance_minor: i64,
    pub goal_minor: Option<i64>,
    pub goal_due_date: Option<NaiveDate>,
    pub is_default: bool,
    pub parent_id: Option<Uuid>,
}

impl PiggyBank {
    pub fn new(user_id: String, name: String, current_balance_minor: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            current_balance_minor,
            goal_minor: None,
            goal_due_date: None,
            is_default: false,
            parent_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "piggy_banks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub current_balance_minor: i64,
    pub goal_minor: Option<i64>,
    pub goal_due_date: Option<Date>,
    pub is_default: bool,
    pub parent_id: Option<String>,
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
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PiggyBank> for ActiveModel {
    fn from(bank: &PiggyBank) -> Self {
        Self {
            id: ActiveValue::Set(bank.id.to_string()),
            user_id: ActiveValue::Set(bank.user_id.clone()),
            name: ActiveValue::Set(bank.name.clone()),
            current_balance_minor: ActiveValue::Set(bank.current_balance_minor),
            goal_minor: ActiveValue::Set(bank.goal_minor),
            goal_due_date: ActiveValue::Set(bank.goal_due_date),
            is_default: ActiveValue::Set(bank.is_default),
            parent_id: ActiveValue::Set(bank.parent_id.map(|id| id.to_string())),
        }
    }
}

impl TryFrom<Model> for PiggyBank {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "piggy bank")?,
            user_id: model.user_id,
            name: model.name,
            current_balance_minor: model.current_balance_minor,
            goal_minor: model.goal_minor,
            goal_due_date: model.goal_due_date,
            is_default: model.is_default,
            parent_id: model
                .parent_id
                .as_deref()
                .map(|id| parse_uuid(id, "piggy bank"))
                .transpose()?,
        })
    }
}

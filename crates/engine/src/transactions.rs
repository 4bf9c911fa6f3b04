//! Transaction primitives.
//!
//! A `Transaction` records a single balance change against a piggy bank.
//! `amount_minor` is always a magnitude; the sign comes from the kind (see
//! [`crate::signed_amount`]). System transactions are the audit trail the
//! engine writes for transfers, withdrawals, opening deposits and balance
//! adjustments; they are excluded from daily-spent accounting.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// Who originated a transaction.
///
/// An explicit column, not a magic category value, so user rows can never be
/// confused with engine-written audit rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    User,
    System,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl TryFrom<&str> for SourceKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            other => Err(EngineError::Validation(format!(
                "invalid transaction source: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub piggy_bank_id: Option<Uuid>,
    pub kind: TransactionKind,
    /// Magnitude in minor units, always > 0.
    pub amount_minor: i64,
    pub occurred_at: DateTime<Utc>,
    pub category: Option<String>,
    pub note: Option<String>,
    pub source: SourceKind,
    pub exclude_from_daily_spent: bool,
}

impl Transaction {
    pub fn new(
        user_id: String,
        piggy_bank_id: Option<Uuid>,
        kind: TransactionKind,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
        source: SourceKind,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            piggy_bank_id,
            kind,
            amount_minor,
            occurred_at,
            category: None,
            note: None,
            source,
            // System rows are bookkeeping and never count as spending.
            exclude_from_daily_spent: matches!(source, SourceKind::System),
        })
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn exclude_from_daily_spent(mut self, exclude: bool) -> Self {
        self.exclude_from_daily_spent = exclude;
        self
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub piggy_bank_id: Option<String>,
    pub kind: String,
    pub amount_minor: i64,
    pub occurred_at: DateTimeUtc,
    pub category: Option<String>,
    pub note: Option<String>,
    pub source: String,
    pub exclude_from_daily_spent: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::piggy_banks::Entity",
        from = "Column::PiggyBankId",
        to = "super::piggy_banks::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    PiggyBanks,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::piggy_banks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PiggyBanks.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            piggy_bank_id: ActiveValue::Set(tx.piggy_bank_id.map(|id| id.to_string())),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            category: ActiveValue::Set(tx.category.clone()),
            note: ActiveValue::Set(tx.note.clone()),
            source: ActiveValue::Set(tx.source.as_str().to_string()),
            exclude_from_daily_spent: ActiveValue::Set(tx.exclude_from_daily_spent),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            user_id: model.user_id,
            piggy_bank_id: model
                .piggy_bank_id
                .as_deref()
                .map(|id| parse_uuid(id, "piggy bank"))
                .transpose()?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            occurred_at: model.occurred_at,
            category: model.category,
            note: model.note,
            source: SourceKind::try_from(model.source.as_str())?,
            exclude_from_daily_spent: model.exclude_from_daily_spent,
        })
    }
}

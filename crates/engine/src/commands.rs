//! Command structs for engine operations.
//!
//! These types group parameters for write operations (bank create/update,
//! transfer/withdraw, transaction create/update), keeping call sites readable
//! and avoiding long argument lists.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::TransactionKind;

/// Create a piggy bank.
#[derive(Clone, Debug)]
pub struct CreateBankCmd {
    pub user_id: String,
    pub name: String,
    /// Opening balance, persisted as a system income transaction when > 0.
    pub initial_balance_minor: i64,
    pub goal_minor: Option<i64>,
    pub goal_due_date: Option<NaiveDate>,
    pub is_default: bool,
    pub parent_id: Option<Uuid>,
}

impl CreateBankCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            initial_balance_minor: 0,
            goal_minor: None,
            goal_due_date: None,
            is_default: false,
            parent_id: None,
        }
    }

    #[must_use]
    pub fn initial_balance_minor(mut self, balance_minor: i64) -> Self {
        self.initial_balance_minor = balance_minor;
        self
    }

    #[must_use]
    pub fn goal_minor(mut self, goal_minor: i64) -> Self {
        self.goal_minor = Some(goal_minor);
        self
    }

    #[must_use]
    pub fn goal_due_date(mut self, due_date: NaiveDate) -> Self {
        self.goal_due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn is_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    #[must_use]
    pub fn parent_id(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Update a piggy bank (patch semantics: unset fields are left untouched).
///
/// Double-`Option` fields distinguish "leave as is" (`None`) from "set to
/// NULL" (`Some(None)`).
#[derive(Clone, Debug)]
pub struct UpdateBankCmd {
    pub user_id: String,
    pub bank_id: Uuid,

    pub name: Option<String>,
    /// A new stored balance; a change is audited as a system adjustment.
    pub current_balance_minor: Option<i64>,
    pub goal_minor: Option<Option<i64>>,
    pub goal_due_date: Option<Option<NaiveDate>>,
    pub is_default: Option<bool>,
    pub parent_id: Option<Option<Uuid>>,
}

impl UpdateBankCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, bank_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            bank_id,
            name: None,
            current_balance_minor: None,
            goal_minor: None,
            goal_due_date: None,
            is_default: None,
            parent_id: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn current_balance_minor(mut self, balance_minor: i64) -> Self {
        self.current_balance_minor = Some(balance_minor);
        self
    }

    #[must_use]
    pub fn goal_minor(mut self, goal_minor: i64) -> Self {
        self.goal_minor = Some(Some(goal_minor));
        self
    }

    #[must_use]
    pub fn clear_goal(mut self) -> Self {
        self.goal_minor = Some(None);
        self
    }

    #[must_use]
    pub fn goal_due_date(mut self, due_date: NaiveDate) -> Self {
        self.goal_due_date = Some(Some(due_date));
        self
    }

    #[must_use]
    pub fn clear_goal_due_date(mut self) -> Self {
        self.goal_due_date = Some(None);
        self
    }

    #[must_use]
    pub fn is_default(mut self, is_default: bool) -> Self {
        self.is_default = Some(is_default);
        self
    }

    #[must_use]
    pub fn parent_id(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(Some(parent_id));
        self
    }

    #[must_use]
    pub fn clear_parent(mut self) -> Self {
        self.parent_id = Some(None);
        self
    }
}

/// Move money between two piggy banks of the same user.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub user_id: String,
    pub from_bank_id: Uuid,
    pub to_bank_id: Uuid,
    pub amount_minor: i64,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        from_bank_id: Uuid,
        to_bank_id: Uuid,
        amount_minor: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            from_bank_id,
            to_bank_id,
            amount_minor,
        }
    }
}

/// Take money out of a piggy bank.
#[derive(Clone, Debug)]
pub struct WithdrawCmd {
    pub user_id: String,
    pub bank_id: Uuid,
    pub amount_minor: i64,
}

impl WithdrawCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, bank_id: Uuid, amount_minor: i64) -> Self {
        Self {
            user_id: user_id.into(),
            bank_id,
            amount_minor,
        }
    }
}

/// Create a user-entered transaction.
#[derive(Clone, Debug)]
pub struct NewTransactionCmd {
    pub user_id: String,
    pub piggy_bank_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub occurred_at: DateTime<Utc>,
    pub category: Option<String>,
    pub note: Option<String>,
    pub exclude_from_daily_spent: bool,
}

impl NewTransactionCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        kind: TransactionKind,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            piggy_bank_id: None,
            kind,
            amount_minor,
            occurred_at,
            category: None,
            note: None,
            exclude_from_daily_spent: false,
        }
    }

    #[must_use]
    pub fn piggy_bank_id(mut self, bank_id: Uuid) -> Self {
        self.piggy_bank_id = Some(bank_id);
        self
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

/// Update an existing user transaction.
#[derive(Clone, Debug)]
pub struct UpdateTransactionCmd {
    pub user_id: String,
    pub transaction_id: Uuid,

    pub amount_minor: Option<i64>,
    pub kind: Option<TransactionKind>,
    /// Retargeting: `Some(None)` detaches the transaction from its bank.
    pub piggy_bank_id: Option<Option<Uuid>>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub note: Option<String>,
}

impl UpdateTransactionCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, transaction_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_id,
            amount_minor: None,
            kind: None,
            piggy_bank_id: None,
            occurred_at: None,
            category: None,
            note: None,
        }
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn piggy_bank_id(mut self, bank_id: Uuid) -> Self {
        self.piggy_bank_id = Some(Some(bank_id));
        self
    }

    #[must_use]
    pub fn detach_piggy_bank(mut self) -> Self {
        self.piggy_bank_id = Some(None);
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
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
}

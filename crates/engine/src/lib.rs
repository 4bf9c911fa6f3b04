//! Budget and balance engine for a piggy-bank style personal finance tracker.
//!
//! The engine owns every balance-changing operation: user transactions,
//! transfers between piggy banks, withdrawals and manual balance adjustments.
//! Compound writes run inside a single database transaction, so callers
//! (route handlers, CLIs) never observe partial state.
//!
//! Balances are double-tracked: each piggy bank carries a denormalized
//! `current_balance` and the engine recomputes the transaction-derived
//! balance on every read. When the two diverge the stored value wins; see
//! [`effective_balance`].

mod balance;
mod budgets;
mod commands;
mod error;
mod money;
mod ops;
pub mod period;
mod piggy_banks;
mod transactions;
mod users;
mod util;

pub use balance::{BankBalances, calculated_balance, effective_balance, signed_amount};
pub use budgets::{BudgetRecord, BudgetsReport, PeriodBudget, PeriodType};
pub use commands::{
    CreateBankCmd, NewTransactionCmd, TransferCmd, UpdateBankCmd, UpdateTransactionCmd,
    WithdrawCmd,
};
pub use error::EngineError;
pub use money::MoneyCents;
pub use ops::{BankBalanceView, ChildBalance, Engine, EngineBuilder, TransactionListFilter};
pub use piggy_banks::PiggyBank;
pub use transactions::{SourceKind, Transaction, TransactionKind};

pub type ResultEngine<T> = Result<T, EngineError>;

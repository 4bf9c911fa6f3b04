//! Balance reconciliation.
//!
//! Each piggy bank stores a denormalized `current_balance` while its
//! transactions remain the ground truth. These helpers compute the
//! transaction-derived balance and decide which value a read should report.

use crate::TransactionKind;

/// Signed contribution of a transaction to a balance: positive for income,
/// negative for expense. `amount_minor` is a magnitude (> 0).
pub fn signed_amount(kind: TransactionKind, amount_minor: i64) -> i64 {
    match kind {
        TransactionKind::Income => amount_minor,
        TransactionKind::Expense => -amount_minor,
    }
}

/// Sum of signed amounts over a bank's transactions.
pub fn calculated_balance<I>(entries: I) -> i64
where
    I: IntoIterator<Item = (TransactionKind, i64)>,
{
    entries
        .into_iter()
        .map(|(kind, amount_minor)| signed_amount(kind, amount_minor))
        .sum()
}

/// Reconciles the stored balance with the transaction-derived one.
///
/// The stored value wins whenever it diverges: a manual override is an
/// intentional correction and must not be silently recomputed away.
pub fn effective_balance(stored_minor: i64, calculated_minor: i64) -> i64 {
    if stored_minor != calculated_minor {
        stored_minor
    } else {
        calculated_minor
    }
}

/// Balance aggregates for a parent piggy bank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BankBalances {
    /// Effective balance of the bank itself.
    pub own_minor: i64,
    /// Sum of the children's effective balances.
    pub children_total_minor: i64,
}

impl BankBalances {
    /// Own balance plus the children's total.
    #[must_use]
    pub fn total_minor(self) -> i64 {
        self.own_minor + self.children_total_minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_amounts() {
        assert_eq!(signed_amount(TransactionKind::Income, 500), 500);
        assert_eq!(signed_amount(TransactionKind::Expense, 500), -500);
    }

    #[test]
    fn calculated_balance_sums_signed() {
        let entries = [
            (TransactionKind::Income, 1000),
            (TransactionKind::Expense, 300),
            (TransactionKind::Income, 50),
        ];
        assert_eq!(calculated_balance(entries), 750);
        assert_eq!(calculated_balance([]), 0);
    }

    #[test]
    fn stored_wins_on_divergence() {
        // Agreement: either value works.
        assert_eq!(effective_balance(750, 750), 750);
        // Divergence (manual override): the stored value is reported.
        assert_eq!(effective_balance(900, 750), 900);
        assert_eq!(effective_balance(0, 750), 0);
    }

    #[test]
    fn parent_totals() {
        let balances = BankBalances {
            own_minor: 10_000,
            children_total_minor: 12_500,
        };
        assert_eq!(balances.total_minor(), 22_500);
    }
}

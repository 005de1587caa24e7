use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::schemas::{Expense, Member, UserId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub paid: Decimal,
    pub owed: Decimal,
    pub net: Decimal,
}

impl Balance {
    pub fn is_settled(&self) -> bool {
        self.net.is_zero()
    }
}

/// Balances keyed by user id. Ordered so that everything derived from it
/// (settlement suggestions in particular) is deterministic.
pub type BalanceSheet = BTreeMap<UserId, Balance>;

/// Paid, owed and net amounts for every currently active member.
///
/// Payments and splits of members that are no longer active are ignored, so
/// the sheet reflects the pool as it is now rather than its history.
pub fn compute_balances(members: &[Member], expenses: &[Expense]) -> BalanceSheet {
    let mut sheet: BalanceSheet = members
        .iter()
        .filter(|member| member.is_active)
        .map(|member| (member.user_id.clone(), Balance::default()))
        .collect();

    for expense in expenses {
        if let Some(balance) = sheet.get_mut(&expense.paid_by) {
            balance.paid += expense.amount;
        }
        for split in &expense.splits {
            if let Some(balance) = sheet.get_mut(&split.user_id) {
                balance.owed += split.amount;
            }
        }
    }

    for balance in sheet.values_mut() {
        balance.net = balance.paid - balance.owed;
    }
    tracing::debug!(
        members = sheet.len(),
        expenses = expenses.len(),
        "computed pool balances"
    );
    sheet
}

/// Sum of all net balances; zero for a consistent pool.
pub fn net_total(sheet: &BalanceSheet) -> Decimal {
    sheet.values().map(|b| b.net).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{new_id, ExpenseSplit, SplitMethod};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn member(user: &str, active: bool) -> Member {
        Member {
            user_id: user.to_string(),
            pool_id: "trip".to_string(),
            email: None,
            upi_id: None,
            is_active: active,
            is_admin: false,
            joined_at: Utc::now(),
        }
    }

    fn expense(paid_by: &str, amount: Decimal, splits: &[(&str, Decimal)]) -> Expense {
        let now = Utc::now();
        Expense {
            id: new_id(),
            pool_id: "trip".to_string(),
            title: "dinner".to_string(),
            description: String::new(),
            amount,
            paid_by: paid_by.to_string(),
            created_by: paid_by.to_string(),
            split_method: SplitMethod::Manual,
            expense_date: now,
            created_at: now,
            updated_at: now,
            splits: splits
                .iter()
                .map(|(user, amount)| ExpenseSplit {
                    user_id: user.to_string(),
                    amount: *amount,
                    percentage: None,
                })
                .collect(),
        }
    }

    #[test]
    fn three_way_dinner() {
        let members = vec![member("a", true), member("b", true), member("c", true)];
        let expenses = vec![expense(
            "a",
            dec!(300.00),
            &[("a", dec!(100)), ("b", dec!(100)), ("c", dec!(100))],
        )];

        let sheet = compute_balances(&members, &expenses);

        assert_eq!(
            sheet["a"],
            Balance {
                paid: dec!(300),
                owed: dec!(100),
                net: dec!(200)
            }
        );
        assert_eq!(sheet["b"].net, dec!(-100));
        assert_eq!(sheet["c"].net, dec!(-100));
        assert_eq!(net_total(&sheet), Decimal::ZERO);
    }

    #[test]
    fn members_without_activity_are_zero() {
        let sheet = compute_balances(&[member("a", true)], &[]);
        assert_eq!(sheet["a"], Balance::default());
        assert!(sheet["a"].is_settled());
    }

    #[test]
    fn inactive_members_are_excluded() {
        let members = vec![member("a", true), member("b", false)];
        let expenses = vec![expense("b", dec!(50), &[("a", dec!(25)), ("b", dec!(25))])];

        let sheet = compute_balances(&members, &expenses);

        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet["a"].paid, Decimal::ZERO);
        assert_eq!(sheet["a"].owed, dec!(25));
    }

    #[test]
    fn order_of_expenses_does_not_matter() {
        let members = vec![member("a", true), member("b", true)];
        let mut expenses = vec![
            expense("a", dec!(10.10), &[("a", dec!(5.05)), ("b", dec!(5.05))]),
            expense("b", dec!(3.33), &[("a", dec!(3.33))]),
            expense("a", dec!(0.01), &[("b", dec!(0.01))]),
        ];
        let forward = compute_balances(&members, &expenses);
        expenses.reverse();
        assert_eq!(forward, compute_balances(&members, &expenses));
    }
}

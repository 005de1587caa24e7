use rust_decimal::Decimal;
use serde::Serialize;

use crate::balance::BalanceSheet;
use crate::error::{Error, Result};
use crate::money::TOLERANCE;
use crate::schemas::UserId;

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: UserId,
    remaining: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub from_user: UserId,
    pub to_user: UserId,
    pub amount: Decimal,
}

/// Greedy matching of debtors against creditors.
///
/// Debtors and creditors are visited in ascending user id order. Every debtor
/// pays creditors in turn until the debt is gone, each payment being the
/// smaller of what is still owed and what is still due. This keeps the
/// number of transfers low but is not guaranteed to be minimal.
///
/// Totals that disagree by more than [`TOLERANCE`] mean the balances are
/// corrupt and no exchange is produced.
pub fn suggest_settlements(balances: &BalanceSheet) -> Result<Vec<Exchange>> {
    // Divide people into debtors and creditors
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();
    for (id, balance) in balances {
        let person = PersonalBalance {
            id: id.clone(),
            remaining: balance.net.abs(),
        };
        if balance.net < Decimal::ZERO {
            debtors.push(person);
        } else if balance.net > Decimal::ZERO {
            creditors.push(person);
        }
    }

    let total_debt: Decimal = debtors.iter().map(|p| p.remaining).sum();
    let total_credit: Decimal = creditors.iter().map(|p| p.remaining).sum();
    let residue = (total_credit - total_debt).abs();
    if residue > TOLERANCE {
        tracing::error!(%total_debt, %total_credit, "pool balances do not net to zero");
        return Err(Error::DataIntegrity(format!(
            "debts of {total_debt} do not match credits of {total_credit}"
        )));
    }

    let mut exchanges = Vec::new();
    let mut creditor_index = 0;
    for debtor in debtors.iter_mut() {
        while debtor.remaining > Decimal::ZERO && creditor_index < creditors.len() {
            let creditor = &mut creditors[creditor_index];
            let amount = debtor.remaining.min(creditor.remaining);
            exchanges.push(Exchange {
                from_user: debtor.id.clone(),
                to_user: creditor.id.clone(),
                amount,
            });
            debtor.remaining -= amount;
            creditor.remaining -= amount;
            if creditor.remaining.is_zero() {
                creditor_index += 1;
            }
        }
    }

    if !residue.is_zero() {
        tracing::warn!(%residue, "dropping rounding residue left after settlement");
    }
    Ok(exchanges)
}

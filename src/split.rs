//! Allocation of an expense amount over pool members.
//!
//! Every strategy returns splits sorted by user id whose amounts add up to the
//! expense amount exactly. Caller supplied figures may be off by up to
//! [`TOLERANCE`](crate::money::TOLERANCE); the difference lands on the first
//! share.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::money::{percentage_of, round_to_2_decimals, within_tolerance, CENT};
use crate::schemas::{ExpenseSplit, Member, SplitMethod, UserId};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Share {
    pub user_id: UserId,
    pub value: Decimal,
}

/// How to divide an expense. Percentage and manual splits carry the
/// caller's per-member figures.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "method", content = "shares", rename_all = "snake_case")]
pub enum SplitRequest {
    #[default]
    Equal,
    Percentage(Vec<Share>),
    Manual(Vec<Share>),
}

impl SplitRequest {
    pub fn method(&self) -> SplitMethod {
        match self {
            SplitRequest::Equal => SplitMethod::Equal,
            SplitRequest::Percentage(_) => SplitMethod::Percentage,
            SplitRequest::Manual(_) => SplitMethod::Manual,
        }
    }
}

pub fn allocate_splits(
    amount: Decimal,
    request: &SplitRequest,
    active_members: &[Member],
) -> Result<Vec<ExpenseSplit>> {
    let eligible: BTreeSet<&str> = active_members
        .iter()
        .filter(|m| m.is_active)
        .map(|m| m.user_id.as_str())
        .collect();

    match request {
        SplitRequest::Equal => split_equally(amount, &eligible),
        SplitRequest::Percentage(shares) => {
            let shares = collect_shares(shares, &eligible)?;
            split_by_percentage(amount, &shares)
        }
        SplitRequest::Manual(shares) => {
            let shares = collect_shares(shares, &eligible)?;
            split_manually(amount, &shares)
        }
    }
}

/// Remainder cents go one each to the first members in user id order, so
/// 100.00 over three members becomes 33.34, 33.33, 33.33.
fn split_equally(amount: Decimal, members: &BTreeSet<&str>) -> Result<Vec<ExpenseSplit>> {
    if members.is_empty() {
        return Err(Error::Validation(
            "cannot split an expense in a pool without active members".to_string(),
        ));
    }
    let count = Decimal::from(members.len());
    let base = (amount / count).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let extra_cents = ((amount - base * count) / CENT)
        .to_usize()
        .ok_or_else(|| Error::Validation(format!("cannot split {amount} in cents")))?;

    Ok(members
        .iter()
        .enumerate()
        .map(|(index, user_id)| {
            let share = if index < extra_cents { base + CENT } else { base };
            ExpenseSplit {
                user_id: user_id.to_string(),
                amount: share,
                percentage: Some(percentage_of(share, amount)),
            }
        })
        .collect())
}

fn split_by_percentage(
    amount: Decimal,
    shares: &BTreeMap<UserId, Decimal>,
) -> Result<Vec<ExpenseSplit>> {
    if let Some((user, pct)) = shares
        .iter()
        .find(|(_, pct)| **pct > Decimal::ONE_HUNDRED)
    {
        return Err(Error::Validation(format!(
            "percentage {pct} for {user} is above 100"
        )));
    }
    let total_pct: Decimal = shares.values().sum();
    if !within_tolerance(total_pct, Decimal::ONE_HUNDRED) {
        return Err(Error::Validation(format!(
            "percentages add up to {total_pct}, expected 100"
        )));
    }

    let mut splits: Vec<ExpenseSplit> = shares
        .iter()
        .map(|(user_id, pct)| ExpenseSplit {
            user_id: user_id.clone(),
            amount: round_to_2_decimals(amount * *pct / Decimal::ONE_HUNDRED),
            percentage: Some(round_to_2_decimals(*pct)),
        })
        .collect();

    // Rounding each share can leave a few cents over or under.
    absorb_residue(amount, &mut splits);
    ensure_total(amount, &splits)?;
    Ok(splits)
}

/// Shares within [`TOLERANCE`](crate::money::TOLERANCE) of the amount are
/// accepted; the stored splits still add up to the amount exactly.
fn split_manually(amount: Decimal, shares: &BTreeMap<UserId, Decimal>) -> Result<Vec<ExpenseSplit>> {
    let mut splits: Vec<ExpenseSplit> = shares
        .iter()
        .map(|(user_id, share)| ExpenseSplit {
            user_id: user_id.clone(),
            amount: *share,
            percentage: None,
        })
        .collect();
    ensure_total(amount, &splits)?;
    absorb_residue(amount, &mut splits);
    for split in &mut splits {
        split.percentage = Some(percentage_of(split.amount, amount));
    }
    Ok(splits)
}

/// Moves whatever the splits miss (or exceed) onto the first share, in user
/// id order, that stays non-negative.
fn absorb_residue(amount: Decimal, splits: &mut [ExpenseSplit]) {
    let allocated: Decimal = splits.iter().map(|s| s.amount).sum();
    let residue = amount - allocated;
    if residue.is_zero() {
        return;
    }
    if let Some(first) = splits.iter_mut().find(|s| s.amount + residue >= Decimal::ZERO) {
        first.amount += residue;
    }
}

fn collect_shares(shares: &[Share], eligible: &BTreeSet<&str>) -> Result<BTreeMap<UserId, Decimal>> {
    if shares.is_empty() {
        return Err(Error::Validation("no splits provided".to_string()));
    }
    let mut collected = BTreeMap::new();
    for share in shares {
        if !eligible.contains(share.user_id.as_str()) {
            return Err(Error::Validation(format!(
                "{} is not an active member of this pool",
                share.user_id
            )));
        }
        if share.value < Decimal::ZERO {
            return Err(Error::Validation(format!(
                "share for {} must not be negative",
                share.user_id
            )));
        }
        if share.value.normalize().scale() > 2 {
            return Err(Error::Validation(format!(
                "share for {} has more than two decimal places",
                share.user_id
            )));
        }
        if collected.insert(share.user_id.clone(), share.value).is_some() {
            return Err(Error::Validation(format!(
                "{} appears more than once",
                share.user_id
            )));
        }
    }
    Ok(collected)
}

fn ensure_total(amount: Decimal, splits: &[ExpenseSplit]) -> Result<()> {
    let total: Decimal = splits.iter().map(|s| s.amount).sum();
    if within_tolerance(total, amount) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "split amounts add up to {total}, expected {amount}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn members(ids: &[&str]) -> Vec<Member> {
        ids.iter()
            .map(|id| Member {
                user_id: id.to_string(),
                pool_id: "flat".to_string(),
                email: None,
                upi_id: None,
                is_active: true,
                is_admin: false,
                joined_at: Utc::now(),
            })
            .collect()
    }

    fn share(user: &str, value: Decimal) -> Share {
        Share {
            user_id: user.to_string(),
            value,
        }
    }

    fn amounts(splits: &[ExpenseSplit]) -> Vec<Decimal> {
        splits.iter().map(|s| s.amount).collect()
    }

    #[test]
    fn equal_split_without_remainder() {
        let splits =
            allocate_splits(dec!(300.00), &SplitRequest::Equal, &members(&["a", "b", "c"])).unwrap();
        assert_eq!(amounts(&splits), vec![dec!(100), dec!(100), dec!(100)]);
        assert_eq!(splits[0].percentage, Some(dec!(33.33)));
    }

    #[test]
    fn equal_split_gives_remainder_cents_to_first_members() {
        let splits =
            allocate_splits(dec!(100.00), &SplitRequest::Equal, &members(&["c", "a", "b"])).unwrap();
        assert_eq!(
            splits.iter().map(|s| s.user_id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(amounts(&splits), vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
        assert_eq!(splits.iter().map(|s| s.amount).sum::<Decimal>(), dec!(100.00));
    }

    #[test]
    fn equal_split_of_a_single_cent() {
        let splits =
            allocate_splits(dec!(0.01), &SplitRequest::Equal, &members(&["a", "b"])).unwrap();
        assert_eq!(amounts(&splits), vec![dec!(0.01), dec!(0.00)]);
    }

    #[test]
    fn equal_split_skips_inactive_and_needs_someone() {
        let mut pool = members(&["a", "b"]);
        pool[1].is_active = false;
        let splits = allocate_splits(dec!(10), &SplitRequest::Equal, &pool).unwrap();
        assert_eq!(splits.len(), 1);

        pool[0].is_active = false;
        assert!(matches!(
            allocate_splits(dec!(10), &SplitRequest::Equal, &pool),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn percentage_split_absorbs_rounding() {
        let request = SplitRequest::Percentage(vec![
            share("a", dec!(33.33)),
            share("b", dec!(33.33)),
            share("c", dec!(33.34)),
        ]);
        let splits = allocate_splits(dec!(10.00), &request, &members(&["a", "b", "c"])).unwrap();
        assert_eq!(splits.iter().map(|s| s.amount).sum::<Decimal>(), dec!(10.00));
        assert_eq!(splits[2].percentage, Some(dec!(33.34)));
    }

    #[test]
    fn percentage_split_must_cover_everything() {
        let request = SplitRequest::Percentage(vec![share("a", dec!(50)), share("b", dec!(40))]);
        assert!(matches!(
            allocate_splits(dec!(10), &request, &members(&["a", "b"])),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn manual_split_within_tolerance_is_accepted() {
        let request = SplitRequest::Manual(vec![share("a", dec!(33.33)), share("b", dec!(66.66))]);
        let splits = allocate_splits(dec!(100.00), &request, &members(&["a", "b"])).unwrap();
        assert_eq!(splits[0].amount, dec!(33.34));
        assert_eq!(splits[0].percentage, Some(dec!(33.34)));
        assert_eq!(splits[1].percentage, Some(dec!(66.66)));
        assert_eq!(splits.iter().map(|s| s.amount).sum::<Decimal>(), dec!(100.00));
    }

    #[test]
    fn manual_split_rejects_mismatched_total() {
        let request = SplitRequest::Manual(vec![share("a", dec!(40)), share("b", dec!(50))]);
        assert!(matches!(
            allocate_splits(dec!(100), &request, &members(&["a", "b"])),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn rejects_strangers_duplicates_and_negative_shares() {
        let pool = members(&["a", "b"]);
        let stranger = SplitRequest::Manual(vec![share("a", dec!(5)), share("z", dec!(5))]);
        let duplicate = SplitRequest::Manual(vec![share("a", dec!(5)), share("a", dec!(5))]);
        let negative = SplitRequest::Manual(vec![share("a", dec!(15)), share("b", dec!(-5))]);
        for request in [stranger, duplicate, negative, SplitRequest::Manual(vec![])] {
            assert!(matches!(
                allocate_splits(dec!(10), &request, &pool),
                Err(Error::Validation(_))
            ));
        }
    }

    #[test]
    fn request_reports_its_method() {
        assert_eq!(SplitRequest::Equal.method(), SplitMethod::Equal);
        assert_eq!(SplitRequest::Manual(vec![]).method(), SplitMethod::Manual);
        assert_eq!(
            SplitRequest::Percentage(vec![]).method(),
            SplitMethod::Percentage
        );
    }
}

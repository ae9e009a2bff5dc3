//! Position accounting formulas
//!
//! Everything here is a pure function over a slice of NFTs, recomputed on
//! every read:
//!
//! ```text
//! Weighted LTV  = Σ(floor × ltv) / Σ floor
//! Max borrow    = Σ floor × weighted LTV / 100
//! Health factor = max borrow / debt
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use yify_common::{
    Epoch, Nft, CAUTION_FACTOR, HEALTHY_FACTOR, LENDER_SHARE, ORIGINATION_FEE_RATE,
    PROTOCOL_SHARE, REPAYMENT_SHARE,
};

const HUNDRED: Decimal = dec!(100);

/// Sum of floor prices
pub fn total_collateral_value<'a>(nfts: impl IntoIterator<Item = &'a Nft>) -> Decimal {
    nfts.into_iter().map(|nft| nft.floor_price).sum()
}

/// Collateral-weighted average LTV (%), zero for an empty set
pub fn weighted_ltv(nfts: &[&Nft]) -> Decimal {
    let total = total_collateral_value(nfts.iter().copied());
    if total <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let weighted: Decimal = nfts.iter().map(|nft| nft.floor_price * nft.ltv).sum();
    weighted / total
}

/// Borrowing capacity of a collateral set
pub fn max_borrow(nfts: &[&Nft]) -> Decimal {
    nfts.iter().map(|nft| nft.max_borrow()).sum()
}

/// Remaining capacity after existing debt
pub fn available_to_borrow(max_borrow: Decimal, borrowed: Decimal) -> Decimal {
    (max_borrow - borrowed).max(Decimal::ZERO)
}

/// One-time fee on a borrow
#[inline]
pub fn origination_fee(amount: Decimal) -> Decimal {
    amount * ORIGINATION_FEE_RATE
}

/// Mean APR across the set, zero for an empty set
pub fn average_yield(nfts: &[&Nft]) -> Decimal {
    if nfts.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = nfts.iter().map(|nft| nft.current_yield).sum();
    sum / Decimal::from(nfts.len())
}

/// Projected yield of the set over one year at current floor prices
pub fn annual_yield(nfts: &[&Nft]) -> Decimal {
    nfts.iter()
        .map(|nft| nft.floor_price * nft.current_yield / HUNDRED)
        .sum()
}

/// Ratio of borrowing capacity to debt; `None` without debt
pub fn health_factor(max_borrow: Decimal, borrowed: Decimal) -> Option<Decimal> {
    if borrowed <= Decimal::ZERO {
        return None;
    }
    Some(max_borrow / borrowed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Healthy,
    Caution,
    AtRisk,
}

impl HealthBand {
    /// Band for an optional health factor; no debt is healthy
    pub fn classify(factor: Option<Decimal>) -> Self {
        match factor {
            None => HealthBand::Healthy,
            Some(f) if f >= HEALTHY_FACTOR => HealthBand::Healthy,
            Some(f) if f >= CAUTION_FACTOR => HealthBand::Caution,
            Some(_) => HealthBand::AtRisk,
        }
    }
}

/// Collateral value needed to keep `borrowed` within the weighted LTV
pub fn min_collateral_required(borrowed: Decimal, weighted_ltv: Decimal) -> Decimal {
    if borrowed <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if weighted_ltv <= Decimal::ZERO {
        return Decimal::MAX;
    }
    borrowed / (weighted_ltv / HUNDRED)
}

/// Collateral value that could leave without breaching the LTV
pub fn max_collateral_withdraw(total: Decimal, min_required: Decimal) -> Decimal {
    (total - min_required).max(Decimal::ZERO)
}

/// Outcome of removing one NFT from a collateral set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalCheck {
    pub allowed: bool,
    pub remaining_value: Decimal,
    pub max_borrow_after: Decimal,
}

/// Whether `nft_id` can leave `deposited` while `debt` is outstanding.
///
/// The remaining set must be worth more than the debt and its own capacity
/// must still cover it.
pub fn withdrawal_check(deposited: &[&Nft], nft_id: &str, debt: Decimal) -> WithdrawalCheck {
    let remaining: Vec<&Nft> = deposited
        .iter()
        .copied()
        .filter(|nft| nft.id != nft_id)
        .collect();
    let remaining_value = total_collateral_value(remaining.iter().copied());
    let max_borrow_after = max_borrow(&remaining);

    let allowed = debt <= Decimal::ZERO || (remaining_value > debt && max_borrow_after >= debt);

    WithdrawalCheck {
        allowed,
        remaining_value,
        max_borrow_after,
    }
}

/// Split of one epoch's yield
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldSplit {
    pub gross: Decimal,
    pub repayment: Decimal,
    pub lender_share: Decimal,
    pub protocol_share: Decimal,
}

impl YieldSplit {
    /// 75% repayment, 20% lenders, 5% protocol
    pub fn of(gross: Decimal) -> Self {
        let repayment = gross * REPAYMENT_SHARE;
        let lender_share = gross * LENDER_SHARE;
        let protocol_share = gross * PROTOCOL_SHARE;
        Self {
            gross,
            repayment,
            lender_share,
            protocol_share,
        }
    }
}

/// Yield of a single NFT for an epoch, zero if the NFT is on another cadence
pub fn epoch_yield(nft: &Nft, epoch: Epoch) -> Decimal {
    if nft.kind.epoch() != epoch {
        return Decimal::ZERO;
    }
    nft.epoch_yield(epoch)
}

/// Term-loan quote for borrowing against a single NFT
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanQuote {
    pub loan_amount: Decimal,
    pub weekly_yield: Decimal,
    pub weekly_repayment: Decimal,
    pub weeks_to_repay: u32,
    pub total_yield: Decimal,
}

/// Weeks of yield-funded repayment needed for `loan_amount`; `None` when the
/// NFT yields nothing
pub fn loan_quote(nft: &Nft, loan_amount: Decimal) -> Option<LoanQuote> {
    let weekly_yield = nft.epoch_yield(Epoch::Weekly);
    let weekly_repayment = weekly_yield * REPAYMENT_SHARE;
    if weekly_repayment <= Decimal::ZERO {
        return None;
    }

    let weeks_to_repay = (loan_amount.max(Decimal::ZERO) / weekly_repayment)
        .ceil()
        .to_u32()?;

    Some(LoanQuote {
        loan_amount,
        weekly_yield,
        weekly_repayment,
        weeks_to_repay,
        total_yield: weekly_yield * Decimal::from(weeks_to_repay),
    })
}

/// Months until `debt` is repaid from 75% of `annual_yield`; `None` when no
/// yield flows
pub fn estimated_payoff_months(debt: Decimal, annual_yield: Decimal) -> Option<u32> {
    if debt <= Decimal::ZERO {
        return Some(0);
    }
    let monthly = annual_yield * REPAYMENT_SHARE / dec!(12);
    if monthly <= Decimal::ZERO {
        return None;
    }
    (debt / monthly).ceil().to_u32()
}

#[cfg(test)]
mod tests {
    use super::*;
    use yify_common::types::nft::seed_catalog;

    fn refs(nfts: &[Nft]) -> Vec<&Nft> {
        nfts.iter().collect()
    }

    #[test]
    fn test_weighted_ltv() {
        let catalog = seed_catalog();
        let set = refs(&catalog[..2]);

        // (5000 * 37.5 + 3000 * 31.25) / 8000 = 281250 / 8000
        assert_eq!(weighted_ltv(&set), dec!(35.15625));
        assert_eq!(max_borrow(&set), dec!(2812.5));
    }

    #[test]
    fn test_max_borrow_matches_weighted_ltv() {
        let catalog = seed_catalog();
        let set = refs(&catalog);
        let total = total_collateral_value(set.iter().copied());

        let derived = total * weighted_ltv(&set) / HUNDRED;
        assert!((max_borrow(&set) - derived).abs() < dec!(0.000001));
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(weighted_ltv(&[]), Decimal::ZERO);
        assert_eq!(max_borrow(&[]), Decimal::ZERO);
        assert_eq!(average_yield(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_origination_fee() {
        assert_eq!(origination_fee(dec!(1000)), dec!(5));
        assert_eq!(origination_fee(dec!(1875)), dec!(9.375));
    }

    #[test]
    fn test_available_to_borrow_floors_at_zero() {
        assert_eq!(available_to_borrow(dec!(1000), dec!(400)), dec!(600));
        assert_eq!(available_to_borrow(dec!(1000), dec!(1400)), Decimal::ZERO);
    }

    #[test]
    fn test_health_bands() {
        assert_eq!(health_factor(dec!(1000), Decimal::ZERO), None);
        assert_eq!(HealthBand::classify(None), HealthBand::Healthy);
        assert_eq!(HealthBand::classify(health_factor(dec!(2000), dec!(1000))), HealthBand::Healthy);
        assert_eq!(HealthBand::classify(health_factor(dec!(1600), dec!(1000))), HealthBand::Caution);
        assert_eq!(HealthBand::classify(health_factor(dec!(1000), dec!(1000))), HealthBand::AtRisk);
    }

    #[test]
    fn test_collateral_headroom() {
        // 1000 borrowed at 25% LTV needs 4000 of collateral
        let min = min_collateral_required(dec!(1000), dec!(25));
        assert_eq!(min, dec!(4000));
        assert_eq!(max_collateral_withdraw(dec!(10000), min), dec!(6000));
        assert_eq!(max_collateral_withdraw(dec!(3000), min), Decimal::ZERO);
    }

    #[test]
    fn test_withdrawal_check() {
        let catalog = seed_catalog();
        let set = refs(&catalog[..3]);

        // No debt: anything can leave
        assert!(withdrawal_check(&set, "nft-3", Decimal::ZERO).allowed);

        // Without nft-3 the set can borrow 1875 + 937.5
        let check = withdrawal_check(&set, "nft-3", dec!(2000));
        assert!(check.allowed);
        assert_eq!(check.remaining_value, dec!(8000));
        assert_eq!(check.max_borrow_after, dec!(2812.5));

        assert!(!withdrawal_check(&set, "nft-3", dec!(3000)).allowed);
    }

    #[test]
    fn test_yield_split() {
        let split = YieldSplit::of(dec!(100));
        assert_eq!(split.repayment, dec!(75));
        assert_eq!(split.lender_share, dec!(20));
        assert_eq!(split.protocol_share, dec!(5));
        assert_eq!(split.repayment + split.lender_share + split.protocol_share, split.gross);
    }

    #[test]
    fn test_epoch_yield_respects_cadence() {
        let catalog = seed_catalog();
        assert_eq!(epoch_yield(&catalog[2], Epoch::Weekly), Decimal::ZERO);
        assert_eq!(epoch_yield(&catalog[2], Epoch::Monthly), dec!(125));
    }

    #[test]
    fn test_loan_quote() {
        let catalog = seed_catalog();
        // RWA: 10000 * 15% / 52 weekly, 75% of it repays
        let quote = loan_quote(&catalog[2], dec!(937)).unwrap();
        assert_eq!(quote.weeks_to_repay, 44);
        assert!(quote.total_yield > quote.loan_amount);
    }

    #[test]
    fn test_estimated_payoff() {
        // 1200 annual yield repays 75 a month
        assert_eq!(estimated_payoff_months(dec!(750), dec!(1200)), Some(10));
        assert_eq!(estimated_payoff_months(dec!(751), dec!(1200)), Some(11));
        assert_eq!(estimated_payoff_months(Decimal::ZERO, Decimal::ZERO), Some(0));
        assert_eq!(estimated_payoff_months(dec!(10), Decimal::ZERO), None);
    }
}

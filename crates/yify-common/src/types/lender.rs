//! USDC lender positions
//!
//! Lenders deposit USDC into a single pool and are paid from the 20% of
//! borrower collateral yield that is shared with the pool.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::LENDER_WITHDRAWAL_FEE_RATE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LenderPosition {
    pub id: String,

    /// Principal currently in the pool, including reinvested yield
    pub deposit_amount: Decimal,

    /// Distributions held outside the deposit, withdrawable with it
    pub yield_earned: Decimal,

    /// Advertised APR, %
    pub apr: Decimal,

    /// Whether distributions compound into the deposit
    pub auto_reinvest: bool,

    pub deposit_date: chrono::DateTime<chrono::Utc>,
}

impl LenderPosition {
    pub fn new(deposit_amount: Decimal, apr: Decimal) -> Self {
        Self {
            id: format!("lend-{}", uuid::Uuid::now_v7()),
            deposit_amount,
            yield_earned: Decimal::ZERO,
            apr,
            auto_reinvest: true,
            deposit_date: chrono::Utc::now(),
        }
    }

    /// Credit a yield distribution according to the reinvest flag
    pub fn credit_yield(&mut self, amount: Decimal) {
        if self.auto_reinvest {
            self.deposit_amount += amount;
        } else {
            self.yield_earned += amount;
        }
    }

    /// Everything the lender can withdraw
    pub fn available(&self) -> Decimal {
        self.deposit_amount + self.yield_earned
    }

    /// Take `amount` out of the position, unclaimed yield first.
    ///
    /// Callers check `amount` against [`available`](Self::available).
    pub fn draw(&mut self, amount: Decimal) {
        let from_yield = amount.min(self.yield_earned);
        self.yield_earned -= from_yield;
        self.deposit_amount = (self.deposit_amount - (amount - from_yield)).max(Decimal::ZERO);
    }
}

/// Breakdown of a lender withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub gross: Decimal,
    pub fee: Decimal,
    pub net: Decimal,
}

impl WithdrawalReceipt {
    pub fn for_amount(gross: Decimal) -> Self {
        let fee = gross * LENDER_WITHDRAWAL_FEE_RATE;
        Self {
            gross,
            fee,
            net: gross - fee,
        }
    }
}

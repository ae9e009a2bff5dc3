//! USDC lending pool
//!
//! Lender deposits are paid from the share of borrower yield passed to the
//! pool each epoch, split pro-rata by deposit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use yify_common::{LenderPosition, LendingError, WithdrawalReceipt, DEFAULT_LENDER_APR};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LenderBook {
    positions: Vec<LenderPosition>,
    apr: Decimal,
}

impl Default for LenderBook {
    fn default() -> Self {
        Self::new(DEFAULT_LENDER_APR)
    }
}

impl LenderBook {
    pub fn new(apr: Decimal) -> Self {
        Self {
            positions: Vec::new(),
            apr,
        }
    }

    pub fn positions(&self) -> &[LenderPosition] {
        &self.positions
    }

    pub fn get(&self, id: &str) -> Option<&LenderPosition> {
        self.positions.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut LenderPosition, LendingError> {
        self.positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| LendingError::NotFound(id.to_string()))
    }

    pub fn total_deposited(&self) -> Decimal {
        self.positions.iter().map(|p| p.deposit_amount).sum()
    }

    pub fn total_yield_earned(&self) -> Decimal {
        self.positions.iter().map(|p| p.yield_earned).sum()
    }

    /// Open a new lender position; returns its id
    pub fn deposit(&mut self, amount: Decimal) -> Result<String, LendingError> {
        if amount <= Decimal::ZERO {
            return Err(LendingError::InvalidAmount);
        }
        let position = LenderPosition::new(amount, self.apr);
        let id = position.id.clone();
        info!(position = %id, %amount, "Lender deposit");
        self.positions.push(position);
        Ok(id)
    }

    /// Withdraw from a position's deposit plus unclaimed yield, charging the
    /// withdrawal fee.
    ///
    /// A position drained to zero is removed.
    pub fn withdraw(&mut self, id: &str, amount: Decimal) -> Result<WithdrawalReceipt, LendingError> {
        if amount <= Decimal::ZERO {
            return Err(LendingError::InvalidAmount);
        }

        let position = self.get_mut(id)?;
        let available = position.available();
        if amount > available {
            return Err(LendingError::ExceedsBalance {
                requested: amount,
                available,
            });
        }

        position.draw(amount);
        let drained = position.available() <= Decimal::ZERO;
        if drained {
            self.positions.retain(|p| p.id != id);
        }

        let receipt = WithdrawalReceipt::for_amount(amount);
        info!(position = %id, gross = %receipt.gross, net = %receipt.net, drained, "Lender withdrawal");
        Ok(receipt)
    }

    /// Flip auto-reinvest; returns the new setting
    pub fn toggle_auto_reinvest(&mut self, id: &str) -> Result<bool, LendingError> {
        let position = self.get_mut(id)?;
        position.auto_reinvest = !position.auto_reinvest;
        Ok(position.auto_reinvest)
    }

    /// Split `amount` across positions pro-rata by deposit; returns the amount
    /// actually distributed (zero with an empty pool)
    pub fn distribute(&mut self, amount: Decimal) -> Decimal {
        let total = self.total_deposited();
        if amount <= Decimal::ZERO || total <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let mut distributed = Decimal::ZERO;
        for position in self.positions.iter_mut() {
            let share = amount * position.deposit_amount / total;
            position.credit_yield(share);
            distributed += share;
        }
        debug!(%distributed, lenders = self.positions.len(), "Lender yield distributed");
        distributed
    }

    pub fn restore(&mut self, positions: Vec<LenderPosition>) {
        self.positions = positions;
    }
}

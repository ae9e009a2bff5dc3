//! Position ledger
//!
//! Holds isolated (`pos-*`) positions, one per deposited NFT, alongside the
//! pooled (`borrow-*`) position that carries debt against every deposited NFT.
//! At most one pooled position is active at a time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use yify_common::{Nft, Position, PositionError, PositionKind, PositionStatus};

use crate::accounting;
use crate::registry::NftRegistry;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionLedger {
    positions: Vec<Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Position] {
        &self.positions
    }

    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Position, PositionError> {
        self.positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PositionError::NotFound(id.to_string()))
    }

    pub fn active(&self) -> Vec<&Position> {
        self.positions.iter().filter(|p| p.is_active()).collect()
    }

    /// The active pooled position, if any
    pub fn active_pooled(&self) -> Option<&Position> {
        self.positions.iter().find(|p| p.is_active() && p.is_pooled())
    }

    /// Outstanding debt across active pooled positions
    pub fn total_borrowed(&self) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.is_active() && p.is_pooled())
            .map(|p| p.borrowed_amount)
            .sum()
    }

    /// Open an isolated position over a single NFT
    pub fn create_isolated(&mut self, nft: &Nft) -> String {
        let position = Position::open(
            PositionKind::Isolated,
            vec![nft.id.clone()],
            nft.floor_price,
        );
        let id = position.id.clone();
        debug!(position = %id, nft = %nft.id, "Isolated position opened");
        self.positions.push(position);
        id
    }

    /// Borrow against all deposited collateral.
    ///
    /// Opens a pooled position on first borrow, otherwise tops up the active
    /// one. Returns the pooled position id and the fee charged.
    pub fn borrow_additional(
        &mut self,
        amount: Decimal,
        collateral: &[&Nft],
    ) -> Result<(String, Decimal), PositionError> {
        if amount <= Decimal::ZERO {
            return Err(PositionError::InvalidAmount);
        }

        let max_borrow = accounting::max_borrow(collateral);
        let current = self.total_borrowed();
        let available = accounting::available_to_borrow(max_borrow, current);
        if amount > available {
            return Err(PositionError::BorrowLimitExceeded {
                requested: amount,
                available,
            });
        }

        let fee = accounting::origination_fee(amount);
        let collateral_ids: Vec<String> = collateral.iter().map(|nft| nft.id.clone()).collect();
        let collateral_value = accounting::total_collateral_value(collateral.iter().copied());

        let existing = self
            .positions
            .iter_mut()
            .find(|p| p.is_active() && p.is_pooled());

        let id = match existing {
            Some(position) => {
                position.collateral_nft_ids = collateral_ids;
                position.total_collateral_value = collateral_value;
                position.draw(amount, fee);
                position.id.clone()
            }
            None => {
                let mut position =
                    Position::open(PositionKind::Pooled, collateral_ids, collateral_value);
                position.draw(amount, fee);
                let id = position.id.clone();
                self.positions.push(position);
                id
            }
        };

        info!(position = %id, %amount, %fee, "Borrowed against pooled collateral");
        Ok((id, fee))
    }

    /// Apply a repayment; returns the amount applied (capped at the debt)
    pub fn repay(&mut self, position_id: &str, amount: Decimal) -> Result<Decimal, PositionError> {
        if amount <= Decimal::ZERO {
            return Err(PositionError::InvalidAmount);
        }

        let position = self.get_mut(position_id)?;
        if !position.is_active() {
            return Err(PositionError::Closed(position_id.to_string()));
        }

        let applied = position.pay_down(amount);
        debug!(position = %position_id, %applied, remaining = %position.borrowed_amount, "Repayment applied");
        Ok(applied)
    }

    /// Close a position with no outstanding debt
    pub fn close(&mut self, position_id: &str) -> Result<(), PositionError> {
        let position = self.get_mut(position_id)?;
        if position.status == PositionStatus::Closed {
            return Err(PositionError::Closed(position_id.to_string()));
        }
        if position.borrowed_amount > Decimal::ZERO {
            return Err(PositionError::OutstandingDebt {
                id: position_id.to_string(),
                debt: position.borrowed_amount,
            });
        }

        position.close();
        info!(position = %position_id, "Position closed");
        Ok(())
    }

    /// Add a newly deposited NFT to a pooled position's collateral
    pub fn attach_collateral(&mut self, position_id: &str, nft: &Nft) -> Result<(), PositionError> {
        let position = self.get_mut(position_id)?;
        if !position.is_active() {
            return Err(PositionError::Closed(position_id.to_string()));
        }
        if !position.collateral_nft_ids.contains(&nft.id) {
            position.collateral_nft_ids.push(nft.id.clone());
            position.total_collateral_value += nft.floor_price;
            position.touch();
        }
        Ok(())
    }

    /// Remove an NFT from the active pooled position's collateral
    pub fn detach_collateral(&mut self, nft: &Nft) {
        for position in self
            .positions
            .iter_mut()
            .filter(|p| p.is_active() && p.is_pooled())
        {
            let before = position.collateral_nft_ids.len();
            position.collateral_nft_ids.retain(|id| *id != nft.id);
            if position.collateral_nft_ids.len() != before {
                position.total_collateral_value =
                    (position.total_collateral_value - nft.floor_price).max(Decimal::ZERO);
                position.touch();
            }
        }
    }

    /// Credit yield to a position
    pub fn record_yield(
        &mut self,
        position_id: &str,
        gross: Decimal,
        shared: Decimal,
    ) -> Result<(), PositionError> {
        let position = self.get_mut(position_id)?;
        position.yield_earned += gross;
        position.yield_shared += shared;
        position.touch();
        Ok(())
    }

    /// Re-derive collateral values of active positions from current floor prices
    pub fn refresh_collateral(&mut self, registry: &NftRegistry) {
        for position in self.positions.iter_mut().filter(|p| p.is_active()) {
            let nfts = registry.by_ids(&position.collateral_nft_ids);
            position.total_collateral_value =
                accounting::total_collateral_value(nfts.iter().copied());
        }
    }

    /// Replace the ledger contents, used when restoring a snapshot
    pub fn restore(&mut self, positions: Vec<Position>) {
        self.positions = positions;
    }
}

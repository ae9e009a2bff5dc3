//! Loan positions
//!
//! Two shapes share one record:
//! - isolated (`pos-*`): one NFT, created on deposit, never carries debt
//! - pooled (`borrow-*`): all deposited NFTs as shared collateral, carries the loan
//!
//! There is no ongoing interest; a borrow pays a one-time origination fee and
//! the debt is paid down by collateral yield or manual repayment.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Id prefix of isolated positions
pub const ISOLATED_PREFIX: &str = "pos-";

/// Id prefix of pooled borrow positions
pub const POOLED_PREFIX: &str = "borrow-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    Isolated,
    Pooled,
}

impl PositionKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            PositionKind::Isolated => ISOLATED_PREFIX,
            PositionKind::Pooled => POOLED_PREFIX,
        }
    }

    /// Recover the shape from an id prefix
    pub fn from_id(id: &str) -> Option<Self> {
        if id.starts_with(ISOLATED_PREFIX) {
            Some(PositionKind::Isolated)
        } else if id.starts_with(POOLED_PREFIX) {
            Some(PositionKind::Pooled)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,

    /// NFTs backing this position
    pub collateral_nft_ids: Vec<String>,

    /// Floor value of the collateral at last refresh
    pub total_collateral_value: Decimal,

    /// Outstanding debt (USDC)
    pub borrowed_amount: Decimal,

    /// Accumulated one-time fees
    pub origination_fee: Decimal,

    pub status: PositionStatus,

    /// Gross yield attributed to this position
    pub yield_earned: Decimal,

    /// Portion of the yield passed on to lenders
    pub yield_shared: Decimal,

    /// Cumulative principal ever drawn
    pub total_borrowed: Decimal,

    /// Cumulative principal repaid, manually or from yield
    pub total_repaid: Decimal,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Position {
    /// Open a position of the given shape with a fresh id
    pub fn open(kind: PositionKind, collateral_nft_ids: Vec<String>, collateral_value: Decimal) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: format!("{}{}", kind.prefix(), uuid::Uuid::now_v7()),
            collateral_nft_ids,
            total_collateral_value: collateral_value,
            borrowed_amount: Decimal::ZERO,
            origination_fee: Decimal::ZERO,
            status: PositionStatus::Active,
            yield_earned: Decimal::ZERO,
            yield_shared: Decimal::ZERO,
            total_borrowed: Decimal::ZERO,
            total_repaid: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Shape derived from the id prefix
    pub fn kind(&self) -> Option<PositionKind> {
        PositionKind::from_id(&self.id)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    #[inline]
    pub fn is_pooled(&self) -> bool {
        self.kind() == Some(PositionKind::Pooled)
    }

    /// Draw additional principal and charge its fee
    pub fn draw(&mut self, amount: Decimal, fee: Decimal) {
        self.borrowed_amount += amount;
        self.total_borrowed += amount;
        self.origination_fee += fee;
        self.touch();
    }

    /// Pay down debt, returning the amount actually applied
    pub fn pay_down(&mut self, amount: Decimal) -> Decimal {
        let applied = amount.min(self.borrowed_amount).max(Decimal::ZERO);
        self.borrowed_amount -= applied;
        self.total_repaid += applied;
        self.touch();
        applied
    }

    /// Share of all principal drawn that has been repaid, 0-100
    pub fn repayment_progress(&self) -> Decimal {
        if self.total_borrowed <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let progress = self.total_repaid / self.total_borrowed * dec!(100);
        progress.min(dec!(100)).max(Decimal::ZERO)
    }

    pub fn close(&mut self) {
        self.status = PositionStatus::Closed;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

//! # YIFY Common
//!
//! Shared types, errors, and protocol constants for the YIFY lending simulator.
//!
//! ## Core Types
//!
//! - [`Nft`]: veNFT / RWA collateral with floor price, yield and LTV
//! - [`Position`]: isolated (`pos-*`) or pooled (`borrow-*`) loan position
//! - [`Transaction`]: append-only mock transaction record
//! - [`Wallet`]: mock USDC wallet balance
//! - [`LenderPosition`]: USDC deposit in the lending pool

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{CollateralError, LendingError, PositionError, Result, YifyError};
pub use types::{
    lender::{LenderPosition, WithdrawalReceipt},
    nft::{Epoch, Network, Nft, NftKind},
    position::{Position, PositionKind, PositionStatus},
    transaction::{Transaction, TransactionDraft, TransactionKind, TransactionStatus},
    wallet::{Wallet, WalletError, WalletSession},
};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// YIFY version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stablecoin every loan is denominated in
pub const STABLE_TOKEN: &str = "USDC";

/// One-time origination fee charged on each borrow (0.5%)
pub const ORIGINATION_FEE_RATE: Decimal = dec!(0.005);

/// LTV ceiling for any single NFT (%)
pub const MAX_NFT_LTV: Decimal = dec!(50);

/// Weeks of yield a loan is sized against
pub const REPAYMENT_HORIZON_WEEKS: u32 = 65;

/// Share of epoch yield applied to outstanding debt
pub const REPAYMENT_SHARE: Decimal = dec!(0.75);

/// Share of epoch yield distributed to USDC lenders
pub const LENDER_SHARE: Decimal = dec!(0.20);

/// Share of epoch yield retained by the protocol
pub const PROTOCOL_SHARE: Decimal = dec!(0.05);

/// Fee deducted from lender withdrawals (1%)
pub const LENDER_WITHDRAWAL_FEE_RATE: Decimal = dec!(0.01);

/// Default APR paid to lenders (%)
pub const DEFAULT_LENDER_APR: Decimal = dec!(8.5);

/// Gas recorded on a mock repayment
pub const REPAY_GAS_USED: u64 = 120_000;

/// Health factor at or above which a position is healthy
pub const HEALTHY_FACTOR: Decimal = dec!(2.0);

/// Health factor at or above which a position needs attention
pub const CAUTION_FACTOR: Decimal = dec!(1.5);

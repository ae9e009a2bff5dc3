//! Error types for YIFY
//!
//! Provides a unified error type and domain-specific error variants

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using YifyError
pub type Result<T> = std::result::Result<T, YifyError>;

/// Unified error type for YIFY operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum YifyError {
    // Wallet errors
    #[error("Wallet error: {0}")]
    Wallet(#[from] crate::types::wallet::WalletError),

    // Collateral errors
    #[error("Collateral error: {0}")]
    Collateral(#[from] CollateralError),

    // Position errors
    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    // Lending pool errors
    #[error("Lending error: {0}")]
    Lending(#[from] LendingError),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// NFT collateral errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CollateralError {
    #[error("NFT not found: {0}")]
    NotFound(String),

    #[error("NFT already deposited: {0}")]
    AlreadyDeposited(String),

    #[error("NFT not deposited: {0}")]
    NotDeposited(String),

    #[error("No collateral deposited")]
    NoCollateral,

    #[error("No NFTs selected")]
    EmptySelection,

    #[error("NFT selected more than once: {0}")]
    DuplicateSelection(String),

    #[error("Withdrawing {nft_id} would leave {remaining} of collateral against {debt} of debt")]
    WithdrawalWouldUndercollateralize {
        nft_id: String,
        remaining: Decimal,
        debt: Decimal,
    },
}

/// Loan position errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PositionError {
    #[error("Position not found: {0}")]
    NotFound(String),

    #[error("Position already closed: {0}")]
    Closed(String),

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Borrow amount {requested} exceeds available limit {available}")]
    BorrowLimitExceeded {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Position {id} still owes {debt}")]
    OutstandingDebt { id: String, debt: Decimal },

    #[error("No active position with debt")]
    NoDebt,
}

/// Lending pool errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LendingError {
    #[error("Lender position not found: {0}")]
    NotFound(String),

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Withdrawal {requested} exceeds position balance {available}")]
    ExceedsBalance {
        requested: Decimal,
        available: Decimal,
    },
}

// Implement From for common external error types
impl From<serde_json::Error> for YifyError {
    fn from(err: serde_json::Error) -> Self {
        YifyError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for YifyError {
    fn from(err: std::io::Error) -> Self {
        YifyError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for YifyError {
    fn from(err: anyhow::Error) -> Self {
        YifyError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = YifyError::Collateral(CollateralError::NotFound("nft-9".to_string()));
        assert!(err.to_string().contains("nft-9"));
    }

    #[test]
    fn test_borrow_limit_error() {
        let err = PositionError::BorrowLimitExceeded {
            requested: dec!(5000),
            available: dec!(1875),
        };
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("1875"));
    }
}

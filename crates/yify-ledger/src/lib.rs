//! # YIFY Ledger
//!
//! In-memory lending engine for the YIFY simulator: NFT collateral,
//! pooled borrowing, auto-repayment from yield and a USDC lending pool.
//!
//! ## Borrowing Capacity
//!
//! ```text
//! weighted_ltv = Σ(floor × ltv) / Σ floor
//! max_borrow   = Σ floor × weighted_ltv / 100
//! fee          = amount × 0.5%
//! ```
//!
//! Each epoch, yield on NFTs backing debt is split 75% repayment,
//! 20% lenders, 5% protocol.

pub mod accounting;
pub mod config;
pub mod epoch;
pub mod ledger;
pub mod lending;
pub mod positions;
pub mod registry;
pub mod service;
pub mod store;
pub mod txlog;

pub use config::YifyConfig;
pub use epoch::EpochReport;
pub use ledger::{BorrowReceipt, CollateralEntry, Ledger, PlatformStats, Portfolio, RepayAmount};
pub use service::LendingService;
pub use store::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};

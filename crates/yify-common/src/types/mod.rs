//! Core data types for YIFY

pub mod lender;
pub mod nft;
pub mod position;
pub mod transaction;
pub mod wallet;

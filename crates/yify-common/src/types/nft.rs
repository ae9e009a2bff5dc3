//! NFT collateral - veNFTs and tokenized real-world assets
//!
//! Every NFT carries its own risk parameters:
//! - floor price in USD, mutated upward by yield-accrual epochs
//! - projected yield (APR %)
//! - LTV derived from the yield: one week of yield times the 65-week
//!   repayment horizon, capped at 50%

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{MAX_NFT_LTV, REPAYMENT_HORIZON_WEEKS};

/// Decimal places kept on floor prices after accrual
const PRICE_DP: u32 = 6;

/// Chains the mock catalog spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Base,
    Optimism,
    Ethereum,
}

impl Default for Network {
    fn default() -> Self {
        // veAERO lives on Base
        Network::Base
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Network::Base => "Base",
            Network::Optimism => "Optimism",
            Network::Ethereum => "Ethereum",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(Network::Base),
            "optimism" => Ok(Network::Optimism),
            "ethereum" => Ok(Network::Ethereum),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// Yield distribution cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Epoch {
    /// veNFT voting epoch (7 days)
    Weekly,
    /// RWA coupon period (30 days)
    Monthly,
}

impl Epoch {
    /// Number of epochs per year
    pub fn periods_per_year(&self) -> Decimal {
        match self {
            Epoch::Weekly => dec!(52),
            Epoch::Monthly => dec!(12),
        }
    }
}

/// Collateral class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NftKind {
    #[serde(rename = "veAERO")]
    VeAero,
    #[serde(rename = "veVELO")]
    VeVelo,
    #[serde(rename = "rwa")]
    Rwa,
}

impl NftKind {
    /// Epoch on which this kind distributes yield
    pub fn epoch(&self) -> Epoch {
        match self {
            NftKind::VeAero | NftKind::VeVelo => Epoch::Weekly,
            NftKind::Rwa => Epoch::Monthly,
        }
    }

    /// Ticker of the locked governance token, if any
    pub fn lock_token(&self) -> Option<&'static str> {
        match self {
            NftKind::VeAero => Some("AERO"),
            NftKind::VeVelo => Some("VELO"),
            NftKind::Rwa => None,
        }
    }
}

/// A collateral NFT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nft {
    pub id: String,
    pub name: String,
    pub kind: NftKind,
    pub network: Network,

    /// Governance tokens locked in the escrow (zero for RWA)
    pub lock_amount: Decimal,

    /// Floor price in USD
    pub floor_price: Decimal,

    /// Current yield, APR %
    pub current_yield: Decimal,

    /// Loan-to-value, %
    pub ltv: Decimal,

    pub is_deposited: bool,

    /// Isolated position holding this NFT while deposited
    pub position_id: Option<String>,
}

impl Nft {
    /// Create an undeposited NFT, deriving its LTV from the yield
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: NftKind,
        network: Network,
        lock_amount: Decimal,
        floor_price: Decimal,
        current_yield: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            network,
            lock_amount,
            floor_price,
            current_yield,
            ltv: derive_ltv(current_yield),
            is_deposited: false,
            position_id: None,
        }
    }

    /// Maximum this NFT alone can borrow
    #[inline]
    pub fn max_borrow(&self) -> Decimal {
        self.floor_price * self.ltv / dec!(100)
    }

    /// Yield produced over one epoch at the current floor price
    pub fn epoch_yield(&self, epoch: Epoch) -> Decimal {
        self.floor_price * self.current_yield / dec!(100) / epoch.periods_per_year()
    }

    /// Grow the floor price by one epoch of yield
    pub fn accrue(&mut self, epoch: Epoch) {
        let growth = Decimal::ONE + self.current_yield / dec!(100) / epoch.periods_per_year();
        self.floor_price = (self.floor_price * growth).round_dp(PRICE_DP);
    }
}

/// LTV % for a given APR: `min(50, apr / 52 * 65)`
pub fn derive_ltv(apr: Decimal) -> Decimal {
    let ltv = apr * Decimal::from(REPAYMENT_HORIZON_WEEKS) / dec!(52);
    ltv.min(MAX_NFT_LTV)
}

/// The static mock catalog
pub fn seed_catalog() -> Vec<Nft> {
    vec![
        Nft::new(
            "nft-1",
            "veAERO #1337",
            NftKind::VeAero,
            Network::Base,
            dec!(12500),
            dec!(5000),
            dec!(30),
        ),
        Nft::new(
            "nft-2",
            "veVELO #420",
            NftKind::VeVelo,
            Network::Optimism,
            dec!(40000),
            dec!(3000),
            dec!(25),
        ),
        Nft::new(
            "nft-3",
            "Real Estate Token #5",
            NftKind::Rwa,
            Network::Ethereum,
            Decimal::ZERO,
            dec!(10000),
            dec!(15),
        ),
        Nft::new(
            "nft-4",
            "veAERO #2048",
            NftKind::VeAero,
            Network::Base,
            dec!(6000),
            dec!(2400),
            dec!(36),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ltv_from_yield() {
        assert_eq!(derive_ltv(dec!(30)), dec!(37.5));
        assert_eq!(derive_ltv(dec!(25)), dec!(31.25));
        assert_eq!(derive_ltv(dec!(15)), dec!(18.75));
    }

    #[test]
    fn test_ltv_capped() {
        assert_eq!(derive_ltv(dec!(80)), MAX_NFT_LTV);
    }

    #[test]
    fn test_max_borrow() {
        let catalog = seed_catalog();
        assert_eq!(catalog[0].max_borrow(), dec!(1875));
        assert_eq!(catalog[1].max_borrow(), dec!(937.5));
        assert_eq!(catalog[2].max_borrow(), dec!(1875));
    }

    #[test]
    fn test_kind_epochs() {
        assert_eq!(NftKind::VeAero.epoch(), Epoch::Weekly);
        assert_eq!(NftKind::VeVelo.epoch(), Epoch::Weekly);
        assert_eq!(NftKind::Rwa.epoch(), Epoch::Monthly);
    }

    #[test]
    fn test_accrue_grows_floor() {
        let mut nft = seed_catalog().remove(2);
        // 10000 * (1 + 0.15 / 12)
        nft.accrue(Epoch::Monthly);
        assert_eq!(nft.floor_price, dec!(10125));
    }

    #[test]
    fn test_epoch_yield() {
        let nft = seed_catalog().remove(2);
        assert_eq!(nft.epoch_yield(Epoch::Monthly), dec!(125));
    }

    #[test]
    fn test_network_parse() {
        assert_eq!("optimism".parse::<Network>().unwrap(), Network::Optimism);
        assert!("solana".parse::<Network>().is_err());
    }
}

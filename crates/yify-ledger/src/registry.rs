//! NFT registry
//!
//! Holds the static mock catalog and the deposit flags. Lookups scan the
//! full list; the catalog is a handful of records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use yify_common::{types::nft::seed_catalog, CollateralError, Epoch, Network, Nft};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftRegistry {
    nfts: Vec<Nft>,
}

impl Default for NftRegistry {
    fn default() -> Self {
        Self::seeded()
    }
}

impl NftRegistry {
    /// Registry over the static mock catalog
    pub fn seeded() -> Self {
        Self::new(seed_catalog())
    }

    pub fn new(nfts: Vec<Nft>) -> Self {
        Self { nfts }
    }

    pub fn all(&self) -> &[Nft] {
        &self.nfts
    }

    pub fn get(&self, id: &str) -> Option<&Nft> {
        self.nfts.iter().find(|nft| nft.id == id)
    }

    pub fn by_network(&self, network: Network) -> Vec<&Nft> {
        self.nfts.iter().filter(|nft| nft.network == network).collect()
    }

    /// NFTs still in the wallet
    pub fn available(&self) -> Vec<&Nft> {
        self.nfts.iter().filter(|nft| !nft.is_deposited).collect()
    }

    /// NFTs currently held as collateral
    pub fn deposited(&self) -> Vec<&Nft> {
        self.nfts.iter().filter(|nft| nft.is_deposited).collect()
    }

    /// NFTs whose id appears in `ids`, in catalog order
    pub fn by_ids(&self, ids: &[String]) -> Vec<&Nft> {
        self.nfts
            .iter()
            .filter(|nft| ids.iter().any(|id| *id == nft.id))
            .collect()
    }

    pub fn by_position(&self, position_id: &str) -> Vec<&Nft> {
        self.nfts
            .iter()
            .filter(|nft| nft.position_id.as_deref() == Some(position_id))
            .collect()
    }

    /// Mark NFTs deposited, linking each to its isolated position.
    ///
    /// Validates the whole batch first so a failure leaves the registry untouched.
    pub fn deposit(&mut self, ids: &[String], position_ids: &[String]) -> Result<(), CollateralError> {
        if ids.is_empty() {
            return Err(CollateralError::EmptySelection);
        }

        for (idx, id) in ids.iter().enumerate() {
            if ids[..idx].contains(id) {
                return Err(CollateralError::DuplicateSelection(id.clone()));
            }
            let nft = self
                .get(id)
                .ok_or_else(|| CollateralError::NotFound(id.clone()))?;
            if nft.is_deposited {
                return Err(CollateralError::AlreadyDeposited(id.clone()));
            }
        }

        for (idx, id) in ids.iter().enumerate() {
            if let Some(nft) = self.nfts.iter_mut().find(|nft| nft.id == *id) {
                nft.is_deposited = true;
                nft.position_id = position_ids.get(idx).cloned();
                debug!(nft = %nft.id, position = ?nft.position_id, "NFT deposited");
            }
        }
        Ok(())
    }

    /// Return NFTs to the wallet and clear their position link
    pub fn withdraw(&mut self, ids: &[String]) -> Result<(), CollateralError> {
        if ids.is_empty() {
            return Err(CollateralError::EmptySelection);
        }

        for id in ids {
            let nft = self
                .get(id)
                .ok_or_else(|| CollateralError::NotFound(id.clone()))?;
            if !nft.is_deposited {
                return Err(CollateralError::NotDeposited(id.clone()));
            }
        }

        for nft in self.nfts.iter_mut().filter(|nft| ids.contains(&nft.id)) {
            nft.is_deposited = false;
            nft.position_id = None;
            debug!(nft = %nft.id, "NFT withdrawn");
        }
        Ok(())
    }

    /// Grow floor prices of every NFT distributing on `epoch`; returns how many grew
    pub fn accrue_yield(&mut self, epoch: Epoch) -> usize {
        let mut touched = 0;
        for nft in self.nfts.iter_mut().filter(|nft| nft.kind.epoch() == epoch) {
            nft.accrue(epoch);
            touched += 1;
        }
        touched
    }

    /// Total floor value of deposited NFTs
    pub fn deposited_value(&self) -> Decimal {
        crate::accounting::total_collateral_value(self.nfts.iter().filter(|nft| nft.is_deposited))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_seeded_catalog() {
        let registry = NftRegistry::seeded();
        assert_eq!(registry.all().len(), 4);
        assert_eq!(registry.available().len(), 4);
        assert!(registry.deposited().is_empty());
        assert_eq!(registry.by_network(Network::Base).len(), 2);
        assert_eq!(registry.get("nft-2").unwrap().name, "veVELO #420");
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let mut registry = NftRegistry::seeded();
        registry
            .deposit(&ids(&["nft-1", "nft-3"]), &ids(&["pos-a", "pos-b"]))
            .unwrap();

        assert_eq!(registry.deposited().len(), 2);
        assert_eq!(registry.deposited_value(), dec!(15000));
        assert_eq!(registry.by_position("pos-b")[0].id, "nft-3");

        registry.withdraw(&ids(&["nft-1"])).unwrap();
        assert!(!registry.get("nft-1").unwrap().is_deposited);
        assert!(registry.get("nft-1").unwrap().position_id.is_none());
    }

    #[test]
    fn test_deposit_is_all_or_nothing() {
        let mut registry = NftRegistry::seeded();
        registry.deposit(&ids(&["nft-2"]), &ids(&["pos-a"])).unwrap();

        let err = registry
            .deposit(&ids(&["nft-1", "nft-2"]), &ids(&["pos-b", "pos-c"]))
            .unwrap_err();
        assert_eq!(err, CollateralError::AlreadyDeposited("nft-2".into()));
        assert!(!registry.get("nft-1").unwrap().is_deposited);

        let err = registry.deposit(&ids(&["nft-99"]), &[]).unwrap_err();
        assert_eq!(err, CollateralError::NotFound("nft-99".into()));
    }

    #[test]
    fn test_deposit_rejects_repeated_id() {
        let mut registry = NftRegistry::seeded();
        let err = registry
            .deposit(&ids(&["nft-1", "nft-3", "nft-1"]), &ids(&["pos-a", "pos-b", "pos-c"]))
            .unwrap_err();

        assert_eq!(err, CollateralError::DuplicateSelection("nft-1".into()));
        assert!(registry.deposited().is_empty());
        assert!(registry.by_position("pos-c").is_empty());
    }

    #[test]
    fn test_withdraw_requires_deposit() {
        let mut registry = NftRegistry::seeded();
        let err = registry.withdraw(&ids(&["nft-1"])).unwrap_err();
        assert_eq!(err, CollateralError::NotDeposited("nft-1".into()));
    }

    #[test]
    fn test_accrue_only_matching_epoch() {
        let mut registry = NftRegistry::seeded();
        assert_eq!(registry.accrue_yield(Epoch::Monthly), 1);

        assert_eq!(registry.get("nft-3").unwrap().floor_price, dec!(10125));
        assert_eq!(registry.get("nft-1").unwrap().floor_price, dec!(5000));

        assert_eq!(registry.accrue_yield(Epoch::Weekly), 3);
        assert!(registry.get("nft-1").unwrap().floor_price > dec!(5000));
    }
}

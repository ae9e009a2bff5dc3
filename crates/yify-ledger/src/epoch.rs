//! Epoch engine
//!
//! ve-token NFTs distribute weekly and RWA tokens monthly. Each tick grows
//! floor prices for the cadence, then routes every deposited NFT's yield:
//! NFTs backing pooled debt split it 75/20/5 between repayment, lenders and
//! the protocol; the rest pay the wallet in full.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use yify_common::{Epoch, Nft, Result, TransactionDraft, TransactionKind, STABLE_TOKEN};

use crate::accounting::{self, YieldSplit};
use crate::ledger::Ledger;

/// What one epoch tick did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: Epoch,
    pub nfts_accrued: usize,
    pub gross_yield: Decimal,
    pub repaid: Decimal,
    pub lender_share: Decimal,
    pub protocol_share: Decimal,
    /// Yield paid straight to the wallet
    pub paid_to_wallet: Decimal,
}

impl EpochReport {
    fn empty(epoch: Epoch, nfts_accrued: usize) -> Self {
        Self {
            epoch,
            nfts_accrued,
            gross_yield: Decimal::ZERO,
            repaid: Decimal::ZERO,
            lender_share: Decimal::ZERO,
            protocol_share: Decimal::ZERO,
            paid_to_wallet: Decimal::ZERO,
        }
    }
}

impl Ledger {
    /// Run one yield epoch: grow floor prices, then pay out each deposited
    /// NFT's yield for the epoch.
    #[instrument(skip(self))]
    pub fn run_epoch(&mut self, epoch: Epoch) -> Result<EpochReport> {
        self.require_wallet()?;

        let nfts_accrued = self.registry.accrue_yield(epoch);
        self.positions.refresh_collateral(&self.registry);

        let mut report = EpochReport::empty(epoch, nfts_accrued);

        let earners: Vec<(Nft, Decimal)> = self
            .registry
            .deposited()
            .into_iter()
            .map(|nft| (nft.clone(), accounting::epoch_yield(nft, epoch)))
            .filter(|(_, gross)| *gross > Decimal::ZERO)
            .collect();

        for (nft, gross) in earners {
            report.gross_yield += gross;

            let pool = self
                .positions
                .active_pooled()
                .filter(|p| p.borrowed_amount > Decimal::ZERO && p.collateral_nft_ids.contains(&nft.id))
                .map(|p| p.id.clone());

            match pool {
                Some(pool_id) => self.pay_into_pool(&pool_id, &nft, gross, &mut report)?,
                None => self.pay_to_wallet(&nft, gross, &mut report)?,
            }
        }

        info!(
            ?epoch,
            accrued = nfts_accrued,
            gross = %report.gross_yield,
            repaid = %report.repaid,
            "Epoch processed"
        );
        Ok(report)
    }

    fn pay_into_pool(
        &mut self,
        pool_id: &str,
        nft: &Nft,
        gross: Decimal,
        report: &mut EpochReport,
    ) -> Result<()> {
        let split = YieldSplit::of(gross);

        let applied = self.positions.repay(pool_id, split.repayment)?;
        let surplus = split.repayment - applied;
        if surplus > Decimal::ZERO {
            self.session.wallet_mut()?.credit(surplus)?;
            report.paid_to_wallet += surplus;
        }

        // Undistributed lender share stays with the protocol
        let distributed = self.lenders.distribute(split.lender_share);
        let retained = split.protocol_share + (split.lender_share - distributed);
        self.protocol_revenue += retained;

        self.positions.record_yield(pool_id, gross, distributed)?;

        report.repaid += applied;
        report.lender_share += distributed;
        report.protocol_share += retained;

        self.transactions.record(
            TransactionDraft::new(
                TransactionKind::Yield,
                gross,
                STABLE_TOKEN,
                format!("Epoch yield from {}", nft.name),
            )
            .with_position(pool_id)
            .with_nfts(vec![nft.id.clone()]),
        );
        if applied > Decimal::ZERO {
            self.transactions.record(
                TransactionDraft::new(
                    TransactionKind::Repay,
                    applied,
                    STABLE_TOKEN,
                    format!("Auto-repayment of {} {} from yield", applied.round_dp(2), STABLE_TOKEN),
                )
                .with_position(pool_id),
            );
        }
        Ok(())
    }

    fn pay_to_wallet(&mut self, nft: &Nft, gross: Decimal, report: &mut EpochReport) -> Result<()> {
        self.session.wallet_mut()?.credit(gross)?;
        report.paid_to_wallet += gross;

        let mut draft = TransactionDraft::new(
            TransactionKind::Yield,
            gross,
            STABLE_TOKEN,
            format!("Epoch yield from {}", nft.name),
        )
        .with_nfts(vec![nft.id.clone()]);

        if let Some(isolated) = nft.position_id.as_deref() {
            self.positions.record_yield(isolated, gross, Decimal::ZERO)?;
            draft = draft.with_position(isolated);
        }
        self.transactions.record(draft);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use yify_common::Wallet;

    fn connected() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.connect_wallet(Wallet::preset("MetaMask").unwrap());
        ledger
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_epoch_pays_down_debt() {
        let mut ledger = connected();
        ledger.lend(dec!(1000)).unwrap();
        ledger.deposit_nfts(&ids(&["nft-3"])).unwrap();
        let receipt = ledger.borrow(dec!(1000)).unwrap();

        let report = ledger.run_epoch(Epoch::Monthly).unwrap();
        // 10125 * 15% / 12
        assert_eq!(report.gross_yield, dec!(126.5625));
        assert_eq!(report.repaid, dec!(94.921875));
        assert_eq!(report.lender_share, dec!(25.3125));

        let pool = ledger.positions().get(&receipt.position_id).unwrap();
        assert_eq!(pool.borrowed_amount, dec!(1000) - dec!(94.921875));
        assert_eq!(pool.yield_shared, dec!(25.3125));
        assert_eq!(ledger.lenders().total_deposited(), dec!(1025.3125));
    }

    #[test]
    fn test_epoch_without_debt_pays_wallet() {
        let mut ledger = connected();
        let positions = ledger.deposit_nfts(&ids(&["nft-3"])).unwrap();

        let report = ledger.run_epoch(Epoch::Monthly).unwrap();
        assert_eq!(report.paid_to_wallet, dec!(126.5625));
        assert_eq!(ledger.session().balance(), dec!(15126.5625));
        assert_eq!(
            ledger.positions().get(&positions[0]).unwrap().yield_earned,
            dec!(126.5625)
        );

        // Weekly epoch does not touch the RWA token
        let report = ledger.run_epoch(Epoch::Weekly).unwrap();
        assert_eq!(report.gross_yield, Decimal::ZERO);
    }

    #[test]
    fn test_epoch_surplus_returns_to_wallet() {
        let mut ledger = connected();
        ledger.deposit_nfts(&ids(&["nft-3"])).unwrap();
        let receipt = ledger.borrow(dec!(50)).unwrap();
        let before = ledger.session().balance();

        let report = ledger.run_epoch(Epoch::Monthly).unwrap();
        assert_eq!(report.repaid, dec!(50));
        assert_eq!(report.paid_to_wallet, dec!(94.921875) - dec!(50));
        assert_eq!(ledger.session().balance(), before + report.paid_to_wallet);

        let pool = ledger.positions().get(&receipt.position_id).unwrap();
        assert_eq!(pool.repayment_progress(), dec!(100));
    }

    #[test]
    fn test_epoch_logs_yield_per_nft() {
        let mut ledger = connected();
        ledger.deposit_nfts(&ids(&["nft-1", "nft-4"])).unwrap();

        let report = ledger.run_epoch(Epoch::Weekly).unwrap();
        assert_eq!(report.nfts_accrued, 3);
        assert_eq!(
            ledger.transactions().by_kind(TransactionKind::Yield).len(),
            2
        );
        let logged = ledger.transactions().total_volume().yield_earned;
        assert!((logged - report.gross_yield).abs() < dec!(0.000001));
    }

    #[test]
    fn test_epoch_refreshes_position_collateral() {
        let mut ledger = connected();
        let isolated = ledger.deposit_nfts(&ids(&["nft-1", "nft-3"])).unwrap();
        let receipt = ledger.borrow(dec!(1000)).unwrap();
        assert_eq!(
            ledger.positions().get(&receipt.position_id).unwrap().total_collateral_value,
            dec!(15000)
        );

        ledger.run_epoch(Epoch::Weekly).unwrap();

        let floor = ledger.registry().get("nft-1").unwrap().floor_price;
        assert!(floor > dec!(5000));
        let pool = ledger.positions().get(&receipt.position_id).unwrap();
        assert_eq!(pool.total_collateral_value, floor + dec!(10000));
        assert_eq!(
            ledger.positions().get(&isolated[0]).unwrap().total_collateral_value,
            floor
        );
        // RWA floors only move on monthly epochs
        assert_eq!(
            ledger.positions().get(&isolated[1]).unwrap().total_collateral_value,
            dec!(10000)
        );
    }

    #[test]
    fn test_epoch_requires_wallet() {
        let mut ledger = Ledger::new();
        assert!(ledger.run_epoch(Epoch::Weekly).is_err());
    }
}

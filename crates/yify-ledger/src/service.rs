//! Async service facade
//!
//! Wraps the [`Ledger`] behind a shared lock, applies each action after the
//! configured settlement delay and persists a snapshot once the action has
//! settled. Lock guards are never held across an await point.
//!
//! Actions are expected to be awaited one at a time. Snapshot keys are
//! written one after another outside the lock, so concurrent actions on a
//! shared service can interleave their writes.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use yify_common::{
    types::nft::seed_catalog, Epoch, LenderPosition, Nft, Position, Result, Transaction,
    TransactionDraft, TransactionKind, TransactionStatus, Wallet, WalletError, WalletSession,
    WithdrawalReceipt, YifyError, STABLE_TOKEN,
};

use crate::config::YifyConfig;
use crate::epoch::EpochReport;
use crate::ledger::{BorrowReceipt, Ledger, PlatformStats, Portfolio, RepayAmount};
use crate::store::{
    self, SnapshotStore, LENDER_KEY, NFT_KEY, POSITION_KEY, TRANSACTION_KEY, WALLET_KEY,
};

/// Placeholder address for wallets that are not presets
const UNKNOWN_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub struct LendingService {
    ledger: Arc<RwLock<Ledger>>,
    config: YifyConfig,
    store: Arc<dyn SnapshotStore>,
}

impl LendingService {
    /// Service over the seeded catalog
    pub fn new(config: YifyConfig, store: Arc<dyn SnapshotStore>) -> Self {
        let ledger = Ledger::with_catalog(seed_catalog(), config.lender_apr);
        Self::with_ledger(ledger, config, store)
    }

    pub fn with_ledger(ledger: Ledger, config: YifyConfig, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            config,
            store,
        }
    }

    pub fn config(&self) -> &YifyConfig {
        &self.config
    }

    /// Shared handle to the ledger
    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        Arc::clone(&self.ledger)
    }

    /// Load persisted snapshots; returns whether any were found
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<bool> {
        let store = self.store.as_ref();
        let session: Option<WalletSession> = store::load_typed(store, WALLET_KEY).await?;
        let transactions: Option<Vec<Transaction>> = store::load_typed(store, TRANSACTION_KEY).await?;
        let nfts: Option<Vec<Nft>> = store::load_typed(store, NFT_KEY).await?;
        let positions: Option<Vec<Position>> = store::load_typed(store, POSITION_KEY).await?;
        let lenders: Option<Vec<LenderPosition>> = store::load_typed(store, LENDER_KEY).await?;

        let found = session.is_some()
            || transactions.is_some()
            || nfts.is_some()
            || positions.is_some()
            || lenders.is_some();

        let mut ledger = self.ledger.write();
        if let Some(session) = session {
            ledger.restore_session(session);
        }
        if let Some(transactions) = transactions {
            ledger.restore_transactions(transactions);
        }
        if let Some(nfts) = nfts {
            ledger.restore_registry(nfts);
        }
        if let Some(positions) = positions {
            ledger.restore_positions(positions);
        }
        if let Some(lenders) = lenders {
            ledger.restore_lenders(lenders);
        }

        info!(found, transactions = ledger.transactions().len(), "Snapshot restored");
        Ok(found)
    }

    /// Write the current state to the store.
    ///
    /// Each key is saved separately; a failure part way through leaves the
    /// earlier keys updated.
    pub async fn persist(&self) -> Result<()> {
        let (session, transactions, nfts, positions, lenders) = {
            let ledger = self.ledger.read();
            (
                ledger.session().clone(),
                ledger.transactions().all().to_vec(),
                ledger.registry().all().to_vec(),
                ledger.positions().all().to_vec(),
                ledger.lenders().positions().to_vec(),
            )
        };

        let store = self.store.as_ref();
        store::save_typed(store, WALLET_KEY, &session).await?;
        store::save_typed(store, TRANSACTION_KEY, &transactions).await?;
        store::save_typed(store, NFT_KEY, &nfts).await?;
        store::save_typed(store, POSITION_KEY, &positions).await?;
        store::save_typed(store, LENDER_KEY, &lenders).await?;
        Ok(())
    }

    /// Clear every snapshot and start over from the seeded catalog
    pub async fn reset(&self) -> Result<()> {
        store::reset_all(self.store.as_ref()).await?;
        *self.ledger.write() = Ledger::with_catalog(seed_catalog(), self.config.lender_apr);
        warn!("Simulator state reset");
        Ok(())
    }

    /// Persist after a mutation that already took effect; a store failure is
    /// logged rather than returned
    async fn checkpoint(&self) {
        if let Err(err) = self.persist().await {
            warn!(error = %err, "Snapshot not saved");
        }
    }

    /// Wait out the settlement delay, apply `op`, then persist.
    ///
    /// A failed action leaves a `Failed` record built from `failure`, unless
    /// no wallet was connected. The action's own result is returned whether
    /// or not the snapshot could be saved.
    async fn settle<T>(
        &self,
        failure: TransactionDraft,
        op: impl FnOnce(&mut Ledger) -> Result<T>,
    ) -> Result<T> {
        let delay = self.config.settlement_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut ledger = self.ledger.write();
            let result = op(&mut ledger);
            if let Err(err) = &result {
                if *err != YifyError::Wallet(WalletError::NotConnected) {
                    warn!(error = %err, kind = failure.kind.as_str(), "Action failed");
                    ledger.record(failure.with_status(TransactionStatus::Failed));
                }
            }
            result
        };

        self.checkpoint().await;
        result
    }

    // ============ SESSION ============

    /// Connect a preset wallet by name; unknown names get an empty wallet
    pub async fn connect_wallet(&self, name: &str) -> Result<Wallet> {
        let wallet = Wallet::preset(name)
            .unwrap_or_else(|| Wallet::new(name, UNKNOWN_ADDRESS, Decimal::ZERO));
        let connected = self.ledger.write().connect_wallet(wallet).clone();
        self.checkpoint().await;
        Ok(connected)
    }

    /// Keep a restored wallet, or connect `name` when none is connected
    pub async fn resume_wallet(&self, name: &str) -> Result<Wallet> {
        let restored = self.ledger.read().session().wallet().ok().cloned();
        match restored {
            Some(wallet) => {
                info!(wallet = %wallet.name, balance = %wallet.balance, "Resuming restored wallet");
                Ok(wallet)
            }
            None => self.connect_wallet(name).await,
        }
    }

    pub async fn disconnect_wallet(&self) -> Result<Option<Wallet>> {
        let wallet = self.ledger.write().disconnect_wallet();
        self.checkpoint().await;
        Ok(wallet)
    }

    // ============ ACTIONS ============

    #[instrument(skip(self))]
    pub async fn deposit_nfts(&self, nft_ids: Vec<String>) -> Result<Vec<String>> {
        let failure = TransactionDraft::new(
            TransactionKind::Deposit,
            Decimal::ZERO,
            "NFT",
            format!("Failed to deposit {} NFTs", nft_ids.len()),
        )
        .with_nfts(nft_ids.clone());
        self.settle(failure, |ledger| ledger.deposit_nfts(&nft_ids)).await
    }

    #[instrument(skip(self))]
    pub async fn borrow(&self, amount: Decimal) -> Result<BorrowReceipt> {
        let failure = TransactionDraft::new(
            TransactionKind::Borrow,
            amount,
            STABLE_TOKEN,
            format!("Failed to borrow {} {}", amount, STABLE_TOKEN),
        );
        self.settle(failure, |ledger| ledger.borrow(amount)).await
    }

    #[instrument(skip(self))]
    pub async fn repay(&self, position_id: &str, amount: RepayAmount) -> Result<Decimal> {
        let requested = match amount {
            RepayAmount::Partial(value) => value,
            RepayAmount::Full => Decimal::ZERO,
        };
        let failure = TransactionDraft::new(
            TransactionKind::Repay,
            requested,
            STABLE_TOKEN,
            "Repayment failed",
        )
        .with_position(position_id);
        self.settle(failure, |ledger| ledger.repay(position_id, amount)).await
    }

    #[instrument(skip(self))]
    pub async fn close_position(&self, position_id: &str) -> Result<Vec<String>> {
        let failure = TransactionDraft::new(
            TransactionKind::PositionClosed,
            Decimal::ZERO,
            STABLE_TOKEN,
            "Failed to close position",
        )
        .with_position(position_id);
        self.settle(failure, |ledger| ledger.close_position(position_id)).await
    }

    #[instrument(skip(self))]
    pub async fn withdraw_nft(&self, nft_id: &str) -> Result<()> {
        let failure = TransactionDraft::new(
            TransactionKind::Withdraw,
            Decimal::ZERO,
            "NFT",
            "Failed to withdraw NFT",
        )
        .with_nfts(vec![nft_id.to_string()]);
        self.settle(failure, |ledger| ledger.withdraw_nft(nft_id)).await
    }

    #[instrument(skip(self))]
    pub async fn lend(&self, amount: Decimal) -> Result<String> {
        let failure = TransactionDraft::new(
            TransactionKind::Deposit,
            amount,
            STABLE_TOKEN,
            format!("Failed to deposit {} {} into the lending pool", amount, STABLE_TOKEN),
        );
        self.settle(failure, |ledger| ledger.lend(amount)).await
    }

    #[instrument(skip(self))]
    pub async fn withdraw_lending(&self, lender_id: &str, amount: Decimal) -> Result<WithdrawalReceipt> {
        let failure = TransactionDraft::new(
            TransactionKind::Withdraw,
            amount,
            STABLE_TOKEN,
            format!("Failed to withdraw {} {} from the lending pool", amount, STABLE_TOKEN),
        )
        .with_position(lender_id);
        self.settle(failure, |ledger| ledger.withdraw_lending(lender_id, amount))
            .await
    }

    pub async fn toggle_auto_reinvest(&self, lender_id: &str) -> Result<bool> {
        let enabled = self.ledger.write().toggle_auto_reinvest(lender_id)?;
        self.checkpoint().await;
        Ok(enabled)
    }

    /// Run an epoch tick; epochs settle immediately
    pub async fn run_epoch(&self, epoch: Epoch) -> Result<EpochReport> {
        let report = self.ledger.write().run_epoch(epoch)?;
        self.checkpoint().await;
        Ok(report)
    }

    // ============ VIEWS ============

    pub fn portfolio(&self) -> Portfolio {
        self.ledger.read().portfolio()
    }

    pub fn platform_stats(&self) -> PlatformStats {
        self.ledger.read().platform_stats()
    }

    pub fn balance(&self) -> Decimal {
        self.ledger.read().session().balance()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.ledger.read().transactions().all().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySnapshotStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use std::time::Duration;

    /// Store that reads nothing and refuses every write
    struct FullDisk;

    #[async_trait]
    impl SnapshotStore for FullDisk {
        async fn load(&self, _key: &str) -> Result<Option<Value>> {
            Ok(None)
        }

        async fn save(&self, _key: &str, _value: Value) -> Result<()> {
            Err(YifyError::Storage("disk full".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    fn service() -> (LendingService, Arc<InMemorySnapshotStore>) {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = LendingService::new(YifyConfig::instant(), store.clone());
        (service, store)
    }

    #[tokio::test]
    async fn test_action_persists_snapshot() {
        let (service, store) = service();
        service.connect_wallet("MetaMask").await.unwrap();
        service.deposit_nfts(vec!["nft-1".into()]).await.unwrap();

        assert_eq!(store.len(), 5);
        let txs: Vec<Transaction> = store::load_typed(store.as_ref(), TRANSACTION_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::Deposit);
    }

    #[tokio::test]
    async fn test_failed_action_is_recorded() {
        let (service, _) = service();
        service.connect_wallet("WalletConnect").await.unwrap();

        let err = service.borrow(dec!(100)).await.unwrap_err();
        assert!(matches!(err, YifyError::Collateral(_)));

        let txs = service.transactions();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].status, TransactionStatus::Failed);
        assert_eq!(txs[0].kind, TransactionKind::Borrow);
        assert!(service.ledger().read().transactions().total_volume().borrowed.is_zero());
    }

    #[tokio::test]
    async fn test_disconnected_action_leaves_no_record() {
        let (service, _) = service();
        let err = service.lend(dec!(10)).await.unwrap_err();
        assert_eq!(err, YifyError::Wallet(WalletError::NotConnected));
        assert!(service.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let (service, store) = service();
        service.connect_wallet("Coinbase Wallet").await.unwrap();
        service.deposit_nfts(vec!["nft-3".into()]).await.unwrap();
        service.borrow(dec!(1000)).await.unwrap();

        let restored = LendingService::new(YifyConfig::instant(), store);
        assert!(restored.restore().await.unwrap());
        assert_eq!(restored.balance(), dec!(25995));
        assert_eq!(restored.transactions().len(), 2);
        assert_eq!(restored.portfolio().total_borrowed, dec!(1000));
    }

    #[tokio::test]
    async fn test_store_failure_does_not_hide_settled_action() {
        let service = LendingService::new(YifyConfig::instant(), Arc::new(FullDisk));
        service.connect_wallet("MetaMask").await.unwrap();

        let id = service.lend(dec!(5000)).await.unwrap();
        assert_eq!(service.balance(), dec!(10000));
        assert!(service.ledger().read().lenders().get(&id).is_some());

        // A rejected action still reports its own error
        let err = service.borrow(dec!(100)).await.unwrap_err();
        assert!(matches!(err, YifyError::Collateral(_)));

        assert!(matches!(service.persist().await, Err(YifyError::Storage(_))));
    }

    #[tokio::test]
    async fn test_resume_keeps_restored_wallet() {
        let (service, store) = service();
        service.connect_wallet("MetaMask").await.unwrap();
        service.lend(dec!(5000)).await.unwrap();

        let restarted = LendingService::new(YifyConfig::instant(), store);
        restarted.restore().await.unwrap();
        let wallet = restarted.resume_wallet("MetaMask").await.unwrap();

        assert_eq!(wallet.balance, dec!(10000));
        assert_eq!(restarted.balance(), dec!(10000));
        assert_eq!(restarted.platform_stats().available_fund, dec!(5000));
    }

    #[tokio::test]
    async fn test_resume_connects_when_nothing_restored() {
        let (service, _) = service();
        assert!(!service.restore().await.unwrap());

        let wallet = service.resume_wallet("WalletConnect").await.unwrap();
        assert_eq!(wallet.balance, dec!(5000));
        assert!(service.ledger().read().session().is_connected());
    }

    #[tokio::test]
    async fn test_reset() {
        let (service, store) = service();
        service.connect_wallet("MetaMask").await.unwrap();
        service.reset().await.unwrap();

        assert!(store.is_empty());
        assert!(!service.ledger().read().session().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settlement_delay() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = LendingService::new(YifyConfig::default(), store);
        service.connect_wallet("MetaMask").await.unwrap();

        let start = tokio::time::Instant::now();
        service.lend(dec!(100)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}

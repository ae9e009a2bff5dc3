//! Ledger - the single owner of all simulator state
//!
//! Every user action runs to completion against the registry, the position
//! ledger, the wallet and the transaction log:
//!
//! - deposit NFTs -> one isolated position each
//! - borrow -> pooled position over all deposited NFTs, net of the 0.5% fee
//! - repay / close -> debit the wallet, pay down or settle the pool
//! - withdraw NFT -> allowed only while the remaining collateral covers the debt
//! - epoch -> floor prices grow, yield pays down debt and feeds lenders

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use yify_common::{
    CollateralError, LenderPosition, Network, Nft, Position, PositionError,
    PositionKind, Result, Transaction, TransactionDraft, TransactionKind,
    Wallet, WalletSession, WithdrawalReceipt, REPAY_GAS_USED, STABLE_TOKEN,
};

use crate::accounting::{self, HealthBand};
use crate::lending::LenderBook;
use crate::positions::PositionLedger;
use crate::registry::NftRegistry;
use crate::txlog::TransactionLog;

/// Token label on NFT deposit/withdraw records
const NFT_TOKEN: &str = "NFT";

/// How much of a position to repay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepayAmount {
    Partial(Decimal),
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowReceipt {
    pub position_id: String,
    pub amount: Decimal,
    pub fee: Decimal,
    /// Amount credited to the wallet
    pub net: Decimal,
    /// Whether this topped up an existing pooled position
    pub additional: bool,
}

/// One deposited NFT in the portfolio view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralEntry {
    pub nft_id: String,
    pub name: String,
    pub value: Decimal,
    pub ltv: Decimal,
    /// Isolated position holding the NFT
    pub position_id: Option<String>,
    /// Whether the NFT also backs the active pooled position
    pub pooled: bool,
    pub can_withdraw: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub collateral: Vec<CollateralEntry>,
    pub total_collateral: Decimal,
    pub total_borrowed: Decimal,
    pub total_yield_earned: Decimal,
    pub total_yield_shared: Decimal,
    pub weighted_ltv: Decimal,
    pub max_borrow: Decimal,
    pub available_to_borrow: Decimal,
    pub average_yield: Decimal,
    pub health_factor: Option<Decimal>,
    pub health_band: HealthBand,
    pub min_collateral_required: Decimal,
    pub max_collateral_withdraw: Decimal,
    pub repayment_progress: Decimal,
    pub estimated_payoff_months: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    /// Deposited collateral plus lender deposits
    pub tvl: Decimal,
    /// Pooled positions ever opened
    pub total_loans: usize,
    pub total_borrow: Decimal,
    /// Lender deposits not lent out
    pub available_fund: Decimal,
    pub protocol_revenue: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    pub(crate) registry: NftRegistry,
    pub(crate) positions: PositionLedger,
    pub(crate) transactions: TransactionLog,
    pub(crate) lenders: LenderBook,
    pub(crate) session: WalletSession,
    network: Network,
    pub(crate) protocol_revenue: Decimal,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger over a custom catalog and lender APR
    pub fn with_catalog(nfts: Vec<Nft>, lender_apr: Decimal) -> Self {
        Self {
            registry: NftRegistry::new(nfts),
            lenders: LenderBook::new(lender_apr),
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &NftRegistry {
        &self.registry
    }

    pub fn positions(&self) -> &PositionLedger {
        &self.positions
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    pub fn lenders(&self) -> &LenderBook {
        &self.lenders
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn protocol_revenue(&self) -> Decimal {
        self.protocol_revenue
    }

    // ============ SESSION ============

    pub fn connect_wallet(&mut self, wallet: Wallet) -> &Wallet {
        let wallet = self.session.connect(wallet);
        info!(wallet = %wallet.name, balance = %wallet.balance, "Wallet connected");
        wallet
    }

    pub fn disconnect_wallet(&mut self) -> Option<Wallet> {
        self.session.disconnect()
    }

    pub fn set_network(&mut self, network: Network) {
        self.network = network;
    }

    /// Catalog entries on the selected network
    pub fn nfts_on_network(&self) -> Vec<&Nft> {
        self.registry.by_network(self.network)
    }

    pub(crate) fn require_wallet(&self) -> Result<()> {
        self.session.wallet()?;
        Ok(())
    }

    /// Append a record directly, used for failures detected outside the ledger
    pub fn record(&mut self, draft: TransactionDraft) -> String {
        self.transactions.record(draft)
    }

    // ============ BORROWER ACTIONS ============

    /// Deposit NFTs as collateral, one isolated position each
    #[instrument(skip(self))]
    pub fn deposit_nfts(&mut self, nft_ids: &[String]) -> Result<Vec<String>> {
        self.require_wallet()?;

        let mut ids: Vec<String> = Vec::with_capacity(nft_ids.len());
        for id in nft_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        if ids.is_empty() {
            return Err(CollateralError::EmptySelection.into());
        }

        let mut nfts = Vec::with_capacity(ids.len());
        for id in &ids {
            let nft = self
                .registry
                .get(id)
                .ok_or_else(|| CollateralError::NotFound(id.clone()))?;
            if nft.is_deposited {
                return Err(CollateralError::AlreadyDeposited(id.clone()).into());
            }
            nfts.push(nft.clone());
        }

        let position_ids: Vec<String> = nfts
            .iter()
            .map(|nft| self.positions.create_isolated(nft))
            .collect();
        self.registry.deposit(&ids, &position_ids)?;

        // A live pool spans every deposited NFT
        if let Some(pool_id) = self.positions.active_pooled().map(|p| p.id.clone()) {
            for nft in &nfts {
                self.positions.attach_collateral(&pool_id, nft)?;
            }
        }

        self.transactions.record(
            TransactionDraft::new(
                TransactionKind::Deposit,
                Decimal::ZERO,
                NFT_TOKEN,
                format!("Deposited {} NFTs as isolated collateral", ids.len()),
            )
            .with_nfts(ids.clone()),
        );

        info!(count = ids.len(), "NFTs deposited");
        Ok(position_ids)
    }

    /// Borrow USDC against all deposited NFTs
    #[instrument(skip(self))]
    pub fn borrow(&mut self, amount: Decimal) -> Result<BorrowReceipt> {
        self.require_wallet()?;

        let deposited = self.registry.deposited();
        if deposited.is_empty() {
            return Err(CollateralError::NoCollateral.into());
        }
        let collateral_count = deposited.len();
        let additional = self.positions.active_pooled().is_some();

        let (position_id, fee) = self.positions.borrow_additional(amount, &deposited)?;
        let net = amount - fee;
        self.session.wallet_mut()?.credit(net)?;

        let description = if additional {
            format!(
                "Borrowed additional {} {} against {} deposited NFTs",
                amount, STABLE_TOKEN, collateral_count
            )
        } else {
            format!(
                "Borrowed {} {} against {} deposited NFTs",
                amount, STABLE_TOKEN, collateral_count
            )
        };
        self.transactions.record(
            TransactionDraft::new(TransactionKind::Borrow, amount, STABLE_TOKEN, description)
                .with_position(position_id.clone()),
        );

        Ok(BorrowReceipt {
            position_id,
            amount,
            fee,
            net,
            additional,
        })
    }

    /// Repay a pooled position from the wallet; returns the amount applied
    #[instrument(skip(self))]
    pub fn repay(&mut self, position_id: &str, amount: RepayAmount) -> Result<Decimal> {
        self.require_wallet()?;

        let position = self
            .positions
            .get(position_id)
            .ok_or_else(|| PositionError::NotFound(position_id.to_string()))?;
        if !position.is_active() {
            return Err(PositionError::Closed(position_id.to_string()).into());
        }
        let debt = position.borrowed_amount;
        if debt <= Decimal::ZERO {
            return Err(PositionError::NoDebt.into());
        }

        let requested = match amount {
            RepayAmount::Full => debt,
            RepayAmount::Partial(value) if value <= Decimal::ZERO => {
                return Err(PositionError::InvalidAmount.into())
            }
            RepayAmount::Partial(value) => value,
        };
        let to_apply = requested.min(debt);

        self.session.wallet_mut()?.debit(to_apply)?;
        let applied = self.positions.repay(position_id, to_apply)?;

        let description = if applied >= debt {
            format!("Full repayment of {} {}", applied, STABLE_TOKEN)
        } else {
            format!("Partial repayment of {} {}", applied, STABLE_TOKEN)
        };
        self.transactions.record(
            TransactionDraft::new(TransactionKind::Repay, applied, STABLE_TOKEN, description)
                .with_position(position_id)
                .with_gas(REPAY_GAS_USED),
        );

        Ok(applied)
    }

    /// Settle and close a position, returning its NFTs to the wallet
    #[instrument(skip(self))]
    pub fn close_position(&mut self, position_id: &str) -> Result<Vec<String>> {
        self.require_wallet()?;

        let position = self
            .positions
            .get(position_id)
            .ok_or_else(|| PositionError::NotFound(position_id.to_string()))?;
        if !position.is_active() {
            return Err(PositionError::Closed(position_id.to_string()).into());
        }

        if position.kind() != Some(PositionKind::Pooled) {
            let nft_id = position
                .collateral_nft_ids
                .first()
                .cloned()
                .ok_or_else(|| PositionError::NotFound(position_id.to_string()))?;
            self.withdraw_nft(&nft_id)?;
            return Ok(vec![nft_id]);
        }

        let debt = position.borrowed_amount;
        let nft_ids = position.collateral_nft_ids.clone();

        if debt > Decimal::ZERO {
            self.repay(position_id, RepayAmount::Full)?;
        }
        self.positions.close(position_id)?;

        let mut returned = Vec::with_capacity(nft_ids.len());
        for nft_id in &nft_ids {
            let Some(nft) = self.registry.get(nft_id) else {
                continue;
            };
            if !nft.is_deposited {
                continue;
            }
            if let Some(isolated) = nft.position_id.clone() {
                self.positions.close(&isolated)?;
            }
            returned.push(nft_id.clone());
        }
        if !returned.is_empty() {
            self.registry.withdraw(&returned)?;
        }

        self.transactions.record(
            TransactionDraft::new(
                TransactionKind::PositionClosed,
                debt,
                STABLE_TOKEN,
                format!("Closed position - {} NFTs returned to wallet", returned.len()),
            )
            .with_position(position_id)
            .with_nfts(returned.clone()),
        );

        info!(position = %position_id, returned = returned.len(), "Pooled position closed");
        Ok(returned)
    }

    /// Withdraw one NFT if the remaining collateral still covers the debt
    #[instrument(skip(self))]
    pub fn withdraw_nft(&mut self, nft_id: &str) -> Result<()> {
        self.require_wallet()?;

        let nft = self
            .registry
            .get(nft_id)
            .ok_or_else(|| CollateralError::NotFound(nft_id.to_string()))?
            .clone();
        if !nft.is_deposited {
            return Err(CollateralError::NotDeposited(nft_id.to_string()).into());
        }

        let debt = self.positions.total_borrowed();
        let check = accounting::withdrawal_check(&self.registry.deposited(), nft_id, debt);
        if !check.allowed {
            warn!(nft = %nft_id, remaining = %check.remaining_value, %debt, "Withdrawal rejected");
            return Err(CollateralError::WithdrawalWouldUndercollateralize {
                nft_id: nft_id.to_string(),
                remaining: check.remaining_value,
                debt,
            }
            .into());
        }

        if let Some(isolated) = nft.position_id.as_deref() {
            if self.positions.get(isolated).map(Position::is_active).unwrap_or(false) {
                self.positions.close(isolated)?;
            }
        }
        self.positions.detach_collateral(&nft);
        self.registry.withdraw(&[nft.id.clone()])?;

        // An emptied, settled pool has nothing left to track
        if let Some(pool) = self.positions.active_pooled() {
            if pool.collateral_nft_ids.is_empty() && pool.borrowed_amount <= Decimal::ZERO {
                let pool_id = pool.id.clone();
                self.positions.close(&pool_id)?;
            }
        }

        let mut draft = TransactionDraft::new(
            TransactionKind::Withdraw,
            Decimal::ZERO,
            NFT_TOKEN,
            format!("NFT \"{}\" withdrawn from collateral", nft.name),
        )
        .with_nfts(vec![nft.id.clone()]);
        if let Some(isolated) = nft.position_id {
            draft = draft.with_position(isolated);
        }
        self.transactions.record(draft);

        Ok(())
    }

    // ============ LENDER ACTIONS ============

    /// Move USDC from the wallet into the lending pool
    #[instrument(skip(self))]
    pub fn lend(&mut self, amount: Decimal) -> Result<String> {
        self.require_wallet()?;
        self.session.wallet_mut()?.debit(amount)?;
        let id = self.lenders.deposit(amount)?;

        self.transactions.record(
            TransactionDraft::new(
                TransactionKind::Deposit,
                amount,
                STABLE_TOKEN,
                format!("Deposited {} {} into the lending pool", amount, STABLE_TOKEN),
            )
            .with_position(id.clone()),
        );
        Ok(id)
    }

    /// Withdraw from a lender position; the wallet receives the net amount
    #[instrument(skip(self))]
    pub fn withdraw_lending(&mut self, lender_id: &str, amount: Decimal) -> Result<WithdrawalReceipt> {
        self.require_wallet()?;
        let receipt = self.lenders.withdraw(lender_id, amount)?;
        self.session.wallet_mut()?.credit(receipt.net)?;
        self.protocol_revenue += receipt.fee;

        self.transactions.record(
            TransactionDraft::new(
                TransactionKind::Withdraw,
                receipt.gross,
                STABLE_TOKEN,
                format!(
                    "Withdrawn {} {} from lending pool (Net: {} after 1% fee)",
                    receipt.gross,
                    STABLE_TOKEN,
                    receipt.net.round_dp(2)
                ),
            )
            .with_position(lender_id),
        );
        Ok(receipt)
    }

    pub fn toggle_auto_reinvest(&mut self, lender_id: &str) -> Result<bool> {
        Ok(self.lenders.toggle_auto_reinvest(lender_id)?)
    }

    // ============ VIEWS ============

    pub fn total_collateral_value(&self) -> Decimal {
        self.registry.deposited_value()
    }

    pub fn weighted_ltv(&self) -> Decimal {
        accounting::weighted_ltv(&self.registry.deposited())
    }

    pub fn max_borrow_amount(&self) -> Decimal {
        accounting::max_borrow(&self.registry.deposited())
    }

    pub fn available_to_borrow(&self) -> Decimal {
        accounting::available_to_borrow(self.max_borrow_amount(), self.positions.total_borrowed())
    }

    /// Borrower dashboard view, derived from scratch
    pub fn portfolio(&self) -> Portfolio {
        let deposited = self.registry.deposited();
        let debt = self.positions.total_borrowed();
        let pool = self.positions.active_pooled();

        let collateral: Vec<CollateralEntry> = deposited
            .iter()
            .map(|nft| CollateralEntry {
                nft_id: nft.id.clone(),
                name: nft.name.clone(),
                value: nft.floor_price,
                ltv: nft.ltv,
                position_id: nft.position_id.clone(),
                pooled: pool
                    .map(|p| p.collateral_nft_ids.contains(&nft.id))
                    .unwrap_or(false),
                can_withdraw: accounting::withdrawal_check(&deposited, &nft.id, debt).allowed,
            })
            .collect();

        let active = self.positions.active();
        let total_yield_earned = active.iter().map(|p| p.yield_earned).sum();
        let total_yield_shared = active.iter().map(|p| p.yield_shared).sum();

        let total_collateral = accounting::total_collateral_value(deposited.iter().copied());
        let weighted_ltv = accounting::weighted_ltv(&deposited);
        let max_borrow = accounting::max_borrow(&deposited);
        let health_factor = accounting::health_factor(max_borrow, debt);
        let min_collateral_required = accounting::min_collateral_required(debt, weighted_ltv);

        Portfolio {
            collateral,
            total_collateral,
            total_borrowed: debt,
            total_yield_earned,
            total_yield_shared,
            weighted_ltv,
            max_borrow,
            available_to_borrow: accounting::available_to_borrow(max_borrow, debt),
            average_yield: accounting::average_yield(&deposited),
            health_factor,
            health_band: HealthBand::classify(health_factor),
            min_collateral_required,
            max_collateral_withdraw: accounting::max_collateral_withdraw(
                total_collateral,
                min_collateral_required,
            ),
            repayment_progress: pool.map(Position::repayment_progress).unwrap_or(Decimal::ZERO),
            estimated_payoff_months: accounting::estimated_payoff_months(
                debt,
                accounting::annual_yield(&deposited),
            ),
        }
    }

    pub fn platform_stats(&self) -> PlatformStats {
        let lender_deposits = self.lenders.total_deposited();
        let total_borrow = self.positions.total_borrowed();

        PlatformStats {
            tvl: self.registry.deposited_value() + lender_deposits,
            total_loans: self
                .positions
                .all()
                .iter()
                .filter(|p| p.is_pooled())
                .count(),
            total_borrow,
            available_fund: (lender_deposits - total_borrow).max(Decimal::ZERO),
            protocol_revenue: self.protocol_revenue,
        }
    }

    // ============ SNAPSHOTS ============

    pub fn restore_session(&mut self, session: WalletSession) {
        self.session = session;
    }

    pub fn restore_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = TransactionLog::from_records(transactions);
    }

    pub fn restore_registry(&mut self, nfts: Vec<Nft>) {
        self.registry = NftRegistry::new(nfts);
    }

    pub fn restore_positions(&mut self, positions: Vec<Position>) {
        self.positions.restore(positions);
    }

    pub fn restore_lenders(&mut self, positions: Vec<LenderPosition>) {
        self.lenders.restore(positions);
    }
}

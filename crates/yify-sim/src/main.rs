//! YIFY Simulator Binary
//!
//! Connects a mock wallet, opens a loan against the network's NFTs, funds the
//! lending pool and then lets weekly and monthly epochs pay the loan down.

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yify_common::{Epoch, VERSION};
use yify_ledger::{
    EpochReport, FileSnapshotStore, InMemorySnapshotStore, LendingService, SnapshotStore,
    YifyConfig,
};

/// Opening lender deposit
const SEED_LIQUIDITY: Decimal = dec!(1000);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting YIFY simulator v{}", VERSION);

    let config = YifyConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let store: Arc<dyn SnapshotStore> = match &config.data_dir {
        Some(dir) => Arc::new(FileSnapshotStore::open(dir).await?),
        None => Arc::new(InMemorySnapshotStore::new()),
    };

    let service = LendingService::new(config.clone(), store);
    if service.restore().await? {
        info!("Resumed from snapshot");
    }

    let wallet = service.resume_wallet(&config.wallet).await?;
    info!(wallet = %wallet.name, address = %wallet.address, balance = %wallet.balance, "Wallet ready");

    open_session(&service).await?;
    run_epochs(&service, &config).await?;

    let stats = service.platform_stats();
    let volume = service.ledger().read().transactions().total_volume();
    info!(
        tvl = %stats.tvl,
        total_borrow = %stats.total_borrow,
        available_fund = %stats.available_fund,
        protocol_revenue = %stats.protocol_revenue,
        "Platform stats"
    );
    info!(
        borrowed = %volume.borrowed,
        repaid = %volume.repaid,
        yield_earned = %volume.yield_earned,
        balance = %service.balance(),
        "Session volume"
    );

    Ok(())
}

/// Deposit the network's NFTs, borrow half the capacity and seed the pool
async fn open_session(service: &LendingService) -> Result<()> {
    let (available, has_debt, has_lenders) = {
        let ledger = service.ledger();
        let ledger = ledger.read();
        let available: Vec<String> = ledger
            .nfts_on_network()
            .into_iter()
            .filter(|nft| !nft.is_deposited)
            .map(|nft| nft.id.clone())
            .collect();
        (
            available,
            ledger.positions().total_borrowed() > Decimal::ZERO,
            !ledger.lenders().positions().is_empty(),
        )
    };

    if !has_lenders {
        match service.lend(SEED_LIQUIDITY).await {
            Ok(id) => info!(position = %id, amount = %SEED_LIQUIDITY, "Lending pool funded"),
            Err(e) => warn!(error = %e, "Could not fund lending pool"),
        }
    }

    if !available.is_empty() {
        let positions = service.deposit_nfts(available).await?;
        info!(count = positions.len(), "Collateral deposited");
    }

    if !has_debt {
        let capacity = service.portfolio().available_to_borrow;
        let amount = (capacity / Decimal::TWO).round_dp(2);
        if amount > Decimal::ZERO {
            let receipt = service.borrow(amount).await?;
            info!(
                position = %receipt.position_id,
                amount = %receipt.amount,
                fee = %receipt.fee,
                "Loan opened"
            );
        }
    }

    Ok(())
}

/// Tick weekly and monthly epochs until the configured number of weeks ran
async fn run_epochs(service: &LendingService, config: &YifyConfig) -> Result<()> {
    let mut weekly = interval(config.weekly_epoch());
    let mut monthly = interval(config.monthly_epoch());
    weekly.set_missed_tick_behavior(MissedTickBehavior::Delay);
    monthly.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // First tick completes immediately
    weekly.tick().await;
    monthly.tick().await;

    let mut weeks = 0;
    while weeks < config.epochs {
        tokio::select! {
            _ = weekly.tick() => {
                weeks += 1;
                let report = service.run_epoch(Epoch::Weekly).await?;
                log_epoch(service, weeks, &report);
            }
            _ = monthly.tick() => {
                let report = service.run_epoch(Epoch::Monthly).await?;
                log_epoch(service, weeks, &report);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

fn log_epoch(service: &LendingService, week: u32, report: &EpochReport) {
    let portfolio = service.portfolio();
    info!(
        week,
        epoch = ?report.epoch,
        gross = %report.gross_yield.round_dp(2),
        repaid = %report.repaid.round_dp(2),
        lenders = %report.lender_share.round_dp(2),
        debt = %portfolio.total_borrowed.round_dp(2),
        progress = %portfolio.repayment_progress.round_dp(1),
        health = ?portfolio.health_band,
        "Epoch settled"
    );
}

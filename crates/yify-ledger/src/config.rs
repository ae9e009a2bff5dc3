//! Simulator configuration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use yify_common::{YifyError, DEFAULT_LENDER_APR};

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YifyConfig {
    /// Fake settlement latency applied before every action
    pub settlement_delay_ms: u64,
    /// Wall-clock length of one weekly epoch
    pub weekly_epoch_ms: u64,
    /// Wall-clock length of one monthly epoch
    pub monthly_epoch_ms: u64,
    /// Snapshot directory; in-memory snapshots when unset
    pub data_dir: Option<PathBuf>,
    /// Preset wallet to connect
    pub wallet: String,
    /// Weekly epochs the simulator runs before stopping
    pub epochs: u32,
    /// APR offered to lenders
    pub lender_apr: Decimal,
}

impl Default for YifyConfig {
    fn default() -> Self {
        Self {
            settlement_delay_ms: 2000,
            weekly_epoch_ms: 30_000,
            monthly_epoch_ms: 120_000,
            data_dir: None,
            wallet: "MetaMask".to_string(),
            epochs: 8,
            lender_apr: DEFAULT_LENDER_APR,
        }
    }
}

impl YifyConfig {
    /// Load configuration from `.env` and `YIFY_*` variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(val) = std::env::var("YIFY_SETTLEMENT_DELAY_MS") {
            if let Ok(v) = val.parse() {
                cfg.settlement_delay_ms = v;
            }
        }
        if let Ok(val) = std::env::var("YIFY_WEEKLY_EPOCH_MS") {
            if let Ok(v) = val.parse() {
                cfg.weekly_epoch_ms = v;
            }
        }
        if let Ok(val) = std::env::var("YIFY_MONTHLY_EPOCH_MS") {
            if let Ok(v) = val.parse() {
                cfg.monthly_epoch_ms = v;
            }
        }
        if let Ok(dir) = std::env::var("YIFY_DATA_DIR") {
            if !dir.is_empty() {
                cfg.data_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(wallet) = std::env::var("YIFY_WALLET") {
            cfg.wallet = wallet;
        }
        if let Ok(val) = std::env::var("YIFY_EPOCHS") {
            if let Ok(v) = val.parse() {
                cfg.epochs = v;
            }
        }
        if let Ok(val) = std::env::var("YIFY_LENDER_APR") {
            if let Ok(v) = val.parse() {
                cfg.lender_apr = v;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the simulator cannot run with
    pub fn validate(&self) -> yify_common::Result<()> {
        if self.weekly_epoch_ms == 0 || self.monthly_epoch_ms == 0 {
            return Err(YifyError::Config("epoch length must be non-zero".to_string()));
        }
        if self.lender_apr < Decimal::ZERO {
            return Err(YifyError::Config(format!(
                "lender APR must not be negative, got {}",
                self.lender_apr
            )));
        }
        Ok(())
    }

    /// Config with zero settlement latency, for tests
    pub fn instant() -> Self {
        Self {
            settlement_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn settlement_delay(&self) -> Duration {
        Duration::from_millis(self.settlement_delay_ms)
    }

    pub fn weekly_epoch(&self) -> Duration {
        Duration::from_millis(self.weekly_epoch_ms)
    }

    pub fn monthly_epoch(&self) -> Duration {
        Duration::from_millis(self.monthly_epoch_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = YifyConfig::default();
        assert_eq!(cfg.settlement_delay(), Duration::from_secs(2));
        assert_eq!(cfg.monthly_epoch(), cfg.weekly_epoch() * 4);
        assert_eq!(cfg.lender_apr, DEFAULT_LENDER_APR);
        assert!(cfg.data_dir.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(YifyConfig::default().validate().is_ok());

        let cfg = YifyConfig {
            weekly_epoch_ms: 0,
            ..YifyConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(YifyError::Config(_))));
    }

    #[test]
    fn test_instant() {
        assert_eq!(YifyConfig::instant().settlement_delay(), Duration::ZERO);
    }
}

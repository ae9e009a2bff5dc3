//! Mock USDC wallet
//!
//! A single connected wallet holds the borrower's USDC balance. Every borrow,
//! repayment, lending deposit and withdrawal moves this balance. There is no
//! signing; connecting simply selects one of the preset mock wallets.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wallet operation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalletError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("No wallet connected")]
    NotConnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet provider name
    pub name: String,

    pub address: String,

    /// USDC balance
    pub balance: Decimal,

    /// Bumped on every balance change
    pub version: u64,

    /// Timestamp of last modification
    pub updated_at: i64,
}

impl Wallet {
    pub fn new(name: impl Into<String>, address: impl Into<String>, balance: Decimal) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            balance,
            version: 0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Preset wallets offered on connect
    pub fn presets() -> Vec<Wallet> {
        vec![
            Wallet::new(
                "MetaMask",
                "0x742d35Cc6347d2b5c6b1E8E5a1d6F9e4a2b3c4d5",
                dec!(15000),
            ),
            Wallet::new(
                "Coinbase Wallet",
                "0x1234567890abcdef1234567890abcdef12345678",
                dec!(25000),
            ),
            Wallet::new(
                "WalletConnect",
                "0xabcdef1234567890abcdef1234567890abcdef12",
                dec!(5000),
            ),
        ]
    }

    /// Look up a preset by provider name
    pub fn preset(name: &str) -> Option<Wallet> {
        Self::presets().into_iter().find(|w| w.name == name)
    }

    pub fn credit(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }

        self.balance += amount;
        self.touch();
        Ok(())
    }

    pub fn debit(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }

        if self.balance < amount {
            return Err(WalletError::InsufficientBalance {
                required: amount,
                available: self.balance,
            });
        }

        self.balance -= amount;
        self.touch();
        Ok(())
    }

    /// Apply a signed delta, clamping the balance at zero
    pub fn adjust(&mut self, delta: Decimal) {
        self.balance = (self.balance + delta).max(Decimal::ZERO);
        self.touch();
    }

    /// Update version and timestamp
    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

impl std::fmt::Display for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wallet({}, balance={} USDC)", self.name, self.balance)
    }
}

/// Connection state over an optional wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletSession {
    current: Option<Wallet>,
}

impl WalletSession {
    /// Connect a wallet; a known preset name replaces the given wallet
    pub fn connect(&mut self, wallet: Wallet) -> &Wallet {
        let wallet = Wallet::preset(&wallet.name).unwrap_or(wallet);
        self.current.insert(wallet)
    }

    pub fn disconnect(&mut self) -> Option<Wallet> {
        self.current.take()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }

    pub fn wallet(&self) -> Result<&Wallet, WalletError> {
        self.current.as_ref().ok_or(WalletError::NotConnected)
    }

    pub fn wallet_mut(&mut self) -> Result<&mut Wallet, WalletError> {
        self.current.as_mut().ok_or(WalletError::NotConnected)
    }

    /// Balance of the connected wallet, zero when disconnected
    pub fn balance(&self) -> Decimal {
        self.current.as_ref().map(|w| w.balance).unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_debit() {
        let mut wallet = Wallet::new("Test", "0x0", Decimal::ZERO);

        wallet.credit(dec!(100)).unwrap();
        assert_eq!(wallet.balance, dec!(100));

        wallet.debit(dec!(30)).unwrap();
        assert_eq!(wallet.balance, dec!(70));
    }

    #[test]
    fn test_insufficient_balance() {
        let mut wallet = Wallet::new("Test", "0x0", dec!(50));

        let result = wallet.debit(dec!(100));
        assert!(matches!(result, Err(WalletError::InsufficientBalance { .. })));
        assert_eq!(wallet.balance, dec!(50));
    }

    #[test]
    fn test_invalid_amount() {
        let mut wallet = Wallet::new("Test", "0x0", dec!(50));
        assert_eq!(wallet.credit(Decimal::ZERO), Err(WalletError::InvalidAmount));
        assert_eq!(wallet.debit(dec!(-1)), Err(WalletError::InvalidAmount));
    }

    #[test]
    fn test_adjust_clamps_at_zero() {
        let mut wallet = Wallet::new("Test", "0x0", dec!(50));
        wallet.adjust(dec!(-80));
        assert_eq!(wallet.balance, Decimal::ZERO);
    }

    #[test]
    fn test_version_increment() {
        let mut wallet = Wallet::new("Test", "0x0", Decimal::ZERO);
        let initial_version = wallet.version;

        wallet.credit(dec!(10)).unwrap();
        wallet.debit(dec!(5)).unwrap();
        assert_eq!(wallet.version, initial_version + 2);

        // Rejected debits leave the version alone
        assert!(wallet.debit(dec!(500)).is_err());
        assert_eq!(wallet.version, initial_version + 2);
    }

    #[test]
    fn test_session_connects_preset() {
        let mut session = WalletSession::default();
        assert!(matches!(session.wallet(), Err(WalletError::NotConnected)));

        let wallet = session.connect(Wallet::new("Coinbase Wallet", "0xignored", Decimal::ZERO));
        assert_eq!(wallet.balance, dec!(25000));
        assert!(session.is_connected());

        session.disconnect();
        assert_eq!(session.balance(), Decimal::ZERO);
    }

    #[test]
    fn test_session_accepts_unknown_wallet() {
        let mut session = WalletSession::default();
        session.connect(Wallet::new("Rabby", "0xabc", dec!(42)));
        assert_eq!(session.balance(), dec!(42));
    }
}

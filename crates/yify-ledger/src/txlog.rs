//! Append-only transaction log, newest first

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use yify_common::{Transaction, TransactionDraft, TransactionKind, TransactionStatus};

/// Default page size for [`TransactionLog::recent`]
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Confirmed volume by flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalVolume {
    pub borrowed: Decimal,
    pub repaid: Decimal,
    #[serde(rename = "yield")]
    pub yield_earned: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionLog {
    transactions: Vec<Transaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records (already newest first)
    pub fn from_records(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn all(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    /// Stamp and prepend a draft; returns the new id
    pub fn record(&mut self, draft: TransactionDraft) -> String {
        let tx = Transaction::from_draft(draft);
        let id = tx.id.clone();
        debug!(tx = %id, kind = tx.kind.as_str(), amount = %tx.amount, status = ?tx.status, "Transaction recorded");
        self.transactions.insert(0, tx);
        id
    }

    /// Rewrite the status of a record; returns false for unknown ids
    pub fn update_status(&mut self, id: &str, status: TransactionStatus) -> bool {
        match self.transactions.iter_mut().find(|tx| tx.id == id) {
            Some(tx) => {
                tx.status = status;
                true
            }
            None => false,
        }
    }

    pub fn by_position(&self, position_id: &str) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.position_id.as_deref() == Some(position_id))
            .collect()
    }

    pub fn by_kind(&self, kind: TransactionKind) -> Vec<&Transaction> {
        self.transactions.iter().filter(|tx| tx.kind == kind).collect()
    }

    pub fn recent(&self, limit: usize) -> &[Transaction] {
        &self.transactions[..limit.min(self.transactions.len())]
    }

    /// Borrowed, repaid and yield volume over confirmed records
    pub fn total_volume(&self) -> TotalVolume {
        self.transactions
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Confirmed)
            .fold(TotalVolume::default(), |mut acc, tx| {
                match tx.kind {
                    TransactionKind::Borrow => acc.borrowed += tx.amount,
                    TransactionKind::Repay => acc.repaid += tx.amount,
                    TransactionKind::Yield => acc.yield_earned += tx.amount,
                    _ => {}
                }
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(kind: TransactionKind, amount: Decimal) -> TransactionDraft {
        TransactionDraft::new(kind, amount, "USDC", "test")
    }

    #[test]
    fn test_newest_first() {
        let mut log = TransactionLog::new();
        let first = log.record(draft(TransactionKind::Borrow, dec!(100)));
        let second = log.record(draft(TransactionKind::Repay, dec!(50)));

        assert_eq!(log.all()[0].id, second);
        assert_eq!(log.all()[1].id, first);
        assert_eq!(log.recent(1).len(), 1);
        assert_eq!(log.recent(DEFAULT_RECENT_LIMIT).len(), 2);
    }

    #[test]
    fn test_update_status_only() {
        let mut log = TransactionLog::new();
        let id = log.record(draft(TransactionKind::Borrow, dec!(100)).with_status(TransactionStatus::Pending));
        let before = log.get(&id).unwrap().clone();

        assert!(log.update_status(&id, TransactionStatus::Failed));
        assert!(!log.update_status("tx-missing", TransactionStatus::Failed));

        let after = log.get(&id).unwrap();
        assert_eq!(after.status, TransactionStatus::Failed);
        assert_eq!(after.hash, before.hash);
        assert_eq!(after.amount, before.amount);
    }

    #[test]
    fn test_by_position() {
        let mut log = TransactionLog::new();
        log.record(draft(TransactionKind::Borrow, dec!(100)).with_position("borrow-1"));
        log.record(draft(TransactionKind::Repay, dec!(50)).with_position("borrow-1"));
        log.record(draft(TransactionKind::Borrow, dec!(10)).with_position("borrow-2"));

        assert_eq!(log.by_position("borrow-1").len(), 2);
        assert_eq!(log.by_kind(TransactionKind::Borrow).len(), 2);
    }

    #[test]
    fn test_total_volume_skips_failed() {
        let mut log = TransactionLog::new();
        log.record(draft(TransactionKind::Borrow, dec!(1000)));
        log.record(draft(TransactionKind::Borrow, dec!(500)).with_status(TransactionStatus::Failed));
        log.record(draft(TransactionKind::Repay, dec!(300)));
        log.record(draft(TransactionKind::Yield, dec!(12.5)));
        log.record(draft(TransactionKind::Deposit, Decimal::ZERO));

        let volume = log.total_volume();
        assert_eq!(volume.borrowed, dec!(1000));
        assert_eq!(volume.repaid, dec!(300));
        assert_eq!(volume.yield_earned, dec!(12.5));
    }
}

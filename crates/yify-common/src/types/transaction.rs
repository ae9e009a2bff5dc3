//! Mock transaction records
//!
//! Every user action and every yield credit leaves one record. Records are
//! append-only; `status` is the only field ever rewritten.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Borrow,
    Repay,
    #[serde(rename = "yield_earned")]
    Yield,
    PositionClosed,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Borrow => "borrow",
            TransactionKind::Repay => "repay",
            TransactionKind::Yield => "yield_earned",
            TransactionKind::PositionClosed => "position_closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Caller-supplied part of a transaction; id, timestamp and hash are assigned on record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub token: String,
    pub position_id: Option<String>,
    pub nft_ids: Vec<String>,
    pub status: TransactionStatus,
    pub gas_used: Option<u64>,
    pub description: String,
}

impl TransactionDraft {
    /// A confirmed draft with no position or NFT links
    pub fn new(
        kind: TransactionKind,
        amount: Decimal,
        token: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            amount,
            token: token.into(),
            position_id: None,
            nft_ids: Vec::new(),
            status: TransactionStatus::Confirmed,
            gas_used: None,
            description: description.into(),
        }
    }

    pub fn with_position(mut self, position_id: impl Into<String>) -> Self {
        self.position_id = Some(position_id.into());
        self
    }

    pub fn with_nfts(mut self, nft_ids: Vec<String>) -> Self {
        self.nft_ids = nft_ids;
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_gas(mut self, gas_used: u64) -> Self {
        self.gas_used = Some(gas_used);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub token: String,
    pub position_id: Option<String>,
    pub nft_ids: Vec<String>,
    /// Unix milliseconds
    pub timestamp: i64,
    /// Mock transaction hash (`0x` + 64 hex chars)
    pub hash: String,
    pub status: TransactionStatus,
    pub gas_used: Option<u64>,
    pub description: String,
}

impl Transaction {
    /// Stamp a draft with id, timestamp and hash
    pub fn from_draft(draft: TransactionDraft) -> Self {
        let id = format!("tx-{}", uuid::Uuid::now_v7());
        let timestamp = chrono::Utc::now().timestamp_millis();
        let hash = mock_hash(&id, draft.kind, draft.amount, &draft.token, timestamp);

        Self {
            id,
            kind: draft.kind,
            amount: draft.amount,
            token: draft.token,
            position_id: draft.position_id,
            nft_ids: draft.nft_ids,
            timestamp,
            hash,
            status: draft.status,
            gas_used: draft.gas_used,
            description: draft.description,
        }
    }
}

/// Deterministic mock hash over the identifying fields
pub fn mock_hash(
    id: &str,
    kind: TransactionKind,
    amount: Decimal,
    token: &str,
    timestamp: i64,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(id.as_bytes());
    hasher.update(kind.as_str().as_bytes());
    hasher.update(amount.to_string().as_bytes());
    hasher.update(token.as_bytes());
    hasher.update(&timestamp.to_le_bytes());
    format!("0x{}", hex::encode(hasher.finalize().as_bytes()))
}

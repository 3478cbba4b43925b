//! Types crossing the wallet engine boundary.
//!
//! The engine is treated as a black box: key management, chain scanning, and
//! transaction construction all happen behind the [`WalletEngine`](super::WalletEngine)
//! trait. What crosses the boundary is the small set of value types below,
//! plus the event stream consumed by the sync state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scan progress reported by the engine for the current sync session.
///
/// Batch fields describe the coarse scanning unit (a contiguous group of
/// blocks); block fields describe progress inside the current batch. A zero
/// `batch_total` or `total_blocks` means the engine could not report that
/// dimension, and the consumer must fall back to `percent` if present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 1-based index of the batch currently being scanned (0 = unavailable).
    pub batch_index: u32,
    /// Total number of batches in this session (0 = unavailable).
    pub batch_total: u32,
    /// Blocks scanned within the current batch.
    pub synced_blocks: u64,
    /// Blocks in the current batch (0 = unavailable).
    pub total_blocks: u64,
    /// Raw engine-reported percentage, when batch/block counters are absent.
    pub percent: Option<f64>,
}

/// Events emitted by the engine over the lifetime of a connection.
///
/// The sync state machine folds these into [`SyncStatus`](crate::wallet::sync::SyncStatus);
/// nothing else in the crate consumes them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The engine started a connection attempt to the lightwallet server.
    Connecting,
    /// Handshake with the server succeeded.
    Connected,
    /// The connection attempt failed before completing the handshake.
    ConnectionFailed { reason: String },
    /// A sync session started.
    SyncStarted,
    /// Per-batch scan progress for the active session.
    Progress(ProgressEvent),
    /// The active session finished scanning.
    SyncCompleted,
    /// The engine hit an error; the session does not auto-recover.
    Error { reason: String },
    /// Explicit disconnect from the server.
    Disconnected,
}

/// Result of generating or restoring a wallet.
///
/// The seed phrase is held only for the duration of the onboarding flow that
/// displays and verifies it; the coordinator discards it afterwards. It is
/// deliberately excluded from `Debug` output so it can never leak into logs.
#[derive(Clone)]
pub struct WalletCreationResult {
    /// 24-word BIP-39 mnemonic. Never logged.
    pub seed_phrase: String,
    /// Block height marking the wallet's origin, bounding restore rescans.
    pub birthday_height: Option<u32>,
    /// Chain tip observed by the engine at creation time, when known.
    pub latest_block_height: Option<u32>,
}

impl std::fmt::Debug for WalletCreationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCreationResult")
            .field("seed_phrase", &"<redacted>")
            .field("birthday_height", &self.birthday_height)
            .field("latest_block_height", &self.latest_block_height)
            .finish()
    }
}

/// Balance snapshot from the engine, in zatoshi.
///
/// Unconfirmed funds are tracked separately so the UI can show incoming
/// mempool transactions before they are mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Funds with at least one confirmation.
    pub confirmed: u64,
    /// Funds seen in the mempool but not yet mined.
    pub unconfirmed: u64,
}

impl BalanceSnapshot {
    /// Total spendable-plus-pending balance.
    pub fn total(&self) -> u64 {
        self.confirmed.saturating_add(self.unconfirmed)
    }
}

/// A single transaction as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    /// Transaction id (hex).
    pub txid: String,
    /// Height of the containing block; `None` while unconfirmed.
    pub block_height: Option<u32>,
    /// Signed amount in zatoshi (negative for outgoing).
    pub amount: i64,
    /// Optional memo attached to the transaction.
    pub memo: Option<String>,
    /// Wall-clock time the transaction was observed or mined.
    pub timestamp: Option<DateTime<Utc>>,
    /// Confirmation count as last reported by the engine. Used as a fallback
    /// when the tip-height cache cannot answer.
    pub confirmations: Option<u32>,
}

/// Error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("key generation failed: {0}")]
    Generation(String),

    #[error("wallet restore failed: {0}")]
    Restore(String),

    #[error("sync failed: {0}")]
    Sync(String),

    #[error("server unreachable: {0}")]
    Connection(String),

    #[error("engine call failed: {0}")]
    Other(String),
}

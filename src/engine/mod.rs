//! Wallet engine contract.
//!
//! The cryptographic lightwallet engine (key derivation, chain scanning,
//! transaction construction) lives outside this crate. This module defines
//! the trait through which the coordination layer drives it, along with the
//! value types exchanged across that boundary.

/// Type definitions for engine data structures
mod types;

pub use types::*;

use futures_util::Stream;
use std::pin::Pin;

/// Stream of engine events consumed by the sync state machine.
pub type EngineEventStream = Pin<Box<dyn Stream<Item = EngineEvent> + Send>>;

/// Contract for the external lightwallet engine.
///
/// Implementations are expected to be cheap to clone behind an `Arc`; every
/// method may be called from an independent task. `sync` is the only
/// long-running call and communicates exclusively through its event stream.
#[async_trait::async_trait]
pub trait WalletEngine: Send + Sync {
    /// Generate a new wallet, returning the seed phrase and birthday height.
    ///
    /// Engines that know the chain tip are expected to set the birthday a
    /// safety margin below it (the reference engine uses tip minus 100) so a
    /// fresh wallet never rescans history it cannot have transacted in.
    async fn generate_wallet(&self) -> Result<WalletCreationResult, EngineError>;

    /// Restore a wallet from an already-validated seed phrase.
    ///
    /// A `birthday_height` of 0 requests a full rescan from genesis.
    async fn restore_wallet(&self, seed_phrase: &str, birthday_height: u32)
    -> Result<(), EngineError>;

    /// Commit a generated wallet after the user has verified the seed.
    async fn create_wallet(&self, seed_phrase: &str) -> Result<(), EngineError>;

    /// Start a sync session, returning the stream of events it produces.
    ///
    /// The stream ends when the session completes, errors out, or the
    /// connection drops; callers re-invoke `sync` for a new session.
    async fn sync(&self) -> Result<EngineEventStream, EngineError>;

    /// Current chain tip height as seen by the server.
    async fn get_current_block_height(&self) -> Result<u32, EngineError>;

    /// Latest balance snapshot.
    async fn get_balance(&self) -> Result<BalanceSnapshot, EngineError>;

    /// Latest transaction list, most recent first.
    async fn get_transactions(&self) -> Result<Vec<TransactionSummary>, EngineError>;
}

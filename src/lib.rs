//! Synchronization and state coordination layer for a mobile lightwallet.
//!
//! The cryptographic engine, credential storage, and label storage are
//! external services reached through traits; this crate owns everything
//! between them and the UI: the sync lifecycle state machine, the
//! confirmation cache, the address label index, the create/restore flow
//! coordinator, and the facade publishing merged immutable snapshots.

/// Credential/PIN storage contract
pub mod credentials;
/// Wallet engine contract and boundary types
pub mod engine;
/// Test doubles shared by unit tests and the demo binary
pub mod test_utils;
/// Formatting helpers
pub mod utils;
/// Sync, cache, lifecycle, and facade components
pub mod wallet;

pub use credentials::{CredentialStore, WalletMetadata};
pub use engine::{
    BalanceSnapshot, EngineError, EngineEvent, EngineEventStream, ProgressEvent,
    TransactionSummary, WalletCreationResult, WalletEngine,
};
pub use wallet::confirmations::{ConfirmationCache, ConfirmationCacheConfig};
pub use wallet::facade::{WalletSnapshot, WalletStateFacade};
pub use wallet::labels::{AddressLabelIndex, Label, LabelStore};
pub use wallet::lifecycle::{LifecycleConfig, SeedPresentation, WalletLifecycleCoordinator};
pub use wallet::sync::{
    ConnectionState, SyncMachineConfig, SyncPhase, SyncStateMachine, SyncStatus,
};
pub use wallet::types::{FlowStep, WalletFlowError};

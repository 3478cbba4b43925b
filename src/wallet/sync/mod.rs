//! Wallet synchronization module.
//!
//! Two pieces make up the sync layer:
//!
//! - `status`: the `SyncStatus` value type, the batch-weighted progress
//!   arithmetic, and the ETA estimator. Pure data and pure functions.
//! - `machine`: the `SyncStateMachine`, the single writer of `SyncStatus`.
//!   It ingests engine events, runs the event pump with connect/watchdog
//!   deadlines, and publishes each transition exactly once.
//!
//! Everything downstream (facade, UI) sees only immutable snapshots.

/// Connection/sync lifecycle state machine and event pump
pub mod machine;
/// Status value type and progress arithmetic
pub mod status;

pub use machine::{SyncMachineConfig, SyncStateMachine};
pub use status::{ConnectionState, SyncPhase, SyncStatus};

//! Wallet coordination layer.
//!
//! Everything that tracks or drives wallet state lives here: the sync state
//! machine and its status model, the confirmation cache, the address label
//! index, the create/restore lifecycle coordinator, and the facade that
//! merges all of it into the read model the UI observes.

/// Short-TTL cache of the remote chain tip
pub mod confirmations;
/// Merged read model for UI observers
pub mod facade;
/// In-memory address label index
pub mod labels;
/// Create/restore flow orchestration
pub mod lifecycle;
/// Connection and sync lifecycle state machine
pub mod sync;
/// Error taxonomy for the lifecycle flows
pub mod types;

pub use types::*;

use rand::Rng;

/// Generate an opaque wallet id for credential registration.
pub fn generate_wallet_id() -> String {
	let mut id = [0u8; 16];
	rand::rng().fill(&mut id);
	hex::encode(id)
}

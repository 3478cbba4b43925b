use crate::engine::EngineError;

/// Step of a create/restore flow, reported with failures so the caller can
/// judge whether a retry is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
	/// Key and mnemonic generation by the engine.
	GenerateKeys,
	/// User verification of the presented seed words.
	VerifySeed,
	/// Post-verification commit of the generated wallet.
	CommitWallet,
	/// Engine restore from an existing seed phrase.
	Restore,
	/// Storing the PIN in the credential store.
	SetPin,
	/// Recording wallet metadata in the credential store.
	Register,
	/// Authenticating with the freshly stored PIN.
	Authenticate,
	/// Arming the background sync session.
	StartSync,
}

impl std::fmt::Display for FlowStep {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			FlowStep::GenerateKeys => "key generation",
			FlowStep::VerifySeed => "seed verification",
			FlowStep::CommitWallet => "wallet commit",
			FlowStep::Restore => "wallet restore",
			FlowStep::SetPin => "PIN setup",
			FlowStep::Register => "wallet registration",
			FlowStep::Authenticate => "authentication",
			FlowStep::StartSync => "sync start",
		};
		f.write_str(name)
	}
}

/// Error types for the wallet lifecycle flows.
///
/// Validation errors are rejected at the boundary, before any engine or
/// credential call. `Busy` means a flow is already in progress and the second
/// attempt changed nothing; callers treat it as "already handled".
#[derive(Debug, thiserror::Error)]
pub enum WalletFlowError {
	#[error("invalid mnemonic: {0}")]
	InvalidMnemonic(String),

	#[error("invalid PIN: {0}")]
	InvalidPin(String),

	#[error("seed verification failed: {0}")]
	Verification(String),

	#[error("engine error during {step}: {source}")]
	Engine {
		step: FlowStep,
		source: EngineError,
	},

	#[error("credential store rejected {step}")]
	Credential { step: FlowStep },

	#[error("another wallet flow is already in progress")]
	Busy,

	#[error("timed out during {0}")]
	Timeout(FlowStep),
}

impl WalletFlowError {
	/// The flow step this error was raised in, when one applies.
	pub fn step(&self) -> Option<FlowStep> {
		match self {
			WalletFlowError::Engine { step, .. } | WalletFlowError::Credential { step } => {
				Some(*step)
			}
			WalletFlowError::Timeout(step) => Some(*step),
			WalletFlowError::Verification(_) => Some(FlowStep::VerifySeed),
			_ => None,
		}
	}
}

//! Create/restore wallet orchestration.
//!
//! The coordinator sequences the multi-step onboarding flows: key generation,
//! seed verification, PIN setup, registration, authentication, and finally
//! arming the sync state machine. Each flow is a plain `async` sequence with
//! one typed result; a step failure aborts the remaining steps, names the
//! step, and rolls back credentials that would otherwise be orphaned.
//!
//! At most one flow runs at a time. The create flow spans two calls —
//! `begin_create` stages the generated wallet while the user verifies the
//! seed, `complete_create` finishes it — and the staged seed never outlives
//! the flow: it is discarded on completion and on cancellation.

use crate::credentials::{CredentialStore, WalletMetadata};
use crate::engine::{WalletCreationResult, WalletEngine};
use crate::wallet::generate_wallet_id;
use crate::wallet::sync::SyncStateMachine;
use crate::wallet::types::{FlowStep, WalletFlowError};

use rand::seq::index::sample;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Expected mnemonic length for generated and restored wallets.
const SEED_WORD_COUNT: usize = 24;

/// Configuration for the lifecycle flows.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Number of seed words the user must re-enter during create.
    pub verification_word_count: usize,
    /// Accepted PIN lengths (digits only).
    pub min_pin_digits: usize,
    pub max_pin_digits: usize,
    /// Name recorded in the wallet metadata at registration.
    pub wallet_name: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            verification_word_count: 4,
            min_pin_digits: 4,
            max_pin_digits: 8,
            wallet_name: "primary".to_string(),
        }
    }
}

/// Seed material handed to the UI for display and verification.
///
/// `challenge_positions` are 0-based word indices, sorted ascending; the
/// answers passed to [`WalletLifecycleCoordinator::complete_create`] must be
/// aligned with them.
#[derive(Debug)]
pub struct SeedPresentation {
    pub words: Vec<String>,
    pub birthday_height: Option<u32>,
    pub latest_block_height: Option<u32>,
    pub challenge_positions: Vec<usize>,
}

struct PendingWallet {
    creation: WalletCreationResult,
    words: Vec<String>,
    challenge: Vec<usize>,
}

/// Orchestrates the create and restore flows.
pub struct WalletLifecycleCoordinator {
    engine: Arc<dyn WalletEngine>,
    credentials: Arc<dyn CredentialStore>,
    machine: Arc<SyncStateMachine>,
    config: LifecycleConfig,
    /// Single-flow permit; held from `begin_create` (or `restore` entry)
    /// until the flow completes, fails terminally, or is cancelled.
    flow_active: AtomicBool,
    pending: Mutex<Option<PendingWallet>>,
}

impl WalletLifecycleCoordinator {
    pub fn new(
        engine: Arc<dyn WalletEngine>,
        credentials: Arc<dyn CredentialStore>,
        machine: Arc<SyncStateMachine>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            engine,
            credentials,
            machine,
            config,
            flow_active: AtomicBool::new(false),
            pending: Mutex::new(None),
        }
    }

    /// Start the create flow: generate a wallet and stage it for seed
    /// verification.
    ///
    /// The returned presentation carries the seed words for display plus the
    /// verification challenge. The flow permit stays held until
    /// `complete_create` or `cancel_flow`.
    pub async fn begin_create(&self) -> Result<SeedPresentation, WalletFlowError> {
        self.acquire_flow()?;

        let creation = match self.engine.generate_wallet().await {
            Ok(creation) => creation,
            Err(source) => {
                self.release_flow();
                return Err(WalletFlowError::Engine {
                    step: FlowStep::GenerateKeys,
                    source,
                });
            }
        };

        let words: Vec<String> = creation
            .seed_phrase
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if words.len() != SEED_WORD_COUNT {
            self.release_flow();
            return Err(WalletFlowError::Engine {
                step: FlowStep::GenerateKeys,
                source: crate::engine::EngineError::Generation(format!(
                    "engine produced a {}-word phrase, expected {}",
                    words.len(),
                    SEED_WORD_COUNT
                )),
            });
        }

        let challenge = select_challenge_positions(words.len(), self.config.verification_word_count);
        info!(
            "wallet generated, awaiting verification of {} seed words",
            challenge.len()
        );

        let presentation = SeedPresentation {
            words: words.clone(),
            birthday_height: creation.birthday_height,
            latest_block_height: creation.latest_block_height,
            challenge_positions: challenge.clone(),
        };

        *self.pending.lock().unwrap() = Some(PendingWallet {
            creation,
            words,
            challenge,
        });

        Ok(presentation)
    }

    /// Finish the create flow: verify the challenge answers, commit the
    /// wallet, store credentials, and arm background sync.
    ///
    /// `answers` must align with the challenge positions from `begin_create`.
    /// Retryable failures (verification, credential refusals) keep the staged
    /// wallet so a retry continues with the same seed — the flow never
    /// silently regenerates a phrase the user has already seen.
    pub async fn complete_create(
        &self,
        answers: &[String],
        pin: &str,
    ) -> Result<(), WalletFlowError> {
        validate_pin(pin, &self.config)?;

        let (seed_phrase, birthday_height) = {
            let pending_guard = self.pending.lock().unwrap();
            let pending = pending_guard.as_ref().ok_or_else(|| {
                WalletFlowError::Verification(
                    "no wallet creation flow is awaiting verification".to_string(),
                )
            })?;
            verify_challenge(pending, answers)?;
            (
                pending.creation.seed_phrase.clone(),
                pending.creation.birthday_height,
            )
        };

        self.engine
            .create_wallet(&seed_phrase)
            .await
            .map_err(|source| WalletFlowError::Engine {
                step: FlowStep::CommitWallet,
                source,
            })?;

        self.store_credentials(Some(&seed_phrase), birthday_height, pin)
            .await?;

        // Hand over to the sync machine without awaiting the session; the UI
        // navigates on immediately and observes progress via subscription.
        self.machine.start_sync();

        // Flow done: the in-memory seed copy must not survive it.
        *self.pending.lock().unwrap() = None;
        self.release_flow();
        info!("create flow completed, background sync armed");
        Ok(())
    }

    /// Abandon a staged create flow, discarding the seed and releasing the
    /// flow permit.
    pub fn cancel_flow(&self) {
        let had_pending = self.pending.lock().unwrap().take().is_some();
        if had_pending {
            info!("create flow cancelled, staged seed discarded");
        }
        self.release_flow();
    }

    /// Restore a wallet from an existing mnemonic.
    ///
    /// The phrase is validated against the BIP-39 checksum before any engine
    /// call; an invalid phrase never reaches the engine. A `birthday_height`
    /// of 0 requests a full rescan.
    pub async fn restore(
        &self,
        seed_phrase: &str,
        birthday_height: u32,
        pin: &str,
    ) -> Result<(), WalletFlowError> {
        // Fail fast on bad input before taking the flow permit.
        validate_mnemonic(seed_phrase)?;
        validate_pin(pin, &self.config)?;

        self.acquire_flow()?;

        let result = self.run_restore(seed_phrase, birthday_height, pin).await;
        self.release_flow();
        result
    }

    async fn run_restore(
        &self,
        seed_phrase: &str,
        birthday_height: u32,
        pin: &str,
    ) -> Result<(), WalletFlowError> {
        self.engine
            .restore_wallet(seed_phrase, birthday_height)
            .await
            .map_err(|source| WalletFlowError::Engine {
                step: FlowStep::Restore,
                source,
            })?;

        let birthday = (birthday_height > 0).then_some(birthday_height);
        self.store_credentials(None, birthday, pin).await?;

        self.machine.start_sync();
        info!("restore flow completed, background sync armed");
        Ok(())
    }

    /// Shared PIN/registration/authentication tail of both flows.
    ///
    /// Rollback: a registration refusal clears the just-stored PIN so a retry
    /// cannot strand a credential with no wallet behind it. A failure after
    /// registration keeps the registration — retrying authentication is safe.
    async fn store_credentials(
        &self,
        seed_phrase: Option<&str>,
        birthday_height: Option<u32>,
        pin: &str,
    ) -> Result<(), WalletFlowError> {
        if !self.credentials.set_pin(pin).await {
            return Err(WalletFlowError::Credential {
                step: FlowStep::SetPin,
            });
        }

        let wallet_id = generate_wallet_id();
        let metadata = WalletMetadata {
            name: self.config.wallet_name.clone(),
            birthday_height,
        };
        if !self
            .credentials
            .register_wallet(&wallet_id, seed_phrase, &metadata)
            .await
        {
            warn!("wallet registration refused, rolling back PIN");
            if !self.credentials.clear_pin().await {
                warn!("PIN rollback refused; credential left marked incomplete");
            }
            return Err(WalletFlowError::Credential {
                step: FlowStep::Register,
            });
        }

        if !self.credentials.authenticate(pin).await {
            return Err(WalletFlowError::Credential {
                step: FlowStep::Authenticate,
            });
        }

        Ok(())
    }

    fn acquire_flow(&self) -> Result<(), WalletFlowError> {
        if self.flow_active.swap(true, Ordering::SeqCst) {
            return Err(WalletFlowError::Busy);
        }
        Ok(())
    }

    fn release_flow(&self) {
        self.flow_active.store(false, Ordering::SeqCst);
    }
}

/// Pick distinct word positions for the verification challenge.
///
/// Positions are drawn without replacement from a CSPRNG; the selection must
/// not be predictable or repetitive across rapid calls.
fn select_challenge_positions(word_count: usize, amount: usize) -> Vec<usize> {
    let amount = amount.min(word_count);
    let mut rng = rand::rng();
    let mut positions = sample(&mut rng, word_count, amount).into_vec();
    positions.sort_unstable();
    positions
}

fn verify_challenge(pending: &PendingWallet, answers: &[String]) -> Result<(), WalletFlowError> {
    if answers.len() != pending.challenge.len() {
        return Err(WalletFlowError::Verification(format!(
            "expected {} answers, got {}",
            pending.challenge.len(),
            answers.len()
        )));
    }
    for (answer, &position) in answers.iter().zip(&pending.challenge) {
        if !answer.trim().eq_ignore_ascii_case(&pending.words[position]) {
            return Err(WalletFlowError::Verification(format!(
                "word {} does not match",
                position + 1
            )));
        }
    }
    Ok(())
}

/// Validate a mnemonic's word count and BIP-39 checksum.
fn validate_mnemonic(seed_phrase: &str) -> Result<(), WalletFlowError> {
    let word_count = seed_phrase.split_whitespace().count();
    if word_count != SEED_WORD_COUNT {
        return Err(WalletFlowError::InvalidMnemonic(format!(
            "expected {} words, got {}",
            SEED_WORD_COUNT, word_count
        )));
    }
    bip39::Mnemonic::parse(seed_phrase)
        .map_err(|e| WalletFlowError::InvalidMnemonic(e.to_string()))?;
    Ok(())
}

fn validate_pin(pin: &str, config: &LifecycleConfig) -> Result<(), WalletFlowError> {
    let length_ok = (config.min_pin_digits..=config.max_pin_digits).contains(&pin.len());
    if !length_ok {
        return Err(WalletFlowError::InvalidPin(format!(
            "PIN must be {}-{} digits",
            config.min_pin_digits, config.max_pin_digits
        )));
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(WalletFlowError::InvalidPin(
            "PIN must contain only digits".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingCredentialStore, ScriptedEngine, VALID_TEST_MNEMONIC};
    use crate::wallet::sync::SyncMachineConfig;
    use std::sync::atomic::Ordering as AtomicOrdering;

    struct Fixture {
        engine: Arc<ScriptedEngine>,
        credentials: Arc<RecordingCredentialStore>,
        coordinator: WalletLifecycleCoordinator,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        let credentials = Arc::new(RecordingCredentialStore::default());
        let machine = Arc::new(SyncStateMachine::new(
            engine.clone(),
            SyncMachineConfig::default(),
        ));
        let coordinator = WalletLifecycleCoordinator::new(
            engine.clone(),
            credentials.clone(),
            machine,
            LifecycleConfig::default(),
        );
        Fixture {
            engine,
            credentials,
            coordinator,
        }
    }

    fn answers_for(presentation: &SeedPresentation) -> Vec<String> {
        presentation
            .challenge_positions
            .iter()
            .map(|&i| presentation.words[i].clone())
            .collect()
    }

    #[tokio::test]
    async fn invalid_checksum_never_reaches_the_engine() {
        let f = fixture();
        // 24 valid words, invalid checksum.
        let phrase = ["abandon"; 24].join(" ");
        let err = f.coordinator.restore(&phrase, 0, "123456").await.unwrap_err();
        assert!(matches!(err, WalletFlowError::InvalidMnemonic(_)));
        assert_eq!(f.engine.restore_calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_word_count_is_rejected_before_the_engine() {
        let f = fixture();
        let err = f
            .coordinator
            .restore("abandon ability able", 0, "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletFlowError::InvalidMnemonic(_)));
        assert_eq!(f.engine.restore_calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn restore_runs_the_full_credential_sequence() {
        let f = fixture();
        f.coordinator
            .restore(VALID_TEST_MNEMONIC, 1_500_000, "123456")
            .await
            .unwrap();

        assert_eq!(f.engine.restore_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(f.credentials.stored_pin(), Some("123456".to_string()));
        assert!(f.credentials.registered_wallet().is_some());
        assert_eq!(f.credentials.authenticate_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bad_pin_format_is_rejected_before_the_engine() {
        let f = fixture();
        let err = f
            .coordinator
            .restore(VALID_TEST_MNEMONIC, 0, "12ab56")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletFlowError::InvalidPin(_)));
        assert_eq!(f.engine.restore_calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_flow_fails_fast_with_busy() {
        let f = fixture();
        let presentation = f.coordinator.begin_create().await.unwrap();

        // A restore while the create flow awaits verification is refused and
        // leaves the staged flow untouched.
        let err = f
            .coordinator
            .restore(VALID_TEST_MNEMONIC, 0, "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletFlowError::Busy));
        assert!(matches!(
            f.coordinator.begin_create().await.unwrap_err(),
            WalletFlowError::Busy
        ));

        let answers = answers_for(&presentation);
        f.coordinator.complete_create(&answers, "123456").await.unwrap();
    }

    #[tokio::test]
    async fn challenge_positions_are_distinct_and_in_range() {
        let f = fixture();
        let presentation = f.coordinator.begin_create().await.unwrap();

        let positions = &presentation.challenge_positions;
        assert_eq!(positions.len(), 4);
        assert!(positions.iter().all(|&p| p < 24));
        let mut deduped = positions.clone();
        deduped.dedup();
        assert_eq!(&deduped, positions);
    }

    #[tokio::test]
    async fn wrong_answer_keeps_the_staged_seed_for_retry() {
        let f = fixture();
        let presentation = f.coordinator.begin_create().await.unwrap();

        let wrong = vec!["zebra".to_string(); presentation.challenge_positions.len()];
        let err = f.coordinator.complete_create(&wrong, "123456").await.unwrap_err();
        assert!(matches!(err, WalletFlowError::Verification(_)));

        // Retry with the right words succeeds without regenerating the seed.
        let answers = answers_for(&presentation);
        f.coordinator.complete_create(&answers, "123456").await.unwrap();
        assert_eq!(f.engine.generate_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(f.engine.create_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn registration_failure_rolls_back_the_pin() {
        let f = fixture();
        let presentation = f.coordinator.begin_create().await.unwrap();
        let answers = answers_for(&presentation);

        f.credentials.refuse_register(true);
        let err = f.coordinator.complete_create(&answers, "123456").await.unwrap_err();
        assert!(matches!(
            err,
            WalletFlowError::Credential {
                step: FlowStep::Register
            }
        ));
        assert_eq!(f.credentials.stored_pin(), None);
        assert_eq!(f.credentials.clear_pin_calls.load(AtomicOrdering::SeqCst), 1);

        // The staged seed survived; a retry completes with the same phrase.
        f.credentials.refuse_register(false);
        f.coordinator.complete_create(&answers, "123456").await.unwrap();
        assert_eq!(f.engine.generate_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(
            f.credentials.registered_wallet().unwrap().1,
            Some(presentation.words.join(" "))
        );
    }

    #[tokio::test]
    async fn completion_discards_the_staged_seed() {
        let f = fixture();
        let presentation = f.coordinator.begin_create().await.unwrap();
        let answers = answers_for(&presentation);
        f.coordinator.complete_create(&answers, "123456").await.unwrap();

        let err = f.coordinator.complete_create(&answers, "123456").await.unwrap_err();
        assert!(matches!(err, WalletFlowError::Verification(_)));
    }

    #[tokio::test]
    async fn cancel_releases_the_flow_permit() {
        let f = fixture();
        f.coordinator.begin_create().await.unwrap();
        f.coordinator.cancel_flow();

        // Both flows are available again.
        f.coordinator
            .restore(VALID_TEST_MNEMONIC, 0, "123456")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn engine_refusal_releases_the_flow_permit() {
        let f = fixture();
        f.engine.fail_generate(true);
        let err = f.coordinator.begin_create().await.unwrap_err();
        assert!(matches!(
            err,
            WalletFlowError::Engine {
                step: FlowStep::GenerateKeys,
                ..
            }
        ));

        f.engine.fail_generate(false);
        f.coordinator.begin_create().await.unwrap();
    }
}

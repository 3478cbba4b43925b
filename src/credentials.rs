//! Credential storage contract.
//!
//! PIN storage, wallet registration, and the biometric gate are platform
//! services (keychain, keystore) outside this crate. The lifecycle
//! coordinator drives them through this trait and rolls partial state back
//! when a flow aborts midway.

/// Metadata recorded alongside a registered wallet.
#[derive(Debug, Clone, Default)]
pub struct WalletMetadata {
    /// Human-readable wallet name.
    pub name: String,
    /// Birthday height recorded at registration, when known.
    pub birthday_height: Option<u32>,
}

/// Contract for the external credential/PIN store.
///
/// All methods report success as `true`; a `false` return is a refusal by the
/// platform store (not an I/O failure) and aborts the calling flow.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist the user's PIN.
    async fn set_pin(&self, pin: &str) -> bool;

    /// Remove a previously stored PIN. Used for rollback when a later flow
    /// step fails.
    async fn clear_pin(&self) -> bool;

    /// Check a PIN against the stored one.
    async fn authenticate(&self, pin: &str) -> bool;

    /// Record wallet metadata under the given id. The seed phrase is passed
    /// only when the platform store escrows it; `None` otherwise.
    async fn register_wallet(
        &self,
        wallet_id: &str,
        seed_phrase: Option<&str>,
        metadata: &WalletMetadata,
    ) -> bool;

    /// Whether a biometric unlock is available on this device.
    async fn is_biometrics_available(&self) -> bool;
}

//! Test doubles for the engine, credential store, and label store.
//!
//! These mocks are shared by the unit tests and the demo binary: a scripted
//! engine that replays a fixed event sequence, a credential store that
//! records every call, and an in-memory label store. All of them count calls
//! so tests can assert how often the real services would have been hit.

use crate::credentials::{CredentialStore, WalletMetadata};
use crate::engine::{
    BalanceSnapshot, EngineError, EngineEvent, EngineEventStream, TransactionSummary,
    WalletCreationResult, WalletEngine,
};
use crate::wallet::labels::{Label, LabelStore};

use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 24-word mnemonic with a valid BIP-39 checksum (all-zero entropy vector).
pub const VALID_TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon \
     abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
     abandon abandon abandon abandon abandon art";

enum Script {
    /// Yield the events, then end the stream.
    Finite(Vec<EngineEvent>),
    /// Yield the events, then stay silent forever (stream never ends).
    SilentAfter(Vec<EngineEvent>),
}

/// Engine double that replays a scripted event sequence from `sync()`.
pub struct ScriptedEngine {
    script: Mutex<Option<Script>>,
    height: AtomicU32,
    balance: Mutex<BalanceSnapshot>,
    transactions: Mutex<Vec<TransactionSummary>>,
    height_delay: Mutex<Option<Duration>>,
    fail_height: AtomicBool,
    fail_balance: AtomicBool,
    fail_generate: AtomicBool,

    pub generate_calls: AtomicUsize,
    pub restore_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub height_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
}

impl ScriptedEngine {
    /// Engine whose sync stream yields `events` and then ends.
    pub fn new(events: Vec<EngineEvent>) -> Self {
        Self::with_script(Script::Finite(events))
    }

    /// Engine whose sync stream yields `events` and then goes silent without
    /// ending, for watchdog tests.
    pub fn silent_after(events: Vec<EngineEvent>) -> Self {
        Self::with_script(Script::SilentAfter(events))
    }

    /// Engine whose sync stream never yields anything.
    pub fn hanging() -> Self {
        Self::with_script(Script::SilentAfter(Vec::new()))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            height: AtomicU32::new(500_000),
            balance: Mutex::new(BalanceSnapshot::default()),
            transactions: Mutex::new(Vec::new()),
            height_delay: Mutex::new(None),
            fail_height: AtomicBool::new(false),
            fail_balance: AtomicBool::new(false),
            fail_generate: AtomicBool::new(false),
            generate_calls: AtomicUsize::new(0),
            restore_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            height_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_height(&self, height: u32) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Delay every height fetch, opening a window for concurrent callers.
    pub fn set_height_delay(&self, delay: Duration) {
        *self.height_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_height(&self, fail: bool) {
        self.fail_height.store(fail, Ordering::SeqCst);
    }

    pub fn set_balance(&self, balance: BalanceSnapshot) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn fail_balance(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub fn fail_generate(&self, fail: bool) {
        self.fail_generate.store(fail, Ordering::SeqCst);
    }

    pub fn set_transactions(&self, transactions: Vec<TransactionSummary>) {
        *self.transactions.lock().unwrap() = transactions;
    }
}

#[async_trait::async_trait]
impl WalletEngine for ScriptedEngine {
    async fn generate_wallet(&self) -> Result<WalletCreationResult, EngineError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_generate.load(Ordering::SeqCst) {
            return Err(EngineError::Generation("scripted failure".to_string()));
        }
        let tip = self.height.load(Ordering::SeqCst);
        Ok(WalletCreationResult {
            seed_phrase: VALID_TEST_MNEMONIC.to_string(),
            birthday_height: Some(tip.saturating_sub(100)),
            latest_block_height: Some(tip),
        })
    }

    async fn restore_wallet(
        &self,
        _seed_phrase: &str,
        _birthday_height: u32,
    ) -> Result<(), EngineError> {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_wallet(&self, _seed_phrase: &str) -> Result<(), EngineError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sync(&self) -> Result<EngineEventStream, EngineError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().take();
        let stream: EngineEventStream = match script {
            Some(Script::Finite(events)) => Box::pin(futures::stream::iter(events)),
            Some(Script::SilentAfter(events)) => Box::pin(
                futures::stream::iter(events).chain(futures::stream::pending()),
            ),
            // Script already consumed: an empty, immediately-ended session.
            None => Box::pin(futures::stream::iter(Vec::<EngineEvent>::new())),
        };
        Ok(stream)
    }

    async fn get_current_block_height(&self) -> Result<u32, EngineError> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.height_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_height.load(Ordering::SeqCst) {
            return Err(EngineError::Connection("scripted failure".to_string()));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn get_balance(&self) -> Result<BalanceSnapshot, EngineError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(EngineError::Other("scripted failure".to_string()));
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_transactions(&self) -> Result<Vec<TransactionSummary>, EngineError> {
        Ok(self.transactions.lock().unwrap().clone())
    }
}

/// Credential store double that records every call.
#[derive(Default)]
pub struct RecordingCredentialStore {
    pin: Mutex<Option<String>>,
    registered: Mutex<Option<(String, Option<String>, String)>>,
    refuse_set_pin: AtomicBool,
    refuse_register: AtomicBool,
    refuse_authenticate: AtomicBool,

    pub set_pin_calls: AtomicUsize,
    pub clear_pin_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub authenticate_calls: AtomicUsize,
}

impl RecordingCredentialStore {
    pub fn refuse_set_pin(&self, refuse: bool) {
        self.refuse_set_pin.store(refuse, Ordering::SeqCst);
    }

    pub fn refuse_register(&self, refuse: bool) {
        self.refuse_register.store(refuse, Ordering::SeqCst);
    }

    pub fn refuse_authenticate(&self, refuse: bool) {
        self.refuse_authenticate.store(refuse, Ordering::SeqCst);
    }

    pub fn stored_pin(&self) -> Option<String> {
        self.pin.lock().unwrap().clone()
    }

    /// The registered wallet, as (id, escrowed seed phrase).
    pub fn registered_wallet(&self) -> Option<(String, Option<String>)> {
        self.registered
            .lock()
            .unwrap()
            .as_ref()
            .map(|(id, seed, _)| (id.clone(), seed.clone()))
    }
}

#[async_trait::async_trait]
impl CredentialStore for RecordingCredentialStore {
    async fn set_pin(&self, pin: &str) -> bool {
        self.set_pin_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_set_pin.load(Ordering::SeqCst) {
            return false;
        }
        *self.pin.lock().unwrap() = Some(pin.to_string());
        true
    }

    async fn clear_pin(&self) -> bool {
        self.clear_pin_calls.fetch_add(1, Ordering::SeqCst);
        *self.pin.lock().unwrap() = None;
        true
    }

    async fn authenticate(&self, pin: &str) -> bool {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_authenticate.load(Ordering::SeqCst) {
            return false;
        }
        self.pin.lock().unwrap().as_deref() == Some(pin)
    }

    async fn register_wallet(
        &self,
        wallet_id: &str,
        seed_phrase: Option<&str>,
        metadata: &WalletMetadata,
    ) -> bool {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_register.load(Ordering::SeqCst) {
            return false;
        }
        *self.registered.lock().unwrap() = Some((
            wallet_id.to_string(),
            seed_phrase.map(str::to_string),
            metadata.name.clone(),
        ));
        true
    }

    async fn is_biometrics_available(&self) -> bool {
        false
    }
}

/// In-memory label store recording fetches and supporting write rejection.
#[derive(Default)]
pub struct MemoryLabelStore {
    labels: Mutex<HashMap<String, Vec<Label>>>,
    reject_writes: AtomicBool,
    pub fetch_calls: AtomicUsize,
    last_fetch: Mutex<Vec<String>>,
}

impl MemoryLabelStore {
    pub async fn seed(&self, address: &str, labels: Vec<Label>) {
        self.labels.lock().unwrap().insert(address.to_string(), labels);
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Addresses requested by the most recent fetch.
    pub fn last_fetch(&self) -> Vec<String> {
        self.last_fetch.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LabelStore for MemoryLabelStore {
    async fn fetch(&self, addresses: &[String]) -> HashMap<String, Vec<Label>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fetch.lock().unwrap() = addresses.to_vec();
        let labels = self.labels.lock().unwrap();
        addresses
            .iter()
            .filter_map(|address| {
                labels
                    .get(address)
                    .map(|entry| (address.clone(), entry.clone()))
            })
            .collect()
    }

    async fn put(&self, address: &str, label: Label) -> bool {
        if self.reject_writes.load(Ordering::SeqCst) {
            return false;
        }
        let mut labels = self.labels.lock().unwrap();
        let entry = labels.entry(address.to_string()).or_default();
        match entry.iter_mut().find(|l| l.name == label.name) {
            Some(existing) => *existing = label,
            None => entry.push(label),
        }
        true
    }

    async fn remove(&self, address: &str, label_name: &str) -> bool {
        if self.reject_writes.load(Ordering::SeqCst) {
            return false;
        }
        if let Some(entry) = self.labels.lock().unwrap().get_mut(address) {
            entry.retain(|l| l.name != label_name);
        }
        true
    }
}

//! Merged read model for UI observers.
//!
//! The facade is the single object the UI subscribes to. It folds the sync
//! machine's status, the engine's balance/transaction snapshots, and the
//! confirmation cache into one immutable `WalletSnapshot`, republished at
//! most once per machine transition. There is no polling loop on the
//! UI-facing path, and the facade never retries a failed balance fetch —
//! the failure is surfaced and the refresh policy stays with the caller.

use crate::engine::{BalanceSnapshot, TransactionSummary, WalletEngine};
use crate::wallet::confirmations::ConfirmationCache;
use crate::wallet::labels::{AddressLabelIndex, Label};
use crate::wallet::sync::{SyncStateMachine, SyncStatus};

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Immutable merged snapshot delivered to observers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WalletSnapshot {
    pub sync: SyncStatus,
    /// Latest balance, absent until the first successful fetch.
    pub balance: Option<BalanceSnapshot>,
    /// Latest transaction list, most recent first.
    pub transactions: Vec<TransactionSummary>,
    /// Reason the last balance/transaction fetch failed, if it did. Cleared
    /// by the next successful fetch.
    pub balance_error: Option<String>,
}

/// UI-facing read model over the whole coordination layer.
pub struct WalletStateFacade {
    engine: Arc<dyn WalletEngine>,
    confirmations: Arc<ConfirmationCache>,
    labels: Arc<AddressLabelIndex>,
    snapshot_tx: watch::Sender<WalletSnapshot>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl WalletStateFacade {
    /// Build the facade and start republishing machine transitions.
    ///
    /// Balance and transactions are refreshed once per completed sync
    /// session; other transitions republish the merged snapshot as-is.
    pub fn new(
        engine: Arc<dyn WalletEngine>,
        machine: &SyncStateMachine,
        confirmations: Arc<ConfirmationCache>,
        labels: Arc<AddressLabelIndex>,
    ) -> Self {
        let initial = WalletSnapshot {
            sync: machine.current_status(),
            ..Default::default()
        };
        let (snapshot_tx, _) = watch::channel(initial);

        let pump = {
            let engine = engine.clone();
            let snapshot_tx = snapshot_tx.clone();
            let status_rx = machine.subscribe();
            tokio::spawn(run_pump(engine, status_rx, snapshot_tx))
        };

        Self {
            engine,
            confirmations,
            labels,
            snapshot_tx,
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Current merged snapshot. O(1), never blocks.
    pub fn snapshot(&self) -> WalletSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Current snapshot rendered as JSON for the UI bridge.
    pub fn snapshot_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|e| {
            warn!("snapshot serialization failed: {}", e);
            "{}".to_string()
        })
    }

    /// Subscribe to snapshot updates; at most one per machine transition.
    pub fn subscribe(&self) -> watch::Receiver<WalletSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Manually refetch balance and transactions, publishing the result.
    ///
    /// This is the caller's retry lever; the facade itself never retries.
    pub async fn refresh(&self) {
        let fetched = fetch_wallet_data(&*self.engine).await;
        self.snapshot_tx.send_modify(|snapshot| {
            apply_fetch(snapshot, fetched);
        });
    }

    /// Confirmation count for a transaction, from the tip cache.
    ///
    /// Unmined transactions report 0. When the cache cannot answer, falls
    /// back to the engine-reported count stored on the transaction. Raw
    /// counts throughout; display capping is presentation policy.
    pub async fn confirmations_for(&self, tx: &TransactionSummary) -> Option<u32> {
        match tx.block_height {
            None => Some(0),
            Some(height) => match self.confirmations.confirmations_for(height).await {
                Some(count) => Some(count),
                None => tx.confirmations,
            },
        }
    }

    /// Labels for one address, from the label index.
    pub fn labels_for(&self, address: &str) -> Vec<Label> {
        self.labels.labels_for(address)
    }

    /// Stop republishing; no background task outlives the facade.
    pub fn shutdown(&self) {
        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for WalletStateFacade {
    fn drop(&mut self) {
        self.shutdown();
    }
}

type FetchedData = Result<(BalanceSnapshot, Vec<TransactionSummary>), String>;

async fn fetch_wallet_data(engine: &dyn WalletEngine) -> FetchedData {
    let balance = engine.get_balance().await.map_err(|e| e.to_string())?;
    let transactions = engine.get_transactions().await.map_err(|e| e.to_string())?;
    Ok((balance, transactions))
}

fn apply_fetch(snapshot: &mut WalletSnapshot, fetched: FetchedData) {
    match fetched {
        Ok((balance, transactions)) => {
            snapshot.balance = Some(balance);
            snapshot.transactions = transactions;
            snapshot.balance_error = None;
        }
        Err(reason) => {
            warn!("balance refresh failed: {}", reason);
            snapshot.balance_error = Some(reason);
        }
    }
}

/// Republish machine transitions, refreshing wallet data when a sync session
/// completes.
///
/// Completion is detected through `last_sync_completed_at` rather than a
/// Syncing→Idle phase edge: watch receivers coalesce rapid updates, and a
/// session that starts and finishes between two observations would hide the
/// edge while the completion timestamp still moves.
async fn run_pump(
    engine: Arc<dyn WalletEngine>,
    mut status_rx: watch::Receiver<SyncStatus>,
    snapshot_tx: watch::Sender<WalletSnapshot>,
) {
    let mut prev_completed_at = status_rx.borrow().last_sync_completed_at;

    while status_rx.changed().await.is_ok() {
        let status = status_rx.borrow_and_update().clone();
        let completed = status.last_sync_completed_at.is_some()
            && status.last_sync_completed_at != prev_completed_at;
        prev_completed_at = status.last_sync_completed_at;

        if completed {
            debug!("sync session completed, refreshing wallet data");
            let fetched = fetch_wallet_data(&*engine).await;
            snapshot_tx.send_modify(|snapshot| {
                snapshot.sync = status;
                apply_fetch(snapshot, fetched);
            });
        } else {
            snapshot_tx.send_modify(|snapshot| {
                snapshot.sync = status;
            });
        }
    }
    debug!("facade pump stopped: status channel closed");
}

//! Connection and sync lifecycle state machine.
//!
//! The `SyncStateMachine` owns the [`SyncStatus`] read model. It is the single
//! writer: engine events are folded into the status through `ingest`, and
//! every observable transition is published on a watch channel. Duplicate
//! events that would not change the status publish nothing, so UI observers
//! never churn on no-ops.
//!
//! The machine does not retry anything. A failed connection attempt lands in
//! `Disconnected`, an engine error lands in `Error`, and both stay there until
//! the caller starts a new session; retry policy belongs to whoever owns the
//! machine.

use crate::engine::{EngineEvent, WalletEngine};
use crate::wallet::sync::status::{
    ConnectionState, EtaEstimator, SyncPhase, SyncStatus, batch_weighted_percent,
};

use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timeouts governing the event pump.
///
/// Both windows bound silence, not total duration: the connect timeout applies
/// while the handshake is outstanding, the watchdog while a session is
/// expected to be producing events.
#[derive(Debug, Clone)]
pub struct SyncMachineConfig {
    /// Bounded wait for the Connecting state.
    pub connect_timeout: Duration,
    /// Maximum silence tolerated once connected before the link is treated as
    /// dead.
    pub watchdog_timeout: Duration,
}

impl Default for SyncMachineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            watchdog_timeout: Duration::from_secs(60),
        }
    }
}

struct MachineState {
    status: SyncStatus,
    eta: Option<EtaEstimator>,
}

struct Inner {
    engine: Arc<dyn WalletEngine>,
    config: SyncMachineConfig,
    state: Mutex<MachineState>,
    status_tx: watch::Sender<SyncStatus>,
    sync_active: AtomicBool,
}

/// State machine for the connection/sync lifecycle.
///
/// `ingest` is non-blocking and never fails; malformed or out-of-phase events
/// are dropped with a debug log. `start_sync` is idempotent. Snapshots are
/// immutable clones; subscribers receive one publication per transition.
pub struct SyncStateMachine {
    inner: Arc<Inner>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SyncStateMachine {
    /// Create a machine over the given engine.
    pub fn new(engine: Arc<dyn WalletEngine>, config: SyncMachineConfig) -> Self {
        let status = SyncStatus::default();
        let (status_tx, _) = watch::channel(status.clone());
        Self {
            inner: Arc::new(Inner {
                engine,
                config,
                state: Mutex::new(MachineState { status, eta: None }),
                status_tx,
                sync_active: AtomicBool::new(false),
            }),
            pump: Mutex::new(None),
        }
    }

    /// Fold one engine event into the status. Never blocks, never errors.
    pub fn ingest(&self, event: EngineEvent) {
        self.inner.apply(event);
    }

    /// Immutable snapshot of the current status.
    pub fn current_status(&self) -> SyncStatus {
        self.inner.state.lock().unwrap().status.clone()
    }

    /// Subscribe to status transitions. The receiver sees the current value
    /// immediately and is then notified once per transition.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Start a sync session, spawning the event pump over `engine.sync()`.
    ///
    /// Idempotent: returns `false` without side effects when a session is
    /// already active. The pump runs until the session completes, errors,
    /// disconnects, or goes silent past the watchdog window.
    pub fn start_sync(&self) -> bool {
        if self.inner.sync_active.swap(true, Ordering::SeqCst) {
            debug!("sync already active, start request is a no-op");
            return false;
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            run_pump(&inner).await;
            inner.sync_active.store(false, Ordering::SeqCst);
        });
        *self.pump.lock().unwrap() = Some(handle);
        true
    }

    /// Stop ingesting events and release the pump task and watchdog.
    pub fn shutdown(&self) {
        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
        }
        self.inner.sync_active.store(false, Ordering::SeqCst);
    }
}

impl Drop for SyncStateMachine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drive the engine's event stream into the machine.
///
/// Silence windows follow the current state: the connect timeout while the
/// handshake is outstanding, the watchdog once connected. Terminal events end
/// the session; the caller starts a new one explicitly.
async fn run_pump(inner: &Arc<Inner>) {
    let mut stream = match inner.engine.sync().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("engine refused to start sync: {}", e);
            inner.apply(EngineEvent::Error {
                reason: e.to_string(),
            });
            return;
        }
    };

    let mut last_event = tokio::time::Instant::now();

    loop {
        let window = if inner.state.lock().unwrap().status.connection == ConnectionState::Connecting
        {
            inner.config.connect_timeout
        } else {
            inner.config.watchdog_timeout
        };
        let timeout = tokio::time::sleep_until(last_event + window);
        tokio::pin!(timeout);

        tokio::select! {
            maybe_event = stream.next() => {
                match maybe_event {
                    Some(event) => {
                        last_event = tokio::time::Instant::now();
                        let terminal = matches!(
                            event,
                            EngineEvent::SyncCompleted
                                | EngineEvent::Error { .. }
                                | EngineEvent::Disconnected
                                | EngineEvent::ConnectionFailed { .. }
                        );
                        inner.apply(event);
                        if terminal {
                            break;
                        }
                    }
                    None => {
                        debug!("engine event stream ended");
                        break;
                    }
                }
            }
            _ = &mut timeout => {
                warn!(
                    "no engine events for {:?}, treating connection as lost",
                    window
                );
                inner.apply(EngineEvent::Disconnected);
                break;
            }
        }
    }
}

impl Inner {
    /// Apply one event, publishing the new status when it differs from the
    /// previous one. Out-of-phase events are dropped with a debug log.
    fn apply(&self, event: EngineEvent) {
        let mut state = self.state.lock().unwrap();
        let before = state.status.clone();

        match event {
            EngineEvent::Connecting => {
                if state.status.connection == ConnectionState::Disconnected {
                    state.status.connection = ConnectionState::Connecting;
                    state.status.phase = SyncPhase::Idle;
                } else {
                    debug!("dropping Connecting event while {:?}", state.status.connection);
                }
            }
            EngineEvent::Connected => {
                if state.status.connection == ConnectionState::Connecting {
                    state.status.connection = ConnectionState::Connected;
                    state.status.phase = SyncPhase::Idle;
                } else {
                    debug!("dropping Connected event while {:?}", state.status.connection);
                }
            }
            EngineEvent::ConnectionFailed { reason } => {
                if state.status.connection == ConnectionState::Connecting {
                    info!("connection attempt failed: {}", reason);
                    state.status.connection = ConnectionState::Disconnected;
                    state.status.phase = SyncPhase::Idle;
                } else {
                    debug!("dropping ConnectionFailed event while {:?}", state.status.connection);
                }
            }
            EngineEvent::SyncStarted => {
                let can_start = state.status.connection == ConnectionState::Connected
                    && state.status.phase != SyncPhase::Syncing;
                if can_start {
                    state.status.phase = SyncPhase::Syncing;
                    state.status.batch_index = 0;
                    state.status.batch_total = 0;
                    state.status.synced_blocks = 0;
                    state.status.total_blocks = 0;
                    state.status.overall_progress_percent = 0.0;
                    state.status.eta_text = String::new();
                    state.eta = Some(EtaEstimator::start());
                } else {
                    debug!(
                        "dropping SyncStarted event in state {:?}/{:?}",
                        state.status.connection, state.status.phase
                    );
                }
            }
            EngineEvent::Progress(progress) => {
                if state.status.phase == SyncPhase::Syncing {
                    state.status.batch_index = progress.batch_index;
                    state.status.batch_total = progress.batch_total;
                    state.status.synced_blocks = progress.synced_blocks;
                    state.status.total_blocks = progress.total_blocks;

                    if let Some(candidate) = batch_weighted_percent(&progress) {
                        // Never regress within a session.
                        if candidate > state.status.overall_progress_percent {
                            state.status.overall_progress_percent = candidate;
                        }
                    }

                    if state.status.overall_progress_percent >= 100.0 {
                        complete_session(&mut state);
                    } else if let Some(eta) = &state.eta {
                        state.status.eta_text =
                            eta.eta_text(state.status.overall_progress_percent);
                    }
                } else {
                    debug!("dropping Progress event while {:?}", state.status.phase);
                }
            }
            EngineEvent::SyncCompleted => {
                if state.status.phase == SyncPhase::Syncing {
                    state.status.overall_progress_percent = 100.0;
                    complete_session(&mut state);
                } else {
                    debug!("dropping duplicate SyncCompleted event");
                }
            }
            EngineEvent::Error { reason } => {
                info!("engine reported sync error: {}", reason);
                state.status.connection = ConnectionState::Connected;
                state.status.phase = SyncPhase::Error(reason);
                state.status.eta_text = String::new();
                state.eta = None;
            }
            EngineEvent::Disconnected => {
                state.status.connection = ConnectionState::Disconnected;
                state.status.phase = SyncPhase::Idle;
                state.status.eta_text = String::new();
                state.eta = None;
            }
        }

        if state.status != before {
            debug!("status transition: {}", state.status.summary());
            self.status_tx.send_replace(state.status.clone());
        }
    }
}

fn complete_session(state: &mut MachineState) {
    info!("sync session completed");
    state.status.phase = SyncPhase::Idle;
    state.status.eta_text = String::new();
    state.status.last_sync_completed_at = Some(chrono::Utc::now());
    state.eta = None;
}

use lightwallet_state_sync::test_utils::{RecordingCredentialStore, ScriptedEngine};
use lightwallet_state_sync::{
    AddressLabelIndex, BalanceSnapshot, ConfirmationCache, ConfirmationCacheConfig, EngineEvent,
    LifecycleConfig, ProgressEvent, SyncMachineConfig, SyncStateMachine, WalletLifecycleCoordinator,
    WalletStateFacade,
};

use lightwallet_state_sync::test_utils::MemoryLabelStore;
use lightwallet_state_sync::utils::format_token_amount;
use std::sync::Arc;
use tracing::{error, info};

const ZATOSHI_DECIMALS: u32 = 8;

/// Demo run: drives the full create → verify → background-sync sequence
/// against a scripted engine and prints each published snapshot.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::time())
        .init();

    info!("Starting lightwallet coordination demo");

    let engine = Arc::new(ScriptedEngine::new(scripted_session()));
    engine.set_balance(BalanceSnapshot {
        confirmed: 250_000_000,
        unconfirmed: 1_500,
    });

    let credentials = Arc::new(RecordingCredentialStore::default());
    let machine = Arc::new(SyncStateMachine::new(
        engine.clone(),
        SyncMachineConfig::default(),
    ));
    let confirmations = Arc::new(ConfirmationCache::new(
        engine.clone(),
        ConfirmationCacheConfig::default(),
    ));
    let labels = Arc::new(AddressLabelIndex::new(Arc::new(MemoryLabelStore::default())));

    let facade = WalletStateFacade::new(engine.clone(), &machine, confirmations, labels);
    let mut snapshots = facade.subscribe();

    let coordinator = WalletLifecycleCoordinator::new(
        engine,
        credentials,
        machine,
        LifecycleConfig::default(),
    );

    info!("Beginning create flow");
    let presentation = match coordinator.begin_create().await {
        Ok(presentation) => presentation,
        Err(e) => {
            error!("Failed to generate wallet: {}", e);
            return;
        }
    };
    info!(
        "Generated wallet (birthday {:?}), verifying words at positions {:?}",
        presentation.birthday_height, presentation.challenge_positions
    );

    // The demo answers its own challenge; a real UI collects these from the
    // user after showing the seed.
    let answers: Vec<String> = presentation
        .challenge_positions
        .iter()
        .map(|&i| presentation.words[i].clone())
        .collect();

    if let Err(e) = coordinator.complete_create(&answers, "123456").await {
        error!("Create flow failed: {}", e);
        return;
    }
    info!("Create flow completed, sync running in the background");

    // Observe snapshots until the scripted session completes.
    loop {
        if snapshots.changed().await.is_err() {
            break;
        }
        let snapshot = snapshots.borrow_and_update().clone();
        info!("Snapshot: {}", snapshot.sync.summary());
        if snapshot.sync.last_sync_completed_at.is_some() && snapshot.balance.is_some() {
            let total = snapshot.balance.map(|b| b.total()).unwrap_or(0);
            info!(
                "Final state: balance {} ZEC, {} transactions",
                format_token_amount(total, ZATOSHI_DECIMALS),
                snapshot.transactions.len()
            );
            info!("Snapshot JSON: {}", facade.snapshot_json());
            break;
        }
    }

    facade.shutdown();
    info!("Demo finished");
}

fn scripted_session() -> Vec<EngineEvent> {
    let mut events = vec![
        EngineEvent::Connecting,
        EngineEvent::Connected,
        EngineEvent::SyncStarted,
    ];
    for batch in 1..=4u32 {
        for synced in [250u64, 500, 750, 1000] {
            events.push(EngineEvent::Progress(ProgressEvent {
                batch_index: batch,
                batch_total: 4,
                synced_blocks: synced,
                total_blocks: 1000,
                percent: None,
            }));
        }
    }
    events.push(EngineEvent::SyncCompleted);
    events
}

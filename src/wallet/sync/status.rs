//! Sync status value type and progress arithmetic.
//!
//! `SyncStatus` is the single read model for connection and sync state. It is
//! replaced wholesale on every transition and handed out only as an immutable
//! snapshot; the state machine is its sole writer. The progress percentage is
//! always recomputed from the engine's batch/block counters, never persisted
//! independently.

use crate::engine::ProgressEvent;
use crate::utils::format_duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection lifecycle of the lightwallet server link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    #[default]
    Disconnected,
    /// Handshake in progress, bounded by the connect timeout.
    Connecting,
    /// Handshake succeeded; sync may run.
    Connected,
}

/// Sync activity within an established connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Connected but not scanning.
    #[default]
    Idle,
    /// A scan session is in progress.
    Syncing,
    /// The last session failed; a new sync-start event is required to leave
    /// this phase.
    Error(String),
}

/// Aggregated connection and sync-progress snapshot.
///
/// Invariant: `phase == Syncing` implies `connection == Connected`, and
/// `overall_progress_percent` never decreases within one sync session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub connection: ConnectionState,
    pub phase: SyncPhase,
    /// 1-based batch currently being scanned; 0 when batch reporting is
    /// unavailable.
    pub batch_index: u32,
    /// Total batches in this session; 0 when unavailable.
    pub batch_total: u32,
    /// Blocks scanned within the current batch.
    pub synced_blocks: u64,
    /// Blocks in the current batch; 0 when unavailable.
    pub total_blocks: u64,
    /// Overall session progress in [0, 100], monotonically non-decreasing.
    pub overall_progress_percent: f64,
    /// Human-readable remaining-time estimate, empty when unknown.
    pub eta_text: String,
    /// Completion time of the most recent successful session.
    pub last_sync_completed_at: Option<DateTime<Utc>>,
}

impl SyncStatus {
    /// Whether a scan session is currently active.
    pub fn is_syncing(&self) -> bool {
        self.phase == SyncPhase::Syncing
    }

    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "{:?}/{:?}: batch {}/{}, blocks {}/{}, {:.1}%{}",
            self.connection,
            self.phase,
            self.batch_index,
            self.batch_total,
            self.synced_blocks,
            self.total_blocks,
            self.overall_progress_percent,
            if self.eta_text.is_empty() {
                String::new()
            } else {
                format!(", {} remaining", self.eta_text)
            }
        )
    }
}

/// Compute the session percentage from a progress event.
///
/// With batch reporting available, completed batches contribute whole shares
/// and the current batch contributes its block fraction:
/// `(batch_index - 1)/batch_total + (synced/max(total, 1))/batch_total`.
/// Without batch reporting, the engine's raw percentage is used when present.
/// Returns `None` when the event carries nothing usable; the caller leaves
/// the previous value unchanged rather than regressing.
pub(crate) fn batch_weighted_percent(event: &ProgressEvent) -> Option<f64> {
    if event.batch_total > 0 {
        let completed = event.batch_index.saturating_sub(1) as f64;
        let in_batch = event.synced_blocks as f64 / event.total_blocks.max(1) as f64;
        let fraction = (completed + in_batch) / event.batch_total as f64;
        Some((fraction * 100.0).clamp(0.0, 100.0))
    } else {
        event.percent.map(|p| p.clamp(0.0, 100.0))
    }
}

/// Remaining-time estimator for one sync session.
///
/// Assumes scan throughput is roughly constant: with `p` percent done after
/// `elapsed`, the remainder takes `elapsed * (100 - p) / p`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EtaEstimator {
    session_started: tokio::time::Instant,
}

impl EtaEstimator {
    pub(crate) fn start() -> Self {
        Self {
            session_started: tokio::time::Instant::now(),
        }
    }

    /// Estimate remaining time at the given percentage; empty until there is
    /// enough progress to extrapolate from.
    pub(crate) fn eta_text(&self, percent: f64) -> String {
        if percent <= 0.0 || percent >= 100.0 {
            return String::new();
        }
        let elapsed = self.session_started.elapsed().as_secs_f64();
        if elapsed < 1.0 {
            return String::new();
        }
        let remaining = elapsed * (100.0 - percent) / percent;
        format_duration(Duration::from_secs_f64(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(
        batch_index: u32,
        batch_total: u32,
        synced_blocks: u64,
        total_blocks: u64,
    ) -> ProgressEvent {
        ProgressEvent {
            batch_index,
            batch_total,
            synced_blocks,
            total_blocks,
            percent: None,
        }
    }

    #[test]
    fn batch_one_of_four_half_scanned_is_twelve_and_a_half_percent() {
        let pct = batch_weighted_percent(&progress(1, 4, 500, 1000)).unwrap();
        assert!((pct - 12.5).abs() < 1e-9);
    }

    #[test]
    fn final_batch_fully_scanned_is_one_hundred_percent() {
        let pct = batch_weighted_percent(&progress(4, 4, 1000, 1000)).unwrap();
        assert!((pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_total_blocks_does_not_divide_by_zero() {
        let pct = batch_weighted_percent(&progress(2, 4, 0, 0)).unwrap();
        assert!((pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_raw_percent_without_batch_reporting() {
        let event = ProgressEvent {
            batch_index: 0,
            batch_total: 0,
            synced_blocks: 0,
            total_blocks: 0,
            percent: Some(137.0),
        };
        assert_eq!(batch_weighted_percent(&event), Some(100.0));
    }

    #[test]
    fn unusable_event_yields_none() {
        let event = ProgressEvent {
            batch_index: 0,
            batch_total: 0,
            synced_blocks: 10,
            total_blocks: 0,
            percent: None,
        };
        assert_eq!(batch_weighted_percent(&event), None);
    }

    #[test]
    fn default_status_is_disconnected_and_idle() {
        let status = SyncStatus::default();
        assert_eq!(status.connection, ConnectionState::Disconnected);
        assert_eq!(status.phase, SyncPhase::Idle);
        assert_eq!(status.overall_progress_percent, 0.0);
        assert!(status.eta_text.is_empty());
    }
}

//! Running analytics counters with snapshot persistence.
//!
//! The aggregator holds the live [`AnalyticsSnapshot`] in memory. `flush`
//! overwrites the snapshot file with the full state; `resume` reloads it at
//! startup so totals carry over between runs.

use chrono::Utc;
use tracing::{debug, info, warn};

use dynabot_core::error::Result;
use dynabot_core::types::{AnalyticsSnapshot, Sentiment};
use dynabot_storage::SnapshotStore;

/// In-memory analytics state bound to its durable snapshot file.
#[derive(Debug)]
pub struct AnalyticsAggregator {
    state: AnalyticsSnapshot,
    store: SnapshotStore,
}

impl AnalyticsAggregator {
    /// Zero state, ignoring whatever the store holds.
    pub fn new(store: SnapshotStore) -> Self {
        Self {
            state: AnalyticsSnapshot::default(),
            store,
        }
    }

    /// Load the stored snapshot as the baseline.
    ///
    /// A missing or unreadable snapshot yields zero state.
    pub fn resume(store: SnapshotStore) -> Self {
        let state = match store.load() {
            Ok(Some(snapshot)) => {
                info!(
                    path = %store.path().display(),
                    interactions = snapshot.interaction_count,
                    errors = snapshot.error_count,
                    "Resumed analytics from snapshot"
                );
                snapshot
            }
            Ok(None) => {
                debug!(path = %store.path().display(), "No analytics snapshot, starting fresh");
                AnalyticsSnapshot::default()
            }
            Err(e) => {
                warn!(
                    path = %store.path().display(),
                    error = %e,
                    "Failed to load analytics snapshot, starting fresh"
                );
                AnalyticsSnapshot::default()
            }
        };
        Self { state, store }
    }

    /// Append one generation latency sample.
    ///
    /// Negative or non-finite samples are stored as `0.0` so the snapshot
    /// stays valid JSON.
    pub fn record_timing(&mut self, seconds: f64) {
        let sample = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
        self.state.response_timings.push(sample);
    }

    pub fn record_sentiment(&mut self, sentiment: Sentiment) {
        *self.state.sentiment_distribution.entry(sentiment).or_insert(0) += 1;
    }

    pub fn record_interaction(&mut self) {
        self.state.interaction_count += 1;
    }

    pub fn record_error(&mut self) {
        self.state.error_count += 1;
    }

    /// Stamp `last_updated` and overwrite the snapshot file.
    pub fn flush(&mut self) -> Result<()> {
        self.state.last_updated = Some(Utc::now());
        self.store.save(&self.state)?;
        debug!(
            interactions = self.state.interaction_count,
            errors = self.state.error_count,
            avg_response_secs = ?self.state.average_response_secs(),
            "Analytics flushed"
        );
        Ok(())
    }

    pub fn snapshot(&self) -> &AnalyticsSnapshot {
        &self.state
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }
}

// =============================================================================
// Tests
// =============================================================================

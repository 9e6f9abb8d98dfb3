//! Analytics snapshot file: a single JSON object, overwritten on every save.

use std::path::{Path, PathBuf};

use tracing::debug;

use dynabot_core::error::Result;
use dynabot_core::types::AnalyticsSnapshot;

use crate::atomic::write_atomic;

/// Durable home of the analytics aggregator's state.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot has been written yet.
    pub fn load(&self) -> Result<Option<AnalyticsSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let snapshot: AnalyticsSnapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    /// Replace the stored snapshot with `snapshot`.
    pub fn save(&self, snapshot: &AnalyticsSnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &json)?;
        debug!(
            path = %self.path.display(),
            interactions = snapshot.interaction_count,
            errors = snapshot.error_count,
            "Analytics snapshot saved"
        );
        Ok(())
    }
}

//! Append-only conversation log stored as a single JSON array file.

use std::path::{Path, PathBuf};

use tracing::debug;

use dynabot_core::error::{DynabotError, Result};
use dynabot_core::types::InteractionRecord;

use crate::atomic::write_atomic;

/// Conversation log backed by one JSON array file.
///
/// Every append reads the whole array, pushes the new record and rewrites
/// the file. There is no locking: two processes appending at once can lose
/// one of the records.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    path: PathBuf,
}

impl ConversationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one exchange, stamped with the current time.
    ///
    /// Creates the store with a single-element array when it does not exist.
    pub fn append_interaction(
        &self,
        user_query: &str,
        ai_response: &str,
    ) -> Result<InteractionRecord> {
        let record = InteractionRecord::new(user_query, ai_response);
        self.append(record.clone())?;
        Ok(record)
    }

    /// Append an already-built record.
    pub fn append(&self, record: InteractionRecord) -> Result<()> {
        let mut records = self.load_all()?;
        records.push(record);

        let json = serde_json::to_vec(&records)?;
        write_atomic(&self.path, &json)?;

        debug!(
            path = %self.path.display(),
            total = records.len(),
            "Interaction appended"
        );
        Ok(())
    }

    /// Read every record in write order.
    ///
    /// A missing or blank file is an empty log. Anything that is not a JSON
    /// array of records is a storage error.
    pub fn load_all(&self) -> Result<Vec<InteractionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            DynabotError::Storage(format!(
                "Corrupt conversation log {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

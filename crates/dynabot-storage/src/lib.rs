//! Dynabot Storage crate - flat-file persistence for chat artifacts.
//!
//! Provides the append-only conversation log (a JSON array file), the
//! newline-delimited error log, and the analytics snapshot file. None of
//! these stores lock across processes; whole-file rewrites go through a
//! temp file and rename.

pub mod atomic;
pub mod conversation;
pub mod error_log;
pub mod snapshot;

pub use conversation::ConversationLog;
pub use error_log::ErrorLog;
pub use snapshot::SnapshotStore;

pub mod config;
pub mod error;
pub mod types;

pub use config::DynabotConfig;
pub use error::{DynabotError, Result};
pub use types::*;

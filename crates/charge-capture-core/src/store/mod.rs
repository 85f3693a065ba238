//! Key-value persistence gateway.
//!
//! The session mirrors its state into a [`KeyValueStore`] after every
//! mutation. Values are JSON; keys are the logical names in [`StoreKeys`].

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use schema::SCHEMA;
pub use sqlite::SqliteStore;

use serde_json::Value;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// JSON key-value storage that survives restarts.
pub trait KeyValueStore {
    /// Read a value; `None` if the key was never written or was removed.
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Write a value, replacing any previous one.
    fn set(&mut self, key: &str, value: Value) -> StoreResult<()>;

    /// Delete a key. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> StoreResult<()>;

    /// Write several values together. Implementations backed by a database
    /// apply the batch atomically.
    fn set_many(&mut self, entries: Vec<(&str, Value)>) -> StoreResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Logical persistence keys, derived from a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    pub user: String,
    pub selected_location: String,
    pub patients: String,
    pub last_session_date: String,
    pub history: String,
    pub locations: String,
    pub codes: String,
}

impl StoreKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            user: format!("{prefix}-user"),
            selected_location: format!("{prefix}-selected-hospital"),
            patients: format!("{prefix}-todays-patients"),
            last_session_date: format!("{prefix}-last-session-date"),
            history: format!("{prefix}-history"),
            locations: format!("{prefix}-hospitals"),
            codes: format!("{prefix}-codes"),
        }
    }

    /// Every key, in the order a full reset removes them.
    pub fn all(&self) -> [&str; 7] {
        [
            self.user.as_str(),
            self.selected_location.as_str(),
            self.patients.as_str(),
            self.history.as_str(),
            self.locations.as_str(),
            self.codes.as_str(),
            self.last_session_date.as_str(),
        ]
    }
}

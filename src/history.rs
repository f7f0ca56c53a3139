use crate::storage::{KeyValueStore, StorageError};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const HISTORY_KEY: &str = "dorkHistory";
pub const HISTORY_CAPACITY: usize = 50;

/// Most-recent-first log of accepted dorks, persisted as a JSON array.
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            capacity: HISTORY_CAPACITY,
        }
    }

    /// Returns the entries, most recent first.
    ///
    /// Missing, unreadable or corrupt history reads as empty.
    pub fn list(&self) -> Vec<String> {
        let raw = match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read history: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Option<Vec<String>>>(&raw) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                warn!("Ignoring corrupt history: {}", e);
                Vec::new()
            }
        }
    }

    /// Front-inserts `text` unless it is already present, keeping at most
    /// `capacity` entries.
    pub fn add(&self, text: &str) -> Result<(), StorageError> {
        let mut history = self.list();
        if history.iter().any(|entry| entry == text) {
            debug!("History already contains '{}'", text);
            return Ok(());
        }

        history.insert(0, text.to_string());
        history.truncate(self.capacity);
        self.persist(&history)?;
        info!("Added to history ({} entries)", history.len());
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(HISTORY_KEY)?;
        info!("History cleared");
        Ok(())
    }

    fn persist(&self, history: &[String]) -> Result<(), StorageError> {
        // Serializing a slice of strings cannot fail.
        let content = serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string());
        self.store.set(HISTORY_KEY, &content)
    }
}

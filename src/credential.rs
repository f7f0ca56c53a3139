//! API key persistence.

use crate::storage::{KeyValueStore, StorageError};
use std::sync::Arc;
use tracing::{info, warn};

pub const CREDENTIAL_KEY: &str = "geminiApiKey";

/// Holds the user's Gemini API key.
///
/// A key supplied through the environment takes precedence over the stored
/// one and is never persisted.
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
    env_override: Option<String>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            env_override: None,
        }
    }

    pub fn with_env_override(mut self, key: Option<String>) -> Self {
        self.env_override = key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Returns the credential, trimmed, or `None` if absent or blank.
    pub fn get(&self) -> Option<String> {
        if let Some(key) = &self.env_override {
            return Some(key.trim().to_string());
        }
        match self.store.get(CREDENTIAL_KEY) {
            Ok(value) => value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Failed to read stored API key: {}", e);
                None
            }
        }
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }

    /// Saves the trimmed key. A blank key removes the stored credential.
    pub fn save(&self, key: &str) -> Result<(), StorageError> {
        let key = key.trim();
        if key.is_empty() {
            self.store.remove(CREDENTIAL_KEY)?;
            info!("Stored API key removed");
        } else {
            self.store.set(CREDENTIAL_KEY, key)?;
            info!("API key saved");
        }
        Ok(())
    }
}

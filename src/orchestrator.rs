//! Sequencing of a single generation or refinement request.

use crate::credential::CredentialStore;
use crate::history::HistoryStore;
use crate::llm_generator::{DorkGenerator, GenerateError};
use crate::storage::StorageError;
use crate::validator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Initial,
    Refinement,
}

/// User-facing outcome of a request that did not produce a dork.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Please enter a description for the dork.")]
    MissingDescription,
    #[error("Please add your Gemini API key in settings.")]
    MissingCredential,
    #[error("Could not generate a valid dork. Try a more specific description.")]
    InvalidGeneration,
    #[error("An error occurred. Check your API key or try again.")]
    GenerationFailed(#[source] GenerateError),
    #[error("A generation is already in progress.")]
    Busy,
}

impl RunError {
    /// Whether the caller should present credential entry.
    pub fn needs_credential(&self) -> bool {
        matches!(self, RunError::MissingCredential)
    }
}

/// Builds the prompt sent to the model.
pub fn build_prompt(description: &str, mode: GenerationMode, current: Option<&str>) -> String {
    let description = description.trim();
    match mode {
        GenerationMode::Initial => description.to_string(),
        GenerationMode::Refinement => format!(
            "Refine the following Google Dork: \"{}\". The original goal was: \"{}\". Make it more specific, creative, or efficient.",
            current.unwrap_or_default(),
            description
        ),
    }
}

/// Read-only view of the orchestrator's busy flag.
#[derive(Clone)]
pub struct BusyHandle(Arc<AtomicBool>);

impl BusyHandle {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Holds the busy flag for the lifetime of one generation.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the current result and busy state and ties the credential, generator,
/// validator and history together.
pub struct Orchestrator {
    generator: Arc<dyn DorkGenerator>,
    credentials: CredentialStore,
    history: HistoryStore,
    current: Option<String>,
    busy: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn DorkGenerator>,
        credentials: CredentialStore,
        history: HistoryStore,
    ) -> Self {
        Self {
            generator,
            credentials,
            history,
            current: None,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn busy_handle(&self) -> BusyHandle {
        BusyHandle(Arc::clone(&self.busy))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn current_result(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn set_current_result(&mut self, dork: Option<String>) {
        self.current = dork;
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn save_credential(&self, key: &str) -> Result<(), StorageError> {
        self.credentials.save(key)
    }

    pub fn clear_history(&self) -> Result<(), StorageError> {
        self.history.clear()
    }

    /// Makes the history entry at `index` the current result and returns the
    /// suggested follow-up description.
    pub fn select_history(&mut self, index: usize) -> Option<(String, String)> {
        let dork = self.history.list().into_iter().nth(index)?;
        let description = format!("Find dorks related to: {}", dork);
        self.current = Some(dork.clone());
        Some((dork, description))
    }

    /// Runs one generation. Refinement embeds the current result.
    pub async fn run(&mut self, description: &str, mode: GenerationMode) -> Result<String, RunError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(RunError::MissingDescription);
        }

        let credential = self.credentials.get().ok_or(RunError::MissingCredential)?;

        let _guard = BusyGuard::acquire(&self.busy).ok_or(RunError::Busy)?;

        let prompt = build_prompt(description, mode, self.current.as_deref());
        info!("Running {:?} generation", mode);

        let dork = self
            .generator
            .generate(&prompt, &credential)
            .await
            .map_err(|e| {
                error!("Error generating dork: {}", e);
                RunError::GenerationFailed(e)
            })?;

        if !validator::is_acceptable(&dork) {
            info!("Rejected generation: {:?}", dork);
            return Err(RunError::InvalidGeneration);
        }

        self.current = Some(dork.clone());
        if let Err(e) = self.history.add(&dork) {
            warn!("Failed to save dork to history: {}", e);
        }

        Ok(dork)
    }
}

//! Maps user actions onto the orchestrator.
//!
//! Every surface (one-shot CLI, interactive session) goes through
//! [`CommandRouter::handle`], so the behaviour behind each action can be
//! tested without a terminal.

use crate::{
    clipboard::{Clipboard, SystemClipboard},
    config::Config,
    credential::CredentialStore,
    history::HistoryStore,
    http_client::ReqwestHttpClient,
    llm_generator::{DorkGenerator, GeminiClient, MockGenerator},
    orchestrator::{GenerationMode, Orchestrator},
    providers::TokioSleeper,
    storage::{FileStore, KeyValueStore},
};
use anyhow::Result;
use reqwest::Url;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

const SEARCH_BASE: &str = "https://www.google.com/search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Generate(String),
    Refine(String),
    SaveKey(String),
    ShowHistory,
    ClearHistory,
    /// Zero-based index into the history list.
    UseHistory(usize),
    Copy,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Dork { dork: String, search_url: String },
    Failed { message: String, open_settings: bool },
    KeySaved { removed: bool },
    History(Vec<String>),
    HistoryCleared,
    Selected { dork: String, description: String, search_url: String },
    Copied(String),
    Help,
    Quit,
}

impl Reply {
    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Failed { .. })
    }
}

/// Web search link for a dork.
pub fn search_url(dork: &str) -> String {
    Url::parse_with_params(SEARCH_BASE, &[("q", dork)])
        .map(|url| url.to_string())
        .unwrap_or_else(|_| SEARCH_BASE.to_string())
}

/// Parses one line of the interactive session. Blank lines yield `None`.
pub fn parse_session_line(line: &str) -> Option<Action> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix(':') else {
        return Some(Action::Generate(line.to_string()));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    let action = match name {
        "refine" | "r" => Action::Refine(arg.to_string()),
        "history" | "h" => Action::ShowHistory,
        "use" | "u" => match arg.parse::<usize>() {
            Ok(n) if n >= 1 => Action::UseHistory(n - 1),
            _ => Action::Help,
        },
        "clear" => Action::ClearHistory,
        "key" => Action::SaveKey(arg.to_string()),
        "copy" | "c" => Action::Copy,
        "quit" | "q" | "exit" => Action::Quit,
        _ => Action::Help,
    };
    Some(action)
}

/// Writes a reply for a terminal user.
pub fn render<W: Write>(reply: &Reply, output: &mut W) -> Result<()> {
    match reply {
        Reply::Dork { dork, search_url } => {
            writeln!(output, "{}", dork)?;
            writeln!(output, "🔎 {}", search_url)?;
        }
        Reply::Failed {
            message,
            open_settings,
        } => {
            writeln!(output, "❌ {}", message)?;
            if *open_settings {
                writeln!(output, "   Set it with: dork --set-api-key <your-key>")?;
                writeln!(output, "   or export GEMINI_API_KEY=<your-key>")?;
            }
        }
        Reply::KeySaved { removed: false } => writeln!(output, "✅ API key saved successfully")?,
        Reply::KeySaved { removed: true } => writeln!(output, "🗑️  API key removed")?,
        Reply::History(entries) if entries.is_empty() => writeln!(output, "No history yet.")?,
        Reply::History(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                writeln!(output, "{:>3}. {}", i + 1, entry)?;
            }
        }
        Reply::HistoryCleared => writeln!(output, "🧹 History cleared")?,
        Reply::Selected {
            dork,
            description,
            search_url,
        } => {
            writeln!(output, "{}", dork)?;
            writeln!(output, "🔎 {}", search_url)?;
            writeln!(output, "📝 {}", description)?;
        }
        Reply::Copied(dork) => writeln!(output, "📋 Copied: {}", dork)?,
        Reply::Help => {
            writeln!(output, "Describe what you are looking for, or use:")?;
            writeln!(output, "  :refine <goal>   refine the current dork")?;
            writeln!(output, "  :history         list previous dorks")?;
            writeln!(output, "  :use <n>         make history entry n current")?;
            writeln!(output, "  :clear           clear history")?;
            writeln!(output, "  :key <API_KEY>   save the Gemini API key")?;
            writeln!(output, "  :copy            copy the current dork")?;
            writeln!(output, "  :quit            leave")?;
        }
        Reply::Quit => {}
    }
    Ok(())
}

pub struct CommandRouter {
    orchestrator: Orchestrator,
    clipboard: Box<dyn Clipboard>,
}

impl CommandRouter {
    pub fn new(orchestrator: Orchestrator, clipboard: Box<dyn Clipboard>) -> Self {
        Self {
            orchestrator,
            clipboard,
        }
    }

    /// Wires file-backed stores and the configured generator.
    pub fn from_config(config: &Config) -> Result<Self> {
        let data_dir = Config::get_config_dir()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&data_dir)?);
        info!("Using data directory {:?}", data_dir);

        let credentials =
            CredentialStore::new(Arc::clone(&store)).with_env_override(config.env_api_key.clone());
        let history = HistoryStore::new(store);

        let generator: Arc<dyn DorkGenerator> = if config.is_mock_mode() {
            Arc::new(MockGenerator::new())
        } else {
            Arc::new(
                GeminiClient::new(
                    Arc::new(ReqwestHttpClient::new()),
                    Arc::new(TokioSleeper),
                    config.base_url.clone(),
                    config.model.clone(),
                )
                .with_retry_policy(config.retry_policy()),
            )
        };

        Ok(Self::new(
            Orchestrator::new(generator, credentials, history),
            Box::new(SystemClipboard),
        ))
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub async fn handle(&mut self, action: Action) -> Result<Reply> {
        let reply = match action {
            Action::Generate(description) => self.generate(&description, GenerationMode::Initial).await,
            Action::Refine(description) => self.generate(&description, GenerationMode::Refinement).await,
            Action::SaveKey(key) => {
                self.orchestrator.save_credential(&key)?;
                Reply::KeySaved {
                    removed: key.trim().is_empty(),
                }
            }
            Action::ShowHistory => Reply::History(self.orchestrator.history().list()),
            Action::ClearHistory => {
                self.orchestrator.clear_history()?;
                Reply::HistoryCleared
            }
            Action::UseHistory(index) => match self.orchestrator.select_history(index) {
                Some((dork, description)) => Reply::Selected {
                    search_url: search_url(&dork),
                    dork,
                    description,
                },
                None => Reply::Failed {
                    message: format!("No history entry {}.", index + 1),
                    open_settings: false,
                },
            },
            Action::Copy => self.copy_current(),
            Action::Help => Reply::Help,
            Action::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    async fn generate(&mut self, description: &str, mode: GenerationMode) -> Reply {
        match self.orchestrator.run(description, mode).await {
            Ok(dork) => Reply::Dork {
                search_url: search_url(&dork),
                dork,
            },
            Err(e) => Reply::Failed {
                open_settings: e.needs_credential(),
                message: e.to_string(),
            },
        }
    }

    fn copy_current(&self) -> Reply {
        let Some(dork) = self.orchestrator.current_result() else {
            return Reply::Failed {
                message: "Nothing to copy yet.".to_string(),
                open_settings: false,
            };
        };
        match self.clipboard.copy_text(dork) {
            Ok(()) => Reply::Copied(dork.to_string()),
            Err(e) => {
                warn!("Copy command failed: {}", e);
                Reply::Failed {
                    message: format!("Copy failed: {}", e),
                    open_settings: false,
                }
            }
        }
    }

    /// Reads actions line by line until `:quit` or end of input.
    pub async fn run_session_with_io<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<()> {
        loop {
            write!(output, "dork> ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                return Ok(());
            }

            let Some(action) = parse_session_line(&line) else {
                continue;
            };
            let reply = self.handle(action).await?;
            if reply == Reply::Quit {
                return Ok(());
            }
            render(&reply, output)?;
        }
    }
}

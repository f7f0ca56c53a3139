//! Dorkgen - Google dork generation library.
//!
//! Turns a plain-language description into a single advanced search
//! expression using the Gemini API. It supports:
//!
//! - **Generation and refinement** via Gemini with search grounding
//! - **Retry with exponential backoff** on rate limiting and server errors
//! - **Validation** of generated dorks before they are shown or stored
//! - **Persistent history** capped at 50 de-duplicated entries
//! - **Credential storage** with an environment override
//!
//! # Architecture
//!
//! - [`config`] - Configuration management (model, endpoint, retries)
//! - [`storage`] - String key-value persistence
//! - [`credential`] - API key store
//! - [`history`] - Capacity-bounded result history
//! - [`retry`] - Backoff schedule
//! - [`http_client`] - HTTP client abstraction
//! - [`providers`] - Sleep abstraction for the retry loop
//! - [`llm_generator`] - Gemini client and offline mock
//! - [`validator`] - Structural checks and the invalid sentinel
//! - [`orchestrator`] - One generation or refinement end to end
//! - [`command_router`] - User actions, rendering and the interactive session
//! - [`clipboard`] - Platform clipboard access
//!
//! # Example
//!
//! ```ignore
//! use dorkgen::command_router::{Action, CommandRouter};
//! use dorkgen::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let mut router = CommandRouter::from_config(&config)?;
//!
//!     router.handle(Action::Generate("exposed admin login pages".to_string())).await?;
//!     router.handle(Action::Refine("only on .edu sites".to_string())).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod clipboard;
pub mod command_router;
pub mod config;
pub mod credential;
pub mod history;
pub mod http_client;
pub mod llm_generator;
pub mod orchestrator;
pub mod providers;
pub mod retry;
pub mod storage;
pub mod validator;

//! Polymode - multi-modal generative-AI conversation client library
//!
//! This library provides the orchestration core for a client that
//! converses with a generation backend through multiple modalities:
//! streaming text chat, image generation and editing, long-running video
//! generation, audio transcription, speech synthesis, and ad-hoc code
//! generation.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `gateway`: one call per generation modality over an explicit context
//! - `store`: conversation persistence scoped per user
//! - `conversation`: message model and the active-conversation view model
//! - `orchestrator`: per-turn pathway selection and the streaming/polling
//!   state machines
//! - `identity`: the session user
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use polymode::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/polymode.yaml")?;
//!     config.validate()?;
//!
//!     // Session wiring would go here
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod orchestrator;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use conversation::{Conversation, ConversationViewModel, Message, MessageBody, Role};
pub use error::{PolymodeError, Result};
pub use gateway::GatewayContext;
pub use orchestrator::{PendingTurn, Tool, TurnOrchestrator};
pub use store::ConversationStore;

//! Command-line interface definition for Polymode
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for the interactive chat session, conversation
//! listing, and speech synthesis.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Polymode - multi-modal generative-AI conversation client
///
/// Converse with a generation backend through text chat, image and video
/// generation, audio transcription, and speech synthesis.
#[derive(Parser, Debug, Clone)]
#[command(name = "polymode")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/polymode.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Polymode
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Resume a specific conversation by id instead of the most recent
        #[arg(short, long)]
        resume: Option<String>,

        /// Audio file handed to the recorder toggle (stands in for a microphone)
        #[arg(long)]
        audio_source: Option<PathBuf>,
    },

    /// List stored conversations, most recently updated first
    Conversations,

    /// Synthesize the most recent model response of a conversation to an audio file
    Speak {
        /// Conversation id; defaults to the most recently updated
        #[arg(short, long)]
        conversation: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_chat_command() {
        let cli = Cli::try_parse_from(["polymode", "chat"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { .. }));
        assert_eq!(cli.config, "config/polymode.yaml");
    }

    #[test]
    fn test_cli_parses_resume_flag() {
        let cli = Cli::try_parse_from(["polymode", "chat", "--resume", "01ABC"]).unwrap();
        match cli.command {
            Commands::Chat { resume, .. } => assert_eq!(resume.as_deref(), Some("01ABC")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_conversations_command() {
        let cli = Cli::try_parse_from(["polymode", "-v", "conversations"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Conversations));
    }

    #[test]
    fn test_cli_requires_a_command() {
        assert!(Cli::try_parse_from(["polymode"]).is_err());
    }
}

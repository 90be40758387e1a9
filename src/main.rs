//! Polymode - multi-modal generative-AI conversation client
//!
//! Main entry point for the Polymode application.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use polymode::cli::{Cli, Commands};
use polymode::commands;
use polymode::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load and validate configuration
    let config = Config::load(&cli.config)?;
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            resume,
            audio_source,
        } => {
            tracing::info!("Starting interactive chat session");
            if let Some(r) = &resume {
                tracing::debug!("Resuming conversation: {}", r);
            }
            commands::chat::run_chat(config, resume, audio_source).await?;
            Ok(())
        }
        Commands::Conversations => {
            tracing::info!("Listing conversations");
            commands::conversations::run_conversations(config)?;
            Ok(())
        }
        Commands::Speak { conversation } => {
            tracing::info!("Synthesizing latest response");
            commands::speak::run_speak(config, conversation).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "polymode=debug" } else { "polymode=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

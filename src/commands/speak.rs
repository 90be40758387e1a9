//! Speech synthesis handler
//!
//! Reads the most recent model response of a conversation aloud by
//! writing a synthesized audio file to the media directory.

use crate::commands::load_or_bootstrap;
use crate::config::Config;
use crate::conversation::ConversationViewModel;
use crate::error::{PolymodeError, Result};
use crate::gateway::GatewayContext;
use crate::identity::resolve_user;
use crate::orchestrator::TurnOrchestrator;

/// Synthesize the latest model response of a conversation
///
/// # Arguments
///
/// * `config` - Global configuration (consumed)
/// * `conversation_id` - Target conversation; defaults to the most recent
pub async fn run_speak(config: Config, conversation_id: Option<String>) -> Result<()> {
    let user = resolve_user(&config.user);
    let (store, conversations) = load_or_bootstrap(&config, &user)?;

    let conversation = match &conversation_id {
        Some(id) => store.get(&user.uid, id)?.ok_or_else(|| {
            PolymodeError::Validation(format!("Conversation not found: {}", id))
        })?,
        None => conversations[0].clone(),
    };

    let mut view = ConversationViewModel::new(store, &user.uid);
    view.set_active(conversation);

    let gateway = GatewayContext::new(config.backend.clone())?;
    let orchestrator =
        TurnOrchestrator::new(gateway, &config.chat, config.storage.media_path());

    let path = orchestrator.speak_last(&view).await?;
    println!("Audio written to {}", path.display());
    Ok(())
}

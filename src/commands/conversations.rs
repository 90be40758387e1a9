//! Conversation listing handler

use crate::commands::load_or_bootstrap;
use crate::config::Config;
use crate::error::Result;
use crate::identity::resolve_user;
use colored::Colorize;

/// List stored conversations for the current user, newest first
pub fn run_conversations(config: Config) -> Result<()> {
    let user = resolve_user(&config.user);
    let (_store, conversations) = load_or_bootstrap(&config, &user)?;

    println!(
        "{}",
        format!("{} conversation(s) for {}", conversations.len(), user.uid).bold()
    );
    for conversation in conversations {
        println!(
            "{}  {}  {}  ({} messages)",
            conversation.id.dimmed(),
            conversation.updated_at.dimmed(),
            conversation.title,
            conversation.messages.len()
        );
    }
    Ok(())
}

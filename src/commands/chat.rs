//! Interactive chat session handler
//!
//! Runs a readline-based loop over the turn orchestrator. Slash commands
//! select the active tool, manage attachments, toggle recording, and
//! switch conversations; everything else is sent as a turn.

use crate::commands::load_or_bootstrap;
use crate::config::Config;
use crate::conversation::{Attachment, ConversationViewModel, Message, MessageBody, Role};
use crate::error::{PolymodeError, Result};
use crate::gateway::{GatewayContext, VideoAspect};
use crate::identity::resolve_user;
use crate::orchestrator::{
    AudioArtifact, FileCapture, KeyringSelector, PendingTurn, Recorder, Tool, TurnOrchestrator,
};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Session commands recognized by the REPL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Switch the active tool
    SelectTool(Tool),
    /// Attach a media file to the pending turn
    Attach(PathBuf),
    /// Set the image aspect ratio
    Aspect(String),
    /// Set the video aspect ratio
    VideoAspect(String),
    /// Toggle extended reasoning
    Thinking,
    /// Toggle the recorder
    Record,
    /// Create a new conversation and make it active
    New,
    /// List conversations
    List,
    /// Switch the active conversation
    Switch(String),
    /// Speak the latest model response
    Speak,
    /// Show session status
    Status,
    /// Show help
    Help,
    /// Leave the session
    Exit,
    /// Not a command; send as a turn
    None,
}

/// Parse a session command from an input line
///
/// # Examples
///
/// ```
/// use polymode::commands::chat::{parse_session_command, SessionCommand};
/// use polymode::orchestrator::Tool;
///
/// let cmd = parse_session_command("/tool image-gen").unwrap();
/// assert_eq!(cmd, SessionCommand::SelectTool(Tool::ImageGen));
/// ```
pub fn parse_session_command(line: &str) -> std::result::Result<SessionCommand, String> {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Ok(SessionCommand::None);
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).unwrap_or_default();

    match command {
        "/tool" => Tool::parse_str(argument).map(SessionCommand::SelectTool),
        "/attach" => {
            if argument.is_empty() {
                Err("usage: /attach <path>".to_string())
            } else {
                Ok(SessionCommand::Attach(PathBuf::from(argument)))
            }
        }
        "/aspect" => {
            if argument.is_empty() {
                Err("usage: /aspect <ratio>".to_string())
            } else {
                Ok(SessionCommand::Aspect(argument.to_string()))
            }
        }
        "/video-aspect" => {
            if argument.is_empty() {
                Err("usage: /video-aspect <16:9|9:16>".to_string())
            } else {
                Ok(SessionCommand::VideoAspect(argument.to_string()))
            }
        }
        "/thinking" => Ok(SessionCommand::Thinking),
        "/record" => Ok(SessionCommand::Record),
        "/new" => Ok(SessionCommand::New),
        "/list" => Ok(SessionCommand::List),
        "/switch" => {
            if argument.is_empty() {
                Err("usage: /switch <conversation-id>".to_string())
            } else {
                Ok(SessionCommand::Switch(argument.to_string()))
            }
        }
        "/speak" => Ok(SessionCommand::Speak),
        "/status" => Ok(SessionCommand::Status),
        "/help" => Ok(SessionCommand::Help),
        "/exit" | "/quit" => Ok(SessionCommand::Exit),
        other => Err(format!("Unknown command: {}", other)),
    }
}

/// Classify an attachment path by extension
pub(crate) fn classify_attachment(path: &Path) -> std::result::Result<Attachment, String> {
    let display = path.display().to_string();
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Ok(Attachment::Image {
            path: display,
            mime: "image/png".to_string(),
        }),
        Some("jpg") | Some("jpeg") => Ok(Attachment::Image {
            path: display,
            mime: "image/jpeg".to_string(),
        }),
        Some("webp") => Ok(Attachment::Image {
            path: display,
            mime: "image/webp".to_string(),
        }),
        Some("gif") => Ok(Attachment::Image {
            path: display,
            mime: "image/gif".to_string(),
        }),
        Some("mp4") => Ok(Attachment::Video {
            path: display,
            mime: "video/mp4".to_string(),
        }),
        Some("mov") => Ok(Attachment::Video {
            path: display,
            mime: "video/quicktime".to_string(),
        }),
        Some("webm") => Ok(Attachment::Video {
            path: display,
            mime: "video/webm".to_string(),
        }),
        other => Err(format!(
            "Unsupported attachment type: {}",
            other.unwrap_or("none")
        )),
    }
}

/// Start the interactive chat session
///
/// # Arguments
///
/// * `config` - Global configuration (consumed)
/// * `resume` - Optional conversation id to resume instead of the most recent
/// * `audio_source` - Optional audio file the recorder toggle hands back
pub async fn run_chat(
    config: Config,
    resume: Option<String>,
    audio_source: Option<PathBuf>,
) -> Result<()> {
    tracing::info!("Starting interactive chat session");

    let user = resolve_user(&config.user);
    let (store, conversations) = load_or_bootstrap(&config, &user)?;

    let mut view = ConversationViewModel::new(store.clone(), &user.uid);
    let active = match &resume {
        Some(id) => store.get(&user.uid, id)?.ok_or_else(|| {
            PolymodeError::Validation(format!("Conversation not found: {}", id))
        })?,
        None => conversations[0].clone(),
    };
    println!("{}", format!("Resuming '{}'", active.title).cyan());
    view.set_active(active);

    let selector = Arc::new(KeyringSelector::new());
    let mut gateway = GatewayContext::new(config.backend.clone())?;
    if !gateway.has_credential() {
        if let Some(stored) = selector.stored_credential() {
            gateway = GatewayContext::with_credential(config.backend.clone(), Some(stored))?;
        }
    }

    let orchestrator = TurnOrchestrator::new(
        gateway,
        &config.chat,
        config.storage.media_path(),
    )
    .with_selector(selector);

    let capture = audio_source.map(FileCapture::new);
    let mut recorder = Recorder::default();
    let mut pending = PendingTurn::default();

    let mut rl = DefaultEditor::new().map_err(|e| {
        PolymodeError::Configuration(format!("Failed to initialize readline: {}", e))
    })?;

    print_banner(&user.display_name().to_string());

    loop {
        let prompt = format!("[{}] >> ", pending.tool.to_string().green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let command = match parse_session_command(trimmed) {
                    Ok(c) => c,
                    Err(e) => {
                        println!("{}", e.yellow());
                        continue;
                    }
                };

                match command {
                    SessionCommand::SelectTool(tool) => {
                        pending.select_tool(tool);
                        println!("Tool: {}", tool.to_string().green());
                    }
                    SessionCommand::Attach(path) => match classify_attachment(&path) {
                        Ok(Attachment::Image { path, mime }) => {
                            pending.attach_image(Attachment::Image { path, mime });
                            println!("{}", "Attached image".cyan());
                        }
                        Ok(Attachment::Video { path, mime }) => {
                            pending.attach_video(Attachment::Video { path, mime });
                            println!("{}", "Attached video".cyan());
                        }
                        Ok(Attachment::Audio { .. }) => {
                            println!("{}", "Use /record for audio input".yellow());
                        }
                        Err(e) => println!("{}", e.yellow()),
                    },
                    SessionCommand::Aspect(ratio) => {
                        pending.aspect_ratio = ratio;
                        println!("Image aspect: {}", pending.aspect_ratio);
                    }
                    SessionCommand::VideoAspect(ratio) => match VideoAspect::parse_str(&ratio) {
                        Ok(aspect) => {
                            pending.video_aspect = aspect;
                            println!("Video aspect: {}", aspect);
                        }
                        Err(e) => println!("{}", e.yellow()),
                    },
                    SessionCommand::Thinking => {
                        pending.thinking = !pending.thinking;
                        println!(
                            "Thinking: {}",
                            if pending.thinking { "on" } else { "off" }
                        );
                    }
                    SessionCommand::Record => {
                        let Some(capture) = capture.as_ref() else {
                            println!(
                                "{}",
                                "No audio source configured; pass --audio-source".yellow()
                            );
                            continue;
                        };
                        if recorder.is_recording() {
                            match recorder.stop(capture).await {
                                Ok(Some(artifact)) => {
                                    println!("{}", "Recording stopped, transcribing".cyan());
                                    handle_stop(&orchestrator, &mut view, artifact).await;
                                }
                                Ok(None) => {}
                                Err(e) => println!("{}", e.to_string().red()),
                            }
                        } else {
                            match recorder.start(capture).await {
                                Ok(true) => println!("{}", "Recording".red()),
                                Ok(false) => {}
                                Err(e) => println!("{}", e.to_string().red()),
                            }
                        }
                    }
                    SessionCommand::New => {
                        let conversation = store.create(
                            &user.uid,
                            &config.chat.default_title,
                            &config.backend.fast_model,
                            vec![Message::model_text(&config.chat.greeting)],
                        )?;
                        println!("Switched to '{}'", conversation.title);
                        view.set_active(conversation);
                    }
                    SessionCommand::List => {
                        for conversation in store.fetch_all(&user.uid)? {
                            println!(
                                "{}  {}  ({} messages)",
                                conversation.id.dimmed(),
                                conversation.title,
                                conversation.messages.len()
                            );
                        }
                    }
                    SessionCommand::Switch(id) => match store.get(&user.uid, &id)? {
                        Some(conversation) => {
                            println!("Switched to '{}'", conversation.title);
                            view.set_active(conversation);
                        }
                        None => println!("{}", format!("Conversation not found: {}", id).yellow()),
                    },
                    SessionCommand::Speak => match orchestrator.speak_last(&view).await {
                        Ok(path) => println!("Audio written to {}", path.display()),
                        Err(e) => println!("{}", e.to_string().red()),
                    },
                    SessionCommand::Status => print_status(&view, &pending),
                    SessionCommand::Help => print_help(),
                    SessionCommand::Exit => break,
                    SessionCommand::None => {
                        // Snapshot the pending turn, then clear the input
                        // state immediately so a fast follow-up does not
                        // race with the in-flight turn.
                        let mut turn = pending.clone();
                        turn.text = trimmed.to_string();
                        pending.image = None;
                        pending.video = None;

                        match orchestrator.dispatch(&mut view, turn).await {
                            Ok(()) => print_latest(&view),
                            Err(e) => println!("{}", e.to_string().red()),
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                return Err(
                    PolymodeError::Configuration(format!("Readline failed: {}", e)).into(),
                );
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}

async fn handle_stop(
    orchestrator: &TurnOrchestrator,
    view: &mut ConversationViewModel,
    artifact: AudioArtifact,
) {
    match orchestrator.handle_recording_stopped(view, artifact).await {
        Ok(()) => print_latest(view),
        Err(e) => println!("{}", e.to_string().red()),
    }
}

fn print_banner(name: &str) {
    println!("{}", format!("polymode — signed in as {}", name).bold());
    println!("Type /help for commands.\n");
}

fn print_help() {
    println!("Commands:");
    println!("  /tool <chat|video-analysis|image-gen|image-edit|video-gen|canvas>");
    println!("  /attach <path>         attach an image or video to the next turn");
    println!("  /aspect <ratio>        image aspect ratio (e.g. 1:1, 16:9)");
    println!("  /video-aspect <ratio>  video aspect ratio (16:9 or 9:16)");
    println!("  /thinking              toggle extended reasoning");
    println!("  /record                toggle audio recording");
    println!("  /new /list /switch <id>");
    println!("  /speak                 read the latest response aloud");
    println!("  /status /help /exit");
}

fn print_status(view: &ConversationViewModel, pending: &PendingTurn) {
    let title = view.active().map(|c| c.title.as_str()).unwrap_or("(none)");
    println!("Conversation: {}", title);
    println!("Messages: {}", view.messages().len());
    println!("Tool: {}", pending.tool);
    println!(
        "Attachment: {}",
        match (&pending.image, &pending.video) {
            (Some(_), _) => "image",
            (_, Some(_)) => "video",
            _ => "none",
        }
    );
}

/// Print the most recent model-authored message
fn print_latest(view: &ConversationViewModel) {
    let Some(message) = view.messages().iter().rev().find(|m| m.role == Role::Model) else {
        return;
    };
    match &message.body {
        MessageBody::Text { text, grounding, .. } => {
            println!("{}", text);
            for chunk in grounding {
                if let Some(uri) = &chunk.uri {
                    println!("  {} {}", "source:".dimmed(), uri.dimmed());
                }
            }
        }
        MessageBody::Image { caption, data } => {
            println!("{} ({} bytes base64)", caption, data.len());
        }
        MessageBody::Video { caption, path } => {
            println!("{} -> {}", caption, path);
        }
        MessageBody::Code { source } => {
            println!("{}", source);
        }
        MessageBody::Error { message } => {
            println!("{}", message.red());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_command() {
        assert_eq!(
            parse_session_command("/tool video-gen").unwrap(),
            SessionCommand::SelectTool(Tool::VideoGen)
        );
        assert!(parse_session_command("/tool warp").is_err());
    }

    #[test]
    fn test_parse_attach_requires_path() {
        assert!(parse_session_command("/attach").is_err());
        assert_eq!(
            parse_session_command("/attach /tmp/cat.png").unwrap(),
            SessionCommand::Attach(PathBuf::from("/tmp/cat.png"))
        );
    }

    #[test]
    fn test_parse_plain_text_is_not_a_command() {
        assert_eq!(
            parse_session_command("hello there").unwrap(),
            SessionCommand::None
        );
    }

    #[test]
    fn test_parse_unknown_command_errors() {
        assert!(parse_session_command("/frobnicate").is_err());
    }

    #[test]
    fn test_parse_exit_variants() {
        assert_eq!(parse_session_command("/exit").unwrap(), SessionCommand::Exit);
        assert_eq!(parse_session_command("/quit").unwrap(), SessionCommand::Exit);
    }

    #[test]
    fn test_classify_attachment_by_extension() {
        assert!(matches!(
            classify_attachment(Path::new("cat.PNG")).unwrap(),
            Attachment::Image { .. }
        ));
        assert!(matches!(
            classify_attachment(Path::new("clip.mp4")).unwrap(),
            Attachment::Video { .. }
        ));
        assert!(classify_attachment(Path::new("notes.txt")).is_err());
        assert!(classify_attachment(Path::new("noext")).is_err());
    }
}

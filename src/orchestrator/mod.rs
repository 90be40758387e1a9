//! Turn orchestrator
//!
//! Entered once per user-initiated send. The orchestrator selects the
//! pathway for the active tool, appends the optimistic user turn before
//! any network activity, drives the streaming/polling state machine to a
//! terminal state, and converts every pathway failure into a persisted
//! error message so it survives reload.

pub mod capture;
pub mod credentials;

pub use capture::{AudioArtifact, FileCapture, MediaCapture, Recorder};
pub use credentials::{CredentialSelector, KeyringSelector};

use crate::config::ChatConfig;
use crate::conversation::{
    Attachment, ConversationViewModel, GroundingChunk, Message, MessageBody, Role,
};
use crate::error::{PolymodeError, Result};
use crate::gateway::{
    self, ChatOptions, GatewayContext, HistoryTurn, InlineMedia, ModelTier, VideoAspect,
    VideoClient,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use ulid::Ulid;

/// Caption attached to a generated image result
const IMAGE_CAPTION: &str = "Here is the image gen you requested.";

/// Caption attached to an edited image result
const EDIT_CAPTION: &str = "Here is the edited image you requested.";

/// Caption attached to a fetched video result
const VIDEO_CAPTION: &str = "Here is the video you requested.";

/// Status message logged into the transcript when video generation starts
const VIDEO_STATUS: &str = "Generating video... This may take a few minutes.";

/// Modality selected for the pending turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Streaming text chat
    #[default]
    Chat,
    /// Streaming chat over an attached video
    VideoAnalysis,
    /// Single-shot image generation
    ImageGen,
    /// Single-shot image edit; requires an attached image
    ImageEdit,
    /// Long-running video generation
    VideoGen,
    /// Single-shot code generation
    Canvas,
}

impl Tool {
    /// Parse a tool from its command name
    ///
    /// # Examples
    ///
    /// ```
    /// use polymode::orchestrator::Tool;
    ///
    /// assert_eq!(Tool::parse_str("image-gen").unwrap(), Tool::ImageGen);
    /// assert!(Tool::parse_str("telepathy").is_err());
    /// ```
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "video-analysis" => Ok(Self::VideoAnalysis),
            "image-gen" => Ok(Self::ImageGen),
            "image-edit" => Ok(Self::ImageEdit),
            "video-gen" => Ok(Self::VideoGen),
            "canvas" => Ok(Self::Canvas),
            other => Err(format!("Unknown tool: {}", other)),
        }
    }

    /// Command name of this tool
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::VideoAnalysis => "video-analysis",
            Self::ImageGen => "image-gen",
            Self::ImageEdit => "image-edit",
            Self::VideoGen => "video-gen",
            Self::Canvas => "canvas",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pathway phase, traced as the turn state machine advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnPhase {
    Dispatching,
    StreamingChat,
    AwaitingGeneration,
    PollingVideo,
    Settled,
}

/// The composite, ephemeral input of one send action
///
/// At most one media attachment is active at a time: attaching one kind
/// clears the other, and switching tool clears both.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    /// Current text input
    pub text: String,
    /// Attached image, if any
    pub image: Option<Attachment>,
    /// Attached video, if any
    pub video: Option<Attachment>,
    /// Selected modality
    pub tool: Tool,
    /// Aspect ratio for image generation
    pub aspect_ratio: String,
    /// Aspect ratio for video generation
    pub video_aspect: VideoAspect,
    /// Request extended reasoning
    pub thinking: bool,
}

impl Default for PendingTurn {
    fn default() -> Self {
        Self {
            text: String::new(),
            image: None,
            video: None,
            tool: Tool::default(),
            aspect_ratio: "1:1".to_string(),
            video_aspect: VideoAspect::default(),
            thinking: false,
        }
    }
}

impl PendingTurn {
    /// Attach an image, clearing any attached video
    pub fn attach_image(&mut self, attachment: Attachment) {
        self.video = None;
        self.image = Some(attachment);
    }

    /// Attach a video, clearing any attached image
    pub fn attach_video(&mut self, attachment: Attachment) {
        self.image = None;
        self.video = Some(attachment);
    }

    /// Switch the selected tool, clearing any attachment
    pub fn select_tool(&mut self, tool: Tool) {
        self.image = None;
        self.video = None;
        self.tool = tool;
    }

    /// Whether this turn carries nothing to send
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none() && self.video.is_none()
    }
}

/// Releases the per-conversation busy flag when a pathway settles
#[derive(Debug)]
struct BusyGuard<'a> {
    busy: &'a Mutex<HashSet<String>>,
    conversation_id: String,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.busy.lock() {
            set.remove(&self.conversation_id);
        }
    }
}

/// Orchestrates one turn at a time per conversation
///
/// Owns the gateway context, the optional credential-selection capability,
/// and the long-running video state machine.
pub struct TurnOrchestrator {
    gateway: GatewayContext,
    selector: Option<Arc<dyn CredentialSelector>>,
    busy: Mutex<HashSet<String>>,
    poll_interval: Duration,
    video_attempts: u32,
    history_limit: usize,
    default_title: String,
    media_dir: PathBuf,
}

impl TurnOrchestrator {
    /// Create an orchestrator
    ///
    /// # Arguments
    ///
    /// * `gateway` - Session gateway context
    /// * `chat` - Pathway tuning configuration
    /// * `media_dir` - Directory fetched/synthesized artifacts land in
    pub fn new(gateway: GatewayContext, chat: &ChatConfig, media_dir: PathBuf) -> Self {
        Self {
            gateway,
            selector: None,
            busy: Mutex::new(HashSet::new()),
            poll_interval: Duration::from_millis(chat.poll_interval_ms),
            video_attempts: chat.video_attempts.max(1),
            history_limit: chat.history_limit,
            default_title: chat.default_title.clone(),
            media_dir,
        }
    }

    /// Attach a credential-selection capability
    pub fn with_selector(mut self, selector: Arc<dyn CredentialSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// The session gateway context
    pub fn gateway(&self) -> &GatewayContext {
        &self.gateway
    }

    /// Execute one send action to a terminal state
    ///
    /// The user's turn is appended (and persisted) before any network
    /// activity. Pathway failures become transcript error messages; the
    /// call itself only fails when the dispatch is rejected outright.
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::TurnInFlight` when the conversation already
    /// has a pathway running, `PolymodeError::Validation` when no
    /// conversation is active.
    pub async fn dispatch(
        &self,
        view: &mut ConversationViewModel,
        turn: PendingTurn,
    ) -> Result<()> {
        // Empty input with no attachment is a no-op, not an error.
        if turn.is_empty() {
            return Ok(());
        }

        let conversation_id = view
            .active_id()
            .ok_or_else(|| PolymodeError::Validation("no active conversation".to_string()))?
            .to_string();
        let _guard = self.begin(&conversation_id)?;
        self.trace_phase(TurnPhase::Dispatching);

        let attachments: Vec<Attachment> = turn
            .image
            .iter()
            .chain(turn.video.iter())
            .cloned()
            .collect();
        view.apply(Message::user_text(turn.text.clone(), attachments));
        self.refresh_title(view, &turn.text);

        match turn.tool {
            Tool::Chat | Tool::VideoAnalysis => self.run_chat_pathway(view, &turn).await,
            Tool::ImageGen => self.run_image_pathway(view, &turn).await,
            Tool::ImageEdit => self.run_image_edit_pathway(view, &turn).await,
            Tool::VideoGen => self.run_video_pathway(view, &turn).await,
            Tool::Canvas => self.run_code_pathway(view, &turn).await,
        }

        self.trace_phase(TurnPhase::Settled);
        Ok(())
    }

    /// Handle a record-stop signal from the capture collaborator
    ///
    /// Appends the user turn carrying the audio artifact, then requests a
    /// transcription; the transcript (or the failure) lands as a model
    /// message.
    pub async fn handle_recording_stopped(
        &self,
        view: &mut ConversationViewModel,
        artifact: AudioArtifact,
    ) -> Result<()> {
        let conversation_id = view
            .active_id()
            .ok_or_else(|| PolymodeError::Validation("no active conversation".to_string()))?
            .to_string();
        let _guard = self.begin(&conversation_id)?;
        self.trace_phase(TurnPhase::Dispatching);

        view.apply(Message::user_text(
            "",
            vec![Attachment::Audio {
                path: artifact.path.display().to_string(),
                mime: artifact.mime.clone(),
            }],
        ));

        self.trace_phase(TurnPhase::AwaitingGeneration);
        let outcome = async {
            let audio = inline_attachment(&Attachment::Audio {
                path: artifact.path.display().to_string(),
                mime: artifact.mime.clone(),
            })?;
            gateway::transcribe(&self.gateway, &audio).await
        }
        .await;

        match outcome {
            Ok(transcript) => view.apply(Message::model_text(transcript)),
            Err(e) => view.apply(Message::error(e.to_string())),
        }
        self.trace_phase(TurnPhase::Settled);
        Ok(())
    }

    /// Synthesize the most recent model response to an audio file
    ///
    /// # Returns
    ///
    /// The local path of the written audio file.
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Validation` when there is nothing to speak.
    pub async fn speak_last(&self, view: &ConversationViewModel) -> Result<PathBuf> {
        let text = view
            .active()
            .and_then(|c| c.last_model_text())
            .ok_or_else(|| {
                PolymodeError::Validation("no model response to speak".to_string())
            })?
            .to_string();

        let payload = gateway::synthesize_speech(&self.gateway, &text).await?;
        let bytes = BASE64
            .decode(payload.as_bytes())
            .map_err(|e| PolymodeError::Generation(format!("invalid audio payload: {}", e)))?;

        std::fs::create_dir_all(&self.media_dir).map_err(PolymodeError::Io)?;
        let path = self.media_dir.join(format!("{}.wav", Ulid::new()));
        std::fs::write(&path, &bytes).map_err(PolymodeError::Io)?;
        Ok(path)
    }

    // -- pathways ---------------------------------------------------------

    async fn run_chat_pathway(&self, view: &mut ConversationViewModel, turn: &PendingTurn) {
        self.trace_phase(TurnPhase::StreamingChat);

        // History excludes the just-appended user turn; the prompt carries it.
        let messages = view.messages();
        let prior = &messages[..messages.len().saturating_sub(1)];
        let history = build_history(prior, self.history_limit);

        let tier = self.active_tier(view);

        // Persisted immediately so a reload mid-stream shows a pending
        // indicator rather than nothing.
        let placeholder = Message::placeholder();
        let id = placeholder.id.clone();
        let created_at = placeholder.created_at.clone();
        view.apply(placeholder);

        let started = async {
            let image = turn.image.as_ref().map(inline_attachment).transpose()?;
            let video = turn.video.as_ref().map(inline_attachment).transpose()?;
            gateway::stream_chat(
                &self.gateway,
                &history,
                &turn.text,
                image,
                video,
                tier,
                &ChatOptions {
                    thinking: turn.thinking,
                },
            )
            .await
        }
        .await;

        let mut rx = match started {
            Ok(rx) => rx,
            Err(e) => {
                view.apply(error_message_at(id, created_at, &e));
                return;
            }
        };

        let mut text = String::new();
        let mut grounding: Vec<GroundingChunk> = Vec::new();
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => {
                    if let Some(t) = &chunk.text {
                        text.push_str(t);
                    }
                    // Arrival order, duplicates preserved.
                    grounding.extend(chunk.grounding);
                    view.apply_in_memory(text_message_at(&id, &created_at, &text, &grounding));
                }
                Err(e) => {
                    // The partial accumulation is discarded.
                    view.apply(error_message_at(id, created_at, &e));
                    return;
                }
            }
        }

        // Only the final state is persisted.
        view.apply(text_message_at(&id, &created_at, &text, &grounding));
    }

    async fn run_image_pathway(&self, view: &mut ConversationViewModel, turn: &PendingTurn) {
        self.trace_phase(TurnPhase::AwaitingGeneration);
        match gateway::generate_image(&self.gateway, &turn.text, &turn.aspect_ratio).await {
            Ok(data) => view.apply(Message::new(
                Role::Model,
                MessageBody::Image {
                    caption: IMAGE_CAPTION.to_string(),
                    data,
                },
            )),
            Err(e) => view.apply(Message::error(e.to_string())),
        }
    }

    async fn run_image_edit_pathway(&self, view: &mut ConversationViewModel, turn: &PendingTurn) {
        // Fail fast before any network activity.
        let Some(image) = turn.image.as_ref() else {
            let err = PolymodeError::Validation(
                "image edit requires an attached image".to_string(),
            );
            view.apply(Message::error(err.to_string()));
            return;
        };

        self.trace_phase(TurnPhase::AwaitingGeneration);
        let outcome = async {
            let source = inline_attachment(image)?;
            gateway::edit_image(&self.gateway, &turn.text, &source).await
        }
        .await;

        match outcome {
            Ok(data) => view.apply(Message::new(
                Role::Model,
                MessageBody::Image {
                    caption: EDIT_CAPTION.to_string(),
                    data,
                },
            )),
            Err(e) => view.apply(Message::error(e.to_string())),
        }
    }

    async fn run_code_pathway(&self, view: &mut ConversationViewModel, turn: &PendingTurn) {
        self.trace_phase(TurnPhase::AwaitingGeneration);
        match gateway::generate_code(&self.gateway, &turn.text, turn.thinking).await {
            Ok(source) => view.apply(Message::new(Role::Model, MessageBody::Code { source })),
            Err(e) => view.apply(Message::error(e.to_string())),
        }
    }

    async fn run_video_pathway(&self, view: &mut ConversationViewModel, turn: &PendingTurn) {
        self.trace_phase(TurnPhase::PollingVideo);

        // Retained in history as a log entry, distinct from the result.
        view.apply(Message::model_text(VIDEO_STATUS));

        // Prompt for a credential up front when the capability is present
        // and nothing is selected yet.
        if let Some(selector) = &self.selector {
            if !selector.has_selected_credential() {
                match selector.open_credential_selector().await {
                    Ok(key) => self.gateway.set_credential(key),
                    Err(e) => {
                        view.apply(Message::error(e.to_string()));
                        return;
                    }
                }
            }
        }

        let mut attempt = 1u32;
        loop {
            match self.run_video_attempt(turn).await {
                Ok(path) => {
                    view.apply(Message::new(
                        Role::Model,
                        MessageBody::Video {
                            caption: VIDEO_CAPTION.to_string(),
                            path: path.display().to_string(),
                        },
                    ));
                    return;
                }
                // Credential failures are self-correctable within a session;
                // all other failures are terminal immediately.
                Err(e) if is_credential_not_found(&e) && attempt < self.video_attempts => {
                    attempt += 1;
                    warn!("Video attempt failed with unrecognized credential, reselecting");
                    match &self.selector {
                        Some(selector) => match selector.open_credential_selector().await {
                            Ok(key) => {
                                self.gateway.set_credential(key);
                                continue;
                            }
                            Err(se) => {
                                view.apply(Message::error(se.to_string()));
                                return;
                            }
                        },
                        None => {
                            view.apply(Message::error(e.to_string()));
                            return;
                        }
                    }
                }
                Err(e) => {
                    view.apply(Message::error(e.to_string()));
                    return;
                }
            }
        }
    }

    /// One generation attempt: start the job, poll to terminal, fetch
    ///
    /// The client is rebuilt per attempt so a freshly selected credential
    /// is picked up.
    async fn run_video_attempt(&self, turn: &PendingTurn) -> Result<PathBuf> {
        let client = VideoClient::from_context(&self.gateway)?;
        let source = turn.image.as_ref().map(inline_attachment).transpose()?;

        let mut operation = client
            .generate(&turn.text, source.as_ref(), turn.video_aspect)
            .await?;

        while !operation.done {
            debug!("Video operation {} pending, waiting", operation.name);
            tokio::time::sleep(self.poll_interval).await;
            operation = client.poll(&operation).await?;
        }

        if let Some(error) = operation.error {
            return Err(PolymodeError::Upstream(error.message).into());
        }
        let uri = operation.result_uri().ok_or_else(|| {
            PolymodeError::Generation("operation completed without a video".to_string())
        })?;

        client.fetch(uri, &self.media_dir).await
    }

    // -- internals --------------------------------------------------------

    /// Claim the busy flag for a conversation
    fn begin(&self, conversation_id: &str) -> Result<BusyGuard<'_>> {
        let mut set = self
            .busy
            .lock()
            .map_err(|_| PolymodeError::Storage("busy set poisoned".to_string()))?;
        if !set.insert(conversation_id.to_string()) {
            return Err(PolymodeError::TurnInFlight(conversation_id.to_string()).into());
        }
        Ok(BusyGuard {
            busy: &self.busy,
            conversation_id: conversation_id.to_string(),
        })
    }

    /// Title an untitled conversation from its first user turn
    fn refresh_title(&self, view: &mut ConversationViewModel, text: &str) {
        let is_default = view
            .active()
            .map(|c| c.title == self.default_title)
            .unwrap_or(false);
        if is_default && !text.trim().is_empty() {
            view.set_title(derive_title(text));
        }
    }

    /// Model tier the active conversation is pinned to
    fn active_tier(&self, view: &ConversationViewModel) -> ModelTier {
        let capable = &self.gateway.config().capable_model;
        match view.active() {
            Some(c) if &c.model == capable => ModelTier::Capable,
            _ => ModelTier::Fast,
        }
    }

    fn trace_phase(&self, phase: TurnPhase) {
        debug!("Turn phase: {:?}", phase);
    }
}

/// Build the bounded, media-stripped history payload
///
/// Keeps the last `limit` turns that contribute text, as role/text pairs.
fn build_history(messages: &[Message], limit: usize) -> Vec<HistoryTurn> {
    let mut turns: Vec<HistoryTurn> = messages
        .iter()
        .filter_map(|m| {
            m.transcript_text().map(|text| HistoryTurn {
                role: m.role.to_string(),
                text: text.to_string(),
            })
        })
        .collect();
    if turns.len() > limit {
        turns.drain(..turns.len() - limit);
    }
    turns
}

/// Read and base64-encode an attached media file
fn inline_attachment(attachment: &Attachment) -> Result<InlineMedia> {
    let (path, mime) = match attachment {
        Attachment::Image { path, mime }
        | Attachment::Video { path, mime }
        | Attachment::Audio { path, mime } => (path, mime),
    };
    let bytes = std::fs::read(path).map_err(PolymodeError::Io)?;
    Ok(InlineMedia {
        mime: mime.clone(),
        data: BASE64.encode(&bytes),
    })
}

/// Whether a failure message indicates the credential was not recognized
///
/// Matches the backend's "entity not found" phrasing in both its short and
/// long forms.
fn is_credential_not_found(err: &anyhow::Error) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("entity not found") || message.contains("entity was not found")
}

/// Derive a conversation title from its first user turn
fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= 40 {
        trimmed.to_string()
    } else {
        let mut title: String = trimmed.chars().take(37).collect();
        title.push_str("...");
        title
    }
}

fn text_message_at(id: &str, created_at: &str, text: &str, grounding: &[GroundingChunk]) -> Message {
    Message {
        id: id.to_string(),
        role: Role::Model,
        created_at: created_at.to_string(),
        body: MessageBody::Text {
            text: text.to_string(),
            grounding: grounding.to_vec(),
            attachments: Vec::new(),
        },
    }
}

fn error_message_at(id: String, created_at: String, err: &anyhow::Error) -> Message {
    Message {
        id,
        role: Role::Model,
        created_at,
        body: MessageBody::Error {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn orchestrator() -> TurnOrchestrator {
        let gateway =
            GatewayContext::with_credential(BackendConfig::default(), Some("key".to_string()))
                .unwrap();
        TurnOrchestrator::new(gateway, &ChatConfig::default(), PathBuf::from("/tmp/media"))
    }

    #[test]
    fn test_tool_parse_round_trip() {
        for tool in [
            Tool::Chat,
            Tool::VideoAnalysis,
            Tool::ImageGen,
            Tool::ImageEdit,
            Tool::VideoGen,
            Tool::Canvas,
        ] {
            assert_eq!(Tool::parse_str(tool.as_str()).unwrap(), tool);
        }
        assert!(Tool::parse_str("telepathy").is_err());
    }

    #[test]
    fn test_pending_turn_attachment_exclusivity() {
        let mut turn = PendingTurn::default();
        turn.attach_image(Attachment::Image {
            path: "/tmp/a.png".to_string(),
            mime: "image/png".to_string(),
        });
        turn.attach_video(Attachment::Video {
            path: "/tmp/b.mp4".to_string(),
            mime: "video/mp4".to_string(),
        });
        assert!(turn.image.is_none());
        assert!(turn.video.is_some());

        turn.attach_image(Attachment::Image {
            path: "/tmp/c.png".to_string(),
            mime: "image/png".to_string(),
        });
        assert!(turn.video.is_none());
        assert!(turn.image.is_some());
    }

    #[test]
    fn test_switching_tool_clears_attachments() {
        let mut turn = PendingTurn::default();
        turn.attach_image(Attachment::Image {
            path: "/tmp/a.png".to_string(),
            mime: "image/png".to_string(),
        });
        turn.select_tool(Tool::Canvas);
        assert!(turn.image.is_none());
        assert_eq!(turn.tool, Tool::Canvas);
    }

    #[test]
    fn test_pending_turn_is_empty() {
        let turn = PendingTurn::default();
        assert!(turn.is_empty());

        let mut with_text = PendingTurn::default();
        with_text.text = "   ".to_string();
        assert!(with_text.is_empty());
        with_text.text = "hi".to_string();
        assert!(!with_text.is_empty());

        let mut with_media = PendingTurn::default();
        with_media.attach_image(Attachment::Image {
            path: "/tmp/a.png".to_string(),
            mime: "image/png".to_string(),
        });
        assert!(!with_media.is_empty());
    }

    #[test]
    fn test_busy_guard_rejects_second_dispatch() {
        let orchestrator = orchestrator();
        let guard = orchestrator.begin("c1").unwrap();

        let rejected = orchestrator.begin("c1");
        assert!(rejected.is_err());
        let err = rejected.unwrap_err();
        let kind = err.downcast_ref::<PolymodeError>().unwrap();
        assert!(matches!(kind, PolymodeError::TurnInFlight(_)));

        // Another conversation is unaffected.
        assert!(orchestrator.begin("c2").is_ok());

        drop(guard);
        assert!(orchestrator.begin("c1").is_ok());
    }

    #[test]
    fn test_is_credential_not_found() {
        let short: anyhow::Error =
            PolymodeError::Upstream("Entity not found: key".to_string()).into();
        let long: anyhow::Error =
            PolymodeError::Upstream("Requested entity was not found.".to_string()).into();
        let other: anyhow::Error = PolymodeError::Upstream("quota exceeded".to_string()).into();
        assert!(is_credential_not_found(&short));
        assert!(is_credential_not_found(&long));
        assert!(!is_credential_not_found(&other));
    }

    #[test]
    fn test_derive_title_truncates() {
        assert_eq!(derive_title("draw a cat"), "draw a cat");
        let long = "a".repeat(60);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), 40);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_build_history_strips_media_and_bounds() {
        let mut messages = vec![
            Message::user_text(
                "look",
                vec![Attachment::Image {
                    path: "/tmp/a.png".to_string(),
                    mime: "image/png".to_string(),
                }],
            ),
            Message::model_text("nice"),
            Message::new(
                Role::Model,
                MessageBody::Code {
                    source: "<html></html>".to_string(),
                },
            ),
            Message::error("boom"),
        ];
        for i in 0..10 {
            messages.push(Message::user_text(format!("turn {}", i), vec![]));
        }

        let history = build_history(&messages, 4);
        assert_eq!(history.len(), 4);
        // Code and error turns contribute nothing; latest turns win.
        assert_eq!(history[3].text, "turn 9");
        assert!(history.iter().all(|t| t.role == "user" || t.role == "model"));
    }

    #[test]
    fn test_build_history_keeps_captions() {
        let messages = vec![Message::new(
            Role::Model,
            MessageBody::Image {
                caption: IMAGE_CAPTION.to_string(),
                data: "aGk=".to_string(),
            },
        )];
        let history = build_history(&messages, 8);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, IMAGE_CAPTION);
    }
}

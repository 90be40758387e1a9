//! Streaming chat gateway call
//!
//! Sends the conversation history plus the new turn's parts and yields
//! incremental chunks over a channel as the backend streams them back.
//! The response is server-sent events: `data:` lines separated by blank
//! lines, terminated by a `[DONE]` sentinel.

use crate::conversation::GroundingChunk;
use crate::error::{PolymodeError, Result};
use crate::gateway::{upstream_failure, GatewayContext, InlineMedia};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Model tier requested for a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Low-latency tier for plain text chat
    Fast,
    /// Stronger-reasoning tier for video analysis and thinking turns
    Capable,
}

/// Per-turn chat flags
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    /// Request an extended reasoning budget on the capable tier
    pub thinking: bool,
}

/// One role/text pair of prior history
///
/// History is stripped of media to bound payload size.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryTurn {
    /// "user" or "model"
    pub role: String,
    /// The turn text
    pub text: String,
}

/// One incremental streaming chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    /// Text to concatenate onto the accumulated response
    #[serde(default)]
    pub text: Option<String>,

    /// Citation fragments carried by this chunk
    #[serde(default)]
    pub grounding: Vec<GroundingChunk>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    history: &'a [HistoryTurn],
    prompt: Vec<PromptPart>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<ReasoningConfig>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PromptPart {
    Text { text: String },
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Serialize)]
struct ReasoningConfig {
    budget_tokens: u32,
}

/// Pick the model for a chat turn
///
/// Video analysis requires stronger reasoning, so a video attachment on
/// the fast tier silently upgrades to the capable tier. The thinking flag
/// always selects the capable tier.
pub(crate) fn select_model<'a>(
    config: &'a crate::config::BackendConfig,
    tier: ModelTier,
    has_video: bool,
    thinking: bool,
) -> &'a str {
    if thinking || has_video || tier == ModelTier::Capable {
        &config.capable_model
    } else {
        &config.fast_model
    }
}

/// Start a streaming chat call
///
/// Returns a channel of incremental chunks. The stream is finite and not
/// restartable; a new call is a new stream. Chunk order on the channel is
/// arrival order.
///
/// # Arguments
///
/// * `ctx` - Gateway context
/// * `history` - Prior role/text pairs, media stripped
/// * `prompt` - The new turn's text
/// * `image` - Optional inlined image attachment
/// * `video` - Optional inlined video attachment
/// * `tier` - Requested model tier (may be upgraded, see [`select_model`])
/// * `options` - Per-turn flags
///
/// # Errors
///
/// Returns `PolymodeError::Configuration` if no credential is configured,
/// `PolymodeError::Upstream` if the backend rejects the request. Transport
/// failures mid-stream arrive as an `Err` item on the channel.
pub async fn stream_chat(
    ctx: &GatewayContext,
    history: &[HistoryTurn],
    prompt: &str,
    image: Option<InlineMedia>,
    video: Option<InlineMedia>,
    tier: ModelTier,
    options: &ChatOptions,
) -> Result<mpsc::UnboundedReceiver<Result<ChatChunk>>> {
    let credential = ctx.credential()?;
    let model = select_model(ctx.config(), tier, video.is_some(), options.thinking);

    let mut parts = Vec::new();
    if !prompt.is_empty() {
        parts.push(PromptPart::Text {
            text: prompt.to_string(),
        });
    }
    for media in [image, video].into_iter().flatten() {
        parts.push(PromptPart::InlineData {
            mime_type: media.mime,
            data: media.data,
        });
    }

    let reasoning = options.thinking.then(|| ReasoningConfig {
        budget_tokens: ctx.config().thinking_budget,
    });

    let request = ChatRequest {
        model,
        history,
        prompt: parts,
        stream: true,
        reasoning,
    };

    tracing::debug!("Starting chat stream: model={}", model);

    let response = ctx
        .client()
        .post(ctx.endpoint("/v1/chat/stream"))
        .bearer_auth(&credential)
        .json(&request)
        .send()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Chat request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(upstream_failure(response).await.into());
    }

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(forward_sse_chunks(response.bytes_stream(), tx));
    Ok(rx)
}

/// Consume an SSE byte stream and forward parsed chunks to a channel
///
/// SSE events are separated by blank lines; each event's `data:` lines are
/// joined and parsed as one chunk. A `[DONE]` value ends the stream. A
/// transport error mid-stream is forwarded as an `Err` item and ends the
/// stream.
async fn forward_sse_chunks(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    tx: mpsc::UnboundedSender<Result<ChatChunk>>,
) {
    let mut buffer = String::new();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx.send(Err(
                    PolymodeError::Upstream(format!("Stream interrupted: {}", e)).into()
                ));
                return;
            }
        };

        match std::str::from_utf8(&bytes) {
            Ok(text) => buffer.push_str(text),
            Err(_) => continue,
        }

        while let Some(pos) = buffer.find("\n\n") {
            let event_block = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();

            let Some(data) = extract_event_data(&event_block) else {
                continue;
            };
            if data == "[DONE]" {
                return;
            }
            match serde_json::from_str::<ChatChunk>(&data) {
                Ok(chunk) => {
                    if tx.send(Ok(chunk)).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed stream chunk: {}", e),
            }
        }
    }
}

/// Join the `data:` lines of one SSE event block
///
/// Returns `None` for events without data (comments, keepalives).
pub(crate) fn extract_event_data(event_block: &str) -> Option<String> {
    let mut data_lines: Vec<&str> = Vec::new();
    for line in event_block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        }
        // Lines starting with `:` are SSE comments; all others are ignored.
    }

    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");
    if data.is_empty() {
        return None;
    }
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn test_select_model_fast_by_default() {
        let config = BackendConfig::default();
        assert_eq!(
            select_model(&config, ModelTier::Fast, false, false),
            "aurora-flash"
        );
    }

    #[test]
    fn test_select_model_video_upgrades_fast_tier() {
        let config = BackendConfig::default();
        assert_eq!(
            select_model(&config, ModelTier::Fast, true, false),
            "aurora-pro"
        );
    }

    #[test]
    fn test_select_model_thinking_always_capable() {
        let config = BackendConfig::default();
        assert_eq!(
            select_model(&config, ModelTier::Fast, false, true),
            "aurora-pro"
        );
    }

    #[test]
    fn test_select_model_capable_tier_stays_capable() {
        let config = BackendConfig::default();
        assert_eq!(
            select_model(&config, ModelTier::Capable, false, false),
            "aurora-pro"
        );
    }

    #[test]
    fn test_extract_event_data_single_line() {
        let data = extract_event_data("data: {\"text\":\"hi\"}").unwrap();
        assert_eq!(data, "{\"text\":\"hi\"}");
    }

    #[test]
    fn test_extract_event_data_joins_multiline() {
        let data = extract_event_data("data: line one\ndata: line two").unwrap();
        assert_eq!(data, "line one\nline two");
    }

    #[test]
    fn test_extract_event_data_ignores_comments() {
        assert!(extract_event_data(": keepalive").is_none());
        assert!(extract_event_data("event: ping").is_none());
    }

    #[test]
    fn test_chunk_deserializes_with_defaults() {
        let chunk: ChatChunk = serde_json::from_str("{}").unwrap();
        assert!(chunk.text.is_none());
        assert!(chunk.grounding.is_empty());

        let chunk: ChatChunk =
            serde_json::from_str("{\"text\":\"hi\",\"grounding\":[{\"uri\":\"u\"}]}").unwrap();
        assert_eq!(chunk.text.as_deref(), Some("hi"));
        assert_eq!(chunk.grounding.len(), 1);
    }

    #[tokio::test]
    async fn test_forward_sse_chunks_parses_and_stops_at_done() {
        let body = "data: {\"text\":\"Hel\"}\n\ndata: {\"text\":\"lo\"}\n\ndata: [DONE]\n\ndata: {\"text\":\"after\"}\n\n";
        let stream = futures::stream::iter(vec![Ok::<_, reqwest::Error>(Bytes::from(body))]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_sse_chunks(stream, tx).await;

        let mut texts = Vec::new();
        while let Some(item) = rx.recv().await {
            texts.push(item.unwrap().text.unwrap());
        }
        assert_eq!(texts, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_forward_sse_chunks_handles_split_events() {
        // An event split across two transport chunks must still parse.
        let stream = futures::stream::iter(vec![
            Ok::<_, reqwest::Error>(Bytes::from("data: {\"te")),
            Ok::<_, reqwest::Error>(Bytes::from("xt\":\"whole\"}\n\ndata: [DONE]\n\n")),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_sse_chunks(stream, tx).await;

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.text.as_deref(), Some("whole"));
        assert!(rx.recv().await.is_none());
    }
}

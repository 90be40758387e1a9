//! Audio transcription and speech synthesis gateway calls

use crate::error::{PolymodeError, Result};
use crate::gateway::{upstream_failure, GatewayContext, InlineMedia};
use serde::{Deserialize, Serialize};

/// Fixed voice profile for speech synthesis
pub(crate) const SPEECH_VOICE: &str = "cascade";

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    model: &'a str,
    audio: &'a InlineMedia,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    text: &'a str,
    voice: &'a str,
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    #[serde(default)]
    audio: Option<AudioPayload>,
}

#[derive(Debug, Deserialize)]
struct AudioPayload {
    data: String,
}

/// Transcribe a captured audio artifact to text
///
/// # Arguments
///
/// * `ctx` - Gateway context
/// * `audio` - The inlined audio payload
pub async fn transcribe(ctx: &GatewayContext, audio: &InlineMedia) -> Result<String> {
    let credential = ctx.credential()?;
    let request = TranscribeRequest {
        model: &ctx.config().fast_model,
        audio,
    };

    let response = ctx
        .client()
        .post(ctx.endpoint("/v1/audio/transcribe"))
        .bearer_auth(&credential)
        .json(&request)
        .send()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Transcription request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(upstream_failure(response).await.into());
    }

    let body: TranscribeResponse = response
        .json()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Invalid transcription response: {}", e)))?;
    Ok(body.text)
}

/// Synthesize speech for a text at the fixed voice profile
///
/// # Returns
///
/// The base64-encoded audio payload.
///
/// # Errors
///
/// Returns `PolymodeError::Generation` if the backend returns no audio
/// data.
pub async fn synthesize_speech(ctx: &GatewayContext, text: &str) -> Result<String> {
    let credential = ctx.credential()?;
    let request = SpeechRequest {
        model: &ctx.config().speech_model,
        text,
        voice: SPEECH_VOICE,
    };

    let response = ctx
        .client()
        .post(ctx.endpoint("/v1/audio/speech"))
        .bearer_auth(&credential)
        .json(&request)
        .send()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Speech request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(upstream_failure(response).await.into());
    }

    let body: SpeechResponse = response
        .json()
        .await
        .map_err(|e| PolymodeError::Upstream(format!("Invalid speech response: {}", e)))?;

    body.audio.map(|a| a.data).ok_or_else(|| {
        PolymodeError::Generation("backend returned no audio data".to_string()).into()
    })
}

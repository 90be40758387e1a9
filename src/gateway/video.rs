//! Long-running video generation gateway calls
//!
//! Video generation returns an operation handle that the orchestrator
//! polls to completion. The client here is deliberately reconstructible:
//! a fresh instance is built per attempt so that a credential selected
//! mid-session is picked up without restarting.

use crate::config::BackendConfig;
use crate::error::{PolymodeError, Result};
use crate::gateway::{upstream_failure, GatewayContext, InlineMedia};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ulid::Ulid;

/// Supported video aspect ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoAspect {
    /// 16:9 landscape
    #[default]
    Wide,
    /// 9:16 portrait
    Tall,
}

impl VideoAspect {
    /// Wire representation of the aspect ratio
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wide => "16:9",
            Self::Tall => "9:16",
        }
    }

    /// Parse an aspect ratio from its wire representation
    ///
    /// # Examples
    ///
    /// ```
    /// use polymode::gateway::VideoAspect;
    ///
    /// assert_eq!(VideoAspect::parse_str("9:16").unwrap(), VideoAspect::Tall);
    /// assert!(VideoAspect::parse_str("4:3").is_err());
    /// ```
    pub fn parse_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "16:9" => Ok(Self::Wide),
            "9:16" => Ok(Self::Tall),
            other => Err(format!("Unsupported video aspect ratio: {}", other)),
        }
    }
}

impl std::fmt::Display for VideoAspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// External handle for a long-running video generation job
#[derive(Debug, Clone, Deserialize)]
pub struct VideoOperation {
    /// Backend-assigned operation name, used for polling
    pub name: String,

    /// Whether the operation reached a terminal state
    #[serde(default)]
    pub done: bool,

    /// Terminal error, when the operation failed
    #[serde(default)]
    pub error: Option<OperationError>,

    /// Terminal result, when the operation succeeded
    #[serde(default)]
    pub response: Option<OperationResponse>,
}

/// Terminal operation failure
#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    /// Backend error message
    pub message: String,
}

/// Terminal operation result payload
#[derive(Debug, Clone, Deserialize)]
pub struct OperationResponse {
    /// Generated videos; the first entry is the result
    #[serde(default)]
    pub generated_videos: Vec<GeneratedVideo>,
}

/// One generated video entry
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedVideo {
    /// Reference to the downloadable artifact
    pub video: VideoRef,
}

/// Downloadable artifact reference
#[derive(Debug, Clone, Deserialize)]
pub struct VideoRef {
    /// Download URI
    pub uri: String,
}

impl VideoOperation {
    /// The result URI, when the operation completed with a video
    pub fn result_uri(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.generated_videos.first())
            .map(|v| v.video.uri.as_str())
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_image: Option<&'a InlineMedia>,
    aspect_ratio: &'a str,
}

/// Video generation client, rebuilt per attempt
///
/// Snapshots the context's credential at construction time, so building a
/// new instance after a credential reselection is sufficient to use the
/// new key.
pub struct VideoClient {
    client: Client,
    config: BackendConfig,
    credential: String,
}

impl VideoClient {
    /// Build a fresh client from the current context state
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Configuration` if no credential is currently
    /// selected.
    pub fn from_context(ctx: &GatewayContext) -> Result<Self> {
        let credential = ctx.credential()?;
        let config = ctx.config().clone();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("polymode/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                PolymodeError::Upstream(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config,
            credential,
        })
    }

    /// Start a video generation job
    ///
    /// # Arguments
    ///
    /// * `prompt` - What to generate
    /// * `source_image` - Optional image to animate
    /// * `aspect` - Output aspect ratio
    ///
    /// # Returns
    ///
    /// The initial (usually not yet done) operation handle.
    pub async fn generate(
        &self,
        prompt: &str,
        source_image: Option<&InlineMedia>,
        aspect: VideoAspect,
    ) -> Result<VideoOperation> {
        let request = GenerateRequest {
            model: &self.config.video_model,
            prompt,
            source_image,
            aspect_ratio: aspect.as_str(),
        };

        let response = self
            .client
            .post(self.endpoint("/v1/videos/generate"))
            .bearer_auth(&self.credential)
            .json(&request)
            .send()
            .await
            .map_err(|e| PolymodeError::Upstream(format!("Video request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(upstream_failure(response).await.into());
        }

        response
            .json::<VideoOperation>()
            .await
            .map_err(|e| PolymodeError::Upstream(format!("Invalid operation response: {}", e)).into())
    }

    /// Refresh an operation handle
    ///
    /// The caller owns the wait/retry cadence; this is a single poll.
    pub async fn poll(&self, operation: &VideoOperation) -> Result<VideoOperation> {
        let response = self
            .client
            .get(self.endpoint(&format!("/v1/operations/{}", operation.name)))
            .bearer_auth(&self.credential)
            .send()
            .await
            .map_err(|e| PolymodeError::Upstream(format!("Poll request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(upstream_failure(response).await.into());
        }

        response
            .json::<VideoOperation>()
            .await
            .map_err(|e| PolymodeError::Upstream(format!("Invalid operation response: {}", e)).into())
    }

    /// Download a finished video into the media directory
    ///
    /// # Arguments
    ///
    /// * `uri` - Download URI from the terminal operation
    /// * `media_dir` - Directory the artifact lands in
    ///
    /// # Returns
    ///
    /// The local path of the downloaded file.
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Fetch` on a non-success HTTP status or an
    /// unparseable URI.
    pub async fn fetch(&self, uri: &str, media_dir: &Path) -> Result<PathBuf> {
        let mut download = url::Url::parse(uri)
            .map_err(|e| PolymodeError::Fetch(format!("Invalid video URI: {}: {}", uri, e)))?;
        download
            .query_pairs_mut()
            .append_pair("key", &self.credential);

        let response = self
            .client
            .get(download)
            .send()
            .await
            .map_err(|e| PolymodeError::Fetch(format!("Video download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PolymodeError::Fetch(format!(
                "Video download failed with status {}",
                response.status()
            ))
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PolymodeError::Fetch(format!("Video download interrupted: {}", e)))?;

        std::fs::create_dir_all(media_dir).map_err(PolymodeError::Io)?;
        let path = media_dir.join(format!("{}.mp4", Ulid::new()));
        std::fs::write(&path, &bytes).map_err(PolymodeError::Io)?;

        tracing::info!("Fetched video to {}", path.display());
        Ok(path)
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_round_trip() {
        assert_eq!(VideoAspect::parse_str("16:9").unwrap(), VideoAspect::Wide);
        assert_eq!(VideoAspect::parse_str("9:16").unwrap(), VideoAspect::Tall);
        assert_eq!(VideoAspect::Wide.as_str(), "16:9");
        assert_eq!(VideoAspect::Tall.to_string(), "9:16");
    }

    #[test]
    fn test_aspect_rejects_unsupported_ratio() {
        assert!(VideoAspect::parse_str("4:3").is_err());
        assert!(VideoAspect::parse_str("").is_err());
    }

    #[test]
    fn test_operation_deserializes_pending_shape() {
        let op: VideoOperation = serde_json::from_str(r#"{"name":"op-1"}"#).unwrap();
        assert!(!op.done);
        assert!(op.error.is_none());
        assert!(op.result_uri().is_none());
    }

    #[test]
    fn test_operation_result_uri() {
        let json = r#"{
            "name": "op-1",
            "done": true,
            "response": {"generated_videos": [{"video": {"uri": "http://example.test/v.mp4"}}]}
        }"#;
        let op: VideoOperation = serde_json::from_str(json).unwrap();
        assert!(op.done);
        assert_eq!(op.result_uri(), Some("http://example.test/v.mp4"));
    }

    #[test]
    fn test_operation_error_shape() {
        let json = r#"{"name":"op-1","done":true,"error":{"message":"Requested entity was not found"}}"#;
        let op: VideoOperation = serde_json::from_str(json).unwrap();
        assert!(op.done);
        assert_eq!(
            op.error.unwrap().message,
            "Requested entity was not found"
        );
    }

    #[test]
    fn test_from_context_requires_credential() {
        let ctx =
            GatewayContext::with_credential(BackendConfig::default(), None).unwrap();
        assert!(VideoClient::from_context(&ctx).is_err());
    }

    #[test]
    fn test_from_context_snapshots_credential() {
        let ctx = GatewayContext::with_credential(
            BackendConfig::default(),
            Some("first-key".to_string()),
        )
        .unwrap();
        let client = VideoClient::from_context(&ctx).unwrap();
        assert_eq!(client.credential, "first-key");

        // A new credential only reaches a freshly built client.
        ctx.set_credential("second-key");
        assert_eq!(client.credential, "first-key");
        let rebuilt = VideoClient::from_context(&ctx).unwrap();
        assert_eq!(rebuilt.credential, "second-key");
    }
}

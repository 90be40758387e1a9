//! Capability gateway for the generation backend
//!
//! One module per modality: streaming chat, image generation/editing,
//! long-running video, code generation, speech, and the live session.
//! Every call goes through an explicit [`GatewayContext`] constructed at
//! session start; failures are normalized into the crate error taxonomy
//! and never escape as raw transport exceptions.

pub mod chat;
pub mod code;
pub mod image;
pub mod live;
pub mod speech;
pub mod video;

pub use chat::{stream_chat, ChatChunk, ChatOptions, HistoryTurn, ModelTier};
pub use code::generate_code;
pub use image::{edit_image, generate_image, inline_media_from_path};
pub use live::{connect_live, LiveFrame, LiveSession, LiveState};
pub use speech::{synthesize_speech, transcribe};
pub use video::{VideoAspect, VideoClient, VideoOperation};

use crate::config::BackendConfig;
use crate::error::{PolymodeError, Result};
use reqwest::Client;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Inline media payload sent with a generation request
#[derive(Debug, Clone, serde::Serialize)]
pub struct InlineMedia {
    /// MIME type, e.g. "image/png"
    pub mime: String,
    /// Base64-encoded content
    pub data: String,
}

/// Explicit client context for gateway calls
///
/// Constructed once per session and passed to every gateway call, rather
/// than living as a module-level singleton. The credential is shared and
/// replaceable so an interactive reselection takes effect mid-session;
/// the video pathway additionally builds a fresh [`VideoClient`] per
/// attempt so even its HTTP client picks the new credential up.
pub struct GatewayContext {
    client: Client,
    config: BackendConfig,
    credential: Arc<RwLock<Option<String>>>,
}

impl GatewayContext {
    /// Create a context, resolving the credential from the environment
    ///
    /// The credential env var name comes from `config.api_key_env`. A
    /// missing credential is not an error here; each call fails with
    /// `Configuration` when it actually needs one.
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Upstream` if HTTP client initialization fails.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let credential = std::env::var(&config.api_key_env).ok();
        Self::with_credential(config, credential)
    }

    /// Create a context with an explicit credential (or none)
    pub fn with_credential(config: BackendConfig, credential: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("polymode/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                PolymodeError::Upstream(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized gateway context: host={}, credential={}",
            config.host,
            if credential.is_some() { "set" } else { "unset" }
        );

        Ok(Self {
            client,
            config,
            credential: Arc::new(RwLock::new(credential)),
        })
    }

    /// Replace the active credential (e.g. after interactive reselection)
    pub fn set_credential(&self, credential: impl Into<String>) {
        if let Ok(mut guard) = self.credential.write() {
            *guard = Some(credential.into());
        }
    }

    /// Whether a credential is currently available
    pub fn has_credential(&self) -> bool {
        self.credential
            .read()
            .map(|c| c.is_some())
            .unwrap_or(false)
    }

    /// The backend configuration this context was built from
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// The current credential, or a `Configuration` error when unset
    pub(crate) fn credential(&self) -> Result<String> {
        self.credential
            .read()
            .ok()
            .and_then(|c| c.clone())
            .ok_or_else(|| {
                PolymodeError::Configuration(
                    "no API credential configured; set the configured environment variable or run the credential selector".to_string(),
                )
                .into()
            })
    }

    /// Build a full endpoint URL for a backend path
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// The shared HTTP client
    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

/// Turn a non-success HTTP response into an `Upstream` error
///
/// Reads the body so the backend's own message survives normalization.
pub(crate) async fn upstream_failure(response: reqwest::Response) -> PolymodeError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    PolymodeError::Upstream(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig::default()
    }

    #[test]
    fn test_context_without_credential_reports_unset() {
        let ctx = GatewayContext::with_credential(config(), None).unwrap();
        assert!(!ctx.has_credential());
        assert!(ctx.credential().is_err());
    }

    #[test]
    fn test_missing_credential_is_configuration_error() {
        let ctx = GatewayContext::with_credential(config(), None).unwrap();
        let err = ctx.credential().unwrap_err();
        let kind = err.downcast_ref::<PolymodeError>().unwrap();
        assert!(matches!(kind, PolymodeError::Configuration(_)));
    }

    #[test]
    fn test_set_credential_takes_effect() {
        let ctx = GatewayContext::with_credential(config(), None).unwrap();
        ctx.set_credential("key-123");
        assert!(ctx.has_credential());
        assert_eq!(ctx.credential().unwrap(), "key-123");
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let mut cfg = config();
        cfg.host = "http://example.test:8787/".to_string();
        let ctx = GatewayContext::with_credential(cfg, Some("k".to_string())).unwrap();
        assert_eq!(
            ctx.endpoint("/v1/chat/stream"),
            "http://example.test:8787/v1/chat/stream"
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_new_resolves_credential_from_env() {
        std::env::set_var("POLYMODE_API_KEY", "env-key");
        let ctx = GatewayContext::new(config()).unwrap();
        assert_eq!(ctx.credential().unwrap(), "env-key");
        std::env::remove_var("POLYMODE_API_KEY");
    }
}

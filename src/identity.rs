//! Identity collaborator
//!
//! The core only needs a stable user identifier; the rest of the profile
//! is display metadata. Resolution order: environment override, config,
//! then a local default.

use crate::config::UserConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the configured user id
const UID_ENV: &str = "POLYMODE_UID";

/// The session user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user identifier; scopes conversation storage
    pub uid: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl UserProfile {
    /// Name to show in the interface
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uid)
    }
}

/// Resolve the session user from environment and configuration
pub fn resolve_user(config: &UserConfig) -> UserProfile {
    let uid = std::env::var(UID_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| config.uid.clone())
        .unwrap_or_else(|| "local".to_string());

    UserProfile {
        uid,
        name: config.name.clone(),
        email: config.email.clone(),
        photo_url: config.photo_url.clone(),
    }
}

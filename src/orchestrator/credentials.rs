//! Interactive credential selection capability
//!
//! The video pathway prompts through this capability when no credential
//! is selected, and again when the backend reports the credential was not
//! recognized. The shipped implementation stores the selection in the
//! platform keyring.

use crate::error::{PolymodeError, Result};
use async_trait::async_trait;
use std::io::Write;

/// Host capability for interactive credential (re)selection
#[async_trait]
pub trait CredentialSelector: Send + Sync {
    /// Whether a credential has been selected in this host
    fn has_selected_credential(&self) -> bool;

    /// Prompt the user to select a credential
    ///
    /// # Returns
    ///
    /// The newly selected credential.
    async fn open_credential_selector(&self) -> Result<String>;
}

/// Keyring-backed credential selector
///
/// Selection is read from and written to the platform keyring, so a
/// choice survives across sessions.
pub struct KeyringSelector {
    service: String,
    account: String,
}

impl KeyringSelector {
    /// Selector storing under the default service/account pair
    pub fn new() -> Self {
        Self {
            service: "polymode".to_string(),
            account: "api-key".to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| PolymodeError::Keyring(e).into())
    }

    /// The stored credential, if one was previously selected
    pub fn stored_credential(&self) -> Option<String> {
        self.entry().ok().and_then(|e| e.get_password().ok())
    }
}

impl Default for KeyringSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialSelector for KeyringSelector {
    fn has_selected_credential(&self) -> bool {
        self.stored_credential().is_some()
    }

    async fn open_credential_selector(&self) -> Result<String> {
        let entry = self.entry()?;

        print!("Enter API credential: ");
        std::io::stdout().flush().map_err(PolymodeError::Io)?;

        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(PolymodeError::Io)?;
        let credential = line.trim().to_string();
        if credential.is_empty() {
            return Err(
                PolymodeError::Configuration("no credential entered".to_string()).into(),
            );
        }

        entry
            .set_password(&credential)
            .map_err(PolymodeError::Keyring)?;
        tracing::info!("Stored selected credential in keyring");
        Ok(credential)
    }
}

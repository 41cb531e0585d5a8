//! External login records.

use serde::{Deserialize, Serialize};

/// A (provider, provider key) pair linking a local account to a
/// third-party identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLoginInfo {
    pub login_provider: String,
    pub provider_key: String,
    /// Display name shown for the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_display_name: Option<String>,
}

impl UserLoginInfo {
    pub fn new(login_provider: impl Into<String>, provider_key: impl Into<String>) -> Self {
        Self {
            login_provider: login_provider.into(),
            provider_key: provider_key.into(),
            provider_display_name: None,
        }
    }

    /// Set the provider display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.provider_display_name = Some(display_name.into());
        self
    }

    /// Check if this login is identified by `login_provider` and `provider_key`
    pub fn matches(&self, login_provider: &str, provider_key: &str) -> bool {
        self.login_provider == login_provider && self.provider_key == provider_key
    }
}

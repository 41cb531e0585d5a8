//! Authentication tokens stored per user and provider.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named token value, unique per (user, login provider, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    pub user_id: Uuid,
    pub login_provider: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub value: Option<String>,
}

impl UserToken {
    /// Check if this token is identified by `login_provider` and `name`
    pub fn matches(&self, login_provider: &str, name: &str) -> bool {
        self.login_provider == login_provider && self.name == name
    }
}

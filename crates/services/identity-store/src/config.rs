//! Identity store configuration.

use common::DatabaseConfig;

/// Environment variables checked for the connection string, in order.
pub const DATABASE_URL_KEYS: &[&str] = &["IDENTITY_DATABASE_URL", "DATABASE_URL"];

/// Identity store configuration.
#[derive(Debug, Clone, Default)]
pub struct IdentityStoreConfig {
    pub database: DatabaseConfig,
}

impl IdentityStoreConfig {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig::from_env_keys(DATABASE_URL_KEYS),
        }
    }

    /// Override the connection string when one is given explicitly.
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.database.url = Some(url);
        }
        self
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref()
    }
}

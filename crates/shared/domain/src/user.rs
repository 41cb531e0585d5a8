//! User domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claim::Claim;
use crate::collection::Loaded;
use crate::constants::new_stamp;
use crate::login::UserLoginInfo;
use crate::role::UserRole;
use crate::token::UserToken;

/// User domain entity
///
/// The four child collections are [`Loaded::Unloaded`] after construction
/// or a fetch; the user store fills them on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub user_name: Option<String>,
    pub normalized_user_name: Option<String>,
    pub email: Option<String>,
    pub normalized_email: Option<String>,
    pub email_confirmed: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub phone_number: Option<String>,
    pub phone_number_confirmed: bool,
    pub two_factor_enabled: bool,
    /// End of the current lockout window (UTC); `None` when not locked out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_end: Option<DateTime<Utc>>,
    pub lockout_enabled: bool,
    pub access_failed_count: i32,
    #[serde(skip_serializing)]
    pub security_stamp: Option<String>,
    pub concurrency_stamp: Option<String>,

    #[serde(skip)]
    pub claims: Loaded<Claim>,
    #[serde(skip)]
    pub logins: Loaded<UserLoginInfo>,
    #[serde(skip)]
    pub roles: Loaded<UserRole>,
    #[serde(skip)]
    pub tokens: Loaded<UserToken>,
}

impl User {
    /// Create a user with a client-generated id and fresh stamps
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: Some(user_name.into()),
            ..Self::default()
        }
    }

    /// Check if a password hash is set
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// Record a failed access attempt, returning the new count
    pub fn increment_access_failed_count(&mut self) -> i32 {
        self.access_failed_count = self.access_failed_count.saturating_add(1);
        self.access_failed_count
    }

    pub fn reset_access_failed_count(&mut self) {
        self.access_failed_count = 0;
    }

    /// Check if the lockout window is still open at `now`
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end.is_some_and(|end| end > now)
    }

    /// Swap in a new concurrency stamp, returning the previous one
    pub fn rotate_concurrency_stamp(&mut self) -> Option<String> {
        self.concurrency_stamp.replace(new_stamp())
    }
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_name: None,
            normalized_user_name: None,
            email: None,
            normalized_email: None,
            email_confirmed: false,
            password_hash: None,
            phone_number: None,
            phone_number_confirmed: false,
            two_factor_enabled: false,
            lockout_end: None,
            lockout_enabled: false,
            access_failed_count: 0,
            security_stamp: Some(new_stamp()),
            concurrency_stamp: Some(new_stamp()),
            claims: Loaded::Unloaded,
            logins: Loaded::Unloaded,
            roles: Loaded::Unloaded,
            tokens: Loaded::Unloaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_user_has_unloaded_collections() {
        let user = User::new("alice");
        assert_eq!(user.user_name.as_deref(), Some("alice"));
        assert!(!user.claims.is_loaded());
        assert!(!user.logins.is_loaded());
        assert!(!user.roles.is_loaded());
        assert!(!user.tokens.is_loaded());
    }

    #[test]
    fn test_access_failed_count() {
        let mut user = User::new("alice");
        assert_eq!(user.increment_access_failed_count(), 1);
        assert_eq!(user.increment_access_failed_count(), 2);
        user.reset_access_failed_count();
        assert_eq!(user.access_failed_count, 0);
    }

    #[test]
    fn test_access_failed_count_saturates() {
        let mut user = User::new("alice");
        user.access_failed_count = i32::MAX;
        assert_eq!(user.increment_access_failed_count(), i32::MAX);
        assert_eq!(user.access_failed_count, i32::MAX);
    }

    #[test]
    fn test_has_password() {
        let mut user = User::new("alice");
        assert!(!user.has_password());
        user.password_hash = Some(String::new());
        assert!(!user.has_password());
        user.password_hash = Some("AQAAAAEAACcQ".to_string());
        assert!(user.has_password());
    }

    #[test]
    fn test_lockout_window() {
        let now = Utc::now();
        let mut user = User::new("alice");
        user.lockout_end = Some(now + Duration::minutes(5));
        assert!(!user.is_locked_out(now));

        user.lockout_enabled = true;
        assert!(user.is_locked_out(now));
        assert!(!user.is_locked_out(now + Duration::minutes(10)));
    }

    #[test]
    fn test_rotate_concurrency_stamp() {
        let mut user = User::new("alice");
        let before = user.concurrency_stamp.clone();
        let previous = user.rotate_concurrency_stamp();
        assert_eq!(previous, before);
        assert_ne!(user.concurrency_stamp, before);
    }
}

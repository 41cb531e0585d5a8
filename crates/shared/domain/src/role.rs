//! Role entity and user membership records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claim::Claim;
use crate::collection::Loaded;
use crate::constants::new_stamp;

/// Role entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: Option<String>,
    pub normalized_name: Option<String>,
    pub concurrency_stamp: Option<String>,
    /// Role claims, filled by the role store on first use
    #[serde(skip)]
    pub claims: Loaded<Claim>,
}

impl Role {
    /// Create a role with a client-generated id and concurrency stamp
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: Some(name.into()),
            normalized_name: None,
            concurrency_stamp: Some(new_stamp()),
            claims: Loaded::Unloaded,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            normalized_name: None,
            concurrency_stamp: Some(new_stamp()),
            claims: Loaded::Unloaded,
        }
    }
}

/// Membership of a user in a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub role_id: Uuid,
    /// Role display name
    pub role_name: String,
    pub normalized_role_name: Option<String>,
}

impl UserRole {
    /// Build a membership record for `role`
    pub fn for_role(role: &Role) -> Self {
        Self {
            role_id: role.id,
            role_name: role.name.clone().unwrap_or_default(),
            normalized_role_name: role.normalized_name.clone(),
        }
    }

    /// Check membership against a normalized role name
    pub fn is_named(&self, normalized_role_name: &str) -> bool {
        self.normalized_role_name.as_deref() == Some(normalized_role_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_role_generates_identity() {
        let a = Role::new("Admin");
        let b = Role::new("Admin");
        assert_ne!(a.id, b.id);
        assert!(a.concurrency_stamp.is_some());
        assert!(!a.claims.is_loaded());
    }

    #[test]
    fn test_membership_matches_normalized_name() {
        let mut role = Role::new("Admin");
        role.normalized_name = Some("ADMIN".to_string());
        let membership = UserRole::for_role(&role);

        assert_eq!(membership.role_id, role.id);
        assert_eq!(membership.role_name, "Admin");
        assert!(membership.is_named("ADMIN"));
        assert!(!membership.is_named("Admin"));
    }
}

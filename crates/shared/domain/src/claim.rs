//! Claims attached to users and roles.

use serde::{Deserialize, Serialize};

/// A type/value assertion about a user or role.
///
/// Two claims are equal when both type and value match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    /// Check if this claim has the given type, whatever its value
    pub fn has_type(&self, claim_type: &str) -> bool {
        self.claim_type == claim_type
    }
}

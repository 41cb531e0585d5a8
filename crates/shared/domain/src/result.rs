//! Outcome of identity write operations.

use serde::Serialize;

/// A single reason an identity write failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityError {
    pub code: String,
    pub description: String,
}

impl IdentityError {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// Result of create/update/delete: succeeded, or failed with reasons.
///
/// Storage-level refusals (constraint violations, stale concurrency stamps)
/// are reported here; connectivity problems are errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResult {
    Succeeded,
    Failed(Vec<IdentityError>),
}

impl IdentityResult {
    /// Failed result with a single error
    pub fn failed(code: impl Into<String>, description: impl Into<String>) -> Self {
        IdentityResult::Failed(vec![IdentityError::new(code, description)])
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, IdentityResult::Succeeded)
    }

    /// Errors of a failed result (empty on success)
    pub fn errors(&self) -> &[IdentityError] {
        match self {
            IdentityResult::Succeeded => &[],
            IdentityResult::Failed(errors) => errors,
        }
    }
}

impl std::fmt::Display for IdentityResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityResult::Succeeded => write!(f, "Succeeded"),
            IdentityResult::Failed(errors) => {
                let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
                write!(f, "Failed: {}", codes.join(","))
            }
        }
    }
}

//! Domain-level constants.
//!
//! Error codes carried by failed [`IdentityResult`](crate::IdentityResult)s.

// =============================================================================
// Identity Result Codes
// =============================================================================

/// A unique constraint rejected the write
pub const CODE_DUPLICATE_KEY: &str = "DuplicateKey";

/// The row was changed or removed since it was loaded
pub const CODE_CONCURRENCY_FAILURE: &str = "ConcurrencyFailure";

/// The user row could not be inserted
pub const CODE_USER_NOT_INSERTED: &str = "UserNotInserted";

/// The role row could not be inserted
pub const CODE_ROLE_NOT_INSERTED: &str = "RoleNotInserted";

// =============================================================================
// Stamps
// =============================================================================

/// Generate a fresh opaque stamp (security or concurrency).
pub fn new_stamp() -> String {
    uuid::Uuid::new_v4().to_string()
}

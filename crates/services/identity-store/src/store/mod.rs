//! Store façades.
//!
//! [`UserStore`] and [`RoleStore`] implement the capability traits on top of
//! the repositories and own the lazy-load step for entity collections.

mod capabilities;
mod role_store;
mod user_store;

pub use capabilities::*;
pub use role_store::{RoleRepositories, RoleStore};
pub use user_store::{UserRepositories, UserStore};

use common::{AppError, AppResult};

/// Reject an empty required string argument.
pub(crate) fn require(name: &str, value: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::invalid_argument(format!("{} is required", name)));
    }
    Ok(())
}

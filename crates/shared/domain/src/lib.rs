//! Domain layer - Identity entities and value objects.
//!
//! This crate contains the records the identity stores persist (users, roles,
//! claims, logins, memberships, tokens) with no infrastructure dependencies.

pub mod claim;
pub mod collection;
pub mod constants;
pub mod login;
pub mod result;
pub mod role;
pub mod token;
pub mod user;

pub use claim::Claim;
pub use collection::Loaded;
pub use constants::*;
pub use login::UserLoginInfo;
pub use result::{IdentityError, IdentityResult};
pub use role::{Role, UserRole};
pub use token::UserToken;
pub use user::User;

//! Capability traits of the identity stores.
//!
//! Each trait covers one concern an identity framework asks of its user or
//! role store. `UserStore` and `RoleStore` implement all of them, callers
//! depend only on the capabilities they use.
//!
//! Every method checks the [`OperationContext`] before doing anything else.
//! Methods that touch a lazily loaded collection take the entity by `&mut`
//! and load the collection on first use. Collection mutations stay in memory
//! until the entity is persisted with `update`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{AppResult, OperationContext};
use domain::{Claim, IdentityResult, Role, User, UserLoginInfo};

// =============================================================================
// Users
// =============================================================================

/// Create, update, delete and look up users.
#[async_trait]
pub trait UserPersistence: Send + Sync {
    async fn create(&self, ctx: &OperationContext, user: &User) -> AppResult<IdentityResult>;

    /// Persist `user`, rotating its concurrency stamp.
    ///
    /// Fails with `ConcurrencyFailure` when the stored row no longer carries
    /// the stamp the user was loaded with.
    async fn update(&self, ctx: &OperationContext, user: &mut User) -> AppResult<IdentityResult>;

    async fn delete(&self, ctx: &OperationContext, user: &User) -> AppResult<IdentityResult>;

    /// Look a user up by id; an id that is not a UUID finds nothing.
    async fn find_by_id(&self, ctx: &OperationContext, user_id: &str) -> AppResult<Option<User>>;

    async fn find_by_name(
        &self,
        ctx: &OperationContext,
        normalized_user_name: &str,
    ) -> AppResult<Option<User>>;

    fn get_user_id(&self, ctx: &OperationContext, user: &User) -> AppResult<String>;

    fn get_user_name(&self, ctx: &OperationContext, user: &User) -> AppResult<Option<String>>;

    fn set_user_name(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        user_name: Option<String>,
    ) -> AppResult<()>;

    fn get_normalized_user_name(
        &self,
        ctx: &OperationContext,
        user: &User,
    ) -> AppResult<Option<String>>;

    fn set_normalized_user_name(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_name: Option<String>,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait QueryableUsers: Send + Sync {
    async fn users(&self, ctx: &OperationContext) -> AppResult<Vec<User>>;
}

#[async_trait]
pub trait UserEmailStore: Send + Sync {
    fn get_email(&self, ctx: &OperationContext, user: &User) -> AppResult<Option<String>>;

    fn set_email(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        email: Option<String>,
    ) -> AppResult<()>;

    fn get_email_confirmed(&self, ctx: &OperationContext, user: &User) -> AppResult<bool>;

    fn set_email_confirmed(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        confirmed: bool,
    ) -> AppResult<()>;

    fn get_normalized_email(&self, ctx: &OperationContext, user: &User)
        -> AppResult<Option<String>>;

    fn set_normalized_email(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_email: Option<String>,
    ) -> AppResult<()>;

    async fn find_by_email(
        &self,
        ctx: &OperationContext,
        normalized_email: &str,
    ) -> AppResult<Option<User>>;
}

#[async_trait]
pub trait UserLoginStore: Send + Sync {
    /// Add a login unless the user already has one with the same provider and key.
    async fn add_login(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login: UserLoginInfo,
    ) -> AppResult<()>;

    /// Remove the matching login; a login the user does not have is ignored.
    async fn remove_login(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login_provider: &str,
        provider_key: &str,
    ) -> AppResult<()>;

    async fn get_logins(
        &self,
        ctx: &OperationContext,
        user: &mut User,
    ) -> AppResult<Vec<UserLoginInfo>>;

    async fn find_by_login(
        &self,
        ctx: &OperationContext,
        login_provider: &str,
        provider_key: &str,
    ) -> AppResult<Option<User>>;
}

pub trait UserPasswordStore: Send + Sync {
    fn get_password_hash(&self, ctx: &OperationContext, user: &User) -> AppResult<Option<String>>;

    fn set_password_hash(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        password_hash: Option<String>,
    ) -> AppResult<()>;

    fn has_password(&self, ctx: &OperationContext, user: &User) -> AppResult<bool>;
}

pub trait UserPhoneNumberStore: Send + Sync {
    fn get_phone_number(&self, ctx: &OperationContext, user: &User) -> AppResult<Option<String>>;

    fn set_phone_number(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        phone_number: Option<String>,
    ) -> AppResult<()>;

    fn get_phone_number_confirmed(&self, ctx: &OperationContext, user: &User) -> AppResult<bool>;

    fn set_phone_number_confirmed(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        confirmed: bool,
    ) -> AppResult<()>;
}

pub trait UserTwoFactorStore: Send + Sync {
    fn get_two_factor_enabled(&self, ctx: &OperationContext, user: &User) -> AppResult<bool>;

    fn set_two_factor_enabled(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        enabled: bool,
    ) -> AppResult<()>;
}

pub trait UserSecurityStampStore: Send + Sync {
    fn get_security_stamp(&self, ctx: &OperationContext, user: &User)
        -> AppResult<Option<String>>;

    /// Set the security stamp; an empty stamp is rejected.
    fn set_security_stamp(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        stamp: &str,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait UserClaimStore: Send + Sync {
    async fn get_claims(&self, ctx: &OperationContext, user: &mut User) -> AppResult<Vec<Claim>>;

    /// Add claims, each replacing any existing claim of the same type.
    async fn add_claims(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        claims: &[Claim],
    ) -> AppResult<()>;

    /// Replace the claim equal to `claim` in place, or append `new_claim`
    /// when there is none.
    async fn replace_claim(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        claim: &Claim,
        new_claim: Claim,
    ) -> AppResult<()>;

    async fn remove_claims(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        claims: &[Claim],
    ) -> AppResult<()>;

    async fn users_for_claim(&self, ctx: &OperationContext, claim: &Claim)
        -> AppResult<Vec<User>>;
}

pub trait UserLockoutStore: Send + Sync {
    fn get_lockout_end_date(
        &self,
        ctx: &OperationContext,
        user: &User,
    ) -> AppResult<Option<DateTime<Utc>>>;

    fn set_lockout_end_date(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        lockout_end: Option<DateTime<Utc>>,
    ) -> AppResult<()>;

    /// Record a failed access and return the new count.
    fn increment_access_failed_count(
        &self,
        ctx: &OperationContext,
        user: &mut User,
    ) -> AppResult<i32>;

    fn reset_access_failed_count(&self, ctx: &OperationContext, user: &mut User)
        -> AppResult<()>;

    fn get_access_failed_count(&self, ctx: &OperationContext, user: &User) -> AppResult<i32>;

    fn get_lockout_enabled(&self, ctx: &OperationContext, user: &User) -> AppResult<bool>;

    fn set_lockout_enabled(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        enabled: bool,
    ) -> AppResult<()>;
}

/// Role membership, keyed by normalized role name.
#[async_trait]
pub trait UserRoleStore: Send + Sync {
    /// Add the user to an existing role. Unknown roles and existing
    /// memberships are ignored.
    async fn add_to_role(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_role_name: &str,
    ) -> AppResult<()>;

    async fn remove_from_role(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_role_name: &str,
    ) -> AppResult<()>;

    /// Display names of the user's roles
    async fn get_roles(&self, ctx: &OperationContext, user: &mut User) -> AppResult<Vec<String>>;

    async fn is_in_role(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_role_name: &str,
    ) -> AppResult<bool>;

    async fn users_in_role(
        &self,
        ctx: &OperationContext,
        normalized_role_name: &str,
    ) -> AppResult<Vec<User>>;
}

/// Named tokens, keyed by login provider and name.
#[async_trait]
pub trait UserTokenStore: Send + Sync {
    /// Set the value of a token, adding the token when missing.
    async fn set_token(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login_provider: &str,
        name: &str,
        value: Option<String>,
    ) -> AppResult<()>;

    async fn remove_token(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login_provider: &str,
        name: &str,
    ) -> AppResult<()>;

    async fn get_token(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login_provider: &str,
        name: &str,
    ) -> AppResult<Option<String>>;
}

/// Authenticator app keys. Not supported by these stores.
#[async_trait]
pub trait UserAuthenticatorKeyStore: Send + Sync {
    async fn set_authenticator_key(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        key: &str,
    ) -> AppResult<()>;

    async fn get_authenticator_key(
        &self,
        ctx: &OperationContext,
        user: &mut User,
    ) -> AppResult<Option<String>>;
}

// =============================================================================
// Roles
// =============================================================================

#[async_trait]
pub trait RolePersistence: Send + Sync {
    async fn create(&self, ctx: &OperationContext, role: &Role) -> AppResult<IdentityResult>;

    /// Persist `role`, rotating its concurrency stamp.
    async fn update(&self, ctx: &OperationContext, role: &mut Role) -> AppResult<IdentityResult>;

    async fn delete(&self, ctx: &OperationContext, role: &Role) -> AppResult<IdentityResult>;

    /// Look a role up by id; an id that is not a UUID is an invalid argument.
    async fn find_by_id(&self, ctx: &OperationContext, role_id: &str) -> AppResult<Option<Role>>;

    async fn find_by_name(
        &self,
        ctx: &OperationContext,
        normalized_role_name: &str,
    ) -> AppResult<Option<Role>>;

    fn get_role_id(&self, ctx: &OperationContext, role: &Role) -> AppResult<String>;

    fn get_role_name(&self, ctx: &OperationContext, role: &Role) -> AppResult<Option<String>>;

    fn set_role_name(
        &self,
        ctx: &OperationContext,
        role: &mut Role,
        role_name: Option<String>,
    ) -> AppResult<()>;

    fn get_normalized_role_name(
        &self,
        ctx: &OperationContext,
        role: &Role,
    ) -> AppResult<Option<String>>;

    fn set_normalized_role_name(
        &self,
        ctx: &OperationContext,
        role: &mut Role,
        normalized_name: Option<String>,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait QueryableRoles: Send + Sync {
    async fn roles(&self, ctx: &OperationContext) -> AppResult<Vec<Role>>;
}

#[async_trait]
pub trait RoleClaimStore: Send + Sync {
    async fn get_claims(&self, ctx: &OperationContext, role: &mut Role) -> AppResult<Vec<Claim>>;

    /// Add a claim, replacing any existing claim of the same type.
    async fn add_claim(&self, ctx: &OperationContext, role: &mut Role, claim: Claim)
        -> AppResult<()>;

    async fn remove_claim(
        &self,
        ctx: &OperationContext,
        role: &mut Role,
        claim: &Claim,
    ) -> AppResult<()>;
}

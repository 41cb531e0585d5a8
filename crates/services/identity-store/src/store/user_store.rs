//! User store façade.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use common::{AppError, AppResult, OperationContext};
use domain::{Claim, IdentityResult, User, UserLoginInfo, UserRole, UserToken};

use super::capabilities::{
    QueryableUsers, UserAuthenticatorKeyStore, UserClaimStore, UserEmailStore, UserLockoutStore,
    UserLoginStore, UserPasswordStore, UserPersistence, UserPhoneNumberStore, UserRoleStore,
    UserSecurityStampStore, UserTokenStore, UserTwoFactorStore,
};
use super::require;
use crate::infra::ConnectionFactory;
use crate::repository::{
    PostgresRoleRepository, PostgresUserClaimRepository, PostgresUserLoginRepository,
    PostgresUserRepository, PostgresUserRoleRepository, PostgresUserTokenRepository,
    RoleRepository, UserClaimRepository, UserLoginRepository, UserRepository, UserRoleRepository,
    UserTokenRepository,
};

/// Repositories a [`UserStore`] works through.
#[derive(Clone)]
pub struct UserRepositories {
    pub users: Arc<dyn UserRepository>,
    pub user_claims: Arc<dyn UserClaimRepository>,
    pub user_logins: Arc<dyn UserLoginRepository>,
    pub user_roles: Arc<dyn UserRoleRepository>,
    pub user_tokens: Arc<dyn UserTokenRepository>,
    /// Used to resolve role names when adding memberships
    pub roles: Arc<dyn RoleRepository>,
}

impl UserRepositories {
    /// Postgres repositories sharing one connection factory
    pub fn postgres(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(factory.clone())),
            user_claims: Arc::new(PostgresUserClaimRepository::new(factory.clone())),
            user_logins: Arc::new(PostgresUserLoginRepository::new(factory.clone())),
            user_roles: Arc::new(PostgresUserRoleRepository::new(factory.clone())),
            user_tokens: Arc::new(PostgresUserTokenRepository::new(factory.clone())),
            roles: Arc::new(PostgresRoleRepository::new(factory)),
        }
    }
}

/// User store implementing every user capability trait.
///
/// Claims, logins, role memberships and tokens are fetched the first time a
/// method needs them and cached on the [`User`]. Later calls on the same
/// user read and mutate the cached collection only; `update` writes loaded
/// collections back.
#[derive(Clone)]
pub struct UserStore {
    repos: UserRepositories,
}

impl UserStore {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self::with_repositories(UserRepositories::postgres(factory))
    }

    pub fn with_repositories(repos: UserRepositories) -> Self {
        Self { repos }
    }

    async fn claims_of<'u>(
        &self,
        ctx: &OperationContext,
        user: &'u mut User,
    ) -> AppResult<&'u mut Vec<Claim>> {
        let fetched = if user.claims.is_loaded() {
            Vec::new()
        } else {
            self.repos.user_claims.claims_for_user(ctx, user.id).await?
        };
        Ok(user.claims.get_or_fill(|| fetched))
    }

    async fn logins_of<'u>(
        &self,
        ctx: &OperationContext,
        user: &'u mut User,
    ) -> AppResult<&'u mut Vec<UserLoginInfo>> {
        let fetched = if user.logins.is_loaded() {
            Vec::new()
        } else {
            self.repos.user_logins.logins_for_user(ctx, user.id).await?
        };
        Ok(user.logins.get_or_fill(|| fetched))
    }

    async fn roles_of<'u>(
        &self,
        ctx: &OperationContext,
        user: &'u mut User,
    ) -> AppResult<&'u mut Vec<UserRole>> {
        let fetched = if user.roles.is_loaded() {
            Vec::new()
        } else {
            self.repos.user_roles.roles_for_user(ctx, user.id).await?
        };
        Ok(user.roles.get_or_fill(|| fetched))
    }

    async fn tokens_of<'u>(
        &self,
        ctx: &OperationContext,
        user: &'u mut User,
    ) -> AppResult<&'u mut Vec<UserToken>> {
        let fetched = if user.tokens.is_loaded() {
            Vec::new()
        } else {
            self.repos.user_tokens.tokens_for_user(ctx, user.id).await?
        };
        Ok(user.tokens.get_or_fill(|| fetched))
    }
}

#[async_trait]
impl UserPersistence for UserStore {
    async fn create(&self, ctx: &OperationContext, user: &User) -> AppResult<IdentityResult> {
        ctx.ensure_active()?;
        self.repos.users.create(ctx, user).await
    }

    async fn update(&self, ctx: &OperationContext, user: &mut User) -> AppResult<IdentityResult> {
        ctx.ensure_active()?;
        let expected_stamp = user.rotate_concurrency_stamp();
        self.repos.users.update(ctx, user, expected_stamp).await
    }

    async fn delete(&self, ctx: &OperationContext, user: &User) -> AppResult<IdentityResult> {
        ctx.ensure_active()?;
        self.repos.users.delete(ctx, user.id).await
    }

    async fn find_by_id(&self, ctx: &OperationContext, user_id: &str) -> AppResult<Option<User>> {
        ctx.ensure_active()?;
        require("user id", user_id)?;

        match Uuid::parse_str(user_id) {
            Ok(id) => self.repos.users.find_by_id(ctx, id).await,
            Err(_) => Ok(None),
        }
    }

    async fn find_by_name(
        &self,
        ctx: &OperationContext,
        normalized_user_name: &str,
    ) -> AppResult<Option<User>> {
        ctx.ensure_active()?;
        require("normalized user name", normalized_user_name)?;
        self.repos.users.find_by_name(ctx, normalized_user_name).await
    }

    fn get_user_id(&self, ctx: &OperationContext, user: &User) -> AppResult<String> {
        ctx.ensure_active()?;
        Ok(user.id.to_string())
    }

    fn get_user_name(&self, ctx: &OperationContext, user: &User) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(user.user_name.clone())
    }

    fn set_user_name(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        user_name: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.user_name = user_name;
        Ok(())
    }

    fn get_normalized_user_name(
        &self,
        ctx: &OperationContext,
        user: &User,
    ) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(user.normalized_user_name.clone())
    }

    fn set_normalized_user_name(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_name: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.normalized_user_name = normalized_name;
        Ok(())
    }
}

#[async_trait]
impl QueryableUsers for UserStore {
    async fn users(&self, ctx: &OperationContext) -> AppResult<Vec<User>> {
        ctx.ensure_active()?;
        self.repos.users.list(ctx).await
    }
}

#[async_trait]
impl UserEmailStore for UserStore {
    fn get_email(&self, ctx: &OperationContext, user: &User) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(user.email.clone())
    }

    fn set_email(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        email: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.email = email;
        Ok(())
    }

    fn get_email_confirmed(&self, ctx: &OperationContext, user: &User) -> AppResult<bool> {
        ctx.ensure_active()?;
        Ok(user.email_confirmed)
    }

    fn set_email_confirmed(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        confirmed: bool,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.email_confirmed = confirmed;
        Ok(())
    }

    fn get_normalized_email(
        &self,
        ctx: &OperationContext,
        user: &User,
    ) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(user.normalized_email.clone())
    }

    fn set_normalized_email(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_email: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.normalized_email = normalized_email;
        Ok(())
    }

    async fn find_by_email(
        &self,
        ctx: &OperationContext,
        normalized_email: &str,
    ) -> AppResult<Option<User>> {
        ctx.ensure_active()?;
        require("normalized email", normalized_email)?;
        self.repos.users.find_by_email(ctx, normalized_email).await
    }
}

#[async_trait]
impl UserLoginStore for UserStore {
    async fn add_login(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login: UserLoginInfo,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("login provider", &login.login_provider)?;
        require("provider key", &login.provider_key)?;

        let logins = self.logins_of(ctx, user).await?;
        if !logins
            .iter()
            .any(|l| l.matches(&login.login_provider, &login.provider_key))
        {
            logins.push(login);
        }
        Ok(())
    }

    async fn remove_login(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login_provider: &str,
        provider_key: &str,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("login provider", login_provider)?;
        require("provider key", provider_key)?;

        let logins = self.logins_of(ctx, user).await?;
        logins.retain(|l| !l.matches(login_provider, provider_key));
        Ok(())
    }

    async fn get_logins(
        &self,
        ctx: &OperationContext,
        user: &mut User,
    ) -> AppResult<Vec<UserLoginInfo>> {
        ctx.ensure_active()?;
        Ok(self.logins_of(ctx, user).await?.clone())
    }

    async fn find_by_login(
        &self,
        ctx: &OperationContext,
        login_provider: &str,
        provider_key: &str,
    ) -> AppResult<Option<User>> {
        ctx.ensure_active()?;
        require("login provider", login_provider)?;
        require("provider key", provider_key)?;
        self.repos
            .user_logins
            .find_user_by_login(ctx, login_provider, provider_key)
            .await
    }
}

impl UserPasswordStore for UserStore {
    fn get_password_hash(&self, ctx: &OperationContext, user: &User) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(user.password_hash.clone())
    }

    fn set_password_hash(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        password_hash: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.password_hash = password_hash;
        Ok(())
    }

    fn has_password(&self, ctx: &OperationContext, user: &User) -> AppResult<bool> {
        ctx.ensure_active()?;
        Ok(user.has_password())
    }
}

impl UserPhoneNumberStore for UserStore {
    fn get_phone_number(&self, ctx: &OperationContext, user: &User) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(user.phone_number.clone())
    }

    fn set_phone_number(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        phone_number: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.phone_number = phone_number;
        Ok(())
    }

    fn get_phone_number_confirmed(&self, ctx: &OperationContext, user: &User) -> AppResult<bool> {
        ctx.ensure_active()?;
        Ok(user.phone_number_confirmed)
    }

    fn set_phone_number_confirmed(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        confirmed: bool,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.phone_number_confirmed = confirmed;
        Ok(())
    }
}

impl UserTwoFactorStore for UserStore {
    fn get_two_factor_enabled(&self, ctx: &OperationContext, user: &User) -> AppResult<bool> {
        ctx.ensure_active()?;
        Ok(user.two_factor_enabled)
    }

    fn set_two_factor_enabled(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        enabled: bool,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.two_factor_enabled = enabled;
        Ok(())
    }
}

impl UserSecurityStampStore for UserStore {
    fn get_security_stamp(
        &self,
        ctx: &OperationContext,
        user: &User,
    ) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(user.security_stamp.clone())
    }

    fn set_security_stamp(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        stamp: &str,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("security stamp", stamp)?;
        user.security_stamp = Some(stamp.to_string());
        Ok(())
    }
}

#[async_trait]
impl UserClaimStore for UserStore {
    async fn get_claims(&self, ctx: &OperationContext, user: &mut User) -> AppResult<Vec<Claim>> {
        ctx.ensure_active()?;
        Ok(self.claims_of(ctx, user).await?.clone())
    }

    async fn add_claims(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        claims: &[Claim],
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        for claim in claims {
            require("claim type", &claim.claim_type)?;
        }

        let existing = self.claims_of(ctx, user).await?;
        for claim in claims {
            existing.retain(|c| !c.has_type(&claim.claim_type));
            existing.push(claim.clone());
        }
        Ok(())
    }

    async fn replace_claim(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        claim: &Claim,
        new_claim: Claim,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("claim type", &claim.claim_type)?;
        require("new claim type", &new_claim.claim_type)?;

        let existing = self.claims_of(ctx, user).await?;
        match existing.iter().position(|c| c == claim) {
            Some(index) => existing[index] = new_claim,
            None => existing.push(new_claim),
        }
        Ok(())
    }

    async fn remove_claims(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        claims: &[Claim],
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        let existing = self.claims_of(ctx, user).await?;
        existing.retain(|c| !claims.contains(c));
        Ok(())
    }

    async fn users_for_claim(
        &self,
        ctx: &OperationContext,
        claim: &Claim,
    ) -> AppResult<Vec<User>> {
        ctx.ensure_active()?;
        require("claim type", &claim.claim_type)?;
        self.repos.users.list_for_claim(ctx, claim).await
    }
}

impl UserLockoutStore for UserStore {
    fn get_lockout_end_date(
        &self,
        ctx: &OperationContext,
        user: &User,
    ) -> AppResult<Option<DateTime<Utc>>> {
        ctx.ensure_active()?;
        Ok(user.lockout_end)
    }

    fn set_lockout_end_date(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        lockout_end: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.lockout_end = lockout_end;
        Ok(())
    }

    fn increment_access_failed_count(
        &self,
        ctx: &OperationContext,
        user: &mut User,
    ) -> AppResult<i32> {
        ctx.ensure_active()?;
        Ok(user.increment_access_failed_count())
    }

    fn reset_access_failed_count(
        &self,
        ctx: &OperationContext,
        user: &mut User,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.reset_access_failed_count();
        Ok(())
    }

    fn get_access_failed_count(&self, ctx: &OperationContext, user: &User) -> AppResult<i32> {
        ctx.ensure_active()?;
        Ok(user.access_failed_count)
    }

    fn get_lockout_enabled(&self, ctx: &OperationContext, user: &User) -> AppResult<bool> {
        ctx.ensure_active()?;
        Ok(user.lockout_enabled)
    }

    fn set_lockout_enabled(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        enabled: bool,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        user.lockout_enabled = enabled;
        Ok(())
    }
}

#[async_trait]
impl UserRoleStore for UserStore {
    async fn add_to_role(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_role_name: &str,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("normalized role name", normalized_role_name)?;

        let Some(role) = self.repos.roles.find_by_name(ctx, normalized_role_name).await? else {
            tracing::debug!(role = normalized_role_name, "Role not found; membership unchanged");
            return Ok(());
        };

        let memberships = self.roles_of(ctx, user).await?;
        if !memberships.iter().any(|m| m.role_id == role.id) {
            memberships.push(UserRole::for_role(&role));
        }
        Ok(())
    }

    async fn remove_from_role(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_role_name: &str,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("normalized role name", normalized_role_name)?;

        let memberships = self.roles_of(ctx, user).await?;
        memberships.retain(|m| !m.is_named(normalized_role_name));
        Ok(())
    }

    async fn get_roles(&self, ctx: &OperationContext, user: &mut User) -> AppResult<Vec<String>> {
        ctx.ensure_active()?;
        let memberships = self.roles_of(ctx, user).await?;
        Ok(memberships.iter().map(|m| m.role_name.clone()).collect())
    }

    async fn is_in_role(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        normalized_role_name: &str,
    ) -> AppResult<bool> {
        ctx.ensure_active()?;
        require("normalized role name", normalized_role_name)?;

        let memberships = self.roles_of(ctx, user).await?;
        Ok(memberships.iter().any(|m| m.is_named(normalized_role_name)))
    }

    async fn users_in_role(
        &self,
        ctx: &OperationContext,
        normalized_role_name: &str,
    ) -> AppResult<Vec<User>> {
        ctx.ensure_active()?;
        require("normalized role name", normalized_role_name)?;
        self.repos
            .users
            .list_in_role(ctx, normalized_role_name)
            .await
    }
}

#[async_trait]
impl UserTokenStore for UserStore {
    async fn set_token(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login_provider: &str,
        name: &str,
        value: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("login provider", login_provider)?;
        require("token name", name)?;

        let user_id = user.id;
        let tokens = self.tokens_of(ctx, user).await?;
        match tokens.iter().position(|t| t.matches(login_provider, name)) {
            Some(index) => tokens[index].value = value,
            None => tokens.push(UserToken {
                user_id,
                login_provider: login_provider.to_string(),
                name: name.to_string(),
                value,
            }),
        }
        Ok(())
    }

    async fn remove_token(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login_provider: &str,
        name: &str,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("login provider", login_provider)?;
        require("token name", name)?;

        let tokens = self.tokens_of(ctx, user).await?;
        tokens.retain(|t| !t.matches(login_provider, name));
        Ok(())
    }

    async fn get_token(
        &self,
        ctx: &OperationContext,
        user: &mut User,
        login_provider: &str,
        name: &str,
    ) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        require("login provider", login_provider)?;
        require("token name", name)?;

        let tokens = self.tokens_of(ctx, user).await?;
        Ok(tokens
            .iter()
            .find(|t| t.matches(login_provider, name))
            .and_then(|t| t.value.clone()))
    }
}

#[async_trait]
impl UserAuthenticatorKeyStore for UserStore {
    async fn set_authenticator_key(
        &self,
        ctx: &OperationContext,
        _user: &mut User,
        _key: &str,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        Err(AppError::not_supported("set authenticator key"))
    }

    async fn get_authenticator_key(
        &self,
        ctx: &OperationContext,
        _user: &mut User,
    ) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Err(AppError::not_supported("get authenticator key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CancellationToken;
    use domain::{Role, CODE_CONCURRENCY_FAILURE};

    use crate::repository::{
        MockRoleRepository, MockUserClaimRepository, MockUserLoginRepository,
        MockUserRepository, MockUserRoleRepository, MockUserTokenRepository,
    };

    /// Mocks without expectations panic when called, so a test only sets
    /// up the repositories it expects to be hit.
    #[derive(Default)]
    struct Mocks {
        users: MockUserRepository,
        user_claims: MockUserClaimRepository,
        user_logins: MockUserLoginRepository,
        user_roles: MockUserRoleRepository,
        user_tokens: MockUserTokenRepository,
        roles: MockRoleRepository,
    }

    impl Mocks {
        fn into_store(self) -> UserStore {
            UserStore::with_repositories(UserRepositories {
                users: Arc::new(self.users),
                user_claims: Arc::new(self.user_claims),
                user_logins: Arc::new(self.user_logins),
                user_roles: Arc::new(self.user_roles),
                user_tokens: Arc::new(self.user_tokens),
                roles: Arc::new(self.roles),
            })
        }
    }

    fn ctx() -> OperationContext {
        OperationContext::background()
    }

    fn cancelled_ctx() -> OperationContext {
        let token = CancellationToken::new();
        token.cancel();
        OperationContext::background().with_cancellation(token)
    }

    fn admin_role() -> Role {
        let mut role = Role::new("Admin");
        role.normalized_name = Some("ADMIN".to_string());
        role
    }

    #[tokio::test]
    async fn test_claims_fetched_once_per_user() {
        let mut mocks = Mocks::default();
        mocks
            .user_claims
            .expect_claims_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![Claim::new("department", "sales")]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        let first = store.get_claims(&ctx(), &mut user).await.unwrap();
        let second = store.get_claims(&ctx(), &mut user).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn test_every_collection_fetched_once() {
        let mut mocks = Mocks::default();
        mocks
            .user_logins
            .expect_logins_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mocks
            .user_roles
            .expect_roles_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        mocks
            .user_tokens
            .expect_tokens_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        for _ in 0..3 {
            store.get_logins(&ctx(), &mut user).await.unwrap();
            store.get_roles(&ctx(), &mut user).await.unwrap();
            store
                .get_token(&ctx(), &mut user, "github", "access_token")
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_add_claims_replaces_same_type() {
        let mut mocks = Mocks::default();
        mocks
            .user_claims
            .expect_claims_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![Claim::new("department", "sales")]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        store
            .add_claims(&ctx(), &mut user, &[Claim::new("department", "engineering")])
            .await
            .unwrap();

        let claims = store.get_claims(&ctx(), &mut user).await.unwrap();
        assert_eq!(claims, vec![Claim::new("department", "engineering")]);
    }

    #[tokio::test]
    async fn test_replace_claim_in_place() {
        let mut mocks = Mocks::default();
        mocks
            .user_claims
            .expect_claims_for_user()
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    Claim::new("a", "1"),
                    Claim::new("b", "2"),
                    Claim::new("c", "3"),
                ])
            });
        let store = mocks.into_store();
        let mut user = User::new("alice");

        store
            .replace_claim(&ctx(), &mut user, &Claim::new("b", "2"), Claim::new("b", "9"))
            .await
            .unwrap();

        assert_eq!(
            user.claims.items().unwrap(),
            &[
                Claim::new("a", "1"),
                Claim::new("b", "9"),
                Claim::new("c", "3")
            ]
        );
    }

    #[tokio::test]
    async fn test_replace_missing_claim_appends() {
        let mut mocks = Mocks::default();
        mocks
            .user_claims
            .expect_claims_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![Claim::new("a", "1")]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        store
            .replace_claim(&ctx(), &mut user, &Claim::new("a", "2"), Claim::new("a", "3"))
            .await
            .unwrap();

        assert_eq!(
            user.claims.items().unwrap(),
            &[Claim::new("a", "1"), Claim::new("a", "3")]
        );
    }

    #[tokio::test]
    async fn test_remove_claims_matches_type_and_value() {
        let mut mocks = Mocks::default();
        mocks
            .user_claims
            .expect_claims_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![Claim::new("a", "1"), Claim::new("a", "2")]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        store
            .remove_claims(&ctx(), &mut user, &[Claim::new("a", "2")])
            .await
            .unwrap();

        assert_eq!(user.claims.items().unwrap(), &[Claim::new("a", "1")]);
    }

    #[tokio::test]
    async fn test_remove_unknown_login_is_noop() {
        let mut mocks = Mocks::default();
        mocks
            .user_logins
            .expect_logins_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![UserLoginInfo::new("google", "g-1")]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        store
            .remove_login(&ctx(), &mut user, "github", "gh-1")
            .await
            .unwrap();

        let logins = store.get_logins(&ctx(), &mut user).await.unwrap();
        assert_eq!(logins, vec![UserLoginInfo::new("google", "g-1")]);
    }

    #[tokio::test]
    async fn test_add_login_skips_existing_pair() {
        let mut mocks = Mocks::default();
        mocks
            .user_logins
            .expect_logins_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        let login = UserLoginInfo::new("github", "gh-1").with_display_name("GitHub");
        store
            .add_login(&ctx(), &mut user, login.clone())
            .await
            .unwrap();
        store.add_login(&ctx(), &mut user, login).await.unwrap();

        assert_eq!(user.logins.items().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_access_failed_count_increment_and_reset() {
        let store = Mocks::default().into_store();
        let mut user = User::new("alice");

        let count = store
            .increment_access_failed_count(&ctx(), &mut user)
            .unwrap();
        assert_eq!(count, 1);

        store.reset_access_failed_count(&ctx(), &mut user).unwrap();
        assert_eq!(store.get_access_failed_count(&ctx(), &user).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_touches_no_repository() {
        let store = Mocks::default().into_store();
        let ctx = cancelled_ctx();
        let mut user = User::new("alice");

        assert!(matches!(
            store.get_claims(&ctx, &mut user).await,
            Err(AppError::Cancelled)
        ));
        assert!(matches!(
            store.find_by_email(&ctx, "ALICE@EXAMPLE.COM").await,
            Err(AppError::Cancelled)
        ));
        assert!(matches!(
            store.add_to_role(&ctx, &mut user, "ADMIN").await,
            Err(AppError::Cancelled)
        ));
        assert!(matches!(
            store.get_email(&ctx, &user),
            Err(AppError::Cancelled)
        ));

        let stamp = user.concurrency_stamp.clone();
        assert!(matches!(
            store.update(&ctx, &mut user).await,
            Err(AppError::Cancelled)
        ));
        assert_eq!(user.concurrency_stamp, stamp);
        assert!(!user.claims.is_loaded());
    }

    #[tokio::test]
    async fn test_authenticator_key_not_supported() {
        let store = Mocks::default().into_store();
        let mut user = User::new("alice");

        let err = store
            .set_authenticator_key(&ctx(), &mut user, "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotSupported(_)));

        let err = store
            .get_authenticator_key(&ctx(), &mut user)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_find_by_id_with_malformed_id() {
        let store = Mocks::default().into_store();

        assert!(store.find_by_id(&ctx(), "not-a-uuid").await.unwrap().is_none());
        assert!(matches!(
            store.find_by_id(&ctx(), "").await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_email_returns_user() {
        let mut user = User::new("alice");
        user.normalized_email = Some("ALICE@EXAMPLE.COM".to_string());
        let stored = user.clone();

        let mut mocks = Mocks::default();
        mocks
            .users
            .expect_find_by_email()
            .withf(|_, email| email == "ALICE@EXAMPLE.COM")
            .times(1)
            .returning(move |_, _| Ok(Some(stored.clone())));
        let store = mocks.into_store();

        let found = store
            .find_by_email(&ctx(), "ALICE@EXAMPLE.COM")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_update_rotates_concurrency_stamp() {
        let mut user = User::new("alice");
        let old_stamp = user.concurrency_stamp.clone().unwrap();

        let mut mocks = Mocks::default();
        let expected = old_stamp.clone();
        mocks
            .users
            .expect_update()
            .withf(move |_, u, stamp| {
                stamp.as_deref() == Some(expected.as_str())
                    && u.concurrency_stamp.as_deref() != Some(expected.as_str())
            })
            .times(1)
            .returning(|_, _, _| Ok(IdentityResult::Succeeded));
        let store = mocks.into_store();

        assert!(store.update(&ctx(), &mut user).await.unwrap().succeeded());
        assert_ne!(user.concurrency_stamp.as_deref(), Some(old_stamp.as_str()));
    }

    #[tokio::test]
    async fn test_update_reports_concurrency_failure() {
        let mut mocks = Mocks::default();
        mocks.users.expect_update().times(1).returning(|_, _, _| {
            Ok(IdentityResult::failed(CODE_CONCURRENCY_FAILURE, "stale"))
        });
        let store = mocks.into_store();
        let mut user = User::new("alice");

        let result = store.update(&ctx(), &mut user).await.unwrap();
        assert_eq!(result.errors()[0].code, CODE_CONCURRENCY_FAILURE);
    }

    #[tokio::test]
    async fn test_add_to_unknown_role_is_noop() {
        let mut mocks = Mocks::default();
        mocks
            .roles
            .expect_find_by_name()
            .times(1)
            .returning(|_, _| Ok(None));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        store.add_to_role(&ctx(), &mut user, "GHOST").await.unwrap();
        assert!(!user.roles.is_loaded());
    }

    #[tokio::test]
    async fn test_add_to_role_once() {
        let role = admin_role();
        let found = role.clone();

        let mut mocks = Mocks::default();
        mocks
            .roles
            .expect_find_by_name()
            .withf(|_, name| name == "ADMIN")
            .times(2)
            .returning(move |_, _| Ok(Some(found.clone())));
        mocks
            .user_roles
            .expect_roles_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        store.add_to_role(&ctx(), &mut user, "ADMIN").await.unwrap();
        store.add_to_role(&ctx(), &mut user, "ADMIN").await.unwrap();

        assert_eq!(store.get_roles(&ctx(), &mut user).await.unwrap(), vec!["Admin"]);
        assert!(store.is_in_role(&ctx(), &mut user, "ADMIN").await.unwrap());

        store
            .remove_from_role(&ctx(), &mut user, "ADMIN")
            .await
            .unwrap();
        assert!(!store.is_in_role(&ctx(), &mut user, "ADMIN").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_token_overwrites_value() {
        let mut mocks = Mocks::default();
        mocks
            .user_tokens
            .expect_tokens_for_user()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let store = mocks.into_store();
        let mut user = User::new("alice");

        store
            .set_token(&ctx(), &mut user, "github", "access_token", Some("a".into()))
            .await
            .unwrap();
        store
            .set_token(&ctx(), &mut user, "github", "access_token", Some("b".into()))
            .await
            .unwrap();

        let value = store
            .get_token(&ctx(), &mut user, "github", "access_token")
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("b"));
        assert_eq!(user.tokens.items().unwrap().len(), 1);

        store
            .remove_token(&ctx(), &mut user, "github", "access_token")
            .await
            .unwrap();
        assert!(store
            .get_token(&ctx(), &mut user, "github", "access_token")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_required_argument_rejected_before_loading() {
        let store = Mocks::default().into_store();
        let mut user = User::new("alice");

        let err = store
            .add_login(&ctx(), &mut user, UserLoginInfo::new("", "key"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let err = store
            .set_security_stamp(&ctx(), &mut user, "")
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert!(!user.logins.is_loaded());
    }
}

//! Role store façade.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use common::{AppError, AppResult, OperationContext};
use domain::{new_stamp, Claim, IdentityResult, Role};

use super::capabilities::{QueryableRoles, RoleClaimStore, RolePersistence};
use super::require;
use crate::infra::ConnectionFactory;
use crate::repository::{
    PostgresRoleClaimRepository, PostgresRoleRepository, RoleClaimRepository, RoleRepository,
};

/// Repositories a [`RoleStore`] works through.
#[derive(Clone)]
pub struct RoleRepositories {
    pub roles: Arc<dyn RoleRepository>,
    pub role_claims: Arc<dyn RoleClaimRepository>,
}

impl RoleRepositories {
    pub fn postgres(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            roles: Arc::new(PostgresRoleRepository::new(factory.clone())),
            role_claims: Arc::new(PostgresRoleClaimRepository::new(factory)),
        }
    }
}

/// Role store implementing the role capability traits.
///
/// Role claims are loaded on first use and cached on the [`Role`].
#[derive(Clone)]
pub struct RoleStore {
    repos: RoleRepositories,
}

impl RoleStore {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self::with_repositories(RoleRepositories::postgres(factory))
    }

    pub fn with_repositories(repos: RoleRepositories) -> Self {
        Self { repos }
    }

    async fn claims_of<'r>(
        &self,
        ctx: &OperationContext,
        role: &'r mut Role,
    ) -> AppResult<&'r mut Vec<Claim>> {
        let fetched = if role.claims.is_loaded() {
            Vec::new()
        } else {
            self.repos.role_claims.claims_for_role(ctx, role.id).await?
        };
        Ok(role.claims.get_or_fill(|| fetched))
    }
}

#[async_trait]
impl RolePersistence for RoleStore {
    async fn create(&self, ctx: &OperationContext, role: &Role) -> AppResult<IdentityResult> {
        ctx.ensure_active()?;
        self.repos.roles.create(ctx, role).await
    }

    async fn update(&self, ctx: &OperationContext, role: &mut Role) -> AppResult<IdentityResult> {
        ctx.ensure_active()?;
        let expected_stamp = role.concurrency_stamp.replace(new_stamp());
        self.repos.roles.update(ctx, role, expected_stamp).await
    }

    async fn delete(&self, ctx: &OperationContext, role: &Role) -> AppResult<IdentityResult> {
        ctx.ensure_active()?;
        self.repos.roles.delete(ctx, role.id).await
    }

    async fn find_by_id(&self, ctx: &OperationContext, role_id: &str) -> AppResult<Option<Role>> {
        ctx.ensure_active()?;
        require("role id", role_id)?;

        let id = Uuid::parse_str(role_id)
            .map_err(|_| AppError::invalid_argument(format!("role id {:?} is not a UUID", role_id)))?;
        self.repos.roles.find_by_id(ctx, id).await
    }

    async fn find_by_name(
        &self,
        ctx: &OperationContext,
        normalized_role_name: &str,
    ) -> AppResult<Option<Role>> {
        ctx.ensure_active()?;
        require("normalized role name", normalized_role_name)?;
        self.repos.roles.find_by_name(ctx, normalized_role_name).await
    }

    fn get_role_id(&self, ctx: &OperationContext, role: &Role) -> AppResult<String> {
        ctx.ensure_active()?;
        Ok(role.id.to_string())
    }

    fn get_role_name(&self, ctx: &OperationContext, role: &Role) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(role.name.clone())
    }

    fn set_role_name(
        &self,
        ctx: &OperationContext,
        role: &mut Role,
        role_name: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        role.name = role_name;
        Ok(())
    }

    fn get_normalized_role_name(
        &self,
        ctx: &OperationContext,
        role: &Role,
    ) -> AppResult<Option<String>> {
        ctx.ensure_active()?;
        Ok(role.normalized_name.clone())
    }

    fn set_normalized_role_name(
        &self,
        ctx: &OperationContext,
        role: &mut Role,
        normalized_name: Option<String>,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        role.normalized_name = normalized_name;
        Ok(())
    }
}

#[async_trait]
impl QueryableRoles for RoleStore {
    async fn roles(&self, ctx: &OperationContext) -> AppResult<Vec<Role>> {
        ctx.ensure_active()?;
        self.repos.roles.list(ctx).await
    }
}

#[async_trait]
impl RoleClaimStore for RoleStore {
    async fn get_claims(&self, ctx: &OperationContext, role: &mut Role) -> AppResult<Vec<Claim>> {
        ctx.ensure_active()?;
        Ok(self.claims_of(ctx, role).await?.clone())
    }

    async fn add_claim(
        &self,
        ctx: &OperationContext,
        role: &mut Role,
        claim: Claim,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        require("claim type", &claim.claim_type)?;

        let claims = self.claims_of(ctx, role).await?;
        claims.retain(|c| !c.has_type(&claim.claim_type));
        claims.push(claim);
        Ok(())
    }

    async fn remove_claim(
        &self,
        ctx: &OperationContext,
        role: &mut Role,
        claim: &Claim,
    ) -> AppResult<()> {
        ctx.ensure_active()?;
        let claims = self.claims_of(ctx, role).await?;
        claims.retain(|c| c != claim);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CancellationToken;

    use crate::repository::{MockRoleClaimRepository, MockRoleRepository};

    fn store(roles: MockRoleRepository, role_claims: MockRoleClaimRepository) -> RoleStore {
        RoleStore::with_repositories(RoleRepositories {
            roles: Arc::new(roles),
            role_claims: Arc::new(role_claims),
        })
    }

    fn ctx() -> OperationContext {
        OperationContext::background()
    }

    #[tokio::test]
    async fn test_claims_fetched_once_per_role() {
        let mut role_claims = MockRoleClaimRepository::new();
        role_claims
            .expect_claims_for_role()
            .times(1)
            .returning(|_, _| Ok(vec![Claim::new("permission", "users.read")]));
        let store = store(MockRoleRepository::new(), role_claims);
        let mut role = Role::new("Admin");

        store.get_claims(&ctx(), &mut role).await.unwrap();
        let claims = store.get_claims(&ctx(), &mut role).await.unwrap();
        assert_eq!(claims, vec![Claim::new("permission", "users.read")]);
    }

    #[tokio::test]
    async fn test_add_claim_replaces_type_and_remove_matches_value() {
        let mut role_claims = MockRoleClaimRepository::new();
        role_claims
            .expect_claims_for_role()
            .times(1)
            .returning(|_, _| Ok(vec![Claim::new("tier", "gold"), Claim::new("region", "eu")]));
        let store = store(MockRoleRepository::new(), role_claims);
        let mut role = Role::new("Admin");

        store
            .add_claim(&ctx(), &mut role, Claim::new("tier", "platinum"))
            .await
            .unwrap();
        store
            .remove_claim(&ctx(), &mut role, &Claim::new("region", "us"))
            .await
            .unwrap();

        assert_eq!(
            role.claims.items().unwrap(),
            &[Claim::new("region", "eu"), Claim::new("tier", "platinum")]
        );
    }

    #[tokio::test]
    async fn test_find_by_id_rejects_malformed_id() {
        let store = store(MockRoleRepository::new(), MockRoleClaimRepository::new());

        let err = store.find_by_id(&ctx(), "admin").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_find_by_id_parses_uuid() {
        let role = Role::new("Admin");
        let id = role.id;
        let found = role.clone();

        let mut roles = MockRoleRepository::new();
        roles
            .expect_find_by_id()
            .withf(move |_, candidate| *candidate == id)
            .times(1)
            .returning(move |_, _| Ok(Some(found.clone())));
        let store = store(roles, MockRoleClaimRepository::new());

        let result = store.find_by_id(&ctx(), &id.to_string()).await.unwrap();
        assert_eq!(result.map(|r| r.id), Some(id));
    }

    #[tokio::test]
    async fn test_update_passes_previous_stamp() {
        let mut role = Role::new("Admin");
        let old_stamp = role.concurrency_stamp.clone();

        let mut roles = MockRoleRepository::new();
        let expected = old_stamp.clone();
        roles
            .expect_update()
            .withf(move |_, _, stamp| *stamp == expected)
            .times(1)
            .returning(|_, _, _| Ok(IdentityResult::Succeeded));
        let store = store(roles, MockRoleClaimRepository::new());

        assert!(store.update(&ctx(), &mut role).await.unwrap().succeeded());
        assert_ne!(role.concurrency_stamp, old_stamp);
    }

    #[tokio::test]
    async fn test_cancelled_context_touches_no_repository() {
        let store = store(MockRoleRepository::new(), MockRoleClaimRepository::new());
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OperationContext::background().with_cancellation(token);
        let mut role = Role::new("Admin");

        assert!(matches!(store.roles(&ctx).await, Err(AppError::Cancelled)));
        assert!(matches!(
            store.get_claims(&ctx, &mut role).await,
            Err(AppError::Cancelled)
        ));
        assert!(matches!(
            store.get_role_name(&ctx, &role),
            Err(AppError::Cancelled)
        ));
    }
}

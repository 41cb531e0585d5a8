//! Role claim repository: the `identity_role_claims` table.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbErr, FromQueryResult};
use uuid::Uuid;

use common::{AppResult, OperationContext};
use domain::Claim;

use super::statement;
use crate::infra::{with_connection, ConnectionFactory};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const CLAIMS_FOR_ROLE: &str = r#"
    SELECT rc.claim_type, rc.claim_value
    FROM identity_role_claims AS rc
    WHERE rc.role_id = $1
"#;

const DELETE_FOR_ROLE: &str = "DELETE FROM identity_role_claims WHERE role_id = $1";

const INSERT: &str = r#"
    INSERT INTO identity_role_claims (id, role_id, claim_type, claim_value)
    VALUES ($1, $2, $3, $4)
"#;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RoleClaimRepository: Send + Sync {
    async fn claims_for_role(&self, ctx: &OperationContext, role_id: Uuid) -> AppResult<Vec<Claim>>;
}

#[derive(Debug, FromQueryResult)]
struct RoleClaimRow {
    claim_type: String,
    claim_value: Option<String>,
}

/// Replace the stored claims of `role_id` with `claims`.
pub(crate) async fn replace_role_claims<C: ConnectionTrait>(
    conn: &C,
    role_id: Uuid,
    claims: &[Claim],
) -> Result<(), DbErr> {
    conn.execute(statement(DELETE_FOR_ROLE, [role_id.into()]))
        .await?;
    for claim in claims {
        conn.execute(statement(
            INSERT,
            [
                Uuid::new_v4().into(),
                role_id.into(),
                claim.claim_type.clone().into(),
                claim.value.clone().into(),
            ],
        ))
        .await?;
    }
    Ok(())
}

/// PostgreSQL implementation of RoleClaimRepository
#[derive(Clone)]
pub struct PostgresRoleClaimRepository {
    factory: Arc<dyn ConnectionFactory>,
}

impl PostgresRoleClaimRepository {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl RoleClaimRepository for PostgresRoleClaimRepository {
    async fn claims_for_role(&self, ctx: &OperationContext, role_id: Uuid) -> AppResult<Vec<Claim>> {
        let stmt = statement(CLAIMS_FOR_ROLE, [role_id.into()]);
        let claims = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let rows = RoleClaimRow::find_by_statement(stmt).all(&conn).await?;
            Ok(rows
                .into_iter()
                .map(|row| Claim::new(row.claim_type, row.claim_value.unwrap_or_default()))
                .collect::<Vec<_>>())
        })
        .await?;

        tracing::debug!(role_id = %role_id, count = claims.len(), "Loaded role claims");
        Ok(claims)
    }
}

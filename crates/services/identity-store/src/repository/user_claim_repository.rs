//! User claim repository: the `identity_user_claims` table.

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

const CLAIMS_FOR_USER: &str = r#"
    SELECT uc.claim_type, uc.claim_value
    FROM identity_user_claims AS uc
    WHERE uc.user_id = $1
"#;

const DELETE_FOR_USER: &str = "DELETE FROM identity_user_claims WHERE user_id = $1";

const INSERT: &str = r#"
    INSERT INTO identity_user_claims (id, user_id, claim_type, claim_value)
    VALUES ($1, $2, $3, $4)
"#;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserClaimRepository: Send + Sync {
    /// Claims of a user
    async fn claims_for_user(&self, ctx: &OperationContext, user_id: Uuid) -> AppResult<Vec<Claim>>;
}

#[derive(Debug, FromQueryResult)]
struct ClaimRow {
    claim_type: String,
    claim_value: Option<String>,
}

impl From<ClaimRow> for Claim {
    fn from(row: ClaimRow) -> Self {
        Claim::new(row.claim_type, row.claim_value.unwrap_or_default())
    }
}

/// Replace the stored claims of `user_id` with `claims`.
pub(crate) async fn replace_user_claims<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    claims: &[Claim],
) -> Result<(), DbErr> {
    conn.execute(statement(DELETE_FOR_USER, [user_id.into()]))
        .await?;
    for claim in claims {
        conn.execute(statement(
            INSERT,
            [
                Uuid::new_v4().into(),
                user_id.into(),
                claim.claim_type.clone().into(),
                claim.value.clone().into(),
            ],
        ))
        .await?;
    }
    Ok(())
}

/// PostgreSQL implementation of UserClaimRepository
#[derive(Clone)]
pub struct PostgresUserClaimRepository {
    factory: Arc<dyn ConnectionFactory>,
}

impl PostgresUserClaimRepository {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl UserClaimRepository for PostgresUserClaimRepository {
    async fn claims_for_user(&self, ctx: &OperationContext, user_id: Uuid) -> AppResult<Vec<Claim>> {
        let stmt = statement(CLAIMS_FOR_USER, [user_id.into()]);
        let claims = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let rows = ClaimRow::find_by_statement(stmt).all(&conn).await?;
            Ok(rows.into_iter().map(Claim::from).collect::<Vec<_>>())
        })
        .await?;

        tracing::debug!(user_id = %user_id, count = claims.len(), "Loaded user claims");
        Ok(claims)
    }
}

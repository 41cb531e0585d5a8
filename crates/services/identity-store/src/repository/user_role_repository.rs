//! Role membership repository: the `identity_user_roles` table.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbErr, FromQueryResult};
use uuid::Uuid;

use common::{AppResult, OperationContext};
use domain::UserRole;

use super::statement;
use crate::infra::{with_connection, ConnectionFactory};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const ROLES_FOR_USER: &str = r#"
    SELECT r.id AS role_id, r.name AS role_name, r.normalized_name AS normalized_role_name
    FROM identity_roles AS r
    INNER JOIN identity_user_roles AS ur ON ur.role_id = r.id
    WHERE ur.user_id = $1
"#;

const DELETE_FOR_USER: &str = "DELETE FROM identity_user_roles WHERE user_id = $1";

const INSERT: &str = "INSERT INTO identity_user_roles (user_id, role_id) VALUES ($1, $2)";

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRoleRepository: Send + Sync {
    /// Memberships of a user, joined with the role names
    async fn roles_for_user(&self, ctx: &OperationContext, user_id: Uuid)
        -> AppResult<Vec<UserRole>>;
}

#[derive(Debug, FromQueryResult)]
struct UserRoleRow {
    role_id: Uuid,
    role_name: Option<String>,
    normalized_role_name: Option<String>,
}

impl From<UserRoleRow> for UserRole {
    fn from(row: UserRoleRow) -> Self {
        UserRole {
            role_id: row.role_id,
            role_name: row.role_name.unwrap_or_default(),
            normalized_role_name: row.normalized_role_name,
        }
    }
}

/// Replace the stored memberships of `user_id` with `roles`.
pub(crate) async fn replace_user_roles<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    roles: &[UserRole],
) -> Result<(), DbErr> {
    conn.execute(statement(DELETE_FOR_USER, [user_id.into()]))
        .await?;
    for role in roles {
        conn.execute(statement(INSERT, [user_id.into(), role.role_id.into()]))
            .await?;
    }
    Ok(())
}

/// PostgreSQL implementation of UserRoleRepository
#[derive(Clone)]
pub struct PostgresUserRoleRepository {
    factory: Arc<dyn ConnectionFactory>,
}

impl PostgresUserRoleRepository {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl UserRoleRepository for PostgresUserRoleRepository {
    async fn roles_for_user(
        &self,
        ctx: &OperationContext,
        user_id: Uuid,
    ) -> AppResult<Vec<UserRole>> {
        let stmt = statement(ROLES_FOR_USER, [user_id.into()]);
        let roles = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let rows = UserRoleRow::find_by_statement(stmt).all(&conn).await?;
            Ok(rows.into_iter().map(UserRole::from).collect::<Vec<_>>())
        })
        .await?;

        tracing::debug!(user_id = %user_id, count = roles.len(), "Loaded user roles");
        Ok(roles)
    }
}

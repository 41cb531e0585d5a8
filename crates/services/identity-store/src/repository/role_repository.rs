//! Role repository: the `identity_roles` table.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, TransactionTrait,
};
use uuid::Uuid;

use common::{AppResult, OperationContext};
use domain::{IdentityResult, Loaded, Role, CODE_CONCURRENCY_FAILURE, CODE_ROLE_NOT_INSERTED};

use super::role_claim_repository::replace_role_claims;
use super::{statement, write_outcome};
use crate::infra::{with_connection, ConnectionFactory};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const FIND_BY_ID: &str = "SELECT r.* FROM identity_roles AS r WHERE r.id = $1";

const FIND_BY_NAME: &str = "SELECT r.* FROM identity_roles AS r WHERE r.normalized_name = $1";

const LIST: &str = "SELECT r.* FROM identity_roles AS r ORDER BY r.normalized_name";

const INSERT: &str = r#"
    INSERT INTO identity_roles (id, name, normalized_name, concurrency_stamp)
    VALUES ($1, $2, $3, $4)
"#;

const UPDATE: &str = r#"
    UPDATE identity_roles
    SET name = $2, normalized_name = $3, concurrency_stamp = $4
    WHERE id = $1 AND concurrency_stamp IS NOT DISTINCT FROM $5
"#;

const DELETE: &str = "DELETE FROM identity_roles WHERE id = $1";

/// Role repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, ctx: &OperationContext, id: Uuid) -> AppResult<Option<Role>>;

    async fn find_by_name(
        &self,
        ctx: &OperationContext,
        normalized_name: &str,
    ) -> AppResult<Option<Role>>;

    async fn list(&self, ctx: &OperationContext) -> AppResult<Vec<Role>>;

    async fn create(&self, ctx: &OperationContext, role: &Role) -> AppResult<IdentityResult>;

    /// Update the role row when its stored concurrency stamp is `expected_stamp`
    async fn update(
        &self,
        ctx: &OperationContext,
        role: &Role,
        expected_stamp: Option<String>,
    ) -> AppResult<IdentityResult>;

    async fn delete(&self, ctx: &OperationContext, id: Uuid) -> AppResult<IdentityResult>;
}

#[derive(Debug, FromQueryResult)]
struct RoleRow {
    id: Uuid,
    name: Option<String>,
    normalized_name: Option<String>,
    concurrency_stamp: Option<String>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            name: row.name,
            normalized_name: row.normalized_name,
            concurrency_stamp: row.concurrency_stamp,
            claims: Loaded::Unloaded,
        }
    }
}

fn role_values(role: &Role) -> Vec<sea_orm::Value> {
    vec![
        role.id.into(),
        role.name.clone().into(),
        role.normalized_name.clone().into(),
        role.concurrency_stamp.clone().into(),
    ]
}

async fn insert_role(conn: &DatabaseConnection, role: &Role) -> Result<u64, DbErr> {
    let txn = conn.begin().await?;
    let rows = txn
        .execute(statement(INSERT, role_values(role)))
        .await?
        .rows_affected();
    if rows == 0 {
        txn.rollback().await?;
        return Ok(0);
    }
    if let Some(claims) = role.claims.items() {
        replace_role_claims(&txn, role.id, claims).await?;
    }
    txn.commit().await?;
    Ok(rows)
}

async fn update_role(
    conn: &DatabaseConnection,
    role: &Role,
    expected_stamp: Option<String>,
) -> Result<u64, DbErr> {
    let mut values = role_values(role);
    values.push(expected_stamp.into());

    let txn = conn.begin().await?;
    let rows = txn.execute(statement(UPDATE, values)).await?.rows_affected();
    if rows == 0 {
        txn.rollback().await?;
        return Ok(0);
    }
    if let Some(claims) = role.claims.items() {
        replace_role_claims(&txn, role.id, claims).await?;
    }
    txn.commit().await?;
    Ok(rows)
}

/// PostgreSQL implementation of RoleRepository
#[derive(Clone)]
pub struct PostgresRoleRepository {
    factory: Arc<dyn ConnectionFactory>,
}

impl PostgresRoleRepository {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }

    async fn find_one(
        &self,
        ctx: &OperationContext,
        sql: &'static str,
        key: sea_orm::Value,
    ) -> AppResult<Option<Role>> {
        let stmt = statement(sql, [key]);
        with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let row = RoleRow::find_by_statement(stmt).one(&conn).await?;
            Ok(row.map(Role::from))
        })
        .await
    }
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn find_by_id(&self, ctx: &OperationContext, id: Uuid) -> AppResult<Option<Role>> {
        self.find_one(ctx, FIND_BY_ID, id.into()).await
    }

    async fn find_by_name(
        &self,
        ctx: &OperationContext,
        normalized_name: &str,
    ) -> AppResult<Option<Role>> {
        self.find_one(ctx, FIND_BY_NAME, normalized_name.into()).await
    }

    async fn list(&self, ctx: &OperationContext) -> AppResult<Vec<Role>> {
        let stmt = statement(LIST, []);
        with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let rows = RoleRow::find_by_statement(stmt).all(&conn).await?;
            Ok(rows.into_iter().map(Role::from).collect())
        })
        .await
    }

    async fn create(&self, ctx: &OperationContext, role: &Role) -> AppResult<IdentityResult> {
        let role_id = role.id;
        let role = role.clone();
        let outcome = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            Ok(insert_role(&conn, &role).await)
        })
        .await?;

        let result = write_outcome("create role", outcome, || {
            IdentityResult::failed(CODE_ROLE_NOT_INSERTED, "Role could not be inserted.")
        })?;
        if result.succeeded() {
            tracing::info!(role_id = %role_id, "Created role");
        }
        Ok(result)
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        role: &Role,
        expected_stamp: Option<String>,
    ) -> AppResult<IdentityResult> {
        let role_id = role.id;
        let role = role.clone();
        let outcome = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            Ok(update_role(&conn, &role, expected_stamp).await)
        })
        .await?;

        write_outcome("update role", outcome, || {
            IdentityResult::failed(
                CODE_CONCURRENCY_FAILURE,
                format!("Role {} was modified or deleted since it was loaded.", role_id),
            )
        })
    }

    async fn delete(&self, ctx: &OperationContext, id: Uuid) -> AppResult<IdentityResult> {
        let stmt = statement(DELETE, [id.into()]);
        let outcome = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            Ok(conn.execute(stmt).await.map(|r| r.rows_affected()))
        })
        .await?;

        let result = write_outcome("delete role", outcome, || {
            IdentityResult::failed(
                CODE_CONCURRENCY_FAILURE,
                format!("Role {} no longer exists.", id),
            )
        })?;
        if result.succeeded() {
            tracing::info!(role_id = %id, "Deleted role");
        }
        Ok(result)
    }
}

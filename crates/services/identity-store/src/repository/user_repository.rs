//! User repository: the `identity_users` table.
//!
//! Writes also rewrite the child tables of every collection the user has
//! loaded, inside one transaction on the call's connection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, TransactionTrait};
use uuid::Uuid;

use common::{AppResult, OperationContext};
use domain::{
    Claim, IdentityResult, Loaded, User, CODE_CONCURRENCY_FAILURE, CODE_USER_NOT_INSERTED,
};

use super::user_claim_repository::replace_user_claims;
use super::user_login_repository::replace_user_logins;
use super::user_role_repository::replace_user_roles;
use super::user_token_repository::replace_user_tokens;
use super::{statement, write_outcome};
use crate::infra::{with_connection, ConnectionFactory};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const FIND_BY_ID: &str = "SELECT u.* FROM identity_users AS u WHERE u.id = $1";

const FIND_BY_NAME: &str =
    "SELECT u.* FROM identity_users AS u WHERE u.normalized_user_name = $1";

const FIND_BY_EMAIL: &str = "SELECT u.* FROM identity_users AS u WHERE u.normalized_email = $1";

const LIST: &str = "SELECT u.* FROM identity_users AS u ORDER BY u.normalized_user_name";

const LIST_FOR_CLAIM: &str = r#"
    SELECT DISTINCT u.*
    FROM identity_users AS u
    INNER JOIN identity_user_claims AS uc ON uc.user_id = u.id
    WHERE uc.claim_type = $1 AND uc.claim_value = $2
"#;

const LIST_IN_ROLE: &str = r#"
    SELECT u.*
    FROM identity_users AS u
    INNER JOIN identity_user_roles AS ur ON ur.user_id = u.id
    INNER JOIN identity_roles AS r ON r.id = ur.role_id
    WHERE r.normalized_name = $1
"#;

const INSERT: &str = r#"
    INSERT INTO identity_users (
        id, user_name, normalized_user_name, email, normalized_email, email_confirmed,
        password_hash, security_stamp, concurrency_stamp, phone_number, phone_number_confirmed,
        two_factor_enabled, lockout_end, lockout_enabled, access_failed_count
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
"#;

const UPDATE: &str = r#"
    UPDATE identity_users
    SET user_name = $2, normalized_user_name = $3, email = $4, normalized_email = $5,
        email_confirmed = $6, password_hash = $7, security_stamp = $8, concurrency_stamp = $9,
        phone_number = $10, phone_number_confirmed = $11, two_factor_enabled = $12,
        lockout_end = $13, lockout_enabled = $14, access_failed_count = $15
    WHERE id = $1 AND concurrency_stamp IS NOT DISTINCT FROM $16
"#;

const DELETE: &str = "DELETE FROM identity_users WHERE id = $1";

/// User repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, ctx: &OperationContext, id: Uuid) -> AppResult<Option<User>>;

    async fn find_by_name(
        &self,
        ctx: &OperationContext,
        normalized_user_name: &str,
    ) -> AppResult<Option<User>>;

    async fn find_by_email(
        &self,
        ctx: &OperationContext,
        normalized_email: &str,
    ) -> AppResult<Option<User>>;

    async fn list(&self, ctx: &OperationContext) -> AppResult<Vec<User>>;

    /// Users holding a claim with this exact type and value
    async fn list_for_claim(&self, ctx: &OperationContext, claim: &Claim) -> AppResult<Vec<User>>;

    async fn list_in_role(
        &self,
        ctx: &OperationContext,
        normalized_role_name: &str,
    ) -> AppResult<Vec<User>>;

    /// Insert the user row and its loaded collections
    async fn create(&self, ctx: &OperationContext, user: &User) -> AppResult<IdentityResult>;

    /// Update the user row when its stored concurrency stamp is `expected_stamp`,
    /// then rewrite its loaded collections
    async fn update(
        &self,
        ctx: &OperationContext,
        user: &User,
        expected_stamp: Option<String>,
    ) -> AppResult<IdentityResult>;

    async fn delete(&self, ctx: &OperationContext, id: Uuid) -> AppResult<IdentityResult>;
}

/// Row shape of `identity_users`
#[derive(Debug, FromQueryResult)]
pub(crate) struct UserRow {
    id: Uuid,
    user_name: Option<String>,
    normalized_user_name: Option<String>,
    email: Option<String>,
    normalized_email: Option<String>,
    email_confirmed: bool,
    password_hash: Option<String>,
    security_stamp: Option<String>,
    concurrency_stamp: Option<String>,
    phone_number: Option<String>,
    phone_number_confirmed: bool,
    two_factor_enabled: bool,
    lockout_end: Option<DateTime<Utc>>,
    lockout_enabled: bool,
    access_failed_count: i32,
}

/// Convert database row to domain entity (collections start unloaded)
impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            user_name: row.user_name,
            normalized_user_name: row.normalized_user_name,
            email: row.email,
            normalized_email: row.normalized_email,
            email_confirmed: row.email_confirmed,
            password_hash: row.password_hash,
            phone_number: row.phone_number,
            phone_number_confirmed: row.phone_number_confirmed,
            two_factor_enabled: row.two_factor_enabled,
            lockout_end: row.lockout_end,
            lockout_enabled: row.lockout_enabled,
            access_failed_count: row.access_failed_count,
            security_stamp: row.security_stamp,
            concurrency_stamp: row.concurrency_stamp,
            claims: Loaded::Unloaded,
            logins: Loaded::Unloaded,
            roles: Loaded::Unloaded,
            tokens: Loaded::Unloaded,
        }
    }
}

/// Positional values for `$1..$15` of INSERT and UPDATE
fn user_values(user: &User) -> Vec<sea_orm::Value> {
    vec![
        user.id.into(),
        user.user_name.clone().into(),
        user.normalized_user_name.clone().into(),
        user.email.clone().into(),
        user.normalized_email.clone().into(),
        user.email_confirmed.into(),
        user.password_hash.clone().into(),
        user.security_stamp.clone().into(),
        user.concurrency_stamp.clone().into(),
        user.phone_number.clone().into(),
        user.phone_number_confirmed.into(),
        user.two_factor_enabled.into(),
        user.lockout_end.into(),
        user.lockout_enabled.into(),
        user.access_failed_count.into(),
    ]
}

/// Rewrite the child tables of every loaded collection.
async fn write_collections<C: ConnectionTrait>(conn: &C, user: &User) -> Result<(), DbErr> {
    if let Some(claims) = user.claims.items() {
        replace_user_claims(conn, user.id, claims).await?;
    }
    if let Some(logins) = user.logins.items() {
        replace_user_logins(conn, user.id, logins).await?;
    }
    if let Some(roles) = user.roles.items() {
        replace_user_roles(conn, user.id, roles).await?;
    }
    if let Some(tokens) = user.tokens.items() {
        replace_user_tokens(conn, user.id, tokens).await?;
    }
    Ok(())
}

/// Insert the user row and its loaded collections in one transaction.
async fn insert_user(conn: &DatabaseConnection, user: &User) -> Result<u64, DbErr> {
    let txn = conn.begin().await?;
    let rows = txn
        .execute(statement(INSERT, user_values(user)))
        .await?
        .rows_affected();
    if rows == 0 {
        txn.rollback().await?;
        return Ok(0);
    }
    write_collections(&txn, user).await?;
    txn.commit().await?;
    Ok(rows)
}

/// Update the user row guarded by its concurrency stamp, then its loaded
/// collections, in one transaction.
async fn update_user(
    conn: &DatabaseConnection,
    user: &User,
    expected_stamp: Option<String>,
) -> Result<u64, DbErr> {
    let mut values = user_values(user);
    values.push(expected_stamp.into());

    let txn = conn.begin().await?;
    let rows = txn.execute(statement(UPDATE, values)).await?.rows_affected();
    if rows == 0 {
        txn.rollback().await?;
        return Ok(0);
    }
    write_collections(&txn, user).await?;
    txn.commit().await?;
    Ok(rows)
}

/// PostgreSQL implementation of UserRepository
#[derive(Clone)]
pub struct PostgresUserRepository {
    factory: Arc<dyn ConnectionFactory>,
}

impl PostgresUserRepository {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }

    async fn find_one(
        &self,
        ctx: &OperationContext,
        sql: &'static str,
        key: sea_orm::Value,
    ) -> AppResult<Option<User>> {
        let stmt = statement(sql, [key]);
        with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let row = UserRow::find_by_statement(stmt).one(&conn).await?;
            Ok(row.map(User::from))
        })
        .await
    }

    async fn find_many(
        &self,
        ctx: &OperationContext,
        stmt: sea_orm::Statement,
    ) -> AppResult<Vec<User>> {
        with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let rows = UserRow::find_by_statement(stmt).all(&conn).await?;
            Ok(rows.into_iter().map(User::from).collect())
        })
        .await
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, ctx: &OperationContext, id: Uuid) -> AppResult<Option<User>> {
        self.find_one(ctx, FIND_BY_ID, id.into()).await
    }

    async fn find_by_name(
        &self,
        ctx: &OperationContext,
        normalized_user_name: &str,
    ) -> AppResult<Option<User>> {
        self.find_one(ctx, FIND_BY_NAME, normalized_user_name.into())
            .await
    }

    async fn find_by_email(
        &self,
        ctx: &OperationContext,
        normalized_email: &str,
    ) -> AppResult<Option<User>> {
        self.find_one(ctx, FIND_BY_EMAIL, normalized_email.into())
            .await
    }

    async fn list(&self, ctx: &OperationContext) -> AppResult<Vec<User>> {
        self.find_many(ctx, statement(LIST, [])).await
    }

    async fn list_for_claim(&self, ctx: &OperationContext, claim: &Claim) -> AppResult<Vec<User>> {
        let stmt = statement(
            LIST_FOR_CLAIM,
            [claim.claim_type.clone().into(), claim.value.clone().into()],
        );
        self.find_many(ctx, stmt).await
    }

    async fn list_in_role(
        &self,
        ctx: &OperationContext,
        normalized_role_name: &str,
    ) -> AppResult<Vec<User>> {
        self.find_many(ctx, statement(LIST_IN_ROLE, [normalized_role_name.into()]))
            .await
    }

    async fn create(&self, ctx: &OperationContext, user: &User) -> AppResult<IdentityResult> {
        let user_id = user.id;
        let user = user.clone();
        let outcome = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            Ok(insert_user(&conn, &user).await)
        })
        .await?;

        let result = write_outcome("create user", outcome, || {
            IdentityResult::failed(CODE_USER_NOT_INSERTED, "User could not be inserted.")
        })?;
        if result.succeeded() {
            tracing::info!(user_id = %user_id, "Created user");
        }
        Ok(result)
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        user: &User,
        expected_stamp: Option<String>,
    ) -> AppResult<IdentityResult> {
        let user_id = user.id;
        let user = user.clone();
        let outcome = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            Ok(update_user(&conn, &user, expected_stamp).await)
        })
        .await?;

        write_outcome("update user", outcome, || {
            IdentityResult::failed(
                CODE_CONCURRENCY_FAILURE,
                format!("User {} was modified or deleted since it was loaded.", user_id),
            )
        })
    }

    async fn delete(&self, ctx: &OperationContext, id: Uuid) -> AppResult<IdentityResult> {
        let stmt = statement(DELETE, [id.into()]);
        let outcome = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            Ok(conn.execute(stmt).await.map(|r| r.rows_affected()))
        })
        .await?;

        let result = write_outcome("delete user", outcome, || {
            IdentityResult::failed(
                CODE_CONCURRENCY_FAILURE,
                format!("User {} no longer exists.", id),
            )
        })?;
        if result.succeeded() {
            tracing::info!(user_id = %id, "Deleted user");
        }
        Ok(result)
    }
}

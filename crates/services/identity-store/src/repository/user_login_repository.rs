//! External login repository: the `identity_user_logins` table.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbErr, FromQueryResult};
use uuid::Uuid;

use common::{AppResult, OperationContext};
use domain::{User, UserLoginInfo};

use super::statement;
use super::user_repository::UserRow;
use crate::infra::{with_connection, ConnectionFactory};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const LOGINS_FOR_USER: &str = r#"
    SELECT ul.login_provider, ul.provider_key, ul.provider_display_name
    FROM identity_user_logins AS ul
    WHERE ul.user_id = $1
"#;

const FIND_USER_BY_LOGIN: &str = r#"
    SELECT u.*
    FROM identity_users AS u
    INNER JOIN identity_user_logins AS ul ON ul.user_id = u.id
    WHERE ul.login_provider = $1 AND ul.provider_key = $2
"#;

const DELETE_FOR_USER: &str = "DELETE FROM identity_user_logins WHERE user_id = $1";

const INSERT: &str = r#"
    INSERT INTO identity_user_logins (login_provider, provider_key, provider_display_name, user_id)
    VALUES ($1, $2, $3, $4)
"#;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserLoginRepository: Send + Sync {
    async fn logins_for_user(
        &self,
        ctx: &OperationContext,
        user_id: Uuid,
    ) -> AppResult<Vec<UserLoginInfo>>;

    /// The user owning the login identified by provider and key
    async fn find_user_by_login(
        &self,
        ctx: &OperationContext,
        login_provider: &str,
        provider_key: &str,
    ) -> AppResult<Option<User>>;
}

#[derive(Debug, FromQueryResult)]
struct LoginRow {
    login_provider: String,
    provider_key: String,
    provider_display_name: Option<String>,
}

impl From<LoginRow> for UserLoginInfo {
    fn from(row: LoginRow) -> Self {
        UserLoginInfo {
            login_provider: row.login_provider,
            provider_key: row.provider_key,
            provider_display_name: row.provider_display_name,
        }
    }
}

/// Replace the stored logins of `user_id` with `logins`.
pub(crate) async fn replace_user_logins<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    logins: &[UserLoginInfo],
) -> Result<(), DbErr> {
    conn.execute(statement(DELETE_FOR_USER, [user_id.into()]))
        .await?;
    for login in logins {
        conn.execute(statement(
            INSERT,
            [
                login.login_provider.clone().into(),
                login.provider_key.clone().into(),
                login.provider_display_name.clone().into(),
                user_id.into(),
            ],
        ))
        .await?;
    }
    Ok(())
}

/// PostgreSQL implementation of UserLoginRepository
#[derive(Clone)]
pub struct PostgresUserLoginRepository {
    factory: Arc<dyn ConnectionFactory>,
}

impl PostgresUserLoginRepository {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl UserLoginRepository for PostgresUserLoginRepository {
    async fn logins_for_user(
        &self,
        ctx: &OperationContext,
        user_id: Uuid,
    ) -> AppResult<Vec<UserLoginInfo>> {
        let stmt = statement(LOGINS_FOR_USER, [user_id.into()]);
        let logins = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let rows = LoginRow::find_by_statement(stmt).all(&conn).await?;
            Ok(rows.into_iter().map(UserLoginInfo::from).collect::<Vec<_>>())
        })
        .await?;

        tracing::debug!(user_id = %user_id, count = logins.len(), "Loaded user logins");
        Ok(logins)
    }

    async fn find_user_by_login(
        &self,
        ctx: &OperationContext,
        login_provider: &str,
        provider_key: &str,
    ) -> AppResult<Option<User>> {
        let stmt = statement(
            FIND_USER_BY_LOGIN,
            [login_provider.into(), provider_key.into()],
        );
        with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let row = UserRow::find_by_statement(stmt).one(&conn).await?;
            Ok(row.map(User::from))
        })
        .await
    }
}

//! User token repository: the `identity_user_tokens` table.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbErr, FromQueryResult};
use uuid::Uuid;

use common::{AppResult, OperationContext};
use domain::UserToken;

use super::statement;
use crate::infra::{with_connection, ConnectionFactory};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

const TOKENS_FOR_USER: &str = r#"
    SELECT ut.user_id, ut.login_provider, ut.name, ut.value
    FROM identity_user_tokens AS ut
    WHERE ut.user_id = $1
"#;

const DELETE_FOR_USER: &str = "DELETE FROM identity_user_tokens WHERE user_id = $1";

const INSERT: &str = r#"
    INSERT INTO identity_user_tokens (user_id, login_provider, name, value)
    VALUES ($1, $2, $3, $4)
"#;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserTokenRepository: Send + Sync {
    async fn tokens_for_user(
        &self,
        ctx: &OperationContext,
        user_id: Uuid,
    ) -> AppResult<Vec<UserToken>>;
}

#[derive(Debug, FromQueryResult)]
struct TokenRow {
    user_id: Uuid,
    login_provider: String,
    name: String,
    value: Option<String>,
}

impl From<TokenRow> for UserToken {
    fn from(row: TokenRow) -> Self {
        UserToken {
            user_id: row.user_id,
            login_provider: row.login_provider,
            name: row.name,
            value: row.value,
        }
    }
}

/// Replace the stored tokens of `user_id` with `tokens`.
pub(crate) async fn replace_user_tokens<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    tokens: &[UserToken],
) -> Result<(), DbErr> {
    conn.execute(statement(DELETE_FOR_USER, [user_id.into()]))
        .await?;
    for token in tokens {
        conn.execute(statement(
            INSERT,
            [
                user_id.into(),
                token.login_provider.clone().into(),
                token.name.clone().into(),
                token.value.clone().into(),
            ],
        ))
        .await?;
    }
    Ok(())
}

/// PostgreSQL implementation of UserTokenRepository
#[derive(Clone)]
pub struct PostgresUserTokenRepository {
    factory: Arc<dyn ConnectionFactory>,
}

impl PostgresUserTokenRepository {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl UserTokenRepository for PostgresUserTokenRepository {
    async fn tokens_for_user(
        &self,
        ctx: &OperationContext,
        user_id: Uuid,
    ) -> AppResult<Vec<UserToken>> {
        let stmt = statement(TOKENS_FOR_USER, [user_id.into()]);
        let tokens = with_connection(self.factory.as_ref(), ctx, move |conn| async move {
            let rows = TokenRow::find_by_statement(stmt).all(&conn).await?;
            Ok(rows.into_iter().map(UserToken::from).collect::<Vec<_>>())
        })
        .await?;

        tracing::debug!(user_id = %user_id, count = tokens.len(), "Loaded user tokens");
        Ok(tokens)
    }
}

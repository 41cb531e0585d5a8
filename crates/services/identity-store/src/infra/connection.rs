//! Database connection factory.
//!
//! Repositories never hold a connection. Each repository call asks the
//! factory for one through [`with_connection`], uses it for its statements
//! and drops it before returning.

use std::future::Future;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};

use common::{AppError, AppResult, DatabaseConfig, OperationContext};

/// Opens ready-to-use database connections on demand.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create_connection(&self) -> AppResult<DatabaseConnection>;
}

/// Factory opening one physical Postgres connection per call.
pub struct PostgresConnectionFactory {
    connection_string: String,
}

impl PostgresConnectionFactory {
    /// Build a factory from a connection string.
    ///
    /// Fails with a configuration error if the string is absent or blank.
    pub fn new(connection_string: Option<String>) -> AppResult<Self> {
        let connection_string = connection_string
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::configuration("database connection string is required"))?;

        Ok(Self { connection_string })
    }

    pub fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        Self::new(config.url.clone())
    }

    fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.connection_string.clone());
        // One physical connection per factory call.
        options
            .max_connections(1)
            .min_connections(0)
            .sqlx_logging(false);
        options
    }
}

impl std::fmt::Debug for PostgresConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnectionFactory")
            .field("connection_string", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl ConnectionFactory for PostgresConnectionFactory {
    async fn create_connection(&self) -> AppResult<DatabaseConnection> {
        let connection = SeaDatabase::connect(self.connect_options())
            .await
            .map_err(AppError::Connection)?;
        tracing::debug!("Opened database connection");
        Ok(connection)
    }
}

/// Run `op` on a freshly acquired connection.
///
/// The context is checked before acquiring, and both acquisition and `op`
/// run under [`OperationContext::guard`]. The connection is moved into `op`
/// and released when `op` finishes.
pub async fn with_connection<T, F, Fut>(
    factory: &dyn ConnectionFactory,
    ctx: &OperationContext,
    op: F,
) -> AppResult<T>
where
    F: FnOnce(DatabaseConnection) -> Fut + Send,
    Fut: Future<Output = AppResult<T>> + Send,
    T: Send,
{
    ctx.ensure_active()?;
    let connection = ctx.guard(factory.create_connection()).await?;
    ctx.guard(op(connection)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_connection_string_is_configuration_error() {
        let err = PostgresConnectionFactory::new(None).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_blank_connection_string_is_configuration_error() {
        let err = PostgresConnectionFactory::new(Some("   ".to_string())).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_connection_string() {
        let factory =
            PostgresConnectionFactory::new(Some("postgres://u:secret@db/identity".to_string()))
                .unwrap();
        assert!(!format!("{:?}", factory).contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_database_is_connection_error() {
        let factory =
            PostgresConnectionFactory::new(Some("postgres://u:p@127.0.0.1:1/identity".to_string()))
                .unwrap();
        let ctx = OperationContext::background().with_timeout(std::time::Duration::from_secs(5));

        let err = with_connection(&factory, &ctx, |_conn| async { Ok::<_, AppError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Connection(_) | AppError::DeadlineExceeded
        ));
    }
}

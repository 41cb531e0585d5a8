//! Identity Store Library
//!
//! PostgreSQL persistence for an identity subsystem: users, roles, claims,
//! external logins, role memberships and tokens. Three layers:
//!
//! - [`infra`]: connection factory, one connection per repository call
//! - [`repository`]: parameterized SQL mapped onto domain records
//! - [`store`]: `UserStore` / `RoleStore` implementing the capability traits
//!   and caching entity collections after their first load

pub mod config;
pub mod infra;
pub mod repository;
pub mod store;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use common::{AppResult, OperationContext, OptionExt};
use domain::{Role, User};

use crate::config::IdentityStoreConfig;
use crate::infra::{ConnectionFactory, Database, PostgresConnectionFactory};
use crate::store::{RolePersistence, RoleStore, UserPersistence, UserStore};

pub use crate::infra::MigrateAction;

/// User and role stores sharing one connection factory.
#[derive(Clone)]
pub struct IdentityStores {
    pub users: UserStore,
    pub roles: RoleStore,
}

impl IdentityStores {
    /// Build Postgres-backed stores.
    ///
    /// Fails with a configuration error if the connection string is absent
    /// or blank. No connection is opened until the first store call.
    pub fn connect(connection_string: Option<String>) -> AppResult<Self> {
        let factory: Arc<dyn ConnectionFactory> =
            Arc::new(PostgresConnectionFactory::new(connection_string)?);
        Ok(Self::with_factory(factory))
    }

    /// Build stores from the environment configuration.
    pub fn from_config(config: &IdentityStoreConfig) -> AppResult<Self> {
        Self::connect(config.database.url.clone())
    }

    pub fn with_factory(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            users: UserStore::new(factory.clone()),
            roles: RoleStore::new(factory),
        }
    }

    /// Look up a user by id, or by user name when `key` is not a UUID.
    ///
    /// Names are matched in upper-case normalized form. A missing user is
    /// [`AppError::NotFound`](common::AppError::NotFound).
    pub async fn require_user(&self, ctx: &OperationContext, key: &str) -> AppResult<User> {
        let user = if Uuid::parse_str(key).is_ok() {
            self.users.find_by_id(ctx, key).await?
        } else {
            self.users.find_by_name(ctx, &key.to_uppercase()).await?
        };
        user.ok_or_not_found(format!("user {}", key))
    }

    /// Look up a role by id, or by role name when `key` is not a UUID.
    pub async fn require_role(&self, ctx: &OperationContext, key: &str) -> AppResult<Role> {
        let role = if Uuid::parse_str(key).is_ok() {
            self.roles.find_by_id(ctx, key).await?
        } else {
            self.roles.find_by_name(ctx, &key.to_uppercase()).await?
        };
        role.ok_or_not_found(format!("role {}", key))
    }
}

/// Run a migration action (for CLI commands).
///
/// `Status` returns each known migration with whether it is applied; the
/// other actions return an empty list.
pub async fn run_migrations(
    config: &IdentityStoreConfig,
    action: MigrateAction,
) -> AppResult<Vec<(String, bool)>> {
    let factory = PostgresConnectionFactory::from_config(&config.database)?;
    let db = Database::open(&factory, &OperationContext::background()).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => return Ok(db.migration_status().await?),
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(Vec::new())
}

/// Open a connection and run `SELECT 1`.
pub async fn ping(config: &IdentityStoreConfig, ctx: &OperationContext) -> AppResult<()> {
    let factory = PostgresConnectionFactory::from_config(&config.database)?;
    let db = Database::open(&factory, ctx).await?;
    ctx.guard(async { Ok(db.ping().await?) }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use common::AppError;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};

    struct MockFactory(DatabaseConnection);

    #[async_trait]
    impl ConnectionFactory for MockFactory {
        async fn create_connection(&self) -> AppResult<DatabaseConnection> {
            Ok(share_connection(&self.0))
        }
    }

    /// `DatabaseConnection` is not `Clone` under sea-orm's `mock` feature; share the
    /// underlying `Arc` the way a derived `Clone` would.
    fn share_connection(connection: &DatabaseConnection) -> DatabaseConnection {
        match connection {
            DatabaseConnection::MockDatabaseConnection(mock) => {
                DatabaseConnection::MockDatabaseConnection(mock.clone())
            }
            _ => unreachable!("tests only use mock connections"),
        }
    }

    fn stores(connection: DatabaseConnection) -> IdentityStores {
        IdentityStores::with_factory(Arc::new(MockFactory(connection)))
    }

    fn no_rows() -> Vec<BTreeMap<&'static str, Value>> {
        Vec::new()
    }

    #[test]
    fn test_connect_requires_connection_string() {
        assert!(matches!(
            IdentityStores::connect(None),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_connect_does_not_open_connection() {
        let stores = IdentityStores::connect(Some("postgres://u:p@127.0.0.1:1/identity".into()));
        assert!(stores.is_ok());
    }

    #[tokio::test]
    async fn test_require_user_missing_is_not_found() {
        let connection = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([no_rows()])
            .into_connection();

        let err = stores(connection)
            .require_user(&OperationContext::background(), "alice")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.to_string(), "user alice not found");
    }

    #[tokio::test]
    async fn test_require_role_by_id() {
        let id = Uuid::new_v4();
        let connection = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([
                ("id", Value::from(id)),
                ("name", Value::from(Some("Admin".to_string()))),
                ("normalized_name", Value::from(Some("ADMIN".to_string()))),
                ("concurrency_stamp", Value::from(Some("stamp".to_string()))),
            ])]])
            .append_query_results([no_rows()])
            .into_connection();
        let stores = stores(connection);
        let ctx = OperationContext::background();

        let role = stores.require_role(&ctx, &id.to_string()).await.unwrap();
        assert_eq!(role.name.as_deref(), Some("Admin"));

        let err = stores
            .require_role(&ctx, &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}

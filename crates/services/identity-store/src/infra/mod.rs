//! Infrastructure layer - connections and schema.

mod connection;
mod db;
pub mod migrations;

pub use connection::{with_connection, ConnectionFactory, PostgresConnectionFactory};
pub use db::{Database, MigrateAction};
pub use migrations::Migrator;

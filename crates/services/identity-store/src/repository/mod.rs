//! Repository layer for data access.
//!
//! One repository per table or association. Every call acquires its own
//! connection through the [`ConnectionFactory`](crate::infra::ConnectionFactory),
//! runs parameterized SQL and maps rows onto domain records.

mod role_claim_repository;
mod role_repository;
mod user_claim_repository;
mod user_login_repository;
mod user_repository;
mod user_role_repository;
mod user_token_repository;

use sea_orm::{DbBackend, DbErr, SqlErr, Statement, Value};

use common::{AppError, AppResult};
use domain::{IdentityResult, CODE_DUPLICATE_KEY};

pub use role_claim_repository::{PostgresRoleClaimRepository, RoleClaimRepository};
pub use role_repository::{PostgresRoleRepository, RoleRepository};
pub use user_claim_repository::{PostgresUserClaimRepository, UserClaimRepository};
pub use user_login_repository::{PostgresUserLoginRepository, UserLoginRepository};
pub use user_repository::{PostgresUserRepository, UserRepository};
pub use user_role_repository::{PostgresUserRoleRepository, UserRoleRepository};
pub use user_token_repository::{PostgresUserTokenRepository, UserTokenRepository};

// Export mocks for tests
#[cfg(any(test, feature = "test-utils"))]
pub use role_claim_repository::MockRoleClaimRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use role_repository::MockRoleRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_claim_repository::MockUserClaimRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_login_repository::MockUserLoginRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_role_repository::MockUserRoleRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_token_repository::MockUserTokenRepository;

/// Build a Postgres statement with positional parameters.
pub(crate) fn statement<I>(sql: &str, values: I) -> Statement
where
    I: IntoIterator<Item = Value>,
{
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

/// Map the outcome of a write onto an [`IdentityResult`].
///
/// `rows` is the number of entity rows the main statement touched. Zero
/// rows become the failure produced by `when_untouched`; unique constraint
/// violations become a `DuplicateKey` failure. Other database errors
/// propagate.
pub(crate) fn write_outcome(
    operation: &str,
    outcome: Result<u64, DbErr>,
    when_untouched: impl FnOnce() -> IdentityResult,
) -> AppResult<IdentityResult> {
    match outcome {
        Ok(0) => {
            let result = when_untouched();
            tracing::warn!(operation, %result, "Write affected no rows");
            Ok(result)
        }
        Ok(_) => Ok(IdentityResult::Succeeded),
        Err(err) => {
            let sql_err = err.sql_err();
            classify_write_error(operation, err, sql_err)
        }
    }
}

/// Classify a failed write by the SQL error the driver reported for it.
fn classify_write_error(
    operation: &str,
    err: DbErr,
    sql_err: Option<SqlErr>,
) -> AppResult<IdentityResult> {
    match sql_err {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::warn!(operation, detail = %detail, "Unique constraint violated");
            Ok(IdentityResult::failed(CODE_DUPLICATE_KEY, detail))
        }
        _ => {
            tracing::error!(operation, error = %err, "Write failed");
            Err(AppError::Database(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::CODE_CONCURRENCY_FAILURE;

    fn stale() -> IdentityResult {
        IdentityResult::failed(CODE_CONCURRENCY_FAILURE, "stale")
    }

    #[test]
    fn test_write_outcome_success() {
        let result = write_outcome("update", Ok(1), stale).unwrap();
        assert!(result.succeeded());
    }

    #[test]
    fn test_write_outcome_untouched() {
        let result = write_outcome("update", Ok(0), stale).unwrap();
        assert_eq!(result.errors()[0].code, CODE_CONCURRENCY_FAILURE);
    }

    #[test]
    fn test_write_outcome_other_error_propagates() {
        let err = write_outcome("update", Err(DbErr::Custom("boom".into())), stale).unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_unique_violation_becomes_duplicate_key() {
        let detail = "Key (normalized_name)=(ADMIN) already exists.";
        let result = classify_write_error(
            "create role",
            DbErr::Custom("duplicate key value violates unique constraint".into()),
            Some(SqlErr::UniqueConstraintViolation(detail.into())),
        )
        .unwrap();

        assert!(!result.succeeded());
        assert_eq!(result.errors()[0].code, CODE_DUPLICATE_KEY);
        assert_eq!(result.errors()[0].description, detail);
    }

    #[test]
    fn test_foreign_key_violation_propagates() {
        let err = classify_write_error(
            "create user",
            DbErr::Custom("insert or update violates foreign key constraint".into()),
            Some(SqlErr::ForeignKeyConstraintViolation("role_id".into())),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}

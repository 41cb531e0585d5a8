//! Database migrations for the identity schema.
//!
//! Each migration is a separate module following SeaORM conventions.
//! Migration names follow the pattern: m{YYYYMMDD}_{NNNNNN}_{description}

use sea_orm_migration::prelude::*;

mod m20240101_000001_create_identity_tables;
mod m20240101_000002_add_lookup_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_identity_tables::Migration),
            Box::new(m20240101_000002_add_lookup_indexes::Migration),
        ]
    }
}

#[derive(Iden)]
pub(crate) enum IdentityUsers {
    Table,
    Id,
    UserName,
    NormalizedUserName,
    Email,
    NormalizedEmail,
    EmailConfirmed,
    PasswordHash,
    SecurityStamp,
    ConcurrencyStamp,
    PhoneNumber,
    PhoneNumberConfirmed,
    TwoFactorEnabled,
    LockoutEnd,
    LockoutEnabled,
    AccessFailedCount,
}

#[derive(Iden)]
pub(crate) enum IdentityRoles {
    Table,
    Id,
    Name,
    NormalizedName,
    ConcurrencyStamp,
}

#[derive(Iden)]
pub(crate) enum IdentityRoleClaims {
    Table,
    Id,
    RoleId,
    ClaimType,
    ClaimValue,
}

#[derive(Iden)]
pub(crate) enum IdentityUserClaims {
    Table,
    Id,
    UserId,
    ClaimType,
    ClaimValue,
}

#[derive(Iden)]
pub(crate) enum IdentityUserLogins {
    Table,
    LoginProvider,
    ProviderKey,
    ProviderDisplayName,
    UserId,
}

#[derive(Iden)]
pub(crate) enum IdentityUserRoles {
    Table,
    UserId,
    RoleId,
}

#[derive(Iden)]
pub(crate) enum IdentityUserTokens {
    Table,
    UserId,
    LoginProvider,
    Name,
    Value,
}

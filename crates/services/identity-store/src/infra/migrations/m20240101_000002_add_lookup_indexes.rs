//! Migration: Add indexes backing the email and child-collection lookups.

use sea_orm_migration::prelude::*;

use super::{IdentityRoleClaims, IdentityUserClaims, IdentityUserLogins, IdentityUsers};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_identity_users_normalized_email")
                    .table(IdentityUsers::Table)
                    .col(IdentityUsers::NormalizedEmail)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_identity_user_claims_user_id")
                    .table(IdentityUserClaims::Table)
                    .col(IdentityUserClaims::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_identity_user_logins_user_id")
                    .table(IdentityUserLogins::Table)
                    .col(IdentityUserLogins::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_identity_role_claims_role_id")
                    .table(IdentityRoleClaims::Table)
                    .col(IdentityRoleClaims::RoleId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_identity_role_claims_role_id")
                    .table(IdentityRoleClaims::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_identity_user_logins_user_id")
                    .table(IdentityUserLogins::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_identity_user_claims_user_id")
                    .table(IdentityUserClaims::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_identity_users_normalized_email")
                    .table(IdentityUsers::Table)
                    .to_owned(),
            )
            .await
    }
}

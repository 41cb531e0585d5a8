//! Migration: Create the identity tables.

use sea_orm_migration::prelude::*;

use super::{
    IdentityRoleClaims, IdentityRoles, IdentityUserClaims, IdentityUserLogins, IdentityUserRoles,
    IdentityUserTokens, IdentityUsers,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IdentityUsers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IdentityUsers::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(IdentityUsers::UserName).string_len(256).null())
                    .col(
                        ColumnDef::new(IdentityUsers::NormalizedUserName)
                            .string_len(256)
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(IdentityUsers::Email).string_len(256).null())
                    .col(ColumnDef::new(IdentityUsers::NormalizedEmail).string_len(256).null())
                    .col(
                        ColumnDef::new(IdentityUsers::EmailConfirmed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(IdentityUsers::PasswordHash).text().null())
                    .col(ColumnDef::new(IdentityUsers::SecurityStamp).text().null())
                    .col(ColumnDef::new(IdentityUsers::ConcurrencyStamp).text().null())
                    .col(ColumnDef::new(IdentityUsers::PhoneNumber).text().null())
                    .col(
                        ColumnDef::new(IdentityUsers::PhoneNumberConfirmed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(IdentityUsers::TwoFactorEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(IdentityUsers::LockoutEnd)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(IdentityUsers::LockoutEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(IdentityUsers::AccessFailedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityRoles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IdentityRoles::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(IdentityRoles::Name).string_len(256).null())
                    .col(
                        ColumnDef::new(IdentityRoles::NormalizedName)
                            .string_len(256)
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(IdentityRoles::ConcurrencyStamp).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityRoleClaims::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdentityRoleClaims::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IdentityRoleClaims::RoleId).uuid().not_null())
                    .col(ColumnDef::new(IdentityRoleClaims::ClaimType).text().not_null())
                    .col(ColumnDef::new(IdentityRoleClaims::ClaimValue).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_role_claims_role_id")
                            .from(IdentityRoleClaims::Table, IdentityRoleClaims::RoleId)
                            .to(IdentityRoles::Table, IdentityRoles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityUserClaims::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdentityUserClaims::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IdentityUserClaims::UserId).uuid().not_null())
                    .col(ColumnDef::new(IdentityUserClaims::ClaimType).text().not_null())
                    .col(ColumnDef::new(IdentityUserClaims::ClaimValue).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_user_claims_user_id")
                            .from(IdentityUserClaims::Table, IdentityUserClaims::UserId)
                            .to(IdentityUsers::Table, IdentityUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityUserLogins::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdentityUserLogins::LoginProvider)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IdentityUserLogins::ProviderKey)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(IdentityUserLogins::ProviderDisplayName).text().null())
                    .col(ColumnDef::new(IdentityUserLogins::UserId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(IdentityUserLogins::LoginProvider)
                            .col(IdentityUserLogins::ProviderKey),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_user_logins_user_id")
                            .from(IdentityUserLogins::Table, IdentityUserLogins::UserId)
                            .to(IdentityUsers::Table, IdentityUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityUserRoles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IdentityUserRoles::UserId).uuid().not_null())
                    .col(ColumnDef::new(IdentityUserRoles::RoleId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(IdentityUserRoles::UserId)
                            .col(IdentityUserRoles::RoleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_user_roles_user_id")
                            .from(IdentityUserRoles::Table, IdentityUserRoles::UserId)
                            .to(IdentityUsers::Table, IdentityUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_user_roles_role_id")
                            .from(IdentityUserRoles::Table, IdentityUserRoles::RoleId)
                            .to(IdentityRoles::Table, IdentityRoles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityUserTokens::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IdentityUserTokens::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(IdentityUserTokens::LoginProvider)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(IdentityUserTokens::Name).string_len(128).not_null())
                    .col(ColumnDef::new(IdentityUserTokens::Value).text().null())
                    .primary_key(
                        Index::create()
                            .col(IdentityUserTokens::UserId)
                            .col(IdentityUserTokens::LoginProvider)
                            .col(IdentityUserTokens::Name),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_user_tokens_user_id")
                            .from(IdentityUserTokens::Table, IdentityUserTokens::UserId)
                            .to(IdentityUsers::Table, IdentityUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Children first
        manager
            .drop_table(Table::drop().table(IdentityUserTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityUserRoles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityUserLogins::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityUserClaims::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityRoleClaims::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityRoles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityUsers::Table).to_owned())
            .await
    }
}

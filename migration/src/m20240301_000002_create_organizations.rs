use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Organization::Table)
                    .if_not_exists()
                    .col(uuid(Organization::Id).primary_key())
                    .col(string_len(Organization::Name, 200).not_null())
                    .col(double(Organization::Latitude).not_null())
                    .col(double(Organization::Longitude).not_null())
                    .col(string_len_null(Organization::Address, 600))
                    .col(string_len_null(Organization::Description, 600))
                    .col(uuid(Organization::CreatorId).not_null())
                    .col(string_len(Organization::ControlQuestion, 600).not_null())
                    .col(string_len(Organization::ControlAnswer, 600).not_null())
                    .col(
                        timestamp_with_time_zone(Organization::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organization_creator")
                            .from(Organization::Table, Organization::CreatorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrganizationMember::Table)
                    .if_not_exists()
                    .col(uuid(OrganizationMember::OrganizationId).not_null())
                    .col(uuid(OrganizationMember::UserId).not_null())
                    .col(
                        timestamp_with_time_zone(OrganizationMember::JoinedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(OrganizationMember::OrganizationId)
                            .col(OrganizationMember::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organization_member_organization")
                            .from(OrganizationMember::Table, OrganizationMember::OrganizationId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organization_member_user")
                            .from(OrganizationMember::Table, OrganizationMember::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrganizationMember::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Organization::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Organization {
    Table,
    Id,
    Name,
    Latitude,
    Longitude,
    Address,
    Description,
    CreatorId,
    ControlQuestion,
    ControlAnswer,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum OrganizationMember {
    Table,
    OrganizationId,
    UserId,
    JoinedAt,
}

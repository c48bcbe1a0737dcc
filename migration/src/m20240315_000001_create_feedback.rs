use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_users::User;
use super::m20240301_000004_create_rides::Ride;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RideFeedback::Table)
                    .if_not_exists()
                    .col(uuid(RideFeedback::Id).primary_key())
                    .col(uuid(RideFeedback::RideId).not_null())
                    .col(uuid(RideFeedback::VoterId).not_null())
                    .col(integer(RideFeedback::Rating).not_null())
                    .col(string_len_null(RideFeedback::Text, 1000))
                    .col(
                        timestamp_with_time_zone(RideFeedback::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_feedback_ride")
                            .from(RideFeedback::Table, RideFeedback::RideId)
                            .to(Ride::Table, Ride::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_feedback_voter")
                            .from(RideFeedback::Table, RideFeedback::VoterId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_ride_feedback_ride_voter")
                    .table(RideFeedback::Table)
                    .col(RideFeedback::RideId)
                    .col(RideFeedback::VoterId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserFeedback::Table)
                    .if_not_exists()
                    .col(uuid(UserFeedback::Id).primary_key())
                    .col(uuid(UserFeedback::RideId).not_null())
                    .col(uuid(UserFeedback::VoterId).not_null())
                    .col(uuid(UserFeedback::TargetId).not_null())
                    .col(integer(UserFeedback::Rating).not_null())
                    .col(string_len_null(UserFeedback::Text, 1000))
                    .col(
                        timestamp_with_time_zone(UserFeedback::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_feedback_ride")
                            .from(UserFeedback::Table, UserFeedback::RideId)
                            .to(Ride::Table, Ride::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_feedback_voter")
                            .from(UserFeedback::Table, UserFeedback::VoterId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_feedback_target")
                            .from(UserFeedback::Table, UserFeedback::TargetId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_user_feedback_ride_voter_target")
                    .table(UserFeedback::Table)
                    .col(UserFeedback::RideId)
                    .col(UserFeedback::VoterId)
                    .col(UserFeedback::TargetId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserFeedback::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(RideFeedback::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RideFeedback {
    Table,
    Id,
    RideId,
    VoterId,
    Rating,
    Text,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserFeedback {
    Table,
    Id,
    RideId,
    VoterId,
    TargetId,
    Rating,
    Text,
    CreatedAt,
}

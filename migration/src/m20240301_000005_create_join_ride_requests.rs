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
                    .table(JoinRideRequest::Table)
                    .if_not_exists()
                    .col(uuid(JoinRideRequest::Id).primary_key())
                    .col(uuid(JoinRideRequest::UserId).not_null())
                    .col(uuid(JoinRideRequest::RideId).not_null())
                    // 0 = no answer, 1 = accepted, -1 = declined
                    .col(integer(JoinRideRequest::Status).not_null().default(0))
                    .col(string_len_null(JoinRideRequest::DeclineReason, 600))
                    .col(
                        timestamp_with_time_zone(JoinRideRequest::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(JoinRideRequest::DecidedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_join_ride_request_user")
                            .from(JoinRideRequest::Table, JoinRideRequest::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_join_ride_request_ride")
                            .from(JoinRideRequest::Table, JoinRideRequest::RideId)
                            .to(Ride::Table, Ride::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One request per (user, ride); the insert race is decided here.
        manager
            .create_index(
                Index::create()
                    .name("uq_join_ride_request_user_ride")
                    .table(JoinRideRequest::Table)
                    .col(JoinRideRequest::UserId)
                    .col(JoinRideRequest::RideId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JoinRideRequest::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum JoinRideRequest {
    Table,
    Id,
    UserId,
    RideId,
    Status,
    DeclineReason,
    CreatedAt,
    DecidedAt,
}

use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_users::User;
use super::m20240301_000002_create_organizations::Organization;
use super::m20240301_000003_create_cars::Car;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Ride::Table)
                    .if_not_exists()
                    .col(uuid(Ride::Id).primary_key())
                    .col(uuid(Ride::HostId).not_null())
                    .col(uuid(Ride::OrganizationId).not_null())
                    .col(uuid(Ride::CarId).not_null())
                    .col(double(Ride::StopLatitude).not_null())
                    .col(double(Ride::StopLongitude).not_null())
                    .col(string_len_null(Ride::StopAddress, 600))
                    .col(timestamp_with_time_zone(Ride::StartTime).not_null())
                    .col(integer(Ride::TotalSeats).not_null())
                    .col(double(Ride::Price).not_null())
                    .col(string_len_null(Ride::Description, 600))
                    .col(boolean(Ride::IsActive).not_null().default(true))
                    .col(timestamp_with_time_zone_null(Ride::FinishedAt))
                    .col(
                        timestamp_with_time_zone(Ride::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_host")
                            .from(Ride::Table, Ride::HostId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_organization")
                            .from(Ride::Table, Ride::OrganizationId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_car")
                            .from(Ride::Table, Ride::CarId)
                            .to(Car::Table, Car::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ride_organization_active")
                    .table(Ride::Table)
                    .col(Ride::OrganizationId)
                    .col(Ride::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RidePassenger::Table)
                    .if_not_exists()
                    .col(uuid(RidePassenger::RideId).not_null())
                    .col(uuid(RidePassenger::UserId).not_null())
                    .col(
                        timestamp_with_time_zone(RidePassenger::JoinedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(RidePassenger::RideId)
                            .col(RidePassenger::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_passenger_ride")
                            .from(RidePassenger::Table, RidePassenger::RideId)
                            .to(Ride::Table, Ride::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_passenger_user")
                            .from(RidePassenger::Table, RidePassenger::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RidePassenger::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Ride::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Ride {
    Table,
    Id,
    HostId,
    OrganizationId,
    CarId,
    StopLatitude,
    StopLongitude,
    StopAddress,
    StartTime,
    TotalSeats,
    Price,
    Description,
    IsActive,
    FinishedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum RidePassenger {
    Table,
    RideId,
    UserId,
    JoinedAt,
}

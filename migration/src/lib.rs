pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users;
mod m20240301_000002_create_organizations;
mod m20240301_000003_create_cars;
mod m20240301_000004_create_rides;
mod m20240301_000005_create_join_ride_requests;
mod m20240315_000001_create_feedback;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users::Migration),
            Box::new(m20240301_000002_create_organizations::Migration),
            Box::new(m20240301_000003_create_cars::Migration),
            Box::new(m20240301_000004_create_rides::Migration),
            Box::new(m20240301_000005_create_join_ride_requests::Migration),
            Box::new(m20240315_000001_create_feedback::Migration),
        ]
    }
}

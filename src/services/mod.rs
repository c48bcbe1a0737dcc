//! Business operations. Every function takes the acting user's id
//! explicitly; nothing reads request-scoped state.

pub mod accounts;
pub mod feedback;
pub mod lifecycle;
pub mod membership;
pub mod policy;
pub mod rides;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::{car, organization_member, ride, ride_passenger};
use crate::error::AppResult;

pub async fn is_member<C: ConnectionTrait>(conn: &C, organization_id: Uuid, user_id: Uuid) -> AppResult<bool> {
    let found = organization_member::Entity::find_by_id((organization_id, user_id))
        .one(conn)
        .await?;
    Ok(found.is_some())
}

pub async fn passenger_count<C: ConnectionTrait>(conn: &C, ride_id: Uuid) -> AppResult<u64> {
    let count = ride_passenger::Entity::find()
        .filter(ride_passenger::Column::RideId.eq(ride_id))
        .count(conn)
        .await?;
    Ok(count)
}

pub async fn is_passenger<C: ConnectionTrait>(conn: &C, ride_id: Uuid, user_id: Uuid) -> AppResult<bool> {
    let found = ride_passenger::Entity::find_by_id((ride_id, user_id))
        .one(conn)
        .await?;
    Ok(found.is_some())
}

/// A user is a driver as soon as they own a car.
pub async fn is_driver<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<bool> {
    let cars = car::Entity::find()
        .filter(car::Column::OwnerId.eq(user_id))
        .count(conn)
        .await?;
    Ok(cars > 0)
}

/// `SELECT ... FOR UPDATE` on the ride row. Every lifecycle mutation goes
/// through here first, so writes to one ride are serialized.
pub async fn lock_ride<C: ConnectionTrait>(conn: &C, ride_id: Uuid) -> AppResult<Option<ride::Model>> {
    let ride = ride::Entity::find_by_id(ride_id)
        .lock_exclusive()
        .one(conn)
        .await?;
    Ok(ride)
}

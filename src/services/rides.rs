use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::is_member;
use super::policy::{self, RideState};
use crate::entities::join_ride_request::{self, JoinStatus};
use crate::entities::{car, organization, ride, ride_passenger, user};
use crate::error::{AppError, AppResult, DomainError};
use crate::utils::geo::sort_by_distance;

pub struct NewRide {
    pub organization_id: Uuid,
    pub car_id: Uuid,
    pub stop_latitude: f64,
    pub stop_longitude: f64,
    pub stop_address: Option<String>,
    pub start_time: DateTime<FixedOffset>,
    pub total_seats: i32,
    pub price: f64,
    pub description: Option<String>,
}

/// A ride with everything a client needs to render it.
#[derive(Debug, Clone)]
pub struct RideDetails {
    pub ride: ride::Model,
    pub state: RideState,
    pub free_seats: i32,
    pub host: Option<user::Model>,
    pub car: Option<car::Model>,
    pub organization: Option<organization::Model>,
    pub passengers: Vec<user::Model>,
}

pub async fn create_ride(db: &DatabaseConnection, host_id: Uuid, payload: NewRide) -> AppResult<ride::Model> {
    if !is_member(db, payload.organization_id, host_id).await? {
        return Err(DomainError::NotInOrganization.into());
    }

    let car = car::Entity::find_by_id(payload.car_id).one(db).await?;
    if car.is_none_or(|c| c.owner_id != host_id) {
        return Err(DomainError::NotCarOwner.into());
    }

    let ride = ride::ActiveModel {
        id: Set(Uuid::new_v4()),
        host_id: Set(host_id),
        organization_id: Set(payload.organization_id),
        car_id: Set(payload.car_id),
        stop_latitude: Set(payload.stop_latitude),
        stop_longitude: Set(payload.stop_longitude),
        stop_address: Set(payload.stop_address),
        start_time: Set(payload.start_time),
        total_seats: Set(payload.total_seats),
        price: Set(payload.price),
        description: Set(payload.description),
        is_active: Set(true),
        finished_at: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    tracing::info!(
        ride_id = %ride.id,
        host_id = %host_id,
        organization_id = %ride.organization_id,
        seats = ride.total_seats,
        "Ride created"
    );
    Ok(ride)
}

async fn users_by_id<C: ConnectionTrait>(conn: &C, ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, user::Model>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

/// Batch-load hosts, cars, organizations and passengers for `rides`,
/// keeping the input order.
pub async fn load_details<C: ConnectionTrait>(conn: &C, rides: Vec<ride::Model>) -> AppResult<Vec<RideDetails>> {
    if rides.is_empty() {
        return Ok(Vec::new());
    }

    let ride_ids: Vec<Uuid> = rides.iter().map(|r| r.id).collect();
    let car_ids: Vec<Uuid> = rides.iter().map(|r| r.car_id).collect();
    let org_ids: Vec<Uuid> = rides.iter().map(|r| r.organization_id).collect();

    let links = ride_passenger::Entity::find()
        .filter(ride_passenger::Column::RideId.is_in(ride_ids))
        .order_by_asc(ride_passenger::Column::JoinedAt)
        .all(conn)
        .await?;

    let mut user_ids: Vec<Uuid> = rides.iter().map(|r| r.host_id).collect();
    user_ids.extend(links.iter().map(|l| l.user_id));
    user_ids.sort();
    user_ids.dedup();
    let users = users_by_id(conn, user_ids).await?;

    let cars: HashMap<Uuid, car::Model> = car::Entity::find()
        .filter(car::Column::Id.is_in(car_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let orgs: HashMap<Uuid, organization::Model> = organization::Entity::find()
        .filter(organization::Column::Id.is_in(org_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|o| (o.id, o))
        .collect();

    let mut passengers: HashMap<Uuid, Vec<user::Model>> = HashMap::new();
    for link in &links {
        if let Some(u) = users.get(&link.user_id) {
            passengers.entry(link.ride_id).or_default().push(u.clone());
        }
    }

    Ok(rides
        .into_iter()
        .map(|ride| {
            let riders = passengers.remove(&ride.id).unwrap_or_default();
            RideDetails {
                state: policy::ride_state(&ride),
                free_seats: policy::free_seats(ride.total_seats, riders.len() as u64),
                host: users.get(&ride.host_id).cloned(),
                car: cars.get(&ride.car_id).cloned(),
                organization: orgs.get(&ride.organization_id).cloned(),
                passengers: riders,
                ride,
            }
        })
        .collect())
}

pub async fn find_ride<C: ConnectionTrait>(conn: &C, ride_id: Uuid) -> AppResult<ride::Model> {
    ride::Entity::find_by_id(ride_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))
}

pub async fn ride_details(db: &DatabaseConnection, ride_id: Uuid) -> AppResult<RideDetails> {
    let ride = find_ride(db, ride_id).await?;
    load_details(db, vec![ride])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))
}

/// Active rides of the organization, nearest destination first.
pub async fn match_rides(
    db: &DatabaseConnection,
    user_id: Uuid,
    organization_id: Uuid,
    latitude: f64,
    longitude: f64,
    limit: u64,
) -> AppResult<Vec<(RideDetails, f64)>> {
    let org = organization::Entity::find_by_id(organization_id)
        .one(db)
        .await?
        .ok_or(DomainError::InsufficientPermissions)?;
    if !is_member(db, org.id, user_id).await? {
        return Err(DomainError::NotInOrganization.into());
    }

    let rides = ride::Entity::find()
        .filter(ride::Column::OrganizationId.eq(org.id))
        .filter(ride::Column::IsActive.eq(true))
        .all(db)
        .await?;

    let mut ranked = sort_by_distance(rides, latitude, longitude, |r| (r.stop_latitude, r.stop_longitude));
    ranked.truncate(limit as usize);

    let distances: Vec<f64> = ranked.iter().map(|(_, d)| *d).collect();
    let details = load_details(db, ranked.into_iter().map(|(r, _)| r).collect()).await?;

    tracing::debug!(organization_id = %org.id, user_id = %user_id, found = details.len(), "Rides matched");
    Ok(details.into_iter().zip(distances).collect())
}

/// Rides the user hosts or rides in, active first, newest start first.
pub async fn my_rides(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<RideDetails>> {
    let joined: Vec<Uuid> = ride_passenger::Entity::find()
        .filter(ride_passenger::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|p| p.ride_id)
        .collect();

    let mut condition = Condition::any().add(ride::Column::HostId.eq(user_id));
    if !joined.is_empty() {
        condition = condition.add(ride::Column::Id.is_in(joined));
    }

    let rides = ride::Entity::find()
        .filter(condition)
        .order_by_desc(ride::Column::IsActive)
        .order_by_desc(ride::Column::StartTime)
        .all(db)
        .await?;

    load_details(db, rides).await
}

pub async fn passengers(db: &DatabaseConnection, ride_id: Uuid) -> AppResult<Vec<user::Model>> {
    let ride = find_ride(db, ride_id).await?;
    let ids: Vec<Uuid> = ride_passenger::Entity::find()
        .filter(ride_passenger::Column::RideId.eq(ride.id))
        .order_by_asc(ride_passenger::Column::JoinedAt)
        .all(db)
        .await?
        .into_iter()
        .map(|p| p.user_id)
        .collect();

    let mut users = users_by_id(db, ids.clone()).await?;
    Ok(ids.into_iter().filter_map(|id| users.remove(&id)).collect())
}

/// Pending requests on a ride, visible to its host only.
pub async fn ride_requests(
    db: &DatabaseConnection,
    actor_id: Uuid,
    ride_id: Uuid,
) -> AppResult<Vec<(join_ride_request::Model, Option<user::Model>)>> {
    let ride = find_ride(db, ride_id).await?;
    if !policy::is_host(&ride, actor_id) {
        return Err(DomainError::InsufficientPermissions.into());
    }

    let requests = join_ride_request::Entity::find()
        .filter(join_ride_request::Column::RideId.eq(ride.id))
        .filter(join_ride_request::Column::Status.eq(JoinStatus::NoAnswer))
        .order_by_asc(join_ride_request::Column::CreatedAt)
        .find_also_related(user::Entity)
        .all(db)
        .await?;
    Ok(requests)
}

pub async fn my_requests(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> AppResult<Vec<(join_ride_request::Model, Option<ride::Model>)>> {
    let requests = join_ride_request::Entity::find()
        .filter(join_ride_request::Column::UserId.eq(user_id))
        .order_by_desc(join_ride_request::Column::CreatedAt)
        .find_also_related(ride::Entity)
        .all(db)
        .await?;
    Ok(requests)
}


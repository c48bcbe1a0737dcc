//! Join requests and ride transitions.
//!
//! Each operation is a single transaction that starts by locking the ride
//! row. Capacity is recounted from `ride_passenger` after the lock, so two
//! hosts' clicks on the last seat cannot both succeed.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::policy::{self, Decision, RideState};
use super::{is_member, lock_ride, passenger_count};
use crate::entities::join_ride_request::{self, JoinStatus};
use crate::entities::{ride, ride_passenger};
use crate::error::{AppError, AppResult, DomainError, is_unique_violation};

pub const FINISHED_REASON: &str = "Ride finished";
pub const CANCELLED_REASON: &str = "Ride cancelled by host";

async fn find_request<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    ride_id: Uuid,
) -> AppResult<Option<join_ride_request::Model>> {
    let request = join_ride_request::Entity::find()
        .filter(join_ride_request::Column::UserId.eq(user_id))
        .filter(join_ride_request::Column::RideId.eq(ride_id))
        .one(conn)
        .await?;
    Ok(request)
}

/// Store a pending request. A concurrent request for the same (user, ride)
/// that commits first surfaces here as `RequestAlreadySent`.
pub async fn insert_request<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    ride_id: Uuid,
) -> AppResult<join_ride_request::Model> {
    join_ride_request::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        ride_id: Set(ride_id),
        status: Set(JoinStatus::NoAnswer),
        decline_reason: Set(None),
        created_at: Set(Utc::now().into()),
        decided_at: Set(None),
    }
    .insert(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::from(DomainError::RequestAlreadySent)
        } else {
            AppError::from(e)
        }
    })
}

pub async fn request_to_join(
    db: &DatabaseConnection,
    user_id: Uuid,
    ride_id: Uuid,
) -> AppResult<join_ride_request::Model> {
    let txn = db.begin().await?;

    let ride = lock_ride(&txn, ride_id)
        .await?
        .ok_or(DomainError::RideNotActive)?;
    let member = is_member(&txn, ride.organization_id, user_id).await?;
    let passengers = passenger_count(&txn, ride.id).await?;
    policy::check_join(user_id, &ride, member, passengers)?;

    if find_request(&txn, user_id, ride.id).await?.is_some() {
        return Err(DomainError::RequestAlreadySent.into());
    }

    let request = insert_request(&txn, user_id, ride.id).await?;

    txn.commit().await?;

    tracing::info!(ride_id = %ride.id, user_id = %user_id, "Join request created");
    Ok(request)
}

/// Host answers a (user, ride) request. Returns the updated request.
pub async fn decide_request(
    db: &DatabaseConnection,
    actor_id: Uuid,
    ride_id: Uuid,
    user_id: Uuid,
    decision: Decision,
    reason: Option<String>,
) -> AppResult<join_ride_request::Model> {
    let txn = db.begin().await?;

    let ride = lock_ride(&txn, ride_id)
        .await?
        .ok_or(DomainError::InsufficientPermissions)?;
    let request = find_request(&txn, user_id, ride.id).await?;
    let passengers = passenger_count(&txn, ride.id).await?;
    let status = policy::check_decision(actor_id, &ride, request.as_ref(), decision, passengers)?;
    let request = request.ok_or(DomainError::InsufficientPermissions)?;

    let mut active: join_ride_request::ActiveModel = request.into();
    active.status = Set(status);
    active.decided_at = Set(Some(Utc::now().into()));
    if status == JoinStatus::Declined {
        active.decline_reason = Set(reason);
    }
    let updated = active.update(&txn).await?;

    if status == JoinStatus::Accepted {
        ride_passenger::ActiveModel {
            ride_id: Set(ride.id),
            user_id: Set(user_id),
            joined_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    tracing::info!(
        ride_id = %ride.id,
        user_id = %user_id,
        status = ?status,
        "Join request decided"
    );
    Ok(updated)
}

/// Decline every request the closing transition touches.
async fn force_decline<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    state_after: RideState,
    reason: &str,
) -> AppResult<usize> {
    let requests = join_ride_request::Entity::find()
        .filter(join_ride_request::Column::RideId.eq(ride_id))
        .all(conn)
        .await?;

    let now = Utc::now();
    let mut declined = 0;
    for request in requests {
        let Some(status) = policy::forced_status(state_after, request.status) else {
            continue;
        };
        let mut active: join_ride_request::ActiveModel = request.into();
        active.status = Set(status);
        active.decline_reason = Set(Some(reason.to_string()));
        active.decided_at = Set(Some(now.into()));
        active.update(conn).await?;
        declined += 1;
    }

    Ok(declined)
}

pub async fn finish_ride(db: &DatabaseConnection, actor_id: Uuid, ride_id: Uuid) -> AppResult<ride::Model> {
    let txn = db.begin().await?;

    let ride = lock_ride(&txn, ride_id)
        .await?
        .ok_or(DomainError::InsufficientPermissions)?;
    policy::check_close(actor_id, &ride)?;

    let mut active: ride::ActiveModel = ride.into();
    active.is_active = Set(false);
    active.finished_at = Set(Some(Utc::now().into()));
    let ride = active.update(&txn).await?;

    let declined = force_decline(&txn, ride.id, RideState::Finished, FINISHED_REASON).await?;

    txn.commit().await?;

    tracing::info!(ride_id = %ride.id, declined, "Ride finished");
    Ok(ride)
}

pub async fn cancel_ride(db: &DatabaseConnection, actor_id: Uuid, ride_id: Uuid) -> AppResult<ride::Model> {
    let txn = db.begin().await?;

    let ride = lock_ride(&txn, ride_id)
        .await?
        .ok_or(DomainError::InsufficientPermissions)?;
    policy::check_close(actor_id, &ride)?;

    let mut active: ride::ActiveModel = ride.into();
    active.is_active = Set(false);
    let ride = active.update(&txn).await?;

    let removed = ride_passenger::Entity::delete_many()
        .filter(ride_passenger::Column::RideId.eq(ride.id))
        .exec(&txn)
        .await?
        .rows_affected;
    let declined = force_decline(&txn, ride.id, RideState::Cancelled, CANCELLED_REASON).await?;

    txn.commit().await?;

    tracing::info!(ride_id = %ride.id, removed, declined, "Ride cancelled");
    Ok(ride)
}

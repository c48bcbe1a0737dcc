//! Pure rules of the ride lifecycle.
//!
//! Nothing here touches the database. Services load the rows, call these
//! checks inside their transaction, and only then write.

use serde::Serialize;
use uuid::Uuid;

use crate::entities::join_ride_request::JoinStatus;
use crate::entities::{join_ride_request, organization, ride};
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideState {
    Active,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Decline,
}

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 10;

pub fn ride_state(ride: &ride::Model) -> RideState {
    match (ride.is_active, ride.finished_at) {
        (true, _) => RideState::Active,
        (false, Some(_)) => RideState::Finished,
        (false, None) => RideState::Cancelled,
    }
}

/// Seats are always derived from the passenger list, never stored.
pub fn free_seats(total_seats: i32, passengers: u64) -> i32 {
    total_seats - passengers as i32
}

pub fn is_host(ride: &ride::Model, user_id: Uuid) -> bool {
    ride.host_id == user_id
}

pub fn check_join(
    user_id: Uuid,
    ride: &ride::Model,
    is_member: bool,
    passengers: u64,
) -> Result<(), DomainError> {
    if is_host(ride, user_id) {
        return Err(DomainError::CreatorCannotJoin);
    }
    if !ride.is_active {
        return Err(DomainError::RideNotActive);
    }
    if !is_member {
        return Err(DomainError::NotInOrganization);
    }
    if free_seats(ride.total_seats, passengers) < 1 {
        return Err(DomainError::NoFreeSeats);
    }
    Ok(())
}

/// Validate a host decision and return the status the request moves to.
pub fn check_decision(
    actor_id: Uuid,
    ride: &ride::Model,
    request: Option<&join_ride_request::Model>,
    decision: Decision,
    passengers: u64,
) -> Result<JoinStatus, DomainError> {
    if !is_host(ride, actor_id) {
        return Err(DomainError::InsufficientPermissions);
    }
    let request = request.ok_or(DomainError::InsufficientPermissions)?;
    if request.status != JoinStatus::NoAnswer {
        return Err(DomainError::AlreadyDecided);
    }

    match decision {
        Decision::Accept => {
            if free_seats(ride.total_seats, passengers) < 1 {
                return Err(DomainError::NoFreeSeats);
            }
            Ok(JoinStatus::Accepted)
        }
        Decision::Decline => Ok(JoinStatus::Declined),
    }
}

/// Shared by finish and cancel.
pub fn check_close(actor_id: Uuid, ride: &ride::Model) -> Result<(), DomainError> {
    if !is_host(ride, actor_id) {
        return Err(DomainError::InsufficientPermissions);
    }
    if !ride.is_active {
        return Err(DomainError::RideNotActive);
    }
    Ok(())
}

/// Status a request ends with when the ride is finished or cancelled.
/// `None` means the request is left untouched.
pub fn forced_status(state_after: RideState, current: JoinStatus) -> Option<JoinStatus> {
    match (state_after, current) {
        (RideState::Finished, JoinStatus::NoAnswer) => Some(JoinStatus::Declined),
        (RideState::Cancelled, JoinStatus::Declined) => None,
        (RideState::Cancelled, _) => Some(JoinStatus::Declined),
        _ => None,
    }
}

pub fn check_ride_rating(
    voter_id: Uuid,
    ride: &ride::Model,
    was_passenger: bool,
    already_rated: bool,
) -> Result<(), DomainError> {
    if ride_state(ride) != RideState::Finished {
        return Err(DomainError::RideNotFinished);
    }
    if is_host(ride, voter_id) {
        return Err(DomainError::NotForOwner);
    }
    if !was_passenger {
        return Err(DomainError::NotInRide);
    }
    if already_rated {
        return Err(DomainError::FeedbackAlreadySent);
    }
    Ok(())
}

/// `voter_took_part` / `target_took_part`: host or passenger of the ride.
pub fn check_user_rating(
    voter_id: Uuid,
    target_id: Uuid,
    ride: &ride::Model,
    voter_took_part: bool,
    target_took_part: bool,
    already_rated: bool,
) -> Result<(), DomainError> {
    if ride_state(ride) != RideState::Finished {
        return Err(DomainError::RideNotFinished);
    }
    if voter_id == target_id {
        return Err(DomainError::NotForOwner);
    }
    if !voter_took_part || !target_took_part {
        return Err(DomainError::NotInRide);
    }
    if already_rated {
        return Err(DomainError::FeedbackAlreadySent);
    }
    Ok(())
}

/// `Ok(true)` when the user still has to be added, `Ok(false)` when already a member.
pub fn check_join_organization(
    org: &organization::Model,
    answer: &str,
    is_member: bool,
    memberships: u64,
    limit: u64,
) -> Result<bool, DomainError> {
    if org.control_answer != answer {
        return Err(DomainError::IncorrectControlAnswer);
    }
    if is_member {
        return Ok(false);
    }
    if memberships >= limit {
        return Err(DomainError::OrganizationLimit);
    }
    Ok(true)
}

pub fn check_leave_organization(
    user_id: Uuid,
    org: &organization::Model,
    is_member: bool,
) -> Result<(), DomainError> {
    if !is_member {
        return Err(DomainError::NotInOrganization);
    }
    if org.creator_id == user_id {
        return Err(DomainError::CreatorCannotLeave);
    }
    Ok(())
}

pub fn check_organization_owner(actor_id: Uuid, org: &organization::Model) -> Result<(), DomainError> {
    if org.creator_id != actor_id {
        return Err(DomainError::InsufficientPermissions);
    }
    Ok(())
}

pub fn average_rating<I>(ratings: I) -> Option<f64>
where
    I: IntoIterator<Item = i32>,
{
    let (sum, count) = ratings
        .into_iter()
        .fold((0i64, 0u32), |(sum, count), r| (sum + r as i64, count + 1));

    (count > 0).then(|| sum as f64 / count as f64)
}

/// Cheapest and most expensive price, `None` for an empty list.
pub fn price_range<I>(prices: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    prices.into_iter().fold(None, |acc, p| match acc {
        None => Some((p, p)),
        Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
    })
}

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use super::rides::find_ride;
use super::{is_passenger, policy};
use crate::entities::{ride, ride_feedback, user_feedback};
use crate::error::{AppError, AppResult, DomainError, is_unique_violation};

fn map_duplicate(e: sea_orm::DbErr) -> AppError {
    if is_unique_violation(&e) {
        DomainError::FeedbackAlreadySent.into()
    } else {
        e.into()
    }
}

fn check_rating_value(rating: i32) -> AppResult<()> {
    if !(policy::MIN_RATING..=policy::MAX_RATING).contains(&rating) {
        return Err(AppError::Validation(vec!["rating".to_string()]));
    }
    Ok(())
}

pub async fn insert_ride_feedback<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    voter_id: Uuid,
    rating: i32,
    text: Option<String>,
) -> AppResult<ride_feedback::Model> {
    ride_feedback::ActiveModel {
        id: Set(Uuid::new_v4()),
        ride_id: Set(ride_id),
        voter_id: Set(voter_id),
        rating: Set(rating),
        text: Set(text),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
    .map_err(map_duplicate)
}

pub async fn insert_user_feedback<C: ConnectionTrait>(
    conn: &C,
    ride_id: Uuid,
    voter_id: Uuid,
    target_id: Uuid,
    rating: i32,
    text: Option<String>,
) -> AppResult<user_feedback::Model> {
    user_feedback::ActiveModel {
        id: Set(Uuid::new_v4()),
        ride_id: Set(ride_id),
        voter_id: Set(voter_id),
        target_id: Set(target_id),
        rating: Set(rating),
        text: Set(text),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await
    .map_err(map_duplicate)
}

pub async fn rate_ride(
    db: &DatabaseConnection,
    voter_id: Uuid,
    ride_id: Uuid,
    rating: i32,
    text: Option<String>,
) -> AppResult<ride_feedback::Model> {
    check_rating_value(rating)?;
    let ride = find_ride(db, ride_id).await?;
    let was_passenger = is_passenger(db, ride.id, voter_id).await?;
    let already_rated = ride_feedback::Entity::find()
        .filter(ride_feedback::Column::RideId.eq(ride.id))
        .filter(ride_feedback::Column::VoterId.eq(voter_id))
        .one(db)
        .await?
        .is_some();
    policy::check_ride_rating(voter_id, &ride, was_passenger, already_rated)?;

    let feedback = insert_ride_feedback(db, ride.id, voter_id, rating, text).await?;

    tracing::info!(ride_id = %ride.id, voter_id = %voter_id, rating, "Ride rated");
    Ok(feedback)
}

pub async fn rate_user(
    db: &DatabaseConnection,
    voter_id: Uuid,
    target_id: Uuid,
    ride_id: Uuid,
    rating: i32,
    text: Option<String>,
) -> AppResult<user_feedback::Model> {
    check_rating_value(rating)?;
    let ride = find_ride(db, ride_id).await?;
    let voter_took_part = policy::is_host(&ride, voter_id) || is_passenger(db, ride.id, voter_id).await?;
    let target_took_part = policy::is_host(&ride, target_id) || is_passenger(db, ride.id, target_id).await?;
    let already_rated = user_feedback::Entity::find()
        .filter(user_feedback::Column::RideId.eq(ride.id))
        .filter(user_feedback::Column::VoterId.eq(voter_id))
        .filter(user_feedback::Column::TargetId.eq(target_id))
        .one(db)
        .await?
        .is_some();
    policy::check_user_rating(
        voter_id,
        target_id,
        &ride,
        voter_took_part,
        target_took_part,
        already_rated,
    )?;

    let feedback = insert_user_feedback(db, ride.id, voter_id, target_id, rating, text).await?;

    tracing::info!(ride_id = %ride.id, voter_id = %voter_id, target_id = %target_id, rating, "User rated");
    Ok(feedback)
}

/// Mean of feedback about the user plus feedback on rides they hosted.
pub async fn user_rating<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Option<f64>> {
    let personal = user_feedback::Entity::find()
        .filter(user_feedback::Column::TargetId.eq(user_id))
        .all(conn)
        .await?;

    let hosted: Vec<Uuid> = ride::Entity::find()
        .filter(ride::Column::HostId.eq(user_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();

    let on_rides = if hosted.is_empty() {
        Vec::new()
    } else {
        ride_feedback::Entity::find()
            .filter(ride_feedback::Column::RideId.is_in(hosted))
            .all(conn)
            .await?
    };

    Ok(policy::average_rating(
        personal
            .iter()
            .map(|f| f.rating)
            .chain(on_rides.iter().map(|f| f.rating)),
    ))
}

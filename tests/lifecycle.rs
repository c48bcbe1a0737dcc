mod common;

use carpool_backend::entities::join_ride_request::{self, JoinStatus};
use carpool_backend::error::{AppError, DomainError};
use carpool_backend::services::policy::{Decision, RideState};
use carpool_backend::services::{feedback, lifecycle, rides};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::{create_user, join, world};

fn domain(err: AppError) -> DomainError {
    match err {
        AppError::Domain(e) => e,
        other => panic!("expected a domain error, got {:?}", other),
    }
}

async fn requests_of(db: &DatabaseConnection, ride_id: Uuid) -> Vec<join_ride_request::Model> {
    join_ride_request::Entity::find()
        .filter(join_ride_request::Column::RideId.eq(ride_id))
        .all(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn join_accept_finish_and_rate() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;

    let request = lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();
    assert_eq!(request.status, JoinStatus::NoAnswer);
    assert_eq!(rides::ride_details(&w.db, ride.id).await.unwrap().free_seats, 3);

    let accepted = lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap();
    assert_eq!(accepted.status, JoinStatus::Accepted);
    assert!(accepted.decided_at.is_some());

    let details = rides::ride_details(&w.db, ride.id).await.unwrap();
    assert_eq!(details.free_seats, 2);
    assert_eq!(details.passengers.len(), 1);
    assert_eq!(details.passengers[0].id, w.member.id);

    let finished = lifecycle::finish_ride(&w.db, w.creator.id, ride.id).await.unwrap();
    assert!(!finished.is_active);
    assert!(finished.finished_at.is_some());

    let rating = feedback::rate_ride(&w.db, w.member.id, ride.id, 8, Some("good ride".to_string()))
        .await
        .unwrap();
    assert_eq!(rating.rating, 8);

    let again = feedback::rate_ride(&w.db, w.member.id, ride.id, 9, None).await.unwrap_err();
    assert_eq!(domain(again), DomainError::FeedbackAlreadySent);

    // The host's rating comes from feedback on rides they hosted
    let host_rating = feedback::user_rating(&w.db, w.creator.id).await.unwrap();
    assert_eq!(host_rating, Some(8.0));
}

#[tokio::test]
async fn second_request_for_same_ride_is_rejected() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;

    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();
    let err = lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap_err();

    assert_eq!(domain(err), DomainError::RequestAlreadySent);
    assert_eq!(requests_of(&w.db, ride.id).await.len(), 1);
}

#[tokio::test]
async fn host_cannot_join_own_ride() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;

    let err = lifecycle::request_to_join(&w.db, w.creator.id, ride.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::CreatorCannotJoin);
}

#[tokio::test]
async fn outsiders_cannot_join() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;
    let outsider = create_user(&w.db, "Olga").await;

    let err = lifecycle::request_to_join(&w.db, outsider.id, ride.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::NotInOrganization);
}

#[tokio::test]
async fn full_ride_rejects_new_requests() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 1).await;

    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();
    lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap();

    let late = create_user(&w.db, "Lena").await;
    join(&w.db, &late, &w.org).await;
    let err = lifecycle::request_to_join(&w.db, late.id, ride.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::NoFreeSeats);
}

#[tokio::test]
async fn accepting_without_free_seats_leaves_request_pending() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 1).await;
    let second = create_user(&w.db, "Sasha").await;
    join(&w.db, &second, &w.org).await;

    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();
    lifecycle::request_to_join(&w.db, second.id, ride.id).await.unwrap();
    lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap();

    let err = lifecycle::decide_request(&w.db, w.creator.id, ride.id, second.id, Decision::Accept, None)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::NoFreeSeats);

    let pending = rides::ride_requests(&w.db, w.creator.id, ride.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0.user_id, second.id);
    assert_eq!(pending[0].0.status, JoinStatus::NoAnswer);
    assert_eq!(rides::ride_details(&w.db, ride.id).await.unwrap().free_seats, 0);
}

#[tokio::test]
async fn only_the_host_decides() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;
    let other = create_user(&w.db, "Ivan").await;
    join(&w.db, &other, &w.org).await;

    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();

    for decision in [Decision::Accept, Decision::Decline] {
        let err = lifecycle::decide_request(&w.db, other.id, ride.id, w.member.id, decision, None)
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::InsufficientPermissions);
    }

    // Still forbidden once the request has been decided
    lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Decline, None)
        .await
        .unwrap();
    let err = lifecycle::decide_request(&w.db, other.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::InsufficientPermissions);
}

#[tokio::test]
async fn decided_requests_cannot_be_decided_again() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;

    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();
    let declined = lifecycle::decide_request(
        &w.db,
        w.creator.id,
        ride.id,
        w.member.id,
        Decision::Decline,
        Some("No pets".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(declined.status, JoinStatus::Declined);
    assert_eq!(declined.decline_reason.as_deref(), Some("No pets"));

    let err = lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::AlreadyDecided);
}

#[tokio::test]
async fn cancel_clears_passengers_and_declines_every_request() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;
    let waiting = create_user(&w.db, "Pavel").await;
    join(&w.db, &waiting, &w.org).await;

    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();
    lifecycle::request_to_join(&w.db, waiting.id, ride.id).await.unwrap();
    lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap();

    let cancelled = lifecycle::cancel_ride(&w.db, w.creator.id, ride.id).await.unwrap();
    assert!(!cancelled.is_active);
    assert!(cancelled.finished_at.is_none());

    let details = rides::ride_details(&w.db, ride.id).await.unwrap();
    assert_eq!(details.state, RideState::Cancelled);
    assert!(details.passengers.is_empty());
    assert_eq!(details.free_seats, 3);

    let requests = requests_of(&w.db, ride.id).await;
    assert_eq!(requests.len(), 2);
    for request in requests {
        assert_eq!(request.status, JoinStatus::Declined);
        assert_eq!(request.decline_reason.as_deref(), Some(lifecycle::CANCELLED_REASON));
    }
}

#[tokio::test]
async fn finish_declines_only_pending_requests() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;
    let waiting = create_user(&w.db, "Pavel").await;
    join(&w.db, &waiting, &w.org).await;

    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();
    lifecycle::request_to_join(&w.db, waiting.id, ride.id).await.unwrap();
    lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap();

    lifecycle::finish_ride(&w.db, w.creator.id, ride.id).await.unwrap();

    let details = rides::ride_details(&w.db, ride.id).await.unwrap();
    assert_eq!(details.state, RideState::Finished);
    assert_eq!(details.passengers.len(), 1);

    for request in requests_of(&w.db, ride.id).await {
        if request.user_id == w.member.id {
            assert_eq!(request.status, JoinStatus::Accepted);
            assert!(request.decline_reason.is_none());
        } else {
            assert_eq!(request.status, JoinStatus::Declined);
            assert_eq!(request.decline_reason.as_deref(), Some(lifecycle::FINISHED_REASON));
        }
    }
}

#[tokio::test]
async fn closed_rides_stay_closed() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;

    let err = lifecycle::finish_ride(&w.db, w.member.id, ride.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::InsufficientPermissions);

    lifecycle::cancel_ride(&w.db, w.creator.id, ride.id).await.unwrap();

    let err = lifecycle::finish_ride(&w.db, w.creator.id, ride.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::RideNotActive);
    let err = lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::RideNotActive);
}

#[tokio::test]
async fn rating_rules() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;
    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();
    lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap();

    let err = feedback::rate_ride(&w.db, w.member.id, ride.id, 7, None).await.unwrap_err();
    assert_eq!(domain(err), DomainError::RideNotFinished);

    lifecycle::finish_ride(&w.db, w.creator.id, ride.id).await.unwrap();

    let err = feedback::rate_ride(&w.db, w.creator.id, ride.id, 10, None).await.unwrap_err();
    assert_eq!(domain(err), DomainError::NotForOwner);

    let stranger = create_user(&w.db, "Gleb").await;
    let err = feedback::rate_ride(&w.db, stranger.id, ride.id, 5, None).await.unwrap_err();
    assert_eq!(domain(err), DomainError::NotInRide);

    let err = feedback::rate_ride(&w.db, w.member.id, ride.id, 11, None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(fields) if fields == vec!["rating".to_string()]));

    // Host and passenger rate each other once
    feedback::rate_user(&w.db, w.creator.id, w.member.id, ride.id, 6, None).await.unwrap();
    let err = feedback::rate_user(&w.db, w.creator.id, w.member.id, ride.id, 6, None)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::FeedbackAlreadySent);

    let err = feedback::rate_user(&w.db, w.member.id, w.member.id, ride.id, 6, None)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::NotForOwner);

    let err = feedback::rate_user(&w.db, w.member.id, stranger.id, ride.id, 6, None)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::NotInRide);

    assert_eq!(feedback::user_rating(&w.db, w.member.id).await.unwrap(), Some(6.0));
    assert_eq!(feedback::user_rating(&w.db, stranger.id).await.unwrap(), None);
}

#[tokio::test]
async fn match_orders_by_distance() {
    let w = world().await;
    let far = common::create_ride_at(&w.db, &w.creator, &w.org, &w.car, 3, (59.93, 30.31)).await;
    let near = common::create_ride_at(&w.db, &w.creator, &w.org, &w.car, 3, (55.76, 37.62)).await;
    let closed = common::create_ride_at(&w.db, &w.creator, &w.org, &w.car, 3, (55.75, 37.61)).await;
    lifecycle::cancel_ride(&w.db, w.creator.id, closed.id).await.unwrap();

    let matched = rides::match_rides(&w.db, w.member.id, w.org.id, 55.7558, 37.6173, 50)
        .await
        .unwrap();
    let ids: Vec<Uuid> = matched.iter().map(|(d, _)| d.ride.id).collect();
    assert_eq!(ids, vec![near.id, far.id]);
    assert!(matched[0].1 < 1.0);
    assert!(matched[1].1 > 600.0);

    let outsider = create_user(&w.db, "Olga").await;
    let err = rides::match_rides(&w.db, outsider.id, w.org.id, 55.0, 37.0, 50)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::NotInOrganization);

    let err = rides::match_rides(&w.db, w.member.id, Uuid::new_v4(), 55.0, 37.0, 50)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::InsufficientPermissions);
}

#[tokio::test]
async fn rides_need_membership_and_own_car() {
    let w = world().await;
    let outsider = create_user(&w.db, "Olga").await;
    let outsider_car = common::create_car(&w.db, &outsider).await;

    let err = rides::create_ride(
        &w.db,
        outsider.id,
        rides::NewRide {
            organization_id: w.org.id,
            car_id: outsider_car.id,
            stop_latitude: 55.0,
            stop_longitude: 37.0,
            stop_address: None,
            start_time: chrono::Utc::now().fixed_offset(),
            total_seats: 2,
            price: 0.0,
            description: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(domain(err), DomainError::NotInOrganization);

    let err = rides::create_ride(
        &w.db,
        w.member.id,
        rides::NewRide {
            organization_id: w.org.id,
            car_id: w.car.id,
            stop_latitude: 55.0,
            stop_longitude: 37.0,
            stop_address: None,
            start_time: chrono::Utc::now().fixed_offset(),
            total_seats: 2,
            price: 0.0,
            description: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(domain(err), DomainError::NotCarOwner);
}

#[tokio::test]
async fn my_rides_lists_hosted_and_joined() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;
    lifecycle::request_to_join(&w.db, w.member.id, ride.id).await.unwrap();

    assert!(rides::my_rides(&w.db, w.member.id).await.unwrap().is_empty());
    assert_eq!(rides::my_requests(&w.db, w.member.id).await.unwrap().len(), 1);

    lifecycle::decide_request(&w.db, w.creator.id, ride.id, w.member.id, Decision::Accept, None)
        .await
        .unwrap();

    let hosted = rides::my_rides(&w.db, w.creator.id).await.unwrap();
    let joined = rides::my_rides(&w.db, w.member.id).await.unwrap();
    assert_eq!(hosted.len(), 1);
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].ride.id, ride.id);

    let err = rides::ride_requests(&w.db, w.member.id, ride.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::InsufficientPermissions);
}

#[tokio::test]
async fn racing_duplicate_request_is_request_already_sent() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;

    // The row a concurrent request committed first
    lifecycle::insert_request(&w.db, w.member.id, ride.id).await.unwrap();

    let err = lifecycle::insert_request(&w.db, w.member.id, ride.id)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::RequestAlreadySent);
    assert_eq!(requests_of(&w.db, ride.id).await.len(), 1);
}

#[tokio::test]
async fn racing_duplicate_feedback_is_feedback_already_sent() {
    let w = world().await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 3).await;

    feedback::insert_ride_feedback(&w.db, ride.id, w.member.id, 7, None)
        .await
        .unwrap();
    let err = feedback::insert_ride_feedback(&w.db, ride.id, w.member.id, 9, None)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::FeedbackAlreadySent);

    feedback::insert_user_feedback(&w.db, ride.id, w.member.id, w.creator.id, 7, None)
        .await
        .unwrap();
    let err = feedback::insert_user_feedback(&w.db, ride.id, w.member.id, w.creator.id, 3, None)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::FeedbackAlreadySent);

    // A different target on the same ride is a separate rating
    feedback::insert_user_feedback(&w.db, ride.id, w.creator.id, w.member.id, 9, None)
        .await
        .unwrap();
}

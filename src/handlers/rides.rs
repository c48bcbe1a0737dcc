use axum::{Extension, Json, extract::State};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::cars::CarResponse;
use super::extract::{AppPath, ValidJson, ValidQuery};
use super::users::{FeedbackResponse, UserSummary};
use crate::AppState;
use crate::entities::join_ride_request::{self, JoinStatus};
use crate::entities::ride;
use crate::error::AppResult;
use crate::services::policy::{Decision, RideState};
use crate::services::{feedback, lifecycle, rides};
use crate::utils::jwt::Claims;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationBrief {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideResponse {
    pub id: Uuid,
    pub state: RideState,
    pub is_active: bool,
    pub host: Option<UserSummary>,
    pub organization: Option<OrganizationBrief>,
    pub car: Option<CarResponse>,
    pub stop_latitude: f64,
    pub stop_longitude: f64,
    pub stop_address: Option<String>,
    pub start_time: DateTime<FixedOffset>,
    pub total_seats: i32,
    pub free_seats: i32,
    pub price: f64,
    pub description: Option<String>,
    pub passengers: Vec<UserSummary>,
    pub finished_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<rides::RideDetails> for RideResponse {
    fn from(details: rides::RideDetails) -> Self {
        let ride = details.ride;
        Self {
            id: ride.id,
            state: details.state,
            is_active: ride.is_active,
            host: details.host.map(UserSummary::from),
            organization: details.organization.map(|o| OrganizationBrief { id: o.id, name: o.name }),
            car: details.car.map(CarResponse::from),
            stop_latitude: ride.stop_latitude,
            stop_longitude: ride.stop_longitude,
            stop_address: ride.stop_address,
            start_time: ride.start_time,
            total_seats: ride.total_seats,
            free_seats: details.free_seats,
            price: ride.price,
            description: ride.description,
            passengers: details.passengers.into_iter().map(UserSummary::from).collect(),
            finished_at: ride.finished_at,
            created_at: ride.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRideResponse {
    #[serde(flatten)]
    pub ride: RideResponse,
    /// Kilometers between the ride's stop and the requested destination
    pub distance: f64,
}

/// Ride fields shown next to a join request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideBrief {
    pub id: Uuid,
    pub host_id: Uuid,
    pub organization_id: Uuid,
    pub stop_address: Option<String>,
    pub start_time: DateTime<FixedOffset>,
    pub is_active: bool,
}

impl From<ride::Model> for RideBrief {
    fn from(ride: ride::Model) -> Self {
        Self {
            id: ride.id,
            host_id: ride.host_id,
            organization_id: ride.organization_id,
            stop_address: ride.stop_address,
            start_time: ride.start_time,
            is_active: ride.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ride_id: Uuid,
    pub status: JoinStatus,
    pub decline_reason: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub decided_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride: Option<RideBrief>,
}

impl From<join_ride_request::Model> for JoinRequestResponse {
    fn from(request: join_ride_request::Model) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            ride_id: request.ride_id,
            status: request.status,
            decline_reason: request.decline_reason,
            created_at: request.created_at,
            decided_at: request.decided_at,
            user: None,
            ride: None,
        }
    }
}

fn not_in_past(start_time: &DateTime<FixedOffset>) -> Result<(), ValidationError> {
    if *start_time < Utc::now() {
        return Err(ValidationError::new("past"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRideRequest {
    pub organization_id: Uuid,
    pub car_id: Uuid,
    #[validate(range(min = -90.0, max = 90.0))]
    pub stop_latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub stop_longitude: f64,
    #[validate(length(max = 200))]
    pub stop_address: Option<String>,
    #[validate(custom(function = "not_in_past"))]
    pub start_time: DateTime<FixedOffset>,
    #[validate(range(min = 1, max = 50))]
    pub total_seats: i32,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchRidesQuery {
    pub organization_id: Uuid,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RideIdRequest {
    pub ride_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub ride_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RateRideRequest {
    pub ride_id: Uuid,
    pub rating: i32,
    #[validate(length(max = 1000))]
    pub text: Option<String>,
}

pub async fn create_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<CreateRideRequest>,
) -> AppResult<Json<RideResponse>> {
    let ride = rides::create_ride(
        &state.db,
        claims.sub,
        rides::NewRide {
            organization_id: payload.organization_id,
            car_id: payload.car_id,
            stop_latitude: payload.stop_latitude,
            stop_longitude: payload.stop_longitude,
            stop_address: payload.stop_address,
            start_time: payload.start_time,
            total_seats: payload.total_seats,
            price: payload.price,
            description: payload.description,
        },
    )
    .await?;

    let details = rides::ride_details(&state.db, ride.id).await?;
    Ok(Json(details.into()))
}

/// Active rides of an organization, nearest destination first
pub async fn match_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidQuery(query): ValidQuery<MatchRidesQuery>,
) -> AppResult<Json<Vec<MatchedRideResponse>>> {
    let matched = rides::match_rides(
        &state.db,
        claims.sub,
        query.organization_id,
        query.latitude,
        query.longitude,
        state.config.match_limit,
    )
    .await?;

    Ok(Json(
        matched
            .into_iter()
            .map(|(details, distance)| MatchedRideResponse {
                ride: details.into(),
                distance,
            })
            .collect(),
    ))
}

pub async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<RideResponse>>> {
    let rides = rides::my_rides(&state.db, claims.sub).await?;
    Ok(Json(rides.into_iter().map(RideResponse::from).collect()))
}

pub async fn get_ride(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<RideResponse>> {
    let details = rides::ride_details(&state.db, id).await?;
    Ok(Json(details.into()))
}

pub async fn ride_passengers(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = rides::passengers(&state.db, id).await?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect()))
}

/// Pending join requests, host only
pub async fn ride_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<JoinRequestResponse>>> {
    let requests = rides::ride_requests(&state.db, claims.sub, id).await?;

    Ok(Json(
        requests
            .into_iter()
            .map(|(request, requester)| JoinRequestResponse {
                user: requester.map(UserSummary::from),
                ..request.into()
            })
            .collect(),
    ))
}

pub async fn my_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<JoinRequestResponse>>> {
    let requests = rides::my_requests(&state.db, claims.sub).await?;

    Ok(Json(
        requests
            .into_iter()
            .map(|(request, ride)| JoinRequestResponse {
                ride: ride.map(RideBrief::from),
                ..request.into()
            })
            .collect(),
    ))
}

pub async fn join_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<RideIdRequest>,
) -> AppResult<Json<JoinRequestResponse>> {
    let request = lifecycle::request_to_join(&state.db, claims.sub, payload.ride_id).await?;
    Ok(Json(request.into()))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<DecisionRequest>,
) -> AppResult<Json<JoinRequestResponse>> {
    let request = lifecycle::decide_request(
        &state.db,
        claims.sub,
        payload.ride_id,
        payload.user_id,
        Decision::Accept,
        None,
    )
    .await?;
    Ok(Json(request.into()))
}

pub async fn decline_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<DecisionRequest>,
) -> AppResult<Json<JoinRequestResponse>> {
    let request = lifecycle::decide_request(
        &state.db,
        claims.sub,
        payload.ride_id,
        payload.user_id,
        Decision::Decline,
        payload.reason,
    )
    .await?;
    Ok(Json(request.into()))
}

pub async fn finish_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<RideIdRequest>,
) -> AppResult<Json<RideResponse>> {
    let ride = lifecycle::finish_ride(&state.db, claims.sub, payload.ride_id).await?;
    let details = rides::ride_details(&state.db, ride.id).await?;
    Ok(Json(details.into()))
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<RideIdRequest>,
) -> AppResult<Json<RideResponse>> {
    let ride = lifecycle::cancel_ride(&state.db, claims.sub, payload.ride_id).await?;
    let details = rides::ride_details(&state.db, ride.id).await?;
    Ok(Json(details.into()))
}

pub async fn rate_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<RateRideRequest>,
) -> AppResult<Json<FeedbackResponse>> {
    let feedback = feedback::rate_ride(
        &state.db,
        claims.sub,
        payload.ride_id,
        payload.rating,
        payload.text,
    )
    .await?;
    Ok(Json(feedback.into()))
}

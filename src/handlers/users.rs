use axum::{Extension, Json, extract::State};
use chrono::{DateTime, FixedOffset};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::extract::{AppPath, ValidJson};
use crate::AppState;
use crate::entities::{ride_feedback, user, user_feedback};
use crate::error::AppResult;
use crate::services::{self, accounts, feedback};
use crate::utils::jwt::Claims;
use crate::utils::validation::validate_phone;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub photo_url: Option<String>,
    pub about: Option<String>,
    pub rating: Option<f64>,
    pub is_driver: bool,
    pub created_at: DateTime<FixedOffset>,
}

/// Short form used inside ride and organization payloads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub photo_url: Option<String>,
}

impl From<user::Model> for UserSummary {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            photo_url: user.photo_url,
        }
    }
}

pub async fn user_response(db: &DatabaseConnection, user: user::Model) -> AppResult<UserResponse> {
    let rating = feedback::user_rating(db, user.id).await?;
    let is_driver = services::is_driver(db, user.id).await?;

    Ok(UserResponse {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        phone_number: user.phone_number,
        photo_url: user.photo_url,
        about: user.about,
        rating,
        is_driver,
        created_at: user.created_at,
    })
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 40))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 40))]
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone_number: Option<String>,
    #[validate(url)]
    pub photo_url: Option<String>,
    #[validate(length(max = 500))]
    pub about: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatusResponse {
    pub is_driver: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub voter_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<Uuid>,
    pub rating: i32,
    pub text: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<ride_feedback::Model> for FeedbackResponse {
    fn from(f: ride_feedback::Model) -> Self {
        Self {
            id: f.id,
            ride_id: f.ride_id,
            voter_id: f.voter_id,
            target_id: None,
            rating: f.rating,
            text: f.text,
            created_at: f.created_at,
        }
    }
}

impl From<user_feedback::Model> for FeedbackResponse {
    fn from(f: user_feedback::Model) -> Self {
        Self {
            id: f.id,
            ride_id: f.ride_id,
            voter_id: f.voter_id,
            target_id: Some(f.target_id),
            rating: f.rating,
            text: f.text,
            created_at: f.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RateUserRequest {
    pub user_id: Uuid,
    pub ride_id: Uuid,
    pub rating: i32,
    #[validate(length(max = 1000))]
    pub text: Option<String>,
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<UserResponse>> {
    let user = accounts::find_user(&state.db, claims.sub).await?;
    Ok(Json(user_response(&state.db, user).await?))
}

pub async fn user_info(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = accounts::find_user(&state.db, user_id).await?;
    Ok(Json(user_response(&state.db, user).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = accounts::update_profile(
        &state.db,
        claims.sub,
        accounts::ProfileChanges {
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone_number: payload.phone_number,
            photo_url: payload.photo_url,
            about: payload.about,
        },
    )
    .await?;

    Ok(Json(user_response(&state.db, user).await?))
}

pub async fn am_i_driver(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<DriverStatusResponse>> {
    let is_driver = services::is_driver(&state.db, claims.sub).await?;
    Ok(Json(DriverStatusResponse { is_driver }))
}

/// Rate a fellow participant of a finished ride
pub async fn rate_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<RateUserRequest>,
) -> AppResult<Json<FeedbackResponse>> {
    let feedback = feedback::rate_user(
        &state.db,
        claims.sub,
        payload.user_id,
        payload.ride_id,
        payload.rating,
        payload.text,
    )
    .await?;

    Ok(Json(feedback.into()))
}

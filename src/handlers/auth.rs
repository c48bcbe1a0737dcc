use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::extract::ValidJson;
use super::users::{UserResponse, user_response};
use crate::AppState;
use crate::error::AppResult;
use crate::services::accounts::{self, NewUser};
use crate::utils::jwt::create_token;
use crate::utils::validation::validate_phone;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 40))]
    pub first_name: String,
    #[validate(length(min = 1, max = 40))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone_number: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[validate(url)]
    pub photo_url: Option<String>,
    #[validate(length(max = 500))]
    pub about: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email or phone number
    #[validate(length(min = 1))]
    pub login: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Register a new account and sign it in
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = accounts::register(
        &state.db,
        NewUser {
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            phone_number: payload.phone_number,
            password: payload.password,
            photo_url: payload.photo_url,
            about: payload.about,
        },
    )
    .await?;

    let token = create_token(
        user.id,
        &user.email,
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;

    Ok(Json(AuthResponse {
        token,
        user: user_response(&state.db, user).await?,
    }))
}

/// Login with email or phone number
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = accounts::authenticate(&state.db, &payload.login, &payload.password).await?;

    let token = create_token(
        user.id,
        &user.email,
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;
    tracing::debug!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        token,
        user: user_response(&state.db, user).await?,
    }))
}

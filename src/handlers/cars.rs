use axum::{Extension, Json, extract::State};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::extract::ValidJson;
use crate::AppState;
use crate::entities::car;
use crate::error::AppResult;
use crate::services::accounts::{self, CarChanges, CarFields};
use crate::utils::jwt::Claims;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub model: String,
    pub color: String,
    pub registry_number: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<car::Model> for CarResponse {
    fn from(car: car::Model) -> Self {
        Self {
            id: car.id,
            owner_id: car.owner_id,
            model: car.model,
            color: car.color,
            registry_number: car.registry_number,
            created_at: car.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCarRequest {
    #[validate(length(min = 1, max = 60))]
    pub model: String,
    #[validate(length(min = 1, max = 30))]
    pub color: String,
    #[validate(length(min = 1, max = 20))]
    pub registry_number: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCarRequest {
    pub id: Uuid,
    #[validate(length(min = 1, max = 60))]
    pub model: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub color: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub registry_number: Option<String>,
}

pub async fn list_cars(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<CarResponse>>> {
    let cars = accounts::list_cars(&state.db, claims.sub).await?;
    Ok(Json(cars.into_iter().map(CarResponse::from).collect()))
}

pub async fn create_car(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<CreateCarRequest>,
) -> AppResult<Json<CarResponse>> {
    let car = accounts::create_car(
        &state.db,
        claims.sub,
        CarFields {
            model: payload.model,
            color: payload.color,
            registry_number: payload.registry_number,
        },
    )
    .await?;

    Ok(Json(car.into()))
}

pub async fn update_car(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<UpdateCarRequest>,
) -> AppResult<Json<CarResponse>> {
    let car = accounts::update_car(
        &state.db,
        claims.sub,
        payload.id,
        CarChanges {
            model: payload.model,
            color: payload.color,
            registry_number: payload.registry_number,
        },
    )
    .await?;

    Ok(Json(car.into()))
}

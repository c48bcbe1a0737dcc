use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::extract::{AppPath, ValidJson, ValidQuery};
use super::users::UserSummary;
use crate::AppState;
use crate::entities::organization;
use crate::error::AppResult;
use crate::services::{
    is_member,
    membership::{self, OrganizationChanges, OrganizationFields},
};
use crate::utils::jwt::Claims;

const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub control_question: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<organization::Model> for OrganizationResponse {
    fn from(org: organization::Model) -> Self {
        Self {
            id: org.id,
            name: org.name,
            latitude: org.latitude,
            longitude: org.longitude,
            address: org.address,
            description: org.description,
            creator_id: org.creator_id,
            control_question: org.control_question,
            created_at: org.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDetailsResponse {
    #[serde(flatten)]
    pub organization: OrganizationResponse,
    pub is_member: bool,
    pub total_members: u64,
    pub total_drivers: u64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub last_ride_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyOrganizationResponse {
    #[serde(flatten)]
    pub organization: OrganizationResponse,
    /// Kilometers
    pub distance: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlQuestionResponse {
    pub question: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub control_question: String,
    #[validate(length(min = 1, max = 200))]
    pub control_answer: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub control_question: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub control_answer: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinOrganizationRequest {
    pub organization_id: Uuid,
    pub answer: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LeaveOrganizationRequest {
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationQuery {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 100))]
    pub query: String,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

fn to_responses(orgs: Vec<organization::Model>) -> Vec<OrganizationResponse> {
    orgs.into_iter().map(OrganizationResponse::from).collect()
}

pub async fn list_organizations(State(state): State<AppState>) -> AppResult<Json<Vec<OrganizationResponse>>> {
    let orgs = membership::list_organizations(&state.db).await?;
    Ok(Json(to_responses(orgs)))
}

pub async fn create_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<CreateOrganizationRequest>,
) -> AppResult<Json<OrganizationResponse>> {
    let org = membership::create_organization(
        &state.db,
        state.search.as_ref(),
        claims.sub,
        state.config.max_organizations_per_user,
        OrganizationFields {
            name: payload.name,
            latitude: payload.latitude,
            longitude: payload.longitude,
            address: payload.address,
            description: payload.description,
            control_question: payload.control_question,
            control_answer: payload.control_answer,
        },
    )
    .await?;

    Ok(Json(org.into()))
}

pub async fn my_organizations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<OrganizationResponse>>> {
    let orgs = membership::my_organizations(&state.db, claims.sub).await?;
    Ok(Json(to_responses(orgs)))
}

pub async fn nearest_organizations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidQuery(query): ValidQuery<LocationQuery>,
) -> AppResult<Json<Vec<NearbyOrganizationResponse>>> {
    let ranked =
        membership::nearest_organizations(&state.db, claims.sub, query.latitude, query.longitude).await?;

    Ok(Json(
        ranked
            .into_iter()
            .map(|(org, distance)| NearbyOrganizationResponse {
                organization: org.into(),
                distance,
            })
            .collect(),
    ))
}

pub async fn search_organizations(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<SearchQuery>,
) -> AppResult<Json<Vec<OrganizationResponse>>> {
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let orgs = membership::search(&state.db, state.search.as_ref(), &query.query, limit).await?;
    Ok(Json(to_responses(orgs)))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<OrganizationDetailsResponse>> {
    let org = membership::find_organization(&state.db, id).await?;
    let stats = membership::organization_stats(&state.db, org.id).await?;
    let member = is_member(&state.db, org.id, claims.sub).await?;

    Ok(Json(OrganizationDetailsResponse {
        organization: org.into(),
        is_member: member,
        total_members: stats.total_members,
        total_drivers: stats.total_drivers,
        min_price: stats.min_price,
        max_price: stats.max_price,
        last_ride_at: stats.last_ride_at,
    }))
}

pub async fn update_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
    ValidJson(payload): ValidJson<UpdateOrganizationRequest>,
) -> AppResult<Json<OrganizationResponse>> {
    let org = membership::update_organization(
        &state.db,
        state.search.as_ref(),
        claims.sub,
        id,
        OrganizationChanges {
            name: payload.name,
            latitude: payload.latitude,
            longitude: payload.longitude,
            address: payload.address,
            description: payload.description,
            control_question: payload.control_question,
            control_answer: payload.control_answer,
        },
    )
    .await?;

    Ok(Json(org.into()))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    membership::delete_organization(&state.db, state.search.as_ref(), claims.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn organization_members(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = membership::members(&state.db, claims.sub, id).await?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect()))
}

pub async fn control_question(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ControlQuestionResponse>> {
    let question = membership::control_question(&state.db, id).await?;
    Ok(Json(ControlQuestionResponse { question }))
}

pub async fn join_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<JoinOrganizationRequest>,
) -> AppResult<Json<OrganizationResponse>> {
    let org = membership::join_organization(
        &state.db,
        claims.sub,
        payload.organization_id,
        &payload.answer,
        state.config.max_organizations_per_user,
    )
    .await?;

    Ok(Json(org.into()))
}

pub async fn leave_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(payload): ValidJson<LeaveOrganizationRequest>,
) -> AppResult<StatusCode> {
    membership::leave_organization(&state.db, claims.sub, payload.organization_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

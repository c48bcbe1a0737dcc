//! Error types shared by services and handlers.
//!
//! Business rule violations are [`DomainError`]s; each one knows its HTTP
//! status and the description clients display. Everything else goes through
//! [`AppError`], which renders the same JSON body for every failure.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

/// Rule violations raised by the membership, ride and feedback services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Email or phone number is already registered")]
    EmailBusy,
    #[error("Invalid login or password")]
    InvalidCredentials,
    #[error("Incorrect answer for control question")]
    IncorrectControlAnswer,
    #[error("User is not in that organization")]
    NotInOrganization,
    #[error("The creator cannot leave their organization")]
    CreatorCannotLeave,
    #[error("Organization limit exceeded")]
    OrganizationLimit,
    #[error("You do not own this item or the item does not exist")]
    InsufficientPermissions,
    #[error("You do not own this car or the car does not exist")]
    NotCarOwner,
    #[error("Ride is not active or not found")]
    RideNotActive,
    #[error("No free seats available")]
    NoFreeSeats,
    #[error("You cannot join if you are the creator")]
    CreatorCannotJoin,
    #[error("Request already sent")]
    RequestAlreadySent,
    #[error("Request has already been answered")]
    AlreadyDecided,
    #[error("You did not take this ride")]
    NotInRide,
    #[error("Owner cannot do that")]
    NotForOwner,
    #[error("Ride has not finished yet")]
    RideNotFinished,
    #[error("Feedback already sent")]
    FeedbackAlreadySent,
}

impl DomainError {
    pub fn status(&self) -> StatusCode {
        match self {
            DomainError::EmailBusy
            | DomainError::InvalidCredentials
            | DomainError::IncorrectControlAnswer
            | DomainError::CreatorCannotLeave
            | DomainError::OrganizationLimit
            | DomainError::RequestAlreadySent
            | DomainError::AlreadyDecided
            | DomainError::FeedbackAlreadySent => StatusCode::BAD_REQUEST,
            DomainError::NotInOrganization
            | DomainError::InsufficientPermissions
            | DomainError::NotCarOwner
            | DomainError::RideNotActive
            | DomainError::NoFreeSeats
            | DomainError::CreatorCannotJoin
            | DomainError::NotInRide
            | DomainError::NotForOwner
            | DomainError::RideNotFinished => StatusCode::FORBIDDEN,
        }
    }

    /// Machine-readable name sent as `name` in the error body.
    pub fn name(&self) -> &'static str {
        match self {
            DomainError::EmailBusy => "EmailBusy",
            DomainError::InvalidCredentials => "InvalidCredentials",
            DomainError::IncorrectControlAnswer => "IncorrectControlAnswer",
            DomainError::NotInOrganization => "NotInOrganization",
            DomainError::CreatorCannotLeave => "CreatorCannotLeave",
            DomainError::OrganizationLimit => "OrganizationLimit",
            DomainError::InsufficientPermissions => "InsufficientPermissions",
            DomainError::NotCarOwner => "NotCarOwner",
            DomainError::RideNotActive => "RideNotActive",
            DomainError::NoFreeSeats => "NoFreeSeats",
            DomainError::CreatorCannotJoin => "CreatorCannotJoin",
            DomainError::RequestAlreadySent => "RequestAlreadySent",
            DomainError::AlreadyDecided => "AlreadyDecided",
            DomainError::NotInRide => "NotInRide",
            DomainError::NotForOwner => "NotForOwner",
            DomainError::RideNotFinished => "RideNotFinished",
            DomainError::FeedbackAlreadySent => "FeedbackAlreadySent",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authorization required")]
    AuthorizationRequired,

    #[error("{0}")]
    NotFound(String),

    #[error("Some of required fields are invalid")]
    Validation(Vec<String>),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub name: &'static str,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthorizationRequired => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Domain(e) => e.status(),
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AppError::AuthorizationRequired => "AuthorizationRequired",
            AppError::NotFound(_) => "NotFound",
            AppError::Validation(_) => "ValidationError",
            AppError::Domain(e) => e.name(),
            AppError::Database(_) | AppError::Internal(_) => "InternalError",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let status = self.status();
        let description = if status.is_server_error() {
            "Unhandled error".to_string()
        } else {
            self.to_string()
        };
        let fields = match self {
            AppError::Validation(fields) => Some(fields.clone()),
            _ => None,
        };

        ErrorBody {
            code: status.as_u16(),
            name: self.name(),
            description,
            fields,
        }
    }
}

/// True when the database rejected a write because of a unique index.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed with internal error");
        }

        (status, Json(self.body())).into_response()
    }
}

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::verify_token;

/// Validate the bearer token and expose its [`Claims`](crate::utils::jwt::Claims)
/// to handlers. A missing or malformed header is `AuthorizationRequired` too.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let auth = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AppError::AuthorizationRequired)?;

    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

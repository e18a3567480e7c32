use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::Session;
use crate::routes::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TOKEN_HEADER: &str = "token";

/// Requires both `X-User-ID` and `Token`, and the token's embedded user id
/// must match the header. The decoded [`Session`] is stored as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Session, AppError> {
    let raw_id = header_str(headers, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing X-User-ID header".into()))?;
    let user_id: i64 = raw_id
        .trim()
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid user id".into()))?;

    let token = header_str(headers, TOKEN_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing Token header".into()))?;
    let session = state
        .tokens
        .decode(token)
        .map_err(|e| AppError::Unauthorized(format!("Token rejected: {e}")))?;

    if session.user_id != user_id {
        return Err(AppError::Unauthorized("Token does not match user".into()));
    }
    Ok(session)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

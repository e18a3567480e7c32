use axum::{extract::State, response::IntoResponse, Extension};
use serde::{Deserialize, Serialize};

use crate::auth::is_super_user;
use crate::db::users;
use crate::error::{AppError, AppResult, ValidJson};
use crate::models::{Session, UserPublic};
use crate::routes::{ok, ok_data, AppState};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub name: String,
    pub pwd: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub name: String,
    pub token: String,
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<Credentials>,
) -> AppResult<impl IntoResponse> {
    if body.name.is_empty() || body.pwd.is_empty() {
        return Err(AppError::BadRequest("Name and password are required".into()));
    }

    let conn = state.db.get()?;
    let Some(user) = users::authenticate(&conn, &body.name, &body.pwd)? else {
        tracing::info!(name = %body.name, "Rejected login");
        return Err(AppError::Unauthorized("Invalid name or password".into()));
    };

    let token = state
        .tokens
        .encode(user.id, &user.name)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(ok(
        LoginResponse {
            user_id: user.id,
            name: user.name,
            token,
        },
        "Logged in",
    ))
}

pub async fn user_info(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let user = users::get(&conn, session.user_id)?;
    Ok(ok_data(UserPublic::from(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidJson(body): ValidJson<Credentials>,
) -> AppResult<impl IntoResponse> {
    if !is_super_user(session.user_id) {
        return Err(AppError::Forbidden("Only the super-user may create accounts".into()));
    }
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    if body.pwd.is_empty() {
        return Err(AppError::BadRequest("Password is required".into()));
    }

    let conn = state.db.get()?;
    let user = users::create(&conn, name, &body.pwd)?;
    tracing::info!(user_id = user.id, created_by = session.user_id, "Created user");
    Ok(ok(UserPublic::from(user), "User created"))
}

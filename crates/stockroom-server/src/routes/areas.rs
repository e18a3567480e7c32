use axum::{extract::State, response::IntoResponse, Extension};

use crate::db::areas;
use crate::error::{AppResult, ValidJson, ValidPath};
use crate::models::{AreaInput, Session};
use crate::routes::{done, ok, ok_data, AppState};

pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    Ok(ok_data(areas::list(&conn)?))
}

pub async fn get(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i64>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    Ok(ok_data(areas::get(&conn, id)?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidJson(body): ValidJson<AreaInput>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let area = areas::create(&conn, session.user_id, body)?;
    tracing::info!(area_id = area.id, user_id = session.user_id, "Created area");
    Ok(ok(area, "Created"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<AreaInput>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let area = areas::update(&conn, id, body)?;
    tracing::debug!(area_id = id, user_id = session.user_id, "Updated area");
    Ok(ok(area, "Updated"))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidPath(id): ValidPath<i64>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    areas::delete(&conn, id, session.user_id)?;
    tracing::info!(area_id = id, user_id = session.user_id, "Deleted area");
    Ok(done("Deleted"))
}

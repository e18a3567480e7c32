use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension,
};

use crate::db::arrivals;
use crate::error::{AppResult, ValidJson, ValidPath};
use crate::models::{ArrivalInput, Session};
use crate::routes::products::{Deleted, DeleteRequest, FieldUpdate};
use crate::routes::{ok, ok_data, AppState};
use crate::services::listing::{ListParams, ListQuery};
use crate::services::patch;

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let params = ListParams::from_query(&arrivals::LIST_SHAPE, query);
    let conn = state.db.get()?;
    Ok(ok_data(arrivals::list(&conn, &params)?))
}

pub async fn get(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i64>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    Ok(ok_data(arrivals::get(&conn, id)?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidJson(body): ValidJson<ArrivalInput>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let arrival = arrivals::create(&conn, session.user_id, body)?;
    tracing::info!(arrival_id = arrival.id, user_id = session.user_id, "Created arrival");
    Ok(ok(arrival, "Created"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<ArrivalInput>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let arrival = arrivals::update(&conn, id, body)?;
    tracing::debug!(arrival_id = id, user_id = session.user_id, "Updated arrival");
    Ok(ok(arrival, "Updated"))
}

pub async fn patch_field(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<FieldUpdate>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db.get()?;
    let arrival = patch::patch_arrival(&mut conn, id, session.user_id, &body.field, &body.value)?;
    Ok(ok(arrival, "Updated"))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidJson(body): ValidJson<DeleteRequest>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let deleted = arrivals::delete_many(&conn, &body.ids, session.user_id)?;
    tracing::info!(requested = body.ids.len(), deleted, user_id = session.user_id, "Deleted arrivals");
    Ok(ok(Deleted { deleted }, "Deleted"))
}

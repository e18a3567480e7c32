use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::products;
use crate::error::{AppResult, ValidJson, ValidPath};
use crate::models::{ProductInput, Session};
use crate::routes::{denied, ok, ok_data, AppState};
use crate::services::listing::{ListParams, ListQuery};
use crate::services::patch::{self, PatchOutcome};
use crate::services::visibility::for_viewer;

#[derive(Debug, Deserialize)]
pub struct FieldUpdate {
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: usize,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let params = ListParams::from_query(&products::LIST_SHAPE, query);
    let conn = state.db.get()?;
    let page = products::list(&conn, &params)?;
    Ok(ok_data(for_viewer(session.user_id, page)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidPath(id): ValidPath<i64>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let product = products::get(&conn, id)?;
    Ok(ok_data(for_viewer(session.user_id, product)))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidJson(body): ValidJson<ProductInput>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let product = products::create(&conn, session.user_id, body)?;
    tracing::info!(product_id = product.id, user_id = session.user_id, "Created product");
    Ok(ok(for_viewer(session.user_id, product), "Created"))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<ProductInput>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let product = products::update(&conn, id, session.user_id, body)?;
    tracing::debug!(product_id = id, user_id = session.user_id, "Updated product");
    Ok(ok(for_viewer(session.user_id, product), "Updated"))
}

pub async fn patch_field(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<FieldUpdate>,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    let outcome = patch::patch_product(&mut conn, id, session.user_id, &body.field, &body.value)?;
    Ok(match outcome {
        PatchOutcome::Applied(product) => {
            ok(for_viewer(session.user_id, product), "Updated").into_response()
        }
        PatchOutcome::Denied => denied("You may not change this field").into_response(),
    })
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ValidJson(body): ValidJson<DeleteRequest>,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let deleted = products::delete_many(&conn, &body.ids, session.user_id)?;
    tracing::info!(requested = body.ids.len(), deleted, user_id = session.user_id, "Deleted products");
    Ok(ok(Deleted { deleted }, "Deleted"))
}

mod areas;
mod arrivals;
mod auth;
mod products;
mod uploads;


use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::middleware::require_auth;
use crate::auth::token::TokenCodec;
use crate::config::Config;
use crate::db::DbPool;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenCodec>,
}

/// Success body shared by every JSON endpoint: `{code, data, message}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn ok<T: Serialize>(data: T, message: &str) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: 0,
        data: Some(data),
        message: Some(message.to_string()),
    })
}

pub fn ok_data<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: 0,
        data: Some(data),
        message: None,
    })
}

pub fn done(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        code: 0,
        data: None,
        message: Some(message.to_string()),
    })
}

/// Sent with HTTP 200 when the caller may not perform the action.
pub fn denied(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        code: -1,
        data: None,
        message: Some(message.to_string()),
    })
}

async fn health() -> &'static str {
    "ok"
}

pub fn create_router(state: AppState) -> Router {
    // Login: 10 attempts per minute per peer IP
    let login_governor = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .finish()
        .expect("static governor settings are non-zero");

    let login_routes = Router::new()
        .route("/api/login", post(auth::login))
        .layer(GovernorLayer::new(Arc::new(login_governor)));

    let public = Router::new()
        .route("/health", get(health))
        .route("/uploads/{filename}", get(uploads::serve));

    let protected = Router::new()
        .route("/api/user/info", get(auth::user_info))
        .route("/api/users", post(auth::create_user))
        // Areas
        .route("/api/areas", get(areas::list).post(areas::create))
        .route(
            "/api/areas/{id}",
            get(areas::get).put(areas::update).delete(areas::delete),
        )
        // Products
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/delete", post(products::delete))
        .route(
            "/api/products/{id}",
            get(products::get).put(products::update),
        )
        .route("/api/products/{id}/field", patch(products::patch_field))
        // Arrivals
        .route("/api/arrivals", get(arrivals::list).post(arrivals::create))
        .route("/api/arrivals/delete", post(arrivals::delete))
        .route(
            "/api/arrivals/{id}",
            get(arrivals::get).put(arrivals::update),
        )
        .route("/api/arrivals/{id}/field", patch(arrivals::patch_field))
        // Uploads
        .route(
            "/api/upload",
            post(uploads::upload).layer(DefaultBodyLimit::max(
                state.config.upload_max_size.saturating_add(MULTIPART_OVERHEAD),
            )),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(login_routes)
        .merge(protected)
        .with_state(state)
}

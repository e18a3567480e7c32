use std::path::Path;

use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::Session;
use crate::routes::{ok, AppState};
use crate::services::thumbnail;

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct Uploaded {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ThumbQuery {
    pub w: Option<String>,
    pub h: Option<String>,
}

pub async fn upload(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let limit = state.config.upload_max_size;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let ext = thumbnail::upload_extension(field.file_name().unwrap_or_default())?;
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        if bytes.len() > limit {
            return Err(AppError::PayloadTooLarge(limit));
        }

        let dir = Path::new(&state.config.upload_dir);
        tokio::fs::create_dir_all(dir).await?;
        let filename = thumbnail::upload_filename(&ext);
        tokio::fs::write(dir.join(&filename), &bytes).await?;
        tracing::info!(filename, size = bytes.len(), user_id = session.user_id, "Stored upload");

        return Ok(ok(
            Uploaded {
                url: format!("/uploads/{filename}"),
            },
            "Uploaded",
        ));
    }

    Err(AppError::BadRequest("Missing multipart field \"file\"".into()))
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit)
    } else {
        AppError::BadRequest(err.body_text())
    }
}

pub async fn serve(
    State(state): State<AppState>,
    axum::extract::Path(filename): axum::extract::Path<String>,
    Query(query): Query<ThumbQuery>,
) -> AppResult<impl IntoResponse> {
    let max_side = state.config.thumb_max_side;
    let size = thumbnail::requested_size(query.w.as_deref(), query.h.as_deref(), max_side)?;
    let path = thumbnail::resolve(Path::new(&state.config.upload_dir), &filename, size, max_side).await?;
    let bytes = tokio::fs::read(&path).await?;
    Ok(([(header::CONTENT_TYPE, thumbnail::content_type(&filename))], bytes))
}

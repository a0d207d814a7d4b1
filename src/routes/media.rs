use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::media::{is_safe_name, MediaUpload};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/media", post(upload))
        .route("/media/{name}", get(serve))
}

/// First part of a multipart body that carries a file.
pub(crate) async fn read_upload(multipart: &mut Multipart) -> AppResult<MediaUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(upload_error)?;

        let mut upload = MediaUpload::new(bytes).with_file_name(file_name);
        if let Some(content_type) = content_type {
            upload = upload.with_content_type(content_type);
        }
        return Ok(upload);
    }
    Err(AppError::Validation("No file in upload".into()))
}

fn upload_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge("File is too large to upload".into())
    } else {
        AppError::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

/// Store an item photo; the client then sends the URL with the report.
async fn upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let upload = read_upload(&mut multipart).await?;
    let url = state.media.upload(upload).await?;
    tracing::debug!(user_id = %user.id, %url, "Media uploaded");
    Ok((StatusCode::CREATED, Json(json!({ "url": url }))))
}

async fn serve(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Response> {
    if !is_safe_name(&name) {
        return Err(AppError::NotFound("File not found".into()));
    }

    let path = state.config.media_path().join(&name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::NotFound("File not found".into()))?;
    let mime = mime_guess::from_path(&name).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        bytes,
    )
        .into_response())
}

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::chat::{ChatScope, MediaKind, MessageDraft, MessagePayload};
use crate::db::models::ChatMessage;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::{media::read_upload, sse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/chat/{scope}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/chat/{scope}/stream", get(stream_messages))
        .route("/api/chat/{scope}/media", post(send_media))
        .route("/api/chat/{scope}/recordings", post(start_recording))
        .route("/api/recordings/{id}/chunks", post(append_chunk))
        .route("/api/recordings/{id}/stop", post(stop_recording))
        .route("/api/recordings/{id}", delete(discard_recording))
}

async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(scope): Path<String>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let scope: ChatScope = scope.parse()?;
    Ok(Json(state.chat.history(&scope, &user.id).await?))
}

async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(scope): Path<String>,
    Json(draft): Json<MessageDraft>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    let scope: ChatScope = scope.parse()?;
    let message = state.chat.send(&scope, &user, draft.into_payload()?).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn stream_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(scope): Path<String>,
) -> AppResult<impl IntoResponse> {
    let scope: ChatScope = scope.parse()?;
    let live = state.chat.subscribe(&scope, &user.id).await?;
    Ok(sse::snapshots(live.into_stream()))
}

/// Attach an image or an audio file to the channel.
async fn send_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(scope): Path<String>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    let scope: ChatScope = scope.parse()?;
    state.chat.ensure_writable(&scope, &user.id).await?;

    let upload = read_upload(&mut multipart).await?;
    let kind = MediaKind::from_content_type(&upload.resolved_content_type()).ok_or_else(|| {
        AppError::Validation("Only image and audio files can be sent".into())
    })?;

    let url = state.media.upload(upload).await?;
    let message = state
        .chat
        .send(&scope, &user, kind.payload(url.to_string()))
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn start_recording(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(scope): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let scope: ChatScope = scope.parse()?;
    state.chat.ensure_writable(&scope, &user.id).await?;

    let id = state.recordings.lock().await.start(&user.id, scope);
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn append_chunk(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    chunk: Bytes,
) -> AppResult<Json<Value>> {
    let bytes = state.recordings.lock().await.append(&id, &user.id, chunk)?;
    Ok(Json(json!({ "id": id, "bytes": bytes })))
}

/// Assemble the recording, upload it and post it as a voice message. The
/// session is closed only once the message is stored.
async fn stop_recording(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    let (scope, upload) = state.recordings.lock().await.assemble(&id, &user.id)?;
    state.chat.ensure_writable(&scope, &user.id).await?;

    let url = state.media.upload(upload).await?;
    let message = state
        .chat
        .send(&scope, &user, MessagePayload::Audio(url.to_string()))
        .await?;
    state.recordings.lock().await.remove(&id);
    tracing::info!(recording_id = %id, scope = %scope, "Voice message posted");
    Ok((StatusCode::CREATED, Json(message)))
}

async fn discard_recording(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.recordings.lock().await.take(&id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

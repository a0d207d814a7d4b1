use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::auth::profile::{update_profile, ProfilePatch};
use crate::auth::SessionUser;
use crate::db::models::Item;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::items::ItemFilter;
use crate::routes::media::read_upload;
use crate::state::AppState;
use crate::store::Change;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me).patch(edit_profile))
        .route("/api/me/photo", post(upload_photo))
        .route("/api/me/items", get(my_items))
}

/// Re-reads the account and profile on every call.
async fn me(CurrentUser(user): CurrentUser) -> Json<SessionUser> {
    Json(user)
}

fn apply_patch(state: &AppState, user_id: &str, patch: ProfilePatch) -> AppResult<SessionUser> {
    let conn = state.db.get()?;
    let user = update_profile(&conn, user_id, patch)?;
    state.feed.publish(Change::Users);
    Ok(user)
}

async fn edit_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Json<SessionUser>> {
    let patch: ProfilePatch =
        serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(Json(apply_patch(&state, &user.id, patch)?))
}

/// Upload a profile photo and store its URL in one call.
async fn upload_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<SessionUser>> {
    let upload = read_upload(&mut multipart).await?;
    if !upload.resolved_content_type().starts_with("image/") {
        return Err(AppError::Validation("Profile photo must be an image".into()));
    }

    let url = state.media.upload(upload).await?;
    let patch = ProfilePatch {
        photo_url: Some(url.to_string()),
        ..Default::default()
    };
    Ok(Json(apply_patch(&state, &user.id, patch)?))
}

async fn my_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Item>>> {
    let items = state
        .items
        .list(&ItemFilter::Reporter(user.id.clone()))
        .await?;
    Ok(Json(items))
}

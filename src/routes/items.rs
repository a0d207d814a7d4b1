use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;

use crate::db::models::{Claim, Item};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::items::{ItemDraft, ItemFilter, ItemPatch, ItemQuery, PotentialMatch};
use crate::routes::sse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/stream", get(stream_items))
        .route("/api/items/match", get(potential_match))
        .route(
            "/api/items/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/api/items/{id}/match", put(set_match))
        .route("/api/items/{id}/claims", post(create_claim))
        .route("/api/map/items", get(map_items))
}

fn visible(items: Vec<Item>, viewer_id: &str) -> Vec<Item> {
    items.into_iter().map(|i| i.visible_to(viewer_id)).collect()
}

async fn list_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.items.list(&query.into_filter()?).await?;
    Ok(Json(visible(items, &user.id)))
}

async fn stream_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ItemQuery>,
) -> AppResult<impl IntoResponse> {
    let live = state.items.subscribe(query.into_filter()?);
    let viewer_id = user.id;
    let stream = live
        .into_stream()
        .map(move |snapshot| snapshot.map(|items| visible(items, &viewer_id)));
    Ok(sse::snapshots(stream))
}

/// Banner on the feed: one of my lost items may have been found.
async fn potential_match(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Option<PotentialMatch>>> {
    Ok(Json(state.items.find_match_for(&user.id).await?))
}

async fn map_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.items.list(&ItemFilter::All).await?;
    let located = items
        .into_iter()
        .filter(|i| i.location.is_some())
        .map(|i| i.visible_to(&user.id))
        .collect();
    Ok(Json(located))
}

async fn create_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(draft): Json<ItemDraft>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let new_item = draft.validate()?;
    let id = state
        .items
        .create(new_item, &user.id, &user.display_name())
        .await?;
    let item = state.items.get(&id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Item>> {
    let item = state.items.get(&id).await?;
    Ok(Json(item.visible_to(&user.id)))
}

async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Json<Item>> {
    let patch = ItemPatch::from_json(body)?;
    Ok(Json(state.items.update(&id, &user.id, patch).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.items.delete(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchRequest {
    found_item_id: String,
}

async fn set_match(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<MatchRequest>,
) -> AppResult<Json<Item>> {
    let item = state
        .items
        .set_potential_match(&id, &user.id, &req.found_item_id)
        .await?;
    Ok(Json(item))
}

async fn create_claim(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<String>,
) -> AppResult<(StatusCode, Json<Claim>)> {
    let claim_id = state.claims.create_claim(&item_id, &user.id).await?;
    let claim = state.claims.get(&claim_id).await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

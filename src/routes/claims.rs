use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::claims::{watch_my_claims, ClaimDetail, Decision};
use crate::db::models::Claim;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::sse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/claims/{id}", get(get_claim))
        .route("/api/claims/{id}/stream", get(stream_claim))
        .route("/api/claims/{id}/answer", post(submit_answer))
        .route("/api/claims/{id}/resolve", post(resolve_claim))
        .route("/api/my-claims", get(my_claims))
        .route("/api/my-claims/stream", get(stream_my_claims))
}

async fn get_claim(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ClaimDetail>> {
    Ok(Json(state.claims.detail(&id, &user.id).await?))
}

async fn stream_claim(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    // Fail with a proper status before opening the stream
    state.claims.detail(&id, &user.id).await?;
    let live = state.claims.watch_detail(&id, &user.id);
    Ok(sse::snapshots(live.into_stream()))
}

#[derive(Deserialize)]
struct AnswerRequest {
    answer: String,
}

async fn submit_answer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> AppResult<Json<Claim>> {
    let claim = state
        .claims
        .submit_answer(&id, &user.id, &req.answer)
        .await?;
    Ok(Json(claim))
}

#[derive(Deserialize)]
struct ResolveRequest {
    decision: Decision,
}

async fn resolve_claim(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ResolveRequest>,
) -> AppResult<Json<Claim>> {
    let claim = state
        .claims
        .resolve_claim(&id, &user.id, req.decision)
        .await?;
    Ok(Json(claim))
}

async fn my_claims(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Claim>>> {
    Ok(Json(state.claims.list_for_user(&user.id).await?))
}

async fn stream_my_claims(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    sse::snapshots(watch_my_claims(state.claims.as_ref(), &user.id))
}

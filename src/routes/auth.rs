use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use crate::auth::session::{
    clear_cookie, create_session, delete_session, session_cookie, token_from_headers,
};
use crate::auth::{Credentials, IdentityProvider, Registration, SessionUser};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

/// bcrypt is CPU-bound; keep it off the async workers.
async fn blocking<F>(identity: IdentityProvider, f: F) -> AppResult<SessionUser>
where
    F: FnOnce(&IdentityProvider) -> AppResult<SessionUser> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&identity))
        .await
        .map_err(|e| AppError::Internal(format!("Identity task failed: {}", e)))?
}

fn signed_in(state: &AppState, status: StatusCode, user: SessionUser) -> AppResult<Response> {
    let token = create_session(&state.db, &user.id, state.config.auth.session_hours)?;
    let cookie = session_cookie(&state.config.auth, &token);
    Ok((status, [(header::SET_COOKIE, cookie)], Json(user)).into_response())
}

async fn register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> AppResult<Response> {
    let user = blocking(state.identity.clone(), move |identity| {
        identity.register(registration)
    })
    .await?;
    signed_in(&state, StatusCode::CREATED, user)
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Response> {
    let user = blocking(state.identity.clone(), move |identity| {
        identity.sign_in(&credentials)
    })
    .await?;
    signed_in(&state, StatusCode::OK, user)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = token_from_headers(&headers, &state.config.auth.cookie_name) {
        delete_session(&state.db, token)?;
    }
    let cookie = clear_cookie(&state.config.auth);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

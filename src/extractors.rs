use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::profile::load_by_session_token;
use crate::auth::session::token_from_headers;
use crate::auth::SessionUser;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        load_by_session_token(&conn, token)?
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// A signed-in user whose stored role is admin; 403 otherwise.
pub struct AdminUser(pub SessionUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(user_id = %user.id, "Non-admin tried the admin view");
            return Err(AppError::Authorization("Admins only".into()));
        }
        Ok(AdminUser(user))
    }
}

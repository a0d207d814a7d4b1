pub mod admin;
pub mod auth;
pub mod chat;
pub mod claims;
pub mod graphql;
pub mod items;
pub mod media;
pub mod profile;
pub mod sse;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The whole HTTP surface with a body limit, tracing and, when configured, CORS.
pub fn app(state: AppState) -> Router {
    let mut app = Router::new()
        .merge(auth::router())
        .merge(items::router())
        .merge(claims::router())
        .merge(chat::router())
        .merge(profile::router())
        .merge(admin::router())
        .merge(media::router())
        .merge(graphql::router())
        .layer(DefaultBodyLimit::max(state.config.media.max_upload_bytes));

    if let Some(cors) = cors_layer(&state.config.server.cors_origins) {
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

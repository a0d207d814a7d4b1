use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::db::models::Item;
use crate::error::AppResult;
use crate::extractors::AdminUser;
use crate::items::ItemFilter;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/admin/items", get(all_items))
}

/// Every report with its reporter name, newest first. Secret answers stay
/// with their finders, admins included.
async fn all_items(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.items.list(&ItemFilter::All).await?;
    Ok(Json(
        items.into_iter().map(|i| i.visible_to(&admin.id)).collect(),
    ))
}

//! Administrative maintenance routes.
//!
//! The message purge deletes every stored chat message, all rooms, no
//! selective filter. Destructive and irreversible; it reports the number of
//! rows removed. When `admin.token` is configured the caller must present it
//! in `x-admin-token`.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Serialize;
use std::sync::Arc;
use studyhall_common::error::{HallError, HallResult};
use studyhall_db::repository::messages;

use crate::AppState;

/// Admin router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/admin/messages/purge", post(purge_messages))
}

#[derive(Serialize)]
struct PurgeResponse {
    deleted: u64,
}

/// POST /api/v1/admin/messages/purge — delete all chat messages.
async fn purge_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HallResult<Json<PurgeResponse>> {
    let config = studyhall_common::config::get();
    if let Some(expected) = &config.admin.token {
        let presented = headers
            .get("x-admin-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented != expected {
            return Err(HallError::Unauthorized);
        }
    }

    let deleted = messages::purge_all_messages(&state.db.pool).await?;
    tracing::warn!(deleted, "Administrative purge removed all chat messages");

    Ok(Json(PurgeResponse { deleted }))
}

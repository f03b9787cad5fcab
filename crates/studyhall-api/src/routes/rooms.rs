//! Room catalog route — client discovery of discussable rooms.
//!
//! The catalog is advisory: any normalized string names a valid room. Clients
//! that cannot reach this endpoint fall back to a built-in pair.

use axum::{Json, Router, routing::get};
use std::sync::Arc;
use studyhall_common::models::room::{RoomCatalog, default_catalog};

use crate::AppState;

/// Room catalog router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/rooms", get(list_rooms))
}

/// GET /api/v1/rooms — the catalog of known discussable rooms.
async fn list_rooms() -> Json<RoomCatalog> {
    Json(RoomCatalog {
        rooms: default_catalog(),
    })
}

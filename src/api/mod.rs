/// HTTP API consumed by the browser dashboard
pub mod routes;

use actix_web::web;
use std::sync::Arc;
use time::UtcOffset;

use crate::live_state::LiveState;
use crate::storage::{SharedBuffer, SharedStore};

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<LiveState>,
    pub buffer: SharedBuffer,
    pub store: SharedStore,
    pub utc_offset: UtcOffset,
}

/// Register all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/sensor", web::get().to(routes::get_sensor))
        .route("/load_history", web::get().to(routes::load_history))
        .route("/clear_history", web::post().to(routes::clear_history))
        .route("/history_stats", web::get().to(routes::history_stats));
}

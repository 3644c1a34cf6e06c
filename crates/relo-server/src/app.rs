//! Router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;
use crate::ws;

/// Create the application router.
///
/// The upgrade lives at `/` so agents can dial the bare endpoint
/// (`ws://127.0.0.1:1337/`).
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws::ws_handler))
        .with_state(state)
}

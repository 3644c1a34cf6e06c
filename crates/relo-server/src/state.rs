//! Application state.
//!
//! Shared state for the WebSocket handler.

use tokio::sync::mpsc;

use crate::manager::ManagerEvent;

/// State shared with the WebSocket handler.
pub(crate) struct AppState {
    /// Event channel into the connection manager task.
    pub(crate) manager: mpsc::Sender<ManagerEvent>,
}

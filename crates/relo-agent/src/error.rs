//! Agent error types.

/// Extension agent error.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// WebSocket connection or transport failure.
    #[error("WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    /// The announce message could not be encoded.
    #[error("Message encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

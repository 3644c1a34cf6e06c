//! Server error types.

/// Reload server error.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured listen address could not be parsed.
    #[error("Invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    /// I/O error while binding or serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The build output watcher could not be started.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

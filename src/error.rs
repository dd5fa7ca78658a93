use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid change record: {0}")]
    Validation(String),

    #[error("Store rejected record from site {site} at version {db_version}")]
    ApplyRejected { site: String, db_version: u64 },

    #[error("Change log store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("No connection to peer '{0}'")]
    NotConnected(String),

    #[error("Node is shutting down")]
    Shutdown,

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Connection-level errors are always recoverable: they feed the
    /// reconnect loop instead of terminating the node.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SyncError::Shutdown)
    }
}

use crate::connection::ConnectionState;

/// Why a realtime connection could not be established.
///
/// Callers branch on the category: credit exhaustion leads to a billing prompt,
/// everything else to a generic failure notice.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("insufficient credits: {0}")]
    InsufficientCredits(String),
    #[error("connection is already {0}")]
    AlreadyActive(ConnectionState),
    #[error(transparent)]
    Connection(#[from] anyhow::Error),
}

impl ConnectError {
    pub fn is_credits(&self) -> bool {
        matches!(self, ConnectError::InsufficientCredits(_))
    }
}

/// Failures of the foreground persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no history entry has been initialized for this session")]
    NoHistoryEntry,
    #[error("failed to serialize transcript: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Failures while starting a conversation.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error(transparent)]
    History(#[from] SessionError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

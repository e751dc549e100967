use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("already connected")]
    AlreadyConnected,
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("not connected yet")]
    NotConnected,
    /// The websocket handshake was answered with a non-101 HTTP status.
    #[error("handshake rejected with HTTP status {status}")]
    Rejected { status: u16 },
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("invalid request header: {0}")]
    InvalidHeader(#[from] tungstenite::http::header::InvalidHeaderValue),
    #[error("outgoing event channel closed")]
    ChannelClosed,
    #[error("failed to read stats")]
    Stats,
}

impl ClientError {
    /// Whether the provider refused the session for billing or quota reasons.
    pub fn is_credit_rejection(&self) -> bool {
        matches!(self, ClientError::Rejected { status: 402 | 429 })
    }
}

/// Separates HTTP rejections from other handshake failures.
pub(crate) fn from_handshake(error: tungstenite::Error) -> ClientError {
    match error {
        tungstenite::Error::Http(response) => ClientError::Rejected {
            status: response.status().as_u16(),
        },
        other => ClientError::WebSocket(other),
    }
}

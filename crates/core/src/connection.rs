use crate::error::ConnectError;
use crate::transcript::Role;
use anyhow::Result;
use async_trait::async_trait;
use mentor_realtime_types::{TranscriptionUsage, Usage};
#[cfg(test)]
use mockall::automock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Local microphone audio as 24 kHz mono PCM16 frames.
pub type AudioStream = mpsc::Receiver<Vec<i16>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Stopped,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Stopped => "stopped",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Provider-neutral events a transport emits while connected.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A new speech turn was detected; its text will follow.
    TurnStarted { item_id: String, role: Role },
    TranscriptDelta {
        item_id: String,
        role: Role,
        delta: String,
    },
    /// Final text for a turn; replaces whatever the deltas assembled.
    TranscriptDone {
        item_id: String,
        role: Role,
        text: String,
    },
    Error(String),
    Closed,
}

/// A realtime voice connection to an AI provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RealtimeTransport: Send {
    /// Negotiates a session, starts streaming `audio` and returns the event feed.
    async fn open(&mut self, audio: AudioStream) -> Result<mpsc::Receiver<TransportEvent>, ConnectError>;

    async fn close(&mut self) -> Result<()>;

    /// Injects a text message into the conversation and asks for a reply.
    async fn send_text(&mut self, text: String) -> Result<()>;

    fn usage(&self) -> Option<Usage>;

    fn transcription_usage(&self) -> Option<TranscriptionUsage>;

    fn transcription_model(&self) -> Option<String>;
}

/// Drives a [`RealtimeTransport`] through `stopped -> connecting -> connected -> stopped`.
pub struct RealtimeConnection<T> {
    transport: T,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    usage: Option<Usage>,
    transcription_usage: Option<TranscriptionUsage>,
    transcription_model: Option<String>,
}

impl<T: RealtimeTransport> RealtimeConnection<T> {
    pub fn new(transport: T) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Stopped);
        Self {
            transport,
            state_tx: Arc::new(state_tx),
            usage: None,
            transcription_usage: None,
            transcription_model: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Handle for whoever consumes the event feed to report a provider-side close.
    pub fn close_signal(&self) -> CloseSignal {
        CloseSignal {
            state_tx: self.state_tx.clone(),
        }
    }

    /// Opens the transport. A failed attempt leaves the connection stopped and
    /// must be retried by calling `connect` again.
    ///
    /// Dropping the returned future aborts the attempt; the state goes back to
    /// stopped and [`disconnect`](Self::disconnect) releases anything half-open.
    pub async fn connect(
        &mut self,
        audio: AudioStream,
    ) -> Result<mpsc::Receiver<TransportEvent>, ConnectError> {
        let current = self.state();
        if current != ConnectionState::Stopped {
            return Err(ConnectError::AlreadyActive(current));
        }

        self.usage = None;
        self.transcription_usage = None;
        self.transcription_model = None;
        self.state_tx.send_replace(ConnectionState::Connecting);
        let mut attempt = ConnectAttempt::new(&self.state_tx);

        match self.transport.open(audio).await {
            Ok(events) => {
                attempt.succeed();
                tracing::info!("realtime connection established");
                Ok(events)
            }
            Err(e) => {
                if e.is_credits() {
                    tracing::warn!("realtime connection refused: {}", e);
                } else {
                    tracing::error!("realtime connection failed: {:#}", e);
                }
                Err(e)
            }
        }
    }

    /// Closes the transport and captures the final usage counters.
    pub async fn disconnect(&mut self) -> Result<()> {
        let result = self.transport.close().await;
        self.usage = self.transport.usage();
        self.transcription_usage = self.transport.transcription_usage();
        self.transcription_model = self.transport.transcription_model();
        if self.state_tx.send_replace(ConnectionState::Stopped) != ConnectionState::Stopped {
            tracing::info!("realtime connection stopped");
        }
        result
    }

    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        self.transport.send_text(text.to_string()).await
    }

    /// Conversation token usage, available after [`disconnect`](Self::disconnect).
    pub fn usage(&self) -> Option<Usage> {
        self.usage.clone()
    }

    pub fn transcription_usage(&self) -> Option<TranscriptionUsage> {
        self.transcription_usage.clone()
    }

    pub fn transcription_model(&self) -> Option<String> {
        self.transcription_model.clone()
    }
}

/// Marks the connection stopped when the provider ends the session on its own.
///
/// The transport stays open until [`RealtimeConnection::disconnect`], which
/// still reads the final usage.
#[derive(Debug, Clone)]
pub struct CloseSignal {
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

impl CloseSignal {
    pub fn provider_closed(&self) {
        let stopped = self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Stopped;
                true
            } else {
                false
            }
        });
        if stopped {
            tracing::info!("realtime connection closed by provider");
        }
    }
}

/// Puts the state back to stopped unless the attempt succeeded.
struct ConnectAttempt<'a> {
    state_tx: &'a watch::Sender<ConnectionState>,
    succeeded: bool,
}

impl<'a> ConnectAttempt<'a> {
    fn new(state_tx: &'a watch::Sender<ConnectionState>) -> Self {
        Self {
            state_tx,
            succeeded: false,
        }
    }

    fn succeed(&mut self) {
        self.succeeded = true;
        self.state_tx.send_replace(ConnectionState::Connected);
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.succeeded {
            self.state_tx.send_replace(ConnectionState::Stopped);
        }
    }
}

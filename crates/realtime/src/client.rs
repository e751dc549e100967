use crate::client::error::ClientError;
use crate::client::stats::Stats;
use crate::types;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use mentor_realtime_types::audio::Base64EncodedAudioBytes;
use mentor_realtime_types::session::Session;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

pub(crate) mod config;
pub(crate) mod consts;
pub(crate) mod error;
pub(crate) mod stats;
mod utils;

pub type ClientTx = tokio::sync::mpsc::Sender<types::ClientEvent>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;

/// How long `disconnect` waits for the server to acknowledge the close frame.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// The operations the session layer needs from a realtime connection.
///
/// Implemented by [`Client`]; kept as a trait so adapters can be tested against a mock.
#[async_trait]
pub trait RealtimeClient: Send {
    async fn update_session(&mut self, config: Session) -> Result<(), ClientError>;
    async fn append_input_audio_buffer(
        &mut self,
        audio: Base64EncodedAudioBytes,
    ) -> Result<(), ClientError>;
    async fn create_conversation_item(&mut self, item: types::Item) -> Result<(), ClientError>;
    async fn create_response(&mut self) -> Result<(), ClientError>;
    async fn server_events(&mut self) -> Result<ServerRx, ClientError>;
    /// A cloneable sender for tasks that stream events (audio) independently.
    fn event_sender(&self) -> Result<ClientTx, ClientError>;
    fn stats(&self) -> Result<Stats, ClientError>;
    async fn disconnect(&mut self) -> Result<(), ClientError>;
}

// Contains the capacity for channels, client/server transmitters, configuration,
// and stats guarded by a Mutex.
pub struct Client {
    capacity: usize,
    config: config::Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: config::Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            shutdown_tx: None,
            writer: None,
            reader: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self) -> Result<(), ClientError> {
        if self.c_tx.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let request = utils::build_request(&self.config)?;

        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(error::from_handshake)?;

        // Split the WebSocket into read and write halves.
        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<types::ClientEvent>(self.capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        self.c_tx = Some(c_tx);
        self.s_tx = Some(s_tx.clone());
        self.shutdown_tx = Some(shutdown_tx);

        // Serialize outgoing client events until every sender is gone or shutdown is requested.
        self.writer = Some(tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = c_rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                    _ = &mut shutdown_rx => break,
                };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize event: {}", e);
                    }
                }
            }
            if let Err(e) = write.close().await {
                tracing::debug!("failed to close websocket cleanly: {}", e);
            }
        }));

        let stats = self.stats.clone();
        self.reader = Some(tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<types::ServerEvent>(&text) {
                        Ok(event) => {
                            record_usage(&stats, &event);
                            // No subscribers is not an error; events are simply dropped.
                            let _ = s_tx.send(event);
                        }
                        Err(e) => {
                            tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        let close_event = types::ServerEvent::Close {
                            reason: reason.map(|v| format!("{:?}", v)),
                        };
                        let _ = s_tx.send(close_event);
                        break;
                    }
                    _ => {}
                }
            }
        }));
        Ok(())
    }

    /// Send a client event.
    async fn send_client_event(&mut self, event: types::ClientEvent) -> Result<(), ClientError> {
        match self.c_tx {
            Some(ref tx) => tx.send(event).await.map_err(|_| ClientError::ChannelClosed),
            None => Err(ClientError::NotConnected),
        }
    }
}

/// Folds usage-bearing server events into the running totals.
fn record_usage(stats: &Mutex<Stats>, event: &types::ServerEvent) {
    let Ok(mut stats) = stats.lock() else {
        tracing::error!("failed to update stats");
        return;
    };
    match event {
        types::ServerEvent::ResponseDone(done) => {
            if let Some(usage) = done.response().usage() {
                tracing::debug!(
                    "total_tokens: {}, input_tokens: {}, output_tokens: {}",
                    usage.total_tokens,
                    usage.input_tokens,
                    usage.output_tokens
                );
                stats.update_usage(usage);
            }
        }
        types::ServerEvent::ConversationItemInputAudioTranscriptionCompleted(completed) => {
            if let Some(usage) = completed.usage() {
                stats.update_transcription_usage(usage);
            }
        }
        types::ServerEvent::SessionCreated(event) | types::ServerEvent::SessionUpdated(event) => {
            if let Some(model) = event.session().transcription_model() {
                stats.set_transcription_model(model.as_str());
            }
        }
        _ => {}
    }
}

#[async_trait]
impl RealtimeClient for Client {
    async fn update_session(&mut self, config: Session) -> Result<(), ClientError> {
        let event = types::ClientEvent::SessionUpdate(
            types::events::client::SessionUpdateEvent::new(config),
        );
        self.send_client_event(event).await
    }

    async fn append_input_audio_buffer(
        &mut self,
        audio: Base64EncodedAudioBytes,
    ) -> Result<(), ClientError> {
        let event = types::ClientEvent::InputAudioBufferAppend(
            types::events::client::InputAudioBufferAppendEvent::new(audio),
        );
        self.send_client_event(event).await
    }

    async fn create_conversation_item(&mut self, item: types::Item) -> Result<(), ClientError> {
        let event = types::ClientEvent::ConversationItemCreate(
            types::events::client::ConversationItemCreateEvent::new(item),
        );
        self.send_client_event(event).await
    }

    async fn create_response(&mut self) -> Result<(), ClientError> {
        let event =
            types::ClientEvent::ResponseCreate(types::events::client::ResponseCreateEvent::new());
        self.send_client_event(event).await
    }

    // Get a server receiver that we can use to receive server events.
    async fn server_events(&mut self) -> Result<ServerRx, ClientError> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(ClientError::NotConnected),
        }
    }

    fn event_sender(&self) -> Result<ClientTx, ClientError> {
        self.c_tx.clone().ok_or(ClientError::NotConnected)
    }

    fn stats(&self) -> Result<Stats, ClientError> {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .map_err(|_| ClientError::Stats)
    }

    async fn disconnect(&mut self) -> Result<(), ClientError> {
        self.c_tx = None;
        self.s_tx = None;
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                tracing::warn!("writer task ended abnormally: {}", e);
            }
        }
        if let Some(reader) = self.reader.take() {
            let abort = reader.abort_handle();
            if tokio::time::timeout(CLOSE_GRACE_PERIOD, reader).await.is_err() {
                tracing::debug!("server did not acknowledge close in time; dropping reader");
                abort.abort();
            }
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

// Public function to create a client with specific config and connect to OpenAI.
pub async fn connect_with_config(
    capacity: usize,
    config: config::Config,
) -> Result<Client, ClientError> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

// Public function to connect with default settings.
pub async fn connect() -> Result<Client, ClientError> {
    connect_with_config(consts::DEFAULT_CHANNEL_CAPACITY, config::Config::from_env()?).await
}

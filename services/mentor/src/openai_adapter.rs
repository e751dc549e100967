use crate::audio::encode_i16;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use mentor_core::{AudioStream, ConnectError, RealtimeTransport, Role, TransportEvent};
use mentor_realtime::types::audio::{ServerVadTurnDetection, TranscriptionModel, TurnDetection, Voice};
use mentor_realtime::types::events::client::InputAudioBufferAppendEvent;
use mentor_realtime::types::{
    ClientEvent, Item, MessageItem, MessageRole, ServerEvent, Session, TranscriptionUsage, Usage,
};
use mentor_realtime::{ClientError, ClientTx, RealtimeClient, ServerRx, Stats};
use secrecy::SecretString;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

const CLIENT_CHANNEL_CAPACITY: usize = 1024;
const EVENT_CHANNEL_CAPACITY: usize = 256;
const SESSION_READY_TIMEOUT: Duration = Duration::from_secs(15);
const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Conversation settings sent with every `session.update`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub instructions: String,
    pub voice: Voice,
    pub transcription_model: TranscriptionModel,
}

type Connector<C> = Box<dyn Fn() -> BoxFuture<'static, Result<C, ClientError>> + Send + Sync>;

/// An adapter that implements the provider-neutral `RealtimeTransport` for the
/// OpenAI Realtime API. It is generic over `RealtimeClient` so the websocket
/// client can be mocked in tests.
pub struct OpenAIAdapter<C: RealtimeClient> {
    connect: Connector<C>,
    settings: SessionSettings,
    ready_timeout: Duration,
    client: Option<C>,
    audio_task: Option<JoinHandle<()>>,
    event_task: Option<JoinHandle<()>>,
    final_stats: Option<Stats>,
}

impl OpenAIAdapter<mentor_realtime::Client> {
    pub fn new(api_key: SecretString, model: String, settings: SessionSettings) -> Self {
        Self::with_connector(settings, move || {
            let config = mentor_realtime::Config::new(api_key.clone()).with_model(&model);
            async move { mentor_realtime::connect_with_config(CLIENT_CHANNEL_CAPACITY, config).await }.boxed()
        })
    }
}

impl<C: RealtimeClient + 'static> OpenAIAdapter<C> {
    pub fn with_connector<F>(settings: SessionSettings, connect: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<C, ClientError>> + Send + Sync + 'static,
    {
        Self {
            connect: Box::new(connect),
            settings,
            ready_timeout: SESSION_READY_TIMEOUT,
            client: None,
            audio_task: None,
            event_task: None,
            final_stats: None,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    fn session_config(&self) -> Session {
        let turn_detection = TurnDetection::ServerVad(
            ServerVadTurnDetection::default()
                .with_create_response(true)
                .with_interrupt_response(true),
        );

        Session::new()
            .with_modalities_enable_audio()
            .with_instructions(&self.settings.instructions)
            .with_voice(self.settings.voice.clone())
            .with_pcm16_audio()
            .with_input_audio_transcription_enable(self.settings.transcription_model.clone())
            .with_turn_detection_enable(turn_detection)
            .build()
    }

    // Live counters while connected, the final snapshot after `close`.
    fn current_stats(&self) -> Option<Stats> {
        match &self.client {
            Some(client) => client.stats().ok(),
            None => self.final_stats.clone(),
        }
    }
}

#[async_trait]
impl<C: RealtimeClient + 'static> RealtimeTransport for OpenAIAdapter<C> {
    async fn open(&mut self, audio: AudioStream) -> Result<mpsc::Receiver<TransportEvent>, ConnectError> {
        if self.client.is_some() {
            return Err(anyhow!("OpenAI session is already open").into());
        }
        self.final_stats = None;

        let session = self.session_config();
        let ready_timeout = self.ready_timeout;
        let connecting = (self.connect)();
        let mut client = connecting.await.map_err(connect_error)?;

        let (server_rx, sender) = match negotiate(&mut client, session, ready_timeout).await {
            Ok(ready) => ready,
            Err(e) => {
                if let Err(close_err) = client.disconnect().await {
                    tracing::debug!("failed to close rejected session: {}", close_err);
                }
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.audio_task = Some(tokio::spawn(forward_audio(audio, sender)));
        self.event_task = Some(tokio::spawn(forward_events(server_rx, tx)));
        self.client = Some(client);
        tracing::info!("OpenAI realtime session ready");
        Ok(rx)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(audio) = self.audio_task.take() {
            audio.abort();
        }
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };

        let result = client
            .disconnect()
            .await
            .context("Failed to close OpenAI realtime session");
        match client.stats() {
            Ok(stats) => self.final_stats = Some(stats),
            Err(e) => tracing::warn!("usage counters unavailable after close: {}", e),
        }

        if let Some(mut events) = self.event_task.take() {
            if tokio::time::timeout(EVENT_DRAIN_TIMEOUT, &mut events).await.is_err() {
                tracing::debug!("event forwarder still running after close; aborting");
                events.abort();
            }
        }
        result
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| anyhow!("OpenAI session is not open"))?;

        let item = MessageItem::builder()
            .with_role(MessageRole::User)
            .with_input_text(&text)
            .build();

        client
            .create_conversation_item(Item::Message(item))
            .await
            .context("Adapter failed to create conversation item")?;

        client
            .create_response()
            .await
            .context("Adapter failed to trigger response")?;
        Ok(())
    }

    fn usage(&self) -> Option<Usage> {
        self.current_stats()
            .map(|stats| stats.usage().clone())
            .filter(|usage| !usage.is_empty())
    }

    fn transcription_usage(&self) -> Option<TranscriptionUsage> {
        self.current_stats()
            .map(|stats| stats.transcription_usage().clone())
            .filter(|usage| !usage.is_empty())
    }

    fn transcription_model(&self) -> Option<String> {
        self.current_stats()
            .and_then(|stats| stats.transcription_model().map(str::to_string))
            .or_else(|| Some(self.settings.transcription_model.as_str().to_string()))
    }
}

/// Handshake rejections for billing reasons keep their category.
fn connect_error(error: ClientError) -> ConnectError {
    if error.is_credit_rejection() {
        return ConnectError::InsufficientCredits(error.to_string());
    }
    ConnectError::Connection(anyhow::Error::new(error).context("Failed to connect to OpenAI Realtime API"))
}

/// Sends the session configuration and waits for the provider to accept it.
async fn negotiate<C: RealtimeClient>(
    client: &mut C,
    session: Session,
    ready_timeout: Duration,
) -> Result<(ServerRx, ClientTx), ConnectError> {
    let mut server_rx = client
        .server_events()
        .await
        .context("Failed to subscribe to server events")?;
    client
        .update_session(session)
        .await
        .context("Failed to configure realtime session")?;

    tokio::time::timeout(ready_timeout, wait_until_ready(&mut server_rx))
        .await
        .map_err(|_| anyhow!("timed out after {:?} waiting for session.updated", ready_timeout))??;

    let sender = client
        .event_sender()
        .context("Failed to get the client event sender")?;
    Ok((server_rx, sender))
}

async fn wait_until_ready(server_rx: &mut ServerRx) -> Result<(), ConnectError> {
    loop {
        match server_rx.recv().await {
            Ok(ServerEvent::SessionUpdated(_)) => return Ok(()),
            Ok(ServerEvent::SessionCreated(event)) => {
                tracing::debug!("session created: {:?}", event.session().id());
            }
            Ok(ServerEvent::Error(event)) => {
                let details = event.error();
                if details.is_quota_exhausted() {
                    return Err(ConnectError::InsufficientCredits(details.message().to_string()));
                }
                return Err(anyhow!("provider rejected the session: {}", details.message()).into());
            }
            Ok(ServerEvent::Close { reason }) => {
                return Err(anyhow!("connection closed before the session was ready: {:?}", reason).into());
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("skipped {} server events while negotiating", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(anyhow!("connection closed before the session was ready").into());
            }
        }
    }
}

async fn forward_audio(mut audio: AudioStream, sender: ClientTx) {
    while let Some(frame) = audio.recv().await {
        let event = ClientEvent::InputAudioBufferAppend(InputAudioBufferAppendEvent::new(encode_i16(&frame)));
        if sender.send(event).await.is_err() {
            tracing::debug!("client event channel closed; stopping audio forwarding");
            return;
        }
    }
    tracing::debug!("audio input ended");
}

async fn forward_events(mut server_rx: ServerRx, tx: mpsc::Sender<TransportEvent>) {
    loop {
        let event = match server_rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("transcript consumer lagged; {} server events lost", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let closing = matches!(event, ServerEvent::Close { .. });
        if let Some(event) = map_server_event(event) {
            if tx.send(event).await.is_err() {
                tracing::debug!("transport event receiver dropped, stopping adapter task.");
                return;
            }
        }
        if closing {
            return;
        }
    }
    let _ = tx.send(TransportEvent::Closed).await;
}

fn map_server_event(event: ServerEvent) -> Option<TransportEvent> {
    let mapped = match event {
        ServerEvent::InputAudioBufferSpeechStarted(e) => TransportEvent::TurnStarted {
            item_id: e.item_id().to_string(),
            role: Role::User,
        },
        ServerEvent::ConversationItemInputAudioTranscriptionDelta(e) => TransportEvent::TranscriptDelta {
            item_id: e.item_id().to_string(),
            role: Role::User,
            delta: e.delta().to_string(),
        },
        ServerEvent::ConversationItemInputAudioTranscriptionCompleted(e) => TransportEvent::TranscriptDone {
            item_id: e.item_id().to_string(),
            role: Role::User,
            text: e.transcript().trim().to_string(),
        },
        ServerEvent::ConversationItemInputAudioTranscriptionFailed(e) => TransportEvent::Error(format!(
            "transcription failed for {}: {}",
            e.item_id(),
            e.error().message()
        )),
        ServerEvent::ResponseAudioTranscriptDelta(e) => TransportEvent::TranscriptDelta {
            item_id: e.item_id().to_string(),
            role: Role::Agent,
            delta: e.delta().to_string(),
        },
        ServerEvent::ResponseAudioTranscriptDone(e) => TransportEvent::TranscriptDone {
            item_id: e.item_id().to_string(),
            role: Role::Agent,
            text: e.transcript().to_string(),
        },
        ServerEvent::Error(e) => TransportEvent::Error(e.error().message().to_string()),
        ServerEvent::Close { .. } => TransportEvent::Closed,
        _ => return None,
    };
    Some(mapped)
}

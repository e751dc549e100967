use crate::clock::Clock;
use crate::connection::{
    AudioStream, CloseSignal, ConnectionState, RealtimeConnection, RealtimeTransport, TransportEvent,
};
use crate::error::{ConnectError, SessionError, StartError};
use crate::history::HistoryStore;
use crate::persistence::{AutosaveHandle, DEFAULT_SAVE_INTERVAL, SaveOutcome, TranscriptSession};
use crate::transcript::{EntryStatus, Role};
use crate::usage::{UsageAggregator, UsageSink};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PUMP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Display names used for transcript entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    pub user: String,
    pub agent: String,
}

impl Participants {
    pub fn new(user: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            agent: agent.into(),
        }
    }

    pub fn name_for(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user,
            Role::Agent => &self.agent,
        }
    }
}

/// One voice conversation: realtime connection, live transcript, history
/// record and usage accounting.
pub struct ConversationSession<T, S, U, C> {
    connection: RealtimeConnection<T>,
    transcript: TranscriptSession<S, C>,
    usage: UsageAggregator<U, C>,
    participants: Participants,
    save_interval: Duration,
    autosave: Option<AutosaveHandle>,
    pump: Option<JoinHandle<()>>,
}

impl<T, S, U, C> ConversationSession<T, S, U, C>
where
    T: RealtimeTransport,
    S: HistoryStore,
    U: UsageSink,
    C: Clock,
{
    pub fn new(transport: T, store: Arc<S>, sink: Arc<U>, clock: C, participants: Participants) -> Self {
        Self {
            connection: RealtimeConnection::new(transport),
            transcript: TranscriptSession::new(store, clock.clone()),
            usage: UsageAggregator::new(sink, clock),
            participants,
            save_interval: DEFAULT_SAVE_INTERVAL,
            autosave: None,
            pump: None,
        }
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Handle to the live transcript.
    pub fn transcript(&self) -> TranscriptSession<S, C> {
        self.transcript.clone()
    }

    pub fn usage(&self) -> &UsageAggregator<U, C> {
        &self.usage
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_state(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
        self.connection.subscribe_state()
    }

    pub fn is_active(&self) -> bool {
        self.pump.as_ref().is_some_and(|pump| !pump.is_finished())
    }

    /// Creates the history record, connects and starts streaming `audio`.
    ///
    /// Returns the history entry id. On a connect failure the history record
    /// is kept so the caller can retry. A conversation the provider already
    /// closed is wound down (usage submitted) before reconnecting.
    pub async fn start(&mut self, module_id: &str, audio: AudioStream) -> Result<String, StartError> {
        let current = self.connection.state();
        if current != ConnectionState::Stopped {
            return Err(ConnectError::AlreadyActive(current).into());
        }
        if self.pump.is_some() {
            tracing::info!("previous conversation was closed by the provider; winding it down");
            self.wind_down().await;
        }

        let history_id = self.transcript.initialize_history_entry(module_id).await?;
        self.usage.start_session();

        let events = match self.connection.connect(audio).await {
            Ok(events) => events,
            Err(e) => {
                self.usage.cancel_session();
                return Err(e.into());
            }
        };

        self.autosave = Some(self.transcript.spawn_autosave(self.save_interval));
        self.pump = Some(tokio::spawn(pump_events(
            events,
            self.transcript.clone(),
            self.participants.clone(),
            self.connection.close_signal(),
        )));
        tracing::info!("conversation started for module {} (history {})", module_id, history_id);
        Ok(history_id)
    }

    pub async fn send_message(&mut self, text: &str) -> anyhow::Result<()> {
        self.connection.send_message(text).await
    }

    /// Ends the conversation: closes the connection, submits usage and stores
    /// the final transcript as completed.
    pub async fn finish(&mut self) -> Result<SaveOutcome, SessionError> {
        self.wind_down().await;
        let outcome = self.transcript.save_and_complete().await?;
        tracing::info!("conversation finished: {:?}", outcome);
        Ok(outcome)
    }

    /// Ends the conversation without marking it completed, e.g. when the
    /// caller bails out on an error. The transcript is saved best-effort.
    pub async fn shutdown(&mut self) {
        self.wind_down().await;
        self.transcript.teardown_save().await;
        tracing::info!("conversation shut down");
    }

    /// Discards the conversation and its history record.
    pub async fn abandon(&mut self) -> Result<(), SessionError> {
        self.stop_connection().await;
        self.usage.cancel_session();
        if let Some(autosave) = self.autosave.take() {
            autosave.stop();
        }
        let result = match self.transcript.delete_history_entry().await {
            Err(SessionError::NoHistoryEntry) => Ok(()),
            other => other,
        };
        self.transcript.clear_transcript();
        tracing::info!("conversation abandoned");
        result
    }

    /// Closes the connection, submits usage and stops autosave.
    async fn wind_down(&mut self) {
        self.stop_connection().await;
        self.usage
            .log_usage_metrics(
                self.connection.usage(),
                self.connection.transcription_usage(),
                self.connection.transcription_model(),
            )
            .await;
        if let Some(autosave) = self.autosave.take() {
            autosave.stop();
        }
    }

    async fn stop_connection(&mut self) {
        if let Err(e) = self.connection.disconnect().await {
            tracing::warn!("error while closing realtime connection: {:#}", e);
        }
        if let Some(mut pump) = self.pump.take() {
            if tokio::time::timeout(PUMP_DRAIN_TIMEOUT, &mut pump).await.is_err() {
                tracing::warn!("transcript event pump did not drain in time; aborting");
                pump.abort();
            }
        }
    }
}

impl<T, S, U, C> Drop for ConversationSession<T, S, U, C> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump_events<S: HistoryStore, C: Clock>(
    mut events: mpsc::Receiver<TransportEvent>,
    transcript: TranscriptSession<S, C>,
    participants: Participants,
    closed: CloseSignal,
) {
    while let Some(event) = events.recv().await {
        if apply_event(&transcript, &participants, event).is_break() {
            break;
        }
    }
    closed.provider_closed();
    tracing::debug!("transcript event pump stopped");
}

/// Applies one transport event to the transcript. Breaks on `Closed`.
pub fn apply_event<S: HistoryStore, C: Clock>(
    transcript: &TranscriptSession<S, C>,
    participants: &Participants,
    event: TransportEvent,
) -> ControlFlow<()> {
    match event {
        TransportEvent::TurnStarted { item_id, role } => {
            transcript.add_transcript_message(&item_id, participants.name_for(role), role, "", false);
        }
        TransportEvent::TranscriptDelta { item_id, role, delta } => {
            // Agent deltas can arrive before anything announced the turn.
            if !transcript.contains(&item_id) {
                transcript.add_transcript_message(&item_id, participants.name_for(role), role, "", false);
            }
            transcript.update_transcript_message(&item_id, &delta, true);
        }
        TransportEvent::TranscriptDone { item_id, role, text } => {
            if transcript.contains(&item_id) {
                transcript.update_transcript_message(&item_id, &text, false);
            } else {
                transcript.add_transcript_message(&item_id, participants.name_for(role), role, &text, false);
            }
            transcript.update_transcript_entry_status(&item_id, EntryStatus::Done);
        }
        TransportEvent::Error(message) => {
            tracing::warn!("realtime provider reported an error: {}", message);
        }
        TransportEvent::Closed => {
            tracing::info!("realtime provider closed the conversation");
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::connection::MockRealtimeTransport;
    use crate::history::MockHistoryStore;
    use crate::usage::MockUsageSink;
    use anyhow::anyhow;
    use mentor_realtime_types::{TranscriptionUsage, Usage};

    fn participants() -> Participants {
        Participants::new("Alice", "Mentor")
    }

    fn store_with_history() -> MockHistoryStore {
        let mut store = MockHistoryStore::new();
        store
            .expect_create_history_entry()
            .times(1)
            .returning(|_| Ok("history-1".to_string()));
        store
    }

    fn audio() -> AudioStream {
        mpsc::channel(1).1
    }

    #[test]
    fn deltas_create_missing_entries_and_done_finalizes_them() {
        let transcript = TranscriptSession::new(Arc::new(MockHistoryStore::new()), ManualClock::new());
        let names = participants();
        let events = [
            TransportEvent::TurnStarted {
                item_id: "u1".into(),
                role: Role::User,
            },
            TransportEvent::TranscriptDelta {
                item_id: "a1".into(),
                role: Role::Agent,
                delta: "Hel".into(),
            },
            TransportEvent::TranscriptDelta {
                item_id: "a1".into(),
                role: Role::Agent,
                delta: "lo".into(),
            },
            TransportEvent::TranscriptDone {
                item_id: "u1".into(),
                role: Role::User,
                text: "Hi there".into(),
            },
            TransportEvent::Error("rate limited".into()),
        ];
        for event in events {
            assert!(apply_event(&transcript, &names, event).is_continue());
        }

        let entries = transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].participant_name, "Alice");
        assert_eq!(entries[0].text, "Hi there");
        assert_eq!(entries[0].status, EntryStatus::Done);
        assert_eq!(entries[1].participant_name, "Mentor");
        assert_eq!(entries[1].text, "Hello");
        assert_eq!(entries[1].status, EntryStatus::InProgress);
        assert!(apply_event(&transcript, &names, TransportEvent::Closed).is_break());
    }

    #[tokio::test]
    async fn finished_conversation_is_saved_complete_with_usage() {
        let (events_tx, events_rx) = mpsc::channel(8);
        let mut transport = MockRealtimeTransport::new();
        transport.expect_open().return_once(move |_| Ok(events_rx));
        transport.expect_close().times(1).returning(|| Ok(()));
        transport.expect_usage().returning(|| {
            Some(Usage {
                total_tokens: 120,
                ..Default::default()
            })
        });
        transport.expect_transcription_usage().returning(|| {
            Some(TranscriptionUsage {
                total_tokens: 8,
                ..Default::default()
            })
        });
        transport
            .expect_transcription_model()
            .returning(|| Some("whisper-1".to_string()));

        let mut store = store_with_history();
        store
            .expect_update_history_entry()
            .withf(|update| {
                update.completed_at.is_some()
                    && update.transcript_text.as_deref() == Some("Alice: Hello\nMentor: Hi Alice")
            })
            .times(1)
            .returning(|_| Ok(()));
        let mut sink = MockUsageSink::new();
        sink.expect_update_conversation_usage()
            .withf(|record| record.usage.total_tokens == 120)
            .times(1)
            .returning(|_| Ok(()));
        sink.expect_update_transcription_usage()
            .withf(|record| record.model.as_deref() == Some("whisper-1"))
            .times(1)
            .returning(|_| Ok(()));

        let mut session = ConversationSession::new(
            transport,
            Arc::new(store),
            Arc::new(sink),
            ManualClock::new(),
            participants(),
        );
        let id = session.start("module-7", audio()).await.unwrap();
        assert_eq!(id, "history-1");
        assert_eq!(session.state(), ConnectionState::Connected);

        for event in [
            TransportEvent::TranscriptDone {
                item_id: "u1".into(),
                role: Role::User,
                text: "Hello".into(),
            },
            TransportEvent::TranscriptDelta {
                item_id: "a1".into(),
                role: Role::Agent,
                delta: "Hi ".into(),
            },
            TransportEvent::TranscriptDone {
                item_id: "a1".into(),
                role: Role::Agent,
                text: "Hi Alice".into(),
            },
            TransportEvent::Closed,
        ] {
            events_tx.send(event).await.unwrap();
        }

        let outcome = session.finish().await.unwrap();

        assert_eq!(outcome, SaveOutcome::Written);
        assert_eq!(session.state(), ConnectionState::Stopped);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn credit_failure_keeps_category_and_cancels_usage() {
        let mut transport = MockRealtimeTransport::new();
        transport
            .expect_open()
            .returning(|_| Err(ConnectError::InsufficientCredits("insufficient_quota".into())));
        let mut sink = MockUsageSink::new();
        sink.expect_update_conversation_usage().never();
        let mut session = ConversationSession::new(
            transport,
            Arc::new(store_with_history()),
            Arc::new(sink),
            ManualClock::new(),
            participants(),
        );

        let err = session.start("module-7", audio()).await.unwrap_err();

        assert!(matches!(err, StartError::Connect(ref e) if e.is_credits()));
        assert_eq!(session.state(), ConnectionState::Stopped);
        assert!(session.usage().session_start().is_none());
        assert!(!session.is_active());
        assert_eq!(session.transcript().history_entry_id().as_deref(), Some("history-1"));
    }

    #[tokio::test]
    async fn history_failure_prevents_connecting() {
        let mut transport = MockRealtimeTransport::new();
        transport.expect_open().never();
        let mut store = MockHistoryStore::new();
        store
            .expect_create_history_entry()
            .returning(|_| Err(anyhow!("history service unavailable")));
        let mut session = ConversationSession::new(
            transport,
            Arc::new(store),
            Arc::new(MockUsageSink::new()),
            ManualClock::new(),
            participants(),
        );

        let err = session.start("module-7", audio()).await.unwrap_err();

        assert!(matches!(err, StartError::History(SessionError::Store(_))));
        assert!(session.usage().session_start().is_none());
    }

    #[tokio::test]
    async fn abandoning_deletes_the_record_without_usage() {
        let (events_tx, events_rx) = mpsc::channel::<TransportEvent>(1);
        let mut transport = MockRealtimeTransport::new();
        transport.expect_open().return_once(move |_| Ok(events_rx));
        transport.expect_close().times(1).returning(|| Ok(()));
        transport.expect_usage().returning(|| None);
        transport.expect_transcription_usage().returning(|| None);
        transport.expect_transcription_model().returning(|| None);
        let mut store = store_with_history();
        store
            .expect_delete_history_entry()
            .withf(|id| id == "history-1")
            .times(1)
            .returning(|_| Ok(()));
        let mut sink = MockUsageSink::new();
        sink.expect_update_conversation_usage().never();
        sink.expect_update_transcription_usage().never();
        let mut session = ConversationSession::new(
            transport,
            Arc::new(store),
            Arc::new(sink),
            ManualClock::new(),
            participants(),
        );

        session.start("module-7", audio()).await.unwrap();
        drop(events_tx);
        session.abandon().await.unwrap();

        assert!(session.transcript().history_entry_id().is_none());
        assert!(session.transcript().entries().is_empty());
    }

    #[tokio::test]
    async fn starting_while_connected_keeps_the_running_usage_session() {
        let (events_tx, events_rx) = mpsc::channel::<TransportEvent>(4);
        let mut transport = MockRealtimeTransport::new();
        transport.expect_open().times(1).return_once(move |_| Ok(events_rx));
        transport.expect_close().times(1).returning(|| Ok(()));
        transport.expect_usage().returning(|| {
            Some(Usage {
                total_tokens: 50,
                ..Default::default()
            })
        });
        transport.expect_transcription_usage().returning(|| None);
        transport.expect_transcription_model().returning(|| None);
        let mut store = store_with_history();
        store.expect_update_history_entry().returning(|_| Ok(()));
        let mut sink = MockUsageSink::new();
        sink.expect_update_conversation_usage()
            .withf(|record| record.usage.total_tokens == 50)
            .times(1)
            .returning(|_| Ok(()));
        sink.expect_update_transcription_usage().never();
        let mut session = ConversationSession::new(
            transport,
            Arc::new(store),
            Arc::new(sink),
            ManualClock::new(),
            participants(),
        );

        session.start("module-7", audio()).await.unwrap();
        let started_at = session.usage().session_start();
        assert!(started_at.is_some());

        let err = session.start("module-7", audio()).await.unwrap_err();

        assert!(matches!(
            err,
            StartError::Connect(ConnectError::AlreadyActive(ConnectionState::Connected))
        ));
        assert_eq!(session.usage().session_start(), started_at);
        assert_eq!(session.state(), ConnectionState::Connected);

        drop(events_tx);
        session.finish().await.unwrap();
    }

    #[tokio::test]
    async fn provider_close_stops_the_connection_and_allows_restarting() {
        let (first_tx, first_rx) = mpsc::channel::<TransportEvent>(4);
        let (second_tx, second_rx) = mpsc::channel::<TransportEvent>(4);
        let feeds = std::sync::Mutex::new(vec![second_rx, first_rx]);
        let mut transport = MockRealtimeTransport::new();
        transport
            .expect_open()
            .times(2)
            .returning(move |_| Ok(feeds.lock().unwrap().pop().unwrap()));
        transport.expect_close().times(2).returning(|| Ok(()));
        transport.expect_usage().returning(|| {
            Some(Usage {
                total_tokens: 40,
                ..Default::default()
            })
        });
        transport.expect_transcription_usage().returning(|| None);
        transport.expect_transcription_model().returning(|| None);
        let mut store = store_with_history();
        store
            .expect_update_history_entry()
            .withf(|update| update.completed_at.is_some())
            .times(1)
            .returning(|_| Ok(()));
        let mut sink = MockUsageSink::new();
        // One record per connection: the closed one and the restarted one.
        sink.expect_update_conversation_usage()
            .times(2)
            .returning(|_| Ok(()));
        let mut session = ConversationSession::new(
            transport,
            Arc::new(store),
            Arc::new(sink),
            ManualClock::new(),
            participants(),
        );

        session.start("module-7", audio()).await.unwrap();
        let mut states = session.subscribe_state();
        first_tx.send(TransportEvent::Closed).await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            states.wait_for(|state| *state == ConnectionState::Stopped),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(session.state(), ConnectionState::Stopped);

        let id = session.start("module-7", audio()).await.unwrap();

        assert_eq!(id, "history-1");
        assert_eq!(session.state(), ConnectionState::Connected);
        drop(second_tx);
        session.finish().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_saves_the_transcript_without_completing_it() {
        let (events_tx, events_rx) = mpsc::channel(4);
        let mut transport = MockRealtimeTransport::new();
        transport.expect_open().return_once(move |_| Ok(events_rx));
        transport.expect_close().times(1).returning(|| Ok(()));
        transport.expect_usage().returning(|| {
            Some(Usage {
                total_tokens: 10,
                ..Default::default()
            })
        });
        transport.expect_transcription_usage().returning(|| None);
        transport.expect_transcription_model().returning(|| None);
        let mut store = store_with_history();
        store
            .expect_update_history_entry()
            .withf(|update| {
                update.completed_at.is_none() && update.transcript_text.as_deref() == Some("Alice: Hello")
            })
            .times(1)
            .returning(|_| Ok(()));
        let mut sink = MockUsageSink::new();
        sink.expect_update_conversation_usage()
            .times(1)
            .returning(|_| Ok(()));
        let mut session = ConversationSession::new(
            transport,
            Arc::new(store),
            Arc::new(sink),
            ManualClock::new(),
            participants(),
        );

        session.start("module-7", audio()).await.unwrap();
        events_tx
            .send(TransportEvent::TranscriptDone {
                item_id: "u1".into(),
                role: Role::User,
                text: "Hello".into(),
            })
            .await
            .unwrap();
        drop(events_tx);

        session.shutdown().await;

        assert_eq!(session.state(), ConnectionState::Stopped);
        assert_eq!(session.transcript().history_entry_id().as_deref(), Some("history-1"));
        assert!(session.usage().session_start().is_none());
    }
}

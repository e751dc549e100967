use crate::clock::Clock;
use crate::error::SessionError;
use crate::history::{HistoryStore, HistoryUpdate};
use crate::transcript::{EntryStatus, Role, TranscriptBuffer, TranscriptEntry};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(30);
const MIN_SAVE_INTERVAL: Duration = Duration::from_secs(1);

/// What a call to [`TranscriptSession::save_transcript`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No history record exists yet; nothing to save into.
    NoHistoryEntry,
    /// The buffer is empty or unchanged since the last write.
    Skipped,
    /// The transcript was unchanged, only the completion time was written.
    CompletedOnly,
    /// The full transcript was written.
    Written,
}

#[derive(Debug, Default)]
struct SessionState {
    buffer: TranscriptBuffer,
    history_entry_id: Option<String>,
    last_saved_snapshot: Option<String>,
    last_saved_at: Option<DateTime<Utc>>,
    completed: bool,
}

struct Shared<S, C> {
    store: Arc<S>,
    clock: C,
    state: Mutex<SessionState>,
    // Serializes writes so a slow save never races a later one.
    save_gate: tokio::sync::Mutex<()>,
    init_gate: tokio::sync::Mutex<()>,
    saving: AtomicBool,
}

/// The live transcript of one conversation and its link to a durable history record.
///
/// Cheap to clone: every clone is a handle to the same session, so the realtime
/// event pump, the autosave task and UI code can each hold one.
pub struct TranscriptSession<S, C> {
    shared: Arc<Shared<S, C>>,
}

impl<S, C> Clone for TranscriptSession<S, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: HistoryStore, C: Clock> TranscriptSession<S, C> {
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                clock,
                state: Mutex::new(SessionState::default()),
                save_gate: tokio::sync::Mutex::new(()),
                init_gate: tokio::sync::Mutex::new(()),
                saving: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_transcript_message(
        &self,
        entry_id: &str,
        participant_name: &str,
        role: Role,
        text: &str,
        hidden: bool,
    ) -> bool {
        let now = self.shared.clock.now();
        self.state()
            .buffer
            .add_transcript_message(entry_id, participant_name, role, text, hidden, now)
    }

    pub fn update_transcript_message(&self, entry_id: &str, new_text: &str, is_delta: bool) -> bool {
        self.state()
            .buffer
            .update_transcript_message(entry_id, new_text, is_delta)
    }

    pub fn update_transcript_entry_status(&self, entry_id: &str, status: EntryStatus) -> bool {
        self.state()
            .buffer
            .update_transcript_entry_status(entry_id, status)
    }

    /// Empties the buffer and forgets the history record and save bookkeeping.
    pub fn clear_transcript(&self) {
        let mut state = self.state();
        *state = SessionState::default();
    }

    pub fn contains(&self, entry_id: &str) -> bool {
        self.state().buffer.contains(entry_id)
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.state().buffer.entries().to_vec()
    }

    pub fn formatted_text(&self) -> String {
        self.state().buffer.format_text()
    }

    pub fn history_entry_id(&self) -> Option<String> {
        self.state().history_entry_id.clone()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.state().last_saved_at
    }

    pub fn is_auto_saving(&self) -> bool {
        self.shared.saving.load(Ordering::SeqCst)
    }

    /// Creates the durable record for this conversation.
    ///
    /// Calling it again for the same session returns the existing id instead of
    /// creating a second record.
    pub async fn initialize_history_entry(&self, module_id: &str) -> Result<String, SessionError> {
        let _init = self.shared.init_gate.lock().await;
        if let Some(id) = self.history_entry_id() {
            tracing::warn!("history entry {} already initialized; reusing it", id);
            return Ok(id);
        }

        let id = self.shared.store.create_history_entry(module_id).await?;
        tracing::info!("created history entry {} for module {}", id, module_id);

        let mut state = self.state();
        state.history_entry_id = Some(id.clone());
        state.last_saved_snapshot = None;
        state.last_saved_at = None;
        state.completed = false;
        Ok(id)
    }

    /// Writes the transcript if it changed since the last write.
    ///
    /// With `is_complete` the record is also stamped as completed; if the
    /// transcript itself is unchanged only the completion time is sent.
    pub async fn save_transcript(&self, is_complete: bool) -> Result<SaveOutcome, SessionError> {
        let _gate = self.shared.save_gate.lock().await;
        self.save_locked(is_complete).await
    }

    pub async fn save_and_complete(&self) -> Result<SaveOutcome, SessionError> {
        self.save_transcript(true).await
    }

    /// Periodic save: skipped if another save is in flight, failures are only logged.
    pub async fn save_in_background(&self) {
        let Ok(_gate) = self.shared.save_gate.try_lock() else {
            tracing::debug!("previous transcript save still in flight; skipping this tick");
            return;
        };
        match self.save_locked(false).await {
            Ok(outcome) => tracing::debug!("background transcript save: {:?}", outcome),
            Err(e) => tracing::error!("background transcript save failed: {:#}", e),
        }
    }

    /// Final best-effort save when the conversation view goes away.
    pub async fn teardown_save(&self) {
        if let Err(e) = self.save_transcript(false).await {
            tracing::error!("failed to save transcript on teardown: {:#}", e);
        }
    }

    pub async fn delete_history_entry(&self) -> Result<(), SessionError> {
        let _gate = self.shared.save_gate.lock().await;
        let id = self.history_entry_id().ok_or(SessionError::NoHistoryEntry)?;

        self.shared.store.delete_history_entry(&id).await?;
        tracing::info!("deleted history entry {}", id);

        let mut state = self.state();
        if state.history_entry_id.as_deref() == Some(id.as_str()) {
            state.history_entry_id = None;
            state.last_saved_snapshot = None;
            state.last_saved_at = None;
            state.completed = false;
        }
        Ok(())
    }

    /// Starts saving every `period` while a history record is set.
    pub fn spawn_autosave(&self, period: Duration) -> AutosaveHandle {
        let session = self.clone();
        let period = period.max(MIN_SAVE_INTERVAL);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if session.history_entry_id().is_some() {
                    session.save_in_background().await;
                }
            }
        });
        AutosaveHandle { task }
    }

    // Caller must hold `save_gate`.
    async fn save_locked(&self, is_complete: bool) -> Result<SaveOutcome, SessionError> {
        let now = self.shared.clock.now();
        let (id, snapshot, update, completing, unchanged) = {
            let state = self.state();
            let Some(id) = state.history_entry_id.clone() else {
                return Ok(SaveOutcome::NoHistoryEntry);
            };
            let completing = is_complete && !state.completed;
            if state.buffer.is_empty() && !completing {
                return Ok(SaveOutcome::Skipped);
            }

            let snapshot = state.buffer.snapshot()?;
            let unchanged = state.last_saved_snapshot.as_deref() == Some(snapshot.as_str());
            if unchanged && !completing {
                return Ok(SaveOutcome::Skipped);
            }

            let mut update = HistoryUpdate::new(&id);
            if completing {
                update.completed_at = Some(now);
            }
            if !unchanged {
                update.transcript = Some(state.buffer.entries().to_vec());
                update.transcript_text = Some(state.buffer.format_text());
            }
            (id, snapshot, update, completing, unchanged)
        };

        {
            let _saving = SavingFlag::raise(&self.shared.saving);
            self.shared.store.update_history_entry(update).await?;
        }

        let mut state = self.state();
        // A clear or delete may have happened while the write was in flight.
        if state.history_entry_id.as_deref() == Some(id.as_str()) {
            state.last_saved_snapshot = Some(snapshot);
            state.last_saved_at = Some(now);
            if completing {
                state.completed = true;
            }
        }

        if unchanged {
            tracing::debug!("marked history entry {} complete", id);
            Ok(SaveOutcome::CompletedOnly)
        } else {
            tracing::debug!("saved transcript to history entry {}", id);
            Ok(SaveOutcome::Written)
        }
    }
}

struct SavingFlag<'a>(&'a AtomicBool);

impl<'a> SavingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for SavingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the periodic save task; the task stops when this is stopped or dropped.
#[derive(Debug)]
pub struct AutosaveHandle {
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

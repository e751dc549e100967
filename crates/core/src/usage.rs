use crate::clock::Clock;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mentor_realtime_types::{TranscriptionUsage, Usage};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUsageRecord {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionUsageRecord {
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub usage: TranscriptionUsage,
}

/// Receives usage records for billing.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsageSink: Send + Sync + 'static {
    async fn update_conversation_usage(&self, record: ConversationUsageRecord) -> Result<()>;

    async fn update_transcription_usage(&self, record: TranscriptionUsageRecord) -> Result<()>;
}

/// Which records a [`UsageAggregator::log_usage_metrics`] call managed to submit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageReport {
    pub conversation_submitted: bool,
    pub transcription_submitted: bool,
}

/// Collects the usage of one conversation and submits it once when it ends.
pub struct UsageAggregator<U, C> {
    sink: Arc<U>,
    clock: C,
    session_start: Mutex<Option<DateTime<Utc>>>,
}

impl<U: UsageSink, C: Clock> UsageAggregator<U, C> {
    pub fn new(sink: Arc<U>, clock: C) -> Self {
        Self {
            sink,
            clock,
            session_start: Mutex::new(None),
        }
    }

    /// Marks the start of a session. Calling it again restarts the clock.
    pub fn start_session(&self) {
        let now = self.clock.now();
        *self.start_slot() = Some(now);
        tracing::debug!("usage session started at {}", now);
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        *self.start_slot()
    }

    /// Forgets a started session without submitting anything.
    pub fn cancel_session(&self) {
        self.start_slot().take();
    }

    /// Submits the conversation and transcription usage of the current session.
    ///
    /// Without a prior [`start_session`](Self::start_session) nothing is sent and
    /// `None` is returned. Each record is submitted independently; a failure is
    /// logged and does not stop the other one. The session is closed either way.
    pub async fn log_usage_metrics(
        &self,
        usage: Option<Usage>,
        transcription_usage: Option<TranscriptionUsage>,
        transcription_model: Option<String>,
    ) -> Option<UsageReport> {
        let Some(started_at) = self.start_slot().take() else {
            tracing::warn!("usage metrics logged without a started session; ignoring");
            return None;
        };
        let ended_at = self.clock.now();
        let duration_seconds = (ended_at - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let mut report = UsageReport::default();

        if let Some(usage) = usage {
            let record = ConversationUsageRecord {
                started_at,
                ended_at,
                duration_seconds,
                usage,
            };
            match self.sink.update_conversation_usage(record).await {
                Ok(()) => report.conversation_submitted = true,
                Err(e) => tracing::error!("failed to submit conversation usage: {:#}", e),
            }
        }

        if let Some(usage) = transcription_usage {
            let record = TranscriptionUsageRecord {
                model: transcription_model,
                started_at,
                ended_at,
                duration_seconds,
                usage,
            };
            match self.sink.update_transcription_usage(record).await {
                Ok(()) => report.transcription_submitted = true,
                Err(e) => tracing::error!("failed to submit transcription usage: {:#}", e),
            }
        }

        tracing::info!(
            "usage for {:.1}s session submitted: conversation={}, transcription={}",
            duration_seconds,
            report.conversation_submitted,
            report.transcription_submitted
        );
        Some(report)
    }

    fn start_slot(&self) -> std::sync::MutexGuard<'_, Option<DateTime<Utc>>> {
        self.session_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

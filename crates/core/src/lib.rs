//! Provider-independent runtime for a voice mentoring conversation.
//!
//! [`ConversationSession`] ties together a realtime voice connection, the live
//! transcript and its durable history record, and per-conversation usage
//! accounting. Storage, billing and the AI provider are injected through the
//! [`HistoryStore`], [`UsageSink`] and [`RealtimeTransport`] traits.

pub mod clock;
pub mod connection;
pub mod error;
pub mod history;
pub mod persistence;
pub mod session;
pub mod transcript;
pub mod usage;

pub use clock::{Clock, SystemClock};
pub use connection::{AudioStream, CloseSignal, ConnectionState, RealtimeConnection, RealtimeTransport, TransportEvent};
pub use error::{ConnectError, SessionError, StartError};
pub use history::{HistoryStore, HistoryUpdate};
pub use persistence::{AutosaveHandle, DEFAULT_SAVE_INTERVAL, SaveOutcome, TranscriptSession};
pub use session::{ConversationSession, Participants};
pub use transcript::{EntryStatus, Role, TranscriptBuffer, TranscriptEntry, format_transcript};
pub use usage::{ConversationUsageRecord, TranscriptionUsageRecord, UsageAggregator, UsageReport, UsageSink};

//! Wire types for the OpenAI Realtime API events this workspace uses.
pub mod audio;
pub mod content;
pub mod error;
pub mod events;
pub mod session;
pub mod usage;

pub use content::{ContentPart, Item, MessageItem, MessageRole};
pub use error::ErrorDetails;
pub use events::{ClientEvent, ServerEvent};
pub use session::Session;
pub use usage::{TranscriptionUsage, Usage};

pub mod audio;
pub mod config;
pub mod http_store;
pub mod openai_adapter;

pub use mentor_realtime::types as llm_types;

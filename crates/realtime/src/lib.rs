mod client;

pub use client::config::Config;
pub use client::error::ClientError;
pub use client::stats::Stats;
pub use client::{Client, ClientTx, RealtimeClient, ServerRx, connect, connect_with_config};
pub use mentor_realtime_types as types;

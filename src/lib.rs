//! Self-hosted WakaTime backend: heartbeat ingestion and session-windowed
//! time summaries.

pub mod agent;
pub mod aggregate;
pub mod api;
pub mod config;
pub mod date;
pub mod db;
pub mod error;
pub mod model;
pub mod normalize;
pub mod service;

pub use error::{Error, Result};
pub use model::{Heartbeat, RawHeartbeat, Summary};
pub use service::HeartbeatService;

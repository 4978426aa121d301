pub mod api;
pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod state;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use api::{ApiClient, ChatApi, ChatReply, HealthReport, KnowledgeReply, Stats};
pub use chat::{Answered, ChatClient, ChatOutcome, ClearOutcome, Confirm, PendingChat};
pub use config::{Config, Settings};
pub use error::ApiError;
pub use state::{ConversationView, Draft, Entry, Message, Sender, SessionStatus, StatusKind};

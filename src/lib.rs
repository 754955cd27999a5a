pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod session;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use client::{CompletionRequest, CompletionService, OpenRouterClient, PendingRequest};
pub use config::Config;
pub use error::ChatError;
pub use message::{ChatMessage, ChatRole};
pub use session::{ChatSession, SessionState, Submission};

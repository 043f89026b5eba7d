pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod intent;
pub mod models;
pub mod repl;
pub mod reply;
pub mod service;
pub mod summary;
pub mod transport;

pub use crate::config::Config;
pub use crate::conversation::{Conversation, SessionStore};
pub use crate::error::{Result, SupportError};
pub use crate::intent::IntentLabel;
pub use crate::models::{Message, Role};
pub use crate::service::{SupportService, TurnOutcome};

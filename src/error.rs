use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the support pipeline.
///
/// A missing API key is deliberately absent here: the model client reports it
/// as a sentinel reply so the conversation keeps going.
#[derive(Error, Debug)]
pub enum SupportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Unknown session {0}")]
    UnknownSession(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SupportError>;

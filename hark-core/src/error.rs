//! Error types for Hark

use thiserror::Error;

/// Result type alias using Hark's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in Hark
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// The speech recognition service could not be reached
    #[error("Speech service unavailable: {0}")]
    SpeechNetwork(String),

    /// The input source has no more utterances (e.g. stdin closed)
    #[error("Input closed")]
    InputClosed,

    #[error("Could not launch {target}: {reason}")]
    Launch { target: String, reason: String },

    #[error("Mail authentication failed: {0}")]
    MailAuth(String),

    #[error("Mail transport failed: {0}")]
    MailTransport(String),

    #[error("Invalid mail address: {0}")]
    InvalidAddress(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Reminder scheduler is stopped")]
    SchedulerStopped,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid command pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

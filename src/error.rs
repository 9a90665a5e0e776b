//! Error types for the Rigo avatar

use thiserror::Error;

/// Result type alias for avatar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the avatar core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The expressive state actor is gone
    #[error("state error: {0}")]
    State(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Assistant error
    #[error("assistant error: {0}")]
    Assistant(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Wake word detector error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

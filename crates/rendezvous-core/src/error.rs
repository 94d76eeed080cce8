//! Error types shared by the relay and its transform adapter

use thiserror::Error;

/// SDP transform errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdpError {
    #[error("line {line}: expected `<type>=<value>`, got {text:?}")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: invalid {field}: {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("invalid candidate: {0}")]
    InvalidCandidate(String),

    #[error("structured description rejected: {0}")]
    InvalidDescription(String),
}

/// Request addressing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing session id")]
    MissingSession,

    #[error("missing participant id")]
    MissingParticipant,

    #[error("missing recipient id")]
    MissingRecipient,
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("No configuration directory available")]
    NoConfigDir,
}

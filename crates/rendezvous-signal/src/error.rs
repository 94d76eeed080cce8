//! Relay error taxonomy

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use rendezvous_core::{AddressError, SdpError};

/// Errors surfaced by the relay
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("malformed address: {0}")]
    MalformedAddress(#[from] AddressError),

    #[error("session {session} is full")]
    SessionFull { session: String },

    #[error("unknown recipient {recipient} in session {session}")]
    UnknownRecipient { session: String, recipient: String },

    #[error("transform failed: {0}")]
    TransformFailure(#[from] TransformError),

    #[error("presence channel closed")]
    ChannelClosed,

    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("method {0} not allowed")]
    MethodNotAllowed(String),
}

impl SignalError {
    /// HTTP status reported to the caller
    pub fn status(&self) -> StatusCode {
        match self {
            SignalError::MalformedAddress(_)
            | SignalError::UnknownRecipient { .. }
            | SignalError::Body(_) => StatusCode::BAD_REQUEST,
            SignalError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SignalError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            // Answered with a `busy` event stream, not an error status
            SignalError::SessionFull { .. } => StatusCode::OK,
            SignalError::TransformFailure(_) | SignalError::ChannelClosed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for SignalError {
    fn into_response(self) -> Response {
        (self.status(), [(header::CONTENT_TYPE, "text/plain")]).into_response()
    }
}

/// Payload transform failures; never surfaced to either peer
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sdp(#[from] SdpError),

    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

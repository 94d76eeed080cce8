//! Request addressing
//!
//! Channel requests are addressed by path:
//! `/{subscribe|post}/{session}/{participant}[/{recipient}]`.
//! `stoc` and `ctos` are accepted as aliases for older clients.

use crate::error::AddressError;

/// Channel operation named by the first path segment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Open the participant's presence channel
    Subscribe,
    /// Relay a payload to another participant
    Post,
}

impl Operation {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "subscribe" | "stoc" => Some(Operation::Subscribe),
            "post" | "ctos" => Some(Operation::Post),
            _ => None,
        }
    }
}

/// A parsed channel address
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Subscribe {
        session: String,
        participant: String,
    },
    Post {
        session: String,
        sender: String,
        recipient: String,
    },
}

impl Address {
    /// Parse a request path.
    ///
    /// Returns `Ok(None)` when the path does not name a channel operation,
    /// so the caller can fall through to static content.
    pub fn parse(path: &str) -> Result<Option<Self>, AddressError> {
        let path = path.split('?').next().unwrap_or_default();
        let mut parts = path.trim_start_matches('/').split('/');

        let Some(operation) = parts.next().and_then(Operation::from_segment) else {
            return Ok(None);
        };

        let session = non_empty(parts.next()).ok_or(AddressError::MissingSession)?;
        let participant = non_empty(parts.next()).ok_or(AddressError::MissingParticipant)?;

        let address = match operation {
            Operation::Subscribe => Address::Subscribe {
                session,
                participant,
            },
            Operation::Post => Address::Post {
                session,
                sender: participant,
                recipient: non_empty(parts.next()).ok_or(AddressError::MissingRecipient)?,
            },
        };
        Ok(Some(address))
    }

    /// Operation this address targets
    pub fn operation(&self) -> Operation {
        match self {
            Address::Subscribe { .. } => Operation::Subscribe,
            Address::Post { .. } => Operation::Post,
        }
    }

    /// Session id
    pub fn session(&self) -> &str {
        match self {
            Address::Subscribe { session, .. } | Address::Post { session, .. } => session,
        }
    }
}

fn non_empty(segment: Option<&str>) -> Option<String> {
    segment.filter(|s| !s.is_empty()).map(str::to_owned)
}

//! Event-stream wire framing
//!
//! Everything the relay pushes down a presence channel is one of these
//! events, encoded as a `text/event-stream` frame:
//!
//! ```text
//! event:join\ndata:<participant>\n\n
//! event:leave\ndata:<participant>\n\n
//! event:busy\ndata:<session>\n\n
//! event:user-<sender>\ndata:<line>\n...\n
//! :\n
//! ```

use bytes::Bytes;

/// Keepalive comment frame
pub const KEEPALIVE_FRAME: &[u8] = b":\n";

/// Events delivered on a presence channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A participant joined the session
    Join { participant: String },

    /// A participant left the session
    Leave { participant: String },

    /// The session is at capacity
    Busy { session: String },

    /// Payload relayed from another participant
    User { sender: String, payload: String },

    /// No-op frame holding the stream open
    Keepalive,
}

impl Event {
    /// Event name as written on the `event:` line
    pub fn name(&self) -> Option<String> {
        match self {
            Event::Join { .. } => Some("join".into()),
            Event::Leave { .. } => Some("leave".into()),
            Event::Busy { .. } => Some("busy".into()),
            Event::User { sender, .. } => Some(format!("user-{}", sender)),
            Event::Keepalive => None,
        }
    }

    /// Encode as an event-stream frame
    pub fn encode(&self) -> Bytes {
        let data = match self {
            Event::Join { participant } | Event::Leave { participant } => participant.as_str(),
            Event::Busy { session } => session.as_str(),
            Event::User { payload, .. } => payload.as_str(),
            Event::Keepalive => return Bytes::from_static(KEEPALIVE_FRAME),
        };

        let mut frame = String::with_capacity(data.len() + 32);
        if let Some(name) = self.name() {
            frame.push_str("event:");
            frame.push_str(&name);
            frame.push('\n');
        }
        push_data_lines(&mut frame, data);
        frame.push('\n');
        Bytes::from(frame)
    }
}

/// Split a payload into `data:` lines.
///
/// `\r\n`, `\r` and `\n` all end a line for event-stream clients, so all
/// three are split on; a payload can never start a line of its own. An
/// empty payload still produces one (empty) `data:` line so the event is
/// dispatched by the client.
fn push_data_lines(frame: &mut String, data: &str) {
    let normalized = data.replace("\r\n", "\n").replace('\r', "\n");
    for line in normalized.split('\n') {
        frame.push_str("data:");
        frame.push_str(line);
        frame.push('\n');
    }
}

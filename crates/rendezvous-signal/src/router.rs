//! Message routing between the two peers of a session

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use rendezvous_core::{Event, SdpTransform};

use crate::error::SignalError;
use crate::registry::{Session, SessionRegistry};
use crate::transform::transform_payload;

/// Delivers posted payloads onto the recipient's presence channel
#[derive(Clone)]
pub struct MessageRouter {
    registry: SessionRegistry,
    transform: Option<Arc<dyn SdpTransform>>,
}

impl MessageRouter {
    pub fn new(registry: SessionRegistry, transform: Option<Arc<dyn SdpTransform>>) -> Self {
        Self {
            registry,
            transform,
        }
    }

    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// Resolve the session a post is addressed to.
    ///
    /// Fails with [`SignalError::UnknownRecipient`] if the session does not
    /// exist or the recipient is not a member. No state is touched.
    pub fn check_recipient(
        &self,
        session_id: &str,
        recipient: &str,
    ) -> Result<Arc<Session>, SignalError> {
        let unknown = || SignalError::UnknownRecipient {
            session: session_id.to_string(),
            recipient: recipient.to_string(),
        };
        let session = self.registry.get(session_id).ok_or_else(unknown)?;
        if !session.lock().contains(recipient) {
            return Err(unknown());
        }
        Ok(session)
    }

    /// Write one `user-<sender>` event to the recipient.
    ///
    /// A recipient that left while the body was being read is not an
    /// error; the payload is dropped.
    pub fn deliver(&self, session: &Session, sender: &str, recipient: &str, body: &[u8]) {
        let payload = self.prepare(body);

        let state = session.lock();
        let Some(channel) = state.channel(recipient) else {
            debug!(
                "Dropped payload {} -> {} in {}: recipient gone",
                sender,
                recipient,
                session.id()
            );
            return;
        };

        let event = Event::User {
            sender: sender.to_string(),
            payload,
        };
        match channel.send(&event) {
            Ok(()) => debug!("@{} - {} => {} ({} bytes)", session.id(), sender, recipient, body.len()),
            Err(e) => debug!(
                "Dropped payload {} -> {} in {}: {}",
                sender,
                recipient,
                session.id(),
                e
            ),
        }
    }

    /// Relay a post: check the recipient, then await the body and deliver.
    ///
    /// The body is only read once the recipient is known to be a member.
    pub async fn relay<B>(
        &self,
        session_id: &str,
        sender: &str,
        recipient: &str,
        body: B,
    ) -> Result<(), SignalError>
    where
        B: Future<Output = Result<Bytes, SignalError>>,
    {
        let session = self.check_recipient(session_id, recipient)?;
        let body = body.await?;
        self.deliver(&session, sender, recipient, &body);
        Ok(())
    }

    fn prepare(&self, body: &[u8]) -> String {
        let original = || String::from_utf8_lossy(body).into_owned();
        let Some(sdp) = self.transform.as_deref() else {
            return original();
        };
        match transform_payload(sdp, body) {
            Ok(Some(transformed)) => transformed,
            Ok(None) => original(),
            Err(e) => {
                warn!("{}, relaying original payload", SignalError::from(e));
                original()
            }
        }
    }
}

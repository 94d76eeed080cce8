//! Presence channels
//!
//! A presence channel is the server-to-client half of a participant's
//! event stream. Frames are queued on an unbounded channel that the HTTP
//! response body drains; the channel owns a keepalive task that writes a
//! `:\n` comment frame on a fixed interval.
//!
//! Closing a channel cancels the keepalive first and then drops the sender,
//! which ends the response body once queued frames are flushed.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use rendezvous_core::{Event, KEEPALIVE_FRAME};

use crate::error::SignalError;

/// Process-unique channel identifier
pub type ChannelId = u64;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a participant's open event stream
#[derive(Clone)]
pub struct PresenceChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    id: ChannelId,
    participant: String,
    interval: Duration,
    // Lock order: keepalive before sender
    keepalive: Mutex<Option<JoinHandle<()>>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
}

impl PresenceChannel {
    /// Open a channel and arm its keepalive.
    ///
    /// A keepalive frame is queued immediately so the response headers
    /// flush and the client sees the stream as live. Must be called from
    /// within a Tokio runtime.
    pub fn open(participant: &str, interval: Duration) -> (Self, ChannelStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            inner: Arc::new(ChannelInner {
                id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
                participant: participant.to_string(),
                interval,
                keepalive: Mutex::new(None),
                sender: Mutex::new(Some(tx)),
            }),
        };

        let _ = channel.send_frame(Bytes::from_static(KEEPALIVE_FRAME));
        channel.arm_keepalive();

        (channel, ChannelStream::new(rx))
    }

    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    pub fn participant(&self) -> &str {
        &self.inner.participant
    }

    /// Whether the transport can still accept frames
    pub fn is_open(&self) -> bool {
        self.inner
            .sender
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Whether a keepalive task is currently armed
    pub fn keepalive_armed(&self) -> bool {
        self.inner.keepalive.lock().is_some()
    }

    /// Queue an event on the stream.
    ///
    /// A failed write means the receiving side is gone; the channel closes
    /// itself and reports [`SignalError::ChannelClosed`].
    pub fn send(&self, event: &Event) -> Result<(), SignalError> {
        self.send_frame(event.encode())
    }

    fn send_frame(&self, frame: Bytes) -> Result<(), SignalError> {
        let sent = match self.inner.sender.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => return Err(SignalError::ChannelClosed),
        };
        if !sent {
            debug!("Write to {} failed, closing channel {}", self.inner.participant, self.inner.id);
            self.close();
            return Err(SignalError::ChannelClosed);
        }
        Ok(())
    }

    /// Restart the keepalive interval from now
    pub fn refresh_keepalive(&self) {
        self.arm_keepalive();
    }

    fn arm_keepalive(&self) {
        let mut slot = self.inner.keepalive.lock();
        if let Some(task) = slot.take() {
            task.abort();
        }
        if !self.is_open() {
            return;
        }

        let weak: Weak<ChannelInner> = Arc::downgrade(&self.inner);
        let period = self.inner.interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let channel = PresenceChannel { inner };
                trace!("keepalive -> {}", channel.participant());
                if channel.send_frame(Bytes::from_static(KEEPALIVE_FRAME)).is_err() {
                    break;
                }
            }
        }));
    }

    /// Cancel the keepalive task.
    ///
    /// Returns `false` if it was not armed, so repeated calls are no-ops.
    pub fn cancel_keepalive(&self) -> bool {
        match self.inner.keepalive.lock().take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Close the channel: cancel the keepalive, then release the transport.
    /// Idempotent.
    pub fn close(&self) {
        self.cancel_keepalive();
        if self.inner.sender.lock().take().is_some() {
            debug!("Channel {} for {} closed", self.inner.id, self.inner.participant);
        }
    }
}

impl std::fmt::Debug for PresenceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceChannel")
            .field("id", &self.inner.id)
            .field("participant", &self.inner.participant)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Response body for a presence channel.
///
/// Runs its close hook when dropped, which is how a vanished client is
/// detected: the HTTP server drops the body once the connection is gone.
pub struct ChannelStream {
    rx: mpsc::UnboundedReceiver<Bytes>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl ChannelStream {
    fn new(rx: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self { rx, on_close: None }
    }

    /// A stream carrying a single event and then ending
    pub fn once(event: &Event) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(event.encode());
        Self::new(rx)
    }

    /// Set the hook run when the stream is dropped
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }
}

impl Stream for ChannelStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for ChannelStream {
    fn drop(&mut self) {
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

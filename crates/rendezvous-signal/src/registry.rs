//! Session registry
//!
//! Maps session ids to sessions of at most [`SESSION_CAPACITY`]
//! participants. Each session is guarded by its own mutex; membership
//! changes and the join/leave broadcasts they trigger happen under that
//! lock, so concurrent joins to one session are serialized while
//! unrelated sessions proceed in parallel.
//!
//! Lock order: a session lock may be held while touching the session map,
//! never the other way around.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use rendezvous_core::{Event, RelayConfig, SESSION_CAPACITY};

use crate::error::SignalError;
use crate::presence::{ChannelId, ChannelStream, PresenceChannel};

/// A member of a session
#[derive(Debug)]
pub struct Participant {
    pub id: String,
    pub channel: Option<PresenceChannel>,
}

/// Outcome of admitting a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    New,
    Existing,
}

/// Mutable state of one session
#[derive(Debug)]
pub struct SessionState {
    id: String,
    participants: HashMap<String, Participant>,
    retired: bool,
}

impl SessionState {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            participants: HashMap::new(),
            retired: false,
        }
    }

    /// Admit a participant, or recognize an existing one.
    pub fn admit(&mut self, participant: &str, capacity: usize) -> Result<Admission, SignalError> {
        if self.participants.contains_key(participant) {
            return Ok(Admission::Existing);
        }
        if self.participants.len() >= capacity {
            return Err(SignalError::SessionFull {
                session: self.id.clone(),
            });
        }
        self.participants.insert(
            participant.to_string(),
            Participant {
                id: participant.to_string(),
                channel: None,
            },
        );
        Ok(Admission::New)
    }

    /// Remove a participant. Idempotent.
    pub fn remove(&mut self, participant: &str) -> Option<Participant> {
        self.participants.remove(participant)
    }

    pub fn contains(&self, participant: &str) -> bool {
        self.participants.contains_key(participant)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn channel(&self, participant: &str) -> Option<&PresenceChannel> {
        self.participants
            .get(participant)
            .and_then(|p| p.channel.as_ref())
    }

    fn peers<'a>(&'a self, participant: &'a str) -> impl Iterator<Item = &'a Participant> + 'a {
        self.participants
            .values()
            .filter(move |p| p.id != participant)
    }
}

/// A session and its lock
#[derive(Debug)]
pub struct Session {
    id: String,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: Mutex::new(SessionState::new(id)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lock the session for reading or mutation
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, SessionState> {
        self.state.lock()
    }
}

/// An admitted participant's live channel and its response body
pub struct Subscription {
    pub channel: PresenceChannel,
    pub stream: ChannelStream,
}

/// Concurrent map of session id to session
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: DashMap<String, Arc<Session>>,
    capacity: usize,
    keepalive: Duration,
    reclaim: bool,
}

impl SessionRegistry {
    pub fn new(config: &RelayConfig) -> Self {
        Self::with_capacity(config, SESSION_CAPACITY)
    }

    fn with_capacity(config: &RelayConfig, capacity: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                capacity,
                keepalive: config.keepalive_interval(),
                reclaim: config.reclaim_empty_sessions,
            }),
        }
    }

    /// Look up a session, creating it if absent
    pub fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        self.inner
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!("Created session {}", session_id);
                Arc::new(Session::new(session_id))
            })
            .clone()
    }

    /// Look up a session without creating it
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.inner.sessions.get(session_id).map(|s| s.clone())
    }

    /// Admit a participant and open its presence channel.
    ///
    /// Existing peers are told about a newcomer and the newcomer is told
    /// about each existing peer. A reconnecting participant's previous
    /// channel is closed and replaced without any join events. Fails with
    /// [`SignalError::SessionFull`] if the session has no room.
    pub fn subscribe(&self, session_id: &str, participant: &str) -> Result<Subscription, SignalError> {
        loop {
            let session = self.get_or_create(session_id);
            let mut state = session.lock();
            if state.retired {
                // Lost a race with reclamation; the map now holds a fresh session
                drop(state);
                continue;
            }

            let admission = state.admit(participant, self.inner.capacity)?;
            let (channel, stream) = PresenceChannel::open(participant, self.inner.keepalive);

            match admission {
                Admission::New => {
                    for peer in state.peers(participant) {
                        if let Some(peer_channel) = &peer.channel {
                            peer_channel.refresh_keepalive();
                            let _ = peer_channel.send(&Event::Join {
                                participant: participant.to_string(),
                            });
                            let _ = channel.send(&Event::Join {
                                participant: peer.id.clone(),
                            });
                        }
                    }
                }
                // Peers already know this participant; only the stream is swapped
                Admission::Existing => {
                    if let Some(old) = state
                        .participants
                        .get_mut(participant)
                        .and_then(|p| p.channel.take())
                    {
                        debug!("{} reconnected to {}, replacing channel {}", participant, session_id, old.id());
                        old.close();
                    }
                }
            }

            if let Some(member) = state.participants.get_mut(participant) {
                member.channel = Some(channel.clone());
            }
            info!(
                "{} joined session {} ({}/{})",
                participant,
                session_id,
                state.len(),
                self.inner.capacity
            );
            drop(state);

            let stream = stream.on_close({
                let registry = self.clone();
                let participant = participant.to_string();
                let channel_id = channel.id();
                move || registry.disconnect(&session, &participant, channel_id)
            });

            return Ok(Subscription { channel, stream });
        }
    }

    /// Handle the loss of a participant's channel.
    ///
    /// Ignored if `channel_id` no longer identifies the participant's
    /// current channel, which happens when a reconnect replaced it.
    pub fn disconnect(&self, session: &Arc<Session>, participant: &str, channel_id: ChannelId) {
        let mut state = session.lock();
        let current = state.channel(participant).map(PresenceChannel::id);
        if current != Some(channel_id) {
            return;
        }

        if let Some(removed) = state.remove(participant) {
            if let Some(channel) = removed.channel {
                channel.close();
            }
        }
        info!("{} left session {}", participant, session.id());

        for peer in state.peers(participant) {
            if let Some(peer_channel) = &peer.channel {
                let _ = peer_channel.send(&Event::Leave {
                    participant: participant.to_string(),
                });
            }
        }

        if self.inner.reclaim && state.is_empty() {
            state.retired = true;
            let removed = self
                .inner
                .sessions
                .remove_if(session.id(), |_, current| Arc::ptr_eq(current, session));
            if removed.is_some() {
                debug!("Reclaimed empty session {}", session.id());
            }
        }
    }

    /// Number of sessions currently held
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Number of participants across all sessions
    pub fn participant_count(&self) -> usize {
        self.snapshot().iter().map(|s| s.lock().len()).sum()
    }

    /// Participant ids of one session, sorted
    pub fn members(&self, session_id: &str) -> Vec<String> {
        let Some(session) = self.get(session_id) else {
            return Vec::new();
        };
        let state = session.lock();
        let mut ids: Vec<String> = state.participants.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Close every open channel
    pub fn shutdown(&self) {
        for session in self.snapshot() {
            let state = session.lock();
            for participant in state.participants.values() {
                if let Some(channel) = &participant.channel {
                    channel.close();
                }
            }
        }
    }

    // Collect first so no shard lock is held while taking a session lock
    fn snapshot(&self) -> Vec<Arc<Session>> {
        self.inner
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use rendezvous_core::KEEPALIVE_FRAME;

    fn registry(reclaim: bool) -> SessionRegistry {
        SessionRegistry::new(&RelayConfig {
            reclaim_empty_sessions: reclaim,
            ..RelayConfig::default()
        })
    }

    async fn next_frame(stream: &mut ChannelStream) -> Bytes {
        stream.next().await.unwrap().unwrap()
    }

    async fn skip_keepalive(stream: &mut ChannelStream) {
        assert_eq!(next_frame(stream).await, KEEPALIVE_FRAME);
    }

    #[test]
    fn test_admit_capacity() {
        let mut state = SessionState::new("s1");
        assert_eq!(state.admit("A", 2).unwrap(), Admission::New);
        assert_eq!(state.admit("B", 2).unwrap(), Admission::New);
        assert_eq!(state.admit("A", 2).unwrap(), Admission::Existing);
        assert!(matches!(
            state.admit("C", 2),
            Err(SignalError::SessionFull { session }) if session == "s1"
        ));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut state = SessionState::new("s1");
        state.admit("A", 2).unwrap();
        assert!(state.remove("A").is_some());
        assert!(state.remove("A").is_none());
        assert!(state.remove("nobody").is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_get_or_create_returns_same_session() {
        let registry = registry(true);
        let a = registry.get_or_create("s1");
        let b = registry.get_or_create("s1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.session_count(), 1);
        assert!(registry.get("s2").is_none());
    }

    #[tokio::test]
    async fn test_join_exchange() {
        let registry = registry(true);
        let mut a = registry.subscribe("s1", "A").unwrap();
        skip_keepalive(&mut a.stream).await;

        let mut b = registry.subscribe("s1", "B").unwrap();
        skip_keepalive(&mut b.stream).await;

        assert_eq!(next_frame(&mut a.stream).await, &b"event:join\ndata:B\n\n"[..]);
        assert_eq!(next_frame(&mut b.stream).await, &b"event:join\ndata:A\n\n"[..]);
        assert_eq!(registry.members("s1"), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(registry.participant_count(), 2);
    }

    #[tokio::test]
    async fn test_third_participant_is_rejected() {
        let registry = registry(true);
        let _a = registry.subscribe("s1", "A").unwrap();
        let _b = registry.subscribe("s1", "B").unwrap();
        let result = registry.subscribe("s1", "C");
        assert!(matches!(result, Err(SignalError::SessionFull { .. })));
        assert_eq!(registry.members("s1").len(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_notifies_peer() {
        let registry = registry(true);
        let mut a = registry.subscribe("s1", "A").unwrap();
        let b = registry.subscribe("s1", "B").unwrap();
        skip_keepalive(&mut a.stream).await;
        next_frame(&mut a.stream).await;

        drop(b);
        assert_eq!(next_frame(&mut a.stream).await, &b"event:leave\ndata:B\n\n"[..]);
        assert_eq!(registry.members("s1"), vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_channel() {
        let registry = registry(true);
        let mut a = registry.subscribe("s1", "A").unwrap();
        let first = registry.subscribe("s1", "B").unwrap();
        skip_keepalive(&mut a.stream).await;
        next_frame(&mut a.stream).await;

        let mut second = registry.subscribe("s1", "B").unwrap();
        assert!(!first.channel.is_open());
        assert!(second.channel.is_open());

        // The replaced stream going away must not evict the participant
        drop(first);
        assert_eq!(registry.members("s1").len(), 2);

        // No join is repeated on either side
        let mut peer_next = tokio_test::task::spawn(a.stream.next());
        tokio_test::assert_pending!(peer_next.poll());
        drop(peer_next);

        skip_keepalive(&mut second.stream).await;
        let mut own_next = tokio_test::task::spawn(second.stream.next());
        tokio_test::assert_pending!(own_next.poll());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_respect_capacity() {
        let registry = registry(true);
        let barrier = Arc::new(tokio::sync::Barrier::new(8));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    registry.subscribe("s1", &format!("P{}", i)).ok()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for task in tasks {
            if let Some(subscription) = task.await.unwrap() {
                admitted.push(subscription);
            }
        }

        assert_eq!(admitted.len(), SESSION_CAPACITY);
        assert_eq!(registry.members("s1").len(), SESSION_CAPACITY);
        assert_eq!(registry.participant_count(), SESSION_CAPACITY);
    }

    #[tokio::test]
    async fn test_reclaim_empty_session() {
        let registry = registry(true);
        let a = registry.subscribe("s1", "A").unwrap();
        let session = registry.get("s1").unwrap();
        drop(a);
        assert_eq!(registry.session_count(), 0);
        assert!(session.lock().retired);

        // A later join creates a fresh session
        let _a = registry.subscribe("s1", "A").unwrap();
        let fresh = registry.get("s1").unwrap();
        assert!(!Arc::ptr_eq(&session, &fresh));
    }

    #[tokio::test]
    async fn test_empty_session_kept_without_reclaim() {
        let registry = registry(false);
        let a = registry.subscribe("s1", "A").unwrap();
        drop(a);
        assert_eq!(registry.session_count(), 1);
        assert!(registry.members("s1").is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_closes_channels() {
        let registry = registry(true);
        let a = registry.subscribe("s1", "A").unwrap();
        let b = registry.subscribe("s2", "B").unwrap();
        registry.shutdown();
        assert!(!a.channel.is_open());
        assert!(!b.channel.is_open());
        assert!(!a.channel.keepalive_armed());
    }
}

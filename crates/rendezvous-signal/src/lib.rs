//! Rendezvous Signal Server
//!
//! HTTP relay that lets two browser peers exchange handshake messages
//! before they connect to each other directly.
//!
//! # Protocol
//!
//! 1. Each peer opens `GET /subscribe/{session}/{self}` and keeps it open as
//!    an event stream
//! 2. Peers are told about each other with `join` events
//! 3. `POST /post/{session}/{self}/{peer}` delivers a payload to the peer as
//!    a `user-{self}` event
//! 4. When a stream goes away the remaining peer receives `leave`
//!
//! A session holds at most two participants; a third is answered with a
//! single `busy` event.

pub mod error;
pub mod presence;
pub mod registry;
pub mod router;
pub mod server;
pub mod transform;

pub use error::{SignalError, TransformError};
pub use presence::{ChannelStream, PresenceChannel};
pub use registry::{Session, SessionRegistry, Subscription};
pub use router::MessageRouter;
pub use server::{build_router, AppState, SignalServer};

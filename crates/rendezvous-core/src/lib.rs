//! Rendezvous Core - Shared types, SDP transform, and configuration
//!
//! This crate contains the foundational types used by the rendezvous relay.
//! It has no dependencies on networking code.

pub mod address;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sdp;

pub use address::{Address, Operation};
pub use config::{Config, RelayConfig, StaticConfig, DEFAULT_PORT};
pub use error::*;
pub use protocol::{Event, KEEPALIVE_FRAME};
pub use sdp::{SdpCodec, SdpTransform, SessionDescription};

/// Maximum participants per session
pub const SESSION_CAPACITY: usize = 2;

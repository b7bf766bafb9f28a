//! # wifistack
//!
//! A user-space IEEE 802.11 MAC-layer client stack. It sits on top of a
//! monitor-mode radio handle that exchanges complete MAC frames (FCS
//! included) and lets an application observe, spoof, scan, authenticate,
//! associate and exchange data with an access point on an open
//! infrastructure network.
//!
//! ## Architecture
//!
//! The implementation is organized into several modules:
//! - `frames`: 802.11 frame structures, the bit-exact codec and the
//!   typed management bodies (beacons, authentication, association)
//! - `radio`: the abstract monitor-mode radio handle the stack drives
//! - `raw_stream`: channel-based wrapper around a radio handle
//! - `scan`: channel-hopping beacon collector
//! - `handshake`: open-network authenticate/associate driver
//! - `msdu`: reliable, fragmenting MSDU stream over an open network
//! - `shutdown`: the one-shot broadcast used for cooperative cancellation

pub mod frames;
pub mod handshake;
pub mod msdu;
pub mod radio;
pub mod raw_stream;
pub mod scan;
pub mod shutdown;

mod partial_msdu;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use crate::{
    frames::*,
    handshake::*,
    msdu::*,
    radio::*,
    raw_stream::*,
    scan::*,
    shutdown::*,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    #[error("buffer underflow")]
    BufferUnderflow,

    #[error("buffer overflow")]
    BufferOverflow,

    #[error("bad checksum")]
    BadChecksum,

    #[error("invalid MAC address")]
    InvalidMac,

    #[error("unknown frame type")]
    UnknownFrameType,

    #[error("unknown frame version")]
    UnknownFrameVersion,

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("authentication rejected with status {0}")]
    AuthenticationRejected(u16),

    #[error("association rejected with status {0}")]
    AssociationRejected(u16),

    #[error("transport closed: {0}")]
    TransportClosed(Box<WifiError>),

    #[error("radio error: {message}")]
    Radio { message: String },

    #[error("channel {channel} not supported")]
    InvalidChannel { channel: u8 },
}

pub type Result<T> = std::result::Result<T, WifiError>;

// Utility functions
pub fn init_logging() {
    let _ = env_logger::try_init();
}

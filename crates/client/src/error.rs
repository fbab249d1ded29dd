//! Error types for the session client.
//!
//! Connect errors are `Clone` because every caller of a collapsed
//! `connect()` attempt receives the same outcome through a shared future.

use std::time::Duration;

use thiserror::Error;

use crate::ws::transport::TransportError;

/// Errors establishing the realtime connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// No auth token in the token store. Fatal: retrying without a new
    /// login cannot succeed.
    #[error("no auth token available")]
    Auth,

    /// The transport did not signal "connected" within the timeout.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure; the caller may retry.
    #[error("transport error: {0}")]
    Transport(String),

    /// `disconnect()` was called while the attempt was in flight.
    #[error("connection closed while connecting")]
    Cancelled,
}

impl From<TransportError> for ConnectError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(elapsed) => Self::Timeout(elapsed),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Errors joining a chat room.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    /// Connecting failed before the join request was emitted.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The server acknowledged the join with `success: false`.
    #[error("server rejected join: {0}")]
    Rejected(String),

    /// No acknowledgment arrived within the configured window.
    #[error("no join acknowledgment within {0:?}")]
    AckTimeout(Duration),

    /// The connection dropped while waiting for the acknowledgment.
    #[error("connection lost while waiting for join acknowledgment")]
    ConnectionLost,
}

/// Errors emitting a fire-and-forget command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    Closed,
}

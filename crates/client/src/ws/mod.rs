//! Realtime transport layer: connection state, reconnect policy and the
//! WebSocket transport itself.
//!
//! The [`crate::session::Session`] owns exactly one connection built from
//! these pieces. Consumers read state changes through the event
//! dispatcher; they never touch the transport directly.

pub mod transport;

pub use transport::{AuthPayload, TransportError, TransportFactory, TransportHandle, WsTransport};

/// Connection state of the realtime socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts before giving up (0 = infinite).
    pub max_attempts: u32,
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u32).min(self.max_delay_ms)
    }
}

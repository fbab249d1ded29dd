//! Telecare client - realtime session client for the telehealth backend.
//!
//! One [`Session`] per app lifetime owns the realtime connection; stores
//! hold the view-model state the UI reads. Events flow server → session
//! reader → [`EventDispatcher`] → stores; outbound actions go through the
//! session (realtime) or [`ApiClient`] (REST).

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod stores;
pub mod token;
pub mod ws;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ConnectError, JoinError, SendError};
pub use events::{EventDispatcher, Subscription};
pub use session::{JoinInfo, Session};
pub use stores::{LocationStore, MessageStore, RoomStore};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use ws::{ConnectionState, ReconnectConfig};

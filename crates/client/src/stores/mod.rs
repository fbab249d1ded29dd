//! Local view-model stores.
//!
//! Stores are the single source of truth the UI layer reads. They mutate
//! only in response to dispatched server events or explicit local actions
//! (load, send, create); nothing here polls. `attach` wires a store to a
//! session's dispatcher and returns the subscriptions keeping it live —
//! drop them and the store stops updating.

pub mod locations;
pub mod messages;
pub mod rooms;

pub use locations::LocationStore;
pub use messages::{MessageStore, RoomHistory};
pub use rooms::{RoomList, RoomStore};

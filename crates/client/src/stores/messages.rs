//! Per-room message history store.
//!
//! Histories are keyed by room id. Each room tracks whether its history
//! has been loaded from the REST API; pushed messages are merged in with
//! id-deduplication so a message arriving both from the send response and
//! the realtime feed is stored once.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use telecare_shared::{ApiError, Message};

use crate::api::ApiClient;
use crate::events::{EventDispatcher, Subscription};

/// Messages for a single room.
#[derive(Debug, Default, Clone)]
pub struct RoomHistory {
    /// All messages in this room, sorted by `created_at` ascending.
    pub messages: Vec<Message>,
    /// Whether the history has been fetched from the REST API.
    pub is_loaded: bool,
}

impl RoomHistory {
    /// Add a message, maintaining sort order by `created_at`.
    /// Returns false if a message with the same id already exists.
    pub fn add_message(&mut self, msg: Message) -> bool {
        if self.messages.iter().any(|m| m.id == msg.id) {
            return false;
        }

        let pos = self
            .messages
            .binary_search_by(|m| m.created_at.cmp(&msg.created_at))
            .unwrap_or_else(|pos| pos);

        self.messages.insert(pos, msg);
        true
    }

    /// Set the full message history (from the REST fetch) and mark the
    /// room as loaded.
    pub fn set_history(&mut self, mut messages: Vec<Message>) {
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.messages = messages;
        self.is_loaded = true;
    }

    /// Flag a message as seen. Returns false if the id is unknown.
    pub fn mark_seen(&mut self, message_id: &str, seen_at: DateTime<Utc>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.seen = true;
                message.seen_at = Some(seen_at);
                true
            }
            None => false,
        }
    }
}

/// Shared handle to the per-room histories.
#[derive(Clone, Default)]
pub struct MessageStore {
    inner: Arc<RwLock<HashMap<String, RoomHistory>>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, RoomHistory>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a message into its room's history (creating the entry if
    /// this is the first message seen for that room).
    pub fn insert(&self, message: Message) -> bool {
        self.write().entry(message.room_id.clone()).or_default().add_message(message)
    }

    /// Fetch and store a room's history.
    pub async fn load_history(&self, api: &ApiClient, room_id: &str) -> Result<(), ApiError> {
        let messages = api.room_messages(room_id).await?;
        self.write().entry(room_id.to_string()).or_default().set_history(messages);
        Ok(())
    }

    /// Read access to one room's history.
    pub fn with_room<R>(&self, room_id: &str, f: impl FnOnce(&RoomHistory) -> R) -> Option<R> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(room_id).map(f)
    }

    /// Wire this store to a dispatcher. Dropping the returned
    /// subscriptions detaches it.
    pub fn attach(&self, dispatcher: &EventDispatcher) -> Vec<Subscription> {
        let store = self.clone();
        let on_message = dispatcher.on_new_message(move |message| {
            store.insert(message.clone());
        });
        let store = self.clone();
        let on_seen = dispatcher.on_message_seen(move |message_id, room_id, _seen_by, seen_at| {
            let mut map = store.write();
            if let Some(history) = map.get_mut(room_id) {
                history.mark_seen(message_id, seen_at);
            }
        });
        vec![on_message, on_seen]
    }
}

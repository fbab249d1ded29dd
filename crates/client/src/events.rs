//! Typed event dispatch for server-pushed events.
//!
//! One registration method per event kind; registrations are additive and
//! every matching callback fires, in transport arrival order. Each
//! registration returns a [`Subscription`] that unregisters on drop, so a
//! consumer going away stops its callbacks without touching anyone
//! else's. `clear` removes every listener at once (logout path).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};

use telecare_shared::{DoctorLocation, Message, ServerEvent};

use crate::ws::ConnectionState;

type EventCallback = Arc<dyn Fn(&ServerEvent) + Send + Sync>;
type StateCallback = Arc<dyn Fn(&ConnectionState) + Send + Sync>;

#[derive(Default)]
struct Registries {
    events: Mutex<Vec<(u64, EventCallback)>>,
    state: Mutex<Vec<(u64, StateCallback)>>,
}

/// Fan-out of server events to registered callbacks.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    next_id: Arc<AtomicU64>,
    registries: Arc<Registries>,
}

/// Which registry a subscription belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Event,
    State,
}

/// Handle for a registered callback; unregisters on drop.
pub struct Subscription {
    id: u64,
    slot: Slot,
    registries: Weak<Registries>,
}

impl Subscription {
    /// Explicitly unregister. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registries) = self.registries.upgrade() else {
            return;
        };
        match self.slot {
            Slot::Event => {
                let mut entries = registries.events.lock().unwrap_or_else(|e| e.into_inner());
                entries.retain(|(id, _)| *id != self.id);
            }
            Slot::State => {
                let mut entries = registries.state.lock().unwrap_or_else(|e| e.into_inner());
                entries.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, callback: EventCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registries
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, callback));
        Subscription { id, slot: Slot::Event, registries: Arc::downgrade(&self.registries) }
    }

    /// A new chat message was pushed.
    pub fn on_new_message(
        &self,
        f: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Arc::new(move |event| {
            if let ServerEvent::NewMessage(message) = event {
                f(message);
            }
        }))
    }

    /// A message was marked seen by its recipient.
    pub fn on_message_seen(
        &self,
        f: impl Fn(&str, &str, &str, DateTime<Utc>) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Arc::new(move |event| {
            if let ServerEvent::MessageSeen { message_id, room_id, seen_by, seen_at } = event {
                f(message_id, room_id, seen_by, *seen_at);
            }
        }))
    }

    /// The peer started or stopped typing.
    pub fn on_typing(&self, f: impl Fn(&str, bool) + Send + Sync + 'static) -> Subscription {
        self.register(Arc::new(move |event| {
            if let ServerEvent::UserTyping { user_id, is_typing } = event {
                f(user_id, *is_typing);
            }
        }))
    }

    /// A user came online.
    pub fn on_user_online(
        &self,
        f: impl Fn(&str, DateTime<Utc>) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Arc::new(move |event| {
            if let ServerEvent::UserOnline { user_id, timestamp } = event {
                f(user_id, *timestamp);
            }
        }))
    }

    /// A user went offline.
    pub fn on_user_offline(&self, f: impl Fn(&str) + Send + Sync + 'static) -> Subscription {
        self.register(Arc::new(move |event| {
            if let ServerEvent::UserOffline { user_id } = event {
                f(user_id);
            }
        }))
    }

    /// The unread counter for a room changed.
    pub fn on_unread_count(
        &self,
        f: impl Fn(&str, u32) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Arc::new(move |event| {
            if let ServerEvent::UnreadCountUpdate { room_id, count } = event {
                f(room_id, *count);
            }
        }))
    }

    /// A fresh doctor-location list was pushed.
    pub fn on_location_update(
        &self,
        f: impl Fn(&[DoctorLocation]) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(Arc::new(move |event| {
            if let ServerEvent::LocationUpdate(locations) = event {
                f(locations);
            }
        }))
    }

    /// The connection state changed.
    pub fn on_state_change(
        &self,
        f: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registries
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(f)));
        Subscription { id, slot: Slot::State, registries: Arc::downgrade(&self.registries) }
    }

    /// Remove every registered listener.
    pub fn clear(&self) {
        self.registries.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.registries.state.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Fan an event out to all matching callbacks.
    ///
    /// Callbacks are cloned out of the registry before invocation so a
    /// callback may register or cancel subscriptions without deadlocking.
    pub(crate) fn dispatch(&self, event: &ServerEvent) {
        let callbacks: Vec<EventCallback> = {
            let entries = self.registries.events.lock().unwrap_or_else(|e| e.into_inner());
            entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    pub(crate) fn dispatch_state(&self, state: &ConnectionState) {
        let callbacks: Vec<StateCallback> = {
            let entries = self.registries.state.lock().unwrap_or_else(|e| e.into_inner());
            entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in callbacks {
            callback(state);
        }
    }
}

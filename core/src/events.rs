//! Lifecycle and fault notifications.
//!
//! Listeners are plain callbacks, invoked synchronously in registration order
//! on the thread that emits. A panicking listener propagates to the emitter.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::http::HttpMethod;

/// Names of the events a broker emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Loading,
    LoadingComplete,
    MissingCredentials,
    Unauthorized,
    NeedUpdate,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Loading => "loading",
            EventKind::LoadingComplete => "loading_complete",
            EventKind::MissingCredentials => "missing_credentials",
            EventKind::Unauthorized => "unauthorized",
            EventKind::NeedUpdate => "need_update",
        }
    }
}

/// An emitted event with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// A request is about to be built and sent.
    Loading { method: HttpMethod, url: String },
    /// A request finished, successfully or not.
    LoadingComplete { method: HttpMethod, url: String },
    /// The server answered 401.
    MissingCredentials { url: String },
    /// The server answered 403.
    Unauthorized { url: String },
    /// The server answered 409: this client build is stale.
    NeedUpdate { url: String },
}

impl BrokerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BrokerEvent::Loading { .. } => EventKind::Loading,
            BrokerEvent::LoadingComplete { .. } => EventKind::LoadingComplete,
            BrokerEvent::MissingCredentials { .. } => EventKind::MissingCredentials,
            BrokerEvent::Unauthorized { .. } => EventKind::Unauthorized,
            BrokerEvent::NeedUpdate { .. } => EventKind::NeedUpdate,
        }
    }
}

pub type Listener = Arc<dyn Fn(&BrokerEvent) + Send + Sync>;

/// Ordered listener registry keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` after any existing listeners for `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&BrokerEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Invoke every listener for the event's kind, in registration order.
    pub fn emit(&self, event: &BrokerEvent) {
        // Dispatch from a snapshot so listeners may register listeners.
        let snapshot = match self.listeners.read().get(&event.kind()) {
            Some(listeners) if !listeners.is_empty() => listeners.clone(),
            _ => return,
        };
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        let mut map = f.debug_map();
        for (kind, list) in listeners.iter() {
            map.entry(&kind.name(), &list.len());
        }
        map.finish()
    }
}

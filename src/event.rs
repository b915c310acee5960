//! The typed event surface a consumer subscribes to.
//!
//! The teacher's server side hands each connection a `Stream` of raw
//! [`crate::message::Message`] values (`EventStream` wrapping an mpsc
//! `Receiver`) and lets the caller `match` on a flat `Event` enum. A
//! reconnecting client needs more: callers register against a specific kind
//! (`open`, `message`, `error`, `close`) up front, independent of whether a
//! connection even exists yet, and want a handle back so they can
//! unsubscribe later. That's the event-emitter shape this module gives
//! them, built over the same `Stream`-free callback-registry idea.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::message::Message;

/// A subscription handle returned by [`Handlers::on`]/[`Handlers::once`],
/// needed to call [`Handlers::remove_listener`] later.
pub type SubscriptionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Message,
    Error,
    Close,
}

/// Everything a handler can be called with. `Close` always carries the code
/// and reason when the peer supplied one, per §6's "close events always
/// carry (code, reason) when available".
#[derive(Debug, Clone)]
pub enum Event {
    Open,
    Message(Message),
    Error(Arc<Error>),
    Close(Option<u16>, String),
}

impl Event {
    fn kind(&self) -> EventKind {
        match self {
            Event::Open => EventKind::Open,
            Event::Message(_) => EventKind::Message,
            Event::Error(_) => EventKind::Error,
            Event::Close(..) => EventKind::Close,
        }
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Listener {
    kind: EventKind,
    once: bool,
    handler: Handler,
}

/// Registry of event handlers for one connection's lifetime. Shared behind
/// an `Arc` between the public `Connection` handle and whichever task is
/// currently driving the socket, so registering a listener never races with
/// dispatch.
#[derive(Default)]
pub struct Handlers {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<SubscriptionId, Listener>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, kind: EventKind, once: bool, handler: Handler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().insert(
            id,
            Listener {
                kind,
                once,
                handler,
            },
        );
        id
    }

    /// Register a handler that fires every time `kind` is emitted.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.insert(kind, false, Arc::new(handler))
    }

    /// Register a handler that fires at most once, then unsubscribes
    /// itself.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.insert(kind, true, Arc::new(handler))
    }

    pub fn remove_listener(&self, id: SubscriptionId) {
        self.listeners.lock().unwrap().remove(&id);
    }

    pub fn remove_all_listeners(&self, kind: Option<EventKind>) {
        let mut listeners = self.listeners.lock().unwrap();
        match kind {
            Some(kind) => listeners.retain(|_, listener| listener.kind != kind),
            None => listeners.clear(),
        }
    }

    /// Dispatch `event` to every matching listener, dropping `once`
    /// listeners after they fire. Multiple listeners for the same kind all
    /// run, in registration order.
    pub fn emit(&self, event: &Event) {
        let kind = event.kind();
        let mut fired_once = Vec::new();
        let handlers: Vec<(SubscriptionId, bool, Handler)> = {
            let listeners = self.listeners.lock().unwrap();
            let mut matches: Vec<_> = listeners
                .iter()
                .filter(|(_, listener)| listener.kind == kind)
                .map(|(id, listener)| (*id, listener.once, listener.handler.clone()))
                .collect();
            matches.sort_by_key(|(id, ..)| *id);
            matches
        };

        for (id, once, handler) in handlers {
            handler(event);
            if once {
                fired_once.push(id);
            }
        }

        if !fired_once.is_empty() {
            let mut listeners = self.listeners.lock().unwrap();
            for id in fired_once {
                listeners.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn on_fires_every_time() {
        let handlers = Handlers::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        handlers.on(EventKind::Open, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        handlers.emit(&Event::Open);
        handlers.emit(&Event::Open);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_fires_a_single_time() {
        let handlers = Handlers::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        handlers.once(EventKind::Open, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        handlers.emit(&Event::Open);
        handlers.emit(&Event::Open);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_listener_stops_future_dispatch() {
        let handlers = Handlers::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let id = handlers.on(EventKind::Message, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        handlers.emit(&Event::Message(Message::Text("hi".into())));
        handlers.remove_listener(id);
        handlers.emit(&Event::Message(Message::Text("hi".into())));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_all_listeners_scoped_to_kind() {
        let handlers = Handlers::new();
        let open_count = Arc::new(AtomicUsize::new(0));
        let close_count = Arc::new(AtomicUsize::new(0));
        let open_clone = open_count.clone();
        let close_clone = close_count.clone();
        handlers.on(EventKind::Open, move |_| {
            open_clone.fetch_add(1, Ordering::SeqCst);
        });
        handlers.on(EventKind::Close, move |_| {
            close_clone.fetch_add(1, Ordering::SeqCst);
        });

        handlers.remove_all_listeners(Some(EventKind::Open));
        handlers.emit(&Event::Open);
        handlers.emit(&Event::Close(Some(1000), String::new()));

        assert_eq!(open_count.load(Ordering::SeqCst), 0);
        assert_eq!(close_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn multiple_subscribers_all_run_in_order() {
        let handlers = Handlers::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_a = order.clone();
        let order_b = order.clone();
        handlers.on(EventKind::Open, move |_| order_a.lock().unwrap().push(1));
        handlers.on(EventKind::Open, move |_| order_b.lock().unwrap().push(2));

        handlers.emit(&Event::Open);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }
}

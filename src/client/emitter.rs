//! Connection lifecycle events and their listener registry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::ClientError;

/// A lifecycle event raised by a [Client](super::Client).
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// The transport finished connecting.
    Connect,
    /// The transport failed; carries the error being reported.
    Error(&'a ClientError),
    /// The connection was closed.
    Close,
    /// The peer ended its side of the stream.
    End,
}

impl Event<'_> {
    /// The registry key this event is dispatched under.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connect => EventKind::Connect,
            Event::Error(_) => EventKind::Error,
            Event::Close => EventKind::Close,
            Event::End => EventKind::End,
        }
    }
}

/// The name an [Event] is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [Event::Connect].
    Connect,
    /// See [Event::Error].
    Error,
    /// See [Event::Close].
    Close,
    /// See [Event::End].
    End,
}

/// A listener callback.
///
/// Listener identity, for deduplication and [Emitter::off], is the `Rc`
/// allocation itself: keep a clone of the handle to remove the listener
/// later.
pub type Listener = Rc<dyn Fn(&Event<'_>)>;

struct Registration {
    listener: Listener,
    once: bool,
}

/// A registry of lifecycle event listeners.
///
/// Listeners for one event fire in registration order, and registering
/// the same handle twice is a no-op. The registry uses interior
/// mutability, so a listener may re-enter it while an emit is in
/// progress.
#[derive(Default)]
pub struct Emitter {
    registrations: RefCell<HashMap<EventKind, Vec<Registration>>>,
}

impl Emitter {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `kind`.
    pub fn on(&self, kind: EventKind, listener: Listener) -> &Self {
        self.register(kind, listener, false)
    }

    /// Registers `listener` for `kind`, to fire at most once.
    ///
    /// The registration is removed before the callback runs, so an emit
    /// from inside the callback cannot re-enter it.
    pub fn once(&self, kind: EventKind, listener: Listener) -> &Self {
        self.register(kind, listener, true)
    }

    fn register(&self, kind: EventKind, listener: Listener, once: bool) -> &Self {
        let mut registrations = self.registrations.borrow_mut();
        let entries = registrations.entry(kind).or_default();
        if !entries.iter().any(|e| Rc::ptr_eq(&e.listener, &listener)) {
            entries.push(Registration { listener, once });
        }

        self
    }

    /// Removes `listener` from `kind`. Removing an unregistered listener
    /// is a no-op.
    pub fn off(&self, kind: EventKind, listener: &Listener) -> &Self {
        let mut registrations = self.registrations.borrow_mut();
        if let Some(entries) = registrations.get_mut(&kind) {
            entries.retain(|e| !Rc::ptr_eq(&e.listener, listener));
            if entries.is_empty() {
                registrations.remove(&kind);
            }
        }

        self
    }

    /// Invokes every listener registered for the event's kind, in
    /// registration order.
    ///
    /// Once-registrations are removed before any callback runs. Emitting
    /// an event nobody listens for is a no-op.
    pub fn emit(&self, event: &Event<'_>) -> &Self {
        let kind = event.kind();

        let snapshot: Vec<Listener> = {
            let mut registrations = self.registrations.borrow_mut();
            let Some(entries) = registrations.get_mut(&kind) else {
                return self;
            };

            let snapshot = entries.iter().map(|e| e.listener.clone()).collect();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                registrations.remove(&kind);
            }

            snapshot
        };

        for listener in snapshot {
            listener(event);
        }

        self
    }

    /// The number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations
            .borrow()
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("events", &self.registrations.borrow().len())
            .finish()
    }
}

//! Client bridge: one connected remote client as extensions see it.
//!
//! The host constructs a [`ClientBridge`] when the network server accepts a
//! client and destroys it (removes it from the registry) when the client
//! disconnects.  Extensions never hold the bridge directly — they hold a
//! [`ClientHandle`], a leased proxy issued per extension context, so a torn
//! down or stale context cannot keep poking a live client.
//!
//! The two dispatch sinks are wired by the host to the external client
//! connection.  Extensions use them to forward (broadcast) input to that
//! client, which is the entire point of a multiboxing extension.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::input::{KeyInput, PointerInput};
use crate::lease::Lease;

/// Leased proxy to a [`ClientBridge`].  The only form in which extensions
/// reach a client.
pub type ClientHandle = Lease<ClientBridge>;

/// Sink forwarding a key payload into the external client connection.
pub type KeySink = dyn Fn(KeyInput) + Send + Sync;
/// Sink forwarding a pointer payload into the external client connection.
pub type PointerSink = dyn Fn(PointerInput) + Send + Sync;
/// Callback observing attach/detach transitions; receives the new state.
pub type AttachmentHandler = dyn Fn(bool) + Send + Sync;

/// One connected remote client.
///
/// The display name is mutable: the external client may rename itself at any
/// time and the host mirrors the change here.  Name readers always see a
/// consistent snapshot; lookups in the host tolerate concurrent renames by
/// scanning snapshots rather than keying a map on the name.
pub struct ClientBridge {
    name: Mutex<String>,
    attached: AtomicBool,
    key_sink: Box<KeySink>,
    pointer_sink: Box<PointerSink>,
    attachment_handlers: Mutex<Vec<Arc<AttachmentHandler>>>,
}

impl std::fmt::Debug for ClientBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBridge")
            .field("name", &self.name())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl ClientBridge {
    /// Creates a bridge wired to the given dispatch sinks.
    pub fn new(
        name: impl Into<String>,
        key_sink: Box<KeySink>,
        pointer_sink: Box<PointerSink>,
    ) -> Self {
        Self {
            name: Mutex::new(name.into()),
            attached: AtomicBool::new(false),
            key_sink,
            pointer_sink,
            attachment_handlers: Mutex::new(Vec::new()),
        }
    }

    /// Current display name.
    pub fn name(&self) -> String {
        self.name.lock().expect("client name poisoned").clone()
    }

    /// Mirrors an external rename.  Host-side only in practice.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock().expect("client name poisoned") = name.into();
    }

    /// Whether the client window is currently attached.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Forwards a key payload to this client.
    pub fn dispatch_key(&self, input: KeyInput) {
        (self.key_sink)(input);
    }

    /// Forwards a pointer payload to this client.
    pub fn dispatch_pointer(&self, input: PointerInput) {
        (self.pointer_sink)(input);
    }

    /// Subscribes to attach/detach transitions.
    pub fn subscribe_attachment_changed(&self, handler: Arc<AttachmentHandler>) {
        self.attachment_handlers
            .lock()
            .expect("attachment handlers poisoned")
            .push(handler);
    }

    /// Signals that the client window attached.  Host-side.
    pub fn on_attached(&self) {
        self.attached.store(true, Ordering::Release);
        self.notify_attachment(true);
    }

    /// Signals that the client window detached.  Host-side.
    pub fn on_detached(&self) {
        self.attached.store(false, Ordering::Release);
        self.notify_attachment(false);
    }

    fn notify_attachment(&self, attached: bool) {
        // Snapshot first: a handler may subscribe another handler.
        let handlers: Vec<_> = self
            .attachment_handlers
            .lock()
            .expect("attachment handlers poisoned")
            .clone();
        for handler in handlers {
            handler(attached);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyState, Modifiers, MouseMessage, MouseButton};

    fn recording_bridge() -> (
        Arc<ClientBridge>,
        Arc<Mutex<Vec<KeyInput>>>,
        Arc<Mutex<Vec<PointerInput>>>,
    ) {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let pointers = Arc::new(Mutex::new(Vec::new()));
        let keys_sink = Arc::clone(&keys);
        let pointers_sink = Arc::clone(&pointers);
        let bridge = Arc::new(ClientBridge::new(
            "alpha",
            Box::new(move |k| keys_sink.lock().unwrap().push(k)),
            Box::new(move |p| pointers_sink.lock().unwrap().push(p)),
        ));
        (bridge, keys, pointers)
    }

    #[test]
    fn test_dispatch_key_reaches_sink() {
        let (bridge, keys, _) = recording_bridge();
        bridge.dispatch_key(KeyInput {
            key_code: 0x41,
            state: KeyState::Down,
            modifiers: Modifiers::default(),
            time_ms: 1,
        });
        assert_eq!(keys.lock().unwrap().len(), 1);
        assert_eq!(keys.lock().unwrap()[0].key_code, 0x41);
    }

    #[test]
    fn test_dispatch_pointer_reaches_sink() {
        let (bridge, _, pointers) = recording_bridge();
        bridge.dispatch_pointer(PointerInput {
            message: MouseMessage::ButtonDown(MouseButton::Left),
            is_absolute: true,
            x: 5,
            y: 6,
            flags: 0,
            time_ms: 2,
        });
        assert_eq!(pointers.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_rename_is_visible_to_readers() {
        let (bridge, _, _) = recording_bridge();
        assert_eq!(bridge.name(), "alpha");
        bridge.set_name("alpha-renamed");
        assert_eq!(bridge.name(), "alpha-renamed");
    }

    #[test]
    fn test_attachment_transitions_notify_subscribers() {
        let (bridge, _, _) = recording_bridge();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_handler = Arc::clone(&seen);
        bridge.subscribe_attachment_changed(Arc::new(move |attached| {
            seen_handler.lock().unwrap().push(attached);
        }));

        bridge.on_attached();
        bridge.on_detached();

        assert!(bridge.is_attached() == false);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }
}

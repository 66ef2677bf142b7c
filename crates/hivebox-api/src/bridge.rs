//! Extension bridge: the per-extension window into the host.
//!
//! Each loaded extension receives exactly one [`ExtensionBridge`] at
//! initialization.  Through it the extension observes:
//!
//! - the set of connected clients, as a **private copy** of leased handles
//!   that the host re-syncs on every accept/remove (never a live reference
//!   into the master registry — one extension mutating its view cannot
//!   disturb another's),
//! - keyboard and mouse input, via the [`VirtualKeyboard`] / [`VirtualMouse`]
//!   event sources it subscribes handlers on,
//! - active-client changes, so it can re-target without polling.
//!
//! Handlers run on the host's dispatch workers.  A handler that panics is
//! contained at the host's fan-out boundary; it never takes down the host or
//! the other extensions.

use std::sync::{Arc, Mutex};

use crate::client::ClientHandle;
use crate::input::{KeyboardEvent, MouseEvent};

/// Keyboard input handler.  `sender` is the resolved target client for the
/// event (the same value carried in the view).
pub type KeyboardHandler = dyn Fn(Option<&ClientHandle>, &mut KeyboardEvent) + Send + Sync;
/// Mouse input handler.
pub type MouseHandler = dyn Fn(Option<&ClientHandle>, &mut MouseEvent) + Send + Sync;
/// Active-client-changed handler; `None` means no client is active.
pub type ActiveClientHandler = dyn Fn(Option<&ClientHandle>) + Send + Sync;

/// Keyboard event source exposed to one extension.
#[derive(Default)]
pub struct VirtualKeyboard {
    handlers: Mutex<Vec<Arc<KeyboardHandler>>>,
}

impl VirtualKeyboard {
    /// Registers a handler for keyboard events.
    pub fn subscribe(&self, handler: Arc<KeyboardHandler>) {
        self.handlers
            .lock()
            .expect("keyboard handlers poisoned")
            .push(handler);
    }

    /// Invokes every registered handler with the event view.  Host-side;
    /// called once per extension per dispatch round.
    pub fn raise(&self, sender: Option<&ClientHandle>, event: &mut KeyboardEvent) {
        // Snapshot so a handler can subscribe without deadlocking.
        let handlers: Vec<_> = self
            .handlers
            .lock()
            .expect("keyboard handlers poisoned")
            .clone();
        for handler in handlers {
            handler(sender, event);
        }
    }
}

/// Mouse event source exposed to one extension.  Pure pointer moves are
/// filtered by the host and never raised here.
#[derive(Default)]
pub struct VirtualMouse {
    handlers: Mutex<Vec<Arc<MouseHandler>>>,
}

impl VirtualMouse {
    /// Registers a handler for mouse events.
    pub fn subscribe(&self, handler: Arc<MouseHandler>) {
        self.handlers
            .lock()
            .expect("mouse handlers poisoned")
            .push(handler);
    }

    /// Invokes every registered handler with the event view.  Host-side.
    pub fn raise(&self, sender: Option<&ClientHandle>, event: &mut MouseEvent) {
        let handlers: Vec<_> = self
            .handlers
            .lock()
            .expect("mouse handlers poisoned")
            .clone();
        for handler in handlers {
            handler(sender, event);
        }
    }
}

/// The per-extension bridge.
pub struct ExtensionBridge {
    clients: Mutex<Vec<ClientHandle>>,
    keyboard: VirtualKeyboard,
    mouse: VirtualMouse,
    active_client_handlers: Mutex<Vec<Arc<ActiveClientHandler>>>,
}

impl std::fmt::Debug for ExtensionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionBridge")
            .field("clients", &self.clients.lock().expect("clients poisoned").len())
            .finish()
    }
}

impl Default for ExtensionBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionBridge {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            keyboard: VirtualKeyboard::default(),
            mouse: VirtualMouse::default(),
            active_client_handlers: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of this extension's client view.
    pub fn clients(&self) -> Vec<ClientHandle> {
        self.clients.lock().expect("clients poisoned").clone()
    }

    /// The keyboard event source.
    pub fn keyboard(&self) -> &VirtualKeyboard {
        &self.keyboard
    }

    /// The mouse event source.
    pub fn mouse(&self) -> &VirtualMouse {
        &self.mouse
    }

    /// Adds a client handle to this extension's view.  Host-side, on accept.
    pub fn add_client(&self, client: ClientHandle) {
        self.clients.lock().expect("clients poisoned").push(client);
    }

    /// Removes the client with the given display name from this extension's
    /// view.  Matching looks through the handle regardless of lease validity,
    /// so an expired handle for another client stays in the view and can
    /// still be renewed.  Revoked handles are dropped as well.
    pub fn remove_client(&self, name: &str) {
        self.clients
            .lock()
            .expect("clients poisoned")
            .retain(|handle| !handle.is_revoked() && handle.peek().name() != name);
    }

    /// Registers a handler for active-client changes.
    pub fn subscribe_active_client_changed(&self, handler: Arc<ActiveClientHandler>) {
        self.active_client_handlers
            .lock()
            .expect("active-client handlers poisoned")
            .push(handler);
    }

    /// Notifies this extension that the active client changed.  Host-side.
    pub fn notify_active_client_changed(&self, client: Option<&ClientHandle>) {
        let handlers: Vec<_> = self
            .active_client_handlers
            .lock()
            .expect("active-client handlers poisoned")
            .clone();
        for handler in handlers {
            handler(client);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientBridge;
    use crate::input::{KeyInput, KeyState, Modifiers};
    use crate::lease::{LeaseAuthority, LeaseError};
    use std::time::Duration;

    fn handle(authority: &LeaseAuthority, name: &str) -> ClientHandle {
        authority.issue(Arc::new(ClientBridge::new(
            name,
            Box::new(|_| {}),
            Box::new(|_| {}),
        )))
    }

    fn key_event() -> KeyboardEvent {
        KeyboardEvent {
            client: None,
            handled: false,
            input: KeyInput {
                key_code: 0x20,
                state: KeyState::Down,
                modifiers: Modifiers::default(),
                time_ms: 0,
            },
        }
    }

    #[test]
    fn test_client_view_add_and_remove_by_name() {
        let authority = LeaseAuthority::new("ext.test");
        let bridge = ExtensionBridge::new();
        bridge.add_client(handle(&authority, "alpha"));
        bridge.add_client(handle(&authority, "beta"));
        assert_eq!(bridge.clients().len(), 2);

        bridge.remove_client("alpha");
        let remaining = bridge.clients();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].get().unwrap().name(), "beta");
    }

    #[test]
    fn test_remove_client_drops_revoked_handles() {
        let authority = LeaseAuthority::new("ext.test");
        let bridge = ExtensionBridge::new();
        bridge.add_client(handle(&authority, "alpha"));
        authority.revoke_all();

        bridge.remove_client("unrelated");
        assert!(bridge.clients().is_empty());
    }

    #[test]
    fn test_remove_client_keeps_expired_handles_of_other_clients() {
        // Arrange: both handles have expired but remain renewable.
        let authority = LeaseAuthority::with_ttl("ext.test", Duration::from_millis(50));
        let bridge = ExtensionBridge::new();
        bridge.add_client(handle(&authority, "alpha"));
        bridge.add_client(handle(&authority, "beta"));
        std::thread::sleep(Duration::from_millis(150));

        // Act
        bridge.remove_client("beta");

        // Assert: alpha survives the removal and revives on renewal.
        let remaining = bridge.clients();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].get().err(), Some(LeaseError::Expired));
        remaining[0].renew();
        assert_eq!(remaining[0].get().unwrap().name(), "alpha");
    }

    #[test]
    fn test_keyboard_raise_invokes_subscriber_and_mutates_view() {
        let bridge = ExtensionBridge::new();
        bridge
            .keyboard()
            .subscribe(Arc::new(|_, event| event.handled = true));

        let mut event = key_event();
        bridge.keyboard().raise(None, &mut event);
        assert!(event.handled);
    }

    #[test]
    fn test_active_client_notification_reaches_subscriber() {
        let authority = LeaseAuthority::new("ext.test");
        let bridge = ExtensionBridge::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_handler = Arc::clone(&seen);
        bridge.subscribe_active_client_changed(Arc::new(move |client| {
            let name = client.and_then(|c| c.get().ok().map(|b| b.name()));
            seen_handler.lock().unwrap().push(name);
        }));

        let active = handle(&authority, "gamma");
        bridge.notify_active_client_changed(Some(&active));
        bridge.notify_active_client_changed(None);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("gamma".to_string()), None]
        );
    }
}

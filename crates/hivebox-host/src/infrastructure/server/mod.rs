//! Contracts for the external network server and its clients.
//!
//! The server that accepts and drops remote clients is not part of this
//! crate; the extension host consumes it through the traits here.
//!
//! - [`ControlServer`] — subscription surface for accept/remove
//!   notifications.  [`ServerEventHub`] is the concrete implementation the
//!   network layer drives.
//! - [`RemoteClient`] — one connected client: its UI-affine display name,
//!   attachment state, the input sinks events are forwarded into, and the
//!   rename / attachment-changed notifications the host mirrors.
//! - [`UiDispatcher`] — scoped blocking hand-off onto the thread owning the
//!   client's display properties.  Reading a display name off that thread is
//!   a bug in the external layer; the host always marshals.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use hivebox_api::{KeyInput, PointerInput};

pub mod mock;

/// Identifier for an event subscription, used to unsubscribe.
pub type Subscription = u64;

/// Receives server lifecycle notifications.
pub trait ServerListener: Send + Sync {
    fn client_accepted(&self, client: Arc<dyn RemoteClient>);
    fn client_removed(&self, client: Arc<dyn RemoteClient>);
}

/// The external server's notification surface.
pub trait ControlServer: Send + Sync {
    fn subscribe(&self, listener: Arc<dyn ServerListener>) -> Subscription;
    fn unsubscribe(&self, id: Subscription);
}

/// One remote client as exposed by the external server.
pub trait RemoteClient: Send + Sync {
    /// Current display name.  UI-affine: call only from inside a
    /// [`UiDispatcher::invoke`] closure.
    fn display_name(&self) -> String;

    /// Whether the client window is attached.
    fn is_attached(&self) -> bool;

    /// Forwards a key payload to the client.
    fn dispatch_key(&self, input: KeyInput);

    /// Forwards a pointer payload to the client.
    fn dispatch_pointer(&self, input: PointerInput);

    /// Subscribes to display-name changes; the callback receives the new name.
    fn subscribe_renamed(&self, callback: Box<dyn Fn(&str) + Send + Sync>) -> Subscription;

    /// Subscribes to attach/detach transitions.
    fn subscribe_attachment_changed(
        &self,
        callback: Box<dyn Fn() + Send + Sync>,
    ) -> Subscription;

    /// Drops an attachment-changed subscription.  Unknown ids are ignored.
    fn unsubscribe_attachment_changed(&self, id: Subscription);
}

/// Marshals work onto the thread owning UI-affine client state, blocking the
/// caller until it has run.  A hand-off, not a suspension point.
pub trait UiDispatcher: Send + Sync {
    fn invoke(&self, f: &mut dyn FnMut());
}

/// Runs the closure inline.  Correct wherever no separate UI thread exists
/// (headless host, tests); the real UI layer supplies its own dispatcher.
pub struct InlineUiDispatcher;

impl UiDispatcher for InlineUiDispatcher {
    fn invoke(&self, f: &mut dyn FnMut()) {
        f();
    }
}

/// Reads a client's display name through the marshaling hand-off.
pub fn marshaled_display_name(ui: &dyn UiDispatcher, client: &dyn RemoteClient) -> String {
    let mut name = String::new();
    ui.invoke(&mut || name = client.display_name());
    name
}

/// Concrete [`ControlServer`]: the network layer calls
/// [`accept_client`](Self::accept_client) / [`remove_client`](Self::remove_client)
/// and the hub fans the notification out to every subscribed listener.
#[derive(Default)]
pub struct ServerEventHub {
    listeners: Mutex<HashMap<Subscription, Arc<dyn ServerListener>>>,
    next_id: AtomicU64,
}

impl ServerEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifies listeners that the server accepted a client.
    pub fn accept_client(&self, client: Arc<dyn RemoteClient>) {
        for listener in self.listener_snapshot() {
            listener.client_accepted(Arc::clone(&client));
        }
    }

    /// Notifies listeners that the server dropped a client.
    pub fn remove_client(&self, client: Arc<dyn RemoteClient>) {
        for listener in self.listener_snapshot() {
            listener.client_removed(Arc::clone(&client));
        }
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().expect("listeners poisoned").len()
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn ServerListener>> {
        self.listeners
            .lock()
            .expect("listeners poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl ControlServer for ServerEventHub {
    fn subscribe(&self, listener: Arc<dyn ServerListener>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("listeners poisoned")
            .insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: Subscription) {
        self.listeners.lock().expect("listeners poisoned").remove(&id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::MockRemoteClient;
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct CountingListener {
        accepted: AtomicU32,
        removed: AtomicU32,
    }

    impl ServerListener for CountingListener {
        fn client_accepted(&self, _client: Arc<dyn RemoteClient>) {
            self.accepted.fetch_add(1, Ordering::SeqCst);
        }

        fn client_removed(&self, _client: Arc<dyn RemoteClient>) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_hub_fans_notifications_to_subscribed_listeners() {
        let hub = ServerEventHub::new();
        let listener = Arc::new(CountingListener::default());
        hub.subscribe(Arc::clone(&listener) as Arc<dyn ServerListener>);

        let client = Arc::new(MockRemoteClient::new("alpha"));
        hub.accept_client(client.clone());
        hub.remove_client(client);

        assert_eq!(listener.accepted.load(Ordering::SeqCst), 1);
        assert_eq!(listener.removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribed_listener_stops_receiving() {
        let hub = ServerEventHub::new();
        let listener = Arc::new(CountingListener::default());
        let id = hub.subscribe(Arc::clone(&listener) as Arc<dyn ServerListener>);
        hub.unsubscribe(id);

        hub.accept_client(Arc::new(MockRemoteClient::new("alpha")));
        assert_eq!(listener.accepted.load(Ordering::SeqCst), 0);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_marshaled_display_name_reads_through_dispatcher() {
        let client = MockRemoteClient::new("alpha");
        let name = marshaled_display_name(&InlineUiDispatcher, &client);
        assert_eq!(name, "alpha");
    }
}

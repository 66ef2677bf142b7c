//! Recording remote client for tests.
//!
//! Records every dispatched payload and exposes driver methods (`rename`,
//! `set_attached`) that fire the same notifications the real server fires,
//! so host-side mirroring is testable without a network layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use hivebox_api::{KeyInput, PointerInput};

use super::{RemoteClient, Subscription};

/// A [`RemoteClient`] that records dispatched input and lets the test drive
/// rename and attachment transitions.
pub struct MockRemoteClient {
    name: Mutex<String>,
    attached: AtomicBool,
    keys: Mutex<Vec<KeyInput>>,
    pointers: Mutex<Vec<PointerInput>>,
    renamed: Mutex<HashMap<Subscription, Box<dyn Fn(&str) + Send + Sync>>>,
    attachment: Mutex<HashMap<Subscription, Box<dyn Fn() + Send + Sync>>>,
    next_id: AtomicU64,
}

impl MockRemoteClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Mutex::new(name.into()),
            attached: AtomicBool::new(true),
            keys: Mutex::new(Vec::new()),
            pointers: Mutex::new(Vec::new()),
            renamed: Mutex::new(HashMap::new()),
            attachment: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Changes the display name and fires rename callbacks, like the real
    /// server does when the user renames a client.
    pub fn rename(&self, new_name: impl Into<String>) {
        let new_name = new_name.into();
        *self.name.lock().expect("name poisoned") = new_name.clone();
        let callbacks = self.renamed.lock().expect("renamed poisoned");
        for callback in callbacks.values() {
            callback(&new_name);
        }
    }

    /// Flips attachment state and fires attachment-changed callbacks.
    pub fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::SeqCst);
        let callbacks = self.attachment.lock().expect("attachment poisoned");
        for callback in callbacks.values() {
            callback();
        }
    }

    /// Key payloads dispatched so far.
    pub fn keys(&self) -> Vec<KeyInput> {
        self.keys.lock().expect("keys poisoned").clone()
    }

    /// Pointer payloads dispatched so far.
    pub fn pointers(&self) -> Vec<PointerInput> {
        self.pointers.lock().expect("pointers poisoned").clone()
    }

    fn next_id(&self) -> Subscription {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl RemoteClient for MockRemoteClient {
    fn display_name(&self) -> String {
        self.name.lock().expect("name poisoned").clone()
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn dispatch_key(&self, input: KeyInput) {
        self.keys.lock().expect("keys poisoned").push(input);
    }

    fn dispatch_pointer(&self, input: PointerInput) {
        self.pointers.lock().expect("pointers poisoned").push(input);
    }

    fn subscribe_renamed(&self, callback: Box<dyn Fn(&str) + Send + Sync>) -> Subscription {
        let id = self.next_id();
        self.renamed
            .lock()
            .expect("renamed poisoned")
            .insert(id, callback);
        id
    }

    fn subscribe_attachment_changed(
        &self,
        callback: Box<dyn Fn() + Send + Sync>,
    ) -> Subscription {
        let id = self.next_id();
        self.attachment
            .lock()
            .expect("attachment poisoned")
            .insert(id, callback);
        id
    }

    fn unsubscribe_attachment_changed(&self, id: Subscription) {
        self.attachment.lock().expect("attachment poisoned").remove(&id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

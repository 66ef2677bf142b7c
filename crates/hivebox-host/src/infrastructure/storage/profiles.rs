//! Profile state: named client groupings and the per-profile active client.
//!
//! Profiles come from the persisted [`AppConfig`](super::config::AppConfig);
//! the store holds the live copy, answers lookups against the active profile,
//! and notifies subscribers when the active profile's focused client changes.
//! Lookups never consult inactive profiles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::debug;

use hivebox_api::WindowHandle;

use super::config::AppConfig;
use crate::infrastructure::server::Subscription;

/// Callback fired when the active profile's focused client changes.  Receives
/// the new active client name, or `None` when focus was cleared.
pub type ActiveClientCallback = Box<dyn Fn(Option<&str>) + Send + Sync>;

/// One client as a profile records it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRef {
    pub name: String,
    pub window_handle: WindowHandle,
}

/// Point-in-time copy of one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub name: String,
    /// Name of the profile's focused client, if any.
    pub active_client: Option<String>,
    pub clients: Vec<ClientRef>,
}

impl ProfileSnapshot {
    /// Finds a client in this profile by window handle.
    pub fn client_by_handle(&self, handle: WindowHandle) -> Option<&ClientRef> {
        self.clients.iter().find(|c| c.window_handle == handle)
    }
}

/// Read surface the extension host consumes.
pub trait ProfileStore: Send + Sync {
    /// Names of all configured profiles.
    fn profile_names(&self) -> Vec<String>;

    /// Snapshot of the active profile, or `None` when no profile is active.
    fn active_profile(&self) -> Option<ProfileSnapshot>;

    /// Subscribes to active-client changes on the active profile.
    fn subscribe_active_client_changed(&self, callback: ActiveClientCallback) -> Subscription;

    /// Drops a subscription.  Unknown ids are ignored.
    fn unsubscribe_active_client_changed(&self, id: Subscription);
}

/// In-memory [`ProfileStore`] seeded from the persisted config.
#[derive(Default)]
pub struct ConfigProfileStore {
    state: Mutex<StoreState>,
    callbacks: Mutex<HashMap<Subscription, ActiveClientCallback>>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct StoreState {
    profiles: Vec<ProfileSnapshot>,
    active_profile: Option<String>,
}

impl ConfigProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the store from the persisted config.
    pub fn from_config(config: &AppConfig) -> Self {
        let profiles = config
            .profiles
            .iter()
            .map(|p| ProfileSnapshot {
                name: p.name.clone(),
                active_client: p.active_client.clone(),
                clients: p
                    .clients
                    .iter()
                    .map(|c| ClientRef {
                        name: c.name.clone(),
                        window_handle: c.window_handle,
                    })
                    .collect(),
            })
            .collect();
        Self {
            state: Mutex::new(StoreState {
                profiles,
                active_profile: config.active_profile.clone(),
            }),
            callbacks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Adds a profile.  A profile with the same name is replaced.
    pub fn upsert_profile(&self, profile: ProfileSnapshot) {
        let mut state = self.state.lock().expect("profiles poisoned");
        if let Some(existing) = state.profiles.iter_mut().find(|p| p.name == profile.name) {
            *existing = profile;
        } else {
            state.profiles.push(profile);
        }
    }

    /// Makes `name` the active profile.  `None` deactivates all profiles.
    pub fn set_active_profile(&self, name: Option<&str>) {
        let mut state = self.state.lock().expect("profiles poisoned");
        state.active_profile = name.map(str::to_string);
    }

    /// Changes the focused client of `profile` and, if that profile is the
    /// active one, fires the active-client-changed callbacks.
    pub fn set_active_client(&self, profile: &str, client: Option<&str>) {
        let is_active = {
            let mut state = self.state.lock().expect("profiles poisoned");
            match state.profiles.iter_mut().find(|p| p.name == profile) {
                Some(p) => {
                    p.active_client = client.map(str::to_string);
                }
                None => return,
            }
            state.active_profile.as_deref() == Some(profile)
        };
        if !is_active {
            return;
        }
        debug!(profile, client = client.unwrap_or("<none>"), "active client changed");
        let callbacks = self.callbacks.lock().expect("callbacks poisoned");
        for callback in callbacks.values() {
            callback(client);
        }
    }
}

impl ProfileStore for ConfigProfileStore {
    fn profile_names(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("profiles poisoned")
            .profiles
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    fn active_profile(&self) -> Option<ProfileSnapshot> {
        let state = self.state.lock().expect("profiles poisoned");
        let active = state.active_profile.as_deref()?;
        state.profiles.iter().find(|p| p.name == active).cloned()
    }

    fn subscribe_active_client_changed(&self, callback: ActiveClientCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .lock()
            .expect("callbacks poisoned")
            .insert(id, callback);
        id
    }

    fn unsubscribe_active_client_changed(&self, id: Subscription) {
        self.callbacks.lock().expect("callbacks poisoned").remove(&id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

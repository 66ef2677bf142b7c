//! Extension host: discovery, lifecycle, and the input fan-out pipeline.
//!
//! The host owns one [`ExtensionSlot`] per loaded module and the master
//! [`ClientRegistry`].  Server and profile notifications arrive on external
//! threads and are turned into dispatch-pool jobs immediately; nothing in
//! this module blocks the notifying thread beyond a queue push.
//!
//! Error containment is split by phase.  Discovery and initialization
//! failures propagate and abort the load pass, because bad packaging should
//! crash loudly at startup.  Failures inside a loaded extension's handlers
//! are caught per extension at the fan-out boundary and logged, so one broken
//! extension cannot block input delivery to the rest.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;
use tracing::{debug, error, info, trace};

use hivebox_api::{
    ClientBridge, ExtensionBridge, ExtensionError, KeyInput, KeyboardEvent, MouseEvent,
    PointerInput, ServiceHandle, WindowHandle,
};

use crate::application::client_registry::ClientRegistry;
use crate::application::services::ServiceRegistry;
use crate::infrastructure::discovery::{discover_modules, DiscoveryError};
use crate::infrastructure::sandbox::{ContextProvider, ExtensionContext, SandboxError};
use crate::infrastructure::server::{
    marshaled_display_name, ControlServer, RemoteClient, ServerListener, Subscription,
    UiDispatcher,
};
use crate::infrastructure::storage::profiles::ProfileStore;
use crate::infrastructure::task_pool::DispatchPool;

/// Error type for host lifecycle operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// Reserved operation with no implementation yet.
    #[error("operation `{0}` is not implemented")]
    NotImplemented(&'static str),

    /// Two discovered modules derived the same friendly name.
    #[error("duplicate extension module name `{0}`")]
    DuplicateModule(String),

    /// Module discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Context creation or module loading failed.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// An extension failed to initialize.
    #[error("extension initialization failed: {0}")]
    Extension(#[from] ExtensionError),
}

/// A keyboard event as delivered by the external capture layer.
#[derive(Debug, Clone, Copy)]
pub struct CapturedKeyboard {
    /// OS handle of the window the event targeted, `0` when unknown.
    pub window_handle: WindowHandle,
    /// Whether an earlier consumer already handled the event.
    pub handled: bool,
    pub input: KeyInput,
}

/// A mouse event as delivered by the external capture layer.
#[derive(Debug, Clone, Copy)]
pub struct CapturedMouse {
    pub window_handle: WindowHandle,
    pub handled: bool,
    pub input: PointerInput,
}

/// One loaded extension: its name, isolation context, and private bridge.
///
/// Created during discovery and never removed while the process lives; `stop`
/// does not unload.  Clones are cheap (everything inside is shared), which is
/// what makes slot-list snapshots viable per dispatch round.
#[derive(Clone)]
pub struct ExtensionSlot {
    name: String,
    context: ExtensionContext,
    bridge: Arc<ExtensionBridge>,
}

impl ExtensionSlot {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Association between a remote client and the bridge built for it, kept so
/// removal can unhook the attachment subscription.
struct ClientLink {
    remote: Arc<dyn RemoteClient>,
    attachment_subscription: Subscription,
}

/// The extension host.  Constructed once at process start and passed
/// explicitly to whatever needs it; there is no ambient global instance.
pub struct ExtensionHost {
    provider: Arc<dyn ContextProvider>,
    server: Arc<dyn ControlServer>,
    profiles: Arc<dyn ProfileStore>,
    ui: Arc<dyn UiDispatcher>,
    pool: Arc<DispatchPool>,
    registry: ClientRegistry,
    services: ServiceRegistry,
    slots: Mutex<Vec<ExtensionSlot>>,
    links: Mutex<Vec<ClientLink>>,
    server_subscription: Mutex<Option<Subscription>>,
    profile_subscription: Mutex<Option<Subscription>>,
}

/// Adapter forwarding server notifications into the host.  Holds a weak
/// reference so a subscription left behind cannot keep the host alive.
struct HostListener {
    host: Weak<ExtensionHost>,
}

impl ServerListener for HostListener {
    fn client_accepted(&self, client: Arc<dyn RemoteClient>) {
        if let Some(host) = self.host.upgrade() {
            host.on_client_accepted(client);
        }
    }

    fn client_removed(&self, client: Arc<dyn RemoteClient>) {
        if let Some(host) = self.host.upgrade() {
            host.on_client_removed(client);
        }
    }
}

impl ExtensionHost {
    pub fn new(
        provider: Arc<dyn ContextProvider>,
        server: Arc<dyn ControlServer>,
        profiles: Arc<dyn ProfileStore>,
        ui: Arc<dyn UiDispatcher>,
        pool: Arc<DispatchPool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            server,
            profiles,
            ui,
            pool,
            registry: ClientRegistry::new(),
            services: ServiceRegistry::new(),
            slots: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
            server_subscription: Mutex::new(None),
            profile_subscription: Mutex::new(None),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Subscribes to server and profile notifications, then discovers and
    /// loads every `ext.*` module in the working directory.
    ///
    /// # Errors
    ///
    /// Any discovery, context-creation, or initialization failure aborts the
    /// pass for the remaining modules and propagates.
    pub fn initialize(self: &Arc<Self>) -> Result<(), HostError> {
        self.initialize_from(Path::new("."))
    }

    /// [`initialize`](Self::initialize) against an explicit extensions
    /// directory.
    pub fn initialize_from(self: &Arc<Self>, dir: &Path) -> Result<(), HostError> {
        self.subscribe_notifications();

        for module in discover_modules(dir)? {
            if self
                .slots
                .lock()
                .expect("slots poisoned")
                .iter()
                .any(|slot| slot.name == module.name)
            {
                return Err(HostError::DuplicateModule(module.name));
            }

            let context = self.provider.create_context(&module.name, &module.path)?;

            // Pre-populate the extension's private view with the clients
            // already connected, each behind this context's own lease.
            let bridge = Arc::new(ExtensionBridge::new());
            for client in self.registry.snapshot() {
                bridge.add_client(context.issue_client(client));
            }

            self.slots.lock().expect("slots poisoned").push(ExtensionSlot {
                name: module.name.clone(),
                context: context.clone(),
                bridge: Arc::clone(&bridge),
            });

            context.loader().initialize(bridge, &module.path)?;
            info!(extension = %module.name, context = %context.id(), "extension initialized");
        }
        Ok(())
    }

    /// Unsubscribes from server and profile notifications.  Extensions stay
    /// loaded; their contexts live until the process exits.
    pub fn shutdown(&self) {
        if let Some(id) = self.server_subscription.lock().expect("subscription poisoned").take() {
            self.server.unsubscribe(id);
        }
        if let Some(id) = self.profile_subscription.lock().expect("subscription poisoned").take()
        {
            self.profiles.unsubscribe_active_client_changed(id);
        }
        info!("extension host shut down");
    }

    /// Reserved for per-extension enable/disable.  Currently a no-op.
    pub fn start(&self, name: &str) {
        debug!(extension = name, "start requested (no-op)");
    }

    /// Stops the named extension.  The module stays loaded and its slot
    /// remains registered.  An unknown name is silently ignored.
    pub fn stop(&self, name: &str) {
        let slot = self
            .slots
            .lock()
            .expect("slots poisoned")
            .iter()
            .find(|slot| slot.name == name)
            .cloned();
        match slot {
            Some(slot) => {
                slot.context.loader().stop();
                info!(extension = name, "extension stopped");
            }
            None => debug!(extension = name, "stop requested for unknown extension"),
        }
    }

    /// Reserved.
    ///
    /// # Errors
    ///
    /// Always returns [`HostError::NotImplemented`].
    pub fn start_all(&self) -> Result<(), HostError> {
        Err(HostError::NotImplemented("start_all"))
    }

    /// Names of all loaded extensions, in registration order.
    pub fn extension_names(&self) -> Vec<String> {
        self.slots
            .lock()
            .expect("slots poisoned")
            .iter()
            .map(|slot| slot.name.clone())
            .collect()
    }

    fn subscribe_notifications(self: &Arc<Self>) {
        let mut server_sub = self.server_subscription.lock().expect("subscription poisoned");
        if server_sub.is_none() {
            let listener = Arc::new(HostListener {
                host: Arc::downgrade(self),
            });
            *server_sub = Some(self.server.subscribe(listener));
        }
        drop(server_sub);

        let mut profile_sub = self.profile_subscription.lock().expect("subscription poisoned");
        if profile_sub.is_none() {
            let host = Arc::downgrade(self);
            *profile_sub = Some(self.profiles.subscribe_active_client_changed(Box::new(
                move |name| {
                    if let Some(host) = host.upgrade() {
                        host.on_active_client_changed(name.map(str::to_string));
                    }
                },
            )));
        }
    }

    // ── Client registry maintenance ───────────────────────────────────────────

    /// Handles a client-accepted notification.  Returns before the registry
    /// update happens; the work runs on the dispatch pool.
    pub fn on_client_accepted(self: &Arc<Self>, remote: Arc<dyn RemoteClient>) {
        let host = Arc::clone(self);
        self.pool.submit(Box::new(move || host.accept_client(remote)));
    }

    /// Handles a client-removed notification asynchronously.
    pub fn on_client_removed(self: &Arc<Self>, remote: Arc<dyn RemoteClient>) {
        let host = Arc::clone(self);
        self.pool.submit(Box::new(move || host.remove_client(remote)));
    }

    fn accept_client(self: Arc<Self>, remote: Arc<dyn RemoteClient>) {
        // Display name is UI-affine; read it through the marshaling hand-off
        // before the bridge crosses into extension-visible state.
        let name = marshaled_display_name(self.ui.as_ref(), remote.as_ref());

        let key_remote = Arc::clone(&remote);
        let pointer_remote = Arc::clone(&remote);
        let bridge = Arc::new(ClientBridge::new(
            name.clone(),
            Box::new(move |input| key_remote.dispatch_key(input)),
            Box::new(move |input| pointer_remote.dispatch_pointer(input)),
        ));
        if remote.is_attached() {
            bridge.on_attached();
        }

        // Mirror external renames into the bridge.  Weak: the callback lives
        // inside the remote and must not keep the bridge alive after removal.
        let bridge_for_rename = Arc::downgrade(&bridge);
        remote.subscribe_renamed(Box::new(move |new_name| {
            if let Some(bridge) = bridge_for_rename.upgrade() {
                bridge.set_name(new_name);
            }
        }));

        let host = Arc::downgrade(&self);
        let remote_for_attachment = Arc::downgrade(&remote);
        let attachment_subscription = remote.subscribe_attachment_changed(Box::new(move || {
            if let (Some(host), Some(remote)) =
                (host.upgrade(), remote_for_attachment.upgrade())
            {
                host.on_client_attachment_changed(remote);
            }
        }));

        self.registry.add(Arc::clone(&bridge));
        for slot in self.slot_snapshot() {
            // The registry replaces a same-named bridge on add; keep each
            // view in step so a reconnect never leaves a stale handle behind.
            slot.bridge.remove_client(&name);
            slot.bridge.add_client(slot.context.issue_client(Arc::clone(&bridge)));
        }
        self.links.lock().expect("links poisoned").push(ClientLink {
            remote,
            attachment_subscription,
        });
        info!(client = %name, "client accepted");
    }

    fn remove_client(self: Arc<Self>, remote: Arc<dyn RemoteClient>) {
        let name = marshaled_display_name(self.ui.as_ref(), remote.as_ref());

        let link = {
            let mut links = self.links.lock().expect("links poisoned");
            links
                .iter()
                .position(|link| Arc::ptr_eq(&link.remote, &remote))
                .map(|index| links.remove(index))
        };
        if let Some(link) = link {
            remote.unsubscribe_attachment_changed(link.attachment_subscription);
        }

        // Already-removed or never-added clients are tolerated.
        self.registry.remove_by_name(&name);
        for slot in self.slot_snapshot() {
            slot.bridge.remove_client(&name);
        }
        info!(client = %name, "client removed");
    }

    /// Handles an attachment-changed notification asynchronously.  Failures
    /// on this path are contained by the pool's per-job panic boundary.
    pub fn on_client_attachment_changed(self: &Arc<Self>, remote: Arc<dyn RemoteClient>) {
        let host = Arc::clone(self);
        self.pool.submit(Box::new(move || {
            let name = marshaled_display_name(host.ui.as_ref(), remote.as_ref());
            let Some(bridge) = host.registry.get_by_name(&name) else {
                debug!(client = %name, "attachment change for unknown client");
                return;
            };
            if remote.is_attached() {
                bridge.on_attached();
            } else {
                bridge.on_detached();
            }
        }));
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    /// Resolves the active profile's focused client, if one is configured and
    /// connected.
    pub fn get_active_client(&self) -> Option<Arc<ClientBridge>> {
        let profile = self.profiles.active_profile()?;
        let name = profile.active_client?;
        self.registry.get_by_name(&name)
    }

    /// Resolves a window handle to a connected client via the active
    /// profile's client list.  Clients of inactive profiles are not found,
    /// even when the handle belongs to one of them.
    pub fn get_client_by_handle(&self, handle: WindowHandle) -> Option<Arc<ClientBridge>> {
        let profile = self.profiles.active_profile()?;
        let name = profile.client_by_handle(handle)?.name.clone();
        self.registry.get_by_name(&name)
    }

    /// Finds a connected client by exact display name.
    pub fn get_client_by_name(&self, name: &str) -> Option<Arc<ClientBridge>> {
        self.registry.get_by_name(name)
    }

    // ── Active-client propagation ─────────────────────────────────────────────

    fn on_active_client_changed(self: &Arc<Self>, name: Option<String>) {
        let host = Arc::clone(self);
        self.pool.submit(Box::new(move || {
            let client = name.as_deref().and_then(|n| host.registry.get_by_name(n));
            for slot in host.slot_snapshot() {
                let handle = client
                    .as_ref()
                    .map(|bridge| slot.context.issue_client(Arc::clone(bridge)));
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    slot.bridge.notify_active_client_changed(handle.as_ref());
                }));
                if outcome.is_err() {
                    error!(extension = %slot.name, "active-client handler panicked");
                }
            }
        }));
    }

    // ── Input dispatch pipeline ───────────────────────────────────────────────

    /// Accepts a captured keyboard event and schedules its fan-out.  Returns
    /// as soon as the job is queued; the capture thread never waits on
    /// extension handlers.
    pub fn on_keyboard_input(self: &Arc<Self>, captured: CapturedKeyboard) {
        let host = Arc::clone(self);
        self.pool.submit(Box::new(move || {
            let target = host.resolve_target(captured.window_handle);
            let mut handled = captured.handled;
            for slot in host.slot_snapshot() {
                let handle = target
                    .as_ref()
                    .map(|bridge| slot.context.issue_client(Arc::clone(bridge)));
                let mut view = KeyboardEvent {
                    client: handle.clone(),
                    handled,
                    input: captured.input,
                };
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    slot.bridge.keyboard().raise(handle.as_ref(), &mut view);
                }));
                match outcome {
                    Ok(()) => handled = handled || view.handled,
                    Err(_) => error!(extension = %slot.name, "keyboard handler panicked"),
                }
            }
            trace!(handled, key = captured.input.key_code, "keyboard dispatch complete");
        }));
    }

    /// Accepts a captured mouse event and schedules its fan-out.  Pure
    /// pointer moves are filtered here, before anything is queued.
    pub fn on_mouse_input(self: &Arc<Self>, captured: CapturedMouse) {
        if captured.input.is_move() {
            trace!("pointer move filtered");
            return;
        }
        let host = Arc::clone(self);
        self.pool.submit(Box::new(move || {
            let target = host.resolve_target(captured.window_handle);
            let mut handled = captured.handled;
            for slot in host.slot_snapshot() {
                let handle = target
                    .as_ref()
                    .map(|bridge| slot.context.issue_client(Arc::clone(bridge)));
                let mut view = MouseEvent {
                    client: handle.clone(),
                    handled,
                    input: captured.input,
                };
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    slot.bridge.mouse().raise(handle.as_ref(), &mut view);
                }));
                match outcome {
                    Ok(()) => handled = handled || view.handled,
                    Err(_) => error!(extension = %slot.name, "mouse handler panicked"),
                }
            }
            trace!(handled, "mouse dispatch complete");
        }));
    }

    fn resolve_target(&self, handle: WindowHandle) -> Option<Arc<ClientBridge>> {
        self.get_client_by_handle(handle)
            .or_else(|| self.get_active_client())
    }

    fn slot_snapshot(&self) -> Vec<ExtensionSlot> {
        self.slots.lock().expect("slots poisoned").clone()
    }

    // ── Service locator ───────────────────────────────────────────────────────

    /// Publishes a service under a type name.  Last registration wins.
    pub fn register_service(&self, type_name: impl Into<String>, service: ServiceHandle) {
        self.services.register(type_name, service);
    }

    /// Resolves a service: the host's registration table first, then each
    /// loaded extension's loader in registration order, first hit wins.  A
    /// probe that panics is swallowed and the next extension is tried.
    pub fn get_service(&self, type_name: &str) -> Option<ServiceHandle> {
        if let Some(service) = self.services.get(type_name) {
            return Some(service);
        }
        for slot in self.slot_snapshot() {
            match catch_unwind(AssertUnwindSafe(|| slot.context.loader().get_service(type_name)))
            {
                Ok(Some(service)) => return Some(service),
                Ok(None) => {}
                Err(_) => error!(extension = %slot.name, "service probe panicked"),
            }
        }
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! HiveBox host application entry point.
//!
//! Wires together the infrastructure collaborators and starts the extension
//! host.  The external network server and input capture layer plug into the
//! [`ServerEventHub`] and the host's dispatch entry points respectively.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()           -- TOML config or defaults
//!  └─ DispatchPool            -- bounded worker pool for all event handling
//!  └─ ExtensionHost::new()    -- registries + slot table
//!       └─ initialize_from()  -- subscribe notifications, load ext.* modules
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::info;
use tracing_subscriber::EnvFilter;

use hivebox_host::application::extension_host::ExtensionHost;
use hivebox_host::infrastructure::sandbox::native::NativeContextProvider;
use hivebox_host::infrastructure::server::{InlineUiDispatcher, ServerEventHub};
use hivebox_host::infrastructure::storage::config::load_config;
use hivebox_host::infrastructure::storage::profiles::ConfigProfileStore;
use hivebox_host::infrastructure::task_pool::{DispatchPool, PoolConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first so its log level can seed the filter.
    let config = load_config()?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.host.log_level.clone())),
        )
        .init();

    info!("HiveBox host starting");

    let pool = Arc::new(DispatchPool::new(PoolConfig {
        workers: config.dispatch.workers,
        queue_capacity: config.dispatch.queue_capacity,
        overflow: config.dispatch.overflow_policy,
    }));
    let server = Arc::new(ServerEventHub::new());
    let profiles = Arc::new(ConfigProfileStore::from_config(&config));

    let host = ExtensionHost::new(
        Arc::new(NativeContextProvider::new()),
        Arc::clone(&server) as _,
        Arc::clone(&profiles) as _,
        Arc::new(InlineUiDispatcher),
        Arc::clone(&pool),
    );
    host.initialize_from(&config.host.extensions_dir)?;
    info!(
        extensions = host.extension_names().len(),
        "extension host ready"
    );

    // Shutdown flag shared with the signal handler.
    let running = Arc::new(AtomicBool::new(true));

    // ── Ctrl-C / SIGTERM handler ──────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!("HiveBox host ready.  Press Ctrl-C to exit.");

    // The network server and capture layer drive the host from their own
    // threads; the main task simply blocks until the shutdown flag clears.
    loop {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if !running.load(Ordering::Relaxed) {
            break;
        }
    }

    host.shutdown();
    pool.shutdown();
    info!("HiveBox host stopped");
    Ok(())
}

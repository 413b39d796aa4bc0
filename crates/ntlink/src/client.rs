//! The async client: a handle over [`ClientCore`] plus the driver task that
//! owns the connection.
//!
//! ```text
//!   consumer ──(sync calls)──→ Mutex<ClientCore> ──(outbox)──→ driver ──→ Connection
//!                                    ↑                            │
//!                                    └──────(frames, timers)──────┘
//! ```
//!
//! Consumer calls lock the core briefly, queue frames and wake the driver;
//! they never await. The driver runs one `tokio::select!` loop per
//! connection over incoming frames, outbox wake-ups, the time-sync timer and
//! shutdown. When a connection ends it waits a fixed delay and reconnects,
//! forever.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ntlink_clock::{LocalClock, SystemClock};
use ntlink_protocol::{SubUid, SubscribeOptions, Value, ValueType};
use ntlink_topics::{PublishedTopic, Topic};
use ntlink_transport::{Connection, Connector, LinkState, WebSocketConnector};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::client_core::{ClientCore, Dispatch, SampleTarget};
use crate::{ClientConfig, NtError, SharedListener, TopicListener};

/// State shared between the handle and the driver task.
struct Shared {
    core: Mutex<ClientCore>,
    wake: Notify,
    config: ClientConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ClientCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Why a connection's serve loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Closed,
    Shutdown,
}

/// A client for one server.
///
/// Creating a client does no I/O. Held state (published topics,
/// subscriptions, listeners) can be set up first; [`start`](Self::start)
/// then spawns the driver, which connects and replays it.
///
/// # Example
///
/// ```rust,no_run
/// use ntlink::prelude::*;
///
/// # async fn demo() -> Result<(), NtError> {
/// let client = Client::new(ClientConfig::builder().host("10.0.0.2").build());
/// client.subscribe_all_samples(&["/Signals/"], None)?;
/// client.start();
/// # Ok(())
/// # }
/// ```
pub struct Client {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Creates a client using the system clock.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a client reading local time from `clock`.
    pub fn with_clock(config: ClientConfig, clock: Arc<dyn LocalClock>) -> Self {
        let config = config.validated();
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(ClientCore::new(clock)),
                wake: Notify::new(),
                config,
            }),
            shutdown,
            driver: Mutex::new(None),
        }
    }

    /// The effective (validated) configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Sets the client-wide listener. It hears every topic event plus
    /// connect and disconnect.
    pub fn set_listener(&self, listener: impl TopicListener) {
        self.shared.lock().set_listener(Some(Arc::new(listener)));
    }

    /// Removes the client-wide listener.
    pub fn clear_listener(&self) {
        self.shared.lock().set_listener(None);
    }

    /// Spawns the driver over WebSocket.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        self.start_with(WebSocketConnector);
    }

    /// Spawns the driver over a custom connector. Calling it again while a
    /// driver runs does nothing.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn start_with<C: Connector>(&self, connector: C) {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if driver.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("client already started");
            return;
        }
        self.shutdown.send_replace(false);
        let shared = Arc::clone(&self.shared);
        let shutdown = self.shutdown.subscribe();
        *driver = Some(tokio::spawn(run(shared, connector, shutdown)));
    }

    /// Stops the driver, closes the connection and waits for the driver to
    /// finish. Held state is kept, so the client can be started again.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let handle = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "client driver ended abnormally");
            }
        }
    }

    // =====================================================================
    // Publishing
    // =====================================================================

    /// Starts publishing a topic. See [`ClientCore::publish_new_topic`].
    pub fn publish_new_topic(
        &self,
        name: &str,
        value_type: ValueType,
    ) -> Result<PublishedTopic, NtError> {
        self.with_core(|core| core.publish_new_topic(name, value_type))
    }

    /// Stops publishing a topic. Returns whether it was held.
    pub fn unpublish_topic(&self, handle: &PublishedTopic) -> Result<bool, NtError> {
        self.with_core(|core| core.unpublish_topic(handle))
    }

    /// Sets the persistent and retained flags of a published topic.
    pub fn set_properties(
        &self,
        handle: &PublishedTopic,
        persistent: bool,
        retained: bool,
    ) -> Result<PublishedTopic, NtError> {
        self.with_core(|core| core.set_properties(handle, persistent, retained))
    }

    /// Sends one value. See [`ClientCore::add_sample`].
    pub fn add_sample<'a>(
        &self,
        target: impl Into<SampleTarget<'a>>,
        timestamp_us: Option<i64>,
        value: impl Into<Value>,
    ) -> Result<(), NtError> {
        let target = target.into();
        let value = value.into();
        self.with_core(|core| core.add_sample(target, timestamp_us, value))
    }

    // =====================================================================
    // Subscriptions
    // =====================================================================

    /// Announcements only, for every topic under each prefix.
    pub fn subscribe_topic_names(
        &self,
        prefixes: &[&str],
        listener: Option<SharedListener>,
    ) -> Result<SubUid, NtError> {
        self.subscribe(prefixes, SubscribeOptions::topics_only(), listener)
    }

    /// The latest value at most every `rate_secs` seconds, under each prefix.
    pub fn subscribe_periodic(
        &self,
        prefixes: &[&str],
        rate_secs: f64,
        listener: Option<SharedListener>,
    ) -> Result<SubUid, NtError> {
        self.subscribe(prefixes, SubscribeOptions::periodic(rate_secs), listener)
    }

    /// Every value update, under each prefix.
    pub fn subscribe_all_samples(
        &self,
        prefixes: &[&str],
        listener: Option<SharedListener>,
    ) -> Result<SubUid, NtError> {
        self.subscribe(prefixes, SubscribeOptions::all_samples(), listener)
    }

    /// A subscription with explicit options.
    pub fn subscribe(
        &self,
        patterns: &[&str],
        options: SubscribeOptions,
        listener: Option<SharedListener>,
    ) -> Result<SubUid, NtError> {
        let patterns = patterns.iter().map(|p| p.to_string()).collect();
        self.with_core(|core| core.subscribe(patterns, options, listener))
    }

    /// Drops a subscription. Returns whether it was held.
    pub fn unsubscribe(&self, uid: SubUid) -> Result<bool, NtError> {
        self.with_core(|core| core.unsubscribe(uid))
    }

    /// Drops every subscription. Returns how many there were.
    pub fn clear_all_subscriptions(&self) -> Result<usize, NtError> {
        self.with_core(|core| core.clear_all_subscriptions())
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// Estimated current server time in microseconds.
    pub fn server_time_us(&self) -> i64 {
        self.shared.lock().server_time_us()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().is_connected()
    }

    pub fn link_state(&self) -> LinkState {
        self.shared.lock().link_state()
    }

    /// Topics the server currently announces, ordered by name.
    pub fn announced_topics(&self) -> Vec<Topic> {
        self.shared.lock().announced_topics()
    }

    /// Topics this client publishes.
    pub fn published_topics(&self) -> Vec<PublishedTopic> {
        self.shared.lock().published_topics()
    }

    /// Runs `f` on the core, then wakes the driver to flush the outbox.
    fn with_core<T>(
        &self,
        f: impl FnOnce(&mut ClientCore) -> Result<T, NtError>,
    ) -> Result<T, NtError> {
        let result = f(&mut self.shared.lock());
        self.shared.wake.notify_one();
        result
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.shared.config.url())
            .field("core", &*self.shared.lock())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Delivers each dispatch. A panicking listener loses that one event; the
/// driver keeps running.
fn deliver(dispatches: Vec<Dispatch>) {
    for dispatch in dispatches {
        if panic::catch_unwind(AssertUnwindSafe(|| dispatch.deliver())).is_err() {
            error!(event = ?dispatch.event, "listener panicked, event dropped");
        }
    }
}

/// Connects, serves, waits, reconnects, until shutdown.
async fn run<C: Connector>(
    shared: Arc<Shared>,
    connector: C,
    mut shutdown: watch::Receiver<bool>,
) {
    let url = shared.config.url();
    info!(%url, "client driver started");

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        let begun = shared.lock().begin_connect();
        if let Err(e) = begun {
            warn!(error = %e, "unexpected link state, resetting");
            let dispatches = shared.lock().on_close();
            deliver(dispatches);
            continue;
        }

        let attempt = tokio::select! {
            result = connector.connect(&url) => result,
            _ = shutdown.changed() => break,
        };

        match attempt {
            Ok(conn) => {
                let exit = serve(&shared, &conn, &mut shutdown).await;
                if let Err(e) = conn.close().await {
                    debug!(conn = %conn.id(), error = %e, "close failed");
                }
                let dispatches = shared.lock().on_close();
                deliver(dispatches);
                if exit == Exit::Shutdown {
                    break;
                }
            }
            Err(e) => {
                debug!(%url, error = %e, "connect failed");
                let dispatches = shared.lock().on_close();
                deliver(dispatches);
            }
        }

        debug!(delay_ms = shared.config.reconnect_delay.as_millis() as u64, "reconnecting");
        tokio::select! {
            _ = time::sleep(shared.config.reconnect_delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    let dispatches = shared.lock().on_close();
    deliver(dispatches);
    info!(%url, "client driver stopped");
}

/// Runs one open connection until it ends or shutdown is requested.
async fn serve<T: Connection>(
    shared: &Shared,
    conn: &T,
    shutdown: &mut watch::Receiver<bool>,
) -> Exit {
    let opened = shared.lock().on_open();
    match opened {
        Ok(dispatches) => deliver(dispatches),
        Err(e) => {
            warn!(conn = %conn.id(), error = %e, "activation failed");
            return Exit::Closed;
        }
    }
    info!(conn = %conn.id(), "connected");

    let mut sync = time::interval(shared.config.time_sync_interval);
    sync.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick is immediate; activation already probed.
    sync.tick().await;

    loop {
        let outbound = shared.lock().take_outbound();
        for frame in outbound {
            if let Err(e) = conn.send(frame).await {
                warn!(conn = %conn.id(), error = %e, "send failed");
                return Exit::Closed;
            }
        }

        tokio::select! {
            received = conn.recv() => match received {
                Ok(Some(frame)) => {
                    let dispatches = shared.lock().on_frame(frame);
                    deliver(dispatches);
                }
                Ok(None) => {
                    info!(conn = %conn.id(), "server closed the connection");
                    return Exit::Closed;
                }
                Err(e) => {
                    warn!(conn = %conn.id(), error = %e, "receive failed");
                    return Exit::Closed;
                }
            },
            _ = shared.wake.notified() => {}
            _ = sync.tick() => {
                let polled = shared.lock().poll_time_sync();
                if let Err(e) = polled {
                    warn!(error = %e, "time probe failed");
                }
            }
            _ = shutdown.changed() => return Exit::Shutdown,
        }
    }
}

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kindred_config::RealtimeSettings;

use crate::error::RealtimeError;
use crate::protocol::{events, Ack, Frame, LocalFailure};
use crate::state::{ConnectionState, ConnectionStatus};
use crate::transport::{Connector, Link};

/// Event listener. Identity is the `Arc` allocation, so keep the `Arc`
/// around to `off` it later.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base socket URL, e.g. `ws://localhost:5001/ws`.
    pub url: String,
    pub token: String,
    pub heartbeat_interval: Duration,
    pub ack_timeout: Duration,
    pub typing_timeout: Duration,
    /// Retries after the first failed attempt.
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub reconnection_delay_max: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            heartbeat_interval: Duration::from_secs(20),
            ack_timeout: Duration::from_secs(10),
            typing_timeout: Duration::from_secs(3),
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_millis(1000),
            reconnection_delay_max: Duration::from_millis(5000),
        }
    }

    pub fn from_settings(
        url: impl Into<String>,
        token: impl Into<String>,
        settings: &RealtimeSettings,
    ) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(settings.heartbeat_interval_secs),
            ack_timeout: Duration::from_secs(settings.ack_timeout_secs),
            typing_timeout: Duration::from_secs(settings.typing_timeout_secs),
            reconnection_attempts: settings.reconnection_attempts,
            reconnection_delay: Duration::from_millis(settings.reconnection_delay_ms),
            reconnection_delay_max: Duration::from_millis(settings.reconnection_delay_max_ms),
            ..Self::new(url, token)
        }
    }

    /// Handshake URL carrying the token and the user id fallback.
    pub fn handshake_url(&self, user_id: &str) -> Result<String, RealtimeError> {
        let base = self.url.trim();
        let host = base
            .strip_prefix("ws://")
            .or_else(|| base.strip_prefix("wss://"));
        if host.is_none_or(|h| h.is_empty() || h.starts_with('/')) {
            return Err(RealtimeError::InvalidUrl(self.url.clone()));
        }
        let separator = if base.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{base}{separator}token={}&user_id={}",
            urlencoding::encode(&self.token),
            urlencoding::encode(user_id)
        ))
    }
}

/// Connection bookkeeping. Every transition happens under this lock and
/// checks `generation`, so a driver task from a replaced connection can
/// never touch the current one.
#[derive(Default)]
struct Session {
    generation: u64,
    user_id: Option<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    driver: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

struct Inner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    session: Mutex<Session>,
    handlers: Mutex<HashMap<String, Vec<Handler>>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Ack>>>,
    next_ack: AtomicU64,
    status: watch::Sender<ConnectionStatus>,
    heartbeat_starts: AtomicUsize,
    heartbeat_stops: AtomicUsize,
}

/// Single live connection to the `/ws` hub with reconnection, heartbeat,
/// acknowledgements and a listener table that survives reconnects.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                session: Mutex::new(Session::default()),
                handlers: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                next_ack: AtomicU64::new(0),
                status,
                heartbeat_starts: AtomicUsize::new(0),
                heartbeat_stops: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.status.borrow().state
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.status.borrow().error.clone()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected && self.inner.session.lock().outbound.is_some()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.session.lock().user_id.clone()
    }

    /// Waits until the client reaches `state`, or gives up after `timeout`.
    pub async fn wait_for(&self, state: ConnectionState, timeout: Duration) -> bool {
        let mut rx = self.status();
        tokio::time::timeout(timeout, rx.wait_for(|s| s.state == state))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    /// Number of heartbeat timers started since the client was created.
    pub fn heartbeat_starts(&self) -> usize {
        self.inner.heartbeat_starts.load(Ordering::SeqCst)
    }

    /// Number of heartbeat timers cleared since the client was created.
    pub fn heartbeat_stops(&self) -> usize {
        self.inner.heartbeat_stops.load(Ordering::SeqCst)
    }

    /// Opens the connection in the background. A no-op while connected;
    /// otherwise any previous socket is torn down and replaced. Only an
    /// unusable URL is reported as an error, everything else surfaces
    /// through [`status`](Self::status).
    pub fn connect(&self, user_id: &str) -> Result<(), RealtimeError> {
        if self.is_connected() {
            debug!("Realtime client already connected");
            return Ok(());
        }
        let url = self.inner.config.handshake_url(user_id)?;

        let mut session = self.inner.session.lock();
        self.inner.teardown(&mut session);
        session.generation += 1;
        session.user_id = Some(user_id.to_string());
        self.inner.set_status(ConnectionStatus::new(ConnectionState::Connecting));

        let generation = session.generation;
        let inner = self.inner.clone();
        session.driver = Some(tokio::spawn(async move {
            inner.drive(url, generation).await;
        }));
        info!(user_id, "Realtime client connecting");
        Ok(())
    }

    /// Closes the socket, stops heartbeat and reconnection, and drops every
    /// listener. Use `connect` again to come back.
    pub fn disconnect(&self) {
        {
            let mut session = self.inner.session.lock();
            session.generation += 1;
            self.inner.teardown(&mut session);
            session.user_id = None;
        }
        self.inner.handlers.lock().clear();
        self.inner.fail_pending(LocalFailure::ConnectionLost);
        self.inner.set_status(ConnectionStatus::new(ConnectionState::Disconnected));
        info!("Realtime client disconnected");
    }

    /// Registers `handler` for `event`. Registering the same handler twice
    /// is a no-op; returns whether it was added.
    pub fn on(&self, event: &str, handler: Handler) -> bool {
        let mut handlers = self.inner.handlers.lock();
        let list = handlers.entry(event.to_string()).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        list.push(handler);
        true
    }

    /// Removes one handler, or every handler for `event` when `None`.
    pub fn off(&self, event: &str, handler: Option<&Handler>) {
        let mut handlers = self.inner.handlers.lock();
        match handler {
            Some(handler) => {
                if let Some(list) = handlers.get_mut(event) {
                    list.retain(|h| !Arc::ptr_eq(h, handler));
                    if list.is_empty() {
                        handlers.remove(event);
                    }
                }
            }
            None => {
                handlers.remove(event);
            }
        }
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.inner.handlers.lock().get(event).map_or(0, Vec::len)
    }

    /// Fire-and-forget send. Returns `false` when not connected.
    pub fn emit(&self, event: &str, data: Value) -> bool {
        self.inner.send(Frame::new(event, data))
    }

    /// Sends `event` and waits for the server's acknowledgement. Never
    /// fails: disconnection and timeout resolve to `success: false`.
    pub async fn emit_with_ack(&self, event: &str, data: Value, timeout: Duration) -> Ack {
        if !self.is_connected() {
            return Ack::failed(LocalFailure::NotConnected);
        }
        let id = self.inner.next_ack.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);

        if !self.inner.send(Frame::new(event, data).with_ack(id)) {
            self.inner.pending.lock().remove(&id);
            return Ack::failed(LocalFailure::NotConnected);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(ack)) => ack,
            Ok(Err(_)) => Ack::failed(LocalFailure::ConnectionLost),
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                debug!(event, ack = id, "Ack timed out");
                Ack::failed(LocalFailure::Timeout)
            }
        }
    }
}

impl Inner {
    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    fn send(&self, frame: Frame) -> bool {
        if self.status.borrow().state != ConnectionState::Connected {
            return false;
        }
        let session = self.session.lock();
        match &session.outbound {
            Some(tx) => tx.send(frame.to_text()).is_ok(),
            None => false,
        }
    }

    fn teardown(&self, session: &mut Session) {
        if let Some(driver) = session.driver.take() {
            driver.abort();
        }
        session.outbound = None;
        self.stop_heartbeat(session);
    }

    fn start_heartbeat(&self, session: &mut Session, tx: mpsc::UnboundedSender<String>) {
        self.stop_heartbeat(session);
        let every = self.config.heartbeat_interval;
        session.heartbeat = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                ticker.tick().await;
                if tx.send(Frame::new(events::HEARTBEAT, json!({})).to_text()).is_err() {
                    break;
                }
            }
        }));
        self.heartbeat_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_heartbeat(&self, session: &mut Session) {
        if let Some(heartbeat) = session.heartbeat.take() {
            heartbeat.abort();
            self.heartbeat_stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fail_pending(&self, failure: LocalFailure) {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(Ack::failed(failure));
        }
    }

    /// Connect, read until the link drops, then retry with backoff until
    /// the attempts are used up.
    async fn drive(self: Arc<Self>, url: String, generation: u64) {
        let mut failures = 0u32;
        let mut delay = self.config.reconnection_delay;
        let mut wait: Option<Duration> = None;

        loop {
            if let Some(d) = wait.take() {
                tokio::time::sleep(d).await;
            }

            match self.connector.connect(&url).await {
                Ok(Link { tx, mut rx }) => {
                    failures = 0;
                    delay = self.config.reconnection_delay;
                    if !self.opened(generation, tx) {
                        return;
                    }
                    while let Some(text) = rx.recv().await {
                        self.dispatch(&text);
                    }
                    if !self.dropped(generation) {
                        return;
                    }
                    wait = Some(delay);
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.config.reconnection_attempts {
                        warn!(%e, failures, "Realtime reconnection attempts exhausted");
                        self.failed(generation, e.to_string());
                        return;
                    }
                    debug!(%e, failures, ?delay, "Realtime connect failed, retrying");
                    if !self.retrying(generation, e.to_string()) {
                        return;
                    }
                    wait = Some(delay);
                    delay = (delay * 2).min(self.config.reconnection_delay_max);
                }
            }
        }
    }

    fn opened(&self, generation: u64, tx: mpsc::UnboundedSender<String>) -> bool {
        let mut session = self.session.lock();
        if session.generation != generation {
            return false;
        }
        session.outbound = Some(tx.clone());
        self.start_heartbeat(&mut session, tx);
        self.set_status(ConnectionStatus::new(ConnectionState::Connected));
        info!("Realtime client connected");
        true
    }

    fn dropped(&self, generation: u64) -> bool {
        {
            let mut session = self.session.lock();
            if session.generation != generation {
                return false;
            }
            session.outbound = None;
            self.stop_heartbeat(&mut session);
            self.set_status(ConnectionStatus::failed(
                ConnectionState::Reconnecting,
                "connection lost",
            ));
        }
        self.fail_pending(LocalFailure::ConnectionLost);
        warn!("Realtime connection lost, reconnecting");
        true
    }

    fn retrying(&self, generation: u64, error: String) -> bool {
        let session = self.session.lock();
        if session.generation != generation {
            return false;
        }
        self.set_status(ConnectionStatus::failed(ConnectionState::Reconnecting, error));
        true
    }

    fn failed(&self, generation: u64, error: String) {
        let session = self.session.lock();
        if session.generation == generation {
            self.set_status(ConnectionStatus::failed(ConnectionState::Error, error));
        }
    }

    fn dispatch(&self, text: &str) {
        let Some(frame) = Frame::parse(text) else {
            debug!("Ignoring malformed frame");
            return;
        };

        if frame.event == events::ACK {
            if let Some(id) = frame.ack {
                if let Some(tx) = self.pending.lock().remove(&id) {
                    let _ = tx.send(Ack::from_data(frame.data));
                }
            }
            return;
        }

        let handlers = self
            .handlers
            .lock()
            .get(&frame.event)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(&frame.data);
        }
    }
}

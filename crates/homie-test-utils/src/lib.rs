//! Common test helpers for Homie device tests
//!
//! This crate provides:
//! - An in-memory transport that records publications and subscriptions
//! - Injection of inbound messages and lifecycle events
//! - Collectors for listener callbacks
//! - Condition-based waiting (no hardcoded sleeps)

use homie_core::PublishOptions;
use homie_transport::{
    ConnectOptions, Connection, Connector, Result, TransportError, TransportEvent,
    TransportHandle,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout
pub async fn wait_for<F>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    check()
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || counter.load(Ordering::SeqCst) >= target,
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

// ============================================================================
// Stub Transport
// ============================================================================

/// One recorded publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub options: PublishOptions,
}

#[derive(Default)]
struct StubState {
    published: Mutex<Vec<Published>>,
    subscriptions: Mutex<Vec<String>>,
    sender: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    connect_options: Mutex<Option<ConnectOptions>>,
    ended: AtomicBool,
    echo: AtomicBool,
    publish_limit: Mutex<Option<usize>>,
}

/// In-memory transport
///
/// Connecting queues `Connected`, ending queues `Closed`. Clones share the
/// same state, so a test keeps one clone to inspect what the device did.
#[derive(Clone, Default)]
pub struct StubTransport {
    state: Arc<StubState>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every publication back as an inbound message, like a broker
    /// would for a client subscribed to its own topics
    pub fn with_echo(self) -> Self {
        self.state.echo.store(true, Ordering::SeqCst);
        self
    }

    /// Refuse publications once `limit` have been recorded, like a client
    /// whose request queue is full
    pub fn with_publish_limit(self, limit: usize) -> Self {
        *self.state.publish_limit.lock() = Some(limit);
        self
    }

    /// Queue an event for the connected device
    pub fn simulate(&self, event: TransportEvent) -> bool {
        match self.state.sender.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Queue an inbound message
    pub fn simulate_message(&self, topic: &str, payload: &str) -> bool {
        self.simulate(TransportEvent::message(topic, payload))
    }

    /// Drop the event sender; the device sees the end of the stream once
    /// queued events are drained
    pub fn hang_up(&self) {
        self.state.sender.lock().take();
    }

    /// Get all recorded publications
    pub fn published(&self) -> Vec<Published> {
        self.state.published.lock().clone()
    }

    /// Payloads published on `topic`, oldest first
    pub fn payloads_for(&self, topic: &str) -> Vec<String> {
        self.state
            .published
            .lock()
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.clone())
            .collect()
    }

    /// Most recent publication on `topic`
    pub fn last_published(&self, topic: &str) -> Option<Published> {
        self.state
            .published
            .lock()
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .cloned()
    }

    /// Position of the first publication on `topic`
    pub fn position_of(&self, topic: &str) -> Option<usize> {
        self.state
            .published
            .lock()
            .iter()
            .position(|p| p.topic == topic)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.subscriptions.lock().clone()
    }

    /// Options passed to the last `connect`
    pub fn connect_options(&self) -> Option<ConnectOptions> {
        self.state.connect_options.lock().clone()
    }

    pub fn is_ended(&self) -> bool {
        self.state.ended.load(Ordering::SeqCst)
    }

    /// Forget recorded publications
    pub fn clear(&self) {
        self.state.published.lock().clear();
    }
}

impl TransportHandle for StubTransport {
    fn publish(&self, topic: &str, payload: &str, options: PublishOptions) -> Result<()> {
        {
            let mut published = self.state.published.lock();
            if let Some(limit) = *self.state.publish_limit.lock() {
                if published.len() >= limit {
                    return Err(TransportError::PublishFailed(format!("{}: queue full", topic)));
                }
            }
            published.push(Published {
                topic: topic.to_string(),
                payload: payload.to_string(),
                options,
            });
        }
        if self.state.echo.load(Ordering::SeqCst) {
            self.simulate_message(topic, payload);
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<()> {
        self.state.subscriptions.lock().push(topic.to_string());
        Ok(())
    }

    fn end(&self) -> Result<()> {
        self.state.ended.store(true, Ordering::SeqCst);
        self.simulate(TransportEvent::Closed);
        Ok(())
    }
}

/// Connector handing out a [`StubTransport`]
#[derive(Clone, Default)]
pub struct StubConnector {
    transport: StubTransport,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transport(transport: StubTransport) -> Self {
        Self { transport }
    }

    /// Shared view of the transport this connector opens
    pub fn transport(&self) -> StubTransport {
        self.transport.clone()
    }
}

impl Connector for StubConnector {
    fn connect(&self, options: &ConnectOptions) -> Result<Connection> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(TransportEvent::Connected);
        *self.transport.state.sender.lock() = Some(tx);
        *self.transport.state.connect_options.lock() = Some(options.clone());
        self.transport.state.ended.store(false, Ordering::SeqCst);

        Ok(Connection {
            handle: Arc::new(self.transport.clone()),
            events: rx,
        })
    }
}

// ============================================================================
// Event Collector
// ============================================================================

/// Collector for listener callbacks with thread-safe access
#[derive(Clone)]
pub struct EventCollector<T> {
    values: Arc<Mutex<Vec<T>>>,
    notify: Arc<Notify>,
    count: Arc<AtomicU32>,
}

impl<T: Clone + Send + 'static> EventCollector<T> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Create a callback recording every event it sees
    pub fn callback(&self) -> impl FnMut(&T) + Send + 'static {
        let values = self.values.clone();
        let notify = self.notify.clone();
        let count = self.count.clone();

        move |value| {
            values.lock().push(value.clone());
            count.fetch_add(1, Ordering::SeqCst);
            notify.notify_waiters();
        }
    }

    /// Get the count of received events
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait for at least n events to be received
    pub async fn wait_for_count(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.count, n, max_wait).await
    }

    pub fn values(&self) -> Vec<T> {
        self.values.lock().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.values.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.values.lock().clear();
        self.count.store(0, Ordering::SeqCst);
    }
}

impl<T: Clone + Send + 'static> Default for EventCollector<T> {
    fn default() -> Self {
        Self::new()
    }
}

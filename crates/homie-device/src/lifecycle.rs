//! Connectivity state and topology notifications

use homie_core::{ConnectionState, Listeners};
use homie_transport::TransportError;
use std::sync::Arc;
use tracing::{debug, warn, Span};

use crate::error::Result;

/// Notification delivered to `on_event` listeners of every entity
#[derive(Debug, Clone)]
pub enum TopologyEvent {
    Connect,
    Disconnect,
    Offline,
    Error(Arc<TransportError>),
    StatsInterval,
}

/// Record `next` unless an earlier step already failed
///
/// Fan-outs run every child and report the first failure, so one failed
/// publish never leaves part of the topology behind.
pub(crate) fn keep_first(result: &mut Result<()>, next: Result<()>) {
    if result.is_ok() {
        *result = next;
    }
}

/// Connection state, listeners and log span of one entity
#[derive(Debug)]
pub struct Lifecycle {
    state: ConnectionState,
    listeners: Listeners<TopologyEvent>,
    span: Span,
}

impl Lifecycle {
    pub fn new(span: Span) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            listeners: Listeners::new(),
            span,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub(crate) fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&TopologyEvent) + Send + 'static,
    {
        self.listeners.add(handler);
    }

    pub fn connect(&mut self) {
        self.state = ConnectionState::Connected;
        debug!(parent: &self.span, "connected");
        self.listeners.emit(&TopologyEvent::Connect);
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        debug!(parent: &self.span, "disconnected");
        self.listeners.emit(&TopologyEvent::Disconnect);
    }

    pub fn offline(&mut self) {
        self.state = ConnectionState::Offline;
        debug!(parent: &self.span, "offline");
        self.listeners.emit(&TopologyEvent::Offline);
    }

    /// Relay a transport error; the state is left alone
    pub fn error(&mut self, err: &Arc<TransportError>) {
        warn!(parent: &self.span, error = %err, "transport error");
        self.listeners.emit(&TopologyEvent::Error(Arc::clone(err)));
    }

    pub fn stats_interval(&mut self) {
        self.listeners.emit(&TopologyEvent::StatsInterval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(lifecycle: &mut Lifecycle) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        lifecycle.on_event(move |event| {
            let name = match event {
                TopologyEvent::Connect => "connect".to_string(),
                TopologyEvent::Disconnect => "disconnect".to_string(),
                TopologyEvent::Offline => "offline".to_string(),
                TopologyEvent::Error(e) => format!("error:{}", e),
                TopologyEvent::StatsInterval => "stats".to_string(),
            };
            sink.lock().unwrap().push(name);
        });
        seen
    }

    #[test]
    fn test_transitions() {
        let mut lifecycle = Lifecycle::new(Span::none());
        let seen = recorder(&mut lifecycle);
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

        lifecycle.connect();
        assert!(lifecycle.state().is_connected());
        lifecycle.offline();
        assert_eq!(lifecycle.state(), ConnectionState::Offline);
        lifecycle.disconnect();
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["connect", "offline", "disconnect"]
        );
    }

    #[test]
    fn test_error_keeps_state() {
        let mut lifecycle = Lifecycle::new(Span::none());
        let seen = recorder(&mut lifecycle);
        lifecycle.connect();
        lifecycle.error(&Arc::new(TransportError::Other("boom".to_string())));
        lifecycle.stats_interval();

        assert!(lifecycle.state().is_connected());
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["connect", "error:transport error: boom", "stats"]
        );
    }
}

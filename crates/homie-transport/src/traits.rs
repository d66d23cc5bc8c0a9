//! Transport trait definitions

use homie_core::PublishOptions;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::options::ConnectOptions;

/// Events that can occur on a transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection established
    Connected,
    /// Connection closed on request
    Closed,
    /// Connection lost without a close
    Offline,
    /// Error relayed by the transport; does not change connectivity
    Error(Arc<TransportError>),
    /// Message received on a subscribed topic
    Message {
        topic: String,
        payload: Option<String>,
    },
}

impl TransportEvent {
    pub fn message(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        TransportEvent::Message {
            topic: topic.into(),
            payload: Some(payload.into()),
        }
    }

    pub fn error(err: TransportError) -> Self {
        TransportEvent::Error(Arc::new(err))
    }
}

/// Handle to an open transport connection
///
/// Every call is a request handed to the transport; none of them waits for
/// the broker to acknowledge.
pub trait TransportHandle: Send + Sync {
    /// Publish `payload` on `topic`
    fn publish(&self, topic: &str, payload: &str, options: PublishOptions) -> Result<()>;

    /// Subscribe to `topic` (wildcards allowed)
    fn subscribe(&self, topic: &str) -> Result<()>;

    /// Request the connection to close
    fn end(&self) -> Result<()>;
}

/// An opened connection: the handle plus its event stream
pub struct Connection {
    pub handle: Arc<dyn TransportHandle>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Factory for transport connections
pub trait Connector {
    /// Open a connection; the `Connected` event arrives on the returned stream
    fn connect(&self, options: &ConnectOptions) -> Result<Connection>;
}

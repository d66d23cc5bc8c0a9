//! MQTT transport backed by rumqttc
//!
//! The rumqttc event loop runs on its own Tokio task and is translated into
//! [`TransportEvent`]s on an unbounded channel. Requests from the handle go
//! through a second unbounded channel to a forwarding task that awaits the
//! rumqttc client, so a burst larger than the client's request capacity is
//! queued instead of refused.

use homie_core::{PublishOptions, QoS};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS as MqttQoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    ConnectOptions, Connection, Connector, Result, TransportError, TransportEvent,
    TransportHandle,
};

/// Delay before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

fn mqtt_qos(qos: QoS) -> MqttQoS {
    match qos {
        QoS::AtMostOnce => MqttQoS::AtMostOnce,
        QoS::AtLeastOnce => MqttQoS::AtLeastOnce,
        QoS::ExactlyOnce => MqttQoS::ExactlyOnce,
    }
}

/// Build rumqttc options from connection options
pub fn mqtt_options(options: &ConnectOptions) -> Result<MqttOptions> {
    if options.host.is_empty() {
        return Err(TransportError::InvalidOptions("empty broker host".to_string()));
    }
    if options.client_id.is_empty() {
        return Err(TransportError::InvalidOptions("empty client id".to_string()));
    }

    let mut mqttoptions = MqttOptions::new(&options.client_id, &options.host, options.port);
    mqttoptions
        .set_keep_alive(Duration::from_secs(options.keep_alive_secs as u64))
        .set_clean_session(options.clean_session);

    if let (Some(user), Some(pass)) = (&options.username, &options.password) {
        mqttoptions.set_credentials(user, pass);
    }

    if let Some(will) = &options.last_will {
        mqttoptions.set_last_will(rumqttc::LastWill::new(
            &will.topic,
            will.payload.as_bytes().to_vec(),
            mqtt_qos(will.qos),
            will.retain,
        ));
    }

    Ok(mqttoptions)
}

/// Opens rumqttc connections
///
/// `connect` must be called from within a Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct MqttConnector;

impl MqttConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for MqttConnector {
    fn connect(&self, options: &ConnectOptions) -> Result<Connection> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (client, eventloop) = AsyncClient::new(mqtt_options(options)?, options.capacity);
        let (tx, rx) = mpsc::unbounded_channel();
        let (requests, pending) = mpsc::unbounded_channel();

        let transport = Arc::new(MqttTransport {
            requests: requests.clone(),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        });

        info!(
            "MQTT transport connecting to {}:{} as {}",
            options.host, options.port, options.client_id
        );

        runtime.spawn(forward(client, pending));
        runtime.spawn(drive(
            eventloop,
            requests,
            Arc::clone(&transport.subscriptions),
            tx,
        ));

        Ok(Connection {
            handle: transport,
            events: rx,
        })
    }
}

/// Request waiting for the forwarding task
#[derive(Debug)]
enum Request {
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: MqttQoS,
        retain: bool,
    },
    Subscribe(String),
    Disconnect,
}

/// Handle to a rumqttc client
pub struct MqttTransport {
    requests: mpsc::UnboundedSender<Request>,
    /// Topics to restore after a reconnect without a session
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl MqttTransport {
    fn request(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

impl TransportHandle for MqttTransport {
    fn publish(&self, topic: &str, payload: &str, options: PublishOptions) -> Result<()> {
        self.request(Request::Publish {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
            qos: mqtt_qos(options.qos),
            retain: options.retain,
        })?;
        debug!("MQTT publish {} ({} bytes)", topic, payload.len());
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<()> {
        self.request(Request::Subscribe(topic.to_string()))?;
        self.subscriptions.lock().push(topic.to_string());
        debug!("MQTT subscribed to {}", topic);
        Ok(())
    }

    fn end(&self) -> Result<()> {
        self.request(Request::Disconnect)?;
        info!("MQTT disconnect requested");
        Ok(())
    }
}

/// Hand queued requests to the rumqttc client in order, waiting whenever its
/// request queue is full
async fn forward(client: AsyncClient, mut pending: mpsc::UnboundedReceiver<Request>) {
    while let Some(request) = pending.recv().await {
        match request {
            Request::Publish {
                topic,
                payload,
                qos,
                retain,
            } => {
                if let Err(e) = client.publish(topic.as_str(), qos, retain, payload).await {
                    warn!("MQTT publish to {} failed: {}", topic, e);
                }
            }
            Request::Subscribe(topic) => {
                if let Err(e) = client.subscribe(topic.as_str(), MqttQoS::AtMostOnce).await {
                    warn!("MQTT subscribe to {} failed: {}", topic, e);
                }
            }
            Request::Disconnect => {
                if let Err(e) = client.disconnect().await {
                    warn!("MQTT disconnect failed: {}", e);
                }
                break;
            }
        }
    }
    debug!("MQTT request forwarding stopped");
}

/// Poll the rumqttc event loop until the connection is closed on request or
/// the event receiver goes away
async fn drive(
    mut eventloop: EventLoop,
    requests: mpsc::UnboundedSender<Request>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut connected = false;
    let mut has_connected = false;

    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("MQTT connected to broker");
                if has_connected && !ack.session_present {
                    for topic in subscriptions.lock().iter() {
                        if requests.send(Request::Subscribe(topic.clone())).is_err() {
                            warn!("MQTT resubscribe to {} failed: transport ended", topic);
                        }
                    }
                }
                connected = true;
                has_connected = true;
                TransportEvent::Connected
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(
                    "MQTT received: {} ({} bytes)",
                    publish.topic,
                    publish.payload.len()
                );
                TransportEvent::Message {
                    topic: publish.topic.clone(),
                    payload: Some(String::from_utf8_lossy(&publish.payload).into_owned()),
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("MQTT connection closed");
                let _ = tx.send(TransportEvent::Closed);
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                error!("MQTT error: {}", e);
                if tx.send(TransportEvent::error(e.into())).is_err() {
                    break;
                }
                if connected {
                    connected = false;
                    warn!("MQTT connection lost");
                    if tx.send(TransportEvent::Offline).is_err() {
                        break;
                    }
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        if tx.send(event).is_err() {
            debug!("MQTT event receiver dropped, stopping event loop");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LastWill;

    #[test]
    fn test_qos_mapping() {
        assert_eq!(mqtt_qos(QoS::AtMostOnce), MqttQoS::AtMostOnce);
        assert_eq!(mqtt_qos(QoS::AtLeastOnce), MqttQoS::AtLeastOnce);
        assert_eq!(mqtt_qos(QoS::ExactlyOnce), MqttQoS::ExactlyOnce);
    }

    #[test]
    fn test_mqtt_options_from_config() {
        let options = ConnectOptions {
            host: "broker.local".to_string(),
            port: 1884,
            client_id: "homie-test".to_string(),
            keep_alive_secs: 15,
            last_will: Some(LastWill::new("homie/dev/$state", "lost").retained()),
            ..Default::default()
        };
        let mqttoptions = mqtt_options(&options).unwrap();
        assert_eq!(mqttoptions.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(mqttoptions.client_id(), "homie-test");
        assert_eq!(mqttoptions.keep_alive(), Duration::from_secs(15));

        let will = mqttoptions.last_will().unwrap();
        assert_eq!(will.topic, "homie/dev/$state");
        assert_eq!(&will.message[..], b"lost");
        assert!(will.retain);
    }

    #[test]
    fn test_mqtt_options_reject_empty_host() {
        let options = ConnectOptions {
            host: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            mqtt_options(&options),
            Err(TransportError::InvalidOptions(_))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_burst_beyond_request_capacity() {
        let options = ConnectOptions {
            capacity: 10,
            ..Default::default()
        };
        let connection = MqttConnector::new().connect(&options).unwrap();

        for i in 0..200 {
            let topic = format!("homie/burst/node{}/$name", i);
            connection
                .handle
                .publish(&topic, "Node", PublishOptions::from(true))
                .unwrap();
        }
        connection.handle.subscribe("homie/burst/#").unwrap();
    }

    #[test]
    fn test_connect_outside_runtime_fails() {
        let result = MqttConnector::new().connect(&ConnectOptions::default());
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}

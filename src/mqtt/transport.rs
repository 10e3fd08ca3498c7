//! MQTT transport seam
//!
//! [`Transport`] is the small surface the connection manager needs from an
//! MQTT client. [`RumqttTransport`] implements it on top of rumqttc: requests
//! go through the non-blocking `try_*` calls and a pump task polls the
//! `EventLoop`, turning broker traffic into [`TransportEvent`]s.
//!
//! ```text
//! EventLoop::poll ──► pump task ──[TransportEvent]──► foreground channel
//! ```
//!
//! The pump never touches control state. It only forwards events, so every
//! callback is handled in the foreground task.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events produced by the transport context
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection attempt resolved
    ConnectionResult(bool),
    /// An established session dropped
    ConnectionLost,
    /// Inbound publish, payload decoded as UTF-8
    Message { topic: String, payload: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,

    #[error("Transport is already started")]
    AlreadyStarted,

    #[error("Client rejected request: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Operations the connection manager issues against an MQTT client.
///
/// None of these may wait on the network: `connect` starts an attempt whose
/// result arrives later as [`TransportEvent::ConnectionResult`], and
/// `publish`/`subscribe` only report whether the request was queued.
pub trait Transport: Send {
    fn connect(&mut self, host: &str, port: u16, client_id: &str) -> Result<(), TransportError>;

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Queues a clean DISCONNECT behind any pending requests.
    fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Tunables for the rumqttc client
#[derive(Clone, Debug)]
pub struct TransportSettings {
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
    pub request_capacity: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(5),
            reconnect_delay: Duration::from_millis(1000),
            request_capacity: 100,
        }
    }
}

/// rumqttc-backed transport
pub struct RumqttTransport {
    settings: TransportSettings,
    events: mpsc::Sender<TransportEvent>,
    cancel_token: CancellationToken,
    client: Option<AsyncClient>,
    pump: Option<JoinHandle<()>>,
}

impl RumqttTransport {
    /// `events` receives everything the pump observes; `cancel_token` stops
    /// the pump.
    pub fn new(
        settings: TransportSettings,
        events: mpsc::Sender<TransportEvent>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            settings,
            events,
            cancel_token,
            client: None,
            pump: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient, TransportError> {
        self.client.as_ref().ok_or(TransportError::NotConnected)
    }
}

impl Transport for RumqttTransport {
    fn connect(&mut self, host: &str, port: u16, client_id: &str) -> Result<(), TransportError> {
        if self.client.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(self.settings.keep_alive);

        let (client, event_loop) = AsyncClient::new(options, self.settings.request_capacity);
        info!("Connecting to MQTT broker {}:{} as '{}'", host, port, client_id);

        let pump = EventPump {
            event_loop,
            events: self.events.clone(),
            cancel_token: self.cancel_token.clone(),
            reconnect_delay: self.settings.reconnect_delay,
            connected: false,
        };
        self.pump = Some(tokio::spawn(pump.run()));
        self.client = Some(client);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        self.client()?
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client()?.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.client()?.try_disconnect()?;
        Ok(())
    }
}

impl Drop for RumqttTransport {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Polls the rumqttc event loop and forwards what it sees.
struct EventPump {
    event_loop: EventLoop,
    events: mpsc::Sender<TransportEvent>,
    cancel_token: CancellationToken,
    reconnect_delay: Duration,
    connected: bool,
}

impl EventPump {
    async fn run(mut self) {
        debug!("MQTT event pump started");

        loop {
            let polled = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("MQTT event pump cancelled");
                    break;
                }
                polled = self.event_loop.poll() => polled,
            };

            let event = match polled {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    let success = ack.code == ConnectReturnCode::Success;
                    if success {
                        info!("Connected to MQTT broker");
                    } else {
                        warn!("Broker refused connection: {:?}", ack.code);
                    }
                    self.connected = success;
                    Some(TransportEvent::ConnectionResult(success))
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => Some(TransportEvent::Message {
                    topic: publish.topic,
                    payload: String::from_utf8_lossy(&publish.payload).into_owned(),
                }),
                Ok(Event::Incoming(Packet::Disconnect)) => self.lost(),
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("Disconnected from MQTT broker");
                    break;
                }
                Ok(_) => None,
                Err(e) => {
                    let event = if self.connected {
                        warn!("MQTT connection lost: {}", e);
                        self.lost()
                    } else {
                        warn!("MQTT connection attempt failed: {}", e);
                        Some(TransportEvent::ConnectionResult(false))
                    };
                    if !self.forward(event).await {
                        break;
                    }
                    // rumqttc re-dials on the next poll
                    tokio::select! {
                        _ = self.cancel_token.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                    continue;
                }
            };

            if !self.forward(event).await {
                break;
            }
        }

        debug!("MQTT event pump stopped");
    }

    fn lost(&mut self) -> Option<TransportEvent> {
        self.connected = false;
        Some(TransportEvent::ConnectionLost)
    }

    /// Returns false once the foreground side has gone away.
    async fn forward(&mut self, event: Option<TransportEvent>) -> bool {
        let Some(event) = event else {
            return true;
        };
        if self.events.send(event).await.is_err() {
            error!("Foreground event channel closed, stopping MQTT event pump");
            return false;
        }
        true
    }
}

//! Connection manager
//!
//! Owns the MQTT session for the foreground task: the transport handle, the
//! [`TopicDispatcher`] and the connection state. Transport callbacks reach it
//! as plain method calls after they have been marshalled onto the foreground
//! channel, so none of this needs locking.

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::dispatcher::{Subscriber, TopicDispatcher};
use super::transport::{Transport, TransportError, TransportEvent};

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Counters shown next to the connection state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MqttStatus {
    pub connection_state: ConnectionState,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub publish_failures: usize,
    pub last_activity: Option<DateTime<Local>>,
}

/// Publishing surface handed to controls
pub trait Publisher {
    /// Returns whether the transport accepted the publish for sending.
    fn publish(&mut self, topic: &str, payload: &str) -> bool;
}

pub struct ConnectionManager<S> {
    transport: Box<dyn Transport>,
    dispatcher: TopicDispatcher<S>,
    status: MqttStatus,
    started: bool,
}

impl<S> ConnectionManager<S> {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            dispatcher: TopicDispatcher::new(),
            status: MqttStatus::default(),
            started: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.connection_state
    }

    pub fn status(&self) -> &MqttStatus {
        &self.status
    }

    pub fn dispatcher(&self) -> &TopicDispatcher<S> {
        &self.dispatcher
    }

    /// Adds an inbound subscription. Subscriptions are sent to the broker on
    /// every successful connect.
    pub fn register(&mut self, topic: impl Into<String>, subscriber: S) -> Option<S> {
        self.dispatcher.register(topic, subscriber)
    }

    /// Starts an asynchronous connection attempt. Only the first call does
    /// anything; the result arrives later through [`Self::on_connect`].
    pub fn connect(&mut self, host: &str, port: u16, client_id: &str) -> Result<(), TransportError> {
        if self.started {
            debug!("Connect requested again, ignoring");
            return Ok(());
        }
        self.transport.connect(host, port, client_id)?;
        self.started = true;
        self.status.connection_state = ConnectionState::Connecting;
        Ok(())
    }

    /// A connection attempt resolved. On success every registered topic is
    /// subscribed again.
    pub fn on_connect(&mut self, success: bool) {
        if !success {
            warn!("MQTT connection attempt failed");
            self.status.connection_state = ConnectionState::Disconnected;
            return;
        }

        info!("MQTT connected, subscribing {} topics", self.dispatcher.len());
        self.status.connection_state = ConnectionState::Connected;
        self.touch();
        for topic in self.dispatcher.topics() {
            match self.transport.subscribe(topic) {
                Ok(()) => debug!("Subscribed to '{}'", topic),
                Err(e) => warn!("Failed to subscribe to '{}': {}", topic, e),
            }
        }
    }

    /// Queues a clean disconnect; used once on shutdown.
    pub fn disconnect(&mut self) {
        if !self.started {
            return;
        }
        if let Err(e) = self.transport.disconnect() {
            warn!("Clean disconnect failed: {}", e);
        }
        self.status.connection_state = ConnectionState::Disconnected;
    }

    fn touch(&mut self) {
        self.status.last_activity = Some(Local::now());
    }
}

impl<S: Subscriber> ConnectionManager<S> {
    /// The session dropped: every subscriber hears about it, whether or not
    /// it ever received a message.
    pub fn on_disconnect(&mut self) {
        warn!("MQTT disconnected");
        self.status.connection_state = ConnectionState::Disconnected;
        self.dispatcher.disconnect_all();
    }

    pub fn on_message(&mut self, topic: &str, payload: &str) {
        self.status.messages_received += 1;
        self.touch();
        debug!("Received '{}' on '{}'", payload, topic);
        self.dispatcher.deliver(topic, payload);
    }

    /// Routes one event coming out of the transport context.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionResult(success) => self.on_connect(success),
            TransportEvent::ConnectionLost => self.on_disconnect(),
            TransportEvent::Message { topic, payload } => self.on_message(&topic, &payload),
        }
    }
}

impl<S> Publisher for ConnectionManager<S> {
    fn publish(&mut self, topic: &str, payload: &str) -> bool {
        match self.transport.publish(topic, payload) {
            Ok(()) => {
                self.status.messages_sent += 1;
                self.touch();
                debug!("Published '{}' to '{}'", payload, topic);
                true
            }
            Err(e) => {
                self.status.publish_failures += 1;
                warn!("Publish of '{}' to '{}' failed: {}", payload, topic, e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) enum Call {
        Connect(String, u16, String),
        Publish(String, String),
        Subscribe(String),
        Disconnect,
    }

    /// Records every request; `fail_publish` makes publishes fail.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingTransport {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub fail_publish: Arc<Mutex<bool>>,
    }

    impl RecordingTransport {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn publishes(&self) -> Vec<(String, String)> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Publish(topic, payload) => Some((topic, payload)),
                    _ => None,
                })
                .collect()
        }

        pub fn subscriptions(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Subscribe(topic) => Some(topic),
                    _ => None,
                })
                .collect()
        }

        pub fn set_fail_publish(&self, fail: bool) {
            *self.fail_publish.lock().expect("lock") = fail;
        }

        fn record(&self, call: Call) {
            self.calls.lock().expect("lock").push(call);
        }
    }

    impl Transport for RecordingTransport {
        fn connect(&mut self, host: &str, port: u16, client_id: &str) -> Result<(), TransportError> {
            self.record(Call::Connect(host.to_string(), port, client_id.to_string()));
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
            if *self.fail_publish.lock().expect("lock") {
                return Err(TransportError::NotConnected);
            }
            self.record(Call::Publish(topic.to_string(), payload.to_string()));
            Ok(())
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
            self.record(Call::Subscribe(topic.to_string()));
            Ok(())
        }

        fn disconnect(&mut self) -> Result<(), TransportError> {
            self.record(Call::Disconnect);
            Ok(())
        }
    }

    type Seen = Rc<RefCell<Vec<(&'static str, Option<String>)>>>;

    fn manager_with(
        topics: &[&'static str],
    ) -> (
        ConnectionManager<Box<dyn FnMut(Option<&str>)>>,
        RecordingTransport,
        Seen,
    ) {
        let transport = RecordingTransport::default();
        let seen = Seen::default();
        let mut manager: ConnectionManager<Box<dyn FnMut(Option<&str>)>> =
            ConnectionManager::new(Box::new(transport.clone()));
        for topic in topics {
            let seen = Rc::clone(&seen);
            let topic: &'static str = topic;
            manager.register(
                topic,
                Box::new(move |payload: Option<&str>| {
                    seen.borrow_mut().push((topic, payload.map(str::to_string)))
                }),
            );
        }
        (manager, transport, seen)
    }

    #[test]
    fn connect_is_issued_once() {
        let (mut manager, transport, _) = manager_with(&[]);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.connect("broker", 1883, "id").expect("connect");
        manager.connect("broker", 1883, "id").expect("connect");

        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(
            transport.calls(),
            vec![Call::Connect("broker".to_string(), 1883, "id".to_string())]
        );
    }

    #[test]
    fn successful_connect_subscribes_every_topic_once() {
        let topics = ["c/3", "a/1", "b/2", "d/4"];
        let (mut manager, transport, _) = manager_with(&topics);
        manager.connect("broker", 1883, "id").expect("connect");

        manager.on_connect(true);

        assert_eq!(manager.state(), ConnectionState::Connected);
        let mut subscribed = transport.subscriptions();
        subscribed.sort();
        let mut expected: Vec<_> = topics.iter().map(|t| t.to_string()).collect();
        expected.sort();
        assert_eq!(subscribed, expected);
    }

    #[test]
    fn reconnect_subscribes_again() {
        let (mut manager, transport, _) = manager_with(&["x"]);
        manager.on_connect(true);
        manager.on_disconnect();
        manager.on_connect(true);
        assert_eq!(transport.subscriptions(), vec!["x".to_string(), "x".to_string()]);
    }

    #[test]
    fn failed_connect_does_not_subscribe() {
        let (mut manager, transport, _) = manager_with(&["x", "y"]);
        manager.connect("broker", 1883, "id").expect("connect");

        manager.on_connect(false);

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(transport.subscriptions().is_empty());
    }

    #[test]
    fn disconnect_notifies_all_subscribers() {
        let (mut manager, _, seen) = manager_with(&["x", "y", "z"]);
        manager.on_connect(true);
        manager.on_message("y", "1");
        seen.borrow_mut().clear();

        manager.on_disconnect();

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        let mut got = seen.borrow().clone();
        got.sort();
        assert_eq!(got, vec![("x", None), ("y", None), ("z", None)]);
    }

    #[test]
    fn message_routing_and_counters() {
        let (mut manager, _, seen) = manager_with(&["x"]);
        manager.handle_event(TransportEvent::Message {
            topic: "x".to_string(),
            payload: "0".to_string(),
        });
        manager.handle_event(TransportEvent::Message {
            topic: "unknown".to_string(),
            payload: "1".to_string(),
        });

        assert_eq!(*seen.borrow(), vec![("x", Some("0".to_string()))]);
        assert_eq!(manager.status().messages_received, 2);
        assert!(manager.status().last_activity.is_some());
    }

    #[test]
    fn publish_reports_transport_result() {
        let (mut manager, transport, _) = manager_with(&[]);
        assert!(manager.publish("t", "1"));

        transport.set_fail_publish(true);
        assert!(!manager.publish("t", "0"));

        assert_eq!(transport.publishes(), vec![("t".to_string(), "1".to_string())]);
        assert_eq!(manager.status().messages_sent, 1);
        assert_eq!(manager.status().publish_failures, 1);
    }
}

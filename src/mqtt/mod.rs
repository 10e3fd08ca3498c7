//! # MQTT Integration Module
//!
//! Connection lifecycle, topic routing and the rumqttc transport.
//!
//! ```text
//! mqtt/
//! ├── config.rs      - Broker address and client settings
//! ├── connection.rs  - Connection state, resubscription, disconnect broadcast
//! ├── dispatcher.rs  - Exact-match topic → subscriber map
//! └── transport.rs   - Transport trait and the rumqttc event pump
//! ```
//!
//! ## Threading
//!
//! rumqttc is polled on its own task (the transport context). That task only
//! forwards [`TransportEvent`]s into the panel's transport channel; the
//! [`ConnectionManager`] and every subscriber live on the foreground task and
//! see those events in arrival order, interleaved with key input.
//!
//! ## Payloads
//!
//! Boolean topics carry the UTF-8 strings `"1"` and `"0"`. Messages are
//! published with QoS 0 and without the retain flag.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod transport;

pub use config::MqttConfig;
pub use connection::{ConnectionManager, ConnectionState, MqttStatus, Publisher};
pub use dispatcher::{Subscriber, TopicDispatcher};
pub use transport::{RumqttTransport, Transport, TransportError, TransportEvent, TransportSettings};

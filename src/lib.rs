//! # Keybridge
//!
//! Bridges keyboard keys to MQTT topics and shows selected topics back to the
//! operator.
//!
//! ```text
//! src/
//! ├── config.rs  - TOML configuration and broker URI parsing
//! ├── controls/  - Momentary buttons, latching switches, read-only outlets
//! ├── mqtt/      - Connection manager, topic dispatcher, rumqttc transport
//! ├── panel/     - Foreground event loop owning all control state
//! └── ui/        - egui operator window
//! ```

pub mod config;
pub mod controls;
pub mod mqtt;
pub mod panel;
pub mod ui;

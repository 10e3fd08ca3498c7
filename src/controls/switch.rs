//! Latching switch: every press flips the published value.

use tracing::{info, warn};

use super::{payload_for, Indicator, InputContext};

#[derive(Debug)]
pub struct LatchingSwitch {
    key: String,
    topic: String,
    active: bool,
}

impl LatchingSwitch {
    pub fn new(key: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            topic: topic.into(),
            active: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn indicator(&self) -> Indicator {
        Indicator::from_bool(self.active)
    }

    /// Publishes the flipped value; the toggle only moves if the transport
    /// accepted it.
    pub fn on_key_press(&mut self, ctx: InputContext<'_>) {
        let next = !self.active;
        let payload = payload_for(next);
        if ctx.publisher.publish(&self.topic, payload) {
            self.active = next;
            info!("'{}' switched {}", self.topic, if next { "on" } else { "off" });
        } else {
            warn!(
                "'{}': publish of '{}' failed, staying {}",
                self.topic,
                payload,
                if self.active { "on" } else { "off" }
            );
        }
    }
}

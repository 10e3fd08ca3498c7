//! Read-only display for an inbound topic.

use tracing::debug;

use super::Indicator;

#[derive(Debug)]
pub struct ReadOnlyDisplay {
    label: String,
    topic: String,
    last_value: Option<String>,
    indicator: Indicator,
}

impl ReadOnlyDisplay {
    pub fn new(label: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            topic: topic.into(),
            last_value: None,
            indicator: Indicator::Unknown,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn last_value(&self) -> Option<&str> {
        self.last_value.as_deref()
    }

    pub fn indicator(&self) -> Indicator {
        self.indicator
    }

    /// `None` (connection lost) clears the value; it is not the same as `"0"`.
    pub fn on_message(&mut self, payload: Option<&str>) {
        match payload {
            Some(value) => {
                self.indicator = Indicator::from_payload(value);
                self.last_value = Some(value.to_string());
            }
            None => {
                self.indicator = Indicator::Unknown;
                self.last_value = None;
            }
        }
        debug!("'{}' now {:?} ({:?})", self.topic, self.indicator, self.last_value);
    }
}

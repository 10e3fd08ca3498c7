use std::fmt;

use crate::mqtt::TransportEvent;

/// Name of the physical key a control is bound to, compared
/// case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Trigger(String);

impl Trigger {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Trigger {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Press(Trigger),
    Release(Trigger),
}

/// Key events collected from one window frame, applied as a unit
pub type InputBatch = Vec<InputEvent>;

/// Everything the foreground task reacts to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PanelEvent {
    Input(InputEvent),
    Transport(TransportEvent),
}

impl From<InputEvent> for PanelEvent {
    fn from(event: InputEvent) -> Self {
        PanelEvent::Input(event)
    }
}

impl From<TransportEvent> for PanelEvent {
    fn from(event: TransportEvent) -> Self {
        PanelEvent::Transport(event)
    }
}

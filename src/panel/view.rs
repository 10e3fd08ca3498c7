//! Snapshot of the panel for the operator window

use crate::controls::{Control, ControlKind, Indicator};
use crate::mqtt::MqttStatus;

#[derive(Clone, Debug, PartialEq)]
pub struct ControlRow {
    /// Key for inputs, configured label for outlets
    pub label: String,
    pub topic: String,
    pub indicator: Indicator,
    /// Last payload an outlet received
    pub value: Option<String>,
}

impl From<&Control> for ControlRow {
    fn from(control: &Control) -> Self {
        let value = match control {
            Control::Display(display) => display.last_value().map(str::to_string),
            Control::Button(_) | Control::Switch(_) => None,
        };
        Self {
            label: control.label().to_string(),
            topic: control.topic().to_string(),
            indicator: control.indicator(),
            value,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PanelView {
    pub status: MqttStatus,
    pub buttons: Vec<ControlRow>,
    pub switches: Vec<ControlRow>,
    pub outlets: Vec<ControlRow>,
}

impl PanelView {
    pub fn push(&mut self, control: &Control) {
        let row = ControlRow::from(control);
        match control.kind() {
            ControlKind::Button => self.buttons.push(row),
            ControlKind::Switch => self.switches.push(row),
            ControlKind::Display => self.outlets.push(row),
        }
    }
}

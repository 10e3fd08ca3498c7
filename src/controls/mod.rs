//! Controls bound to MQTT topics
//!
//! Three kinds of control exist:
//!
//! - [`MomentaryButton`] publishes `1` while its key is held and `0` once it
//!   is released, absorbing key auto-repeat through the [`DebounceScheduler`]
//! - [`LatchingSwitch`] flips between `0` and `1` on every press
//! - [`ReadOnlyDisplay`] shows whatever arrives on its topic
//!
//! [`Control`] wraps them behind one interface. Visible state changes only
//! after a publish was accepted by the transport, or after a payload was
//! actually received.

pub mod button;
pub mod debounce;
pub mod display;
pub mod switch;

pub use button::{ButtonState, MomentaryButton};
pub use debounce::{DebounceError, DebounceHandle, DebounceScheduler};
pub use display::ReadOnlyDisplay;
pub use switch::LatchingSwitch;

use tokio::time::Instant;

use crate::mqtt::dispatcher::Subscriber;
use crate::mqtt::Publisher;

/// Payload for true / on / pressed
pub const PAYLOAD_ON: &str = "1";
/// Payload for false / off / released
pub const PAYLOAD_OFF: &str = "0";

/// Index of an input control inside its panel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub usize);

/// What the operator sees for one control
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Indicator {
    On,
    Off,
    #[default]
    Unknown,
}

impl Indicator {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Indicator::On
        } else {
            Indicator::Off
        }
    }

    /// `"1"` and `"0"` map to on/off, anything else is unknown.
    pub fn from_payload(payload: &str) -> Self {
        match payload {
            PAYLOAD_ON => Indicator::On,
            PAYLOAD_OFF => Indicator::Off,
            _ => Indicator::Unknown,
        }
    }
}

pub fn payload_for(value: bool) -> &'static str {
    if value {
        PAYLOAD_ON
    } else {
        PAYLOAD_OFF
    }
}

/// Everything an input transition may touch
pub struct InputContext<'a> {
    pub id: ControlId,
    pub publisher: &'a mut dyn Publisher,
    pub scheduler: &'a mut DebounceScheduler,
    pub now: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlKind {
    Button,
    Switch,
    Display,
}

#[derive(Debug)]
pub enum Control {
    Button(MomentaryButton),
    Switch(LatchingSwitch),
    Display(ReadOnlyDisplay),
}

impl Control {
    pub fn kind(&self) -> ControlKind {
        match self {
            Control::Button(_) => ControlKind::Button,
            Control::Switch(_) => ControlKind::Switch,
            Control::Display(_) => ControlKind::Display,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Control::Button(button) => button.topic(),
            Control::Switch(switch) => switch.topic(),
            Control::Display(display) => display.topic(),
        }
    }

    /// Key for inputs, label for displays
    pub fn label(&self) -> &str {
        match self {
            Control::Button(button) => button.key(),
            Control::Switch(switch) => switch.key(),
            Control::Display(display) => display.label(),
        }
    }

    pub fn indicator(&self) -> Indicator {
        match self {
            Control::Button(button) => button.indicator(),
            Control::Switch(switch) => switch.indicator(),
            Control::Display(display) => display.indicator(),
        }
    }

    pub fn on_key_press(&mut self, ctx: InputContext<'_>) {
        match self {
            Control::Button(button) => button.on_key_press(ctx),
            Control::Switch(switch) => switch.on_key_press(ctx),
            Control::Display(_) => {}
        }
    }

    pub fn on_key_release(&mut self, ctx: InputContext<'_>) {
        match self {
            Control::Button(button) => button.on_key_release(ctx),
            Control::Switch(_) | Control::Display(_) => {}
        }
    }

    /// Runs a deferred release scheduled by this control.
    pub fn on_release_due(&mut self, handle: DebounceHandle, publisher: &mut dyn Publisher) {
        if let Control::Button(button) = self {
            button.process_release(handle, publisher);
        }
    }

    /// Inbound traffic; only outlets are ever subscribed.
    pub fn on_message(&mut self, payload: Option<&str>) {
        if let Control::Display(display) = self {
            display.on_message(payload);
        }
    }
}

impl Subscriber for Control {
    fn notify(&mut self, payload: Option<&str>) {
        self.on_message(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_mapping() {
        assert_eq!(Indicator::from_payload("1"), Indicator::On);
        assert_eq!(Indicator::from_payload("0"), Indicator::Off);
        assert_eq!(Indicator::from_payload(""), Indicator::Unknown);
        assert_eq!(Indicator::from_payload(" 1"), Indicator::Unknown);
        assert_eq!(Indicator::from_payload("true"), Indicator::Unknown);
        assert_eq!(payload_for(true), "1");
        assert_eq!(payload_for(false), "0");
    }

    #[test]
    fn display_has_no_input_transitions() {
        let mut control = Control::Display(ReadOnlyDisplay::new("sensor", "s/t"));
        let mut scheduler = DebounceScheduler::new(std::time::Duration::ZERO);
        let mut publisher = NeverPublisher;
        control.on_key_press(InputContext {
            id: ControlId(0),
            publisher: &mut publisher,
            scheduler: &mut scheduler,
            now: Instant::now(),
        });
        assert_eq!(control.indicator(), Indicator::Unknown);
        assert!(scheduler.is_empty());
        assert_eq!(control.kind(), ControlKind::Display);
        assert_eq!(control.topic(), "s/t");
    }

    struct NeverPublisher;

    impl Publisher for NeverPublisher {
        fn publish(&mut self, _topic: &str, _payload: &str) -> bool {
            panic!("displays never publish");
        }
    }
}

//! Momentary button
//!
//! ```text
//!          press / publish "1" ok
//!   Idle ─────────────────────────► Pressed
//!    ▲                               │   ▲
//!    │ release due / publish "0" ok  │   │ press (cancel release,
//!    │                       release │   │        no publish)
//!    │                               ▼   │
//!    └──────────────────────────── ReleasePending
//! ```
//!
//! A failed publish of `"1"` leaves the button `Idle`. A failed publish of
//! `"0"` leaves it `Pressed`; the next release schedules another attempt.

use tracing::{debug, info, warn};

use super::{payload_for, DebounceHandle, Indicator, InputContext};
use crate::mqtt::Publisher;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Pressed,
    ReleasePending(DebounceHandle),
}

#[derive(Debug)]
pub struct MomentaryButton {
    key: String,
    topic: String,
    state: ButtonState,
    /// Last value the transport accepted
    published: bool,
}

impl MomentaryButton {
    pub fn new(key: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            topic: topic.into(),
            state: ButtonState::Idle,
            published: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    pub fn pending_release(&self) -> bool {
        matches!(self.state, ButtonState::ReleasePending(_))
    }

    pub fn indicator(&self) -> Indicator {
        Indicator::from_bool(self.published)
    }

    pub fn on_key_press(&mut self, ctx: InputContext<'_>) {
        match self.state {
            ButtonState::ReleasePending(handle) => {
                // auto-repeat: swallow the release/press pair
                ctx.scheduler.cancel(handle);
                self.state = ButtonState::Pressed;
                debug!("'{}': repeat press absorbed", self.topic);
            }
            ButtonState::Idle => {
                if self.publish(ctx.publisher, true) {
                    self.state = ButtonState::Pressed;
                    info!("'{}' pressed", self.topic);
                }
            }
            ButtonState::Pressed => {
                debug!("'{}': already pressed", self.topic);
            }
        }
    }

    pub fn on_key_release(&mut self, ctx: InputContext<'_>) {
        match self.state {
            ButtonState::Pressed => self.arm_release(ctx),
            ButtonState::Idle | ButtonState::ReleasePending(_) => {
                debug!("'{}': release ignored in {:?}", self.topic, self.state);
            }
        }
    }

    fn arm_release(&mut self, ctx: InputContext<'_>) {
        match ctx.scheduler.schedule(ctx.id, ctx.now) {
            Ok(handle) => self.state = ButtonState::ReleasePending(handle),
            Err(e) => warn!("'{}': {}", self.topic, e),
        }
    }

    /// The deferred release came due without an intervening press.
    pub fn process_release(&mut self, handle: DebounceHandle, publisher: &mut dyn Publisher) {
        if self.state != ButtonState::ReleasePending(handle) {
            debug!("'{}': stale release {:?} ignored", self.topic, handle);
            return;
        }

        if self.publish(publisher, false) {
            self.state = ButtonState::Idle;
            info!("'{}' released", self.topic);
        } else {
            self.state = ButtonState::Pressed;
        }
    }

    fn publish(&mut self, publisher: &mut dyn Publisher, value: bool) -> bool {
        let payload = payload_for(value);
        if publisher.publish(&self.topic, payload) {
            self.published = value;
            true
        } else {
            warn!("'{}': publish of '{}' failed, state kept", self.topic, payload);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{ControlId, DebounceScheduler};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Recorder {
        published: Vec<(String, String)>,
        fail: bool,
    }

    impl Publisher for Recorder {
        fn publish(&mut self, topic: &str, payload: &str) -> bool {
            if self.fail {
                return false;
            }
            self.published.push((topic.to_string(), payload.to_string()));
            true
        }
    }

    struct Rig {
        button: MomentaryButton,
        publisher: Recorder,
        scheduler: DebounceScheduler,
        now: Instant,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                button: MomentaryButton::new("a", "rig/run"),
                publisher: Recorder::default(),
                scheduler: DebounceScheduler::new(Duration::from_millis(20)),
                now: Instant::now(),
            }
        }

        fn ctx(&mut self) -> (&mut MomentaryButton, InputContext<'_>) {
            (
                &mut self.button,
                InputContext {
                    id: ControlId(0),
                    publisher: &mut self.publisher,
                    scheduler: &mut self.scheduler,
                    now: self.now,
                },
            )
        }

        fn press(&mut self) {
            let (button, ctx) = self.ctx();
            button.on_key_press(ctx);
        }

        fn release(&mut self) {
            let (button, ctx) = self.ctx();
            button.on_key_release(ctx);
        }

        fn settle(&mut self, after: Duration) {
            self.now += after;
            for (_, handle) in self.scheduler.take_due(self.now) {
                self.button.process_release(handle, &mut self.publisher);
            }
        }

        fn payloads(&self) -> Vec<&str> {
            self.publisher
                .published
                .iter()
                .map(|(_, p)| p.as_str())
                .collect()
        }
    }

    #[test]
    fn repeat_is_absorbed() {
        let mut rig = Rig::new();
        rig.press();
        rig.release();
        rig.press();
        rig.settle(Duration::from_millis(100));

        assert_eq!(rig.payloads(), vec!["1"]);
        assert_eq!(rig.button.state(), ButtonState::Pressed);
        assert_eq!(rig.button.indicator(), Indicator::On);
        assert!(rig.scheduler.is_empty());
    }

    #[test]
    fn long_repeat_burst_publishes_once() {
        let mut rig = Rig::new();
        rig.press();
        for _ in 0..25 {
            rig.release();
            rig.press();
            rig.settle(Duration::from_millis(5));
        }
        rig.release();
        rig.settle(Duration::from_millis(20));

        assert_eq!(rig.payloads(), vec!["1", "0"]);
        assert_eq!(rig.button.state(), ButtonState::Idle);
    }

    #[test]
    fn release_commits_after_delay() {
        let mut rig = Rig::new();
        rig.press();
        rig.release();
        assert!(rig.button.pending_release());

        rig.settle(Duration::from_millis(10));
        assert_eq!(rig.payloads(), vec!["1"]);
        assert_eq!(rig.button.indicator(), Indicator::On);

        rig.settle(Duration::from_millis(10));
        assert_eq!(rig.payloads(), vec!["1", "0"]);
        assert_eq!(rig.button.state(), ButtonState::Idle);
        assert_eq!(rig.button.indicator(), Indicator::Off);
        assert!(rig
            .publisher
            .published
            .iter()
            .all(|(topic, _)| topic == "rig/run"));
    }

    #[test]
    fn failed_press_stays_idle() {
        let mut rig = Rig::new();
        rig.publisher.fail = true;
        rig.press();

        assert_eq!(rig.button.state(), ButtonState::Idle);
        assert_eq!(rig.button.indicator(), Indicator::Off);

        // nothing to release either
        rig.release();
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.button.state(), ButtonState::Idle);
    }

    #[test]
    fn failed_release_keeps_pressed_and_retries() {
        let mut rig = Rig::new();
        rig.press();
        rig.release();
        rig.publisher.fail = true;
        rig.settle(Duration::from_millis(20));

        assert_eq!(rig.button.state(), ButtonState::Pressed);
        assert_eq!(rig.button.indicator(), Indicator::On);

        rig.publisher.fail = false;
        rig.press();
        rig.release();
        rig.settle(Duration::from_millis(20));

        assert_eq!(rig.payloads(), vec!["1", "0"]);
        assert_eq!(rig.button.state(), ButtonState::Idle);
    }

    #[test]
    fn stale_handle_is_ignored() {
        let mut rig = Rig::new();
        rig.press();
        rig.release();
        let ButtonState::ReleasePending(handle) = rig.button.state() else {
            panic!("expected pending release");
        };
        rig.press();

        rig.button.process_release(handle, &mut rig.publisher);
        assert_eq!(rig.payloads(), vec!["1"]);
        assert_eq!(rig.button.state(), ButtonState::Pressed);
    }
}

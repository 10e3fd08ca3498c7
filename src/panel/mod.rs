//! Control panel: the foreground context
//!
//! Owns every control, the connection manager and the debounce scheduler, and
//! is the only place any of them are mutated. Lifecycle as a statum machine:
//!
//! ```text
//! Registering ──connect()──► Running ──run()──► Stopped
//! ```
//!
//! Controls can only be added while `Registering`, so the subscriber map is
//! complete and read-only by the time the transport exists.
//!
//! # Event loop
//!
//! ```text
//! key input ──[InputBatch, unbounded]──┐
//!                                      ├─► drain burst ─► due releases ─► PanelView
//! MQTT pump ──[TransportEvent]─────────┘
//! ```
//!
//! Key input arrives as one batch per window frame on its own unbounded
//! channel, so a release can never be dropped behind inbound MQTT traffic.
//! Each wake-up handles every batch and event already queued before running
//! deferred releases, so a press that was queued behind a release always
//! cancels it.

pub mod input;
pub mod view;

pub use input::{InputBatch, InputEvent, PanelEvent, Trigger};
pub use view::{ControlRow, PanelView};

use std::collections::HashMap;
use std::time::Duration;

use statum::{machine, state};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ConfigError};
use crate::controls::{
    Control, ControlId, DebounceScheduler, InputContext, LatchingSwitch, MomentaryButton,
    ReadOnlyDisplay,
};
use crate::mqtt::{
    ConnectionManager, ConnectionState, MqttConfig, MqttStatus, Transport, TransportError,
    TransportEvent,
};

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("Key '{0}' is already bound")]
    DuplicateKey(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

#[state]
#[derive(Debug, Clone)]
pub enum PanelState {
    Registering, // Controls being added
    Running,     // Connected to the transport, handling events
    Stopped,     // Event loop finished
}

#[machine]
pub struct ControlPanel<S: PanelState> {
    manager: ConnectionManager<Control>,
    inputs: Vec<Control>,
    bindings: HashMap<Trigger, ControlId>,
    scheduler: DebounceScheduler,
    view_sender: watch::Sender<PanelView>,
}

impl<S: PanelState> ControlPanel<S> {
    pub fn subscribe_view(&self) -> watch::Receiver<PanelView> {
        self.view_sender.subscribe()
    }

    pub fn status(&self) -> &MqttStatus {
        self.manager.status()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Builds a fresh snapshot: inputs in registration order, then outlets.
    pub fn snapshot(&self) -> PanelView {
        let mut view = PanelView {
            status: self.manager.status().clone(),
            ..PanelView::default()
        };
        for control in &self.inputs {
            view.push(control);
        }
        for (_, control) in self.manager.dispatcher().subscribers() {
            view.push(control);
        }
        view
    }

    fn publish_view(&self) {
        let snapshot = self.snapshot();
        self.view_sender.send_if_modified(|view| {
            if *view == snapshot {
                return false;
            }
            *view = snapshot;
            true
        });
    }
}

impl ControlPanel<Registering> {
    pub fn create(transport: Box<dyn Transport>, debounce: Duration) -> Self {
        info!("Creating control panel, release debounce {:?}", debounce);
        let (view_sender, _) = watch::channel(PanelView::default());

        Self::new(
            ConnectionManager::new(transport),
            Vec::new(),
            HashMap::new(),
            DebounceScheduler::new(debounce),
            view_sender,
        )
    }

    /// Creates every control listed in `config`, group by group.
    pub fn from_config(config: &AppConfig, transport: Box<dyn Transport>) -> Result<Self, PanelError> {
        let mut panel = Self::create(transport, config.debounce_delay());
        for (key, topic) in &config.buttons {
            panel.add_button(key, topic)?;
        }
        for (key, topic) in &config.switches {
            panel.add_switch(key, topic)?;
        }
        for (label, topic) in &config.outlets {
            panel.add_display(label, topic);
        }
        info!(
            "Control panel holds {} inputs and {} outlets",
            panel.inputs.len(),
            panel.manager.dispatcher().len()
        );
        Ok(panel)
    }

    pub fn add_button(&mut self, key: &str, topic: &str) -> Result<ControlId, PanelError> {
        self.bind(key, Control::Button(MomentaryButton::new(key, topic)))
    }

    pub fn add_switch(&mut self, key: &str, topic: &str) -> Result<ControlId, PanelError> {
        self.bind(key, Control::Switch(LatchingSwitch::new(key, topic)))
    }

    /// Registers an outlet for `topic`; a later outlet on the same topic
    /// replaces it.
    pub fn add_display(&mut self, label: &str, topic: &str) {
        let display = Control::Display(ReadOnlyDisplay::new(label, topic));
        if let Some(replaced) = self.manager.register(topic, display) {
            warn!("Outlet '{}' replaced by '{}'", replaced.label(), label);
        }
    }

    fn bind(&mut self, key: &str, control: Control) -> Result<ControlId, PanelError> {
        let trigger = Trigger::new(key);
        if self.bindings.contains_key(&trigger) {
            return Err(PanelError::DuplicateKey(key.to_string()));
        }
        let id = ControlId(self.inputs.len());
        debug!("Binding key '{}' to {:?} on '{}'", trigger, control.kind(), control.topic());
        self.inputs.push(control);
        self.bindings.insert(trigger, id);
        Ok(id)
    }

    /// Starts the connection attempt and freezes registration.
    pub fn connect(mut self, mqtt: &MqttConfig) -> Result<ControlPanel<Running>, PanelError> {
        self.manager
            .connect(&mqtt.broker.host, mqtt.broker.port, &mqtt.client_id)?;
        self.publish_view();
        Ok(self.transition())
    }
}

impl ControlPanel<Running> {
    /// Applies one foreground event.
    pub fn handle_event(&mut self, event: PanelEvent, now: Instant) {
        match event {
            PanelEvent::Input(InputEvent::Press(trigger)) => self.dispatch_input(&trigger, true, now),
            PanelEvent::Input(InputEvent::Release(trigger)) => {
                self.dispatch_input(&trigger, false, now)
            }
            PanelEvent::Transport(event) => self.manager.handle_event(event),
        }
    }

    /// Applies one frame's worth of key input in order.
    pub fn handle_inputs(&mut self, batch: InputBatch, now: Instant) {
        for input in batch {
            self.handle_event(PanelEvent::Input(input), now);
        }
    }

    fn dispatch_input(&mut self, trigger: &Trigger, pressed: bool, now: Instant) {
        let Some(&id) = self.bindings.get(trigger) else {
            debug!("No control bound to '{}'", trigger);
            return;
        };
        let Some(control) = self.inputs.get_mut(id.0) else {
            return;
        };
        let ctx = InputContext {
            id,
            publisher: &mut self.manager,
            scheduler: &mut self.scheduler,
            now,
        };
        if pressed {
            control.on_key_press(ctx);
        } else {
            control.on_key_release(ctx);
        }
    }

    /// Runs every deferred release due at `now`.
    pub fn run_due(&mut self, now: Instant) {
        for (id, handle) in self.scheduler.take_due(now) {
            if let Some(control) = self.inputs.get_mut(id.0) {
                control.on_release_due(handle, &mut self.manager);
            }
        }
    }

    /// Executes pending releases regardless of their deadline so no momentary
    /// control stays published as pressed.
    fn flush_pending(&mut self) {
        let pending = self.scheduler.take_all();
        if !pending.is_empty() {
            info!("Flushing {} pending releases", pending.len());
        }
        for (id, handle) in pending {
            if let Some(control) = self.inputs.get_mut(id.0) {
                control.on_release_due(handle, &mut self.manager);
            }
        }
    }

    /// Handles everything already queued on both channels, input first.
    fn drain_queued(
        &mut self,
        inputs: &mut mpsc::UnboundedReceiver<InputBatch>,
        transport: &mut mpsc::Receiver<TransportEvent>,
    ) {
        loop {
            let mut handled = false;
            while let Ok(batch) = inputs.try_recv() {
                self.handle_inputs(batch, Instant::now());
                handled = true;
            }
            if let Ok(event) = transport.try_recv() {
                self.manager.handle_event(event);
                handled = true;
            }
            if !handled {
                break;
            }
        }
    }

    /// Handles events until the input channel closes or `cancel_token` fires.
    /// Events already queued at that point are still applied.
    pub async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<InputBatch>,
        mut transport: mpsc::Receiver<TransportEvent>,
        cancel_token: CancellationToken,
    ) -> ControlPanel<Stopped> {
        info!("Control panel event loop started");
        let mut transport_open = true;
        let mut stopping = false;

        while !stopping {
            let deadline = self.scheduler.next_deadline();

            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("Shutdown requested");
                    stopping = true;
                }

                received = inputs.recv() => match received {
                    Some(batch) => self.handle_inputs(batch, Instant::now()),
                    None => {
                        info!("Input channel closed");
                        stopping = true;
                    }
                },

                received = transport.recv(), if transport_open => match received {
                    Some(event) => self.manager.handle_event(event),
                    None => {
                        warn!("Transport event channel closed");
                        transport_open = false;
                    }
                },

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
            }

            self.drain_queued(&mut inputs, &mut transport);
            self.run_due(Instant::now());
            self.publish_view();
        }

        self.flush_pending();
        self.manager.disconnect();
        self.publish_view();
        info!("Control panel event loop stopped");
        self.transition()
    }
}

impl ControlPanel<Stopped> {
    pub fn into_view(self) -> PanelView {
        self.snapshot()
    }
}

//! # Operator Window
//!
//! eframe/egui front end for the control panel. The window does not own any
//! control state: it forwards key events into the panel channel and renders
//! the latest [`PanelView`] from the watch channel every frame.
//!
//! ## Layout
//!
//! ```text
//! MQTT broker state: Connected
//! ┌ Buttons ──────┐┌ Switches ─────┐┌ Outlets ──────────┐
//! │ topic    [a]  ││ topic    [l]  ││ topic    1        │
//! └───────────────┘└───────────────┘└───────────────────┘
//! ```
//!
//! Escape closes the window. Key auto-repeat presses are dropped here, so a
//! held key reaches the panel as a single press.

pub mod common;

use eframe::egui::{self, Event, Key};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::panel::{InputBatch, InputEvent, PanelView, Trigger};

use self::common::{connection_label, group_frame, input_row, outlet_row};

pub const WINDOW_TITLE: &str = "MQTT button test";

pub struct KeybridgeUi {
    inputs: mpsc::UnboundedSender<InputBatch>,
    view: watch::Receiver<PanelView>,
}

impl KeybridgeUi {
    pub fn new(inputs: mpsc::UnboundedSender<InputBatch>, view: watch::Receiver<PanelView>) -> Self {
        Self { inputs, view }
    }

    fn forward(&self, batch: InputBatch) {
        if batch.is_empty() {
            return;
        }
        debug!("Forwarding {:?}", batch);
        if self.inputs.send(batch).is_err() {
            warn!("Control panel stopped, dropping key events");
        }
    }
}

/// Maps an egui key event to a panel input; `None` for keys the panel never
/// sees and for auto-repeat presses.
pub fn input_event(key: Key, pressed: bool, repeat: bool) -> Option<InputEvent> {
    if key == Key::Escape || (pressed && repeat) {
        return None;
    }
    let trigger = Trigger::new(key.name());
    Some(if pressed {
        InputEvent::Press(trigger)
    } else {
        InputEvent::Release(trigger)
    })
}

impl eframe::App for KeybridgeUi {
    fn raw_input_hook(&mut self, ctx: &egui::Context, raw_input: &mut egui::RawInput) {
        let mut batch = InputBatch::new();
        for event in &raw_input.events {
            if let Event::Key {
                key,
                pressed,
                repeat,
                ..
            } = event
            {
                if *key == Key::Escape && *pressed {
                    info!("Escape pressed, closing window");
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    continue;
                }
                if let Some(input) = input_event(*key, *pressed, *repeat) {
                    batch.push(input);
                }
            }
        }
        self.forward(batch);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let view = self.view.borrow_and_update().clone();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.ctx().request_repaint_after(Duration::from_millis(33));

            let (state_text, state_color) = connection_label(view.status.connection_state);
            ui.horizontal(|ui| {
                ui.label("MQTT broker state:");
                ui.colored_label(state_color, state_text);
            });
            ui.add_space(6.0);

            ui.columns(3, |columns| {
                group_frame(&mut columns[0], "Buttons", &view.buttons, input_row);
                group_frame(&mut columns[1], "Switches", &view.switches, input_row);
                group_frame(&mut columns[2], "Outlets", &view.outlets, outlet_row);
            });

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.small(format!(
                    "sent {}  received {}  failed {}",
                    view.status.messages_sent,
                    view.status.messages_received,
                    view.status.publish_failures
                ));
                if let Some(last) = view.status.last_activity {
                    ui.small(format!("last activity {}", last.format("%H:%M:%S")));
                }
            });
        });
    }
}

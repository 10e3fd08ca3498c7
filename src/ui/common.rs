//! Shared colours and small widgets for the operator window

use eframe::egui::{self, Color32, RichText, Ui};

use crate::controls::Indicator;
use crate::mqtt::ConnectionState;
use crate::panel::ControlRow;

/// Fixed palette
pub struct UiColors;

impl UiColors {
    pub const ON: Color32 = Color32::from_rgb(40, 170, 70);
    pub const OFF: Color32 = Color32::from_rgb(200, 50, 50);
    pub const UNKNOWN: Color32 = Color32::from_rgb(130, 130, 130);
    pub const CONNECTING: Color32 = Color32::from_rgb(210, 160, 40);
}

pub fn indicator_color(indicator: Indicator) -> Color32 {
    match indicator {
        Indicator::On => UiColors::ON,
        Indicator::Off => UiColors::OFF,
        Indicator::Unknown => UiColors::UNKNOWN,
    }
}

pub fn connection_label(state: ConnectionState) -> (&'static str, Color32) {
    match state {
        ConnectionState::Connected => ("Connected", UiColors::ON),
        ConnectionState::Connecting => ("Connecting", UiColors::CONNECTING),
        ConnectionState::Disconnected => ("Disconnected", UiColors::OFF),
    }
}

/// Framed group with a title, one grid row per control.
pub fn group_frame(ui: &mut Ui, title: &str, rows: &[ControlRow], row: fn(&mut Ui, &ControlRow)) {
    ui.group(|ui| {
        ui.label(RichText::new(title).strong());
        egui::Grid::new(title)
            .num_columns(2)
            .spacing([10.0, 6.0])
            .show(ui, |ui| {
                for entry in rows {
                    row(ui, entry);
                    ui.end_row();
                }
            });
    });
}

/// Topic plus the bound key, drawn sunken while active.
pub fn input_row(ui: &mut Ui, row: &ControlRow) {
    ui.label(&row.topic);
    let key = egui::Button::new(RichText::new(&row.label).monospace())
        .selected(row.indicator == Indicator::On)
        .min_size(egui::vec2(22.0, 18.0));
    ui.add_enabled(false, key);
}

/// Topic plus the last received value, coloured by its meaning.
pub fn outlet_row(ui: &mut Ui, row: &ControlRow) {
    ui.label(&row.topic).on_hover_text(&row.label);
    let value = row.value.as_deref().unwrap_or("");
    ui.label(
        RichText::new(format!("{:<10}", value))
            .monospace()
            .color(indicator_color(row.indicator)),
    );
}

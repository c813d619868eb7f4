//! Toolbar module
//!
//! 顶部工具栏：撤销/重做、吸附、波纹、过零点裁剪、速度/拍号、能量和缩放。

use egui::*;

use crate::editor::{ArrangeCommand, ArrangeOptions, SnapMode};
use crate::grid::Tempo;
use crate::waveform::WaveformMode;

pub enum ToolbarAction {
    Command(ArrangeCommand),
    ZoomBy(f64),
    ToggleZeroCrossing(bool),
    SetWaveformMode(WaveformMode),
}

pub struct Toolbar<'a> {
    options: &'a ArrangeOptions,
    tempo: Tempo,
    energy: f64,
    division: u32,
    can_undo: bool,
    can_redo: bool,
}

impl<'a> Toolbar<'a> {
    pub fn new(options: &'a ArrangeOptions, tempo: Tempo, energy: f64, division: u32) -> Self {
        Self {
            options,
            tempo,
            energy,
            division,
            can_undo: false,
            can_redo: false,
        }
    }

    pub fn history(mut self, can_undo: bool, can_redo: bool) -> Self {
        self.can_undo = can_undo;
        self.can_redo = can_redo;
        self
    }

    pub fn ui(&self, ui: &mut Ui, actions: &mut Vec<ToolbarAction>) {
        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.can_undo, Button::new("↺"))
                .on_hover_text("Undo")
                .clicked()
            {
                actions.push(ToolbarAction::Command(ArrangeCommand::Undo));
            }
            if ui
                .add_enabled(self.can_redo, Button::new("↻"))
                .on_hover_text("Redo")
                .clicked()
            {
                actions.push(ToolbarAction::Command(ArrangeCommand::Redo));
            }

            ui.separator();

            let mut snap = self.options.snap_enabled;
            let mut mode = self.options.snap_mode;
            let snap_changed = ui.checkbox(&mut snap, "Snap").changed();
            let mode_changed = ComboBox::from_id_salt("snap_mode")
                .selected_text(match mode {
                    SnapMode::Absolute => "Absolute",
                    SnapMode::Relative => "Relative",
                })
                .show_ui(ui, |ui| {
                    let a = ui.selectable_value(&mut mode, SnapMode::Absolute, "Absolute").changed();
                    let r = ui.selectable_value(&mut mode, SnapMode::Relative, "Relative").changed();
                    a || r
                })
                .inner
                .unwrap_or(false);
            if snap_changed || mode_changed {
                actions.push(ToolbarAction::Command(ArrangeCommand::SetSnap { enabled: snap, mode }));
            }
            ui.label(format!("1/{}", self.division));

            ui.separator();

            let mut ripple = self.options.ripple;
            if ui.checkbox(&mut ripple, "Ripple").on_hover_text("Shift 临时开启").changed() {
                actions.push(ToolbarAction::Command(ArrangeCommand::SetRipple(ripple)));
            }
            let mut zero = self.options.zero_crossing_trim;
            if ui.checkbox(&mut zero, "Zero-crossing trim").changed() {
                actions.push(ToolbarAction::ToggleZeroCrossing(zero));
            }

            ui.separator();

            let mut bpm = self.tempo.bpm;
            let mut beats = self.tempo.beats_per_bar;
            let bpm_changed = ui
                .add(DragValue::new(&mut bpm).range(20.0..=400.0).speed(0.5).suffix(" BPM"))
                .changed();
            let beats_changed = ui
                .add(DragValue::new(&mut beats).range(1..=16).suffix("/4"))
                .changed();
            if bpm_changed || beats_changed {
                actions.push(ToolbarAction::Command(ArrangeCommand::SetTempo {
                    bpm,
                    beats_per_bar: beats,
                }));
            }

            let mut energy = self.energy;
            if ui
                .add(Slider::new(&mut energy, 0.0..=1.0).text("Energy"))
                .changed()
            {
                actions.push(ToolbarAction::Command(ArrangeCommand::SetEnergy(energy)));
            }

            ui.separator();

            let mut mode = self.options.waveform.mode;
            let peak = ui.selectable_value(&mut mode, WaveformMode::Peak, "Peak").changed();
            let rms = ui.selectable_value(&mut mode, WaveformMode::Rms, "RMS").changed();
            if peak || rms {
                actions.push(ToolbarAction::SetWaveformMode(mode));
            }

            ui.separator();

            if ui.button("−").on_hover_text("Zoom out").clicked() {
                actions.push(ToolbarAction::ZoomBy(1.0 / 1.25));
            }
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                actions.push(ToolbarAction::ZoomBy(1.25));
            }
        });
    }
}

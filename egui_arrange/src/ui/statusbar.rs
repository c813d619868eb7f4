//! Status bar module
//!
//! Displays the bottom information bar: track and clip counts, selection, playhead and the last waveform render.

use egui::*;

use crate::structure::TimeRange;
use crate::utils::format_time;
use crate::waveform::RenderReport;

pub struct StatusBar<'a> {
    pub track_count: usize,
    pub clip_count: usize,
    pub selected_count: usize,
    pub range: Option<TimeRange>,
    pub playhead_position: f64,
    pub pps: f64,
    pub last_render: Option<&'a RenderReport>,
}

impl<'a> StatusBar<'a> {
    pub fn ui(&self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("Tracks: {}", self.track_count));
            ui.separator();
            ui.label(format!("Clips: {} ({} selected)", self.clip_count, self.selected_count));
            ui.separator();
            if let Some(range) = self.range {
                ui.label(format!(
                    "Range: {} - {}",
                    format_time(range.start),
                    format_time(range.end)
                ));
                ui.separator();
            }
            ui.label(format!("Position: {}", format_time(self.playhead_position)));
            ui.separator();
            ui.label(format!("{:.0} px/s", self.pps));

            if let Some(report) = self.last_render {
                ui.separator();
                let text = format!(
                    "Waveform: level {} · {:.1} ms",
                    report.detail_level,
                    report.elapsed.as_secs_f64() * 1000.0
                );
                if report.over_budget {
                    ui.colored_label(Color32::from_rgb(255, 120, 80), text);
                } else {
                    ui.label(text);
                }
            }
        });
    }
}

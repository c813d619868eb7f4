use egui::*;

use crate::grid::{GridLineKind, Tempo, TimeGrid};
use crate::utils::{format_bar_beat, format_time};

/// 时间尺：小节编号、时间标签和播放头。点击返回对应的时间
pub struct Ruler<'a> {
    grid: &'a TimeGrid,
    tempo: &'a Tempo,
    playhead: f64,
}

impl<'a> Ruler<'a> {
    pub fn new(grid: &'a TimeGrid, tempo: &'a Tempo, playhead: f64) -> Self {
        Self { grid, tempo, playhead }
    }

    pub fn ui(&self, ui: &mut Ui, rect: Rect) -> Option<f64> {
        let response = ui.allocate_rect(rect, Sense::click());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(40));

        let mut last_label_x = f32::NEG_INFINITY;
        for line in self.grid.grid_lines(self.tempo, rect.width() as f64) {
            let x = rect.left() + line.x as f32;
            let (height, color) = match line.kind {
                GridLineKind::Bar => (rect.height(), Color32::from_gray(160)),
                GridLineKind::Beat => (rect.height() * 0.4, Color32::from_gray(110)),
                GridLineKind::Subdivision => (rect.height() * 0.2, Color32::from_gray(80)),
            };
            painter.line_segment(
                [Pos2::new(x, rect.bottom() - height), Pos2::new(x, rect.bottom())],
                Stroke::new(1.0, color),
            );

            // 标签之间至少留 70 像素
            if line.kind == GridLineKind::Bar && x - last_label_x >= 70.0 {
                painter.text(
                    Pos2::new(x + 3.0, rect.top() + 2.0),
                    Align2::LEFT_TOP,
                    format_bar_beat(line.time, self.tempo),
                    FontId::proportional(11.0),
                    Color32::WHITE,
                );
                painter.text(
                    Pos2::new(x + 3.0, rect.top() + 15.0),
                    Align2::LEFT_TOP,
                    format_time(line.time),
                    FontId::monospace(9.0),
                    Color32::from_gray(150),
                );
                last_label_x = x;
            }
        }

        let playhead_x = rect.left() + self.grid.time_to_pixel(self.playhead) as f32;
        if playhead_x >= rect.left() && playhead_x <= rect.right() {
            painter.line_segment(
                [Pos2::new(playhead_x, rect.top()), Pos2::new(playhead_x, rect.bottom())],
                Stroke::new(2.0, Color32::from_rgb(255, 100, 100)),
            );
        }

        if response.clicked() {
            let pos = response.interact_pointer_pos()?;
            return Some(self.grid.pixel_to_time((pos.x - rect.left()) as f64).max(0.0));
        }
        None
    }
}

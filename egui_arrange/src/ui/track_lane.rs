use egui::*;

use crate::structure::Track;

pub enum HeaderAction {
    ToggleCollapsed,
}

pub struct TrackLaneHeader<'a> {
    track: &'a Track,
    automation_count: usize,
}

impl<'a> TrackLaneHeader<'a> {
    pub fn new(track: &'a Track, automation_count: usize) -> Self {
        Self {
            track,
            automation_count,
        }
    }

    /// `clip` 是表头列的可见区域，滚出去的部分不绘制也不响应
    pub fn ui(&self, ui: &mut Ui, rect: Rect, clip: Rect) -> Option<HeaderAction> {
        let visible = rect.intersect(clip);
        let painter = ui.painter_at(visible);
        painter.rect_filled(rect, 0.0, Color32::from_gray(36));
        painter.rect_filled(
            Rect::from_min_size(rect.min, Vec2::new(4.0, rect.height())),
            0.0,
            self.track.color,
        );
        painter.line_segment(
            [rect.left_bottom(), rect.right_bottom()],
            Stroke::new(1.0, Color32::from_gray(20)),
        );

        let toggle_rect = Rect::from_min_size(rect.min + Vec2::new(8.0, 4.0), Vec2::splat(16.0));
        let toggle = ui.interact(
            toggle_rect.intersect(visible),
            ui.id().with(("collapse", self.track.id)),
            Sense::click(),
        );
        painter.text(
            toggle_rect.center(),
            Align2::CENTER_CENTER,
            if self.track.collapsed { "▶" } else { "▼" },
            FontId::proportional(11.0),
            Color32::from_gray(200),
        );
        painter.text(
            rect.min + Vec2::new(28.0, 5.0),
            Align2::LEFT_TOP,
            &self.track.name,
            FontId::proportional(13.0),
            Color32::WHITE,
        );
        if self.automation_count > 0 && !self.track.collapsed {
            painter.text(
                rect.min + Vec2::new(28.0, 22.0),
                Align2::LEFT_TOP,
                format!("{} automation lane(s)", self.automation_count),
                FontId::proportional(10.0),
                Color32::from_gray(130),
            );
        }

        toggle.clicked().then_some(HeaderAction::ToggleCollapsed)
    }
}

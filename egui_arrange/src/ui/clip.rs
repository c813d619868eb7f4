use egui::*;

use crate::grid::TimeGrid;
use crate::layout::{fade_in_handle, fade_out_handle, gain_handle, ClipHitRegion, HANDLE_RADIUS};
use crate::structure::Clip;

/// 包络折线的采样点数
const ENVELOPE_STEPS: usize = 48;

pub struct ClipView<'a> {
    clip: &'a Clip,
    grid: &'a TimeGrid,
    max_gain: f64,
    hovered: Option<ClipHitRegion>,
}

impl<'a> ClipView<'a> {
    pub fn new(clip: &'a Clip, grid: &'a TimeGrid, max_gain: f64) -> Self {
        Self {
            clip,
            grid,
            max_gain,
            hovered: None,
        }
    }

    pub fn set_hovered(&mut self, region: Option<ClipHitRegion>) {
        self.hovered = region;
    }

    /// `waveform` 为波形纹理以及它覆盖的（可见部分）矩形
    pub fn paint(&self, painter: &Painter, rect: Rect, waveform: Option<(TextureId, Rect)>) {
        let clip = self.clip;
        painter.rect_filled(rect, 3.0, clip.color.gamma_multiply(0.35));

        if let Some((texture, area)) = waveform {
            painter.image(
                texture,
                area,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        } else if clip.buffer_id.is_some() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "offline",
                FontId::proportional(10.0),
                Color32::from_gray(150),
            );
        }

        self.paint_fades(painter, rect);
        self.paint_envelope(painter, rect);

        if rect.width() > 40.0 {
            painter.text(
                rect.left_top() + Vec2::new(6.0, 12.0),
                Align2::LEFT_TOP,
                &clip.name,
                FontId::proportional(11.0),
                Color32::WHITE,
            );
        }

        let (stroke_width, stroke_color) = if clip.selected {
            (2.0, Color32::from_rgb(255, 255, 100))
        } else {
            (1.0, Color32::from_gray(170))
        };
        painter.rect_stroke(rect, 3.0, Stroke::new(stroke_width, stroke_color));

        if clip.selected || self.hovered.is_some() {
            self.paint_handles(painter, rect);
        }
    }

    fn paint_fades(&self, painter: &Painter, rect: Rect) {
        let shade = Color32::from_black_alpha(90);
        let pps = self.grid.pps() as f32;
        let fade_in = (self.clip.fade_in as f32 * pps).min(rect.width());
        if fade_in > 0.5 {
            painter.add(Shape::convex_polygon(
                vec![rect.left_top(), rect.left_top() + vec2(fade_in, 0.0), rect.left_bottom()],
                shade,
                Stroke::NONE,
            ));
        }
        let fade_out = (self.clip.fade_out as f32 * pps).min(rect.width());
        if fade_out > 0.5 {
            painter.add(Shape::convex_polygon(
                vec![rect.right_top() - vec2(fade_out, 0.0), rect.right_top(), rect.right_bottom()],
                shade,
                Stroke::NONE,
            ));
        }
    }

    /// 增益 × 淡入淡出的包络线，顶部对应最大增益
    fn paint_envelope(&self, painter: &Painter, rect: Rect) {
        let clip = self.clip;
        let max_gain = self.max_gain.max(f64::EPSILON);
        let points: Vec<Pos2> = (0..=ENVELOPE_STEPS)
            .map(|i| {
                let f = i as f64 / ENVELOPE_STEPS as f64;
                // 末端取 end 之前一点，`contains` 不包含 end
                let t = clip.start + (clip.duration * f).min(clip.duration - 1e-9);
                let gain = (clip.envelope_gain_at(t) / max_gain).clamp(0.0, 1.0) as f32;
                pos2(rect.left() + rect.width() * f as f32, rect.bottom() - gain * rect.height())
            })
            .collect();
        painter.add(Shape::line(points, Stroke::new(1.0, Color32::from_rgb(255, 220, 120))));
    }

    fn paint_handles(&self, painter: &Painter, rect: Rect) {
        let active = |region: ClipHitRegion| self.hovered == Some(region);
        let color = |on: bool| if on { Color32::WHITE } else { Color32::from_gray(200) };

        for (pos, region) in [
            (fade_in_handle(self.clip, rect, self.grid), ClipHitRegion::FadeInHandle),
            (fade_out_handle(self.clip, rect, self.grid), ClipHitRegion::FadeOutHandle),
        ] {
            let square = Rect::from_center_size(pos, Vec2::splat(HANDLE_RADIUS * 1.6));
            painter.rect_filled(square, 1.0, color(active(region)));
        }
        painter.circle_filled(
            gain_handle(rect),
            HANDLE_RADIUS * 0.8,
            color(active(ClipHitRegion::GainHandle)),
        );
        if active(ClipHitRegion::GainHandle) {
            painter.text(
                gain_handle(rect) + vec2(HANDLE_RADIUS + 3.0, 0.0),
                Align2::LEFT_CENTER,
                format!("{:+.1} dB", gain_to_db(self.clip.gain)),
                FontId::monospace(10.0),
                Color32::WHITE,
            );
        }
    }
}

pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * gain.log10()
    }
}

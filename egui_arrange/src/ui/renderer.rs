use egui::*;

use crate::automation::{polyline, AutomationLane, LaneGeometry, AUTOMATION_MAX_VALUE};
use crate::grid::{GridLineKind, Tempo, TimeGrid};
use crate::structure::TimeRange;

/// 绘制虚线垂直线的工具函数
pub fn draw_dashed_vertical_line(painter: &Painter, x: f32, top: f32, bottom: f32, stroke: Stroke) {
    let dash_len = 2.0;
    let gap_len = 2.0;
    let mut y = top;
    while y < bottom {
        let next = (y + dash_len).min(bottom);
        painter.line_segment([Pos2::new(x, y), Pos2::new(x, next)], stroke);
        y += dash_len + gap_len;
    }
}

/// 绘制统一的时间网格线（用于时间尺和所有轨道）
///
/// `left` 是网格 x = 0 对应的屏幕坐标。
pub fn draw_grid(painter: &Painter, grid: &TimeGrid, tempo: &Tempo, left: f32, top: f32, bottom: f32, width: f32) {
    let bar_color = Color32::from_rgb(150, 150, 150); // 小节线：较亮的灰色
    let beat_color = Color32::from_rgb(95, 95, 95); // 拍线：中等灰色
    let sub_color = Color32::from_rgb(65, 65, 65); // 细分线：较暗的灰色

    for line in grid.grid_lines(tempo, width as f64) {
        let x = left + line.x as f32;
        match line.kind {
            GridLineKind::Bar => {
                painter.line_segment([Pos2::new(x, top), Pos2::new(x, bottom)], Stroke::new(1.0, bar_color));
            }
            GridLineKind::Beat => {
                painter.line_segment([Pos2::new(x, top), Pos2::new(x, bottom)], Stroke::new(1.0, beat_color));
            }
            GridLineKind::Subdivision => {
                draw_dashed_vertical_line(painter, x, top, bottom, Stroke::new(1.0, sub_color));
            }
        }
    }
}

/// 绘制时间范围选择
pub fn draw_range_selection(painter: &Painter, grid: &TimeGrid, range: &TimeRange, left: f32, top: f32, bottom: f32) {
    let x0 = left + grid.time_to_pixel(range.start) as f32;
    let x1 = left + grid.time_to_pixel(range.end) as f32;
    let rect = Rect::from_min_max(Pos2::new(x0, top), Pos2::new(x1.max(x0 + 1.0), bottom));
    painter.rect_filled(rect, 0.0, Color32::from_rgba_unmultiplied(100, 150, 255, 40));
    painter.rect_stroke(rect, 0.0, Stroke::new(1.0, Color32::from_rgb(100, 150, 255)));
}

pub fn draw_playhead(painter: &Painter, x: f32, top: f32, bottom: f32) {
    painter.line_segment(
        [Pos2::new(x, top), Pos2::new(x, bottom)],
        Stroke::new(2.0, Color32::from_rgba_unmultiplied(100, 200, 255, 180)),
    );
}

/// 绘制一条自动化通道：背景、单位增益参考线、折线和控制点
pub fn draw_automation_lane(
    painter: &Painter,
    grid: &TimeGrid,
    lane: &AutomationLane,
    rect: Rect,
    active_point: Option<usize>,
) {
    let geometry = LaneGeometry::new(rect.height());
    painter.rect_filled(rect, 0.0, Color32::from_gray(24));
    painter.line_segment(
        [Pos2::new(rect.left(), rect.bottom()), Pos2::new(rect.right(), rect.bottom())],
        Stroke::new(1.0, Color32::from_gray(45)),
    );

    let unity = rect.top() + geometry.value_to_y(1.0);
    draw_dashed_horizontal_line(painter, unity, rect.left(), rect.right(), Stroke::new(1.0, Color32::from_gray(60)));

    painter.text(
        rect.left_top() + Vec2::new(4.0, 2.0),
        Align2::LEFT_TOP,
        format!("{} / {}", lane.key.effect_id, lane.key.parameter),
        FontId::proportional(10.0),
        Color32::from_gray(140),
    );

    let offset = rect.left_top().to_vec2();
    let points: Vec<Pos2> = polyline(lane, grid, &geometry).into_iter().map(|p| p + offset).collect();
    let curve_color = Color32::from_rgb(255, 170, 60);
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        // 首点之前、末点之后保持水平
        let mut line = Vec::with_capacity(points.len() + 2);
        line.push(Pos2::new(rect.left(), first.y));
        line.extend(points.iter().copied());
        line.push(Pos2::new(rect.right(), last.y));
        painter.add(Shape::line(line, Stroke::new(1.5, curve_color)));
    }
    for (index, point) in points.iter().enumerate() {
        if !rect.expand(4.0).contains(*point) {
            continue;
        }
        let radius = if active_point == Some(index) { 5.0 } else { 3.5 };
        painter.circle_filled(*point, radius, curve_color);
        painter.circle_stroke(*point, radius, Stroke::new(1.0, Color32::from_gray(20)));
    }
    if let Some(index) = active_point {
        if let Some(p) = lane.points().get(index) {
            painter.text(
                rect.right_top() + Vec2::new(-4.0, 2.0),
                Align2::RIGHT_TOP,
                format!("{:.0}%", p.value / AUTOMATION_MAX_VALUE * 100.0),
                FontId::monospace(10.0),
                curve_color,
            );
        }
    }
}

fn draw_dashed_horizontal_line(painter: &Painter, y: f32, left: f32, right: f32, stroke: Stroke) {
    let mut x = left;
    while x < right {
        let next = (x + 4.0).min(right);
        painter.line_segment([Pos2::new(x, y), Pos2::new(next, y)], stroke);
        x += 8.0;
    }
}

//! 轨道布局与命中测试
//!
//! 坐标系：x 与 [`TimeGrid`] 的像素坐标一致，y 从第一条轨道顶部开始。
//! 每条轨道占一行剪辑区，未折叠时下面依次排列它的自动化通道。

use egui::{Pos2, Rect, Vec2};

use crate::arrangement::Arrangement;
use crate::automation::LaneGeometry;
use crate::editor::ArrangeOptions;
use crate::grid::TimeGrid;
use crate::structure::{AutomationLaneKey, Clip, ClipId, TrackId};
use crate::transform::DragKind;

/// 淡变手柄和增益手柄所在的顶部条带高度
pub const HANDLE_BAND_HEIGHT: f32 = 10.0;
pub const HANDLE_RADIUS: f32 = 5.0;

#[derive(Clone, Debug, PartialEq)]
pub struct AutomationRow {
    pub key: AutomationLaneKey,
    pub top: f32,
    pub height: f32,
}

impl AutomationRow {
    pub fn geometry(&self) -> LaneGeometry {
        LaneGeometry::new(self.height)
    }

    /// 把全局 y 转换为通道内 y
    pub fn local_y(&self, y: f32) -> f32 {
        y - self.top
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LaneRow {
    pub track_id: TrackId,
    pub top: f32,
    pub clip_height: f32,
    pub lanes: Vec<AutomationRow>,
}

impl LaneRow {
    pub fn height(&self) -> f32 {
        self.clip_height + self.lanes.iter().map(|l| l.height).sum::<f32>()
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaneLayout {
    rows: Vec<LaneRow>,
}

impl LaneLayout {
    pub fn build(arrangement: &Arrangement, options: &ArrangeOptions) -> Self {
        let mut rows = Vec::with_capacity(arrangement.tracks().len());
        let mut y = 0.0;
        for track in arrangement.tracks() {
            let clip_height = if track.collapsed {
                options.collapsed_track_height
            } else {
                track.height.max(options.collapsed_track_height)
            };
            let mut lanes = Vec::new();
            if !track.collapsed {
                let mut lane_y = y + clip_height;
                for key in arrangement.automation_keys_for(track.id) {
                    lanes.push(AutomationRow {
                        key,
                        top: lane_y,
                        height: options.automation_lane_height,
                    });
                    lane_y += options.automation_lane_height;
                }
            }
            let row = LaneRow {
                track_id: track.id,
                top: y,
                clip_height,
                lanes,
            };
            y = row.bottom();
            rows.push(row);
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[LaneRow] {
        &self.rows
    }

    pub fn row(&self, track_id: TrackId) -> Option<&LaneRow> {
        self.rows.iter().find(|r| r.track_id == track_id)
    }

    pub fn total_height(&self) -> f32 {
        self.rows.last().map_or(0.0, |r| r.bottom())
    }

    /// y 所在的轨道；超出上下边界时取第一条/最后一条
    pub fn track_at_y(&self, y: f32) -> Option<TrackId> {
        let first = self.rows.first()?;
        if y < first.top {
            return Some(first.track_id);
        }
        self.rows
            .iter()
            .find(|r| y < r.bottom())
            .or(self.rows.last())
            .map(|r| r.track_id)
    }

    pub fn automation_lane_at(&self, y: f32) -> Option<&AutomationRow> {
        self.rows
            .iter()
            .flat_map(|r| r.lanes.iter())
            .find(|l| y >= l.top && y < l.top + l.height)
    }

    pub fn automation_row(&self, key: &AutomationLaneKey) -> Option<&AutomationRow> {
        self.row(key.track_id)?.lanes.iter().find(|l| &l.key == key)
    }

    pub fn clip_rect(&self, clip: &Clip, grid: &TimeGrid, options: &ArrangeOptions) -> Option<Rect> {
        let row = self.row(clip.track_id)?;
        let x = grid.time_to_pixel(clip.start) as f32;
        let width = ((clip.duration * grid.pps()) as f32).max(options.min_clip_width);
        Some(Rect::from_min_size(
            Pos2::new(x, row.top + 1.0),
            Vec2::new(width, (row.clip_height - 2.0).max(1.0)),
        ))
    }

    /// 找到 `pos` 下最上层的剪辑及其命中区域
    pub fn hit_test(
        &self,
        arrangement: &Arrangement,
        grid: &TimeGrid,
        options: &ArrangeOptions,
        pos: Pos2,
    ) -> Option<(ClipId, ClipHitRegion)> {
        // 后绘制的剪辑在上层，逆序查找
        arrangement.clips().iter().rev().find_map(|clip| {
            let rect = self.clip_rect(clip, grid, options)?;
            if !rect.contains(pos) {
                return None;
            }
            Some((clip.id, hit_region(clip, rect, grid, options, pos)))
        })
    }
}

/// 剪辑上的命中区域
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipHitRegion {
    Body,
    LeftEdge,
    RightEdge,
    FadeInHandle,
    FadeOutHandle,
    GainHandle,
}

impl ClipHitRegion {
    pub fn drag_kind(self) -> DragKind {
        match self {
            ClipHitRegion::Body => DragKind::Move,
            ClipHitRegion::LeftEdge => DragKind::ResizeLeft,
            ClipHitRegion::RightEdge => DragKind::ResizeRight,
            ClipHitRegion::FadeInHandle => DragKind::FadeIn,
            ClipHitRegion::FadeOutHandle => DragKind::FadeOut,
            ClipHitRegion::GainHandle => DragKind::Gain,
        }
    }
}

/// 手柄位置（剪辑矩形坐标内）
pub fn fade_in_handle(clip: &Clip, rect: Rect, grid: &TimeGrid) -> Pos2 {
    let x = rect.left() + (clip.fade_in * grid.pps()) as f32;
    Pos2::new(x.min(rect.right()), rect.top() + HANDLE_RADIUS)
}

pub fn fade_out_handle(clip: &Clip, rect: Rect, grid: &TimeGrid) -> Pos2 {
    let x = rect.right() - (clip.fade_out * grid.pps()) as f32;
    Pos2::new(x.max(rect.left()), rect.top() + HANDLE_RADIUS)
}

pub fn gain_handle(rect: Rect) -> Pos2 {
    Pos2::new(rect.center().x, rect.top() + HANDLE_RADIUS)
}

fn hit_region(clip: &Clip, rect: Rect, grid: &TimeGrid, options: &ArrangeOptions, pos: Pos2) -> ClipHitRegion {
    if pos.y <= rect.top() + HANDLE_BAND_HEIGHT {
        let near = |handle: Pos2| (pos.x - handle.x).abs() <= HANDLE_RADIUS + 1.0;
        if near(fade_in_handle(clip, rect, grid)) {
            return ClipHitRegion::FadeInHandle;
        }
        if near(fade_out_handle(clip, rect, grid)) {
            return ClipHitRegion::FadeOutHandle;
        }
        if near(gain_handle(rect)) {
            return ClipHitRegion::GainHandle;
        }
    }
    let edge = options.edge_handle_width.min(rect.width() / 3.0);
    if pos.x <= rect.left() + edge {
        ClipHitRegion::LeftEdge
    } else if pos.x >= rect.right() - edge {
        ClipHitRegion::RightEdge
    } else {
        ClipHitRegion::Body
    }
}

//! 自动化曲线模块
//!
//! 每条曲线由 (轨道, 效果器, 参数) 唯一确定，点集合始终按时间排序，
//! 所以折线绘制不会出现自交。编辑器不做时间吸附，自动化在时间上是自由的。

use std::sync::Arc;

use egui::Pos2;

use crate::grid::TimeGrid;
use crate::structure::{AutomationLaneKey, AutomationPoint, PointId};

/// 自动化值的上限（单位增益之上留出余量）
pub const AUTOMATION_MAX_VALUE: f64 = 1.2;
/// 拖出通道上下边界超过该距离（像素）时删除该点
pub const DELETE_MARGIN: f32 = 20.0;
/// 通道上下内边距，点不会贴到边缘
pub const LANE_MARGIN: f32 = 6.0;
pub const POINT_HIT_RADIUS: f32 = 6.0;

#[derive(Clone, Debug, PartialEq)]
pub struct AutomationLane {
    pub key: AutomationLaneKey,
    points: Arc<Vec<AutomationPoint>>,
}

fn sort_points(points: &mut [AutomationPoint]) {
    points.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.id.cmp(&b.id)));
}

impl AutomationLane {
    pub fn new(key: AutomationLaneKey) -> Self {
        Self {
            key,
            points: Arc::new(Vec::new()),
        }
    }

    pub fn with_points(key: AutomationLaneKey, mut points: Vec<AutomationPoint>) -> Self {
        sort_points(&mut points);
        Self {
            key,
            points: Arc::new(points),
        }
    }

    pub fn points(&self) -> &[AutomationPoint] {
        &self.points
    }

    pub fn points_snapshot(&self) -> Arc<Vec<AutomationPoint>> {
        self.points.clone()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, id: PointId) -> Option<&AutomationPoint> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn index_of(&self, id: PointId) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    fn replace_with<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Vec<AutomationPoint>),
    {
        let mut next = self.points.as_ref().clone();
        f(&mut next);
        sort_points(&mut next);
        self.points = Arc::new(next);
    }

    /// 插入一个点，返回它在排序后的下标
    pub fn insert(&mut self, point: AutomationPoint) -> usize {
        let id = point.id;
        let point = AutomationPoint {
            time: point.time.max(0.0),
            value: point.value.clamp(0.0, AUTOMATION_MAX_VALUE),
            ..point
        };
        self.replace_with(|points| points.push(point));
        self.index_of(id).unwrap_or(0)
    }

    /// 更新一个点的时间和值，返回它的新下标
    pub fn update(&mut self, id: PointId, time: f64, value: f64) -> Option<usize> {
        self.index_of(id)?;
        self.replace_with(|points| {
            if let Some(point) = points.iter_mut().find(|p| p.id == id) {
                point.time = time.max(0.0);
                point.value = value.clamp(0.0, AUTOMATION_MAX_VALUE);
            }
        });
        self.index_of(id)
    }

    pub fn remove(&mut self, id: PointId) -> Option<AutomationPoint> {
        let removed = *self.point(id)?;
        self.replace_with(|points| points.retain(|p| p.id != id));
        Some(removed)
    }

    /// 曲线在 `time` 处的值：相邻点之间线性插值，首点之前和末点之后保持不变
    pub fn value_at(&self, time: f64) -> Option<f64> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if time <= first.time {
            return Some(first.value);
        }
        if time >= last.time {
            return Some(last.value);
        }
        let next = self.points.partition_point(|p| p.time <= time);
        let a = &self.points[next - 1];
        let b = &self.points[next];
        let span = b.time - a.time;
        if span <= f64::EPSILON {
            return Some(b.value);
        }
        let t = (time - a.time) / span;
        Some(a.value + (b.value - a.value) * t)
    }
}

/// 通道内 y 坐标与自动化值之间的映射
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneGeometry {
    pub height: f32,
    pub margin: f32,
    pub v_max: f64,
}

impl LaneGeometry {
    pub fn new(height: f32) -> Self {
        Self {
            height,
            margin: LANE_MARGIN,
            v_max: AUTOMATION_MAX_VALUE,
        }
    }

    fn usable(&self) -> f32 {
        (self.height - 2.0 * self.margin).max(1.0)
    }

    pub fn value_to_y(&self, value: f64) -> f32 {
        let norm = (value / self.v_max).clamp(0.0, 1.0) as f32;
        self.margin + (1.0 - norm) * self.usable()
    }

    pub fn y_to_value(&self, y: f32) -> f64 {
        let norm = 1.0 - (y - self.margin) / self.usable();
        (norm as f64 * self.v_max).clamp(0.0, self.v_max)
    }

    /// y 超出 `[-DELETE_MARGIN, height + DELETE_MARGIN]`
    pub fn is_outside(&self, y: f32) -> bool {
        y < -DELETE_MARGIN || y > self.height + DELETE_MARGIN
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PointDragResult {
    Moved { point_id: PointId, index: usize },
    Deleted(AutomationPoint),
    /// 没有正在拖拽的点（或已在本次手势中被删除）
    Inactive,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PointPress {
    Grabbed { index: usize },
    Added(AutomationPoint),
}

#[derive(Clone, Debug)]
struct PointDrag {
    key: AutomationLaneKey,
    point_id: PointId,
}

/// 自动化点的编辑状态机：空闲 -> 拖拽某个点 -> 空闲
#[derive(Clone, Debug, Default)]
pub struct AutomationLaneEditor {
    drag: Option<PointDrag>,
}

impl AutomationLaneEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn dragging_lane(&self) -> Option<&AutomationLaneKey> {
        self.drag.as_ref().map(|d| &d.key)
    }

    pub fn dragging_point(&self) -> Option<PointId> {
        self.drag.as_ref().map(|d| d.point_id)
    }

    /// 在空白处点击，按反向映射新增一个点。`pos` 为通道内坐标
    pub fn add_point(
        &self,
        lane: &mut AutomationLane,
        grid: &TimeGrid,
        geometry: &LaneGeometry,
        pos: Pos2,
    ) -> AutomationPoint {
        let time = grid.pixel_to_time(pos.x as f64).max(0.0);
        let value = geometry.y_to_value(pos.y);
        let point = AutomationPoint::new(time, value);
        let index = lane.insert(point);
        log::debug!("automation point added to {:?} at index {}", lane.key, index);
        lane.points()[index]
    }

    pub fn begin_point_drag(&mut self, lane: &AutomationLane, index: usize) -> bool {
        let Some(point) = lane.points().get(index) else {
            return false;
        };
        self.drag = Some(PointDrag {
            key: lane.key.clone(),
            point_id: point.id,
        });
        true
    }

    /// 拖拽中每次指针移动调用一次
    ///
    /// y 超出删除边界时删除该点并立即结束本次拖拽，之后的移动返回 `Inactive`。
    pub fn drag_point(
        &mut self,
        lane: &mut AutomationLane,
        grid: &TimeGrid,
        geometry: &LaneGeometry,
        pos: Pos2,
    ) -> PointDragResult {
        let Some(drag) = self.drag.as_ref() else {
            return PointDragResult::Inactive;
        };
        if drag.key != lane.key {
            return PointDragResult::Inactive;
        }
        let point_id = drag.point_id;

        if geometry.is_outside(pos.y) {
            self.drag = None;
            return match lane.remove(point_id) {
                Some(point) => {
                    log::debug!("automation point {:?} dragged out of lane, deleted", point_id);
                    PointDragResult::Deleted(point)
                }
                None => PointDragResult::Inactive,
            };
        }

        let time = grid.pixel_to_time(pos.x as f64).max(0.0);
        let value = geometry.y_to_value(pos.y);
        match lane.update(point_id, time, value) {
            Some(index) => PointDragResult::Moved { point_id, index },
            None => {
                self.drag = None;
                PointDragResult::Inactive
            }
        }
    }

    pub fn end_point_drag(&mut self) -> Option<PointId> {
        self.drag.take().map(|d| d.point_id)
    }

    /// 命中测试，返回距离最近且在半径内的点
    pub fn hit_point(
        &self,
        lane: &AutomationLane,
        grid: &TimeGrid,
        geometry: &LaneGeometry,
        pos: Pos2,
    ) -> Option<usize> {
        lane.points()
            .iter()
            .enumerate()
            .map(|(index, p)| {
                let x = grid.time_to_pixel(p.time) as f32;
                let y = geometry.value_to_y(p.value);
                (index, Pos2::new(x, y).distance(pos))
            })
            .filter(|(_, d)| *d <= POINT_HIT_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    /// 按下：命中已有点则开始拖拽，否则新增一个点
    pub fn press(
        &mut self,
        lane: &mut AutomationLane,
        grid: &TimeGrid,
        geometry: &LaneGeometry,
        pos: Pos2,
    ) -> PointPress {
        if let Some(index) = self.hit_point(lane, grid, geometry, pos) {
            self.begin_point_drag(lane, index);
            return PointPress::Grabbed { index };
        }
        PointPress::Added(self.add_point(lane, grid, geometry, pos))
    }
}

/// 通道内坐标下的折线顶点，按集合顺序（即时间顺序）
pub fn polyline(lane: &AutomationLane, grid: &TimeGrid, geometry: &LaneGeometry) -> Vec<Pos2> {
    lane.points()
        .iter()
        .map(|p| Pos2::new(grid.time_to_pixel(p.time) as f32, geometry.value_to_y(p.value)))
        .collect()
}

//! UI 模块
//!
//! 编排编辑器的主体。指针处理是与窗口系统无关的（`pointer_down` / `pointer_move` /
//! `pointer_up` / `cancel_gesture`，坐标为编辑区内坐标），`ui()` 只负责把 egui 的输入
//! 转换成这些调用并绘制结果。

mod clip;
mod renderer;
mod statusbar;
mod timeline;
mod toolbar;
mod track_lane;
mod waveform_cache;

pub use clip::gain_to_db;

use std::sync::Arc;

use egui::*;

use crate::arrangement::Arrangement;
use crate::asset::AssetProvider;
use crate::automation::{AutomationLaneEditor, PointDragResult, PointPress};
use crate::editor::{ArrangeCommand, ArrangeEvent, ArrangeOptions, PointerModifiers, TransportState};
use crate::grid::{Tempo, TimeGrid};
use crate::layout::{ClipHitRegion, LaneLayout};
use crate::snapshot::ArrangementSnapshot;
use crate::structure::{AutomationLaneKey, AutomationPoint, BufferId, Clip, ClipId, TimeRange, Track, TrackId};
use crate::transform::{ClipTransformEngine, DragContext, DragKind, DragOutcome};
use crate::waveform::{WaveformRenderer, WaveformRequest};

use self::clip::ClipView;
use self::statusbar::StatusBar;
use self::timeline::Ruler;
use self::toolbar::{Toolbar, ToolbarAction};
use self::track_lane::{HeaderAction, TrackLaneHeader};
use self::waveform_cache::WaveformCache;

const STATUS_BAR_HEIGHT: f32 = 20.0;

#[derive(Clone, Copy, Debug)]
struct RangeGesture {
    anchor_time: f64,
    anchor_y: f32,
}

pub struct ArrangeEditor {
    arrangement: Arrangement,
    grid: TimeGrid,
    tempo: Tempo,
    energy: f64,
    options: ArrangeOptions,
    transport: TransportState,
    assets: Option<Arc<dyn AssetProvider>>,
    layout: LaneLayout,

    // Interaction state
    transform: ClipTransformEngine,
    automation: AutomationLaneEditor,
    range_gesture: Option<RangeGesture>,
    range_selection: Option<TimeRange>,
    scroll_y: f32,
    content_rect: Option<Rect>,
    last_local: Option<Pos2>,

    // Undo/Redo
    undo_stack: Vec<Arrangement>,
    redo_stack: Vec<Arrangement>,
    gesture_snapshot: Option<Arrangement>,
    gesture_changed: bool,

    waveforms: WaveformCache,
    renderer: WaveformRenderer,

    // Events
    pending_events: Vec<ArrangeEvent>,
    event_listener: Option<Box<dyn FnMut(&ArrangeEvent)>>,
}

impl Default for ArrangeEditor {
    fn default() -> Self {
        Self::new(ArrangeOptions::default())
    }
}

impl ArrangeEditor {
    pub fn new(options: ArrangeOptions) -> Self {
        let renderer = WaveformRenderer::new(options.waveform.clone(), options.render_budget_ms);
        let mut editor = Self {
            arrangement: Arrangement::new(),
            grid: TimeGrid::default(),
            tempo: Tempo::default(),
            energy: 0.0,
            options,
            transport: TransportState::default(),
            assets: None,
            layout: LaneLayout::default(),
            transform: ClipTransformEngine::new(),
            automation: AutomationLaneEditor::new(),
            range_gesture: None,
            range_selection: None,
            scroll_y: 0.0,
            content_rect: None,
            last_local: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            gesture_snapshot: None,
            gesture_changed: false,
            waveforms: WaveformCache::default(),
            renderer,
            pending_events: Vec::new(),
            event_listener: None,
        };
        editor.grid.update_division(&editor.tempo, editor.energy);
        editor
    }

    pub fn set_event_listener(&mut self, listener: Box<dyn FnMut(&ArrangeEvent)>) {
        self.event_listener = Some(listener);
    }

    pub fn take_events(&mut self) -> Vec<ArrangeEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn set_assets(&mut self, assets: Arc<dyn AssetProvider>) {
        self.assets = Some(assets);
        self.waveforms = WaveformCache::default();
    }

    // ---- 数据 ----

    pub fn add_track(&mut self, track: Track) -> TrackId {
        let id = self.arrangement.add_track(track);
        self.refresh_layout();
        id
    }

    pub fn add_clip(&mut self, clip: Clip) -> ClipId {
        self.arrangement.add_clip(clip)
    }

    pub fn ensure_automation_lane(&mut self, key: AutomationLaneKey) {
        self.arrangement.ensure_automation_lane(key);
        self.refresh_layout();
    }

    pub fn set_arrangement(&mut self, arrangement: Arrangement) {
        self.cancel_gesture();
        self.arrangement = arrangement;
        self.range_selection = None;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.refresh_layout();
    }

    pub fn snapshot(&self) -> ArrangementSnapshot {
        ArrangementSnapshot::capture(&self.arrangement, &self.grid, &self.tempo)
    }

    pub fn load_snapshot(&mut self, snapshot: ArrangementSnapshot) {
        let (arrangement, grid, tempo) = snapshot.restore();
        self.grid = grid;
        self.tempo = tempo;
        self.grid.update_division(&self.tempo, self.energy);
        self.waveforms = WaveformCache::default();
        self.set_arrangement(arrangement);
        log::info!(
            "arrangement loaded: {} track(s), {} clip(s)",
            self.arrangement.tracks().len(),
            self.arrangement.clips().len()
        );
    }

    fn refresh_layout(&mut self) {
        self.layout = LaneLayout::build(&self.arrangement, &self.options);
    }

    pub fn zoom_by(&mut self, factor: f64, anchor_time: f64) {
        self.grid.zoom_by(factor, anchor_time);
        if self.grid.scroll_offset() < 0.0 {
            self.grid.set_scroll_offset(0.0);
        }
        self.grid.update_division(&self.tempo, self.energy);
    }

    pub fn set_scale(&mut self, pps: f64) {
        self.grid.set_scale(pps);
        self.grid.update_division(&self.tempo, self.energy);
    }

    pub fn set_options(&mut self, options: ArrangeOptions) {
        self.renderer = WaveformRenderer::new(options.waveform.clone(), options.render_budget_ms);
        self.options = options;
        self.refresh_layout();
    }

    // ---- 命令 ----

    pub fn execute_command(&mut self, command: ArrangeCommand) {
        match command {
            ArrangeCommand::CreateTrack { name } => {
                self.push_undo_snapshot();
                let mut track = Track::new(name);
                track.height = self.options.default_track_height;
                let track_id = self.add_track(track);
                self.emit_event(ArrangeEvent::TrackCreated { track_id });
            }
            ArrangeCommand::DeleteTrack { track_id } => {
                self.cancel_gesture();
                let before = self.arrangement.clone();
                if self.arrangement.remove_track(track_id).is_some() {
                    self.push_history(before);
                    self.refresh_layout();
                    self.emit_event(ArrangeEvent::TrackDeleted { track_id });
                }
            }
            ArrangeCommand::RenameTrack { track_id, new_name } => {
                if self.arrangement.track(track_id).is_some() {
                    self.push_undo_snapshot();
                }
                if let Some(track) = self.arrangement.track_mut(track_id) {
                    track.name = new_name;
                }
            }
            ArrangeCommand::SetTrackCollapsed { track_id, collapsed } => {
                if let Some(track) = self.arrangement.track_mut(track_id) {
                    track.collapsed = collapsed;
                }
                self.refresh_layout();
            }
            ArrangeCommand::CreateClip {
                track_id,
                buffer_id,
                start,
                duration,
            } => {
                self.create_clip(track_id, buffer_id, start, duration);
            }
            ArrangeCommand::DeleteClip { clip_id } => {
                self.delete_clips(vec![clip_id]);
            }
            ArrangeCommand::DeleteSelected => {
                if self.transform.is_dragging() {
                    self.cancel_gesture();
                }
                let ids = self.arrangement.selected_ids();
                self.delete_clips(ids);
            }
            ArrangeCommand::SplitClip { clip_id, time } => {
                let min = self.options.min_clip_duration;
                let before = self.arrangement.clone();
                if let Some(new_clip_id) = self.arrangement.split_clip(clip_id, time, min) {
                    self.push_history(before);
                    self.emit_event(ArrangeEvent::ClipSplit {
                        clip_id,
                        new_clip_id,
                        time,
                    });
                } else {
                    log::trace!("split at {:.3}s skipped for {:?}", time, clip_id);
                }
            }
            ArrangeCommand::AddAutomationPoint { key, time, value } => {
                self.push_undo_snapshot();
                let lane = self.arrangement.ensure_automation_lane(key.clone());
                let index = lane.insert(AutomationPoint::new(time, value));
                let point_id = lane.points()[index].id;
                self.refresh_layout();
                self.emit_event(ArrangeEvent::AutomationPointAdded { key, point_id });
            }
            ArrangeCommand::RemoveAutomationPoint { key, point_id } => {
                let before = self.arrangement.clone();
                let removed = self
                    .arrangement
                    .automation_lane_mut(&key)
                    .and_then(|lane| lane.remove(point_id));
                if removed.is_some() {
                    self.push_history(before);
                    self.emit_event(ArrangeEvent::AutomationPointRemoved { key, point_id });
                }
            }
            ArrangeCommand::SetTransport(transport) => {
                self.transport = transport;
            }
            ArrangeCommand::SetTempo { bpm, beats_per_bar } => {
                self.tempo = Tempo::new(bpm, beats_per_bar);
                self.grid.update_division(&self.tempo, self.energy);
                self.emit_event(ArrangeEvent::TempoChanged(self.tempo));
            }
            ArrangeCommand::SetEnergy(energy) => {
                self.energy = if energy.is_finite() { energy.clamp(0.0, 1.0) } else { 0.0 };
                self.grid.update_division(&self.tempo, self.energy);
            }
            ArrangeCommand::SetRipple(enabled) => {
                self.options.ripple = enabled;
            }
            ArrangeCommand::SetSnap { enabled, mode } => {
                self.options.snap_enabled = enabled;
                self.options.snap_mode = mode;
            }
            ArrangeCommand::SelectRange { start, end } => {
                self.arrangement.clear_selection();
                let range = TimeRange::new(start.max(0.0), end.max(0.0));
                self.range_selection = (!range.is_empty()).then_some(range);
                self.emit_event(ArrangeEvent::RangeSelectionChanged(self.range_selection));
            }
            ArrangeCommand::ClearSelection => {
                self.arrangement.clear_selection();
                self.range_selection = None;
                self.emit_event(ArrangeEvent::SelectionChanged(Vec::new()));
            }
            ArrangeCommand::SelectAll => {
                self.range_selection = None;
                self.arrangement.select_all();
                let ids = self.arrangement.selected_ids();
                self.emit_event(ArrangeEvent::SelectionChanged(ids));
            }
            ArrangeCommand::Undo => {
                self.undo();
            }
            ArrangeCommand::Redo => {
                self.redo();
            }
        }
    }

    fn create_clip(&mut self, track_id: TrackId, buffer_id: Option<BufferId>, start: f64, duration: f64) {
        let Some(track) = self.arrangement.track(track_id) else {
            log::warn!("cannot create clip: track {:?} does not exist", track_id);
            return;
        };
        let color = track.color;
        let duration = duration.max(self.options.min_clip_duration);
        let mut clip = match buffer_id {
            Some(buffer_id) => {
                let asset_length = self
                    .assets
                    .as_ref()
                    .and_then(|assets| assets.buffer(&buffer_id))
                    .map(|buffer| buffer.duration());
                let name = buffer_id.0.clone();
                let mut clip = Clip::new_audio(track_id, buffer_id, start, duration, name);
                if let Some(length) = asset_length {
                    clip.original_duration = length;
                    clip.duration = duration.min(length).max(self.options.min_clip_duration);
                }
                clip
            }
            None => Clip::new(track_id, start, duration, "Clip".to_string()),
        };
        clip.color = color;
        self.push_undo_snapshot();
        let clip_id = self.arrangement.add_clip(clip);
        self.emit_event(ArrangeEvent::ClipCreated { clip_id });
    }

    /// 一次删除多个剪辑，只记录一个撤销快照
    fn delete_clips(&mut self, clip_ids: Vec<ClipId>) {
        if self.transform.is_dragging() {
            self.cancel_gesture();
        }
        if !clip_ids.iter().any(|id| self.arrangement.clip(*id).is_some()) {
            return;
        }
        self.push_undo_snapshot();
        for clip_id in clip_ids {
            if let Some(clip) = self.arrangement.remove_clip(clip_id) {
                self.emit_event(ArrangeEvent::ClipDeleted(clip));
            }
        }
    }

    fn emit_event(&mut self, event: ArrangeEvent) {
        if let Some(ref mut listener) = self.event_listener {
            listener(&event);
        }
        self.pending_events.push(event);
    }

    // ---- 撤销 / 重做 ----

    fn push_undo_snapshot(&mut self) {
        let snapshot = self.arrangement.clone();
        self.push_history(snapshot);
    }

    fn push_history(&mut self, snapshot: Arrangement) {
        const MAX_HISTORY: usize = 64;
        self.undo_stack.push(snapshot);
        if self.undo_stack.len() > MAX_HISTORY {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// 手势结束：有改动时才把按下前的快照记入历史
    fn settle_gesture_history(&mut self, changed: bool) {
        let snapshot = self.gesture_snapshot.take();
        if std::mem::take(&mut self.gesture_changed) || changed {
            if let Some(snapshot) = snapshot {
                self.push_history(snapshot);
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.arrangement, previous);
        self.redo_stack.push(current);
        self.arrangement_replaced();
        true
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.arrangement, next);
        self.undo_stack.push(current);
        self.arrangement_replaced();
        true
    }

    fn arrangement_replaced(&mut self) {
        self.arrangement.clear_selection();
        self.range_selection = None;
        self.refresh_layout();
        log::debug!(
            "arrangement replaced from history ({} undo, {} redo)",
            self.undo_stack.len(),
            self.redo_stack.len()
        );
        self.emit_event(ArrangeEvent::ArrangementReplaced);
    }

    // ---- 指针 ----

    pub fn is_dragging(&self) -> bool {
        self.transform.is_dragging() || self.automation.is_dragging() || self.range_gesture.is_some()
    }

    /// 指针按下，`pos` 为编辑区内坐标（x 与时间网格一致，y 从第一条轨道顶部算起）
    pub fn pointer_down(&mut self, pos: Pos2, modifiers: PointerModifiers) {
        if self.is_dragging() {
            return;
        }
        self.refresh_layout();

        if let Some(row) = self.layout.automation_lane_at(pos.y).cloned() {
            let local = Pos2::new(pos.x, row.local_y(pos.y));
            let geometry = row.geometry();
            let before = self.arrangement.clone();
            let Some(lane) = self.arrangement.automation_lane_mut(&row.key) else {
                return;
            };
            match self.automation.press(lane, &self.grid, &geometry, local) {
                PointPress::Grabbed { .. } => {
                    self.gesture_snapshot = Some(before);
                    self.gesture_changed = false;
                }
                PointPress::Added(point) => {
                    self.push_history(before);
                    self.emit_event(ArrangeEvent::AutomationPointAdded {
                        key: row.key,
                        point_id: point.id,
                    });
                }
            }
            return;
        }

        if let Some((clip_id, region)) = self.layout.hit_test(&self.arrangement, &self.grid, &self.options, pos) {
            let kind = region.drag_kind();
            let before = self.arrangement.clone();
            let started = self.transform.begin_drag(
                &mut self.arrangement,
                kind,
                clip_id,
                pos,
                modifiers,
                &self.options,
            );
            if self.range_selection.take().is_some() {
                self.emit_event(ArrangeEvent::RangeSelectionChanged(None));
            }
            if started {
                self.gesture_snapshot = Some(before);
                self.gesture_changed = false;
                self.emit_event(ArrangeEvent::ClipSelected { clip_id });
            }
            let selected = self.arrangement.selected_ids();
            self.emit_event(ArrangeEvent::SelectionChanged(selected));
            return;
        }

        // 空白处：开始时间范围选择，范围选择与剪辑选择互斥
        if self.arrangement.has_selection() {
            self.arrangement.clear_selection();
            self.emit_event(ArrangeEvent::SelectionChanged(Vec::new()));
        }
        if self.range_selection.take().is_some() {
            self.emit_event(ArrangeEvent::RangeSelectionChanged(None));
        }
        self.range_gesture = Some(RangeGesture {
            anchor_time: self.grid.pixel_to_time(pos.x as f64).max(0.0),
            anchor_y: pos.y,
        });
    }

    pub fn pointer_move(&mut self, pos: Pos2, modifiers: PointerModifiers) {
        if self.transform.is_dragging() {
            let ctx = DragContext {
                grid: &self.grid,
                tempo: &self.tempo,
                layout: &self.layout,
                options: &self.options,
                assets: self.assets.as_deref(),
            };
            self.transform.drag_to(&mut self.arrangement, pos, modifiers, &ctx);
            return;
        }

        if let Some(key) = self.automation.dragging_lane().cloned() {
            let Some(row) = self.layout.automation_row(&key).cloned() else {
                self.automation.end_point_drag();
                return;
            };
            let local = Pos2::new(pos.x, row.local_y(pos.y));
            let geometry = row.geometry();
            let Some(lane) = self.arrangement.automation_lane_mut(&key) else {
                self.automation.end_point_drag();
                return;
            };
            match self.automation.drag_point(lane, &self.grid, &geometry, local) {
                PointDragResult::Moved { point_id, .. } => {
                    self.gesture_changed = true;
                    self.emit_event(ArrangeEvent::AutomationPointUpdated { key, point_id });
                }
                PointDragResult::Deleted(point) => {
                    // 拖出通道后本次拖拽已结束
                    self.settle_gesture_history(true);
                    self.emit_event(ArrangeEvent::AutomationPointRemoved {
                        key,
                        point_id: point.id,
                    });
                }
                PointDragResult::Inactive => {
                    if !self.automation.is_dragging() {
                        self.settle_gesture_history(false);
                    }
                }
            }
            return;
        }

        if let Some(gesture) = self.range_gesture {
            self.update_range(gesture, pos);
        }
    }

    /// 指针松开（包括在编辑区之外松开），提交当前手势
    pub fn pointer_up(&mut self, pos: Pos2, modifiers: PointerModifiers) {
        if self.transform.is_dragging() {
            let outcome = self.transform.end_drag(&self.arrangement);
            self.settle_gesture_history(outcome.as_ref().is_some_and(|o| !o.is_empty()));
            if let Some(outcome) = outcome {
                self.emit_drag_outcome(outcome);
            }
            return;
        }

        if self.automation.is_dragging() {
            self.automation.end_point_drag();
            self.settle_gesture_history(false);
            return;
        }

        if let Some(gesture) = self.range_gesture.take() {
            self.update_range(gesture, pos);
            let Some(range) = self.range_selection else {
                return;
            };
            if modifiers.shift {
                // Shift 松开：把范围转换为剪辑选择
                let (y0, y1) = (gesture.anchor_y.min(pos.y), gesture.anchor_y.max(pos.y));
                let tracks: Vec<TrackId> = self
                    .layout
                    .rows()
                    .iter()
                    .filter(|row| row.bottom() > y0 && row.top <= y1)
                    .map(|row| row.track_id)
                    .collect();
                let ids = self.arrangement.select_range(range, Some(&tracks));
                self.range_selection = None;
                self.emit_event(ArrangeEvent::SelectionChanged(ids));
            } else {
                self.emit_event(ArrangeEvent::RangeSelectionChanged(Some(range)));
            }
        }
    }

    fn update_range(&mut self, gesture: RangeGesture, pos: Pos2) {
        let time = self.grid.pixel_to_time(pos.x as f64).max(0.0);
        let range = TimeRange::new(gesture.anchor_time, time);
        self.range_selection = (!range.is_empty()).then_some(range);
    }

    /// 取消当前手势。剪辑拖拽恢复到按下前的状态
    pub fn cancel_gesture(&mut self) {
        if self.transform.cancel_drag(&mut self.arrangement) {
            self.emit_event(ArrangeEvent::DragCancelled);
        }
        self.automation.end_point_drag();
        // 剪辑拖拽已还原；控制点拖拽没有还原，已有的改动照常记入历史
        self.settle_gesture_history(false);
        self.last_local = None;
        if self.range_gesture.take().is_some() {
            self.range_selection = None;
        }
    }

    fn emit_drag_outcome(&mut self, outcome: DragOutcome) {
        let DragOutcome {
            kind,
            primary,
            before,
            after,
            duplication,
        } = outcome;
        if let Some(duplication) = duplication {
            self.emit_event(ArrangeEvent::ClipsDuplicated {
                originals: duplication.originals,
                clones: duplication.clones,
            });
        }
        if after.is_empty() {
            return;
        }
        if kind == DragKind::Move {
            self.emit_event(ArrangeEvent::ClipsMoved { before, after });
            return;
        }
        let pair = before
            .into_iter()
            .zip(after)
            .find(|(_, after)| after.id == primary);
        let Some((before, after)) = pair else {
            return;
        };
        let event = match kind {
            DragKind::ResizeLeft | DragKind::ResizeRight => ArrangeEvent::ClipResized { before, after },
            DragKind::FadeIn | DragKind::FadeOut => ArrangeEvent::FadeChanged { before, after },
            _ => ArrangeEvent::GainChanged { before, after },
        };
        self.emit_event(event);
    }

    // ---- 只读访问 ----

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    pub fn clip(&self, clip_id: ClipId) -> Option<&Clip> {
        self.arrangement.clip(clip_id)
    }

    pub fn tracks(&self) -> &[Track] {
        self.arrangement.tracks()
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn options(&self) -> &ArrangeOptions {
        &self.options
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn range_selection(&self) -> Option<TimeRange> {
        self.range_selection
    }

    pub fn layout(&self) -> &LaneLayout {
        &self.layout
    }

    /// 编辑区内坐标在上一次 `ui()` 时对应的屏幕坐标
    pub fn local_to_screen(&self, local: Pos2) -> Option<Pos2> {
        let content = self.content_rect?;
        Some(pos2(local.x + content.left(), local.y + content.top() - self.scroll_y))
    }

    /// 剪辑在编辑区内坐标下的矩形
    pub fn clip_rect(&self, clip_id: ClipId) -> Option<Rect> {
        let clip = self.arrangement.clip(clip_id)?;
        self.layout.clip_rect(clip, &self.grid, &self.options)
    }

    // ---- egui ----

    pub fn ui(&mut self, ui: &mut Ui) {
        self.grid.update_division(&self.tempo, self.energy);
        if self.transport.is_playing {
            ui.ctx().request_repaint();
        }

        let mut actions = Vec::new();
        Toolbar::new(&self.options, self.tempo, self.energy, self.grid.division)
            .history(self.can_undo(), self.can_redo())
            .ui(ui, &mut actions);
        for action in actions {
            self.apply_toolbar_action(action);
        }
        ui.separator();

        let full = ui.available_rect_before_wrap();
        let header_width = self.options.track_header_width;
        let ruler_bottom = full.top() + self.options.timeline_height;
        let body_bottom = (full.bottom() - STATUS_BAR_HEIGHT).max(ruler_bottom);
        let ruler_rect = Rect::from_min_max(pos2(full.left() + header_width, full.top()), pos2(full.right(), ruler_bottom));
        let header_rect = Rect::from_min_max(pos2(full.left(), ruler_bottom), pos2(full.left() + header_width, body_bottom));
        let content = Rect::from_min_max(pos2(full.left() + header_width, ruler_bottom), pos2(full.right(), body_bottom));
        let status_rect = Rect::from_min_max(pos2(full.left(), body_bottom), full.max);

        if let Some(position) = Ruler::new(&self.grid, &self.tempo, self.transport.position_seconds).ui(ui, ruler_rect) {
            self.emit_event(ArrangeEvent::SeekRequested { position });
        }

        self.content_rect = Some(content);
        self.handle_input(ui, content);
        self.paint_headers(ui, header_rect);
        self.paint_content(ui, content);

        let status = StatusBar {
            track_count: self.arrangement.tracks().len(),
            clip_count: self.arrangement.clips().len(),
            selected_count: self.arrangement.clips().iter().filter(|c| c.selected).count(),
            range: self.range_selection,
            playhead_position: self.transport.position_seconds,
            pps: self.grid.pps(),
            last_render: self.waveforms.last_report(),
        };
        ui.allocate_new_ui(UiBuilder::new().max_rect(status_rect), |ui| status.ui(ui));
        ui.advance_cursor_after_rect(full);
    }

    fn apply_toolbar_action(&mut self, action: ToolbarAction) {
        match action {
            ToolbarAction::Command(command) => self.execute_command(command),
            ToolbarAction::ZoomBy(factor) => {
                let anchor = self.transport.position_seconds;
                self.zoom_by(factor, anchor);
            }
            ToolbarAction::ToggleZeroCrossing(enabled) => self.options.zero_crossing_trim = enabled,
            ToolbarAction::SetWaveformMode(mode) => self.options.waveform.mode = mode,
        }
    }

    fn handle_input(&mut self, ui: &mut Ui, content: Rect) {
        let response = ui.interact(content, ui.id().with("arrange_content"), Sense::click_and_drag());
        let scroll_y = self.scroll_y;
        let to_local = |p: Pos2| pos2(p.x - content.left(), p.y - content.top() + scroll_y);

        let (pointer, pressed, released, primary_down, modifiers, scroll) = ui.input(|i| {
            (
                i.pointer.latest_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.primary_down(),
                i.modifiers,
                i.raw_scroll_delta,
            )
        });
        let mods = PointerModifiers::from(modifiers);

        if !ui.ctx().wants_keyboard_input() {
            self.handle_keys(ui);
        }

        if response.hovered() && scroll != Vec2::ZERO {
            if modifiers.command {
                if let Some(p) = pointer {
                    let anchor = self.grid.pixel_to_time(to_local(p).x as f64);
                    let factor = (1.0 + scroll.y as f64 * 0.0015).clamp(0.5, 2.0);
                    self.zoom_by(factor, anchor);
                }
            } else if modifiers.shift {
                let delta = if scroll.x != 0.0 { scroll.x } else { scroll.y };
                self.grid.set_scroll_offset((self.grid.scroll_offset() - delta as f64).max(0.0));
            } else {
                let max_scroll = (self.layout.total_height() - content.height()).max(0.0);
                self.scroll_y = (self.scroll_y - scroll.y).clamp(0.0, max_scroll);
                self.grid.set_scroll_offset((self.grid.scroll_offset() - scroll.x as f64).max(0.0));
            }
        }

        let local = pointer.map(to_local);
        if let (Some(pointer), Some(local)) = (pointer, local) {
            if pressed && content.contains(pointer) {
                self.pointer_down(local, mods);
                self.last_local = Some(local);
            } else if self.is_dragging() && self.last_local != Some(local) {
                // 只在指针真正移动时推进手势
                self.pointer_move(local, mods);
                self.last_local = Some(local);
            }
        }
        // 指针离开窗口时松开也要结束手势，提交在最后已知的位置
        if self.is_dragging() && (released || !primary_down) {
            match local.or(self.last_local) {
                Some(at) => self.pointer_up(at, mods),
                None => self.cancel_gesture(),
            }
            self.last_local = None;
        }

        let (Some(pointer), Some(local)) = (pointer, local) else {
            return;
        };

        if self.transform.is_dragging() {
            let icon = match self.transform.state().map(|s| s.kind) {
                Some(DragKind::Move) => CursorIcon::Grabbing,
                Some(DragKind::Gain) => CursorIcon::ResizeVertical,
                _ => CursorIcon::ResizeHorizontal,
            };
            ui.ctx().set_cursor_icon(icon);
        } else if content.contains(pointer) {
            if let Some((_, region)) = self.layout.hit_test(&self.arrangement, &self.grid, &self.options, local) {
                ui.ctx().set_cursor_icon(match region {
                    ClipHitRegion::Body => CursorIcon::Grab,
                    ClipHitRegion::GainHandle => CursorIcon::ResizeVertical,
                    _ => CursorIcon::ResizeHorizontal,
                });
            }
        }
    }

    fn handle_keys(&mut self, ui: &Ui) {
        let (escape, delete, select_all, split, undo, redo) = ui.input(|i| {
            let command = i.modifiers.command;
            (
                i.key_pressed(Key::Escape),
                i.key_pressed(Key::Delete) || i.key_pressed(Key::Backspace),
                command && i.key_pressed(Key::A),
                !command && i.key_pressed(Key::S),
                command && !i.modifiers.shift && i.key_pressed(Key::Z),
                command && ((i.modifiers.shift && i.key_pressed(Key::Z)) || i.key_pressed(Key::Y)),
            )
        });
        if escape {
            if self.is_dragging() {
                self.cancel_gesture();
            } else {
                self.execute_command(ArrangeCommand::ClearSelection);
            }
        }
        if self.is_dragging() {
            return;
        }
        if delete {
            self.execute_command(ArrangeCommand::DeleteSelected);
        }
        if select_all {
            self.execute_command(ArrangeCommand::SelectAll);
        }
        if undo {
            self.undo();
        } else if redo {
            self.redo();
        }
        if split {
            let time = self.transport.position_seconds;
            for clip_id in self.arrangement.selected_ids() {
                self.execute_command(ArrangeCommand::SplitClip { clip_id, time });
            }
        }
    }

    fn paint_headers(&mut self, ui: &mut Ui, header_rect: Rect) {
        ui.painter_at(header_rect).rect_filled(header_rect, 0.0, Color32::from_gray(32));
        let top = header_rect.top() - self.scroll_y;
        let mut toggles = Vec::new();
        for row in self.layout.rows() {
            let rect = Rect::from_min_size(
                pos2(header_rect.left(), top + row.top),
                vec2(header_rect.width(), row.height()),
            );
            if !rect.intersects(header_rect) {
                continue;
            }
            let Some(track) = self.arrangement.track(row.track_id) else {
                continue;
            };
            let lanes = self.arrangement.automation_keys_for(track.id).len();
            if let Some(HeaderAction::ToggleCollapsed) = TrackLaneHeader::new(track, lanes).ui(ui, rect, header_rect) {
                toggles.push((track.id, !track.collapsed));
            }
        }
        for (track_id, collapsed) in toggles {
            self.execute_command(ArrangeCommand::SetTrackCollapsed { track_id, collapsed });
        }
    }

    fn paint_content(&mut self, ui: &mut Ui, content: Rect) {
        let painter = ui.painter_at(content);
        painter.rect_filled(content, 0.0, Color32::from_gray(26));
        let top = content.top() - self.scroll_y;
        let left = content.left();

        for row in self.layout.rows() {
            let row_rect = Rect::from_min_size(pos2(left, top + row.top), vec2(content.width(), row.clip_height));
            if row_rect.intersects(content) {
                painter.rect_filled(row_rect, 0.0, Color32::from_gray(30));
                renderer::draw_grid(&painter, &self.grid, &self.tempo, left, row_rect.top(), row_rect.bottom(), content.width());
                painter.line_segment(
                    [row_rect.left_bottom(), row_rect.right_bottom()],
                    Stroke::new(1.0, Color32::from_gray(18)),
                );
            }
            for lane_row in &row.lanes {
                let lane_rect = Rect::from_min_size(pos2(left, top + lane_row.top), vec2(content.width(), lane_row.height));
                if !lane_rect.intersects(content) {
                    continue;
                }
                let Some(lane) = self.arrangement.automation_lane(&lane_row.key) else {
                    continue;
                };
                let active = if self.automation.dragging_lane() == Some(&lane_row.key) {
                    self.automation.dragging_point().and_then(|id| lane.index_of(id))
                } else {
                    None
                };
                renderer::draw_automation_lane(&painter, &self.grid, lane, lane_rect, active);
            }
        }

        let hovered = if self.transform.is_dragging() {
            None
        } else {
            ui.input(|i| i.pointer.hover_pos())
                .filter(|p| content.contains(*p))
                .and_then(|p| {
                    let local = pos2(p.x - left, p.y - content.top() + self.scroll_y);
                    self.layout.hit_test(&self.arrangement, &self.grid, &self.options, local)
                })
        };

        let pixels_per_point = ui.ctx().pixels_per_point();
        let pps = self.grid.pps();
        for clip in self.arrangement.clips() {
            let Some(local) = self.layout.clip_rect(clip, &self.grid, &self.options) else {
                continue;
            };
            let rect = local.translate(vec2(left, top));
            if !rect.intersects(content) {
                continue;
            }

            let visible = rect.intersect(content);
            let waveform = match (&clip.buffer_id, &self.assets) {
                (Some(buffer_id), Some(assets)) if visible.width() >= 1.0 && visible.height() >= 1.0 => {
                    let buffer = assets.buffer(buffer_id);
                    let track_color = self.arrangement.track(clip.track_id).map_or(clip.color, |t| t.color);
                    let ratio = clip.stretch_ratio();
                    // 只渲染可见的那一段
                    let mut request = WaveformRequest::for_clip(
                        clip,
                        pps,
                        self.options.waveform.mode,
                        track_color,
                        visible.size(),
                        pixels_per_point,
                    );
                    request.start_time += (visible.left() - rect.left()) as f64 / pps * ratio;
                    request.duration = visible.width() as f64 / pps * ratio;
                    let texture = self.waveforms.texture(ui.ctx(), clip.id, request, buffer.as_deref(), &self.renderer);
                    Some((texture, visible))
                }
                _ => None,
            };

            let mut view = ClipView::new(clip, &self.grid, self.options.max_gain);
            view.set_hovered(hovered.filter(|(id, _)| *id == clip.id).map(|(_, region)| region));
            view.paint(&painter, rect, waveform);
        }
        self.waveforms.retain(|id| self.arrangement.clip(id).is_some());

        let bottom = (top + self.layout.total_height()).min(content.bottom());
        if let Some(range) = self.range_selection {
            renderer::draw_range_selection(&painter, &self.grid, &range, left, content.top(), bottom);
        }
        let playhead_x = left + self.grid.time_to_pixel(self.transport.position_seconds) as f32;
        if playhead_x >= content.left() && playhead_x <= content.right() {
            renderer::draw_playhead(&painter, playhead_x, content.top(), content.bottom());
        }
    }
}

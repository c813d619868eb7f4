//! 剪辑变换引擎
//!
//! 交互编辑时剪辑几何的唯一修改者。状态机只有两个状态：空闲和拖拽中。
//! 拖拽开始时保存整套剪辑的快照，之后每次指针移动都从快照重新计算，
//! 结果整体替换到 [`Arrangement`] 中。某一帧的结果不合法时这一帧不做修改。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use egui::Pos2;

use crate::arrangement::Arrangement;
use crate::asset::AssetProvider;
use crate::editor::{ArrangeOptions, PointerModifiers, SnapMode};
use crate::grid::{Tempo, TimeGrid};
use crate::layout::LaneLayout;
use crate::structure::{Clip, ClipId, GroupId, TrackId};
use crate::zero_crossing::ZeroCrossingFinder;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragKind {
    Move,
    ResizeLeft,
    ResizeRight,
    FadeIn,
    FadeOut,
    Gain,
}

/// 一次拖拽手势的全部状态，只存在于按下和松开之间
#[derive(Clone, Debug)]
pub struct DragState {
    pub kind: DragKind,
    pub primary: ClipId,
    pub pointer_origin: Pos2,
    pub affected: Vec<ClipId>,
    /// 受影响剪辑在拖拽开始时的值
    pub originals: Vec<Clip>,
    pub ripple: bool,
    pub duplicate: bool,
    duplication: Option<Duplication>,
    pre_drag: Arc<Vec<Clip>>,
    base: Arc<Vec<Clip>>,
}

impl DragState {
    fn original(&self, id: ClipId) -> Option<&Clip> {
        self.originals.iter().find(|c| c.id == id)
    }

    pub fn has_duplicated(&self) -> bool {
        self.duplication.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Duplication {
    pub originals: Vec<ClipId>,
    pub clones: Vec<ClipId>,
}

/// 拖拽提交后的结果，`before`/`after` 只包含几何发生变化的剪辑
#[derive(Clone, Debug)]
pub struct DragOutcome {
    pub kind: DragKind,
    pub primary: ClipId,
    pub before: Vec<Clip>,
    pub after: Vec<Clip>,
    pub duplication: Option<Duplication>,
}

impl DragOutcome {
    pub fn is_empty(&self) -> bool {
        self.after.is_empty() && self.duplication.is_none()
    }
}

/// 每次指针移动时需要的只读上下文
pub struct DragContext<'a> {
    pub grid: &'a TimeGrid,
    pub tempo: &'a Tempo,
    pub layout: &'a LaneLayout,
    pub options: &'a ArrangeOptions,
    pub assets: Option<&'a dyn AssetProvider>,
}

impl<'a> DragContext<'a> {
    fn snap(&self, time: f64, reference: f64) -> f64 {
        if !self.options.snap_enabled {
            return time;
        }
        match self.options.snap_mode {
            SnapMode::Absolute => self.grid.snap(time, self.tempo),
            SnapMode::Relative => self.grid.snap_relative(time, reference, self.tempo),
        }
    }
}

#[derive(Debug, Default)]
pub struct ClipTransformEngine {
    state: Option<DragState>,
}

impl ClipTransformEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&DragState> {
        self.state.as_ref()
    }

    /// 指针按下。处理选择语义后进入拖拽状态
    ///
    /// 普通点击未选中的剪辑会让它成为唯一选中项；按住 command 点击切换选中状态，
    /// 切换为未选中时不开始拖拽（返回 `false`）。
    pub fn begin_drag(
        &mut self,
        arrangement: &mut Arrangement,
        kind: DragKind,
        clip_id: ClipId,
        pointer: Pos2,
        modifiers: PointerModifiers,
        options: &ArrangeOptions,
    ) -> bool {
        if self.state.is_some() {
            return false;
        }
        let Some(selected) = arrangement.clip(clip_id).map(|c| c.selected) else {
            return false;
        };

        if modifiers.command {
            if !arrangement.toggle_selected(clip_id) {
                return false;
            }
        } else if !selected {
            arrangement.select_only(clip_id);
        }

        let snapshot = arrangement.clips_snapshot();
        let affected = affected_clips(&snapshot, kind, clip_id);
        let originals: Vec<Clip> = snapshot
            .iter()
            .filter(|c| affected.contains(&c.id))
            .cloned()
            .collect();

        let state = DragState {
            kind,
            primary: clip_id,
            pointer_origin: pointer,
            affected,
            originals,
            ripple: options.ripple || modifiers.shift,
            duplicate: modifiers.alt && kind == DragKind::Move,
            duplication: None,
            pre_drag: snapshot.clone(),
            base: snapshot,
        };
        log::debug!(
            "drag begin: {:?} on {:?}, {} clip(s), ripple={}, duplicate={}",
            state.kind,
            state.primary,
            state.affected.len(),
            state.ripple,
            state.duplicate
        );
        self.state = Some(state);
        true
    }

    /// 指针移动。返回这一帧是否修改了剪辑集合
    pub fn drag_to(
        &mut self,
        arrangement: &mut Arrangement,
        pointer: Pos2,
        modifiers: PointerModifiers,
        ctx: &DragContext<'_>,
    ) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        if state.duplicate && state.duplication.is_none() {
            duplicate_selection(state);
        }

        let dx = (pointer.x - state.pointer_origin.x) as f64;
        let dy = (pointer.y - state.pointer_origin.y) as f64;
        let mut next = state.base.as_ref().clone();

        let applied = match state.kind {
            DragKind::Move => {
                let ripple = state.ripple || modifiers.shift;
                apply_move(state, &mut next, dx, pointer.y, ripple, ctx)
            }
            DragKind::ResizeLeft => apply_resize_left(state, &mut next, dx, ctx),
            DragKind::ResizeRight => apply_resize_right(state, &mut next, dx, ctx),
            DragKind::FadeIn | DragKind::FadeOut => apply_fade(state, &mut next, dx, ctx),
            DragKind::Gain => apply_gain(state, &mut next, dy, ctx),
        };

        if !applied {
            log::trace!("drag frame rejected for {:?}", state.primary);
            return false;
        }
        arrangement.replace_clips(Arc::new(next));
        true
    }

    /// 指针松开（无论在哪里松开），提交当前值
    pub fn end_drag(&mut self, arrangement: &Arrangement) -> Option<DragOutcome> {
        let state = self.state.take()?;
        let mut baseline: BTreeMap<ClipId, &Clip> =
            state.pre_drag.iter().map(|c| (c.id, c)).collect();
        if state.duplication.is_some() {
            for clone in &state.originals {
                baseline.insert(clone.id, clone);
            }
        }

        let mut before = Vec::new();
        let mut after = Vec::new();
        for clip in arrangement.clips() {
            if let Some(old) = baseline.get(&clip.id) {
                if geometry_changed(old, clip) {
                    before.push((*old).clone());
                    after.push(clip.clone());
                }
            }
        }
        log::debug!(
            "drag commit: {:?} on {:?}, {} clip(s) changed",
            state.kind,
            state.primary,
            after.len()
        );
        Some(DragOutcome {
            kind: state.kind,
            primary: state.primary,
            before,
            after,
            duplication: state.duplication,
        })
    }

    /// 取消拖拽，恢复拖拽前的整套剪辑（包括删除复制出来的剪辑）
    pub fn cancel_drag(&mut self, arrangement: &mut Arrangement) -> bool {
        let Some(state) = self.state.take() else {
            return false;
        };
        arrangement.replace_clips(state.pre_drag);
        log::debug!("drag cancelled: {:?} on {:?}", state.kind, state.primary);
        true
    }
}

fn geometry_changed(a: &Clip, b: &Clip) -> bool {
    a.track_id != b.track_id
        || a.start != b.start
        || a.duration != b.duration
        || a.source_start != b.source_start
        || a.fade_in != b.fade_in
        || a.fade_out != b.fade_out
        || a.gain != b.gain
}

/// 移动作用于整个选择（以及同组剪辑），其他类型只作用于主剪辑
fn affected_clips(clips: &[Clip], kind: DragKind, primary: ClipId) -> Vec<ClipId> {
    if kind != DragKind::Move {
        return vec![primary];
    }
    let groups: BTreeSet<_> = clips
        .iter()
        .filter(|c| c.selected || c.id == primary)
        .filter_map(|c| c.group_id)
        .collect();
    clips
        .iter()
        .filter(|c| {
            c.selected || c.id == primary || c.group_id.map_or(false, |g| groups.contains(&g))
        })
        .map(|c| c.id)
        .collect()
}

/// 每个手势只执行一次：复制受影响剪辑，原剪辑留在原位并取消选中，
/// 之后的计算全部作用于副本
fn duplicate_selection(state: &mut DragState) {
    let mut base = state.base.as_ref().clone();
    for clip in base.iter_mut() {
        if state.affected.contains(&clip.id) {
            clip.selected = false;
        }
    }

    // 副本组成新的组，之后拖拽副本不会带上原剪辑
    let mut groups: BTreeMap<GroupId, GroupId> = BTreeMap::new();
    let mut clones = Vec::with_capacity(state.originals.len());
    let mut primary = state.primary;
    for original in &state.originals {
        let mut clone = original.clone();
        clone.id = ClipId::next();
        clone.selected = true;
        clone.group_id = original
            .group_id
            .map(|group| *groups.entry(group).or_insert_with(GroupId::next));
        if original.id == state.primary {
            primary = clone.id;
        }
        clones.push(clone);
    }
    base.extend(clones.iter().cloned());

    let duplication = Duplication {
        originals: state.originals.iter().map(|c| c.id).collect(),
        clones: clones.iter().map(|c| c.id).collect(),
    };
    log::debug!("duplicated {} clip(s) on drag", clones.len());

    state.affected = duplication.clones.clone();
    state.primary = primary;
    state.originals = clones;
    state.base = Arc::new(base);
    state.duplication = Some(duplication);
}

fn apply_move(
    state: &DragState,
    clips: &mut [Clip],
    dx: f64,
    pointer_y: f32,
    ripple: bool,
    ctx: &DragContext<'_>,
) -> bool {
    let Some(primary) = state.original(state.primary) else {
        return false;
    };
    let raw = primary.start + ctx.grid.pixels_to_seconds(dx);
    let snapped = ctx.snap(raw, primary.start).max(0.0);
    let delta = snapped - primary.start;
    let target_track = ctx.layout.track_at_y(pointer_y).unwrap_or(primary.track_id);

    let mut landing: BTreeMap<TrackId, f64> = BTreeMap::new();
    for clip in clips.iter_mut() {
        let Some(original) = state.original(clip.id) else {
            continue;
        };
        clip.start = (original.start + delta).max(0.0);
        clip.track_id = if clip.id == state.primary {
            target_track
        } else {
            original.track_id
        };
        let boundary = landing.entry(clip.track_id).or_insert(f64::MIN);
        *boundary = boundary.max(clip.end());
    }

    if ripple && delta != 0.0 {
        for clip in clips.iter_mut() {
            if state.affected.contains(&clip.id) {
                continue;
            }
            let Some(boundary) = landing.get(&clip.track_id) else {
                continue;
            };
            if clip.start >= *boundary {
                clip.start = (clip.start + delta).max(0.0);
            }
        }
    }
    true
}

fn apply_resize_left(state: &DragState, clips: &mut [Clip], dx: f64, ctx: &DragContext<'_>) -> bool {
    let Some(original) = state.original(state.primary) else {
        return false;
    };
    let ratio = original.stretch_ratio();
    let raw = original.start + ctx.grid.pixels_to_seconds(dx);
    let mut new_start = ctx.snap(raw, original.start);

    if ctx.options.zero_crossing_trim {
        if let Some(aligned) = zero_crossing_start(original, new_start, ctx) {
            new_start = aligned;
        }
    }

    let delta = new_start - original.start;
    let duration = original.end() - new_start;
    let source_start = original.source_start + delta * ratio;
    if new_start < 0.0 || duration <= ctx.options.min_clip_duration || source_start < 0.0 {
        return false;
    }

    let Some(clip) = clips.iter_mut().find(|c| c.id == state.primary) else {
        return false;
    };
    clip.start = new_start;
    clip.duration = duration;
    clip.source_start = source_start;
    clip.clamp_fades();
    true
}

/// 把新的开始时间对齐到源音频中最近的过零点；没有资源或找不到时返回 `None`
fn zero_crossing_start(clip: &Clip, new_start: f64, ctx: &DragContext<'_>) -> Option<f64> {
    let buffer = ctx.assets?.buffer(clip.buffer_id.as_ref()?)?;
    let ratio = clip.stretch_ratio();
    let source_time = clip.source_start + (new_start - clip.start) * ratio;
    let found = ZeroCrossingFinder::new(ctx.options.zero_crossing_window).find(&buffer, source_time)?;
    Some(clip.start + (found - clip.source_start) / ratio)
}

fn apply_resize_right(state: &DragState, clips: &mut [Clip], dx: f64, ctx: &DragContext<'_>) -> bool {
    let Some(original) = state.original(state.primary) else {
        return false;
    };
    let min = ctx.options.min_clip_duration;
    let raw_end = original.end() + ctx.grid.pixels_to_seconds(dx);
    let new_end = ctx.snap(raw_end, original.end());
    let mut duration = (new_end - original.start).max(min);

    // 引用音频资源的剪辑不能超出资源末尾
    if original.buffer_id.is_some() {
        let available = (original.original_duration - original.source_start) / original.stretch_ratio();
        if available >= min {
            duration = duration.min(available);
        }
    }

    let Some(clip) = clips.iter_mut().find(|c| c.id == state.primary) else {
        return false;
    };
    clip.duration = duration;
    clip.clamp_fades();
    true
}

fn apply_fade(state: &DragState, clips: &mut [Clip], dx: f64, ctx: &DragContext<'_>) -> bool {
    let Some(original) = state.original(state.primary) else {
        return false;
    };
    let seconds = ctx.grid.pixels_to_seconds(dx);
    let max_fade = original.max_fade();
    let Some(clip) = clips.iter_mut().find(|c| c.id == state.primary) else {
        return false;
    };
    match state.kind {
        DragKind::FadeIn => clip.fade_in = (original.fade_in + seconds).clamp(0.0, max_fade),
        // 淡出手柄在右侧，向左拖是加长
        _ => clip.fade_out = (original.fade_out - seconds).clamp(0.0, max_fade),
    }
    true
}

fn apply_gain(state: &DragState, clips: &mut [Clip], dy: f64, ctx: &DragContext<'_>) -> bool {
    let Some(original) = state.original(state.primary) else {
        return false;
    };
    let Some(clip) = clips.iter_mut().find(|c| c.id == state.primary) else {
        return false;
    };
    // 向上拖（dy < 0）增益变大
    clip.gain = (original.gain - dy * ctx.options.gain_sensitivity).clamp(0.0, ctx.options.max_gain);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetLibrary, AudioBuffer};
    use crate::structure::{BufferId, GroupId, Track};

    struct Fixture {
        arr: Arrangement,
        grid: TimeGrid,
        tempo: Tempo,
        options: ArrangeOptions,
        tracks: Vec<TrackId>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut arr = Arrangement::new();
            let tracks = vec![
                arr.add_track(Track::new("One".into())),
                arr.add_track(Track::new("Two".into())),
            ];
            Self {
                arr,
                grid: TimeGrid::new(100.0),
                tempo: Tempo::new(120.0, 4),
                options: ArrangeOptions::default(),
                tracks,
            }
        }

        fn clip(&mut self, track: usize, start: f64, duration: f64) -> ClipId {
            self.arr.add_clip(Clip::new(self.tracks[track], start, duration, "c".into()))
        }

        fn get(&self, id: ClipId) -> Clip {
            self.arr.clip(id).cloned().unwrap_or_else(|| panic!("missing clip {:?}", id))
        }

        fn drag(
            &mut self,
            kind: DragKind,
            id: ClipId,
            from: Pos2,
            to: Pos2,
            modifiers: PointerModifiers,
            assets: Option<&dyn AssetProvider>,
        ) -> Option<DragOutcome> {
            let mut engine = ClipTransformEngine::new();
            if !engine.begin_drag(&mut self.arr, kind, id, from, modifiers, &self.options) {
                return None;
            }
            let layout = LaneLayout::build(&self.arr, &self.options);
            let ctx = DragContext {
                grid: &self.grid,
                tempo: &self.tempo,
                layout: &layout,
                options: &self.options,
                assets,
            };
            engine.drag_to(&mut self.arr, to, modifiers, &ctx);
            engine.end_drag(&self.arr)
        }
    }

    const Y: f32 = 40.0;

    #[test]
    fn ripple_shifts_clips_after_the_moved_group() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 2.0);
        let b = f.clip(0, 5.0, 2.0);
        f.options.ripple = true;
        f.drag(DragKind::Move, a, Pos2::new(50.0, Y), Pos2::new(150.0, Y), PointerModifiers::NONE, None);
        assert!((f.get(a).start - 1.0).abs() < 1e-9);
        assert!((f.get(b).start - 6.0).abs() < 1e-9);
    }

    #[test]
    fn move_without_ripple_leaves_neighbours() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 2.0);
        let b = f.clip(0, 5.0, 2.0);
        let outcome =
            f.drag(DragKind::Move, a, Pos2::new(50.0, Y), Pos2::new(150.0, Y), PointerModifiers::NONE, None);
        assert!((f.get(a).start - 1.0).abs() < 1e-9);
        assert_eq!(f.get(b).start, 5.0);
        assert_eq!(outcome.map(|o| o.after.len()), Some(1));
    }

    #[test]
    fn shift_enables_ripple_for_one_gesture() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 2.0);
        let b = f.clip(0, 5.0, 2.0);
        let other_track = f.clip(1, 5.0, 2.0);
        f.drag(DragKind::Move, a, Pos2::new(50.0, Y), Pos2::new(150.0, Y), PointerModifiers::shift(), None);
        assert!((f.get(b).start - 6.0).abs() < 1e-9);
        assert_eq!(f.get(other_track).start, 5.0);
    }

    #[test]
    fn move_snaps_primary_and_applies_delta_to_selection() {
        let mut f = Fixture::new();
        let a = f.clip(0, 1.0, 1.0);
        let b = f.clip(1, 3.03, 1.0);
        f.arr.select_only(a);
        f.arr.toggle_selected(b);
        // 0.37 秒位移，吸附到 0.125 的网格 -> 1.375
        f.drag(DragKind::Move, a, Pos2::new(150.0, Y), Pos2::new(187.0, 200.0), PointerModifiers::NONE, None);
        assert!((f.get(a).start - 1.375).abs() < 1e-9);
        assert!((f.get(b).start - 3.405).abs() < 1e-9);
        // 只有主剪辑换轨
        assert_eq!(f.get(a).track_id, f.tracks[1]);
        assert_eq!(f.get(b).track_id, f.tracks[1]);
    }

    #[test]
    fn move_clamps_start_at_zero() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.5, 1.0);
        f.options.snap_enabled = false;
        f.drag(DragKind::Move, a, Pos2::new(100.0, Y), Pos2::new(-400.0, Y), PointerModifiers::NONE, None);
        assert_eq!(f.get(a).start, 0.0);
    }

    #[test]
    fn grouped_clips_move_together() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 1.0);
        let b = f.clip(1, 2.0, 1.0);
        f.arr.update_clips(|clips| clips.iter_mut().for_each(|c| c.group_id = Some(GroupId(7))));
        f.drag(DragKind::Move, a, Pos2::new(50.0, Y), Pos2::new(100.0, Y), PointerModifiers::NONE, None);
        assert!((f.get(b).start - 2.5).abs() < 1e-9);
    }

    #[test]
    fn duplicated_group_moves_without_originals() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 1.0);
        let b = f.clip(0, 1.5, 0.5);
        f.arr.update_clips(|clips| clips.iter_mut().for_each(|c| c.group_id = Some(GroupId(900))));
        let outcome = f.drag(DragKind::Move, a, Pos2::new(50.0, Y), Pos2::new(250.0, Y), PointerModifiers::alt(), None);
        let Some(duplication) = outcome.and_then(|o| o.duplication) else {
            panic!("no duplication recorded");
        };

        let clone_groups: BTreeSet<_> = duplication.clones.iter().map(|id| f.get(*id).group_id).collect();
        assert_eq!(clone_groups.len(), 1);
        assert!(!clone_groups.contains(&Some(GroupId(900))));
        assert!(!clone_groups.contains(&None));

        // 只拖副本，原剪辑留在原位
        let clone = duplication.clones[0];
        f.arr.select_only(clone);
        let x = f.get(clone).start as f32 * 100.0 + 20.0;
        f.drag(DragKind::Move, clone, Pos2::new(x, Y), Pos2::new(x + 100.0, Y), PointerModifiers::NONE, None);
        assert_eq!(f.get(a).start, 0.0);
        assert_eq!(f.get(b).start, 1.5);
        assert!(duplication.clones.iter().all(|id| f.get(*id).start >= 3.0));
    }

    #[test]
    fn duplicate_clones_selection_once() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 1.0);
        let b = f.clip(0, 2.0, 1.0);
        f.arr.select_all();

        let mut engine = ClipTransformEngine::new();
        assert!(engine.begin_drag(&mut f.arr, DragKind::Move, a, Pos2::new(50.0, Y), PointerModifiers::alt(), &f.options));
        let layout = LaneLayout::build(&f.arr, &f.options);
        let ctx = DragContext {
            grid: &f.grid,
            tempo: &f.tempo,
            layout: &layout,
            options: &f.options,
            assets: None,
        };
        for x in [100.0, 200.0, 450.0] {
            engine.drag_to(&mut f.arr, Pos2::new(x, Y), PointerModifiers::alt(), &ctx);
        }
        let outcome = engine.end_drag(&f.arr);

        assert_eq!(f.arr.clips().len(), 4);
        let duplication = outcome.and_then(|o| o.duplication);
        let Some(duplication) = duplication else {
            panic!("no duplication recorded");
        };
        assert_eq!(duplication.clones.len(), 2);
        assert!(!duplication.clones.contains(&a) && !duplication.clones.contains(&b));
        assert_ne!(duplication.clones[0], duplication.clones[1]);

        assert_eq!(f.get(a).start, 0.0);
        assert_eq!(f.get(b).start, 2.0);
        assert!(!f.get(a).selected && !f.get(b).selected);
        let starts: Vec<f64> = duplication.clones.iter().map(|id| f.get(*id).start).collect();
        assert_eq!(starts, vec![4.0, 6.0]);
        assert!(duplication.clones.iter().all(|id| f.get(*id).selected));
    }

    #[test]
    fn cancel_restores_pre_drag_state_and_removes_clones() {
        let mut f = Fixture::new();
        let a = f.clip(0, 1.0, 1.0);
        let before = f.arr.clips().to_vec();
        let mut engine = ClipTransformEngine::new();
        engine.begin_drag(&mut f.arr, DragKind::Move, a, Pos2::new(150.0, Y), PointerModifiers::alt(), &f.options);
        let layout = LaneLayout::build(&f.arr, &f.options);
        let ctx = DragContext {
            grid: &f.grid,
            tempo: &f.tempo,
            layout: &layout,
            options: &f.options,
            assets: None,
        };
        engine.drag_to(&mut f.arr, Pos2::new(400.0, Y), PointerModifiers::alt(), &ctx);
        assert_eq!(f.arr.clips().len(), 2);

        assert!(engine.cancel_drag(&mut f.arr));
        assert!(!engine.is_dragging());
        let mut expected = before;
        expected[0].selected = true;
        assert_eq!(f.arr.clips(), expected.as_slice());
    }

    #[test]
    fn fade_in_clamps_to_half_duration() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 1.5);
        f.drag(DragKind::FadeIn, a, Pos2::new(0.0, 5.0), Pos2::new(20.0, 5.0), PointerModifiers::NONE, None);
        assert!((f.get(a).fade_in - 0.2).abs() < 1e-9);

        let b = f.clip(1, 0.0, 1.5);
        f.drag(DragKind::FadeIn, b, Pos2::new(0.0, 85.0), Pos2::new(100.0, 85.0), PointerModifiers::NONE, None);
        assert!((f.get(b).fade_in - 0.75).abs() < 1e-9);
    }

    #[test]
    fn fade_out_grows_when_dragged_left() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 2.0);
        f.drag(DragKind::FadeOut, a, Pos2::new(200.0, 5.0), Pos2::new(170.0, 5.0), PointerModifiers::NONE, None);
        assert!((f.get(a).fade_out - 0.3).abs() < 1e-9);
    }

    #[test]
    fn gain_follows_vertical_drag_and_clamps() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 2.0);
        f.drag(DragKind::Gain, a, Pos2::new(100.0, 40.0), Pos2::new(100.0, -10.0), PointerModifiers::NONE, None);
        assert!((f.get(a).gain - 1.5).abs() < 1e-9);

        let b = f.clip(1, 0.0, 2.0);
        f.drag(DragKind::Gain, b, Pos2::new(100.0, 120.0), Pos2::new(100.0, -80.0), PointerModifiers::NONE, None);
        assert!((f.get(b).gain - 2.0).abs() < 1e-9);
    }

    #[test]
    fn resize_left_moves_source_start_with_trim() {
        let mut f = Fixture::new();
        let mut clip = Clip::new_audio(f.tracks[0], BufferId::from("a"), 2.0, 2.0, "a".into());
        clip.source_start = 1.0;
        clip.original_duration = 8.0;
        let a = f.arr.add_clip(clip);
        f.drag(DragKind::ResizeLeft, a, Pos2::new(200.0, Y), Pos2::new(250.0, Y), PointerModifiers::NONE, None);
        let clip = f.get(a);
        assert!((clip.start - 2.5).abs() < 1e-9);
        assert!((clip.duration - 1.5).abs() < 1e-9);
        assert!((clip.source_start - 1.5).abs() < 1e-9);
    }

    #[test]
    fn resize_left_rejects_negative_source_start() {
        let mut f = Fixture::new();
        let a = f.clip(0, 2.0, 2.0);
        let before = f.get(a);
        let outcome =
            f.drag(DragKind::ResizeLeft, a, Pos2::new(200.0, Y), Pos2::new(100.0, Y), PointerModifiers::NONE, None);
        assert_eq!(f.get(a).start, before.start);
        assert_eq!(f.get(a).source_start, 0.0);
        assert!(outcome.map_or(false, |o| o.is_empty()));
    }

    #[test]
    fn resize_right_respects_floor_and_asset_end() {
        let mut f = Fixture::new();
        let a = f.clip(0, 1.0, 1.0);
        f.drag(DragKind::ResizeRight, a, Pos2::new(200.0, Y), Pos2::new(0.0, Y), PointerModifiers::NONE, None);
        assert!((f.get(a).duration - f.options.min_clip_duration).abs() < 1e-9);

        let mut clip = Clip::new_audio(f.tracks[1], BufferId::from("b"), 0.0, 1.0, "b".into());
        clip.original_duration = 3.0;
        clip.source_start = 0.5;
        let b = f.arr.add_clip(clip);
        f.drag(DragKind::ResizeRight, b, Pos2::new(100.0, 120.0), Pos2::new(900.0, 120.0), PointerModifiers::NONE, None);
        assert!((f.get(b).duration - 2.5).abs() < 1e-9);
    }

    #[test]
    fn resize_left_can_align_to_zero_crossing() {
        let mut f = Fixture::new();
        f.options.snap_enabled = false;
        f.options.zero_crossing_trim = true;
        let sr = 1_000;
        // 资源内 1.0 秒处有一次过零
        let samples: Vec<f32> = (0..4_000).map(|i| if i < 1_000 { 0.5 } else { -0.5 }).collect();
        let mut library = AssetLibrary::new();
        library.insert("z", AudioBuffer::mono(sr, samples));

        let mut clip = Clip::new_audio(f.tracks[0], BufferId::from("z"), 0.0, 3.0, "z".into());
        clip.original_duration = 4.0;
        let a = f.arr.add_clip(clip);
        f.drag(DragKind::ResizeLeft, a, Pos2::new(0.0, Y), Pos2::new(99.7, Y), PointerModifiers::NONE, Some(&library as &dyn AssetProvider));
        let clip = f.get(a);
        assert!((clip.start - 1.0).abs() < 1e-9, "start={}", clip.start);
        assert!((clip.source_start - 1.0).abs() < 1e-9);
    }

    #[test]
    fn random_resizes_keep_duration_floor_and_non_negative_start() {
        let mut rng = fastrand::Rng::with_seed(2024);
        let mut f = Fixture::new();
        f.options.snap_enabled = false;
        let ids: Vec<ClipId> = (0..4).map(|i| f.clip(0, i as f64 * 3.0, 1.0 + i as f64 * 0.5)).collect();

        for _ in 0..400 {
            let id = ids[rng.usize(0..ids.len())];
            let kind = if rng.bool() { DragKind::ResizeLeft } else { DragKind::ResizeRight };
            let clip = f.get(id);
            let x0 = f.grid.time_to_pixel(if kind == DragKind::ResizeLeft { clip.start } else { clip.end() }) as f32;
            let x1 = x0 + (rng.f32() - 0.5) * 800.0;
            f.drag(kind, id, Pos2::new(x0, Y), Pos2::new(x1, Y), PointerModifiers::NONE, None);
        }
        for id in ids {
            let clip = f.get(id);
            assert!(clip.duration >= f.options.min_clip_duration - 1e-9, "{:?}", clip);
            assert!(clip.start >= 0.0);
            assert!(clip.source_start >= 0.0);
            assert!(clip.fade_in + clip.fade_out <= clip.duration + 1e-9);
        }
    }

    #[test]
    fn command_click_on_selected_clip_deselects_without_drag() {
        let mut f = Fixture::new();
        let a = f.clip(0, 0.0, 1.0);
        f.arr.select_only(a);
        let mut engine = ClipTransformEngine::new();
        let started = engine.begin_drag(&mut f.arr, DragKind::Move, a, Pos2::new(10.0, Y), PointerModifiers::command(), &f.options);
        assert!(!started);
        assert!(!f.get(a).selected);
    }
}

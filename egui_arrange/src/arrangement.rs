//! 编排数据模块
//!
//! 轨道、剪辑和自动化曲线的容器。剪辑集合和自动化点集合保存在 `Arc<Vec<_>>`
//! 中，更新时整体替换（读取、生成新集合、替换），渲染端拿到的快照永远是完整的。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::automation::AutomationLane;
use crate::structure::{AutomationLaneKey, Clip, ClipId, TimeRange, Track, TrackId};

#[derive(Clone, Debug, Default)]
pub struct Arrangement {
    tracks: Vec<Track>,
    clips: Arc<Vec<Clip>>,
    automation: BTreeMap<AutomationLaneKey, AutomationLane>,
}

impl Arrangement {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- 轨道 ----

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn add_track(&mut self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.push(track);
        id
    }

    /// 删除轨道及其剪辑和自动化曲线
    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        let index = self.track_index(id)?;
        let track = self.tracks.remove(index);
        self.update_clips(|clips| clips.retain(|c| c.track_id != id));
        self.automation.retain(|key, _| key.track_id != id);
        Some(track)
    }

    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    // ---- 剪辑 ----

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// 当前剪辑集合的共享快照
    pub fn clips_snapshot(&self) -> Arc<Vec<Clip>> {
        self.clips.clone()
    }

    pub fn replace_clips(&mut self, clips: Arc<Vec<Clip>>) {
        self.clips = clips;
    }

    /// 基于当前集合生成新集合并整体替换
    pub fn update_clips<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Vec<Clip>),
    {
        let mut next = self.clips.as_ref().clone();
        f(&mut next);
        self.clips = Arc::new(next);
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clips_on_track(&self, track_id: TrackId) -> impl Iterator<Item = &Clip> {
        self.clips.iter().filter(move |c| c.track_id == track_id)
    }

    pub fn add_clip(&mut self, mut clip: Clip) -> ClipId {
        clip.clamp_fades();
        let id = clip.id;
        self.update_clips(|clips| clips.push(clip));
        id
    }

    pub fn remove_clip(&mut self, id: ClipId) -> Option<Clip> {
        let removed = self.clip(id).cloned()?;
        self.update_clips(|clips| clips.retain(|c| c.id != id));
        Some(removed)
    }

    /// 在 `time` 处把剪辑一分为二，返回右半部分的 id
    ///
    /// 右半部分的 `source_start` 前移相同的偏移量，两半在源音频中保持连续。
    /// 任一半短于 `min_duration` 时不做任何修改。
    pub fn split_clip(&mut self, id: ClipId, time: f64, min_duration: f64) -> Option<ClipId> {
        let clip = self.clip(id)?;
        let offset = time - clip.start;
        if offset < min_duration || clip.duration - offset < min_duration {
            return None;
        }

        let mut left = clip.clone();
        let mut right = clip.clone();
        left.duration = offset;
        left.fade_out = 0.0;
        left.clamp_fades();

        right.id = ClipId::next();
        right.start = time;
        right.duration = clip.duration - offset;
        right.source_start = clip.source_start + offset * clip.stretch_ratio();
        right.fade_in = 0.0;
        right.selected = false;
        right.warp_anchors = clip
            .warp_anchors
            .iter()
            .filter(|a| **a >= offset)
            .map(|a| a - offset)
            .collect();
        left.warp_anchors.retain(|a| *a < offset);
        right.clamp_fades();

        let right_id = right.id;
        self.update_clips(|clips| {
            if let Some(index) = clips.iter().position(|c| c.id == id) {
                clips[index] = left;
                clips.insert(index + 1, right);
            }
        });
        Some(right_id)
    }

    // ---- 选择 ----

    pub fn selected_ids(&self) -> Vec<ClipId> {
        self.clips.iter().filter(|c| c.selected).map(|c| c.id).collect()
    }

    pub fn has_selection(&self) -> bool {
        self.clips.iter().any(|c| c.selected)
    }

    pub fn select_only(&mut self, id: ClipId) {
        self.update_clips(|clips| {
            for clip in clips.iter_mut() {
                clip.selected = clip.id == id;
            }
        });
    }

    /// 切换选中状态，返回切换后的状态
    pub fn toggle_selected(&mut self, id: ClipId) -> bool {
        let mut now_selected = false;
        self.update_clips(|clips| {
            if let Some(clip) = clips.iter_mut().find(|c| c.id == id) {
                clip.selected = !clip.selected;
                now_selected = clip.selected;
            }
        });
        now_selected
    }

    pub fn clear_selection(&mut self) {
        if !self.has_selection() {
            return;
        }
        self.update_clips(|clips| clips.iter_mut().for_each(|c| c.selected = false));
    }

    pub fn select_all(&mut self) {
        self.update_clips(|clips| clips.iter_mut().for_each(|c| c.selected = true));
    }

    /// 选中与时间范围相交的剪辑；`tracks` 为 `None` 时不限轨道
    pub fn select_range(&mut self, range: TimeRange, tracks: Option<&[TrackId]>) -> Vec<ClipId> {
        let mut selected = Vec::new();
        self.update_clips(|clips| {
            for clip in clips.iter_mut() {
                let on_track = tracks.map_or(true, |ids| ids.contains(&clip.track_id));
                clip.selected = on_track && clip.intersects(&range);
                if clip.selected {
                    selected.push(clip.id);
                }
            }
        });
        selected
    }

    // ---- 自动化 ----

    pub fn automation_lanes(&self) -> impl Iterator<Item = &AutomationLane> {
        self.automation.values()
    }

    pub fn automation_keys_for(&self, track_id: TrackId) -> Vec<AutomationLaneKey> {
        self.automation
            .keys()
            .filter(|k| k.track_id == track_id)
            .cloned()
            .collect()
    }

    pub fn automation_lane(&self, key: &AutomationLaneKey) -> Option<&AutomationLane> {
        self.automation.get(key)
    }

    pub fn automation_lane_mut(&mut self, key: &AutomationLaneKey) -> Option<&mut AutomationLane> {
        self.automation.get_mut(key)
    }

    /// 获取或创建自动化曲线
    pub fn ensure_automation_lane(&mut self, key: AutomationLaneKey) -> &mut AutomationLane {
        self.automation
            .entry(key.clone())
            .or_insert_with(|| AutomationLane::new(key))
    }

    pub fn insert_automation_lane(&mut self, lane: AutomationLane) {
        self.automation.insert(lane.key.clone(), lane);
    }

    pub fn remove_automation_lane(&mut self, key: &AutomationLaneKey) -> Option<AutomationLane> {
        self.automation.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::BufferId;

    fn arrangement_with_clip() -> (Arrangement, TrackId, ClipId) {
        let mut arr = Arrangement::new();
        let track = arr.add_track(Track::new("Drums".into()));
        let mut clip = Clip::new_audio(track, BufferId::from("loop"), 1.0, 4.0, "Loop".into());
        clip.original_duration = 10.0;
        clip.source_start = 2.0;
        clip.fade_in = 0.5;
        clip.fade_out = 0.5;
        let id = arr.add_clip(clip);
        (arr, track, id)
    }

    #[test]
    fn split_keeps_source_continuity() {
        let (mut arr, _, id) = arrangement_with_clip();
        let right = arr.split_clip(id, 2.5, 0.05);
        let right = right.and_then(|r| arr.clip(r).cloned());
        let left = arr.clip(id).cloned();
        let (Some(left), Some(right)) = (left, right) else {
            panic!("split did not produce two clips");
        };

        assert!((left.duration - 1.5).abs() < 1e-12);
        assert!((right.start - 2.5).abs() < 1e-12);
        assert!((right.duration - 2.5).abs() < 1e-12);
        assert!((right.source_start - 3.5).abs() < 1e-12);
        assert_eq!(left.fade_out, 0.0);
        assert_eq!(right.fade_in, 0.0);
        assert_eq!(arr.clips().len(), 2);
    }

    #[test]
    fn split_near_edge_is_rejected() {
        let (mut arr, _, id) = arrangement_with_clip();
        assert!(arr.split_clip(id, 1.01, 0.05).is_none());
        assert!(arr.split_clip(id, 4.99, 0.05).is_none());
        assert_eq!(arr.clips().len(), 1);
    }

    #[test]
    fn update_replaces_collection_without_touching_old_snapshot() {
        let (mut arr, _, id) = arrangement_with_clip();
        let before = arr.clips_snapshot();
        arr.select_only(id);
        assert!(!before[0].selected);
        assert!(arr.clips()[0].selected);
    }

    #[test]
    fn range_selection_picks_intersecting_clips() {
        let (mut arr, track, first) = arrangement_with_clip();
        let second = arr.add_clip(Clip::new(track, 8.0, 1.0, "Late".into()));
        let picked = arr.select_range(TimeRange::new(0.0, 2.0), None);
        assert_eq!(picked, vec![first]);
        assert!(!arr.clip(second).map_or(true, |c| c.selected));
    }

    #[test]
    fn removing_track_drops_its_clips_and_lanes() {
        let (mut arr, track, _) = arrangement_with_clip();
        arr.ensure_automation_lane(AutomationLaneKey::new(track, "eq", "gain"));
        assert!(arr.remove_track(track).is_some());
        assert!(arr.clips().is_empty());
        assert_eq!(arr.automation_lanes().count(), 0);
    }
}

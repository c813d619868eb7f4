//! 编排快照
//!
//! 把轨道、剪辑和自动化曲线导出为普通的可序列化结构。磁盘上的项目格式由宿主决定。

use serde::{Deserialize, Serialize};

use crate::arrangement::Arrangement;
use crate::automation::AutomationLane;
use crate::grid::{Tempo, TimeGrid};
use crate::structure::{AutomationLaneKey, AutomationPoint, Clip, ClipId, GroupId, PointId, Track, TrackId};

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutomationLaneData {
    pub key: AutomationLaneKey,
    pub points: Vec<AutomationPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrangementSnapshot {
    pub version: String,
    pub tempo: Tempo,
    pub grid: TimeGrid,
    pub tracks: Vec<Track>,
    pub clips: Vec<Clip>,
    #[serde(default)]
    pub automation: Vec<AutomationLaneData>,
}

impl ArrangementSnapshot {
    pub fn capture(arrangement: &Arrangement, grid: &TimeGrid, tempo: &Tempo) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            tempo: *tempo,
            grid: grid.clone(),
            tracks: arrangement.tracks().to_vec(),
            clips: arrangement.clips().to_vec(),
            automation: arrangement
                .automation_lanes()
                .map(|lane| AutomationLaneData {
                    key: lane.key.clone(),
                    points: lane.points().to_vec(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 重建编排数据。id 计数器会跳过快照里已经使用的 id
    pub fn restore(self) -> (Arrangement, TimeGrid, Tempo) {
        let mut arrangement = Arrangement::new();
        for track in &self.tracks {
            TrackId::reserve_above(track.id);
        }
        arrangement.set_tracks(self.tracks);

        arrangement.update_clips(|clips| {
            for mut clip in self.clips {
                ClipId::reserve_above(clip.id);
                if let Some(group) = clip.group_id {
                    GroupId::reserve_above(group);
                }
                clip.clamp_fades();
                clips.push(clip);
            }
        });

        for lane in self.automation {
            for point in &lane.points {
                PointId::reserve_above(point.id);
            }
            arrangement.insert_automation_lane(AutomationLane::with_points(lane.key, lane.points));
        }
        (arrangement, self.grid, Tempo::new(self.tempo.bpm, self.tempo.beats_per_bar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_restores_arrangement() {
        let mut arr = Arrangement::new();
        let track = arr.add_track(Track::new("Vox".into()));
        let mut clip = Clip::new(track, 2.0, 3.0, "take 1".into());
        clip.gain = 1.25;
        clip.fade_in = 0.4;
        arr.add_clip(clip.clone());
        let key = AutomationLaneKey::new(track, "reverb", "mix");
        arr.ensure_automation_lane(key.clone()).insert(AutomationPoint::new(1.0, 0.3));

        let grid = TimeGrid::new(250.0);
        let tempo = Tempo::new(98.0, 3);
        let json = ArrangementSnapshot::capture(&arr, &grid, &tempo).to_json();
        let json = json.unwrap_or_default();
        let snapshot = ArrangementSnapshot::from_json(&json);
        assert!(snapshot.is_ok(), "{:?}", snapshot.err());
        let Ok(snapshot) = snapshot else { return };

        let (restored, grid_back, tempo_back) = snapshot.restore();
        assert_eq!(restored.clips(), &[clip]);
        assert_eq!(restored.tracks().len(), 1);
        assert_eq!(restored.automation_lane(&key).map(|l| l.len()), Some(1));
        assert_eq!(grid_back.pps(), 250.0);
        assert_eq!(tempo_back, tempo);
        assert!(ClipId::next().0 > restored.clips()[0].id.0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ArrangementSnapshot::from_json("{\"version\": 3").is_err());
    }
}

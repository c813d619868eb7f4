//! 数据结构模块
//!
//! 定义了编排引擎使用的核心数据结构，包括音轨、音频剪辑、自动化点和选择范围。

use egui::Color32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};

// Color32 序列化辅助类型
#[derive(Serialize, Deserialize)]
struct Color32Helper {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl From<Color32> for Color32Helper {
    fn from(color: Color32) -> Self {
        Self {
            r: color.r(),
            g: color.g(),
            b: color.b(),
            a: color.a(),
        }
    }
}

impl From<Color32Helper> for Color32 {
    fn from(helper: Color32Helper) -> Self {
        Color32::from_rgba_unmultiplied(helper.r, helper.g, helper.b, helper.a)
    }
}

fn serialize_color32<S>(color: &Color32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    Color32Helper::from(*color).serialize(serializer)
}

fn deserialize_color32<'de, D>(deserializer: D) -> Result<Color32, D::Error>
where
    D: Deserializer<'de>,
{
    let helper = Color32Helper::deserialize(deserializer)?;
    Ok(Color32::from(helper))
}

static TRACK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static CLIP_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static POINT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static GROUP_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn next() -> Self {
        TrackId(TRACK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// 反序列化之后调用，保证之后生成的 id 不会与已加载的冲突
    pub fn reserve_above(id: TrackId) {
        TRACK_ID_COUNTER.fetch_max(id.0 + 1, Ordering::Relaxed);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClipId(pub u64);

impl ClipId {
    pub fn next() -> Self {
        ClipId(CLIP_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn reserve_above(id: ClipId) {
        CLIP_ID_COUNTER.fetch_max(id.0 + 1, Ordering::Relaxed);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointId(pub u64);

impl PointId {
    pub fn next() -> Self {
        PointId(POINT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn reserve_above(id: PointId) {
        POINT_ID_COUNTER.fetch_max(id.0 + 1, Ordering::Relaxed);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl GroupId {
    pub fn next() -> Self {
        GroupId(GROUP_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn reserve_above(id: GroupId) {
        GROUP_ID_COUNTER.fetch_max(id.0 + 1, Ordering::Relaxed);
    }
}

/// 音频资源的键，由外部的音频资源服务解析为解码后的缓冲区
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BufferId(pub String);

impl From<&str> for BufferId {
    fn from(value: &str) -> Self {
        BufferId(value.to_string())
    }
}

/// 淡入淡出曲线
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadeCurve {
    Linear,
    Exponential,
    Logarithmic,
    SCurve,
}

impl Default for FadeCurve {
    fn default() -> Self {
        FadeCurve::Linear
    }
}

impl FadeCurve {
    /// 在 `position`（0.0 到 1.0）处的淡变增益
    pub fn gain_at(&self, position: f64) -> f64 {
        let p = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => p,
            FadeCurve::Exponential => p * p,
            FadeCurve::Logarithmic => p.sqrt(),
            FadeCurve::SCurve => p * p * (3.0 - 2.0 * p),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub track_id: TrackId,
    pub buffer_id: Option<BufferId>,
    pub name: String,
    pub start: f64,             // 时间轴上的开始时间（秒）
    pub duration: f64,          // 持续时间（秒）
    pub source_start: f64,      // 在音频资源中的偏移（秒）
    pub original_duration: f64, // 音频资源的总时长（秒）
    pub fade_in: f64,
    pub fade_out: f64,
    #[serde(default)]
    pub fade_in_curve: FadeCurve,
    #[serde(default)]
    pub fade_out_curve: FadeCurve,
    pub gain: f64, // 线性增益
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub warp_anchors: Vec<f64>,
    pub time_stretch_rate: Option<f64>,
    #[serde(default)]
    pub selected: bool,
    #[serde(serialize_with = "serialize_color32", deserialize_with = "deserialize_color32")]
    pub color: Color32,
}

impl Clip {
    pub fn new_audio(
        track_id: TrackId,
        buffer_id: BufferId,
        start: f64,
        duration: f64,
        name: String,
    ) -> Self {
        Self {
            buffer_id: Some(buffer_id),
            ..Self::new(track_id, start, duration, name)
        }
    }

    /// 没有关联音频资源的剪辑（波形区域留空，时间计算照常）
    pub fn new(track_id: TrackId, start: f64, duration: f64, name: String) -> Self {
        Self {
            id: ClipId::next(),
            track_id,
            buffer_id: None,
            name,
            start: start.max(0.0),
            duration,
            source_start: 0.0,
            original_duration: duration,
            fade_in: 0.0,
            fade_out: 0.0,
            fade_in_curve: FadeCurve::Linear,
            fade_out_curve: FadeCurve::Linear,
            gain: 1.0,
            group_id: None,
            warp_anchors: Vec::new(),
            time_stretch_rate: None,
            selected: false,
            color: Color32::from_rgb(150, 150, 250),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }

    pub fn intersects(&self, range: &TimeRange) -> bool {
        self.start < range.end && self.end() > range.start
    }

    /// 单个淡变允许的最大长度
    pub fn max_fade(&self) -> f64 {
        (self.duration / 2.0).max(0.0)
    }

    /// 时长变化后把淡入淡出重新限制在 `duration / 2` 以内
    pub fn clamp_fades(&mut self) {
        let max_fade = self.max_fade();
        self.fade_in = self.fade_in.clamp(0.0, max_fade);
        self.fade_out = self.fade_out.clamp(0.0, max_fade);
    }

    pub fn stretch_ratio(&self) -> f64 {
        match self.time_stretch_rate {
            Some(rate) if rate.is_finite() && rate > 0.0 => rate,
            _ => 1.0,
        }
    }

    /// 时间轴时间对应的资源内时间
    pub fn source_time_at(&self, timeline_time: f64) -> Option<f64> {
        if !self.contains(timeline_time) {
            return None;
        }
        Some(self.source_start + (timeline_time - self.start) * self.stretch_ratio())
    }

    /// 资源内时间换算回时间轴时间
    pub fn timeline_time_at(&self, source_time: f64) -> f64 {
        self.start + (source_time - self.source_start) / self.stretch_ratio()
    }

    /// 剪辑实际引用的资源片段 `(开始, 长度)`，受 `original_duration` 限制
    pub fn source_window(&self) -> (f64, f64) {
        let wanted = self.duration * self.stretch_ratio();
        let available = (self.original_duration - self.source_start).max(0.0);
        (self.source_start, wanted.min(available))
    }

    /// 在时间轴时间 `time` 处的包络增益（增益 × 淡入 × 淡出）
    pub fn envelope_gain_at(&self, time: f64) -> f64 {
        if !self.contains(time) {
            return 0.0;
        }
        let relative = time - self.start;
        let mut gain = self.gain;
        if self.fade_in > 0.0 && relative < self.fade_in {
            gain *= self.fade_in_curve.gain_at(relative / self.fade_in);
        }
        let remaining = self.duration - relative;
        if self.fade_out > 0.0 && remaining < self.fade_out {
            gain *= self.fade_out_curve.gain_at(remaining / self.fade_out);
        }
        gain
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(serialize_with = "serialize_color32", deserialize_with = "deserialize_color32")]
    pub color: Color32,        // 轨道基础色，冷色波形渐变会用到
    pub height: f32,           // 剪辑行高度，仅用于布局
    pub collapsed: bool,
}

impl Track {
    pub fn new(name: String) -> Self {
        Self {
            id: TrackId::next(),
            name,
            color: Color32::from_rgb(90, 160, 220),
            height: 80.0,
            collapsed: false,
        }
    }

    pub fn with_color(mut self, color: Color32) -> Self {
        self.color = color;
        self
    }
}

/// 自动化通道的键：(轨道, 效果器, 参数名)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AutomationLaneKey {
    pub track_id: TrackId,
    pub effect_id: String,
    pub parameter: String,
}

impl AutomationLaneKey {
    pub fn new(track_id: TrackId, effect_id: &str, parameter: &str) -> Self {
        Self {
            track_id,
            effect_id: effect_id.to_string(),
            parameter: parameter.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    pub id: PointId,
    pub time: f64,  // 秒
    pub value: f64, // 0.0 ..= AUTOMATION_MAX_VALUE
}

impl AutomationPoint {
    pub fn new(time: f64, value: f64) -> Self {
        Self {
            id: PointId::next(),
            time,
            value,
        }
    }
}

/// 时间范围选择，`start <= end`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.duration() <= f64::EPSILON
    }
}

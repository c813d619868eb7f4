//! 编辑命令和事件模块
//!
//! 定义了编排编辑器的配置、命令系统和事件系统，用于与宿主应用交互。

use serde::{Deserialize, Serialize};

use crate::grid::Tempo;
use crate::structure::{
    AutomationLaneKey, BufferId, Clip, ClipId, PointId, TimeRange, TrackId,
};
use crate::waveform::WaveformStyle;

/// 宿主可描述的吸附模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapMode {
    /// 把剪辑位置本身对齐到网格
    Absolute,
    /// 只对齐位移，保留剪辑原有的离网格偏移
    Relative,
}

impl Default for SnapMode {
    fn default() -> Self {
        SnapMode::Absolute
    }
}

/// 外部控制的传输/播放状态，只用于绘制播放头
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransportState {
    pub is_playing: bool,
    pub position_seconds: f64,
}

/// 指针事件附带的修饰键
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerModifiers {
    pub shift: bool,
    pub alt: bool,
    /// macOS 上是 Cmd，其他平台是 Ctrl
    pub command: bool,
}

impl PointerModifiers {
    pub const NONE: Self = Self {
        shift: false,
        alt: false,
        command: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::NONE
        }
    }

    pub fn command() -> Self {
        Self {
            command: true,
            ..Self::NONE
        }
    }
}

impl From<egui::Modifiers> for PointerModifiers {
    fn from(modifiers: egui::Modifiers) -> Self {
        Self {
            shift: modifiers.shift,
            alt: modifiers.alt,
            command: modifiers.command,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrangeOptions {
    /// 剪辑最短时长（秒）
    pub min_clip_duration: f64,
    /// 增益拖拽灵敏度（每像素）
    pub gain_sensitivity: f64,
    pub max_gain: f64,
    /// 过零点搜索窗口（单侧，秒）
    pub zero_crossing_window: f64,
    /// 左边缘裁剪时吸附到过零点
    pub zero_crossing_trim: bool,
    pub ripple: bool,
    pub snap_enabled: bool,
    pub snap_mode: SnapMode,
    pub track_header_width: f32,
    pub timeline_height: f32,
    pub default_track_height: f32,
    pub collapsed_track_height: f32,
    pub automation_lane_height: f32,
    pub min_clip_width: f32,
    pub edge_handle_width: f32,
    /// 单次波形渲染的时间预算（毫秒）
    pub render_budget_ms: f64,
    pub waveform: WaveformStyle,
}

impl Default for ArrangeOptions {
    fn default() -> Self {
        Self {
            min_clip_duration: 0.05,
            gain_sensitivity: 0.01,
            max_gain: 2.0,
            zero_crossing_window: crate::zero_crossing::DEFAULT_WINDOW_SECONDS,
            zero_crossing_trim: false,
            ripple: false,
            snap_enabled: true,
            snap_mode: SnapMode::Absolute,
            track_header_width: 180.0,
            timeline_height: 32.0,
            default_track_height: 80.0,
            collapsed_track_height: 24.0,
            automation_lane_height: 60.0,
            min_clip_width: 6.0,
            edge_handle_width: 6.0,
            render_budget_ms: 16.0,
            waveform: WaveformStyle::default(),
        }
    }
}

/// 外部宿主可监听的编辑事件
#[derive(Clone, Debug)]
pub enum ArrangeEvent {
    ClipSelected {
        clip_id: ClipId,
    },
    SelectionChanged(Vec<ClipId>),
    RangeSelectionChanged(Option<TimeRange>),
    /// 移动（含波纹移动）提交，`before`/`after` 一一对应
    ClipsMoved {
        before: Vec<Clip>,
        after: Vec<Clip>,
    },
    ClipResized {
        before: Clip,
        after: Clip,
    },
    FadeChanged {
        before: Clip,
        after: Clip,
    },
    GainChanged {
        before: Clip,
        after: Clip,
    },
    ClipsDuplicated {
        originals: Vec<ClipId>,
        clones: Vec<ClipId>,
    },
    DragCancelled,
    ClipCreated {
        clip_id: ClipId,
    },
    ClipSplit {
        clip_id: ClipId,
        new_clip_id: ClipId,
        time: f64,
    },
    ClipDeleted(Clip),
    TrackCreated {
        track_id: TrackId,
    },
    TrackDeleted {
        track_id: TrackId,
    },
    AutomationPointAdded {
        key: AutomationLaneKey,
        point_id: PointId,
    },
    AutomationPointUpdated {
        key: AutomationLaneKey,
        point_id: PointId,
    },
    AutomationPointRemoved {
        key: AutomationLaneKey,
        point_id: PointId,
    },
    /// 用户点击了时间尺，由宿主决定是否跳转播放位置
    SeekRequested {
        position: f64,
    },
    TempoChanged(Tempo),
    /// 撤销/重做替换了整个编排，宿主应重新读取
    ArrangementReplaced,
}

/// 宿主可推送到编辑器的命令
#[derive(Clone, Debug)]
pub enum ArrangeCommand {
    CreateTrack {
        name: String,
    },
    DeleteTrack {
        track_id: TrackId,
    },
    RenameTrack {
        track_id: TrackId,
        new_name: String,
    },
    SetTrackCollapsed {
        track_id: TrackId,
        collapsed: bool,
    },
    CreateClip {
        track_id: TrackId,
        buffer_id: Option<BufferId>,
        start: f64,
        duration: f64,
    },
    DeleteClip {
        clip_id: ClipId,
    },
    DeleteSelected,
    SplitClip {
        clip_id: ClipId,
        time: f64,
    },
    AddAutomationPoint {
        key: AutomationLaneKey,
        time: f64,
        value: f64,
    },
    RemoveAutomationPoint {
        key: AutomationLaneKey,
        point_id: PointId,
    },
    SetTransport(TransportState),
    SetTempo {
        bpm: f64,
        beats_per_bar: u32,
    },
    /// 注入能量信号（0.0 到 1.0），影响吸附细分
    SetEnergy(f64),
    SetRipple(bool),
    SetSnap {
        enabled: bool,
        mode: SnapMode,
    },
    SelectRange {
        start: f64,
        end: f64,
    },
    ClearSelection,
    SelectAll,
    Undo,
    Redo,
}

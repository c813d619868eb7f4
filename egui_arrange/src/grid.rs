//! 时间网格模块
//!
//! 负责时间（秒）与像素之间的换算、缩放，以及自适应的网格/吸附分辨率。
//!
//! 吸附分辨率由三个输入决定：缩放（像素/秒）、速度（BPM）以及宿主注入的
//! 能量信号（0.0 到 1.0）。能量信号作为显式参数传入，而不是全局状态。

use serde::{Deserialize, Serialize};

/// 按节拍宽度选择的基础细分（每小节的网格数）
pub const SUBDIVISION_LADDER: [u32; 4] = [4, 8, 16, 32];
/// 节拍宽度阈值（像素），与 `SUBDIVISION_LADDER` 一一对应
pub const BEAT_WIDTH_THRESHOLDS: [f64; 4] = [0.0, 40.0, 80.0, 160.0];
pub const MAX_SUBDIVISION: u32 = 64;
/// 能量超过该值时细分加倍
pub const HIGH_ENERGY_THRESHOLD: f64 = 0.65;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub bpm: f64,
    pub beats_per_bar: u32,
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
        }
    }
}

impl Tempo {
    pub fn new(bpm: f64, beats_per_bar: u32) -> Self {
        Self {
            bpm: bpm.clamp(20.0, 400.0),
            beats_per_bar: beats_per_bar.max(1),
        }
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm.max(1.0)
    }

    pub fn seconds_per_bar(&self) -> f64 {
        self.seconds_per_beat() * self.beats_per_bar.max(1) as f64
    }
}

/// 把 `time` 对齐到最近的网格线（每小节 `division` 格）
///
/// 对已经对齐的值再次调用会得到相同结果。
pub fn quantize(time: f64, bpm: f64, beats_per_bar: u32, division: u32) -> f64 {
    let step = grid_step(bpm, beats_per_bar, division);
    if !(step.is_finite() && step > 0.0) {
        return time;
    }
    (time / step).round() * step
}

/// 一个网格格子的长度（秒）
pub fn grid_step(bpm: f64, beats_per_bar: u32, division: u32) -> f64 {
    if bpm <= 0.0 || division == 0 {
        return 0.0;
    }
    (60.0 / bpm) * beats_per_bar.max(1) as f64 / division as f64
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridLineKind {
    Bar,
    Beat,
    Subdivision,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLine {
    pub time: f64,
    pub x: f64,
    pub kind: GridLineKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    pps: f64,           // 像素/秒
    scroll_offset: f64, // 像素
    pub min_pps: f64,
    pub max_pps: f64,
    pub division: u32, // 当前吸附细分（每小节的格数）
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            pps: 100.0,
            scroll_offset: 0.0,
            min_pps: 1.0,
            max_pps: 50_000.0,
            division: 16,
        }
    }
}

impl TimeGrid {
    pub fn new(pps: f64) -> Self {
        let mut grid = Self::default();
        grid.set_scale(pps);
        grid
    }

    pub fn pps(&self) -> f64 {
        self.pps
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: f64) {
        if offset.is_finite() {
            self.scroll_offset = offset;
        }
    }

    pub fn scroll_by(&mut self, delta_px: f64) {
        self.set_scroll_offset(self.scroll_offset + delta_px);
    }

    pub fn time_to_pixel(&self, time: f64) -> f64 {
        time * self.pps - self.scroll_offset
    }

    pub fn pixel_to_time(&self, x: f64) -> f64 {
        (x + self.scroll_offset) / self.pps
    }

    pub fn pixels_to_seconds(&self, dx: f64) -> f64 {
        dx / self.pps
    }

    pub fn set_scale(&mut self, pps: f64) {
        if !(pps.is_finite() && pps > 0.0) {
            return;
        }
        self.pps = pps.clamp(self.min_pps, self.max_pps);
    }

    /// 以 `anchor_time` 为锚点缩放，锚点的屏幕像素位置保持不变
    pub fn zoom_by(&mut self, factor: f64, anchor_time: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let anchor_px = self.time_to_pixel(anchor_time);
        self.pps = (self.pps * factor).clamp(self.min_pps, self.max_pps);
        self.scroll_offset = anchor_time * self.pps - anchor_px;
    }

    /// 一拍的像素宽度
    pub fn beat_width(&self, tempo: &Tempo) -> f64 {
        tempo.seconds_per_beat() * self.pps
    }

    /// 根据节拍宽度和能量信号计算吸附细分
    pub fn adaptive_division(&self, tempo: &Tempo, energy: f64) -> u32 {
        let beat_px = self.beat_width(tempo);
        let mut base = SUBDIVISION_LADDER[0];
        for (threshold, division) in BEAT_WIDTH_THRESHOLDS.iter().zip(SUBDIVISION_LADDER) {
            if beat_px >= *threshold {
                base = division;
            }
        }
        if energy > HIGH_ENERGY_THRESHOLD {
            (base * 2).min(MAX_SUBDIVISION)
        } else {
            base
        }
    }

    /// 重新计算并保存吸附细分，返回新值
    pub fn update_division(&mut self, tempo: &Tempo, energy: f64) -> u32 {
        self.division = self.adaptive_division(tempo, energy);
        self.division
    }

    pub fn step(&self, tempo: &Tempo) -> f64 {
        grid_step(tempo.bpm, tempo.beats_per_bar, self.division)
    }

    pub fn snap(&self, time: f64, tempo: &Tempo) -> f64 {
        quantize(time, tempo.bpm, tempo.beats_per_bar, self.division)
    }

    /// 相对吸附：对齐的是相对 `reference` 的位移，保留原本不在网格上的偏移
    pub fn snap_relative(&self, time: f64, reference: f64, tempo: &Tempo) -> f64 {
        reference + self.snap(time - reference, tempo)
    }

    /// 可见区域 `[0, width_px)` 对应的时间范围
    pub fn visible_range(&self, width_px: f64) -> (f64, f64) {
        (self.pixel_to_time(0.0), self.pixel_to_time(width_px))
    }

    /// 可见区域内的网格线（小节线、拍线、细分线）
    pub fn grid_lines(&self, tempo: &Tempo, width_px: f64) -> Vec<GridLine> {
        let step = self.step(tempo);
        if !step.is_finite() || step <= 0.0 {
            return Vec::new();
        }
        // 细分线太密时只画拍线
        let step = if step * self.pps < 4.0 {
            tempo.seconds_per_beat()
        } else {
            step
        };
        let (t0, t1) = self.visible_range(width_px);
        let first = (t0.max(0.0) / step).floor() as i64;
        let last = (t1 / step).ceil() as i64;
        let beat = tempo.seconds_per_beat();
        let bar = tempo.seconds_per_bar();
        let on = |t: f64, unit: f64| {
            let r = (t / unit).round();
            (t - r * unit).abs() < step * 1e-6
        };

        let mut lines = Vec::new();
        for index in first.max(0)..=last {
            let time = index as f64 * step;
            let kind = if on(time, bar) {
                GridLineKind::Bar
            } else if on(time, beat) {
                GridLineKind::Beat
            } else {
                GridLineKind::Subdivision
            };
            lines.push(GridLine {
                time,
                x: self.time_to_pixel(time),
                kind,
            });
        }
        lines
    }
}

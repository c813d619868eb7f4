//! 工具函数模块
//!
//! 包含通用的工具函数，如时间格式化等。

use crate::grid::Tempo;

/// 将时间（秒）格式化为 "MM:SS.mmm" 格式
///
/// 负数按 0 处理。
///
/// # 示例
///
/// ```
/// use egui_arrange::utils::format_time;
///
/// let formatted = format_time(125.5);
/// assert_eq!(formatted, "02:05.500");
/// ```
pub fn format_time(time_seconds: f64) -> String {
    let total_ms = (time_seconds.max(0.0) * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1000) % 60;
    let milliseconds = total_ms % 1000;
    format!("{:02}:{:02}.{:03}", minutes, seconds, milliseconds)
}

/// 将时间格式化为 "小节.拍"（从 1 开始计数）
pub fn format_bar_beat(time_seconds: f64, tempo: &Tempo) -> String {
    let beat_len = tempo.seconds_per_beat();
    let beats = (time_seconds.max(0.0) / beat_len + 1e-9).floor() as u64;
    let per_bar = tempo.beats_per_bar.max(1) as u64;
    format!("{}.{}", beats / per_bar + 1, beats % per_bar + 1)
}

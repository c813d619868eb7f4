//! 过零点查找
//!
//! 裁剪边界吸附到最近的过零点，避免剪辑边缘出现爆音。

use crate::asset::AudioBuffer;

/// 默认搜索窗口（单侧，秒）
pub const DEFAULT_WINDOW_SECONDS: f64 = 0.006;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZeroCrossingFinder {
    pub window_seconds: f64,
}

impl Default for ZeroCrossingFinder {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    }
}

impl ZeroCrossingFinder {
    pub fn new(window_seconds: f64) -> Self {
        Self {
            window_seconds: window_seconds.max(0.0),
        }
    }

    /// 在 `target` 附近 ±窗口内查找最近的过零点，返回其采样下标
    ///
    /// 采样值恰好为 0，或与前一个采样符号相反，都算过零。
    /// 距离相同时优先左侧。
    pub fn find_sample(&self, samples: &[f32], sample_rate: u32, target: usize) -> Option<usize> {
        if samples.is_empty() || sample_rate == 0 {
            return None;
        }
        let target = target.min(samples.len() - 1);
        let radius = (self.window_seconds * sample_rate as f64).round() as usize;

        for distance in 0..=radius {
            if let Some(left) = target.checked_sub(distance) {
                if is_crossing(samples, left) {
                    return Some(left);
                }
            }
            let right = target + distance;
            if distance > 0 && right < samples.len() && is_crossing(samples, right) {
                return Some(right);
            }
        }
        None
    }

    /// 以秒为单位的查找，使用第一个声道；没有过零点时返回 `None`
    pub fn find(&self, buffer: &AudioBuffer, time: f64) -> Option<f64> {
        let samples = buffer.channel(0)?;
        let target = buffer.time_to_sample(time);
        if target > samples.len() {
            return None;
        }
        self.find_sample(samples, buffer.sample_rate, target)
            .map(|index| buffer.sample_to_time(index))
    }
}

fn is_crossing(samples: &[f32], index: usize) -> bool {
    let value = samples[index];
    if value == 0.0 {
        return true;
    }
    match index.checked_sub(1) {
        Some(prev) => {
            let prev = samples[prev];
            prev != 0.0 && (prev < 0.0) != (value < 0.0)
        }
        None => false,
    }
}

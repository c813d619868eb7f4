//! 波形渲染模块
//!
//! 把解码后音频的某个时间窗口栅格化到固定大小的位图上。
//!
//! - 细节级别随缩放变化：缩放越小，每列扫描时跳过的采样越多（步长 1 到 6）。
//! - 每列计算峰值（最小/最大）或 RMS（上下对称）。
//! - 先粗采样估计窗口内的最大振幅，再按阈值选择三套渐变之一。
//! - 相同输入得到逐像素相同的输出；超过时间预算时打印警告。

use std::time::{Duration, Instant};

use egui::{Color32, ColorImage, Vec2};
use serde::{Deserialize, Serialize};

use crate::asset::AudioBuffer;
use crate::structure::Clip;

/// 高于该最大振幅使用暖色渐变
pub const HOT_THRESHOLD: f32 = 0.8;
/// 高于该最大振幅使用紫色渐变，否则使用按轨道颜色着色的冷色渐变
pub const VIOLET_THRESHOLD: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveformMode {
    Peak,
    Rms,
}

impl Default for WaveformMode {
    fn default() -> Self {
        WaveformMode::Peak
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveformStyle {
    pub mode: WaveformMode,
    /// 满幅信号占半高的比例
    pub amplitude_scale: f32,
    /// 填充区域的不透明度，描边始终不透明
    pub fill_opacity: f32,
}

impl Default for WaveformStyle {
    fn default() -> Self {
        Self {
            mode: WaveformMode::Peak,
            amplitude_scale: 0.92,
            fill_opacity: 0.45,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradientKind {
    Hot,
    Violet,
    Cool,
}

pub fn select_gradient(measured_max_amplitude: f32) -> GradientKind {
    if measured_max_amplitude > HOT_THRESHOLD {
        GradientKind::Hot
    } else if measured_max_amplitude > VIOLET_THRESHOLD {
        GradientKind::Violet
    } else {
        GradientKind::Cool
    }
}

/// 渐变色标，从中心线向外
pub fn gradient_stops(kind: GradientKind, track_color: Color32) -> [Color32; 3] {
    match kind {
        GradientKind::Hot => [
            Color32::from_rgb(190, 40, 30),
            Color32::from_rgb(255, 140, 20),
            Color32::from_rgb(255, 225, 120),
        ],
        GradientKind::Violet => [
            Color32::from_rgb(80, 40, 150),
            Color32::from_rgb(150, 90, 220),
            Color32::from_rgb(220, 180, 255),
        ],
        GradientKind::Cool => [
            scale_rgb(track_color, 0.55),
            track_color,
            lerp_rgb(track_color, Color32::WHITE, 0.45),
        ],
    }
}

fn scale_rgb(color: Color32, factor: f32) -> Color32 {
    let f = |c: u8| (c as f32 * factor).round().clamp(0.0, 255.0) as u8;
    Color32::from_rgb(f(color.r()), f(color.g()), f(color.b()))
}

fn lerp_rgb(a: Color32, b: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let f = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color32::from_rgb(f(a.r(), b.r()), f(a.g(), b.g()), f(a.b(), b.b()))
}

fn sample_gradient(stops: &[Color32; 3], t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        lerp_rgb(stops[0], stops[1], t * 2.0)
    } else {
        lerp_rgb(stops[1], stops[2], (t - 0.5) * 2.0)
    }
}

fn with_alpha(color: Color32, alpha: f32) -> Color32 {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), a)
}

/// 缩放（像素/秒）对应的采样步长，1 为逐采样扫描
pub fn detail_level(zoom: f64) -> usize {
    match zoom {
        z if z >= 400.0 => 1,
        z if z >= 200.0 => 2,
        z if z >= 100.0 => 3,
        z if z >= 50.0 => 4,
        z if z >= 25.0 => 5,
        _ => 6,
    }
}

/// 一次渲染的全部输入，相同的请求得到相同的像素
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformRequest {
    /// 资源内的开始时间（秒）
    pub start_time: f64,
    pub duration: f64,
    /// 资源内可用的结束时间，之后的列留空
    pub source_end: f64,
    pub zoom: f64,
    pub mode: WaveformMode,
    pub track_color: Color32,
    /// 逻辑尺寸（点）
    pub size: Vec2,
    pub pixels_per_point: f32,
}

impl WaveformRequest {
    pub fn for_clip(
        clip: &Clip,
        zoom: f64,
        mode: WaveformMode,
        track_color: Color32,
        size: Vec2,
        pixels_per_point: f32,
    ) -> Self {
        Self {
            start_time: clip.source_start,
            duration: clip.duration * clip.stretch_ratio(),
            source_end: clip.original_duration,
            zoom,
            mode,
            track_color,
            size,
            pixels_per_point,
        }
    }
}

/// 渲染目标位图，按逻辑尺寸和设备像素比调整大小
#[derive(Clone, Debug)]
pub struct WaveformSurface {
    image: ColorImage,
    logical_size: Vec2,
    pixels_per_point: f32,
}

impl Default for WaveformSurface {
    fn default() -> Self {
        Self {
            image: ColorImage::new([1, 1], Color32::TRANSPARENT),
            logical_size: Vec2::new(1.0, 1.0),
            pixels_per_point: 1.0,
        }
    }
}

impl WaveformSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 逻辑尺寸或像素比变化时重新分配位图，返回是否发生了变化
    pub fn ensure_size(&mut self, logical_size: Vec2, pixels_per_point: f32) -> bool {
        let ppp = if pixels_per_point > 0.0 { pixels_per_point } else { 1.0 };
        let size = physical_size(logical_size, ppp);
        if self.image.size == size && self.logical_size == logical_size && self.pixels_per_point == ppp {
            return false;
        }
        self.image = ColorImage::new(size, Color32::TRANSPARENT);
        self.logical_size = logical_size;
        self.pixels_per_point = ppp;
        true
    }

    pub fn image(&self) -> &ColorImage {
        &self.image
    }

    pub fn size_px(&self) -> [usize; 2] {
        self.image.size
    }

    fn clear(&mut self) {
        self.image.pixels.fill(Color32::TRANSPARENT);
    }

    fn put(&mut self, x: usize, y: usize, color: Color32) {
        let [w, h] = self.image.size;
        if x < w && y < h {
            self.image.pixels[y * w + x] = color;
        }
    }
}

fn physical_size(logical: Vec2, ppp: f32) -> [usize; 2] {
    [
        ((logical.x * ppp).round() as usize).max(1),
        ((logical.y * ppp).round() as usize).max(1),
    ]
}

/// 一列的包络，值域 [-1, 1]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnSpan {
    pub min: f32,
    pub max: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub columns: Vec<Option<ColumnSpan>>,
    pub samples_inspected: usize,
}

/// 计算每列的包络。窗口超出缓冲区（或 `source_end`）的列为 `None`
pub fn compute_envelope(
    samples: &[f32],
    sample_rate: u32,
    request: &WaveformRequest,
    columns: usize,
    stride: usize,
) -> Envelope {
    let mut envelope = Envelope {
        columns: vec![None; columns],
        samples_inspected: 0,
    };
    if columns == 0 || sample_rate == 0 || request.duration <= 0.0 {
        return envelope;
    }
    let sr = sample_rate as f64;
    let first = request.start_time.max(0.0) * sr;
    let per_column = request.duration * sr / columns as f64;
    let limit = samples.len().min((request.source_end.max(0.0) * sr).round() as usize);
    let stride = stride.max(1);

    for (x, slot) in envelope.columns.iter_mut().enumerate() {
        let begin = (first + x as f64 * per_column).floor() as usize;
        let end = ((first + (x + 1) as f64 * per_column).floor() as usize).max(begin + 1).min(limit);
        if begin >= end {
            continue;
        }

        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;
        for &s in samples[begin..end].iter().step_by(stride) {
            min = min.min(s);
            max = max.max(s);
            sum_sq += (s as f64) * (s as f64);
            count += 1;
        }
        envelope.samples_inspected += count;
        *slot = Some(match request.mode {
            WaveformMode::Peak => ColumnSpan { min, max },
            WaveformMode::Rms => {
                let rms = (sum_sq / count as f64).sqrt() as f32;
                ColumnSpan { min: -rms, max: rms }
            }
        });
    }
    envelope
}

/// 粗采样估计窗口内的最大振幅，采样间隔随缩放变化
pub fn measure_max_amplitude(samples: &[f32], sample_rate: u32, request: &WaveformRequest) -> f32 {
    if sample_rate == 0 || request.duration <= 0.0 {
        return 0.0;
    }
    let sr = sample_rate as f64;
    let begin = (request.start_time.max(0.0) * sr) as usize;
    let end = (((request.start_time + request.duration).min(request.source_end)) * sr).max(0.0) as usize;
    let end = end.min(samples.len());
    if begin >= end {
        return 0.0;
    }
    // 大约每像素看两个采样
    let interval = ((sr / (request.zoom.max(1.0) * 2.0)) as usize).max(1);
    samples[begin..end]
        .iter()
        .step_by(interval)
        .fold(0.0f32, |acc, s| acc.max(s.abs()))
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderReport {
    pub detail_level: usize,
    pub samples_inspected: usize,
    pub measured_max_amplitude: f32,
    pub gradient: GradientKind,
    pub columns: usize,
    pub elapsed: Duration,
    pub over_budget: bool,
    /// 没有可用的音频缓冲，位图为空
    pub blank: bool,
}

#[derive(Clone, Debug)]
pub struct WaveformRenderer {
    pub style: WaveformStyle,
    pub budget: Duration,
}

impl Default for WaveformRenderer {
    fn default() -> Self {
        Self {
            style: WaveformStyle::default(),
            budget: Duration::from_millis(16),
        }
    }
}

impl WaveformRenderer {
    pub fn new(style: WaveformStyle, budget_ms: f64) -> Self {
        Self {
            style,
            budget: Duration::from_secs_f64(budget_ms.max(0.0) / 1000.0),
        }
    }

    /// 同步渲染一次。`buffer` 为 `None` 时清空位图并返回 `blank`
    pub fn render(
        &self,
        surface: &mut WaveformSurface,
        request: &WaveformRequest,
        buffer: Option<&AudioBuffer>,
    ) -> RenderReport {
        let started = Instant::now();
        surface.ensure_size(request.size, request.pixels_per_point);
        surface.clear();

        let level = detail_level(request.zoom);
        let [width, height] = surface.size_px();
        let samples = buffer.and_then(|b| b.channel(0).map(|s| (s, b.sample_rate)));
        let Some((samples, sample_rate)) = samples else {
            return RenderReport {
                detail_level: level,
                samples_inspected: 0,
                measured_max_amplitude: 0.0,
                gradient: GradientKind::Cool,
                columns: width,
                elapsed: started.elapsed(),
                over_budget: false,
                blank: true,
            };
        };

        let measured = measure_max_amplitude(samples, sample_rate, request);
        let gradient = select_gradient(measured);
        let stops = gradient_stops(gradient, request.track_color);
        let envelope = compute_envelope(samples, sample_rate, request, width, level);
        self.rasterize(surface, &envelope, &stops, height);

        let elapsed = started.elapsed();
        let over_budget = elapsed > self.budget;
        if over_budget {
            log::warn!(
                "waveform render took {:.2}ms (budget {:.2}ms), {} columns at detail level {}",
                elapsed.as_secs_f64() * 1000.0,
                self.budget.as_secs_f64() * 1000.0,
                width,
                level
            );
        }
        RenderReport {
            detail_level: level,
            samples_inspected: envelope.samples_inspected,
            measured_max_amplitude: measured,
            gradient,
            columns: width,
            elapsed,
            over_budget,
            blank: false,
        }
    }

    fn rasterize(&self, surface: &mut WaveformSurface, envelope: &Envelope, stops: &[Color32; 3], height: usize) {
        let center = height as f32 / 2.0;
        let amp = self.style.amplitude_scale;
        let to_y = |v: f32| (center - v.clamp(-1.0, 1.0) * center * amp).round().clamp(0.0, (height - 1) as f32) as usize;
        let color_at = |y: usize| sample_gradient(stops, ((y as f32 + 0.5 - center).abs() / center).min(1.0));

        let mut previous: Option<(usize, usize)> = None;
        for (x, span) in envelope.columns.iter().enumerate() {
            let Some(span) = span else {
                previous = None;
                continue;
            };
            let top = to_y(span.max);
            let bottom = to_y(span.min).max(top);

            for y in top..=bottom {
                surface.put(x, y, with_alpha(color_at(y), self.style.fill_opacity));
            }
            // 描边：与上一列的上下边缘连起来
            let (prev_top, prev_bottom) = previous.unwrap_or((top, bottom));
            for y in prev_top.min(top)..=prev_top.max(top) {
                surface.put(x, y, color_at(y));
            }
            for y in prev_bottom.min(bottom)..=prev_bottom.max(bottom) {
                surface.put(x, y, color_at(y));
            }
            previous = Some((top, bottom));
        }
    }
}

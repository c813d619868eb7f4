//! 音频资源模块
//!
//! 编辑器本身不做解码，解码后的采样由宿主通过 [`AssetProvider`] 提供。

use std::collections::HashMap;
use std::sync::Arc;

use crate::structure::BufferId;

/// 解码后的音频缓冲（每个声道一组浮点采样）
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// 采样帧数（取最短声道）
    pub fn len(&self) -> usize {
        self.channels.iter().map(|c| c.len()).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn time_to_sample(&self, time: f64) -> usize {
        (time.max(0.0) * self.sample_rate as f64).round() as usize
    }

    pub fn sample_to_time(&self, index: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        index as f64 / self.sample_rate as f64
    }
}

/// 宿主的资源服务
pub trait AssetProvider {
    fn buffer(&self, id: &BufferId) -> Option<Arc<AudioBuffer>>;
}

/// 基于 HashMap 的简单资源库，示例程序和测试使用
#[derive(Clone, Debug, Default)]
pub struct AssetLibrary {
    buffers: HashMap<BufferId, Arc<AudioBuffer>>,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<BufferId>, buffer: AudioBuffer) -> Arc<AudioBuffer> {
        let buffer = Arc::new(buffer);
        self.buffers.insert(id.into(), buffer.clone());
        buffer
    }

    pub fn remove(&mut self, id: &BufferId) -> Option<Arc<AudioBuffer>> {
        self.buffers.remove(id)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl AssetProvider for AssetLibrary {
    fn buffer(&self, id: &BufferId) -> Option<Arc<AudioBuffer>> {
        self.buffers.get(id).cloned()
    }
}

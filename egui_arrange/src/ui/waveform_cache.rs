use std::collections::HashMap;

use egui::{Context, TextureHandle, TextureId, TextureOptions};

use crate::asset::AudioBuffer;
use crate::structure::ClipId;
use crate::waveform::{RenderReport, WaveformRenderer, WaveformRequest, WaveformSurface};

struct CachedWaveform {
    surface: WaveformSurface,
    request: WaveformRequest,
    texture: TextureHandle,
}

/// 每个剪辑一张波形纹理，只有请求变化（可见窗口、缩放、模式、颜色、尺寸）时才重新渲染
#[derive(Default)]
pub struct WaveformCache {
    entries: HashMap<ClipId, CachedWaveform>,
    last_report: Option<RenderReport>,
}

impl WaveformCache {
    pub fn texture(
        &mut self,
        ctx: &Context,
        clip_id: ClipId,
        request: WaveformRequest,
        buffer: Option<&AudioBuffer>,
        renderer: &WaveformRenderer,
    ) -> TextureId {
        if let Some(entry) = self.entries.get_mut(&clip_id) {
            if entry.request != request {
                let report = renderer.render(&mut entry.surface, &request, buffer);
                entry.texture.set(entry.surface.image().clone(), TextureOptions::LINEAR);
                entry.request = request;
                self.last_report = Some(report);
            }
            return entry.texture.id();
        }

        let mut surface = WaveformSurface::new();
        let report = renderer.render(&mut surface, &request, buffer);
        let texture = ctx.load_texture(
            format!("waveform-{}", clip_id.0),
            surface.image().clone(),
            TextureOptions::LINEAR,
        );
        let id = texture.id();
        self.entries.insert(
            clip_id,
            CachedWaveform {
                surface,
                request,
                texture,
            },
        );
        self.last_report = Some(report);
        id
    }

    /// 丢弃已删除剪辑的纹理
    pub fn retain(&mut self, mut keep: impl FnMut(ClipId) -> bool) {
        self.entries.retain(|id, _| keep(*id));
    }

    pub fn last_report(&self) -> Option<&RenderReport> {
        self.last_report.as_ref()
    }
}

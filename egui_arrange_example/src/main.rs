use std::f32::consts::TAU;
use std::sync::Arc;

use eframe::egui;
use egui_arrange::{
    ArrangeCommand, ArrangeEditor, ArrangeEvent, ArrangeOptions, ArrangementSnapshot, AssetLibrary, AudioBuffer,
    AutomationLaneKey, BufferId, TransportState,
};

const SAMPLE_RATE: u32 = 44_100;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "egui_arrange Example",
        native_options,
        Box::new(|_cc| Ok(Box::new(ArrangeApp::new()))),
    )
}

/// 衰减的正弦音，振幅逐渐降低，便于观察不同的渐变
fn decaying_tone(freq: f32, seconds: f32, peak: f32) -> AudioBuffer {
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    let samples = (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            peak * (-t * 0.6).exp() * (TAU * freq * t).sin()
        })
        .collect();
    AudioBuffer::mono(SAMPLE_RATE, samples)
}

fn noise_burst(seconds: f32, peak: f32) -> AudioBuffer {
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    // 固定种子，每次启动得到同样的波形
    let mut rng = fastrand::Rng::with_seed(0x2545_f491);
    let samples = (0..len)
        .map(|i| {
            let env = 1.0 - (i % SAMPLE_RATE as usize) as f32 / SAMPLE_RATE as f32;
            peak * env * (rng.f32() * 2.0 - 1.0)
        })
        .collect();
    AudioBuffer::mono(SAMPLE_RATE, samples)
}

struct ArrangeApp {
    editor: ArrangeEditor,
    transport: TransportState,
}

impl ArrangeApp {
    fn new() -> Self {
        let mut library = AssetLibrary::new();
        library.insert("bass", decaying_tone(55.0, 8.0, 0.95));
        library.insert("pad", decaying_tone(220.0, 6.0, 0.6));
        library.insert("hats", noise_burst(4.0, 0.3));

        let mut editor = ArrangeEditor::new(ArrangeOptions::default());
        editor.set_assets(Arc::new(library));

        for name in ["Bass", "Pad", "Hats"] {
            editor.execute_command(ArrangeCommand::CreateTrack { name: name.to_string() });
        }

        let tracks: Vec<_> = editor.tracks().iter().map(|t| t.id).collect();
        let clips = [
            (0, "bass", 0.0, 4.0),
            (0, "bass", 4.0, 3.0),
            (1, "pad", 1.0, 5.0),
            (2, "hats", 0.5, 2.0),
            (2, "hats", 3.0, 2.0),
        ];
        for (track, buffer, start, duration) in clips {
            if let Some(&track_id) = tracks.get(track) {
                editor.execute_command(ArrangeCommand::CreateClip {
                    track_id,
                    buffer_id: Some(BufferId::from(buffer)),
                    start,
                    duration,
                });
            }
        }

        if let Some(&track_id) = tracks.get(1) {
            let key = AutomationLaneKey::new(track_id, "filter", "cutoff");
            for (time, value) in [(0.0, 0.2), (2.0, 1.0), (4.0, 0.6), (6.0, 0.9)] {
                editor.execute_command(ArrangeCommand::AddAutomationPoint {
                    key: key.clone(),
                    time,
                    value,
                });
            }
        }
        editor.take_events();

        Self {
            editor,
            transport: TransportState::default(),
        }
    }

    fn save(&self) {
        let Some(path) = rfd::FileDialog::new().add_filter("Arrangement", &["json"]).save_file() else {
            return;
        };
        let result = self
            .editor
            .snapshot()
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
        match result {
            Ok(()) => log::info!("saved arrangement to {}", path.display()),
            Err(e) => log::error!("failed to save {}: {}", path.display(), e),
        }
    }

    fn load(&mut self) {
        let Some(path) = rfd::FileDialog::new().add_filter("Arrangement", &["json"]).pick_file() else {
            return;
        };
        let result = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| ArrangementSnapshot::from_json(&json).map_err(|e| e.to_string()));
        match result {
            Ok(snapshot) => self.editor.load_snapshot(snapshot),
            Err(e) => log::error!("failed to load {}: {}", path.display(), e),
        }
    }
}

impl eframe::App for ArrangeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.transport.is_playing {
            self.transport.position_seconds += ctx.input(|i| i.stable_dt) as f64;
        }
        self.editor.execute_command(ArrangeCommand::SetTransport(self.transport));

        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open…").clicked() {
                    self.load();
                }
                if ui.button("Save…").clicked() {
                    ArrangeApp::save(self);
                }
                ui.separator();
                let label = if self.transport.is_playing { "Pause" } else { "Play" };
                if ui.button(label).clicked() {
                    self.transport.is_playing = !self.transport.is_playing;
                }
                if ui.button("Stop").clicked() {
                    self.transport = TransportState::default();
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.editor.ui(ui);
        });

        for event in self.editor.take_events() {
            if let ArrangeEvent::SeekRequested { position } = event {
                self.transport.position_seconds = position;
            }
            log::info!("[ArrangeEvent] {:?}", event);
        }
    }
}

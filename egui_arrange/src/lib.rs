//! # egui_arrange
//!
//! DAW 风格的编排（arrangement）时间线组件库。
//!
//! ## 功能特性
//!
//! - **时间网格**：时间与像素互换、以锚点缩放、按缩放和能量自适应的吸附细分
//! - **剪辑变换**：移动、左右裁剪、淡入淡出、增益，支持波纹模式和 Alt 拖拽复制
//! - **过零点对齐**：左边缘裁剪可对齐到附近的过零点
//! - **波形渲染**：按缩放选择细节级别，按振幅选择渐变
//! - **自动化通道**：添加、拖拽、拖出通道删除控制点
//!
//! ## 基本使用
//!
//! ```ignore
//! use egui_arrange::{ArrangeEditor, ArrangeOptions};
//!
//! let mut editor = ArrangeEditor::new(ArrangeOptions::default());
//!
//! // 在 egui UI 中使用
//! editor.ui(ui);
//! ```
//!
//! ## 集成到宿主应用
//!
//! ```ignore
//! use egui_arrange::{ArrangeCommand, ArrangeEditor, ArrangeEvent, ArrangeOptions};
//!
//! let mut editor = ArrangeEditor::new(ArrangeOptions::default());
//!
//! editor.set_event_listener(Box::new(|event| {
//!     if let ArrangeEvent::SeekRequested { position } = event {
//!         transport.seek(*position);
//!     }
//! }));
//!
//! editor.execute_command(ArrangeCommand::CreateTrack { name: "Drums".into() });
//! editor.ui(ui);
//! ```
//!
//! 指针处理也可以不经过 egui 直接驱动（`pointer_down` / `pointer_move` / `pointer_up`），
//! 坐标为编辑区内坐标。

pub mod arrangement;
pub mod asset;
pub mod automation;
pub mod editor;
pub mod grid;
pub mod layout;
pub mod snapshot;
pub mod structure;
pub mod transform;
pub mod ui;
pub mod utils;
pub mod waveform;
pub mod zero_crossing;

pub use arrangement::Arrangement;
pub use asset::{AssetLibrary, AssetProvider, AudioBuffer};
pub use automation::{AutomationLane, AutomationLaneEditor, LaneGeometry};
pub use editor::{ArrangeCommand, ArrangeEvent, ArrangeOptions, PointerModifiers, SnapMode, TransportState};
pub use grid::{Tempo, TimeGrid};
pub use layout::{ClipHitRegion, LaneLayout};
pub use snapshot::ArrangementSnapshot;
pub use structure::{
    AutomationLaneKey, AutomationPoint, BufferId, Clip, ClipId, FadeCurve, GroupId, PointId, TimeRange, Track,
    TrackId,
};
pub use transform::{ClipTransformEngine, DragContext, DragKind, DragOutcome};
pub use ui::ArrangeEditor;
pub use waveform::{WaveformMode, WaveformRenderer, WaveformRequest, WaveformStyle};
pub use zero_crossing::ZeroCrossingFinder;

use std::sync::Arc;

use egui::pos2;
use egui_arrange::{
    ArrangeCommand, ArrangeEditor, ArrangeEvent, ArrangeOptions, ArrangementSnapshot, AssetLibrary, AudioBuffer,
    AutomationLaneKey, BufferId, Clip, ClipId, PointerModifiers, TimeRange, TrackId,
};

// 默认选项：100 px/s，轨道高 80，自动化通道高 60，120 BPM 下吸附步长 0.25 秒

fn editor_with_tracks(count: usize) -> (ArrangeEditor, Vec<TrackId>) {
    let mut editor = ArrangeEditor::new(ArrangeOptions::default());
    for i in 0..count {
        editor.execute_command(ArrangeCommand::CreateTrack {
            name: format!("Track {}", i + 1),
        });
    }
    editor.take_events();
    let tracks = editor.tracks().iter().map(|t| t.id).collect();
    (editor, tracks)
}

fn add_clip(editor: &mut ArrangeEditor, track: TrackId, start: f64, duration: f64) -> ClipId {
    editor.add_clip(Clip::new(track, start, duration, "clip".into()))
}

fn start_of(editor: &ArrangeEditor, id: ClipId) -> f64 {
    editor.clip(id).map(|c| c.start).unwrap()
}

fn drag(editor: &mut ArrangeEditor, from: (f32, f32), to: (f32, f32), modifiers: PointerModifiers) {
    editor.pointer_down(pos2(from.0, from.1), modifiers);
    editor.pointer_move(pos2(to.0, to.1), modifiers);
    editor.pointer_up(pos2(to.0, to.1), modifiers);
}

#[test]
fn move_without_ripple_leaves_neighbours() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 1.0);
    let b = add_clip(&mut editor, tracks[0], 1.5, 1.0);

    drag(&mut editor, (50.0, 40.0), (100.0, 40.0), PointerModifiers::NONE);

    assert_eq!(start_of(&editor, a), 0.5);
    assert_eq!(start_of(&editor, b), 1.5);
    let events = editor.take_events();
    let moved = events.iter().find_map(|e| match e {
        ArrangeEvent::ClipsMoved { before, after } => Some((before.clone(), after.clone())),
        _ => None,
    });
    let (before, after) = moved.expect("ClipsMoved emitted");
    assert_eq!(after.len(), 1);
    assert_eq!(before[0].start, 0.0);
    assert_eq!(after[0].start, 0.5);
}

#[test]
fn ripple_pushes_later_clips_on_same_track() {
    let (mut editor, tracks) = editor_with_tracks(2);
    let a = add_clip(&mut editor, tracks[0], 0.0, 1.0);
    let b = add_clip(&mut editor, tracks[0], 1.5, 1.0);
    let c = add_clip(&mut editor, tracks[1], 1.5, 1.0);
    editor.execute_command(ArrangeCommand::SetRipple(true));

    drag(&mut editor, (50.0, 40.0), (100.0, 40.0), PointerModifiers::NONE);

    assert_eq!(start_of(&editor, a), 0.5);
    assert_eq!(start_of(&editor, b), 2.0);
    // 其他轨道不受影响
    assert_eq!(start_of(&editor, c), 1.5);
}

#[test]
fn shift_enables_ripple_for_one_gesture() {
    let (mut editor, tracks) = editor_with_tracks(1);
    add_clip(&mut editor, tracks[0], 0.0, 1.0);
    let b = add_clip(&mut editor, tracks[0], 2.0, 1.0);

    drag(&mut editor, (50.0, 40.0), (75.0, 40.0), PointerModifiers::shift());
    assert_eq!(start_of(&editor, b), 2.25);
    assert!(!editor.options().ripple);
}

#[test]
fn move_changes_track_of_primary_clip() {
    let (mut editor, tracks) = editor_with_tracks(2);
    let a = add_clip(&mut editor, tracks[0], 1.0, 1.0);

    drag(&mut editor, (150.0, 40.0), (150.0, 120.0), PointerModifiers::NONE);

    let clip = editor.clip(a).unwrap();
    assert_eq!(clip.track_id, tracks[1]);
    assert_eq!(clip.start, 1.0);
}

#[test]
fn alt_drag_duplicates_selection_once() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 1.0);
    let b = add_clip(&mut editor, tracks[0], 2.0, 1.0);
    editor.execute_command(ArrangeCommand::SelectAll);
    editor.take_events();

    let alt = PointerModifiers::alt();
    editor.pointer_down(pos2(50.0, 40.0), alt);
    editor.pointer_move(pos2(150.0, 40.0), alt);
    editor.pointer_move(pos2(250.0, 40.0), alt);
    editor.pointer_up(pos2(250.0, 40.0), alt);

    assert_eq!(editor.arrangement().clips().len(), 4);
    assert_eq!(start_of(&editor, a), 0.0);
    assert_eq!(start_of(&editor, b), 2.0);
    assert!(!editor.clip(a).unwrap().selected);

    let mut clone_starts: Vec<f64> = editor
        .arrangement()
        .clips()
        .iter()
        .filter(|c| c.id != a && c.id != b)
        .map(|c| c.start)
        .collect();
    clone_starts.sort_by(f64::total_cmp);
    assert_eq!(clone_starts, vec![2.0, 4.0]);

    let duplicated: Vec<_> = editor
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, ArrangeEvent::ClipsDuplicated { .. }))
        .collect();
    assert_eq!(duplicated.len(), 1);
}

#[test]
fn cancel_restores_pre_drag_state() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 1.0);

    editor.pointer_down(pos2(50.0, 40.0), PointerModifiers::alt());
    editor.pointer_move(pos2(250.0, 40.0), PointerModifiers::alt());
    assert_eq!(editor.arrangement().clips().len(), 2);

    editor.cancel_gesture();

    assert!(!editor.is_dragging());
    assert_eq!(editor.arrangement().clips().len(), 1);
    assert_eq!(start_of(&editor, a), 0.0);
    assert!(editor
        .take_events()
        .iter()
        .any(|e| matches!(e, ArrangeEvent::DragCancelled)));
}

#[test]
fn fade_and_gain_handles_are_clamped() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 2.0);

    // 增益手柄在顶部中间，向上拖增大
    drag(&mut editor, (100.0, 6.0), (100.0, -44.0), PointerModifiers::NONE);
    assert!((editor.clip(a).unwrap().gain - 1.5).abs() < 1e-9);

    drag(&mut editor, (100.0, 6.0), (100.0, -400.0), PointerModifiers::NONE);
    assert_eq!(editor.clip(a).unwrap().gain, 2.0);

    // 淡入手柄在左上角，最长为时长的一半
    drag(&mut editor, (2.0, 6.0), (52.0, 6.0), PointerModifiers::NONE);
    assert_eq!(editor.clip(a).unwrap().fade_in, 0.5);

    drag(&mut editor, (52.0, 6.0), (900.0, 6.0), PointerModifiers::NONE);
    assert_eq!(editor.clip(a).unwrap().fade_in, 1.0);

    let events = editor.take_events();
    assert!(events.iter().any(|e| matches!(e, ArrangeEvent::FadeChanged { .. })));
    assert!(events.iter().any(|e| matches!(e, ArrangeEvent::GainChanged { .. })));
}

#[test]
fn resize_right_stops_at_asset_end() {
    let mut library = AssetLibrary::new();
    library.insert("tone", AudioBuffer::mono(1000, vec![0.1; 2500]));

    let (mut editor, tracks) = editor_with_tracks(1);
    editor.set_assets(Arc::new(library));
    editor.execute_command(ArrangeCommand::CreateClip {
        track_id: tracks[0],
        buffer_id: Some(BufferId::from("tone")),
        start: 0.0,
        duration: 2.0,
    });
    let id = editor
        .take_events()
        .iter()
        .find_map(|e| match e {
            ArrangeEvent::ClipCreated { clip_id } => Some(*clip_id),
            _ => None,
        })
        .unwrap();
    assert_eq!(editor.clip(id).unwrap().original_duration, 2.5);

    drag(&mut editor, (198.0, 40.0), (500.0, 40.0), PointerModifiers::NONE);

    assert_eq!(editor.clip(id).unwrap().duration, 2.5);
    assert!(editor
        .take_events()
        .iter()
        .any(|e| matches!(e, ArrangeEvent::ClipResized { .. })));
}

#[test]
fn automation_point_added_then_dragged_out() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let key = AutomationLaneKey::new(tracks[0], "eq", "gain");
    editor.ensure_automation_lane(key.clone());

    // 通道位于 y = 80..140
    editor.pointer_down(pos2(100.0, 110.0), PointerModifiers::NONE);
    editor.pointer_up(pos2(100.0, 110.0), PointerModifiers::NONE);

    let lane = editor.arrangement().automation_lane(&key).unwrap();
    assert_eq!(lane.len(), 1);
    assert!((lane.points()[0].time - 1.0).abs() < 1e-9);
    assert!((lane.points()[0].value - 0.6).abs() < 1e-6);

    // 抓住这个点，拖到通道下方 25 px
    editor.pointer_down(pos2(100.0, 110.0), PointerModifiers::NONE);
    editor.pointer_move(pos2(120.0, 100.0), PointerModifiers::NONE);
    editor.pointer_move(pos2(120.0, 165.0), PointerModifiers::NONE);
    editor.pointer_up(pos2(120.0, 165.0), PointerModifiers::NONE);

    assert!(editor.arrangement().automation_lane(&key).unwrap().is_empty());
    let events = editor.take_events();
    assert!(matches!(events[0], ArrangeEvent::AutomationPointAdded { .. }));
    assert!(matches!(events[1], ArrangeEvent::AutomationPointUpdated { .. }));
    assert!(matches!(events[2], ArrangeEvent::AutomationPointRemoved { .. }));
}

#[test]
fn empty_area_drag_selects_time_range() {
    let (mut editor, tracks) = editor_with_tracks(2);
    add_clip(&mut editor, tracks[0], 0.0, 1.0);

    drag(&mut editor, (700.0, 40.0), (500.0, 40.0), PointerModifiers::NONE);

    assert_eq!(editor.range_selection(), Some(TimeRange::new(5.0, 7.0)));
    assert!(editor
        .take_events()
        .iter()
        .any(|e| matches!(e, ArrangeEvent::RangeSelectionChanged(Some(_)))));
}

#[test]
fn shift_release_turns_range_into_clip_selection() {
    let (mut editor, tracks) = editor_with_tracks(2);
    let a = add_clip(&mut editor, tracks[0], 5.5, 0.5);
    let b = add_clip(&mut editor, tracks[1], 5.5, 0.5);

    editor.pointer_down(pos2(500.0, 40.0), PointerModifiers::NONE);
    editor.pointer_move(pos2(700.0, 40.0), PointerModifiers::NONE);
    editor.pointer_up(pos2(700.0, 40.0), PointerModifiers::shift());

    assert_eq!(editor.range_selection(), None);
    assert!(editor.clip(a).unwrap().selected);
    assert!(!editor.clip(b).unwrap().selected);
}

#[test]
fn split_and_delete_commands_emit_events() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 2.0);

    editor.execute_command(ArrangeCommand::SplitClip { clip_id: a, time: 0.5 });
    assert_eq!(editor.arrangement().clips().len(), 2);
    assert_eq!(editor.clip(a).unwrap().duration, 0.5);

    editor.execute_command(ArrangeCommand::SelectAll);
    editor.execute_command(ArrangeCommand::DeleteSelected);
    assert!(editor.arrangement().clips().is_empty());

    let events = editor.take_events();
    assert!(events.iter().any(|e| matches!(e, ArrangeEvent::ClipSplit { .. })));
    let deleted = events
        .iter()
        .filter(|e| matches!(e, ArrangeEvent::ClipDeleted(_)))
        .count();
    assert_eq!(deleted, 2);
}

#[test]
fn tempo_and_energy_drive_snap_division() {
    let (mut editor, _) = editor_with_tracks(0);
    // 一拍 50 px
    assert_eq!(editor.grid().division, 8);

    editor.execute_command(ArrangeCommand::SetEnergy(0.9));
    assert_eq!(editor.grid().division, 16);

    editor.execute_command(ArrangeCommand::SetTempo {
        bpm: 60.0,
        beats_per_bar: 4,
    });
    // 一拍 100 px
    assert_eq!(editor.grid().division, 32);
}

#[test]
fn snapshot_reload_keeps_content() {
    let (mut editor, tracks) = editor_with_tracks(2);
    add_clip(&mut editor, tracks[1], 1.0, 2.0);
    let key = AutomationLaneKey::new(tracks[0], "filter", "cutoff");
    editor.execute_command(ArrangeCommand::AddAutomationPoint {
        key: key.clone(),
        time: 1.0,
        value: 0.5,
    });

    let json = editor.snapshot().to_json().unwrap();
    let mut restored = ArrangeEditor::default();
    restored.load_snapshot(ArrangementSnapshot::from_json(&json).unwrap());

    assert_eq!(restored.tracks().len(), 2);
    assert_eq!(restored.arrangement().clips().len(), 1);
    assert_eq!(restored.arrangement().automation_lane(&key).unwrap().len(), 1);
    assert_eq!(restored.layout().total_height(), editor.layout().total_height());
}

#[test]
fn command_drag_on_empty_space_clears_clip_selection() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 1.0);
    editor.execute_command(ArrangeCommand::SelectAll);
    editor.take_events();

    drag(&mut editor, (500.0, 40.0), (700.0, 40.0), PointerModifiers::command());

    assert_eq!(editor.range_selection(), Some(TimeRange::new(5.0, 7.0)));
    assert!(!editor.clip(a).unwrap().selected);
    assert!(editor.arrangement().selected_ids().is_empty());
    assert!(editor
        .take_events()
        .iter()
        .any(|e| matches!(e, ArrangeEvent::SelectionChanged(ids) if ids.is_empty())));
}

#[test]
fn split_outside_clip_is_skipped() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 1.0, 1.0);

    editor.execute_command(ArrangeCommand::SplitClip { clip_id: a, time: 4.0 });

    assert_eq!(editor.arrangement().clips().len(), 1);
    assert_eq!(editor.clip(a).unwrap().duration, 1.0);
    assert!(!editor
        .take_events()
        .iter()
        .any(|e| matches!(e, ArrangeEvent::ClipSplit { .. })));
}

#[test]
fn undo_and_redo_move() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 1.0);

    drag(&mut editor, (50.0, 40.0), (100.0, 40.0), PointerModifiers::NONE);
    assert_eq!(start_of(&editor, a), 0.5);
    editor.take_events();

    assert!(editor.undo());
    assert_eq!(start_of(&editor, a), 0.0);
    assert!(editor.can_redo());
    assert!(editor
        .take_events()
        .iter()
        .any(|e| matches!(e, ArrangeEvent::ArrangementReplaced)));

    editor.execute_command(ArrangeCommand::Redo);
    assert_eq!(start_of(&editor, a), 0.5);
    assert!(!editor.can_redo());
}

#[test]
fn undo_split_then_delete_in_order() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 2.0);

    editor.execute_command(ArrangeCommand::SplitClip { clip_id: a, time: 0.5 });
    editor.execute_command(ArrangeCommand::SelectAll);
    editor.execute_command(ArrangeCommand::DeleteSelected);
    assert!(editor.arrangement().clips().is_empty());

    // 一次删除多个剪辑只占一步
    editor.execute_command(ArrangeCommand::Undo);
    assert_eq!(editor.arrangement().clips().len(), 2);

    editor.execute_command(ArrangeCommand::Undo);
    assert_eq!(editor.arrangement().clips().len(), 1);
    assert_eq!(editor.clip(a).unwrap().duration, 2.0);
}

#[test]
fn undo_automation_drag_then_add() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let key = AutomationLaneKey::new(tracks[0], "eq", "gain");
    editor.ensure_automation_lane(key.clone());

    editor.pointer_down(pos2(100.0, 110.0), PointerModifiers::NONE);
    editor.pointer_up(pos2(100.0, 110.0), PointerModifiers::NONE);
    drag(&mut editor, (100.0, 110.0), (200.0, 110.0), PointerModifiers::NONE);
    let time_of = |editor: &ArrangeEditor| editor.arrangement().automation_lane(&key).unwrap().points()[0].time;
    assert!((time_of(&editor) - 2.0).abs() < 1e-9);

    assert!(editor.undo());
    assert!((time_of(&editor) - 1.0).abs() < 1e-9);

    assert!(editor.undo());
    assert!(editor.arrangement().automation_lane(&key).unwrap().is_empty());
}

#[test]
fn new_edit_clears_redo() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 1.0);

    drag(&mut editor, (50.0, 40.0), (100.0, 40.0), PointerModifiers::NONE);
    editor.undo();
    assert!(editor.can_redo());

    editor.execute_command(ArrangeCommand::SplitClip { clip_id: a, time: 0.5 });
    assert!(!editor.can_redo());
    assert!(!editor.redo());
}

#[test]
fn cancelled_drag_leaves_history_alone() {
    let (mut editor, tracks) = editor_with_tracks(1);
    let a = add_clip(&mut editor, tracks[0], 0.0, 1.0);
    editor.execute_command(ArrangeCommand::SplitClip { clip_id: a, time: 0.5 });

    editor.pointer_down(pos2(20.0, 40.0), PointerModifiers::NONE);
    editor.pointer_move(pos2(120.0, 40.0), PointerModifiers::NONE);
    editor.cancel_gesture();

    // 撤销的是拆分，而不是被取消的拖拽
    assert!(editor.undo());
    assert_eq!(editor.arrangement().clips().len(), 1);
    assert_eq!(start_of(&editor, a), 0.0);
}

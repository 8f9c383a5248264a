use glam::Vec3;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use swarmclip_core::{AgentSnapshot, ForceRole, Frame, FrameError, FrameSource, FORCE_SLOTS};
use swarmclip_record::{
    load_clip, ClipRecorder, RecorderConfig, DATA_HEADER, METADATA_HEADER,
};

struct ScriptedSource {
    frames: RefCell<Vec<Frame>>,
}

impl ScriptedSource {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: RefCell::new(frames),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn snapshot_frame(&self) -> Result<Frame, FrameError> {
        Ok(self.frames.borrow_mut().remove(0))
    }
}

fn agent(position: Vec3, direction: Vec3, acceleration: Vec3) -> AgentSnapshot {
    AgentSnapshot {
        position,
        direction,
        acceleration,
        forces: vec![Vec3::ZERO; FORCE_SLOTS],
    }
}

fn config_in(dir: &Path) -> RecorderConfig {
    RecorderConfig {
        clip_dir: dir.join("clips"),
        csv_dir: dir.join("csv"),
        sample_rate_hz: 1,
        save_clip_snapshot: true,
        save_metadata: true,
    }
}

fn find_file(dir: &Path, suffix: &str) -> PathBuf {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").path())
        .filter(|path| path.to_string_lossy().ends_with(suffix))
        .collect();
    assert_eq!(matches.len(), 1, "expected exactly one {suffix} file");
    matches.pop().expect("match")
}

#[test]
fn full_session_writes_all_three_outputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut recorder = ClipRecorder::new(config_in(dir.path())).expect("recorder");

    let two_agents = Frame::new(vec![
        agent(Vec3::new(0.0, 0.0, 0.0), Vec3::X, Vec3::ZERO),
        agent(Vec3::new(2.0, 0.0, 4.0), Vec3::Z, Vec3::ZERO),
    ])
    .expect("frame");
    let source = ScriptedSource::new(vec![two_agents.clone(); 3]);

    recorder.toggle(0.0).expect("start");
    for tick in 1..=3 {
        assert!(recorder.on_tick(&source, f64::from(tick)).captured);
    }
    recorder.toggle(3.0).expect("stop");
    assert!(recorder.on_tick(&source, 4.0).finalized);

    // Data CSV: header plus frames x agents rows, frame-major.
    let data = fs::read_to_string(find_file(&dir.path().join("csv"), "_data.csv")).expect("data");
    let lines: Vec<&str> = data.lines().collect();
    assert_eq!(lines.len(), 1 + 3 * 2);
    assert_eq!(lines[0], DATA_HEADER);
    for frame_index in 0..3 {
        for ordinal in 0..2 {
            let line = lines[1 + frame_index * 2 + ordinal];
            assert!(line.starts_with(&format!("{frame_index},{ordinal},")));
        }
    }

    // Metadata CSV: same row count, historical header bytes.
    let meta =
        fs::read_to_string(find_file(&dir.path().join("csv"), "_metadata.csv")).expect("meta");
    let meta_lines: Vec<&str> = meta.lines().collect();
    assert_eq!(meta_lines.len(), 1 + 3 * 2);
    assert_eq!(meta_lines[0], METADATA_HEADER);

    // Binary snapshot round-trips through postcard.
    let clip = load_clip(&find_file(&dir.path().join("clips"), ".dat")).expect("clip");
    assert_eq!(clip.frames.len(), 3);
    assert_eq!(clip.frames[0], two_agents);
}

#[test]
fn quarter_turn_example_is_byte_exact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut recorder = ClipRecorder::new(RecorderConfig {
        save_clip_snapshot: false,
        save_metadata: false,
        ..config_in(dir.path())
    })
    .expect("recorder");

    let first = Frame::new(vec![agent(Vec3::ZERO, Vec3::X, Vec3::X)]).expect("frame");
    let mut turned = agent(Vec3::ZERO, Vec3::Y, Vec3::X);
    turned.forces[ForceRole::Cohesion.slot()] = Vec3::X;
    let second = Frame::new(vec![turned]).expect("frame");
    let source = ScriptedSource::new(vec![first, second]);

    recorder.toggle(0.0).expect("start");
    recorder.on_tick(&source, 1.0);
    recorder.on_tick(&source, 2.0);

    let data = fs::read_to_string(find_file(&dir.path().join("csv"), "_data.csv")).expect("data");
    // Frame 0: first observation, all-zero forces still attribute cohesion.
    // Frame 1: 90 degree turn, cohesion magnitude 1, aligned with the
    // acceleration, so cohesion stays dominant.
    assert_eq!(
        data,
        format!("{DATA_HEADER}\n0,0,0,0,0,0,0,0,0,0,0,1\n1,0,0,0,90,0,0,0,1,0,0,1\n")
    );
}

#[test]
fn restarting_a_session_clears_agent_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut recorder = ClipRecorder::new(RecorderConfig {
        save_clip_snapshot: false,
        save_metadata: false,
        ..config_in(dir.path())
    })
    .expect("recorder");

    let east = Frame::new(vec![agent(Vec3::ZERO, Vec3::X, Vec3::ZERO)]).expect("frame");
    let north = Frame::new(vec![agent(Vec3::ZERO, Vec3::Y, Vec3::ZERO)]).expect("frame");
    let source = ScriptedSource::new(vec![east, north]);

    recorder.toggle(0.0).expect("start");
    recorder.on_tick(&source, 1.0);
    recorder.toggle(1.0).expect("stop");
    assert!(recorder.on_tick(&source, 2.0).finalized);

    // Same agent ordinal, orthogonal direction: a fresh session must report a
    // first observation, not a 90 degree turn.
    recorder.toggle(2.0).expect("restart");
    recorder.on_tick(&source, 3.0);

    // Second-precision clip names may or may not collide across the two
    // sessions, so check every data CSV present: each holds one frame-0 row
    // with a zeroed direction change.
    let mut data_files = 0;
    for entry in fs::read_dir(dir.path().join("csv")).expect("csv dir") {
        let path = entry.expect("entry").path();
        if !path.to_string_lossy().ends_with("_data.csv") {
            continue;
        }
        data_files += 1;
        let data = fs::read_to_string(&path).expect("data");
        let lines: Vec<&str> = data.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("0,0,0,0,0,"));
    }
    assert!(data_files >= 1);
}

#[test]
fn disabled_exports_leave_only_the_data_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut recorder = ClipRecorder::new(RecorderConfig {
        save_clip_snapshot: false,
        save_metadata: false,
        ..config_in(dir.path())
    })
    .expect("recorder");

    let source = ScriptedSource::new(vec![
        Frame::new(vec![agent(Vec3::ZERO, Vec3::X, Vec3::ZERO)]).expect("frame"),
    ]);

    recorder.toggle(0.0).expect("start");
    recorder.on_tick(&source, 1.0);
    recorder.toggle(1.0).expect("stop");
    recorder.on_tick(&source, 2.0);

    let clip_entries = fs::read_dir(dir.path().join("clips")).expect("clips dir").count();
    assert_eq!(clip_entries, 0);
    let csv_entries: Vec<_> = fs::read_dir(dir.path().join("csv"))
        .expect("csv dir")
        .map(|entry| entry.expect("entry").path())
        .collect();
    assert_eq!(csv_entries.len(), 1);
    assert!(csv_entries[0].to_string_lossy().ends_with("_data.csv"));
}

#[test]
fn empty_session_finalize_is_a_quiet_no_op() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut recorder = ClipRecorder::new(config_in(dir.path())).expect("recorder");
    let source = ScriptedSource::new(Vec::new());

    recorder.toggle(0.0).expect("start");
    recorder.toggle(0.5).expect("stop");
    assert!(recorder.on_tick(&source, 1.0).finalized);

    // No frames: no .dat, no metadata; the data CSV holds only its header.
    assert_eq!(
        fs::read_dir(dir.path().join("clips")).expect("clips dir").count(),
        0
    );
    let data = fs::read_to_string(find_file(&dir.path().join("csv"), "_data.csv")).expect("data");
    assert_eq!(data, format!("{DATA_HEADER}\n"));
}

//! Clip recording pipeline for a running swarm simulation.
//!
//! An external fixed-rate scheduler drives [`ClipRecorder::on_tick`] once per
//! simulation tick. While a session is active and the sample gate passes, the
//! recorder pulls one immutable frame from the [`FrameSource`] collaborator,
//! derives per-agent feature rows, and appends them to the session's data
//! CSV. Stopping a session defers finalization by one tick; the next tick
//! writes the optional binary clip snapshot and metadata CSV, then drops the
//! buffered frames.
//!
//! Recording is best-effort: I/O failures are logged and skipped, never fatal
//! to the host loop.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use swarmclip_core::features::FeatureHistory;
use swarmclip_core::{features, Frame, FrameSource, SwarmClip};
use thiserror::Error;
use tracing::{debug, error, info, warn};

mod csv;

pub use csv::{DATA_HEADER, METADATA_HEADER};

/// Log recording progress every this many captured frames.
const PROGRESS_LOG_INTERVAL: usize = 50;

/// Errors surfaced by the recording pipeline.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Filesystem failure on a specific output path.
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Binary clip encoding failed.
    #[error("clip encoding failed: {0}")]
    Encode(#[from] postcard::Error),
    /// Invalid static configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl RecordError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Static configuration for a [`ClipRecorder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Directory receiving binary `.dat` clip snapshots.
    pub clip_dir: PathBuf,
    /// Directory receiving `_data.csv` and `_metadata.csv` exports.
    pub csv_dir: PathBuf,
    /// Samples captured per second of driver time; 0 disables capture.
    pub sample_rate_hz: u32,
    /// Whether finalize writes the binary clip snapshot.
    pub save_clip_snapshot: bool,
    /// Whether finalize writes the metadata CSV.
    pub save_metadata: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            clip_dir: PathBuf::from("RecordedClips"),
            csv_dir: PathBuf::from("Results"),
            sample_rate_hz: 20,
            save_clip_snapshot: true,
            save_metadata: true,
        }
    }
}

/// Highest sample rate the recorder accepts.
pub const MAX_SAMPLE_RATE_HZ: u32 = 50;

impl RecorderConfig {
    /// Validate static bounds.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.sample_rate_hz > MAX_SAMPLE_RATE_HZ {
            return Err(RecordError::InvalidConfig("sample_rate_hz exceeds 50"));
        }
        Ok(())
    }

    /// Seconds between samples; `None` when the gate never fires.
    #[must_use]
    fn sample_interval(&self) -> Option<f64> {
        if self.sample_rate_hz == 0 {
            None
        } else {
            Some(1.0 / f64::from(self.sample_rate_hz))
        }
    }
}

/// What a single scheduler tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// A frame was captured and its rows appended to the data CSV.
    pub captured: bool,
    /// A stopped session was finalized and its buffer dropped.
    pub finalized: bool,
}

/// Samples a [`FrameSource`] at a fixed rate and streams derived features.
///
/// Reusable across sessions: toggling back on reinitializes all per-session
/// state.
pub struct ClipRecorder {
    config: RecorderConfig,
    active: bool,
    pending_finalize: bool,
    frames: Vec<Frame>,
    history: FeatureHistory,
    last_sample_time: f64,
    clip_name: String,
    data_csv_path: PathBuf,
}

impl ClipRecorder {
    /// Build a recorder from validated configuration.
    pub fn new(config: RecorderConfig) -> Result<Self, RecordError> {
        config.validate()?;
        Ok(Self {
            config,
            active: false,
            pending_finalize: false,
            frames: Vec::new(),
            history: FeatureHistory::new(),
            last_sample_time: 0.0,
            clip_name: String::new(),
            data_csv_path: PathBuf::new(),
        })
    }

    /// Whether a session is currently active.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.active
    }

    /// Name of the current (or most recent) session's clip.
    #[must_use]
    pub fn clip_name(&self) -> &str {
        &self.clip_name
    }

    /// Frames buffered in the current session.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Flip the recording state.
    ///
    /// Turning recording on starts a session immediately; turning it off only
    /// marks the session for finalization, which the next inactive tick
    /// performs, keeping the stop request itself cheap.
    ///
    /// A session-start I/O failure is returned to the caller once but leaves
    /// the session active; subsequent appends degrade per tick.
    pub fn toggle(&mut self, now_seconds: f64) -> Result<bool, RecordError> {
        self.active = !self.active;
        if self.active {
            self.start_session(now_seconds)?;
        } else {
            self.pending_finalize = true;
            info!(clip = %self.clip_name, "recording stop requested");
        }
        Ok(self.active)
    }

    /// Advance the recorder by one scheduler tick at `now_seconds`.
    ///
    /// Never fails: capture and finalize errors are logged and the affected
    /// data is skipped.
    pub fn on_tick(&mut self, source: &dyn FrameSource, now_seconds: f64) -> TickOutcome {
        if self.active {
            self.pending_finalize = false;
            let Some(interval) = self.config.sample_interval() else {
                return TickOutcome::default();
            };
            if now_seconds - self.last_sample_time >= interval {
                let captured = self.capture_frame(source);
                self.last_sample_time = now_seconds;
                return TickOutcome {
                    captured,
                    finalized: false,
                };
            }
            TickOutcome::default()
        } else if self.pending_finalize {
            self.finalize_session();
            self.frames.clear();
            self.pending_finalize = false;
            TickOutcome {
                captured: false,
                finalized: true,
            }
        } else {
            TickOutcome::default()
        }
    }

    fn start_session(&mut self, now_seconds: f64) -> Result<(), RecordError> {
        self.frames.clear();
        self.history.clear();
        self.pending_finalize = false;
        self.last_sample_time = now_seconds;
        self.clip_name = format!("clip_{}", Local::now().format("%Y-%m-%d_%H%M%S"));
        self.data_csv_path = self
            .config
            .csv_dir
            .join(format!("{}_data.csv", self.clip_name));
        info!(clip = %self.clip_name, path = %self.data_csv_path.display(), "recording session started");

        ensure_dir(&self.config.clip_dir)?;
        ensure_dir(&self.config.csv_dir)?;
        csv::write_data_header(&self.data_csv_path)
    }

    fn capture_frame(&mut self, source: &dyn FrameSource) -> bool {
        let frame = match source.snapshot_frame() {
            Ok(frame) => frame,
            Err(err) => {
                error!(%err, "frame capture rejected");
                return false;
            }
        };
        let frame_index = self.frames.len();
        let rows = features::extract_rows(&frame, frame_index, &mut self.history);
        self.frames.push(frame);

        if let Err(err) = csv::append_feature_rows(&self.data_csv_path, &rows) {
            warn!(%err, "feature rows for this tick were dropped");
        }
        if self.frames.len() % PROGRESS_LOG_INTERVAL == 0 {
            debug!(clip = %self.clip_name, frames = self.frames.len(), "recording progress");
        }
        true
    }

    fn finalize_session(&mut self) {
        if self.frames.is_empty() {
            info!("no frames buffered, nothing to finalize");
            return;
        }
        info!(clip = %self.clip_name, frames = self.frames.len(), "finalizing recording");

        if self.config.save_clip_snapshot {
            let path = self.config.clip_dir.join(format!("{}.dat", self.clip_name));
            match save_clip(&path, &self.frames) {
                Ok(()) => info!(path = %path.display(), "clip snapshot written"),
                Err(err) => error!(path = %path.display(), %err, "clip snapshot failed"),
            }
        }
        if self.config.save_metadata {
            let path = self
                .config
                .csv_dir
                .join(format!("{}_metadata.csv", self.clip_name));
            match csv::write_metadata(&path, &self.frames) {
                Ok(()) => info!(path = %path.display(), "metadata written"),
                Err(err) => error!(path = %path.display(), %err, "metadata export failed"),
            }
        }
    }
}

fn ensure_dir(path: &Path) -> Result<(), RecordError> {
    fs::create_dir_all(path).map_err(|source| RecordError::io(path, source))
}

/// Serialize a buffered clip to `path` as a postcard-encoded [`SwarmClip`].
pub fn save_clip(path: &Path, frames: &[Frame]) -> Result<(), RecordError> {
    let clip = SwarmClip::new(frames.to_vec());
    let bytes = postcard::to_allocvec(&clip)?;
    fs::write(path, bytes).map_err(|source| RecordError::io(path, source))
}

/// Read back a clip snapshot written by [`save_clip`].
pub fn load_clip(path: &Path) -> Result<SwarmClip, RecordError> {
    let bytes = fs::read(path).map_err(|source| RecordError::io(path, source))?;
    Ok(postcard::from_bytes(&bytes)?)
}

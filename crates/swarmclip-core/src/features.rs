//! Per-frame feature derivation for recorded swarm clips.
//!
//! [`extract_rows`] turns one captured [`Frame`] into the rows of the data
//! CSV; [`metadata_rows`] turns a whole buffered clip into the raw metadata
//! table. Direction and acceleration deltas are stateful across frames, so
//! both read and update the caller-owned [`FeatureHistory`].

use crate::{AgentSnapshot, ForceRole, Frame};
use glam::{Vec2, Vec3};
use std::collections::HashMap;
use std::fmt;

/// Measured direction changes at or below this angle report the floor value
/// instead, distinguishing "near-zero turn" from "no prior data".
const DIRECTION_NOISE_DEG: f32 = 0.08;

/// Floor value reported for near-zero measured turns.
const DIRECTION_FLOOR_DEG: f32 = 0.01;

/// Squared-magnitude threshold below which accelerations count as noise.
const ACCELERATION_MIN_SQ: f32 = 0.001;

/// Last-seen direction and acceleration per agent ordinal.
///
/// Cleared at session start; entries appear lazily as ordinals are first
/// observed.
#[derive(Debug, Default)]
pub struct FeatureHistory {
    directions: HashMap<usize, Vec3>,
    accelerations: HashMap<usize, Vec3>,
}

impl FeatureHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all per-agent state.
    pub fn clear(&mut self) {
        self.directions.clear();
        self.accelerations.clear();
    }
}

/// One derived row of the data CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub frame: usize,
    pub id: usize,
    pub x: f32,
    /// Position z; world y is identically zero in this domain.
    pub y: f32,
    pub direction_change: f32,
    pub acceleration_change: f32,
    pub distance_centroid: f32,
    pub bounces_off_wall: f32,
    pub cohesion: f32,
    pub separation: f32,
    pub alignment: f32,
    /// 1=cohesion, 2=separation, 3=alignment, 4=bounce-off-wall, 0=none.
    pub dominant_parameter: u8,
}

impl fmt::Display for FeatureRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            self.frame,
            self.id,
            self.x,
            self.y,
            self.direction_change,
            self.acceleration_change,
            self.distance_centroid,
            self.bounces_off_wall,
            self.cohesion,
            self.separation,
            self.alignment,
            self.dominant_parameter,
        )
    }
}

/// One raw row of the metadata CSV; no derived values.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    pub frame: usize,
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub friction: Vec3,
    pub avoid_collision: Vec3,
}

impl fmt::Display for MetadataRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{},{}",
            self.frame,
            self.id,
            self.x,
            self.y,
            self.friction.x,
            self.friction.y,
            self.friction.z,
            self.avoid_collision.x,
            self.avoid_collision.y,
            self.avoid_collision.z,
        )
    }
}

/// Angle between two vectors in degrees, in [0, 180].
///
/// Returns 0 when either operand has (near-)zero magnitude rather than
/// producing NaN.
#[must_use]
pub fn angle_degrees(a: Vec3, b: Vec3) -> f32 {
    let denom = (a.length_squared() * b.length_squared()).sqrt();
    if denom < 1e-15 {
        return 0.0;
    }
    let cos = (a.dot(b) / denom).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Mean of the agents' (x, z) positions; zero for an empty frame.
#[must_use]
pub fn centroid(frame: &Frame) -> Vec2 {
    if frame.is_empty() {
        return Vec2::ZERO;
    }
    let sum: Vec2 = frame
        .agents()
        .iter()
        .map(|agent| Vec2::new(agent.position.x, agent.position.z))
        .sum();
    sum / frame.len() as f32
}

/// Derive one [`FeatureRow`] per agent of `frame`, in ordinal order.
///
/// Updates `history` with the frame's directions and accelerations as a side
/// effect, so consecutive calls see temporal deltas.
pub fn extract_rows(
    frame: &Frame,
    frame_index: usize,
    history: &mut FeatureHistory,
) -> Vec<FeatureRow> {
    let center = centroid(frame);
    frame
        .agents()
        .iter()
        .enumerate()
        .map(|(ordinal, agent)| {
            let planar = Vec2::new(agent.position.x, agent.position.z);
            FeatureRow {
                frame: frame_index,
                id: ordinal,
                x: agent.position.x,
                y: agent.position.z,
                direction_change: direction_change(ordinal, agent.direction, history),
                acceleration_change: acceleration_change(ordinal, agent.acceleration, history),
                distance_centroid: planar.distance(center),
                bounces_off_wall: agent.force(ForceRole::BounceOffWall).length(),
                cohesion: agent.force(ForceRole::Cohesion).length(),
                separation: agent.force(ForceRole::Separation).length(),
                alignment: agent.force(ForceRole::Alignment).length(),
                dominant_parameter: dominant_parameter(agent),
            }
        })
        .collect()
}

/// Raw metadata rows for a whole buffered clip, frame-major.
#[must_use]
pub fn metadata_rows(frames: &[Frame]) -> Vec<MetadataRow> {
    let mut rows = Vec::new();
    for (frame_index, frame) in frames.iter().enumerate() {
        for (ordinal, agent) in frame.agents().iter().enumerate() {
            rows.push(MetadataRow {
                frame: frame_index,
                id: ordinal,
                x: agent.position.x,
                y: agent.position.z,
                friction: agent.force(ForceRole::Friction),
                avoid_collision: agent.force(ForceRole::AvoidCollision),
            });
        }
    }
    rows
}

fn direction_change(ordinal: usize, current: Vec3, history: &mut FeatureHistory) -> f32 {
    let change = match history.directions.get(&ordinal) {
        Some(prev) if current.length_squared() > 0.0 && prev.length_squared() > 0.0 => {
            let angle = angle_degrees(current, *prev);
            if angle > DIRECTION_NOISE_DEG {
                angle
            } else {
                DIRECTION_FLOOR_DEG
            }
        }
        _ => 0.0,
    };
    history.directions.insert(ordinal, current);
    change
}

fn acceleration_change(ordinal: usize, current: Vec3, history: &mut FeatureHistory) -> f32 {
    let change = match history.accelerations.get(&ordinal) {
        Some(prev)
            if current.length_squared() > ACCELERATION_MIN_SQ
                && prev.length_squared() > ACCELERATION_MIN_SQ =>
        {
            angle_degrees(current, *prev)
        }
        _ => 0.0,
    };
    history.accelerations.insert(ordinal, current);
    change
}

/// Declaration order of the dominant-force candidates; the reported value is
/// the 1-based rank in this list.
const DOMINANT_CANDIDATES: [ForceRole; 4] = [
    ForceRole::Cohesion,
    ForceRole::Separation,
    ForceRole::Alignment,
    ForceRole::BounceOffWall,
];

fn dominant_parameter(agent: &AgentSnapshot) -> u8 {
    let vectors = DOMINANT_CANDIDATES.map(|role| agent.force(role));
    let intensities = vectors.map(Vec3::length);
    for (i, &intensity) in intensities.iter().enumerate() {
        // First candidate no other strictly exceeds wins; ties keep the
        // earlier-declared role. Downstream consumers rely on this ordering.
        let best = intensities
            .iter()
            .enumerate()
            .all(|(j, &other)| j == i || intensity >= other);
        if !best {
            continue;
        }
        if angle_degrees(vectors[i], agent.acceleration) < 90.0 {
            return (i + 1) as u8;
        }
        return 0;
    }
    0
}

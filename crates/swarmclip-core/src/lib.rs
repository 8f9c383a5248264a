//! Core types shared across the swarmclip workspace.
//!
//! A running swarm simulation exposes its per-agent state through
//! [`FrameSource`]; the recorder samples it into immutable [`Frame`]s and
//! derives CSV rows from them via the [`features`] module.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod features;

/// Number of force slots every agent snapshot must carry.
pub const FORCE_SLOTS: usize = 8;

/// Named roles for the fixed force slots reported by the simulation.
///
/// Slots 0 and 1 exist on the wire but carry nothing the recorder reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForceRole {
    Friction,
    AvoidCollision,
    BounceOffWall,
    Cohesion,
    Separation,
    Alignment,
}

impl ForceRole {
    /// Slot index of this role in an agent's force list.
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            ForceRole::Friction => 2,
            ForceRole::AvoidCollision => 3,
            ForceRole::BounceOffWall => 4,
            ForceRole::Cohesion => 5,
            ForceRole::Separation => 6,
            ForceRole::Alignment => 7,
        }
    }
}

/// Errors raised while capturing or validating a frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// An agent reported fewer force slots than the fixed layout requires.
    #[error("agent {ordinal} reported {got} force slots, expected at least {FORCE_SLOTS}")]
    TruncatedForces { ordinal: usize, got: usize },
}

/// Immutable state of one agent captured at a sample tick.
///
/// Positions live on the x/z plane; the y component is always zero in this
/// domain and the exports write z into their `y` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub position: Vec3,
    pub direction: Vec3,
    pub acceleration: Vec3,
    pub forces: Vec<Vec3>,
}

impl AgentSnapshot {
    /// Force vector stored at the slot assigned to `role`.
    #[must_use]
    pub fn force(&self, role: ForceRole) -> Vec3 {
        self.forces[role.slot()]
    }
}

/// Ordered agent snapshots captured at one sample tick.
///
/// An agent's identity across frames is its ordinal in this list; there is
/// no separate ID field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    agents: Vec<AgentSnapshot>,
}

impl Frame {
    /// Build a frame, validating the fixed force-slot layout once.
    pub fn new(agents: Vec<AgentSnapshot>) -> Result<Self, FrameError> {
        for (ordinal, agent) in agents.iter().enumerate() {
            if agent.forces.len() < FORCE_SLOTS {
                return Err(FrameError::TruncatedForces {
                    ordinal,
                    got: agent.forces.len(),
                });
            }
        }
        Ok(Self { agents })
    }

    /// Agents in ordinal order.
    #[must_use]
    pub fn agents(&self) -> &[AgentSnapshot] {
        &self.agents
    }

    /// Number of agents captured in this frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns true if the frame captured no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Whole-session frame buffer, serialized as the optional binary snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmClip {
    pub frames: Vec<Frame>,
}

impl SwarmClip {
    /// Wrap a recorded frame buffer.
    #[must_use]
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}

/// Collaborator seam to the live simulation.
pub trait FrameSource {
    /// Produce an owned copy of the current agent states.
    ///
    /// The returned frame must not alias mutable simulation state.
    fn snapshot_frame(&self) -> Result<Frame, FrameError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with_forces(count: usize) -> AgentSnapshot {
        AgentSnapshot {
            position: Vec3::ZERO,
            direction: Vec3::X,
            acceleration: Vec3::ZERO,
            forces: vec![Vec3::ZERO; count],
        }
    }

    #[test]
    fn force_roles_map_to_fixed_slots() {
        assert_eq!(ForceRole::Friction.slot(), 2);
        assert_eq!(ForceRole::AvoidCollision.slot(), 3);
        assert_eq!(ForceRole::BounceOffWall.slot(), 4);
        assert_eq!(ForceRole::Cohesion.slot(), 5);
        assert_eq!(ForceRole::Separation.slot(), 6);
        assert_eq!(ForceRole::Alignment.slot(), 7);
    }

    #[test]
    fn frame_rejects_truncated_force_lists() {
        let err = Frame::new(vec![agent_with_forces(8), agent_with_forces(5)])
            .expect_err("second agent is short");
        assert_eq!(err, FrameError::TruncatedForces { ordinal: 1, got: 5 });
    }

    #[test]
    fn frame_accepts_full_force_lists() {
        let frame = Frame::new(vec![agent_with_forces(8), agent_with_forces(9)]).expect("frame");
        assert_eq!(frame.len(), 2);
        assert!(!frame.is_empty());
    }

    #[test]
    fn force_accessor_reads_assigned_slot() {
        let mut agent = agent_with_forces(8);
        agent.forces[5] = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(agent.force(ForceRole::Cohesion), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(agent.force(ForceRole::Friction), Vec3::ZERO);
    }
}

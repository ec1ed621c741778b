//! `covr-types` – shared vocabulary for the CoVR interaction stack.
//!
//! Every other crate in the workspace speaks in these types: object ids and
//! categories, the rigid-body [`geometry`] primitives, the actuator command
//! types produced by navigation, the transition enums emitted by the state
//! machines, and the workspace-wide [`CovrError`].

pub mod geometry;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use geometry::{Aabb, Pose, Quaternion, Ray, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Identity
// ────────────────────────────────────────────────────────────────────────────

/// Stable identifier of a virtual object of interest.  Ids are assigned in
/// registration order, which is also the registry iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoiId(pub usize);

impl fmt::Display for VoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voi#{}", self.0)
    }
}

/// Stable identifier of a tracked physical prop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropId(pub usize);

impl fmt::Display for PropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prop#{}", self.0)
    }
}

/// Semantic category shared by VOIs and the prop that stands in for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiCategory {
    TypeA,
    TypeB,
    /// Drop targets.  Never a navigation snap candidate and never docked.
    Surface,
}

impl VoiCategory {
    pub const ALL: [VoiCategory; 3] = [VoiCategory::TypeA, VoiCategory::TypeB, VoiCategory::Surface];

    pub fn is_surface(self) -> bool {
        matches!(self, VoiCategory::Surface)
    }
}

impl fmt::Display for VoiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiCategory::TypeA => write!(f, "type_a"),
            VoiCategory::TypeB => write!(f, "type_b"),
            VoiCategory::Surface => write!(f, "surface"),
        }
    }
}

impl std::str::FromStr for VoiCategory {
    type Err = CovrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "type_a" | "typea" | "a" => Ok(VoiCategory::TypeA),
            "type_b" | "typeb" | "b" => Ok(VoiCategory::TypeB),
            "surface" | "surfaces" => Ok(VoiCategory::Surface),
            other => Err(CovrError::Config(format!("unknown VOI category '{other}'"))),
        }
    }
}

/// Which of the viewer's hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    Right,
}

// ────────────────────────────────────────────────────────────────────────────
// Actuation
// ────────────────────────────────────────────────────────────────────────────

/// How the column's motion platform is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuationMode {
    /// Coarse positioning: the platform is handed a destination point.
    Direct,
    /// Fine control: the platform follows two per-axis velocity commands.
    #[default]
    Velocity,
}

/// The two independent slider-style axis commands sent to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisCommand {
    /// Drive along world `X`.
    pub x: f32,
    /// Drive along world `Z`.
    pub z: f32,
}

impl AxisCommand {
    pub const ZERO: Self = Self { x: 0.0, z: 0.0 };

    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Build a command from a planar speed vector, flooring every axis whose
    /// magnitude is below `epsilon` to exactly zero.
    pub fn from_speed(speed: Vec3, epsilon: f32) -> Self {
        let floor = |v: f32| if v.abs() < epsilon { 0.0 } else { v };
        Self::new(floor(speed.x), floor(speed.z))
    }

    /// True when both axes sit at the zero floor.
    pub fn is_at_rest(&self) -> bool {
        self.x == 0.0 && self.z == 0.0
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transitions
// ────────────────────────────────────────────────────────────────────────────

/// Arrival edge observed by the navigation controller during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalTransition {
    Reached,
    Sustained,
    Left,
}

/// Grab edge observed by a prop linkage during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabTransition {
    Grabbed,
    Released,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CovrError {
    #[error("Configuration Error: more than one PROP registered for category {0}")]
    DuplicateProp(VoiCategory),

    #[error("Configuration Error: no PROP registered for category {0}")]
    MissingProp(VoiCategory),

    #[error("Configuration Error: missing required reference '{0}'")]
    MissingReference(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Unknown VOI {0}")]
    UnknownVoi(VoiId),

    #[error("Unknown PROP {0}")]
    UnknownProp(PropId),

    #[error("No VOI registered for category {0}")]
    EmptyCategory(VoiCategory),

    #[error("Index {index} out of range for category {category} ({len} registered)")]
    IndexOutOfRange {
        category: VoiCategory,
        index: usize,
        len: usize,
    },

    #[error("Actuator Fault on {component}: {details}")]
    ActuatorFault { component: String, details: String },

    #[error("Halted: {0}")]
    Halted(String),
}

//! Virtual objects of interest.

use covr_perception::VoiWeights;
use covr_types::{Aabb, Pose, PropId, Quaternion, Vec3, VoiCategory, VoiId};
use serde::{Deserialize, Serialize};

/// Visual decoration state.  Rendering is out of scope; the core only keeps
/// track of which state each object should be shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    #[default]
    Off,
    /// Explicitly selected, column on its way.
    Hinted,
    /// The column has arrived at this object.
    Reached,
}

/// Parent relation to a prop while the prop is grabbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub prop: PropId,
    /// Pose relative to the prop.
    pub local: Pose,
}

fn default_half_extents() -> Vec3 {
    Vec3::new(0.15, 0.15, 0.15)
}

fn default_active() -> bool {
    true
}

/// Declarative description of a VOI, as found in a scene file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiSpec {
    pub name: String,
    pub category: VoiCategory,
    pub position: Vec3,
    #[serde(default)]
    pub yaw_degrees: f32,
    #[serde(default = "default_half_extents")]
    pub half_extents: Vec3,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl VoiSpec {
    pub fn new(name: impl Into<String>, category: VoiCategory, position: Vec3) -> Self {
        Self {
            name: name.into(),
            category,
            position,
            yaw_degrees: 0.0,
            half_extents: default_half_extents(),
            active: true,
        }
    }

    pub fn with_half_extents(mut self, half_extents: Vec3) -> Self {
        self.half_extents = half_extents;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A virtual object of interest.
#[derive(Debug, Clone)]
pub struct Voi {
    pub id: VoiId,
    pub name: String,
    pub category: VoiCategory,
    pub half_extents: Vec3,
    pub is_active: bool,
    pub inside_docking_zone: bool,
    pub highlight: Highlight,
    pose: Pose,
    initial_pose: Pose,
    weights: VoiWeights,
    link: Option<Link>,
}

impl Voi {
    pub(crate) fn from_spec(id: VoiId, spec: VoiSpec) -> Self {
        let pose = Pose::new(spec.position, Quaternion::from_yaw_degrees(spec.yaw_degrees));
        Self {
            id,
            name: spec.name,
            category: spec.category,
            half_extents: spec.half_extents,
            is_active: spec.active,
            inside_docking_zone: false,
            highlight: Highlight::Off,
            pose,
            initial_pose: pose,
            weights: VoiWeights::default(),
            link: None,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Pose captured when the object was created.
    pub fn initial_pose(&self) -> Pose {
        self.initial_pose
    }

    pub fn weights(&self) -> VoiWeights {
        self.weights
    }

    pub fn set_weights(&mut self, weights: VoiWeights) {
        self.weights = weights;
    }

    /// World-space collider, centred on the current position.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.pose.position, self.half_extents)
    }

    /// Whether this object may serve as an implicit navigation candidate.
    pub fn is_candidate(&self) -> bool {
        self.is_active && !self.category.is_surface()
    }

    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// Parent to `prop`: the local pose becomes the identity so the object
    /// rides exactly on the prop.
    pub fn link_to(&mut self, prop: PropId, prop_pose: Pose) {
        self.link = Some(Link {
            prop,
            local: Pose::identity(),
        });
        self.pose = prop_pose;
    }

    /// Re-derive the world pose from the parent prop.  No-op when unlinked.
    pub fn follow(&mut self, prop_pose: Pose) {
        if let Some(link) = self.link {
            self.pose = prop_pose.compose(link.local);
        }
    }

    /// Drop the parent relation, keeping the last world pose.
    pub fn unlink(&mut self) -> Option<Link> {
        self.link.take()
    }

    /// Move to `initial_position + offset` and take `rotation`.
    pub fn recenter(&mut self, offset: Vec3, rotation: Quaternion) {
        self.pose = Pose::new(self.initial_pose.position + offset, rotation);
    }

    /// Update the docking flag.  Surfaces never change theirs.  Returns
    /// true when the flag changed.
    pub fn set_docked(&mut self, inside: bool) -> bool {
        if self.category.is_surface() || self.inside_docking_zone == inside {
            return false;
        }
        self.inside_docking_zone = inside;
        true
    }
}

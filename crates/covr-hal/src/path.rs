//! Path service interface.
//!
//! The pathfinding geometry is opaque to the core: it returns a corner list
//! (origin first, destination last) and the remaining distance along the path.
//! An unresolved query reports an empty corner list and an infinite remaining
//! distance.

use covr_types::Vec3;

/// Result of one path query.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPlan {
    /// Path corners, starting at the query origin.
    pub corners: Vec<Vec3>,
    /// Distance still to travel; `f32::INFINITY` when unknown.
    pub remaining_distance: f32,
}

impl PathPlan {
    pub fn new(corners: Vec<Vec3>, remaining_distance: f32) -> Self {
        Self {
            corners,
            remaining_distance,
        }
    }

    /// Sentinel for a path that could not be resolved this tick.
    pub fn unresolved() -> Self {
        Self::new(Vec::new(), f32::INFINITY)
    }

    /// Sum of the segment lengths between consecutive corners.
    pub fn length(&self) -> f32 {
        self.corners.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// True when the plan carries a usable remaining distance.
    pub fn has_finite_remaining(&self) -> bool {
        self.remaining_distance.is_finite()
    }
}

/// Pathfinding service consulted by navigation every tick.
pub trait PathService: Send {
    /// Compute a path from `origin` to `destination`.
    fn compute_path(&mut self, origin: Vec3, destination: Vec3) -> PathPlan;
}

//! VOI attention weighting.
//!
//! Every tick each active object of interest gets a scalar interest weight in
//! `[0, 1]` blended from two cues:
//!
//! - **position weight** `1 / (1 + d)` where `d` is the viewer-to-object
//!   distance;
//! - **rotation weight** `exp(cos θ − 1)` where `θ` is the angular offset of
//!   the first ray of a horizontal fan, centred on the viewer's gaze, that
//!   hits the object's collider before anything else.
//!
//! The fan is cast from the viewer position with its height pinned to the
//! collider's vertical centre.  Rays are tried in the order `0, +step, −step,
//! +2·step, −2·step, …` with `step = cone_degrees / ray_count`.  When no ray
//! reaches the object, `θ` is [`NO_HIT_ANGLE_DEG`].
//!
//! # Example
//!
//! ```rust
//! use covr_perception::raycast::ColliderSet;
//! use covr_perception::weighting::{WeightingConfig, WeightingEngine};
//! use covr_types::{Aabb, Pose, Vec3};
//!
//! let mut world = ColliderSet::new();
//! let bounds = Aabb::from_center(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.5, 0.5, 0.5));
//! world.insert(0usize, bounds);
//!
//! let engine = WeightingEngine::new(WeightingConfig::default());
//! let w = engine.evaluate(&Pose::identity(), 0, Vec3::new(0.0, 0.0, 3.0), &bounds, &world);
//! assert!((w.position_weight - 0.25).abs() < 1e-6);
//! assert!((w.rotation_weight - 1.0).abs() < 1e-6);
//! ```

use covr_types::{Aabb, CovrError, Pose, Quaternion, Ray, Vec3};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::raycast::PhysicsWorld;

/// Angle assumed when no ray of the fan reaches the object.
pub const NO_HIT_ANGLE_DEG: f32 = 90.0;

// ────────────────────────────────────────────────────────────────────────────
// Config
// ────────────────────────────────────────────────────────────────────────────

fn default_coef() -> f32 {
    0.5
}

fn default_max_distance() -> f32 {
    15.0
}

fn default_ray_count() -> u32 {
    10
}

fn default_cone_degrees() -> f32 {
    60.0
}

/// Tuning for the weighting pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightingConfig {
    /// Share of the position cue in the final weight (`0..=1`).
    #[serde(default = "default_coef")]
    pub coef: f32,
    /// Maximum ray range in metres.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    /// Number of angular steps on each side of the gaze.
    #[serde(default = "default_ray_count")]
    pub ray_count: u32,
    /// Angular extent of the fan on each side of the gaze, in degrees.
    #[serde(default = "default_cone_degrees")]
    pub cone_degrees: f32,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            coef: default_coef(),
            max_distance: default_max_distance(),
            ray_count: default_ray_count(),
            cone_degrees: default_cone_degrees(),
        }
    }
}

impl WeightingConfig {
    pub fn validate(&self) -> Result<(), CovrError> {
        if !(0.0..=1.0).contains(&self.coef) {
            return Err(CovrError::Config(format!(
                "weighting.coef must be within [0, 1], got {}",
                self.coef
            )));
        }
        if !(self.max_distance > 0.0) {
            return Err(CovrError::Config(
                "weighting.max_distance must be positive".to_string(),
            ));
        }
        if self.ray_count == 0 {
            return Err(CovrError::Config(
                "weighting.ray_count must be at least 1".to_string(),
            ));
        }
        if !(self.cone_degrees >= 0.0) {
            return Err(CovrError::Config(
                "weighting.cone_degrees must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Angular spacing between neighbouring rays of the fan.
    pub fn angle_step(&self) -> f32 {
        self.cone_degrees / self.ray_count as f32
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Weight functions
// ────────────────────────────────────────────────────────────────────────────

/// The three derived weights of one object for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoiWeights {
    pub weight: f32,
    pub position_weight: f32,
    pub rotation_weight: f32,
}

/// `1 / (1 + distance)`, in `(0, 1]` for any non-negative distance.
pub fn position_weight(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// `exp(cos θ − 1)` with `θ` in degrees.
pub fn rotation_weight(angle_deg: f32) -> f32 {
    (angle_deg.to_radians().cos() - 1.0).exp()
}

/// Convex blend `coef·position + (1 − coef)·rotation`.
pub fn blend(coef: f32, position_weight: f32, rotation_weight: f32) -> f32 {
    coef * position_weight + (1.0 - coef) * rotation_weight
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// Computes [`VoiWeights`] for one object at a time against a
/// [`PhysicsWorld`].
#[derive(Debug, Clone, Default)]
pub struct WeightingEngine {
    config: WeightingConfig,
}

impl WeightingEngine {
    pub fn new(config: WeightingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeightingConfig {
        &self.config
    }

    /// Angular offset in degrees of the first fan ray whose nearest hit is
    /// the collider keyed `target`, or [`NO_HIT_ANGLE_DEG`].
    pub fn find_angle<K, W>(&self, viewer: &Pose, target: K, bounds: &Aabb, world: &W) -> f32
    where
        K: PartialEq + Copy,
        W: PhysicsWorld<K> + ?Sized,
    {
        let forward = viewer.forward().flattened().normalized();
        if forward == Vec3::ZERO {
            trace!("viewer gaze is vertical, no fan cast");
            return NO_HIT_ANGLE_DEG;
        }
        let origin = viewer.position.with_y(bounds.center().y);
        let step = self.config.angle_step();

        let hits = |angle: f32| {
            let dir = Quaternion::from_yaw_degrees(angle).rotate(forward);
            world
                .raycast(&Ray::new(origin, dir), self.config.max_distance)
                .is_some_and(|hit| hit.key == target)
        };

        if hits(0.0) {
            return 0.0;
        }
        for i in 1..self.config.ray_count {
            let angle = step * i as f32;
            if hits(angle) || hits(-angle) {
                return angle;
            }
        }
        trace!(rays = self.config.ray_count, "no fan ray hit the object first");
        NO_HIT_ANGLE_DEG
    }

    /// Full weight evaluation for the object keyed `target` whose reference
    /// point is `position`.
    pub fn evaluate<K, W>(
        &self,
        viewer: &Pose,
        target: K,
        position: Vec3,
        bounds: &Aabb,
        world: &W,
    ) -> VoiWeights
    where
        K: PartialEq + Copy,
        W: PhysicsWorld<K> + ?Sized,
    {
        let position_weight = position_weight(viewer.position.distance(position));
        let rotation_weight = rotation_weight(self.find_angle(viewer, target, bounds, world));
        VoiWeights {
            weight: blend(self.config.coef, position_weight, rotation_weight),
            position_weight,
            rotation_weight,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raycast::ColliderSet;

    const TARGET: u8 = 1;
    const BLOCKER: u8 = 2;

    fn cube(center: Vec3) -> Aabb {
        Aabb::from_center(center, Vec3::new(0.5, 0.5, 0.5))
    }

    // ── weight functions ────────────────────────────────────────────────────

    #[test]
    fn position_weight_is_one_at_zero_and_decreasing() {
        assert_eq!(position_weight(0.0), 1.0);
        let mut prev = 1.0;
        for d in [0.1, 0.5, 1.0, 4.0, 100.0] {
            let w = position_weight(d);
            assert!(w > 0.0 && w < prev);
            prev = w;
        }
    }

    #[test]
    fn rotation_weight_at_zero_and_ninety() {
        assert!((rotation_weight(0.0) - 1.0).abs() < 1e-6);
        assert!((rotation_weight(90.0) - (-1.0f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn rotation_weight_decreases_over_fan_range() {
        let mut prev = rotation_weight(0.0);
        for deg in [6.0, 12.0, 30.0, 54.0, 90.0] {
            let w = rotation_weight(deg);
            assert!(w < prev);
            prev = w;
        }
    }

    #[test]
    fn blend_edge_coefficients_select_one_cue() {
        assert_eq!(blend(1.0, 0.3, 0.9), 0.3);
        assert_eq!(blend(0.0, 0.3, 0.9), 0.9);
        assert!((blend(0.5, 0.2, 0.6) - 0.4).abs() < 1e-6);
    }

    // ── config ──────────────────────────────────────────────────────────────

    #[test]
    fn default_config_matches_documented_values() {
        let cfg = WeightingConfig::default();
        assert_eq!(cfg.coef, 0.5);
        assert_eq!(cfg.max_distance, 15.0);
        assert_eq!(cfg.ray_count, 10);
        assert_eq!(cfg.cone_degrees, 60.0);
        assert!((cfg.angle_step() - 6.0).abs() < 1e-6);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: WeightingConfig = serde_json::from_str(r#"{ "coef": 0.8 }"#).unwrap();
        assert_eq!(cfg.coef, 0.8);
        assert_eq!(cfg.ray_count, 10);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = WeightingConfig {
            coef: 1.5,
            ..WeightingConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = WeightingConfig {
            ray_count: 0,
            ..WeightingConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    // ── ray fan ─────────────────────────────────────────────────────────────

    #[test]
    fn target_dead_ahead_has_zero_angle() {
        let mut world = ColliderSet::new();
        let bounds = cube(Vec3::new(0.0, 0.0, 5.0));
        world.insert(TARGET, bounds);
        let engine = WeightingEngine::default();
        assert_eq!(engine.find_angle(&Pose::identity(), TARGET, &bounds, &world), 0.0);
    }

    #[test]
    fn off_axis_target_reports_first_hitting_step() {
        // Centre at 45°; the nearest edge of the box is first reached at 42°.
        let mut world = ColliderSet::new();
        let bounds = cube(Vec3::new(5.0, 0.0, 5.0));
        world.insert(TARGET, bounds);
        let engine = WeightingEngine::default();
        let angle = engine.find_angle(&Pose::identity(), TARGET, &bounds, &world);
        assert!((angle - 42.0).abs() < 1e-4, "angle = {angle}");
    }

    #[test]
    fn mirrored_target_reports_same_unsigned_angle() {
        let mut world = ColliderSet::new();
        let bounds = cube(Vec3::new(-5.0, 0.0, 5.0));
        world.insert(TARGET, bounds);
        let engine = WeightingEngine::default();
        let angle = engine.find_angle(&Pose::identity(), TARGET, &bounds, &world);
        assert!((angle - 42.0).abs() < 1e-4, "angle = {angle}");
    }

    #[test]
    fn occluded_target_falls_back_to_ninety() {
        let mut world = ColliderSet::new();
        let bounds = cube(Vec3::new(0.0, 0.0, 5.0));
        world.insert(TARGET, bounds);
        world.insert(
            BLOCKER,
            Aabb::from_center(Vec3::new(0.0, 0.0, 2.0), Vec3::new(3.0, 1.0, 0.1)),
        );
        let engine = WeightingEngine::default();
        let angle = engine.find_angle(&Pose::identity(), TARGET, &bounds, &world);
        assert_eq!(angle, NO_HIT_ANGLE_DEG);
    }

    #[test]
    fn target_beyond_range_falls_back_to_ninety() {
        let mut world = ColliderSet::new();
        let bounds = cube(Vec3::new(0.0, 0.0, 20.0));
        world.insert(TARGET, bounds);
        let engine = WeightingEngine::default();
        let angle = engine.find_angle(&Pose::identity(), TARGET, &bounds, &world);
        assert_eq!(angle, NO_HIT_ANGLE_DEG);
    }

    #[test]
    fn ray_height_is_pinned_to_collider_centre() {
        // Viewer eye height is 1.7 m; the object sits on the floor and is
        // only 0.2 m tall, so an eye-level ray would pass over it.
        let mut world = ColliderSet::new();
        let bounds = Aabb::from_center(Vec3::new(0.0, 0.1, 4.0), Vec3::new(0.3, 0.1, 0.3));
        world.insert(TARGET, bounds);
        let viewer = Pose::at(Vec3::new(0.0, 1.7, 0.0));
        let engine = WeightingEngine::default();
        assert_eq!(engine.find_angle(&viewer, TARGET, &bounds, &world), 0.0);
    }

    #[test]
    fn evaluate_blends_with_configured_coef() {
        let mut world = ColliderSet::new();
        let center = Vec3::new(0.0, 0.0, 3.0);
        let bounds = cube(center);
        world.insert(TARGET, bounds);

        for coef in [0.0, 1.0] {
            let engine = WeightingEngine::new(WeightingConfig {
                coef,
                ..WeightingConfig::default()
            });
            let w = engine.evaluate(&Pose::identity(), TARGET, center, &bounds, &world);
            let expected = if coef == 1.0 {
                w.position_weight
            } else {
                w.rotation_weight
            };
            assert_eq!(w.weight, expected);
        }
    }
}

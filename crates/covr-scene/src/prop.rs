//! Tracked physical props.
//!
//! A prop's resting pose cannot be known until the tracking system has
//! reported it at least once, so it is captured by a settle step on the first
//! valid sample.  Until then the prop takes no part in grab detection.
//!
//! Trackers that have not locked on yet report the origin; such samples are
//! not valid and are dropped like non-finite ones.

use covr_types::{CovrError, Pose, PropId, Vec3, VoiCategory};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

fn default_height_error_range() -> f32 {
    0.05
}

fn default_hold_duration() -> f32 {
    0.5
}

/// Declarative description of a prop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropSpec {
    pub name: String,
    pub category: VoiCategory,
    /// Lift above the resting height that counts as "picked up" (metres).
    #[serde(default = "default_height_error_range")]
    pub height_error_range: f32,
    /// Seconds the lift must hold before a grab is declared.
    #[serde(default = "default_hold_duration")]
    pub grab_hold_duration: f32,
    /// Seconds the prop must sit back down before a release is declared.
    #[serde(default = "default_hold_duration")]
    pub release_hold_duration: f32,
}

impl PropSpec {
    pub fn new(name: impl Into<String>, category: VoiCategory) -> Self {
        Self {
            name: name.into(),
            category,
            height_error_range: default_height_error_range(),
            grab_hold_duration: default_hold_duration(),
            release_hold_duration: default_hold_duration(),
        }
    }

    /// # Errors
    ///
    /// [`CovrError::Config`] naming the first negative or non-finite field.
    pub fn validate(&self) -> Result<(), CovrError> {
        for (field, value) in [
            ("height_error_range", self.height_error_range),
            ("grab_hold_duration", self.grab_hold_duration),
            ("release_hold_duration", self.release_hold_duration),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(CovrError::Config(format!(
                    "prop '{}': {field} must be a non-negative number, got {value}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Grab flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrabState {
    pub is_grabbed: bool,
    pub grabbed_with_left_hand: bool,
    pub grabbed_with_right_hand: bool,
}

/// A tracked physical prop.
#[derive(Debug, Clone)]
pub struct Prop {
    pub id: PropId,
    pub name: String,
    pub category: VoiCategory,
    pub height_error_range: f32,
    pub grab_hold_duration: f32,
    pub release_hold_duration: f32,
    pub inside_docking_zone: bool,
    pub grab: GrabState,
    pose: Option<Pose>,
    resting_pose: Option<Pose>,
}

impl Prop {
    pub(crate) fn from_spec(id: PropId, spec: PropSpec) -> Self {
        Self {
            id,
            name: spec.name,
            category: spec.category,
            height_error_range: spec.height_error_range.max(0.0),
            grab_hold_duration: spec.grab_hold_duration.max(0.0),
            release_hold_duration: spec.release_hold_duration.max(0.0),
            inside_docking_zone: false,
            grab: GrabState::default(),
            pose: None,
            resting_pose: None,
        }
    }

    /// Feed the latest tracking sample.  `None` keeps the previous pose.
    ///
    /// Returns `true` on the tick the resting pose gets captured.
    pub fn observe(&mut self, sample: Option<Pose>) -> bool {
        let Some(pose) = sample else {
            return false;
        };
        if !pose.position.is_finite() || pose.position == Vec3::ZERO {
            debug!(prop = %self.name, "invalid prop sample dropped");
            return false;
        }
        self.pose = Some(pose);
        if self.resting_pose.is_none() {
            self.resting_pose = Some(pose);
            info!(prop = %self.name, y = pose.position.y, "prop resting pose captured");
            return true;
        }
        false
    }

    /// Latest tracked pose, if the prop has ever reported one.
    pub fn pose(&self) -> Option<Pose> {
        self.pose
    }

    pub fn resting_pose(&self) -> Option<Pose> {
        self.resting_pose
    }

    pub fn is_settled(&self) -> bool {
        self.resting_pose.is_some()
    }

    /// `prop_height > resting_height + height_error_range`, or `None` before
    /// the prop has settled.
    pub fn is_above_platform(&self) -> Option<bool> {
        let rest = self.resting_pose?;
        let now = self.pose?;
        Some(now.position.y > rest.position.y + self.height_error_range)
    }

    /// Update the docking flag.  Surface props never change theirs.
    pub fn set_docked(&mut self, inside: bool) -> bool {
        if self.category.is_surface() || self.inside_docking_zone == inside {
            return false;
        }
        self.inside_docking_zone = inside;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop() -> Prop {
        Prop::from_spec(PropId(0), PropSpec::new("block", VoiCategory::TypeA))
    }

    #[test]
    fn settles_on_first_valid_sample_only() {
        let mut p = prop();
        assert!(!p.observe(None));
        assert!(!p.is_settled());
        assert_eq!(p.is_above_platform(), None);

        assert!(p.observe(Some(Pose::at(Vec3::new(0.0, 0.8, 0.0)))));
        assert!(!p.observe(Some(Pose::at(Vec3::new(0.0, 1.0, 0.0)))));
        assert_eq!(p.resting_pose().unwrap().position.y, 0.8);
    }

    #[test]
    fn non_finite_sample_is_ignored() {
        let mut p = prop();
        assert!(!p.observe(Some(Pose::at(Vec3::new(f32::NAN, 0.0, 0.0)))));
        assert!(p.pose().is_none());
    }

    #[test]
    fn origin_sample_before_lock_does_not_settle() {
        let mut p = prop();
        assert!(!p.observe(Some(Pose::at(Vec3::ZERO))));
        assert!(!p.is_settled());
        assert!(p.pose().is_none());

        assert!(p.observe(Some(Pose::at(Vec3::new(0.0, 1.0, 0.0)))));
        assert_eq!(p.resting_pose().unwrap().position.y, 1.0);
        assert_eq!(p.is_above_platform(), Some(false));

        // A dropout back to the origin later keeps the last good pose.
        assert!(!p.observe(Some(Pose::at(Vec3::ZERO))));
        assert_eq!(p.pose().unwrap().position.y, 1.0);
    }

    #[test]
    fn above_platform_uses_error_range() {
        let mut p = prop();
        p.observe(Some(Pose::at(Vec3::new(0.0, 0.8, 0.0))));
        p.observe(Some(Pose::at(Vec3::new(0.0, 0.84, 0.0))));
        assert_eq!(p.is_above_platform(), Some(false));
        p.observe(Some(Pose::at(Vec3::new(0.0, 0.9, 0.0))));
        assert_eq!(p.is_above_platform(), Some(true));
    }

    #[test]
    fn negative_timings_fail_validation_and_clamp() {
        let mut spec = PropSpec::new("block", VoiCategory::TypeA);
        assert!(spec.validate().is_ok());
        spec.release_hold_duration = -0.5;
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("release_hold_duration"));

        let p = Prop::from_spec(PropId(0), spec);
        assert_eq!(p.release_hold_duration, 0.0);
    }

    #[test]
    fn spec_defaults() {
        let spec: PropSpec =
            serde_json::from_str(r#"{ "name": "block", "category": "type_a" }"#).unwrap();
        assert_eq!(spec.height_error_range, 0.05);
        assert_eq!(spec.grab_hold_duration, 0.5);
        assert_eq!(spec.release_hold_duration, 0.5);
    }
}

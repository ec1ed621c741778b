//! Engine configuration.
//!
//! Every section deserialises from a partial document: missing fields take
//! their documented defaults.  Call [`InteractionConfig::validate`] before
//! handing a loaded configuration to the
//! [`InteractionLoopBuilder`][crate::interaction::InteractionLoopBuilder]
//! (the builder does so as well).
//!
//! # Example
//!
//! ```rust
//! use covr_runtime::config::InteractionConfig;
//!
//! let cfg: InteractionConfig = serde_json::from_str(r#"{
//!     "arbitration": { "snap_distance": 2.0 },
//!     "systemic": true
//! }"#).unwrap();
//!
//! assert_eq!(cfg.arbitration.snap_distance, 2.0);
//! assert_eq!(cfg.weighting.ray_count, 10);
//! assert!(cfg.validate().is_ok());
//! ```

use covr_perception::WeightingConfig;
use covr_scene::ArbitrationConfig;
use covr_types::{CovrError, Vec3};
use serde::{Deserialize, Serialize};

use crate::linkage::ReleasePolicy;
use crate::navigation::NavigationConfig;

// ────────────────────────────────────────────────────────────────────────────
// Linkage
// ────────────────────────────────────────────────────────────────────────────

fn default_hand_reach() -> f32 {
    0.25
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkageConfig {
    #[serde(default)]
    pub release_policy: ReleasePolicy,
    /// A tracked hand closer than this to the prop at grab time is credited
    /// with the grab.
    #[serde(default = "default_hand_reach")]
    pub hand_reach: f32,
}

impl Default for LinkageConfig {
    fn default() -> Self {
        Self {
            release_policy: ReleasePolicy::default(),
            hand_reach: default_hand_reach(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Docking zone
// ────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_zone_half_extents() -> Vec3 {
    Vec3::new(0.4, 1.5, 0.4)
}

/// Box carried by the column inside which VOIs and props count as docked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DockingZoneConfig {
    /// When `false` the docking flags are only changed through the registry's
    /// enter/exit trigger calls.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_zone_half_extents")]
    pub half_extents: Vec3,
}

impl Default for DockingZoneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            half_extents: default_zone_half_extents(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// InteractionConfig
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionConfig {
    #[serde(default)]
    pub weighting: WeightingConfig,
    #[serde(default)]
    pub arbitration: ArbitrationConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub linkage: LinkageConfig,
    #[serde(default)]
    pub docking_zone: DockingZoneConfig,
    /// Scripted mode: weights are not recomputed and stale values are used.
    #[serde(default)]
    pub systemic: bool,
    /// Seed for random selections.  `None` seeds from the OS.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl InteractionConfig {
    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`CovrError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), CovrError> {
        self.weighting.validate()?;
        self.arbitration.validate()?;
        self.navigation.validate()?;
        if !(self.linkage.hand_reach >= 0.0) {
            return Err(CovrError::Config(
                "linkage.hand_reach must not be negative".to_string(),
            ));
        }
        let h = self.docking_zone.half_extents;
        if !(h.x > 0.0 && h.y > 0.0 && h.z > 0.0) {
            return Err(CovrError::Config(
                "docking_zone.half_extents must be positive on every axis".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg: InteractionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, InteractionConfig::default());
        assert_eq!(cfg.linkage.release_policy, ReleasePolicy::FreezeInPlace);
        assert!(cfg.docking_zone.enabled);
        assert!(!cfg.systemic);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn release_policy_parses_snake_case() {
        let cfg: InteractionConfig =
            serde_json::from_str(r#"{ "linkage": { "release_policy": "recenter_group" } }"#)
                .unwrap();
        assert_eq!(cfg.linkage.release_policy, ReleasePolicy::RecenterGroup);
        assert_eq!(cfg.linkage.hand_reach, 0.25);
    }

    #[test]
    fn validate_rejects_flat_docking_zone() {
        let mut cfg = InteractionConfig::default();
        cfg.docking_zone.half_extents = Vec3::new(0.4, 0.0, 0.4);
        assert!(matches!(cfg.validate(), Err(CovrError::Config(_))));
    }

    #[test]
    fn validate_rejects_negative_hand_reach() {
        let mut cfg = InteractionConfig::default();
        cfg.linkage.hand_reach = -0.1;
        assert!(matches!(cfg.validate(), Err(CovrError::Config(_))));
    }

    #[test]
    fn validate_surfaces_section_errors() {
        let mut cfg = InteractionConfig::default();
        cfg.arbitration.snap_distance = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = InteractionConfig::default();
        cfg.navigation.axis_epsilon = 0.0;
        assert!(cfg.validate().is_err());
    }
}

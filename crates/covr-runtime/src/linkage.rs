//! [`PropLinkage`] – grab/release hysteresis for one physical prop.
//!
//! ```text
//!            above for grab_hold_duration
//!   Resting ───────────────────────────────▶ Grabbed
//!      ▲                                        │
//!      └────────────────────────────────────────┘
//!           below for release_hold_duration
//! ```
//!
//! The state machine only advances while the column is on target and the
//! prop sits inside the docking zone; otherwise its timers are held as they
//! are.  The two timers are mutually exclusive: the idle one is kept at zero
//! and the accumulating one drops back to zero the instant its condition
//! stops holding.
//!
//! On grab the docked VOI of the prop's category is parented to the prop
//! with an identity local pose.  On release the link is dropped and the VOI
//! keeps its last pose, or, under [`ReleasePolicy::RecenterGroup`], the whole
//! category is shifted by the prop's planar offset from the column.

use covr_scene::{GrabState, Prop, SceneRegistry};
use covr_types::{CovrError, GrabTransition, Pose, PropId, Vec3, VoiCategory, VoiId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LinkageConfig;
use crate::signal::Signal;

/// What happens to the VOIs of the prop's category on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// The released VOI stays where the prop left it.
    #[default]
    FreezeInPlace,
    /// Every VOI of the category moves to its initial position plus the
    /// prop's planar offset from the column, and takes the prop's rotation.
    RecenterGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabPhase {
    #[default]
    Resting,
    Grabbed,
}

/// Per-tick inputs shared by every linkage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkageInputs {
    pub dt: f32,
    pub column_on_target: bool,
    pub column_position: Vec3,
    pub left_hand: Option<Vec3>,
    pub right_hand: Option<Vec3>,
}

/// Grab/release state machine for one prop.
#[derive(Debug)]
pub struct PropLinkage {
    prop: PropId,
    category: VoiCategory,
    policy: ReleasePolicy,
    hand_reach: f32,
    phase: GrabPhase,
    grab_timer: f32,
    release_timer: f32,
    linked: Option<VoiId>,
    pub on_grab: Signal,
    pub on_release: Signal,
}

impl PropLinkage {
    pub fn new(prop: &Prop, config: &LinkageConfig) -> Self {
        Self {
            prop: prop.id,
            category: prop.category,
            policy: config.release_policy,
            hand_reach: config.hand_reach,
            phase: GrabPhase::Resting,
            grab_timer: 0.0,
            release_timer: 0.0,
            linked: None,
            on_grab: Signal::new("on_grab"),
            on_release: Signal::new("on_release"),
        }
    }

    pub fn prop(&self) -> PropId {
        self.prop
    }

    pub fn category(&self) -> VoiCategory {
        self.category
    }

    pub fn phase(&self) -> GrabPhase {
        self.phase
    }

    pub fn grab_timer(&self) -> f32 {
        self.grab_timer
    }

    pub fn release_timer(&self) -> f32 {
        self.release_timer
    }

    /// The VOI currently riding on the prop.
    pub fn linked_voi(&self) -> Option<VoiId> {
        self.linked
    }

    /// Advance the state machine by one tick.
    ///
    /// # Errors
    ///
    /// Returns a lookup error if the prop or its linked VOI vanished from
    /// `registry`.
    pub fn tick(
        &mut self,
        registry: &mut SceneRegistry,
        inputs: &LinkageInputs,
    ) -> Result<Option<GrabTransition>, CovrError> {
        let prop = registry.prop(self.prop)?;
        let pose = prop.pose();
        let docked = prop.inside_docking_zone;
        let above = prop.is_above_platform();
        let (grab_hold, release_hold) = (prop.grab_hold_duration, prop.release_hold_duration);

        if let (Some(voi), Some(pose)) = (self.linked, pose) {
            registry.voi_mut(voi)?.follow(pose);
        }

        if !inputs.column_on_target || !docked {
            return Ok(None);
        }
        let (Some(above), Some(pose)) = (above, pose) else {
            return Ok(None);
        };

        match (self.phase, above) {
            (GrabPhase::Resting, true) => {
                self.release_timer = 0.0;
                self.grab_timer += inputs.dt;
                if self.grab_timer >= grab_hold {
                    self.grab_timer = 0.0;
                    self.grab(registry, pose, inputs)?;
                    return Ok(Some(GrabTransition::Grabbed));
                }
            }
            (GrabPhase::Grabbed, false) => {
                self.grab_timer = 0.0;
                self.release_timer += inputs.dt;
                if self.release_timer >= release_hold {
                    self.release_timer = 0.0;
                    self.release(registry, pose, inputs)?;
                    return Ok(Some(GrabTransition::Released));
                }
            }
            (GrabPhase::Resting, false) | (GrabPhase::Grabbed, true) => {
                self.grab_timer = 0.0;
                self.release_timer = 0.0;
            }
        }
        Ok(None)
    }

    fn grab(
        &mut self,
        registry: &mut SceneRegistry,
        pose: Pose,
        inputs: &LinkageInputs,
    ) -> Result<(), CovrError> {
        self.phase = GrabPhase::Grabbed;

        if let Some(voi_id) = registry.docked_voi(self.category) {
            let voi = registry.voi_mut(voi_id)?;
            voi.link_to(self.prop, pose);
            debug!(voi = %voi.name, "voi linked to prop");
            self.linked = Some(voi_id);
        }

        let reach = |hand: Option<Vec3>| hand.is_some_and(|h| h.distance(pose.position) <= self.hand_reach);
        let grab = GrabState {
            is_grabbed: true,
            grabbed_with_left_hand: reach(inputs.left_hand),
            grabbed_with_right_hand: reach(inputs.right_hand),
        };
        let prop = registry.prop_mut(self.prop)?;
        prop.grab = grab;
        info!(
            prop = %prop.name,
            linked = ?self.linked,
            left = grab.grabbed_with_left_hand,
            right = grab.grabbed_with_right_hand,
            "prop grabbed"
        );

        self.on_grab.emit();
        Ok(())
    }

    fn release(
        &mut self,
        registry: &mut SceneRegistry,
        pose: Pose,
        inputs: &LinkageInputs,
    ) -> Result<(), CovrError> {
        self.phase = GrabPhase::Resting;

        if let Some(voi_id) = self.linked.take() {
            registry.voi_mut(voi_id)?.unlink();
        }

        if self.policy == ReleasePolicy::RecenterGroup {
            let offset = Vec3::new(
                pose.position.x - inputs.column_position.x,
                0.0,
                pose.position.z - inputs.column_position.z,
            );
            registry.recenter_group(self.category, offset, pose.rotation);
        }

        let prop = registry.prop_mut(self.prop)?;
        prop.grab = GrabState::default();
        info!(prop = %prop.name, policy = ?self.policy, "prop released");

        self.on_release.emit();
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

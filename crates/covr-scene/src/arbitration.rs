//! Attention arbitration: one navigation target out of many weighted
//! candidates.
//!
//! Precedence, highest first:
//!
//! 1. an explicit selection (scripted hint or operator choice);
//! 2. **snap** to the closest candidate when the viewer stands within
//!    `snap_distance` of it on the floor plane;
//! 3. **diffuse** – the weight-averaged position of every active,
//!    non-surface VOI.
//!
//! When the diffuse centroid cannot be formed (no candidates, zero or
//! non-finite weight sum) the previous target is retained.

use covr_types::{CovrError, Vec3, VoiCategory, VoiId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::registry::SceneRegistry;
use crate::voi::Highlight;

fn default_snap_distance() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArbitrationConfig {
    /// Planar viewer-to-closest distance below which the target snaps.
    #[serde(default = "default_snap_distance")]
    pub snap_distance: f32,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            snap_distance: default_snap_distance(),
        }
    }
}

impl ArbitrationConfig {
    pub fn validate(&self) -> Result<(), CovrError> {
        if !(self.snap_distance >= 0.0) || !self.snap_distance.is_finite() {
            return Err(CovrError::Config(
                "arbitration.snap_distance must be a finite, non-negative distance".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a target was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    Snap(VoiId),
    Diffuse,
    Scripted(VoiId),
    /// The previous target, kept because no new one could be formed.
    Retained,
}

impl TargetSource {
    /// The VOI the target stands for, if it is a single one.
    pub fn voi(&self) -> Option<VoiId> {
        match self {
            TargetSource::Snap(id) | TargetSource::Scripted(id) => Some(*id),
            TargetSource::Diffuse | TargetSource::Retained => None,
        }
    }
}

/// A navigation goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub position: Vec3,
    pub source: TargetSource,
}

/// `Σ wᵢ·pᵢ / Σ wᵢ` over the active, non-surface VOIs, or `None` when that
/// is undefined.
pub fn weighted_centroid(registry: &SceneRegistry) -> Option<Vec3> {
    let mut sum = Vec3::ZERO;
    let mut total = 0.0_f32;
    for voi in registry.vois().filter(|v| v.is_candidate()) {
        let w = voi.weights().weight;
        sum += voi.position() * w;
        total += w;
    }
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    let centroid = sum / total;
    centroid.is_finite().then_some(centroid)
}

/// Decides the navigation target each tick.
#[derive(Debug, Default)]
pub struct Arbitrator {
    config: ArbitrationConfig,
    /// Explicit selection and the position captured when it was made.
    simulated: Option<(VoiId, Vec3)>,
    last: Option<Target>,
}

impl Arbitrator {
    pub fn new(config: ArbitrationConfig) -> Self {
        Self {
            config,
            simulated: None,
            last: None,
        }
    }

    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    pub fn set_snap_distance(&mut self, snap_distance: f32) {
        self.config.snap_distance = snap_distance;
    }

    /// The explicitly selected VOI, if any.
    pub fn simulated_voi(&self) -> Option<VoiId> {
        self.simulated.map(|(id, _)| id)
    }

    /// Most recent target handed out.
    pub fn last_target(&self) -> Option<Target> {
        self.last
    }

    /// Compute this tick's target.  `viewer` is the viewer position, or
    /// `None` when tracking is not reporting it.
    pub fn arbitrate(&mut self, registry: &SceneRegistry, viewer: Option<Vec3>) -> Option<Target> {
        if let Some((id, position)) = self.simulated {
            return self.remember(Target {
                position,
                source: TargetSource::Scripted(id),
            });
        }

        if let Some(viewer) = viewer {
            let snapped = registry
                .closest_voi_to_viewer()
                .and_then(|id| registry.voi(id).ok())
                .filter(|v| viewer.planar_distance(v.position()) < self.config.snap_distance);
            if let Some(voi) = snapped {
                return self.remember(Target {
                    position: voi.position(),
                    source: TargetSource::Snap(voi.id),
                });
            }
        }

        match weighted_centroid(registry) {
            Some(position) => self.remember(Target {
                position,
                source: TargetSource::Diffuse,
            }),
            None => {
                let retained = self.last.map(|t| Target {
                    position: t.position,
                    source: TargetSource::Retained,
                });
                if retained.is_some() {
                    debug!("diffuse target undefined, retaining previous target");
                }
                retained
            }
        }
    }

    fn remember(&mut self, target: Target) -> Option<Target> {
        if self.last.map(|t| t.source) != Some(target.source) {
            debug!(source = ?target.source, x = target.position.x, z = target.position.z, "target source changed");
        }
        self.last = Some(target);
        Some(target)
    }

    // ── Explicit selection ──────────────────────────────────────────────────

    /// Select `id` explicitly, bypassing the weights.  The previous
    /// selection is unhighlighted and the new one hinted.
    pub fn select(&mut self, registry: &mut SceneRegistry, id: VoiId) -> Result<Vec3, CovrError> {
        let position = registry.voi(id)?.position();
        self.unhighlight_previous(registry);
        let voi = registry.voi_mut(id)?;
        voi.highlight = Highlight::Hinted;
        info!(voi = %voi.name, category = %voi.category, "voi selected");
        self.simulated = Some((id, position));
        Ok(position)
    }

    /// Select the `index`-th surface.
    pub fn select_surface(&mut self, registry: &mut SceneRegistry, index: usize) -> Result<VoiId, CovrError> {
        let id = registry.surface(index)?;
        self.select(registry, id)?;
        Ok(id)
    }

    /// Select a uniformly random VOI of `category`.
    pub fn select_random<R: Rng + ?Sized>(
        &mut self,
        registry: &mut SceneRegistry,
        category: VoiCategory,
        rng: &mut R,
    ) -> Result<VoiId, CovrError> {
        let id = registry.random_voi_of(category, rng)?;
        self.select(registry, id)?;
        Ok(id)
    }

    /// Drop the explicit selection and return to weight-driven targeting.
    pub fn clear_selection(&mut self, registry: &mut SceneRegistry) {
        self.unhighlight_previous(registry);
        self.simulated = None;
    }

    fn unhighlight_previous(&self, registry: &mut SceneRegistry) {
        if let Some((prev, _)) = self.simulated {
            if let Ok(voi) = registry.voi_mut(prev) {
                voi.highlight = Highlight::Off;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use covr_perception::VoiWeights;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::voi::VoiSpec;

    fn with_weights(positions_and_weights: &[(Vec3, f32)]) -> SceneRegistry {
        let mut reg = SceneRegistry::builder()
            .with_vois(
                positions_and_weights
                    .iter()
                    .enumerate()
                    .map(|(i, (p, _))| VoiSpec::new(format!("v{i}"), VoiCategory::TypeA, *p)),
            )
            .build();
        for (i, (p, w)) in positions_and_weights.iter().enumerate() {
            let d = p.length();
            reg.voi_mut(VoiId(i)).unwrap().set_weights(VoiWeights {
                weight: *w,
                position_weight: 1.0 / (1.0 + d),
                rotation_weight: 0.0,
            });
        }
        reg
    }

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!(a.distance(b) < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn snaps_to_closest_within_snap_distance() {
        let reg = with_weights(&[
            (Vec3::new(0.5, 0.0, 0.0), 0.1),
            (Vec3::new(4.0, 0.0, 0.0), 0.9),
        ]);
        let mut arb = Arbitrator::new(ArbitrationConfig { snap_distance: 1.0 });
        let target = arb.arbitrate(&reg, Some(Vec3::new(0.0, 1.7, 0.0))).unwrap();
        assert_eq!(target.source, TargetSource::Snap(VoiId(0)));
        assert_eq!(target.position, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn diffuse_centroid_with_weights_one_two_three() {
        let reg = with_weights(&[
            (Vec3::new(3.0, 0.0, 0.0), 1.0),
            (Vec3::new(0.0, 0.0, 3.0), 2.0),
            (Vec3::new(-3.0, 0.0, 0.0), 3.0),
        ]);
        let mut arb = Arbitrator::new(ArbitrationConfig { snap_distance: 1.0 });
        let target = arb.arbitrate(&reg, Some(Vec3::ZERO)).unwrap();
        assert_eq!(target.source, TargetSource::Diffuse);
        assert_vec_eq(target.position, Vec3::new(-1.0, 0.0, 1.0));
    }

    #[test]
    fn diffuse_without_viewer() {
        let reg = with_weights(&[(Vec3::new(0.2, 0.0, 0.0), 1.0)]);
        let mut arb = Arbitrator::default();
        let target = arb.arbitrate(&reg, None).unwrap();
        assert_eq!(target.source, TargetSource::Diffuse);
    }

    #[test]
    fn zero_weight_sum_retains_previous_target() {
        let mut reg = with_weights(&[(Vec3::new(0.0, 0.0, 6.0), 1.0)]);
        let mut arb = Arbitrator::new(ArbitrationConfig { snap_distance: 1.0 });
        let first = arb.arbitrate(&reg, Some(Vec3::ZERO)).unwrap();

        reg.voi_mut(VoiId(0)).unwrap().set_weights(VoiWeights::default());
        let second = arb.arbitrate(&reg, Some(Vec3::ZERO)).unwrap();
        assert_eq!(second.source, TargetSource::Retained);
        assert_eq!(second.position, first.position);
        assert!(second.position.is_finite());
    }

    #[test]
    fn no_candidates_and_no_history_yields_none() {
        let reg = SceneRegistry::builder().build();
        let mut arb = Arbitrator::default();
        assert!(arb.arbitrate(&reg, Some(Vec3::ZERO)).is_none());
        assert!(weighted_centroid(&reg).is_none());
    }

    #[test]
    fn selection_takes_precedence_and_moves_highlight() {
        let mut reg = with_weights(&[
            (Vec3::new(0.5, 0.0, 0.0), 1.0),
            (Vec3::new(4.0, 0.0, 4.0), 1.0),
        ]);
        let mut arb = Arbitrator::default();
        arb.select(&mut reg, VoiId(1)).unwrap();
        assert_eq!(reg.voi(VoiId(1)).unwrap().highlight, Highlight::Hinted);

        let target = arb.arbitrate(&reg, Some(Vec3::ZERO)).unwrap();
        assert_eq!(target.source, TargetSource::Scripted(VoiId(1)));
        assert_eq!(target.position, Vec3::new(4.0, 0.0, 4.0));

        arb.select(&mut reg, VoiId(0)).unwrap();
        assert_eq!(reg.voi(VoiId(1)).unwrap().highlight, Highlight::Off);
        assert_eq!(reg.voi(VoiId(0)).unwrap().highlight, Highlight::Hinted);

        arb.clear_selection(&mut reg);
        assert_eq!(reg.voi(VoiId(0)).unwrap().highlight, Highlight::Off);
        assert!(arb.simulated_voi().is_none());
    }

    #[test]
    fn select_surface_and_random() {
        let mut reg = SceneRegistry::builder()
            .with_voi(VoiSpec::new("a", VoiCategory::TypeA, Vec3::new(1.0, 0.0, 1.0)))
            .with_voi(VoiSpec::new("table", VoiCategory::Surface, Vec3::new(2.0, 0.0, 0.0)))
            .build();
        let mut arb = Arbitrator::default();
        assert_eq!(arb.select_surface(&mut reg, 0).unwrap(), VoiId(1));
        assert!(arb.select_surface(&mut reg, 3).is_err());

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            arb.select_random(&mut reg, VoiCategory::TypeA, &mut rng).unwrap(),
            VoiId(0)
        );
        assert_eq!(reg.voi(VoiId(1)).unwrap().highlight, Highlight::Off);
        assert!(arb.select_random(&mut reg, VoiCategory::TypeB, &mut rng).is_err());
    }
}

//! [`SceneRegistry`] – owner of every VOI and PROP in the session.
//!
//! VOIs and PROPs are grouped by [`VoiCategory`].  Each category may have at
//! most one PROP; the builder checks this when the registry is built.  A
//! lenient [`build`][SceneRegistryBuilder::build] logs the problem and keeps
//! going, after which every PROP lookup for the offending category returns
//! [`CovrError::DuplicateProp`].  [`build_strict`][SceneRegistryBuilder::build_strict]
//! refuses instead.
//!
//! # Example
//!
//! ```rust
//! use covr_scene::registry::SceneRegistry;
//! use covr_scene::{PropSpec, VoiSpec};
//! use covr_types::{Vec3, VoiCategory};
//!
//! let registry = SceneRegistry::builder()
//!     .with_voi(VoiSpec::new("cup", VoiCategory::TypeA, Vec3::new(0.0, 0.8, 2.0)))
//!     .with_voi(VoiSpec::new("table", VoiCategory::Surface, Vec3::new(2.0, 0.7, 0.0)))
//!     .with_prop(PropSpec::new("block", VoiCategory::TypeA))
//!     .build_strict()
//!     .expect("valid scene");
//!
//! assert_eq!(registry.vois_of(VoiCategory::TypeA).count(), 1);
//! assert!(registry.prop_for(VoiCategory::TypeA).is_ok());
//! assert!(registry.prop_for(VoiCategory::TypeB).is_err());
//! ```

use std::collections::{BTreeSet, HashMap};

use covr_perception::{ColliderSet, WeightingEngine};
use covr_types::{Aabb, CovrError, Pose, PropId, Quaternion, Vec3, VoiCategory, VoiId};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, error, info};

use crate::prop::{Prop, PropSpec};
use crate::voi::{Voi, VoiSpec};

/// Key of a collider in the scene's collision world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneBody {
    Voi(VoiId),
    /// Index into the static obstacle list.
    Obstacle(usize),
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Collects scene contents, then validates them into a [`SceneRegistry`].
#[derive(Debug, Default)]
pub struct SceneRegistryBuilder {
    vois: Vec<VoiSpec>,
    props: Vec<PropSpec>,
    obstacles: Vec<Aabb>,
}

impl SceneRegistryBuilder {
    pub fn with_voi(mut self, spec: VoiSpec) -> Self {
        self.vois.push(spec);
        self
    }

    pub fn with_vois(mut self, specs: impl IntoIterator<Item = VoiSpec>) -> Self {
        self.vois.extend(specs);
        self
    }

    pub fn with_prop(mut self, spec: PropSpec) -> Self {
        self.props.push(spec);
        self
    }

    pub fn with_props(mut self, specs: impl IntoIterator<Item = PropSpec>) -> Self {
        self.props.extend(specs);
        self
    }

    /// Add a static obstacle that takes part in ray casting.
    pub fn with_obstacle(mut self, bounds: Aabb) -> Self {
        self.obstacles.push(bounds);
        self
    }

    /// Build, logging configuration errors and continuing degraded.
    pub fn build(self) -> SceneRegistry {
        let vois: Vec<Voi> = self
            .vois
            .into_iter()
            .enumerate()
            .map(|(i, spec)| Voi::from_spec(VoiId(i), spec))
            .collect();
        let mut config_errors = Vec::new();
        for err in self.props.iter().filter_map(|spec| spec.validate().err()) {
            error!("{err}");
            config_errors.push(err);
        }
        let props: Vec<Prop> = self
            .props
            .into_iter()
            .enumerate()
            .map(|(i, spec)| Prop::from_spec(PropId(i), spec))
            .collect();

        let mut prop_index = HashMap::new();
        let mut conflicts = BTreeSet::new();
        for prop in &props {
            if prop_index.insert(prop.category, prop.id).is_some() {
                conflicts.insert(prop.category);
            }
        }
        for category in &conflicts {
            prop_index.remove(category);
            let err = CovrError::DuplicateProp(*category);
            error!(%category, "{err}");
            config_errors.push(err);
        }

        info!(
            vois = vois.len(),
            props = props.len(),
            obstacles = self.obstacles.len(),
            "scene registry built"
        );

        SceneRegistry {
            vois,
            props,
            obstacles: self.obstacles,
            prop_index,
            conflicts,
            config_errors,
        }
    }

    /// Build, returning the first configuration error instead of degrading.
    pub fn build_strict(self) -> Result<SceneRegistry, CovrError> {
        let registry = self.build();
        match registry.config_errors.first() {
            Some(err) => Err(err.clone()),
            None => Ok(registry),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

/// Owner of the scene's VOIs, PROPs and static obstacles.
#[derive(Debug)]
pub struct SceneRegistry {
    vois: Vec<Voi>,
    props: Vec<Prop>,
    obstacles: Vec<Aabb>,
    prop_index: HashMap<VoiCategory, PropId>,
    conflicts: BTreeSet<VoiCategory>,
    config_errors: Vec<CovrError>,
}

impl SceneRegistry {
    pub fn builder() -> SceneRegistryBuilder {
        SceneRegistryBuilder::default()
    }

    /// Configuration errors detected while building.
    pub fn config_errors(&self) -> &[CovrError] {
        &self.config_errors
    }

    // ── VOIs ────────────────────────────────────────────────────────────────

    pub fn voi(&self, id: VoiId) -> Result<&Voi, CovrError> {
        self.vois.get(id.0).ok_or(CovrError::UnknownVoi(id))
    }

    pub fn voi_mut(&mut self, id: VoiId) -> Result<&mut Voi, CovrError> {
        self.vois.get_mut(id.0).ok_or(CovrError::UnknownVoi(id))
    }

    /// Every VOI in registration order.
    pub fn vois(&self) -> impl Iterator<Item = &Voi> {
        self.vois.iter()
    }

    /// All VOIs of `category`, in registration order.
    pub fn vois_of(&self, category: VoiCategory) -> impl Iterator<Item = &Voi> {
        self.vois.iter().filter(move |v| v.category == category)
    }

    /// Active, non-surface VOI with the greatest position weight.  Ties go to
    /// the first one registered.
    pub fn closest_voi_to_viewer(&self) -> Option<VoiId> {
        let mut best: Option<&Voi> = None;
        for voi in self.vois.iter().filter(|v| v.is_candidate()) {
            if best.is_none_or(|b| voi.weights().position_weight > b.weights().position_weight) {
                best = Some(voi);
            }
        }
        best.map(|v| v.id)
    }

    /// The `index`-th surface, in registration order.
    pub fn surface(&self, index: usize) -> Result<VoiId, CovrError> {
        let surfaces: Vec<VoiId> = self.vois_of(VoiCategory::Surface).map(|v| v.id).collect();
        if surfaces.is_empty() {
            return Err(CovrError::EmptyCategory(VoiCategory::Surface));
        }
        surfaces
            .get(index)
            .copied()
            .ok_or(CovrError::IndexOutOfRange {
                category: VoiCategory::Surface,
                index,
                len: surfaces.len(),
            })
    }

    /// A uniformly random VOI of `category`.
    pub fn random_voi_of<R: Rng + ?Sized>(
        &self,
        category: VoiCategory,
        rng: &mut R,
    ) -> Result<VoiId, CovrError> {
        let ids: Vec<VoiId> = self.vois_of(category).map(|v| v.id).collect();
        ids.choose(rng)
            .copied()
            .ok_or(CovrError::EmptyCategory(category))
    }

    /// First VOI of `category` currently inside the docking zone.
    pub fn docked_voi(&self, category: VoiCategory) -> Option<VoiId> {
        self.vois_of(category)
            .find(|v| v.inside_docking_zone)
            .map(|v| v.id)
    }

    /// Recompute the weights of every active VOI as seen by `viewer`.
    pub fn update_weights(&mut self, engine: &WeightingEngine, viewer: &Pose) {
        let world = self.colliders();
        for voi in self.vois.iter_mut().filter(|v| v.is_active) {
            let weights = engine.evaluate(
                viewer,
                SceneBody::Voi(voi.id),
                voi.position(),
                &voi.bounds(),
                &world,
            );
            voi.set_weights(weights);
        }
    }

    /// Collision world made of the active VOIs and the static obstacles.
    pub fn colliders(&self) -> ColliderSet<SceneBody> {
        let mut world = ColliderSet::new();
        for voi in self.vois.iter().filter(|v| v.is_active) {
            world.insert(SceneBody::Voi(voi.id), voi.bounds());
        }
        for (i, bounds) in self.obstacles.iter().enumerate() {
            world.insert(SceneBody::Obstacle(i), *bounds);
        }
        world
    }

    // ── Docking ─────────────────────────────────────────────────────────────

    /// Recompute docking flags against `zone`.  Surfaces are left untouched;
    /// props that never reported a pose keep their flag.
    pub fn update_docking_zone(&mut self, zone: &Aabb) {
        for voi in &mut self.vois {
            if voi.set_docked(zone.contains_point(voi.position())) {
                debug!(voi = %voi.name, docked = voi.inside_docking_zone, "voi docking changed");
            }
        }
        for prop in &mut self.props {
            let Some(pose) = prop.pose() else { continue };
            if prop.set_docked(zone.contains_point(pose.position)) {
                debug!(prop = %prop.name, docked = prop.inside_docking_zone, "prop docking changed");
            }
        }
    }

    /// Enter/exit trigger for a VOI.
    pub fn set_voi_docked(&mut self, id: VoiId, inside: bool) -> Result<(), CovrError> {
        self.voi_mut(id)?.set_docked(inside);
        Ok(())
    }

    /// Enter/exit trigger for a PROP.
    pub fn set_prop_docked(&mut self, id: PropId, inside: bool) -> Result<(), CovrError> {
        self.prop_mut(id)?.set_docked(inside);
        Ok(())
    }

    // ── PROPs ───────────────────────────────────────────────────────────────

    pub fn prop(&self, id: PropId) -> Result<&Prop, CovrError> {
        self.props.get(id.0).ok_or(CovrError::UnknownProp(id))
    }

    pub fn prop_mut(&mut self, id: PropId) -> Result<&mut Prop, CovrError> {
        self.props.get_mut(id.0).ok_or(CovrError::UnknownProp(id))
    }

    pub fn props(&self) -> impl Iterator<Item = &Prop> {
        self.props.iter()
    }

    pub(crate) fn props_mut(&mut self) -> impl Iterator<Item = &mut Prop> {
        self.props.iter_mut()
    }

    /// The single PROP registered for `category`.
    pub fn prop_id_for(&self, category: VoiCategory) -> Result<PropId, CovrError> {
        if self.conflicts.contains(&category) {
            return Err(CovrError::DuplicateProp(category));
        }
        self.prop_index
            .get(&category)
            .copied()
            .ok_or(CovrError::MissingProp(category))
    }

    pub fn prop_for(&self, category: VoiCategory) -> Result<&Prop, CovrError> {
        let id = self.prop_id_for(category)?;
        self.prop(id)
    }

    /// Feed one tracking sample per PROP, keyed by category.
    pub fn observe_props(&mut self, mut sample: impl FnMut(VoiCategory) -> Option<Pose>) {
        for prop in self.props_mut() {
            prop.observe(sample(prop.category));
        }
    }

    /// Whether any PROP is currently grabbed.
    pub fn any_grabbed(&self) -> bool {
        self.props.iter().any(|p| p.grab.is_grabbed)
    }

    /// Move every VOI of `category` to its initial position plus `offset`
    /// and give it `rotation`.
    pub fn recenter_group(&mut self, category: VoiCategory, offset: Vec3, rotation: Quaternion) {
        for voi in self.vois.iter_mut().filter(|v| v.category == category) {
            voi.recenter(offset, rotation);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

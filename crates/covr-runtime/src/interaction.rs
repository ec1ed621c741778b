//! [`InteractionLoop`] – the single owner of all per-tick state.
//!
//! Each call to [`InteractionLoop::tick`] runs, in this order:
//!
//! 1. **Sense** – sample the viewer, both hands and every prop from the
//!    [`TrackingSource`]; props settle their resting pose on their first
//!    valid sample.
//! 2. **Dock** – recompute docking flags against the box carried by the
//!    column (when enabled).
//! 3. **Weigh** – score every active VOI from the viewer's pose, unless the
//!    loop runs in systemic mode or the viewer is not reporting.
//! 4. **Arbitrate** – pick the navigation target.  Skipped while any prop is
//!    grabbed so the column holds still under the user's hands.
//! 5. **Navigate** – one [`NavigationController`] step.  An actuator fault
//!    halts the loop: this and every later tick return an error.
//! 6. **Link** – advance every prop's grab/release state machine.
//!
//! # Example
//!
//! ```rust
//! use covr_hal::sim::{SimColumn, SimTracker, StraightLinePlanner};
//! use covr_hal::TrackedBody;
//! use covr_runtime::interaction::InteractionLoop;
//! use covr_scene::{SceneRegistry, VoiSpec};
//! use covr_types::{Pose, Vec3, VoiCategory};
//!
//! let registry = SceneRegistry::builder()
//!     .with_voi(VoiSpec::new("cup", VoiCategory::TypeA, Vec3::new(0.0, 0.0, 5.0)))
//!     .build();
//! let column = SimColumn::new("column", Vec3::new(2.0, 0.0, 0.0), 1.0);
//! let tracker = SimTracker::new();
//! tracker.set(TrackedBody::Viewer, Pose::identity());
//!
//! let mut session = InteractionLoop::builder()
//!     .with_registry(registry)
//!     .with_actuator(Box::new(column.clone()))
//!     .with_path_service(Box::new(StraightLinePlanner))
//!     .with_tracker(Box::new(tracker))
//!     .build()
//!     .expect("complete rig");
//!
//! let report = session.tick(0.02).unwrap();
//! let target = report.target.unwrap();
//! assert!(target.position.distance(Vec3::new(0.0, 0.0, 5.0)) < 1e-5);
//! ```

use covr_hal::{ColumnActuator, PathService, TrackedBody, TrackingSource};
use covr_perception::WeightingEngine;
use covr_scene::{Arbitrator, Highlight, SceneRegistry, Target};
use covr_types::{
    Aabb, ArrivalTransition, CovrError, GrabTransition, Hand, PropId, Vec3, VoiCategory, VoiId,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::InteractionConfig;
use crate::linkage::{LinkageInputs, PropLinkage};
use crate::navigation::{NavState, NavigationController, NavigationStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub elapsed_secs: f32,
    /// Target navigation aimed at this tick.
    pub target: Option<Target>,
    /// `true` when arbitration was skipped because a prop is grabbed.
    pub target_frozen: bool,
    pub navigation: NavigationStatus,
    pub column: Vec3,
    pub grabs: Vec<(PropId, GrabTransition)>,
}

/// One row of the weight dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightEntry {
    pub id: VoiId,
    pub name: String,
    pub category: VoiCategory,
    pub active: bool,
    pub weight: f32,
    pub position_weight: f32,
    pub rotation_weight: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Collects the collaborators of an [`InteractionLoop`].
#[derive(Default)]
pub struct InteractionLoopBuilder {
    config: InteractionConfig,
    registry: Option<SceneRegistry>,
    actuator: Option<Box<dyn ColumnActuator>>,
    paths: Option<Box<dyn PathService>>,
    tracker: Option<Box<dyn TrackingSource>>,
}

impl InteractionLoopBuilder {
    pub fn with_config(mut self, config: InteractionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: SceneRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_actuator(mut self, actuator: Box<dyn ColumnActuator>) -> Self {
        self.actuator = Some(actuator);
        self
    }

    pub fn with_path_service(mut self, paths: Box<dyn PathService>) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn with_tracker(mut self, tracker: Box<dyn TrackingSource>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Validate the configuration and assemble the loop.
    ///
    /// # Errors
    ///
    /// - [`CovrError::Config`] if the configuration is invalid.
    /// - [`CovrError::MissingReference`] if the registry, actuator, path
    ///   service or tracker was not supplied.
    pub fn build(self) -> Result<InteractionLoop, CovrError> {
        self.config.validate()?;
        let registry = self
            .registry
            .ok_or_else(|| CovrError::MissingReference("scene registry".to_string()))?;
        let actuator = self
            .actuator
            .ok_or_else(|| CovrError::MissingReference("column actuator".to_string()))?;
        let paths = self
            .paths
            .ok_or_else(|| CovrError::MissingReference("path service".to_string()))?;
        let tracker = self
            .tracker
            .ok_or_else(|| CovrError::MissingReference("tracking source".to_string()))?;

        let mut linkages = Vec::new();
        for prop in registry.props() {
            match registry.prop_id_for(prop.category) {
                Ok(id) if id == prop.id => {
                    linkages.push(PropLinkage::new(prop, &self.config.linkage));
                }
                Ok(_) | Err(_) => {
                    warn!(prop = %prop.name, category = %prop.category, "prop excluded from grab detection");
                }
            }
        }

        let rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            column = actuator.id(),
            props = linkages.len(),
            systemic = self.config.systemic,
            "interaction loop ready"
        );

        Ok(InteractionLoop {
            weighting: WeightingEngine::new(self.config.weighting.clone()),
            arbitrator: Arbitrator::new(self.config.arbitration.clone()),
            navigator: NavigationController::new(self.config.navigation.clone()),
            config: self.config,
            registry,
            linkages,
            actuator,
            paths,
            tracker,
            rng,
            reached: None,
            halted: None,
            ticks: 0,
            elapsed: 0.0,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InteractionLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the scene, the controllers and the hardware handles.
pub struct InteractionLoop {
    config: InteractionConfig,
    registry: SceneRegistry,
    weighting: WeightingEngine,
    arbitrator: Arbitrator,
    navigator: NavigationController,
    linkages: Vec<PropLinkage>,
    actuator: Box<dyn ColumnActuator>,
    paths: Box<dyn PathService>,
    tracker: Box<dyn TrackingSource>,
    rng: StdRng,
    /// VOI showing the `Reached` highlight.
    reached: Option<VoiId>,
    halted: Option<CovrError>,
    ticks: u64,
    elapsed: f32,
}

impl InteractionLoop {
    pub fn builder() -> InteractionLoopBuilder {
        InteractionLoopBuilder::default()
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    /// Mutable scene access, e.g. for external docking triggers.
    pub fn registry_mut(&mut self) -> &mut SceneRegistry {
        &mut self.registry
    }

    pub fn navigator(&self) -> &NavigationController {
        &self.navigator
    }

    /// Mutable navigator access, e.g. to connect arrival listeners.
    pub fn navigator_mut(&mut self) -> &mut NavigationController {
        &mut self.navigator
    }

    pub fn arbitrator(&self) -> &Arbitrator {
        &self.arbitrator
    }

    pub fn linkages(&self) -> &[PropLinkage] {
        &self.linkages
    }

    /// The linkage driving `prop`, e.g. to connect grab listeners.
    pub fn linkage_mut(&mut self, prop: PropId) -> Option<&mut PropLinkage> {
        self.linkages.iter_mut().find(|l| l.prop() == prop)
    }

    pub fn column_position(&self) -> Vec3 {
        self.actuator.position()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// The fault that halted the loop.
    pub fn halt_reason(&self) -> Option<&CovrError> {
        self.halted.as_ref()
    }

    pub fn is_systemic(&self) -> bool {
        self.config.systemic
    }

    /// Toggle scripted mode.  While on, weights are left as they are.
    pub fn set_systemic(&mut self, systemic: bool) {
        if self.config.systemic != systemic {
            info!(systemic, "systemic mode changed");
            self.config.systemic = systemic;
        }
    }

    // ── Scripted hints ───────────────────────────────────────────────────────

    /// Send the column to `id`, bypassing the weights.
    pub fn select(&mut self, id: VoiId) -> Result<(), CovrError> {
        self.arbitrator.select(&mut self.registry, id)?;
        Ok(())
    }

    /// "Hint grab": send the column to a random VOI of `category`.
    pub fn select_random(&mut self, category: VoiCategory) -> Result<VoiId, CovrError> {
        self.arbitrator
            .select_random(&mut self.registry, category, &mut self.rng)
    }

    /// "Hint release": send the column to the `index`-th surface.
    pub fn select_surface(&mut self, index: usize) -> Result<VoiId, CovrError> {
        self.arbitrator.select_surface(&mut self.registry, index)
    }

    /// Return to weight-driven targeting.
    pub fn clear_selection(&mut self) {
        self.arbitrator.clear_selection(&mut self.registry);
    }

    /// Current weights of every VOI, logged and returned.
    pub fn weights_report(&self) -> Vec<WeightEntry> {
        self.registry
            .vois()
            .map(|v| {
                let w = v.weights();
                info!(voi = %v.name, weight = w.weight, "voi weight");
                WeightEntry {
                    id: v.id,
                    name: v.name.clone(),
                    category: v.category,
                    active: v.is_active,
                    weight: w.weight,
                    position_weight: w.position_weight,
                    rotation_weight: w.rotation_weight,
                }
            })
            .collect()
    }

    // ── Tick ─────────────────────────────────────────────────────────────────

    /// Advance every component by `dt` seconds.
    ///
    /// # Errors
    ///
    /// - [`CovrError::Halted`] once a previous tick hit an actuator fault.
    /// - The actuator fault itself on the tick it happens.
    pub fn tick(&mut self, dt: f32) -> Result<TickReport, CovrError> {
        if let Some(reason) = &self.halted {
            return Err(CovrError::Halted(reason.to_string()));
        }

        // ── 1. Sense ─────────────────────────────────────────────────────────
        let viewer = self
            .tracker
            .sample(TrackedBody::Viewer)
            .filter(|p| p.position.is_finite());
        let left_hand = self
            .tracker
            .sample(TrackedBody::Hand(Hand::Left))
            .map(|p| p.position);
        let right_hand = self
            .tracker
            .sample(TrackedBody::Hand(Hand::Right))
            .map(|p| p.position);
        let tracker = &self.tracker;
        self.registry
            .observe_props(|category| tracker.sample(TrackedBody::Prop(category)));

        // ── 2. Dock ──────────────────────────────────────────────────────────
        let column = self.actuator.position();
        if self.config.docking_zone.enabled {
            let zone = Aabb::from_center(column, self.config.docking_zone.half_extents);
            self.registry.update_docking_zone(&zone);
        }

        // ── 3. Weigh ─────────────────────────────────────────────────────────
        if !self.config.systemic {
            if let Some(viewer) = &viewer {
                self.registry.update_weights(&self.weighting, viewer);
            }
        }

        // ── 4. Arbitrate ─────────────────────────────────────────────────────
        let target_frozen = self.registry.any_grabbed();
        let target = if target_frozen {
            self.arbitrator.last_target()
        } else {
            let target = self
                .arbitrator
                .arbitrate(&self.registry, viewer.map(|p| p.position));
            if let Some(t) = target {
                self.navigator.set_target(t.position);
            }
            target
        };

        // ── 5. Navigate ──────────────────────────────────────────────────────
        let navigation = match self
            .navigator
            .tick(self.actuator.as_mut(), self.paths.as_mut())
        {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "navigation failed, halting interaction loop");
                self.halted = Some(e.clone());
                return Err(e);
            }
        };
        self.update_highlight(target, navigation.transition);

        // ── 6. Link ──────────────────────────────────────────────────────────
        let inputs = LinkageInputs {
            dt,
            column_on_target: navigation.state == NavState::OnTarget,
            column_position: self.actuator.position(),
            left_hand,
            right_hand,
        };
        let mut grabs = Vec::new();
        for linkage in &mut self.linkages {
            if let Some(transition) = linkage.tick(&mut self.registry, &inputs)? {
                grabs.push((linkage.prop(), transition));
            }
        }

        self.ticks += 1;
        self.elapsed += dt;
        Ok(TickReport {
            tick: self.ticks,
            elapsed_secs: self.elapsed,
            target,
            target_frozen,
            navigation,
            column: inputs.column_position,
            grabs,
        })
    }

    fn update_highlight(&mut self, target: Option<Target>, transition: Option<ArrivalTransition>) {
        match transition {
            Some(ArrivalTransition::Reached) => {
                let Some(id) = target.and_then(|t| t.source.voi()) else { return };
                if let Ok(voi) = self.registry.voi_mut(id) {
                    info!(voi = %voi.name, "column reached voi");
                    voi.highlight = Highlight::Reached;
                    self.reached = Some(id);
                }
            }
            Some(ArrivalTransition::Left) => {
                let Some(id) = self.reached.take() else { return };
                let hinted = self.arbitrator.simulated_voi() == Some(id);
                if let Ok(voi) = self.registry.voi_mut(id) {
                    if voi.highlight == Highlight::Reached {
                        voi.highlight = if hinted { Highlight::Hinted } else { Highlight::Off };
                    }
                }
            }
            _ => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

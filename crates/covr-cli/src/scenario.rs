//! Simulated session: the rig around an [`InteractionLoop`] and the scripted
//! user who lifts the docked prop and puts it back.

use std::sync::atomic::{AtomicBool, Ordering};

use covr_hal::sim::{ExclusionZonePlanner, SimColumn, SimTracker, StraightLinePlanner};
use covr_hal::{PathService, TrackedBody};
use covr_runtime::{InteractionLoop, NavState, TickReport, WeightEntry};
use covr_scene::{Highlight, SceneRegistry, Target};
use covr_types::{
    Aabb, ArrivalTransition, CovrError, GrabTransition, Hand, Pose, Quaternion, Vec3, VoiCategory,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{CliConfig, Hint};

/// Clearance kept between the column and the viewer's keep-out circle.
const DETOUR_MARGIN: f32 = 0.2;

// ─────────────────────────────────────────────────────────────────────────────
// Scripted user
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum LiftPhase {
    /// Waiting for the column to dock a VOI of the prop's category.
    Waiting,
    /// Prop held up for `held` seconds so far.
    Lifting { held: f32 },
    /// Prop put back, waiting for the release.
    Replacing,
    Done,
}

#[derive(Debug)]
struct LiftScript {
    category: Option<VoiCategory>,
    lift_height: f32,
    lift_secs: f32,
    phase: LiftPhase,
}

impl LiftScript {
    fn is_lifted(&self) -> bool {
        matches!(self.phase, LiftPhase::Lifting { .. })
    }

    fn advance(&mut self, report: &TickReport, registry: &SceneRegistry, dt: f32) {
        let Some(category) = self.category else { return };
        let released = report.grabs.iter().any(|(_, t)| *t == GrabTransition::Released);
        let prop_grabbed = registry.prop_for(category).is_ok_and(|p| p.grab.is_grabbed);

        self.phase = match self.phase {
            LiftPhase::Waiting
                if report.navigation.state == NavState::OnTarget
                    && registry.docked_voi(category).is_some() =>
            {
                info!(%category, "user lifts the prop");
                LiftPhase::Lifting { held: 0.0 }
            }
            LiftPhase::Lifting { held } => {
                let held = held + dt;
                if held >= self.lift_secs && prop_grabbed {
                    info!(%category, "user puts the prop back");
                    LiftPhase::Replacing
                } else {
                    LiftPhase::Lifting { held }
                }
            }
            LiftPhase::Replacing if released => LiftPhase::Done,
            phase => phase,
        };
    }

    /// Whether the scripted interaction has run its course.
    fn is_done(&self, report: &TickReport) -> bool {
        match self.category {
            Some(_) => self.phase == LiftPhase::Done,
            None => report.navigation.state == NavState::OnTarget,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrabEvent {
    pub tick: u64,
    pub prop: String,
    pub transition: GrabTransition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiHighlight {
    pub name: String,
    pub highlight: Highlight,
}

/// Outcome of a simulated session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub elapsed_secs: f32,
    /// The scripted interaction completed.
    pub finished: bool,
    /// Stopped by Ctrl-C.
    pub interrupted: bool,
    pub halted: Option<String>,
    pub arrivals: u32,
    pub column: Vec3,
    pub target: Option<Target>,
    pub events: Vec<GrabEvent>,
    pub highlights: Vec<VoiHighlight>,
    pub weights: Vec<WeightEntry>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rig
// ─────────────────────────────────────────────────────────────────────────────

/// Simulated hardware plus the interaction loop driving it.
pub struct Rig {
    session: InteractionLoop,
    column: SimColumn,
    tracker: SimTracker,
    prop_height: f32,
    script: LiftScript,
}

impl Rig {
    /// Build the scene, the simulated drivers and the loop, then issue the
    /// configured hint.
    ///
    /// # Errors
    ///
    /// Any configuration error from the loop builder, or a hint naming an
    /// object that does not exist.
    pub fn build(cfg: &CliConfig) -> Result<Self, CovrError> {
        let scene = &cfg.scene;
        let registry = scene
            .obstacles
            .iter()
            .fold(
                SceneRegistry::builder()
                    .with_vois(scene.vois.iter().cloned())
                    .with_props(scene.props.iter().cloned()),
                |b, o| b.with_obstacle(Aabb::from_center(o.center, o.half_extents)),
            )
            .build();
        for err in registry.config_errors() {
            warn!(error = %err, "scene loaded in degraded mode");
        }

        let column = SimColumn::new("column", cfg.sim.column_start, cfg.sim.column_speed);
        let tracker = SimTracker::new();
        let viewer = Pose::new(
            scene.viewer.position,
            Quaternion::from_yaw_degrees(scene.viewer.yaw_degrees),
        );
        tracker.set(TrackedBody::Viewer, viewer);

        let planner: Box<dyn PathService> = if cfg.sim.exclusion_radius > 0.0 {
            Box::new(ExclusionZonePlanner::new(
                viewer.position,
                cfg.sim.exclusion_radius,
                DETOUR_MARGIN,
            ))
        } else {
            Box::new(StraightLinePlanner)
        };

        let mut session = InteractionLoop::builder()
            .with_config(cfg.interaction.clone())
            .with_registry(registry)
            .with_actuator(Box::new(column.clone()))
            .with_path_service(planner)
            .with_tracker(Box::new(tracker.clone()))
            .build()?;

        if let Some(hint) = &cfg.sim.hint {
            apply_hint(&mut session, hint)?;
        }

        let category = session.linkages().first().map(|l| l.category());
        let rig = Self {
            session,
            column,
            tracker,
            prop_height: cfg.sim.prop_height,
            script: LiftScript {
                category,
                lift_height: cfg.sim.lift_height,
                lift_secs: cfg.sim.lift_secs,
                phase: LiftPhase::Waiting,
            },
        };
        rig.place_props();
        Ok(rig)
    }

    pub fn session(&self) -> &InteractionLoop {
        &self.session
    }

    /// Tick until the scripted interaction is done, `max_ticks` ran out, the
    /// loop halted or `shutdown` was raised.
    pub fn run(&mut self, max_ticks: u64, dt: f32, shutdown: &AtomicBool) -> Summary {
        let mut arrivals = 0;
        let mut events = Vec::new();
        let mut halted = None;
        let mut finished = false;
        let mut interrupted = false;
        let mut last_target = None;

        for _ in 0..max_ticks {
            if shutdown.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }
            self.place_props();
            let report = match self.session.tick(dt) {
                Ok(report) => report,
                Err(e) => {
                    halted = Some(e.to_string());
                    break;
                }
            };
            self.column.step(dt);

            if report.navigation.transition == Some(ArrivalTransition::Reached) {
                arrivals += 1;
            }
            for (prop, transition) in &report.grabs {
                let name = self
                    .session
                    .registry()
                    .prop(*prop)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|_| prop.to_string());
                events.push(GrabEvent {
                    tick: report.tick,
                    prop: name,
                    transition: *transition,
                });
            }
            last_target = report.target;

            self.script.advance(&report, self.session.registry(), dt);
            if self.script.is_done(&report) {
                finished = true;
                break;
            }
        }

        let registry = self.session.registry();
        Summary {
            ticks: self.session.ticks(),
            elapsed_secs: self.session.ticks() as f32 * dt,
            finished,
            interrupted,
            halted,
            arrivals,
            column: self.session.column_position(),
            target: last_target,
            events,
            highlights: registry
                .vois()
                .map(|v| VoiHighlight {
                    name: v.name.clone(),
                    highlight: v.highlight,
                })
                .collect(),
            weights: self.session.weights_report(),
        }
    }

    /// Props ride on top of the column; the scripted one is raised while the
    /// user holds it, with the right hand on it.
    fn place_props(&self) {
        let base = self.column_top();
        let lifted = base + Vec3::UP * self.script.lift_height;
        for prop in self.session.registry().props() {
            let raised = self.script.is_lifted() && self.script.category == Some(prop.category);
            let position = if raised { lifted } else { base };
            self.tracker
                .set(TrackedBody::Prop(prop.category), Pose::at(position));
        }
        if self.script.is_lifted() {
            self.tracker
                .set(TrackedBody::Hand(Hand::Right), Pose::at(lifted));
        } else {
            self.tracker.clear(TrackedBody::Hand(Hand::Right));
        }
    }

    fn column_top(&self) -> Vec3 {
        self.session.column_position().with_y(self.prop_height)
    }
}

fn apply_hint(session: &mut InteractionLoop, hint: &Hint) -> Result<(), CovrError> {
    match hint {
        Hint::Voi { name } => {
            let id = session
                .registry()
                .vois()
                .find(|v| &v.name == name)
                .map(|v| v.id)
                .ok_or_else(|| CovrError::Config(format!("hint names unknown voi '{name}'")))?;
            session.select(id)
        }
        Hint::Random { category } => session.select_random(*category).map(|_| ()),
        Hint::Surface { index } => session.select_surface(*index).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use covr_scene::{PropSpec, VoiSpec};

    use super::*;

    fn quick_config() -> CliConfig {
        let mut cfg = CliConfig::demo();
        cfg.sim.column_speed = 2.0;
        cfg.interaction.rng_seed = Some(7);
        cfg
    }

    #[test]
    fn scripted_lift_grabs_and_releases() {
        let cfg = quick_config();
        let mut rig = Rig::build(&cfg).unwrap();
        let summary = rig.run(2000, cfg.sim.dt, &AtomicBool::new(false));

        assert!(summary.finished, "session did not finish: {summary:?}");
        assert!(summary.halted.is_none());
        assert!(summary.arrivals >= 1);
        let transitions: Vec<GrabTransition> =
            summary.events.iter().map(|e| e.transition).collect();
        assert_eq!(
            transitions,
            vec![GrabTransition::Grabbed, GrabTransition::Released]
        );
        assert_eq!(summary.events[0].prop, "cup_proxy");

        let cup = summary
            .highlights
            .iter()
            .find(|h| h.name == "cup_left")
            .unwrap();
        assert_eq!(cup.highlight, Highlight::Reached);
        assert!(!rig.session().registry().any_grabbed());
    }

    #[test]
    fn raised_shutdown_flag_stops_before_first_tick() {
        let cfg = quick_config();
        let mut rig = Rig::build(&cfg).unwrap();
        let summary = rig.run(100, cfg.sim.dt, &AtomicBool::new(true));
        assert!(summary.interrupted);
        assert!(!summary.finished);
        assert_eq!(summary.ticks, 0);
    }

    #[test]
    fn unknown_hint_target_is_rejected() {
        let mut cfg = quick_config();
        cfg.sim.hint = Some(Hint::Voi {
            name: "teapot".to_string(),
        });
        assert!(matches!(Rig::build(&cfg), Err(CovrError::Config(_))));
    }

    #[test]
    fn without_props_session_ends_on_arrival() {
        let mut cfg = CliConfig::default();
        cfg.scene.props.clear();
        cfg.scene.vois = vec![VoiSpec::new(
            "cup",
            VoiCategory::TypeA,
            Vec3::new(0.0, 1.0, 2.0),
        )];
        cfg.sim.exclusion_radius = 0.0;
        cfg.sim.column_speed = 2.0;
        let mut rig = Rig::build(&cfg).unwrap();
        let summary = rig.run(1000, cfg.sim.dt, &AtomicBool::new(false));
        assert!(summary.finished);
        assert!(summary.events.is_empty());
        assert!(summary.column.planar_distance(Vec3::new(0.0, 0.0, 2.0)) < 1e-3);
    }

    #[test]
    fn duplicate_props_degrade_instead_of_failing() {
        let mut cfg = quick_config();
        cfg.scene
            .props
            .push(PropSpec::new("second_cup_proxy", VoiCategory::TypeA));
        let rig = Rig::build(&cfg).unwrap();
        assert!(rig.session().linkages().is_empty());
        assert_eq!(rig.session().registry().config_errors().len(), 1);
    }
}

//! [`NavigationController`] – drives the column to the arbitrated target.
//!
//! Each tick the path service is asked for a path from the column to the
//! target and the corner count picks the actuation mode:
//!
//! | Corners | Mode | Sub-target |
//! |---|---|---|
//! | 0 or 1 (unresolved) | velocity, unit magnitude | the destination |
//! | 2 | direct positioning | the destination, issued once per target |
//! | 3 or more | velocity | `corners[1]` |
//!
//! The speed vector points from the column (height aligned to the
//! sub-target) toward the sub-target and is scaled by the remaining path
//! distance, or by `1` when that distance is unknown.  Each axis command is
//! floored to zero below `axis_epsilon`; the column is on target exactly when
//! both axes sit at the floor.  Arrival edges are reported as one-shot,
//! mutually exclusive [`ArrivalTransition`]s and fired on the matching
//! [`Signal`].

use covr_hal::{ColumnActuator, PathService};
use covr_types::{ActuationMode, ArrivalTransition, AxisCommand, CovrError, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::signal::Signal;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

fn default_axis_epsilon() -> f32 {
    0.001
}

fn default_retarget_tolerance() -> f32 {
    0.01
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavigationConfig {
    /// Axis commands with a smaller magnitude are floored to zero.
    #[serde(default = "default_axis_epsilon")]
    pub axis_epsilon: f32,
    /// A target moving less than this is not treated as a new target.
    #[serde(default = "default_retarget_tolerance")]
    pub retarget_tolerance: f32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            axis_epsilon: default_axis_epsilon(),
            retarget_tolerance: default_retarget_tolerance(),
        }
    }
}

impl NavigationConfig {
    pub fn validate(&self) -> Result<(), CovrError> {
        if !(self.axis_epsilon > 0.0) {
            return Err(CovrError::Config(
                "navigation.axis_epsilon must be positive".to_string(),
            ));
        }
        if !(self.retarget_tolerance >= 0.0) {
            return Err(CovrError::Config(
                "navigation.retarget_tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Status
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavState {
    /// No target.
    #[default]
    Idle,
    Navigating,
    OnTarget,
}

/// Outcome of one navigation tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NavigationStatus {
    pub state: NavState,
    pub mode: ActuationMode,
    pub command: AxisCommand,
    pub waypoint: Option<Vec3>,
    pub remaining_distance: Option<f32>,
    pub transition: Option<ArrivalTransition>,
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

/// Converts the waypoint stream into actuator commands and detects arrival.
#[derive(Debug)]
pub struct NavigationController {
    config: NavigationConfig,
    target: Option<Vec3>,
    on_target: bool,
    /// Destination last handed to the actuator in direct mode.
    issued_goal: Option<Vec3>,
    status: NavigationStatus,
    pub on_target_reached: Signal,
    pub on_target_sustained: Signal,
    pub on_target_left: Signal,
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new(NavigationConfig::default())
    }
}

impl NavigationController {
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            config,
            target: None,
            on_target: false,
            issued_goal: None,
            status: NavigationStatus::default(),
            on_target_reached: Signal::new("on_target_reached"),
            on_target_sustained: Signal::new("on_target_sustained"),
            on_target_left: Signal::new("on_target_left"),
        }
    }

    pub fn target(&self) -> Option<Vec3> {
        self.target
    }

    pub fn on_target(&self) -> bool {
        self.on_target
    }

    /// Status produced by the most recent tick.
    pub fn status(&self) -> NavigationStatus {
        self.status
    }

    /// Aim at `position`.  A target that moved beyond the retarget tolerance
    /// invalidates the previous direct-positioning goal.
    pub fn set_target(&mut self, position: Vec3) {
        let moved = self
            .target
            .is_none_or(|t| t.distance(position) > self.config.retarget_tolerance);
        if moved {
            debug!(x = position.x, y = position.y, z = position.z, "navigation target set");
            self.issued_goal = None;
            self.target = Some(position);
        }
    }

    /// Forget the target; the next tick goes idle.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.issued_goal = None;
    }

    /// Run one navigation step.
    ///
    /// # Errors
    ///
    /// Propagates any [`CovrError::ActuatorFault`] raised by the actuator.
    pub fn tick(
        &mut self,
        actuator: &mut dyn ColumnActuator,
        paths: &mut dyn PathService,
    ) -> Result<NavigationStatus, CovrError> {
        let Some(destination) = self.target else {
            let transition = self.record_arrival(false);
            self.status = NavigationStatus {
                state: NavState::Idle,
                mode: actuator.mode(),
                command: AxisCommand::ZERO,
                waypoint: None,
                remaining_distance: None,
                transition,
            };
            return Ok(self.status);
        };

        let actual = actuator.position();
        let plan = paths.compute_path(actual, destination);

        // A resolved path without a remaining distance is measured along
        // its corners.
        let along = if plan.has_finite_remaining() {
            plan.remaining_distance
        } else {
            plan.length()
        };
        let (waypoint, remaining, mode) = match plan.corners.len() {
            0 | 1 => {
                trace!("path unresolved, heading straight for the destination");
                (destination, f32::INFINITY, ActuationMode::Velocity)
            }
            2 => (plan.corners[1], along, ActuationMode::Direct),
            _ => (plan.corners[1], along, ActuationMode::Velocity),
        };

        if actuator.mode() != mode {
            actuator.set_mode(mode)?;
            info!(column = actuator.id(), ?mode, "actuation mode switched");
        }

        let from = actual.with_y(waypoint.y);
        let magnitude = if remaining.is_finite() {
            remaining.max(0.0)
        } else {
            1.0
        };
        let speed = (waypoint - from).normalized() * magnitude;
        let command = AxisCommand::from_speed(speed, self.config.axis_epsilon);

        match mode {
            ActuationMode::Direct => {
                if self.issued_goal != Some(destination) {
                    actuator.go_to(destination)?;
                    self.issued_goal = Some(destination);
                    debug!(x = destination.x, z = destination.z, "direct goal issued");
                }
            }
            ActuationMode::Velocity => {
                self.issued_goal = None;
                actuator.drive(command)?;
            }
        }

        let transition = self.record_arrival(command.is_at_rest());
        self.status = NavigationStatus {
            state: if self.on_target {
                NavState::OnTarget
            } else {
                NavState::Navigating
            },
            mode,
            command,
            waypoint: Some(waypoint),
            remaining_distance: remaining.is_finite().then_some(remaining),
            transition,
        };
        Ok(self.status)
    }

    fn record_arrival(&mut self, now: bool) -> Option<ArrivalTransition> {
        let was = self.on_target;
        self.on_target = now;
        let transition = match (was, now) {
            (false, true) => Some(ArrivalTransition::Reached),
            (true, true) => Some(ArrivalTransition::Sustained),
            (true, false) => Some(ArrivalTransition::Left),
            (false, false) => None,
        };
        match transition {
            Some(ArrivalTransition::Reached) => {
                info!("column reached target");
                self.on_target_reached.emit();
            }
            Some(ArrivalTransition::Sustained) => self.on_target_sustained.emit(),
            Some(ArrivalTransition::Left) => {
                info!("column left target");
                self.on_target_left.emit();
            }
            None => {}
        }
        transition
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use covr_hal::PathPlan;

    use super::*;

    /// Actuator that records every command without moving.
    #[derive(Default)]
    struct RecordingColumn {
        position: Vec3,
        mode: ActuationMode,
        command: AxisCommand,
        go_to_calls: Vec<Vec3>,
        mode_switches: usize,
        fail: bool,
    }

    impl ColumnActuator for RecordingColumn {
        fn id(&self) -> &str {
            "recording_column"
        }

        fn position(&self) -> Vec3 {
            self.position
        }

        fn mode(&self) -> ActuationMode {
            self.mode
        }

        fn set_mode(&mut self, mode: ActuationMode) -> Result<(), CovrError> {
            self.mode = mode;
            self.mode_switches += 1;
            Ok(())
        }

        fn drive(&mut self, command: AxisCommand) -> Result<(), CovrError> {
            if self.fail {
                return Err(CovrError::ActuatorFault {
                    component: "recording_column".to_string(),
                    details: "drive rejected".to_string(),
                });
            }
            self.command = command;
            Ok(())
        }

        fn axis_command(&self) -> AxisCommand {
            self.command
        }

        fn go_to(&mut self, destination: Vec3) -> Result<(), CovrError> {
            self.go_to_calls.push(destination);
            Ok(())
        }
    }

    /// Path service returning a fixed plan.
    struct FixedPlanner(PathPlan);

    impl PathService for FixedPlanner {
        fn compute_path(&mut self, _origin: Vec3, _destination: Vec3) -> PathPlan {
            self.0.clone()
        }
    }

    fn counter(signal: &mut Signal) -> Arc<AtomicUsize> {
        let n = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&n);
        signal.connect(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        n
    }

    #[test]
    fn two_corners_issue_destination_in_direct_mode() {
        let dest = Vec3::new(2.0, 0.0, 3.0);
        let mut column = RecordingColumn::default();
        let mut planner = FixedPlanner(PathPlan::new(vec![Vec3::ZERO, dest], 3.6));
        let mut nav = NavigationController::default();
        nav.set_target(dest);

        let status = nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(status.mode, ActuationMode::Direct);
        assert_eq!(column.mode, ActuationMode::Direct);
        assert_eq!(column.go_to_calls, vec![dest]);

        // Same target: the goal is not re-issued and the mode is not toggled again.
        nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(column.go_to_calls.len(), 1);
        assert_eq!(column.mode_switches, 1);
    }

    #[test]
    fn retarget_invalidates_direct_goal() {
        let mut column = RecordingColumn::default();
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 0.0, 1.0);
        let mut nav = NavigationController::default();

        nav.set_target(a);
        nav.tick(&mut column, &mut FixedPlanner(PathPlan::new(vec![Vec3::ZERO, a], 1.0)))
            .unwrap();
        nav.set_target(b);
        nav.tick(&mut column, &mut FixedPlanner(PathPlan::new(vec![Vec3::ZERO, b], 1.0)))
            .unwrap();
        assert_eq!(column.go_to_calls, vec![a, b]);
    }

    #[test]
    fn three_corners_drive_toward_second_corner_scaled_by_remaining() {
        let corner = Vec3::new(3.0, 5.0, 4.0);
        let mut column = RecordingColumn::default();
        let mut planner = FixedPlanner(PathPlan::new(
            vec![Vec3::ZERO, corner, Vec3::new(6.0, 0.0, 0.0)],
            10.0,
        ));
        let mut nav = NavigationController::default();
        nav.set_target(Vec3::new(6.0, 0.0, 0.0));

        let status = nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(status.mode, ActuationMode::Velocity);
        assert_eq!(status.waypoint, Some(corner));
        // Height is aligned before taking the direction: (3, 4) / 5 * 10.
        assert!((column.command.x - 6.0).abs() < 1e-4);
        assert!((column.command.z - 8.0).abs() < 1e-4);
        assert!((column.command.magnitude() - 10.0).abs() < 1e-4);
        assert!(column.go_to_calls.is_empty());
    }

    #[test]
    fn missing_remaining_distance_is_measured_along_corners() {
        let corner = Vec3::new(3.0, 0.0, 4.0);
        let dest = Vec3::new(3.0, 0.0, 10.0);
        let mut column = RecordingColumn::default();
        let mut planner = FixedPlanner(PathPlan::new(
            vec![Vec3::ZERO, corner, dest],
            f32::INFINITY,
        ));
        let mut nav = NavigationController::default();
        nav.set_target(dest);

        let status = nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(status.remaining_distance, Some(11.0));
        assert!((column.command.magnitude() - 11.0).abs() < 1e-4);
    }

    #[test]
    fn unresolved_path_yields_unit_command_toward_destination() {
        let mut column = RecordingColumn {
            mode: ActuationMode::Direct,
            ..RecordingColumn::default()
        };
        let mut planner = FixedPlanner(PathPlan::unresolved());
        let mut nav = NavigationController::default();
        nav.set_target(Vec3::new(0.0, 0.0, -7.0));

        let status = nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(status.mode, ActuationMode::Velocity);
        assert_eq!(status.remaining_distance, None);
        assert!((column.command.z + 1.0).abs() < 1e-5);
        assert_eq!(column.command.x, 0.0);
    }

    #[test]
    fn arrival_edges_are_one_shot() {
        let here = Vec3::new(1.0, 0.0, 1.0);
        let mut column = RecordingColumn {
            position: here,
            ..RecordingColumn::default()
        };
        let mut planner = FixedPlanner(PathPlan::new(vec![here, here, here], 0.0));
        let mut nav = NavigationController::default();
        let reached = counter(&mut nav.on_target_reached);
        let sustained = counter(&mut nav.on_target_sustained);
        let left = counter(&mut nav.on_target_left);
        nav.set_target(here);

        let s1 = nav.tick(&mut column, &mut planner).unwrap();
        let s2 = nav.tick(&mut column, &mut planner).unwrap();
        let s3 = nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(s1.transition, Some(ArrivalTransition::Reached));
        assert_eq!(s2.transition, Some(ArrivalTransition::Sustained));
        assert_eq!(s3.transition, Some(ArrivalTransition::Sustained));
        assert_eq!(s3.state, NavState::OnTarget);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
        assert_eq!(sustained.load(Ordering::SeqCst), 2);

        column.position = Vec3::new(-3.0, 0.0, 1.0);
        planner.0.remaining_distance = 4.0;
        let s4 = nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(s4.transition, Some(ArrivalTransition::Left));
        assert_eq!(s4.state, NavState::Navigating);
        assert_eq!(left.load(Ordering::SeqCst), 1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tiny_axis_components_are_floored() {
        let mut column = RecordingColumn::default();
        // Remaining distance so small that both axes fall under the floor.
        let mut planner = FixedPlanner(PathPlan::new(
            vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 2.0)],
            0.0005,
        ));
        let mut nav = NavigationController::default();
        nav.set_target(Vec3::new(2.0, 0.0, 2.0));
        let status = nav.tick(&mut column, &mut planner).unwrap();
        assert!(status.command.is_at_rest());
        assert_eq!(status.state, NavState::OnTarget);
    }

    #[test]
    fn no_target_is_idle_and_leaves_target() {
        let here = Vec3::ZERO;
        let mut column = RecordingColumn::default();
        let mut planner = FixedPlanner(PathPlan::new(vec![here, here, here], 0.0));
        let mut nav = NavigationController::default();
        nav.set_target(here);
        nav.tick(&mut column, &mut planner).unwrap();
        assert!(nav.on_target());

        nav.clear_target();
        let status = nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(status.state, NavState::Idle);
        assert_eq!(status.transition, Some(ArrivalTransition::Left));
        let status = nav.tick(&mut column, &mut planner).unwrap();
        assert_eq!(status.transition, None);
    }

    #[test]
    fn actuator_fault_propagates() {
        let mut column = RecordingColumn {
            fail: true,
            ..RecordingColumn::default()
        };
        let mut planner = FixedPlanner(PathPlan::unresolved());
        let mut nav = NavigationController::default();
        nav.set_target(Vec3::new(1.0, 0.0, 0.0));
        let err = nav.tick(&mut column, &mut planner).unwrap_err();
        assert!(matches!(err, CovrError::ActuatorFault { .. }));
    }
}

//! In-process simulation drivers for headless tests and the CLI.
//!
//! Every driver is a cheap cloneable handle over shared state: the
//! interaction loop owns one clone behind the HAL trait while the harness
//! keeps another to advance time or move tracked bodies.
//!
//! | Driver | Behaviour |
//! |---|---|
//! | [`SimColumn`] | Integrates velocity commands (clamped to a max speed); in direct mode travels to the issued point at max speed. |
//! | [`StraightLinePlanner`] | Always returns the two-corner path `[origin, destination]`. |
//! | [`ExclusionZonePlanner`] | Adds a detour corner when the straight segment crosses a circular keep-out area. |
//! | [`SimTracker`] | Returns whatever pose was last set for a body; unset bodies report no sample. |
//!
//! # Example
//!
//! ```rust
//! use covr_hal::sim::SimColumn;
//! use covr_hal::ColumnActuator;
//! use covr_types::{ActuationMode, Vec3};
//!
//! let column = SimColumn::new("column", Vec3::ZERO, 1.0);
//! let mut driver = column.clone();
//! driver.set_mode(ActuationMode::Direct).unwrap();
//! driver.go_to(Vec3::new(0.0, 0.0, 0.5)).unwrap();
//!
//! column.step(1.0);
//! assert_eq!(column.position(), Vec3::new(0.0, 0.0, 0.5));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use covr_types::{ActuationMode, AxisCommand, CovrError, Pose, Vec3};
use tracing::{debug, trace};

use crate::actuator::ColumnActuator;
use crate::path::{PathPlan, PathService};
use crate::tracking::{TrackedBody, TrackingSource};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ────────────────────────────────────────────────────────────────────────────
// SimColumn
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ColumnState {
    position: Vec3,
    mode: ActuationMode,
    command: AxisCommand,
    goal: Option<Vec3>,
    max_speed: f32,
    fault: Option<String>,
}

/// A simulated column platform.
#[derive(Debug, Clone)]
pub struct SimColumn {
    id: String,
    state: Arc<Mutex<ColumnState>>,
}

impl SimColumn {
    /// Create a column at `start` that never moves faster than `max_speed`
    /// (metres per second).
    pub fn new(id: impl Into<String>, start: Vec3, max_speed: f32) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(ColumnState {
                position: start,
                mode: ActuationMode::Velocity,
                command: AxisCommand::ZERO,
                goal: None,
                max_speed: max_speed.max(0.0),
                fault: None,
            })),
        }
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let mut s = locked(&self.state);
        let reach = s.max_speed * dt;
        match s.mode {
            ActuationMode::Velocity => {
                let mut velocity = Vec3::new(s.command.x, 0.0, s.command.z);
                let speed = velocity.length();
                if speed > s.max_speed {
                    velocity = velocity * (s.max_speed / speed);
                }
                s.position += velocity * dt;
            }
            ActuationMode::Direct => {
                let Some(goal) = s.goal else { return };
                let goal = goal.with_y(s.position.y);
                let offset = goal - s.position;
                if offset.length() <= reach {
                    s.position = goal;
                } else {
                    s.position += offset.normalized() * reach;
                }
            }
        }
        trace!(column = %self.id, x = s.position.x, z = s.position.z, "sim column stepped");
    }

    /// Make every subsequent command fail with an actuator fault (`Some`) or
    /// clear a previously injected fault (`None`).
    pub fn inject_fault(&self, details: Option<String>) {
        locked(&self.state).fault = details;
    }

    /// Point most recently issued with [`go_to`][ColumnActuator::go_to].
    pub fn goal(&self) -> Option<Vec3> {
        locked(&self.state).goal
    }

    fn check_fault(&self, s: &ColumnState) -> Result<(), CovrError> {
        match &s.fault {
            Some(details) => Err(CovrError::ActuatorFault {
                component: self.id.clone(),
                details: details.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl ColumnActuator for SimColumn {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> Vec3 {
        locked(&self.state).position
    }

    fn mode(&self) -> ActuationMode {
        locked(&self.state).mode
    }

    fn set_mode(&mut self, mode: ActuationMode) -> Result<(), CovrError> {
        let mut s = locked(&self.state);
        self.check_fault(&s)?;
        if s.mode != mode {
            debug!(column = %self.id, ?mode, "sim column mode switched");
            s.mode = mode;
            s.command = AxisCommand::ZERO;
        }
        Ok(())
    }

    fn drive(&mut self, command: AxisCommand) -> Result<(), CovrError> {
        let mut s = locked(&self.state);
        self.check_fault(&s)?;
        s.command = command;
        Ok(())
    }

    fn axis_command(&self) -> AxisCommand {
        locked(&self.state).command
    }

    fn go_to(&mut self, destination: Vec3) -> Result<(), CovrError> {
        let mut s = locked(&self.state);
        self.check_fault(&s)?;
        s.goal = Some(destination);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Planners
// ────────────────────────────────────────────────────────────────────────────

/// Open-floor planner: the straight segment is always walkable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLinePlanner;

impl PathService for StraightLinePlanner {
    fn compute_path(&mut self, origin: Vec3, destination: Vec3) -> PathPlan {
        PathPlan::new(
            vec![origin, destination],
            origin.planar_distance(destination),
        )
    }
}

/// Planner that keeps the column outside a circular area on the floor
/// (typically the viewer's standing area).
#[derive(Debug, Clone)]
pub struct ExclusionZonePlanner {
    center: Vec3,
    radius: f32,
    margin: f32,
}

impl ExclusionZonePlanner {
    pub fn new(center: Vec3, radius: f32, margin: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            margin: margin.max(0.0),
        }
    }

    /// Move the keep-out area, e.g. to follow the viewer.
    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    fn inside(&self, p: Vec3) -> bool {
        p.planar_distance(self.center) < self.radius
    }

    /// Detour corner for the segment `a → b`, if the segment crosses the area.
    fn detour(&self, a: Vec3, b: Vec3) -> Option<Vec3> {
        let c = self.center.with_y(a.y);
        let ab = (b - a).flattened();
        let len_sq = ab.dot(ab);
        if len_sq <= f32::EPSILON {
            return None;
        }
        let t = ((c - a).flattened().dot(ab) / len_sq).clamp(0.0, 1.0);
        let closest = a + ab * t;
        if closest.planar_distance(c) >= self.radius {
            return None;
        }
        let mut away = (closest - c).flattened().normalized();
        if away == Vec3::ZERO {
            // Segment passes straight through the centre: pick the left normal.
            away = Vec3::new(-ab.z, 0.0, ab.x).normalized();
        }
        Some(c + away * (self.radius + self.margin))
    }
}

impl PathService for ExclusionZonePlanner {
    fn compute_path(&mut self, origin: Vec3, destination: Vec3) -> PathPlan {
        if self.inside(origin) || self.inside(destination) {
            return StraightLinePlanner.compute_path(origin, destination);
        }
        match self.detour(origin, destination) {
            Some(corner) => {
                let plan = PathPlan::new(vec![origin, corner, destination], 0.0);
                let remaining = plan.length();
                PathPlan::new(plan.corners, remaining)
            }
            None => StraightLinePlanner.compute_path(origin, destination),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimTracker
// ────────────────────────────────────────────────────────────────────────────

/// Settable tracking source.
#[derive(Debug, Clone, Default)]
pub struct SimTracker {
    poses: Arc<Mutex<HashMap<TrackedBody, Pose>>>,
}

impl SimTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `pose` for `body` from now on.
    pub fn set(&self, body: TrackedBody, pose: Pose) {
        locked(&self.poses).insert(body, pose);
    }

    /// Stop reporting `body`.
    pub fn clear(&self, body: TrackedBody) {
        locked(&self.poses).remove(&body);
    }
}

impl TrackingSource for SimTracker {
    fn sample(&self, body: TrackedBody) -> Option<Pose> {
        locked(&self.poses).get(&body).copied()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use covr_types::{Hand, VoiCategory};

    use super::*;

    #[test]
    fn velocity_mode_integrates_clamped_command() {
        let column = SimColumn::new("column", Vec3::ZERO, 1.0);
        let mut driver = column.clone();
        driver.drive(AxisCommand::new(10.0, 0.0)).unwrap();
        column.step(0.5);
        assert!((column.position().x - 0.5).abs() < 1e-5);

        driver.drive(AxisCommand::new(0.0, -0.4)).unwrap();
        column.step(1.0);
        assert!((column.position().z + 0.4).abs() < 1e-5);
    }

    #[test]
    fn direct_mode_travels_at_max_speed_and_snaps() {
        let column = SimColumn::new("column", Vec3::new(0.0, 0.3, 0.0), 2.0);
        let mut driver = column.clone();
        driver.set_mode(ActuationMode::Direct).unwrap();
        driver.go_to(Vec3::new(3.0, 0.0, 0.0)).unwrap();

        column.step(1.0);
        assert!((column.position().x - 2.0).abs() < 1e-5);
        column.step(1.0);
        // Height is kept; only the floor position follows the goal.
        assert_eq!(column.position(), Vec3::new(3.0, 0.3, 0.0));
    }

    #[test]
    fn mode_switch_clears_axis_command() {
        let column = SimColumn::new("column", Vec3::ZERO, 1.0);
        let mut driver = column.clone();
        driver.drive(AxisCommand::new(1.0, 1.0)).unwrap();
        driver.set_mode(ActuationMode::Direct).unwrap();
        assert_eq!(driver.axis_command(), AxisCommand::ZERO);
    }

    #[test]
    fn injected_fault_fails_every_command() {
        let column = SimColumn::new("column", Vec3::ZERO, 1.0);
        let mut driver = column.clone();
        column.inject_fault(Some("estop".to_string()));
        assert!(driver.drive(AxisCommand::ZERO).is_err());
        assert!(driver.go_to(Vec3::ZERO).is_err());
        column.inject_fault(None);
        assert!(driver.drive(AxisCommand::ZERO).is_ok());
    }

    #[test]
    fn straight_line_planner_returns_two_corners() {
        let plan = StraightLinePlanner.compute_path(Vec3::ZERO, Vec3::new(3.0, 1.0, 4.0));
        assert_eq!(plan.corners.len(), 2);
        assert!((plan.remaining_distance - 5.0).abs() < 1e-5);
    }

    #[test]
    fn exclusion_zone_adds_detour_when_crossing() {
        let mut planner = ExclusionZonePlanner::new(Vec3::new(0.0, 0.0, 2.0), 1.0, 0.5);
        let plan = planner.compute_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0));
        assert_eq!(plan.corners.len(), 3);
        let detour = plan.corners[1];
        assert!((detour.planar_distance(Vec3::new(0.0, 0.0, 2.0)) - 1.5).abs() < 1e-5);
        assert!((plan.remaining_distance - plan.length()).abs() < 1e-5);
        assert!(plan.remaining_distance > 4.0);
    }

    #[test]
    fn exclusion_zone_keeps_straight_line_when_clear() {
        let mut planner = ExclusionZonePlanner::new(Vec3::new(5.0, 0.0, 5.0), 1.0, 0.5);
        let plan = planner.compute_path(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0));
        assert_eq!(plan.corners.len(), 2);
    }

    #[test]
    fn tracker_reports_only_set_bodies() {
        let tracker = SimTracker::new();
        let handle = tracker.clone();
        assert!(tracker.sample(TrackedBody::Viewer).is_none());

        handle.set(TrackedBody::Prop(VoiCategory::TypeA), Pose::at(Vec3::UP));
        assert_eq!(
            tracker.sample(TrackedBody::Prop(VoiCategory::TypeA)),
            Some(Pose::at(Vec3::UP))
        );
        assert!(tracker.sample(TrackedBody::Hand(Hand::Left)).is_none());

        handle.clear(TrackedBody::Prop(VoiCategory::TypeA));
        assert!(tracker.sample(TrackedBody::Prop(VoiCategory::TypeA)).is_none());
    }
}

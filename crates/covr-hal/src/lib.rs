//! `covr-hal` – Hardware Abstraction Layer for the CoVR column rig.
//!
//! The interaction core only ever talks to the traits defined here, so the
//! physical column, the path planner and the tracking system can be swapped
//! for the in-process [`sim`] drivers without touching weighting, arbitration
//! or navigation logic.
//!
//! # Modules
//!
//! - [`actuator`] – [`ColumnActuator`][actuator::ColumnActuator]: the motion
//!   platform carrying the column.
//! - [`path`] – [`PathService`][path::PathService] and [`PathPlan`][path::PathPlan].
//! - [`tracking`] – [`TrackingSource`][tracking::TrackingSource] for the viewer,
//!   hands and props.
//! - [`sim`] – simulated drivers for headless tests and the CLI.

pub mod actuator;
pub mod path;
pub mod sim;
pub mod tracking;

pub use actuator::ColumnActuator;
pub use path::{PathPlan, PathService};
pub use tracking::{TrackedBody, TrackingSource};

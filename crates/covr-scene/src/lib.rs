//! `covr-scene` – the objects of the mixed-reality scene and the policy that
//! picks which one the column should serve.
//!
//! # Modules
//!
//! - [`voi`] – [`Voi`][voi::Voi]: a virtual object of interest with its
//!   weights, docking flag, highlight and optional link to a prop.
//! - [`prop`] – [`Prop`][prop::Prop]: a tracked physical prop with its
//!   settled resting pose and grab state.
//! - [`registry`] – [`SceneRegistry`][registry::SceneRegistry]: owns every
//!   VOI and PROP, grouped by category, and answers the scene queries.
//! - [`arbitration`] – [`Arbitrator`][arbitration::Arbitrator]: turns the
//!   weighted candidates (or an explicit selection) into a single navigation
//!   target.

pub mod arbitration;
pub mod prop;
pub mod registry;
pub mod voi;

pub use arbitration::{ArbitrationConfig, Arbitrator, Target, TargetSource};
pub use prop::{GrabState, Prop, PropSpec};
pub use registry::{SceneBody, SceneRegistry, SceneRegistryBuilder};
pub use voi::{Highlight, Link, Voi, VoiSpec};

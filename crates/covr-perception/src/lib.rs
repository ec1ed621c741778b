//! `covr-perception` – what the viewer can see and how much it matters.
//!
//! # Modules
//!
//! - [`raycast`] – [`ColliderSet`][raycast::ColliderSet]: a flat set of
//!   axis-aligned colliders answering nearest-hit ray queries through the
//!   [`PhysicsWorld`][raycast::PhysicsWorld] trait.
//! - [`weighting`] – [`WeightingEngine`][weighting::WeightingEngine]: scores
//!   every object of interest from the viewer's position and gaze using a
//!   horizontal ray fan.

pub mod raycast;
pub mod weighting;

pub use raycast::{Collider, ColliderSet, PhysicsWorld, RayHit};
pub use weighting::{VoiWeights, WeightingConfig, WeightingEngine};

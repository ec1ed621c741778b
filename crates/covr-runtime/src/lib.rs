//! `covr-runtime` – the per-tick interaction engine.
//!
//! One [`InteractionLoop`][interaction::InteractionLoop] owns the scene and
//! every controller, and advances them in a strict order each tick:
//! weighting, arbitration, navigation, then linkage.
//!
//! # Modules
//!
//! - [`interaction`] – [`InteractionLoop`][interaction::InteractionLoop]:
//!   the orchestrator and its builder.
//! - [`navigation`] – [`NavigationController`][navigation::NavigationController]:
//!   drives the column along the path service's corners, switches between
//!   direct and velocity actuation and detects arrival.
//! - [`linkage`] – [`PropLinkage`][linkage::PropLinkage]: debounced
//!   grab/release of a physical prop and the VOI it stands in for.
//! - [`signal`] – [`Signal`][signal::Signal]: synchronous zero-argument
//!   notifications fired from inside a tick.
//! - [`config`] – [`InteractionConfig`][config::InteractionConfig]: every
//!   tunable of the engine, with serde defaults and validation.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod config;
pub mod interaction;
pub mod linkage;
pub mod navigation;
pub mod signal;
pub mod telemetry;

pub use config::{DockingZoneConfig, InteractionConfig, LinkageConfig};
pub use interaction::{InteractionLoop, InteractionLoopBuilder, TickReport, WeightEntry};
pub use linkage::{GrabPhase, LinkageInputs, PropLinkage, ReleasePolicy};
pub use navigation::{NavState, NavigationConfig, NavigationController, NavigationStatus};
pub use signal::{ListenerId, Signal};
pub use telemetry::{TracerProviderGuard, init_tracing};

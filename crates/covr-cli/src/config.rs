//! Session file – reads/writes the `covr.toml` describing one simulated run.

use std::fs;
use std::path::Path;

use covr_runtime::InteractionConfig;
use covr_scene::{PropSpec, VoiSpec};
use covr_types::{Vec3, VoiCategory};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Scene
// ─────────────────────────────────────────────────────────────────────────────

/// Static box that occludes gaze rays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpec {
    pub center: Vec3,
    pub half_extents: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSpec {
    #[serde(default)]
    pub position: Vec3,
    /// Gaze direction, degrees about +Y from +Z.
    #[serde(default)]
    pub yaw_degrees: f32,
}

impl Default for ViewerSpec {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw_degrees: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub viewer: ViewerSpec,
    #[serde(default)]
    pub vois: Vec<VoiSpec>,
    #[serde(default)]
    pub props: Vec<PropSpec>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleSpec>,
}

impl Default for SceneConfig {
    /// Two cups and a bowl in front of the viewer, a table to the right, a
    /// crate partly hiding the bowl, and one prop for the cups.
    fn default() -> Self {
        Self {
            viewer: ViewerSpec::default(),
            vois: vec![
                VoiSpec::new("cup_left", VoiCategory::TypeA, Vec3::new(-0.6, 1.0, 2.5)),
                VoiSpec::new("cup_right", VoiCategory::TypeA, Vec3::new(0.6, 1.0, 2.5)),
                VoiSpec::new("bowl", VoiCategory::TypeB, Vec3::new(0.0, 1.0, 4.5)),
                VoiSpec::new("table", VoiCategory::Surface, Vec3::new(2.5, 0.8, 1.0))
                    .with_half_extents(Vec3::new(0.6, 0.05, 0.4)),
            ],
            props: vec![PropSpec::new("cup_proxy", VoiCategory::TypeA)],
            obstacles: vec![ObstacleSpec {
                center: Vec3::new(0.0, 1.0, 3.6),
                half_extents: Vec3::new(0.2, 0.2, 0.2),
            }],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulation
// ─────────────────────────────────────────────────────────────────────────────

/// Operator hint issued before the first tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hint {
    /// Send the column to the VOI with this name.
    Voi { name: String },
    /// Send the column to a random VOI of the category.
    Random { category: VoiCategory },
    /// Send the column to the n-th surface.
    Surface { index: usize },
}

fn default_ticks() -> u64 {
    3000
}
fn default_dt() -> f32 {
    0.02
}
fn default_column_start() -> Vec3 {
    Vec3::new(1.5, 0.0, 0.5)
}
fn default_column_speed() -> f32 {
    0.8
}
fn default_exclusion_radius() -> f32 {
    0.6
}
fn default_prop_height() -> f32 {
    1.0
}
fn default_lift_height() -> f32 {
    0.3
}
fn default_lift_secs() -> f32 {
    1.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Upper bound on the number of ticks.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Seconds per tick.
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default = "default_column_start")]
    pub column_start: Vec3,
    /// Column top speed in metres per second.
    #[serde(default = "default_column_speed")]
    pub column_speed: f32,
    /// Keep-out radius around the viewer; `0` plans straight lines.
    #[serde(default = "default_exclusion_radius")]
    pub exclusion_radius: f32,
    /// Height of the props resting on the column.
    #[serde(default = "default_prop_height")]
    pub prop_height: f32,
    /// How far the simulated user lifts the prop.
    #[serde(default = "default_lift_height")]
    pub lift_height: f32,
    /// How long the prop is held up before it is put back.
    #[serde(default = "default_lift_secs")]
    pub lift_secs: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<Hint>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            dt: default_dt(),
            column_start: default_column_start(),
            column_speed: default_column_speed(),
            exclusion_radius: default_exclusion_radius(),
            prop_height: default_prop_height(),
            lift_height: default_lift_height(),
            lift_secs: default_lift_secs(),
            hint: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session file
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub scene: SceneConfig,
}

impl CliConfig {
    /// The default scene with a hint that sends the column to the left cup,
    /// so the scripted lift has something to grab.
    pub fn demo() -> Self {
        let mut cfg = Self::default();
        cfg.sim.hint = Some(Hint::Voi {
            name: "cup_left".to_string(),
        });
        cfg
    }

    /// Reject settings the interaction loop or the simulation cannot run
    /// with.
    pub fn validate(&self) -> Result<(), String> {
        self.interaction.validate().map_err(|e| e.to_string())?;
        for prop in &self.scene.props {
            prop.validate().map_err(|e| e.to_string())?;
        }
        if !(self.sim.dt > 0.0) {
            return Err("sim.dt must be positive".to_string());
        }
        if !(self.sim.column_speed > 0.0) {
            return Err("sim.column_speed must be positive".to_string());
        }
        Ok(())
    }
}

/// Load the session from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<CliConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: CliConfig =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `COVR_*` environment variable overrides to `cfg`.
///
/// Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `COVR_TICKS` | `sim.ticks` |
/// | `COVR_DT` | `sim.dt` |
/// | `COVR_SNAP_DISTANCE` | `interaction.arbitration.snap_distance` |
/// | `COVR_SYSTEMIC` | `interaction.systemic` |
pub fn apply_env_overrides(cfg: &mut CliConfig) {
    if let Some(v) = env_parse::<u64>("COVR_TICKS") {
        cfg.sim.ticks = v;
    }
    if let Some(v) = env_parse::<f32>("COVR_DT") {
        cfg.sim.dt = v;
    }
    if let Some(v) = env_parse::<f32>("COVR_SNAP_DISTANCE") {
        cfg.interaction.arbitration.snap_distance = v;
    }
    if let Some(v) = env_parse::<bool>("COVR_SYSTEMIC") {
        cfg.interaction.systemic = v;
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Write `cfg` to `path`, creating parent directories as needed.
pub fn save_to(cfg: &CliConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use covr_runtime::ReleasePolicy;

    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("covr.toml");

        let cfg = CliConfig::demo();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.sim.hint, cfg.sim.hint);
        assert_eq!(loaded.scene, cfg.scene);
        assert_eq!(loaded.scene.vois.len(), 4);
        assert_eq!(loaded.scene.props[0].category, VoiCategory::TypeA);
        assert_eq!(loaded.scene.obstacles.len(), 1);
        assert_eq!(loaded.sim.column_start, default_column_start());
        assert_eq!(loaded.interaction.weighting.ray_count, 10);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("absent.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("covr.toml");
        fs::write(
            &path,
            r#"
[sim]
column_speed = 2.0
hint = { kind = "surface", index = 0 }

[interaction.linkage]
release_policy = "recenter_group"

[[scene.vois]]
name = "cup"
category = "type_a"
position = [0.0, 1.0, 2.0]
"#,
        )
        .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.sim.column_speed, 2.0);
        assert_eq!(cfg.sim.dt, default_dt());
        assert_eq!(cfg.sim.hint, Some(Hint::Surface { index: 0 }));
        assert_eq!(
            cfg.interaction.linkage.release_policy,
            ReleasePolicy::RecenterGroup
        );
        assert_eq!(cfg.scene.vois.len(), 1);
        assert!(cfg.scene.vois[0].active);
        assert!(cfg.scene.props.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("covr.toml");
        fs::write(&path, "[sim\nticks = ").expect("write");
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn validate_rejects_zero_dt() {
        let mut cfg = CliConfig::default();
        cfg.sim.dt = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_prop_range() {
        let mut cfg = CliConfig::demo();
        cfg.scene.props[0].height_error_range = -0.1;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("height_error_range"));
    }

    #[test]
    fn apply_env_overrides_changes_sim_and_interaction() {
        // SAFETY: no other test reads these variables.
        unsafe {
            std::env::set_var("COVR_TICKS", "42");
            std::env::set_var("COVR_SNAP_DISTANCE", "0.25");
            std::env::set_var("COVR_SYSTEMIC", "true");
        }
        let mut cfg = CliConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.sim.ticks, 42);
        assert_eq!(cfg.interaction.arbitration.snap_distance, 0.25);
        assert!(cfg.interaction.systemic);
        unsafe {
            std::env::remove_var("COVR_TICKS");
            std::env::remove_var("COVR_SNAP_DISTANCE");
            std::env::remove_var("COVR_SYSTEMIC");
        }
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_dt() {
        // SAFETY: no other test reads this variable.
        unsafe { std::env::set_var("COVR_DT", "fast") };
        let mut cfg = CliConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.sim.dt, default_dt());
        unsafe { std::env::remove_var("COVR_DT") };
    }
}

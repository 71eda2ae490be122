//! Radar settings - config-driven layout, camera, motion and packet constants
//!
//! Defaults ship in `config/radar_settings.yaml` (embedded at compile time) and are
//! exposed through [`global_settings()`]. Hosts that want overrides parse their own
//! YAML with [`RadarSettings::from_yaml`]; any field left out falls back to its default.

use super::error::ConfigError;
use super::quality::{QualityProfile, QualityTier};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const EMBEDDED_SETTINGS: &str = include_str!("../../config/radar_settings.yaml");

static SETTINGS: OnceLock<RadarSettings> = OnceLock::new();

/// Process-wide settings loaded from the embedded YAML.
///
/// Falls back to compiled defaults (with a warning) if the embedded document does
/// not parse.
pub fn global_settings() -> &'static RadarSettings {
    SETTINGS.get_or_init(|| match RadarSettings::from_yaml(EMBEDDED_SETTINGS) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!("radar_settings.yaml rejected, using defaults: {}", err);
            RadarSettings::default()
        }
    })
}

// =============================================================================
// ROOT
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarSettings {
    pub layout: LayoutSettings,
    pub camera: CameraSettings,
    pub motion: MotionSettings,
    pub particles: ParticleSettings,
    pub hit_test: HitTestSettings,
    pub flash: FlashSettings,
    pub reconnect: ReconnectSettings,
    pub quality: QualitySettings,
}

impl RadarSettings {
    /// Parse settings from YAML and validate ranges
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings: RadarSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.layout;
        if !(l.module_min_radius > 0.0 && l.module_min_radius <= l.module_max_radius) {
            return Err(ConfigError::Invalid {
                field: "layout.module_min_radius",
                reason: format!(
                    "need 0 < min ({}) <= max ({})",
                    l.module_min_radius, l.module_max_radius
                ),
            });
        }
        if !(0.0..=1.0).contains(&l.fractal_blend) {
            return Err(ConfigError::Invalid {
                field: "layout.fractal_blend",
                reason: format!("{} outside [0, 1]", l.fractal_blend),
            });
        }
        let c = &self.camera;
        if !(c.min_zoom > 0.0 && c.min_zoom < c.max_zoom) {
            return Err(ConfigError::Invalid {
                field: "camera.min_zoom",
                reason: format!("need 0 < min ({}) < max ({})", c.min_zoom, c.max_zoom),
            });
        }
        if !(0.0..=0.5).contains(&c.pan_keep_visible_fraction) {
            return Err(ConfigError::Invalid {
                field: "camera.pan_keep_visible_fraction",
                reason: format!("{} outside [0, 0.5]", c.pan_keep_visible_fraction),
            });
        }
        Ok(())
    }

    /// Quality profile for a tier
    pub fn profile(&self, tier: QualityTier) -> &QualityProfile {
        match tier {
            QualityTier::Low => &self.quality.low,
            QualityTier::Medium => &self.quality.medium,
            QualityTier::High => &self.quality.high,
            QualityTier::Ultra => &self.quality.ultra,
        }
    }
}

// =============================================================================
// LAYOUT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Central hub radius
    pub hub_radius: f32,
    /// Minimum ring radius step per layer index
    pub ring_base_spacing: f32,
    /// Gap kept between adjacent shells
    pub ring_margin: f32,
    /// Ring band stroke width
    pub ring_stroke: f32,
    pub module_min_radius: f32,
    pub module_max_radius: f32,
    /// Weight of the fractal-density radius vs the codebase-size radius
    pub fractal_blend: f32,
    pub fractal_base_radius: f32,
    pub fractal_growth: f32,
    /// Gap between a module disc and its submodule shell
    pub shell_gap: f32,
    pub shell_thickness_ratio: f32,
    pub shell_min_thickness: f32,
    /// Local arc span shared by a module's submodules (radians)
    pub submodule_arc_span: f32,
    /// Padding inside each submodule slice, as a fraction of the slice
    pub submodule_slice_pad: f32,
    /// Empty border kept between the outermost shell and the viewport edge
    pub viewport_margin: f32,
    /// Extra room reserved outside the shells for I/O nodes
    pub io_ring_margin: f32,
    pub io_node_radius: f32,
    /// Outer shell-fill margin beyond the outermost ring
    pub outer_fill_margin: f32,
    /// Fraction of spare radius handed out to the rings when the scene under-fills
    pub slack_fill: f32,
    /// Weight of submodules in the layer content score
    pub submodule_score_weight: f32,
    /// Minimum time between accepted layer reorders
    pub order_lock_cooldown_ms: f64,
    /// Name fragments in priority order (earlier = more central on ties)
    pub layer_priority: Vec<String>,
    /// Orbit angular speed range (rad/s)
    pub orbit_speed_min: f32,
    pub orbit_speed_max: f32,
    /// Module spin speed range (rad/s)
    pub spin_speed_min: f32,
    pub spin_speed_max: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            hub_radius: 42.0,
            ring_base_spacing: 64.0,
            ring_margin: 14.0,
            ring_stroke: 6.0,
            module_min_radius: 9.0,
            module_max_radius: 30.0,
            fractal_blend: 0.58,
            fractal_base_radius: 11.0,
            fractal_growth: 2.4,
            shell_gap: 3.0,
            shell_thickness_ratio: 0.42,
            shell_min_thickness: 4.0,
            submodule_arc_span: 288f32.to_radians(),
            submodule_slice_pad: 0.04,
            viewport_margin: 28.0,
            io_ring_margin: 36.0,
            io_node_radius: 8.0,
            outer_fill_margin: 48.0,
            slack_fill: 0.9,
            submodule_score_weight: 0.55,
            order_lock_cooldown_ms: 10.0 * 60.0 * 1000.0,
            layer_priority: [
                "core", "kernel", "runtime", "engine", "services", "api", "interface", "ui",
                "tools", "tests",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            orbit_speed_min: 0.01,
            orbit_speed_max: 0.035,
            spin_speed_min: 0.04,
            spin_speed_max: 0.12,
        }
    }
}

// =============================================================================
// CAMERA
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Scene bounding box must stay at least this fraction of viewport height
    pub min_scene_height_fraction: f32,
    /// Fraction of the scene box (or viewport) that must stay on screen when panning
    pub pan_keep_visible_fraction: f32,
    pub transition_ms: f64,
    pub focus_transition_ms: f64,
    /// Fraction of the short viewport side a framed layer occupies
    pub layer_fill: f32,
    /// Fraction of the short viewport side a framed module footprint occupies
    pub module_fill: f32,
    pub submodule_fill: f32,
    /// Extra zoom applied on top of the submodule framing for a leaf target
    pub subfractal_zoom_boost: f32,
    /// Fraction of the short viewport side a map-mode bounding box occupies
    pub map_fill: f32,
    pub system_root_fill: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            min_zoom: 0.35,
            max_zoom: 9.0,
            min_scene_height_fraction: 0.7,
            pan_keep_visible_fraction: 0.25,
            transition_ms: 520.0,
            focus_transition_ms: 640.0,
            layer_fill: 0.92,
            module_fill: 0.55,
            submodule_fill: 0.42,
            subfractal_zoom_boost: 1.6,
            map_fill: 0.82,
            system_root_fill: 0.94,
        }
    }
}

// =============================================================================
// MOTION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Delay between consecutive layers' intro ramps
    pub intro_stagger_ms: f64,
    pub intro_duration_ms: f64,
    /// Nodes below this intro scale are not rendered or hit
    pub render_threshold: f32,
    /// Largest frame delta fed to the integrators (seconds)
    pub max_dt: f32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            intro_stagger_ms: 110.0,
            intro_duration_ms: 620.0,
            render_threshold: 0.02,
            max_dt: 0.1,
        }
    }
}

// =============================================================================
// PARTICLES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    /// Pool never shrinks below this (when links exist)
    pub pool_floor: usize,
    /// Multiplier on `links * particles_per_link`
    pub pool_link_factor: usize,
    /// Packet speed range in loops per second
    pub min_speed: f32,
    pub max_speed: f32,
    pub global_speed_scale: f32,
    /// Packet radius range mapped from the normalized packet-size metric
    pub min_radius: f32,
    pub max_radius: f32,
    /// Radius used at module/submodule depth
    pub radius_floor: f32,
    /// Blocked ratio above which a link counts as degraded
    pub blocked_threshold: f32,
    /// Fail window = base + growth * blocked_ratio (fraction of the path)
    pub fail_window_base: f32,
    pub fail_window_growth: f32,
    /// Move gain = max(floor, 1 - slope * blocked_ratio)
    pub blocked_gain_slope: f32,
    pub blocked_gain_floor: f32,
    /// Failed packets restart within `[0, restart_span)` of the link start
    pub restart_span: f32,
    /// Speed multiplier for links flagged as changed
    pub burst_boost: f32,
    pub stale_speed_scale: f32,
    pub stale_opacity: f32,
    /// Shrink applied at full fail progress
    pub fail_shrink: f32,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            pool_floor: 60,
            pool_link_factor: 6,
            min_speed: 0.08,
            max_speed: 0.22,
            global_speed_scale: 1.0,
            min_radius: 1.4,
            max_radius: 4.2,
            radius_floor: 1.2,
            blocked_threshold: 0.02,
            fail_window_base: 0.14,
            fail_window_growth: 0.24,
            blocked_gain_slope: 0.55,
            blocked_gain_floor: 0.3,
            restart_span: 0.06,
            burst_boost: 1.35,
            stale_speed_scale: 0.35,
            stale_opacity: 0.5,
            fail_shrink: 0.35,
        }
    }
}

// =============================================================================
// HIT TEST
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitTestSettings {
    /// Radial slack around submodule shells, in screen pixels
    pub radial_tolerance_px: f32,
    /// Angular slack around submodule arcs, in screen pixels along the arc
    pub angular_tolerance_px: f32,
    /// Bezier samples per link
    pub link_samples: usize,
    pub link_threshold_px: f32,
}

impl Default for HitTestSettings {
    fn default() -> Self {
        Self {
            radial_tolerance_px: 6.0,
            angular_tolerance_px: 8.0,
            link_samples: 20,
            link_threshold_px: 7.0,
        }
    }
}

// =============================================================================
// FLASH / RECONNECT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashSettings {
    /// How long a "resolved" flash stays visible
    pub window_ms: f64,
}

impl Default for FlashSettings {
    fn default() -> Self {
        Self { window_ms: 2400.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub base_ms: u64,
    pub factor: f64,
    pub cap_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_ms: 500,
            factor: 2.0,
            cap_ms: 30_000,
        }
    }
}

// =============================================================================
// QUALITY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub low: QualityProfile,
    pub medium: QualityProfile,
    pub high: QualityProfile,
    pub ultra: QualityProfile,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            low: QualityProfile::for_tier(QualityTier::Low),
            medium: QualityProfile::for_tier(QualityTier::Medium),
            high: QualityProfile::for_tier(QualityTier::High),
            ultra: QualityProfile::for_tier(QualityTier::Ultra),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_settings_parse() {
        let settings = RadarSettings::from_yaml(EMBEDDED_SETTINGS).expect("embedded yaml");
        assert_eq!(settings.camera.min_scene_height_fraction, 0.7);
        assert_eq!(settings.layout.order_lock_cooldown_ms, 600_000.0);
        assert_eq!(settings.hit_test.link_samples, 20);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let settings = RadarSettings::from_yaml("camera:\n  max_zoom: 4.0\n").unwrap();
        assert_eq!(settings.camera.max_zoom, 4.0);
        assert_eq!(settings.camera.min_zoom, CameraSettings::default().min_zoom);
        assert_eq!(settings.layout, LayoutSettings::default());
    }

    #[test]
    fn test_invalid_zoom_range_rejected() {
        let err = RadarSettings::from_yaml("camera:\n  min_zoom: 5.0\n  max_zoom: 2.0\n");
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = RadarSettings::from_yaml("camera: [unclosed");
        assert!(matches!(err, Err(ConfigError::Decode(_))));
    }

    #[test]
    fn test_profile_lookup() {
        let settings = global_settings();
        assert_eq!(
            settings.profile(QualityTier::Low).max_layers,
            settings.quality.low.max_layers
        );
    }
}

//! Quality tiers and their per-tier ceilings
//!
//! Tier detection (GPU heuristics, device class) is done by the host; this crate only
//! consumes the resulting profile.

use serde::{Deserialize, Serialize};

/// Rendering quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
        }
    }

    pub fn all() -> &'static [QualityTier] {
        &[
            QualityTier::Low,
            QualityTier::Medium,
            QualityTier::High,
            QualityTier::Ultra,
        ]
    }
}

impl std::str::FromStr for QualityTier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "low" | "lite" => Self::Low,
            "high" => Self::High,
            "ultra" | "max" => Self::Ultra,
            _ => Self::Medium,
        })
    }
}

/// Per-tier ceilings and effect knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityProfile {
    /// Layers (shells) rendered at most
    pub max_layers: usize,
    pub max_modules_per_layer: usize,
    pub max_submodules_per_module: usize,
    /// Packets seeded per visible link
    pub particles_per_link: usize,
    /// Hard ceiling on the packet pool
    pub max_particles: usize,
    /// Trail points kept per packet
    pub trail_length: usize,
    /// Device pixel ratio ceiling used for stroke scaling
    pub dpr_cap: f32,
    /// Blend factor for frame dt smoothing (1.0 = raw dt)
    pub motion_dt_blend: f32,
    /// Integration substeps for module spin
    pub spin_substeps: u32,
    /// Link stroke alpha
    pub tube_alpha: f32,
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::for_tier(QualityTier::Medium)
    }
}

impl QualityProfile {
    /// Built-in profile for a tier (used when settings omit it)
    pub fn for_tier(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Low => Self {
                max_layers: 4,
                max_modules_per_layer: 10,
                max_submodules_per_module: 6,
                particles_per_link: 1,
                max_particles: 160,
                trail_length: 0,
                dpr_cap: 1.0,
                motion_dt_blend: 1.0,
                spin_substeps: 1,
                tube_alpha: 0.22,
            },
            QualityTier::Medium => Self {
                max_layers: 6,
                max_modules_per_layer: 16,
                max_submodules_per_module: 10,
                particles_per_link: 2,
                max_particles: 480,
                trail_length: 4,
                dpr_cap: 1.5,
                motion_dt_blend: 0.6,
                spin_substeps: 1,
                tube_alpha: 0.3,
            },
            QualityTier::High => Self {
                max_layers: 8,
                max_modules_per_layer: 24,
                max_submodules_per_module: 14,
                particles_per_link: 3,
                max_particles: 1200,
                trail_length: 7,
                dpr_cap: 2.0,
                motion_dt_blend: 0.45,
                spin_substeps: 2,
                tube_alpha: 0.36,
            },
            QualityTier::Ultra => Self {
                max_layers: 10,
                max_modules_per_layer: 32,
                max_submodules_per_module: 20,
                particles_per_link: 4,
                max_particles: 2400,
                trail_length: 10,
                dpr_cap: 2.5,
                motion_dt_blend: 0.35,
                spin_substeps: 3,
                tube_alpha: 0.42,
            },
        }
    }
}

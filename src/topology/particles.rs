//! Packet simulator - flow markers travelling along links
//!
//! Packets are pooled per scene and seeded from a stable hash of `link_id#index`, so
//! rebuilding with the same link set produces the same starting state.
//!
//! Degraded links (`flow_blocked`, or `blocked_ratio` above the threshold) slow their
//! packets and, in the tail of the path, ramp a fail effect before resetting the packet
//! near the link start instead of completing the loop.

use super::config::ParticleSettings;
use super::geometry::{clamp01, hash_unit, lerp};
use super::quality::QualityProfile;
use super::scene::{Link, Scene};
use super::selection::InteractionLevel;
use super::snapshot::{RuntimeSnapshot, RuntimeState};
use egui::{Color32, Pos2};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub link_id: String,
    /// Index of this packet among those on its link
    pub slot: usize,
    /// Progress along the link, `[0, 1)`
    pub t: f32,
    /// Loops per second before scaling
    pub speed: f32,
    /// Recent world positions, newest last
    pub trail: VecDeque<Pos2>,
    pub fail_progress: f32,
    pub fail_active: bool,
    pub fail_ratio: f32,
    /// Number of resets; feeds the restart offset hash
    pub cycle: u32,
}

impl Packet {
    fn seed_key(&self) -> String {
        format!("{}#{}", self.link_id, self.slot)
    }

    fn clear_fail(&mut self) {
        self.fail_active = false;
        self.fail_progress = 0.0;
    }
}

/// A packet ready to draw
#[derive(Debug, Clone, PartialEq)]
pub struct PacketSprite {
    pub pos: Pos2,
    pub radius: f32,
    pub color: Color32,
    pub opacity: f32,
    pub trail: Vec<Pos2>,
}

/// Effective blocked ratio of a degraded link, `None` when flow is clean
pub fn degraded_ratio(link: &Link, settings: &ParticleSettings) -> Option<f32> {
    if link.flow_blocked {
        Some(1.0f32.max(link.blocked_ratio))
    } else if link.blocked_ratio > settings.blocked_threshold {
        Some(link.blocked_ratio)
    } else {
        None
    }
}

/// Tail fraction of the path in which a packet on a degraded link fails
pub fn fail_window(ratio: f32, settings: &ParticleSettings) -> f32 {
    (settings.fail_window_base + settings.fail_window_growth * clamp01(ratio)).clamp(0.0, 0.95)
}

/// Packet radius for a link's normalized packet-size metric, before fail shrink
pub fn base_radius(link: &Link, level: InteractionLevel, settings: &ParticleSettings) -> f32 {
    if level >= InteractionLevel::Module {
        settings.radius_floor
    } else {
        lerp(settings.min_radius, settings.max_radius, clamp01(link.packet_size))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParticleSystem {
    packets: Vec<Packet>,
    link_ids: Vec<String>,
    trail_length: usize,
    settings: ParticleSettings,
}

impl ParticleSystem {
    pub fn new(settings: ParticleSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Link ids the pool was last built for
    pub fn link_ids(&self) -> &[String] {
        &self.link_ids
    }

    /// Pool size for a link count
    pub fn pool_size(&self, links: usize, profile: &QualityProfile) -> usize {
        if links == 0 {
            return 0;
        }
        let wanted = links * profile.particles_per_link * self.settings.pool_link_factor;
        wanted.max(self.settings.pool_floor).min(profile.max_particles)
    }

    /// Reassign the pool to the scene's links
    pub fn rebuild(&mut self, scene: &Scene, profile: &QualityProfile) {
        let link_ids: Vec<String> = scene.links.iter().map(|l| l.id.clone()).collect();
        let size = self.pool_size(link_ids.len(), profile);
        self.trail_length = profile.trail_length;

        self.packets = (0..size)
            .map(|k| {
                let link_id = link_ids[k % link_ids.len()].clone();
                let slot = k / link_ids.len();
                let key = format!("{link_id}#{slot}");
                Packet {
                    t: hash_unit(&key),
                    speed: lerp(
                        self.settings.min_speed,
                        self.settings.max_speed,
                        hash_unit(&format!("{key}#speed")),
                    ),
                    link_id,
                    slot,
                    trail: VecDeque::new(),
                    fail_progress: 0.0,
                    fail_active: false,
                    fail_ratio: 0.0,
                    cycle: 0,
                }
            })
            .collect();
        tracing::debug!(packets = self.packets.len(), links = link_ids.len(), "packet pool rebuilt");
        self.link_ids = link_ids;
    }

    /// Advance every packet by `dt` seconds
    pub fn advance(&mut self, scene: &Scene, dt: f32, runtime: &RuntimeSnapshot) {
        if runtime.status == RuntimeState::Offline {
            for p in self.packets.iter_mut() {
                p.trail.clear();
            }
            return;
        }
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        let s = &self.settings;
        let runtime_scale = runtime.activity_scale.max(0.0)
            * if runtime.status == RuntimeState::Stale {
                s.stale_speed_scale
            } else {
                1.0
            };

        for p in self.packets.iter_mut() {
            let Some(link) = scene.link(&p.link_id) else {
                continue;
            };
            let degraded = degraded_ratio(link, s);
            let gain = degraded
                .map(|r| (1.0 - s.blocked_gain_slope * r).max(s.blocked_gain_floor))
                .unwrap_or(1.0);
            let burst = if link.changed { s.burst_boost } else { 1.0 };
            p.t += p.speed
                * s.global_speed_scale
                * dt
                * (0.5 + link.activity)
                * burst
                * gain
                * runtime_scale;

            let mut reset = false;
            match degraded {
                Some(ratio) => {
                    let window = fail_window(ratio, s);
                    let start = 1.0 - window;
                    p.fail_ratio = ratio;
                    if p.t >= 1.0 {
                        // Dropped: restart near the link start
                        p.cycle = p.cycle.wrapping_add(1);
                        p.t = s.restart_span * hash_unit(&format!("{}#{}", p.seed_key(), p.cycle));
                        p.clear_fail();
                        reset = true;
                    } else if p.t >= start {
                        p.fail_active = true;
                        p.fail_progress = clamp01((p.t - start) / window);
                    } else {
                        p.clear_fail();
                    }
                }
                None => {
                    p.fail_ratio = 0.0;
                    p.clear_fail();
                    if p.t >= 1.0 {
                        p.t = p.t.fract();
                        reset = true;
                    }
                }
            }

            if reset {
                p.trail.clear();
            }
            if self.trail_length > 0 {
                p.trail.push_back(link.point_at(p.t));
                while p.trail.len() > self.trail_length {
                    p.trail.pop_front();
                }
            }
        }
    }

    /// Draw list for the current frame
    pub fn render(
        &self,
        scene: &Scene,
        level: InteractionLevel,
        runtime: &RuntimeSnapshot,
        render_threshold: f32,
    ) -> Vec<PacketSprite> {
        let s = &self.settings;
        let base_opacity = match runtime.status {
            RuntimeState::Stale => s.stale_opacity,
            _ => 1.0,
        };

        self.packets
            .iter()
            .filter_map(|p| {
                let link = scene.link(&p.link_id)?;
                let visible = [&link.from_id, &link.to_id]
                    .iter()
                    .all(|id| scene.node(id).is_some_and(|n| n.is_renderable(render_threshold)));
                if !visible {
                    return None;
                }
                let radius = base_radius(link, level, s) * (1.0 - s.fail_shrink * p.fail_progress);
                let mut opacity = base_opacity;
                let mut color = packet_color(link);
                if p.fail_active {
                    // Flicker and fade while the packet is being dropped
                    let flicker = 0.5 + 0.5 * (p.fail_progress * std::f32::consts::TAU * 3.0).cos();
                    opacity *= (1.0 - p.fail_progress) * (0.55 + 0.45 * flicker);
                    color = lerp_color(color, FAIL_COLOR, p.fail_progress);
                }
                Some(PacketSprite {
                    pos: link.point_at(p.t),
                    radius,
                    color,
                    opacity: clamp01(opacity),
                    trail: p.trail.iter().copied().collect(),
                })
            })
            .collect()
    }
}

const FLOW_COLOR: Color32 = Color32::from_rgb(120, 200, 255);
const HOT_COLOR: Color32 = Color32::from_rgb(255, 170, 60);
const FAIL_COLOR: Color32 = Color32::from_rgb(235, 60, 60);

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let t = clamp01(t);
    let mix = |x: u8, y: u8| lerp(x as f32, y as f32, t).round() as u8;
    Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}

fn packet_color(link: &Link) -> Color32 {
    lerp_color(FLOW_COLOR, HOT_COLOR, link.error_weight)
}

// =============================================================================
// TESTS
// =============================================================================

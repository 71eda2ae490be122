//! Per-frame motion pass
//!
//! Advances orbit and spin runtimes, freezes the shell (and spin) of whatever is
//! selected or focused, ramps the intro scale, and recomputes every derived position:
//! module centers, submodule arcs, circle hit targets and link control points.
//!
//! # Runtime tables
//! - `orbit` / `orbit_locks` are keyed by layer id
//! - `spin` / `spin_locks` are keyed by module id
//!
//! They outlive individual scenes so a rebuild does not make modules jump.

use super::camera::Camera;
use super::config::MotionSettings;
use super::geometry::{clamp01, ease_out_cubic, polar};
use super::links::{control_points, LeafAnchor};
use super::quality::QualityProfile;
use super::scene::{HitShape, NodeKind, Scene};
use super::selection::Selection;
use egui::Pos2;
use std::collections::{HashMap, HashSet};

// =============================================================================
// RUNTIME TABLES
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeTables {
    /// Accumulated orbit angle per layer
    pub orbit: HashMap<String, f32>,
    /// Held orbit runtime for frozen layers
    pub orbit_locks: HashMap<String, f32>,
    /// Accumulated spin angle per module
    pub spin: HashMap<String, f32>,
    /// Held spin angle for locked modules
    pub spin_locks: HashMap<String, f32>,
}

impl RuntimeTables {
    pub fn orbit_runtime(&self, layer_id: &str) -> f32 {
        self.orbit.get(layer_id).copied().unwrap_or(0.0)
    }

    pub fn spin_runtime(&self, module_id: &str) -> f32 {
        self.spin.get(module_id).copied().unwrap_or(0.0)
    }

    pub fn is_orbit_locked(&self, layer_id: &str) -> bool {
        self.orbit_locks.contains_key(layer_id)
    }

    pub fn is_spin_locked(&self, module_id: &str) -> bool {
        self.spin_locks.contains_key(module_id)
    }

    /// Drop entries for layers / modules that no longer exist
    pub fn retain(&mut self, layers: &HashSet<&str>, modules: &HashSet<&str>) {
        self.orbit.retain(|k, _| layers.contains(k.as_str()));
        self.orbit_locks.retain(|k, _| layers.contains(k.as_str()));
        self.spin.retain(|k, _| modules.contains(k.as_str()));
        self.spin_locks.retain(|k, _| modules.contains(k.as_str()));
    }

    fn step_orbit(&mut self, layer_id: &str, delta: f32, frozen: bool) {
        let current = self.orbit_runtime(layer_id);
        if frozen {
            let held = *self.orbit_locks.entry(layer_id.to_string()).or_insert(current);
            self.orbit.insert(layer_id.to_string(), held);
        } else {
            self.orbit_locks.remove(layer_id);
            self.orbit.insert(layer_id.to_string(), current + delta);
        }
    }

    fn step_spin(&mut self, module_id: &str, delta: f32, locked: bool) {
        let current = self.spin_runtime(module_id);
        if locked {
            let held = *self.spin_locks.entry(module_id.to_string()).or_insert(current);
            self.spin.insert(module_id.to_string(), held);
        } else {
            self.spin_locks.remove(module_id);
            self.spin.insert(module_id.to_string(), current + delta);
        }
    }
}

// =============================================================================
// POSITIONS
// =============================================================================

/// Recompute every derived position from the runtime tables
///
/// Pure with respect to topology: only positions, angles, circle hit targets and
/// link control points change.
pub fn apply_positions(scene: &mut Scene, tables: &RuntimeTables, leaf: Option<&LeafAnchor>) {
    let center = scene.center;
    let mut module_frames: HashMap<String, (Pos2, f32, f32)> = HashMap::new();

    for node in scene.nodes.iter_mut() {
        if let NodeKind::Module(g) = &mut node.kind {
            g.orbit_angle = g.base_angle + tables.orbit_runtime(&g.layer_id);
            g.spin_angle = tables.spin_runtime(&node.id);
            g.spin_locked = tables.is_spin_locked(&node.id);
            node.pos = polar(center, g.orbit_radius, g.orbit_angle);
            module_frames.insert(node.id.clone(), (node.pos, g.orbit_angle, g.spin_angle));
        }
    }

    for node in scene.nodes.iter_mut() {
        if let NodeKind::Submodule(g) = &mut node.kind {
            let Some(&(anchor, orbit, spin)) = module_frames.get(&g.module_id) else {
                continue;
            };
            g.anchor = anchor;
            g.angle_start = orbit + spin + g.local_start;
            g.angle_end = orbit + spin + g.local_end;
            node.pos = polar(anchor, g.mid_radius(), (g.angle_start + g.angle_end) / 2.0);
        }
    }

    // Circle hit targets follow their node
    for target in scene.hit_targets.iter_mut() {
        if let HitShape::Circle { center, .. } = &mut target.shape {
            if let Some(&i) = scene.node_by_id.get(&target.node_id) {
                *center = scene.nodes[i].pos;
            }
        }
    }

    for link in scene.links.iter_mut() {
        let (Some(&fi), Some(&ti)) = (
            scene.node_by_id.get(&link.from_id),
            scene.node_by_id.get(&link.to_id),
        ) else {
            continue;
        };
        let mut from = scene.nodes[fi].pos;
        let mut to = scene.nodes[ti].pos;
        if let Some(anchor) = leaf {
            anchor.apply(&link.from_id, &link.to_id, &mut from, &mut to);
        }
        link.points = control_points(&link.id, link.kind, from, to, center);
    }
}

// =============================================================================
// MOTION PASS
// =============================================================================

/// Frame-to-frame motion state
#[derive(Debug, Clone, Default)]
pub struct MotionPass {
    intro_started_ms: Option<f64>,
    last_ms: Option<f64>,
    smoothed_dt: f32,
}

/// Ids whose enclosing shell freezes and whose module stops spinning
fn anchor_ids<'a>(camera: &'a Camera, selection: &'a Selection) -> Vec<&'a str> {
    let mut ids: Vec<&str> = Vec::new();
    if let Some(id) = selection.node_id.as_deref() {
        ids.push(id);
    }
    if let Some(sf) = &selection.subfractal {
        ids.push(sf.submodule_id.as_str());
    }
    if let Some(id) = camera.focus_target() {
        ids.push(id);
    }
    ids
}

impl MotionPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay the staggered intro from `now_ms`
    pub fn restart_intro(&mut self, now_ms: f64) {
        self.intro_started_ms = Some(now_ms);
    }

    pub fn smoothed_dt(&self) -> f32 {
        self.smoothed_dt
    }

    /// Relax the smoothed dt toward `raw_dt` in `substeps` steps
    ///
    /// The per-step rate compounds to `blend` over the frame, so the final smoothed dt
    /// does not depend on the substep count. Returns the mean of the intermediate values,
    /// which spin integrates over.
    fn relax_dt(&mut self, raw_dt: f32, blend: f32, substeps: u32) -> f32 {
        let steps = substeps.max(1);
        let rate = 1.0 - (1.0 - blend).powf(1.0 / steps as f32);
        let mut sum = 0.0;
        for _ in 0..steps {
            self.smoothed_dt += (raw_dt - self.smoothed_dt) * rate;
            sum += self.smoothed_dt;
        }
        sum / steps as f32
    }

    /// Layers frozen by the current selection / focus
    pub fn frozen_layers(scene: &Scene, camera: &Camera, selection: &Selection) -> HashSet<String> {
        anchor_ids(camera, selection)
            .into_iter()
            .filter_map(|id| scene.layer_of(id))
            .map(str::to_string)
            .collect()
    }

    /// Modules whose spin is held by the current selection / focus
    pub fn spin_locked_modules(
        scene: &Scene,
        camera: &Camera,
        selection: &Selection,
    ) -> HashSet<String> {
        anchor_ids(camera, selection)
            .into_iter()
            .filter_map(|id| scene.module_of(id))
            .map(str::to_string)
            .collect()
    }

    /// Advance one frame
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        scene: &mut Scene,
        tables: &mut RuntimeTables,
        camera: &Camera,
        selection: &Selection,
        now_ms: f64,
        profile: &QualityProfile,
        settings: &MotionSettings,
    ) {
        let raw_dt = match self.last_ms {
            Some(last) => (((now_ms - last) / 1000.0) as f32).clamp(0.0, settings.max_dt),
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        let blend = profile.motion_dt_blend.clamp(0.0, 1.0);
        let spin_dt = self.relax_dt(raw_dt, blend, profile.spin_substeps);
        let dt = self.smoothed_dt;

        let frozen = Self::frozen_layers(scene, camera, selection);
        let locked = Self::spin_locked_modules(scene, camera, selection);

        for node in &scene.nodes {
            match &node.kind {
                NodeKind::Layer(g) => {
                    tables.step_orbit(&node.id, g.orbit_speed * dt, frozen.contains(&node.id));
                }
                NodeKind::Module(g) => {
                    let delta = g.spin_speed * spin_dt;
                    tables.step_spin(&node.id, delta, locked.contains(&node.id));
                }
                _ => {}
            }
        }

        self.update_intro(scene, now_ms, settings);

        let leaf = selection.subfractal.as_ref().and_then(|sf| {
            let sub = scene.node(&sf.submodule_id)?;
            let g = sub.as_submodule()?;
            Some((sf.submodule_id.clone(), g.module_id.clone()))
        });
        // Leaf position depends on this frame's spin, so place everything first
        apply_positions(scene, tables, None);
        if let (Some((sub_id, module_id)), Some(sf)) = (leaf, selection.subfractal.as_ref()) {
            let position = scene
                .node(&sub_id)
                .and_then(|n| n.as_submodule())
                .and_then(|g| g.leaf_position(sf.index));
            if let Some(position) = position {
                let anchor = LeafAnchor {
                    submodule_id: &sub_id,
                    module_id: &module_id,
                    position,
                };
                apply_positions(scene, tables, Some(&anchor));
            }
        }
    }

    fn update_intro(&mut self, scene: &mut Scene, now_ms: f64, settings: &MotionSettings) {
        let start = *self.intro_started_ms.get_or_insert(now_ms);
        let duration = settings.intro_duration_ms.max(1.0);

        let layer_scale: HashMap<String, f32> = scene
            .layer_nodes()
            .map(|(n, g)| {
                let delay = g.index as f64 * settings.intro_stagger_ms;
                let p = clamp01(((now_ms - start - delay) / duration) as f32);
                (n.id.clone(), ease_out_cubic(p))
            })
            .collect();
        let outermost = scene
            .layers
            .last()
            .and_then(|id| layer_scale.get(id))
            .copied()
            .unwrap_or(1.0);

        let scales: Vec<f32> = scene
            .nodes
            .iter()
            .map(|n| match &n.kind {
                NodeKind::Spine | NodeKind::System { .. } => 1.0,
                NodeKind::IoInput(_) | NodeKind::IoOutput(_) => outermost,
                _ => scene
                    .layer_of(&n.id)
                    .and_then(|l| layer_scale.get(l))
                    .copied()
                    .unwrap_or(1.0),
            })
            .collect();
        for (node, scale) in scene.nodes.iter_mut().zip(scales) {
            node.intro_scale = scale;
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
    fn test_frozen_orbit_holds_runtime() {
        let mut tables = RuntimeTables::default();
        tables.step_orbit("L", 0.5, false);
        tables.step_orbit("L", 0.5, true);
        tables.step_orbit("L", 0.5, true);
        assert_eq!(tables.orbit_runtime("L"), 0.5);
        assert!(tables.is_orbit_locked("L"));

        tables.step_orbit("L", 0.5, false);
        assert_eq!(tables.orbit_runtime("L"), 1.0);
        assert!(!tables.is_orbit_locked("L"));
    }

    #[test]
    fn test_single_substep_is_plain_blend() {
        let mut pass = MotionPass::new();
        let mean = pass.relax_dt(0.1, 0.5, 1);
        assert!((pass.smoothed_dt() - 0.05).abs() < 1e-6);
        assert_eq!(mean, pass.smoothed_dt());
    }

    #[test]
    fn test_substeps_follow_the_dt_ramp() {
        let mut one = MotionPass::new();
        let mut three = MotionPass::new();
        let mean_one = one.relax_dt(0.1, 0.5, 1);
        let mean_three = three.relax_dt(0.1, 0.5, 3);
        // Same end point, but spin sees the intermediate values
        assert!((one.smoothed_dt() - three.smoothed_dt()).abs() < 1e-6);
        assert!(mean_three < mean_one - 1e-3);
        assert!(mean_three > 0.0);
    }

    #[test]
    fn test_spin_lock() {
        let mut tables = RuntimeTables::default();
        tables.step_spin("m", 0.2, false);
        tables.step_spin("m", 0.2, true);
        assert!((tables.spin_runtime("m") - 0.2).abs() < 1e-6);
        assert!(tables.is_spin_locked("m"));
    }

    #[test]
    fn test_retain_prunes_missing_ids() {
        let mut tables = RuntimeTables::default();
        tables.step_orbit("keep", 0.1, false);
        tables.step_orbit("drop", 0.1, true);
        tables.step_spin("mod", 0.01, false);
        let layers: HashSet<&str> = ["keep"].into_iter().collect();
        tables.retain(&layers, &HashSet::new());
        assert!(tables.orbit.contains_key("keep"));
        assert!(!tables.orbit.contains_key("drop"));
        assert!(tables.orbit_locks.is_empty());
        assert!(tables.spin.is_empty());
    }
}

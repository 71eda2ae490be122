//! TopologyRadar - frame loop and input orchestration
//!
//! Owns the current scene plus every piece of state that survives between frames.
//! Snapshot application is an atomic swap: the new scene is fully built and validated
//! before it replaces the old one, so a frame never sees a half-built scene.
//!
//! Screen coordinates passed to [`TopologyRadar::click`] and [`TopologyRadar::wheel`]
//! are viewport-local (origin at the top-left of the radar's rect).

use super::camera::Camera;
use super::config::{global_settings, RadarSettings};
use super::error::CameraResult;
use super::flash::FlashTimers;
use super::hit_test::{hit_test, hit_test_link, Hit, HitContext, HitKind};
use super::layout::{build_scene, SceneState};
use super::motion::MotionPass;
use super::particles::ParticleSystem;
use super::quality::{QualityProfile, QualityTier};
use super::render::{paint_scene, RenderOptions};
use super::scene::{NodeType, Scene, Viewport};
use super::selection::{resolve_hit, InteractionLevel, Resolved, Scope, Selection};
use super::snapshot::{RuntimeSnapshot, Snapshot};
use super::sync::LookupGuard;
use egui::{Pos2, Rect, Vec2};

/// What a click did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadarAction {
    /// Nothing under the pointer and nothing to back out of
    None,
    /// A node is now selected (with its leaf, if any)
    Selected(Selection),
    /// A link is selected and the camera framed its owner in map mode
    LinkSelected(String),
    /// Backed out one drill-down step
    BackedOut(Selection),
    /// Zoomed out to the whole system
    SystemRoot,
}

pub struct TopologyRadar {
    settings: RadarSettings,
    tier: QualityTier,
    profile: QualityProfile,
    viewport: Viewport,
    state: SceneState,
    motion: MotionPass,
    scene: Option<Scene>,
    snapshot: Option<Snapshot>,
    runtime: RuntimeSnapshot,
    camera: Camera,
    selection: Selection,
    particles: ParticleSystem,
    flash: FlashTimers,
    lookups: LookupGuard,
}

impl std::fmt::Debug for TopologyRadar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyRadar")
            .field("tier", &self.tier)
            .field("viewport", &self.viewport)
            .field("nodes", &self.scene.as_ref().map(|s| s.nodes.len()))
            .field("selection", &self.selection)
            .field("packets", &self.particles.len())
            .finish_non_exhaustive()
    }
}

impl TopologyRadar {
    /// Radar with the process-wide settings
    pub fn new(viewport: Viewport, tier: QualityTier) -> Self {
        Self::with_settings(global_settings().clone(), viewport, tier)
    }

    pub fn with_settings(settings: RadarSettings, viewport: Viewport, tier: QualityTier) -> Self {
        let profile = settings.profile(tier).clone();
        Self {
            camera: Camera::new(settings.camera.clone(), viewport),
            particles: ParticleSystem::new(settings.particles.clone()),
            flash: FlashTimers::new(settings.flash.window_ms),
            tier,
            profile,
            viewport,
            state: SceneState::default(),
            motion: MotionPass::new(),
            scene: None,
            snapshot: None,
            runtime: RuntimeSnapshot::default(),
            selection: Selection::none(),
            lookups: LookupGuard::new(),
            settings,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn flash(&self) -> &FlashTimers {
        &self.flash
    }

    pub fn runtime(&self) -> &RuntimeSnapshot {
        &self.runtime
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    pub fn settings(&self) -> &RadarSettings {
        &self.settings
    }

    /// Interaction level of the current selection
    pub fn level(&self) -> InteractionLevel {
        self.scene
            .as_ref()
            .map_or(InteractionLevel::Root, |s| self.selection.level(s))
    }

    /// Scope kept interactive by the current selection
    pub fn scope(&self) -> Option<Scope> {
        Scope::for_selection(self.scene.as_ref()?, &self.selection)
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Build a scene from `snapshot` and swap it in
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, now_ms: f64) {
        self.runtime = snapshot.runtime;
        let built = build_scene(
            &snapshot,
            &self.profile,
            self.viewport,
            now_ms,
            &mut self.state,
            &self.settings.layout,
        );
        self.snapshot = Some(snapshot);

        let Some(scene) = built else {
            tracing::info!("snapshot has no topology, scene cleared");
            self.scene = None;
            self.selection = Selection::none();
            self.particles = ParticleSystem::new(self.settings.particles.clone());
            return;
        };

        if self.scene.is_none() {
            self.motion.restart_intro(now_ms);
        }
        if self.selection.validate(&scene) {
            tracing::debug!(selection = ?self.selection, "selection trimmed after rebuild");
        }
        if self.camera.validate(&scene) {
            tracing::debug!(
                focus = ?self.camera.focus_target(),
                "camera references trimmed after rebuild"
            );
        }
        if let Err(err) = self.camera.fit_scene(&scene) {
            tracing::debug!("min zoom unchanged: {}", err);
        }
        let links_changed = self.particles.link_ids().len() != scene.links.len()
            || self
                .particles
                .link_ids()
                .iter()
                .zip(&scene.links)
                .any(|(id, link)| *id != link.id);
        if links_changed {
            self.particles.rebuild(&scene, &self.profile);
        }
        self.flash.observe(&scene, now_ms);

        tracing::info!(
            layers = scene.layers.len(),
            nodes = scene.nodes.len(),
            links = scene.links.len(),
            "scene swapped"
        );
        self.scene = Some(scene);
    }

    /// Track a new viewport size and rebuild from the last snapshot
    pub fn resize(&mut self, viewport: Viewport, now_ms: f64) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.camera.set_viewport(viewport);
        if let Some(snapshot) = self.snapshot.take() {
            self.apply_snapshot(snapshot, now_ms);
        }
    }

    /// Switch quality tier; the scene is rebuilt under the new ceilings
    pub fn set_quality(&mut self, tier: QualityTier, now_ms: f64) {
        if tier == self.tier {
            return;
        }
        self.tier = tier;
        self.profile = self.settings.profile(tier).clone();
        if let Some(scene) = &self.scene {
            self.particles.rebuild(scene, &self.profile);
        }
        if let Some(snapshot) = self.snapshot.take() {
            self.apply_snapshot(snapshot, now_ms);
        }
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    /// One frame: camera transition, then motion, then packets
    pub fn frame(&mut self, now_ms: f64) {
        self.camera.sync_transition(now_ms);
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        self.motion.update(
            scene,
            &mut self.state.runtime,
            &self.camera,
            &self.selection,
            now_ms,
            &self.profile,
            &self.settings.motion,
        );
        self.particles
            .advance(scene, self.motion.smoothed_dt(), &self.runtime);
        self.flash.prune(now_ms);
    }

    /// Draw the current scene into `rect`
    pub fn paint(&self, painter: &egui::Painter, rect: Rect, now_ms: f64) {
        let Some(scene) = self.scene.as_ref() else {
            return;
        };
        let scope = Scope::for_selection(scene, &self.selection);
        let threshold = self.settings.motion.render_threshold;
        let packets = self
            .particles
            .render(scene, self.selection.level(scene), &self.runtime, threshold);
        let opts = RenderOptions {
            selection: &self.selection,
            scope: scope.as_ref(),
            packets: &packets,
            flash: &self.flash,
            now_ms,
            tube_alpha: self.profile.tube_alpha,
            render_threshold: threshold,
            stroke_scale: self.viewport.dpr.clamp(1.0, self.profile.dpr_cap.max(1.0)),
        };
        paint_scene(painter, scene, &self.camera, rect, &opts);
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    pub fn drag(&mut self, delta: Vec2, now_ms: f64) {
        self.camera.pan_by(delta, now_ms);
    }

    pub fn wheel(&mut self, factor: f32, screen: Pos2, now_ms: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.camera.zoom_at(factor, screen, now_ms);
        }
    }

    /// Hit test under the pointer without changing anything
    pub fn hover(&self, screen: Pos2) -> Option<Hit> {
        let scene = self.scene.as_ref()?;
        let scope = Scope::for_selection(scene, &self.selection);
        let ctx = self.hit_context(scene, scope.as_ref());
        hit_test(scene, &self.camera, screen, &ctx)
    }

    fn hit_context<'a>(&'a self, scene: &Scene, scope: Option<&'a Scope>) -> HitContext<'a> {
        let active_submodule = self.selection.active_submodule(scene).or_else(|| {
            self.camera
                .focus_target()
                .filter(|id| scene.node(id).map(|n| n.node_type()) == Some(NodeType::Submodule))
        });
        HitContext {
            scope,
            active_submodule,
            settings: &self.settings.hit_test,
            render_threshold: self.settings.motion.render_threshold,
        }
    }

    /// Resolve a click and move selection and camera before returning
    pub fn click(&mut self, screen: Pos2, now_ms: f64) -> RadarAction {
        let Some(scene) = self.scene.as_ref() else {
            return RadarAction::None;
        };
        let level = self.selection.level(scene);
        let scope = Scope::for_selection(scene, &self.selection);
        let ctx = self.hit_context(scene, scope.as_ref());
        let hit = hit_test(scene, &self.camera, screen, &ctx);

        // Links only win over background (ring, fill, outside) hits
        let background = hit.as_ref().map_or(true, |h| {
            matches!(h.kind, HitKind::Ring | HitKind::ShellFill | HitKind::SystemRoot)
        });
        if background {
            let link = hit_test_link(
                scene,
                &self.camera,
                screen,
                self.settings.hit_test.link_threshold_px,
                level,
                &ctx,
            );
            if let Some(link) = link {
                return self.select_link(link.link_id, now_ms);
            }
        }

        let Some(hit) = hit else {
            return self.back_out(now_ms);
        };
        if hit.kind == HitKind::SystemRoot {
            return self.to_system_root(now_ms);
        }
        // Empty space inside the shell being inspected steps back out
        let anchor = self
            .camera
            .focus_target()
            .or(self.selection.node_id.as_deref())
            .and_then(|id| scene.layer_of(id));
        if matches!(hit.kind, HitKind::Ring | HitKind::ShellFill)
            && level >= InteractionLevel::Shell
            && anchor.is_some()
            && anchor == scene.layer_of(&hit.node_id)
        {
            return self.back_out(now_ms);
        }
        let Some(resolved) = resolve_hit(scene, &self.selection, &hit) else {
            return RadarAction::None;
        };
        self.select(resolved, now_ms)
    }

    fn select(&mut self, resolved: Resolved, now_ms: f64) -> RadarAction {
        let Some(scene) = self.scene.as_ref() else {
            return RadarAction::None;
        };
        let Some(node_type) = scene.node(&resolved.node_id).map(|n| n.node_type()) else {
            return RadarAction::None;
        };
        let id = resolved.node_id.as_str();
        // Re-clicking the current node must not remember itself as its own origin
        let origin = Some(self.selection.clone())
            .filter(|s| !s.is_empty() && s.node_id.as_deref() != Some(id));

        let moved = match (node_type, &resolved.subfractal) {
            (NodeType::Submodule, Some(leaf)) => {
                self.camera.zoom_into_subfractal(scene, id, leaf, now_ms)
            }
            (NodeType::Submodule, None) => {
                self.camera.zoom_into_submodule(scene, id, origin, now_ms)
            }
            (NodeType::Module, _) => self.camera.zoom_into_module(scene, id, origin, now_ms),
            (NodeType::Layer, _) => self.camera.zoom_into_layer(scene, id, now_ms),
            _ => Ok(()),
        };
        log_camera("drill-down", id, moved);

        self.selection = Selection {
            node_id: Some(resolved.node_id),
            link_id: None,
            subfractal: resolved.subfractal,
        };
        RadarAction::Selected(self.selection.clone())
    }

    fn select_link(&mut self, link_id: String, now_ms: f64) -> RadarAction {
        let Some(scene) = self.scene.as_ref() else {
            return RadarAction::None;
        };
        let owner = self
            .selection
            .active_submodule(scene)
            .map(str::to_string)
            .or_else(|| self.selection.node_id.clone());
        if let Some(owner) = owner {
            let moved = self
                .camera
                .enter_map_mode_for_link(scene, &owner, &link_id, now_ms);
            log_camera("map mode", &owner, moved);
        }
        self.selection.link_id = Some(link_id.clone());
        RadarAction::LinkSelected(link_id)
    }

    fn to_system_root(&mut self, now_ms: f64) -> RadarAction {
        if let Some(scene) = self.scene.as_ref() {
            let moved = self.camera.zoom_to_system_root(scene, now_ms);
            log_camera("system root", &scene.system_id, moved);
        }
        self.selection = Selection::none();
        RadarAction::SystemRoot
    }

    /// Empty-space click: leave map mode, then a leaf, then a drill-down level
    fn back_out(&mut self, now_ms: f64) -> RadarAction {
        let Some(scene) = self.scene.as_ref() else {
            return RadarAction::None;
        };

        if self.camera.map().is_some() {
            let moved = self.camera.exit_map_mode_to_centered_selection(scene, now_ms);
            log_camera("map exit", "-", moved);
            self.selection.link_id = None;
            return RadarAction::BackedOut(self.selection.clone());
        }

        if let Some(leaf) = self.selection.subfractal.take() {
            let moved = self.camera.step_out_to(scene, &leaf.submodule_id, now_ms);
            log_camera("leaf exit", &leaf.submodule_id, moved);
            self.selection.node_id = Some(leaf.submodule_id);
            return RadarAction::BackedOut(self.selection.clone());
        }

        let current = self
            .camera
            .focus_target()
            .map(str::to_string)
            .or_else(|| self.selection.node_id.clone());
        let Some(current) = current else {
            return RadarAction::None;
        };

        if let Some(previous) = self.camera.take_return_selection(&current) {
            let target = previous.node_id.clone();
            let moved = match target.as_deref().and_then(|id| scene.node(id)) {
                Some(n)
                    if matches!(
                        n.node_type(),
                        NodeType::Layer | NodeType::Module | NodeType::Submodule
                    ) =>
                {
                    self.camera.step_out_to(scene, &n.id, now_ms)
                }
                _ => self.camera.restore_camera_focus(now_ms),
            };
            log_camera("return selection", &current, moved);
            self.selection = previous;
            self.selection.validate(scene);
            return RadarAction::BackedOut(self.selection.clone());
        }

        // No remembered origin: step up to the enclosing shell, or all the way out
        if let Some(layer) = scene.layer_of(&current).filter(|l| *l != current) {
            let layer = layer.to_string();
            log_camera("shell", &layer, self.camera.step_out_to(scene, &layer, now_ms));
            self.selection = Selection::node(layer);
            return RadarAction::BackedOut(self.selection.clone());
        }
        if self.camera.focus().is_some() {
            log_camera("focus restore", &current, self.camera.restore_camera_focus(now_ms));
        }
        self.selection = Selection::none();
        RadarAction::BackedOut(Selection::none())
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    /// Issue a lookup id for the current focus target
    pub fn begin_lookup(&mut self) -> Option<u64> {
        let target = self.camera.focus_target()?.to_string();
        Some(self.lookups.issue(target))
    }

    /// Whether a lookup response may be applied; clears the pending request if so
    pub fn finish_lookup(&mut self, id: u64) -> bool {
        self.lookups.complete(id, self.camera.focus_target())
    }
}

fn log_camera(action: &str, id: &str, result: CameraResult<()>) {
    if let Err(err) = result {
        tracing::debug!(node = %id, "{} kept prior view: {}", action, err);
    }
}

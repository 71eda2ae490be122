//! Camera - zoom/pan with eased transitions and two single-level return stacks
//!
//! Transform (pivot `c` = viewport center, which is also the scene center):
//!
//! ```text
//! screen = c + (world - c) * zoom + pan
//! world  = c + (screen - c - pan) / zoom
//! ```
//!
//! # Return stacks
//! - **focus**: ordinary drill-down. Entering focus on a new target captures the view just
//!   before it; re-focusing the same target keeps the existing return point. Stepping back
//!   out to an enclosing node restores to the view from before any focus.
//! - **map**: link-preview framing of a node and its neighbors, with its own return view.
//!
//! Both are depth 1. Drill-down return *selections* are a separate small map keyed by
//! destination id.

use super::config::CameraSettings;
use super::error::{CameraError, CameraResult};
use super::geometry::ease_out_cubic;
use super::scene::{Node, NodeType, Scene, Viewport};
use super::selection::{Selection, SubfractalRef};
use egui::{Pos2, Rect, Vec2};
use std::collections::HashMap;

// =============================================================================
// VIEW / TRANSITION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub zoom: f32,
    pub pan: Vec2,
}

impl CameraView {
    pub fn is_finite(&self) -> bool {
        self.zoom.is_finite() && self.zoom > 0.0 && self.pan.x.is_finite() && self.pan.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransitionOptions {
    /// Skip zoom-range and pan clamping (precise leaf targets, exact restores)
    pub allow_out_of_bounds: bool,
}

impl TransitionOptions {
    pub fn unbounded() -> Self {
        Self {
            allow_out_of_bounds: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransition {
    pub from: CameraView,
    pub to: CameraView,
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl CameraTransition {
    /// Interpolated view at `now_ms` and whether the transition has finished
    pub fn sample(&self, now_ms: f64) -> (CameraView, bool) {
        let t = ((now_ms - self.start_ms) / self.duration_ms.max(1.0)).clamp(0.0, 1.0) as f32;
        if t >= 1.0 {
            return (self.to, true);
        }
        let e = ease_out_cubic(t);
        let view = CameraView {
            zoom: self.from.zoom + (self.to.zoom - self.from.zoom) * e,
            pan: self.from.pan + (self.to.pan - self.from.pan) * e,
        };
        (view, false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusFrame {
    pub target_id: String,
    /// View just before this target was focused
    pub restore: CameraView,
    /// View before the first focus level was entered
    pub outside: CameraView,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapFrame {
    pub owner_id: String,
    pub ret: CameraView,
}

// =============================================================================
// CAMERA
// =============================================================================

#[derive(Debug, Clone)]
pub struct Camera {
    pub zoom: f32,
    pub pan: Vec2,
    /// Effective minimum (base raised by the scene-height rule)
    pub min_zoom: f32,
    pub max_zoom: f32,
    transition: Option<CameraTransition>,
    focus: Option<FocusFrame>,
    map: Option<MapFrame>,
    module_return_selection: HashMap<String, Selection>,
    submodule_return_selection: HashMap<String, Selection>,
    viewport: Viewport,
    scene_bounds: Option<Rect>,
    settings: CameraSettings,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraSettings::default(), Viewport::default())
    }
}

impl Camera {
    pub fn new(settings: CameraSettings, viewport: Viewport) -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            min_zoom: settings.min_zoom,
            max_zoom: settings.max_zoom,
            transition: None,
            focus: None,
            map: None,
            module_return_selection: HashMap::new(),
            submodule_return_selection: HashMap::new(),
            viewport,
            scene_bounds: None,
            settings,
        }
    }

    pub fn view(&self) -> CameraView {
        CameraView {
            zoom: self.zoom,
            pan: self.pan,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn transition(&self) -> Option<&CameraTransition> {
        self.transition.as_ref()
    }

    pub fn focus(&self) -> Option<&FocusFrame> {
        self.focus.as_ref()
    }

    pub fn focus_target(&self) -> Option<&str> {
        self.focus.as_ref().map(|f| f.target_id.as_str())
    }

    pub fn map(&self) -> Option<&MapFrame> {
        self.map.as_ref()
    }

    // =========================================================================
    // TRANSFORMS
    // =========================================================================

    fn pivot(&self) -> Pos2 {
        self.viewport.center()
    }

    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        let c = self.pivot();
        c + (world - c) * self.zoom + self.pan
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        let c = self.pivot();
        c + (screen - c - self.pan) / self.zoom
    }

    /// Pan that puts `world` at the viewport center for `zoom`
    pub fn pan_centering(&self, world: Pos2, zoom: f32) -> Vec2 {
        -(world - self.pivot()) * zoom
    }

    // =========================================================================
    // BOUNDS
    // =========================================================================

    /// Track the scene bounding box and raise `min_zoom` so it never renders shorter
    /// than the configured fraction of viewport height
    pub fn fit_scene(&mut self, scene: &Scene) -> CameraResult<f32> {
        self.scene_bounds = Some(scene.bounds());
        self.effective_min_zoom(scene.bounds())
    }

    pub fn effective_min_zoom(&mut self, bounds: Rect) -> CameraResult<f32> {
        let h = bounds.height();
        if !(h.is_finite() && h > f32::EPSILON) {
            return Err(CameraError::DegenerateBounds(format!("height {h}")));
        }
        let needed = self.settings.min_scene_height_fraction * self.viewport.height / h;
        if !needed.is_finite() {
            return Err(CameraError::DegenerateBounds(format!("min zoom {needed}")));
        }
        self.min_zoom = self.settings.min_zoom.max(needed).min(self.max_zoom);
        if self.zoom < self.min_zoom && self.transition.is_none() {
            self.zoom = self.min_zoom;
            self.pan = self.clamp_pan_to_scene_bounds(self.pan, self.zoom);
        }
        Ok(self.min_zoom)
    }

    /// Project `pan` so at least a keep-visible slice of the scene box stays on screen
    ///
    /// The allowed interval depends only on `zoom`, so the projection is idempotent.
    pub fn clamp_pan_to_scene_bounds(&self, pan: Vec2, zoom: f32) -> Vec2 {
        let Some(bounds) = self.scene_bounds else {
            return pan;
        };
        let c = self.pivot();
        let min = c + (bounds.min - c) * zoom;
        let max = c + (bounds.max - c) * zoom;
        let frac = self.settings.pan_keep_visible_fraction;

        let axis = |lo: f32, hi: f32, extent: f32, p: f32| {
            let keep = frac * (hi - lo).min(extent);
            let lower = keep - hi;
            let upper = extent - keep - lo;
            if lower <= upper {
                p.clamp(lower, upper)
            } else {
                (lower + upper) / 2.0
            }
        };
        Vec2::new(
            axis(min.x, max.x, self.viewport.width, pan.x),
            axis(min.y, max.y, self.viewport.height, pan.y),
        )
    }

    fn bounded(&self, target: CameraView, opts: TransitionOptions) -> CameraView {
        if opts.allow_out_of_bounds {
            return target;
        }
        let zoom = target.zoom.clamp(self.min_zoom, self.max_zoom);
        CameraView {
            zoom,
            pan: self.clamp_pan_to_scene_bounds(target.pan, zoom),
        }
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Start an eased move to `target`
    ///
    /// Non-finite targets are rejected and leave the camera untouched. An in-flight
    /// transition is resolved to its current value first.
    pub fn start_transition(
        &mut self,
        target: CameraView,
        duration_ms: f64,
        opts: TransitionOptions,
        now_ms: f64,
    ) -> CameraResult<()> {
        if !target.is_finite() {
            tracing::debug!(zoom = target.zoom, "camera transition rejected: non-finite target");
            return Err(CameraError::NonFinite {
                zoom: target.zoom,
                pan_x: target.pan.x,
                pan_y: target.pan.y,
            });
        }
        self.pop_transition(now_ms);
        let to = self.bounded(target, opts);

        if duration_ms <= 0.0 {
            self.zoom = to.zoom;
            self.pan = to.pan;
            return Ok(());
        }
        self.transition = Some(CameraTransition {
            from: self.view(),
            to,
            start_ms: now_ms,
            duration_ms,
        });
        Ok(())
    }

    /// Advance the in-flight transition; returns true while still animating
    pub fn sync_transition(&mut self, now_ms: f64) -> bool {
        let Some(tr) = self.transition else {
            return false;
        };
        let (view, done) = tr.sample(now_ms);
        self.zoom = view.zoom;
        self.pan = view.pan;
        if done {
            self.transition = None;
        }
        !done
    }

    /// Freeze the in-flight transition at its current interpolated value
    pub fn pop_transition(&mut self, now_ms: f64) {
        self.sync_transition(now_ms);
        self.transition = None;
    }

    /// Drop the in-flight transition where the last sync left it
    pub fn stop_transition(&mut self) {
        self.transition = None;
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    // =========================================================================
    // DIRECT INPUT
    // =========================================================================

    /// Drag by a screen-space delta
    pub fn pan_by(&mut self, delta: Vec2, now_ms: f64) {
        self.pop_transition(now_ms);
        let pan = self.pan + delta;
        if pan.x.is_finite() && pan.y.is_finite() {
            self.pan = self.clamp_pan_to_scene_bounds(pan, self.zoom);
        }
    }

    /// Zoom by `factor` keeping the world point under `anchor` fixed
    pub fn zoom_at(&mut self, factor: f32, anchor: Pos2, now_ms: f64) {
        self.pop_transition(now_ms);
        let zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if !zoom.is_finite() {
            return;
        }
        let world = self.screen_to_world(anchor);
        let pan = anchor - self.pivot() - (world - self.pivot()) * zoom;
        if pan.x.is_finite() && pan.y.is_finite() {
            self.zoom = zoom;
            self.pan = self.clamp_pan_to_scene_bounds(pan, zoom);
        }
    }

    // =========================================================================
    // FOCUS
    // =========================================================================

    fn short_side(&self) -> f32 {
        self.viewport.short_side()
    }

    /// Zoom at which an extent of `radius` fills `fill` of the short viewport side
    fn framing_zoom(&self, radius: f32, fill: f32) -> f32 {
        self.short_side() * fill / (2.0 * radius.max(1.0))
    }

    fn enter_focus(
        &mut self,
        target_id: &str,
        world: Pos2,
        zoom: f32,
        opts: TransitionOptions,
        ascend: bool,
        now_ms: f64,
    ) -> CameraResult<()> {
        self.pop_transition(now_ms);
        let target = CameraView {
            zoom,
            pan: self.pan_centering(world, zoom),
        };
        if !target.is_finite() {
            return Err(CameraError::NonFinite {
                zoom,
                pan_x: target.pan.x,
                pan_y: target.pan.y,
            });
        }
        let current = self.view();
        let (restore, outside) = match &self.focus {
            Some(f) if f.target_id == target_id => (f.restore, f.outside),
            Some(f) if ascend => (f.outside, f.outside),
            Some(f) => (current, f.outside),
            None => (current, current),
        };
        self.start_transition(target, self.settings.focus_transition_ms, opts, now_ms)?;
        self.focus = Some(FocusFrame {
            target_id: target_id.to_string(),
            restore,
            outside,
        });
        Ok(())
    }

    /// World point and zoom that frame a layer, module or submodule
    fn focus_point(&self, scene: &Scene, id: &str, ty: NodeType) -> CameraResult<(Pos2, f32)> {
        match ty {
            NodeType::Layer => {
                let node = Self::expect_node(scene, id, ty)?;
                let zoom = self.framing_zoom(node.extent(), self.settings.layer_fill);
                Ok((scene.center, zoom))
            }
            NodeType::Module => {
                let node = Self::expect_node(scene, id, ty)?;
                let zoom = self.framing_zoom(node.extent(), self.settings.module_fill);
                Ok((node.pos, zoom))
            }
            NodeType::Submodule => self.submodule_zoom(scene, id),
            _ => Err(CameraError::WrongNodeType {
                id: id.to_string(),
                expected: "layer, module or submodule",
            }),
        }
    }

    fn expect_node<'a>(
        scene: &'a Scene,
        id: &str,
        ty: NodeType,
    ) -> CameraResult<&'a Node> {
        let node = scene
            .node(id)
            .ok_or_else(|| CameraError::UnknownNode(id.to_string()))?;
        if node.node_type() != ty {
            return Err(CameraError::WrongNodeType {
                id: id.to_string(),
                expected: ty.as_str(),
            });
        }
        Ok(node)
    }

    /// Frame a whole shell
    pub fn zoom_into_layer(&mut self, scene: &Scene, id: &str, now_ms: f64) -> CameraResult<()> {
        let (world, zoom) = self.focus_point(scene, id, NodeType::Layer)?;
        self.enter_focus(id, world, zoom, TransitionOptions::default(), false, now_ms)
    }

    /// Frame a module and its submodule shell
    pub fn zoom_into_module(
        &mut self,
        scene: &Scene,
        id: &str,
        origin: Option<Selection>,
        now_ms: f64,
    ) -> CameraResult<()> {
        let (pos, zoom) = self.focus_point(scene, id, NodeType::Module)?;
        self.enter_focus(id, pos, zoom, TransitionOptions::default(), false, now_ms)?;
        if let Some(origin) = origin {
            self.module_return_selection.insert(id.to_string(), origin);
        }
        Ok(())
    }

    fn submodule_zoom(&self, scene: &Scene, id: &str) -> CameraResult<(Pos2, f32)> {
        let node = Self::expect_node(scene, id, NodeType::Submodule)?;
        let g = node
            .as_submodule()
            .ok_or_else(|| CameraError::UnknownNode(id.to_string()))?;
        let extent = g.thickness().max(g.mid_radius() * g.span().abs() / 2.0);
        Ok((node.pos, self.framing_zoom(extent, self.settings.submodule_fill)))
    }

    /// Frame one submodule arc
    pub fn zoom_into_submodule(
        &mut self,
        scene: &Scene,
        id: &str,
        origin: Option<Selection>,
        now_ms: f64,
    ) -> CameraResult<()> {
        let (pos, zoom) = self.submodule_zoom(scene, id)?;
        self.enter_focus(id, pos, zoom, TransitionOptions::default(), false, now_ms)?;
        if let Some(origin) = origin {
            self.submodule_return_selection.insert(id.to_string(), origin);
        }
        Ok(())
    }

    /// Frame a leaf on its submodule arc, tighter than the whole-scene clamp allows
    pub fn zoom_into_subfractal(
        &mut self,
        scene: &Scene,
        parent_id: &str,
        leaf: &SubfractalRef,
        now_ms: f64,
    ) -> CameraResult<()> {
        let (_, zoom) = self.submodule_zoom(scene, parent_id)?;
        let pos = scene
            .node(parent_id)
            .and_then(|n| n.as_submodule())
            .and_then(|g| g.leaf_position(leaf.index))
            .ok_or_else(|| CameraError::UnknownNode(leaf.leaf_id.clone()))?;
        let zoom = zoom * self.settings.subfractal_zoom_boost;
        self.enter_focus(parent_id, pos, zoom, TransitionOptions::unbounded(), false, now_ms)
    }

    /// Step back out to an enclosing layer, module or submodule
    ///
    /// Re-focusing the current target keeps its return point; any other target restores
    /// to the view from before the first focus level.
    pub fn step_out_to(&mut self, scene: &Scene, id: &str, now_ms: f64) -> CameraResult<()> {
        let ty = scene
            .node(id)
            .map(|n| n.node_type())
            .ok_or_else(|| CameraError::UnknownNode(id.to_string()))?;
        let (world, zoom) = self.focus_point(scene, id, ty)?;
        self.enter_focus(id, world, zoom, TransitionOptions::default(), true, now_ms)
    }

    /// Zoom out to the whole system and drop every return point
    pub fn zoom_to_system_root(&mut self, scene: &Scene, now_ms: f64) -> CameraResult<()> {
        let zoom = self.framing_zoom(scene.boundary_radius, self.settings.system_root_fill);
        let target = CameraView {
            zoom,
            pan: self.pan_centering(scene.center, zoom),
        };
        self.start_transition(
            target,
            self.settings.transition_ms,
            TransitionOptions::default(),
            now_ms,
        )?;
        self.focus = None;
        self.map = None;
        self.module_return_selection.clear();
        self.submodule_return_selection.clear();
        Ok(())
    }

    /// Ease back to the pre-focus view and clear focus
    pub fn restore_camera_focus(&mut self, now_ms: f64) -> CameraResult<()> {
        let frame = self.focus.take().ok_or(CameraError::NothingToRestore("focus"))?;
        if let Err(err) = self.start_transition(
            frame.restore,
            self.settings.focus_transition_ms,
            TransitionOptions::unbounded(),
            now_ms,
        ) {
            self.focus = Some(frame);
            return Err(err);
        }
        Ok(())
    }

    // =========================================================================
    // MAP MODE
    // =========================================================================

    /// Frame a node together with its direct neighbors
    pub fn enter_map_mode_for_selection(
        &mut self,
        scene: &Scene,
        id: &str,
        now_ms: f64,
    ) -> CameraResult<()> {
        self.enter_map(scene, id, &[], now_ms)
    }

    /// Frame a node, its direct neighbors and both endpoints of `link_id`
    pub fn enter_map_mode_for_link(
        &mut self,
        scene: &Scene,
        owner_id: &str,
        link_id: &str,
        now_ms: f64,
    ) -> CameraResult<()> {
        let link = scene
            .link(link_id)
            .ok_or_else(|| CameraError::UnknownNode(link_id.to_string()))?;
        let endpoints = [link.from_id.as_str(), link.to_id.as_str()];
        self.enter_map(scene, owner_id, &endpoints, now_ms)
    }

    fn enter_map(
        &mut self,
        scene: &Scene,
        id: &str,
        extra: &[&str],
        now_ms: f64,
    ) -> CameraResult<()> {
        let node = scene
            .node(id)
            .ok_or_else(|| CameraError::UnknownNode(id.to_string()))?;
        let mut bbox = Rect::from_center_size(node.pos, Vec2::splat(node.extent() * 2.0));
        for nid in scene.neighbors(id).into_iter().chain(extra.iter().copied()) {
            if let Some(n) = scene.node(nid) {
                bbox = bbox.union(Rect::from_center_size(n.pos, Vec2::splat(n.radius * 2.0)));
            }
        }
        if !(bbox.width() > f32::EPSILON && bbox.height() > f32::EPSILON) {
            return Err(CameraError::DegenerateBounds(format!("{bbox:?}")));
        }
        self.pop_transition(now_ms);
        let zoom = self.settings.map_fill
            * (self.viewport.width / bbox.width()).min(self.viewport.height / bbox.height());
        let target = CameraView {
            zoom,
            pan: self.pan_centering(bbox.center(), zoom),
        };
        let ret = self.view();
        self.start_transition(
            target,
            self.settings.transition_ms,
            TransitionOptions::default(),
            now_ms,
        )?;
        let ret = self.map.as_ref().map_or(ret, |m| m.ret);
        self.map = Some(MapFrame {
            owner_id: id.to_string(),
            ret,
        });
        Ok(())
    }

    /// Leave map mode at the return zoom, centered on the owning node
    pub fn exit_map_mode_to_centered_selection(
        &mut self,
        scene: &Scene,
        now_ms: f64,
    ) -> CameraResult<()> {
        let frame = self.map.as_ref().ok_or(CameraError::NothingToRestore("map"))?;
        let zoom = frame.ret.zoom;
        let world = scene
            .node(&frame.owner_id)
            .map(|n| n.pos)
            .unwrap_or(scene.center);
        let target = CameraView {
            zoom,
            pan: self.pan_centering(world, zoom),
        };
        self.start_transition(
            target,
            self.settings.transition_ms,
            TransitionOptions::unbounded(),
            now_ms,
        )?;
        self.map = None;
        Ok(())
    }

    // =========================================================================
    // DRILL-DOWN RETURN SELECTIONS
    // =========================================================================

    /// Selection to restore when backing out of `dest_id`
    pub fn take_return_selection(&mut self, dest_id: &str) -> Option<Selection> {
        self.submodule_return_selection
            .remove(dest_id)
            .or_else(|| self.module_return_selection.remove(dest_id))
    }

    pub fn has_return_selection(&self, dest_id: &str) -> bool {
        self.submodule_return_selection.contains_key(dest_id)
            || self.module_return_selection.contains_key(dest_id)
    }

    /// Drop references to nodes missing from `scene`
    ///
    /// A dangling focus or map owner is cleared without moving the view. Return selections
    /// are dropped when their destination is gone and trimmed against the scene otherwise.
    /// Returns true if anything changed.
    pub fn validate(&mut self, scene: &Scene) -> bool {
        let mut changed = false;
        if self
            .focus
            .as_ref()
            .is_some_and(|f| scene.node(&f.target_id).is_none())
        {
            self.focus = None;
            changed = true;
        }
        if self
            .map
            .as_ref()
            .is_some_and(|m| scene.node(&m.owner_id).is_none())
        {
            self.map = None;
            changed = true;
        }
        for table in [
            &mut self.module_return_selection,
            &mut self.submodule_return_selection,
        ] {
            let before = table.len();
            table.retain(|dest, origin| {
                scene.node(dest).is_some() && {
                    origin.validate(scene);
                    !origin.is_empty()
                }
            });
            changed |= table.len() != before;
        }
        changed
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        let mut cam = Camera::new(CameraSettings::default(), Viewport::new(800.0, 600.0, 1.0));
        cam.scene_bounds = Some(Rect::from_center_size(
            Pos2::new(400.0, 300.0),
            Vec2::splat(560.0),
        ));
        cam
    }

    #[test]
    fn test_transform_round_trip() {
        let mut cam = camera();
        cam.zoom = 2.5;
        cam.pan = Vec2::new(-40.0, 12.0);
        let w = Pos2::new(123.0, 456.0);
        let back = cam.screen_to_world(cam.world_to_screen(w));
        assert!(back.distance(w) < 1e-3);
    }

    #[test]
    fn test_pan_centering_puts_point_at_center() {
        let mut cam = camera();
        let w = Pos2::new(500.0, 100.0);
        cam.zoom = 3.0;
        cam.pan = cam.pan_centering(w, 3.0);
        assert!(cam.world_to_screen(w).distance(Pos2::new(400.0, 300.0)) < 1e-3);
    }

    #[test]
    fn test_non_finite_transition_is_noop() {
        let mut cam = camera();
        let before = cam.view();
        let err = cam.start_transition(
            CameraView {
                zoom: f32::NAN,
                pan: Vec2::ZERO,
            },
            100.0,
            TransitionOptions::default(),
            0.0,
        );
        assert!(matches!(err, Err(CameraError::NonFinite { .. })));
        assert_eq!(cam.view(), before);
        assert!(cam.transition().is_none());
    }

    #[test]
    fn test_transition_eases_to_target() {
        let mut cam = camera();
        let target = CameraView {
            zoom: 2.0,
            pan: Vec2::new(10.0, -10.0),
        };
        cam.start_transition(target, 500.0, TransitionOptions::unbounded(), 0.0)
            .unwrap();
        assert!(cam.sync_transition(250.0));
        assert!(cam.zoom > 1.0 && cam.zoom < 2.0);
        assert!(!cam.sync_transition(600.0));
        assert_eq!(cam.view(), target);
    }

    #[test]
    fn test_input_pops_transition() {
        let mut cam = camera();
        cam.start_transition(
            CameraView {
                zoom: 3.0,
                pan: Vec2::ZERO,
            },
            1000.0,
            TransitionOptions::unbounded(),
            0.0,
        )
        .unwrap();
        cam.pan_by(Vec2::new(1.0, 0.0), 500.0);
        assert!(cam.transition().is_none());
        assert!(cam.zoom > 1.0 && cam.zoom < 3.0);
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let cam = camera();
        let wild = Vec2::new(5000.0, -3000.0);
        let once = cam.clamp_pan_to_scene_bounds(wild, 1.7);
        let twice = cam.clamp_pan_to_scene_bounds(once, 1.7);
        assert_eq!(once, twice);
        assert_ne!(once, wild);
    }

    #[test]
    fn test_effective_min_zoom_raises_floor() {
        let mut cam = camera();
        let bounds = Rect::from_center_size(Pos2::new(400.0, 300.0), Vec2::splat(300.0));
        let min = cam.effective_min_zoom(bounds).unwrap();
        // 0.7 * 600 / 300
        assert!((min - 1.4).abs() < 1e-5);
        assert!(cam.zoom >= min);
        let degenerate = Rect::from_min_max(Pos2::ZERO, Pos2::new(10.0, 0.0));
        assert!(cam.effective_min_zoom(degenerate).is_err());
        assert!((cam.min_zoom - 1.4).abs() < 1e-5);
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let mut cam = camera();
        cam.scene_bounds = None;
        let anchor = Pos2::new(620.0, 140.0);
        let before = cam.screen_to_world(anchor);
        cam.zoom_at(1.8, anchor, 0.0);
        let after = cam.screen_to_world(anchor);
        assert!(before.distance(after) < 1e-3);
    }

    #[test]
    fn test_restore_without_focus_errors() {
        let mut cam = camera();
        assert!(matches!(
            cam.restore_camera_focus(0.0),
            Err(CameraError::NothingToRestore("focus"))
        ));
    }
}

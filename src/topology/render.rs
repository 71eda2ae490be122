//! Rendering - draws the radar scene with egui::Painter
//!
//! Stateless: everything comes from the scene, camera and the per-frame
//! [`RenderOptions`]. World points go through the camera and are then offset by the
//! paint rect's origin (camera screen space is viewport-local).

use super::camera::Camera;
use super::flash::FlashTimers;
use super::geometry::{clamp01, polar, sample_cubic};
use super::particles::PacketSprite;
use super::scene::{Link, LinkKind, Node, NodeKind, Scene, SubmoduleGeometry};
use super::selection::{Scope, Selection};
use egui::{Align2, Color32, FontId, Pos2, Rect, Shape, Stroke, Vec2};

// =============================================================================
// PALETTE
// =============================================================================

pub mod palette {
    use egui::Color32;

    pub const BACKGROUND: Color32 = Color32::from_rgb(10, 14, 22);
    pub const RING: Color32 = Color32::from_rgb(70, 90, 120);
    pub const RING_SELECTED: Color32 = Color32::from_rgb(150, 190, 240);
    pub const BOUNDARY: Color32 = Color32::from_rgb(45, 55, 75);
    pub const SPINE: Color32 = Color32::from_rgb(200, 210, 230);
    pub const MODULE: Color32 = Color32::from_rgb(90, 150, 210);
    pub const SUBMODULE: Color32 = Color32::from_rgb(120, 180, 160);
    pub const LEAF: Color32 = Color32::from_rgb(220, 230, 200);
    pub const IO_INPUT: Color32 = Color32::from_rgb(110, 200, 120);
    pub const IO_OUTPUT: Color32 = Color32::from_rgb(200, 140, 230);
    pub const LINK: Color32 = Color32::from_rgb(110, 160, 220);
    pub const LINK_HOT: Color32 = Color32::from_rgb(240, 90, 60);
    pub const ALERT: Color32 = Color32::from_rgb(255, 193, 7);
    pub const ERROR: Color32 = Color32::from_rgb(235, 60, 60);
    pub const RESOLVED: Color32 = Color32::from_rgb(100, 230, 140);
    pub const SELECTED: Color32 = Color32::WHITE;
    pub const LABEL: Color32 = Color32::from_rgb(210, 215, 225);
}

/// Opacity for nodes and links outside the active scope
const OUT_OF_SCOPE_OPACITY: f32 = 0.25;
const LINK_SAMPLES: usize = 24;
const ARC_SEGMENTS: usize = 28;
const LABEL_MIN_RADIUS_PX: f32 = 14.0;

/// Per-frame inputs beyond scene and camera
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions<'a> {
    pub selection: &'a Selection,
    pub scope: Option<&'a Scope>,
    pub packets: &'a [PacketSprite],
    pub flash: &'a FlashTimers,
    pub now_ms: f64,
    pub tube_alpha: f32,
    pub render_threshold: f32,
    /// Stroke scale (device pixel ratio, capped by the quality profile)
    pub stroke_scale: f32,
}

/// Screen mapping for one paint call
struct Frame<'a> {
    camera: &'a Camera,
    offset: Vec2,
}

impl Frame<'_> {
    fn pt(&self, world: Pos2) -> Pos2 {
        self.camera.world_to_screen(world) + self.offset
    }

    fn len(&self, world: f32) -> f32 {
        world * self.camera.zoom
    }
}

fn with_alpha(color: Color32, alpha: f32) -> Color32 {
    color.gamma_multiply(clamp01(alpha))
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let t = clamp01(t);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Draw the whole scene into `screen_rect`
pub fn paint_scene(
    painter: &egui::Painter,
    scene: &Scene,
    camera: &Camera,
    screen_rect: Rect,
    opts: &RenderOptions<'_>,
) {
    let frame = Frame {
        camera,
        offset: screen_rect.min.to_vec2(),
    };
    painter.rect_filled(screen_rect, 0.0, palette::BACKGROUND);

    let in_scope = |id: &str| opts.scope.map_or(true, |s| s.contains_node(id));
    let opacity = |node: &Node| {
        let base = clamp01(node.intro_scale);
        if in_scope(&node.id) {
            base
        } else {
            base * OUT_OF_SCOPE_OPACITY
        }
    };
    let selected = opts.selection.node_id.as_deref();

    // Boundary and shells first, links above them, bodies on top
    render_boundary(painter, scene, &frame, opts);
    for (node, g) in scene.layer_nodes() {
        if !node.is_renderable(opts.render_threshold) {
            continue;
        }
        let color = if selected == Some(node.id.as_str()) {
            palette::RING_SELECTED
        } else {
            status_color(node, palette::RING)
        };
        let width = frame.len(g.ring_width).max(1.0);
        painter.circle_stroke(
            frame.pt(scene.center),
            frame.len(g.ring_radius),
            Stroke::new(width, with_alpha(color, 0.18 * opacity(node))),
        );
        painter.circle_stroke(
            frame.pt(scene.center),
            frame.len(g.ring_radius),
            Stroke::new(opts.stroke_scale, with_alpha(color, 0.6 * opacity(node))),
        );
    }

    for link in &scene.links {
        render_link(painter, scene, link, &frame, opts);
    }

    for node in &scene.nodes {
        if !node.is_renderable(opts.render_threshold) {
            continue;
        }
        let alpha = opacity(node);
        let is_selected = selected == Some(node.id.as_str());
        match &node.kind {
            NodeKind::Spine => {
                let r = frame.len(node.radius * node.intro_scale);
                painter.circle_filled(frame.pt(node.pos), r, with_alpha(palette::SPINE, alpha));
            }
            NodeKind::Module(_) => render_module(painter, node, &frame, is_selected, alpha, opts),
            NodeKind::Submodule(g) => {
                let active = opts
                    .selection
                    .subfractal
                    .as_ref()
                    .map_or(is_selected, |sf| sf.submodule_id == node.id);
                render_submodule(painter, node, g, &frame, active, alpha, opts);
            }
            NodeKind::IoInput(_) | NodeKind::IoOutput(_) => {
                let base = if matches!(node.kind, NodeKind::IoInput(_)) {
                    palette::IO_INPUT
                } else {
                    palette::IO_OUTPUT
                };
                let pos = frame.pt(node.pos);
                let r = frame.len(node.radius * node.intro_scale);
                painter.circle_filled(pos, r, with_alpha(status_color(node, base), alpha));
                render_label(painter, &node.label, pos, r, alpha);
            }
            NodeKind::System { .. } | NodeKind::Layer(_) => {}
        }
        render_flash(painter, node, &frame, opts);
    }

    render_packets(painter, &frame, opts);
}

// =============================================================================
// PIECES
// =============================================================================

fn status_color(node: &Node, base: Color32) -> Color32 {
    if node.error {
        palette::ERROR
    } else if node.alert {
        palette::ALERT
    } else {
        base
    }
}

fn render_boundary(painter: &egui::Painter, scene: &Scene, frame: &Frame, opts: &RenderOptions) {
    let Some(system) = scene.node(&scene.system_id) else {
        return;
    };
    if !system.is_renderable(opts.render_threshold) {
        return;
    }
    let color = if opts.selection.node_id.as_deref() == Some(system.id.as_str()) {
        palette::RING_SELECTED
    } else {
        palette::BOUNDARY
    };
    painter.circle_stroke(
        frame.pt(scene.center),
        frame.len(scene.boundary_radius),
        Stroke::new(opts.stroke_scale, with_alpha(color, 0.8)),
    );
}

fn render_link(
    painter: &egui::Painter,
    scene: &Scene,
    link: &Link,
    frame: &Frame,
    opts: &RenderOptions,
) {
    let visible = [&link.from_id, &link.to_id].iter().all(|id| {
        scene
            .node(id)
            .is_some_and(|n| n.is_renderable(opts.render_threshold))
    });
    if !visible {
        return;
    }
    let selected = opts.selection.link_id.as_deref() == Some(link.id.as_str());
    let scoped = opts.scope.map_or(true, |s| s.contains_link(&link.id));
    let mut alpha = opts.tube_alpha * (0.6 + 0.4 * clamp01(link.activity));
    if !scoped {
        alpha *= OUT_OF_SCOPE_OPACITY;
    }
    if selected {
        alpha = 1.0;
    }
    let color = if selected {
        palette::SELECTED
    } else {
        lerp_color(palette::LINK, palette::LINK_HOT, link.error_weight)
    };
    let width = match link.kind {
        LinkKind::Fractal | LinkKind::Hierarchy => 0.8,
        _ => 1.4,
    } * opts.stroke_scale;

    let points: Vec<Pos2> = sample_cubic(&link.points, LINK_SAMPLES)
        .into_iter()
        .map(|p| frame.pt(p))
        .collect();
    painter.add(Shape::line(points, Stroke::new(width, with_alpha(color, alpha))));
}

fn render_module(
    painter: &egui::Painter,
    node: &Node,
    frame: &Frame,
    selected: bool,
    alpha: f32,
    opts: &RenderOptions,
) {
    let pos = frame.pt(node.pos);
    let r = frame.len(node.radius * node.intro_scale);
    let base = status_color(node, palette::MODULE);

    // Soft glow scaled by activity
    let glow = clamp01(node.activity);
    painter.circle_filled(pos, r * (1.15 + 0.25 * glow), with_alpha(base, 0.12 * alpha));
    painter.circle_filled(pos, r, with_alpha(base, 0.85 * alpha));
    let border = if selected {
        palette::SELECTED
    } else {
        with_alpha(Color32::WHITE, 0.4 * alpha)
    };
    painter.circle_stroke(pos, r, Stroke::new(1.5 * opts.stroke_scale, border));
    render_label(painter, &node.label, pos, r, alpha);
}

fn render_submodule(
    painter: &egui::Painter,
    node: &Node,
    g: &SubmoduleGeometry,
    frame: &Frame,
    active: bool,
    alpha: f32,
    opts: &RenderOptions,
) {
    let base = status_color(node, palette::SUBMODULE);
    let band: Vec<Pos2> = (0..=ARC_SEGMENTS)
        .map(|i| {
            let a = g.angle_start + g.span() * i as f32 / ARC_SEGMENTS as f32;
            frame.pt(polar(g.anchor, g.mid_radius(), a))
        })
        .collect();
    let width = frame.len(g.thickness() * node.intro_scale).max(1.0);
    let color = if active {
        lerp_color(base, palette::SELECTED, 0.35)
    } else {
        base
    };
    painter.add(Shape::line(band, Stroke::new(width, with_alpha(color, 0.8 * alpha))));

    // Leaf ticks across the band
    let leaf_alpha = if active { alpha } else { 0.5 * alpha };
    let picked = opts
        .selection
        .subfractal
        .as_ref()
        .filter(|sf| sf.submodule_id == node.id)
        .map(|sf| sf.index);
    for i in 0..g.children.len() {
        let Some(a) = g.leaf_angle(i) else {
            continue;
        };
        let inner = frame.pt(polar(g.anchor, g.shell_inner, a));
        let outer = frame.pt(polar(g.anchor, g.shell_outer, a));
        let (color, w) = if picked == Some(i) {
            (palette::SELECTED, 2.0)
        } else {
            (palette::LEAF, 1.0)
        };
        painter.line_segment(
            [inner, outer],
            Stroke::new(w * opts.stroke_scale, with_alpha(color, leaf_alpha)),
        );
    }
}

fn render_flash(painter: &egui::Painter, node: &Node, frame: &Frame, opts: &RenderOptions) {
    let level = opts.flash.flash_level(&node.id, opts.now_ms);
    if level <= 0.0 {
        return;
    }
    let r = frame.len(node.extent().max(node.radius)) * (1.0 + 0.4 * (1.0 - level));
    painter.circle_stroke(
        frame.pt(node.pos),
        r,
        Stroke::new(2.0 * opts.stroke_scale, with_alpha(palette::RESOLVED, level)),
    );
}

fn render_packets(painter: &egui::Painter, frame: &Frame, opts: &RenderOptions) {
    for sprite in opts.packets {
        if sprite.opacity <= 0.0 {
            continue;
        }
        let n = sprite.trail.len();
        for (i, p) in sprite.trail.iter().enumerate() {
            let fade = (i + 1) as f32 / (n + 1) as f32;
            painter.circle_filled(
                frame.pt(*p),
                sprite.radius * fade,
                with_alpha(sprite.color, 0.5 * fade * sprite.opacity),
            );
        }
        painter.circle_filled(
            frame.pt(sprite.pos),
            sprite.radius,
            with_alpha(sprite.color, sprite.opacity),
        );
    }
}

fn render_label(painter: &egui::Painter, label: &str, pos: Pos2, radius_px: f32, alpha: f32) {
    if radius_px < LABEL_MIN_RADIUS_PX || label.is_empty() {
        return;
    }
    let font_size = (10.0 + radius_px * 0.12).min(16.0);
    painter.text(
        pos,
        Align2::CENTER_CENTER,
        label,
        FontId::proportional(font_size),
        with_alpha(palette::LABEL, alpha),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_color_endpoints() {
        assert_eq!(lerp_color(palette::LINK, palette::LINK_HOT, 0.0), palette::LINK);
        assert_eq!(lerp_color(palette::LINK, palette::LINK_HOT, 1.0), palette::LINK_HOT);
        assert_eq!(lerp_color(palette::LINK, palette::LINK_HOT, 7.0), palette::LINK_HOT);
    }

    #[test]
    fn test_frame_offsets_camera_space() {
        let camera = Camera::default();
        let frame = Frame {
            camera: &camera,
            offset: Vec2::new(10.0, 20.0),
        };
        let p = Pos2::new(5.0, 5.0);
        assert_eq!(frame.pt(p), camera.world_to_screen(p) + Vec2::new(10.0, 20.0));
    }
}

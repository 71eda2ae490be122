//! Hit-testing engine
//!
//! Resolves a screen point against the live scene in a fixed order, first match wins:
//!
//! 1. active leaf arcs of the selected / focused submodule
//! 2. submodule shells (best radial + angular score, scope first)
//! 3. circles (scoped candidates preferred over unscoped)
//! 4. layer rings, then shell fills
//! 5. system root, for anything outside the outermost shell
//!
//! Scope filtering of the *result* (what the click may select) happens afterwards in
//! [`super::selection::resolve_hit`].

use super::camera::Camera;
use super::config::HitTestSettings;
use super::geometry::{
    angle_delta, angle_of, arc_distance, arc_fraction, point_segment_distance, sample_cubic,
};
use super::scene::{HitEntry, HitShape, NodeKind, NodeType, Scene, SubmoduleGeometry};
use super::selection::{InteractionLevel, Scope};
use super::spatial::CircleIndex;
use egui::Pos2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    /// Leaf slice `index` of the active submodule
    Subfractal { index: usize },
    SubmoduleShell,
    Circle,
    Ring,
    ShellFill,
    SystemRoot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub node_id: String,
    pub kind: HitKind,
    pub world: Pos2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkHit {
    pub link_id: String,
    /// World-space distance from the pointer to the sampled curve
    pub distance: f32,
}

/// Per-query inputs beyond scene and camera
#[derive(Debug, Clone, Copy)]
pub struct HitContext<'a> {
    pub scope: Option<&'a Scope>,
    /// Submodule whose leaf arcs are live
    pub active_submodule: Option<&'a str>,
    pub settings: &'a HitTestSettings,
    pub render_threshold: f32,
}

// =============================================================================
// SHELL CONTACT
// =============================================================================

/// Contact between a point and a submodule arc band
#[derive(Debug, Clone, Copy, PartialEq)]
struct ShellContact {
    /// Combined radial + angular error in world units (0 = inside)
    score: f32,
    /// Fraction along the arc when inside it angularly
    fraction: Option<f32>,
    /// Outside the arc, closer to its start than its end
    near_start: bool,
}

fn shell_contact(
    g: &SubmoduleGeometry,
    p: Pos2,
    zoom: f32,
    settings: &HitTestSettings,
) -> Option<ShellContact> {
    // Tolerances are fixed in screen pixels, so they widen in world units as zoom drops
    let zoom = zoom.max(f32::EPSILON);
    let tol_r = settings.radial_tolerance_px / zoom;
    let mid = g.mid_radius().max(f32::EPSILON);
    let tol_a = settings.angular_tolerance_px / zoom / mid;

    let d = p.distance(g.anchor);
    let radial_err = (g.shell_inner - d).max(d - g.shell_outer).max(0.0);
    if radial_err > tol_r {
        return None;
    }
    let angle = angle_of(g.anchor, p);
    let angular_err = arc_distance(angle, g.angle_start, g.angle_end);
    if angular_err > tol_a {
        return None;
    }
    Some(ShellContact {
        score: radial_err + angular_err * mid,
        fraction: arc_fraction(angle, g.angle_start, g.angle_end),
        near_start: angle_delta(angle, g.angle_start).abs() <= angle_delta(angle, g.angle_end).abs(),
    })
}

/// Leaf index under a shell contact
fn leaf_index(contact: &ShellContact, leaves: usize) -> usize {
    match contact.fraction {
        Some(f) => ((f * leaves as f32) as usize).min(leaves - 1),
        None if contact.near_start => 0,
        None => leaves - 1,
    }
}

// =============================================================================
// NODE HIT TEST
// =============================================================================

/// Hit test a screen point
pub fn hit_test(scene: &Scene, camera: &Camera, screen: Pos2, ctx: &HitContext) -> Option<Hit> {
    let world = camera.screen_to_world(screen);
    hit_test_world(scene, camera.zoom, world, ctx)
}

/// Hit test a world point at the given zoom
pub fn hit_test_world(scene: &Scene, zoom: f32, world: Pos2, ctx: &HitContext) -> Option<Hit> {
    if !(world.x.is_finite() && world.y.is_finite()) {
        return None;
    }
    // 1. active leaf arcs
    if let Some(active) = ctx.active_submodule {
        let geometry = scene
            .node(active)
            .filter(|n| n.is_renderable(ctx.render_threshold))
            .and_then(|n| n.as_submodule());
        if let Some(g) = geometry.filter(|g| !g.children.is_empty()) {
            if let Some(contact) = shell_contact(g, world, zoom, ctx.settings) {
                return Some(Hit {
                    node_id: active.to_string(),
                    kind: HitKind::Subfractal {
                        index: leaf_index(&contact, g.children.len()),
                    },
                    world,
                });
            }
        }
    }

    // 2. submodule shells
    let mut best_scoped: Option<(f32, &str)> = None;
    let mut best_any: Option<(f32, &str)> = None;
    for node in &scene.nodes {
        let NodeKind::Submodule(g) = &node.kind else {
            continue;
        };
        if !node.is_renderable(ctx.render_threshold) {
            continue;
        }
        let Some(contact) = shell_contact(g, world, zoom, ctx.settings) else {
            continue;
        };
        let candidate = (contact.score, node.id.as_str());
        if best_any.map_or(true, |(s, _)| contact.score < s) {
            best_any = Some(candidate);
        }
        if ctx.scope.is_some_and(|s| s.contains_node(&node.id))
            && best_scoped.map_or(true, |(s, _)| contact.score < s)
        {
            best_scoped = Some(candidate);
        }
    }
    let shell = if ctx.scope.is_some() {
        best_scoped.or(best_any)
    } else {
        best_any
    };
    if let Some((_, id)) = shell {
        return Some(Hit {
            node_id: id.to_string(),
            kind: HitKind::SubmoduleShell,
            world,
        });
    }

    // 3. circles
    let index = CircleIndex::from_scene(scene, ctx.render_threshold);
    let scoped = ctx.scope.and_then(|scope| {
        index.nearest_containing(world, |e| scope.contains_node(&e.node_id))
    });
    if let Some(entry) = scoped.or_else(|| index.nearest_containing(world, |_| true)) {
        return Some(Hit {
            node_id: entry.node_id.clone(),
            kind: HitKind::Circle,
            world,
        });
    }

    // 4. rings, then shell fills
    for (want_ring, kind) in [(true, HitKind::Ring), (false, HitKind::ShellFill)] {
        if let Some(t) = layer_target(scene, world, want_ring, ctx.render_threshold) {
            return Some(Hit {
                node_id: t.node_id.clone(),
                kind,
                world,
            });
        }
    }

    // 5. system root
    if world.distance(scene.center) > scene.outer_radius {
        return Some(Hit {
            node_id: scene.system_id.clone(),
            kind: HitKind::SystemRoot,
            world,
        });
    }
    None
}

/// Layer ring (or shell fill) containing `world`
fn layer_target(
    scene: &Scene,
    world: Pos2,
    want_ring: bool,
    render_threshold: f32,
) -> Option<&HitEntry> {
    scene.hit_targets.iter().find(|t| {
        let shape_ok = match t.shape {
            HitShape::Ring { .. } => want_ring,
            HitShape::ShellFill { .. } => !want_ring,
            HitShape::Circle { .. } => false,
        };
        shape_ok
            && t.shape.contains(world)
            && scene.node(&t.node_id).is_some_and(|n| {
                n.node_type() == NodeType::Layer && n.is_renderable(render_threshold)
            })
    })
}

// =============================================================================
// LINK HIT TEST
// =============================================================================

/// Nearest link under the pointer, only at module / submodule depth
pub fn hit_test_link(
    scene: &Scene,
    camera: &Camera,
    screen: Pos2,
    threshold_px: f32,
    level: InteractionLevel,
    ctx: &HitContext,
) -> Option<LinkHit> {
    if !level.links_interactive() {
        return None;
    }
    let world = camera.screen_to_world(screen);
    let threshold = threshold_px / camera.zoom.max(f32::EPSILON);
    let samples = ctx.settings.link_samples.max(1);

    let mut best: Option<LinkHit> = None;
    for link in &scene.links {
        if ctx.scope.is_some_and(|s| !s.contains_link(&link.id)) {
            continue;
        }
        let visible = [&link.from_id, &link.to_id].iter().all(|id| {
            scene
                .node(id)
                .is_some_and(|n| n.is_renderable(ctx.render_threshold))
        });
        if !visible {
            continue;
        }
        let points = sample_cubic(&link.points, samples);
        let distance = points
            .windows(2)
            .map(|w| point_segment_distance(world, w[0], w[1]))
            .fold(f32::INFINITY, f32::min);
        if distance <= threshold && best.as_ref().map_or(true, |b| distance < b.distance) {
            best = Some(LinkHit {
                link_id: link.id.clone(),
                distance,
            });
        }
    }
    best
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::geometry::polar;
    use crate::topology::scene::LeafRef;

    fn arc(children: usize) -> SubmoduleGeometry {
        SubmoduleGeometry {
            module_id: "m".into(),
            shell_inner: 20.0,
            shell_outer: 30.0,
            local_start: 0.0,
            local_end: 1.0,
            angle_start: 0.0,
            angle_end: 1.0,
            anchor: Pos2::ZERO,
            children: (0..children)
                .map(|i| LeafRef {
                    id: format!("l{i}"),
                    name: String::new(),
                    path: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_shell_contact_inside_arc() {
        let g = arc(0);
        let s = HitTestSettings::default();
        let p = polar(Pos2::ZERO, 25.0, 0.5);
        let c = shell_contact(&g, p, 1.0, &s).unwrap();
        assert_eq!(c.score, 0.0);
        assert!((c.fraction.unwrap() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_tolerance_widens_as_zoom_drops() {
        let g = arc(0);
        let s = HitTestSettings::default();
        // 10 world units outside the band
        let p = Pos2::new(40.0, 0.1);
        assert!(shell_contact(&g, p, 1.0, &s).is_none());
        assert!(shell_contact(&g, p, 0.5, &s).is_some());
    }

    #[test]
    fn test_leaf_index_by_fraction() {
        let g = arc(4);
        let s = HitTestSettings::default();
        let p = polar(Pos2::ZERO, 25.0, 0.8);
        let c = shell_contact(&g, p, 1.0, &s).unwrap();
        assert_eq!(leaf_index(&c, 4), 3);
        let before = polar(Pos2::ZERO, 25.0, -0.1);
        let c = shell_contact(&g, before, 1.0, &s).unwrap();
        assert_eq!(leaf_index(&c, 4), 0);
    }
}

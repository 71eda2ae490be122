//! Link geometry - cubic control points from live endpoint positions
//!
//! Link shape is a pure function of the two endpoints, the scene center, the link
//! kind and a sign hashed from the link id. Nothing here is stored between frames.

use super::geometry::{hash_sign, perpendicular};
use super::scene::LinkKind;
use egui::Pos2;

/// Bend range for hierarchy / fractal links (world px)
pub const STRUCTURAL_BEND_MIN: f32 = 40.0;
pub const STRUCTURAL_BEND_MAX: f32 = 160.0;
const STRUCTURAL_BEND_FACTOR: f32 = 0.3;

/// Pull toward the center for boundary links
pub const BOUNDARY_CENTER_BIAS: f32 = 0.76;
/// Pull toward the center for everything else
pub const DEFAULT_CENTER_BIAS: f32 = 0.67;

const FLOW_BEND_FACTOR: f32 = 0.12;
const FLOW_BEND_MAX: f32 = 48.0;

pub fn center_bias(kind: LinkKind) -> f32 {
    match kind {
        LinkKind::Ingress | LinkKind::Egress => BOUNDARY_CENTER_BIAS,
        _ => DEFAULT_CENTER_BIAS,
    }
}

/// Control points `p0..p3` for a link between `from` and `to`
pub fn control_points(
    link_id: &str,
    kind: LinkKind,
    from: Pos2,
    to: Pos2,
    center: Pos2,
) -> [Pos2; 4] {
    let sign = hash_sign(link_id);
    let normal = perpendicular(from, to);
    let dist = from.distance(to);

    if kind.is_structural() {
        let bend =
            (dist * STRUCTURAL_BEND_FACTOR).clamp(STRUCTURAL_BEND_MIN, STRUCTURAL_BEND_MAX) * sign;
        let d = to - from;
        return [
            from,
            from + d / 3.0 + normal * bend,
            from + d * (2.0 / 3.0) + normal * bend,
            to,
        ];
    }

    let bias = center_bias(kind);
    let bend = (dist * FLOW_BEND_FACTOR).min(FLOW_BEND_MAX) * sign;
    let c1 = from.lerp(center, bias) + normal * bend;
    let c2 = to.lerp(center, bias) + normal * bend;
    [from, c1, c2, to]
}

/// Endpoint override applied when a leaf inside a submodule is active
#[derive(Debug, Clone, PartialEq)]
pub struct LeafAnchor<'a> {
    pub submodule_id: &'a str,
    pub module_id: &'a str,
    pub position: Pos2,
}

impl LeafAnchor<'_> {
    /// Replace whichever endpoint is the submodule, else whichever is its module
    pub fn apply(&self, from_id: &str, to_id: &str, from: &mut Pos2, to: &mut Pos2) {
        if from_id == self.submodule_id {
            *from = self.position;
        } else if to_id == self.submodule_id {
            *to = self.position;
        } else if from_id == self.module_id {
            *from = self.position;
        } else if to_id == self.module_id {
            *to = self.position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_preserved() {
        let a = Pos2::new(10.0, 20.0);
        let b = Pos2::new(200.0, -40.0);
        for kind in [LinkKind::Flow, LinkKind::Fractal, LinkKind::Ingress] {
            let pts = control_points("a|b|x", kind, a, b, Pos2::ZERO);
            assert_eq!(pts[0], a);
            assert_eq!(pts[3], b);
        }
    }

    #[test]
    fn test_structural_bend_is_bounded() {
        let a = Pos2::new(0.0, 0.0);
        let b = Pos2::new(10.0, 0.0);
        let pts = control_points("short", LinkKind::Hierarchy, a, b, Pos2::ZERO);
        // Horizontal link: perpendicular offset shows up on y
        assert!((pts[1].y.abs() - STRUCTURAL_BEND_MIN).abs() < 1e-4);

        let far = Pos2::new(2000.0, 0.0);
        let pts = control_points("long", LinkKind::Fractal, a, far, Pos2::ZERO);
        assert!((pts[1].y.abs() - STRUCTURAL_BEND_MAX).abs() < 1e-3);
    }

    #[test]
    fn test_flow_controls_hug_center() {
        let center = Pos2::new(0.0, 0.0);
        let a = Pos2::new(100.0, 0.0);
        let b = Pos2::new(0.0, 100.0);
        let flow = control_points("f", LinkKind::Flow, a, b, center);
        let ingress = control_points("f", LinkKind::Ingress, a, b, center);
        // Stronger bias pulls the control points closer to the hub
        assert!(ingress[1].distance(center) < flow[1].distance(center));
    }

    #[test]
    fn test_shape_is_stable_per_id() {
        let a = Pos2::new(5.0, 5.0);
        let b = Pos2::new(80.0, 30.0);
        let first = control_points("m|n|route", LinkKind::Route, a, b, Pos2::ZERO);
        let second = control_points("m|n|route", LinkKind::Route, a, b, Pos2::ZERO);
        assert_eq!(first, second);
    }

    #[test]
    fn test_leaf_anchor_prefers_submodule_endpoint() {
        let anchor = LeafAnchor {
            submodule_id: "sub",
            module_id: "mod",
            position: Pos2::new(1.0, 1.0),
        };
        let mut from = Pos2::ZERO;
        let mut to = Pos2::new(9.0, 9.0);
        anchor.apply("mod", "sub", &mut from, &mut to);
        assert_eq!(from, Pos2::ZERO);
        assert_eq!(to, Pos2::new(1.0, 1.0));

        let mut from = Pos2::ZERO;
        anchor.apply("mod", "other", &mut from, &mut to);
        assert_eq!(from, Pos2::new(1.0, 1.0));
    }
}

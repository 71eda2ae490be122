//! Scene - the positioned, immutable-topology output of the scene builder
//!
//! Topology (which nodes, links and hit targets exist) is fixed per build. Positions,
//! orbit/spin angles, intro scales, link control points and circle hit-target centers
//! are rewritten every frame by the motion pass.

use super::geometry::{cubic_point, polar};
use egui::{Pos2, Rect, Vec2};
use std::collections::{HashMap, HashSet};

// =============================================================================
// VIEWPORT
// =============================================================================

/// Host viewport in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub dpr: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            dpr: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32, dpr: f32) -> Self {
        Self { width, height, dpr }
    }

    pub fn center(&self) -> Pos2 {
        Pos2::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn short_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

// =============================================================================
// NODES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Central hub
    Spine,
    /// System-root boundary
    System,
    Layer,
    Module,
    Submodule,
    IoInput,
    IoOutput,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Spine => "spine",
            NodeType::System => "system",
            NodeType::Layer => "layer",
            NodeType::Module => "module",
            NodeType::Submodule => "submodule",
            NodeType::IoInput => "io_input",
            NodeType::IoOutput => "io_output",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerGeometry {
    /// Ring index, 0 = innermost
    pub index: usize,
    pub ring_radius: f32,
    /// Full band width centered on `ring_radius`
    pub ring_width: f32,
    /// Hash-derived phase offset for module placement
    pub phase: f32,
    /// Signed orbital angular velocity (rad/s)
    pub orbit_speed: f32,
    pub module_ids: Vec<String>,
}

impl LayerGeometry {
    pub fn inner(&self) -> f32 {
        self.ring_radius - self.ring_width / 2.0
    }

    pub fn outer(&self) -> f32 {
        self.ring_radius + self.ring_width / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleGeometry {
    pub layer_id: String,
    pub orbit_radius: f32,
    pub orbit_speed: f32,
    /// Evenly spaced slot angle (phase + slot)
    pub base_angle: f32,
    /// Current orbit angle = base + runtime
    pub orbit_angle: f32,
    pub spin_angle: f32,
    pub spin_speed: f32,
    pub spin_locked: bool,
    /// Outer extent of the module including its submodule shell
    pub footprint: f32,
    pub size_bytes: u64,
    pub submodule_ids: Vec<String>,
}

/// Terminal leaf under a submodule, no geometry of its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRef {
    pub id: String,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmoduleGeometry {
    pub module_id: String,
    pub shell_inner: f32,
    pub shell_outer: f32,
    /// Arc offsets relative to the module orientation (radians)
    pub local_start: f32,
    pub local_end: f32,
    /// Absolute arc angles around the module center, recomputed every frame
    pub angle_start: f32,
    pub angle_end: f32,
    /// Module center the shell wraps
    pub anchor: Pos2,
    pub children: Vec<LeafRef>,
}

impl SubmoduleGeometry {
    pub fn mid_radius(&self) -> f32 {
        (self.shell_inner + self.shell_outer) / 2.0
    }

    pub fn thickness(&self) -> f32 {
        self.shell_outer - self.shell_inner
    }

    pub fn span(&self) -> f32 {
        self.angle_end - self.angle_start
    }

    /// Absolute angle of the middle of leaf `index`'s slice
    pub fn leaf_angle(&self, index: usize) -> Option<f32> {
        let n = self.children.len();
        if index >= n {
            return None;
        }
        Some(self.angle_start + self.span() * (index as f32 + 0.5) / n as f32)
    }

    /// World position of leaf `index` on the shell mid-radius
    pub fn leaf_position(&self, index: usize) -> Option<Pos2> {
        self.leaf_angle(index)
            .map(|a| polar(self.anchor, self.mid_radius(), a))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IoGeometry {
    pub angle: f32,
    pub targets: Vec<String>,
}

/// Type-specific node payload
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Spine,
    System { boundary_radius: f32 },
    Layer(LayerGeometry),
    Module(ModuleGeometry),
    Submodule(SubmoduleGeometry),
    IoInput(IoGeometry),
    IoOutput(IoGeometry),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub path: String,
    /// Ownership edge; `None` for spine/system roots
    pub parent_id: Option<String>,
    pub kind: NodeKind,
    pub pos: Pos2,
    pub radius: f32,
    pub activity: f32,
    pub error: bool,
    pub alert: bool,
    pub changed: bool,
    /// Cosmetic intro ramp `[0, 1]`
    pub intro_scale: f32,
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Spine => NodeType::Spine,
            NodeKind::System { .. } => NodeType::System,
            NodeKind::Layer(_) => NodeType::Layer,
            NodeKind::Module(_) => NodeType::Module,
            NodeKind::Submodule(_) => NodeType::Submodule,
            NodeKind::IoInput(_) => NodeType::IoInput,
            NodeKind::IoOutput(_) => NodeType::IoOutput,
        }
    }

    pub fn as_layer(&self) -> Option<&LayerGeometry> {
        match &self.kind {
            NodeKind::Layer(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleGeometry> {
        match &self.kind {
            NodeKind::Module(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_submodule(&self) -> Option<&SubmoduleGeometry> {
        match &self.kind {
            NodeKind::Submodule(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_io(&self) -> Option<&IoGeometry> {
        match &self.kind {
            NodeKind::IoInput(g) | NodeKind::IoOutput(g) => Some(g),
            _ => None,
        }
    }

    /// Visual extent used for framing (module footprint, shell outer, or radius)
    pub fn extent(&self) -> f32 {
        match &self.kind {
            NodeKind::Module(g) => g.footprint,
            NodeKind::Layer(g) => g.outer(),
            NodeKind::System { boundary_radius } => *boundary_radius,
            _ => self.radius,
        }
    }

    pub fn is_renderable(&self, threshold: f32) -> bool {
        self.intro_scale >= threshold
    }
}

// =============================================================================
// LINKS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Flow,
    Route,
    Ingress,
    Egress,
    Hierarchy,
    Fractal,
    Doctor,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Flow => "flow",
            LinkKind::Route => "route",
            LinkKind::Ingress => "ingress",
            LinkKind::Egress => "egress",
            LinkKind::Hierarchy => "hierarchy",
            LinkKind::Fractal => "fractal",
            LinkKind::Doctor => "doctor",
        }
    }

    /// Ownership-style links drawn as a simple symmetric bend
    pub fn is_structural(&self) -> bool {
        matches!(self, LinkKind::Hierarchy | LinkKind::Fractal)
    }
}

impl std::str::FromStr for LinkKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "route" => Self::Route,
            "ingress" => Self::Ingress,
            "egress" => Self::Egress,
            "hierarchy" => Self::Hierarchy,
            "fractal" => Self::Fractal,
            "doctor" => Self::Doctor,
            _ => Self::Flow,
        })
    }
}

/// Composite link id `from|to|kind`
pub fn link_id(from: &str, to: &str, kind: LinkKind) -> String {
    format!("{from}|{to}|{}", kind.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub kind: LinkKind,
    /// Cubic control points, recomputed every frame from endpoint positions
    pub points: [Pos2; 4],
    pub activity: f32,
    pub error_weight: f32,
    pub blocked_ratio: f32,
    pub flow_blocked: bool,
    /// Normalized packet-size metric `[0, 1]` for this scene
    pub packet_size: f32,
    /// Link changed in the latest snapshot (packets burst)
    pub changed: bool,
}

impl Link {
    pub fn point_at(&self, t: f32) -> Pos2 {
        cubic_point(&self.points, t)
    }

    /// Blocked or carrying a blocked ratio above `threshold`
    pub fn is_degraded(&self, threshold: f32) -> bool {
        self.flow_blocked || self.blocked_ratio > threshold
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from_id == node_id || self.to_id == node_id
    }
}

// =============================================================================
// HIT TARGETS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitShape {
    Circle { center: Pos2, radius: f32 },
    Ring { center: Pos2, inner: f32, outer: f32 },
    /// Same shape as a ring, selects the enclosing layer on empty background
    ShellFill { center: Pos2, inner: f32, outer: f32 },
}

impl HitShape {
    pub fn contains(&self, p: Pos2) -> bool {
        match *self {
            HitShape::Circle { center, radius } => p.distance(center) <= radius,
            HitShape::Ring {
                center,
                inner,
                outer,
            }
            | HitShape::ShellFill {
                center,
                inner,
                outer,
            } => {
                let d = p.distance(center);
                d >= inner && d <= outer
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTarget<'a> {
    pub node_id: &'a str,
    pub shape: HitShape,
}

/// Owned hit-target entry stored in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct HitEntry {
    pub node_id: String,
    pub shape: HitShape,
}

impl HitEntry {
    pub fn as_target(&self) -> HitTarget<'_> {
        HitTarget {
            node_id: &self.node_id,
            shape: self.shape,
        }
    }
}

// =============================================================================
// SCENE
// =============================================================================

#[derive(Debug, Clone)]
pub struct Scene {
    pub center: Pos2,
    /// Outer edge of the outermost shell
    pub outer_radius: f32,
    /// System-root boundary (includes I/O ring and outer margin)
    pub boundary_radius: f32,
    /// Layer ids, innermost first
    pub layers: Vec<String>,
    pub nodes: Vec<Node>,
    pub io_nodes: Vec<String>,
    pub links: Vec<Link>,
    pub hit_targets: Vec<HitEntry>,
    pub node_by_id: HashMap<String, usize>,
    pub link_by_id: HashMap<String, usize>,
    /// Canonical target index per node id
    pub hit_target_by_id: HashMap<String, usize>,
    pub viewport: Viewport,
    pub spine_id: String,
    pub system_id: String,
}

impl Scene {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_by_id.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        match self.node_by_id.get(id) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.link_by_id.get(id).map(|&i| &self.links[i])
    }

    pub fn canonical_target(&self, id: &str) -> Option<HitTarget<'_>> {
        self.hit_target_by_id
            .get(id)
            .map(|&i| self.hit_targets[i].as_target())
    }

    pub fn layer_nodes(&self) -> impl Iterator<Item = (&Node, &LayerGeometry)> {
        self.layers
            .iter()
            .filter_map(|id| self.node(id))
            .filter_map(|n| n.as_layer().map(|g| (n, g)))
    }

    /// Ancestor chain of `id`, nearest first (excluding `id` itself)
    pub fn ancestors(&self, id: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.node(id).and_then(|n| n.parent_id.as_deref());
        while let Some(pid) = current {
            // Tree-shaped by construction; the length guard covers malformed input
            if chain.len() > self.nodes.len() {
                break;
            }
            chain.push(pid);
            current = self.node(pid).and_then(|n| n.parent_id.as_deref());
        }
        chain
    }

    /// Enclosing layer of a node (the node itself if it is a layer)
    pub fn layer_of(&self, id: &str) -> Option<&str> {
        let node = self.node(id)?;
        if node.node_type() == NodeType::Layer {
            return Some(node.id.as_str());
        }
        self.ancestors(id)
            .into_iter()
            .find(|a| self.node(a).map(|n| n.node_type()) == Some(NodeType::Layer))
    }

    /// Owning module of a node (the node itself if it is a module)
    pub fn module_of(&self, id: &str) -> Option<&str> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Module(_) => Some(node.id.as_str()),
            NodeKind::Submodule(g) => Some(g.module_id.as_str()),
            _ => None,
        }
    }

    /// Nodes directly connected to `id` by any link
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.links
            .iter()
            .filter_map(|l| {
                if l.from_id == id {
                    Some(l.to_id.as_str())
                } else if l.to_id == id {
                    Some(l.from_id.as_str())
                } else {
                    None
                }
            })
            .filter(|n| seen.insert(*n))
            .collect()
    }

    /// World-space bounding box of the whole scene (system boundary)
    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.center, Vec2::splat(self.boundary_radius * 2.0))
    }

    pub fn module_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.node_type() == NodeType::Module)
            .count()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_kind_parse() {
        assert_eq!("EGRESS".parse::<LinkKind>().unwrap(), LinkKind::Egress);
        assert_eq!("whatever".parse::<LinkKind>().unwrap(), LinkKind::Flow);
        assert!(LinkKind::Fractal.is_structural());
        assert!(!LinkKind::Route.is_structural());
    }

    #[test]
    fn test_link_id_format() {
        assert_eq!(link_id("a", "b", LinkKind::Doctor), "a|b|doctor");
    }

    #[test]
    fn test_hit_shape_contains() {
        let ring = HitShape::Ring {
            center: Pos2::ZERO,
            inner: 10.0,
            outer: 20.0,
        };
        assert!(ring.contains(Pos2::new(15.0, 0.0)));
        assert!(!ring.contains(Pos2::new(5.0, 0.0)));
        let circle = HitShape::Circle {
            center: Pos2::new(3.0, 4.0),
            radius: 5.0,
        };
        assert!(circle.contains(Pos2::ZERO));
    }

    #[test]
    fn test_leaf_angles_split_the_arc() {
        let geom = SubmoduleGeometry {
            module_id: "m".into(),
            shell_inner: 10.0,
            shell_outer: 14.0,
            local_start: 0.0,
            local_end: 1.0,
            angle_start: 0.0,
            angle_end: 1.0,
            anchor: Pos2::ZERO,
            children: (0..4)
                .map(|i| LeafRef {
                    id: format!("leaf{i}"),
                    name: String::new(),
                    path: String::new(),
                })
                .collect(),
        };
        assert!((geom.leaf_angle(0).unwrap() - 0.125).abs() < 1e-6);
        assert!((geom.leaf_angle(3).unwrap() - 0.875).abs() < 1e-6);
        assert!(geom.leaf_angle(4).is_none());
        let p = geom.leaf_position(0).unwrap();
        assert!((p.distance(Pos2::ZERO) - 12.0).abs() < 1e-4);
    }
}

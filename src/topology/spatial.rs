//! Circle index for pointer hit testing
//!
//! R-tree (via `rstar`) over the scene's circle hit targets in world space. Circle
//! centers move every frame, so the index is rebuilt from the live scene at query
//! time rather than kept in sync.

use super::scene::{HitShape, NodeType, Scene};
use egui::Pos2;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

#[derive(Debug, Clone, PartialEq)]
pub struct CircleEntry {
    pub node_id: String,
    pub node_type: NodeType,
    pub center: Pos2,
    pub radius: f32,
}

impl CircleEntry {
    fn distance_to_center(&self, p: [f32; 2]) -> f32 {
        let dx = p[0] - self.center.x;
        let dy = p[1] - self.center.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl RTreeObject for CircleEntry {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.center.x - self.radius, self.center.y - self.radius],
            [self.center.x + self.radius, self.center.y + self.radius],
        )
    }
}

impl PointDistance for CircleEntry {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let edge = (self.distance_to_center(*point) - self.radius).max(0.0);
        edge * edge
    }

    fn contains_point(&self, point: &[f32; 2]) -> bool {
        self.distance_to_center(*point) <= self.radius
    }
}

#[derive(Clone, Default)]
pub struct CircleIndex {
    tree: RTree<CircleEntry>,
}

impl std::fmt::Debug for CircleIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircleIndex")
            .field("len", &self.tree.size())
            .finish_non_exhaustive()
    }
}

impl CircleIndex {
    pub fn from_entries(entries: impl IntoIterator<Item = CircleEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries.into_iter().collect()),
        }
    }

    /// Index the circle targets of renderable spine / module / submodule / I/O nodes
    pub fn from_scene(scene: &Scene, render_threshold: f32) -> Self {
        let entries = scene.hit_targets.iter().filter_map(|t| {
            let HitShape::Circle { center, radius } = t.shape else {
                return None;
            };
            let node = scene.node(&t.node_id)?;
            if !node.is_renderable(render_threshold) {
                return None;
            }
            let radius = radius * node.intro_scale.min(1.0);
            Some(CircleEntry {
                node_id: t.node_id.clone(),
                node_type: node.node_type(),
                center,
                radius,
            })
        });
        Self::from_entries(entries)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Circles containing `p`, nearest center first
    pub fn containing(&self, p: Pos2) -> Vec<&CircleEntry> {
        let point = [p.x, p.y];
        let mut hits: Vec<&CircleEntry> = self.tree.locate_all_at_point(&point).collect();
        hits.sort_by(|a, b| {
            a.distance_to_center(point)
                .total_cmp(&b.distance_to_center(point))
        });
        hits
    }

    /// Nearest circle containing `p` that passes `filter`
    pub fn nearest_containing(
        &self,
        p: Pos2,
        filter: impl Fn(&CircleEntry) -> bool,
    ) -> Option<&CircleEntry> {
        self.containing(p).into_iter().find(|e| filter(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, x: f32, y: f32, r: f32) -> CircleEntry {
        CircleEntry {
            node_id: id.into(),
            node_type: NodeType::Module,
            center: Pos2::new(x, y),
            radius: r,
        }
    }

    #[test]
    fn test_empty_index() {
        let index = CircleIndex::default();
        assert!(index.is_empty());
        assert!(index.containing(Pos2::ZERO).is_empty());
    }

    #[test]
    fn test_nearest_center_wins_on_overlap() {
        let index = CircleIndex::from_entries(vec![
            entry("big", 0.0, 0.0, 50.0),
            entry("small", 20.0, 0.0, 8.0),
        ]);
        let hit = index.nearest_containing(Pos2::new(22.0, 0.0), |_| true);
        assert_eq!(hit.unwrap().node_id, "small");
        let hit = index.nearest_containing(Pos2::new(-30.0, 0.0), |_| true);
        assert_eq!(hit.unwrap().node_id, "big");
    }

    #[test]
    fn test_filter_skips_candidates() {
        let index = CircleIndex::from_entries(vec![
            entry("a", 0.0, 0.0, 10.0),
            entry("b", 2.0, 0.0, 10.0),
        ]);
        let hit = index.nearest_containing(Pos2::new(2.0, 0.0), |e| e.node_id != "b");
        assert_eq!(hit.unwrap().node_id, "a");
        assert!(index
            .nearest_containing(Pos2::new(40.0, 0.0), |_| true)
            .is_none());
    }
}

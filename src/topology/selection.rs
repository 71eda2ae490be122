//! Selection, scope and interaction-level resolution
//!
//! A selection names at most one node, one link, and optionally a leaf inside a
//! submodule. The *interaction level* derived from it decides what a raw hit may
//! select next:
//!
//! | level     | selectable                                   |
//! |-----------|----------------------------------------------|
//! | Root      | shells                                       |
//! | Shell     | modules of that shell                        |
//! | Module    | submodules of that module                    |
//! | Submodule | sibling submodules, leaves, the parent module |
//!
//! Anything outside the current shell re-targets to its own shell.

use super::hit_test::{Hit, HitKind};
use super::scene::{NodeKind, NodeType, Scene};
use std::collections::HashSet;

// =============================================================================
// SELECTION
// =============================================================================

/// Leaf ("subfractal") inside a submodule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubfractalRef {
    pub submodule_id: String,
    pub index: usize,
    pub leaf_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub node_id: Option<String>,
    pub link_id: Option<String>,
    pub subfractal: Option<SubfractalRef>,
}

impl Selection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn node(id: impl Into<String>) -> Self {
        Self {
            node_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node_id.is_none() && self.link_id.is_none() && self.subfractal.is_none()
    }

    /// Drop references that no longer resolve against `scene`; returns true if
    /// anything was cleared
    pub fn validate(&mut self, scene: &Scene) -> bool {
        let before = self.clone();

        if let Some(id) = &self.node_id {
            if scene.node(id).is_none() {
                tracing::debug!(node = %id, "dangling selection cleared");
                self.node_id = None;
            }
        }
        if let Some(id) = &self.link_id {
            if scene.link(id).is_none() {
                tracing::debug!(link = %id, "dangling link selection cleared");
                self.link_id = None;
            }
        }
        if let Some(sf) = self.subfractal.take() {
            self.subfractal = revalidate_leaf(scene, sf);
        }

        *self != before
    }

    /// Current interaction level
    pub fn level(&self, scene: &Scene) -> InteractionLevel {
        if self.subfractal.is_some() {
            return InteractionLevel::Submodule;
        }
        let Some(node) = self.node_id.as_deref().and_then(|id| scene.node(id)) else {
            return InteractionLevel::Root;
        };
        match node.node_type() {
            NodeType::Layer => InteractionLevel::Shell,
            NodeType::Module => InteractionLevel::Module,
            NodeType::Submodule => InteractionLevel::Submodule,
            _ => InteractionLevel::Root,
        }
    }

    /// Submodule the active leaf (or selected submodule) belongs to
    pub fn active_submodule<'a>(&'a self, scene: &Scene) -> Option<&'a str> {
        if let Some(sf) = &self.subfractal {
            return Some(sf.submodule_id.as_str());
        }
        let id = self.node_id.as_deref()?;
        (scene.node(id)?.node_type() == NodeType::Submodule).then_some(id)
    }
}

/// Keep a leaf reference valid, re-finding the leaf by id if its index moved
fn revalidate_leaf(scene: &Scene, sf: SubfractalRef) -> Option<SubfractalRef> {
    let geometry = scene.node(&sf.submodule_id)?.as_submodule()?;
    if geometry
        .children
        .get(sf.index)
        .is_some_and(|leaf| leaf.id == sf.leaf_id)
    {
        return Some(sf);
    }
    let index = geometry.children.iter().position(|l| l.id == sf.leaf_id)?;
    Some(SubfractalRef { index, ..sf })
}

// =============================================================================
// INTERACTION LEVEL
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InteractionLevel {
    Root,
    Shell,
    Module,
    Submodule,
}

impl InteractionLevel {
    /// Links only become interactive once drilled into a module
    pub fn links_interactive(&self) -> bool {
        *self >= InteractionLevel::Module
    }
}

// =============================================================================
// SCOPE
// =============================================================================

/// Induced node / link set kept fully visible and interactive for a selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub nodes: HashSet<String>,
    pub links: HashSet<String>,
}

impl Scope {
    /// Scope of a selected node; `None` means unscoped (everything interactive)
    pub fn for_node(scene: &Scene, id: &str) -> Option<Scope> {
        let node = scene.node(id)?;
        match &node.kind {
            NodeKind::Layer(g) => {
                let mut nodes: HashSet<String> = HashSet::new();
                nodes.insert(node.id.clone());
                for mid in &g.module_ids {
                    nodes.insert(mid.clone());
                    if let Some(m) = scene.node(mid).and_then(|n| n.as_module()) {
                        nodes.extend(m.submodule_ids.iter().cloned());
                    }
                }
                let links = scene
                    .links
                    .iter()
                    .filter(|l| nodes.contains(&l.from_id) && nodes.contains(&l.to_id))
                    .map(|l| l.id.clone())
                    .collect();
                Some(Scope { nodes, links })
            }
            NodeKind::Module(_) | NodeKind::Submodule(_) => {
                let module_id = scene.module_of(id)?;
                let module = scene.node(module_id)?.as_module()?;
                let mut core: HashSet<String> = HashSet::new();
                core.insert(module_id.to_string());
                core.extend(module.submodule_ids.iter().cloned());

                let mut nodes = core.clone();
                let mut links = HashSet::new();
                for link in &scene.links {
                    if core.contains(&link.from_id) || core.contains(&link.to_id) {
                        links.insert(link.id.clone());
                        nodes.insert(link.from_id.clone());
                        nodes.insert(link.to_id.clone());
                    }
                }
                Some(Scope { nodes, links })
            }
            _ => None,
        }
    }

    /// Scope of the current selection
    pub fn for_selection(scene: &Scene, selection: &Selection) -> Option<Scope> {
        let id = selection
            .subfractal
            .as_ref()
            .map(|sf| sf.submodule_id.as_str())
            .or(selection.node_id.as_deref())?;
        Self::for_node(scene, id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_link(&self, id: &str) -> bool {
        self.links.contains(id)
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// What a click should select given the current level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub node_id: String,
    pub subfractal: Option<SubfractalRef>,
}

impl Resolved {
    fn node(id: &str) -> Self {
        Self {
            node_id: id.to_string(),
            subfractal: None,
        }
    }
}

/// Map a raw hit to the node selectable at the current interaction level
pub fn resolve_hit(scene: &Scene, current: &Selection, hit: &Hit) -> Option<Resolved> {
    let hit_node = scene.node(&hit.node_id)?;
    let hit_layer = scene.layer_of(&hit.node_id);

    // Hub, system root and I/O nodes sit outside every shell
    let Some(hit_layer) = hit_layer else {
        return Some(Resolved::node(&hit_node.id));
    };
    let shell_of_hit = Resolved::node(hit_layer);

    let resolved = match current.level(scene) {
        InteractionLevel::Root => shell_of_hit,
        InteractionLevel::Shell => {
            let selected = current.node_id.as_deref().unwrap_or_default();
            if hit_layer != selected {
                shell_of_hit
            } else {
                match scene.module_of(&hit_node.id) {
                    Some(module_id) => Resolved::node(module_id),
                    None => shell_of_hit,
                }
            }
        }
        InteractionLevel::Module => {
            let selected = current.node_id.as_deref().unwrap_or_default();
            let selected_layer = scene.layer_of(selected);
            match &hit_node.kind {
                NodeKind::Submodule(g) if g.module_id == selected => Resolved::node(&hit_node.id),
                NodeKind::Module(_) if hit_node.id == selected => Resolved::node(selected),
                _ if selected_layer == Some(hit_layer) => Resolved::node(hit_layer),
                _ => shell_of_hit,
            }
        }
        InteractionLevel::Submodule => {
            let active = current.active_submodule(scene).unwrap_or_default();
            let module_id = scene.module_of(active).unwrap_or_default();
            match &hit_node.kind {
                NodeKind::Submodule(g) if hit_node.id == active => match hit.kind {
                    HitKind::Subfractal { index } => {
                        let leaf_id = g.children.get(index).map(|l| l.id.clone())?;
                        Resolved {
                            node_id: hit_node.id.clone(),
                            subfractal: Some(SubfractalRef {
                                submodule_id: hit_node.id.clone(),
                                index,
                                leaf_id,
                            }),
                        }
                    }
                    _ => Resolved::node(&hit_node.id),
                },
                NodeKind::Submodule(g) if g.module_id == module_id => Resolved::node(&hit_node.id),
                NodeKind::Module(_) if hit_node.id == module_id => Resolved::node(module_id),
                _ => shell_of_hit,
            }
        }
    };
    Some(resolved)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::config::LayoutSettings;
    use crate::topology::layout::{build_scene, SceneState};
    use crate::topology::quality::QualityProfile;
    use crate::topology::scene::Viewport;
    use crate::topology::snapshot::{
        LayerSnapshot, LeafSnapshot, LinkSnapshot, ModuleSnapshot, Snapshot, SubmoduleSnapshot,
    };
    use egui::Pos2;

    fn scene() -> Scene {
        let sub = |name: &str, leaves: usize| SubmoduleSnapshot {
            id: Some(name.into()),
            name: name.into(),
            children: (0..leaves)
                .map(|i| LeafSnapshot {
                    id: Some(format!("{name}/leaf{i}")),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let snapshot = Snapshot {
            layers: vec![
                LayerSnapshot {
                    id: Some("L1".into()),
                    name: "core".into(),
                    modules: vec![
                        ModuleSnapshot {
                            id: Some("M1".into()),
                            submodules: vec![sub("S1", 3), sub("S2", 0)],
                            ..Default::default()
                        },
                        ModuleSnapshot {
                            id: Some("M2".into()),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                },
                LayerSnapshot {
                    id: Some("L2".into()),
                    name: "ui".into(),
                    modules: vec![ModuleSnapshot {
                        id: Some("M3".into()),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            links: vec![LinkSnapshot {
                from: "M1".into(),
                to: "M3".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        build_scene(
            &snapshot,
            &QualityProfile::default(),
            Viewport::default(),
            0.0,
            &mut SceneState::default(),
            &LayoutSettings::default(),
        )
        .unwrap()
    }

    fn hit(id: &str, kind: HitKind) -> Hit {
        Hit {
            node_id: id.into(),
            kind,
            world: Pos2::ZERO,
        }
    }

    #[test]
    fn test_root_level_selects_shells() {
        let scene = scene();
        let r = resolve_hit(&scene, &Selection::none(), &hit("S1", HitKind::SubmoduleShell));
        assert_eq!(r.unwrap().node_id, "L1");
    }

    #[test]
    fn test_shell_level_selects_its_modules_only() {
        let scene = scene();
        let sel = Selection::node("L1");
        assert_eq!(
            resolve_hit(&scene, &sel, &hit("S2", HitKind::SubmoduleShell))
                .unwrap()
                .node_id,
            "M1"
        );
        assert_eq!(
            resolve_hit(&scene, &sel, &hit("M3", HitKind::Circle))
                .unwrap()
                .node_id,
            "L2"
        );
    }

    #[test]
    fn test_module_level_selects_its_submodules() {
        let scene = scene();
        let sel = Selection::node("M1");
        assert_eq!(
            resolve_hit(&scene, &sel, &hit("S1", HitKind::SubmoduleShell))
                .unwrap()
                .node_id,
            "S1"
        );
        // Sibling module falls back to the shell
        assert_eq!(
            resolve_hit(&scene, &sel, &hit("M2", HitKind::Circle))
                .unwrap()
                .node_id,
            "L1"
        );
    }

    #[test]
    fn test_submodule_level_resolves_leaf() {
        let scene = scene();
        let sel = Selection::node("S1");
        let r = resolve_hit(&scene, &sel, &hit("S1", HitKind::Subfractal { index: 2 })).unwrap();
        let sf = r.subfractal.unwrap();
        assert_eq!(sf.leaf_id, "S1/leaf2");
        assert_eq!(sf.index, 2);
        assert_eq!(
            resolve_hit(&scene, &sel, &hit("S2", HitKind::SubmoduleShell))
                .unwrap()
                .node_id,
            "S2"
        );
    }

    #[test]
    fn test_validate_clears_dangling_references() {
        let scene = scene();
        let mut sel = Selection {
            node_id: Some("gone".into()),
            link_id: Some("M1|M3|flow".into()),
            subfractal: Some(SubfractalRef {
                submodule_id: "S1".into(),
                index: 9,
                leaf_id: "S1/leaf1".into(),
            }),
        };
        assert!(sel.validate(&scene));
        assert_eq!(sel.node_id, None);
        assert_eq!(sel.link_id.as_deref(), Some("M1|M3|flow"));
        assert_eq!(sel.subfractal.as_ref().unwrap().index, 1);

        let mut stale_leaf = Selection {
            subfractal: Some(SubfractalRef {
                submodule_id: "S1".into(),
                index: 0,
                leaf_id: "nope".into(),
            }),
            ..Default::default()
        };
        assert!(stale_leaf.validate(&scene));
        assert!(stale_leaf.subfractal.is_none());
    }

    #[test]
    fn test_module_scope_includes_neighbors() {
        let scene = scene();
        let scope = Scope::for_node(&scene, "S1").unwrap();
        assert!(scope.contains_node("M1"));
        assert!(scope.contains_node("S2"));
        assert!(scope.contains_node("M3"));
        assert!(!scope.contains_node("M2"));
        assert!(scope.contains_link("M1|M3|flow"));
        assert!(Scope::for_node(&scene, "spine").is_none());
    }

    #[test]
    fn test_links_interactive_only_when_drilled_in() {
        assert!(!InteractionLevel::Shell.links_interactive());
        assert!(InteractionLevel::Module.links_interactive());
    }
}

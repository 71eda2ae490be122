//! Scene builder - radial layout from a topology snapshot
//!
//! Shells (layers) are concentric rings around a central hub. Modules sit evenly on
//! their ring, submodules are angular shell segments around their module, and I/O
//! boundary nodes live on a ring outside the outermost shell.
//!
//! Two pieces of state are sticky across builds and live in [`SceneState`]: the
//! layer-order lock and the orbit/spin runtime tables.

use super::config::LayoutSettings;
use super::geometry::{hash_sign, hash_unit, lerp};
use super::motion::{apply_positions, RuntimeTables};
use super::quality::QualityProfile;
use super::scene::{
    link_id, HitEntry, HitShape, IoGeometry, LayerGeometry, LeafRef, Link, LinkKind,
    ModuleGeometry, Node, NodeKind, Scene, SubmoduleGeometry, Viewport,
};
use super::snapshot::{IoDirection, LayerSnapshot, ModuleSnapshot, Snapshot, StatusFlags};
use egui::Pos2;
use std::collections::{HashMap, HashSet};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Token-equivalent of one message when a link only reports counts
const TOKENS_PER_MESSAGE: f64 = 64.0;

/// Endpoint contributions to a link's error weight
const ERROR_ENDPOINT_WEIGHT: f32 = 0.7;
const ALERT_ENDPOINT_WEIGHT: f32 = 0.45;
const DOCTOR_BONUS: f32 = 0.2;
const FLOW_BLOCKED_FLOOR: f32 = 0.5;

pub const SPINE_ID: &str = "spine";

// =============================================================================
// LAYER ORDER LOCK
// =============================================================================

/// Hysteresis on the rendered layer order
///
/// A reorder of the same layer set is only accepted once `cooldown_ms` has passed
/// since the previous accepted order. Membership changes are accepted immediately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerOrderLock {
    order: Vec<String>,
    last_swap_ms: Option<f64>,
}

impl LayerOrderLock {
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn last_swap_ms(&self) -> Option<f64> {
        self.last_swap_ms
    }

    /// Resolve the order to render given the desired order
    pub fn resolve(&mut self, desired: Vec<String>, now_ms: f64, cooldown_ms: f64) -> Vec<String> {
        if desired == self.order {
            return desired;
        }

        let same_members = desired.len() == self.order.len() && {
            let current: HashSet<&String> = self.order.iter().collect();
            desired.iter().all(|id| current.contains(id))
        };

        if same_members {
            if let Some(last) = self.last_swap_ms {
                if now_ms - last < cooldown_ms {
                    tracing::debug!(
                        elapsed_ms = now_ms - last,
                        "layer reorder suppressed by order lock"
                    );
                    return self.order.clone();
                }
            }
        }

        self.order = desired.clone();
        self.last_swap_ms = Some(now_ms);
        desired
    }
}

/// Sticky layout state carried between builds
#[derive(Debug, Clone, Default)]
pub struct SceneState {
    pub order_lock: LayerOrderLock,
    pub runtime: RuntimeTables,
}

// =============================================================================
// LAYER RANKING
// =============================================================================

/// Content score used to rank layers
pub fn layer_score(layer: &LayerSnapshot, submodule_weight: f32) -> f32 {
    layer.modules.len() as f32 + submodule_weight * layer.submodule_count() as f32
}

/// Index of the first priority fragment contained in the layer name
fn priority_rank(name: &str, priority: &[String]) -> usize {
    let lower = name.to_lowercase();
    priority
        .iter()
        .position(|p| lower.contains(p.as_str()))
        .unwrap_or(priority.len())
}

/// Desired inner-to-outer layer order: score desc, priority table, then name
pub fn rank_layers<'a>(
    layers: &'a [LayerSnapshot],
    settings: &LayoutSettings,
    max_layers: usize,
) -> Vec<&'a LayerSnapshot> {
    let mut ranked: Vec<&LayerSnapshot> = layers.iter().collect();
    ranked.sort_by(|a, b| {
        let sa = layer_score(a, settings.submodule_score_weight);
        let sb = layer_score(b, settings.submodule_score_weight);
        sb.total_cmp(&sa)
            .then_with(|| {
                priority_rank(&a.name, &settings.layer_priority)
                    .cmp(&priority_rank(&b.name, &settings.layer_priority))
            })
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(max_layers);
    ranked
}

/// Keep the largest modules when a layer is over its ceiling, in original order
fn cap_modules(modules: &[ModuleSnapshot], max: usize) -> Vec<&ModuleSnapshot> {
    if modules.len() <= max {
        return modules.iter().collect();
    }
    let mut by_size: Vec<usize> = (0..modules.len()).collect();
    by_size.sort_by(|&a, &b| {
        modules[b]
            .size_bytes
            .cmp(&modules[a].size_bytes)
            .then_with(|| modules[b].submodules.len().cmp(&modules[a].submodules.len()))
            .then_with(|| a.cmp(&b))
    });
    let mut keep: Vec<usize> = by_size.into_iter().take(max).collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| &modules[i]).collect()
}

// =============================================================================
// SIZING
// =============================================================================

/// Module radius blending submodule density with codebase size
pub fn module_radius(
    submodules: usize,
    size_bytes: u64,
    size_range: (u64, u64),
    settings: &LayoutSettings,
) -> f32 {
    let fractal = settings.fractal_base_radius + settings.fractal_growth * (submodules as f32).sqrt();
    let (lo, hi) = size_range;
    let norm = if hi > lo {
        (size_bytes.saturating_sub(lo)) as f32 / (hi - lo) as f32
    } else {
        0.5
    };
    let size = lerp(settings.module_min_radius, settings.module_max_radius, norm);
    let blended = settings.fractal_blend * fractal + (1.0 - settings.fractal_blend) * size;
    blended.clamp(settings.module_min_radius, settings.module_max_radius)
}

/// Submodule shell `(inner, outer)` around a module of radius `r`
pub fn shell_extent(r: f32, settings: &LayoutSettings) -> (f32, f32) {
    let inner = r + settings.shell_gap;
    let thickness = (r * settings.shell_thickness_ratio).max(settings.shell_min_thickness);
    (inner, inner + thickness)
}

/// Per-layer sizing input to the ring solver
#[derive(Debug, Clone, Copy)]
struct RingDemand {
    modules: usize,
    max_footprint: f32,
}

/// Ring radii and band widths, innermost first, before fitting
fn solve_rings(demands: &[RingDemand], settings: &LayoutSettings) -> Vec<(f32, f32)> {
    let mut rings: Vec<(f32, f32)> = Vec::with_capacity(demands.len());
    let single = demands.len() <= 1;

    for (i, d) in demands.iter().enumerate() {
        let fp = d.max_footprint;
        let width = 2.0 * fp + settings.ring_stroke;

        let mut radius = settings.hub_radius + fp + settings.ring_margin;
        if d.modules >= 2 {
            let chord = 2.0 * fp + settings.ring_margin;
            radius = radius.max(chord / (2.0 * (PI / d.modules as f32).sin()));
        }
        if !single {
            radius = radius.max(settings.hub_radius + settings.ring_base_spacing * (i + 1) as f32);
            if let Some(&(prev_r, _)) = rings.last() {
                let prev_fp = demands[i - 1].max_footprint;
                radius = radius
                    .max(prev_r + prev_fp + fp + settings.ring_stroke + settings.ring_margin);
            }
        }
        rings.push((radius, width));
    }
    rings
}

/// Outer edge of the outermost ring
fn rings_extent(rings: &[(f32, f32)]) -> f32 {
    rings.last().map(|(r, w)| r + w / 2.0).unwrap_or(0.0)
}

// =============================================================================
// BUILD
// =============================================================================

struct PlannedModule<'a> {
    snap: &'a ModuleSnapshot,
    id: String,
    radius: f32,
    shell: Option<(f32, f32)>,
    /// Unique submodules with their resolved ids
    submodules: Vec<(&'a super::snapshot::SubmoduleSnapshot, String)>,
}

impl PlannedModule<'_> {
    fn footprint(&self) -> f32 {
        self.shell.map(|(_, outer)| outer).unwrap_or(self.radius)
    }
}

struct PlannedLayer<'a> {
    snap: &'a LayerSnapshot,
    id: String,
    modules: Vec<PlannedModule<'a>>,
}

/// Build a positioned scene, or `None` when the snapshot has no layers to show
pub fn build_scene(
    snapshot: &Snapshot,
    profile: &QualityProfile,
    viewport: Viewport,
    now_ms: f64,
    state: &mut SceneState,
    settings: &LayoutSettings,
) -> Option<Scene> {
    if !snapshot.has_topology() || viewport.width <= 0.0 || viewport.height <= 0.0 {
        return None;
    }

    // 1-2. rank, then apply the order lock
    let ranked = rank_layers(&snapshot.layers, settings, profile.max_layers);
    if ranked.is_empty() {
        return None;
    }
    let desired: Vec<String> = ranked.iter().map(|l| l.resolved_id()).collect();
    let order = state
        .order_lock
        .resolve(desired, now_ms, settings.order_lock_cooldown_ms);
    let by_id: HashMap<String, &LayerSnapshot> =
        ranked.iter().map(|l| (l.resolved_id(), *l)).collect();

    // 3. cap and size modules
    let capped: Vec<(String, &LayerSnapshot, Vec<&ModuleSnapshot>)> = order
        .iter()
        .filter_map(|id| by_id.get(id).map(|l| (id.clone(), *l)))
        .map(|(id, l)| {
            let modules = cap_modules(&l.modules, profile.max_modules_per_layer);
            (id, l, modules)
        })
        .collect();

    let (min_bytes, max_bytes) = capped
        .iter()
        .flat_map(|(_, _, ms)| ms.iter().map(|m| m.size_bytes))
        .fold((u64::MAX, 0u64), |(lo, hi), b| (lo.min(b), hi.max(b)));
    let size_range = if min_bytes > max_bytes {
        (0, 0)
    } else {
        (min_bytes, max_bytes)
    };

    let mut seen_ids: HashSet<String> = HashSet::new();
    let planned: Vec<PlannedLayer> = capped
        .into_iter()
        .map(|(id, snap, modules)| {
            let modules = modules
                .into_iter()
                .filter_map(|m| {
                    let mid = m.resolved_id();
                    if !seen_ids.insert(mid.clone()) {
                        tracing::debug!(module = %mid, "duplicate module id dropped");
                        return None;
                    }
                    let submodules: Vec<_> = m
                        .submodules
                        .iter()
                        .take(profile.max_submodules_per_module)
                        .filter_map(|sub| {
                            let sid = sub.resolved_id();
                            if seen_ids.insert(sid.clone()) {
                                Some((sub, sid))
                            } else {
                                tracing::debug!(submodule = %sid, "duplicate submodule id dropped");
                                None
                            }
                        })
                        .collect();
                    let radius = module_radius(submodules.len(), m.size_bytes, size_range, settings);
                    let shell = (!submodules.is_empty()).then(|| shell_extent(radius, settings));
                    Some(PlannedModule {
                        snap: m,
                        id: mid,
                        radius,
                        shell,
                        submodules,
                    })
                })
                .collect();
            PlannedLayer { snap, id, modules }
        })
        .collect();

    // 4. ring solve, then fit to the canvas
    let demands: Vec<RingDemand> = planned
        .iter()
        .map(|l| RingDemand {
            modules: l.modules.len(),
            max_footprint: l
                .modules
                .iter()
                .map(|m| m.footprint())
                .fold(settings.module_min_radius, f32::max),
        })
        .collect();
    let mut rings = solve_rings(&demands, settings);

    let available = (viewport.short_side() / 2.0
        - settings.viewport_margin
        - settings.io_ring_margin
        - settings.io_node_radius)
        .max(settings.hub_radius * 2.0);
    let extent = rings_extent(&rings);
    let mut scale = 1.0;
    if extent > available {
        scale = available / extent;
        for ring in rings.iter_mut() {
            ring.0 *= scale;
            ring.1 *= scale;
        }
    } else if extent > 0.0 {
        let slack = (available - extent) * settings.slack_fill;
        let total: f32 = (1..=rings.len()).map(|w| w as f32).sum();
        let mut acc = 0.0;
        for (i, ring) in rings.iter_mut().enumerate() {
            acc += (i + 1) as f32;
            ring.0 += slack * acc / total;
        }
    }

    let center = viewport.center();
    let hub_radius = settings.hub_radius * scale;
    let outer_radius = rings_extent(&rings);
    let io_radius = outer_radius + settings.io_ring_margin;
    let boundary_radius =
        (outer_radius + settings.outer_fill_margin).max(io_radius + settings.io_node_radius);

    let system_id = snapshot.system.id.clone();
    let mut nodes: Vec<Node> = Vec::new();
    let mut hit_targets: Vec<HitEntry> = Vec::new();

    nodes.push(Node {
        id: SPINE_ID.to_string(),
        label: snapshot.system.name.clone(),
        path: String::new(),
        parent_id: None,
        kind: NodeKind::Spine,
        pos: center,
        radius: hub_radius,
        activity: 0.0,
        error: false,
        alert: false,
        changed: false,
        intro_scale: 1.0,
    });
    hit_targets.push(HitEntry {
        node_id: SPINE_ID.to_string(),
        shape: HitShape::Circle {
            center,
            radius: hub_radius,
        },
    });
    nodes.push(Node {
        id: system_id.clone(),
        label: snapshot.system.name.clone(),
        path: String::new(),
        parent_id: None,
        kind: NodeKind::System { boundary_radius },
        pos: center,
        radius: boundary_radius,
        activity: 0.0,
        error: false,
        alert: false,
        changed: false,
        intro_scale: 1.0,
    });
    hit_targets.push(HitEntry {
        node_id: system_id.clone(),
        shape: HitShape::Ring {
            center,
            inner: outer_radius,
            outer: boundary_radius,
        },
    });

    // 5. place layers, modules and submodules
    let mut layer_ids = Vec::with_capacity(planned.len());
    let mut fractal_links: Vec<(String, String, f32)> = Vec::new();
    let mut prev_outer = hub_radius;

    for (index, (layer, &(ring_radius, ring_width))) in planned.iter().zip(rings.iter()).enumerate() {
        let phase = hash_unit(&layer.id) * TAU;
        let orbit_speed = lerp(
            settings.orbit_speed_min,
            settings.orbit_speed_max,
            hash_unit(&format!("{}#orbit", layer.id)),
        ) * hash_sign(&format!("{}#orbit-dir", layer.id));
        let n = layer.modules.len();

        let geometry = LayerGeometry {
            index,
            ring_radius,
            ring_width,
            phase,
            orbit_speed,
            module_ids: layer.modules.iter().map(|m| m.id.clone()).collect(),
        };
        let inner = geometry.inner();
        let outer = geometry.outer();

        nodes.push(status_node(
            &layer.id,
            &layer.snap.name,
            &layer.snap.path,
            Some(system_id.clone()),
            NodeKind::Layer(geometry),
            center,
            ring_radius,
            &layer.snap.status,
        ));
        hit_targets.push(HitEntry {
            node_id: layer.id.clone(),
            shape: HitShape::Ring {
                center,
                inner,
                outer,
            },
        });
        // 6. empty annulus between this shell and the previous one
        hit_targets.push(HitEntry {
            node_id: layer.id.clone(),
            shape: HitShape::ShellFill {
                center,
                inner: prev_outer.min(inner),
                outer: inner,
            },
        });
        if index + 1 == planned.len() {
            hit_targets.push(HitEntry {
                node_id: layer.id.clone(),
                shape: HitShape::ShellFill {
                    center,
                    inner: outer,
                    outer: outer + settings.outer_fill_margin,
                },
            });
        }
        prev_outer = outer;

        for (j, module) in layer.modules.iter().enumerate() {
            let base_angle = phase + TAU * j as f32 / n.max(1) as f32;
            let radius = module.radius * scale;
            let shell = module.shell.map(|(i, o)| (i * scale, o * scale));
            let footprint = shell.map(|(_, o)| o).unwrap_or(radius);
            let spin_speed = lerp(
                settings.spin_speed_min,
                settings.spin_speed_max,
                hash_unit(&format!("{}#spin", module.id)),
            ) * hash_sign(&format!("{}#spin-dir", module.id));

            let submodule_ids: Vec<String> =
                module.submodules.iter().map(|(_, id)| id.clone()).collect();
            let pos = super::geometry::polar(center, ring_radius, base_angle);

            nodes.push(status_node(
                &module.id,
                &module.snap.name,
                &module.snap.path,
                Some(layer.id.clone()),
                NodeKind::Module(ModuleGeometry {
                    layer_id: layer.id.clone(),
                    orbit_radius: ring_radius,
                    orbit_speed,
                    base_angle,
                    orbit_angle: base_angle,
                    spin_angle: 0.0,
                    spin_speed,
                    spin_locked: false,
                    footprint,
                    size_bytes: module.snap.size_bytes,
                    submodule_ids: submodule_ids.clone(),
                }),
                pos,
                radius,
                &module.snap.status,
            ));
            hit_targets.push(HitEntry {
                node_id: module.id.clone(),
                shape: HitShape::Circle {
                    center: pos,
                    radius,
                },
            });

            let Some((shell_inner, shell_outer)) = shell else {
                continue;
            };
            let count = module.submodules.len();
            let slice = settings.submodule_arc_span / count as f32;
            let pad = slice * settings.submodule_slice_pad;
            for (k, (sub, sub_id)) in module.submodules.iter().enumerate() {
                let sub_id = sub_id.clone();
                let local_start = -settings.submodule_arc_span / 2.0 + k as f32 * slice + pad;
                let local_end = local_start + slice - 2.0 * pad;
                let children = sub
                    .children
                    .iter()
                    .map(|c| LeafRef {
                        id: c.resolved_id(),
                        name: c.name.clone(),
                        path: c.path.clone(),
                    })
                    .collect();
                let thickness = shell_outer - shell_inner;
                nodes.push(status_node(
                    &sub_id,
                    &sub.name,
                    &sub.path,
                    Some(module.id.clone()),
                    NodeKind::Submodule(SubmoduleGeometry {
                        module_id: module.id.clone(),
                        shell_inner,
                        shell_outer,
                        local_start,
                        local_end,
                        angle_start: base_angle + local_start,
                        angle_end: base_angle + local_end,
                        anchor: pos,
                        children,
                    }),
                    pos,
                    thickness / 2.0,
                    &sub.status,
                ));
                hit_targets.push(HitEntry {
                    node_id: sub_id.clone(),
                    shape: HitShape::Circle {
                        center: pos,
                        radius: thickness / 2.0,
                    },
                });
                fractal_links.push((module.id.clone(), sub_id, sub.status.activity));
            }
        }
        layer_ids.push(layer.id.clone());
    }

    // I/O boundary ring: inputs on the left half, outputs on the right
    let inputs: Vec<_> = snapshot
        .io_nodes
        .iter()
        .filter(|io| io.direction == IoDirection::Input)
        .collect();
    let outputs: Vec<_> = snapshot
        .io_nodes
        .iter()
        .filter(|io| io.direction == IoDirection::Output)
        .collect();
    let mut io_ids = Vec::new();
    for (group, base) in [(&inputs, FRAC_PI_2), (&outputs, -FRAC_PI_2)] {
        let n = group.len();
        for (k, io) in group.iter().enumerate() {
            if io.id.is_empty() || !seen_ids.insert(io.id.clone()) {
                tracing::debug!(io = %io.id, "io node without a unique id dropped");
                continue;
            }
            let angle = base + PI * (k + 1) as f32 / (n + 1) as f32;
            let pos = super::geometry::polar(center, io_radius, angle);
            let geometry = IoGeometry {
                angle,
                targets: io.targets.clone(),
            };
            let kind = match io.direction {
                IoDirection::Input => NodeKind::IoInput(geometry),
                IoDirection::Output => NodeKind::IoOutput(geometry),
            };
            nodes.push(Node {
                id: io.id.clone(),
                label: io.name.clone(),
                path: String::new(),
                parent_id: Some(system_id.clone()),
                kind,
                pos,
                radius: settings.io_node_radius,
                activity: io.activity,
                error: false,
                alert: false,
                changed: false,
                intro_scale: 1.0,
            });
            hit_targets.push(HitEntry {
                node_id: io.id.clone(),
                shape: HitShape::Circle {
                    center: pos,
                    radius: settings.io_node_radius,
                },
            });
            io_ids.push(io.id.clone());
        }
    }

    let node_by_id: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();
    // First target registered per node is canonical
    let mut hit_target_by_id: HashMap<String, usize> = HashMap::new();
    for (i, t) in hit_targets.iter().enumerate() {
        hit_target_by_id.entry(t.node_id.clone()).or_insert(i);
    }

    // 7. links
    let links = build_links(snapshot, &nodes, &node_by_id, fractal_links, &io_ids);
    let link_by_id = links
        .iter()
        .enumerate()
        .map(|(i, l)| (l.id.clone(), i))
        .collect();

    let mut scene = Scene {
        center,
        outer_radius,
        boundary_radius,
        layers: layer_ids,
        nodes,
        io_nodes: io_ids,
        links,
        hit_targets,
        node_by_id,
        link_by_id,
        hit_target_by_id,
        viewport,
        spine_id: SPINE_ID.to_string(),
        system_id,
    };

    // Runtime tables only keep ids that still exist
    let layer_set: HashSet<&str> = scene.layers.iter().map(String::as_str).collect();
    let module_set: HashSet<&str> = scene
        .nodes
        .iter()
        .filter(|n| n.as_module().is_some())
        .map(|n| n.id.as_str())
        .collect();
    state.runtime.retain(&layer_set, &module_set);

    apply_positions(&mut scene, &state.runtime, None);

    tracing::debug!(
        layers = scene.layers.len(),
        nodes = scene.nodes.len(),
        links = scene.links.len(),
        scale,
        "scene built"
    );
    Some(scene)
}

#[allow(clippy::too_many_arguments)]
fn status_node(
    id: &str,
    label: &str,
    path: &str,
    parent_id: Option<String>,
    kind: NodeKind,
    pos: Pos2,
    radius: f32,
    status: &StatusFlags,
) -> Node {
    Node {
        id: id.to_string(),
        label: label.to_string(),
        path: path.to_string(),
        parent_id,
        kind,
        pos,
        radius,
        activity: status.activity.clamp(0.0, 1.0),
        error: status.error,
        alert: status.alert,
        changed: status.changed,
        intro_scale: 1.0,
    }
}

// =============================================================================
// LINKS
// =============================================================================

struct LinkDraft {
    from: String,
    to: String,
    kind: LinkKind,
    activity: f32,
    error_hint: Option<f32>,
    blocked_ratio: f32,
    flow_blocked: bool,
    size_metric: f64,
    changed: bool,
}

fn build_links(
    snapshot: &Snapshot,
    nodes: &[Node],
    node_by_id: &HashMap<String, usize>,
    fractal: Vec<(String, String, f32)>,
    io_ids: &[String],
) -> Vec<Link> {
    let mut drafts: Vec<LinkDraft> = snapshot
        .links
        .iter()
        .map(|l| LinkDraft {
            from: l.from.clone(),
            to: l.to.clone(),
            kind: l
                .kind
                .as_deref()
                .and_then(|k| k.parse().ok())
                .unwrap_or(LinkKind::Flow),
            activity: l.activity,
            error_hint: l.error_hint,
            blocked_ratio: l.blocked_ratio,
            flow_blocked: l.flow_blocked,
            size_metric: l
                .tokens
                .or_else(|| l.count.map(|c| c * TOKENS_PER_MESSAGE))
                .unwrap_or(0.0),
            changed: l.changed,
        })
        .collect();

    drafts.extend(fractal.into_iter().map(|(from, to, activity)| LinkDraft {
        from,
        to,
        kind: LinkKind::Fractal,
        activity,
        error_hint: None,
        blocked_ratio: 0.0,
        flow_blocked: false,
        size_metric: 0.0,
        changed: false,
    }));

    let io_set: HashSet<&str> = io_ids.iter().map(String::as_str).collect();
    for io in snapshot.io_nodes.iter().filter(|io| io_set.contains(io.id.as_str())) {
        for target in &io.targets {
            let (from, to, kind) = match io.direction {
                IoDirection::Input => (io.id.clone(), target.clone(), LinkKind::Ingress),
                IoDirection::Output => (target.clone(), io.id.clone(), LinkKind::Egress),
            };
            drafts.push(LinkDraft {
                from,
                to,
                kind,
                activity: io.activity,
                error_hint: None,
                blocked_ratio: 0.0,
                flow_blocked: false,
                size_metric: 0.0,
                changed: false,
            });
        }
    }

    // Drop links with missing endpoints or duplicate ids
    let mut seen = HashSet::new();
    let drafts: Vec<LinkDraft> = drafts
        .into_iter()
        .filter(|d| {
            let valid = node_by_id.contains_key(&d.from) && node_by_id.contains_key(&d.to);
            if !valid {
                tracing::debug!(from = %d.from, to = %d.to, "link dropped: missing endpoint");
                return false;
            }
            seen.insert(link_id(&d.from, &d.to, d.kind))
        })
        .collect();

    let metrics: Vec<f32> = drafts
        .iter()
        .map(|d| (d.size_metric.max(0.0)).ln_1p() as f32)
        .collect();
    let lo = metrics.iter().copied().fold(f32::INFINITY, f32::min);
    let hi = metrics.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    drafts
        .into_iter()
        .zip(metrics)
        .map(|(d, m)| {
            let packet_size = if hi > lo { (m - lo) / (hi - lo) } else { 0.5 };
            let from = &nodes[node_by_id[&d.from]];
            let to = &nodes[node_by_id[&d.to]];
            let blocked_ratio = d.blocked_ratio.clamp(0.0, 1.0);
            let activity = d.activity.clamp(0.0, 1.0);
            let error_weight = error_weight(&d, from, to, activity, blocked_ratio);
            let pts = [from.pos, from.pos, to.pos, to.pos];
            Link {
                id: link_id(&d.from, &d.to, d.kind),
                from_id: d.from,
                to_id: d.to,
                kind: d.kind,
                points: pts,
                activity,
                error_weight,
                blocked_ratio,
                flow_blocked: d.flow_blocked,
                packet_size,
                changed: d.changed,
            }
        })
        .collect()
}

fn endpoint_weight(node: &Node) -> f32 {
    if node.error {
        ERROR_ENDPOINT_WEIGHT
    } else if node.alert {
        ALERT_ENDPOINT_WEIGHT
    } else {
        0.0
    }
}

fn error_weight(d: &LinkDraft, from: &Node, to: &Node, activity: f32, blocked: f32) -> f32 {
    let mut w = endpoint_weight(from).max(endpoint_weight(to));
    if let Some(hint) = d.error_hint {
        w = w.max(hint.clamp(0.0, 1.0));
    }
    if d.kind == LinkKind::Doctor {
        w += DOCTOR_BONUS;
    }
    // Busy links read slightly hotter
    w *= 0.85 + 0.15 * activity;
    w = w.max(blocked);
    if d.flow_blocked {
        w = w.max(FLOW_BLOCKED_FLOOR);
    }
    w.clamp(0.0, 1.0)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::scene::NodeType;
    use crate::topology::snapshot::{
        IoSnapshot, LeafSnapshot, LinkSnapshot, SubmoduleSnapshot,
    };

    fn module(name: &str, subs: usize, size: u64) -> ModuleSnapshot {
        ModuleSnapshot {
            name: name.into(),
            path: format!("src/{name}"),
            size_bytes: size,
            submodules: (0..subs)
                .map(|k| SubmoduleSnapshot {
                    name: format!("{name}_s{k}"),
                    path: format!("src/{name}/s{k}"),
                    children: vec![LeafSnapshot {
                        name: format!("leaf{k}.rs"),
                        ..Default::default()
                    }],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn layer(name: &str, modules: Vec<ModuleSnapshot>) -> LayerSnapshot {
        LayerSnapshot {
            name: name.into(),
            path: format!("src/{name}"),
            modules,
            ..Default::default()
        }
    }

    fn sample() -> Snapshot {
        Snapshot {
            layers: vec![
                layer("core", vec![module("a", 2, 1000), module("b", 1, 4000)]),
                layer(
                    "api",
                    vec![module("c", 0, 200), module("d", 3, 900), module("e", 2, 50)],
                ),
            ],
            links: vec![
                LinkSnapshot {
                    from: "module:src/a".into(),
                    to: "module:src/c".into(),
                    kind: Some("route".into()),
                    tokens: Some(1200.0),
                    ..Default::default()
                },
                LinkSnapshot {
                    from: "module:src/a".into(),
                    to: "module:missing".into(),
                    ..Default::default()
                },
            ],
            io_nodes: vec![
                IoSnapshot {
                    id: "io:in".into(),
                    direction: IoDirection::Input,
                    targets: vec!["module:src/b".into()],
                    ..Default::default()
                },
                IoSnapshot {
                    id: "io:out".into(),
                    direction: IoDirection::Output,
                    targets: vec!["module:src/d".into()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn build(snapshot: &Snapshot, state: &mut SceneState, now: f64) -> Scene {
        build_scene(
            snapshot,
            &QualityProfile::default(),
            Viewport::new(1200.0, 900.0, 1.0),
            now,
            state,
            &LayoutSettings::default(),
        )
        .expect("scene")
    }

    #[test]
    fn test_empty_snapshot_builds_nothing() {
        let mut state = SceneState::default();
        let scene = build_scene(
            &Snapshot::default(),
            &QualityProfile::default(),
            Viewport::default(),
            0.0,
            &mut state,
            &LayoutSettings::default(),
        );
        assert!(scene.is_none());
    }

    #[test]
    fn test_links_with_missing_endpoints_are_dropped() {
        let scene = build(&sample(), &mut SceneState::default(), 0.0);
        for link in &scene.links {
            assert!(scene.node_by_id.contains_key(&link.from_id));
            assert!(scene.node_by_id.contains_key(&link.to_id));
        }
        assert!(scene.link("module:src/a|module:src/c|route").is_some());
        assert!(scene.links.iter().all(|l| l.to_id != "module:missing"));
    }

    #[test]
    fn test_synthetic_links() {
        let scene = build(&sample(), &mut SceneState::default(), 0.0);
        let fractal = scene
            .links
            .iter()
            .filter(|l| l.kind == LinkKind::Fractal)
            .count();
        assert_eq!(fractal, 2 + 1 + 3 + 2);
        assert!(scene.link("io:in|module:src/b|ingress").is_some());
        assert!(scene.link("module:src/d|io:out|egress").is_some());
    }

    #[test]
    fn test_io_nodes_sit_on_their_half() {
        let scene = build(&sample(), &mut SceneState::default(), 0.0);
        let input = scene.node("io:in").unwrap();
        let output = scene.node("io:out").unwrap();
        assert!(input.pos.x < scene.center.x);
        assert!(output.pos.x > scene.center.x);
        assert!(input.pos.distance(scene.center) > scene.outer_radius);
    }

    #[test]
    fn test_ring_order_is_by_score() {
        let scene = build(&sample(), &mut SceneState::default(), 0.0);
        // api: 3 modules + 0.55 * 5; core: 2 + 0.55 * 3
        assert_eq!(scene.layers, vec!["layer:src/api", "layer:src/core"]);
    }

    #[test]
    fn test_every_node_has_canonical_target() {
        let scene = build(&sample(), &mut SceneState::default(), 0.0);
        for node in &scene.nodes {
            assert!(
                scene.canonical_target(&node.id).is_some(),
                "missing target for {}",
                node.id
            );
        }
    }

    #[test]
    fn test_modules_inside_their_ring() {
        let scene = build(&sample(), &mut SceneState::default(), 0.0);
        for (_, g) in scene.layer_nodes() {
            for id in &g.module_ids {
                let m = scene.node(id).unwrap();
                let d = m.pos.distance(scene.center);
                assert!(d - m.radius >= g.inner() - 1e-3);
                assert!(d + m.radius <= g.outer() + 1e-3);
            }
        }
    }

    #[test]
    fn test_submodules_hang_off_their_module() {
        let scene = build(&sample(), &mut SceneState::default(), 0.0);
        let sub = scene
            .nodes
            .iter()
            .find(|n| n.node_type() == NodeType::Submodule)
            .unwrap();
        let g = sub.as_submodule().unwrap();
        let module = scene.node(&g.module_id).unwrap();
        assert_eq!(g.anchor, module.pos);
        assert!((sub.pos.distance(module.pos) - g.mid_radius()).abs() < 1e-3);
        assert_eq!(g.children.len(), 1);
    }

    #[test]
    fn test_order_lock_hysteresis() {
        let mut lock = LayerOrderLock::default();
        let ab = vec!["a".to_string(), "b".to_string()];
        let ba = vec!["b".to_string(), "a".to_string()];
        assert_eq!(lock.resolve(ab.clone(), 0.0, 1000.0), ab);
        assert_eq!(lock.resolve(ba.clone(), 500.0, 1000.0), ab);
        assert_eq!(lock.resolve(ba.clone(), 1500.0, 1000.0), ba);
    }

    #[test]
    fn test_order_lock_accepts_membership_change() {
        let mut lock = LayerOrderLock::default();
        lock.resolve(vec!["a".into(), "b".into()], 0.0, 1000.0);
        let abc = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(lock.resolve(abc.clone(), 10.0, 1000.0), abc);
    }

    #[test]
    fn test_module_radius_is_clamped() {
        let s = LayoutSettings::default();
        let tiny = module_radius(0, 0, (0, 1000), &s);
        let huge = module_radius(400, 1000, (0, 1000), &s);
        assert!(tiny >= s.module_min_radius);
        assert!((huge - s.module_max_radius).abs() < 1e-6);
    }

    #[test]
    fn test_single_layer_still_builds() {
        let snap = Snapshot {
            layers: vec![layer("core", vec![module("solo", 0, 10)])],
            ..Default::default()
        };
        let scene = build(&snap, &mut SceneState::default(), 0.0);
        assert_eq!(scene.layers.len(), 1);
        assert_eq!(scene.module_count(), 1);
    }

    #[test]
    fn test_duplicate_submodules_leave_no_dangling_ids() {
        let shared = || SubmoduleSnapshot {
            id: Some("shared".into()),
            ..Default::default()
        };
        let mut first = module("a", 0, 10);
        first.submodules = vec![shared(), shared()];
        let mut second = module("b", 0, 10);
        second.submodules = vec![shared()];
        let snap = Snapshot {
            layers: vec![layer("core", vec![first, second])],
            ..Default::default()
        };
        let scene = build(&snap, &mut SceneState::default(), 0.0);

        for node in &scene.nodes {
            if let Some(g) = node.as_module() {
                for id in &g.submodule_ids {
                    assert!(scene.node(id).is_some(), "{} lists missing {}", node.id, id);
                }
            }
        }
        let a = scene.node("module:src/a").unwrap();
        assert_eq!(a.as_module().unwrap().submodule_ids, vec!["shared".to_string()]);
        // One slice spanning the whole local arc
        let s = LayoutSettings::default();
        let sub = scene.node("shared").unwrap().as_submodule().unwrap();
        let full = s.submodule_arc_span * (1.0 - 2.0 * s.submodule_slice_pad);
        assert!((sub.local_end - sub.local_start - full).abs() < 1e-4);
        let b = scene.node("module:src/b").unwrap();
        assert!(b.as_module().unwrap().submodule_ids.is_empty());
        assert_eq!(b.as_module().unwrap().footprint, b.radius);
    }

    #[test]
    fn test_error_weight_reflects_blocked_floor() {
        let mut snap = sample();
        snap.links[0].blocked_ratio = 0.8;
        let scene = build(&snap, &mut SceneState::default(), 0.0);
        let link = scene.link("module:src/a|module:src/c|route").unwrap();
        assert!(link.error_weight >= 0.8);
        assert_eq!(link.packet_size, 1.0);
    }
}

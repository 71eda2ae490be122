//! Snapshot document - the hierarchical topology delivered by the snapshot provider
//!
//! The provider's wire format is its own business; this module only defines the
//! structured shape the scene builder consumes. Every field is optional on the wire
//! and falls back to a neutral default so partial documents still build a scene.

use super::error::SnapshotError;
use serde::{Deserialize, Serialize};

// =============================================================================
// ROOT
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// System-root descriptor (label for the outer boundary)
    pub system: SystemSnapshot,
    pub layers: Vec<LayerSnapshot>,
    pub links: Vec<LinkSnapshot>,
    pub io_nodes: Vec<IoSnapshot>,
    pub runtime: RuntimeSnapshot,
}

impl Snapshot {
    /// Decode a snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Ok(snapshot)
    }

    /// Decode and reject documents with no layers
    pub fn from_json_strict(json: &str) -> Result<Self, SnapshotError> {
        let snapshot = Self::from_json(json)?;
        if !snapshot.has_topology() {
            return Err(SnapshotError::EmptyTopology);
        }
        Ok(snapshot)
    }

    pub fn has_topology(&self) -> bool {
        !self.layers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSnapshot {
    pub id: String,
    pub name: String,
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self {
            id: "system".into(),
            name: "system".into(),
        }
    }
}

// =============================================================================
// HIERARCHY
// =============================================================================

/// Health / change flags shared by every hierarchical item
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusFlags {
    /// Recent activity in `[0, 1]`
    pub activity: f32,
    pub error: bool,
    pub alert: bool,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSnapshot {
    pub id: Option<String>,
    pub name: String,
    pub path: String,
    #[serde(flatten)]
    pub status: StatusFlags,
    pub modules: Vec<ModuleSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSnapshot {
    pub id: Option<String>,
    pub name: String,
    pub path: String,
    /// Source size, drives the codebase-size half of the module radius
    pub size_bytes: u64,
    #[serde(flatten)]
    pub status: StatusFlags,
    pub submodules: Vec<SubmoduleSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmoduleSnapshot {
    pub id: Option<String>,
    pub name: String,
    pub path: String,
    #[serde(flatten)]
    pub status: StatusFlags,
    /// Terminal "subfractal" leaves
    pub children: Vec<LeafSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafSnapshot {
    pub id: Option<String>,
    pub name: String,
    pub path: String,
}

/// Stable id for a hierarchical item: explicit id, else `role:path`, else `role:name`
pub(crate) fn derive_id(role: &str, id: &Option<String>, path: &str, name: &str) -> String {
    match id {
        Some(id) if !id.is_empty() => id.clone(),
        _ if !path.is_empty() => format!("{role}:{path}"),
        _ => format!("{role}:{name}"),
    }
}

impl LayerSnapshot {
    pub fn resolved_id(&self) -> String {
        derive_id("layer", &self.id, &self.path, &self.name)
    }

    pub fn submodule_count(&self) -> usize {
        self.modules.iter().map(|m| m.submodules.len()).sum()
    }
}

impl ModuleSnapshot {
    pub fn resolved_id(&self) -> String {
        derive_id("module", &self.id, &self.path, &self.name)
    }
}

impl SubmoduleSnapshot {
    pub fn resolved_id(&self) -> String {
        derive_id("submodule", &self.id, &self.path, &self.name)
    }
}

impl LeafSnapshot {
    pub fn resolved_id(&self) -> String {
        derive_id("leaf", &self.id, &self.path, &self.name)
    }
}

// =============================================================================
// LINKS / IO
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSnapshot {
    pub from: String,
    pub to: String,
    /// flow | route | ingress | egress | hierarchy | fractal | doctor
    pub kind: Option<String>,
    pub activity: f32,
    /// Explicit error hint from the provider, `[0, 1]`
    pub error_hint: Option<f32>,
    pub blocked_ratio: f32,
    pub flow_blocked: bool,
    /// Token volume carried (preferred packet-size metric)
    pub tokens: Option<f64>,
    /// Message count (proxy when tokens are absent)
    pub count: Option<f64>,
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoDirection {
    #[default]
    Input,
    Output,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSnapshot {
    pub id: String,
    pub name: String,
    pub direction: IoDirection,
    /// Nodes this boundary endpoint feeds (input) or drains (output)
    pub targets: Vec<String>,
    pub activity: f32,
}

// =============================================================================
// RUNTIME STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    #[default]
    Online,
    Stale,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSnapshot {
    pub status: RuntimeState,
    /// Age of the newest runtime signal
    pub signal_age_ms: Option<f64>,
    /// Provider-side flow multiplier
    pub activity_scale: f32,
}

impl Default for RuntimeSnapshot {
    fn default() -> Self {
        Self {
            status: RuntimeState::Online,
            signal_age_ms: None,
            activity_scale: 1.0,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "layers": [{
            "name": "core",
            "path": "src/core",
            "activity": 0.4,
            "modules": [{
                "name": "io",
                "path": "src/core/io",
                "size_bytes": 2048,
                "error": true,
                "submodules": [{ "name": "fs", "children": [{ "name": "read.rs" }] }]
            }]
        }],
        "links": [{ "from": "module:src/core/io", "to": "x", "kind": "route", "blocked_ratio": 0.5 }],
        "io_nodes": [{ "id": "io:http", "direction": "input", "targets": ["module:src/core/io"] }],
        "runtime": { "status": "stale", "activity_scale": 0.5 }
    }"#;

    #[test]
    fn test_decode_sample() {
        let snap = Snapshot::from_json(SAMPLE).unwrap();
        assert_eq!(snap.layers.len(), 1);
        let layer = &snap.layers[0];
        assert_eq!(layer.resolved_id(), "layer:src/core");
        assert!((layer.status.activity - 0.4).abs() < 1e-6);
        let module = &layer.modules[0];
        assert!(module.status.error);
        assert_eq!(module.resolved_id(), "module:src/core/io");
        assert_eq!(module.submodules[0].resolved_id(), "submodule:fs");
        assert_eq!(snap.runtime.status, RuntimeState::Stale);
        assert_eq!(snap.io_nodes[0].direction, IoDirection::Input);
        assert_eq!(layer.submodule_count(), 1);
    }

    #[test]
    fn test_empty_document_defaults() {
        let snap = Snapshot::from_json("{}").unwrap();
        assert!(!snap.has_topology());
        assert_eq!(snap.runtime.activity_scale, 1.0);
        assert!(matches!(
            Snapshot::from_json_strict("{}"),
            Err(SnapshotError::EmptyTopology)
        ));
    }

    #[test]
    fn test_explicit_id_wins() {
        let leaf = LeafSnapshot {
            id: Some("leaf-7".into()),
            name: "x".into(),
            path: "a/b".into(),
        };
        assert_eq!(leaf.resolved_id(), "leaf-7");
    }
}

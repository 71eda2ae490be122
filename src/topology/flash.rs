//! Resolved-error flash timers
//!
//! Keyed by node id. A node that was in error in the previous snapshot and is clean in
//! the current one gets a timestamp; the renderer fades a highlight from it.

use super::scene::Scene;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct FlashTimers {
    resolved_at: HashMap<String, f64>,
    last_errors: HashSet<String>,
    window_ms: f64,
}

impl FlashTimers {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            ..Default::default()
        }
    }

    /// Record errors that cleared since the previous scene
    pub fn observe(&mut self, scene: &Scene, now_ms: f64) {
        let current: HashSet<String> = scene
            .nodes
            .iter()
            .filter(|n| n.error)
            .map(|n| n.id.clone())
            .collect();

        for id in self.last_errors.difference(&current) {
            if scene.node(id).is_some() {
                self.resolved_at.insert(id.clone(), now_ms);
            }
        }
        self.resolved_at.retain(|id, _| !current.contains(id));
        self.last_errors = current;
        self.prune(now_ms);
    }

    /// Highlight strength `[0, 1]`, decaying linearly over the window
    pub fn flash_level(&self, id: &str, now_ms: f64) -> f32 {
        let Some(&at) = self.resolved_at.get(id) else {
            return 0.0;
        };
        if self.window_ms <= 0.0 {
            return 0.0;
        }
        (1.0 - (now_ms - at) / self.window_ms).clamp(0.0, 1.0) as f32
    }

    pub fn prune(&mut self, now_ms: f64) {
        let window = self.window_ms;
        self.resolved_at.retain(|_, at| now_ms - *at < window);
    }

    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.resolved_at.keys().map(String::as_str)
    }
}

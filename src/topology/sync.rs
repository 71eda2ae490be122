//! Async-boundary helpers: stale-response guard and reconnect backoff
//!
//! Snapshots and lookups arrive out of band relative to the frame loop. Nothing here
//! does I/O; these types only decide whether a result still applies and how long to
//! wait before reconnecting the push channel.

use super::config::ReconnectSettings;
use std::time::Duration;

/// Request-id guard for pending lookups
///
/// Cancellation is advisory: a response is simply discarded when its id is no longer
/// the latest or its target no longer matches the current focus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupGuard {
    next_id: u64,
    pending: Option<(u64, String)>,
}

impl LookupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new request id for `target`, superseding any pending one
    pub fn issue(&mut self, target: impl Into<String>) -> u64 {
        self.next_id += 1;
        self.pending = Some((self.next_id, target.into()));
        self.next_id
    }

    /// Whether a response for `id` may be applied given the current focus
    pub fn accept(&self, id: u64, current_focus: Option<&str>) -> bool {
        match (&self.pending, current_focus) {
            (Some((latest, target)), Some(focus)) => *latest == id && target == focus,
            _ => false,
        }
    }

    /// Accept and clear in one step
    pub fn complete(&mut self, id: u64, current_focus: Option<&str>) -> bool {
        let ok = self.accept(id, current_focus);
        if ok {
            self.pending = None;
        } else {
            tracing::debug!(request = id, "stale lookup response discarded");
        }
        ok
    }

    pub fn pending_target(&self) -> Option<&str> {
        self.pending.as_ref().map(|(_, t)| t.as_str())
    }
}

/// Exponential reconnect backoff with a cap
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectBackoff {
    base: Duration,
    factor: f64,
    cap: Duration,
    attempt: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::from_settings(&ReconnectSettings::default())
    }
}

impl ReconnectBackoff {
    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            base: Duration::from_millis(settings.base_ms),
            factor: settings.factor.max(1.0),
            cap: Duration::from_millis(settings.cap_ms),
            attempt: 0,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next reconnect attempt
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.factor.powi(self.attempt.min(64) as i32);
        let ms = (self.base.as_millis() as f64 * exp).min(self.cap.as_millis() as f64);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(ms as u64)
    }

    /// Call once the channel is healthy again
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_latest_request_applies() {
        let mut guard = LookupGuard::new();
        let first = guard.issue("M1");
        let second = guard.issue("M2");
        assert!(!guard.accept(first, Some("M1")));
        assert!(guard.accept(second, Some("M2")));
        // Focus moved on before the response arrived
        assert!(!guard.accept(second, Some("M3")));
        assert!(guard.complete(second, Some("M2")));
        assert!(guard.pending_target().is_none());
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let mut backoff = ReconnectBackoff::default();
        let delays: Vec<u64> = (0..10).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(&delays[..4], &[500, 1000, 2000, 4000]);
        assert_eq!(*delays.last().unwrap(), 30_000);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }
}

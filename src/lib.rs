//! Orbital topology radar
//!
//! Layout, camera, hit-testing and packet-flow engine for a radial system map drawn
//! with egui. No app shell and no transport: hosts feed snapshots in and paint out.

pub mod topology;

pub use topology::{
    // Orchestrator
    RadarAction,
    TopologyRadar,
    // Input document
    RuntimeSnapshot,
    RuntimeState,
    Snapshot,
    // Scene
    Link,
    LinkKind,
    Node,
    NodeKind,
    NodeType,
    Scene,
    Viewport,
    // Camera and interaction
    Camera,
    CameraView,
    Hit,
    HitKind,
    InteractionLevel,
    Scope,
    Selection,
    SubfractalRef,
    // Settings
    QualityProfile,
    QualityTier,
    RadarSettings,
};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Returns false when a global subscriber is already set.
pub fn init_tracing() -> bool {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

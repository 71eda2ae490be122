//! Radial topology radar
//!
//! Lays a layered system out as concentric shells of orbiting modules, keeps it moving
//! frame to frame, and maps pointer input back onto it.
//!
//! # Architecture
//!
//! ```text
//! Snapshot (from provider)
//!        │
//!        ▼
//! build_scene (ranking, order lock, ring solve, links)
//!        │
//!        ▼
//! Scene (nodes, links, hit targets)
//!        │
//!        ├──► MotionPass (orbit / spin / intro, link control points)
//!        ├──► ParticleSystem (packets along links)
//!        ├──► render::paint_scene (egui::Painter)
//!        │
//!        └──► hit_test / resolve_hit (pointer input)
//!                    │
//!                    ▼
//!              Camera (pan/zoom, focus + map return points)
//! ```
//!
//! [`TopologyRadar`] ties the pieces together in frame order.
//!
//! # Usage
//!
//! ```ignore
//! let mut radar = TopologyRadar::new(Viewport::new(w, h, dpr), QualityTier::Medium);
//! radar.apply_snapshot(Snapshot::from_json(&body)?, now_ms);
//! radar.frame(now_ms);
//! radar.paint(&painter, rect, now_ms);
//! ```

pub mod camera;
pub mod config;
pub mod error;
pub mod flash;
pub mod geometry;
pub mod hit_test;
pub mod layout;
pub mod links;
pub mod motion;
pub mod particles;
pub mod quality;
pub mod radar;
pub mod render;
pub mod scene;
pub mod selection;
pub mod snapshot;
pub mod spatial;
pub mod sync;

pub use camera::{Camera, CameraView, TransitionOptions};
pub use config::{global_settings, RadarSettings};
pub use error::{CameraError, CameraResult, ConfigError, SnapshotError};
pub use flash::FlashTimers;
pub use hit_test::{hit_test, hit_test_link, Hit, HitContext, HitKind, LinkHit};
pub use layout::{build_scene, LayerOrderLock, SceneState};
pub use motion::{MotionPass, RuntimeTables};
pub use particles::{Packet, PacketSprite, ParticleSystem};
pub use quality::{QualityProfile, QualityTier};
pub use radar::{RadarAction, TopologyRadar};
pub use scene::{HitShape, Link, LinkKind, Node, NodeKind, NodeType, Scene, Viewport};
pub use selection::{resolve_hit, InteractionLevel, Scope, Selection, SubfractalRef};
pub use snapshot::{RuntimeSnapshot, RuntimeState, Snapshot};
pub use sync::{LookupGuard, ReconnectBackoff};

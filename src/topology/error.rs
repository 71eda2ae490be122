//! Error types
//!
//! Nothing here is user-fatal: snapshot and config errors leave the previous scene in
//! place, camera errors leave the previous view in place.

use thiserror::Error;

/// Errors decoding a topology snapshot document
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("snapshot has no topology (0 layers)")]
    EmptyTopology,
}

/// Errors from camera operations. Every variant means "no-op, prior view kept".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CameraError {
    #[error("non-finite camera target: zoom={zoom}, pan=({pan_x}, {pan_y})")]
    NonFinite { zoom: f32, pan_x: f32, pan_y: f32 },

    #[error("degenerate bounds for framing: {0}")]
    DegenerateBounds(String),

    #[error("node not found in scene: {0}")]
    UnknownNode(String),

    #[error("node {id} is not a {expected}")]
    WrongNodeType { id: String, expected: &'static str },

    #[error("nothing to restore: {0}")]
    NothingToRestore(&'static str),
}

/// Errors loading radar settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings decode failed: {0}")]
    Decode(#[from] serde_yaml::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type for camera operations
pub type CameraResult<T> = Result<T, CameraError>;

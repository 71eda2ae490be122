//! Geometry utilities - angles, arcs, bezier curves, easing, stable hashing
//!
//! Everything here is pure. Angles are radians, positions are
//! world-space `egui::Pos2`.

use egui::{Pos2, Vec2};
use std::f32::consts::{PI, TAU};

// =============================================================================
// ANGLES
// =============================================================================

/// Normalize an angle into `[0, TAU)`
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let a = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if a >= TAU {
        0.0
    } else {
        a
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-PI, PI]`
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let d = normalize_angle(to - from);
    if d > PI {
        d - TAU
    } else {
        d
    }
}

/// Angle of `point` as seen from `center`
pub fn angle_of(center: Pos2, point: Pos2) -> f32 {
    let d = point - center;
    d.y.atan2(d.x)
}

/// Point at `radius` / `angle` around `center`
pub fn polar(center: Pos2, radius: f32, angle: f32) -> Pos2 {
    Pos2::new(
        center.x + radius * angle.cos(),
        center.y + radius * angle.sin(),
    )
}

// =============================================================================
// ARCS
// =============================================================================

/// Fraction along the arc sweeping counter-clockwise (increasing angle) from `start`
/// to `end`. Returns `None` if `angle` lies outside the arc.
pub fn arc_fraction(angle: f32, start: f32, end: f32) -> Option<f32> {
    let span = end - start;
    if span.is_nan() || span <= 0.0 {
        return None;
    }
    if span >= TAU {
        return Some(normalize_angle(angle - start) / TAU);
    }
    let offset = normalize_angle(angle - start);
    if offset <= span {
        Some(offset / span)
    } else {
        None
    }
}

/// Angular distance from `angle` to the arc `[start, end]` (0 when inside)
pub fn arc_distance(angle: f32, start: f32, end: f32) -> f32 {
    if arc_fraction(angle, start, end).is_some() {
        return 0.0;
    }
    angle_delta(angle, start)
        .abs()
        .min(angle_delta(angle, end).abs())
}

// =============================================================================
// CURVES
// =============================================================================

/// Point on a cubic bezier at parameter `t`
pub fn cubic_point(points: &[Pos2; 4], t: f32) -> Pos2 {
    let t = t.clamp(0.0, 1.0);
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    Pos2::new(
        points[0].x * a + points[1].x * b + points[2].x * c + points[3].x * d,
        points[0].y * a + points[1].y * b + points[2].y * c + points[3].y * d,
    )
}

/// Sample a cubic bezier at `segments + 1` evenly spaced parameters
pub fn sample_cubic(points: &[Pos2; 4], segments: usize) -> Vec<Pos2> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| cubic_point(points, i as f32 / segments as f32))
        .collect()
}

/// Distance from `p` to the segment `a..b`
pub fn point_segment_distance(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Unit perpendicular of the direction `a -> b` (zero for coincident points)
pub fn perpendicular(a: Pos2, b: Pos2) -> Vec2 {
    let d = b - a;
    let len = d.length();
    if len <= f32::EPSILON {
        Vec2::ZERO
    } else {
        Vec2::new(-d.y / len, d.x / len)
    }
}

// =============================================================================
// EASING / INTERPOLATION
// =============================================================================

/// Cubic ease-out: fast start, gentle settle
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// =============================================================================
// STABLE HASHING
// =============================================================================

/// 32-bit FNV-1a over the UTF-8 bytes of `key`.
///
/// Fixed algorithm so identical ids give bit-identical visuals across runs and
/// platforms (std's `DefaultHasher` makes no such promise).
pub fn stable_hash(key: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Stable value in `[0, 1)` derived from `key`
pub fn hash_unit(key: &str) -> f32 {
    // 24 bits keep the quotient exactly representable in f32
    (stable_hash(key) >> 8) as f32 / (1u32 << 24) as f32
}

/// Stable `+1.0` / `-1.0` derived from `key`
pub fn hash_sign(key: &str) -> f32 {
    if stable_hash(key) & 1 == 0 {
        1.0
    } else {
        -1.0
    }
}

// =============================================================================
// TESTS
// =============================================================================

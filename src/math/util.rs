use super::{Point2d, Vector2d};
use cgmath::prelude::*;
use std::f64::consts::TAU;

/// Rotates a vector 90 degrees anti-clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// A unit vector pointing along the given heading in radians.
pub fn heading_vector(yaw: f64) -> Vector2d {
    Vector2d::new(yaw.cos(), yaw.sin())
}

/// Normalises a vector, guarding against zero-length input with `eps`.
pub fn normalize_or_zero(v: Vector2d, eps: f64) -> Vector2d {
    v / (v.magnitude() + eps)
}

/// Wraps an angle into `[-pi, pi]`.
pub fn normalize_angle(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

/// Wraps an angle into `[0, 2pi)`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // `rem_euclid` can round up to exactly 2pi for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// The signed area enclosed by a closed polygon.
/// Positive when the vertices wind anti-clockwise.
pub fn signed_area(points: &[Point2d]) -> f64 {
    let n = points.len();
    let twice_area: f64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    0.5 * twice_area
}

//! Geometric primitives for the finite-volume discretisation

use std::f64::consts::PI;

/// Surface area of a sphere with radius `r`.
#[inline]
pub fn area_sphere(r: f64) -> f64 {
    4.0 * PI * r * r
}

/// Area of a circle with radius `r`.
#[inline]
pub fn area_circle(r: f64) -> f64 {
    PI * r * r
}

/// Lateral surface area of a conical frustum of length `len` with end radii
/// `r1` and `r2`.
#[inline]
pub fn area_frustum(len: f64, r1: f64, r2: f64) -> f64 {
    PI * (r1 + r2) * (len * len + (r1 - r2) * (r1 - r2)).sqrt()
}

/// Midpoint of two values.
#[inline]
pub fn mean(a: f64, b: f64) -> f64 {
    0.5 * (a + b)
}

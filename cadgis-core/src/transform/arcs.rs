//! Chord-tolerance tessellation of arcs, circles, and polyline bulges.
//!
//! Segment counts are derived from the radius and the configured chord
//! tolerance, clamped per full circle, so large arcs never silently degrade
//! to a handful of chords.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::config::{
    float_cmp, ARC_CHORD_TOLERANCE, EPS, MAX_CIRCLE_SEGMENTS, MIN_CIRCLE_SEGMENTS,
};

/// Number of segments for a full circle of the given radius.
pub fn full_circle_segments(radius: f64) -> u32 {
    if radius <= ARC_CHORD_TOLERANCE {
        return MIN_CIRCLE_SEGMENTS;
    }
    // Max angular step keeping the sagitta under the chord tolerance.
    let step = 2.0 * (1.0 - ARC_CHORD_TOLERANCE / radius).acos();
    let n = (TAU / step).ceil() as u32;
    n.clamp(MIN_CIRCLE_SEGMENTS, MAX_CIRCLE_SEGMENTS)
}

/// Number of segments for an arc sweep of the given radius.
pub fn sweep_segments(radius: f64, sweep_rad: f64) -> u32 {
    let full = full_circle_segments(radius) as f64;
    ((full * sweep_rad.abs() / TAU).ceil() as u32).max(1)
}

/// Sample an arc from `start_rad` through a signed `sweep_rad`, inclusive of
/// both endpoints.
pub fn sample_arc(
    cx: f64,
    cy: f64,
    radius: f64,
    start_rad: f64,
    sweep_rad: f64,
) -> Vec<(f64, f64)> {
    let n = sweep_segments(radius, sweep_rad);
    let mut points = Vec::with_capacity(n as usize + 1);
    for i in 0..=n {
        let a = start_rad + sweep_rad * (i as f64) / (n as f64);
        points.push((cx + radius * a.cos(), cy + radius * a.sin()));
    }
    points
}

/// Sample a full circle as a counter-clockwise ring. The first point is not
/// repeated at the end.
pub fn circle_ring(cx: f64, cy: f64, radius: f64) -> Vec<(f64, f64)> {
    let n = full_circle_segments(radius);
    let mut points = Vec::with_capacity(n as usize);
    for i in 0..n {
        let a = TAU * (i as f64) / (n as f64);
        points.push((cx + radius * a.cos(), cy + radius * a.sin()));
    }
    points
}

/// Flatten a polyline bulge between two vertices into intermediate points
/// (exclusive of both endpoints).
///
/// DXF bulge is `tan(theta/4)` for the included angle `theta`; positive is
/// counter-clockwise from the first vertex to the second.
pub fn flatten_bulge(p1: (f64, f64), p2: (f64, f64), bulge: f64) -> Vec<(f64, f64)> {
    if float_cmp::approx_zero(bulge) {
        return Vec::new();
    }
    let dx = p2.0 - p1.0;
    let dy = p2.1 - p1.1;
    let chord = (dx * dx + dy * dy).sqrt();
    if chord < EPS {
        return Vec::new();
    }

    let theta = 4.0 * bulge.atan();
    let radius = chord / (2.0 * (theta.abs() / 2.0).sin());

    // Direction from the first vertex to the arc center.
    let phi = dy.atan2(dx);
    let alpha = phi + (FRAC_PI_2 - theta.abs() / 2.0) * theta.signum();
    let cx = p1.0 + radius * alpha.cos();
    let cy = p1.1 + radius * alpha.sin();

    let start = (p1.1 - cy).atan2(p1.0 - cx);
    let n = sweep_segments(radius, theta);
    let mut points = Vec::with_capacity(n.saturating_sub(1) as usize);
    for i in 1..n {
        let a = start + theta * (i as f64) / (n as f64);
        points.push((cx + radius * a.cos(), cy + radius * a.sin()));
    }
    points
}

/// Signed sweep for a DXF ARC entity, which runs counter-clockwise from
/// `start_deg` to `end_deg`.
pub fn arc_sweep_rad(start_deg: f64, end_deg: f64) -> f64 {
    let mut sweep = (end_deg - start_deg).to_radians();
    while sweep <= 0.0 {
        sweep += TAU;
    }
    while sweep > TAU {
        sweep -= TAU;
    }
    sweep
}

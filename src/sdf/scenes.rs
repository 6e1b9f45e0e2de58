//! Construction of demo signed-distance fields.
//!
//! These are the built-in scenes the CLI can mesh without a CAD-language
//! front end; the integration tests use them as synthetic inputs.

use glam::DVec3;

use crate::sdf::SdfExpr;

/// Squared distance from the query point to `center`.
fn dist_sq(center: DVec3) -> SdfExpr {
    let dx = SdfExpr::x().sub(&SdfExpr::constant(center.x));
    let dy = SdfExpr::y().sub(&SdfExpr::constant(center.y));
    let dz = SdfExpr::z().sub(&SdfExpr::constant(center.z));
    dx.mul(&dx).add(&dy.mul(&dy)).add(&dz.mul(&dz))
}

/// Exact sphere SDF: `|p - center| - radius`.
pub fn sphere(center: DVec3, radius: f64) -> SdfExpr {
    dist_sq(center)
        .sqrt()
        .sub(&SdfExpr::constant(radius))
        .primitive()
}

/// Half-space below the plane `dot(normal, p) = offset`.
///
/// `normal` is normalized here so the field stays a true distance.
pub fn half_space(normal: DVec3, offset: f64) -> SdfExpr {
    let n = normal.normalize();
    SdfExpr::x()
        .mul(&SdfExpr::constant(n.x))
        .add(&SdfExpr::y().mul(&SdfExpr::constant(n.y)))
        .add(&SdfExpr::z().mul(&SdfExpr::constant(n.z)))
        .sub(&SdfExpr::constant(offset))
        .primitive()
}

/// Gyroid shell: `|sin(sx)cos(sy) + sin(sy)cos(sz) + sin(sz)cos(sx)| - t`.
///
/// Not a true distance function, but sound under interval evaluation and
/// full of sharp detail at every scale, which makes it the budget-
/// exhaustion workhorse.
pub fn gyroid(scale: f64, thickness: f64) -> SdfExpr {
    let sx = SdfExpr::x().mul(&SdfExpr::constant(scale));
    let sy = SdfExpr::y().mul(&SdfExpr::constant(scale));
    let sz = SdfExpr::z().mul(&SdfExpr::constant(scale));
    sx.sin()
        .mul(&sy.cos())
        .add(&sy.sin().mul(&sz.cos()))
        .add(&sz.sin().mul(&sx.cos()))
        .abs()
        .sub(&SdfExpr::constant(thickness))
        .primitive()
}

/// Unit sphere at the origin plus a smaller sphere at `(2, 0, 0)`.
pub fn two_spheres() -> SdfExpr {
    sphere(DVec3::ZERO, 1.0).min(&sphere(DVec3::new(2.0, 0.0, 0.0), 0.7))
}

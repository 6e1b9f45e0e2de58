use std::sync::Arc;

use glam::DVec3;

use crate::interval::Interval;

/// One node of a signed-distance expression tree.
///
/// The tree is the crate's stand-in for the external CAD-language parser:
/// downstream stages only ever see the three evaluation operations on
/// [`SdfExpr`], never the node structure.
///
/// `Primitive` marks a subtree as one smooth surface and optionally carries
/// a minimum-feature-size hint; it is what lets content classification
/// distinguish a single face from a sharp combination of several.
#[derive(Debug)]
pub enum SdfNode {
    X,
    Y,
    Z,
    Constant(f64),
    Add(SdfExpr, SdfExpr),
    Sub(SdfExpr, SdfExpr),
    Mul(SdfExpr, SdfExpr),
    Div(SdfExpr, SdfExpr),
    Neg(SdfExpr),
    Abs(SdfExpr),
    Sqrt(SdfExpr),
    Sin(SdfExpr),
    Cos(SdfExpr),
    Min(SdfExpr, SdfExpr),
    Max(SdfExpr, SdfExpr),
    Primitive { field: SdfExpr, min_feature: f64 },
}

/// Cheaply clonable handle to an immutable SDF expression tree.
#[derive(Debug, Clone)]
pub struct SdfExpr(Arc<SdfNode>);

impl SdfExpr {
    fn wrap(node: SdfNode) -> Self {
        Self(Arc::new(node))
    }

    pub fn node(&self) -> &SdfNode {
        &self.0
    }

    pub fn x() -> Self {
        Self::wrap(SdfNode::X)
    }

    pub fn y() -> Self {
        Self::wrap(SdfNode::Y)
    }

    pub fn z() -> Self {
        Self::wrap(SdfNode::Z)
    }

    pub fn constant(v: f64) -> Self {
        Self::wrap(SdfNode::Constant(v))
    }

    pub fn add(&self, rhs: &SdfExpr) -> Self {
        Self::wrap(SdfNode::Add(self.clone(), rhs.clone()))
    }

    pub fn sub(&self, rhs: &SdfExpr) -> Self {
        Self::wrap(SdfNode::Sub(self.clone(), rhs.clone()))
    }

    pub fn mul(&self, rhs: &SdfExpr) -> Self {
        Self::wrap(SdfNode::Mul(self.clone(), rhs.clone()))
    }

    pub fn div(&self, rhs: &SdfExpr) -> Self {
        Self::wrap(SdfNode::Div(self.clone(), rhs.clone()))
    }

    pub fn neg(&self) -> Self {
        Self::wrap(SdfNode::Neg(self.clone()))
    }

    pub fn abs(&self) -> Self {
        Self::wrap(SdfNode::Abs(self.clone()))
    }

    pub fn sqrt(&self) -> Self {
        Self::wrap(SdfNode::Sqrt(self.clone()))
    }

    pub fn sin(&self) -> Self {
        Self::wrap(SdfNode::Sin(self.clone()))
    }

    pub fn cos(&self) -> Self {
        Self::wrap(SdfNode::Cos(self.clone()))
    }

    pub fn min(&self, rhs: &SdfExpr) -> Self {
        Self::wrap(SdfNode::Min(self.clone(), rhs.clone()))
    }

    pub fn max(&self, rhs: &SdfExpr) -> Self {
        Self::wrap(SdfNode::Max(self.clone(), rhs.clone()))
    }

    /// Mark this tree as one smooth surface with no feature-size hint.
    pub fn primitive(&self) -> Self {
        Self::wrap(SdfNode::Primitive {
            field: self.clone(),
            min_feature: f64::INFINITY,
        })
    }

    /// Mark this tree as one smooth surface that needs cells no larger
    /// than `min_feature` to be resolved faithfully.
    pub fn with_detail(&self, min_feature: f64) -> Self {
        Self::wrap(SdfNode::Primitive {
            field: self.clone(),
            min_feature,
        })
    }

    /// Exact value of the field at a point.
    pub fn evaluate(&self, p: DVec3) -> f64 {
        match self.node() {
            SdfNode::X => p.x,
            SdfNode::Y => p.y,
            SdfNode::Z => p.z,
            SdfNode::Constant(v) => *v,
            SdfNode::Add(a, b) => a.evaluate(p) + b.evaluate(p),
            SdfNode::Sub(a, b) => a.evaluate(p) - b.evaluate(p),
            SdfNode::Mul(a, b) => a.evaluate(p) * b.evaluate(p),
            SdfNode::Div(a, b) => a.evaluate(p) / b.evaluate(p),
            SdfNode::Neg(a) => -a.evaluate(p),
            SdfNode::Abs(a) => a.evaluate(p).abs(),
            SdfNode::Sqrt(a) => a.evaluate(p).sqrt(),
            SdfNode::Sin(a) => a.evaluate(p).sin(),
            SdfNode::Cos(a) => a.evaluate(p).cos(),
            SdfNode::Min(a, b) => a.evaluate(p).min(b.evaluate(p)),
            SdfNode::Max(a, b) => a.evaluate(p).max(b.evaluate(p)),
            SdfNode::Primitive { field, .. } => field.evaluate(p),
        }
    }

    /// Sound bounds of the field over an axis-aligned box.
    pub fn evaluate_interval(&self, x: Interval, y: Interval, z: Interval) -> Interval {
        match self.node() {
            SdfNode::X => x,
            SdfNode::Y => y,
            SdfNode::Z => z,
            SdfNode::Constant(v) => Interval::constant(*v),
            SdfNode::Add(a, b) => a.evaluate_interval(x, y, z).add(&b.evaluate_interval(x, y, z)),
            SdfNode::Sub(a, b) => a.evaluate_interval(x, y, z).sub(&b.evaluate_interval(x, y, z)),
            SdfNode::Mul(a, b) => a.evaluate_interval(x, y, z).mul(&b.evaluate_interval(x, y, z)),
            SdfNode::Div(a, b) => a.evaluate_interval(x, y, z).div(&b.evaluate_interval(x, y, z)),
            SdfNode::Neg(a) => a.evaluate_interval(x, y, z).neg(),
            SdfNode::Abs(a) => a.evaluate_interval(x, y, z).abs(),
            SdfNode::Sqrt(a) => a.evaluate_interval(x, y, z).sqrt(),
            SdfNode::Sin(a) => a.evaluate_interval(x, y, z).sin(),
            SdfNode::Cos(a) => a.evaluate_interval(x, y, z).cos(),
            SdfNode::Min(a, b) => a
                .evaluate_interval(x, y, z)
                .min_i(&b.evaluate_interval(x, y, z)),
            SdfNode::Max(a, b) => a
                .evaluate_interval(x, y, z)
                .max_i(&b.evaluate_interval(x, y, z)),
            SdfNode::Primitive { field, .. } => field.evaluate_interval(x, y, z),
        }
    }

    /// Central-difference gradient estimate with step `h`.
    pub fn gradient(&self, p: DVec3, h: f64) -> DVec3 {
        DVec3::new(
            self.evaluate(p + DVec3::new(h, 0.0, 0.0)) - self.evaluate(p - DVec3::new(h, 0.0, 0.0)),
            self.evaluate(p + DVec3::new(0.0, h, 0.0)) - self.evaluate(p - DVec3::new(0.0, h, 0.0)),
            self.evaluate(p + DVec3::new(0.0, 0.0, h)) - self.evaluate(p - DVec3::new(0.0, 0.0, h)),
        ) / (2.0 * h)
    }
}

use crate::interval::Interval;
use crate::sdf::{SdfExpr, SdfNode};

/// Region classification over a box, richer than raw interval bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// The field is entirely negative over the box.
    Inside,
    /// The field is entirely positive over the box.
    Outside,
    /// The box straddles zero and exactly one smooth surface passes through.
    Face,
    /// The box straddles zero with several surfaces or a sharp feature;
    /// needs finer subdivision than a plain face.
    Complex,
}

/// Result of content classification over a box.
#[derive(Debug, Clone)]
pub struct Content {
    pub category: Category,
    /// Smallest feature the region asks to be resolved at. `INFINITY`
    /// means no hint; the builder clamps against the global minimum.
    pub min_feature_size: f64,
    /// For `Face`, the single surface active in the box. Vertices created
    /// from this region carry it for better-conditioned projection.
    pub local_sdf: Option<SdfExpr>,
}

impl Content {
    fn inside(min_feature_size: f64) -> Self {
        Self {
            category: Category::Inside,
            min_feature_size,
            local_sdf: None,
        }
    }

    fn outside(min_feature_size: f64) -> Self {
        Self {
            category: Category::Outside,
            min_feature_size,
            local_sdf: None,
        }
    }

    fn complex(min_feature_size: f64) -> Self {
        Self {
            category: Category::Complex,
            min_feature_size,
            local_sdf: None,
        }
    }

    pub fn straddles(&self) -> bool {
        matches!(self.category, Category::Face | Category::Complex)
    }
}

impl SdfExpr {
    /// Classify the field over a box.
    ///
    /// Returns `None` for bare arithmetic trees that carry no primitive or
    /// combinator structure; callers fall back to `evaluate_interval`.
    pub fn evaluate_content(&self, x: Interval, y: Interval, z: Interval) -> Option<Content> {
        match self.node() {
            SdfNode::Primitive { field, min_feature } => {
                let iv = field.evaluate_interval(x, y, z);
                Some(if iv.is_strictly_negative() {
                    Content::inside(*min_feature)
                } else if iv.is_strictly_positive() {
                    Content::outside(*min_feature)
                } else {
                    Content {
                        category: Category::Face,
                        min_feature_size: *min_feature,
                        local_sdf: Some(self.clone()),
                    }
                })
            }
            SdfNode::Min(a, b) => {
                let ca = a.evaluate_content(x, y, z)?;
                let cb = b.evaluate_content(x, y, z)?;
                Some(combine_union(ca, cb))
            }
            SdfNode::Max(a, b) => {
                let ca = a.evaluate_content(x, y, z)?;
                let cb = b.evaluate_content(x, y, z)?;
                Some(combine_intersection(ca, cb))
            }
            SdfNode::Neg(a) => {
                let c = a.evaluate_content(x, y, z)?;
                Some(Content {
                    category: match c.category {
                        Category::Inside => Category::Outside,
                        Category::Outside => Category::Inside,
                        straddling => straddling,
                    },
                    min_feature_size: c.min_feature_size,
                    local_sdf: c.local_sdf.map(|e| e.neg()),
                })
            }
            _ => None,
        }
    }
}

/// `min(a, b)`: the union of two solids.
fn combine_union(a: Content, b: Content) -> Content {
    let feature = a.min_feature_size.min(b.min_feature_size);
    // min(a, b) <= b, so one fully negative child makes the whole box inside
    if a.category == Category::Inside || b.category == Category::Inside {
        return Content::inside(feature);
    }
    if a.category == Category::Outside && b.category == Category::Outside {
        return Content::outside(feature);
    }
    match (a.straddles(), b.straddles()) {
        (true, false) => a,
        (false, true) => b,
        _ => Content::complex(feature),
    }
}

/// `max(a, b)`: the intersection of two solids.
fn combine_intersection(a: Content, b: Content) -> Content {
    let feature = a.min_feature_size.min(b.min_feature_size);
    // max(a, b) >= a, so one fully positive child makes the whole box outside
    if a.category == Category::Outside || b.category == Category::Outside {
        return Content::outside(feature);
    }
    if a.category == Category::Inside && b.category == Category::Inside {
        return Content::inside(feature);
    }
    match (a.straddles(), b.straddles()) {
        (true, false) => a,
        (false, true) => b,
        _ => Content::complex(feature),
    }
}

use arrayvec::ArrayVec;
use itertools::Itertools as _;
use thiserror::Error;

use crate::geometry::{Axis, FloatType, ShapeId, Triangle, WorldPoint};

/// Signed-distance tolerance for classifying a vertex as lying on a plane.
pub const PLANE_EPSILON: FloatType = 1e-5;

/// Fragments with area at or below this are refused as degenerate.
pub const DEGENERATE_AREA_EPSILON: FloatType = 1e-9;

/// An axis-aligned dividing plane, `x = offset` and friends.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AxisPlane {
    pub axis: Axis,
    pub offset: FloatType,
}

impl AxisPlane {
    pub fn signed_distance(&self, p: &WorldPoint) -> FloatType {
        p[self.axis.index()] - self.offset
    }

    fn classify(&self, p: &WorldPoint) -> Side {
        let d = self.signed_distance(p);
        if d.abs() <= PLANE_EPSILON {
            Side::OnPlane
        } else if d < 0.0 {
            Side::Negative
        } else {
            Side::Positive
        }
    }

    /// Intersection of the segment `a`-`b` with the plane.
    /// Both endpoints must be strictly on opposite sides.
    fn cut_edge(&self, a: &WorldPoint, b: &WorldPoint) -> WorldPoint {
        let da = self.signed_distance(a);
        let db = self.signed_distance(b);
        a + (b - a) * (da / (da - db))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Negative,
    OnPlane,
    Positive,
}

/// Points back from a phantom triangle to the scene triangle it was cut from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TriangleRef {
    pub shape: ShapeId,
    pub index: usize,
}

#[derive(Debug, Error)]
#[error("triangle {0:?} has near-zero area")]
pub struct DegenerateTriangle(pub TriangleRef);

/// A possibly-clipped copy of a scene triangle, owned by the space partition
/// node that stores it. Never degenerate.
#[derive(Clone, Debug)]
pub struct PhantomTriangle {
    triangle: Triangle<WorldPoint>,
    source: TriangleRef,
}

impl PhantomTriangle {
    /// Refuses zero or near-zero area geometry instead of storing it.
    pub fn new(
        triangle: Triangle<WorldPoint>,
        source: TriangleRef,
    ) -> Result<PhantomTriangle, DegenerateTriangle> {
        if triangle.is_degenerate(DEGENERATE_AREA_EPSILON) {
            return Err(DegenerateTriangle(source));
        }
        Ok(PhantomTriangle { triangle, source })
    }

    pub fn triangle(&self) -> &Triangle<WorldPoint> {
        &self.triangle
    }

    pub fn source(&self) -> TriangleRef {
        self.source
    }

    /// Cuts the triangle against an axis-aligned plane.
    ///
    /// A variant of Sutherland-Hodgman specialized to triangles: the vertex
    /// loop is clipped into a negative-side and a positive-side polygon
    /// (at most 4 vertices each), which are then fanned back into triangles.
    pub fn split_at_plane(&self, plane: &AxisPlane) -> SplitOutcome<PhantomTriangle> {
        let sides = self.triangle.map(|p| plane.classify(p));

        let negatives = (0..3).filter(|&i| sides[i] == Side::Negative).count();
        let positives = (0..3).filter(|&i| sides[i] == Side::Positive).count();

        if negatives == 0 && positives == 0 {
            return SplitOutcome::Coplanar;
        }
        if negatives == 0 {
            return SplitOutcome::Unsplit(Side::Positive);
        }
        if positives == 0 {
            return SplitOutcome::Unsplit(Side::Negative);
        }

        // Vertices on both sides: walk the edge loop and collect each side's
        // polygon, inserting the edge/plane cut points on sign changes.
        let mut negative_poly: ArrayVec<WorldPoint, 4> = ArrayVec::new();
        let mut positive_poly: ArrayVec<WorldPoint, 4> = ArrayVec::new();

        for (i, j) in (0..3).circular_tuple_windows() {
            let (a, side_a) = (&self.triangle[i], sides[i]);
            let (b, side_b) = (&self.triangle[j], sides[j]);

            match side_a {
                Side::Negative => negative_poly.push(*a),
                Side::Positive => positive_poly.push(*a),
                Side::OnPlane => {
                    negative_poly.push(*a);
                    positive_poly.push(*a);
                }
            }

            let crosses = matches!(
                (side_a, side_b),
                (Side::Negative, Side::Positive) | (Side::Positive, Side::Negative)
            );
            if crosses {
                let cut = plane.cut_edge(a, b);
                negative_poly.push(cut);
                positive_poly.push(cut);
            }
        }

        let negative = match fan_triangulate(&negative_poly, self.source) {
            Ok(fragments) => fragments,
            Err(err) => return SplitOutcome::Degenerate(err),
        };
        let positive = match fan_triangulate(&positive_poly, self.source) {
            Ok(fragments) => fragments,
            Err(err) => return SplitOutcome::Degenerate(err),
        };

        SplitOutcome::Split { negative, positive }
    }
}

/// Result of splitting one item against one plane.
#[derive(Debug)]
pub enum SplitOutcome<T> {
    /// All vertices on one side (possibly touching the plane), nothing cut.
    Unsplit(Side),
    /// The item lies in the plane itself, set aside unsplit.
    Coplanar,
    /// Replaced by 2 or 3 fragments distributed over both sides.
    Split {
        negative: ArrayVec<T, 2>,
        positive: ArrayVec<T, 2>,
    },
    /// The cut would produce near-zero area geometry; the split is refused
    /// and the original item must be kept whole.
    Degenerate(DegenerateTriangle),
}

fn fan_triangulate(
    poly: &[WorldPoint],
    source: TriangleRef,
) -> Result<ArrayVec<PhantomTriangle, 2>, DegenerateTriangle> {
    let mut fragments = ArrayVec::new();
    for i in 1..poly.len() - 1 {
        fragments.push(PhantomTriangle::new(
            Triangle::new(poly[0], poly[i], poly[i + 1]),
            source,
        )?);
    }
    Ok(fragments)
}

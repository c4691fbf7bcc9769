use std::ops::{Index, IndexMut};

use crate::geometry::{Aabb, FloatType, Ray, WorldPoint, WorldVector};

/// A triangle over an arbitrary point representation.
#[derive(Clone, Debug, PartialEq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.0.iter()
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self.0[0]), f(&self.0[1]), f(&self.0[2])])
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<Point> IndexMut<usize> for Triangle<Point> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Triangle<WorldPoint> {
    /// Edge vectors coming from the first vertex.
    pub fn edges(&self) -> [WorldVector; 2] {
        [self.0[1] - self.0[0], self.0[2] - self.0[0]]
    }

    /// Normal vector of the triangle, not normalized.
    pub fn normal(&self) -> WorldVector {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }

    pub fn area(&self) -> FloatType {
        self.normal().norm() / 2.0
    }

    /// Zero or near-zero area within `eps`.
    pub fn is_degenerate(&self, eps: FloatType) -> bool {
        self.area() <= eps
    }

    pub fn centroid(&self) -> WorldPoint {
        WorldPoint {
            coords: self.0.iter().map(|p| p.coords).sum::<WorldVector>() / 3.0,
        }
    }

    pub fn bounding_box(&self) -> Aabb<WorldPoint> {
        Aabb::from_points(self.0.iter().copied())
            .unwrap_or_else(|| unreachable!("three vertices always produce a box"))
    }

    /// Calculates ray intersection with the (two sided) triangle.
    /// Returns distance along the ray and barycentric uv coordinates.
    /// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
    pub fn intersect(&self, ray: &Ray) -> Option<(FloatType, BarycentricCoordinates)> {
        let [e1, e2] = self.edges();

        let ray_cross_e2 = ray.direction.cross(&e2);
        let det = e1.dot(&ray_cross_e2);

        let inv_det = 1.0 / det; // May be infinite for degenerate or edge-on cases
        let s = ray.origin - self.0[0];
        let u = inv_det * s.dot(&ray_cross_e2);

        let s_cross_e1 = s.cross(&e1);
        let v = inv_det * ray.direction.dot(&s_cross_e1);
        let t = inv_det * e2.dot(&s_cross_e1);

        // NaNs from the infinite inv_det fail all of these comparisons
        if u >= 0.0 && v >= 0.0 && u + v <= 1.0 && t.is_finite() {
            Some((t, BarycentricCoordinates { u, v }))
        } else {
            None
        }
    }
}

/// Position on a triangle expressed in its barycentric basis.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates {
    pub u: FloatType,
    pub v: FloatType,
}

impl BarycentricCoordinates {
    pub fn interpolate(&self, a: WorldVector, b: WorldVector, c: WorldVector) -> WorldVector {
        let w = 1.0 - self.u - self.v;
        a * w + b * self.u + c * self.v
    }
}

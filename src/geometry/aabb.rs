use crate::geometry::{FloatType, Ray, WorldPoint, WorldVector};

/// A coordinate axis, doubling as the split axis of a kd division.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aabb<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> Aabb<Point> {
    pub fn new(min: Point, max: Point) -> Aabb<Point> {
        Aabb { min, max }
    }
}

impl<Point> From<(Point, Point)> for Aabb<Point> {
    fn from(value: (Point, Point)) -> Self {
        let (min, max) = value;
        Aabb { min, max }
    }
}

impl Aabb<WorldPoint> {
    /// Smallest box enclosing all of `points`, `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = WorldPoint>) -> Option<Aabb<WorldPoint>> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bb = Aabb {
            min: first,
            max: first,
        };
        for p in points {
            bb.min = bb.min.inf(&p);
            bb.max = bb.max.sup(&p);
        }
        Some(bb)
    }

    pub fn size(&self) -> WorldVector {
        self.max - self.min
    }

    pub fn center(&self) -> WorldPoint {
        nalgebra::center(&self.min, &self.max)
    }

    /// Box grown by `margin` in every direction.
    pub fn grown(&self, margin: FloatType) -> Aabb<WorldPoint> {
        let m = WorldVector::repeat(margin);
        Aabb {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Union with another box.
    pub fn merged(&self, other: &Aabb<WorldPoint>) -> Aabb<WorldPoint> {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn longest_axis(&self) -> Axis {
        let size = self.size();
        if size.x >= size.y && size.x >= size.z {
            Axis::X
        } else if size.y >= size.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    pub fn contains_point(&self, p: &WorldPoint) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Point containment with a tolerance band around the boundary,
    /// absorbs floating point error from clipping right at a split plane.
    pub fn contains_point_almost(&self, p: &WorldPoint, eps: FloatType) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] - eps && p[i] <= self.max[i] + eps)
    }

    /// Whole-box containment with the same boundary tolerance.
    pub fn contains_almost(&self, other: &Aabb<WorldPoint>, eps: FloatType) -> bool {
        self.contains_point_almost(&other.min, eps) && self.contains_point_almost(&other.max, eps)
    }

    /// The eight children of an octree division through the box center.
    pub fn octants(&self) -> [Aabb<WorldPoint>; 8] {
        let c = self.center();
        std::array::from_fn(|i| {
            let pick = |bit: usize, min: FloatType, mid: FloatType, max: FloatType| {
                if i & (1 << bit) == 0 { (min, mid) } else { (mid, max) }
            };
            let (x0, x1) = pick(0, self.min.x, c.x, self.max.x);
            let (y0, y1) = pick(1, self.min.y, c.y, self.max.y);
            let (z0, z1) = pick(2, self.min.z, c.z, self.max.z);
            Aabb {
                min: WorldPoint::new(x0, y0, z0),
                max: WorldPoint::new(x1, y1, z1),
            }
        })
    }

    /// The two children of a kd division through the box center along `axis`.
    pub fn halves(&self, axis: Axis) -> [Aabb<WorldPoint>; 2] {
        let i = axis.index();
        let mid = self.center()[i];

        let mut low = self.clone();
        low.max[i] = mid;
        let mut high = self.clone();
        high.min[i] = mid;

        [low, high]
    }

    /// First and last intersection distance of the ray's line with the box.
    ///
    /// `None` when the line misses entirely or the overlap lies behind the
    /// ray origin or past its maximum length.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(FloatType, FloatType)> {
        let mut t_enter = FloatType::NEG_INFINITY;
        let mut t_exit = FloatType::INFINITY;

        for i in 0..3 {
            // The multiplication is NaN if the ray starts inside the slab
            // bounding plane and is parallel to it; blend those to +-infinity
            // so that the axis does not constrain the range.
            let to_min = (self.min[i] - ray.origin[i]) * ray.inv_direction[i];
            let to_max = (self.max[i] - ray.origin[i]) * ray.inv_direction[i];

            let (near, far) = if to_min.is_nan() || to_max.is_nan() {
                (FloatType::NEG_INFINITY, FloatType::INFINITY)
            } else {
                (to_min.min(to_max), to_min.max(to_max))
            };

            t_enter = t_enter.max(near);
            t_exit = t_exit.min(far);
        }

        if t_enter <= t_exit && t_exit >= 0.0 && t_enter <= ray.max_length {
            Some((t_enter, t_exit))
        } else {
            None
        }
    }
}

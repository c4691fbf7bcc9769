use nalgebra::Unit;
use rand_distr::{Distribution as _, UnitSphere};

use crate::geometry::{
    BarycentricCoordinates, EPSILON, FloatType, Intersection, MeshIntersection, Ray, ShapeId,
    Triangle, WorldBox, WorldPoint, WorldVector,
};

/// Closed set of geometry variants a shape can be.
///
/// Spheres carry an analytic intersection equation; meshes can only be tested
/// through their triangle soup.
#[derive(Clone, Debug)]
pub enum Geometry {
    Sphere(Sphere),
    Mesh(TriangleMesh),
}

impl Geometry {
    pub fn has_exact_intersection(&self) -> bool {
        match self {
            Geometry::Sphere(_) => true,
            Geometry::Mesh(_) => false,
        }
    }

    pub fn bounding_box(&self) -> WorldBox {
        match self {
            Geometry::Sphere(s) => s.bounding_box(),
            Geometry::Mesh(m) => m.bounding_box(),
        }
    }

    pub fn centroid(&self) -> WorldPoint {
        match self {
            Geometry::Sphere(s) => s.center,
            Geometry::Mesh(m) => m.bounding_box().center(),
        }
    }

    pub fn triangles(&self) -> &[Triangle<WorldPoint>] {
        match self {
            Geometry::Sphere(_) => &[],
            Geometry::Mesh(m) => &m.triangles,
        }
    }

    /// Random surface point on the side facing the given direction,
    /// used for area-light sampling.
    pub fn random_point_facing(
        &self,
        direction: &WorldVector,
        rng: &mut impl rand::Rng,
    ) -> WorldPoint {
        match self {
            Geometry::Sphere(s) => s.random_point_facing(direction, rng),
            Geometry::Mesh(m) => m.random_surface_point(rng),
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Sphere {
    pub center: WorldPoint,
    pub radius: FloatType,
}

impl Sphere {
    pub fn bounding_box(&self) -> WorldBox {
        let r_vec = WorldVector::repeat(self.radius);
        WorldBox {
            min: self.center - r_vec,
            max: self.center + r_vec,
        }
    }

    pub fn intersect(&self, ray: &Ray, id: ShapeId) -> Option<Intersection> {
        let oc = ray.origin - self.center;
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - self.radius * self.radius;
        let discriminant = b * b - c;

        if discriminant < 0.0 {
            return None;
        }

        let sqrt_disc = discriminant.sqrt();
        let t1 = -b - sqrt_disc;
        let t2 = -b + sqrt_disc;
        let t = if t1 > EPSILON {
            t1
        } else if t2 > EPSILON {
            t2
        } else {
            return None;
        };

        if t > ray.max_length {
            return None;
        }

        let point = ray.point_at(t);
        let normal = Unit::new_normalize(point - self.center);

        Some(Intersection {
            point,
            normal,
            shape: id,
        })
    }

    fn random_point_facing(&self, direction: &WorldVector, rng: &mut impl rand::Rng) -> WorldPoint {
        let sample: [FloatType; 3] = UnitSphere.sample(rng);
        let mut offset = WorldVector::new(sample[0], sample[1], sample[2]);
        if offset.dot(direction) < 0.0 {
            offset = -offset;
        }
        self.center + offset * self.radius
    }
}

/// A shape defined only by its triangle soup.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    triangles: Vec<Triangle<WorldPoint>>,
    bounding_box: WorldBox,
}

impl TriangleMesh {
    pub fn new(triangles: Vec<Triangle<WorldPoint>>) -> TriangleMesh {
        let bounding_box =
            WorldBox::from_points(triangles.iter().flat_map(|t| t.iter().copied()))
                .unwrap_or_else(|| WorldBox::new(WorldPoint::origin(), WorldPoint::origin()));
        TriangleMesh {
            triangles,
            bounding_box,
        }
    }

    /// Two triangles spanning the quad `a b c d` (counterclockwise).
    pub fn quad(a: WorldPoint, b: WorldPoint, c: WorldPoint, d: WorldPoint) -> TriangleMesh {
        TriangleMesh::new(vec![Triangle::new(a, b, c), Triangle::new(a, c, d)])
    }

    pub fn triangles(&self) -> &[Triangle<WorldPoint>] {
        &self.triangles
    }

    pub fn bounding_box(&self) -> WorldBox {
        self.bounding_box.clone()
    }

    /// Closest triangle hit along the ray, brute force over the soup.
    pub fn intersect(&self, ray: &Ray, id: ShapeId) -> Option<MeshIntersection> {
        let mut best: Option<(FloatType, usize, BarycentricCoordinates)> = None;
        for (index, triangle) in self.triangles.iter().enumerate() {
            if let Some((t, barycentric)) = triangle.intersect(ray) {
                if t > EPSILON && t <= ray.max_length && best.is_none_or(|(bt, _, _)| t < bt) {
                    best = Some((t, index, barycentric));
                }
            }
        }

        let (t, index, barycentric) = best?;
        Some(mesh_intersection(
            &self.triangles[index],
            ray,
            t,
            index,
            barycentric,
            id,
        ))
    }

    fn random_surface_point(&self, rng: &mut impl rand::Rng) -> WorldPoint {
        let triangle = &self.triangles[rng.random_range(0..self.triangles.len())];
        // Uniform barycentric sample via the square root trick
        let r1: FloatType = rng.random::<FloatType>().sqrt();
        let r2: FloatType = rng.random();
        let [e1, e2] = triangle.edges();
        triangle[0] + e1 * (r1 * (1.0 - r2)) + e2 * (r1 * r2)
    }
}

/// Builds a mesh hit record with the normal flipped against the ray so that
/// triangles are two sided.
pub fn mesh_intersection(
    triangle: &Triangle<WorldPoint>,
    ray: &Ray,
    t: FloatType,
    index: usize,
    barycentric: BarycentricCoordinates,
    id: ShapeId,
) -> MeshIntersection {
    let mut normal = Unit::new_normalize(triangle.normal());
    if normal.dot(&ray.direction) > 0.0 {
        normal = -normal;
    }

    MeshIntersection {
        hit: Intersection {
            point: ray.point_at(t),
            normal,
            shape: id,
        },
        triangle: index,
        barycentric,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;
    use rand::{SeedableRng as _, rngs::SmallRng};

    #[test]
    fn sphere_direct_hit_through_center() {
        let sphere = Sphere {
            center: [1.0, 2.0, 3.0].into(),
            radius: 1.0,
        };
        let ray = Ray::primary([1.0, 2.0, 0.0].into(), [0.0, 0.0, 1.0].into());

        let hit = sphere.intersect(&ray, ShapeId(0)).expect("We should have a hit!");
        assert!((hit.point.z - 2.0).abs() < 1e-6);
        assert!((hit.normal.as_ref() - WorldVector::new(0.0, 0.0, -1.0)).norm() < 1e-5);
    }

    #[test]
    fn sphere_grazing_hit() {
        let sphere = Sphere {
            center: [1.0, 2.0, 3.0].into(),
            radius: 1.0,
        };
        let ray = Ray::primary([2.0, 2.0, 0.0].into(), [0.0, 0.0, 1.0].into());

        let hit = sphere.intersect(&ray, ShapeId(0)).expect("We should have a hit!");
        assert!((hit.point.z - 3.0).abs() < 1e-3);
    }

    #[test]
    fn sphere_narrow_miss() {
        let sphere = Sphere {
            center: [1.0, 2.0, 3.0].into(),
            radius: 1.0,
        };
        let ray = Ray::primary([2.0, 2.01, 0.0].into(), [0.0, 0.0, 1.0].into());

        assert!(sphere.intersect(&ray, ShapeId(0)).is_none());
    }

    #[test]
    fn sphere_hit_from_inside_uses_far_root() {
        let sphere = Sphere {
            center: WorldPoint::origin(),
            radius: 2.0,
        };
        let ray = Ray::primary(WorldPoint::origin(), [1.0, 0.0, 0.0].into());

        let hit = sphere.intersect(&ray, ShapeId(0)).unwrap();
        assert!((hit.point.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn sphere_respects_max_length() {
        let sphere = Sphere {
            center: [0.0, 0.0, 10.0].into(),
            radius: 1.0,
        };
        let mut ray = Ray::primary(WorldPoint::origin(), [0.0, 0.0, 1.0].into());
        ray.max_length = 5.0;

        assert!(sphere.intersect(&ray, ShapeId(0)).is_none());
    }

    #[test]
    fn sphere_light_sampling_faces_the_receiver() {
        let sphere = Sphere {
            center: WorldPoint::origin(),
            radius: 1.0,
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let toward_receiver = WorldVector::new(0.0, 0.0, 1.0);

        for _ in 0..100 {
            let p = sphere.random_point_facing(&toward_receiver, &mut rng);
            assert!(((p - sphere.center).norm() - 1.0).abs() < 1e-5);
            assert!(p.z >= 0.0);
        }
    }

    #[test]
    fn mesh_closest_triangle_wins() {
        let near = Triangle::new(
            [0.0, 0.0, 1.0].into(),
            [1.0, 0.0, 1.0].into(),
            [0.0, 1.0, 1.0].into(),
        );
        let far = Triangle::new(
            [0.0, 0.0, 5.0].into(),
            [1.0, 0.0, 5.0].into(),
            [0.0, 1.0, 5.0].into(),
        );
        let mesh = TriangleMesh::new(vec![far, near]);
        let ray = Ray::primary([0.2, 0.2, 0.0].into(), [0.0, 0.0, 1.0].into());

        let hit = mesh.intersect(&ray, ShapeId(4)).unwrap();
        assert!(hit.triangle == 1);
        assert!((hit.hit.point.z - 1.0).abs() < 1e-5);
        assert!(hit.hit.shape == ShapeId(4));
    }

    #[test]
    fn mesh_normal_faces_the_ray() {
        let mesh = TriangleMesh::new(vec![Triangle::new(
            [0.0, 0.0, 1.0].into(),
            [1.0, 0.0, 1.0].into(),
            [0.0, 1.0, 1.0].into(),
        )]);

        let from_front = Ray::primary([0.2, 0.2, 0.0].into(), [0.0, 0.0, 1.0].into());
        let from_behind = Ray::primary([0.2, 0.2, 2.0].into(), [0.0, 0.0, -1.0].into());

        let n1 = mesh.intersect(&from_front, ShapeId(0)).unwrap().hit.normal;
        let n2 = mesh.intersect(&from_behind, ShapeId(0)).unwrap().hit.normal;

        assert!(n1.dot(&from_front.direction) < 0.0);
        assert!(n2.dot(&from_behind.direction) < 0.0);
    }

    #[test]
    fn quad_covers_its_corners() {
        let mesh = TriangleMesh::quad(
            [0.0, 0.0, 0.0].into(),
            [1.0, 0.0, 0.0].into(),
            [1.0, 1.0, 0.0].into(),
            [0.0, 1.0, 0.0].into(),
        );

        for (x, y) in [(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9)] {
            let ray = Ray::primary([x, y, -1.0].into(), [0.0, 0.0, 1.0].into());
            assert!(mesh.intersect(&ray, ShapeId(0)).is_some(), "miss at {x},{y}");
        }
    }
}

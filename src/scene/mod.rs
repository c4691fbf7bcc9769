mod environment;
mod material;
mod primitives;
pub mod space_partition;

pub use environment::{CubeMap, Environment, ProceduralSky};
pub use material::Material;
pub use primitives::{Geometry, Sphere, TriangleMesh};

use log::{debug, warn};

use crate::geometry::{
    Hit, Intersection, MeshIntersection, Ray, ShapeId, WorldBox, WorldPoint, WorldVector,
};
use space_partition::{
    PartitionConfig, PhantomTriangle, ShapeItem, SpacePartition, TriangleRef,
};

/// One renderable object: a geometry variant plus its surface description.
#[derive(Clone, Debug)]
pub struct Shape {
    pub geometry: Geometry,
    pub material: Material,
}

impl Shape {
    pub fn new(geometry: Geometry, material: Material) -> Shape {
        Shape { geometry, material }
    }

    pub fn is_emissive(&self) -> bool {
        self.material.is_emissive()
    }

    pub fn bounding_box(&self) -> WorldBox {
        self.geometry.bounding_box()
    }

    pub fn centroid(&self) -> WorldPoint {
        self.geometry.centroid()
    }

    pub fn random_point_facing(
        &self,
        direction: &WorldVector,
        rng: &mut impl rand::Rng,
    ) -> WorldPoint {
        self.geometry.random_point_facing(direction, rng)
    }
}

/// Tuning of the three per-scene partition trees.
#[derive(Copy, Clone, Debug)]
pub struct PartitionSettings {
    pub exact: PartitionConfig,
    pub mesh: PartitionConfig,
    pub all_triangles: PartitionConfig,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        PartitionSettings {
            // Whole shapes cannot be clipped
            exact: PartitionConfig {
                max_items: 4,
                max_depth: 6,
                splitting: false,
                kd_divisions: false,
            },
            mesh: PartitionConfig {
                max_items: 10,
                max_depth: 8,
                splitting: true,
                kd_divisions: false,
            },
            all_triangles: PartitionConfig {
                max_items: 10,
                max_depth: 8,
                splitting: true,
                kd_divisions: true,
            },
        }
    }
}

/// Owns the shapes and lights of one renderable world, plus three parallel
/// acceleration trees:
///
/// * `sp_exact` - shapes with an analytic intersection equation,
/// * `sp_mesh` - clipped triangles of mesh-only shapes,
/// * `sp_all` - every triangle in the scene, for triangle-detail queries.
///
/// Every shape lands in exactly one of `sp_exact`/`sp_mesh`. Without the
/// trees (before `compute_space_partition`) all queries degrade to a brute
/// force scan over the shape list.
#[derive(Clone, Debug)]
pub struct Scene {
    shapes: Vec<Shape>,
    lights: Vec<ShapeId>,
    pub environment: Environment,
    pub partition_settings: PartitionSettings,

    sp_exact: Option<SpacePartition<ShapeItem>>,
    sp_mesh: Option<SpacePartition<PhantomTriangle>>,
    sp_all: Option<SpacePartition<PhantomTriangle>>,
}

impl Scene {
    pub fn new(environment: Environment) -> Scene {
        Scene {
            shapes: Vec::new(),
            lights: Vec::new(),
            environment,
            partition_settings: Default::default(),
            sp_exact: None,
            sp_mesh: None,
            sp_all: None,
        }
    }

    /// Registers a shape and invalidates the acceleration trees.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = ShapeId(self.shapes.len());
        if shape.is_emissive() {
            self.lights.push(id);
        }
        self.shapes.push(shape);

        self.sp_exact = None;
        self.sp_mesh = None;
        self.sp_all = None;

        id
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0]
    }

    pub fn lights(&self) -> &[ShapeId] {
        &self.lights
    }

    pub fn has_space_partition(&self) -> bool {
        self.sp_exact.is_some()
    }

    /// Rebuilds all three trees wholesale. Call after scene geometry changes;
    /// there is no incremental update.
    pub fn compute_space_partition(&mut self) {
        let settings = self.partition_settings;

        let exact_items = self
            .shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.geometry.has_exact_intersection())
            .map(|(i, s)| ShapeItem {
                id: ShapeId(i),
                bounds: s.bounding_box(),
            });
        self.sp_exact = Some(SpacePartition::from_items(exact_items, settings.exact));

        let mesh_triangles: Vec<PhantomTriangle> = self
            .shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.geometry.has_exact_intersection())
            .flat_map(|(i, s)| phantom_triangles(ShapeId(i), s))
            .collect();
        self.sp_mesh = Some(SpacePartition::from_items(
            mesh_triangles,
            settings.mesh,
        ));

        let all_triangles: Vec<PhantomTriangle> = self
            .shapes
            .iter()
            .enumerate()
            .flat_map(|(i, s)| phantom_triangles(ShapeId(i), s))
            .collect();
        self.sp_all = Some(SpacePartition::from_items(
            all_triangles,
            settings.all_triangles,
        ));

        for (name, tree) in [("mesh", &self.sp_mesh), ("all-triangle", &self.sp_all)] {
            if let Some(tree) = tree {
                debug!(
                    "{name} tree: depth {}; leaf fill {}",
                    tree.depth_statistics(),
                    tree.leaf_fill_statistics()
                );
            }
        }
    }

    /// Closest hit of any kind along the ray: analytic shapes and mesh
    /// triangles fused into a single nearest result.
    pub fn closest_intersection(&self, ray: &Ray) -> Option<Hit> {
        let exact = self.closest_exact_candidate(ray).map(Hit::Exact);
        let mesh = self.closest_mesh_candidate(ray).map(Hit::Mesh);

        match (exact, mesh) {
            (Some(a), Some(b)) => {
                if a.is_closer_than(&b, &ray.origin) {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (a, b) => a.or(b),
        }
    }

    /// Same fusion as `closest_intersection`, normalized to the base record
    /// for callers that only need position/normal/shape identity.
    pub fn closest_intersection_exact(&self, ray: &Ray) -> Option<Intersection> {
        self.closest_intersection(ray).map(Hit::into_intersection)
    }

    /// Closest triangle hit, ignoring analytic shapes entirely. Used by
    /// routines that need triangle-level detail regardless of shape type.
    pub fn closest_intersection_mesh(&self, ray: &Ray) -> Option<MeshIntersection> {
        match &self.sp_all {
            Some(tree) => self.closest_in_triangle_tree(tree, ray),
            None => self
                .shapes
                .iter()
                .enumerate()
                .filter_map(|(i, s)| match &s.geometry {
                    Geometry::Mesh(m) => m.intersect(ray, ShapeId(i)),
                    Geometry::Sphere(_) => None,
                })
                .reduce(|best, candidate| {
                    if candidate.hit.is_closer_than(&best.hit, &ray.origin) {
                        candidate
                    } else {
                        best
                    }
                }),
        }
    }

    fn closest_exact_candidate(&self, ray: &Ray) -> Option<Intersection> {
        let mut best: Option<Intersection> = None;
        let mut consider = |candidate: Intersection| {
            if best
                .as_ref()
                .is_none_or(|b| candidate.is_closer_than(b, &ray.origin))
            {
                best = Some(candidate);
            }
        };

        match &self.sp_exact {
            Some(tree) => {
                for node in tree.nodes_on_ray(ray) {
                    for item in &node.items {
                        if let Some(hit) = self.intersect_exact_shape(item.id, ray) {
                            consider(hit);
                        }
                    }
                }
            }
            None => {
                for i in 0..self.shapes.len() {
                    if let Some(hit) = self.intersect_exact_shape(ShapeId(i), ray) {
                        consider(hit);
                    }
                }
            }
        }

        best
    }

    fn closest_mesh_candidate(&self, ray: &Ray) -> Option<MeshIntersection> {
        match &self.sp_mesh {
            Some(tree) => self.closest_in_triangle_tree(tree, ray),
            None => self
                .shapes
                .iter()
                .enumerate()
                .filter_map(|(i, s)| match &s.geometry {
                    Geometry::Mesh(m) => m.intersect(ray, ShapeId(i)),
                    Geometry::Sphere(_) => None,
                })
                .reduce(|best, candidate| {
                    if candidate.hit.is_closer_than(&best.hit, &ray.origin) {
                        candidate
                    } else {
                        best
                    }
                }),
        }
    }

    /// Nearest-hit reduction over a triangle tree. Phantom triangles only
    /// prune space; the hit is re-resolved against the original scene
    /// triangle so that barycentric coordinates refer to it.
    fn closest_in_triangle_tree(
        &self,
        tree: &SpacePartition<PhantomTriangle>,
        ray: &Ray,
    ) -> Option<MeshIntersection> {
        let mut best: Option<MeshIntersection> = None;

        for node in tree.nodes_on_ray(ray) {
            for phantom in &node.items {
                // The clipped copy decides candidacy cheaply
                if phantom.triangle().intersect(ray).is_none() {
                    continue;
                }
                let Some(hit) = self.intersect_source_triangle(phantom.source(), ray) else {
                    continue;
                };
                if best
                    .as_ref()
                    .is_none_or(|b| hit.hit.is_closer_than(&b.hit, &ray.origin))
                {
                    best = Some(hit);
                }
            }
        }

        best
    }

    fn intersect_exact_shape(&self, id: ShapeId, ray: &Ray) -> Option<Intersection> {
        match &self.shape(id).geometry {
            Geometry::Sphere(sphere) => sphere.intersect(ray, id),
            Geometry::Mesh(_) => None,
        }
    }

    fn intersect_source_triangle(
        &self,
        source: TriangleRef,
        ray: &Ray,
    ) -> Option<MeshIntersection> {
        let triangle = &self.shape(source.shape).geometry.triangles()[source.index];
        let (t, barycentric) = triangle.intersect(ray)?;
        if t <= crate::geometry::EPSILON || t > ray.max_length {
            return None;
        }
        Some(primitives::mesh_intersection(
            triangle,
            ray,
            t,
            source.index,
            barycentric,
            source.shape,
        ))
    }
}

fn phantom_triangles(id: ShapeId, shape: &Shape) -> Vec<PhantomTriangle> {
    shape
        .geometry
        .triangles()
        .iter()
        .enumerate()
        .filter_map(|(index, triangle)| {
            let source = TriangleRef { shape: id, index };
            match PhantomTriangle::new(triangle.clone(), source) {
                Ok(phantom) => Some(phantom),
                Err(err) => {
                    // A zero-area scene triangle can never be hit anyway
                    warn!("skipping {err}");
                    None
                }
            }
        })
        .collect()
}

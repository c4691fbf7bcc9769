use log::warn;
use nalgebra::{Unit, Vector2};
use rand::Rng;
use rand_distr::{Distribution as _, UnitDisc, UnitSphere};

use crate::geometry::{EPSILON, FloatType, WorldVector};

/// Sub-pixel offsets in `[-0.5, 0.5]²` for one pixel.
///
/// Stratified sampling fills a `⌊√N⌋ × ⌊√N⌋` grid with one jittered sample
/// per cell and tops up to `count` with uniformly random offsets.
pub fn pixel_jitters(
    count: u32,
    stratified: bool,
    rng: &mut impl Rng,
) -> Vec<Vector2<FloatType>> {
    let count = count as usize;
    let mut jitters = Vec::with_capacity(count);

    if stratified {
        let side = (count as FloatType).sqrt().floor() as u32;
        let cell = 1.0 / (side as FloatType);
        for i in 0..side {
            for j in 0..side {
                jitters.push(Vector2::new(
                    (i as FloatType + rng.random_range(0.0..1.0)) * cell - 0.5,
                    (j as FloatType + rng.random_range(0.0..1.0)) * cell - 0.5,
                ));
            }
        }
    }

    while jitters.len() < count {
        jitters.push(Vector2::new(
            rng.random_range(-0.5..=0.5),
            rng.random_range(-0.5..=0.5),
        ));
    }

    jitters
}

/// One cosine-weighted direction in the canonical `+Z` hemisphere.
fn cosine_weighted(rng: &mut impl Rng) -> WorldVector {
    let [x, y]: [FloatType; 2] = UnitDisc.sample(rng);
    let z = (1.0 - x * x - y * y).max(0.0).sqrt();
    WorldVector::new(x, y, z)
}

/// Some tangent and bitangent completing `normal` to an orthonormal frame.
fn orthonormal_basis(normal: &Unit<WorldVector>) -> (WorldVector, WorldVector) {
    let helper = if normal.x.abs() < 0.9 {
        WorldVector::x()
    } else {
        WorldVector::y()
    };
    let tangent = normal.cross(&helper).normalize();
    let bitangent = normal.cross(&tangent);
    (tangent, bitangent)
}

/// Cosine-weighted hemisphere directions around `+Z`, generated once per
/// render and reoriented per hit point.
pub struct DirectionPool {
    directions: Vec<WorldVector>,
}

impl DirectionPool {
    pub const DEFAULT_SIZE: usize = 1024;

    pub fn generate(size: usize, rng: &mut impl Rng) -> DirectionPool {
        DirectionPool {
            directions: (0..size).map(|_| cosine_weighted(rng)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// Caps a requested per-gather sample count at the pool size.
    pub fn clamped_count(&self, requested: u32) -> usize {
        let requested = requested as usize;
        if requested > self.directions.len() {
            warn!(
                "requested {requested} gather rays but the direction pool holds {}, clamping",
                self.directions.len()
            );
            self.directions.len()
        } else {
            requested
        }
    }

    /// A pooled direction reoriented into the hemisphere of `normal`. Retries
    /// a few times when the draw grazes the surface, then falls back to the
    /// normal itself.
    pub fn sample_about(
        &self,
        normal: &Unit<WorldVector>,
        rng: &mut impl Rng,
    ) -> (Unit<WorldVector>, FloatType) {
        let (tangent, bitangent) = orthonormal_basis(normal);

        for _ in 0..8 {
            let d = &self.directions[rng.random_range(0..self.directions.len())];
            let world = tangent * d.x + bitangent * d.y + normal.as_ref() * d.z;
            let cosine = world.dot(normal);
            if cosine > EPSILON {
                return (Unit::new_normalize(world), cosine);
            }
        }

        (*normal, 1.0)
    }
}

/// Perturbs a reflection direction by `gloss` for rough specular surfaces.
/// The unperturbed direction is returned when jitter would degenerate it.
pub fn glossy_jitter(
    direction: &Unit<WorldVector>,
    gloss: FloatType,
    rng: &mut impl Rng,
) -> Unit<WorldVector> {
    if gloss <= 0.0 {
        return *direction;
    }
    let offset: [FloatType; 3] = UnitSphere.sample(rng);
    let jittered = direction.as_ref() + WorldVector::from(offset) * gloss;
    Unit::try_new(jittered, EPSILON).unwrap_or(*direction)
}

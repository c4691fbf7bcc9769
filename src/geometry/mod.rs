mod aabb;
mod triangle;

pub use aabb::{Aabb, Axis};
pub use triangle::{BarycentricCoordinates, Triangle};

use nalgebra::Unit;

use crate::util::{ColorExt as _, Rgb, WHITE};

pub type FloatType = f32;

pub type ScreenPoint = nalgebra::Point2<u32>;
pub type ScreenSize = nalgebra::Vector2<u32>;

pub type WorldPoint = nalgebra::Point3<FloatType>;
pub type WorldVector = nalgebra::Vector3<FloatType>;
pub type WorldBox = Aabb<WorldPoint>;

/// Offset applied along the surface normal when spawning secondary rays,
/// keeps them from re-hitting the surface they start on.
pub const EPSILON: FloatType = 1e-4;

/// One color channel of an RGB energy triple.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    R,
    G,
    B,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::R, Channel::G, Channel::B];

    pub fn index(&self) -> usize {
        match self {
            Channel::R => 0,
            Channel::G => 1,
            Channel::B => 2,
        }
    }
}

/// A directed line segment with the state the light transport needs:
/// carried energy, per-channel refractive index of the surrounding medium
/// and the recursion bookkeeping.
#[derive(Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    pub direction: Unit<WorldVector>,

    /// Componentwise inverse of the ray direction.
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero.
    pub inv_direction: WorldVector,

    /// Queries ignore intersections further than this along the ray.
    pub max_length: FloatType,

    /// Refractive index of the medium the ray currently travels in, per channel.
    pub eta: Rgb,

    /// RGB energy carried by the ray. Attenuated on every bounce.
    pub power: Rgb,

    pub bounce: u32,

    /// Shadow rays may not spawn further reflection or refraction.
    pub shadow: bool,
}

impl Ray {
    /// A camera ray: full power, vacuum refractive index, bounce zero.
    pub fn primary(origin: WorldPoint, direction: WorldVector) -> Ray {
        Ray::with_state(origin, direction, FloatType::INFINITY, WHITE, WHITE, 0, false)
    }

    pub fn with_state(
        origin: WorldPoint,
        direction: WorldVector,
        max_length: FloatType,
        eta: Rgb,
        power: Rgb,
        bounce: u32,
        shadow: bool,
    ) -> Ray {
        let direction = Unit::new_normalize(direction);
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
            max_length,
            eta,
            power,
            bounce,
            shadow,
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction.as_ref() * distance
    }

    /// New ray mirrored about `normal`, starting just off the surface at `point`.
    /// Power is the incoming power attenuated componentwise.
    pub fn reflect(&self, normal: &Unit<WorldVector>, point: &WorldPoint, attenuation: Rgb) -> Ray {
        let d = self.direction.as_ref();
        let mirrored = d - normal.as_ref() * (2.0 * d.dot(normal));

        Ray::with_state(
            point + normal.as_ref() * EPSILON,
            mirrored,
            FloatType::INFINITY,
            self.eta,
            self.power.mul_each(attenuation),
            self.bounce + 1,
            self.shadow,
        )
    }

    /// Transmitted ray through the surface at `point` following Snell's law.
    ///
    /// `eta_ratio` is n1/n2 for the crossing, `new_eta` is the refractive index
    /// of the medium the transmitted ray travels in. With `channel` set the
    /// transmitted power is non-zero only in that channel (chromatic
    /// dispersion); otherwise all channels are carried.
    /// Returns `None` on total internal reflection.
    pub fn refract(
        &self,
        normal: &Unit<WorldVector>,
        channel: Option<Channel>,
        eta_ratio: FloatType,
        new_eta: Rgb,
        point: &WorldPoint,
        attenuation: Rgb,
    ) -> Option<Ray> {
        let d = self.direction.as_ref();
        let cos_in = -d.dot(normal);
        let k = 1.0 - eta_ratio * eta_ratio * (1.0 - cos_in * cos_in);
        if k < 0.0 {
            // Total internal reflection, no transmitted ray
            return None;
        }

        let transmitted = d * eta_ratio + normal.as_ref() * (eta_ratio * cos_in - k.sqrt());

        let mut power = self.power.mul_each(attenuation);
        if let Some(channel) = channel {
            power = power.only_channel(channel);
        }

        Some(Ray::with_state(
            point - normal.as_ref() * EPSILON,
            transmitted,
            FloatType::INFINITY,
            new_eta,
            power,
            self.bounce + 1,
            self.shadow,
        ))
    }
}

/// Identifies a shape inside its owning `Scene`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeId(pub usize);

/// A resolved surface hit.
#[derive(Clone, Debug)]
pub struct Intersection {
    pub point: WorldPoint,
    pub normal: Unit<WorldVector>,
    pub shape: ShapeId,
}

impl Intersection {
    /// Ordering relation used by the nearest-hit reduction: strictly closer
    /// to `reference` than `other`.
    pub fn is_closer_than(&self, other: &Intersection, reference: &WorldPoint) -> bool {
        (self.point - reference).norm_squared() < (other.point - reference).norm_squared()
    }
}

/// A hit resolved through a shape's triangle soup, keeping the triangle
/// identity and barycentric coordinates for triangle-level shading.
#[derive(Clone, Debug)]
pub struct MeshIntersection {
    pub hit: Intersection,
    pub triangle: usize,
    pub barycentric: BarycentricCoordinates,
}

/// Either kind of scene hit.
#[derive(Clone, Debug)]
pub enum Hit {
    Exact(Intersection),
    Mesh(MeshIntersection),
}

impl Hit {
    pub fn intersection(&self) -> &Intersection {
        match self {
            Hit::Exact(i) => i,
            Hit::Mesh(m) => &m.hit,
        }
    }

    pub fn into_intersection(self) -> Intersection {
        match self {
            Hit::Exact(i) => i,
            Hit::Mesh(m) => m.hit,
        }
    }

    pub fn is_closer_than(&self, other: &Hit, reference: &WorldPoint) -> bool {
        self.intersection()
            .is_closer_than(other.intersection(), reference)
    }
}

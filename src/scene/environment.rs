use noise::{NoiseFn as _, Perlin};

use crate::geometry::{FloatType, WorldVector};
use crate::util::Rgb;

/// What a ray sees when it escapes the scene.
///
/// Sampled in priority order: an active cube map first, then the procedural
/// sky, then the flat background color.
#[derive(Clone, Debug)]
pub struct Environment {
    pub cube_map: Option<CubeMap>,
    pub sky: Option<ProceduralSky>,
    pub background: Rgb,
}

impl Environment {
    pub fn flat(background: Rgb) -> Environment {
        Environment {
            cube_map: None,
            sky: None,
            background,
        }
    }

    pub fn miss_color(&self, direction: &WorldVector) -> Rgb {
        if let Some(cube_map) = &self.cube_map {
            cube_map.sample(direction)
        } else if let Some(sky) = &self.sky {
            sky.sample(direction)
        } else {
            self.background
        }
    }
}

/// Six-face environment probe. Faces are stored in the conventional
/// +X -X +Y -Y +Z -Z order.
#[derive(Clone, Debug)]
pub struct CubeMap {
    faces: [image::Rgb32FImage; 6],
}

impl CubeMap {
    /// All faces must be square and equally sized.
    pub fn new(faces: [image::Rgb32FImage; 6]) -> CubeMap {
        let side = faces[0].width();
        assert2::assert!(side > 0);
        for face in &faces {
            assert2::assert!(face.width() == side && face.height() == side);
        }
        CubeMap { faces }
    }

    /// Single-color probe, mostly useful in tests.
    pub fn uniform(color: Rgb) -> CubeMap {
        let face = image::Rgb32FImage::from_pixel(1, 1, image::Rgb([color.r, color.g, color.b]));
        CubeMap::new(std::array::from_fn(|_| face.clone()))
    }

    /// Color of the probe in the given direction, nearest-texel lookup.
    pub fn sample(&self, direction: &WorldVector) -> Rgb {
        let abs = direction.map(FloatType::abs);

        // Major axis selects the face, the other two coordinates become uv
        let (face, u, v) = if abs.x >= abs.y && abs.x >= abs.z {
            if direction.x > 0.0 {
                (0, -direction.z / abs.x, -direction.y / abs.x)
            } else {
                (1, direction.z / abs.x, -direction.y / abs.x)
            }
        } else if abs.y >= abs.z {
            if direction.y > 0.0 {
                (2, direction.x / abs.y, direction.z / abs.y)
            } else {
                (3, direction.x / abs.y, -direction.z / abs.y)
            }
        } else if direction.z > 0.0 {
            (4, direction.x / abs.z, -direction.y / abs.z)
        } else {
            (5, -direction.x / abs.z, -direction.y / abs.z)
        };

        let image = &self.faces[face];
        let side = image.width() as FloatType;
        let texel = |coord: FloatType| {
            (((coord + 1.0) / 2.0 * side) as u32).min(image.width() - 1)
        };

        let pixel = image.get_pixel(texel(u), texel(v));
        Rgb {
            r: pixel[0],
            g: pixel[1],
            b: pixel[2],
        }
    }
}

/// Perlin-cloud sky dome.
#[derive(Clone, Debug)]
pub struct ProceduralSky {
    pub sky_color: Rgb,
    pub cloud_color: Rgb,
    noise: Perlin,
}

impl ProceduralSky {
    const OCTAVES: u32 = 4;
    const FREQUENCY: f64 = 2.0;

    pub fn new(sky_color: Rgb, cloud_color: Rgb, seed: u32) -> ProceduralSky {
        ProceduralSky {
            sky_color,
            cloud_color,
            noise: Perlin::new(seed),
        }
    }

    pub fn sample(&self, direction: &WorldVector) -> Rgb {
        let d = direction.normalize();

        let mut amplitude = 1.0f64;
        let mut frequency = Self::FREQUENCY;
        let mut value = 0.0f64;
        for _ in 0..Self::OCTAVES {
            value += amplitude
                * self.noise.get([
                    d.x as f64 * frequency,
                    d.y as f64 * frequency,
                    d.z as f64 * frequency,
                ]);
            amplitude /= 2.0;
            frequency *= 2.0;
        }

        // Clouds thin out toward the horizon
        let cloudiness = ((value * 0.5 + 0.5) * d.y.max(0.0) as f64).clamp(0.0, 1.0) as f32;

        self.sky_color * (1.0 - cloudiness) + self.cloud_color * cloudiness
    }
}

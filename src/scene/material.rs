use crate::util::{BLACK, ColorExt as _, Rgb, WHITE};

/// Flat surface description used by the light transport.
///
/// The diffuse/specular/transmissive energy split is deliberately not
/// validated to sum below one; scene authors own that budget, and clamping
/// here would change rendered output.
#[derive(Clone, Debug)]
pub struct Material {
    /// Light emitted by the surface itself; non-black makes the shape a light
    /// source.
    pub emissive: Rgb,
    pub diffuse: Rgb,
    pub specular: Rgb,
    pub transmissive: Rgb,
    /// Refractive index per color channel. Unequal channels disperse
    /// transmitted light into separate per-channel rays.
    pub eta: Rgb,
    /// Reflection jitter radius; zero is a perfect mirror.
    pub gloss: f32,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            emissive: BLACK,
            diffuse: Rgb {
                r: 0.7,
                g: 0.7,
                b: 0.7,
            },
            specular: BLACK,
            transmissive: BLACK,
            eta: WHITE,
            gloss: 0.0,
        }
    }
}

impl Material {
    pub fn diffuse(color: Rgb) -> Material {
        Material {
            diffuse: color,
            ..Default::default()
        }
    }

    pub fn emissive(color: Rgb) -> Material {
        Material {
            emissive: color,
            diffuse: BLACK,
            ..Default::default()
        }
    }

    pub fn mirror(color: Rgb) -> Material {
        Material {
            diffuse: BLACK,
            specular: color,
            ..Default::default()
        }
    }

    pub fn glass(transmission: Rgb, eta: Rgb) -> Material {
        Material {
            diffuse: BLACK,
            transmissive: transmission,
            eta,
            ..Default::default()
        }
    }

    pub fn is_emissive(&self) -> bool {
        !self.emissive.is_nearly_black()
    }

    /// All three channels share one refractive index, so transmission needs
    /// no per-channel dispersion.
    pub fn has_uniform_eta(&self) -> bool {
        self.eta.is_uniform()
    }
}

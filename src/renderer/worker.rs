use image::RgbaImage;
use rand::{SeedableRng, rngs::SmallRng};

use crate::{
    camera::Camera,
    geometry::ScreenPoint,
    renderer::{
        RenderSettings,
        cast::{CastContext, cast},
        machinery::RowStrip,
        sampling::{DirectionPool, pixel_jitters},
    },
    scene::Scene,
    util::{BLACK, Rgb},
};

pub struct Worker {
    rng: SmallRng,
}

impl Worker {
    pub fn new(_worker_id: usize) -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn render_strip(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        settings: &RenderSettings,
        pool: &DirectionPool,
        strip: &RowStrip,
        buffer: &mut RgbaImage,
    ) {
        let ctx = CastContext {
            scene,
            settings,
            pool,
        };
        let resolution = camera.get_resolution();

        for y in strip.min_y..strip.max_y {
            for x in 0..resolution.x {
                let point = ScreenPoint::new(x, y);
                let jitters = pixel_jitters(
                    settings.rays_per_pixel.get(),
                    settings.stratified,
                    &mut self.rng,
                );

                let mut pixel_sum = BLACK;
                for jitter in &jitters {
                    let ray = camera.sample_ray(&point, jitter, &mut self.rng);
                    pixel_sum += cast(&ctx, &ray, &mut self.rng);
                }
                let pixel = pixel_sum * (1.0 / jitters.len() as f32);

                buffer.put_pixel(x, y - strip.min_y, color_to_image(pixel));
            }
        }
    }
}

/// Maps a 0-1 f32 rgb pixel to a pixel type compatible with module image.
/// Rendered pixels are always fully opaque.
pub fn color_to_image(color: Rgb) -> image::Rgba<u8> {
    image::Rgba([
        (color.r * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.g * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.b * 255.0).round().clamp(0.0, 255.0) as u8,
        255,
    ])
}

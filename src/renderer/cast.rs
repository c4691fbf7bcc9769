use rand::Rng;

use crate::{
    geometry::{Channel, EPSILON, FloatType, Intersection, Ray, WorldPoint},
    renderer::{
        RenderSettings, TraceMode,
        sampling::{DirectionPool, glossy_jitter},
    },
    scene::{Material, Scene},
    util::{BLACK, ColorExt as _, Rgb, WHITE},
};

/// Everything a single `cast` call chain needs, read-only.
pub struct CastContext<'a> {
    pub scene: &'a Scene,
    pub settings: &'a RenderSettings,
    pub pool: &'a DirectionPool,
}

/// Traces one ray through the scene and returns the radiance it collects,
/// already scaled by the power the ray carried in.
///
/// Recursion is bounded by `max_bounces` and by the energy threshold, so a
/// call tree is at most `max_bounces + 1` levels deep.
pub fn cast(ctx: &CastContext, ray: &Ray, rng: &mut impl Rng) -> Rgb {
    if ray.bounce > ctx.settings.max_bounces {
        return BLACK;
    }
    let threshold = ctx.settings.energy_threshold;
    if ray.power.norm_squared() < threshold * threshold {
        return BLACK;
    }

    let Some(hit) = ctx.scene.closest_intersection_exact(ray) else {
        if ray.bounce == 0 && !ctx.settings.show_background {
            return BLACK;
        }
        return ctx
            .scene
            .environment
            .miss_color(ray.direction.as_ref())
            .mul_each(ray.power);
    };

    let material = &ctx.scene.shape(hit.shape).material;

    // Orient the normal against the incoming ray. A flipped normal means the
    // ray hit the back side, i.e. it is leaving the shape's medium.
    let exiting = ray.direction.dot(&hit.normal) > 0.0;
    let normal = if exiting { -hit.normal } else { hit.normal };
    let hit = Intersection { normal, ..hit };

    let mut color = material.emissive.mul_each(ray.power);

    if !material.diffuse.is_nearly_black() {
        color += diffuse_component(ctx, ray, &hit, material, rng);
    }

    if !ray.shadow {
        if !material.specular.is_nearly_black() {
            color += specular_component(ctx, ray, &hit, material, rng);
        }
        if !material.transmissive.is_nearly_black() {
            color += transmissive_component(ctx, ray, &hit, material, exiting, rng);
        }
    }

    color
}

fn diffuse_component(
    ctx: &CastContext,
    ray: &Ray,
    hit: &Intersection,
    material: &Material,
    rng: &mut impl Rng,
) -> Rgb {
    match ctx.settings.trace_mode {
        TraceMode::Whitted => {
            let mut sum = BLACK;
            for &light in ctx.scene.lights() {
                if light == hit.shape {
                    continue;
                }
                let target = ctx.scene.shape(light).centroid();
                sum += light_sample(ctx, ray, hit, material, target, rng);
            }
            sum + cube_map_component(ctx, ray, hit, material, rng)
        }
        TraceMode::Distributed => {
            let count = ctx.settings.rays_distributed.get();
            let mut sum = BLACK;
            for &light in ctx.scene.lights() {
                if light == hit.shape {
                    continue;
                }
                let shape = ctx.scene.shape(light);
                let toward_hit = hit.point - shape.centroid();

                let mut light_sum = BLACK;
                for _ in 0..count {
                    let target = shape.random_point_facing(&toward_hit, rng);
                    light_sum += light_sample(ctx, ray, hit, material, target, rng);
                }
                sum += light_sum * (1.0 / count as FloatType);
            }
            sum + cube_map_component(ctx, ray, hit, material, rng)
        }
        TraceMode::Path => {
            let count = ctx
                .pool
                .clamped_count(ctx.settings.rays_distributed.get())
                .max(1);
            let mut sum = BLACK;
            for _ in 0..count {
                let (direction, cosine) = ctx.pool.sample_about(&hit.normal, rng);
                let gather = Ray::with_state(
                    hit.point + hit.normal.as_ref() * EPSILON,
                    direction.into_inner(),
                    FloatType::INFINITY,
                    ray.eta,
                    ray.power.mul_each(material.diffuse) * cosine,
                    ray.bounce + 1,
                    false,
                );
                sum += cast(ctx, &gather, rng);
            }
            sum * (1.0 / count as FloatType)
        }
    }
}

/// One shadow ray from the hit point toward `target` on a light.
/// Back-facing lights contribute nothing.
fn light_sample(
    ctx: &CastContext,
    ray: &Ray,
    hit: &Intersection,
    material: &Material,
    target: WorldPoint,
    rng: &mut impl Rng,
) -> Rgb {
    let to_light = target - hit.point;
    let distance = to_light.norm();
    if distance <= EPSILON {
        return BLACK;
    }

    let direction = to_light / distance;
    let n_dot_l = direction.dot(&hit.normal);
    if n_dot_l <= 0.0 {
        return BLACK;
    }

    let shadow_ray = Ray::with_state(
        hit.point + hit.normal.as_ref() * EPSILON,
        direction,
        distance + EPSILON,
        ray.eta,
        ray.power.mul_each(material.diffuse) * n_dot_l,
        ray.bounce + 1,
        true,
    );
    cast(ctx, &shadow_ray, rng)
}

/// Environment-as-light term: hemisphere rays toward an active cube map so
/// the probe lights diffuse surfaces even in the deterministic modes.
/// Path mode gathers the whole hemisphere anyway, so this term stays out of
/// it to avoid counting the probe twice.
fn cube_map_component(
    ctx: &CastContext,
    ray: &Ray,
    hit: &Intersection,
    material: &Material,
    rng: &mut impl Rng,
) -> Rgb {
    if ctx.scene.environment.cube_map.is_none() {
        return BLACK;
    }

    let count = ctx
        .pool
        .clamped_count(ctx.settings.rays_cube_map_lighting.get())
        .max(1);
    let mut sum = BLACK;
    for _ in 0..count {
        let (direction, cosine) = ctx.pool.sample_about(&hit.normal, rng);
        let gather = Ray::with_state(
            hit.point + hit.normal.as_ref() * EPSILON,
            direction.into_inner(),
            FloatType::INFINITY,
            ray.eta,
            ray.power.mul_each(material.diffuse) * cosine,
            ray.bounce + 1,
            true,
        );
        sum += cast(ctx, &gather, rng);
    }
    sum * (1.0 / count as FloatType)
}

fn specular_component(
    ctx: &CastContext,
    ray: &Ray,
    hit: &Intersection,
    material: &Material,
    rng: &mut impl Rng,
) -> Rgb {
    let reflected = ray.reflect(&hit.normal, &hit.point, material.specular);

    let reflected = if ctx.settings.trace_mode != TraceMode::Whitted && material.gloss > 0.0 {
        let jittered = glossy_jitter(&reflected.direction, material.gloss, rng);
        Ray::with_state(
            reflected.origin,
            jittered.into_inner(),
            reflected.max_length,
            reflected.eta,
            reflected.power,
            reflected.bounce,
            reflected.shadow,
        )
    } else {
        reflected
    };

    cast(ctx, &reflected, rng)
}

fn transmissive_component(
    ctx: &CastContext,
    ray: &Ray,
    hit: &Intersection,
    material: &Material,
    exiting: bool,
    rng: &mut impl Rng,
) -> Rgb {
    // Leaving a shape returns the ray to vacuum
    let new_eta = if exiting { WHITE } else { material.eta };

    if ray.eta.is_uniform() && (exiting || material.has_uniform_eta()) {
        let n2 = new_eta.r;
        if n2 <= EPSILON {
            return BLACK;
        }
        match ray.refract(
            &hit.normal,
            None,
            ray.eta.r / n2,
            new_eta,
            &hit.point,
            material.transmissive,
        ) {
            Some(transmitted) => cast(ctx, &transmitted, rng),
            // Total internal reflection
            None => BLACK,
        }
    } else {
        // Chromatic dispersion: one ray per channel, each carrying only its
        // own channel's power. Channels the parent no longer carries are
        // skipped outright.
        let mut sum = BLACK;
        for channel in Channel::ALL {
            let n2 = new_eta.channel(channel);
            if n2 <= EPSILON {
                continue;
            }
            let carried = ray.power.channel(channel) * material.transmissive.channel(channel);
            if carried <= 0.0 {
                continue;
            }
            if let Some(transmitted) = ray.refract(
                &hit.normal,
                Some(channel),
                ray.eta.channel(channel) / n2,
                new_eta,
                &hit.point,
                material.transmissive,
            ) {
                sum += cast(ctx, &transmitted, rng);
            }
        }
        sum
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{WorldPoint, WorldVector},
        scene::{CubeMap, Environment, Geometry, Shape, Sphere},
    };
    use assert2::assert;
    use rand::{SeedableRng as _, rngs::SmallRng};

    fn sphere(center: [f32; 3], radius: f32, material: Material) -> Shape {
        Shape::new(
            Geometry::Sphere(Sphere {
                center: center.into(),
                radius,
            }),
            material,
        )
    }

    fn lit_sphere_scene() -> Scene {
        let mut scene = Scene::new(Environment::flat(BLACK));
        scene.add_shape(sphere([0.0, 0.0, 0.0], 1.0, Material::diffuse(WHITE)));
        scene.add_shape(sphere([0.0, 5.0, 0.0], 0.5, Material::emissive(WHITE)));
        scene.compute_space_partition();
        scene
    }

    fn trace(scene: &Scene, settings: &RenderSettings, ray: &Ray) -> Rgb {
        let mut rng = SmallRng::seed_from_u64(0);
        let pool = DirectionPool::generate(64, &mut rng);
        let ctx = CastContext {
            scene,
            settings,
            pool: &pool,
        };
        cast(&ctx, ray, &mut rng)
    }

    #[test]
    fn exhausted_bounce_budget_returns_black() {
        let scene = lit_sphere_scene();
        let settings = RenderSettings {
            max_bounces: 2,
            ..Default::default()
        };

        let mut ray = Ray::primary(
            WorldPoint::new(0.0, 3.0, 0.0),
            WorldVector::new(0.0, -1.0, 0.0),
        );
        ray.bounce = 3;

        assert!(trace(&scene, &settings, &ray) == BLACK);
    }

    #[test]
    fn depleted_power_returns_black() {
        let scene = lit_sphere_scene();
        let settings = RenderSettings::default();

        let mut ray = Ray::primary(
            WorldPoint::new(0.0, 3.0, 0.0),
            WorldVector::new(0.0, -1.0, 0.0),
        );
        ray.power = Rgb {
            r: 1e-4,
            g: 1e-4,
            b: 1e-4,
        };

        assert!(trace(&scene, &settings, &ray) == BLACK);
    }

    #[test]
    fn primary_miss_honors_show_background() {
        let mut scene = Scene::new(Environment::flat(Rgb {
            r: 0.2,
            g: 0.4,
            b: 0.6,
        }));
        scene.compute_space_partition();

        let ray = Ray::primary(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));

        let visible = RenderSettings {
            show_background: true,
            ..Default::default()
        };
        let hidden = RenderSettings {
            show_background: false,
            ..Default::default()
        };

        assert!(trace(&scene, &visible, &ray).r > 0.1);
        assert!(trace(&scene, &hidden, &ray) == BLACK);
    }

    #[test]
    fn secondary_miss_always_sees_the_environment() {
        let mut scene = Scene::new(Environment::flat(WHITE));
        scene.compute_space_partition();

        let mut ray = Ray::primary(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));
        ray.bounce = 1;

        let hidden = RenderSettings {
            show_background: false,
            ..Default::default()
        };
        assert!(trace(&scene, &hidden, &ray).r > 0.9);
    }

    #[test]
    fn zero_bounces_leaves_only_emission() {
        let scene = lit_sphere_scene();
        let settings = RenderSettings {
            max_bounces: 0,
            ..Default::default()
        };

        // The diffuse sphere emits nothing, so with all children cut off the
        // result is black even though a light is in full view.
        let lit = Ray::primary(
            WorldPoint::new(0.0, 3.0, 0.0),
            WorldVector::new(0.0, -1.0, 0.0),
        );
        assert!(trace(&scene, &settings, &lit) == BLACK);

        // The light itself still glows.
        let at_light = Ray::primary(
            WorldPoint::new(0.0, 7.0, 0.0),
            WorldVector::new(0.0, -1.0, 0.0),
        );
        assert!(trace(&scene, &settings, &at_light).r > 0.9);
    }

    #[test]
    fn sphere_is_lit_toward_the_light_and_dark_away_from_it() {
        let scene = lit_sphere_scene();
        let settings = RenderSettings {
            show_background: false,
            ..Default::default()
        };

        let top = Ray::primary(
            WorldPoint::new(0.0, 3.0, 0.0),
            WorldVector::new(0.0, -1.0, 0.0),
        );
        let bottom = Ray::primary(
            WorldPoint::new(0.0, -3.0, 0.0),
            WorldVector::new(0.0, 1.0, 0.0),
        );

        let lit = trace(&scene, &settings, &top);
        let unlit = trace(&scene, &settings, &bottom);

        assert!(lit.r > 0.5);
        assert!(unlit == BLACK);
    }

    #[test]
    fn occluder_casts_a_shadow() {
        let settings = RenderSettings {
            show_background: false,
            ..Default::default()
        };

        let open = lit_sphere_scene();
        let mut blocked = Scene::new(Environment::flat(BLACK));
        blocked.add_shape(sphere([0.0, 0.0, 0.0], 1.0, Material::diffuse(WHITE)));
        blocked.add_shape(sphere([0.0, 5.0, 0.0], 0.5, Material::emissive(WHITE)));
        blocked.add_shape(sphere([0.0, 3.0, 0.0], 0.8, Material::diffuse(BLACK)));
        blocked.compute_space_partition();

        let ray = Ray::primary(
            WorldPoint::new(2.0, 2.0, 0.0),
            WorldVector::new(-2.0, -1.2, 0.0),
        );

        let lit = trace(&open, &settings, &ray);
        let shadowed = trace(&blocked, &settings, &ray);

        assert!(lit.r > 0.0);
        assert!(shadowed.r < lit.r);
    }

    #[test]
    fn cube_map_lights_a_diffuse_surface_without_explicit_lights() {
        // No emissive shapes anywhere: all illumination has to come from the
        // environment probe sampled by the cube-map gather rays.
        let probe_lit = Environment {
            cube_map: Some(CubeMap::uniform(WHITE)),
            sky: None,
            background: BLACK,
        };
        let mut scene = Scene::new(probe_lit);
        scene.add_shape(sphere([0.0, 0.0, 0.0], 1.0, Material::diffuse(WHITE)));
        scene.compute_space_partition();

        let mut dark = Scene::new(Environment::flat(BLACK));
        dark.add_shape(sphere([0.0, 0.0, 0.0], 1.0, Material::diffuse(WHITE)));
        dark.compute_space_partition();

        let settings = RenderSettings {
            trace_mode: TraceMode::Whitted,
            rays_cube_map_lighting: 8.try_into().unwrap(),
            show_background: false,
            ..Default::default()
        };
        let ray = Ray::primary(
            WorldPoint::new(0.0, 3.0, 0.0),
            WorldVector::new(0.0, -1.0, 0.0),
        );

        assert!(trace(&scene, &settings, &ray).r > 0.1);
        assert!(trace(&dark, &settings, &ray) == BLACK);
    }

    #[test]
    fn mirror_shows_the_light_behind_the_viewer() {
        let mut scene = Scene::new(Environment::flat(BLACK));
        scene.add_shape(sphere([0.0, 0.0, 5.0], 1.0, Material::mirror(WHITE)));
        scene.add_shape(sphere([0.0, 0.0, -5.0], 1.0, Material::emissive(WHITE)));
        scene.compute_space_partition();

        let settings = RenderSettings {
            show_background: false,
            ..Default::default()
        };
        // Hits the mirror head on, reflecting straight back into the light.
        let ray = Ray::primary(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));

        assert!(trace(&scene, &settings, &ray).r > 0.5);
    }

    #[test]
    fn shadow_rays_do_not_reflect() {
        // A mirror between the surface and nothing else: a light sample that
        // hits it must die instead of bouncing to the light sideways.
        let mut scene = Scene::new(Environment::flat(BLACK));
        scene.add_shape(sphere([0.0, 0.0, 0.0], 1.0, Material::diffuse(WHITE)));
        scene.add_shape(sphere([0.0, 5.0, 0.0], 0.5, Material::emissive(WHITE)));
        scene.add_shape(sphere([0.0, 3.0, 0.0], 0.8, Material::mirror(WHITE)));
        scene.compute_space_partition();

        let settings = RenderSettings {
            show_background: false,
            ..Default::default()
        };
        let ray = Ray::primary(
            WorldPoint::new(0.0, 3.0, 3.0),
            WorldVector::new(0.0, -2.0, -2.0),
        );

        assert!(trace(&scene, &settings, &ray) == BLACK);
    }

    #[test]
    fn distributed_and_path_modes_stay_finite() {
        let scene = lit_sphere_scene();
        let ray = Ray::primary(
            WorldPoint::new(0.0, 3.0, 0.0),
            WorldVector::new(0.0, -1.0, 0.0),
        );

        for mode in [TraceMode::Distributed, TraceMode::Path] {
            let settings = RenderSettings {
                trace_mode: mode,
                rays_distributed: 4.try_into().unwrap(),
                max_bounces: 3,
                show_background: false,
                ..Default::default()
            };
            let color = trace(&scene, &settings, &ray);
            assert!(color.r.is_finite() && color.r >= 0.0, "{mode:?}: {color:?}");
        }
    }

    #[test]
    fn path_mode_gathers_light_from_the_hemisphere() {
        let scene = lit_sphere_scene();
        let settings = RenderSettings {
            trace_mode: TraceMode::Path,
            rays_distributed: 32.try_into().unwrap(),
            max_bounces: 2,
            show_background: false,
            ..Default::default()
        };

        let top = Ray::primary(
            WorldPoint::new(0.0, 3.0, 0.0),
            WorldVector::new(0.0, -1.0, 0.0),
        );
        assert!(trace(&scene, &settings, &top).r > 0.0);
    }

    #[test]
    fn glass_sphere_transmits_the_background() {
        let mut scene = Scene::new(Environment::flat(WHITE));
        scene.add_shape(sphere([0.0, 0.0, 5.0], 1.0, Material::glass(
            WHITE,
            Rgb {
                r: 1.1,
                g: 1.1,
                b: 1.1,
            },
        )));
        scene.compute_space_partition();

        let settings = RenderSettings {
            max_bounces: 6,
            ..Default::default()
        };
        let ray = Ray::primary(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));

        // Head-on the refracted ray passes straight through to the white
        // environment, attenuated only by the transmissive color.
        let color = trace(&scene, &settings, &ray);
        assert!(color.r > 0.5);
    }

    #[test]
    fn dispersive_glass_splits_the_channels() {
        let mut scene = Scene::new(Environment::flat(WHITE));
        let material = Material::glass(
            WHITE,
            Rgb {
                r: 1.05,
                g: 1.10,
                b: 1.15,
            },
        );
        scene.add_shape(sphere([0.0, 0.0, 5.0], 1.0, material));
        scene.compute_space_partition();

        let settings = RenderSettings {
            max_bounces: 6,
            ..Default::default()
        };
        let ray = Ray::primary(WorldPoint::origin(), WorldVector::new(0.0, 0.0, 1.0));

        // Each channel still makes it through on the straight path.
        let color = trace(&scene, &settings, &ray);
        assert!(color.r > 0.1 && color.g > 0.1 && color.b > 0.1);
    }
}

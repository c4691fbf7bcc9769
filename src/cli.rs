use octotrace::{
    Camera, RenderSettings, Scene, TraceMode,
    geometry::{ScreenSize, WorldPoint, WorldVector},
    render,
    scene::{Environment, Geometry, Material, ProceduralSky, Shape, Sphere, TriangleMesh},
    util::{Rgb, WHITE},
};

use indicatif::ProgressBar;

fn demo_scene() -> Scene {
    let mut scene = Scene::new(Environment {
        cube_map: None,
        sky: Some(ProceduralSky::new(
            Rgb {
                r: 0.35,
                g: 0.55,
                b: 0.9,
            },
            WHITE,
            7,
        )),
        background: Rgb {
            r: 0.35,
            g: 0.55,
            b: 0.9,
        },
    });

    scene.add_shape(Shape::new(
        Geometry::Mesh(TriangleMesh::quad(
            WorldPoint::new(-20.0, 0.0, -20.0),
            WorldPoint::new(-20.0, 0.0, 20.0),
            WorldPoint::new(20.0, 0.0, 20.0),
            WorldPoint::new(20.0, 0.0, -20.0),
        )),
        Material::diffuse(Rgb {
            r: 0.6,
            g: 0.6,
            b: 0.55,
        }),
    ));

    scene.add_shape(Shape::new(
        Geometry::Sphere(Sphere {
            center: WorldPoint::new(-2.2, 1.0, 0.0),
            radius: 1.0,
        }),
        Material::diffuse(Rgb {
            r: 0.8,
            g: 0.25,
            b: 0.2,
        }),
    ));
    scene.add_shape(Shape::new(
        Geometry::Sphere(Sphere {
            center: WorldPoint::new(0.0, 1.0, 0.0),
            radius: 1.0,
        }),
        Material::mirror(Rgb {
            r: 0.9,
            g: 0.9,
            b: 0.9,
        }),
    ));
    scene.add_shape(Shape::new(
        Geometry::Sphere(Sphere {
            center: WorldPoint::new(2.2, 1.0, 0.0),
            radius: 1.0,
        }),
        Material::glass(
            Rgb {
                r: 0.95,
                g: 0.95,
                b: 0.95,
            },
            Rgb {
                r: 1.51,
                g: 1.53,
                b: 1.55,
            },
        ),
    ));

    scene.add_shape(Shape::new(
        Geometry::Sphere(Sphere {
            center: WorldPoint::new(-4.0, 8.0, 4.0),
            radius: 1.5,
        }),
        Material::emissive(Rgb {
            r: 4.0,
            g: 4.0,
            b: 3.6,
        }),
    ));

    scene.compute_space_partition();
    scene
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let camera = Camera::builder()
        .center(WorldPoint::new(0.0, 2.0, 10.0))
        .forward(WorldVector::new(0.0, -0.1, -1.0))
        .up(WorldVector::new(0.0, 1.0, 0.0))
        .resolution(ScreenSize::new(1024, 768))
        .film_width(36e-3)
        .focal_length(50e-3)
        .f_number(4.8)
        .focus_distance(10.0)
        .build();

    let settings = RenderSettings {
        rays_per_pixel: 64.try_into()?,
        trace_mode: TraceMode::Distributed,
        rays_distributed: 8.try_into()?,
        ..Default::default()
    };

    let bar = ProgressBar::no_length();
    let mut render_progress = render(demo_scene(), camera, settings, |_| {}, {
        let bar = bar.clone();
        move |_| bar.inc(1)
    })?;
    bar.set_length(render_progress.progress().1 as u64);

    render_progress.wait();
    bar.finish();

    render_progress
        .image()
        .lock()
        .expect("Poisoned lock!")
        .save("render.png")?;

    Ok(())
}

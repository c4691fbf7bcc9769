use std::{
    ops::Deref as _,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use image::{GenericImage, GenericImageView, RgbaImage};

use crate::{
    camera::Camera,
    renderer::{RenderSettings, sampling::DirectionPool, worker::Worker},
    scene::Scene,
};

/// A full-width horizontal band of the image, rows `min_y..max_y`.
/// Strips are the unit of work distribution; no two strips share a row.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RowStrip {
    pub min_y: u32,
    pub max_y: u32,
}

impl RowStrip {
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }
}

/// Cuts `height` rows into strips of `rows_per_job` rows, last one possibly
/// shorter.
fn strip_ordering(height: u32, rows_per_job: u32) -> Vec<RowStrip> {
    (0..height)
        .step_by(rows_per_job as usize)
        .map(|min_y| RowStrip {
            min_y,
            max_y: (min_y + rows_per_job).min(height),
        })
        .collect()
}

/// Starts rendering `scene` through `camera` on one pinned worker thread per
/// CPU and returns a progress handle immediately.
///
/// The scene is snapshotted behind an `Arc` for the duration; workers pull
/// strip indices from a shared counter, render into a private buffer and copy
/// the finished strip into the shared framebuffer. Strip completion order is
/// unspecified.
pub fn render<
    F1: Fn(RowStrip) + Send + Sync + 'static,
    F2: Fn(RowStrip) + Send + Sync + 'static,
>(
    scene: Scene,
    camera: Camera,
    settings: RenderSettings,
    started_strip_callback: F1,
    finished_strip_callback: F2,
) -> anyhow::Result<RenderProgress> {
    let resolution = camera.get_resolution();
    let image = RgbaImage::new(resolution.x, resolution.y);
    let pool = DirectionPool::generate(DirectionPool::DEFAULT_SIZE, &mut rand::rng());

    let state = Arc::new(RenderState {
        scene,
        camera,
        settings,
        pool,

        image: Mutex::new(image),

        strip_ordering: strip_ordering(resolution.y, settings.rows_per_job.get()),
        next_strip_index: AtomicUsize::new(0),
    });
    let started_strip_callback = Arc::new(started_strip_callback);
    let finished_strip_callback = Arc::new(finished_strip_callback);

    let cores = core_affinity::get_core_ids().unwrap_or_default();
    let worker_count = if cores.is_empty() {
        num_cpus::get()
    } else {
        cores.len()
    };

    let threads = (0..worker_count)
        .map(|worker_id| {
            let state = Arc::clone(&state);
            let core = cores.get(worker_id).copied();
            let started_strip_callback = Arc::clone(&started_strip_callback);
            let finished_strip_callback = Arc::clone(&finished_strip_callback);

            thread::Builder::new()
                .name(format!("worker{worker_id}"))
                .spawn(move || {
                    if let Some(core) = core {
                        core_affinity::set_for_current(core);
                    }

                    let mut worker = Worker::new(worker_id);
                    let mut buffer =
                        RgbaImage::new(resolution.x, settings.rows_per_job.get());

                    while let Some(strip) = state.get_next_strip() {
                        (started_strip_callback)(*strip);

                        worker.render_strip(
                            &state.scene,
                            &state.camera,
                            &state.settings,
                            &state.pool,
                            strip,
                            &mut buffer,
                        );
                        state
                            .image
                            .lock()
                            .expect("Poisoned lock!")
                            .copy_from(
                                buffer.view(0, 0, resolution.x, strip.height()).deref(),
                                0,
                                strip.min_y,
                            )
                            .unwrap_or_else(|_| {
                                unreachable!("The buffer should always fit into the output")
                            });

                        (finished_strip_callback)(*strip);
                    }
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderProgress {
        render_state: state,
        threads,
    })
}

pub struct RenderProgress {
    render_state: Arc<RenderState>,
    threads: Vec<JoinHandle<()>>,
}

impl RenderProgress {
    /// Return number of processed and total strips.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.render_state.strip_ordering.len();
        let processed = self
            .render_state
            .next_strip_index
            .load(Ordering::Acquire)
            .min(total);
        (processed, total)
    }

    pub fn progress_percent(&self) -> f32 {
        let (processed, total) = self.progress();
        100.0 * (processed as f32) / (total as f32)
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Signal the workers to abort.
    /// Any running workers will still finish their strips, but no new ones will be started.
    pub fn abort(&self) {
        self.render_state
            .next_strip_index
            .store(self.render_state.strip_ordering.len(), Ordering::Release);
    }

    /// Wait for the workers to finish.
    pub fn wait(&mut self) {
        self.threads
            .drain(..)
            .for_each(|handle| handle.join().unwrap());
    }

    pub fn image(&self) -> &Mutex<RgbaImage> {
        &self.render_state.image
    }
}

struct RenderState {
    scene: Scene,
    camera: Camera,
    settings: RenderSettings,
    pool: DirectionPool,

    image: Mutex<RgbaImage>,

    strip_ordering: Vec<RowStrip>,
    next_strip_index: AtomicUsize,
}

impl RenderState {
    fn get_next_strip(&self) -> Option<&RowStrip> {
        let id = self.next_strip_index.fetch_add(1, Ordering::AcqRel);
        self.strip_ordering.get(id)
    }
}

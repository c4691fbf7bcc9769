mod cast;
mod machinery;
mod sampling;
mod worker;

pub use crate::renderer::machinery::{RenderProgress, RowStrip, render};

use std::num::NonZeroU32;

/// Direct-lighting strategy, from deterministic point-light shadow rays to
/// full hemisphere Monte-Carlo gathering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceMode {
    Whitted,
    Distributed,
    Path,
}

#[derive(Copy, Clone, Debug)]
pub struct RenderSettings {
    pub rays_per_pixel: NonZeroU32,
    /// Jittered sub-pixel grid instead of purely random sample positions.
    pub stratified: bool,
    pub trace_mode: TraceMode,
    /// Per-light (Distributed) or per-gather (Path) sample count.
    pub rays_distributed: NonZeroU32,
    /// Hemisphere samples toward an active cube map per diffuse hit.
    /// Ignored when the environment has no cube map or in Path mode, which
    /// already gathers the whole hemisphere.
    pub rays_cube_map_lighting: NonZeroU32,
    pub max_bounces: u32,
    /// Rays whose power norm falls below this are not traced further.
    pub energy_threshold: f32,
    /// When off, primary rays that miss everything stay black.
    pub show_background: bool,
    /// Rows of the image rendered as one work unit.
    pub rows_per_job: NonZeroU32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            rays_per_pixel: const { NonZeroU32::new(16).unwrap() },
            stratified: true,
            trace_mode: TraceMode::Whitted,
            rays_distributed: const { NonZeroU32::new(16).unwrap() },
            rays_cube_map_lighting: const { NonZeroU32::new(16).unwrap() },
            max_bounces: 4,
            energy_threshold: 0.01,
            show_background: true,
            rows_per_job: const { NonZeroU32::new(2).unwrap() },
        }
    }
}

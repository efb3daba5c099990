//! Erosion simulation module
//!
//! Implements two complementary erosion techniques:
//! - **Droplet erosion**: kinematic droplets that follow steepest-descent
//!   paths, exchanging sediment with the ground as they evaporate
//! - **Capacity erosion**: inertial particles with a slope/speed/water
//!   sediment capacity, merged into the field through a blurred buffer
//!
//! Both run single-threaded from one seeded generator, so a seed, an input
//! field and settings fully determine the output.

pub mod droplet;
pub mod heatmap;
pub mod params;
pub mod particle;
pub mod utils;

pub use heatmap::{ErosionRecorder, HeatMaps, NoRecorder};
pub use params::{CapacityErosionSettings, ErosionModel, SimpleErosionSettings};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::convolution::apply_blur;
use crate::error::{ErosionError, Result};
use crate::heightmap::HeightField;

/// Blur radius of the final smoothing pass of the droplet model.
const FINAL_BLUR_RADIUS: u32 = 1;

/// Statistics from erosion simulation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErosionStats {
    /// Number of droplets or particles launched
    pub trajectories: usize,
    /// Total number of simulation steps taken
    pub steps_taken: u64,
    /// Total material picked up (in height units)
    pub total_eroded: f64,
    /// Total material put down
    pub total_deposited: f64,
    /// Droplets stopped by the per-droplet step cap
    pub ceiling_hits: usize,
    /// Sediment still carried by particles when they stopped
    pub sediment_lost: f64,
    /// Merges of the pending change buffer
    pub flushes: usize,
}

impl ErosionStats {
    pub fn mean_steps(&self) -> f64 {
        if self.trajectories == 0 {
            0.0
        } else {
            self.steps_taken as f64 / self.trajectories as f64
        }
    }
}

fn check_shape(field: &HeightField, heat: Option<&HeatMaps>) -> Result<()> {
    if let Some(heat) = heat {
        if (heat.width(), heat.height()) != (field.width, field.height) {
            return Err(ErosionError::InvalidSettings(format!(
                "heatmaps are {}x{} but the field is {}x{}",
                heat.width(),
                heat.height(),
                field.width,
                field.height
            )));
        }
    }
    Ok(())
}

fn seeded_rng(seed: i64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed as u64)
}

/// Run the droplet model and return the smoothed, normalized field.
pub fn erode_simple(field: HeightField, seed: i64, settings: &SimpleErosionSettings) -> Result<HeightField> {
    erode_simple_with_stats(field, seed, settings, None).map(|(field, _)| field)
}

/// [`erode_simple`] that also fills `heat` and reports statistics.
pub fn erode_simple_with_stats(
    mut field: HeightField,
    seed: i64,
    settings: &SimpleErosionSettings,
    heat: Option<&mut HeatMaps>,
) -> Result<(HeightField, ErosionStats)> {
    settings.validate()?;
    check_shape(&field, heat.as_deref())?;
    log::info!(
        "droplet erosion: {} droplets on {}x{} (seed {seed})",
        settings.droplet_cycles,
        field.width,
        field.height
    );

    let mut rng = seeded_rng(seed);
    let stats = match heat {
        Some(heat) => droplet::simulate(&mut field, settings, &mut rng, heat)?,
        None => droplet::simulate(&mut field, settings, &mut rng, &mut NoRecorder)?,
    };

    let mut field = apply_blur(&field, FINAL_BLUR_RADIUS);
    field.normalize();
    field.ensure_finite()?;

    log_stats("droplet", &stats);
    Ok((field, stats))
}

/// Run the capacity model and return the normalized field.
pub fn erode_capacity(field: HeightField, seed: i64, settings: &CapacityErosionSettings) -> Result<HeightField> {
    erode_capacity_with_stats(field, seed, settings, None).map(|(field, _)| field)
}

/// [`erode_capacity`] that also fills `heat` and reports statistics.
pub fn erode_capacity_with_stats(
    mut field: HeightField,
    seed: i64,
    settings: &CapacityErosionSettings,
    heat: Option<&mut HeatMaps>,
) -> Result<(HeightField, ErosionStats)> {
    settings.validate()?;
    check_shape(&field, heat.as_deref())?;
    log::info!(
        "capacity erosion: {} particles on {}x{} (seed {seed})",
        settings.particle_count,
        field.width,
        field.height
    );

    let mut rng = seeded_rng(seed);
    let stats = match heat {
        Some(heat) => particle::simulate(&mut field, settings, &mut rng, heat)?,
        None => particle::simulate(&mut field, settings, &mut rng, &mut NoRecorder)?,
    };

    field.normalize();
    field.ensure_finite()?;

    log_stats("capacity", &stats);
    Ok((field, stats))
}

fn log_stats(model: &str, stats: &ErosionStats) {
    log::info!(
        "{model} erosion done: {} trajectories, {:.1} mean steps",
        stats.trajectories,
        stats.mean_steps()
    );
    log::debug!(
        "{model} erosion: eroded {:.4}, deposited {:.4}, lost {:.4}, {} flushes, {} capped",
        stats.total_eroded,
        stats.total_deposited,
        stats.sediment_lost,
        stats.flushes,
        stats.ceiling_hits
    );
}

impl ErosionModel {
    /// Run whichever model this is.
    pub fn run(
        &self,
        field: HeightField,
        seed: i64,
        heat: Option<&mut HeatMaps>,
    ) -> Result<(HeightField, ErosionStats)> {
        match self {
            Self::Droplet(settings) => erode_simple_with_stats(field, seed, settings, heat),
            Self::Capacity(settings) => erode_capacity_with_stats(field, seed, settings, heat),
        }
    }
}

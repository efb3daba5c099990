//! Sediment-capacity particle erosion.
//!
//! Particles roll down the bilinear gradient with inertia. Capacity depends on
//! slope, speed and water; a particle under capacity erodes a disc around its
//! cell, one over capacity deposits the surplus. Changes go to a pending
//! buffer which is blurred and merged into the field every `FLUSH_INTERVAL`
//! particles. Particles read height plus pending changes, so they see recent
//! deposits before the flush.

use std::f32::consts::TAU;

use rand::Rng;

use crate::convolution::{apply_blur, Kernel};
use crate::erosion::heatmap::ErosionRecorder;
use crate::erosion::params::CapacityErosionSettings;
use crate::erosion::utils::{cell_of, create_erosion_mask, gradient_at, height_with_pending, is_inside};
use crate::erosion::ErosionStats;
use crate::error::Result;
use crate::heightmap::HeightField;

/// Particles simulated between merges of the pending buffer.
pub const FLUSH_INTERVAL: usize = 100;

/// Fractional offsets below this collapse the splat onto fewer cells.
const SPLAT_EPSILON: f32 = 1e-4;

const INITIAL_VELOCITY: f32 = 1.0;
const INITIAL_WATER: f32 = 10.0;

/// A water particle for the capacity model
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleState {
    /// Position (floating point for interpolation)
    pub x: f32,
    pub y: f32,
    /// Movement direction (normalized after the first step)
    pub dir_x: f32,
    pub dir_y: f32,
    pub velocity: f32,
    pub water: f32,
    pub sediment: f32,
}

impl ParticleState {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            dir_x: 0.0,
            dir_y: 0.0,
            velocity: INITIAL_VELOCITY,
            water: INITIAL_WATER,
            sediment: 0.0,
        }
    }
}

/// Summary of one finished particle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParticleOutcome {
    pub steps: usize,
    pub eroded: f64,
    pub deposited: f64,
    /// Sediment still carried when the particle stopped
    pub lost: f64,
}

/// Spread `value` over the cells around `(x, y)` with bilinear weights.
///
/// An axis collapses onto the floor cell when the fractional offset is below
/// `SPLAT_EPSILON` or the neighbouring column (row) is off the grid, giving a
/// 1, 2 or 4 cell splat.
pub fn deposit<R: ErosionRecorder + ?Sized>(
    changes: &mut HeightField,
    recorder: &mut R,
    value: f32,
    x: f32,
    y: f32,
) {
    let (x0, y0) = cell_of(x, y);
    let u = x - x0 as f32;
    let v = y - y0 as f32;
    let collapse_x = x0 + 1 >= changes.width || u < SPLAT_EPSILON;
    let collapse_y = y0 + 1 >= changes.height || v < SPLAT_EPSILON;

    let mut add = |cx: usize, cy: usize, weight: f32| {
        let amount = value * weight;
        *changes.get_mut(cx, cy) += amount;
        recorder.record_saturation(cx, cy, amount);
    };

    match (collapse_x, collapse_y) {
        (true, true) => add(x0, y0, 1.0),
        (true, false) => {
            add(x0, y0, 1.0 - v);
            add(x0, y0 + 1, v);
        }
        (false, true) => {
            add(x0, y0, 1.0 - u);
            add(x0 + 1, y0, u);
        }
        (false, false) => {
            add(x0, y0, (1.0 - u) * (1.0 - v));
            add(x0 + 1, y0, u * (1.0 - v));
            add(x0, y0 + 1, (1.0 - u) * v);
            add(x0 + 1, y0 + 1, u * v);
        }
    }
}

/// Remove `value` from the disc `mask` centred on cell `(cx, cy)`.
///
/// Taps off the grid are skipped. Returns the amount actually removed.
pub fn erode<R: ErosionRecorder + ?Sized>(
    changes: &mut HeightField,
    recorder: &mut R,
    mask: &Kernel,
    value: f32,
    cx: usize,
    cy: usize,
) -> f32 {
    let (width, height) = (changes.width, changes.height);
    let mut removed = 0.0;
    for (tx, ty, w) in mask.taps(cx as isize, cy as isize, width, height) {
        let amount = value * w;
        *changes.get_mut(tx, ty) -= amount;
        recorder.record_saturation(tx, ty, -amount);
        removed += amount;
    }
    removed
}

/// Advance a particle by one step.
///
/// Returns `None` when the next position leaves the grid; the particle keeps
/// its sediment in that case.
pub fn step_particle<G: Rng, R: ErosionRecorder + ?Sized>(
    field: &HeightField,
    changes: &mut HeightField,
    mask: &Kernel,
    state: &ParticleState,
    settings: &CapacityErosionSettings,
    rng: &mut G,
    recorder: &mut R,
) -> Option<ParticleState> {
    let mut next = *state;

    let (grad_x, grad_y) = gradient_at(field, state.x, state.y);
    let mut dir_x = state.dir_x * settings.inertia - grad_x * (1.0 - settings.inertia);
    let mut dir_y = state.dir_y * settings.inertia - grad_y * (1.0 - settings.inertia);
    let len = (dir_x * dir_x + dir_y * dir_y).sqrt();
    if len > f32::EPSILON {
        dir_x /= len;
        dir_y /= len;
    } else {
        let angle = rng.gen_range(0.0..TAU);
        dir_x = angle.cos();
        dir_y = angle.sin();
    }

    let new_x = state.x + dir_x;
    let new_y = state.y + dir_y;
    if !is_inside(field, new_x, new_y) {
        return None;
    }

    let old_height = height_with_pending(field, changes, state.x, state.y);
    let new_height = height_with_pending(field, changes, new_x, new_y);
    let delta_height = new_height - old_height;

    if delta_height > 0.0 {
        // Uphill: fill the pit behind us, all on the cell being left
        let amount = state.sediment.min(delta_height);
        deposit(changes, recorder, amount, state.x.floor(), state.y.floor());
        next.sediment -= amount;
    } else {
        let capacity = (-delta_height).max(settings.min_slope_param)
            * state.velocity
            * state.water
            * settings.particle_capacity;

        if state.sediment > capacity {
            let amount = (state.sediment - capacity) * settings.particle_deposition_speed;
            deposit(changes, recorder, amount, state.x, state.y);
            next.sediment -= amount;
        } else {
            let amount = (capacity - state.sediment).min(-delta_height) * settings.erosion_speed;
            let (cx, cy) = cell_of(state.x, state.y);
            next.sediment += erode(changes, recorder, mask, amount, cx, cy);
        }
    }

    next.velocity = (state.velocity * state.velocity + delta_height * settings.gravity)
        .max(0.0)
        .sqrt();
    next.water = state.water * (1.0 - settings.particle_evaporation);
    next.x = new_x;
    next.y = new_y;
    next.dir_x = dir_x;
    next.dir_y = dir_y;

    let (ox, oy) = cell_of(state.x, state.y);
    recorder.record_time(ox, oy, 1.0);
    let (nx, ny) = cell_of(new_x, new_y);
    recorder.record_visit(nx, ny);

    Some(next)
}

/// Run one particle from a random position until it dies or leaves the grid.
pub fn simulate_particle<G: Rng, R: ErosionRecorder + ?Sized>(
    field: &HeightField,
    changes: &mut HeightField,
    mask: &Kernel,
    settings: &CapacityErosionSettings,
    rng: &mut G,
    recorder: &mut R,
) -> ParticleOutcome {
    let x = rng.gen::<f32>() * (field.width - 1) as f32;
    let y = rng.gen::<f32>() * (field.height - 1) as f32;
    let mut state = ParticleState::new(x, y);
    let mut outcome = ParticleOutcome::default();

    let (cx, cy) = cell_of(x, y);
    recorder.record_start(cx, cy);
    recorder.record_visit(cx, cy);

    while outcome.steps < settings.max_particle_life && state.water > 0.0 {
        let Some(next) = step_particle(field, changes, mask, &state, settings, rng, recorder) else {
            break;
        };
        let picked_up = next.sediment - state.sediment;
        if picked_up > 0.0 {
            outcome.eroded += picked_up as f64;
        } else {
            outcome.deposited -= picked_up as f64;
        }
        outcome.steps += 1;
        state = next;
    }

    outcome.lost = state.sediment as f64;
    outcome
}

/// Merge pending changes into the field and clear the buffer.
///
/// With a positive blur weight `w` (clamped to 1) the field receives
/// `w * blur(changes) + (1 - w) * changes`; otherwise the raw changes.
pub fn flush_changes(
    field: &mut HeightField,
    changes: &mut HeightField,
    blur_radius: u32,
    blur_weight: f32,
) -> Result<()> {
    if blur_weight <= 0.0 {
        field.add_scaled(changes, 1.0);
    } else {
        let weight = blur_weight.min(1.0);
        let blurred = apply_blur(changes, blur_radius);
        field.add_scaled(&blurred, weight);
        field.add_scaled(changes, 1.0 - weight);
    }
    changes.fill(0.0);
    field.ensure_finite()
}

/// Launch `settings.particle_count` particles, flushing every
/// `FLUSH_INTERVAL` particles and after the last one.
pub fn simulate<G: Rng, R: ErosionRecorder + ?Sized>(
    field: &mut HeightField,
    settings: &CapacityErosionSettings,
    rng: &mut G,
    recorder: &mut R,
) -> Result<ErosionStats> {
    let mut stats = ErosionStats::default();
    if field.is_empty() {
        return Ok(stats);
    }

    let mask = create_erosion_mask(settings.particle_erosion_radius, field.width, field.height);
    let mut changes = HeightField::new_with(field.width, field.height, 0.0);

    for p in 0..settings.particle_count {
        let outcome = simulate_particle(field, &mut changes, &mask, settings, rng, recorder);

        stats.trajectories += 1;
        stats.steps_taken += outcome.steps as u64;
        stats.total_eroded += outcome.eroded;
        stats.total_deposited += outcome.deposited;
        stats.sediment_lost += outcome.lost;

        if p % FLUSH_INTERVAL == FLUSH_INTERVAL - 1 || p + 1 == settings.particle_count {
            flush_changes(field, &mut changes, settings.erosion_blur_radius, settings.erosion_blur_weight)?;
            stats.flushes += 1;
            log::debug!("flushed pending changes after {} particles", p + 1);
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erosion::heatmap::{HeatMaps, NoRecorder};
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ramp(width: usize, height: usize) -> HeightField {
        let mut field = HeightField::new_with(width, height, 0.0);
        for (x, y, h) in field.iter_mut() {
            *h = 1.0 - 0.05 * x as f32 - 0.01 * y as f32;
        }
        field
    }

    #[test]
    fn test_deposit_bilinear_interior() {
        let mut changes = HeightField::new_with(4, 4, 0.0);
        deposit(&mut changes, &mut NoRecorder, 1.0, 1.25, 2.5);

        assert_abs_diff_eq!(*changes.get(1, 2), 0.375, epsilon = 1e-6);
        assert_abs_diff_eq!(*changes.get(2, 2), 0.125, epsilon = 1e-6);
        assert_abs_diff_eq!(*changes.get(1, 3), 0.375, epsilon = 1e-6);
        assert_abs_diff_eq!(*changes.get(2, 3), 0.125, epsilon = 1e-6);
        assert_abs_diff_eq!(changes.total(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_deposit_on_grid_point_uses_one_cell() {
        let mut changes = HeightField::new_with(4, 4, 0.0);
        deposit(&mut changes, &mut NoRecorder, 0.5, 2.0, 1.0);
        assert_eq!(*changes.get(2, 1), 0.5);
        assert_abs_diff_eq!(changes.total(), 0.5, epsilon = 1e-7);
    }

    #[test]
    fn test_deposit_last_column_splits_vertically() {
        let mut changes = HeightField::new_with(3, 3, 0.0);
        let mut heat = HeatMaps::new(3, 3);
        deposit(&mut changes, &mut heat, 1.0, 2.6, 0.25);

        // Near row gets 1 - v, far row gets v
        assert_abs_diff_eq!(*changes.get(2, 0), 0.75, epsilon = 1e-6);
        assert_abs_diff_eq!(*changes.get(2, 1), 0.25, epsilon = 1e-6);
        assert_eq!(heat.saturation_changes, changes);
    }

    #[test]
    fn test_erode_skips_off_grid_taps() {
        let mask = create_erosion_mask(1, 5, 5);
        let mut changes = HeightField::new_with(5, 5, 0.0);

        let removed = erode(&mut changes, &mut NoRecorder, &mask, 1.0, 0, 0);

        let kept = mask.weight(0, 0) + mask.weight(1, 0) + mask.weight(0, 1);
        assert_abs_diff_eq!(removed, kept, epsilon = 1e-6);
        assert!(removed < 1.0);
        assert_abs_diff_eq!(changes.total() as f32, -removed, epsilon = 1e-6);

        let removed = erode(&mut changes, &mut NoRecorder, &mask, 1.0, 2, 2);
        assert_abs_diff_eq!(removed, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_downhill_step_erodes() {
        let field = ramp(10, 10);
        let mut changes = HeightField::new_with(10, 10, 0.0);
        let mask = create_erosion_mask(1, 10, 10);
        let settings = CapacityErosionSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let state = ParticleState::new(3.5, 4.5);

        let next = step_particle(&field, &mut changes, &mask, &state, &settings, &mut rng, &mut NoRecorder)
            .expect("step stays inside");

        assert!(next.x > state.x, "particle should roll toward lower x");
        assert!(next.sediment > 0.0);
        assert_abs_diff_eq!(changes.total() as f32, -next.sediment, epsilon = 1e-6);
        assert_abs_diff_eq!(next.water, 7.5, epsilon = 1e-6);
        assert_abs_diff_eq!((next.dir_x * next.dir_x + next.dir_y * next.dir_y).sqrt(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_uphill_step_deposits_behind() {
        let field = ramp(10, 10);
        let mut changes = HeightField::new_with(10, 10, 0.0);
        let mask = create_erosion_mask(1, 10, 10);
        let settings = CapacityErosionSettings {
            inertia: 1.0,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut state = ParticleState::new(5.5, 5.5);
        state.dir_x = -1.0;
        state.sediment = 0.02;
        let mut heat = HeatMaps::new(10, 10);

        let next = step_particle(&field, &mut changes, &mask, &state, &settings, &mut rng, &mut heat).unwrap();

        // Rising 0.05 while carrying 0.02: everything is dropped on the cell left behind
        assert_abs_diff_eq!(next.sediment, 0.0, epsilon = 1e-7);
        assert_eq!(*changes.get(5, 5), 0.02);
        assert_abs_diff_eq!(changes.total() as f32, 0.02, epsilon = 1e-7);
        assert_eq!(*changes.get(4, 5), 0.0);
        assert_eq!(*changes.get(6, 6), 0.0);
        assert_eq!(heat.saturation_changes, changes);
        assert!(next.velocity > state.velocity);
    }

    #[test]
    fn test_step_off_grid_terminates() {
        let field = ramp(4, 4);
        let mut changes = HeightField::new_with(4, 4, 0.0);
        let mask = create_erosion_mask(1, 4, 4);
        let settings = CapacityErosionSettings {
            inertia: 1.0,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut state = ParticleState::new(0.5, 1.5);
        state.dir_x = -1.0;

        let next = step_particle(&field, &mut changes, &mask, &state, &settings, &mut rng, &mut NoRecorder);
        assert!(next.is_none());
        assert_eq!(changes.total(), 0.0);
    }

    #[test]
    fn test_flat_ground_picks_random_direction() {
        let field = HeightField::new_with(9, 9, 0.5);
        let mut changes = HeightField::new_with(9, 9, 0.0);
        let mask = create_erosion_mask(1, 9, 9);
        let settings = CapacityErosionSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let state = ParticleState::new(4.5, 4.5);

        let next = step_particle(&field, &mut changes, &mask, &state, &settings, &mut rng, &mut NoRecorder).unwrap();

        let moved = ((next.x - state.x).powi(2) + (next.y - state.y).powi(2)).sqrt();
        assert_abs_diff_eq!(moved, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_flush_blends_blurred_and_raw() {
        let mut field = HeightField::new_with(5, 5, 1.0);
        let mut changes = HeightField::new_with(5, 5, 0.0);
        changes.set(2, 2, 0.4);
        let blurred = apply_blur(&changes, 1);

        flush_changes(&mut field, &mut changes, 1, 0.25).unwrap();

        let expected = 1.0 + 0.25 * blurred.get(2, 2) + 0.75 * 0.4;
        assert_abs_diff_eq!(*field.get(2, 2), expected, epsilon = 1e-6);
        assert_abs_diff_eq!(*field.get(1, 2), 1.0 + 0.25 * blurred.get(1, 2), epsilon = 1e-6);
        assert!(changes.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_flush_without_blur_adds_raw_changes() {
        let mut field = HeightField::new_with(3, 3, 0.0);
        let mut changes = HeightField::new_with(3, 3, 0.0);
        changes.set(0, 0, -0.3);
        flush_changes(&mut field, &mut changes, 2, 0.0).unwrap();
        assert_eq!(*field.get(0, 0), -0.3);
        assert_eq!(*field.get(1, 1), 0.0);
    }

    #[test]
    fn test_particles_only_lose_carried_sediment() {
        let mut field = ramp(32, 32);
        let before = field.total();
        let settings = CapacityErosionSettings {
            particle_count: 250,
            erosion_blur_weight: 0.0,
            ..Default::default()
        };
        let mut heat = HeatMaps::new(32, 32);
        let mut rng = ChaCha8Rng::seed_from_u64(21);

        let stats = simulate(&mut field, &settings, &mut rng, &mut heat).unwrap();

        assert_eq!(stats.trajectories, 250);
        assert_eq!(stats.flushes, 3);
        assert!(stats.total_eroded > 0.0);
        assert!(stats.sediment_lost >= 0.0);

        let net = field.total() - before;
        assert!((net + stats.sediment_lost).abs() < 1e-2, "net {net}, lost {}", stats.sediment_lost);
        assert!((heat.saturation_changes.total() - net).abs() < 1e-2);
        assert_eq!(heat.starts.total() as usize, 250);
    }

    #[test]
    fn test_particle_runs_are_deterministic() {
        let settings = CapacityErosionSettings {
            particle_count: 120,
            ..Default::default()
        };
        let run = || {
            let mut field = ramp(16, 12);
            let mut rng = ChaCha8Rng::seed_from_u64(8);
            simulate(&mut field, &settings, &mut rng, &mut NoRecorder).unwrap();
            field
        };
        assert_eq!(run(), run());
    }
}

//! Kinematic droplet erosion.
//!
//! A droplet starts on a cell, follows a cached steepest-descent path over
//! 4-connected neighbours and then keeps descending with live lookups. Each
//! step:
//! 1. Pick the next cell (cached path first, then the lowest lower neighbour)
//! 2. Compute transit time from 1D kinematics along the slope, with friction
//! 3. Evaporate water for that time and move sediment between the droplet
//!    and the cell it is leaving (erode while under saturation, deposit when
//!    the shrinking droplet can no longer hold its load)
//! 4. Move to the next cell
//!
//! When the water is gone the remaining sediment is dropped on the current
//! cell, so the model conserves total height.

use rand::Rng;

use crate::erosion::heatmap::ErosionRecorder;
use crate::erosion::params::SimpleErosionSettings;
use crate::erosion::ErosionStats;
use crate::error::{ErosionError, Result};
use crate::heightmap::HeightField;

/// Offset that keeps an entry point just inside the destination cell.
const BORDER_EPSILON: f32 = 0.001;

const GRAVITY: f32 = 9.8;

/// Speed of a freshly launched droplet.
const INITIAL_SPEED: f32 = 100.0;

#[inline]
fn is_near_zero(value: f32) -> bool {
    value.abs() < f32::EPSILON
}

/// State of one droplet between steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DropletState {
    /// Current cell
    pub x: usize,
    pub y: usize,
    /// Continuous position in cell units; starts at the cell centre
    pub position: (f32, f32),
    /// Remaining water mass
    pub size: f32,
    /// Carried sediment
    pub saturation: f32,
    pub speed: f32,
    /// Steps taken so far
    pub cycles: usize,
    /// Next index into the cached descent path
    pub path_cursor: usize,
}

impl DropletState {
    pub fn new(x: usize, y: usize, settings: &SimpleErosionSettings) -> Self {
        Self {
            x,
            y,
            position: (x as f32 + 0.5, y as f32 + 0.5),
            size: settings.droplet_mass,
            saturation: 0.0,
            speed: INITIAL_SPEED,
            cycles: 0,
            path_cursor: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.size > 0.0
    }
}

/// Summary of one finished droplet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DropletOutcome {
    pub steps: usize,
    pub eroded: f64,
    pub deposited: f64,
    pub hit_ceiling: bool,
}

/// Lowest strictly lower 4-connected neighbour, or the cell itself at a
/// local minimum. Ties keep the first in east, south, west, north order.
pub fn find_next_position(field: &HeightField, x: usize, y: usize) -> (usize, usize) {
    let mut best = (x, y);
    let mut best_height = *field.get(x, y);
    for (nx, ny) in field.neighbors(x, y) {
        let h = *field.get(nx, ny);
        if h < best_height {
            best = (nx, ny);
            best_height = h;
        }
    }
    best
}

/// Fill `path` with the descent from `(x, y)`: the start cell followed by
/// each steepest step until a local minimum. Heights strictly decrease along
/// the path, so it always ends.
pub fn descent_path(field: &HeightField, x: usize, y: usize, path: &mut Vec<(usize, usize)>) {
    path.clear();
    let (mut cx, mut cy) = (x, y);
    loop {
        path.push((cx, cy));
        let (nx, ny) = find_next_position(field, cx, cy);
        if (nx, ny) == (cx, cy) {
            break;
        }
        cx = nx;
        cy = ny;
    }
}

/// Vector from the droplet's continuous position to the entry point of the
/// next cell. The entry point sits `BORDER_EPSILON` inside the border the
/// droplet crosses, so the vector never degenerates for a real move.
pub fn path_vector(from: (usize, usize), to: (usize, usize), position: (f32, f32)) -> (f32, f32) {
    if from == to {
        return (0.0, 0.0);
    }

    let mut end_x = to.0 as f32;
    let mut end_y = to.1 as f32;
    if to.0 > from.0 {
        end_x += BORDER_EPSILON;
    } else if to.0 < from.0 {
        end_x += 1.0 - BORDER_EPSILON;
    }
    if to.1 > from.1 {
        end_y += BORDER_EPSILON;
    } else if to.1 < from.1 {
        end_y += 1.0 - BORDER_EPSILON;
    }

    (end_x - position.0, end_y - position.1)
}

/// Duration of one step and whether the droplet actually leaves its cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transit {
    pub time: f32,
    pub moved: bool,
}

/// Time to cover `vector` from `from` to `to` starting at `speed`.
///
/// Solves `a/2 t^2 + v t - s = 0` with `a = g (sin θ - μ cos θ)` and takes
/// the smallest positive root. Staying put, a stalled droplet (no speed and
/// no acceleration), or a slope with no positive root all fall back to the
/// settings' zero time interval.
pub fn transit_time(
    field: &HeightField,
    from: (usize, usize),
    to: (usize, usize),
    vector: (f32, f32),
    speed: f32,
    settings: &SimpleErosionSettings,
) -> Transit {
    let zero_time = settings.zero_time_interval();
    if from == to {
        return Transit { time: zero_time, moved: false };
    }

    let distance = (vector.0 * vector.0 + vector.1 * vector.1).sqrt() * settings.block_distance;
    let difference = *field.get(from.0, from.1) - *field.get(to.0, to.1);
    let angle = (difference * settings.height_to_meters / settings.block_distance).atan();
    let acceleration = GRAVITY * (angle.sin() - settings.friction * angle.cos());

    let zero_acceleration = is_near_zero(acceleration);
    if zero_acceleration && is_near_zero(speed) {
        return Transit { time: zero_time, moved: false };
    }
    if zero_acceleration {
        return Transit { time: distance / speed, moved: true };
    }

    let discriminant = speed * speed + 2.0 * acceleration * distance;
    if discriminant < 0.0 {
        return Transit { time: zero_time, moved: true };
    }

    let root = discriminant.sqrt();
    let t1 = (-speed + root) / acceleration;
    let t2 = (-speed - root) / acceleration;
    let time = match (t1 > 0.0, t2 > 0.0) {
        (true, true) => t1.min(t2),
        (true, false) => t1,
        (false, true) => t2,
        (false, false) => zero_time,
    };

    Transit { time, moved: true }
}

/// Evaporate for `time` and exchange sediment with cell `(x, y)`.
///
/// Target saturation relaxes toward `saturation + time * rate`, where the
/// rate blends a base pickup with one scaled by how full the droplet is,
/// clamped to `[0, size * saturation_max_proportion]`. Erosion is capped by
/// the matter present in the cell; deposition is capped by `ceiling` when
/// given. A droplet that runs dry drops everything it carries.
pub fn evaporate_and_saturate(
    field: &mut HeightField,
    state: &mut DropletState,
    time: f32,
    x: usize,
    y: usize,
    ceiling: Option<f32>,
    settings: &SimpleErosionSettings,
) -> Result<()> {
    let proportion = if state.size > 0.0 { state.saturation / state.size } else { 0.0 };
    let fullness = proportion / settings.saturation_max_proportion;
    let rate = 0.1 * settings.saturation_speed + 0.9 * fullness * settings.saturation_speed;

    state.size -= time * settings.evaporation_speed;
    let cell = field.get_mut(x, y);

    if state.size <= 0.0 {
        state.size = 0.0;
        *cell += state.saturation;
        state.saturation = 0.0;
        return check_cell(*cell, x, y);
    }

    let max_saturation = state.size * settings.saturation_max_proportion;
    let target = (state.saturation + time * rate).min(max_saturation).max(0.0);

    let mut change = target - state.saturation;
    let available = cell.max(0.0);
    if change > 0.0 && change > available {
        change = available;
    }
    if change < 0.0 {
        if let Some(ceiling) = ceiling {
            change = change.max((*cell - ceiling).min(0.0));
        }
    }

    *cell -= change;
    state.saturation += change;

    check_cell(*cell, x, y)
}

#[inline]
fn check_cell(value: f32, x: usize, y: usize) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ErosionError::NonFiniteValue { x, y, value })
    }
}

/// Advance a droplet by one step.
///
/// Returns the next state and the elevation change applied to the cell the
/// droplet left.
pub fn step_droplet<R: ErosionRecorder + ?Sized>(
    field: &mut HeightField,
    state: &DropletState,
    path: &[(usize, usize)],
    settings: &SimpleErosionSettings,
    recorder: &mut R,
) -> Result<(DropletState, f32)> {
    let mut next = *state;
    let from = (state.x, state.y);

    let candidate = match path.get(state.path_cursor) {
        Some(&cell) => cell,
        None => find_next_position(field, state.x, state.y),
    };
    next.path_cursor += 1;

    let vector = path_vector(from, candidate, state.position);
    let transit = transit_time(field, from, candidate, vector, state.speed, settings);
    let target = if transit.moved { candidate } else { from };
    if target == from {
        next.speed = 0.0;
    }

    let before = *field.get(from.0, from.1);
    evaporate_and_saturate(field, &mut next, transit.time, from.0, from.1, None, settings)?;
    let delta = *field.get(from.0, from.1) - before;

    if target != from {
        recorder.record_visit(target.0, target.1);
        next.position.0 += vector.0;
        next.position.1 += vector.1;
    }
    recorder.record_time(from.0, from.1, transit.time);
    recorder.record_saturation(from.0, from.1, delta);

    next.x = target.0;
    next.y = target.1;
    next.cycles += 1;

    Ok((next, delta))
}

/// Run one droplet from `(x, y)` until its water is gone.
///
/// `path` is scratch space reused across droplets.
pub fn simulate_droplet<R: ErosionRecorder + ?Sized>(
    field: &mut HeightField,
    x: usize,
    y: usize,
    settings: &SimpleErosionSettings,
    path: &mut Vec<(usize, usize)>,
    recorder: &mut R,
) -> Result<DropletOutcome> {
    descent_path(field, x, y, path);

    let mut state = DropletState::new(x, y, settings);
    let mut outcome = DropletOutcome::default();

    recorder.record_start(x, y);
    recorder.record_visit(x, y);

    while state.is_active() {
        if state.cycles >= settings.max_droplet_steps {
            log::warn!(
                "droplet from ({}, {}) still active after {} steps at ({}, {}); dropping {:.4} sediment",
                x, y, state.cycles, state.x, state.y, state.saturation
            );
            let cell = field.get_mut(state.x, state.y);
            *cell += state.saturation;
            check_cell(*cell, state.x, state.y)?;
            recorder.record_saturation(state.x, state.y, state.saturation);
            outcome.deposited += state.saturation as f64;
            outcome.hit_ceiling = true;
            break;
        }

        let (next, delta) = step_droplet(field, &state, path, settings, recorder)?;
        if delta > 0.0 {
            outcome.deposited += delta as f64;
        } else {
            outcome.eroded -= delta as f64;
        }
        state = next;
    }

    outcome.steps = state.cycles;
    Ok(outcome)
}

/// Launch `settings.droplet_cycles` droplets from uniformly random cells.
pub fn simulate<R: Rng, Rec: ErosionRecorder + ?Sized>(
    field: &mut HeightField,
    settings: &SimpleErosionSettings,
    rng: &mut R,
    recorder: &mut Rec,
) -> Result<ErosionStats> {
    let mut stats = ErosionStats::default();
    if field.is_empty() {
        return Ok(stats);
    }

    let mut path = Vec::new();
    for _ in 0..settings.droplet_cycles {
        let x = rng.gen_range(0..field.width);
        let y = rng.gen_range(0..field.height);
        let outcome = simulate_droplet(field, x, y, settings, &mut path, recorder)?;

        stats.trajectories += 1;
        stats.steps_taken += outcome.steps as u64;
        stats.total_eroded += outcome.eroded;
        stats.total_deposited += outcome.deposited;
        if outcome.hit_ceiling {
            stats.ceiling_hits += 1;
        }
    }

    Ok(stats)
}

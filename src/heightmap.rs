use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{ErosionError, Result};
use crate::tilemap::Tilemap;

/// Elevation grid mutated in place by both erosion models.
pub type HeightField = Tilemap<f32>;

// =============================================================================
// FIELD OPERATIONS
// =============================================================================

impl Tilemap<f32> {
    /// Smallest and largest value, or `None` for an empty field.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut iter = self.as_slice().iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Linearly rescale so the minimum maps to 0.0 and the maximum to 1.0.
    ///
    /// Empty and constant fields are left untouched.
    pub fn normalize(&mut self) {
        let Some((min_h, max_h)) = self.min_max() else {
            return;
        };
        let range = max_h - min_h;
        if !(range > 0.0) {
            return;
        }
        for v in self.as_mut_slice() {
            *v = (*v - min_h) / range;
        }
    }

    /// Sum of all cells, accumulated in f64.
    pub fn total(&self) -> f64 {
        self.as_slice().iter().map(|&v| v as f64).sum()
    }

    /// Add `other * coefficient` cell by cell. Both maps must share a shape.
    pub fn add_scaled(&mut self, other: &Tilemap<f32>, coefficient: f32) {
        assert_eq!(
            (self.width, self.height),
            (other.width, other.height),
            "cannot sum maps of different shapes"
        );
        for (v, &o) in self.as_mut_slice().iter_mut().zip(other.as_slice()) {
            *v += o * coefficient;
        }
    }

    /// Fail with [`ErosionError::NonFiniteValue`] on the first NaN or infinite cell.
    pub fn ensure_finite(&self) -> Result<()> {
        match self.iter().find(|(_, _, v)| !v.is_finite()) {
            Some((x, y, &value)) => Err(ErosionError::NonFiniteValue { x, y, value }),
            None => Ok(()),
        }
    }
}

// =============================================================================
// SEED FIELD GENERATION
// =============================================================================

/// Parameters for the fBm noise that seeds an erosion run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Feature size in cells (higher = larger features)
    pub scale: f64,
    /// Number of noise octaves
    pub octaves: u32,
    /// Amplitude decay per octave (0.0-1.0)
    pub persistence: f64,
    /// Frequency multiplier per octave
    pub lacunarity: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            scale: 20.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 1.2,
        }
    }
}

/// Generate a layered Perlin height field normalized to [0, 1].
pub fn generate_seed_field(width: usize, height: usize, params: &NoiseParams, seed: u64) -> HeightField {
    let perlin = Perlin::new(seed as u32);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let offsets: Vec<(f64, f64)> = (0..params.octaves)
        .map(|_| (rng.gen_range(-10_000.0..10_000.0), rng.gen_range(-10_000.0..10_000.0)))
        .collect();
    let scale = params.scale.max(1e-4);

    let mut field = HeightField::new_with(width, height, 0.0);
    for (x, y, h) in field.iter_mut() {
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut value = 0.0;
        for &(ox, oy) in &offsets {
            let sx = x as f64 / scale * frequency + ox;
            let sy = y as f64 / scale * frequency + oy;
            value += perlin.get([sx, sy]) * amplitude;
            amplitude *= params.persistence;
            frequency *= params.lacunarity;
        }
        *h = value as f32;
    }

    field.normalize();
    field
}

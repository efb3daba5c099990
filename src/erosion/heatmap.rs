//! Diagnostic heatmaps recorded while trajectories run.
//!
//! Models only ever write through [`ErosionRecorder`]; nothing they compute
//! depends on what was recorded, so running with [`NoRecorder`] or with
//! [`HeatMaps`] produces the same field.

use serde::{Deserialize, Serialize};

use crate::tilemap::Tilemap;

/// Sink for per-cell trajectory statistics.
pub trait ErosionRecorder {
    /// A trajectory was launched from this cell.
    fn record_start(&mut self, x: usize, y: usize);
    /// A trajectory entered (or started on) this cell.
    fn record_visit(&mut self, x: usize, y: usize);
    /// Simulated time spent on this cell.
    fn record_time(&mut self, x: usize, y: usize, dt: f32);
    /// Elevation change applied to this cell (positive = deposition).
    fn record_saturation(&mut self, x: usize, y: usize, delta: f32);
}

/// Recorder that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRecorder;

impl ErosionRecorder for NoRecorder {
    #[inline]
    fn record_start(&mut self, _x: usize, _y: usize) {}
    #[inline]
    fn record_visit(&mut self, _x: usize, _y: usize) {}
    #[inline]
    fn record_time(&mut self, _x: usize, _y: usize, _dt: f32) {}
    #[inline]
    fn record_saturation(&mut self, _x: usize, _y: usize, _delta: f32) {}
}

/// Four same-shaped accumulation grids covering one erosion run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatMaps {
    pub visits: Tilemap<f32>,
    pub starts: Tilemap<f32>,
    pub time: Tilemap<f32>,
    pub saturation_changes: Tilemap<f32>,
}

impl HeatMaps {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            visits: Tilemap::new_with(width, height, 0.0),
            starts: Tilemap::new_with(width, height, 0.0),
            time: Tilemap::new_with(width, height, 0.0),
            saturation_changes: Tilemap::new_with(width, height, 0.0),
        }
    }

    pub fn width(&self) -> usize {
        self.visits.width
    }

    pub fn height(&self) -> usize {
        self.visits.height
    }

    /// The grids with stable names, for export.
    pub fn layers(&self) -> [(&'static str, &Tilemap<f32>); 4] {
        [
            ("visits", &self.visits),
            ("starts", &self.starts),
            ("time", &self.time),
            ("saturation", &self.saturation_changes),
        ]
    }

    /// Sum of positive saturation changes (deposition) and of negative ones
    /// (erosion, reported as a positive number).
    pub fn deposition_and_erosion(&self) -> (f64, f64) {
        self.saturation_changes
            .as_slice()
            .iter()
            .fold((0.0, 0.0), |(dep, ero), &d| {
                if d > 0.0 {
                    (dep + d as f64, ero)
                } else {
                    (dep, ero - d as f64)
                }
            })
    }
}

impl ErosionRecorder for HeatMaps {
    fn record_start(&mut self, x: usize, y: usize) {
        *self.starts.get_mut(x, y) += 1.0;
    }

    fn record_visit(&mut self, x: usize, y: usize) {
        *self.visits.get_mut(x, y) += 1.0;
    }

    fn record_time(&mut self, x: usize, y: usize, dt: f32) {
        *self.time.get_mut(x, y) += dt;
    }

    fn record_saturation(&mut self, x: usize, y: usize, delta: f32) {
        *self.saturation_changes.get_mut(x, y) += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heatmaps_accumulate() {
        let mut maps = HeatMaps::new(3, 2);
        maps.record_start(1, 1);
        maps.record_visit(1, 1);
        maps.record_visit(1, 1);
        maps.record_time(0, 0, 0.25);
        maps.record_time(0, 0, 0.5);
        maps.record_saturation(2, 0, -0.1);
        maps.record_saturation(2, 1, 0.3);

        assert_eq!(*maps.starts.get(1, 1), 1.0);
        assert_eq!(*maps.visits.get(1, 1), 2.0);
        assert_eq!(*maps.time.get(0, 0), 0.75);

        let (dep, ero) = maps.deposition_and_erosion();
        assert!((dep - 0.3).abs() < 1e-6);
        assert!((ero - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_layers_share_shape() {
        let maps = HeatMaps::new(5, 4);
        for (_, layer) in maps.layers() {
            assert_eq!((layer.width, layer.height), (5, 4));
        }
        assert_eq!((maps.width(), maps.height()), (5, 4));
    }
}

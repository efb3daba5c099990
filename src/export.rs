//! PNG and JSON output for height fields and erosion heatmaps.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::erosion::HeatMaps;
use crate::error::Result;
use crate::heightmap::HeightField;
use crate::tilemap::Tilemap;

/// Export a heightmap using spectral colormap.
/// Values are expected to be normalized (0.0-1.0).
pub fn export_heightmap(field: &HeightField, path: impl AsRef<Path>) -> Result<()> {
    render_heightmap(field).save(path)?;
    Ok(())
}

/// Export a heightmap as 8-bit grayscale, 0.0 black and 1.0 white.
pub fn export_heightmap_gray(field: &HeightField, path: impl AsRef<Path>) -> Result<()> {
    render_grayscale(field).save(path)?;
    Ok(())
}

pub fn render_heightmap(field: &HeightField) -> RgbImage {
    ImageBuffer::from_fn(field.width as u32, field.height as u32, |x, y| {
        let val = *field.get(x as usize, y as usize);
        Rgb(spectral_colormap(val))
    })
}

pub fn render_grayscale(field: &HeightField) -> GrayImage {
    ImageBuffer::from_fn(field.width as u32, field.height as u32, |x, y| {
        let val = field.get(x as usize, y as usize).clamp(0.0, 1.0);
        Luma([(val * 255.0).round() as u8])
    })
}

/// Stops of the spectral colormap, low to high.
const SPECTRAL: [[f32; 3]; 11] = [
    [0.37, 0.31, 0.64],
    [0.20, 0.53, 0.74],
    [0.40, 0.76, 0.65],
    [0.67, 0.87, 0.64],
    [0.90, 0.96, 0.60],
    [1.00, 1.00, 0.75],
    [1.00, 0.88, 0.55],
    [0.99, 0.68, 0.38],
    [0.96, 0.43, 0.26],
    [0.84, 0.24, 0.31],
    [0.62, 0.00, 0.26],
];

/// Spectral colormap: purple-blue lowlands through pale yellow to dark red peaks.
fn spectral_colormap(t: f32) -> [u8; 3] {
    let scaled = t.clamp(0.0, 1.0) * (SPECTRAL.len() - 1) as f32;
    let idx = (scaled as usize).min(SPECTRAL.len() - 2);
    let frac = scaled - idx as f32;
    let (lo, hi) = (SPECTRAL[idx], SPECTRAL[idx + 1]);
    std::array::from_fn(|c| ((lo[c] + (hi[c] - lo[c]) * frac) * 255.0) as u8)
}

/// Render a heatmap layer with a hue ramp: blue for the layer's minimum, red
/// for its maximum. A constant layer renders entirely blue.
pub fn render_heat_map(layer: &Tilemap<f32>) -> RgbImage {
    let (lo, hi) = layer.min_max().unwrap_or((0.0, 0.0));
    let range = hi - lo;

    ImageBuffer::from_fn(layer.width as u32, layer.height as u32, |x, y| {
        let val = *layer.get(x as usize, y as usize);
        let t = if range > 0.0 { (val - lo) / range } else { 0.0 };
        Rgb(heat_color(t))
    })
}

/// Fully saturated color at hue `240 * (1 - t)` degrees.
fn heat_color(t: f32) -> [u8; 3] {
    let hue = 240.0 * (1.0 - t.clamp(0.0, 1.0));
    let sector = hue / 60.0;
    let x = 1.0 - (sector % 2.0 - 1.0).abs();
    let (r, g, b) = match sector as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        _ => (x, 0.0, 1.0),
    };
    [
        (r * 255.0f32).round() as u8,
        (g * 255.0f32).round() as u8,
        (b * 255.0f32).round() as u8,
    ]
}

pub fn export_heat_map(layer: &Tilemap<f32>, path: impl AsRef<Path>) -> Result<()> {
    render_heat_map(layer).save(path)?;
    Ok(())
}

/// Write each heatmap layer to `dir/{prefix}_{layer}.png` and return the
/// written paths.
pub fn export_heat_maps(heat: &HeatMaps, dir: impl AsRef<Path>, prefix: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (name, layer) in heat.layers() {
        let path = dir.join(format!("{prefix}_{name}.png"));
        export_heat_map(layer, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// Serialize any grid (or heatmap set) to pretty JSON.
pub fn export_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Read a grid written by [`export_json`].
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

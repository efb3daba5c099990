//! Debug tool for comparing erosion parameters visually
//! Generates a grid of shaded heightmaps with different erosion settings

use anyhow::Context;
use image::{ImageBuffer, Rgb, RgbImage};

use heightfield_erosion::erosion::{CapacityErosionSettings, ErosionModel, SimpleErosionSettings};
use heightfield_erosion::heightmap::{generate_seed_field, HeightField, NoiseParams};

const WIDTH: usize = 192;
const HEIGHT: usize = 192;
const SEED: i64 = 42;
const OUTPUT: &str = "erosion_comparison.png";

fn variants() -> Vec<(&'static str, Option<ErosionModel>)> {
    let droplet = |settings: SimpleErosionSettings| Some(ErosionModel::Droplet(settings));
    let capacity = |settings: CapacityErosionSettings| Some(ErosionModel::Capacity(settings));

    vec![
        ("1. No Erosion", None),
        ("2. Droplet 20k", droplet(SimpleErosionSettings {
            droplet_cycles: 20_000,
            ..Default::default()
        })),
        ("3. Droplet Fric 0.2", droplet(SimpleErosionSettings {
            droplet_cycles: 20_000,
            friction: 0.2,
            ..Default::default()
        })),
        ("4. Droplet Sat 0.5", droplet(SimpleErosionSettings {
            droplet_cycles: 20_000,
            saturation_max_proportion: 0.5,
            ..Default::default()
        })),
        ("5. Capacity 20k", capacity(CapacityErosionSettings {
            particle_count: 20_000,
            ..Default::default()
        })),
        ("6. Cap No Blur", capacity(CapacityErosionSettings {
            particle_count: 20_000,
            erosion_blur_weight: 0.0,
            ..Default::default()
        })),
        ("7. Cap Radius 3", capacity(CapacityErosionSettings {
            particle_count: 20_000,
            particle_erosion_radius: 3,
            ..Default::default()
        })),
        ("8. Cap Inertia 0.9", capacity(CapacityErosionSettings {
            particle_count: 20_000,
            inertia: 0.9,
            ..Default::default()
        })),
        ("9. Cap Life 60", capacity(CapacityErosionSettings {
            particle_count: 20_000,
            max_particle_life: 60,
            ..Default::default()
        })),
    ]
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    println!("Generating erosion comparison grid...");

    // Generate base terrain once
    let base = generate_seed_field(WIDTH, HEIGHT, &NoiseParams::default(), SEED as u64);

    let mut images: Vec<(String, RgbImage)> = Vec::new();
    for (name, model) in variants() {
        println!("  Processing: {}", name);
        let field = match &model {
            Some(model) => {
                let (field, stats) = model
                    .run(base.clone(), SEED, None)
                    .with_context(|| format!("variant {name} failed"))?;
                println!("    {} steps, eroded {:.2}", stats.steps_taken, stats.total_eroded);
                field
            }
            None => base.clone(),
        };
        images.push((name.to_string(), render_shaded_heightmap(&field)));
    }

    let grid = create_grid(&images, 3, 3);
    grid.save(OUTPUT).context("failed to save comparison grid")?;

    println!("Saved {}", OUTPUT);
    Ok(())
}

/// Hillshade of a normalized field with elevation bands.
fn render_shaded_heightmap(field: &HeightField) -> RgbImage {
    let width = field.width;
    let height = field.height;
    let mut img = ImageBuffer::new(width as u32, height as u32);

    // Light direction (from upper-left)
    let light_x = -0.7f32;
    let light_y = -0.7f32;
    let light_z = 0.5f32;
    let light_len = (light_x * light_x + light_y * light_y + light_z * light_z).sqrt();
    let (lx, ly, lz) = (light_x / light_len, light_y / light_len, light_z / light_len);

    for y in 0..height {
        for x in 0..width {
            let h = *field.get(x, y);

            let h_left = if x > 0 { *field.get(x - 1, y) } else { h };
            let h_right = if x < width - 1 { *field.get(x + 1, y) } else { h };
            let h_up = if y > 0 { *field.get(x, y - 1) } else { h };
            let h_down = if y < height - 1 { *field.get(x, y + 1) } else { h };

            // Heights are in [0, 1]; exaggerate so relief shows at this size
            let scale = 40.0;
            let nx = (h_left - h_right) * scale;
            let ny = (h_up - h_down) * scale;
            let nz = 1.0f32;
            let nlen = (nx * nx + ny * ny + nz * nz).sqrt();
            let (nx, ny, nz) = (nx / nlen, ny / nlen, nz / nlen);

            let diffuse = (nx * lx + ny * ly + nz * lz).max(0.0);
            let ambient = 0.3;
            let lighting = (ambient + (1.0 - ambient) * diffuse).min(1.0);

            let base = if h < 0.25 {
                // Valley floor
                [70.0, 120.0, 170.0]
            } else if h < 0.5 {
                let t = (h - 0.25) / 0.25;
                [80.0 + t * 40.0, 140.0 - t * 10.0, 60.0]
            } else if h < 0.8 {
                let t = (h - 0.5) / 0.3;
                [120.0 + t * 40.0, 130.0 - t * 30.0, 60.0 + t * 40.0]
            } else {
                // Peaks
                [235.0, 235.0, 240.0]
            };

            img.put_pixel(
                x as u32,
                y as u32,
                Rgb([
                    (base[0] * lighting) as u8,
                    (base[1] * lighting) as u8,
                    (base[2] * lighting) as u8,
                ]),
            );
        }
    }

    img
}

fn create_grid(images: &[(String, RgbImage)], cols: usize, rows: usize) -> RgbImage {
    if images.is_empty() {
        return ImageBuffer::new(1, 1);
    }

    let cell_width = images[0].1.width();
    let cell_height = images[0].1.height();
    let label_height = 20u32;
    let total_cell_height = cell_height + label_height;

    let mut grid: RgbImage = ImageBuffer::from_pixel(
        cell_width * cols as u32,
        total_cell_height * rows as u32,
        Rgb([30, 30, 30]),
    );

    for (idx, (name, img)) in images.iter().enumerate().take(cols * rows) {
        let x_offset = (idx % cols) as u32 * cell_width;
        let label_y = (idx / cols) as u32 * total_cell_height;

        image::imageops::replace(&mut grid, img, x_offset as i64, (label_y + label_height) as i64);
        draw_text(&mut grid, x_offset + 5, label_y + 6, name);
    }

    grid
}

/// 5x7 glyphs for the variant labels; other characters render blank.
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111],
        '3' => [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' | 'a' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' | 'b' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' | 'c' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' | 'd' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' | 'e' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' | 'f' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'I' | 'i' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'K' | 'k' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' | 'l' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'N' | 'n' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' | 'o' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' | 'p' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'R' | 'r' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' | 's' => [0b01110, 0b10001, 0b10000, 0b01110, 0b00001, 0b10001, 0b01110],
        'T' | 't' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' | 'u' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'Y' | 'y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        _ => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000],
    }
}

/// Draw `text` in white with its top-left corner at `(x, y)`, clipped to the image.
fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str) {
    const ADVANCE: u32 = 6;

    for (i, c) in text.chars().enumerate() {
        let cx = x + i as u32 * ADVANCE;
        for (row, bits) in glyph(c).into_iter().enumerate() {
            for col in 0..5u32 {
                let (px, py) = (cx + col, y + row as u32);
                if bits & (0b10000 >> col) != 0 && px < img.width() && py < img.height() {
                    img.put_pixel(px, py, Rgb([255, 255, 255]));
                }
            }
        }
    }
}

//! Profiling tool to compare the cost of both erosion models

use std::time::{Duration, Instant};

use heightfield_erosion::convolution::apply_blur;
use heightfield_erosion::erosion::{self, CapacityErosionSettings, SimpleErosionSettings};
use heightfield_erosion::heightmap::{generate_seed_field, NoiseParams};

const SEED: i64 = 1337;

fn percent(part: Duration, total: Duration) -> f64 {
    100.0 * part.as_secs_f64() / total.as_secs_f64().max(f64::EPSILON)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let width = 256;
    let height = 256;

    println!("=== Performance Profiling ===");
    println!("Map size: {}x{} ({} cells)", width, height, width * height);
    println!();

    let start = Instant::now();
    let field = generate_seed_field(width, height, &NoiseParams::default(), SEED as u64);
    let noise_time = start.elapsed();
    println!("Seed field generation: {:?}", noise_time);

    // A flush is dominated by the blur of the change buffer
    let blur_radius = CapacityErosionSettings::default().erosion_blur_radius;
    let start = Instant::now();
    let _ = apply_blur(&field, blur_radius);
    let blur_time = start.elapsed();
    println!("Single blur (radius {}): {:?}", blur_radius, blur_time);

    let simple = SimpleErosionSettings {
        droplet_cycles: 10_000,
        ..Default::default()
    };
    println!("\nDroplet model: {} droplets", simple.droplet_cycles);
    let start = Instant::now();
    let (_, droplet_stats) = erosion::erode_simple_with_stats(field.clone(), SEED, &simple, None)?;
    let droplet_time = start.elapsed();
    println!("  Time: {:?}", droplet_time);
    println!("  Steps: {} ({:.1} per droplet)", droplet_stats.steps_taken, droplet_stats.mean_steps());
    println!("  Step cap reached: {}", droplet_stats.ceiling_hits);

    let capacity = CapacityErosionSettings {
        particle_count: 10_000,
        ..Default::default()
    };
    println!("\nCapacity model: {} particles", capacity.particle_count);
    let start = Instant::now();
    let (_, capacity_stats) = erosion::erode_capacity_with_stats(field, SEED, &capacity, None)?;
    let capacity_time = start.elapsed();
    println!("  Time: {:?}", capacity_time);
    println!("  Steps: {} ({:.1} per particle)", capacity_stats.steps_taken, capacity_stats.mean_steps());
    println!(
        "  Flushes: {} (~{:?} blurring)",
        capacity_stats.flushes,
        blur_time * capacity_stats.flushes as u32
    );

    let total = noise_time + droplet_time + capacity_time;
    println!("\n=== Summary ===");
    println!("Seed field:       {:>8.2}% ({:?})", percent(noise_time, total), noise_time);
    println!("Droplet model:    {:>8.2}% ({:?})", percent(droplet_time, total), droplet_time);
    println!("Capacity model:   {:>8.2}% ({:?})", percent(capacity_time, total), capacity_time);
    println!("─────────────────────────────────");
    println!("TOTAL:            {:>8}  {:?}", "100%", total);

    Ok(())
}

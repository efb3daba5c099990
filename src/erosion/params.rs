//! Erosion simulation parameters and model selection

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ErosionError, Result};

/// Parameters of the kinematic droplet model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleErosionSettings {
    /// Number of droplets to launch (default: 50000)
    pub droplet_cycles: usize,

    /// Initial water mass of each droplet
    pub droplet_mass: f32,

    /// Maximum sediment a droplet can hold, as a fraction of its water mass
    pub saturation_max_proportion: f32,

    /// Base rate at which a droplet picks up sediment
    pub saturation_speed: f32,

    /// Water mass lost per unit of simulated time
    pub evaporation_speed: f32,

    /// Friction coefficient opposing motion along the slope
    pub friction: f32,

    /// Converts height units to metres for slope angles
    pub height_to_meters: f32,

    /// Horizontal distance between neighbouring cells, in metres
    pub block_distance: f32,

    /// Steps after which a droplet is stopped and drops its load (default: 100000)
    pub max_droplet_steps: usize,
}

impl Default for SimpleErosionSettings {
    fn default() -> Self {
        Self {
            droplet_cycles: 50_000,
            droplet_mass: 50.0,
            saturation_max_proportion: 0.25,
            saturation_speed: 0.05,
            evaporation_speed: 0.005,
            friction: 0.5,
            height_to_meters: 20_000.0,
            block_distance: 1_000.0,
            max_droplet_steps: 100_000,
        }
    }
}

impl SimpleErosionSettings {
    /// Stationary step duration, used whenever transit time is undefined.
    pub fn zero_time_interval(&self) -> f32 {
        self.droplet_mass / (self.evaporation_speed * 10.0)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("droplet_mass", self.droplet_mass)?;
        ensure_positive("saturation_max_proportion", self.saturation_max_proportion)?;
        ensure_positive("evaporation_speed", self.evaporation_speed)?;
        ensure_positive("block_distance", self.block_distance)?;
        ensure_finite("saturation_speed", self.saturation_speed)?;
        ensure_finite("friction", self.friction)?;
        ensure_finite("height_to_meters", self.height_to_meters)?;
        if self.max_droplet_steps == 0 {
            return Err(ErosionError::InvalidSettings("max_droplet_steps must be at least 1".into()));
        }
        Ok(())
    }
}

/// Parameters of the sediment-capacity particle model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityErosionSettings {
    /// Number of particles to launch (default: 50000)
    pub particle_count: usize,

    /// Maximum steps per particle
    pub max_particle_life: usize,

    /// Radius of the blur applied to accumulated changes on flush
    pub erosion_blur_radius: u32,

    /// Share of the blurred changes in the flushed result (0.0-1.0)
    pub erosion_blur_weight: f32,

    /// Fraction of free capacity eroded per step
    pub erosion_speed: f32,

    /// Momentum conservation factor (0.0-1.0)
    pub inertia: f32,

    /// Lower bound on the slope term of the capacity, so flat ground still carries
    pub min_slope_param: f32,

    /// Sediment capacity multiplier
    pub particle_capacity: f32,

    /// Fraction of surplus sediment deposited per step
    pub particle_deposition_speed: f32,

    /// Radius of the erosion disc around the particle
    pub particle_erosion_radius: u32,

    /// Acceleration from height change
    pub gravity: f32,

    /// Water fraction evaporated per step (0.0-1.0)
    pub particle_evaporation: f32,
}

impl Default for CapacityErosionSettings {
    fn default() -> Self {
        Self {
            particle_count: 50_000,
            max_particle_life: 30,
            erosion_blur_radius: 1,
            erosion_blur_weight: 0.5,
            erosion_speed: 0.7,
            inertia: 0.5,
            min_slope_param: 0.01,
            particle_capacity: 0.5,
            particle_deposition_speed: 0.5,
            particle_erosion_radius: 1,
            gravity: 4.0,
            particle_evaporation: 0.25,
        }
    }
}

impl CapacityErosionSettings {
    pub fn validate(&self) -> Result<()> {
        ensure_unit("inertia", self.inertia)?;
        ensure_finite("erosion_blur_weight", self.erosion_blur_weight)?;
        ensure_non_negative("erosion_speed", self.erosion_speed)?;
        ensure_non_negative("min_slope_param", self.min_slope_param)?;
        ensure_non_negative("particle_capacity", self.particle_capacity)?;
        ensure_non_negative("particle_deposition_speed", self.particle_deposition_speed)?;
        ensure_finite("gravity", self.gravity)?;
        if !(0.0..1.0).contains(&self.particle_evaporation) {
            return Err(ErosionError::InvalidSettings(format!(
                "particle_evaporation must be in [0, 1), got {}",
                self.particle_evaporation
            )));
        }
        Ok(())
    }
}

fn ensure_finite(name: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ErosionError::InvalidSettings(format!("{name} must be finite, got {value}")))
    }
}

fn ensure_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ErosionError::InvalidSettings(format!("{name} must be positive, got {value}")))
    }
}

fn ensure_non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ErosionError::InvalidSettings(format!("{name} must be non-negative, got {value}")))
    }
}

fn ensure_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ErosionError::InvalidSettings(format!("{name} must be in [0, 1], got {value}")))
    }
}

/// Which model to run, with its settings. Stored in config files as
/// `{"model": "droplet", ...}` or `{"model": "capacity", ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ErosionModel {
    Droplet(SimpleErosionSettings),
    Capacity(CapacityErosionSettings),
}

impl Default for ErosionModel {
    fn default() -> Self {
        Self::Droplet(SimpleErosionSettings::default())
    }
}

impl std::fmt::Display for ErosionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Droplet(_) => write!(f, "droplet"),
            Self::Capacity(_) => write!(f, "capacity"),
        }
    }
}

impl ErosionModel {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Load and validate a model config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Droplet(settings) => settings.validate(),
            Self::Capacity(settings) => settings.validate(),
        }
    }

    /// Number of trajectories this model will launch.
    pub fn trajectories(&self) -> usize {
        match self {
            Self::Droplet(settings) => settings.droplet_cycles,
            Self::Capacity(settings) => settings.particle_count,
        }
    }

    /// Override the number of trajectories.
    pub fn with_trajectories(mut self, count: usize) -> Self {
        match &mut self {
            Self::Droplet(settings) => settings.droplet_cycles = count,
            Self::Capacity(settings) => settings.particle_count = count,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SimpleErosionSettings::default().validate().is_ok());
        assert!(CapacityErosionSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_time_interval() {
        let settings = SimpleErosionSettings::default();
        assert!((settings.zero_time_interval() - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_non_terminating_settings() {
        let settings = SimpleErosionSettings {
            evaporation_speed: 0.0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ErosionError::InvalidSettings(_))));

        let settings = CapacityErosionSettings {
            inertia: 1.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = CapacityErosionSettings {
            particle_evaporation: 1.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_capacity_terms() {
        for settings in [
            CapacityErosionSettings { min_slope_param: -0.01, ..Default::default() },
            CapacityErosionSettings { particle_capacity: -0.5, ..Default::default() },
            CapacityErosionSettings { erosion_speed: -0.1, ..Default::default() },
            CapacityErosionSettings { particle_deposition_speed: f32::NAN, ..Default::default() },
        ] {
            assert!(matches!(settings.validate(), Err(ErosionError::InvalidSettings(_))));
        }

        let zero = CapacityErosionSettings {
            min_slope_param: 0.0,
            ..Default::default()
        };
        assert!(zero.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_step_cap() {
        let settings = SimpleErosionSettings {
            max_droplet_steps: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_model_from_json_fills_defaults() {
        let model = ErosionModel::from_json_str(r#"{"model": "capacity", "particle_count": 12}"#).unwrap();
        match model {
            ErosionModel::Capacity(settings) => {
                assert_eq!(settings.particle_count, 12);
                assert_eq!(settings.max_particle_life, 30);
            }
            other => panic!("expected capacity model, got {other}"),
        }
    }

    #[test]
    fn test_model_json_round_trip() {
        let model = ErosionModel::Droplet(SimpleErosionSettings {
            droplet_cycles: 3,
            friction: 0.2,
            ..Default::default()
        });
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains(r#""model":"droplet""#));
        assert_eq!(ErosionModel::from_json_str(&json).unwrap(), model);
    }

    #[test]
    fn test_model_from_json_validates() {
        let result = ErosionModel::from_json_str(r#"{"model": "droplet", "droplet_mass": -1.0}"#);
        assert!(matches!(result, Err(ErosionError::InvalidSettings(_))));
        assert!(ErosionModel::from_json_str(r#"{"model": "glacier"}"#).is_err());
    }

    #[test]
    fn test_with_trajectories() {
        let model = ErosionModel::Capacity(CapacityErosionSettings::default()).with_trajectories(9);
        assert_eq!(model.trajectories(), 9);
        assert_eq!(model.to_string(), "capacity");
    }
}

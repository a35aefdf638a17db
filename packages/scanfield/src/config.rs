//! Viewer configuration.
//!
//! Everything that used to be a hard-coded constant or a debug-panel value
//! (camera, lights, particle counts, effect parameters) lives here. The whole
//! structure deserializes from JSON with every field optional.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration for a viewport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraSettings,
    pub lights: LightSettings,
    pub particles: ParticleSettings,
    pub effects: EffectsConfig,
    /// Upper bound on the device pixel ratio used for the drawing buffer.
    pub max_pixel_ratio: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            lights: LightSettings::default(),
            particles: ParticleSettings::default(),
            effects: EffectsConfig::default(),
            max_pixel_ratio: 2.0,
        }
    }
}

impl ViewerConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("failed to parse viewer config")?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    /// Clamp a device pixel ratio to the configured maximum.
    pub fn pixel_ratio(&self, device_pixel_ratio: f32) -> f32 {
        device_pixel_ratio.min(self.max_pixel_ratio).max(f32::EPSILON)
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Perspective camera placed on the +Z axis looking at the origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Distance from the origin along +Z.
    pub distance: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            distance: 6.0,
            near: 3.0,
            far: 8.0,
        }
    }
}

// ============================================================================
// Lights
// ============================================================================

/// A single point light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointLightSettings {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
    /// Range after which the light contributes nothing.
    pub distance: f32,
}

/// Back, fill and key lights around the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub back: PointLightSettings,
    pub fill: PointLightSettings,
    pub key: PointLightSettings,
    pub ambient: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            back: PointLightSettings {
                position: [-5.0, 5.0, -5.0],
                color: hex_to_rgb(0x0f3363),
                intensity: 600.0,
                distance: 7.0,
            },
            fill: PointLightSettings {
                position: [-5.0, 0.0, 5.0],
                color: hex_to_rgb(0x80529d),
                intensity: 500.0,
                distance: 8.0,
            },
            key: PointLightSettings {
                position: [5.0, 0.0, 0.0],
                color: hex_to_rgb(0x45cf6d),
                intensity: 200.0,
                distance: 6.0,
            },
            ambient: 0.15,
        }
    }
}

fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

// ============================================================================
// Particles
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    pub count: usize,
    /// Thickness of the slab (along Z) the particles are scattered in.
    pub depth: f32,
    /// Maximum extra speed added on top of the base speed of 1.
    pub speed: f32,
    pub seed: u64,
    pub color: [f32; 4],
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            count: 200,
            depth: 3.0,
            speed: 5.0,
            seed: 0x5eed,
            color: [0.85, 0.95, 1.0, 1.0],
        }
    }
}

// ============================================================================
// Effects
// ============================================================================

/// Parameters for every pass in the compositor chain.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub ascii: AsciiSettings,
    pub scan: ScanSettings,
    pub ripple: RippleSettings,
    pub light_scattering: LightScatteringSettings,
    pub output: OutputSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsciiSettings {
    pub enabled: bool,
    /// Image id (from the manifest) of the glyph atlas.
    pub font_texture_id: String,
    /// Atlas size in pixels.
    pub font_map_size: [f32; 2],
    /// Size of one glyph cell in pixels; also the on-screen cell size.
    pub font_char_size: [f32; 2],
}

impl Default for AsciiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            font_texture_id: "2".to_string(),
            font_map_size: [64.0, 64.0],
            font_char_size: [8.0, 8.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Scan advance per second.
    pub speed: f32,
    /// The scan value wraps back to zero at this value.
    pub period: f32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            speed: 0.1,
            period: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleSettings {
    /// Age gained per second; a ripple expires at age 1.
    pub speed: f32,
    /// Age at which a ripple reaches full opacity.
    pub peak: f32,
    pub distortion: [f32; 2],
}

impl Default for RippleSettings {
    fn default() -> Self {
        Self {
            speed: 0.3,
            peak: 0.2,
            distortion: [0.001, 0.001],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightScatteringSettings {
    pub enabled: bool,
    /// Light position in normalized screen coordinates.
    pub light_position: [f32; 2],
    pub exposure: f32,
    pub density: f32,
    pub weight: f32,
    pub samples: u32,
}

impl Default for LightScatteringSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            light_position: [0.5, 0.5],
            exposure: 0.2,
            density: 0.6,
            weight: 0.2,
            samples: 80,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub exposure: f32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { exposure: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = ViewerConfig::from_json_str("{}").unwrap();
        assert_eq!(config.camera, CameraSettings::default());
        assert_eq!(config.particles.count, 200);
        assert!(!config.effects.ascii.enabled);
        assert_eq!(config.effects.ascii.font_texture_id, "2");
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{ "camera": { "fov_degrees": 60.0 }, "effects": { "ascii": { "enabled": true } } }"#;
        let config = ViewerConfig::from_json_str(json).unwrap();
        assert_eq!(config.camera.fov_degrees, 60.0);
        assert_eq!(config.camera.distance, 6.0);
        assert!(config.effects.ascii.enabled);
        assert_eq!(config.effects.ascii.font_char_size, [8.0, 8.0]);
    }

    #[test]
    fn test_pixel_ratio_is_capped() {
        let config = ViewerConfig::from_json_str("{}").unwrap();
        assert_eq!(config.max_pixel_ratio, 2.0);
        assert_eq!(config.pixel_ratio(3.0), 2.0);
        assert_eq!(config.pixel_ratio(1.5), 1.5);
    }

    #[test]
    fn test_light_colors_decode_hex() {
        let lights = LightSettings::default();
        assert!((lights.key.color[0] - 0x45 as f32 / 255.0).abs() < 1e-6);
        assert!((lights.key.color[2] - 0x6d as f32 / 255.0).abs() < 1e-6);
    }
}

//! # Renderer Configuration
//!
//! Everything the frame pipeline needs to know before the first frame:
//! ring depth, constant alignment, binding table limits, the output surface
//! and the camera defaults. Loaded through [`Config`] from TOML or RON.

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError, ConfigFormat};

/// Smallest ring that still lets CPU and GPU overlap
pub const MIN_FRAME_RESOURCES: usize = 2;

/// Largest ring accepted by `validate`
pub const MAX_FRAME_RESOURCES: usize = 8;

/// # Camera Configuration
///
/// Defaults match a perspective camera orbiting the origin at a distance of 15.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    /// Initial orbit radius
    pub radius: f32,
    /// Smallest orbit radius zooming may reach
    pub min_radius: f32,
    /// Degrees of orbit per pixel of pointer drag
    pub mouse_sensitivity: f32,
    /// Radius change per wheel unit
    pub zoom_sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 1.0,
            far: 100.0,
            radius: 15.0,
            min_radius: 0.1,
            mouse_sensitivity: 0.25,
            zoom_sensitivity: 0.1,
        }
    }
}

impl CameraConfig {
    /// Validate the camera parameters
    pub fn validate(&self) -> Result<(), String> {
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(format!("Field of view must be in (0, 180) degrees, got {}", self.fov_degrees));
        }
        if self.near <= 0.0 || self.far <= self.near {
            return Err(format!("Clip planes must satisfy 0 < near < far, got {} / {}", self.near, self.far));
        }
        if self.min_radius <= 0.0 || self.radius < self.min_radius {
            return Err("Orbit radius must be at least the positive minimum radius".to_string());
        }
        Ok(())
    }
}

/// # Vulkan Backend Configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VulkanConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable Vulkan validation layers
    pub enable_validation: bool,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            application_name: "Frame Pipeline".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

/// # Renderer Configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frame slots in the ring
    pub frame_resource_count: usize,
    /// Minimum byte alignment of one constant record
    pub constant_alignment: usize,
    /// Largest binding table the device accepts
    pub binding_table_limit: u32,
    /// Color the pass clears to
    pub clear_color: [f32; 4],
    /// Output surface width in pixels
    pub surface_width: u32,
    /// Output surface height in pixels
    pub surface_height: u32,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Camera defaults
    pub camera: CameraConfig,
    /// Vulkan backend settings
    pub vulkan: VulkanConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frame_resource_count: 3,
            constant_alignment: 256,
            binding_table_limit: 1_000_000,
            clear_color: [0.0, 0.2, 0.4, 1.0],
            surface_width: 1280,
            surface_height: 720,
            log_level: "info".to_string(),
            camera: CameraConfig::default(),
            vulkan: VulkanConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Set the ring depth
    pub fn with_frame_resource_count(mut self, count: usize) -> Self {
        self.frame_resource_count = count;
        self
    }

    /// Set the output surface size
    pub fn with_surface_size(mut self, width: u32, height: u32) -> Self {
        self.surface_width = width;
        self.surface_height = height;
        self
    }

    /// Set the binding table limit
    pub fn with_binding_table_limit(mut self, limit: u32) -> Self {
        self.binding_table_limit = limit;
        self
    }

    /// Set the clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the camera defaults
    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    /// Surface aspect ratio
    pub fn aspect_ratio(&self) -> f32 {
        self.surface_width as f32 / self.surface_height.max(1) as f32
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_FRAME_RESOURCES..=MAX_FRAME_RESOURCES).contains(&self.frame_resource_count) {
            return Err(format!(
                "Frame resource count must be between {} and {}, got {}",
                MIN_FRAME_RESOURCES, MAX_FRAME_RESOURCES, self.frame_resource_count
            ));
        }

        if !self.constant_alignment.is_power_of_two() {
            return Err(format!(
                "Constant alignment must be a power of two, got {}",
                self.constant_alignment
            ));
        }

        if self.binding_table_limit == 0 {
            return Err("Binding table limit must be positive".to_string());
        }

        if self.surface_width == 0 || self.surface_height == 0 {
            return Err("Surface size must be non-zero".to_string());
        }

        self.camera.validate()
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RendererConfig::default();
        assert_eq!(config.frame_resource_count, 3);
        assert_eq!(config.constant_alignment, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ring_depth_bounds() {
        assert!(RendererConfig::default().with_frame_resource_count(1).validate().is_err());
        assert!(RendererConfig::default().with_frame_resource_count(2).validate().is_ok());
        assert!(RendererConfig::default().with_frame_resource_count(9).validate().is_err());
    }

    #[test]
    fn test_alignment_must_be_power_of_two() {
        let config = RendererConfig {
            constant_alignment: 200,
            ..RendererConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RendererConfig::default()
            .with_frame_resource_count(4)
            .with_surface_size(800, 600);
        let text = config.to_string_as(ConfigFormat::Toml).unwrap();
        let parsed = RendererConfig::from_str_as(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = RendererConfig::default().with_clear_color([1.0, 0.0, 0.0, 1.0]);
        let text = config.to_string_as(ConfigFormat::Ron).unwrap();
        let parsed = RendererConfig::from_str_as(&text, ConfigFormat::Ron).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = RendererConfig::from_str_as("frame_resource_count = 2\n", ConfigFormat::Toml).unwrap();
        assert_eq!(parsed.frame_resource_count, 2);
        assert_eq!(parsed.camera, CameraConfig::default());
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = ConfigFormat::from_path(std::path::Path::new("renderer.json"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}

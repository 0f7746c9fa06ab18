//! # Core Module
//!
//! Shared configuration types used by the renderer and its backends.

pub mod config;

pub use config::{CameraConfig, Config, ConfigError, ConfigFormat, RendererConfig, VulkanConfig};

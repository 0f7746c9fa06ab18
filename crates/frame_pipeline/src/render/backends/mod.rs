//! Backend implementations for the render module
//!
//! The headless backend runs the full frame loop on host memory with a
//! simulated GPU timeline; the Vulkan backend drives real hardware.

/// Headless host-memory backend
pub mod headless;

/// Vulkan rendering backend implementation
pub mod vulkan;

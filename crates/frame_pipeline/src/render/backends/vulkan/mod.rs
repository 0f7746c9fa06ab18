//! Vulkan backend implementation
//!
//! A Vulkan 1.2 [`RenderDevice`](crate::render::api::RenderDevice). The
//! completion counter is a timeline semaphore, upload pools are persistently
//! mapped host-visible uniform buffers, and the binding table is a single
//! descriptor set of uniform-buffer and combined-image-sampler arrays.
//!
//! The context is headless: render targets and pipelines come from the
//! embedding application through [`VulkanDevice::set_render_target`] and
//! [`VulkanDevice::set_pipelines`].

use ash::vk;
use thiserror::Error;

/// Instance, physical device and logical device setup
pub mod context;

/// Buffers and host-visible upload memory
pub mod buffer;

/// Timeline semaphore
pub mod sync;

/// Sampled textures
pub mod texture;

/// Binding table and root descriptor sets
pub mod descriptor_table;

/// The device and its per-slot command contexts
pub mod device;

pub use buffer::{find_memory_type, Buffer, HostUploadMemory};
pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanInstance};
pub use descriptor_table::{DescriptorTable, DrawPushConstants};
pub use device::{GroupPipeline, PipelineSet, RenderTarget, VulkanCommands, VulkanDevice};
pub use sync::TimelineSemaphore;
pub use texture::DeviceTexture;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// A device limit is smaller than the scene needs
    #[error("Device limit exceeded: {what} needs {requested}, device allows {limit}")]
    LimitExceeded {
        /// Which limit
        what: &'static str,
        /// Amount the scene needs
        requested: u64,
        /// Amount the device allows
        limit: u64,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

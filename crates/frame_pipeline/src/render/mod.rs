//! # Rendering System
//!
//! The multi-buffered frame pipeline: the CPU records frame `k` while the GPU
//! still executes frames `k-1 .. k-N+1`, each in its own frame slot.
//!
//! ## Architecture
//!
//! - **Device seam** ([`api`]): everything GPU-side goes through
//!   [`RenderDevice`]. [`backends`] provides a headless device and a Vulkan
//!   1.2 device.
//! - **Synchronization** ([`sync`]): the monotonic completion counter.
//! - **Frame resources** ([`frame`]): the ring of frame slots and the
//!   dirty-propagation upload.
//! - **Resources** ([`resources`]): constant records, upload pools, the flat
//!   binding table and texture data.
//! - **Scene** ([`scene`]): mesh batch, render items, materials and the
//!   catalog that freezes their slots.
//! - **Frame loop** ([`FrameRenderer`]): ties the above together and draws
//!   through the [`DrawBatcher`].
//!
//! ## Present Boundary
//!
//! [`FrameRenderer::render_frame`] returns once the frame is submitted and
//! its completion value enqueued. Presenting is the caller's business.

use thiserror::Error;

pub mod api;

/// Graphics backend implementations
///
/// A headless host-memory device for tests and tools, and a Vulkan backend.
pub mod backends;

pub mod batch_renderer;
pub mod frame;
pub mod frame_renderer;
pub mod lighting;
pub mod primitives;
pub mod resources;
pub mod scene;
pub mod sync;

pub use api::{
    CommandRecorder, DrawIndexedArgs, DrawViews, GeometryBuffers, PassBinding, RenderDevice,
    RootViews, TextureHandle, UploadMemory, ViewHandle, Viewport,
};
pub use batch_renderer::{BatchStats, DrawBatcher};
pub use frame::{FrameResourceRing, SlotState, UploadStats};
pub use frame_renderer::{FrameReceipt, FrameRenderer, SceneAssets};
pub use lighting::{Light, LightType, LightingEnvironment};
pub use primitives::OrbitCamera;
pub use resources::{BindingTableAllocator, BindingTableLayout, TextureData};
pub use scene::{
    CatalogBuilder, MaterialDesc, MaterialParams, MeshBatch, MeshBatchBuilder, PipelineGroup,
    RenderItemCatalog, RenderItemDesc, Topology, Vertex,
};
pub use sync::CompletionCounter;

use backends::vulkan::VulkanError;

/// Rendering system errors
///
/// Every failure in the frame pipeline is fatal to the frame loop and is
/// propagated to the caller; nothing is retried internally.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Device or queue operation failed
    #[error("Device error: {0}")]
    Device(String),

    /// Waiting on the completion counter failed
    ///
    /// The GPU state is unknown afterwards; the frame loop must stop.
    #[error("Completion wait failed: {0}")]
    WaitFailed(String),

    /// A fixed-capacity resource cannot hold what was asked for
    #[error("{what}: {requested} requested, capacity {capacity}")]
    CapacityExceeded {
        /// Resource that overflowed
        what: String,
        /// Amount requested
        requested: usize,
        /// Fixed capacity
        capacity: usize,
    },

    /// The binding table was already allocated
    #[error("Binding table is frozen after allocation")]
    TableFrozen,

    /// The binding table was used before allocation
    #[error("Binding table has not been allocated")]
    TableNotAllocated,

    /// A render item names a material the catalog does not have
    #[error("Unknown material '{0}'")]
    UnknownMaterial(String),

    /// A render item names a submesh the mesh batch does not have
    #[error("Unknown submesh '{0}'")]
    UnknownSubmesh(String),

    /// A material names a texture the catalog does not have
    #[error("Unknown texture '{0}'")]
    UnknownTexture(String),

    /// Two entries of the same kind share a name
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName {
        /// What kind of entry
        kind: &'static str,
        /// The repeated name
        name: String,
    },

    /// Frame slot or record index outside its range
    #[error("Index {index} out of range (capacity {capacity})")]
    SlotOutOfRange {
        /// Requested index
        index: usize,
        /// Number of valid indices
        capacity: usize,
    },

    /// A slot's pools or commands were touched while it was not the recording slot
    #[error("Frame slot {slot} is not the acquired slot")]
    SlotNotAcquired {
        /// The slot that was touched
        slot: usize,
    },

    /// Renderer configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Mesh data is malformed
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Texture data could not be loaded or is malformed
    #[error("Texture error: {0}")]
    Texture(String),

    /// Vulkan backend error
    #[error(transparent)]
    Vulkan(#[from] VulkanError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

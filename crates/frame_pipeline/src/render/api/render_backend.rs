//! Backend abstraction traits for the frame pipeline
//!
//! The frame loop, ring, pools and batcher only ever talk to the GPU through
//! [`RenderDevice`] and [`CommandRecorder`]. The headless backend implements
//! them in host memory for tests and tooling; the Vulkan backend implements
//! them with ash.

use crate::render::resources::binding_table::{BindingTableLayout, TableEntry};
use crate::render::resources::texture::TextureData;
use crate::render::scene::PipelineGroup;
use crate::render::scene::Topology;
use crate::render::RenderResult;

/// Opaque identity of a GPU buffer, used when describing views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Handle to an uploaded texture, in upload order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Offset of one view inside the binding table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewHandle(pub u32);

impl ViewHandle {
    /// Offset as an array index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Byte range of one constant record inside an upload buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantView {
    /// Buffer holding the record
    pub buffer: BufferId,
    /// Byte offset of the record
    pub offset: u64,
    /// Padded byte size of the record
    pub size: u64,
}

/// Pass and light constants of one frame slot, bound outside the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootViews {
    /// Pass constants view
    pub pass: ConstantView,
    /// Light constants view
    pub light: ConstantView,
}

/// Device-local geometry produced from a mesh batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBuffers {
    /// Shared vertex buffer
    pub vertex_buffer: BufferId,
    /// Shared index buffer (32-bit indices)
    pub index_buffer: BufferId,
    /// Bytes per vertex
    pub vertex_stride: u32,
    /// Vertices in the buffer
    pub vertex_count: u32,
    /// Indices in the buffer
    pub index_count: u32,
}

/// Output viewport in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Per-frame pass setup recorded before any draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassBinding {
    /// Frame slot being recorded
    pub frame_index: usize,
    /// Clear color of the output target
    pub clear_color: [f32; 4],
    /// Viewport and scissor size
    pub viewport: Viewport,
    /// Pass and light constants of this slot
    pub root_views: RootViews,
}

/// Views one draw reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawViews {
    /// Object constants view
    pub object: ViewHandle,
    /// Material constants view
    pub material: ViewHandle,
    /// Texture view, when the material is textured
    pub texture: Option<ViewHandle>,
}

/// Arguments of one indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedArgs {
    /// Indices to draw
    pub index_count: u32,
    /// Instances to draw
    pub instance_count: u32,
    /// First index in the shared index buffer
    pub start_index: u32,
    /// Value added to each index before vertex fetch
    pub base_vertex: i32,
    /// First instance id
    pub first_instance: u32,
}

/// Host-visible memory backing one constant upload pool
pub trait UploadMemory {
    /// Mapped bytes, readable by the CPU
    fn bytes(&self) -> &[u8];

    /// Mapped bytes, writable by the CPU
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Identity of the underlying GPU buffer
    fn buffer_id(&self) -> BufferId;
}

/// Command recording for one frame slot
pub trait CommandRecorder {
    /// Start the output pass: clear, viewport, and the slot's root constants
    fn begin_pass(&mut self, pass: &PassBinding) -> RenderResult<()>;

    /// Switch the active pipeline configuration
    fn set_pipeline(&mut self, group: PipelineGroup) -> RenderResult<()>;

    /// Bind the shared vertex/index buffers
    fn bind_geometry(&mut self, geometry: &GeometryBuffers) -> RenderResult<()>;

    /// Set the primitive topology of following draws
    fn set_topology(&mut self, topology: Topology) -> RenderResult<()>;

    /// Point following draws at their constant and texture views
    fn bind_views(&mut self, views: DrawViews) -> RenderResult<()>;

    /// Record one indexed draw
    fn draw_indexed(&mut self, args: DrawIndexedArgs) -> RenderResult<()>;

    /// Close the output pass
    fn end_pass(&mut self) -> RenderResult<()>;
}

/// Single graphics device with a single submission queue
pub trait RenderDevice {
    /// Upload memory type backing constant pools
    type Memory: UploadMemory;
    /// Per-slot command recording context
    type Commands: CommandRecorder;

    /// Minimum alignment of a constant record
    fn constant_alignment(&self) -> usize;

    /// Allocate `byte_size` bytes of persistently mapped upload memory
    fn create_upload_memory(&mut self, byte_size: usize) -> RenderResult<Self::Memory>;

    /// Create the command allocator and list of frame slot `slot`
    fn create_commands(&mut self, slot: usize) -> RenderResult<Self::Commands>;

    /// Copy a mesh batch into device-local buffers
    fn upload_geometry(
        &mut self,
        vertex_bytes: &[u8],
        vertex_stride: u32,
        indices: &[u32],
    ) -> RenderResult<GeometryBuffers>;

    /// Copy texture pixels into a sampled image
    fn upload_texture(&mut self, texture: &TextureData) -> RenderResult<TextureHandle>;

    /// Realize the binding table and the per-slot root views
    fn create_binding_table(
        &mut self,
        layout: &BindingTableLayout,
        entries: &[TableEntry],
        root_views: &[RootViews],
    ) -> RenderResult<()>;

    /// Reset a slot's command allocator so it can record again
    fn reset_commands(&mut self, commands: &mut Self::Commands) -> RenderResult<()>;

    /// Close and submit a slot's command list to the queue
    fn submit(&mut self, commands: &mut Self::Commands) -> RenderResult<()>;

    /// Enqueue a GPU-side signal of the completion counter to `value`
    fn queue_signal(&mut self, value: u64) -> RenderResult<()>;

    /// Latest completion value the GPU has retired
    fn completed_value(&self) -> RenderResult<u64>;

    /// Block until the GPU has retired `value`
    fn wait_for_value(&self, value: u64) -> RenderResult<()>;

    /// Free staging memory of finished initial uploads
    fn release_staging(&mut self) -> RenderResult<()>;
}

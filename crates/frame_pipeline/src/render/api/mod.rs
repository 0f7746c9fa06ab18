//! Public rendering API
//!
//! The device seam between the frame pipeline and its GPU backends.

pub mod render_backend;

pub use render_backend::{
    BufferId, CommandRecorder, ConstantView, DrawIndexedArgs, DrawViews, GeometryBuffers,
    PassBinding, RenderDevice, RootViews, TextureHandle, UploadMemory, ViewHandle, Viewport,
};

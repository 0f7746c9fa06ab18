//! # Frame Pipeline
//!
//! Multi-buffered frame-resource synchronization and draw submission for
//! real-time renderers.
//!
//! ## Features
//!
//! - **Frames in flight**: a ring of N frame slots, each with its own command
//!   context and constant pools, paced by one monotonic completion counter
//! - **Dirty propagation**: changed objects are re-uploaded to every slot
//!   exactly once, then left alone
//! - **Flat binding table**: object, material and texture views in one
//!   fixed-capacity array with closed-form offsets
//! - **Batched drawing**: render items grouped by pipeline and drawn from a
//!   single merged vertex/index buffer
//! - **Backends**: a headless device for tests and tools, and Vulkan 1.2
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_pipeline::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tri = [
//!         Vertex::new([-1.0, 0.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
//!         Vertex::new([1.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
//!         Vertex::new([1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 1.0]),
//!     ];
//!     let mut meshes = MeshBatchBuilder::new();
//!     meshes.add_mesh("tri", &tri, &[0, 1, 2])?;
//!
//!     let mut catalog = CatalogBuilder::new();
//!     catalog
//!         .add_material("plain", MaterialDesc::default())?
//!         .add_item(RenderItemDesc::new("tri", "tri", "plain"))?;
//!
//!     let assets = SceneAssets {
//!         meshes: meshes.build(),
//!         catalog,
//!         lighting: LightingEnvironment::default_scene(),
//!     };
//!     let mut renderer = FrameRenderer::new(HeadlessDevice::new(), &RendererConfig::default(), assets)?;
//!
//!     let mut timer = FrameTimer::new();
//!     for _ in 0..10 {
//!         let receipt = renderer.render_frame(timer.tick())?;
//!         // present here
//!         let _ = receipt;
//!     }
//!     renderer.shutdown()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod input;
pub mod render;

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        core::config::{CameraConfig, Config, ConfigFormat, RendererConfig, VulkanConfig},
        foundation::{
            math::{Mat4, Transform, Vec3},
            time::{FrameTimer, FrameTiming},
        },
        input::{InputController, InputEvent, InputResponse, KeyCode},
        render::{
            backends::headless::{HeadlessDevice, RetirementThread, SimulatedTimeline},
            CatalogBuilder, FrameReceipt, FrameRenderer, LightingEnvironment, MaterialDesc,
            MaterialParams, MeshBatchBuilder, PipelineGroup, RenderDevice, RenderError,
            RenderItemDesc, RenderResult, SceneAssets, TextureData, Topology, Vertex,
        },
    };
}

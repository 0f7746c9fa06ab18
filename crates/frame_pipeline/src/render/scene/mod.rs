//! Scene data consumed by the frame pipeline
//!
//! The merged mesh batch, render items, materials and the catalog that
//! freezes their slot assignments.

pub mod catalog;
pub mod mesh_batch;
pub mod render_item;

pub use catalog::{CatalogBuilder, RenderItemCatalog, RenderItemDesc};
pub use mesh_batch::{MeshBatch, MeshBatchBuilder, SubmeshRange, Vertex};
pub use render_item::{
    DirtyCounter, MaterialDesc, MaterialItem, MaterialParams, PipelineGroup, RenderItem, Topology,
};

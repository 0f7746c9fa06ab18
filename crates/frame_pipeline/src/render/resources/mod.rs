//! GPU-facing resource layouts
//!
//! Constant records, the per-slot upload pools that hold them, the binding
//! table that addresses them, and texture pixel data.

pub mod binding_table;
pub mod constants;
pub mod texture;
pub mod upload_pool;

pub use binding_table::{BindingBand, BindingTableAllocator, BindingTableLayout, TableEntry};
pub use constants::{
    constant_buffer_byte_size, ConstantKind, ConstantRecord, LightConstants, LightData,
    MaterialConstants, ObjectConstants, PassConstants, MIN_CONSTANT_ALIGNMENT,
};
pub use texture::TextureData;
pub use upload_pool::ConstantUploadPool;

//! Multi-buffered frame resources

pub mod ring;
pub mod update;

pub use ring::{AcquiredSlot, FramePools, FrameResourceRing, FrameSlot, SlotState};
pub use update::{upload_dirty_materials, upload_dirty_objects, UploadStats};

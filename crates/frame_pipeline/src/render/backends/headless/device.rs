//! Headless render device
//!
//! Implements the device seam in host memory. Upload pools are plain byte
//! vectors, command lists record a [`RecordedCommand`] stream, and the
//! completion counter is a [`SimulatedTimeline`]. Used by the test suite
//! and by tools that want the full frame loop without a GPU.

use std::sync::Arc;

use crate::render::api::{
    BufferId, CommandRecorder, DrawIndexedArgs, DrawViews, GeometryBuffers, PassBinding,
    RenderDevice, RootViews, TextureHandle, UploadMemory,
};
use crate::render::backends::headless::timeline::SimulatedTimeline;
use crate::render::resources::binding_table::{BindingTableLayout, TableEntry};
use crate::render::resources::constants::MIN_CONSTANT_ALIGNMENT;
use crate::render::resources::texture::TextureData;
use crate::render::scene::{PipelineGroup, Topology};
use crate::render::{RenderError, RenderResult};

/// Upload memory backed by a host allocation
#[derive(Debug, Clone)]
pub struct HostMemory {
    bytes: Vec<u8>,
    id: BufferId,
}

impl HostMemory {
    /// `len` zero bytes identified as buffer `id`
    pub fn zeroed(len: usize, id: u64) -> Self {
        Self {
            bytes: vec![0; len],
            id: BufferId(id),
        }
    }
}

impl UploadMemory for HostMemory {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn buffer_id(&self) -> BufferId {
        self.id
    }
}

/// One command captured by [`HeadlessCommands`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordedCommand {
    /// Output pass opened
    BeginPass(PassBinding),
    /// Pipeline group switched
    SetPipeline(PipelineGroup),
    /// Shared geometry bound
    BindGeometry(GeometryBuffers),
    /// Topology set
    SetTopology(Topology),
    /// Draw views bound
    BindViews(DrawViews),
    /// Indexed draw
    DrawIndexed(DrawIndexedArgs),
    /// Output pass closed
    EndPass,
}

/// Command list of one frame slot
#[derive(Debug)]
pub struct HeadlessCommands {
    slot: usize,
    commands: Vec<RecordedCommand>,
    in_pass: bool,
    submitted: bool,
}

impl HeadlessCommands {
    /// Frame slot the list belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Commands recorded since the last reset
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    fn require_pass(&self, what: &str) -> RenderResult<()> {
        if !self.in_pass {
            return Err(RenderError::Device(format!("{what} recorded outside a pass")));
        }
        Ok(())
    }

    fn record(&mut self, command: RecordedCommand) -> RenderResult<()> {
        if self.submitted {
            return Err(RenderError::Device(format!(
                "command list of slot {} recorded after submit without reset",
                self.slot
            )));
        }
        self.commands.push(command);
        Ok(())
    }
}

impl CommandRecorder for HeadlessCommands {
    fn begin_pass(&mut self, pass: &PassBinding) -> RenderResult<()> {
        if self.in_pass {
            return Err(RenderError::Device("pass already open".to_string()));
        }
        self.record(RecordedCommand::BeginPass(*pass))?;
        self.in_pass = true;
        Ok(())
    }

    fn set_pipeline(&mut self, group: PipelineGroup) -> RenderResult<()> {
        self.require_pass("set_pipeline")?;
        self.record(RecordedCommand::SetPipeline(group))
    }

    fn bind_geometry(&mut self, geometry: &GeometryBuffers) -> RenderResult<()> {
        self.require_pass("bind_geometry")?;
        self.record(RecordedCommand::BindGeometry(*geometry))
    }

    fn set_topology(&mut self, topology: Topology) -> RenderResult<()> {
        self.require_pass("set_topology")?;
        self.record(RecordedCommand::SetTopology(topology))
    }

    fn bind_views(&mut self, views: DrawViews) -> RenderResult<()> {
        self.require_pass("bind_views")?;
        self.record(RecordedCommand::BindViews(views))
    }

    fn draw_indexed(&mut self, args: DrawIndexedArgs) -> RenderResult<()> {
        self.require_pass("draw_indexed")?;
        self.record(RecordedCommand::DrawIndexed(args))
    }

    fn end_pass(&mut self) -> RenderResult<()> {
        self.require_pass("end_pass")?;
        self.record(RecordedCommand::EndPass)?;
        self.in_pass = false;
        Ok(())
    }
}

/// A command list as it reached the queue
#[derive(Debug, Clone)]
pub struct SubmittedList {
    /// Frame slot that recorded it
    pub slot: usize,
    /// Recorded commands
    pub commands: Vec<RecordedCommand>,
    /// Last completion value signaled before this submission
    pub after_signal: u64,
}

/// Binding table as realized on the device
#[derive(Debug, Clone)]
pub struct RealizedBindingTable {
    /// Table layout
    pub layout: BindingTableLayout,
    /// Entries in offset order
    pub entries: Vec<TableEntry>,
    /// Root views per frame slot
    pub root_views: Vec<RootViews>,
}

/// Host-memory implementation of [`RenderDevice`]
pub struct HeadlessDevice {
    timeline: Arc<SimulatedTimeline>,
    constant_alignment: usize,
    next_buffer_id: u64,
    textures: Vec<(u32, u32)>,
    geometry: Option<GeometryBuffers>,
    binding_table: Option<RealizedBindingTable>,
    submissions: Vec<SubmittedList>,
    signals: Vec<u64>,
    staging_bytes: usize,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Device whose GPU finishes work as soon as it is submitted
    pub fn new() -> Self {
        Self::with_timeline(SimulatedTimeline::new(true))
    }

    /// Device driven by an externally controlled timeline
    pub fn with_timeline(timeline: Arc<SimulatedTimeline>) -> Self {
        Self {
            timeline,
            constant_alignment: MIN_CONSTANT_ALIGNMENT,
            next_buffer_id: 1,
            textures: Vec::new(),
            geometry: None,
            binding_table: None,
            submissions: Vec::new(),
            signals: Vec::new(),
            staging_bytes: 0,
        }
    }

    /// Override the reported constant alignment
    pub fn with_constant_alignment(mut self, alignment: usize) -> Self {
        self.constant_alignment = alignment;
        self
    }

    /// Timeline backing the completion counter
    pub fn timeline(&self) -> &Arc<SimulatedTimeline> {
        &self.timeline
    }

    /// Every submission so far, oldest first
    pub fn submissions(&self) -> &[SubmittedList] {
        &self.submissions
    }

    /// Every signaled completion value, oldest first
    pub fn signals(&self) -> Vec<u64> {
        self.signals.clone()
    }

    /// The realized binding table
    pub fn binding_table(&self) -> Option<&RealizedBindingTable> {
        self.binding_table.as_ref()
    }

    /// Uploaded texture sizes in handle order
    pub fn textures(&self) -> &[(u32, u32)] {
        &self.textures
    }

    /// Geometry of the last mesh upload
    pub fn geometry(&self) -> Option<GeometryBuffers> {
        self.geometry
    }

    /// Staging bytes not yet released
    pub fn staging_bytes(&self) -> usize {
        self.staging_bytes
    }

    fn next_buffer(&mut self) -> BufferId {
        let id = BufferId(self.next_buffer_id);
        self.next_buffer_id += 1;
        id
    }
}

impl RenderDevice for HeadlessDevice {
    type Memory = HostMemory;
    type Commands = HeadlessCommands;

    fn constant_alignment(&self) -> usize {
        self.constant_alignment
    }

    fn create_upload_memory(&mut self, byte_size: usize) -> RenderResult<HostMemory> {
        let id = self.next_buffer();
        Ok(HostMemory::zeroed(byte_size, id.0))
    }

    fn create_commands(&mut self, slot: usize) -> RenderResult<HeadlessCommands> {
        Ok(HeadlessCommands {
            slot,
            commands: Vec::new(),
            in_pass: false,
            submitted: false,
        })
    }

    fn upload_geometry(
        &mut self,
        vertex_bytes: &[u8],
        vertex_stride: u32,
        indices: &[u32],
    ) -> RenderResult<GeometryBuffers> {
        if vertex_stride == 0 || vertex_bytes.len() % vertex_stride as usize != 0 {
            return Err(RenderError::InvalidGeometry(format!(
                "{} vertex bytes are not a multiple of stride {}",
                vertex_bytes.len(),
                vertex_stride
            )));
        }

        let geometry = GeometryBuffers {
            vertex_buffer: self.next_buffer(),
            index_buffer: self.next_buffer(),
            vertex_stride,
            vertex_count: (vertex_bytes.len() / vertex_stride as usize) as u32,
            index_count: indices.len() as u32,
        };
        self.staging_bytes += vertex_bytes.len() + std::mem::size_of_val(indices);
        self.geometry = Some(geometry);
        Ok(geometry)
    }

    fn upload_texture(&mut self, texture: &TextureData) -> RenderResult<TextureHandle> {
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push((texture.width, texture.height));
        self.staging_bytes += texture.byte_size();
        Ok(handle)
    }

    fn create_binding_table(
        &mut self,
        layout: &BindingTableLayout,
        entries: &[TableEntry],
        root_views: &[RootViews],
    ) -> RenderResult<()> {
        if entries.len() != layout.capacity() as usize {
            return Err(RenderError::Device(format!(
                "binding table layout holds {} views, {} entries supplied",
                layout.capacity(),
                entries.len()
            )));
        }
        if root_views.len() != layout.frame_count() {
            return Err(RenderError::Device(format!(
                "{} root view sets for {} frame slots",
                root_views.len(),
                layout.frame_count()
            )));
        }

        self.binding_table = Some(RealizedBindingTable {
            layout: *layout,
            entries: entries.to_vec(),
            root_views: root_views.to_vec(),
        });
        Ok(())
    }

    fn reset_commands(&mut self, commands: &mut HeadlessCommands) -> RenderResult<()> {
        commands.commands.clear();
        commands.in_pass = false;
        commands.submitted = false;
        Ok(())
    }

    fn submit(&mut self, commands: &mut HeadlessCommands) -> RenderResult<()> {
        if commands.in_pass {
            return Err(RenderError::Device(format!(
                "slot {} submitted with an open pass",
                commands.slot
            )));
        }
        commands.submitted = true;
        self.submissions.push(SubmittedList {
            slot: commands.slot,
            commands: commands.commands.clone(),
            after_signal: self.signals.last().copied().unwrap_or(0),
        });
        Ok(())
    }

    fn queue_signal(&mut self, value: u64) -> RenderResult<()> {
        if let Some(reason) = self.timeline.failure() {
            return Err(RenderError::Device(reason));
        }
        self.signals.push(value);
        self.timeline.enqueue(value);
        Ok(())
    }

    fn completed_value(&self) -> RenderResult<u64> {
        if let Some(reason) = self.timeline.failure() {
            return Err(RenderError::WaitFailed(reason));
        }
        Ok(self.timeline.completed())
    }

    fn wait_for_value(&self, value: u64) -> RenderResult<()> {
        self.timeline.wait_for(value).map_err(RenderError::WaitFailed)
    }

    fn release_staging(&mut self) -> RenderResult<()> {
        log::debug!("Released {} staging bytes", self.staging_bytes);
        self.staging_bytes = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{ConstantView, Viewport};

    fn pass() -> PassBinding {
        let view = ConstantView {
            buffer: BufferId(1),
            offset: 0,
            size: 512,
        };
        PassBinding {
            frame_index: 0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            viewport: Viewport { width: 8, height: 8 },
            root_views: RootViews { pass: view, light: view },
        }
    }

    #[test]
    fn test_commands_outside_pass_are_rejected() {
        let mut device = HeadlessDevice::new();
        let mut commands = device.create_commands(0).unwrap();

        assert!(commands.set_pipeline(PipelineGroup::Opaque).is_err());
        commands.begin_pass(&pass()).unwrap();
        assert!(commands.begin_pass(&pass()).is_err());
        commands.set_pipeline(PipelineGroup::Opaque).unwrap();
        commands.end_pass().unwrap();
        assert_eq!(commands.commands().len(), 3);
    }

    #[test]
    fn test_submit_requires_closed_pass_and_reset() {
        let mut device = HeadlessDevice::new();
        let mut commands = device.create_commands(1).unwrap();

        commands.begin_pass(&pass()).unwrap();
        assert!(device.submit(&mut commands).is_err());
        commands.end_pass().unwrap();
        device.submit(&mut commands).unwrap();

        // Recording again without a reset would overwrite in-flight commands
        assert!(commands.begin_pass(&pass()).is_err());
        device.reset_commands(&mut commands).unwrap();
        assert!(commands.commands().is_empty());
        commands.begin_pass(&pass()).unwrap();

        assert_eq!(device.submissions().len(), 1);
        assert_eq!(device.submissions()[0].slot, 1);
    }

    #[test]
    fn test_upload_memory_ids_are_unique() {
        let mut device = HeadlessDevice::new();
        let a = device.create_upload_memory(256).unwrap();
        let b = device.create_upload_memory(256).unwrap();
        assert_ne!(a.buffer_id(), b.buffer_id());
        assert_eq!(a.bytes().len(), 256);
    }

    #[test]
    fn test_staging_is_released() {
        let mut device = HeadlessDevice::new();
        device.upload_geometry(&[0; 64], 32, &[0, 1, 1]).unwrap();
        device
            .upload_texture(&TextureData::checkerboard(2, 1, [0; 4], [255; 4]))
            .unwrap();
        assert_eq!(device.staging_bytes(), 64 + 12 + 16);

        device.release_staging().unwrap();
        assert_eq!(device.staging_bytes(), 0);
    }

    #[test]
    fn test_ragged_vertex_bytes_are_rejected() {
        let mut device = HeadlessDevice::new();
        assert!(device.upload_geometry(&[0; 40], 32, &[0]).is_err());
    }
}

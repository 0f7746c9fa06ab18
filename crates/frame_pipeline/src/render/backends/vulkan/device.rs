//! Vulkan [`RenderDevice`]
//!
//! Owns the context, the completion timeline, the initial-upload resources
//! and the descriptor table. Each frame slot gets a [`VulkanCommands`] with
//! its own command pool; `reset_commands` resets that pool and refreshes the
//! handles the slot records against (pipelines, render target, descriptor
//! sets), so the application can supply pipelines after setup.

use std::collections::HashMap;

use ash::{vk, Device};

use super::buffer::{Buffer, HostUploadMemory};
use super::context::VulkanContext;
use super::descriptor_table::{DescriptorTable, DrawPushConstants};
use super::sync::TimelineSemaphore;
use super::texture::DeviceTexture;
use super::{VulkanError, VulkanResult};
use crate::core::config::VulkanConfig;
use crate::render::api::{
    BufferId, CommandRecorder, DrawIndexedArgs, DrawViews, GeometryBuffers, PassBinding,
    RenderDevice, RootViews, TextureHandle,
};
use crate::render::resources::binding_table::{BindingTableLayout, TableEntry};
use crate::render::resources::constants::MIN_CONSTANT_ALIGNMENT;
use crate::render::resources::texture::TextureData;
use crate::render::scene::{PipelineGroup, Topology};
use crate::render::{RenderError, RenderResult};

/// Output the pass renders into, owned by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// Render pass with one color and one depth attachment
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the current output image
    pub framebuffer: vk::Framebuffer,
    /// Size of the framebuffer
    pub extent: vk::Extent2D,
}

/// Pipeline of one group and the topology baked into it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPipeline {
    /// Pipeline handle, created with [`VulkanDevice::pipeline_layout`]
    pub pipeline: vk::Pipeline,
    /// Topology the pipeline was created with
    pub topology: Topology,
}

/// Pipelines of every group, indexed by [`PipelineGroup::index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSet {
    /// Opaque, line and transparent pipelines
    pub groups: [GroupPipeline; 3],
}

impl PipelineSet {
    fn get(&self, group: PipelineGroup) -> GroupPipeline {
        self.groups[group.index()]
    }
}

/// Handles a slot records against, refreshed on every reset
#[derive(Debug, Clone, Copy)]
struct BoundState {
    pipeline_layout: vk::PipelineLayout,
    table_set: vk::DescriptorSet,
    root_set: vk::DescriptorSet,
    layout: BindingTableLayout,
    pipelines: PipelineSet,
    target: RenderTarget,
    geometry: Option<(GeometryBuffers, vk::Buffer, vk::Buffer)>,
}

/// Command pool and primary command buffer of one frame slot
pub struct VulkanCommands {
    device: Device,
    slot: usize,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
    bound: Option<BoundState>,
    recording: bool,
    in_pass: bool,
    pipeline: Option<GroupPipeline>,
}

impl VulkanCommands {
    /// Frame slot this context belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Raw command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    fn bound(&self) -> RenderResult<&BoundState> {
        if !self.recording {
            return Err(RenderError::Device(format!("slot {} is not recording", self.slot)));
        }
        self.bound.as_ref().ok_or_else(|| {
            RenderError::Device(format!("slot {} has no pipelines or render target bound", self.slot))
        })
    }

    fn require_pass(&self, what: &str) -> RenderResult<&BoundState> {
        if !self.in_pass {
            return Err(RenderError::Device(format!("{what} outside of a pass")));
        }
        self.bound()
    }
}

impl CommandRecorder for VulkanCommands {
    fn begin_pass(&mut self, pass: &PassBinding) -> RenderResult<()> {
        if self.in_pass {
            return Err(RenderError::Device("pass already open".to_string()));
        }
        let bound = *self.bound()?;
        let [r, g, b, a] = pass.clear_color;
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: [r, g, b, a] },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let extent = vk::Extent2D {
            width: pass.viewport.width.min(bound.target.extent.width),
            height: pass.viewport.height.min(bound.target.extent.height),
        };
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(bound.target.render_pass)
            .framebuffer(bound.target.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: bound.target.extent,
            })
            .clear_values(&clear_values);
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device.cmd_begin_render_pass(self.buffer, &render_pass_info, vk::SubpassContents::INLINE);
            self.device.cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(self.buffer, 0, &[scissor]);
            self.device.cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                bound.pipeline_layout,
                0,
                &[bound.table_set, bound.root_set],
                &[],
            );
        }
        self.in_pass = true;
        self.pipeline = None;
        Ok(())
    }

    fn set_pipeline(&mut self, group: PipelineGroup) -> RenderResult<()> {
        let pipeline = self.require_pass("set_pipeline")?.pipelines.get(group);
        unsafe {
            self.device.cmd_bind_pipeline(self.buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        }
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn bind_geometry(&mut self, geometry: &GeometryBuffers) -> RenderResult<()> {
        let (uploaded, vertex_buffer, index_buffer) = self
            .require_pass("bind_geometry")?
            .geometry
            .ok_or_else(|| RenderError::Device("no geometry uploaded".to_string()))?;
        if uploaded != *geometry {
            return Err(RenderError::InvalidGeometry(format!(
                "buffers {:?}/{:?} were not uploaded by this device",
                geometry.vertex_buffer, geometry.index_buffer
            )));
        }
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.buffer, 0, &[vertex_buffer], &[0]);
            self.device.cmd_bind_index_buffer(self.buffer, index_buffer, 0, vk::IndexType::UINT32);
        }
        Ok(())
    }

    fn set_topology(&mut self, topology: Topology) -> RenderResult<()> {
        self.require_pass("set_topology")?;
        // Vulkan 1.2 bakes topology into the pipeline
        match self.pipeline {
            Some(pipeline) if pipeline.topology == topology => Ok(()),
            Some(pipeline) => Err(RenderError::Device(format!(
                "bound pipeline draws {:?}, not {:?}",
                pipeline.topology, topology
            ))),
            None => Err(RenderError::Device("set_topology before set_pipeline".to_string())),
        }
    }

    fn bind_views(&mut self, views: DrawViews) -> RenderResult<()> {
        let bound = *self.require_pass("bind_views")?;
        let push = DrawPushConstants::for_views(&bound.layout, views)?;
        unsafe {
            self.device.cmd_push_constants(
                self.buffer,
                bound.pipeline_layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&push),
            );
        }
        Ok(())
    }

    fn draw_indexed(&mut self, args: DrawIndexedArgs) -> RenderResult<()> {
        self.require_pass("draw_indexed")?;
        if self.pipeline.is_none() {
            return Err(RenderError::Device("draw before set_pipeline".to_string()));
        }
        unsafe {
            self.device.cmd_draw_indexed(
                self.buffer,
                args.index_count,
                args.instance_count,
                args.start_index,
                args.base_vertex,
                args.first_instance,
            );
        }
        Ok(())
    }

    fn end_pass(&mut self) -> RenderResult<()> {
        self.require_pass("end_pass")?;
        unsafe { self.device.cmd_end_render_pass(self.buffer) };
        self.in_pass = false;
        Ok(())
    }
}

impl Drop for VulkanCommands {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its command buffer
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Vulkan 1.2 implementation of [`RenderDevice`]
pub struct VulkanDevice {
    timeline: TimelineSemaphore,
    setup_pool: vk::CommandPool,
    setup_buffers: Vec<vk::CommandBuffer>,
    staging: Vec<Buffer>,
    geometry: Vec<Buffer>,
    uploaded_geometry: Option<(GeometryBuffers, vk::Buffer, vk::Buffer)>,
    textures: Vec<DeviceTexture>,
    table: Option<DescriptorTable>,
    upload_buffers: HashMap<BufferId, vk::Buffer>,
    pipelines: Option<PipelineSet>,
    target: Option<RenderTarget>,
    next_buffer_id: u64,
    // Destroyed last
    context: VulkanContext,
}

impl VulkanDevice {
    /// Create a headless context and the device on top of it
    pub fn new(config: &VulkanConfig) -> RenderResult<Self> {
        let context = VulkanContext::new(config)?;
        Ok(Self::with_context(context)?)
    }

    /// Wrap an existing context
    pub fn with_context(context: VulkanContext) -> VulkanResult<Self> {
        let device = context.raw_device();
        let timeline = TimelineSemaphore::new(device)?;
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(context.graphics_queue_family())
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let setup_pool = unsafe {
            device.create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            timeline,
            setup_pool,
            setup_buffers: Vec::new(),
            staging: Vec::new(),
            geometry: Vec::new(),
            uploaded_geometry: None,
            textures: Vec::new(),
            table: None,
            upload_buffers: HashMap::new(),
            pipelines: None,
            target: None,
            next_buffer_id: 1,
            context,
        })
    }

    /// The underlying context
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    /// Layout application pipelines must be created with, once the table exists
    pub fn pipeline_layout(&self) -> RenderResult<vk::PipelineLayout> {
        self.table
            .as_ref()
            .map(DescriptorTable::pipeline_layout)
            .ok_or(RenderError::TableNotAllocated)
    }

    /// Pipelines used from the next reset of each slot on
    pub fn set_pipelines(&mut self, pipelines: PipelineSet) {
        self.pipelines = Some(pipelines);
    }

    /// Render target used from the next reset of each slot on
    pub fn set_render_target(&mut self, target: RenderTarget) {
        self.target = Some(target);
    }

    /// Staging buffers still waiting for release
    pub fn staging_buffer_count(&self) -> usize {
        self.staging.len()
    }

    fn next_buffer(&mut self) -> BufferId {
        let id = BufferId(self.next_buffer_id);
        self.next_buffer_id += 1;
        id
    }

    /// Record `record` into a one-time command buffer and submit it without waiting
    fn submit_setup<F>(&mut self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer) -> VulkanResult<()>,
    {
        let device = self.context.raw_device();
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(self.setup_pool)
            .command_buffer_count(1);
        let command_buffer = unsafe {
            device.allocate_command_buffers(&allocate_info)
                .map_err(VulkanError::Api)?
                .into_iter()
                .next()
                .ok_or_else(|| VulkanError::InvalidOperation {
                    reason: "no command buffer allocated".to_string(),
                })?
        };
        self.setup_buffers.push(command_buffer);

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device.begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        record(device, command_buffer)?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            device.end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
            device.queue_submit(self.context.graphics_queue(), &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
        }
        Ok(())
    }

    fn device_local_copy(&mut self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<vk::Buffer> {
        let device = self.context.raw_device();
        let memory_properties = self.context.memory_properties();
        let staging = Buffer::staging(device, memory_properties, bytes)?;
        let target = Buffer::new(
            device,
            memory_properties,
            bytes.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let (src, dst, size) = (staging.handle(), target.handle(), bytes.len() as vk::DeviceSize);
        self.submit_setup(|device, command_buffer| {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            unsafe { device.cmd_copy_buffer(command_buffer, src, dst, &[region]) };
            Ok(())
        })?;

        self.staging.push(staging);
        self.geometry.push(target);
        Ok(dst)
    }
}

impl RenderDevice for VulkanDevice {
    type Memory = HostUploadMemory;
    type Commands = VulkanCommands;

    fn constant_alignment(&self) -> usize {
        let device_alignment = self.context.limits().min_uniform_buffer_offset_alignment as usize;
        device_alignment.max(MIN_CONSTANT_ALIGNMENT)
    }

    fn create_upload_memory(&mut self, byte_size: usize) -> RenderResult<HostUploadMemory> {
        let id = self.next_buffer();
        let memory = HostUploadMemory::new(
            self.context.raw_device(),
            self.context.memory_properties(),
            byte_size,
            id,
        )?;
        self.upload_buffers.insert(id, memory.handle());
        Ok(memory)
    }

    fn create_commands(&mut self, slot: usize) -> RenderResult<VulkanCommands> {
        let device = self.context.raw_device();
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(self.context.graphics_queue_family());
        let pool = unsafe {
            device.create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };
        let mut commands = VulkanCommands {
            device: device.clone(),
            slot,
            pool,
            buffer: vk::CommandBuffer::null(),
            bound: None,
            recording: false,
            in_pass: false,
            pipeline: None,
        };

        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(pool)
            .command_buffer_count(1);
        commands.buffer = unsafe {
            device.allocate_command_buffers(&allocate_info)
                .map_err(VulkanError::Api)?
                .into_iter()
                .next()
                .ok_or_else(|| RenderError::Device("no command buffer allocated".to_string()))?
        };
        log::debug!("Created command pool for frame slot {}", slot);
        Ok(commands)
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

        let vertex_buffer = self.device_local_copy(vertex_bytes, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = self.device_local_copy(bytemuck::cast_slice(indices), vk::BufferUsageFlags::INDEX_BUFFER)?;
        let geometry = GeometryBuffers {
            vertex_buffer: self.next_buffer(),
            index_buffer: self.next_buffer(),
            vertex_stride,
            vertex_count: (vertex_bytes.len() / vertex_stride as usize) as u32,
            index_count: indices.len() as u32,
        };
        self.uploaded_geometry = Some((geometry, vertex_buffer, index_buffer));
        Ok(geometry)
    }

    fn upload_texture(&mut self, texture: &TextureData) -> RenderResult<TextureHandle> {
        let device = self.context.raw_device().clone();
        let memory_properties = *self.context.memory_properties();
        let mut uploaded = None;
        self.submit_setup(|_, command_buffer| {
            uploaded = Some(DeviceTexture::upload(&device, &memory_properties, command_buffer, texture)?);
            Ok(())
        })?;

        let (device_texture, staging) = uploaded.ok_or_else(|| RenderError::Texture("texture upload was not recorded".to_string()))?;
        let handle = TextureHandle(self.textures.len() as u32);
        self.textures.push(device_texture);
        self.staging.push(staging);
        Ok(handle)
    }

    fn create_binding_table(
        &mut self,
        layout: &BindingTableLayout,
        entries: &[TableEntry],
        root_views: &[RootViews],
    ) -> RenderResult<()> {
        if self.table.is_some() {
            return Err(RenderError::TableFrozen);
        }
        let upload_buffers = &self.upload_buffers;
        let table = DescriptorTable::new(
            self.context.raw_device(),
            self.context.limits(),
            layout,
            entries,
            root_views,
            &self.textures,
            |id| upload_buffers.get(&id).copied(),
        )?;
        self.table = Some(table);
        Ok(())
    }

    fn reset_commands(&mut self, commands: &mut VulkanCommands) -> RenderResult<()> {
        let device = self.context.raw_device();
        unsafe {
            device.reset_command_pool(commands.pool, vk::CommandPoolResetFlags::empty())
                .map_err(VulkanError::Api)?;
            device.begin_command_buffer(
                commands.buffer,
                &vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )
            .map_err(VulkanError::Api)?;
        }

        commands.bound = match (&self.table, self.pipelines, self.target) {
            (Some(table), Some(pipelines), Some(target)) => Some(BoundState {
                pipeline_layout: table.pipeline_layout(),
                table_set: table.table_set(),
                root_set: table.root_set(commands.slot).ok_or(RenderError::SlotOutOfRange {
                    index: commands.slot,
                    capacity: table.layout().frame_count(),
                })?,
                layout: *table.layout(),
                pipelines,
                target,
                geometry: self.uploaded_geometry,
            }),
            _ => None,
        };
        commands.recording = true;
        commands.in_pass = false;
        commands.pipeline = None;
        Ok(())
    }

    fn submit(&mut self, commands: &mut VulkanCommands) -> RenderResult<()> {
        if commands.in_pass {
            return Err(RenderError::Device(format!("slot {} submitted with an open pass", commands.slot)));
        }
        if !commands.recording {
            return Err(RenderError::Device(format!("slot {} submitted without a reset", commands.slot)));
        }

        let device = self.context.raw_device();
        let command_buffers = [commands.buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            device.end_command_buffer(commands.buffer)
                .map_err(VulkanError::Api)?;
            device.queue_submit(self.context.graphics_queue(), &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
        }
        commands.recording = false;
        Ok(())
    }

    fn queue_signal(&mut self, value: u64) -> RenderResult<()> {
        self.timeline
            .queue_signal(self.context.graphics_queue(), value)
            .map_err(|e| RenderError::Device(e.to_string()))
    }

    fn completed_value(&self) -> RenderResult<u64> {
        self.timeline
            .completed_value()
            .map_err(|e| RenderError::WaitFailed(e.to_string()))
    }

    fn wait_for_value(&self, value: u64) -> RenderResult<()> {
        self.timeline
            .wait_for_value(value)
            .map_err(|e| RenderError::WaitFailed(e.to_string()))
    }

    fn release_staging(&mut self) -> RenderResult<()> {
        let device = self.context.raw_device();
        if !self.setup_buffers.is_empty() {
            unsafe { device.free_command_buffers(self.setup_pool, &self.setup_buffers) };
        }
        log::debug!(
            "Released {} staging buffers and {} setup command buffers",
            self.staging.len(),
            self.setup_buffers.len()
        );
        self.setup_buffers.clear();
        self.staging.clear();
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            let device = self.context.raw_device();
            let _ = device.device_wait_idle();
            device.destroy_command_pool(self.setup_pool, None);
        }
    }
}

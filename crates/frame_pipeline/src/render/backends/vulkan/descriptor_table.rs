//! Binding table and root descriptor sets
//!
//! Set 0 is the binding table: binding 0 holds every object constant view,
//! binding 1 every material constant view, binding 2 every texture, each as
//! one array in flat-table order. Set 1 is per frame slot and holds the pass
//! (binding 0) and light (binding 1) constants. Draws select array elements
//! through [`DrawPushConstants`].

use ash::{vk, Device};

use super::texture::DeviceTexture;
use super::{VulkanError, VulkanResult};
use crate::render::api::{BufferId, ConstantView, DrawViews, RootViews, ViewHandle};
use crate::render::resources::binding_table::{BindingBand, BindingTableLayout, TableEntry};

const OBJECT_BINDING: u32 = 0;
const MATERIAL_BINDING: u32 = 1;
const TEXTURE_BINDING: u32 = 2;
const PASS_BINDING: u32 = 0;
const LIGHT_BINDING: u32 = 1;

/// Per-draw array indices pushed before each draw
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawPushConstants {
    /// Element of the object array
    pub object_index: u32,
    /// Element of the material array
    pub material_index: u32,
    /// Element of the texture array, [`DrawPushConstants::NO_TEXTURE`] when untextured
    pub texture_index: u32,
    /// Padding to 16 bytes
    pub _pad: u32,
}

unsafe impl bytemuck::Pod for DrawPushConstants {}
unsafe impl bytemuck::Zeroable for DrawPushConstants {}

impl DrawPushConstants {
    /// Texture index of untextured draws
    pub const NO_TEXTURE: u32 = u32::MAX;

    /// Translate flat table views into per-binding array elements
    pub fn for_views(layout: &BindingTableLayout, views: DrawViews) -> VulkanResult<Self> {
        Ok(Self {
            object_index: array_element(layout, BindingBand::Object, views.object)?,
            material_index: array_element(layout, BindingBand::Material, views.material)?,
            texture_index: match views.texture {
                Some(handle) => array_element(layout, BindingBand::Texture, handle)?,
                None => Self::NO_TEXTURE,
            },
            _pad: 0,
        })
    }
}

fn array_element(layout: &BindingTableLayout, band: BindingBand, handle: ViewHandle) -> VulkanResult<u32> {
    let range = layout.band_range(band);
    if range.contains(&handle.0) {
        Ok(handle.0 - range.start)
    } else {
        Err(VulkanError::InvalidOperation {
            reason: format!("view {} is not in the {:?} band {:?}", handle.0, band, range),
        })
    }
}

/// Descriptor layouts, pool and sets realizing one binding table
pub struct DescriptorTable {
    device: Device,
    layout: BindingTableLayout,
    table_set_layout: vk::DescriptorSetLayout,
    root_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    pool: vk::DescriptorPool,
    table_set: vk::DescriptorSet,
    root_sets: Vec<vk::DescriptorSet>,
}

impl DescriptorTable {
    /// Create and fill the descriptor sets.
    ///
    /// `resolve_buffer` maps upload buffer ids to Vulkan buffers.
    pub fn new<F>(
        device: &Device,
        limits: &vk::PhysicalDeviceLimits,
        layout: &BindingTableLayout,
        entries: &[TableEntry],
        root_views: &[RootViews],
        textures: &[DeviceTexture],
        resolve_buffer: F,
    ) -> VulkanResult<Self>
    where
        F: Fn(BufferId) -> Option<vk::Buffer>,
    {
        let object_views = band_len(layout, BindingBand::Object);
        let material_views = band_len(layout, BindingBand::Material);
        let texture_views = band_len(layout, BindingBand::Texture);
        check_limits(limits, object_views + material_views, texture_views)?;

        let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let table_bindings = [
            array_binding(OBJECT_BINDING, vk::DescriptorType::UNIFORM_BUFFER, object_views, stages),
            array_binding(MATERIAL_BINDING, vk::DescriptorType::UNIFORM_BUFFER, material_views, stages),
            array_binding(TEXTURE_BINDING, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, texture_views, vk::ShaderStageFlags::FRAGMENT),
        ];
        let root_bindings = [
            array_binding(PASS_BINDING, vk::DescriptorType::UNIFORM_BUFFER, 1, stages),
            array_binding(LIGHT_BINDING, vk::DescriptorType::UNIFORM_BUFFER, 1, vk::ShaderStageFlags::FRAGMENT),
        ];

        let mut table = Self {
            device: device.clone(),
            layout: *layout,
            table_set_layout: vk::DescriptorSetLayout::null(),
            root_set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pool: vk::DescriptorPool::null(),
            table_set: vk::DescriptorSet::null(),
            root_sets: Vec::new(),
        };

        unsafe {
            table.table_set_layout = device
                .create_descriptor_set_layout(&vk::DescriptorSetLayoutCreateInfo::builder().bindings(&table_bindings), None)
                .map_err(VulkanError::Api)?;
            table.root_set_layout = device
                .create_descriptor_set_layout(&vk::DescriptorSetLayoutCreateInfo::builder().bindings(&root_bindings), None)
                .map_err(VulkanError::Api)?;

            let set_layouts = [table.table_set_layout, table.root_set_layout];
            let push_ranges = [vk::PushConstantRange::builder()
                .stage_flags(stages)
                .offset(0)
                .size(std::mem::size_of::<DrawPushConstants>() as u32)
                .build()];
            table.pipeline_layout = device
                .create_pipeline_layout(
                    &vk::PipelineLayoutCreateInfo::builder()
                        .set_layouts(&set_layouts)
                        .push_constant_ranges(&push_ranges),
                    None,
                )
                .map_err(VulkanError::Api)?;
        }

        let slot_count = root_views.len() as u32;
        let uniform_count = object_views + material_views + 2 * slot_count;
        let pool_sizes: Vec<vk::DescriptorPoolSize> = [
            (vk::DescriptorType::UNIFORM_BUFFER, uniform_count),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, texture_views),
        ]
        .into_iter()
        .filter(|&(_, count)| count > 0)
        .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
        .collect();

        unsafe {
            table.pool = device
                .create_descriptor_pool(
                    &vk::DescriptorPoolCreateInfo::builder()
                        .max_sets(1 + slot_count)
                        .pool_sizes(&pool_sizes),
                    None,
                )
                .map_err(VulkanError::Api)?;

            let mut set_layouts = vec![table.table_set_layout];
            set_layouts.extend(std::iter::repeat(table.root_set_layout).take(root_views.len()));
            let sets = device
                .allocate_descriptor_sets(
                    &vk::DescriptorSetAllocateInfo::builder()
                        .descriptor_pool(table.pool)
                        .set_layouts(&set_layouts),
                )
                .map_err(VulkanError::Api)?;
            table.table_set = sets[0];
            table.root_sets = sets[1..].to_vec();
        }

        table.write_table(entries, textures, &resolve_buffer)?;
        table.write_root_sets(root_views, &resolve_buffer)?;

        log::info!(
            "Descriptor table realized: {} uniform views, {} textures, {} root sets",
            object_views + material_views,
            texture_views,
            slot_count
        );
        Ok(table)
    }

    fn write_table<F>(&self, entries: &[TableEntry], textures: &[DeviceTexture], resolve_buffer: &F) -> VulkanResult<()>
    where
        F: Fn(BufferId) -> Option<vk::Buffer>,
    {
        let mut object_infos = Vec::new();
        let mut material_infos = Vec::new();
        let mut image_infos = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            let band = self
                .layout
                .locate(ViewHandle(index as u32))
                .map(|(band, _, _)| band)
                .ok_or_else(|| VulkanError::InvalidOperation {
                    reason: format!("table entry {} lies outside the layout", index),
                })?;

            match (band, entry) {
                (BindingBand::Object, TableEntry::Constant(view)) => object_infos.push(buffer_info(view, resolve_buffer)?),
                (BindingBand::Material, TableEntry::Constant(view)) => material_infos.push(buffer_info(view, resolve_buffer)?),
                (BindingBand::Texture, TableEntry::Texture(handle)) => {
                    let texture = textures.get(handle.0 as usize).ok_or_else(|| VulkanError::InvalidOperation {
                        reason: format!("unknown texture handle {}", handle.0),
                    })?;
                    image_infos.push(
                        vk::DescriptorImageInfo::builder()
                            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                            .image_view(texture.image_view())
                            .sampler(texture.sampler())
                            .build(),
                    );
                }
                (band, entry) => {
                    return Err(VulkanError::InvalidOperation {
                        reason: format!("{:?} band cannot hold {:?}", band, entry),
                    })
                }
            }
        }

        let mut writes = Vec::new();
        if !object_infos.is_empty() {
            writes.push(self.buffer_write(self.table_set, OBJECT_BINDING, &object_infos));
        }
        if !material_infos.is_empty() {
            writes.push(self.buffer_write(self.table_set, MATERIAL_BINDING, &material_infos));
        }
        if !image_infos.is_empty() {
            writes.push(
                vk::WriteDescriptorSet::builder()
                    .dst_set(self.table_set)
                    .dst_binding(TEXTURE_BINDING)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_infos)
                    .build(),
            );
        }

        unsafe { self.device.update_descriptor_sets(&writes, &[]) };
        Ok(())
    }

    fn write_root_sets<F>(&self, root_views: &[RootViews], resolve_buffer: &F) -> VulkanResult<()>
    where
        F: Fn(BufferId) -> Option<vk::Buffer>,
    {
        for (&set, views) in self.root_sets.iter().zip(root_views) {
            let pass = [buffer_info(&views.pass, resolve_buffer)?];
            let light = [buffer_info(&views.light, resolve_buffer)?];
            let writes = [
                self.buffer_write(set, PASS_BINDING, &pass),
                self.buffer_write(set, LIGHT_BINDING, &light),
            ];
            unsafe { self.device.update_descriptor_sets(&writes, &[]) };
        }
        Ok(())
    }

    fn buffer_write(&self, set: vk::DescriptorSet, binding: u32, infos: &[vk::DescriptorBufferInfo]) -> vk::WriteDescriptorSet {
        vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(infos)
            .build()
    }

    /// Layout every application pipeline must be created with
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// The binding table set
    pub fn table_set(&self) -> vk::DescriptorSet {
        self.table_set
    }

    /// Root set of frame slot `slot`
    pub fn root_set(&self, slot: usize) -> Option<vk::DescriptorSet> {
        self.root_sets.get(slot).copied()
    }

    /// Flat layout this table realizes
    pub fn layout(&self) -> &BindingTableLayout {
        &self.layout
    }
}

impl Drop for DescriptorTable {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its sets
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.destroy_descriptor_set_layout(self.root_set_layout, None);
            self.device.destroy_descriptor_set_layout(self.table_set_layout, None);
        }
    }
}

fn band_len(layout: &BindingTableLayout, band: BindingBand) -> u32 {
    let range = layout.band_range(band);
    range.end - range.start
}

fn array_binding(binding: u32, ty: vk::DescriptorType, count: u32, stages: vk::ShaderStageFlags) -> vk::DescriptorSetLayoutBinding {
    vk::DescriptorSetLayoutBinding::builder()
        .binding(binding)
        .descriptor_type(ty)
        .descriptor_count(count)
        .stage_flags(stages)
        .build()
}

fn buffer_info<F>(view: &ConstantView, resolve_buffer: &F) -> VulkanResult<vk::DescriptorBufferInfo>
where
    F: Fn(BufferId) -> Option<vk::Buffer>,
{
    let buffer = resolve_buffer(view.buffer).ok_or_else(|| VulkanError::InvalidOperation {
        reason: format!("unknown upload buffer {:?}", view.buffer),
    })?;
    Ok(vk::DescriptorBufferInfo::builder()
        .buffer(buffer)
        .offset(view.offset)
        .range(view.size)
        .build())
}

fn check_limits(limits: &vk::PhysicalDeviceLimits, uniform_views: u32, texture_views: u32) -> VulkanResult<()> {
    // Root pass and light views share the pipeline layout's uniform budget
    let uniforms = u64::from(uniform_views) + 2;
    let checks = [
        ("uniform buffers per set", uniforms, limits.max_descriptor_set_uniform_buffers),
        ("uniform buffers per stage", uniforms, limits.max_per_stage_descriptor_uniform_buffers),
        ("sampled images per set", u64::from(texture_views), limits.max_descriptor_set_sampled_images),
        ("samplers per set", u64::from(texture_views), limits.max_descriptor_set_samplers),
    ];

    for (what, requested, limit) in checks {
        if requested > u64::from(limit) {
            return Err(VulkanError::LimitExceeded {
                what,
                requested,
                limit: u64::from(limit),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> BindingTableLayout {
        // 3 slots * (4 objects + 2 materials) + 1 texture = 19 views
        BindingTableLayout::new(3, 4, 2, 1).unwrap()
    }

    #[test]
    fn test_push_constants_use_band_relative_elements() {
        let layout = layout();
        let views = DrawViews {
            object: layout.object_view(2, 1).unwrap(),
            material: layout.material_view(1, 1).unwrap(),
            texture: Some(layout.texture_view(0).unwrap()),
        };

        let push = DrawPushConstants::for_views(&layout, views).unwrap();
        assert_eq!(push.object_index, 9);
        assert_eq!(push.material_index, 3);
        assert_eq!(push.texture_index, 0);
        assert_eq!(std::mem::size_of::<DrawPushConstants>(), 16);
    }

    #[test]
    fn test_untextured_draw_pushes_sentinel() {
        let layout = layout();
        let views = DrawViews {
            object: layout.object_view(0, 0).unwrap(),
            material: layout.material_view(0, 0).unwrap(),
            texture: None,
        };
        let push = DrawPushConstants::for_views(&layout, views).unwrap();
        assert_eq!(push.texture_index, DrawPushConstants::NO_TEXTURE);
    }

    #[test]
    fn test_view_from_wrong_band_is_rejected() {
        let layout = layout();
        let views = DrawViews {
            object: layout.material_view(0, 0).unwrap(),
            material: layout.material_view(0, 0).unwrap(),
            texture: None,
        };
        assert!(matches!(
            DrawPushConstants::for_views(&layout, views),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_limits_are_checked() {
        let mut limits = vk::PhysicalDeviceLimits::default();
        limits.max_descriptor_set_uniform_buffers = 20;
        limits.max_per_stage_descriptor_uniform_buffers = 20;
        limits.max_descriptor_set_sampled_images = 4;
        limits.max_descriptor_set_samplers = 4;

        assert!(check_limits(&limits, 18, 4).is_ok());
        assert!(matches!(
            check_limits(&limits, 19, 0),
            Err(VulkanError::LimitExceeded { requested: 21, limit: 20, .. })
        ));
        assert!(matches!(
            check_limits(&limits, 0, 5),
            Err(VulkanError::LimitExceeded { what: "sampled images per set", .. })
        ));
    }
}

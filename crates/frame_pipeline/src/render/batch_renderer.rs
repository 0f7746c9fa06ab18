//! # Batch Renderer
//!
//! Records the draws of one frame slot. Items are drawn group by group in
//! the fixed order Opaque, Line, Transparent; each non-empty group costs
//! one pipeline switch. Every draw reads the shared geometry through its
//! submesh range and the frame slot's own constant views.

use crate::render::api::{CommandRecorder, DrawIndexedArgs, DrawViews, GeometryBuffers};
use crate::render::resources::binding_table::BindingTableLayout;
use crate::render::scene::{PipelineGroup, RenderItemCatalog};
use crate::render::{RenderError, RenderResult};

/// Statistics of one recorded frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Indexed draws issued
    pub draw_calls: usize,
    /// Pipeline switches issued
    pub pipeline_switches: usize,
    /// Items drawn per group, in [`PipelineGroup::ALL`] order
    pub items_per_group: [usize; 3],
}

impl BatchStats {
    /// Average draws per pipeline switch
    pub fn avg_draws_per_switch(&self) -> f32 {
        if self.pipeline_switches == 0 {
            0.0
        } else {
            self.draw_calls as f32 / self.pipeline_switches as f32
        }
    }
}

/// Records grouped draws for a frame slot
#[derive(Debug, Default)]
pub struct DrawBatcher;

impl DrawBatcher {
    /// Create a batcher
    pub fn new() -> Self {
        Self
    }

    /// Draw every item of `group` using the views of `frame_index`
    pub fn draw_group<R: CommandRecorder>(
        &self,
        recorder: &mut R,
        catalog: &RenderItemCatalog,
        geometry: &GeometryBuffers,
        layout: &BindingTableLayout,
        group: PipelineGroup,
        frame_index: usize,
        stats: &mut BatchStats,
    ) -> RenderResult<()> {
        let members = catalog.group(group);
        if members.is_empty() {
            return Ok(());
        }

        recorder.set_pipeline(group)?;
        stats.pipeline_switches += 1;

        for &object_slot in members {
            let item = catalog.item(object_slot).ok_or(RenderError::SlotOutOfRange {
                index: object_slot,
                capacity: catalog.item_count(),
            })?;
            let material = catalog.material(item.material_slot()).ok_or(RenderError::SlotOutOfRange {
                index: item.material_slot(),
                capacity: catalog.material_count(),
            })?;

            let views = DrawViews {
                object: layout.object_view(frame_index, item.object_slot())?,
                material: layout.material_view(frame_index, material.slot())?,
                texture: material
                    .texture_slot()
                    .map(|slot| layout.texture_view(slot))
                    .transpose()?,
            };

            let submesh = item.submesh();
            recorder.bind_geometry(geometry)?;
            recorder.set_topology(item.topology())?;
            recorder.bind_views(views)?;
            recorder.draw_indexed(DrawIndexedArgs {
                index_count: submesh.index_count,
                instance_count: 1,
                start_index: submesh.start_index,
                base_vertex: submesh.base_vertex,
                first_instance: 0,
            })?;

            stats.draw_calls += 1;
            stats.items_per_group[group.index()] += 1;
        }

        log::trace!("Recorded {} {:?} draws for slot {}", members.len(), group, frame_index);
        Ok(())
    }

    /// Draw all groups in Opaque, Line, Transparent order
    pub fn draw_all<R: CommandRecorder>(
        &self,
        recorder: &mut R,
        catalog: &RenderItemCatalog,
        geometry: &GeometryBuffers,
        layout: &BindingTableLayout,
        frame_index: usize,
    ) -> RenderResult<BatchStats> {
        let mut stats = BatchStats::default();
        for group in PipelineGroup::ALL {
            self.draw_group(recorder, catalog, geometry, layout, group, frame_index, &mut stats)?;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{BufferId, ConstantView, PassBinding, RenderDevice, RootViews, ViewHandle, Viewport};
    use crate::render::backends::headless::{HeadlessCommands, HeadlessDevice, RecordedCommand};
    use crate::render::resources::texture::TextureData;
    use crate::render::scene::{
        CatalogBuilder, MaterialDesc, MeshBatch, MeshBatchBuilder, RenderItemDesc, Topology, Vertex,
    };

    fn mesh() -> MeshBatch {
        let quad = [
            Vertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0]),
        ];
        let mut builder = MeshBatchBuilder::new();
        builder.add_mesh("quad", &quad, &[0, 1, 2, 0, 2, 3]).unwrap();
        builder.add_mesh("outline", &quad, &[0, 1, 1, 2, 2, 3, 3, 0]).unwrap();
        builder.build()
    }

    fn geometry() -> GeometryBuffers {
        GeometryBuffers {
            vertex_buffer: BufferId(100),
            index_buffer: BufferId(101),
            vertex_stride: 32,
            vertex_count: 8,
            index_count: 14,
        }
    }

    fn recording(device: &mut HeadlessDevice) -> HeadlessCommands {
        let view = ConstantView { buffer: BufferId(1), offset: 0, size: 512 };
        let mut commands = device.create_commands(1).unwrap();
        commands
            .begin_pass(&PassBinding {
                frame_index: 1,
                clear_color: [0.0; 4],
                viewport: Viewport { width: 4, height: 4 },
                root_views: RootViews { pass: view, light: view },
            })
            .unwrap();
        commands
    }

    #[test]
    fn test_groups_draw_in_fixed_order() {
        let mut builder = CatalogBuilder::new();
        builder
            .add_texture("tiles", TextureData::checkerboard(2, 1, [0; 4], [255; 4]))
            .unwrap()
            .add_material("solid", MaterialDesc::default())
            .unwrap()
            .add_material("tiled", MaterialDesc::default().with_texture("tiles"))
            .unwrap()
            .add_item(RenderItemDesc::new("glass", "quad", "solid").with_group(PipelineGroup::Transparent))
            .unwrap()
            .add_item(
                RenderItemDesc::new("grid", "outline", "solid")
                    .with_group(PipelineGroup::Line)
                    .with_topology(Topology::LineList),
            )
            .unwrap()
            .add_item(RenderItemDesc::new("floor", "quad", "tiled"))
            .unwrap();
        let (catalog, _) = builder.build(&mesh(), 3).unwrap();
        let layout = BindingTableLayout::new(3, catalog.item_count(), catalog.material_count(), catalog.texture_count()).unwrap();

        let mut device = HeadlessDevice::new();
        let mut commands = recording(&mut device);
        let stats = DrawBatcher::new()
            .draw_all(&mut commands, &catalog, &geometry(), &layout, 1)
            .unwrap();

        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.pipeline_switches, 3);
        assert_eq!(stats.items_per_group, [1, 1, 1]);

        let pipelines: Vec<PipelineGroup> = commands
            .commands()
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::SetPipeline(group) => Some(*group),
                _ => None,
            })
            .collect();
        assert_eq!(pipelines, PipelineGroup::ALL.to_vec());

        // Floor is object slot 2, tiled material slot 1, texture 0, in frame 1
        assert_eq!(
            commands.commands()[1..6],
            [
                RecordedCommand::SetPipeline(PipelineGroup::Opaque),
                RecordedCommand::BindGeometry(geometry()),
                RecordedCommand::SetTopology(Topology::TriangleList),
                RecordedCommand::BindViews(DrawViews {
                    object: ViewHandle(3 + 2),
                    material: ViewHandle(9 + 2 + 1),
                    texture: Some(ViewHandle(15)),
                }),
                RecordedCommand::DrawIndexed(DrawIndexedArgs {
                    index_count: 6,
                    instance_count: 1,
                    start_index: 0,
                    base_vertex: 0,
                    first_instance: 0,
                }),
            ][..]
        );

        let line_draw = commands.commands().iter().find_map(|command| match command {
            RecordedCommand::DrawIndexed(args) if args.index_count == 8 => Some(*args),
            _ => None,
        });
        assert_eq!(
            line_draw,
            Some(DrawIndexedArgs {
                index_count: 8,
                instance_count: 1,
                start_index: 6,
                base_vertex: 4,
                first_instance: 0,
            })
        );
    }

    #[test]
    fn test_empty_groups_do_not_switch_pipeline() {
        let mut builder = CatalogBuilder::new();
        builder
            .add_material("solid", MaterialDesc::default())
            .unwrap()
            .add_item(RenderItemDesc::new("a", "quad", "solid"))
            .unwrap()
            .add_item(RenderItemDesc::new("b", "quad", "solid"))
            .unwrap();
        let (catalog, _) = builder.build(&mesh(), 2).unwrap();
        let layout = BindingTableLayout::new(2, 2, 1, 0).unwrap();

        let mut device = HeadlessDevice::new();
        let mut commands = recording(&mut device);
        let stats = DrawBatcher::new()
            .draw_all(&mut commands, &catalog, &geometry(), &layout, 0)
            .unwrap();

        assert_eq!(stats.pipeline_switches, 1);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.items_per_group, [2, 0, 0]);
        let switches = commands
            .commands()
            .iter()
            .filter(|command| matches!(command, RecordedCommand::SetPipeline(_)))
            .count();
        assert_eq!(switches, 1);
    }

    #[test]
    fn test_untextured_material_binds_no_texture() {
        let mut builder = CatalogBuilder::new();
        builder
            .add_material("solid", MaterialDesc::default())
            .unwrap()
            .add_item(RenderItemDesc::new("a", "quad", "solid"))
            .unwrap();
        let (catalog, _) = builder.build(&mesh(), 2).unwrap();
        let layout = BindingTableLayout::new(2, 1, 1, 0).unwrap();

        let mut device = HeadlessDevice::new();
        let mut commands = recording(&mut device);
        DrawBatcher::new()
            .draw_all(&mut commands, &catalog, &geometry(), &layout, 1)
            .unwrap();

        let views = commands.commands().iter().find_map(|command| match command {
            RecordedCommand::BindViews(views) => Some(*views),
            _ => None,
        });
        assert_eq!(
            views,
            Some(DrawViews {
                object: ViewHandle(1),
                material: ViewHandle(2 + 1),
                texture: None,
            })
        );
    }
}

//! # Frame Renderer
//!
//! Owns the device, the completion counter, the frame resource ring, the
//! catalog and the binding table, and runs one frame at a time:
//!
//! ```text
//! advance ─ upload dirty ─ pass/light ─ reset ─ begin ─ draw ─ end ─ submit ─ signal ─ mark
//! ```
//!
//! The caller presents after [`FrameRenderer::render_frame`] returns its
//! [`FrameReceipt`]. Startup, resize and shutdown drain the queue with a
//! full flush; steady-state frames only ever wait for the slot they reuse.

use crate::core::config::RendererConfig;
use crate::foundation::time::FrameTiming;
use crate::input::{InputController, InputEvent, InputResponse};
use crate::render::api::{
    CommandRecorder, GeometryBuffers, PassBinding, RenderDevice, RootViews, TextureHandle,
    Viewport,
};
use crate::render::batch_renderer::{BatchStats, DrawBatcher};
use crate::render::frame::{upload_dirty_materials, upload_dirty_objects, FrameResourceRing, UploadStats};
use crate::render::lighting::LightingEnvironment;
use crate::render::primitives::OrbitCamera;
use crate::render::resources::binding_table::{
    BindingBand, BindingTableAllocator, BindingTableLayout, TableEntry,
};
use crate::render::scene::{CatalogBuilder, MeshBatch, RenderItemCatalog};
use crate::render::sync::CompletionCounter;
use crate::render::{RenderError, RenderResult};

/// Everything the renderer needs to know about the scene at startup
pub struct SceneAssets {
    /// Merged geometry of every mesh
    pub meshes: MeshBatch,
    /// Materials, textures and render items
    pub catalog: CatalogBuilder,
    /// Scene lights
    pub lighting: LightingEnvironment,
}

/// What one call to [`FrameRenderer::render_frame`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReceipt {
    /// Zero-based frame number
    pub frame_number: u64,
    /// Ring slot the frame was recorded into
    pub slot: usize,
    /// Completion value that retires the frame
    pub signal_value: u64,
    /// Whether the CPU had to wait for the slot
    pub waited: bool,
    /// Records written this frame
    pub uploads: UploadStats,
    /// Draws recorded this frame
    pub draws: BatchStats,
}

/// Multi-buffered frame loop over a [`RenderDevice`]
pub struct FrameRenderer<D: RenderDevice> {
    // Slot pools and command contexts must drop before the device
    ring: FrameResourceRing<D>,
    device: D,
    counter: CompletionCounter,
    catalog: RenderItemCatalog,
    geometry: GeometryBuffers,
    binding_table: BindingTableAllocator,
    batcher: DrawBatcher,
    camera: OrbitCamera,
    lighting: LightingEnvironment,
    viewport: Viewport,
    clear_color: [f32; 4],
    frames_rendered: u64,
    shut_down: bool,
}

impl<D: RenderDevice> FrameRenderer<D> {
    /// Build the scene on `device` and leave the queue idle
    pub fn new(mut device: D, config: &RendererConfig, assets: SceneAssets) -> RenderResult<Self> {
        config.validate().map_err(RenderError::InvalidConfig)?;
        let frame_count = config.frame_resource_count;

        if device.constant_alignment() != config.constant_alignment {
            log::warn!(
                "Device constant alignment {} differs from configured {}; using the device's",
                device.constant_alignment(),
                config.constant_alignment
            );
        }

        let SceneAssets { meshes, catalog, lighting } = assets;
        let (catalog, textures) = catalog.build(&meshes, frame_count)?;

        let geometry = device.upload_geometry(meshes.vertex_bytes(), meshes.vertex_stride(), meshes.indices())?;
        let texture_handles = textures
            .iter()
            .map(|texture| device.upload_texture(texture))
            .collect::<RenderResult<Vec<TextureHandle>>>()?;
        log::info!(
            "Uploaded {} vertices, {} indices and {} textures",
            geometry.vertex_count,
            geometry.index_count,
            texture_handles.len()
        );

        let ring = FrameResourceRing::new(&mut device, frame_count, catalog.item_count(), catalog.material_count())?;

        let layout = BindingTableLayout::new(
            frame_count,
            catalog.item_count(),
            catalog.material_count(),
            catalog.texture_count(),
        )?;
        let mut binding_table = BindingTableAllocator::new(config.binding_table_limit);
        binding_table.allocate(layout, |band, frame, slot| match band {
            BindingBand::Object => Ok(TableEntry::Constant(ring.slot(frame)?.pools().objects.view(slot)?)),
            BindingBand::Material => Ok(TableEntry::Constant(ring.slot(frame)?.pools().materials.view(slot)?)),
            BindingBand::Texture => texture_handles
                .get(slot)
                .copied()
                .map(TableEntry::Texture)
                .ok_or(RenderError::SlotOutOfRange {
                    index: slot,
                    capacity: texture_handles.len(),
                }),
        })?;

        let root_views = ring
            .slots()
            .iter()
            .map(|slot| slot.root_views())
            .collect::<RenderResult<Vec<RootViews>>>()?;
        device.create_binding_table(&layout, binding_table.entries(), &root_views)?;

        let mut counter = CompletionCounter::new();
        counter.flush_all(&mut device)?;
        device.release_staging()?;

        let viewport = Viewport {
            width: config.surface_width,
            height: config.surface_height,
        };
        let camera = OrbitCamera::from_config(&config.camera, viewport.width, viewport.height);

        log::info!(
            "Frame renderer ready: {} slots, {} items, {} materials, {} table views",
            frame_count,
            catalog.item_count(),
            catalog.material_count(),
            layout.capacity()
        );

        Ok(Self {
            device,
            counter,
            ring,
            catalog,
            geometry,
            binding_table,
            batcher: DrawBatcher::new(),
            camera,
            lighting,
            viewport,
            clear_color: config.clear_color,
            frames_rendered: 0,
            shut_down: false,
        })
    }

    /// Record and submit one frame
    pub fn render_frame(&mut self, timing: FrameTiming) -> RenderResult<FrameReceipt> {
        if self.shut_down {
            return Err(RenderError::Device("renderer has been shut down".to_string()));
        }

        let acquired = self.ring.advance(&self.counter, &self.device)?;
        let layout = *self.binding_table.layout()?;
        let pass_constants = self.camera.pass_constants(timing, self.viewport);
        let light_constants = self.lighting.to_constants();

        let slot = self.ring.active_slot_mut()?;
        let root_views = slot.root_views()?;
        let (pools, commands) = slot.parts_mut()?;

        let uploads = UploadStats {
            objects: upload_dirty_objects(self.catalog.items_mut(), &mut pools.objects)?,
            materials: upload_dirty_materials(self.catalog.materials_mut(), &mut pools.materials)?,
        };
        pools.pass.copy_record(0, &pass_constants)?;
        pools.light.copy_record(0, &light_constants)?;

        self.device.reset_commands(commands)?;
        commands.begin_pass(&PassBinding {
            frame_index: acquired.index,
            clear_color: self.clear_color,
            viewport: self.viewport,
            root_views,
        })?;
        let draws = self
            .batcher
            .draw_all(commands, &self.catalog, &self.geometry, &layout, acquired.index)?;
        commands.end_pass()?;
        self.device.submit(commands)?;

        let signal_value = self.counter.signal(&mut self.device)?;
        self.ring.mark_submitted(signal_value)?;

        let receipt = FrameReceipt {
            frame_number: self.frames_rendered,
            slot: acquired.index,
            signal_value,
            waited: acquired.waited,
            uploads,
            draws,
        };
        self.frames_rendered += 1;

        log::trace!(
            "Frame {} on slot {}: {} object / {} material uploads, {} draws, signal {}",
            receipt.frame_number,
            receipt.slot,
            uploads.objects,
            uploads.materials,
            draws.draw_calls,
            signal_value
        );
        Ok(receipt)
    }

    /// Route an input event, resizing when asked to
    pub fn handle_input(&mut self, controller: &mut InputController, event: InputEvent) -> RenderResult<InputResponse> {
        let response = controller.handle(event, &mut self.camera, &mut self.catalog);
        if let InputResponse::Resize { width, height } = response {
            self.resize(width, height)?;
        }
        Ok(response)
    }

    /// Drain the queue, then adopt the new surface size
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        self.counter.flush_all(&mut self.device)?;
        self.viewport = Viewport { width, height };
        self.camera.resize(width, height);
        log::info!("Resized output to {}x{}", width, height);
        Ok(())
    }

    /// Drain the queue before the device is torn down
    pub fn shutdown(&mut self) -> RenderResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.counter.flush_all(&mut self.device)?;
        self.shut_down = true;
        log::info!("Frame renderer shut down after {} frames", self.frames_rendered);
        Ok(())
    }

    /// Underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Underlying device, for backend-specific setup
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Render items and materials
    pub fn catalog(&self) -> &RenderItemCatalog {
        &self.catalog
    }

    /// Render items and materials, for per-frame updates
    pub fn catalog_mut(&mut self) -> &mut RenderItemCatalog {
        &mut self.catalog
    }

    /// Camera
    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    /// Camera, for direct control
    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    /// Scene lights
    pub fn lighting_mut(&mut self) -> &mut LightingEnvironment {
        &mut self.lighting
    }

    /// Frame resource ring
    pub fn ring(&self) -> &FrameResourceRing<D> {
        &self.ring
    }

    /// Layout of the binding table
    pub fn binding_layout(&self) -> RenderResult<&BindingTableLayout> {
        self.binding_table.layout()
    }

    /// Device geometry of the mesh batch
    pub fn geometry(&self) -> GeometryBuffers {
        self.geometry
    }

    /// Current output size
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Completion counter
    pub fn completion_counter(&self) -> &CompletionCounter {
        &self.counter
    }

    /// Frames submitted so far
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl<D: RenderDevice> Drop for FrameRenderer<D> {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        if let Err(e) = self.counter.flush_all(&mut self.device) {
            log::error!("Failed to flush the queue while dropping the frame renderer: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::backends::headless::{HeadlessDevice, RecordedCommand, SimulatedTimeline};
    use crate::render::resources::texture::TextureData;
    use crate::render::scene::{MaterialDesc, MeshBatchBuilder, PipelineGroup, RenderItemDesc, Topology, Vertex};

    fn assets() -> SceneAssets {
        let quad = [
            Vertex::new([-1.0, 0.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([-1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0]),
        ];
        let mut meshes = MeshBatchBuilder::new();
        meshes.add_mesh("quad", &quad, &[0, 1, 2, 0, 2, 3]).unwrap();
        meshes.add_mesh("outline", &quad, &[0, 1, 1, 2, 2, 3, 3, 0]).unwrap();

        let mut catalog = CatalogBuilder::new();
        catalog
            .add_texture("checker", TextureData::checkerboard(8, 2, [255; 4], [0, 0, 0, 255]))
            .unwrap()
            .add_material("floor", MaterialDesc::default().with_texture("checker"))
            .unwrap()
            .add_material("wire", MaterialDesc::default())
            .unwrap()
            .add_item(RenderItemDesc::new("floor", "quad", "floor"))
            .unwrap()
            .add_item(
                RenderItemDesc::new("orbiter", "quad", "floor")
                    .with_transform(Transform::from_translation(Vec3::new(3.0, 0.0, 0.0))),
            )
            .unwrap()
            .add_item(
                RenderItemDesc::new("grid", "outline", "wire")
                    .with_group(PipelineGroup::Line)
                    .with_topology(Topology::LineList),
            )
            .unwrap();

        SceneAssets {
            meshes: meshes.build(),
            catalog,
            lighting: LightingEnvironment::default_scene(),
        }
    }

    fn renderer(device: HeadlessDevice) -> FrameRenderer<HeadlessDevice> {
        let config = RendererConfig::default().with_surface_size(640, 480);
        FrameRenderer::new(device, &config, assets()).unwrap()
    }

    #[test]
    fn test_setup_realizes_table_and_flushes() {
        let renderer = renderer(HeadlessDevice::new());
        let device = renderer.device();

        let table = device.binding_table().unwrap();
        // 3 slots * (3 objects + 2 materials) + 1 texture
        assert_eq!(table.layout.capacity(), 16);
        assert_eq!(table.entries.len(), 16);
        assert_eq!(table.root_views.len(), 3);
        assert!(matches!(table.entries[15], TableEntry::Texture(TextureHandle(0))));

        assert_eq!(device.signals(), vec![1]);
        assert_eq!(device.staging_bytes(), 0);
        assert!(device.submissions().is_empty());
    }

    #[test]
    fn test_frames_cycle_slots_and_signal_in_order() {
        let mut renderer = renderer(HeadlessDevice::new());

        let receipts: Vec<FrameReceipt> = (0..5)
            .map(|frame| renderer.render_frame(FrameTiming::fixed_step(frame, 0.016)).unwrap())
            .collect();

        let slots: Vec<usize> = receipts.iter().map(|r| r.slot).collect();
        let values: Vec<u64> = receipts.iter().map(|r| r.signal_value).collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1]);
        assert_eq!(values, vec![2, 3, 4, 5, 6]);
        assert_eq!(receipts[4].frame_number, 4);

        // Every submission precedes its own signal
        for (submission, receipt) in renderer.device().submissions().iter().zip(&receipts) {
            assert_eq!(submission.slot, receipt.slot);
            assert_eq!(submission.after_signal, receipt.signal_value - 1);
        }
    }

    #[test]
    fn test_command_stream_shape() {
        let mut renderer = renderer(HeadlessDevice::new());
        let receipt = renderer.render_frame(FrameTiming::fixed_step(0, 0.016)).unwrap();
        assert_eq!(receipt.draws.draw_calls, 3);
        assert_eq!(receipt.draws.pipeline_switches, 2);

        let commands = &renderer.device().submissions()[0].commands;
        match commands.first() {
            Some(RecordedCommand::BeginPass(pass)) => {
                assert_eq!(pass.frame_index, 0);
                assert_eq!(pass.viewport, Viewport { width: 640, height: 480 });
                assert_eq!(pass.root_views, renderer.ring().slot(0).unwrap().root_views().unwrap());
            }
            other => panic!("expected BeginPass first, got {other:?}"),
        }
        assert_eq!(commands.last(), Some(&RecordedCommand::EndPass));
    }

    #[test]
    fn test_dirty_uploads_drain_then_follow_animation() {
        let mut renderer = renderer(HeadlessDevice::new());

        let uploads: Vec<UploadStats> = (0..4)
            .map(|frame| renderer.render_frame(FrameTiming::fixed_step(frame, 0.016)).unwrap().uploads)
            .collect();
        assert_eq!(uploads[0], UploadStats { objects: 3, materials: 2 });
        assert_eq!(uploads[2], UploadStats { objects: 3, materials: 2 });
        assert_eq!(uploads[3], UploadStats::default());

        // Animate one item every frame: it stays dirty, the rest stay clean
        for frame in 4..10 {
            let slot = renderer.catalog().find_item("orbiter").unwrap();
            renderer
                .catalog_mut()
                .item_mut(slot)
                .unwrap()
                .update_transform(|t| t.rotate_y(0.1));
            let receipt = renderer.render_frame(FrameTiming::fixed_step(frame, 0.016)).unwrap();
            assert_eq!(receipt.uploads.objects, 1);
        }
    }

    #[test]
    fn test_pass_and_light_written_every_frame() {
        let mut renderer = renderer(HeadlessDevice::new());
        for frame in 0..4 {
            let timing = FrameTiming::fixed_step(frame, 0.5);
            let receipt = renderer.render_frame(timing).unwrap();
            let pools = renderer.ring().slot(receipt.slot).unwrap().pools();
            assert_eq!(pools.pass.read_record(0).unwrap().total_time, timing.total);
            assert_eq!(pools.light.read_record(0).unwrap().directional_count, 1);
        }
    }

    #[test]
    fn test_resize_flushes_and_updates_viewport() {
        let mut renderer = renderer(HeadlessDevice::new());
        renderer.render_frame(FrameTiming::default()).unwrap();
        let signals_before = renderer.device().signals().len();

        let mut controller = InputController::default();
        let response = renderer
            .handle_input(&mut controller, InputEvent::Resized { width: 800, height: 800 })
            .unwrap();
        assert_eq!(response, InputResponse::Resize { width: 800, height: 800 });
        assert_eq!(renderer.device().signals().len(), signals_before + 1);
        assert_eq!(renderer.viewport(), Viewport { width: 800, height: 800 });
        assert!((renderer.camera().aspect() - 1.0).abs() < 1e-6);

        renderer.resize(0, 600).unwrap();
        assert_eq!(renderer.viewport(), Viewport { width: 800, height: 800 });
    }

    #[test]
    fn test_failed_wait_aborts_frame() {
        let timeline = SimulatedTimeline::new(true);
        let mut renderer = renderer(HeadlessDevice::with_timeline(timeline.clone()));
        timeline.set_auto_retire(false);

        for frame in 0..3 {
            let receipt = renderer.render_frame(FrameTiming::fixed_step(frame, 0.016)).unwrap();
            assert!(!receipt.waited);
        }

        timeline.poison("device lost");
        let result = renderer.render_frame(FrameTiming::fixed_step(3, 0.016));
        assert!(matches!(result, Err(RenderError::WaitFailed(_))));
        // Drop logs the failed flush instead of panicking
    }

    #[test]
    fn test_shutdown_flushes_once() {
        let mut renderer = renderer(HeadlessDevice::new());
        renderer.render_frame(FrameTiming::default()).unwrap();

        renderer.shutdown().unwrap();
        renderer.shutdown().unwrap();
        assert_eq!(renderer.device().signals(), vec![1, 2, 3]);
        assert!(renderer.render_frame(FrameTiming::default()).is_err());
    }

    #[test]
    fn test_table_limit_is_enforced() {
        let config = RendererConfig::default().with_binding_table_limit(4);
        let result = FrameRenderer::new(HeadlessDevice::new(), &config, assets());
        assert!(matches!(result, Err(RenderError::CapacityExceeded { requested: 16, capacity: 4, .. })));
    }

    #[test]
    fn test_unknown_material_fails_setup() {
        let mut scene = assets();
        scene
            .catalog
            .add_item(RenderItemDesc::new("ghost", "quad", "ectoplasm"))
            .unwrap();
        let result = FrameRenderer::new(HeadlessDevice::new(), &RendererConfig::default(), scene);
        assert!(matches!(result, Err(RenderError::UnknownMaterial(_))));
    }
}

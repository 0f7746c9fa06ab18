//! Dirty propagation into the active frame slot
//!
//! Every item and material carries a counter of slots still holding a
//! stale record. Each frame writes the current record into the active
//! slot's pool for anything with a non-zero counter, then counts down.
//! After N consecutive frames without a change every slot is current.

use crate::render::api::UploadMemory;
use crate::render::resources::constants::{MaterialConstants, ObjectConstants};
use crate::render::resources::upload_pool::ConstantUploadPool;
use crate::render::scene::{MaterialItem, RenderItem};
use crate::render::RenderResult;

/// Records written during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Object records written
    pub objects: usize,
    /// Material records written
    pub materials: usize,
}

/// Write every dirty item's object record into `pool`
pub fn upload_dirty_objects<M: UploadMemory>(
    items: &mut [RenderItem],
    pool: &mut ConstantUploadPool<ObjectConstants, M>,
) -> RenderResult<usize> {
    let mut written = 0;
    for item in items.iter_mut().filter(|item| item.dirty().is_dirty()) {
        pool.copy_record(item.object_slot(), &item.object_constants())?;
        item.dirty_mut().consume();
        written += 1;
    }
    Ok(written)
}

/// Write every dirty material's record into `pool`
pub fn upload_dirty_materials<M: UploadMemory>(
    materials: &mut [MaterialItem],
    pool: &mut ConstantUploadPool<MaterialConstants, M>,
) -> RenderResult<usize> {
    let mut written = 0;
    for material in materials.iter_mut().filter(|material| material.dirty().is_dirty()) {
        pool.copy_record(material.slot(), &material.constants())?;
        material.dirty_mut().consume();
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::backends::headless::HeadlessDevice;
    use crate::render::frame::ring::FrameResourceRing;
    use crate::render::resources::texture::TextureData;
    use crate::render::scene::{
        CatalogBuilder, MaterialDesc, MaterialParams, MeshBatch, MeshBatchBuilder,
        RenderItemCatalog, RenderItemDesc, Vertex,
    };
    use crate::render::sync::CompletionCounter;

    struct Harness {
        device: HeadlessDevice,
        counter: CompletionCounter,
        ring: FrameResourceRing<HeadlessDevice>,
        catalog: RenderItemCatalog,
    }

    impl Harness {
        fn new(frame_count: usize) -> Self {
            let mesh = mesh();
            let mut builder = CatalogBuilder::new();
            builder
                .add_texture("white", TextureData::checkerboard(1, 1, [255; 4], [255; 4]))
                .unwrap()
                .add_material("paint", MaterialDesc::default().with_texture("white"))
                .unwrap()
                .add_item(RenderItemDesc::new("left", "tri", "paint"))
                .unwrap()
                .add_item(
                    RenderItemDesc::new("right", "tri", "paint")
                        .with_transform(Transform::from_translation(Vec3::new(2.0, 0.0, 0.0))),
                )
                .unwrap();
            let (catalog, _) = builder.build(&mesh, frame_count).unwrap();

            let mut device = HeadlessDevice::new();
            let ring = FrameResourceRing::new(&mut device, frame_count, catalog.item_count(), catalog.material_count()).unwrap();
            Self {
                device,
                counter: CompletionCounter::new(),
                ring,
                catalog,
            }
        }

        /// Advance, upload, submit; returns the slot used and what was written
        fn frame(&mut self) -> (usize, UploadStats) {
            let acquired = self.ring.advance(&self.counter, &self.device).unwrap();
            let pools = self.ring.active_slot_mut().unwrap().pools_mut().unwrap();
            let stats = UploadStats {
                objects: upload_dirty_objects(self.catalog.items_mut(), &mut pools.objects).unwrap(),
                materials: upload_dirty_materials(self.catalog.materials_mut(), &mut pools.materials).unwrap(),
            };
            let value = self.counter.signal(&mut self.device).unwrap();
            self.ring.mark_submitted(value).unwrap();
            (acquired.index, stats)
        }

        fn object_in_slot(&self, frame: usize, item: usize) -> ObjectConstants {
            self.ring.slot(frame).unwrap().pools().objects.read_record(item).unwrap()
        }
    }

    fn mesh() -> MeshBatch {
        let tri = [
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ];
        let mut builder = MeshBatchBuilder::new();
        builder.add_mesh("tri", &tri, &[0, 1, 2]).unwrap();
        builder.build()
    }

    #[test]
    fn test_counters_drain_three_two_one_zero() {
        let mut harness = Harness::new(3);
        let counts = |h: &Harness| -> Vec<u32> { h.catalog.items().iter().map(|i| i.dirty().remaining()).collect() };
        assert_eq!(counts(&harness), vec![3, 3]);

        let (slot, stats) = harness.frame();
        assert_eq!(slot, 0);
        assert_eq!(stats, UploadStats { objects: 2, materials: 1 });
        assert_eq!(counts(&harness), vec![2, 2]);

        harness.frame();
        assert_eq!(counts(&harness), vec![1, 1]);

        harness.frame();
        assert_eq!(counts(&harness), vec![0, 0]);
        assert_eq!(harness.catalog.material(0).unwrap().dirty().remaining(), 0);

        let (slot, stats) = harness.frame();
        assert_eq!(slot, 0);
        assert_eq!(stats, UploadStats::default());

        for frame in 0..3 {
            let right = harness.object_in_slot(frame, 1);
            assert_eq!(right.world[3], [2.0, 0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_change_reaches_every_slot() {
        for frame_count in 2..=5 {
            let mut harness = Harness::new(frame_count);

            // Settle, then change the item at an arbitrary point in the ring
            for _ in 0..frame_count + 1 {
                harness.frame();
            }
            harness
                .catalog
                .item_mut(0)
                .unwrap()
                .set_transform(Transform::from_translation(Vec3::new(0.0, 5.0, 0.0)));
            let expected = harness.catalog.item(0).unwrap().object_constants();

            let mut written_to = Vec::new();
            for _ in 0..frame_count {
                let (slot, stats) = harness.frame();
                assert_eq!(stats.objects, 1, "only the changed item uploads");
                written_to.push(slot);
            }
            written_to.sort_unstable();
            assert_eq!(written_to, (0..frame_count).collect::<Vec<_>>());

            for slot in 0..frame_count {
                assert_eq!(harness.object_in_slot(slot, 0), expected, "slot {slot} of {frame_count} is stale");
            }
            assert!(!harness.catalog.item(0).unwrap().dirty().is_dirty());
        }
    }

    #[test]
    fn test_counters_stay_within_ring_depth() {
        let mut harness = Harness::new(3);
        for frame in 0..40 {
            if frame % 5 == 0 || frame % 7 == 0 {
                harness
                    .catalog
                    .item_mut(1)
                    .unwrap()
                    .update_transform(|t| t.rotate_y(0.1));
            }
            harness.frame();
            for item in harness.catalog.items() {
                assert!(item.dirty().remaining() <= 3);
            }
        }
    }

    #[test]
    fn test_material_change_propagates() {
        let mut harness = Harness::new(2);
        harness.frame();
        harness.frame();

        let params = MaterialParams::with_albedo([0.2, 0.4, 0.6, 1.0]);
        harness.catalog.set_material_params("paint", params).unwrap();
        harness.frame();
        harness.frame();

        for slot in 0..2 {
            let record = harness.ring.slot(slot).unwrap().pools().materials.read_record(0).unwrap();
            assert_eq!(record.albedo, [0.2, 0.4, 0.6, 1.0]);
            assert_eq!(record.has_texture, 1);
        }
    }
}

//! Render items, materials and their dirty counters

use serde::{Deserialize, Serialize};

use crate::foundation::math::Transform;
use crate::render::resources::constants::{MaterialConstants, ObjectConstants};
use crate::render::scene::mesh_batch::SubmeshRange;

/// Pipeline configuration a render item is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineGroup {
    /// Solid, depth-tested geometry
    Opaque,
    /// Wireframe or line-list geometry
    Line,
    /// Alpha-blended geometry, drawn last
    Transparent,
}

impl PipelineGroup {
    /// Groups in draw order
    pub const ALL: [Self; 3] = [Self::Opaque, Self::Line, Self::Transparent];

    /// Position in [`PipelineGroup::ALL`]
    pub const fn index(self) -> usize {
        match self {
            Self::Opaque => 0,
            Self::Line => 1,
            Self::Transparent => 2,
        }
    }
}

/// Primitive topology of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topology {
    /// Independent triangles
    TriangleList,
    /// Connected triangle strip
    TriangleStrip,
    /// Independent line segments
    LineList,
    /// Connected line strip
    LineStrip,
    /// Points
    PointList,
}

/// Number of frame slots that still hold a stale copy of a record.
///
/// Starts at the ring depth, is re-armed to it on every change and counts
/// down once per upload, so each slot sees each change exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyCounter {
    remaining: u32,
    frame_count: u32,
}

impl DirtyCounter {
    /// Counter that is stale in all `frame_count` slots
    pub fn new(frame_count: usize) -> Self {
        let frame_count = u32::try_from(frame_count).unwrap_or(u32::MAX);
        Self {
            remaining: frame_count,
            frame_count,
        }
    }

    /// Stale again in every slot
    pub fn mark_dirty(&mut self) {
        self.remaining = self.frame_count;
    }

    /// Whether some slot still needs the record
    pub fn is_dirty(&self) -> bool {
        self.remaining > 0
    }

    /// Slots still holding a stale copy
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Ring depth the counter re-arms to
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Record one upload; returns whether one was needed
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// One drawable submesh
#[derive(Debug, Clone)]
pub struct RenderItem {
    name: String,
    submesh_name: String,
    submesh: SubmeshRange,
    material_slot: usize,
    object_slot: usize,
    topology: Topology,
    group: PipelineGroup,
    transform: Transform,
    dirty: DirtyCounter,
}

impl RenderItem {
    pub(crate) fn new(
        name: String,
        submesh_name: String,
        submesh: SubmeshRange,
        material_slot: usize,
        object_slot: usize,
        topology: Topology,
        group: PipelineGroup,
        transform: Transform,
        frame_count: usize,
    ) -> Self {
        Self {
            name,
            submesh_name,
            submesh,
            material_slot,
            object_slot,
            topology,
            group,
            transform,
            dirty: DirtyCounter::new(frame_count),
        }
    }

    /// Item name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submesh the item draws
    pub fn submesh_name(&self) -> &str {
        &self.submesh_name
    }

    /// Draw parameters in the shared mesh batch
    pub fn submesh(&self) -> SubmeshRange {
        self.submesh
    }

    /// Slot of the item's material
    pub fn material_slot(&self) -> usize {
        self.material_slot
    }

    /// Slot of the item's object constants
    pub fn object_slot(&self) -> usize {
        self.object_slot
    }

    /// Primitive topology
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Pipeline group
    pub fn group(&self) -> PipelineGroup {
        self.group
    }

    /// Current transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Dirty counter
    pub fn dirty(&self) -> DirtyCounter {
        self.dirty
    }

    /// Replace the transform and re-arm the dirty counter
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.dirty.mark_dirty();
    }

    /// Edit the transform in place and re-arm the dirty counter
    pub fn update_transform(&mut self, edit: impl FnOnce(&mut Transform)) {
        edit(&mut self.transform);
        self.dirty.mark_dirty();
    }

    /// Constant record derived from the current transform
    pub fn object_constants(&self) -> ObjectConstants {
        ObjectConstants::from_world(&self.transform.to_matrix())
    }

    pub(crate) fn dirty_mut(&mut self) -> &mut DirtyCounter {
        &mut self.dirty
    }
}

/// Surface parameters of a material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialParams {
    /// Diffuse albedo, RGB + alpha
    pub albedo: [f32; 4],
    /// Specular color
    pub specular: [f32; 3],
    /// Ambient color
    pub ambient: [f32; 3],
    /// Roughness in [0, 1]
    pub roughness: f32,
    /// Index of refraction
    pub refraction: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            albedo: [1.0, 1.0, 1.0, 1.0],
            specular: [0.01, 0.01, 0.01],
            ambient: [0.0, 0.0, 0.0],
            roughness: 0.25,
            refraction: 1.0,
        }
    }
}

impl MaterialParams {
    /// Opaque material with the given albedo
    pub fn with_albedo(albedo: [f32; 4]) -> Self {
        Self {
            albedo,
            ..Self::default()
        }
    }
}

/// Material as supplied by the loader
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    /// Surface parameters
    pub params: MaterialParams,
    /// Name of the texture the material samples
    pub texture: Option<String>,
}

impl MaterialDesc {
    /// Untextured material
    pub fn new(params: MaterialParams) -> Self {
        Self { params, texture: None }
    }

    /// Sample texture `name`
    pub fn with_texture(mut self, name: impl Into<String>) -> Self {
        self.texture = Some(name.into());
        self
    }
}

/// Material with a stable constant slot
#[derive(Debug, Clone)]
pub struct MaterialItem {
    name: String,
    slot: usize,
    params: MaterialParams,
    texture_slot: Option<usize>,
    dirty: DirtyCounter,
}

impl MaterialItem {
    pub(crate) fn new(
        name: String,
        slot: usize,
        params: MaterialParams,
        texture_slot: Option<usize>,
        frame_count: usize,
    ) -> Self {
        Self {
            name,
            slot,
            params,
            texture_slot,
            dirty: DirtyCounter::new(frame_count),
        }
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot in the material constant pools
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Texture slot, when textured
    pub fn texture_slot(&self) -> Option<usize> {
        self.texture_slot
    }

    /// Surface parameters
    pub fn params(&self) -> &MaterialParams {
        &self.params
    }

    /// Dirty counter
    pub fn dirty(&self) -> DirtyCounter {
        self.dirty
    }

    /// Replace the surface parameters and re-arm the dirty counter
    pub fn set_params(&mut self, params: MaterialParams) {
        self.params = params;
        self.dirty.mark_dirty();
    }

    /// Constant record for the current parameters
    pub fn constants(&self) -> MaterialConstants {
        MaterialConstants {
            albedo: self.params.albedo,
            specular: self.params.specular,
            roughness: self.params.roughness,
            ambient: self.params.ambient,
            refraction: self.params.refraction,
            has_texture: u32::from(self.texture_slot.is_some()),
            texture_index: self.texture_slot.map_or(0, |slot| slot as u32),
            _pad: [0; 2],
        }
    }

    pub(crate) fn dirty_mut(&mut self) -> &mut DirtyCounter {
        &mut self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn item(frame_count: usize) -> RenderItem {
        RenderItem::new(
            "box".to_string(),
            "box".to_string(),
            SubmeshRange { index_count: 36, start_index: 0, base_vertex: 0 },
            0,
            0,
            Topology::TriangleList,
            PipelineGroup::Opaque,
            Transform::identity(),
            frame_count,
        )
    }

    #[test]
    fn test_dirty_counter_counts_down_to_zero() {
        let mut counter = DirtyCounter::new(3);
        assert_eq!(counter.remaining(), 3);

        assert!(counter.consume());
        assert!(counter.consume());
        assert!(counter.consume());
        assert_eq!(counter.remaining(), 0);
        assert!(!counter.consume());
        assert_eq!(counter.remaining(), 0);
    }

    #[test]
    fn test_dirty_counter_rearms_to_frame_count() {
        let mut counter = DirtyCounter::new(4);
        counter.consume();
        counter.consume();
        counter.mark_dirty();
        assert_eq!(counter.remaining(), 4);
    }

    #[test]
    fn test_dirty_counter_stays_in_bounds() {
        let frame_count = 3;
        let mut counter = DirtyCounter::new(frame_count);
        // Interleave mutations and uploads in an irregular pattern
        for step in 0..50u32 {
            if step % 7 == 0 || step % 11 == 3 {
                counter.mark_dirty();
            }
            counter.consume();
            assert!(counter.remaining() <= frame_count as u32);
        }
    }

    #[test]
    fn test_transform_change_rearms_item() {
        let mut render_item = item(3);
        render_item.dirty_mut().consume();
        render_item.dirty_mut().consume();
        render_item.dirty_mut().consume();
        assert!(!render_item.dirty().is_dirty());

        render_item.update_transform(|t| t.translate(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(render_item.dirty().remaining(), 3);
        assert_eq!(render_item.object_constants().world[3], [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_material_constants_reflect_texture() {
        let plain = MaterialItem::new("plain".into(), 0, MaterialParams::default(), None, 3);
        let textured = MaterialItem::new("tiles".into(), 1, MaterialParams::default(), Some(2), 3);

        assert_eq!(plain.constants().has_texture, 0);
        assert_eq!(textured.constants().has_texture, 1);
        assert_eq!(textured.constants().texture_index, 2);
    }

    #[test]
    fn test_material_param_change_rearms() {
        let mut material = MaterialItem::new("m".into(), 0, MaterialParams::default(), None, 2);
        material.dirty_mut().consume();
        material.set_params(MaterialParams::with_albedo([0.5, 0.5, 0.5, 1.0]));
        assert_eq!(material.dirty().remaining(), 2);
        assert_eq!(material.constants().albedo, [0.5, 0.5, 0.5, 1.0]);
    }
}

//! Render item catalog
//!
//! The flattened, build-once list of everything that gets drawn. Items,
//! materials and textures receive stable slots in insertion order; the
//! counts are frozen when the catalog is built because the binding table
//! is laid out from them.

use std::collections::HashMap;

use crate::foundation::math::Transform;
use crate::render::resources::texture::TextureData;
use crate::render::scene::mesh_batch::MeshBatch;
use crate::render::scene::render_item::{
    MaterialDesc, MaterialItem, MaterialParams, PipelineGroup, RenderItem, Topology,
};
use crate::render::{RenderError, RenderResult};

/// Description of one render item before slots are assigned
#[derive(Debug, Clone)]
pub struct RenderItemDesc {
    /// Unique item name
    pub name: String,
    /// Submesh in the mesh batch
    pub submesh: String,
    /// Material name
    pub material: String,
    /// Pipeline group
    pub group: PipelineGroup,
    /// Primitive topology
    pub topology: Topology,
    /// Initial transform
    pub transform: Transform,
}

impl RenderItemDesc {
    /// Opaque triangle-list item at the origin
    pub fn new(name: impl Into<String>, submesh: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            submesh: submesh.into(),
            material: material.into(),
            group: PipelineGroup::Opaque,
            topology: Topology::TriangleList,
            transform: Transform::identity(),
        }
    }

    /// Draw with `group`
    pub fn with_group(mut self, group: PipelineGroup) -> Self {
        self.group = group;
        self
    }

    /// Draw with `topology`
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Start at `transform`
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// Collects textures, materials and items before the counts are frozen
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    textures: Vec<(String, TextureData)>,
    materials: Vec<(String, MaterialDesc)>,
    items: Vec<RenderItemDesc>,
}

impl CatalogBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register texture pixels under `name`
    pub fn add_texture(&mut self, name: impl Into<String>, data: TextureData) -> RenderResult<&mut Self> {
        let name = name.into();
        if self.textures.iter().any(|(existing, _)| *existing == name) {
            return Err(RenderError::DuplicateName { kind: "texture", name });
        }
        self.textures.push((name, data));
        Ok(self)
    }

    /// Register material `name`
    pub fn add_material(&mut self, name: impl Into<String>, desc: MaterialDesc) -> RenderResult<&mut Self> {
        let name = name.into();
        if self.materials.iter().any(|(existing, _)| *existing == name) {
            return Err(RenderError::DuplicateName { kind: "material", name });
        }
        self.materials.push((name, desc));
        Ok(self)
    }

    /// Register a render item
    pub fn add_item(&mut self, desc: RenderItemDesc) -> RenderResult<&mut Self> {
        if self.items.iter().any(|existing| existing.name == desc.name) {
            return Err(RenderError::DuplicateName { kind: "render item", name: desc.name });
        }
        self.items.push(desc);
        Ok(self)
    }

    /// Resolve names against `mesh` and freeze the catalog.
    ///
    /// Returns the catalog and the texture pixels in texture-slot order.
    pub fn build(self, mesh: &MeshBatch, frame_count: usize) -> RenderResult<(RenderItemCatalog, Vec<TextureData>)> {
        let texture_lookup: HashMap<&str, usize> = self
            .textures
            .iter()
            .enumerate()
            .map(|(slot, (name, _))| (name.as_str(), slot))
            .collect();

        let mut materials = Vec::with_capacity(self.materials.len());
        let mut material_lookup = HashMap::with_capacity(self.materials.len());
        for (slot, (name, desc)) in self.materials.into_iter().enumerate() {
            let texture_slot = match &desc.texture {
                Some(texture) => Some(
                    *texture_lookup
                        .get(texture.as_str())
                        .ok_or_else(|| RenderError::UnknownTexture(texture.clone()))?,
                ),
                None => None,
            };
            material_lookup.insert(name.clone(), slot);
            materials.push(MaterialItem::new(name, slot, desc.params, texture_slot, frame_count));
        }

        let mut items = Vec::with_capacity(self.items.len());
        let mut item_lookup = HashMap::with_capacity(self.items.len());
        let mut groups: [Vec<usize>; 3] = Default::default();
        for (object_slot, desc) in self.items.into_iter().enumerate() {
            let submesh = mesh.submesh(&desc.submesh)?;
            let material_slot = *material_lookup
                .get(&desc.material)
                .ok_or_else(|| RenderError::UnknownMaterial(desc.material.clone()))?;

            groups[desc.group.index()].push(object_slot);
            item_lookup.insert(desc.name.clone(), object_slot);
            items.push(RenderItem::new(
                desc.name,
                desc.submesh,
                submesh,
                material_slot,
                object_slot,
                desc.topology,
                desc.group,
                desc.transform,
                frame_count,
            ));
        }

        let (texture_names, texture_data): (Vec<String>, Vec<TextureData>) = self.textures.into_iter().unzip();

        log::info!(
            "Built render item catalog: {} items ({} opaque, {} line, {} transparent), {} materials, {} textures",
            items.len(),
            groups[PipelineGroup::Opaque.index()].len(),
            groups[PipelineGroup::Line.index()].len(),
            groups[PipelineGroup::Transparent.index()].len(),
            materials.len(),
            texture_names.len()
        );

        let catalog = RenderItemCatalog {
            items,
            item_lookup,
            materials,
            material_lookup,
            texture_names,
            groups,
            frame_count,
        };
        Ok((catalog, texture_data))
    }
}

/// Frozen set of render items, materials and textures
#[derive(Debug)]
pub struct RenderItemCatalog {
    items: Vec<RenderItem>,
    item_lookup: HashMap<String, usize>,
    materials: Vec<MaterialItem>,
    material_lookup: HashMap<String, usize>,
    texture_names: Vec<String>,
    groups: [Vec<usize>; 3],
    frame_count: usize,
}

impl RenderItemCatalog {
    /// Ring depth the dirty counters were built for
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Number of object constant slots
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of material constant slots
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Number of texture views
    pub fn texture_count(&self) -> usize {
        self.texture_names.len()
    }

    /// Items indexed by object slot
    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    /// Mutable items indexed by object slot
    pub fn items_mut(&mut self) -> &mut [RenderItem] {
        &mut self.items
    }

    /// Item in object slot `slot`
    pub fn item(&self, slot: usize) -> Option<&RenderItem> {
        self.items.get(slot)
    }

    /// Mutable item in object slot `slot`
    pub fn item_mut(&mut self, slot: usize) -> Option<&mut RenderItem> {
        self.items.get_mut(slot)
    }

    /// Object slot of item `name`
    pub fn find_item(&self, name: &str) -> Option<usize> {
        self.item_lookup.get(name).copied()
    }

    /// Materials indexed by material slot
    pub fn materials(&self) -> &[MaterialItem] {
        &self.materials
    }

    /// Mutable materials indexed by material slot
    pub fn materials_mut(&mut self) -> &mut [MaterialItem] {
        &mut self.materials
    }

    /// Material in slot `slot`
    pub fn material(&self, slot: usize) -> Option<&MaterialItem> {
        self.materials.get(slot)
    }

    /// Material named `name`
    pub fn material_by_name(&self, name: &str) -> RenderResult<&MaterialItem> {
        self.material_lookup
            .get(name)
            .map(|&slot| &self.materials[slot])
            .ok_or_else(|| RenderError::UnknownMaterial(name.to_string()))
    }

    /// Update the parameters of material `name`, re-arming its dirty counter
    pub fn set_material_params(&mut self, name: &str, params: MaterialParams) -> RenderResult<()> {
        let slot = *self
            .material_lookup
            .get(name)
            .ok_or_else(|| RenderError::UnknownMaterial(name.to_string()))?;
        self.materials[slot].set_params(params);
        Ok(())
    }

    /// Texture names in texture-slot order
    pub fn texture_names(&self) -> &[String] {
        &self.texture_names
    }

    /// Object slots of `group` in insertion order
    pub fn group(&self, group: PipelineGroup) -> &[usize] {
        &self.groups[group.index()]
    }
}

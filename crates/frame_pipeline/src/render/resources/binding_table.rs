//! Binding table allocator
//!
//! One fixed-capacity table of views, laid out once the render items,
//! materials and textures are final:
//!
//! ```text
//! [0, N*obj)                     object constants   frame*obj + slot
//! [N*obj, N*(obj+mat))           material constants material_base + frame*mat + slot
//! [N*(obj+mat), N*(obj+mat)+tex) textures           texture_base + slot
//! ```
//!
//! Pass and light constants are bound per frame outside the table (see
//! [`RootViews`](crate::render::api::RootViews)), so there is no pass band.
//! Offsets are a pure function of the four counts; the table never grows.

use std::ops::Range;

use crate::render::api::{ConstantView, TextureHandle, ViewHandle};
use crate::render::{RenderError, RenderResult};

/// Region of the table holding one kind of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingBand {
    /// Object constant views, multi-buffered per frame slot
    Object,
    /// Material constant views, multi-buffered per frame slot
    Material,
    /// Texture views, shared by all frame slots
    Texture,
}

impl BindingBand {
    /// Bands in table order
    pub const ALL: [Self; 3] = [Self::Object, Self::Material, Self::Texture];
}

/// Fixed offsets of a frozen binding table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingTableLayout {
    frame_count: u32,
    object_count: u32,
    material_count: u32,
    texture_count: u32,
}

impl BindingTableLayout {
    /// Layout for `frame_count` slots and the given item counts
    pub fn new(
        frame_count: usize,
        object_count: usize,
        material_count: usize,
        texture_count: usize,
    ) -> RenderResult<Self> {
        let to_u32 = |value: usize, what: &str| {
            u32::try_from(value).map_err(|_| RenderError::CapacityExceeded {
                what: what.to_string(),
                requested: value,
                capacity: u32::MAX as usize,
            })
        };

        let layout = Self {
            frame_count: to_u32(frame_count, "frame slots")?,
            object_count: to_u32(object_count, "object views")?,
            material_count: to_u32(material_count, "material views")?,
            texture_count: to_u32(texture_count, "texture views")?,
        };

        let capacity = frame_count
            .checked_mul(object_count + material_count)
            .and_then(|views| views.checked_add(texture_count))
            .filter(|&total| u32::try_from(total).is_ok());
        if capacity.is_none() {
            return Err(RenderError::CapacityExceeded {
                what: "binding table".to_string(),
                requested: usize::MAX,
                capacity: u32::MAX as usize,
            });
        }

        Ok(layout)
    }

    /// Frame slots the constant bands are multiplied by
    pub fn frame_count(&self) -> usize {
        self.frame_count as usize
    }

    /// Object constant slots per frame
    pub fn object_count(&self) -> usize {
        self.object_count as usize
    }

    /// Material constant slots per frame
    pub fn material_count(&self) -> usize {
        self.material_count as usize
    }

    /// Texture views
    pub fn texture_count(&self) -> usize {
        self.texture_count as usize
    }

    /// Total number of views: `N*(obj+mat) + tex`
    pub fn capacity(&self) -> u32 {
        self.frame_count * (self.object_count + self.material_count) + self.texture_count
    }

    /// First offset of the material band
    pub fn material_base(&self) -> u32 {
        self.frame_count * self.object_count
    }

    /// First offset of the texture band
    pub fn texture_base(&self) -> u32 {
        self.material_base() + self.frame_count * self.material_count
    }

    /// Offsets covered by `band`
    pub fn band_range(&self, band: BindingBand) -> Range<u32> {
        match band {
            BindingBand::Object => 0..self.material_base(),
            BindingBand::Material => self.material_base()..self.texture_base(),
            BindingBand::Texture => self.texture_base()..self.capacity(),
        }
    }

    /// Slots per frame in `band`
    pub fn slots_in(&self, band: BindingBand) -> u32 {
        match band {
            BindingBand::Object => self.object_count,
            BindingBand::Material => self.material_count,
            BindingBand::Texture => self.texture_count,
        }
    }

    /// Offset of `slot` for frame `frame_index` in `band`.
    ///
    /// Texture views are not multi-buffered; `frame_index` is ignored for them.
    pub fn view_handle(&self, band: BindingBand, frame_index: usize, slot: usize) -> RenderResult<ViewHandle> {
        let slots = self.slots_in(band) as usize;
        if slot >= slots {
            return Err(RenderError::CapacityExceeded {
                what: format!("{band:?} views"),
                requested: slot + 1,
                capacity: slots,
            });
        }

        if band != BindingBand::Texture && frame_index >= self.frame_count() {
            return Err(RenderError::SlotOutOfRange {
                index: frame_index,
                capacity: self.frame_count(),
            });
        }

        let offset = match band {
            BindingBand::Object => frame_index * slots + slot,
            BindingBand::Material => self.material_base() as usize + frame_index * slots + slot,
            BindingBand::Texture => self.texture_base() as usize + slot,
        };
        // Bounded by capacity, which `new` checked fits in u32
        Ok(ViewHandle(offset as u32))
    }

    /// Object constant view of `slot` in frame `frame_index`
    pub fn object_view(&self, frame_index: usize, slot: usize) -> RenderResult<ViewHandle> {
        self.view_handle(BindingBand::Object, frame_index, slot)
    }

    /// Material constant view of `slot` in frame `frame_index`
    pub fn material_view(&self, frame_index: usize, slot: usize) -> RenderResult<ViewHandle> {
        self.view_handle(BindingBand::Material, frame_index, slot)
    }

    /// Texture view of texture `slot`
    pub fn texture_view(&self, slot: usize) -> RenderResult<ViewHandle> {
        self.view_handle(BindingBand::Texture, 0, slot)
    }

    /// Band, frame and slot an offset belongs to
    pub fn locate(&self, handle: ViewHandle) -> Option<(BindingBand, usize, usize)> {
        let offset = handle.0;
        BindingBand::ALL.into_iter().find_map(|band| {
            let range = self.band_range(band);
            if !range.contains(&offset) {
                return None;
            }
            let local = (offset - range.start) as usize;
            let slots = self.slots_in(band) as usize;
            match band {
                BindingBand::Texture => Some((band, 0, local)),
                _ => Some((band, local / slots, local % slots)),
            }
        })
    }
}

/// What one table offset points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEntry {
    /// A constant record inside an upload pool
    Constant(ConstantView),
    /// An uploaded texture
    Texture(TextureHandle),
}

/// Build-once owner of the binding table contents
pub struct BindingTableAllocator {
    limit: u32,
    layout: Option<BindingTableLayout>,
    entries: Vec<TableEntry>,
}

impl BindingTableAllocator {
    /// Allocator for a device accepting at most `limit` views
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            layout: None,
            entries: Vec::new(),
        }
    }

    /// Lay out and fill the table.
    ///
    /// `resolve(band, frame, slot)` supplies each entry, called in offset order.
    /// Fails with [`RenderError::TableFrozen`] when the table already exists.
    pub fn allocate<F>(&mut self, layout: BindingTableLayout, mut resolve: F) -> RenderResult<&BindingTableLayout>
    where
        F: FnMut(BindingBand, usize, usize) -> RenderResult<TableEntry>,
    {
        if self.layout.is_some() {
            return Err(RenderError::TableFrozen);
        }

        if layout.capacity() > self.limit {
            return Err(RenderError::CapacityExceeded {
                what: "binding table".to_string(),
                requested: layout.capacity() as usize,
                capacity: self.limit as usize,
            });
        }

        let mut entries = Vec::with_capacity(layout.capacity() as usize);
        for band in [BindingBand::Object, BindingBand::Material] {
            for frame in 0..layout.frame_count() {
                for slot in 0..layout.slots_in(band) as usize {
                    entries.push(resolve(band, frame, slot)?);
                }
            }
        }
        for slot in 0..layout.texture_count() {
            entries.push(resolve(BindingBand::Texture, 0, slot)?);
        }
        debug_assert_eq!(entries.len(), layout.capacity() as usize);

        log::info!(
            "Allocated binding table: {} views (materials at {}, textures at {})",
            layout.capacity(),
            layout.material_base(),
            layout.texture_base()
        );

        self.entries = entries;
        Ok(self.layout.insert(layout))
    }

    /// Discard the current table and allocate a new one
    pub fn rebuild<F>(&mut self, layout: BindingTableLayout, resolve: F) -> RenderResult<&BindingTableLayout>
    where
        F: FnMut(BindingBand, usize, usize) -> RenderResult<TableEntry>,
    {
        log::debug!("Rebuilding binding table");
        self.layout = None;
        self.entries.clear();
        self.allocate(layout, resolve)
    }

    /// Layout of the allocated table
    pub fn layout(&self) -> RenderResult<&BindingTableLayout> {
        self.layout.as_ref().ok_or(RenderError::TableNotAllocated)
    }

    /// Whether `allocate` has run
    pub fn is_allocated(&self) -> bool {
        self.layout.is_some()
    }

    /// All entries, indexed by offset
    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    /// Entry at `handle`
    pub fn entry(&self, handle: ViewHandle) -> Option<&TableEntry> {
        self.entries.get(handle.index())
    }
}

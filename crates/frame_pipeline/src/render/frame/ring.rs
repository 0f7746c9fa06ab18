//! Frame resource ring
//!
//! N frame slots, each owning its own constant pools and command list.
//! The CPU records into one slot while the GPU may still be reading the
//! others. Before a slot is reused the CPU waits for the completion value
//! its previous submission signaled, and only for that value.

use crate::core::config::{MAX_FRAME_RESOURCES, MIN_FRAME_RESOURCES};
use crate::render::api::{RenderDevice, RootViews, UploadMemory};
use crate::render::resources::constants::{
    LightConstants, MaterialConstants, ObjectConstants, PassConstants,
};
use crate::render::resources::upload_pool::ConstantUploadPool;
use crate::render::sync::CompletionCounter;
use crate::render::{RenderError, RenderResult};

/// Lifecycle of a frame slot, derived from the completion counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never used, or its last submission has retired
    Free,
    /// Acquired by the CPU for the frame being recorded
    InUse,
    /// Submitted; the GPU may still read it
    AwaitingRetirement,
}

/// Constant pools of one frame slot
pub struct FramePools<M: UploadMemory> {
    /// One object record per render item
    pub objects: ConstantUploadPool<ObjectConstants, M>,
    /// One material record per material
    pub materials: ConstantUploadPool<MaterialConstants, M>,
    /// Single pass record
    pub pass: ConstantUploadPool<PassConstants, M>,
    /// Single light record
    pub light: ConstantUploadPool<LightConstants, M>,
}

impl<M: UploadMemory> FramePools<M> {
    /// Allocate pools sized for `object_count` items and `material_count` materials
    pub fn create<D>(device: &mut D, object_count: usize, material_count: usize) -> RenderResult<Self>
    where
        D: RenderDevice<Memory = M>,
    {
        Ok(Self {
            objects: ConstantUploadPool::create(device, object_count)?,
            materials: ConstantUploadPool::create(device, material_count)?,
            pass: ConstantUploadPool::create(device, 1)?,
            light: ConstantUploadPool::create(device, 1)?,
        })
    }

    /// Views of the pass and light records
    pub fn root_views(&self) -> RenderResult<RootViews> {
        Ok(RootViews {
            pass: self.pass.view(0)?,
            light: self.light.view(0)?,
        })
    }
}

/// One buffer of the ring
pub struct FrameSlot<D: RenderDevice> {
    index: usize,
    pools: FramePools<D::Memory>,
    commands: D::Commands,
    signal_value: u64,
    acquired: bool,
}

impl<D: RenderDevice> FrameSlot<D> {
    /// Position in the ring
    pub fn index(&self) -> usize {
        self.index
    }

    /// Completion value of the last submission, 0 when never submitted
    pub fn signal_value(&self) -> u64 {
        self.signal_value
    }

    /// State given the GPU's latest completed value
    pub fn state(&self, completed: u64) -> SlotState {
        if self.acquired {
            SlotState::InUse
        } else if self.signal_value > completed {
            SlotState::AwaitingRetirement
        } else {
            SlotState::Free
        }
    }

    /// Read-only pools
    pub fn pools(&self) -> &FramePools<D::Memory> {
        &self.pools
    }

    /// Writable pools; only while the slot is acquired
    pub fn pools_mut(&mut self) -> RenderResult<&mut FramePools<D::Memory>> {
        self.require_acquired()?;
        Ok(&mut self.pools)
    }

    /// Writable pools and command list together
    pub fn parts_mut(&mut self) -> RenderResult<(&mut FramePools<D::Memory>, &mut D::Commands)> {
        self.require_acquired()?;
        Ok((&mut self.pools, &mut self.commands))
    }

    /// Pass and light views of this slot
    pub fn root_views(&self) -> RenderResult<RootViews> {
        self.pools.root_views()
    }

    fn require_acquired(&self) -> RenderResult<()> {
        if !self.acquired {
            return Err(RenderError::SlotNotAcquired { slot: self.index });
        }
        Ok(())
    }
}

/// Result of moving the ring forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredSlot {
    /// Index of the slot now in use
    pub index: usize,
    /// Whether the CPU had to wait for the GPU
    pub waited: bool,
}

/// Ring of N frame slots
pub struct FrameResourceRing<D: RenderDevice> {
    slots: Vec<FrameSlot<D>>,
    active: Option<usize>,
}

impl<D: RenderDevice> FrameResourceRing<D> {
    /// Create `frame_count` slots sized for the given item and material counts
    pub fn new(device: &mut D, frame_count: usize, object_count: usize, material_count: usize) -> RenderResult<Self> {
        if !(MIN_FRAME_RESOURCES..=MAX_FRAME_RESOURCES).contains(&frame_count) {
            return Err(RenderError::InvalidConfig(format!(
                "frame resource count {frame_count} outside {MIN_FRAME_RESOURCES}..={MAX_FRAME_RESOURCES}"
            )));
        }

        let mut slots = Vec::with_capacity(frame_count);
        for index in 0..frame_count {
            let pools = FramePools::create(device, object_count, material_count)?;
            let commands = device.create_commands(index)?;
            log::debug!(
                "Created frame slot {}: {} object records, {} material records",
                index,
                object_count,
                material_count
            );
            slots.push(FrameSlot {
                index,
                pools,
                commands,
                signal_value: 0,
                acquired: false,
            });
        }

        log::info!("Created frame resource ring with {} slots", frame_count);
        Ok(Self { slots, active: None })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; a ring has at least two slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the slot acquired by the last advance
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Move to the next slot, waiting for the GPU to release it.
    ///
    /// The first call lands on slot 0.
    pub fn advance(&mut self, counter: &CompletionCounter, device: &D) -> RenderResult<AcquiredSlot> {
        if let Some(previous) = self.active {
            // An advance without submit gives the slot back unchanged
            self.slots[previous].acquired = false;
        }

        let next = self.active.map_or(0, |index| (index + 1) % self.slots.len());
        let waited = self.wait_for_slot(next, counter, device)?;
        if waited {
            log::debug!(
                "Stalled on frame slot {} (completion value {})",
                next,
                self.slots[next].signal_value
            );
        }

        self.slots[next].acquired = true;
        self.active = Some(next);
        Ok(AcquiredSlot { index: next, waited })
    }

    /// Block until slot `index`'s last submission has retired.
    ///
    /// Never blocks for a slot that has not been submitted yet.
    pub fn wait_for_slot(&self, index: usize, counter: &CompletionCounter, device: &D) -> RenderResult<bool> {
        let slot = self.slot(index)?;
        if slot.signal_value == 0 {
            return Ok(false);
        }
        counter.wait_until_retired(device, slot.signal_value)
    }

    /// Slot `index`
    pub fn slot(&self, index: usize) -> RenderResult<&FrameSlot<D>> {
        self.slots.get(index).ok_or(RenderError::SlotOutOfRange {
            index,
            capacity: self.slots.len(),
        })
    }

    /// All slots in ring order
    pub fn slots(&self) -> &[FrameSlot<D>] {
        &self.slots
    }

    /// Slot acquired by the last advance
    pub fn active_slot(&self) -> RenderResult<&FrameSlot<D>> {
        let index = self.active.ok_or(RenderError::SlotNotAcquired { slot: 0 })?;
        let slot = &self.slots[index];
        slot.require_acquired()?;
        Ok(slot)
    }

    /// Mutable slot acquired by the last advance
    pub fn active_slot_mut(&mut self) -> RenderResult<&mut FrameSlot<D>> {
        let index = self.active.ok_or(RenderError::SlotNotAcquired { slot: 0 })?;
        let slot = &mut self.slots[index];
        slot.require_acquired()?;
        Ok(slot)
    }

    /// Reset the active slot's command list so it can record this frame
    pub fn begin_recording(&mut self, device: &mut D) -> RenderResult<&mut FrameSlot<D>> {
        let slot = self.active_slot_mut()?;
        device.reset_commands(&mut slot.commands)?;
        Ok(slot)
    }

    /// Record that the active slot was submitted and will retire at `value`
    pub fn mark_submitted(&mut self, value: u64) -> RenderResult<()> {
        let slot = self.active_slot_mut()?;
        slot.signal_value = value;
        slot.acquired = false;
        Ok(())
    }

    /// State of slot `index` given the GPU's latest completed value
    pub fn slot_state(&self, index: usize, completed: u64) -> RenderResult<SlotState> {
        Ok(self.slot(index)?.state(completed))
    }
}

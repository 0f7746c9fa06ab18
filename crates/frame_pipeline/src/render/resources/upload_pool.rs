//! Constant upload pool
//!
//! A CPU-writable, GPU-readable linear buffer holding `capacity` records of
//! one constant kind. Record `k` lives at `k * stride` where `stride` is the
//! record size rounded up to the device's constant alignment.

use std::marker::PhantomData;

use crate::render::api::{ConstantView, RenderDevice, UploadMemory};
use crate::render::resources::constants::{align_to, ConstantRecord};
use crate::render::{RenderError, RenderResult};

/// Array of fixed-size constant records in mapped upload memory
pub struct ConstantUploadPool<T: ConstantRecord, M: UploadMemory> {
    memory: M,
    stride: usize,
    capacity: usize,
    _record: PhantomData<T>,
}

impl<T: ConstantRecord, M: UploadMemory> ConstantUploadPool<T, M> {
    /// Allocate a pool of `capacity` records on `device`
    pub fn create<D>(device: &mut D, capacity: usize) -> RenderResult<Self>
    where
        D: RenderDevice<Memory = M>,
    {
        let alignment = device.constant_alignment();
        let stride = align_to(T::byte_size(), alignment);
        // Zero-sized buffers are not allowed by every API
        let memory = device.create_upload_memory(stride * capacity.max(1))?;
        Self::new(memory, capacity, alignment)
    }

    /// Wrap already allocated memory
    pub fn new(memory: M, capacity: usize, alignment: usize) -> RenderResult<Self> {
        if !alignment.is_power_of_two() {
            return Err(RenderError::InvalidConfig(format!(
                "constant alignment {alignment} is not a power of two"
            )));
        }

        let stride = align_to(T::byte_size(), alignment);
        let required = stride * capacity;
        let available = memory.bytes().len();
        if available < required {
            return Err(RenderError::Device(format!(
                "upload memory holds {available} bytes, {capacity} {:?} records need {required}",
                T::KIND
            )));
        }

        Ok(Self {
            memory,
            stride,
            capacity,
            _record: PhantomData,
        })
    }

    /// Write `record` into slot `index`
    pub fn copy_record(&mut self, index: usize, record: &T) -> RenderResult<()> {
        let range = self.slot_range(index)?;
        let bytes = bytemuck::bytes_of(record);
        self.memory.bytes_mut()[range.start..range.start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Read the record stored in slot `index`
    pub fn read_record(&self, index: usize) -> RenderResult<T> {
        let range = self.slot_range(index)?;
        let bytes = &self.memory.bytes()[range.start..range.start + T::byte_size()];
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Byte offset of slot `index`
    pub fn element_offset(&self, index: usize) -> u64 {
        (index * self.stride) as u64
    }

    /// View of slot `index` for the binding table
    pub fn view(&self, index: usize) -> RenderResult<ConstantView> {
        self.slot_range(index)?;
        Ok(ConstantView {
            buffer: self.memory.buffer_id(),
            offset: self.element_offset(index),
            size: self.stride as u64,
        })
    }

    /// Padded size of one record
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of record slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Backing memory
    pub fn memory(&self) -> &M {
        &self.memory
    }

    fn slot_range(&self, index: usize) -> RenderResult<std::ops::Range<usize>> {
        if index >= self.capacity {
            return Err(RenderError::SlotOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        let start = index * self.stride;
        Ok(start..start + self.stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::backends::headless::{HeadlessDevice, HostMemory};
    use crate::render::resources::constants::{
        constant_buffer_byte_size, LightConstants, MaterialConstants, ObjectConstants,
        PassConstants,
    };

    fn object_at(x: f32) -> ObjectConstants {
        ObjectConstants::from_world(&Mat4::new_translation(&Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn test_stride_is_rounded_to_alignment() {
        let mut device = HeadlessDevice::new();
        let pool: ConstantUploadPool<PassConstants, HostMemory> =
            ConstantUploadPool::create(&mut device, 3).unwrap();

        assert_eq!(pool.stride(), constant_buffer_byte_size(std::mem::size_of::<PassConstants>()));
        assert_eq!(pool.stride(), 512);
        assert_eq!(pool.element_offset(2), 1024);
        assert!(pool.memory().bytes().len() >= 3 * 512);
    }

    #[test]
    fn test_record_round_trip_at_slot_offset() {
        let mut device = HeadlessDevice::new();
        let mut pool: ConstantUploadPool<ObjectConstants, HostMemory> =
            ConstantUploadPool::create(&mut device, 4).unwrap();

        for k in 0..4 {
            pool.copy_record(k, &object_at(k as f32 + 1.0)).unwrap();
        }

        for k in 0..4 {
            let offset = k * pool.stride();
            let raw = &pool.memory().bytes()[offset..offset + std::mem::size_of::<ObjectConstants>()];
            let decoded: ObjectConstants = bytemuck::pod_read_unaligned(raw);
            assert_eq!(decoded, object_at(k as f32 + 1.0));
            assert_eq!(pool.read_record(k).unwrap(), decoded);
        }
    }

    #[test]
    fn test_writes_do_not_bleed_into_neighbours() {
        let mut device = HeadlessDevice::new();
        let mut pool: ConstantUploadPool<MaterialConstants, HostMemory> =
            ConstantUploadPool::create(&mut device, 3).unwrap();

        let marked = MaterialConstants {
            albedo: [0.5, 0.25, 0.125, 1.0],
            ..MaterialConstants::default()
        };
        pool.copy_record(1, &marked).unwrap();

        let stride = pool.stride();
        assert!(pool.memory().bytes()[..stride].iter().all(|&b| b == 0));
        assert!(pool.memory().bytes()[2 * stride..3 * stride].iter().all(|&b| b == 0));
        assert_eq!(pool.read_record(1).unwrap(), marked);
    }

    #[test]
    fn test_out_of_range_slot_is_rejected() {
        let mut device = HeadlessDevice::new();
        let mut pool: ConstantUploadPool<LightConstants, HostMemory> =
            ConstantUploadPool::create(&mut device, 1).unwrap();

        let result = pool.copy_record(1, &LightConstants::default());
        assert!(matches!(
            result,
            Err(RenderError::SlotOutOfRange { index: 1, capacity: 1 })
        ));
        assert!(pool.view(1).is_err());
    }

    #[test]
    fn test_undersized_memory_is_rejected() {
        let memory = HostMemory::zeroed(100, 7);
        let result = ConstantUploadPool::<ObjectConstants, HostMemory>::new(memory, 1, 256);
        assert!(matches!(result, Err(RenderError::Device(_))));
    }

    #[test]
    fn test_view_describes_slot() {
        let mut device = HeadlessDevice::new();
        let pool: ConstantUploadPool<ObjectConstants, HostMemory> =
            ConstantUploadPool::create(&mut device, 2).unwrap();

        let view = pool.view(1).unwrap();
        assert_eq!(view.buffer, pool.memory().buffer_id());
        assert_eq!(view.offset, 256);
        assert_eq!(view.size, 256);
    }
}

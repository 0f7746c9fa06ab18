//! Timeline semaphore backing the completion counter
//!
//! One semaphore per device. The queue signals monotonically increasing
//! values after each frame's work; the CPU polls or blocks on the counter
//! value. Waits use no timeout.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// Vulkan 1.2 timeline semaphore with RAII cleanup
pub struct TimelineSemaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl TimelineSemaphore {
    /// Create a timeline starting at 0
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let mut timeline_create_info = vk::SemaphoreTypeCreateInfo::builder()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);

        let create_info = vk::SemaphoreCreateInfo::builder()
            .push_next(&mut timeline_create_info);

        let semaphore = unsafe {
            device.create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            semaphore,
        })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Highest value the GPU has signaled
    pub fn completed_value(&self) -> VulkanResult<u64> {
        unsafe {
            self.device.get_semaphore_counter_value(self.semaphore)
                .map_err(VulkanError::Api)
        }
    }

    /// Block until the counter reaches `value`
    pub fn wait_for_value(&self, value: u64) -> VulkanResult<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::builder()
            .semaphores(&semaphores)
            .values(&values);

        unsafe {
            self.device.wait_semaphores(&wait_info, u64::MAX)
                .map_err(VulkanError::Api)
        }
    }

    /// Enqueue a signal of `value` on `queue` after all previously submitted work
    pub fn queue_signal(&self, queue: vk::Queue, value: u64) -> VulkanResult<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::builder()
            .signal_semaphore_values(&values);
        let submit_info = vk::SubmitInfo::builder()
            .signal_semaphores(&semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device.queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

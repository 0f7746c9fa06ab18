//! CPU-side view of the GPU completion counter
//!
//! One monotonic 64-bit value shared by the CPU and the queue. The CPU
//! picks the next value and asks the queue to signal it once all prior
//! work has run; the GPU raises the completed value as it retires work.
//! A frame slot is safe to reuse once the completed value has caught up
//! with the value its submission signaled.

use crate::render::api::RenderDevice;
use crate::render::RenderResult;

/// Monotonic completion counter
#[derive(Debug, Default)]
pub struct CompletionCounter {
    last_signaled: u64,
}

impl CompletionCounter {
    /// Counter that has never signaled
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value handed to the queue, 0 before the first signal
    pub fn last_signaled(&self) -> u64 {
        self.last_signaled
    }

    /// Enqueue a signal of the next value and return it.
    ///
    /// The value is recorded only once the queue accepted the signal, so a
    /// failed signal never leaves a value nobody will ever retire.
    pub fn signal<D: RenderDevice>(&mut self, device: &mut D) -> RenderResult<u64> {
        let value = self.last_signaled + 1;
        device.queue_signal(value)?;
        self.last_signaled = value;
        log::trace!("Queued completion signal {}", value);
        Ok(value)
    }

    /// Whether the GPU has retired `value`
    pub fn is_retired<D: RenderDevice>(&self, device: &D, value: u64) -> RenderResult<bool> {
        Ok(device.completed_value()? >= value)
    }

    /// Block until `target` is retired.
    ///
    /// Returns immediately when it already is; the result says whether the
    /// call had to block.
    pub fn wait_until_retired<D: RenderDevice>(&self, device: &D, target: u64) -> RenderResult<bool> {
        if device.completed_value()? >= target {
            return Ok(false);
        }
        log::trace!("Waiting for completion value {}", target);
        device.wait_for_value(target)?;
        Ok(true)
    }

    /// Drain the queue: signal a fresh value and wait for it
    pub fn flush_all<D: RenderDevice>(&mut self, device: &mut D) -> RenderResult<u64> {
        let value = self.signal(device)?;
        self.wait_until_retired(device, value)?;
        log::debug!("Queue flushed through completion value {}", value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessDevice, SimulatedTimeline};

    #[test]
    fn test_signal_values_increase_by_one() {
        let mut device = HeadlessDevice::new();
        let mut counter = CompletionCounter::new();
        assert_eq!(counter.last_signaled(), 0);

        assert_eq!(counter.signal(&mut device).unwrap(), 1);
        assert_eq!(counter.signal(&mut device).unwrap(), 2);
        assert_eq!(counter.signal(&mut device).unwrap(), 3);
        assert_eq!(device.signals(), vec![1, 2, 3]);
    }

    #[test]
    fn test_wait_on_retired_value_does_not_block() {
        let device = HeadlessDevice::with_timeline(SimulatedTimeline::new(false));
        let counter = CompletionCounter::new();

        // Nothing signaled: value 0 is trivially retired
        assert!(!counter.wait_until_retired(&device, 0).unwrap());
        assert!(counter.is_retired(&device, 0).unwrap());
    }

    #[test]
    fn test_flush_all_waits_for_everything() {
        let timeline = SimulatedTimeline::new(true);
        let mut device = HeadlessDevice::with_timeline(timeline.clone());
        let mut counter = CompletionCounter::new();

        counter.signal(&mut device).unwrap();
        counter.signal(&mut device).unwrap();
        let flushed = counter.flush_all(&mut device).unwrap();

        assert_eq!(flushed, 3);
        assert_eq!(timeline.completed(), 3);
        assert!(counter.is_retired(&device, 3).unwrap());
    }

    #[test]
    fn test_failed_wait_surfaces_error() {
        let timeline = SimulatedTimeline::new(false);
        let mut device = HeadlessDevice::with_timeline(timeline.clone());
        let mut counter = CompletionCounter::new();

        let value = counter.signal(&mut device).unwrap();
        timeline.poison("device lost");
        assert!(counter.wait_until_retired(&device, value).is_err());
    }
}

//! Simulated GPU timeline
//!
//! Stands in for the queue's completion counter. Signals are enqueued in
//! submission order and retired either immediately (`auto_retire`), by the
//! test driving `retire_*`, or by a [`RetirementThread`] that retires them
//! after a simulated execution latency.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Default)]
struct TimelineState {
    queued: VecDeque<u64>,
    highest_enqueued: u64,
    completed: u64,
    auto_retire: bool,
    failure: Option<String>,
}

impl TimelineState {
    fn retire_through(&mut self, value: u64) {
        while self.queued.front().is_some_and(|&queued| queued <= value) {
            self.queued.pop_front();
        }
        self.completed = self.completed.max(value);
    }
}

/// Host-side model of a monotonic GPU completion counter
#[derive(Debug)]
pub struct SimulatedTimeline {
    state: Mutex<TimelineState>,
    changed: Condvar,
}

impl SimulatedTimeline {
    /// New timeline at value 0
    pub fn new(auto_retire: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TimelineState {
                auto_retire,
                ..TimelineState::default()
            }),
            changed: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TimelineState> {
        // A panicking test thread must not wedge every other waiter
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a signal of `value` behind all earlier work
    pub fn enqueue(&self, value: u64) {
        let mut state = self.lock();
        state.highest_enqueued = state.highest_enqueued.max(value);
        if state.auto_retire {
            state.retire_through(value);
        } else {
            state.queued.push_back(value);
        }
        self.changed.notify_all();
    }

    /// Latest retired value
    pub fn completed(&self) -> u64 {
        self.lock().completed
    }

    /// Signals queued but not yet retired
    pub fn pending(&self) -> usize {
        self.lock().queued.len()
    }

    /// Retire every queued value up to and including `value`
    pub fn retire_through(&self, value: u64) {
        let mut state = self.lock();
        state.retire_through(value);
        self.changed.notify_all();
    }

    /// Retire the oldest queued value
    pub fn retire_next(&self) -> Option<u64> {
        let mut state = self.lock();
        let value = state.queued.pop_front()?;
        state.completed = state.completed.max(value);
        self.changed.notify_all();
        Some(value)
    }

    /// Retire everything queued so far
    pub fn retire_all(&self) {
        let mut state = self.lock();
        let highest = state.highest_enqueued;
        state.retire_through(highest);
        self.changed.notify_all();
    }

    /// Switch immediate retirement on or off; switching on drains the queue
    pub fn set_auto_retire(&self, auto_retire: bool) {
        let mut state = self.lock();
        state.auto_retire = auto_retire;
        if auto_retire {
            let highest = state.highest_enqueued;
            state.retire_through(highest);
        }
        self.changed.notify_all();
    }

    /// Simulate a lost device: every current and future wait fails
    pub fn poison(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        state.failure = Some(reason.into());
        self.changed.notify_all();
    }

    /// Failure reason, if the timeline was poisoned
    pub fn failure(&self) -> Option<String> {
        self.lock().failure.clone()
    }

    /// Block until `value` is retired
    pub fn wait_for(&self, value: u64) -> Result<(), String> {
        let mut state = self.lock();
        loop {
            if let Some(reason) = &state.failure {
                return Err(reason.clone());
            }
            if state.completed >= value {
                return Ok(());
            }
            if value > state.highest_enqueued {
                return Err(format!(
                    "completion value {value} was never signaled (highest is {})",
                    state.highest_enqueued
                ));
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Wait up to `timeout` for queued work; returns whether any is queued
    fn wait_for_work(&self, timeout: Duration) -> bool {
        let state = self.lock();
        if !state.queued.is_empty() {
            return true;
        }
        let (state, _) = self
            .changed
            .wait_timeout(state, timeout)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        !state.queued.is_empty()
    }
}

/// Background thread retiring queued signals after a simulated latency
pub struct RetirementThread {
    timeline: Arc<SimulatedTimeline>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RetirementThread {
    /// Start retiring `timeline`, sleeping `latency()` before each value
    pub fn spawn<F>(timeline: Arc<SimulatedTimeline>, mut latency: F) -> std::io::Result<Self>
    where
        F: FnMut() -> Duration + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_timeline = Arc::clone(&timeline);
        let worker_shutdown = Arc::clone(&shutdown);

        let handle = std::thread::Builder::new()
            .name("gpu-timeline".to_string())
            .spawn(move || {
                log::debug!("Simulated GPU timeline thread started");
                while !worker_shutdown.load(Ordering::Acquire) {
                    if !worker_timeline.wait_for_work(Duration::from_millis(10)) {
                        continue;
                    }
                    std::thread::sleep(latency());
                    if let Some(value) = worker_timeline.retire_next() {
                        log::trace!("Simulated GPU retired value {}", value);
                    }
                }
                log::debug!("Simulated GPU timeline thread stopped");
            })?;

        Ok(Self {
            timeline,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Stop the thread; remaining work retires immediately from now on
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Simulated GPU timeline thread panicked");
            }
        }
        self.timeline.set_auto_retire(true);
    }
}

impl Drop for RetirementThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_auto_retire_completes_on_enqueue() {
        let timeline = SimulatedTimeline::new(true);
        timeline.enqueue(1);
        timeline.enqueue(2);
        assert_eq!(timeline.completed(), 2);
        assert_eq!(timeline.pending(), 0);
        assert!(timeline.wait_for(2).is_ok());
    }

    #[test]
    fn test_manual_retirement_is_in_order() {
        let timeline = SimulatedTimeline::new(false);
        timeline.enqueue(1);
        timeline.enqueue(2);
        timeline.enqueue(3);

        assert_eq!(timeline.completed(), 0);
        assert_eq!(timeline.retire_next(), Some(1));
        assert_eq!(timeline.completed(), 1);

        timeline.retire_through(2);
        assert_eq!(timeline.pending(), 1);
        timeline.retire_all();
        assert_eq!(timeline.completed(), 3);
        assert_eq!(timeline.retire_next(), None);
    }

    #[test]
    fn test_wait_blocks_until_retired() {
        let timeline = SimulatedTimeline::new(false);
        timeline.enqueue(1);

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let timeline = Arc::clone(&timeline);
            std::thread::spawn(move || {
                let result = timeline.wait_for(1);
                tx.send(result).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        timeline.retire_through(1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(()));
        waiter.join().unwrap();
    }

    #[test]
    fn test_poison_wakes_waiters_with_error() {
        let timeline = SimulatedTimeline::new(false);
        timeline.enqueue(1);

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let timeline = Arc::clone(&timeline);
            std::thread::spawn(move || tx.send(timeline.wait_for(1)).unwrap())
        };

        timeline.poison("device removed");
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Err("device removed".to_string()));
        waiter.join().unwrap();
    }

    #[test]
    fn test_waiting_for_unsignaled_value_fails() {
        let timeline = SimulatedTimeline::new(false);
        assert!(timeline.wait_for(4).is_err());
    }

    #[test]
    fn test_retirement_thread_drains_queue() {
        let timeline = SimulatedTimeline::new(false);
        let mut worker = RetirementThread::spawn(Arc::clone(&timeline), || Duration::from_millis(1)).unwrap();

        for value in 1..=5 {
            timeline.enqueue(value);
        }
        assert!(timeline.wait_for(5).is_ok());

        worker.stop();
        timeline.enqueue(6);
        assert_eq!(timeline.completed(), 6);
    }
}

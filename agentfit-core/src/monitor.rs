//! Background polling of the dynamic memory reading.
//!
//! The evaluator is pure; something has to feed it fresh free-RAM figures.
//! `MemoryMonitor` samples on its own thread and hands readings to the UI
//! over a channel, which the UI drains once per tick.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use sysinfo::System;

use crate::hardware::DynamicSystemInfo;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct MemoryMonitor {
    interval: Duration,
    receiver: Receiver<DynamicSystemInfo>,
    // Dropping the sender wakes the worker with `Disconnected`.
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl MemoryMonitor {
    /// Poll the host every `interval` (raised to at least 250 ms).
    pub fn spawn(interval: Duration) -> Self {
        Self::spawn_with(interval, {
            let mut sys = System::new();
            sys.refresh_cpu_all();
            move || DynamicSystemInfo::sample(&mut sys)
        })
    }

    /// Poll with a caller-supplied sampler. The first sample is taken
    /// immediately, then once per interval.
    pub fn spawn_with<F>(interval: Duration, mut sampler: F) -> Self
    where
        F: FnMut() -> DynamicSystemInfo + Send + 'static,
    {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (tx, rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = std::thread::spawn(move || {
            loop {
                let info = sampler();
                tracing::debug!(
                    free_ram_bytes = info.free_ram_bytes,
                    pressure = info.memory_pressure.label(),
                    "memory sample"
                );
                if tx.send(info).is_err() {
                    return;
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        });

        MemoryMonitor {
            interval,
            receiver: rx,
            stop: Some(stop_tx),
            worker: Some(worker),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drain pending samples and return the newest, if any arrived since the
    /// last call. Never blocks.
    pub fn try_latest(&self) -> Option<DynamicSystemInfo> {
        self.receiver.try_iter().last()
    }

    /// Block until the next sample arrives or `timeout` passes.
    pub fn wait_next(&self, timeout: Duration) -> Option<DynamicSystemInfo> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MemoryPressure;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn fake_sample(free: u64) -> DynamicSystemInfo {
        DynamicSystemInfo {
            free_ram_bytes: free,
            memory_pressure: MemoryPressure::Nominal,
            cpu_load_percent: 0.0,
            disk_free_bytes: 0,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_first_sample_is_immediate() {
        let monitor = MemoryMonitor::spawn_with(Duration::from_secs(60), || fake_sample(42));
        let first = monitor.wait_next(Duration::from_secs(5)).expect("first sample");
        assert_eq!(first.free_ram_bytes, 42);
    }

    #[test]
    fn test_interval_is_clamped() {
        let monitor = MemoryMonitor::spawn_with(Duration::from_millis(1), || fake_sample(0));
        assert_eq!(monitor.interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_try_latest_returns_newest() {
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        let monitor = MemoryMonitor::spawn_with(MIN_POLL_INTERVAL, move || {
            fake_sample(c.fetch_add(1, Ordering::SeqCst) + 1)
        });

        // Wait for at least two samples to queue up.
        while counter.load(Ordering::SeqCst) < 2 {
            std::thread::sleep(Duration::from_millis(20));
        }
        std::thread::sleep(Duration::from_millis(20));

        let latest = monitor.try_latest().expect("queued samples");
        assert!(latest.free_ram_bytes >= 2);
        assert!(latest.free_ram_bytes <= counter.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drop_stops_worker() {
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        let monitor = MemoryMonitor::spawn_with(MIN_POLL_INTERVAL, move || {
            c.fetch_add(1, Ordering::SeqCst);
            fake_sample(0)
        });
        monitor.wait_next(Duration::from_secs(5));
        drop(monitor);

        let after_drop = counter.load(Ordering::SeqCst);
        std::thread::sleep(MIN_POLL_INTERVAL * 2);
        assert_eq!(counter.load(Ordering::SeqCst), after_drop);
    }
}

//! Per-device progress events

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info, warn};

use digil_types::DeviceId;

use crate::orchestrator::PhaseOutput;

/// Receives orchestrator events; every method defaults to a no-op
pub trait PhaseObserver<O>: Send + Sync {
    fn on_phase_start(&self, _total: usize) {}

    fn on_device_start(&self, _device: &DeviceId) {}

    /// Called once per dispatched device, in completion order
    fn on_device_complete(&self, _output: &O) {}

    fn on_phase_end(&self, _completed: usize, _not_dispatched: usize) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<O> PhaseObserver<O> for NoopObserver {}

/// Logs progress through `tracing`
#[derive(Debug)]
pub struct TracingObserver {
    phase: &'static str,
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl TracingObserver {
    pub fn new(phase: &'static str) -> Self {
        Self {
            phase,
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }
}

impl<O: PhaseOutput> PhaseObserver<O> for TracingObserver {
    fn on_phase_start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        info!("{}: {} devices queued", self.phase, total);
    }

    fn on_device_start(&self, device: &DeviceId) {
        debug!(device = %device, "{}: started", self.phase);
    }

    fn on_device_complete(&self, output: &O) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);

        if output.is_success() {
            info!(
                device = %output.device_id(),
                "[{}/{}] {}",
                done,
                total,
                output.status_label()
            );
        } else {
            warn!(
                device = %output.device_id(),
                "[{}/{}] {}",
                done,
                total,
                output.status_label()
            );
        }
    }

    fn on_phase_end(&self, completed: usize, not_dispatched: usize) {
        if not_dispatched == 0 {
            info!("{}: finished, {} devices processed", self.phase, completed);
        } else {
            warn!(
                "{}: stopped, {} processed, {} not dispatched",
                self.phase, completed, not_dispatched
            );
        }
    }
}

//! Bounded worker pool running one workflow per device
//!
//! A fixed number of workers pull devices from a shared queue and run
//! each device's workflow to completion before taking the next one.
//! Results are handed to the observer in completion order.
//!
//! Once the cancellation token fires no further device is dispatched;
//! devices still queued are reported as not dispatched. An authentication
//! failure cancels the phase the same way and is reported once.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use digil_types::{
    DeviceId, DeviceRecord, MaintenanceCheck, QueueCheck, ResetResult, ResetStatus, VerifyResult,
    VerifyTarget,
};

use crate::observer::PhaseObserver;

/// Something a workflow can be run for
pub trait PhaseInput: Send + 'static {
    fn device_id(&self) -> &DeviceId;
}

impl PhaseInput for DeviceRecord {
    fn device_id(&self) -> &DeviceId {
        &self.id
    }
}

impl PhaseInput for VerifyTarget {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }
}

/// Terminal per-device result
pub trait PhaseOutput: Send + 'static {
    fn device_id(&self) -> &DeviceId;

    /// Label used for logging and summary counts
    fn status_label(&self) -> String;

    fn is_success(&self) -> bool;
}

impl PhaseOutput for ResetResult {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn status_label(&self) -> String {
        self.status.to_string()
    }

    fn is_success(&self) -> bool {
        self.status == ResetStatus::Success
    }
}

impl PhaseOutput for VerifyResult {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn status_label(&self) -> String {
        self.status.to_string()
    }

    fn is_success(&self) -> bool {
        self.all_ok
    }
}

impl PhaseOutput for QueueCheck {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn status_label(&self) -> String {
        QueueCheck::status_label(self)
    }

    fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

impl PhaseOutput for MaintenanceCheck {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn status_label(&self) -> String {
        MaintenanceCheck::status_label(self)
    }

    fn is_success(&self) -> bool {
        self.mode.is_some() && self.error.is_empty()
    }
}

/// Workflow stopped by a run-wide failure
///
/// The device still gets its result row.
#[derive(Debug)]
pub struct Abort<O> {
    pub output: O,
    pub error: digil_core::Error,
}

/// Per-device workflow
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    type Input: PhaseInput;
    type Output: PhaseOutput;

    /// Run the workflow for one device
    ///
    /// Device-level failures are recorded in the output. `Err` is reserved
    /// for failures that must stop the whole phase.
    async fn run(
        &self,
        input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output, Abort<Self::Output>>;
}

/// Outcome of a phase run
#[derive(Debug)]
pub struct PhaseReport<I, O> {
    /// One entry per dispatched device, in completion order
    pub results: Vec<O>,

    /// Devices never handed to a worker
    pub not_dispatched: Vec<I>,

    /// Run-wide failure that stopped the phase
    pub fatal: Option<digil_core::Error>,

    /// Phase stopped by the cancellation signal
    pub cancelled: bool,
}

impl<I, O> PhaseReport<I, O> {
    pub fn is_complete(&self) -> bool {
        self.not_dispatched.is_empty() && self.fatal.is_none() && !self.cancelled
    }
}

enum Event<O> {
    Started(DeviceId),
    Finished(O),
    Aborted(Abort<O>),
}

/// Fixed-size worker pool
#[derive(Debug, Clone)]
pub struct Orchestrator {
    workers: usize,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create a pool of `workers` (at least one) bound to `cancel`
    pub fn new(workers: usize, cancel: CancellationToken) -> Self {
        Self {
            workers: workers.max(1),
            cancel,
        }
    }

    /// Run `workflow` for every input
    pub async fn run_phase<W: Workflow>(
        &self,
        inputs: Vec<W::Input>,
        workflow: Arc<W>,
        observer: &dyn PhaseObserver<W::Output>,
    ) -> PhaseReport<W::Input, W::Output> {
        let total = inputs.len();
        observer.on_phase_start(total);

        // Auth failures stop this phase without cancelling the caller's token
        let phase_cancel = self.cancel.child_token();
        let queue = Arc::new(Mutex::new(VecDeque::from(inputs)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker_count = self.workers.min(total);
        let mut handles = Vec::with_capacity(worker_count);

        for worker in 0..worker_count {
            let queue = Arc::clone(&queue);
            let workflow = Arc::clone(&workflow);
            let cancel = phase_cancel.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(input) = queue.lock().pop_front() else {
                        break;
                    };

                    let _ = tx.send(Event::Started(input.device_id().clone()));

                    let event = match workflow.run(input, &cancel).await {
                        Ok(output) => Event::Finished(output),
                        Err(abort) => {
                            cancel.cancel();
                            Event::Aborted(abort)
                        }
                    };

                    if tx.send(event).is_err() {
                        break;
                    }
                }
                debug!(worker, "worker stopped");
            }));
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        let mut fatal = None;

        while let Some(event) = rx.recv().await {
            match event {
                Event::Started(device) => observer.on_device_start(&device),
                Event::Finished(output) => {
                    observer.on_device_complete(&output);
                    results.push(output);
                }
                Event::Aborted(Abort { output, error }) => {
                    error!(device = %output.device_id(), "Stopping phase: {}", error);
                    observer.on_device_complete(&output);
                    results.push(output);
                    if fatal.is_none() {
                        fatal = Some(error);
                    }
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }

        let not_dispatched: Vec<_> = queue.lock().drain(..).collect();
        if !not_dispatched.is_empty() {
            warn!("{} devices were not dispatched", not_dispatched.len());
        }

        let report = PhaseReport {
            results,
            not_dispatched,
            fatal,
            cancelled: self.cancel.is_cancelled(),
        };
        observer.on_phase_end(report.results.len(), report.not_dispatched.len());
        report
    }
}

//! Client-side progress estimate for a running extraction.
//!
//! The backend reports no progress while `/extract` is pending, so the
//! client animates a time-based estimate instead. It is purely cosmetic: it
//! may reach 100 % before the request resolves or still be mid-way when it
//! does, and the run's real outcome always wins.
//!
//! Two layers:
//!
//! * [`ProgressModel`]: the deterministic state machine. Each [`tick`]
//!   advances the current step by a fixed increment; steps expected to
//!   dominate real latency (OCR, LLM analysis) advance at half speed.
//! * [`ProgressTicker`]: drives the model on a tokio interval and publishes
//!   [`ProgressSnapshot`]s to a [`ProgressObserver`] and a `watch` channel.
//!   Stopping it aborts the task and zeroes the state under the same lock the
//!   task ticks under, so no stale tick can land after a stop.
//!
//! [`tick`]: ProgressModel::tick
//!
//! # Example
//!
//! ```rust
//! use batchsheet_client::progress::{ProgressModel, STEPS};
//!
//! let mut model = ProgressModel::new();
//! model.activate();
//! assert_eq!(model.snapshot().percent, 0.0);
//!
//! while !model.is_complete() {
//!     model.tick();
//! }
//! assert_eq!(model.snapshot().percent, 100.0);
//! assert_eq!(model.snapshot().step, STEPS.len() - 1);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Interval between estimator ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(150);

/// One named phase of the simulated pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStep {
    pub name: &'static str,
    pub description: &'static str,
    /// Share of the whole bar, in percent. All weights sum to 100.
    pub weight: f64,
    /// Weight units added per tick.
    pub increment: f64,
}

/// The fixed step list, in pipeline order.
pub const STEPS: [ProgressStep; 5] = [
    ProgressStep {
        name: "Uploading file",
        description: "Sending file to server...",
        weight: 5.0,
        increment: 0.4,
    },
    ProgressStep {
        name: "OCR Processing",
        description: "Extracting text from document...",
        weight: 50.0,
        increment: 0.2,
    },
    ProgressStep {
        name: "LLM Analysis",
        description: "Analyzing and structuring data...",
        weight: 35.0,
        increment: 0.2,
    },
    ProgressStep {
        name: "Generating Excel",
        description: "Creating Excel file...",
        weight: 8.0,
        increment: 0.4,
    },
    ProgressStep {
        name: "Finalizing",
        description: "Almost done...",
        weight: 2.0,
        increment: 0.4,
    },
];

/// Point-in-time view of the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub active: bool,
    /// Index into [`STEPS`].
    pub step: usize,
    /// Global percentage in `[0, 100]`.
    pub percent: f64,
}

impl ProgressSnapshot {
    /// The step this snapshot is in.
    pub fn current_step(&self) -> &'static ProgressStep {
        &STEPS[self.step.min(STEPS.len() - 1)]
    }

    /// Percentage rounded for display.
    pub fn rounded_percent(&self) -> u8 {
        self.percent.round().clamp(0.0, 100.0) as u8
    }
}

/// Deterministic progress state machine.
#[derive(Debug, Clone, Default)]
pub struct ProgressModel {
    active: bool,
    step: usize,
    step_progress: f64,
    percent: f64,
}

impl ProgressModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from zero.
    pub fn activate(&mut self) {
        *self = Self {
            active: true,
            ..Self::default()
        };
    }

    /// Clear step and percentage back to zero.
    pub fn deactivate(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once the last step has filled up.
    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            active: self.active,
            step: self.step,
            percent: self.percent,
        }
    }

    /// Advance by one tick. No-op while inactive or once complete.
    pub fn tick(&mut self) -> ProgressSnapshot {
        if !self.active || self.is_complete() {
            return self.snapshot();
        }

        let step = &STEPS[self.step];
        let start: f64 = STEPS[..self.step].iter().map(|s| s.weight).sum();
        self.step_progress += step.increment;
        let fraction = (self.step_progress / step.weight).min(1.0);
        let current = start + fraction * step.weight;

        if fraction >= 1.0 && self.step < STEPS.len() - 1 {
            self.step += 1;
            self.step_progress = 0.0;
        }

        self.percent = self.percent.max(current.min(100.0));
        self.snapshot()
    }
}

/// Receives estimator updates.
///
/// All methods default to no-ops so implementors override only what they
/// render. Calls arrive from the ticker task, hence `Send + Sync`.
pub trait ProgressObserver: Send + Sync {
    /// Called once when a run starts, with a zeroed snapshot.
    fn on_activate(&self, snapshot: &ProgressSnapshot) {
        let _ = snapshot;
    }

    /// Called after every tick.
    fn on_tick(&self, snapshot: &ProgressSnapshot) {
        let _ = snapshot;
    }

    /// Called once when the run ends; the estimate is back at zero.
    fn on_deactivate(&self) {}
}

/// Observer that ignores every event.
pub struct NoopProgressObserver;

impl ProgressObserver for NoopProgressObserver {}

/// Shared observer handle as stored by [`crate::session::Session`].
pub type SharedProgressObserver = Arc<dyn ProgressObserver>;

struct TickerShared {
    model: Mutex<ProgressModel>,
    observer: SharedProgressObserver,
    tx: watch::Sender<ProgressSnapshot>,
}

impl TickerShared {
    fn model(&self) -> MutexGuard<'_, ProgressModel> {
        self.model.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cancellable task that animates a [`ProgressModel`].
///
/// Must be started from within a tokio runtime. Dropping the ticker aborts
/// the task without notifying the observer; call [`stop`](Self::stop) for a
/// clean deactivation.
pub struct ProgressTicker {
    shared: Arc<TickerShared>,
    rx: watch::Receiver<ProgressSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Activate the estimate and start ticking every [`TICK_INTERVAL`].
    pub fn start(observer: SharedProgressObserver) -> Self {
        let mut model = ProgressModel::new();
        model.activate();
        let initial = model.snapshot();
        let (tx, rx) = watch::channel(initial);

        let shared = Arc::new(TickerShared {
            model: Mutex::new(model),
            observer,
            tx,
        });
        shared.observer.on_activate(&initial);

        let task_shared = Arc::clone(&shared);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut model = task_shared.model();
                if !model.is_active() {
                    break;
                }
                let snapshot = model.tick();
                task_shared.tx.send_replace(snapshot);
                task_shared.observer.on_tick(&snapshot);
                if model.is_complete() {
                    break;
                }
            }
        });

        Self {
            shared,
            rx,
            task: Some(task),
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.rx.borrow()
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.rx.clone()
    }

    /// Abort the task and reset the estimate to zero.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let mut model = self.shared.model();
        model.deactivate();
        task.abort();
        self.shared.tx.send_replace(model.snapshot());
        self.shared.observer.on_deactivate();
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

//! Training step hooks for observability.
//!
//! Hooks observe phase transitions and step outcomes without taking part in
//! the step itself. Every method has a default no-op implementation.
//!
//! ## Events
//!
//! - `on_phase`: the network moved from one phase to another
//! - `on_step`: a step completed; carries its [`StepReport`]
//! - `on_step_failed`: a step returned an error from the given stage

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dg_core::Decimal;

use crate::error::Error;
use crate::network::{Phase, Stage};

/// Outcome of one completed training step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 1-based index of the step within the network's lifetime.
    pub step: u64,
    pub loss: Decimal,
    pub latency: Duration,
    /// Learning rate the optimizer reported, if it has a fixed one.
    pub learning_rate: Option<Decimal>,
}

// ============================================================================
// Hook Trait
// ============================================================================

/// Observer of training step events.
pub trait StepHooks: Send + Sync {
    fn on_phase(&self, _from: Phase, _to: Phase) {}

    fn on_step(&self, _report: &StepReport) {}

    fn on_step_failed(&self, _step: u64, _stage: Stage, _error: &Error) {}
}

/// Runs both hooks, first `A` then `B`.
impl<A: StepHooks, B: StepHooks> StepHooks for (A, B) {
    fn on_phase(&self, from: Phase, to: Phase) {
        self.0.on_phase(from, to);
        self.1.on_phase(from, to);
    }

    fn on_step(&self, report: &StepReport) {
        self.0.on_step(report);
        self.1.on_step(report);
    }

    fn on_step_failed(&self, step: u64, stage: Stage, error: &Error) {
        self.0.on_step_failed(step, stage, error);
        self.1.on_step_failed(step, stage, error);
    }
}

impl<H: StepHooks + ?Sized> StepHooks for Arc<H> {
    fn on_phase(&self, from: Phase, to: Phase) {
        (**self).on_phase(from, to);
    }

    fn on_step(&self, report: &StepReport) {
        (**self).on_step(report);
    }

    fn on_step_failed(&self, step: u64, stage: Stage, error: &Error) {
        (**self).on_step_failed(step, stage, error);
    }
}

// ============================================================================
// Noop Hooks (Default)
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl StepHooks for NoopHooks {}

// ============================================================================
// Tracing Hooks
// ============================================================================

/// Emits each event as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

impl StepHooks for TracingHooks {
    fn on_phase(&self, from: Phase, to: Phase) {
        tracing::trace!(%from, %to, "phase");
    }

    fn on_step(&self, report: &StepReport) {
        tracing::info!(
            step = report.step,
            loss = %report.loss,
            latency_us = report.latency.as_micros() as u64,
            learning_rate = ?report.learning_rate,
            "step completed"
        );
    }

    fn on_step_failed(&self, step: u64, stage: Stage, error: &Error) {
        tracing::warn!(step, %stage, %error, "step failed");
    }
}

// ============================================================================
// Metrics Hooks
// ============================================================================

/// Snapshot of the values a metrics exporter would publish.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepMetrics {
    pub learning_rate: Option<Decimal>,
    pub phase: Phase,
    pub last_loss: Option<Decimal>,
    pub steps: u64,
    pub failed_steps: u64,
    pub latencies: Vec<Duration>,
}

/// In-memory metrics. Clones share the same storage, so a clone kept by the
/// caller reads what the network's copy records.
#[derive(Debug, Clone, Default)]
pub struct MetricsHooks {
    inner: Arc<Mutex<StepMetrics>>,
}

impl MetricsHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StepMetrics {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, StepMetrics> {
        // Counters stay readable after a poisoning panic
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StepHooks for MetricsHooks {
    fn on_phase(&self, _from: Phase, to: Phase) {
        self.lock().phase = to;
    }

    fn on_step(&self, report: &StepReport) {
        let mut metrics = self.lock();
        metrics.steps += 1;
        metrics.last_loss = Some(report.loss);
        metrics.learning_rate = report.learning_rate;
        metrics.latencies.push(report.latency);
    }

    fn on_step_failed(&self, _step: u64, _stage: Stage, _error: &Error) {
        self.lock().failed_steps += 1;
    }
}

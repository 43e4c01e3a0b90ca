//! Progress observers.
//!
//! The core never prints. Everything a user might want to see while a run is
//! in progress is handed to an [`Observer`] as structured data; rendering is
//! the observer's business.

use std::path::Path;

use crate::monitor::AggregateStats;
use crate::probe::{Outcome, ProbeTarget};
use crate::report::{Report, SinkError};

/// One finished attempt of a monitor run.
#[derive(Debug, Clone, Copy)]
pub struct AttemptEvent<'a> {
    /// 1-based attempt number.
    pub index: u32,
    pub count: u32,
    pub target: &'a ProbeTarget,
    pub outcome: &'a Outcome,
}

/// Receiver of progress events. All methods default to doing nothing.
pub trait Observer: Send + Sync {
    fn attempt(&self, _event: &AttemptEvent<'_>) {}

    /// A one-shot probe (ping, HTTP check, DNS check) finished.
    fn probe(&self, _name: &str, _target: &ProbeTarget, _outcome: &Outcome) {}

    fn monitor_finished(&self, _target: &ProbeTarget, _stats: &AggregateStats) {}

    fn report(&self, _report: &Report) {}

    fn persisted(&self, _location: &Path) {}

    fn persist_failed(&self, _error: &SinkError) {}
}

/// Observer that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Observer for Silent {}
